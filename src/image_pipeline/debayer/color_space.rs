//! Output color spaces for the decode stage.
//!
//! The camera matrix from the RAW maps camera RGB to XYZ (D65). Each color
//! space here supplies the XYZ -> RGB half of the conversion.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Srgb,
    Adobe,
    Wide,
    ProPhoto,
    Xyz,
    /// Camera native primaries, no matrix applied
    Raw,
}

const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [ 3.2404542, -1.5371385, -0.4985314],
    [-0.9692660,  1.8760108,  0.0415560],
    [ 0.0556434, -0.2040259,  1.0572252],
];

const XYZ_TO_ADOBE: [[f32; 3]; 3] = [
    [ 2.0413690, -0.5649464, -0.3446944],
    [-0.9692660,  1.8760108,  0.0415560],
    [ 0.0134474, -0.1183897,  1.0154096],
];

// D50-referred
const XYZ_TO_WIDE: [[f32; 3]; 3] = [
    [ 1.4628067, -0.1840623, -0.2743606],
    [-0.5217933,  1.4472381,  0.0677227],
    [ 0.0349342, -0.0968930,  1.2884099],
];

// D50-referred
const XYZ_TO_PROPHOTO: [[f32; 3]; 3] = [
    [ 1.3459433, -0.2556075, -0.0511118],
    [-0.5445989,  1.5081673,  0.0205351],
    [ 0.0000000,  0.0000000,  1.2118128],
];

const BRADFORD_D65_TO_D50: [[f32; 3]; 3] = [
    [ 1.0478112,  0.0228866, -0.0501270],
    [ 0.0295424,  0.9904844, -0.0170491],
    [-0.0092345,  0.0150436,  0.7521316],
];

const IDENTITY: [[f32; 3]; 3] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

fn mul3(a: &[[f32; 3]; 3], b: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0f32; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[r][c] = (0..3).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

impl ColorSpace {
    /// Resolves a user-facing name. Unknown names fall back to sRGB.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorSpace::Srgb => "srgb",
            ColorSpace::Adobe => "adobe",
            ColorSpace::Wide => "wide",
            ColorSpace::ProPhoto => "prophoto",
            ColorSpace::Xyz => "xyz",
            ColorSpace::Raw => "raw",
        }
    }

    /// XYZ (D65) -> output RGB, or `None` when camera primaries are kept as-is.
    pub fn xyz_to_rgb(self) -> Option<[[f32; 3]; 3]> {
        match self {
            ColorSpace::Srgb => Some(XYZ_TO_SRGB),
            ColorSpace::Adobe => Some(XYZ_TO_ADOBE),
            ColorSpace::Wide => Some(mul3(&XYZ_TO_WIDE, &BRADFORD_D65_TO_D50)),
            ColorSpace::ProPhoto => Some(mul3(&XYZ_TO_PROPHOTO, &BRADFORD_D65_TO_D50)),
            ColorSpace::Xyz => Some(IDENTITY),
            ColorSpace::Raw => None,
        }
    }
}

impl FromStr for ColorSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "srgb" => Ok(ColorSpace::Srgb),
            "adobe" | "adobergb" => Ok(ColorSpace::Adobe),
            "wide" => Ok(ColorSpace::Wide),
            "prophoto" => Ok(ColorSpace::ProPhoto),
            "xyz" => Ok(ColorSpace::Xyz),
            "raw" => Ok(ColorSpace::Raw),
            other => Err(format!("unknown color space '{other}'")),
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(ColorSpace::from_name("sRGB"), ColorSpace::Srgb);
        assert_eq!(ColorSpace::from_name(" ProPhoto "), ColorSpace::ProPhoto);
        assert_eq!(ColorSpace::from_name("RAW"), ColorSpace::Raw);
    }

    #[test]
    fn unknown_name_falls_back_to_srgb() {
        assert_eq!(ColorSpace::from_name("rec2020"), ColorSpace::Srgb);
        assert!("rec2020".parse::<ColorSpace>().is_err());
    }

    #[test]
    fn d65_white_maps_to_neutral_srgb() {
        let white = [0.95047f32, 1.0, 1.08883];
        let m = ColorSpace::Srgb.xyz_to_rgb().unwrap();
        for row in m {
            let v: f32 = (0..3).map(|k| row[k] * white[k]).sum();
            assert!((v - 1.0).abs() < 1e-3, "{v}");
        }
    }

    #[test]
    fn d65_white_stays_neutral_after_adaptation() {
        let white = [0.95047f32, 1.0, 1.08883];
        let m = ColorSpace::ProPhoto.xyz_to_rgb().unwrap();
        for row in m {
            let v: f32 = (0..3).map(|k| row[k] * white[k]).sum();
            assert!((v - 1.0).abs() < 1e-2, "{v}");
        }
    }
}
