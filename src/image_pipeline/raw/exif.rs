//! Shutter-time probe for TIFF-structured RAW containers.
//!
//! ARW, NEF, CR2, DNG, PEF and friends are TIFF files underneath; the
//! `ExposureTime` tag lives either in IFD0 or in the EXIF sub-IFD it points
//! to. Anything unexpected yields `None`, which downstream treats as an
//! unknown exposure and recovers from frame brightness instead.

use tracing::trace;

const TAG_EXPOSURE_TIME: u16 = 0x829A;
const TAG_EXIF_IFD: u16 = 0x8769;
const TYPE_RATIONAL: u16 = 5;

/// Magic numbers seen in the TIFF header of supported containers
/// (plain TIFF, Olympus ORF, Panasonic RW2).
const TIFF_MAGICS: [u16; 4] = [42, 0x4F52, 0x5352, 0x0055];

const MAX_IFD_ENTRIES: usize = 4096;

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

struct TiffView<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

struct IfdEntry {
    field_type: u16,
    count: u32,
    /// Offset of the 4-byte value/offset field inside the entry
    value_field: usize,
}

impl<'a> TiffView<'a> {
    fn parse(data: &'a [u8]) -> Option<(Self, usize)> {
        let order = match data.get(0..2)? {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return None,
        };
        let view = Self { data, order };
        let magic = view.u16_at(2)?;
        if !TIFF_MAGICS.contains(&magic) {
            return None;
        }
        let first_ifd = view.u32_at(4)? as usize;
        Some((view, first_ifd))
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(offset..offset + 2)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes(bytes),
            ByteOrder::Big => u16::from_be_bytes(bytes),
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        })
    }

    fn find_entry(&self, ifd_offset: usize, tag: u16) -> Option<IfdEntry> {
        let count = self.u16_at(ifd_offset)? as usize;
        if count > MAX_IFD_ENTRIES {
            return None;
        }
        (0..count).find_map(|i| {
            let entry = ifd_offset + 2 + i * 12;
            if self.u16_at(entry)? != tag {
                return None;
            }
            Some(IfdEntry {
                field_type: self.u16_at(entry + 2)?,
                count: self.u32_at(entry + 4)?,
                value_field: entry + 8,
            })
        })
    }

    fn rational(&self, entry: &IfdEntry) -> Option<f32> {
        if entry.field_type != TYPE_RATIONAL || entry.count == 0 {
            return None;
        }
        // 8-byte values never fit inline; the field holds an offset.
        let offset = self.u32_at(entry.value_field)? as usize;
        let numerator = self.u32_at(offset)?;
        let denominator = self.u32_at(offset + 4)?;
        if denominator == 0 {
            return None;
        }
        Some((numerator as f64 / denominator as f64) as f32)
    }

    fn exposure_in(&self, ifd_offset: usize) -> Option<f32> {
        let entry = self.find_entry(ifd_offset, TAG_EXPOSURE_TIME)?;
        self.rational(&entry)
    }
}

/// Reads the shutter time in seconds from a RAW file's bytes.
pub fn exposure_time_seconds(data: &[u8]) -> Option<f32> {
    let (view, ifd0) = TiffView::parse(data)?;
    let seconds = view.exposure_in(ifd0).or_else(|| {
        let exif = view.find_entry(ifd0, TAG_EXIF_IFD)?;
        let exif_offset = view.u32_at(exif.value_field)? as usize;
        view.exposure_in(exif_offset)
    });
    trace!("EXIF exposure probe: {:?} ({:?})", seconds, view.order);
    seconds.filter(|s| s.is_finite() && *s > 0.0)
}
