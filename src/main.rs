use std::path::PathBuf;

use anyhow::{Context, bail};
use hdr_fusion_rs::image_pipeline::{
    BaseFrame, ColorSpace, ConversionConfig, FusionConfig, GroupingConfig, RawToHdrPipeline, suggest_sets,
};
use hdr_fusion_rs::logger;
use serde_json::json;
use tracing::{error, info};

const USAGE: &str = "usage:
  hdr_fusion_rs merge --output <out.tif> [--preview <preview.png>] [--color-space NAME] [--base-frame NAME] FILES...
  hdr_fusion_rs suggest [--max-gap SECONDS] [--min-size N] FILES...";

struct MergeArgs {
    output: PathBuf,
    preview: Option<PathBuf>,
    color_space: ColorSpace,
    base_frame: BaseFrame,
    files: Vec<PathBuf>,
}

struct SuggestArgs {
    config: GroupingConfig,
    files: Vec<PathBuf>,
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next().with_context(|| format!("{flag} needs a value"))
}

fn parse_merge(mut args: impl Iterator<Item = String>) -> anyhow::Result<MergeArgs> {
    let mut output = None;
    let mut preview = None;
    let mut color_space = ColorSpace::default();
    let mut base_frame = BaseFrame::default();
    let mut files = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--output" => output = Some(PathBuf::from(flag_value(&mut args, &arg)?)),
            "--preview" => preview = Some(PathBuf::from(flag_value(&mut args, &arg)?)),
            "--color-space" => {
                color_space = flag_value(&mut args, &arg)?.parse().map_err(anyhow::Error::msg)?;
            }
            "--base-frame" => {
                base_frame = flag_value(&mut args, &arg)?.parse().map_err(anyhow::Error::msg)?;
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
            _ => files.push(PathBuf::from(arg)),
        }
    }

    let output = output.with_context(|| format!("--output is required\n{USAGE}"))?;
    if files.is_empty() {
        bail!("no input files\n{USAGE}");
    }
    Ok(MergeArgs {
        output: std::path::absolute(&output).unwrap_or(output),
        preview: preview.map(|p| std::path::absolute(&p).unwrap_or(p)),
        color_space,
        base_frame,
        files,
    })
}

fn parse_suggest(mut args: impl Iterator<Item = String>) -> anyhow::Result<SuggestArgs> {
    let mut builder = GroupingConfig::builder();
    let mut files = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--max-gap" => {
                let value = flag_value(&mut args, &arg)?;
                builder = builder.max_gap(value.parse().with_context(|| format!("invalid --max-gap '{value}'"))?);
            }
            "--min-size" => {
                let value = flag_value(&mut args, &arg)?;
                builder = builder.min_size(value.parse().with_context(|| format!("invalid --min-size '{value}'"))?);
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
            _ => files.push(PathBuf::from(arg)),
        }
    }
    Ok(SuggestArgs {
        config: builder.build(),
        files,
    })
}

fn run_merge(args: MergeArgs) -> anyhow::Result<()> {
    let config = ConversionConfig::builder()
        .color_space(args.color_space)
        .fusion(FusionConfig::builder().base_frame(args.base_frame).build())
        .build();
    let pipeline = RawToHdrPipeline::new(config);

    info!("RAW to HDR pipeline initialized");
    info!("Color space: {}", pipeline.config().color_space);
    info!("Base frame: {}", pipeline.config().fusion.base_frame);

    let summary = pipeline
        .merge_files(&args.files, &args.output, args.preview.as_deref())
        .context("merge failed")?;
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn run_suggest(args: SuggestArgs) -> anyhow::Result<()> {
    let sets = suggest_sets(&args.files, &args.config);
    println!("{}", json!({ "sets": sets }));
    Ok(())
}

fn main() -> anyhow::Result<()> {
    logger::init();

    let mut args = std::env::args().skip(1);
    let result = match args.next().as_deref() {
        Some("merge") => parse_merge(args).and_then(run_merge),
        Some("suggest") => parse_suggest(args).and_then(run_suggest),
        Some(other) => Err(anyhow::anyhow!("unknown command '{other}'\n{USAGE}")),
        None => Err(anyhow::anyhow!(USAGE)),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
