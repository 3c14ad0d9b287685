use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::{debug, info, instrument};

use crate::image_pipeline::grouping::types::{Confidence, GroupingConfig, RawFileInfo, SuggestedSet};

/// Lowercase alphabetic head shared by every name: the stem up to its first
/// digit, trimmed of `-`, `_` and spaces.
pub fn common_alpha_prefix<S: AsRef<str>>(names: &[S]) -> String {
    let trim = |s: &str| s.trim_matches(|c| matches!(c, '-' | '_' | ' ')).to_string();
    let alpha_head = |name: &str| {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let head: String = stem.chars().take_while(|c| !c.is_ascii_digit()).collect();
        trim(&head).to_lowercase()
    };

    let mut heads = names.iter().map(|n| alpha_head(n.as_ref()));
    let Some(mut prefix) = heads.next() else {
        return String::new();
    };
    for head in heads {
        if prefix.is_empty() {
            break;
        }
        let shared = prefix
            .chars()
            .zip(head.chars())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a.len_utf8())
            .sum();
        prefix.truncate(shared);
    }
    trim(&prefix)
}

/// Splits time-sorted files wherever consecutive files are more than `max_gap` seconds apart.
pub fn split_by_time(infos: &[RawFileInfo], max_gap: f64) -> Vec<Vec<RawFileInfo>> {
    let mut groups: Vec<Vec<RawFileInfo>> = Vec::new();
    let mut current: Vec<RawFileInfo> = Vec::new();

    for info in infos {
        if let Some(last) = current.last()
            && info.mtime - last.mtime > max_gap
        {
            groups.push(std::mem::take(&mut current));
        }
        current.push(info.clone());
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

pub fn score_group(group: &[RawFileInfo], max_gap: f64) -> f64 {
    if group.is_empty() {
        return 0.0;
    }

    let count = group.len();
    let size_score = ((count as f64 - 2.0) / 4.0).clamp(0.0, 1.0);

    let gap_score = if count > 1 {
        let avg_gap = group.windows(2).map(|w| w[1].mtime - w[0].mtime).sum::<f64>() / (count - 1) as f64;
        (1.0 - avg_gap / max_gap.max(0.1)).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let names: Vec<&str> = group.iter().map(|f| f.name.as_str()).collect();
    let prefix = common_alpha_prefix(&names);
    let prefix_score = match prefix.chars().count() {
        0 => 0.0,
        1 | 2 => 0.5,
        _ => 1.0,
    };

    (0.35 + 0.30 * size_score + 0.20 * gap_score + 0.15 * prefix_score).clamp(0.0, 1.0)
}

pub fn confidence_from_score(score: f64) -> Confidence {
    if score >= 0.75 {
        Confidence::High
    } else if score >= 0.55 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

pub fn label_for_group(group: &[RawFileInfo], confidence: Confidence) -> String {
    let (Some(first), Some(last)) = (group.first(), group.last()) else {
        return String::new();
    };
    if first.name == last.name {
        format!("{} files around {} ({})", group.len(), first.name, confidence)
    } else {
        format!("{} files: {} → {} ({})", group.len(), first.name, last.name, confidence)
    }
}

fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

fn to_set(id: String, label: String, group: &[RawFileInfo], score: f64, confidence: Confidence) -> SuggestedSet {
    SuggestedSet {
        id,
        label,
        count: group.len(),
        confidence,
        score: round3(score),
        files: group.iter().map(|f| f.path.display().to_string()).collect(),
    }
}

/// Window of `size` consecutive files with the smallest timestamp span; the first wins ties.
fn tightest_window(infos: &[RawFileInfo], size: usize) -> &[RawFileInfo] {
    let mut best_start = 0;
    let mut best_span = f64::INFINITY;
    for (start, window) in infos.windows(size).enumerate() {
        let span = window[size - 1].mtime - window[0].mtime;
        if span < best_span {
            best_span = span;
            best_start = start;
        }
    }
    &infos[best_start..best_start + size]
}

/// Suggests bracket sets from files already sorted by `(mtime, lowercase name)`.
pub fn suggest_from_infos(infos: &[RawFileInfo], config: &GroupingConfig) -> Vec<SuggestedSet> {
    if infos.is_empty() {
        return Vec::new();
    }

    let mut suggestions: Vec<SuggestedSet> = split_by_time(infos, config.max_gap)
        .iter()
        .filter(|group| group.len() >= config.min_size)
        .enumerate()
        .map(|(index, group)| {
            let score = score_group(group, config.max_gap);
            let confidence = confidence_from_score(score);
            let label = label_for_group(group, confidence);
            to_set(format!("set-{}", index + 1), label, group, score, confidence)
        })
        .collect();

    suggestions.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.count.cmp(&a.count))
            .then_with(|| a.id.cmp(&b.id))
    });

    if !suggestions.is_empty() || infos.len() < config.min_size {
        return suggestions;
    }

    let size = config.min_size.max(2).min(infos.len().min(5));
    let window = tightest_window(infos, size);
    let score = (score_group(window, config.max_gap) * 0.85).max(0.4);
    let confidence = confidence_from_score(score);
    let label = format!(
        "Fallback set: {} → {} ({})",
        window[0].name,
        window[size - 1].name,
        confidence
    );
    debug!("No time-split group survived, falling back to {} files", size);
    vec![to_set("set-fallback".to_string(), label, window, score, confidence)]
}

/// Stats `paths` and suggests bracket sets. Paths that cannot be stat'ed are skipped.
#[instrument(skip_all, fields(files = paths.len(), max_gap = config.max_gap, min_size = config.min_size))]
pub fn suggest_sets<P: AsRef<Path>>(paths: &[P], config: &GroupingConfig) -> Vec<SuggestedSet> {
    let mut infos: Vec<RawFileInfo> = paths
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
            let mtime = std::fs::metadata(&absolute)
                .and_then(|meta| meta.modified())
                .map(|time| match time.duration_since(UNIX_EPOCH) {
                    Ok(d) => d.as_secs_f64(),
                    Err(e) => -e.duration().as_secs_f64(),
                });
            match mtime {
                Ok(mtime) => Some(RawFileInfo::new(absolute, mtime)),
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    infos.sort_by(|a, b| {
        a.mtime
            .total_cmp(&b.mtime)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let sets = suggest_from_infos(&infos, config);
    info!(files = infos.len(), sets = sets.len(), "Suggested bracket sets");
    sets
}
