use std::fs::File;
use std::time::{Duration, SystemTime};

use crate::image_pipeline::grouping::*;

fn info(name: &str, mtime: f64) -> RawFileInfo {
    RawFileInfo::new(format!("/shots/{name}"), mtime)
}

#[test]
fn test_config_builder() {
    let config = GroupingConfig::builder().max_gap(5.0).build();
    assert_eq!(config.max_gap, 5.0);
    assert_eq!(config.min_size, 2);

    let default = GroupingConfig::default();
    assert_eq!(default.max_gap, 30.0);
}

#[test]
fn test_common_alpha_prefix() {
    assert_eq!(common_alpha_prefix(&["DSC_0001.ARW", "DSC_0002.ARW"]), "dsc");
    assert_eq!(common_alpha_prefix(&["IMG-12.cr2", "img-13.CR2"]), "img");
    assert_eq!(common_alpha_prefix(&["abc1.raw", "abd2.raw"]), "ab");
    assert_eq!(common_alpha_prefix(&["0001.raw", "0002.raw"]), "");
    assert_eq!(common_alpha_prefix::<&str>(&[]), "");
    assert_eq!(common_alpha_prefix(&["a_b1.raw", "a_c1.raw"]), "a");
}

#[test]
fn test_split_by_time() {
    let infos = [info("a", 0.0), info("b", 10.0), info("c", 40.0), info("d", 100.0)];
    let groups = split_by_time(&infos, 30.0);
    let sizes: Vec<usize> = groups.iter().map(Vec::len).collect();
    assert_eq!(sizes, [3, 1]);
    assert!(split_by_time(&[], 30.0).is_empty());
}

#[test]
fn test_score_group() {
    let group = [
        info("DSC_01.ARW", 0.0),
        info("DSC_02.ARW", 1.0),
        info("DSC_03.ARW", 2.0),
        info("DSC_04.ARW", 3.0),
        info("DSC_05.ARW", 4.0),
        info("DSC_06.ARW", 5.0),
    ];
    // size 1.0, gap 1 - 1/30, prefix 1.0
    let expected = 0.35 + 0.30 + 0.20 * (1.0 - 1.0 / 30.0) + 0.15;
    assert!((score_group(&group, 30.0) - expected).abs() < 1e-12);

    // two unrelated names a full gap apart
    let pair = [info("1.raw", 0.0), info("2.raw", 30.0)];
    assert!((score_group(&pair, 30.0) - 0.35).abs() < 1e-12);
    assert!((score_group(&pair[..1], 30.0) - 0.35).abs() < 1e-12);
    assert_eq!(score_group(&[], 30.0), 0.0);
}

#[test]
fn test_confidence_thresholds() {
    assert_eq!(confidence_from_score(0.75), Confidence::High);
    assert_eq!(confidence_from_score(0.7499), Confidence::Medium);
    assert_eq!(confidence_from_score(0.55), Confidence::Medium);
    assert_eq!(confidence_from_score(0.5), Confidence::Low);
}

#[test]
fn test_labels() {
    let group = [info("a.raw", 0.0), info("b.raw", 1.0)];
    assert_eq!(label_for_group(&group, Confidence::High), "2 files: a.raw → b.raw (high)");
    assert_eq!(label_for_group(&group[..1], Confidence::Low), "1 files around a.raw (low)");
    assert_eq!(label_for_group(&[], Confidence::Low), "");
}

#[test]
fn test_sets_sorted_by_score() {
    let infos = [
        info("x1.raw", 0.0),
        info("y2.raw", 20.0),
        info("DSC_1.ARW", 100.0),
        info("DSC_2.ARW", 101.0),
        info("DSC_3.ARW", 102.0),
        info("lonely.raw", 500.0),
    ];
    let sets = suggest_from_infos(&infos, &GroupingConfig::default());

    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].id, "set-2");
    assert_eq!(sets[0].count, 3);
    assert_eq!(sets[0].files[0], "/shots/DSC_1.ARW");
    assert_eq!(sets[1].id, "set-1");
    assert!(sets[0].score > sets[1].score);
    assert_eq!(sets[0].score, (sets[0].score * 1000.0).round() / 1000.0);
}

#[test]
fn test_fallback_picks_tightest_window() {
    let infos = [
        info("a.raw", 0.0),
        info("b.raw", 100.0),
        info("c.raw", 150.0),
        info("d.raw", 300.0),
    ];
    let sets = suggest_from_infos(&infos, &GroupingConfig::builder().max_gap(10.0).build());

    assert_eq!(sets.len(), 1);
    let set = &sets[0];
    assert_eq!(set.id, "set-fallback");
    assert_eq!(set.count, 2);
    assert_eq!(set.files, ["/shots/b.raw", "/shots/c.raw"]);
    assert_eq!(set.score, 0.4);
    assert_eq!(set.confidence, Confidence::Low);
    assert_eq!(set.label, "Fallback set: b.raw → c.raw (low)");
}

#[test]
fn test_too_few_files_for_fallback() {
    let infos = [info("a.raw", 0.0), info("b.raw", 100.0)];
    let config = GroupingConfig::builder().max_gap(10.0).min_size(3).build();
    assert!(suggest_from_infos(&infos, &config).is_empty());
    assert!(suggest_from_infos(&[], &GroupingConfig::default()).is_empty());
}

#[test]
fn test_set_serializes_lowercase_confidence() {
    let infos = [info("a.raw", 0.0), info("b.raw", 1.0)];
    let sets = suggest_from_infos(&infos, &GroupingConfig::default());
    let json = serde_json::to_value(&sets[0]).unwrap();
    assert_eq!(json["id"], "set-1");
    assert_eq!(json["count"], 2);
    assert_eq!(json["confidence"], sets[0].confidence.name());
    assert_eq!(json["files"][1], "/shots/b.raw");
}

#[test]
fn test_suggest_sets_reads_mtimes() {
    let dir = tempfile::tempdir().unwrap();
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let offsets = [("IMG_0003.CR2", 2), ("IMG_0001.CR2", 0), ("IMG_0002.CR2", 1), ("other.CR2", 3600)];
    let mut paths = Vec::new();
    for (name, offset) in offsets {
        let path = dir.path().join(name);
        let file = File::create(&path).unwrap();
        file.set_modified(base + Duration::from_secs(offset)).unwrap();
        paths.push(path);
    }
    paths.push(dir.path().join("missing.CR2"));

    let sets = suggest_sets(&paths, &GroupingConfig::default());

    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].count, 3);
    let names: Vec<&str> = sets[0]
        .files
        .iter()
        .map(|f| f.rsplit(['/', '\\']).next().unwrap())
        .collect();
    assert_eq!(names, ["IMG_0001.CR2", "IMG_0002.CR2", "IMG_0003.CR2"]);
}
