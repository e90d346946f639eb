//! Tests for output scanning and classification

use super::*;
use crate::config::MANIFEST_NAME;
use crate::partition::{partition, InputPattern, PoolId, StreamJob};

use std::path::Path;

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_classification_thresholds() {
    assert_eq!(TestResult::from_counts(100, 96).classification, Classification::Pass);
    assert_eq!(TestResult::from_counts(100, 95).classification, Classification::Pass);
    assert_eq!(TestResult::from_counts(100, 94).classification, Classification::Marginal);
    assert_eq!(TestResult::from_counts(100, 88).classification, Classification::Marginal);
    assert_eq!(TestResult::from_counts(100, 85).classification, Classification::Marginal);
    assert_eq!(TestResult::from_counts(100, 84).classification, Classification::Fail);
    assert_eq!(TestResult::from_counts(100, 70).classification, Classification::Fail);
}

#[test]
fn test_nothing_expected_fails() {
    let result = TestResult::from_counts(0, 0);
    assert_eq!(result.success_rate, 0.0);
    assert_eq!(result.classification, Classification::Fail);
    assert!(!result.classification.is_success());
}

#[test]
fn test_only_pass_is_success() {
    assert!(Classification::Pass.is_success());
    assert!(!Classification::Marginal.is_success());
    assert_eq!(Classification::Marginal.to_string(), "MARGINAL");
    assert_eq!(
        serde_json::to_string(&Classification::Fail).unwrap(),
        "\"FAIL\""
    );
}

// ============================================================================
// Output scan
// ============================================================================

fn jobs(root: &Path, n: u32) -> [StreamJob; 2] {
    partition(n, root, &InputPattern::default(), &root.join("output")).unwrap()
}

fn write_manifest(job: &StreamJob, index: u32, content: &[u8]) {
    let dir = job.stream_dir(index);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(MANIFEST_NAME), content).unwrap();
}

#[test]
fn test_scan_counts_only_non_empty_manifests() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 50);

    for index in jobs[0].range.iter() {
        write_manifest(&jobs[0], index, b"#EXTM3U\n");
    }
    // 46 of 50 in the second pool; one of the missing four is an empty file
    for index in jobs[1].range.iter().take(46) {
        write_manifest(&jobs[1], index, b"#EXTM3U\n");
    }
    write_manifest(&jobs[1], 97, b"");
    std::fs::write(jobs[1].stream_dir(46 + 51).join("segment000.ts"), vec![0u8; 1000]).unwrap();

    let result = ResultAnalyzer::new(MANIFEST_NAME).analyze(&jobs);
    assert_eq!(result.expected, 100);
    assert_eq!(result.valid, 96);
    assert_eq!(result.classification, Classification::Pass);

    assert_eq!(result.pools[0].pool, PoolId::Nvenc1);
    assert_eq!(result.pools[0].successful, 50);
    assert_eq!(result.pools[1].successful, 46);
    assert_eq!(result.pools[1].failed, 4);
    assert!((result.pools[1].success_rate() - 0.92).abs() < 1e-9);

    // Bytes and segments from the empty-manifest stream are not counted
    assert_eq!(result.output_bytes, 96 * 8);
    assert_eq!(result.segments, 0);
}

#[test]
fn test_scan_counts_segments() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 2);

    for (index, segments) in [(1, 3), (2, 5), (3, 4)] {
        let job = if jobs[0].range.contains(index) { &jobs[0] } else { &jobs[1] };
        write_manifest(job, index, b"#EXTM3U\n");
        let stream = job.stream_dir(index);
        for n in 0..segments {
            std::fs::write(stream.join(format!("segment{n:03}.ts")), b"seg").unwrap();
        }
        std::fs::write(stream.join("segment.tmp"), b"partial").unwrap();
    }
    // segments without a manifest do not count
    let orphan = jobs[1].stream_dir(4);
    std::fs::create_dir_all(&orphan).unwrap();
    std::fs::write(orphan.join("segment000.ts"), b"seg").unwrap();

    let result = ResultAnalyzer::new(MANIFEST_NAME).analyze(&jobs);
    assert_eq!(result.valid, 3);
    assert_eq!(result.pools[0].segments, 8);
    assert_eq!(result.pools[0].avg_segments_per_playlist(), 4.0);
    assert_eq!(result.pools[1].segments, 4);
    assert_eq!(result.segments, 12);
    assert_eq!(result.avg_segments_per_playlist(), 4.0);
    assert_eq!(TestResult::from_counts(10, 0).avg_segments_per_playlist(), 0.0);
}

fn write_first(jobs: &[StreamJob; 2], count: u32) {
    for index in 1..=count {
        let job = if jobs[0].range.contains(index) { &jobs[0] } else { &jobs[1] };
        write_manifest(job, index, b"#EXTM3U\n");
    }
}

#[test]
fn test_scan_marginal() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 50);
    write_first(&jobs, 88);

    let result = ResultAnalyzer::new(MANIFEST_NAME).analyze(&jobs);
    assert_eq!(result.valid, 88);
    assert_eq!(result.classification, Classification::Marginal);
}

#[test]
fn test_scan_fail() {
    let dir = tempfile::tempdir().unwrap();
    let jobs = jobs(dir.path(), 50);
    write_first(&jobs, 70);

    let result = ResultAnalyzer::new(MANIFEST_NAME).analyze(&jobs);
    assert_eq!(result.valid, 70);
    assert_eq!(result.pools[0].successful, 50);
    assert_eq!(result.pools[1].successful, 20);
    assert_eq!(result.classification, Classification::Fail);
}

#[test]
fn test_scan_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let result = ResultAnalyzer::new(MANIFEST_NAME).analyze(&jobs(dir.path(), 5));
    assert_eq!(result.expected, 10);
    assert_eq!(result.valid, 0);
    assert_eq!(result.output_bytes, 0);
    assert_eq!(result.classification, Classification::Fail);
}
