use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use tempstats::compute::{ComputeSession, HostBackend, KernelName};
use tempstats::config::Settings;
use tempstats::models::RunReport;
use tempstats::processors::StatisticsPipeline;
use tempstats::readers::{MalformedPolicy, RecordLoader};
use tempstats::{Result, StatsError};

fn write_readings(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    for line in lines {
        writeln!(file, "{}", line).expect("Failed to write reading");
    }
    file
}

fn analyze(path: &Path, loader: RecordLoader, work_group_size: usize) -> Result<RunReport> {
    let loaded = loader.load(path)?;
    let mut session = ComputeSession::new(HostBackend::new(2)?);
    let report = StatisticsPipeline::new(work_group_size).run(&mut session, &loaded.series, None)?;
    Ok(report.with_skipped_records(loaded.diagnostics))
}

#[test]
fn test_padding_does_not_bias_min_max_mean() {
    let file = write_readings(&["10.00", "20.00", "30.00"]);
    let report = analyze(file.path(), RecordLoader::new(), 4).unwrap();

    assert_eq!(report.dataset.records, 3);
    assert_eq!(report.dataset.padded_len, 4);
    assert_eq!(report.statistics.min, 10.0);
    assert_eq!(report.statistics.max, 30.0);
    assert_eq!(report.statistics.mean, 20.0);
}

#[test]
fn test_quartiles_after_sort() {
    let file = write_readings(&["5", "1", "3", "2", "4"]);
    let report = analyze(file.path(), RecordLoader::new(), 4).unwrap();

    assert_eq!(report.statistics.median, 4.0);
    assert_eq!(report.statistics.q1, 2.0);
    assert_eq!(report.statistics.q3, 5.0);
}

#[test]
fn test_aligned_input_needs_no_padding() {
    let lines: Vec<String> = (1..=8).map(|i| format!("{}.50", i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let file = write_readings(&refs);

    let report = analyze(file.path(), RecordLoader::new(), 4).unwrap();
    assert_eq!(report.dataset.pad_count, 0);
    assert_eq!(report.dataset.work_groups, 2);
    assert_eq!(report.statistics.min, 1.5);
    assert_eq!(report.statistics.max, 8.5);
    assert_eq!(report.statistics.mean, 5.0);
}

#[test]
fn test_mmap_and_buffered_loading_agree() {
    let file = write_readings(&["STAID 1 -3.25", "", "STAID 1 7.75", "STAID 1 0.5"]);

    let buffered = RecordLoader::new().load(file.path()).unwrap();
    let mapped = RecordLoader::new().with_mmap(true).load(file.path()).unwrap();

    assert_eq!(buffered.series.to_raw(), vec![-325, 775, 50]);
    assert_eq!(mapped.series.to_raw(), buffered.series.to_raw());
}

#[test]
fn test_missing_input_is_source_unavailable() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let err = RecordLoader::new()
        .load(&dir.path().join("absent.txt"))
        .unwrap_err();
    assert!(matches!(err, StatsError::SourceUnavailable { .. }));
}

#[test]
fn test_malformed_line_aborts_by_default() {
    let file = write_readings(&["1.00", "warm", "3.00"]);
    let err = analyze(file.path(), RecordLoader::new(), 4).unwrap_err();
    assert!(matches!(err, StatsError::MalformedRecord { line: 2, .. }));
}

#[test]
fn test_skip_policy_reports_skipped_lines() {
    let file = write_readings(&["1.00", "warm", "3.00"]);
    let loader = RecordLoader::new().with_policy(MalformedPolicy::Skip);
    let report = analyze(file.path(), loader, 4).unwrap();

    assert_eq!(report.dataset.records, 2);
    assert_eq!(report.statistics.mean, 2.0);
    assert_eq!(report.skipped_records.len(), 1);
    assert_eq!(report.skipped_records[0].line, 2);
    assert_eq!(report.skipped_records[0].content, "warm");
}

#[test]
fn test_empty_file_is_rejected() {
    let file = write_readings(&[]);
    let err = analyze(file.path(), RecordLoader::new(), 4).unwrap_err();
    assert!(matches!(err, StatsError::EmptyDataset));
}

#[test]
fn test_settings_file_drives_run() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = dir.path().join("tempstats.toml");
    std::fs::write(
        &config_path,
        "work_group_size = 2\nthreads = 1\nmalformed = \"skip\"\nuse_mmap = true\n",
    )
    .unwrap();

    let settings = Settings::load(Some(&config_path)).unwrap();
    assert_eq!(settings.work_group_size, 2);
    assert_eq!(settings.malformed, MalformedPolicy::Skip);

    let file = write_readings(&["4.00", "n/a", "8.00", "6.00"]);
    let loader = RecordLoader::new()
        .with_policy(settings.malformed)
        .with_mmap(settings.use_mmap);
    let report = analyze(file.path(), loader, settings.work_group_size).unwrap();

    assert_eq!(report.dataset.padded_len, 4);
    assert_eq!(report.statistics.mean, 6.0);
    assert_eq!(report.skipped_records.len(), 1);
}

#[test]
fn test_report_serializes_with_kernel_timings() {
    let file = write_readings(&["10.00", "20.00", "30.00"]);
    let report = analyze(file.path(), RecordLoader::new(), 2).unwrap();

    let kernels: Vec<KernelName> = report.timings.iter().map(|t| t.kernel).collect();
    assert_eq!(
        kernels,
        vec![
            KernelName::MinReduce,
            KernelName::MaxReduce,
            KernelName::SumReduce,
            KernelName::VarianceReduce,
            KernelName::SelectionSort,
        ]
    );
    assert!(report.timings.iter().all(|t| t.seconds >= 0.0));

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["statistics"]["max"], 30.0);
    assert_eq!(json["timings"][4]["kernel"], "selectionSort");
    assert!(report.summary().contains("Total run time"));
}
