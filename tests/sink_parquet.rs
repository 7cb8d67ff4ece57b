mod common;

use std::fs::{self, File};
use std::path::Path;

use parquet::file::reader::{FileReader, SerializedFileReader};

use steamcarve::config::ReduceConfig;
use steamcarve::record::RecordKind;
use steamcarve::reduce;
use steamcarve::sink::{RUN_SUMMARY_FILE, SinkBackendKind};

use common::{scan_config, scan_file, three_artifact_image, write_image};

#[test]
fn parquet_table_holds_every_record() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let image_path = write_image(temp_dir.path(), &three_artifact_image());
    let (stats, run_dir) = scan_file(
        temp_dir.path(),
        &image_path,
        &scan_config(65_536, 128),
        2,
        SinkBackendKind::Parquet,
    );

    let table = run_dir.join("records.parquet");
    assert_eq!(count_rows(&table), stats.records_emitted as usize);
    assert_eq!(count_rows(&table), 3);
    for column in ["kind", "offset", "preview", "steamid", "unix_ts", "message", "value", "encoding"] {
        assert_has_column(&table, column);
    }
    assert!(run_dir.join(RUN_SUMMARY_FILE).exists());
}

#[test]
fn empty_scan_still_writes_a_readable_file() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let image_path = write_image(temp_dir.path(), &[0u8; 4096]);
    let (_, run_dir) = scan_file(
        temp_dir.path(),
        &image_path,
        &scan_config(1024, 32),
        1,
        SinkBackendKind::Parquet,
    );
    assert_eq!(count_rows(&run_dir.join("records.parquet")), 0);
}

#[test]
fn parquet_table_reduces_like_the_csv_table() {
    let image = three_artifact_image();
    let cfg = scan_config(65_536, 128);

    let parquet_dir = tempfile::tempdir().expect("tempdir");
    let image_path = write_image(parquet_dir.path(), &image);
    let (_, parquet_run) = scan_file(
        parquet_dir.path(),
        &image_path,
        &cfg,
        2,
        SinkBackendKind::Parquet,
    );
    let from_parquet = reduce::reduce_file(
        &parquet_run.join("records.parquet"),
        None,
        &ReduceConfig::default(),
    )
    .expect("reduce parquet");

    assert_eq!(from_parquet.clean_path, parquet_run.join("records_clean.csv"));
    assert_eq!(from_parquet.rows_read, 3);
    assert_eq!(from_parquet.rows_skipped, 0);
    assert_eq!(from_parquet.rows_kept, 3);
    assert_eq!(from_parquet.findings.domains[0].domain, "steamcommunity.com");
    assert_eq!(from_parquet.findings.steamids[0].steamid, 76_561_198_000_000_000);
    assert_eq!(from_parquet.findings.chats[0].message, "hello world");

    let csv_dir = tempfile::tempdir().expect("tempdir");
    let image_path = write_image(csv_dir.path(), &image);
    let (_, csv_run) = scan_file(csv_dir.path(), &image_path, &cfg, 2, SinkBackendKind::Csv);
    let from_csv = reduce::reduce_file(&csv_run.join("records.csv"), None, &ReduceConfig::default())
        .expect("reduce csv");

    assert_eq!(
        fs::read(&from_parquet.clean_path).expect("parquet clean"),
        fs::read(&from_csv.clean_path).expect("csv clean")
    );
    assert_eq!(
        fs::read(&from_parquet.findings_path).expect("parquet findings"),
        fs::read(&from_csv.findings_path).expect("csv findings")
    );

    let clean = fs::read_to_string(&from_parquet.clean_path).expect("clean");
    let kinds: Vec<&str> = clean
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .collect();
    assert_eq!(
        kinds,
        vec![
            RecordKind::Url.as_str(),
            RecordKind::Chat.as_str(),
            RecordKind::Steamid.as_str()
        ]
    );
}

fn count_rows(path: &Path) -> usize {
    let file = File::open(path).expect("open parquet");
    let reader = SerializedFileReader::new(file).expect("parquet reader");
    reader.metadata().file_metadata().num_rows() as usize
}

fn assert_has_column(path: &Path, column: &str) {
    let file = File::open(path).expect("open parquet");
    let reader = SerializedFileReader::new(file).expect("parquet reader");
    let schema = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema();
    let columns: Vec<&str> = schema
        .get_fields()
        .iter()
        .map(|field| field.name())
        .collect();
    assert!(
        columns.contains(&column),
        "expected column {column} in {} got {:?}",
        path.display(),
        columns
    );
}
