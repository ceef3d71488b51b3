use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowcol_store::{
    import_csv, Address, Dataset, DigestFileVerifier, ImportOptions, Layout, MetadataSource, OpenOptions,
    StoreError, INCOMPLETE_MARKER, METADATA_FILE,
};

fn imported(dir: &Path) -> PathBuf {
    let csv = dir.join("t.csv");
    fs::write(&csv, "a,b\n1,x\n2,y\n3,z\n").expect("write csv");
    let target = dir.join("t");
    import_csv(&csv, &target, MetadataSource::Infer, &ImportOptions::default()).expect("import");
    target
}

#[test]
fn missing_cell_is_detected_on_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = imported(dir.path());
    let layout = Layout::new(&root, 1000);
    fs::remove_file(layout.resolve("b", 1)).expect("remove cell");

    let err = Dataset::open(&root).expect_err("hole in column b");
    match err {
        StoreError::RowMisalignment { column, .. } => assert_eq!(column, "b"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn extra_cell_is_detected_by_cursor_without_open_walk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = imported(dir.path());
    let layout = Layout::new(&root, 1000);
    fs::write(layout.resolve("a", 3), "4\n").expect("extra cell");

    let options = OpenOptions {
        verify_alignment: false,
        ..OpenOptions::default()
    };
    let dataset = Dataset::open_with(&root, &options).expect("open without walk");
    assert_eq!(dataset.row_count(), 3);

    let results: Vec<_> = dataset.cursor("a").expect("cursor").collect();
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(Result::is_ok));
    assert!(matches!(
        results[3],
        Err(StoreError::RowMisalignment { .. })
    ));

    assert!(matches!(
        dataset.verify(),
        Err(StoreError::RowMisalignment { .. })
    ));
}

#[test]
fn truncated_cell_is_an_error_not_a_null() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = dir.path().join("n.csv");
    fs::write(&csv, "a\n1\n2\n3\n").expect("write csv");
    let root = dir.path().join("n");
    import_csv(&csv, &root, MetadataSource::Infer, &ImportOptions::default()).expect("import");
    let layout = Layout::new(&root, 1000);
    fs::write(layout.resolve("a", 1), "").expect("empty cell");

    let dataset = Dataset::open(&root).expect("alignment is fine");
    let results: Vec<_> = dataset.cursor("a").expect("cursor").collect();
    assert!(matches!(results[0], Ok(ref cell) if cell.raw == "1"));
    match &results[1] {
        Err(StoreError::StorageIo { address, source }) => {
            assert_eq!(
                *address,
                Address::Cell {
                    column: "a".to_owned(),
                    row: 1
                }
            );
            assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // A cut-off value is rejected the same way.
    fs::write(layout.resolve("a", 2), "3").expect("short cell");
    assert!(matches!(
        layout.read_cell("a", 2),
        Err(StoreError::StorageIo { .. })
    ));
    assert!(matches!(
        dataset.row(2),
        Err(StoreError::StorageIo { .. })
    ));
}

#[test]
fn stray_directory_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = imported(dir.path());
    fs::create_dir(root.join("c")).expect("stray column");
    assert!(matches!(
        Dataset::open(&root),
        Err(StoreError::RowMisalignment { .. })
    ));
}

#[test]
fn corrupted_cell_reports_type_mismatch_at_read_time() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = imported(dir.path());
    let layout = Layout::new(&root, 1000);
    fs::write(layout.resolve("a", 2), "three\n").expect("corrupt");

    let dataset = Dataset::open(&root).expect("alignment is fine");
    let err = dataset
        .cursor("a")
        .expect("cursor")
        .find_map(Result::err)
        .expect("bad cell");
    assert!(
        matches!(err, StoreError::TypeMismatch { row: 2, .. }),
        "{err}"
    );
}

#[test]
fn incomplete_marker_blocks_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = imported(dir.path());
    fs::write(root.join(INCOMPLETE_MARKER), b"").expect("marker");
    assert!(matches!(
        Dataset::open(&root),
        Err(StoreError::IncompleteImport { .. })
    ));
}

#[test]
fn integrity_gate_runs_before_reading() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = imported(dir.path());
    let options = OpenOptions {
        integrity: Some(Arc::new(DigestFileVerifier)),
        ..OpenOptions::default()
    };

    let err = Dataset::open_with(&root, &options).expect_err("unsigned");
    assert!(matches!(err, StoreError::IntegrityCheckFailed { .. }), "{err}");

    let metadata_path = root.join(METADATA_FILE);
    DigestFileVerifier::sign(&metadata_path).expect("sign");
    let dataset = Dataset::open_with(&root, &options).expect("verified open");
    assert_eq!(dataset.row_count(), 3);

    let tampered = fs::read_to_string(&metadata_path)
        .expect("read")
        .replace("\"row_count\": 3", "\"row_count\": 4");
    fs::write(&metadata_path, tampered).expect("tamper");
    assert!(matches!(
        Dataset::open_with(&root, &options),
        Err(StoreError::IntegrityCheckFailed { .. })
    ));
}

#[test]
fn stale_row_count_in_metadata_is_a_misalignment() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = imported(dir.path());
    let metadata_path = root.join(METADATA_FILE);
    let text = fs::read_to_string(&metadata_path)
        .expect("read")
        .replace("\"row_count\": 3", "\"row_count\": 5");
    fs::write(&metadata_path, text).expect("write");

    assert!(matches!(
        Dataset::open(&root),
        Err(StoreError::RowMisalignment { .. })
    ));
}
