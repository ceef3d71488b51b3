use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rowcol_store::{
    export_csv, import_csv, ColumnMeta, ColumnType, Dataset, ExportOptions, ImportOptions,
    InferenceIssue, Metadata, MetadataSource, StoreError, Value, INCOMPLETE_MARKER, METADATA_FILE, SOURCE_FILE,
};

const PEOPLE: &str = "name,age,score,active\n\
alice,31,88.5,yes\n\
\"bob, jr\",,72,no\n\
carol,45,,\n\
\"dan \"\"the man\"\"\",19,91.25,yes\n";

fn write_csv(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write csv");
    path
}

fn export_to_string(dataset: &Dataset) -> String {
    let mut out = Vec::new();
    export_csv(dataset, &mut out, &ExportOptions::default()).expect("export");
    String::from_utf8(out).expect("utf8 export")
}

#[test]
fn inferred_import_round_trips_through_export() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "people.csv", PEOPLE);
    let target = dir.path().join("people");

    let summary = import_csv(&csv, &target, MetadataSource::Infer, &ImportOptions::default())
        .expect("import");
    assert_eq!(summary.rows, 4);
    assert!(summary.report.as_ref().is_some_and(|r| r.is_clean()));
    let types: Vec<ColumnType> = summary.metadata.columns.iter().map(|c| c.column_type).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::ShortString,
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::Boolean
        ]
    );

    assert!(target.join(METADATA_FILE).is_file());
    assert!(target.join(SOURCE_FILE).is_file());
    assert!(!target.join(INCOMPLETE_MARKER).exists());

    let dataset = Dataset::open(&target).expect("open");
    assert_eq!(dataset.row_count(), 4);
    assert_eq!(export_to_string(&dataset), PEOPLE);
}

#[test]
fn cursors_yield_typed_values_in_row_order() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "people.csv", PEOPLE);
    let target = dir.path().join("people");
    import_csv(&csv, &target, MetadataSource::Infer, &ImportOptions::default()).expect("import");
    let dataset = Dataset::open(&target).expect("open");

    let ages: Vec<Value> = dataset
        .cursor("age")
        .expect("cursor")
        .map(|cell| cell.expect("cell").value)
        .collect();
    assert_eq!(
        ages,
        vec![Value::Integer(31), Value::Null, Value::Integer(45), Value::Integer(19)]
    );

    let mut cursor = dataset.cursor("active").expect("cursor");
    assert_eq!(cursor.by_ref().count(), 4);
    assert_eq!(cursor.stats().passes, 1);
    cursor.reset();
    let first = cursor.next_cell().expect("read").expect("row 0");
    assert_eq!(first.row, 0);
    assert_eq!(first.value, Value::Boolean(true));
    assert_eq!(cursor.stats().cells_read, 5);

    let rows: Vec<(u64, String, String)> = dataset
        .aligned(&["name", "score"])
        .expect("aligned")
        .map(|row| {
            let row = row.expect("row");
            (row.row, row.cells[0].raw.clone(), row.cells[1].raw.clone())
        })
        .collect();
    assert_eq!(rows[1], (1, "bob, jr".to_owned(), "72".to_owned()));
    assert_eq!(rows[2], (2, "carol".to_owned(), String::new()));

    let row = dataset.row(3).expect("row 3");
    assert_eq!(row[0], ("name".to_owned(), "dan \"the man\"".to_owned()));
    assert!(matches!(
        dataset.row(4),
        Err(StoreError::RowOutOfRange { row: 4, rows: 4 })
    ));
}

#[test]
fn small_groups_spread_rows_over_directories() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut text = String::from("n\n");
    for i in 0..25 {
        text.push_str(&format!("{i}\n"));
    }
    let csv = write_csv(dir.path(), "n.csv", &text);
    let target = dir.path().join("n");
    let options = ImportOptions {
        rows_per_group: 10,
        ..ImportOptions::default()
    };
    import_csv(&csv, &target, MetadataSource::Infer, &options).expect("import");

    let groups = fs::read_dir(target.join("n")).expect("column dir").count();
    assert_eq!(groups, 3);

    let dataset = Dataset::open(&target).expect("open");
    let values: Vec<i64> = dataset
        .cursor("n")
        .expect("cursor")
        .map(|cell| match cell.expect("cell").value {
            Value::Integer(v) => v,
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(values, (0..25).collect::<Vec<_>>());
}

#[test]
fn type_violation_aborts_without_leaving_a_store() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "bad.csv", "id,label\n1,a\n2,b\nthree,c\n");
    let target = dir.path().join("bad");
    let metadata = Metadata::new(vec![
        ColumnMeta::new("id", ColumnType::Integer),
        ColumnMeta::new("label", ColumnType::ShortString),
    ]);

    let err = import_csv(
        &csv,
        &target,
        MetadataSource::Explicit(metadata),
        &ImportOptions::default(),
    )
    .expect_err("row 2 is not an integer");
    match err {
        StoreError::TypeMismatch {
            column, row, text, ..
        } => {
            assert_eq!(column, "id");
            assert_eq!(row, 2);
            assert_eq!(text, "three");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!target.exists());
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .expect("list")
        .map(|e| e.expect("entry").file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("bad.csv")]);
}

#[test]
fn value_longer_than_declared_limit_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "s.csv", "code\nab\nabcdef\n");
    let mut column = ColumnMeta::new("code", ColumnType::ShortString);
    column.facts.max_length = 4;

    let err = import_csv(
        &csv,
        &dir.path().join("s"),
        MetadataSource::Explicit(Metadata::new(vec![column])),
        &ImportOptions::default(),
    )
    .expect_err("too long");
    assert!(
        matches!(err, StoreError::ValueTooLong { row: 1, len: 6, max: 4, .. }),
        "{err}"
    );
}

#[test]
fn ragged_record_is_a_misalignment() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "r.csv", "a,b\n1,2\n3\n");
    let err = import_csv(
        &csv,
        &dir.path().join("r"),
        MetadataSource::Infer,
        &ImportOptions::default(),
    )
    .expect_err("ragged");
    assert!(matches!(err, StoreError::RowMisalignment { .. }), "{err}");
}

#[test]
fn build_failures_keep_input_errors_and_wrap_storage_errors() {
    let dir = tempfile::tempdir().expect("temp dir");
    let metadata = || {
        MetadataSource::Explicit(Metadata::new(vec![
            ColumnMeta::new("a", ColumnType::Integer),
            ColumnMeta::new("b", ColumnType::Integer),
        ]))
    };

    let csv = write_csv(dir.path(), "r.csv", "a,b\n1,2\n3\n");
    let err = import_csv(&csv, &dir.path().join("r"), metadata(), &ImportOptions::default())
        .expect_err("ragged");
    assert!(matches!(err, StoreError::RowMisalignment { .. }), "{err}");

    // Reading a directory as the csv input fails with an I/O error mid-build.
    #[cfg(unix)]
    {
        let not_a_file = dir.path().join("in-dir");
        fs::create_dir(&not_a_file).expect("mkdir");
        let target = dir.path().join("d");
        let err = import_csv(&not_a_file, &target, metadata(), &ImportOptions::default())
            .expect_err("unreadable input");
        match err {
            StoreError::IncompleteImport { path, reason } => {
                assert_eq!(path, target);
                assert!(reason.contains("storage I/O failure"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!target.exists());
    }

    let mut leftovers: Vec<_> = fs::read_dir(dir.path())
        .expect("list")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    leftovers.sort();
    assert!(leftovers.iter().all(|n| !n.contains(".importing-")), "{leftovers:?}");
}

#[test]
fn header_row_is_detected_when_not_given() {
    let dir = tempfile::tempdir().expect("temp dir");

    let numbers = write_csv(dir.path(), "numbers.csv", "1,2.5\n3,4.5\n5,6.5\n");
    let summary = import_csv(
        &numbers,
        &dir.path().join("numbers"),
        MetadataSource::Infer,
        &ImportOptions::default(),
    )
    .expect("import numbers");
    assert_eq!(summary.rows, 3);
    let names: Vec<&str> = summary.metadata.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Column1", "Column2"]);
    assert!(summary.report.as_ref().is_some_and(|r| r.is_clean()));
    let dataset = Dataset::open(&summary.root).expect("open numbers");
    assert_eq!(
        dataset.row(0).expect("row 0"),
        vec![
            ("Column1".to_owned(), "1".to_owned()),
            ("Column2".to_owned(), "2.5".to_owned())
        ]
    );

    let words = write_csv(dir.path(), "words.csv", "left,right\nup,down\n");
    let summary = import_csv(
        &words,
        &dir.path().join("words"),
        MetadataSource::Infer,
        &ImportOptions::default(),
    )
    .expect("import words");
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.metadata.columns[0].name, "left");
    let report = summary.report.expect("report");
    assert_eq!(report.issues, vec![InferenceIssue::HeaderAssumed]);

    let summary = import_csv(
        &words,
        &dir.path().join("words-no-header"),
        MetadataSource::Infer,
        &ImportOptions {
            has_header: Some(false),
            ..ImportOptions::default()
        },
    )
    .expect("import words without header");
    assert_eq!(summary.rows, 2);
    assert!(summary.report.as_ref().is_some_and(|r| r.is_clean()));
}

#[test]
fn existing_target_is_never_overwritten() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "p.csv", PEOPLE);
    let target = dir.path().join("p");
    fs::create_dir(&target).expect("pre-existing target");

    let err = import_csv(&csv, &target, MetadataSource::Infer, &ImportOptions::default())
        .expect_err("target exists");
    assert!(matches!(err, StoreError::TargetExists(_)));
    assert_eq!(fs::read_dir(&target).expect("list").count(), 0);
}

#[test]
fn metadata_file_drives_the_import() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "m.csv", "price\n1,5\n2,25\n");
    let meta_path = dir.path().join("m.json");
    fs::write(
        &meta_path,
        r#"{
  "columns": [
    { "name": "price", "type": "float", "nullable": false, "facts": { "decimal_separator": "," } }
  ]
}
"#,
    )
    .expect("write metadata");

    let options = ImportOptions {
        delimiter: b';',
        ..ImportOptions::default()
    };
    let target = dir.path().join("m");
    import_csv(&csv, &target, MetadataSource::File(meta_path), &options).expect("import");

    let dataset = Dataset::open(&target).expect("open");
    let values: Vec<Value> = dataset
        .cursor("price")
        .expect("cursor")
        .map(|c| c.expect("cell").value)
        .collect();
    assert_eq!(values, vec![Value::Float(1.5), Value::Float(2.25)]);
}

fn tree_snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).expect("list") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let rel = path
                    .strip_prefix(root)
                    .expect("under root")
                    .to_string_lossy()
                    .into_owned();
                out.push((rel, fs::read(&path).expect("read")));
            }
        }
    }
    out.sort();
    out
}

#[test]
fn importing_the_same_input_twice_gives_identical_trees() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "people.csv", PEOPLE);
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    import_csv(&csv, &a, MetadataSource::Infer, &ImportOptions::default()).expect("import a");
    import_csv(&csv, &b, MetadataSource::Infer, &ImportOptions::default()).expect("import b");
    assert_eq!(tree_snapshot(&a), tree_snapshot(&b));
}

#[test]
fn column_names_needing_escapes_survive() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = write_csv(dir.path(), "e.csv", "a/b,_hidden,50%\nx,y,z\n");
    let target = dir.path().join("e");
    import_csv(&csv, &target, MetadataSource::Infer, &ImportOptions::default()).expect("import");

    let dataset = Dataset::open(&target).expect("open");
    let names: Vec<&str> = dataset.column_names().collect();
    assert_eq!(names, vec!["a/b", "_hidden", "50%"]);
    assert_eq!(export_to_string(&dataset), "a/b,_hidden,50%\nx,y,z\n");
}
