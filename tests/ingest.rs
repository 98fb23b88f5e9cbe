mod common;

use std::path::PathBuf;

use csv2table::{
    error::{Error, StorageError},
    ingest::{IngestOptions, IngestOutcome, Ingestor, RunSummary},
    io_utils,
    mapping::ColumnMapping,
    schema::SchemaChange,
    storage::{MemoryGateway, SqliteGateway, StorageGateway},
};

use common::{TestWorkspace, cells, strings};

fn completed(outcome: IngestOutcome) -> RunSummary {
    match outcome {
        IngestOutcome::Completed(summary) => summary,
        IngestOutcome::NothingToDo => panic!("expected a completed run"),
    }
}

#[test]
fn absent_table_is_created_and_short_rows_are_padded() {
    let ws = TestWorkspace::new();
    let file = ws.write_csv("a.csv", "a,b,c\n1,2,3\n4,5,\n");
    let mut gateway = MemoryGateway::new();
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");

    let summary = completed(
        Ingestor::new(&mut gateway, &mapping, &options)
            .ingest_files(&[file])
            .expect("ingest"),
    );

    assert_eq!(summary.total_rows, 2);
    assert_eq!(
        gateway.schema_changes(),
        &[(
            "t".to_string(),
            SchemaChange::Create {
                columns: strings(&["a", "b", "c"])
            }
        )]
    );
    let table = gateway.table("t").expect("table created");
    assert_eq!(table.columns(), strings(&["a", "b", "c"]).as_slice());
    assert_eq!(
        table.rows(),
        &[cells(&["1", "2", "3"]), cells(&["4", "5", ""])]
    );
}

#[test]
fn dropped_column_needs_no_schema_change_and_rows_are_truncated() {
    let ws = TestWorkspace::new();
    let file = ws.write_csv("b.csv", "a,b,c\n1,2,x\n3,4,y,extra\n");
    let mut gateway = MemoryGateway::new().with_table("t", &["a", "b"]);
    let mapping = ColumnMapping::parse("c > *\n").unwrap();
    let options = IngestOptions::new("t");

    let summary = completed(
        Ingestor::new(&mut gateway, &mapping, &options)
            .ingest_files(&[file])
            .unwrap(),
    );

    assert!(gateway.schema_changes().is_empty());
    assert_eq!(summary.files[0].schema_change, None);
    assert_eq!(summary.files[0].ragged_rows, 1);
    assert_eq!(
        gateway.table("t").unwrap().rows(),
        &[cells(&["1", "2"]), cells(&["3", "4"])]
    );
}

#[test]
fn new_columns_extend_existing_table() {
    let ws = TestWorkspace::new();
    let file = ws.write_csv("c.csv", "a,b,c,d\n1,2,3,4\n");
    let mut gateway = MemoryGateway::new().with_table("t", &["a", "b"]);
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");

    let summary = completed(
        Ingestor::new(&mut gateway, &mapping, &options)
            .ingest_files(&[file])
            .unwrap(),
    );

    assert_eq!(
        gateway.schema_changes(),
        &[(
            "t".to_string(),
            SchemaChange::Extend {
                columns: strings(&["c", "d"])
            }
        )]
    );
    assert_eq!(summary.columns.names(), strings(&["a", "b", "c", "d"]).as_slice());
}

#[test]
fn earlier_files_are_not_widened_by_later_columns() {
    let ws = TestWorkspace::new();
    ws.write_csv("02.csv", "a,b,c\n3,4,5\n");
    ws.write_csv("01.csv", "a,b\n1,2\n");
    ws.write_csv("notes.txt", "not,an,input\n");
    let files = io_utils::list_input_files(&ws.csv_dir(), "csv").unwrap();
    assert_eq!(
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>(),
        vec!["01.csv", "02.csv"]
    );

    let mut gateway = SqliteGateway::open(&ws.database()).unwrap();
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");
    let summary = completed(
        Ingestor::new(&mut gateway, &mapping, &options)
            .ingest_files(&files)
            .unwrap(),
    );

    assert_eq!(summary.total_rows, 2);
    assert_eq!(
        summary.files.iter().map(|f| f.rows).collect::<Vec<_>>(),
        vec![1, 1]
    );
    assert_eq!(
        gateway.fetch_rows("t").unwrap(),
        vec![
            vec![Some("1".to_string()), Some("2".to_string()), None],
            cells(&["3", "4", "5"]),
        ]
    );
}

#[test]
fn column_set_carries_across_files_in_memory() {
    let ws = TestWorkspace::new();
    let first = ws.write_csv("1.csv", "a,b\n1,2\n");
    let second = ws.write_csv("2.csv", "b,c\n3,4\n");
    let third = ws.write_csv("3.csv", "c,a\n5,6\n");
    let mut gateway = MemoryGateway::new();
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");

    let summary = completed(
        Ingestor::new(&mut gateway, &mapping, &options)
            .ingest_files(&[first, second, third])
            .unwrap(),
    );

    assert_eq!(summary.columns.names(), strings(&["a", "b", "c"]).as_slice());
    assert_eq!(gateway.schema_changes().len(), 2);
    assert_eq!(
        gateway.table("t").unwrap().widened_rows(),
        vec![
            vec![Some("1".to_string()), Some("2".to_string()), None],
            cells(&["", "3", "4"]),
            cells(&["6", "", "5"]),
        ]
    );
}

#[test]
fn failed_flush_aborts_run_and_keeps_committed_batches() {
    let ws = TestWorkspace::new();
    let first = ws.write_csv("1.csv", "a\n1\n2\n3\n");
    let second = ws.write_csv("2.csv", "a\n4\n5\n");
    let mut gateway = MemoryGateway::new().with_insert_failure(3);
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t").with_batch_size(2);

    let err = Ingestor::new(&mut gateway, &mapping, &options)
        .ingest_files(&[first, second.clone()])
        .unwrap_err();

    match err {
        Error::Ingest {
            file,
            first_row,
            last_row,
            ..
        } => {
            assert_eq!(file, second);
            assert_eq!((first_row, last_row), (1, 2));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(gateway.insert_batches(), &[2, 1]);
    assert_eq!(gateway.table("t").unwrap().rows().len(), 3);
}

#[test]
fn batches_are_bounded_by_batch_size() {
    let ws = TestWorkspace::new();
    let mut contents = String::from("id\n");
    for n in 0..120 {
        contents.push_str(&format!("{n}\n"));
    }
    let file = ws.write_csv("many.csv", &contents);
    let mut gateway = MemoryGateway::new();
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");

    let outcome = Ingestor::new(&mut gateway, &mapping, &options)
        .ingest_files(&[file])
        .unwrap();

    assert_eq!(outcome.total_rows(), 120);
    assert_eq!(gateway.insert_batches(), &[50, 50, 20]);
}

#[test]
fn header_only_and_empty_files_contribute_no_rows() {
    let ws = TestWorkspace::new();
    let empty = ws.write_csv("0.csv", "");
    let header_only = ws.write_csv("1.csv", "a,b\n");
    let mut gateway = MemoryGateway::new();
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");

    let summary = completed(
        Ingestor::new(&mut gateway, &mapping, &options)
            .ingest_files(&[empty, header_only])
            .unwrap(),
    );

    assert!(summary.files[0].skipped);
    assert!(!summary.files[1].skipped);
    assert_eq!(summary.total_rows, 0);
    assert!(gateway.insert_batches().is_empty());
    assert_eq!(gateway.columns_of("t").unwrap().unwrap().len(), 2);
}

#[test]
fn configured_encoding_and_delimiter_are_used() {
    let ws = TestWorkspace::new();
    let path = ws.csv_dir().join("latin.tsv");
    std::fs::write(&path, b"name\tcity\nJos\xe9\tM\xe1laga\n").unwrap();
    let mut gateway = MemoryGateway::new();
    let mapping = ColumnMapping::new();
    let mut options = IngestOptions::new("t");
    options.encoding = io_utils::resolve_encoding(Some("latin1")).unwrap();

    Ingestor::new(&mut gateway, &mapping, &options)
        .ingest_files(&[path])
        .unwrap();

    assert_eq!(
        gateway.table("t").unwrap().rows(),
        &[cells(&["José", "Málaga"])]
    );
}

#[test]
fn undecodable_record_is_reported_with_its_position() {
    let ws = TestWorkspace::new();
    let path: PathBuf = ws.csv_dir().join("bad.csv");
    std::fs::write(&path, b"a\nok\n\xff\xfe\n").unwrap();
    let mut gateway = MemoryGateway::new();
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");

    let err = Ingestor::new(&mut gateway, &mapping, &options)
        .ingest_files(&[path])
        .unwrap_err();

    assert!(matches!(err, Error::Decode { record: 2, .. }), "{err}");
}

fn ingest_case_clash<G: StorageGateway>(gateway: &mut G, ws: &TestWorkspace) -> Error {
    let first = ws.write_csv("1.csv", "name\nx\n");
    let second = ws.write_csv("2.csv", "Name\ny\n");
    let mapping = ColumnMapping::new();
    let options = IngestOptions::new("t");
    Ingestor::new(gateway, &mapping, &options)
        .ingest_files(&[first, second])
        .unwrap_err()
}

#[test]
fn columns_differing_only_in_case_clash_in_every_backend() {
    let ws = TestWorkspace::new();
    let mut memory = MemoryGateway::new();
    let err = ingest_case_clash(&mut memory, &ws);
    assert!(
        matches!(&err, Error::Schema { source: StorageError::DuplicateColumn(column), .. } if column == "Name"),
        "{err}"
    );
    assert_eq!(memory.table("t").unwrap().rows(), &[cells(&["x"])]);

    let mut sqlite = SqliteGateway::open(&ws.database()).unwrap();
    let err = ingest_case_clash(&mut sqlite, &ws);
    assert!(
        matches!(&err, Error::Schema { source: StorageError::DuplicateColumn(column), .. } if column == "Name"),
        "{err}"
    );
    assert_eq!(sqlite.fetch_rows("t").unwrap(), vec![cells(&["x"])]);
}
