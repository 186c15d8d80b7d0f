mod common;

use common::{create_surveys_db, COLUMNS};
use arrow::array::Array;
use arrow::datatypes::DataType;
use portal_query::{
    run_to_table, Params, ResultTable, Session, SqlQuery, SqliteConfig, SqliteError, Value,
};

#[test]
fn table_outlives_its_connection() {
    let (_dir, path) = create_surveys_db();
    let table = {
        let session = Session::open(&SqliteConfig::new(&path)).unwrap();
        let query = SqlQuery::new("SELECT * FROM surveys WHERE species_id = ?")
            .with_params(Params::positional(["PF"]));
        let table = session.query_table(&query).unwrap();
        session.close().unwrap();
        table
    };

    assert_eq!(table.columns(), COLUMNS);
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.row(0).unwrap()[0], Value::Integer(11));
}

#[test]
fn empty_result_keeps_columns() {
    let (_dir, path) = create_surveys_db();
    let query = SqlQuery::new("SELECT species_id, weight FROM surveys WHERE year < 1900");
    let table = run_to_table(path.as_path(), &query).unwrap();

    assert!(table.is_empty());
    assert_eq!(table.columns(), ["species_id", "weight"]);
    assert_eq!(table.column("weight"), Some(Vec::new()));
}

#[test]
fn table_prints_as_grid() {
    let (_dir, path) = create_surveys_db();
    let query = SqlQuery::new(
        "SELECT species_id, year, weight FROM surveys WHERE species_id = :id ORDER BY year",
    )
    .with_params(Params::named().with_value("id", "DS"));
    let table = run_to_table(path.as_path(), &query).unwrap();

    let rendered = table.to_string();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(
        lines,
        [
            "+------------+------+--------+",
            "| species_id | year | weight |",
            "+------------+------+--------+",
            "| DS         | 1996 | 120    |",
            "| DS         | 1997 | 115    |",
            "| DS         | 1999 | 130    |",
            "| DS         | 2001 |        |",
            "+------------+------+--------+",
        ]
    );
}

#[test]
fn table_serializes_columns_and_rows() {
    let table = ResultTable::from_rows(
        vec!["species_id".to_string(), "hindfoot_length".to_string()],
        vec![
            vec![Value::from("DM"), Value::Integer(36)],
            vec![Value::from("DS"), Value::Null],
        ],
    )
    .unwrap();
    let json = serde_json::to_value(&table).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "columns": ["species_id", "hindfoot_length"],
            "rows": [["DM", 36], ["DS", null]],
        })
    );
}

#[test]
fn head_limits_rows() {
    let (_dir, path) = create_surveys_db();
    let table = run_to_table(path.as_path(), &SqlQuery::new("SELECT * FROM surveys")).unwrap();

    let head = table.head(5);
    assert_eq!(head.row_count(), 5);
    assert_eq!(head.row(4), table.row(4));
    assert_eq!(head.rows().count(), 5);
    assert_eq!(head.batch().num_rows(), 5);
}

#[test]
fn ragged_rows_are_a_table_error() {
    let err = ResultTable::from_rows(
        vec!["species_id".to_string(), "year".to_string()],
        vec![vec![Value::from("DM")]],
    )
    .unwrap_err();
    assert!(matches!(err, SqliteError::Table(_)), "{err:?}");
}

#[test]
fn batch_is_typed_per_column() {
    let (_dir, path) = create_surveys_db();
    let query = SqlQuery::new("SELECT species_id, year, hindfoot_length FROM surveys");
    let batch = run_to_table(path.as_path(), &query).unwrap().into_batch();

    let schema = batch.schema();
    let types: Vec<&DataType> = schema.fields().iter().map(|f| f.data_type()).collect();
    assert_eq!(types, [&DataType::Utf8, &DataType::Int64, &DataType::Int64]);
    assert_eq!(batch.num_rows(), common::SURVEYS.len());
    // record 5 has no hindfoot length
    assert!(batch.column(2).is_null(4));
}
