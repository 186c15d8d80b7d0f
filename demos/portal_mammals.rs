//! Walk through the query styles against the portal-mammals survey database.
//!
//! Usage: `cargo run --example portal_mammals [path/to/portal_mammals.sqlite]`

use anyhow::{Context, Result};
use portal_query::{
    fetch_all, logging, run, run_to_table, Params, Session, SqlQuery, SqliteConfig, Value,
};

const DEFAULT_DB: &str = "../data/portal_mammals.sqlite";

fn main() -> Result<()> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_DB.to_string());
    let config = SqliteConfig::new(&db_path);

    // Literal query
    let literal = SqlQuery::new("SELECT * FROM surveys WHERE species_id = 'DM';");
    let results = fetch_all(&config, &literal).context("literal query")?;
    println!("literal: {} rows", results.len());

    // Unnamed parameters, several statements on one connection
    let session = Session::open(&config)?;
    let positional = SqlQuery::new("SELECT * FROM surveys WHERE species_id = ? AND year > ?;")
        .with_params(Params::positional([Value::from("DS"), Value::from(1996)]));
    let results = session.fetch_all(&positional).context("positional query")?;
    println!("positional: {} rows", results.len());

    // Named parameters
    let named = SqlQuery::new(
        "SELECT * FROM surveys WHERE species_id = :id AND year > :year ORDER BY hindfoot_length;",
    )
    .with_params(Params::named().with_value("id", "DM").with_value("year", 1995));
    let results = session.fetch_all(&named).context("named query")?;
    println!("named: {} rows", results.len());
    session.close()?;

    // Row-by-row iteration
    let iterate = named
        .clone()
        .with_params(Params::named().with_value("id", "DS").with_value("year", 1995));
    run(&config, &iterate, |rows| {
        for row in rows {
            println!("{}", row?);
        }
        Ok(())
    })
    .context("iterating query")?;

    // Materialize into a table
    let table = run_to_table(&config, &iterate).context("table query")?;
    println!("{}", table.head(10));
    println!("[{} rows x {} columns]", table.row_count(), table.column_count());

    Ok(())
}
