use papertrail::infra::payload::PayloadStore;
use rusqlite::Connection;
use std::path::Path;

const TABLES: [&str; 3] = ["review_items", "artifacts", "projects"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    run()
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = papertrail::infra::app_config::load_config();

    clear_tables(&config.db_path())?;

    // Payload files must not outlive their artifact rows.
    let payloads = PayloadStore::new(config.projects_dir());
    let removed = payloads.remove_all()?;
    println!(
        "Removed {} artifact payload files under {}",
        removed,
        payloads.root().display()
    );

    Ok(())
}

fn clear_tables(db_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !db_path.exists() {
        println!("Database does not exist at: {}", db_path.display());
        println!("No reset needed.");
        return Ok(());
    }

    println!("Connecting to database at: {}", db_path.display());
    let conn = Connection::open(db_path)?;

    let tables_exist: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='projects'",
        [],
        |row| row.get(0),
    )?;
    if tables_exist == 0 {
        println!("Tables do not exist. No reset needed.");
        return Ok(());
    }

    println!("Current record counts:");
    for table in TABLES {
        println!("  {}: {}", table, count(&conn, table)?);
    }

    // Children first; artifacts reference projects.
    for table in TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
        println!("Cleared {table} table");
    }

    let remaining: i64 = TABLES
        .iter()
        .map(|t| count(&conn, t))
        .sum::<Result<i64, _>>()?;
    if remaining == 0 {
        println!("\nDatabase successfully reset! All records have been deleted.");
    } else {
        eprintln!("\nWarning: {remaining} records still exist in the database.");
    }
    Ok(())
}

fn count(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
}
