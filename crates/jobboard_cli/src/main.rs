//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `jobboard_core` linkage.
//! - Given a database path, report schema version and table row counts.

use jobboard_core::db::migrations::current_version;
use rusqlite::Connection;
use std::process::ExitCode;

const REPORTED_TABLES: &[&str] = &[
    "users",
    "companies",
    "company_locations",
    "team_members",
    "jobs",
    "applications",
    "company_reviews",
    "resumes",
    "notifications",
    "blog_posts",
    "newsletter_subscribers",
];

fn main() -> ExitCode {
    println!("jobboard_core ping={}", jobboard_core::ping());
    println!("jobboard_core version={}", jobboard_core::core_version());

    let Some(path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match report(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn report(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conn = jobboard_core::open_db(path)?;
    println!("schema_version={}", current_version(&conn)?);
    for table in REPORTED_TABLES {
        println!("{table}={}", count_rows(&conn, table)?);
    }
    Ok(())
}

fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
}
