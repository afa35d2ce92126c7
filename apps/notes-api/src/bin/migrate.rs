//! Schema migrations for the meetings database.
//!
//!   notes-migrate              apply pending migrations
//!   notes-migrate --revert     roll back the most recent migration
//!   notes-migrate --test       same, against the `<db>_test` database
//!
//! DATABASE_URL comes from the environment or `.env`.

use std::path::Path;
use std::process::ExitCode;

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Apply,
    Revert,
}

fn main() -> ExitCode {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = if args.iter().any(|a| a == "--revert") {
        Action::Revert
    } else {
        Action::Apply
    };

    let Ok(mut database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set");
        return ExitCode::FAILURE;
    };
    if args.iter().any(|a| a == "--test") {
        database_url = test_database_url(&database_url);
    }

    let mut conn = match PgConnection::establish(&database_url) {
        Ok(conn) => conn,
        Err(err) => {
            eprintln!("cannot connect to database: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match action {
        Action::Apply => conn.run_pending_migrations(MIGRATIONS).map(|applied| {
            if applied.is_empty() {
                println!("schema is up to date");
            }
            for version in &applied {
                println!("applied {version}");
            }
        }),
        Action::Revert => conn
            .revert_last_migration(MIGRATIONS)
            .map(|version| println!("reverted {version}")),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("migration failed: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Point the URL at `<db>_test`, keeping any query string. URLs already
/// naming a `_test` database are returned untouched.
fn test_database_url(url: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };
    let Some((server, db)) = base.rsplit_once('/') else {
        return url.to_string();
    };
    if db.is_empty() || db.ends_with("_test") {
        return url.to_string();
    }

    match query {
        Some(query) => format!("{server}/{db}_test?{query}"),
        None => format!("{server}/{db}_test"),
    }
}

#[cfg(test)]
mod tests {
    use super::test_database_url;

    #[test]
    fn appends_test_suffix() {
        assert_eq!(
            test_database_url("postgres://u:p@localhost/notes"),
            "postgres://u:p@localhost/notes_test"
        );
    }

    #[test]
    fn keeps_query_string() {
        assert_eq!(
            test_database_url("postgres://localhost/notes?sslmode=disable"),
            "postgres://localhost/notes_test?sslmode=disable"
        );
    }

    #[test]
    fn leaves_test_database_alone() {
        let url = "postgres://localhost/notes_test";
        assert_eq!(test_database_url(url), url);
    }
}
