// {{{ Imports
use std::path::Path;
use std::sync::LazyLock;

use anyhow::Context;
use include_dir::{include_dir, Dir};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite_migration::Migrations;
use tracing::info;
// }}}

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

pub fn connect_db(db_path: &Path) -> anyhow::Result<SqlitePool> {
	let mut conn = rusqlite::Connection::open(db_path)
		.with_context(|| "Could not connect to sqlite database")?;
	conn.pragma_update(None, "journal_mode", "WAL")?;

	// {{{ Run migrations
	static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");
	static MIGRATIONS: LazyLock<Migrations> = LazyLock::new(|| {
		Migrations::from_directory(&MIGRATIONS_DIR).expect("Could not load migrations")
	});

	MIGRATIONS
		.to_latest(&mut conn)
		.with_context(|| "Could not run migrations")?;
	info!("Ensured db schema is up to date");
	// }}}

	// Pragmas like foreign keys are per connection
	let manager = SqliteConnectionManager::file(db_path)
		.with_init(|conn| conn.pragma_update(None, "foreign_keys", "ON"));

	Pool::new(manager).with_context(|| "Could not open sqlite database.")
}
