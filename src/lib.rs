#[macro_use]
extern crate diesel;

use diesel::connection::SimpleConnection;
use diesel::prelude::SqliteConnection;
use diesel::r2d2;
use indoc::indoc;

pub mod app;
pub mod auth;
pub mod config;
pub mod constants;
pub mod errors;
pub mod forms;
pub mod handler;
pub mod handlers;
pub mod media_util;
pub mod models;
pub mod paginator;
pub mod post_util;
pub mod schema;
pub mod templates;
pub mod view_models;

#[cfg(test)]
pub(crate) mod test_util;

pub use crate::config::BlogConfig;
pub use crate::constants::*;

pub type DbPool = r2d2::Pool<r2d2::ConnectionManager<SqliteConnection>>;

const SCHEMA: &str = indoc! {"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        date_joined TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS sessions (
        token TEXT PRIMARY KEY NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        expires_at TIMESTAMP NOT NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        slug TEXT NOT NULL UNIQUE,
        is_published BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS locations (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        name TEXT NOT NULL,
        is_published BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        title TEXT NOT NULL,
        text TEXT NOT NULL,
        pub_date TIMESTAMP NOT NULL,
        author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        location_id INTEGER REFERENCES locations (id) ON DELETE SET NULL,
        category_id INTEGER REFERENCES categories (id) ON DELETE SET NULL,
        is_published BOOLEAN NOT NULL DEFAULT 1,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        image TEXT
    );
    CREATE INDEX IF NOT EXISTS posts_pub_date_idx ON posts (pub_date);

    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        text TEXT NOT NULL,
        post_id INTEGER NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
        author_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS comments_post_id_idx ON comments (post_id);
"};

#[derive(Debug)]
struct ConnectionOptions;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

pub fn new_dbconn_pool(db_file: &str) -> Result<DbPool, anyhow::Error> {
    let manager = r2d2::ConnectionManager::<SqliteConnection>::new(db_file);
    Ok(r2d2::Pool::builder()
        .connection_customizer(Box::new(ConnectionOptions))
        .build(manager)?)
}

/// Creates any missing tables. Safe to run on every start.
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    conn.batch_execute(SCHEMA)
}
