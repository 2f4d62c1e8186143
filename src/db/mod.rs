//! Document store for reports, donations and users, on SQLite.
use chrono::Utc;
use rusqlite::{Connection, Result, params};
use std::path::Path;
use tracing::info;

pub mod donations;
pub mod models;
pub mod reports;
pub mod users;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    avatar TEXT
);

CREATE TABLE IF NOT EXISTS reports (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    user_name TEXT NOT NULL,
    user_email TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    location TEXT NOT NULL,
    latitude REAL,
    longitude REAL,
    image_url TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'pending',
    timestamp INTEGER NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0,
    remarks TEXT
);

CREATE INDEX IF NOT EXISTS idx_reports_timestamp ON reports(timestamp);
CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status);

CREATE TABLE IF NOT EXISTS donations (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user_id TEXT,
    donor_name TEXT NOT NULL,
    user_email TEXT NOT NULL,
    amount REAL NOT NULL,
    campaign TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'Received'
);

CREATE INDEX IF NOT EXISTS idx_donations_user ON donations(user_id);
CREATE INDEX IF NOT EXISTS idx_donations_timestamp ON donations(timestamp);
"#;

/// A wrapper around a SQLite connection initialized with the application schema.
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!("Database initialized successfully");
        Ok(Self { conn })
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Insert the demo users and Bangalore reports when the store is empty.
    /// Returns whether anything was written.
    pub fn seed_if_empty(&mut self) -> Result<bool> {
        let reports: i64 = self
            .conn
            .query_row("SELECT count(*) FROM reports", [], |row| row.get(0))?;
        let users: i64 = self
            .conn
            .query_row("SELECT count(*) FROM users", [], |row| row.get(0))?;
        if reports > 0 || users > 0 {
            return Ok(false);
        }

        let now = now_millis();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, name, email, role, avatar) VALUES (?, ?, ?, ?, ?)",
            params![
                "u1",
                "Arjun Kumar",
                "arjun@reliefnet.com",
                "user",
                "https://images.unsplash.com/photo-1615813967515-e1838c1c5116?q=80&w=200&auto=format&fit=crop"
            ],
        )?;
        tx.execute(
            "INSERT INTO users (id, name, email, role, avatar) VALUES (?, ?, ?, ?, ?)",
            params![
                "a1",
                "Priya Admin",
                "admin@reliefnet.com",
                "admin",
                "https://ui-avatars.com/api/?name=Priya+Admin&background=0D8ABC&color=fff"
            ],
        )?;

        let image = "https://images.unsplash.com/photo-1569260171128-44e99a803738?q=80&w=800&auto=format&fit=crop";
        tx.execute(
            r#"
            INSERT INTO reports (id, user_id, user_name, user_email, title, description,
                location, latitude, longitude, image_url, status, timestamp, upvotes)
            VALUES ('r1', 'u1', 'Arjun Kumar', 'arjun@reliefnet.com', ?, ?, ?, 12.9172, 77.6228, ?, 'verified', ?, 145)
            "#,
            params![
                "Severe Waterlogging at Silk Board",
                "Heavy rains have caused massive waterlogging at Silk Board junction. Traffic is completely stalled.",
                "Silk Board Junction, Bangalore",
                image,
                now - 86_400_000
            ],
        )?;
        tx.execute(
            r#"
            INSERT INTO reports (id, user_id, user_name, user_email, title, description,
                location, latitude, longitude, image_url, status, timestamp, upvotes)
            VALUES ('r2', 'u2', 'Sneha Reddy', 'sneha@example.com', ?, ?, ?, 12.9784, 77.6408, ?, 'verified', ?, 89)
            "#,
            params![
                "Tree Fall in Indiranagar",
                "A large Gulmohar tree fell on 100ft road blocking the service lane. An auto-rickshaw was crushed under the branches.",
                "Indiranagar 100ft Road, Bangalore",
                image,
                now - 172_800_000
            ],
        )?;
        tx.commit()?;

        info!("Seeded demo users and reports");
        Ok(true)
    }
}

/// Current time in epoch milliseconds, the timestamp unit of every record.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Next `<prefix><n>` id for an AUTOINCREMENT table.
pub(crate) fn next_id(conn: &Connection, table: &str, prefix: &str) -> Result<String> {
    let last: i64 = conn.query_row(
        "SELECT IFNULL((SELECT seq FROM sqlite_sequence WHERE name = ?), 0)",
        params![table],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}{}", last + 1))
}
