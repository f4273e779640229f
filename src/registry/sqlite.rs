//! SQLite-backed guest registry

use super::{AttendanceTier, Guest, GuestRegistry, RegistryError, RegistryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS guests (
    id TEXT PRIMARY KEY,
    phone_number TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    tier TEXT NOT NULL DEFAULT 'normal',
    headcount INTEGER NOT NULL DEFAULT 1,
    attendance_confirmed BOOLEAN NOT NULL DEFAULT 0,
    qr_image TEXT,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_guests_phone ON guests(phone_number);
";

const GUEST_COLUMNS: &str =
    "id, phone_number, name, tier, headcount, attendance_confirmed, qr_image";

/// Thread-safe registry handle
#[derive(Clone)]
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Open or create the registry at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory registry (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> RegistryResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a guest record
    pub fn upsert_guest(&self, guest: &Guest) -> RegistryResult<()> {
        self.conn().execute(
            "INSERT INTO guests (id, phone_number, name, tier, headcount, attendance_confirmed, qr_image, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                phone_number = excluded.phone_number,
                name = excluded.name,
                tier = excluded.tier,
                headcount = excluded.headcount,
                attendance_confirmed = excluded.attendance_confirmed,
                qr_image = excluded.qr_image,
                updated_at = excluded.updated_at",
            params![
                guest.id,
                guest.phone_number,
                guest.name,
                guest.tier.as_str(),
                guest.headcount,
                guest.attendance_confirmed,
                guest.qr_image,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn find_one(&self, column: &str, value: &str) -> RegistryResult<Option<Guest>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GUEST_COLUMNS} FROM guests WHERE {column} = ?1"
        ))?;
        let guest = stmt.query_row(params![value], guest_from_row).optional()?;
        Ok(guest)
    }
}

fn guest_from_row(row: &Row<'_>) -> rusqlite::Result<Guest> {
    let tier: String = row.get(3)?;
    Ok(Guest {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        name: row.get(2)?,
        tier: AttendanceTier::parse(&tier),
        headcount: row.get(4)?,
        attendance_confirmed: row.get(5)?,
        qr_image: row.get(6)?,
    })
}

#[async_trait]
impl GuestRegistry for SqliteRegistry {
    async fn find_by_phone(&self, phone_number: &str) -> RegistryResult<Option<Guest>> {
        self.find_one("phone_number", phone_number)
    }

    async fn find_by_id(&self, guest_id: &str) -> RegistryResult<Option<Guest>> {
        self.find_one("id", guest_id)
    }

    async fn update_headcount(&self, guest_id: &str, headcount: u32) -> RegistryResult<()> {
        let updated = self.conn().execute(
            "UPDATE guests SET headcount = ?1, updated_at = ?2 WHERE id = ?3",
            params![headcount, Utc::now().to_rfc3339(), guest_id],
        )?;
        if updated == 0 {
            return Err(RegistryError::GuestNotFound(guest_id.to_string()));
        }
        Ok(())
    }

    async fn set_attendance_confirmed(&self, guest_id: &str) -> RegistryResult<()> {
        let updated = self.conn().execute(
            "UPDATE guests SET attendance_confirmed = 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), guest_id],
        )?;
        if updated == 0 {
            return Err(RegistryError::GuestNotFound(guest_id.to_string()));
        }
        Ok(())
    }

    async fn list_phone_numbers(&self) -> RegistryResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT phone_number FROM guests ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>()
            .map_err(RegistryError::from)
    }
}
