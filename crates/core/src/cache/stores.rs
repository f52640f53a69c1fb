//! Named store lifecycle: create, enumerate, delete.
//!
//! Store names embed the application prefix and version tag, so activation
//! can enumerate everything belonging to this application and drop stores
//! created under a superseded tag.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// What a store holds: the fixed install-time asset set, or resources
/// cached opportunistically during browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Static,
    Dynamic,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Static => "static",
            StoreKind::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CacheDb {
    /// Create a store if it doesn't exist yet.
    ///
    /// Idempotent so a retried install/activate never fails here.
    pub async fn open_store(&self, name: &str, kind: StoreKind) -> Result<(), Error> {
        let name = name.to_string();
        let kind = kind.as_str();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO stores (name, kind, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, kind, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every store belonging to this application, oldest first.
    pub async fn list_stores(&self, prefix: &str) -> Result<Vec<String>, Error> {
        let pattern = format!("{prefix}-%");
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT name FROM stores WHERE name LIKE ?1 ORDER BY created_at, name")?;
                let names = stmt
                    .query_map(params![pattern], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and (by cascade) all of its entries.
    ///
    /// Returns true if the store existed.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
