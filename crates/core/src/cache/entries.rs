//! Cache entry CRUD and FIFO eviction.
//!
//! One entry per (store, request key). Writing an existing key overwrites
//! the stored response in place; the entry keeps its original insertion
//! position, so a refresh does not move it to the back of the eviction
//! queue.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached response snapshot for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Opaque request key, see [`super::key::request_key`].
    pub request_key: String,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub content_type: Option<String>,
    /// Response headers as (name, value) pairs.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// RFC 3339 timestamp of the last write.
    pub inserted_at: String,
}

impl CachedResponse {
    /// Build a snapshot for the given request identity and response parts.
    pub fn new(
        request_key: String,
        url: String,
        method: String,
        status: u16,
        content_type: Option<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            request_key,
            url,
            method,
            status,
            content_type,
            headers,
            body,
            inserted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn insert_one(conn: &rusqlite::Connection, store: &str, entry: &CachedResponse) -> Result<(), Error> {
    // Serializing (String, String) pairs cannot fail; fall back to an
    // empty header list rather than poisoning the write path.
    let headers_json = serde_json::to_string(&entry.headers).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO entries (
            store_name, request_key, url, method, status,
            content_type, headers_json, body, inserted_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(store_name, request_key) DO UPDATE SET
            url = excluded.url,
            method = excluded.method,
            status = excluded.status,
            content_type = excluded.content_type,
            headers_json = excluded.headers_json,
            body = excluded.body,
            inserted_at = excluded.inserted_at",
        params![
            store,
            &entry.request_key,
            &entry.url,
            &entry.method,
            entry.status,
            &entry.content_type,
            headers_json,
            &entry.body,
            &entry.inserted_at,
        ],
    )?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> Result<CachedResponse, rusqlite::Error> {
    let headers_json: Option<String> = row.get(5)?;
    let headers = headers_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();
    Ok(CachedResponse {
        request_key: row.get(0)?,
        url: row.get(1)?,
        method: row.get(2)?,
        status: row.get(3)?,
        content_type: row.get(4)?,
        headers,
        body: row.get(6)?,
        inserted_at: row.get(7)?,
    })
}

impl CacheDb {
    /// Insert or overwrite one entry in a store.
    ///
    /// A single upsert statement, so concurrent writers resolve to
    /// last-write-wins per key with no torn entry.
    pub async fn put_entry(&self, store: &str, entry: &CachedResponse) -> Result<(), Error> {
        let store = store.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| insert_one(conn, &store, &entry))
            .await
            .map_err(Error::from)
    }

    /// Write a batch of entries in one transaction.
    ///
    /// Used by install-time precaching: either every entry lands or none
    /// does, so a partially populated static store is never observable.
    pub async fn put_entries(&self, store: &str, entries: Vec<CachedResponse>) -> Result<(), Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    insert_one(&tx, &store, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by request key.
    ///
    /// Returns None on a miss.
    pub async fn match_entry(&self, store: &str, request_key: &str) -> Result<Option<CachedResponse>, Error> {
        let store = store.to_string();
        let request_key = request_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT request_key, url, method, status, content_type, headers_json, body, inserted_at
                     FROM entries WHERE store_name = ?1 AND request_key = ?2",
                )?;

                match stmt.query_row(params![store, request_key], row_to_entry) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries currently held by a store.
    pub async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE store_name = ?1",
                    params![store],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the `n` earliest-inserted entries of a store (pure FIFO,
    /// not LRU). Returns the number of deleted entries.
    pub async fn evict_oldest(&self, store: &str, n: u64) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE id IN (
                        SELECT id FROM entries WHERE store_name = ?1 ORDER BY id ASC LIMIT ?2
                    )",
                    params![store, n as i64],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of a store's entries in insertion order. Test/debug helper.
    pub async fn entry_urls(&self, store: &str) -> Result<Vec<String>, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM entries WHERE store_name = ?1 ORDER BY id ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::request_key;
    use crate::cache::stores::StoreKind;

    const STORE: &str = "app-v1-dynamic";

    async fn open_with_store() -> CacheDb {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store(STORE, StoreKind::Dynamic).await.unwrap();
        db
    }

    fn make_entry(url: &str, body: &[u8]) -> CachedResponse {
        CachedResponse::new(
            request_key("GET", url),
            url.to_string(),
            "GET".to_string(),
            200,
            Some("text/html".to_string()),
            vec![("etag".to_string(), "\"abc\"".to_string())],
            body.to_vec(),
        )
    }

    #[tokio::test]
    async fn test_put_and_match_round_trip() {
        let db = open_with_store().await;
        let entry = make_entry("https://example.com/page", b"<html>hi</html>");

        db.put_entry(STORE, &entry).await.unwrap();

        let found = db.match_entry(STORE, &entry.request_key).await.unwrap().unwrap();
        assert_eq!(found.body, entry.body);
        assert_eq!(found.status, 200);
        assert_eq!(found.headers, entry.headers);
    }

    #[tokio::test]
    async fn test_match_miss() {
        let db = open_with_store().await;
        let found = db.match_entry(STORE, "nonexistent").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_reuses_key_and_position() {
        let db = open_with_store().await;
        let first = make_entry("https://example.com/a", b"old");
        let second = make_entry("https://example.com/b", b"other");
        db.put_entry(STORE, &first).await.unwrap();
        db.put_entry(STORE, &second).await.unwrap();

        let refreshed = make_entry("https://example.com/a", b"new");
        db.put_entry(STORE, &refreshed).await.unwrap();

        assert_eq!(db.entry_count(STORE).await.unwrap(), 2);
        let found = db.match_entry(STORE, &first.request_key).await.unwrap().unwrap();
        assert_eq!(found.body, b"new");

        // Overwriting /a did not move it behind /b in insertion order.
        let urls = db.entry_urls(STORE).await.unwrap();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[tokio::test]
    async fn test_evict_oldest_is_fifo() {
        let db = open_with_store().await;
        for i in 0..51 {
            let entry = make_entry(&format!("https://example.com/asset-{i}"), b"x");
            db.put_entry(STORE, &entry).await.unwrap();
        }

        let deleted = db.evict_oldest(STORE, 10).await.unwrap();
        assert_eq!(deleted, 10);
        assert_eq!(db.entry_count(STORE).await.unwrap(), 41);

        // The 10 earliest-inserted entries are the ones gone.
        let urls = db.entry_urls(STORE).await.unwrap();
        assert_eq!(urls.first().unwrap(), "https://example.com/asset-10");
        for i in 0..10 {
            let key = request_key("GET", &format!("https://example.com/asset-{i}"));
            assert!(db.match_entry(STORE, &key).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_put_entries_batch_visible_atomically() {
        let db = open_with_store().await;
        let batch: Vec<_> = (0..5)
            .map(|i| make_entry(&format!("https://example.com/precache-{i}"), b"asset"))
            .collect();

        db.put_entries(STORE, batch).await.unwrap();
        assert_eq!(db.entry_count(STORE).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_delete_store_cascades_entries() {
        let db = open_with_store().await;
        let entry = make_entry("https://example.com/page", b"body");
        db.put_entry(STORE, &entry).await.unwrap();

        db.delete_store(STORE).await.unwrap();

        // Re-create the store: entries must be gone with their old bucket.
        db.open_store(STORE, StoreKind::Dynamic).await.unwrap();
        assert_eq!(db.entry_count(STORE).await.unwrap(), 0);
    }
}
