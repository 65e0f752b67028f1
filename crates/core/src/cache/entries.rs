//! Cache entry storage.
//!
//! Entries are keyed by `(partition, key)` and ordered by an insertion
//! sequence. Rewriting a key deletes the old row and inserts a new one, so a
//! rewritten entry moves to the back of the eviction queue.

use super::connection::CacheDb;
use super::partitions;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

/// The storable part of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseRecord {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A stored response together with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Insertion sequence; lower is older.
    pub seq: i64,
    pub partition: String,
    pub key: String,
    pub response: ResponseRecord,
    /// RFC 3339 time the row was stored.
    pub stored_at: String,
    /// Write time in unix milliseconds, set only for entries with a freshness window.
    pub written_at: Option<i64>,
}

/// Delete the oldest entries of `partition` until at most `keep` remain.
fn evict_oldest(conn: &rusqlite::Connection, partition: &str, keep: usize) -> Result<u64, Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE partition = ?1",
        params![partition],
        |row| row.get(0),
    )?;
    let keep = keep as i64;
    if count <= keep {
        return Ok(0);
    }

    let deleted = conn.execute(
        "DELETE FROM entries WHERE seq IN (
            SELECT seq FROM entries WHERE partition = ?1 ORDER BY seq ASC LIMIT ?2
        )",
        params![partition, count - keep],
    )?;
    Ok(deleted as u64)
}

fn insert(
    conn: &rusqlite::Connection, partition: &str, key: &str, record: &ResponseRecord, written_at: Option<i64>,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&record.headers)?;
    conn.execute(
        "INSERT INTO entries (partition, key, status, headers_json, body, stored_at, written_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            partition,
            key,
            record.status,
            headers_json,
            &record.body,
            chrono::Utc::now().to_rfc3339(),
            written_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Store a response, replacing any previous entry for the key.
    ///
    /// Creates the partition if needed. The later of the new and the previous
    /// write time is kept, so a stamp never moves backwards and a rewrite
    /// without one never clears it.
    pub async fn put_entry(
        &self, partition: &str, key: &str, record: &ResponseRecord, written_at: Option<i64>,
    ) -> Result<(), Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                partitions::ensure(&tx, &partition)?;

                let previous: Option<Option<i64>> = match tx.query_row(
                    "SELECT written_at FROM entries WHERE partition = ?1 AND key = ?2",
                    params![partition, key],
                    |row| row.get(0),
                ) {
                    Ok(w) => Some(w),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                };
                // an unstamped rewrite keeps the previous stamp
                let written_at = written_at.max(previous.flatten());

                tx.execute("DELETE FROM entries WHERE partition = ?1 AND key = ?2", params![partition, key])?;
                insert(&tx, &partition, &key, &record, written_at)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store a response into a partition capped at `max_entries`.
    ///
    /// Eviction and insert run in one transaction: the oldest entries are
    /// removed until the partition holds `max_entries - 1` other keys, then
    /// the new entry is appended. Returns the number of evicted entries.
    pub async fn put_entry_capped(
        &self, partition: &str, key: &str, record: &ResponseRecord, max_entries: usize,
    ) -> Result<u64, Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        let record = record.clone();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                partitions::ensure(&tx, &partition)?;
                tx.execute("DELETE FROM entries WHERE partition = ?1 AND key = ?2", params![partition, key])?;
                let evicted = evict_oldest(&tx, &partition, max_entries.saturating_sub(1))?;
                insert(&tx, &partition, &key, &record, None)?;
                tx.commit()?;
                Ok(evicted)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by key.
    ///
    /// Returns None if the partition or the key doesn't exist.
    pub async fn get_entry(&self, partition: &str, key: &str) -> Result<Option<CacheEntry>, Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT seq, status, headers_json, body, stored_at, written_at
                     FROM entries WHERE partition = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![partition, key], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                    ))
                });

                match result {
                    Ok((seq, status, headers_json, body, stored_at, written_at)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(CacheEntry {
                            seq,
                            partition,
                            key,
                            response: ResponseRecord { status, headers, body },
                            stored_at,
                            written_at,
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns false if it did not exist.
    pub async fn delete_entry(&self, partition: &str, key: &str) -> Result<bool, Error> {
        let partition = partition.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted =
                    conn.execute("DELETE FROM entries WHERE partition = ?1 AND key = ?2", params![partition, key])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in a partition.
    pub async fn count_entries(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Keys of a partition, oldest first.
    pub async fn entry_keys(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE partition = ?1 ORDER BY seq ASC")?;
                let keys = stmt
                    .query_map(params![partition], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Purge oldest entries until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn trim_partition(&self, partition: &str, max_entries: usize) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> { evict_oldest(conn, &partition, max_entries) })
            .await
            .map_err(Error::from)
    }
}
