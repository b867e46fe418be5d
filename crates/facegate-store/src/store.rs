use crate::record::{encode_descriptor, ProfileRow};
use crate::{ProfileGateway, StoreError};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use facegate_core::{FaceDescriptor, Profile};
use rusqlite::params;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profiles (
    id              TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    metadata        TEXT NOT NULL DEFAULT '{}',
    face_descriptor TEXT NOT NULL,
    created_at      TEXT NOT NULL
);
";

/// A profile to enroll.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub metadata: Map<String, Value>,
    pub descriptor: FaceDescriptor,
}

/// SQLite-backed profile store.
///
/// The connection is opened once, by [`ProfileStore::connect`]'s background
/// task, and published through a watch channel; every clone of the store and
/// every waiter observes the same connection.
#[derive(Clone)]
pub struct ProfileStore {
    conn: watch::Receiver<Option<Connection>>,
    descriptor_dim: usize,
}

impl ProfileStore {
    /// Start connecting in the background and return immediately.
    ///
    /// Failed attempts are retried every `retry_interval` until one succeeds
    /// or every handle to the store has been dropped.
    pub fn connect(path: PathBuf, descriptor_dim: usize, retry_interval: Duration) -> Self {
        let (tx, rx) = watch::channel(None);

        tokio::spawn(async move {
            let mut attempt: u32 = 0;
            loop {
                attempt += 1;
                match open_with_schema(&path).await {
                    Ok(conn) => {
                        tracing::info!(path = %path.display(), attempt, "profile store connected");
                        let _ = tx.send(Some(conn));
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            attempt,
                            error = %e,
                            "profile store connection failed; retrying"
                        );
                    }
                }
                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(retry_interval).await;
            }
        });

        Self { conn: rx, descriptor_dim }
    }

    /// Open synchronously with the caller; the store is ready on return.
    pub async fn open(path: &Path, descriptor_dim: usize) -> Result<Self, StoreError> {
        let conn = open_with_schema(path).await?;
        Ok(Self::ready(conn, descriptor_dim))
    }

    pub async fn open_in_memory(descriptor_dim: usize) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        init_schema(&conn).await?;
        Ok(Self::ready(conn, descriptor_dim))
    }

    fn ready(conn: Connection, descriptor_dim: usize) -> Self {
        let (_tx, rx) = watch::channel(Some(conn));
        Self { conn: rx, descriptor_dim }
    }

    /// The live connection, without waiting.
    fn connection(&self) -> Result<Connection, StoreError> {
        self.conn.borrow().clone().ok_or(StoreError::Unavailable {
            waited: Duration::ZERO,
        })
    }

    pub async fn insert_profile(&self, profile: NewProfile) -> Result<Profile, StoreError> {
        if profile.descriptor.len() != self.descriptor_dim {
            return Err(StoreError::InvalidProfile(format!(
                "descriptor has {} values, store expects {}",
                profile.descriptor.len(),
                self.descriptor_dim
            )));
        }
        if profile.name.trim().is_empty() {
            return Err(StoreError::InvalidProfile("name must not be empty".into()));
        }

        let stored = Profile {
            id: uuid::Uuid::new_v4().to_string(),
            name: profile.name,
            metadata: profile.metadata,
            descriptor: profile.descriptor,
            created_at: Utc::now(),
        };

        let row = (
            stored.id.clone(),
            stored.name.clone(),
            Value::Object(stored.metadata.clone()).to_string(),
            encode_descriptor(&stored.descriptor),
            stored.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        self.connection()?
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO profiles (id, name, metadata, face_descriptor, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![row.0, row.1, row.2, row.3, row.4],
                )?;
                Ok(())
            })
            .await?;

        tracing::info!(profile_id = %stored.id, name = %stored.name, "profile enrolled");
        Ok(stored)
    }

    /// Returns `true` if a profile was removed.
    pub async fn remove_profile(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let removed = self
            .connection()?
            .call(move |conn| Ok(conn.execute("DELETE FROM profiles WHERE id = ?1", [id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn count_profiles(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .connection()?
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl ProfileGateway for ProfileStore {
    async fn await_ready(&self, timeout: Duration) -> Result<(), StoreError> {
        let mut rx = self.conn.clone();
        let result = match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(_)) => Ok(()),
            // Elapsed, or the connect task is gone without ever connecting.
            Ok(Err(_)) | Err(_) => Err(StoreError::Unavailable { waited: timeout }),
        };
        result
    }

    fn is_ready(&self) -> bool {
        self.conn.borrow().is_some()
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let rows = self
            .connection()?
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, metadata, face_descriptor, created_at
                     FROM profiles ORDER BY created_at, id",
                )?;
                let rows = stmt
                    .query_map([], ProfileRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let dim = self.descriptor_dim;
        let profiles = rows
            .into_iter()
            .map(|row| row.into_profile(dim))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                tracing::error!(error = %e, "refusing malformed enrollment data");
                e
            })?;

        tracing::debug!(count = profiles.len(), "listed profiles");
        Ok(profiles)
    }
}

async fn open_with_schema(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path).await?;
    init_schema(&conn).await?;
    Ok(conn)
}

async fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
    .await?;
    Ok(())
}
