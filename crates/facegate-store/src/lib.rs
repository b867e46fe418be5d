//! facegate-store: the enrolled profile collection.
//!
//! [`ProfileGateway`] is the read path the matcher depends on; [`ProfileStore`]
//! implements it over SQLite and adds the enrollment operations used by the
//! admin CLI.

mod record;
mod store;

use async_trait::async_trait;
use facegate_core::Profile;
use std::time::Duration;
use thiserror::Error;

pub use store::{NewProfile, ProfileStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("profile store unavailable after waiting {waited:?}")]
    Unavailable { waited: Duration },
    #[error("profile {id} is malformed: {reason}")]
    MalformedProfile { id: String, reason: String },
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("database: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}

/// Read access to enrolled profiles, gated on store readiness.
#[async_trait]
pub trait ProfileGateway: Send + Sync {
    /// Resolve once the store connection is live, or fail with
    /// [`StoreError::Unavailable`] after `timeout`.
    async fn await_ready(&self, timeout: Duration) -> Result<(), StoreError>;

    fn is_ready(&self) -> bool;

    /// Every enrolled profile, validated, in enrollment order.
    async fn list_profiles(&self) -> Result<Vec<Profile>, StoreError>;
}
