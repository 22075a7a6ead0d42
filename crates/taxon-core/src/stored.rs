//! Persisted wrapper shared by every imported entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record as returned by the store: the upserted payload plus the stable
/// identifier the store assigned to it.
///
/// Re-upserting the same natural key keeps `id` and refreshes `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: T,
    pub updated_at: DateTime<Utc>,
}

impl<T> Stored<T> {
    pub fn new(id: Uuid, record: T) -> Self {
        Self {
            id,
            record,
            updated_at: Utc::now(),
        }
    }
}

impl<T> std::ops::Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}
