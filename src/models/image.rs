//! Represents an uploaded image and the metadata that links it to its owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted image record.
///
/// The record stores where the blob lives, not the bytes themselves. `path`
/// is the object-store key and is required to remove the blob later; `url`
/// is its publicly resolvable location.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// Row id assigned by the metadata store on insert.
    pub id: i64,

    /// Identity of the owning user. Never mutated after insert.
    pub user_id: String,

    /// Public URL of the blob.
    pub url: String,

    /// Object-store key of the blob.
    pub path: String,

    /// Insert time, used for newest-first ordering.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when inserting a record.
#[derive(Clone, Debug)]
pub struct NewImage {
    pub user_id: String,
    pub url: String,
    pub path: String,
}
