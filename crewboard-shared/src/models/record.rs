/// Helpers for reading typed fields out of hash records
///
/// Hash records come back from the store as string maps. These helpers turn
/// missing or malformed fields into [`StorageError::Corrupt`] naming the key.

use crate::store::StorageError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

pub(crate) struct Record<'a> {
    key: &'a str,
    fields: &'a HashMap<String, String>,
}

impl<'a> Record<'a> {
    pub(crate) fn new(key: &'a str, fields: &'a HashMap<String, String>) -> Self {
        Self { key, fields }
    }

    pub(crate) fn string(&self, name: &str) -> Result<String, StorageError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::corrupt(self.key, format!("missing field: {}", name)))
    }

    pub(crate) fn uuid(&self, name: &str) -> Result<Uuid, StorageError> {
        let raw = self.string(name)?;
        Uuid::parse_str(&raw)
            .map_err(|e| StorageError::corrupt(self.key, format!("invalid {}: {}", name, e)))
    }

    pub(crate) fn timestamp(&self, name: &str) -> Result<DateTime<Utc>, StorageError> {
        let raw = self.string(name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::corrupt(self.key, format!("invalid {}: {}", name, e)))
    }
}

/// Parses set members as ids, reporting the first malformed one
pub(crate) fn parse_ids(key: &str, members: &[String]) -> Result<Vec<Uuid>, StorageError> {
    members
        .iter()
        .map(|m| {
            Uuid::parse_str(m)
                .map_err(|e| StorageError::corrupt(key, format!("invalid member {}: {}", m, e)))
        })
        .collect()
}
