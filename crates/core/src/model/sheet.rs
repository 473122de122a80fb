use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::SheetId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SheetError {
    #[error("spreadsheet id cannot be empty")]
    EmptySpreadsheetId,

    #[error("sheet name cannot be empty")]
    EmptyName,
}

/// Identity of a sheet tab on the remote side.
///
/// Two widgets pointing at the same `SheetRemoteId` share one local `Sheet`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetRemoteId {
    spreadsheet_id: String,
    sheet_index: u32,
}

impl SheetRemoteId {
    /// Build a remote id, trimming the spreadsheet id.
    ///
    /// # Errors
    ///
    /// Returns `SheetError::EmptySpreadsheetId` when the id is blank.
    pub fn new(spreadsheet_id: impl Into<String>, sheet_index: u32) -> Result<Self, SheetError> {
        let spreadsheet_id = spreadsheet_id.into().trim().to_owned();
        if spreadsheet_id.is_empty() {
            return Err(SheetError::EmptySpreadsheetId);
        }
        Ok(Self {
            spreadsheet_id,
            sheet_index,
        })
    }

    #[must_use]
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    #[must_use]
    pub fn sheet_index(&self) -> u32 {
        self.sheet_index
    }
}

impl fmt::Display for SheetRemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.spreadsheet_id, self.sheet_index)
    }
}

/// A sheet that has not been persisted yet, so it carries no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSheet {
    remote_id: SheetRemoteId,
    name: String,
}

impl NewSheet {
    /// # Errors
    ///
    /// Returns `SheetError::EmptyName` when the display name is blank.
    pub fn new(remote_id: SheetRemoteId, name: impl Into<String>) -> Result<Self, SheetError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SheetError::EmptyName);
        }
        Ok(Self { remote_id, name })
    }

    #[must_use]
    pub fn remote_id(&self) -> &SheetRemoteId {
        &self.remote_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a store-assigned id. The sheet starts out never synchronized.
    #[must_use]
    pub fn into_sheet(self, id: SheetId) -> Sheet {
        Sheet {
            id,
            remote_id: self.remote_id,
            name: self.name,
            last_synchronized_at: None,
        }
    }
}

/// One remote sheet tab cached locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    id: SheetId,
    remote_id: SheetRemoteId,
    name: String,
    last_synchronized_at: Option<DateTime<Utc>>,
}

impl Sheet {
    /// Rehydrate a sheet from storage without re-validating it.
    #[must_use]
    pub fn from_persisted(
        id: SheetId,
        remote_id: SheetRemoteId,
        name: String,
        last_synchronized_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            remote_id,
            name,
            last_synchronized_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> SheetId {
        self.id
    }

    #[must_use]
    pub fn remote_id(&self) -> &SheetRemoteId {
        &self.remote_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn last_synchronized_at(&self) -> Option<DateTime<Utc>> {
        self.last_synchronized_at
    }

    pub fn mark_synchronized(&mut self, at: DateTime<Utc>) {
        self.last_synchronized_at = Some(at);
    }
}
