/// Shared types used across the codebase

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which part of the canon a book belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "testament", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Testament {
    Old,
    New,
    Custom,
}

impl Testament {
    /// Parse the wire form used by the admin API ("OLD", "NEW", "CUSTOM")
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OLD" => Some(Testament::Old),
            "NEW" => Some(Testament::New),
            "CUSTOM" => Some(Testament::Custom),
            _ => None,
        }
    }

    /// Seed files use lowercase labels; anything unknown is a custom book
    pub fn from_label(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "old" => Testament::Old,
            "new" => Testament::New,
            _ => Testament::Custom,
        }
    }

    pub fn as_lowercase(&self) -> &'static str {
        match self {
            Testament::Old => "old",
            Testament::New => "new",
            Testament::Custom => "custom",
        }
    }
}

/// Parent boundary an ordinal sequence is dense within.
///
/// Books live in the single global scope, chapters are scoped to their book
/// and verses to their chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Parent(Uuid),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Parent(id) => write!(f, "{}", id),
        }
    }
}
