//! Read models served to the public app.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bible {
    pub version: String,
    pub books: Vec<BibleBook>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BibleBook {
    pub name: String,
    /// Lowercase testament label ("old", "new", "custom")
    pub testament: String,
    pub chapters: Vec<BibleChapter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BibleChapter {
    pub number: i32,
    pub verses: Vec<BibleVerse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BibleVerse {
    pub number: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentUpdate {
    pub has_recent_update: bool,
    pub latest_timestamp: Option<DateTime<Utc>>,
}
