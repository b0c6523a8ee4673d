//! Bulk import of a nested bible JSON document.
//!
//! Books are matched by name, chapters by (book, number) and verses by
//! (chapter, number); anything already present is left alone apart from the
//! book's testament and position. Each book is imported in its own
//! transaction under the same scope locks the API uses, so a seed can run
//! against a live database.

use std::path::Path;

use serde::Deserialize;
use sqlx::PgConnection;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::manager::{Database, DatabaseError};
use crate::database::models::{Book, BookDraft, Chapter, ChapterDraft, Verse, VerseDraft};
use crate::database::ordinal::{OrdinalSequence, Ordered};
use crate::database::repository::book::book_by_name;
use crate::database::repository::{fetch_by_ordinal, Entity};
use crate::types::{Scope, Testament};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid seed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid {field} '{value}' in book '{book}'")]
    InvalidNumber {
        book: String,
        field: &'static str,
        value: String,
    },

    #[error("Book '{book}' chapter {chapter}: {message}")]
    OutOfSequence {
        book: String,
        chapter: i32,
        message: String,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl SeedError {
    /// Name the book and chapter when a number leaves a gap in its sequence
    fn within(self, book: &str, chapter: i32) -> Self {
        match self {
            SeedError::Database(DatabaseError::OutOfRange(message)) => SeedError::OutOfSequence {
                book: book.to_string(),
                chapter,
                message,
            },
            other => other,
        }
    }
}

impl From<sqlx::Error> for SeedError {
    fn from(err: sqlx::Error) -> Self {
        SeedError::Database(err.into())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedBible {
    #[serde(default)]
    pub version: Option<String>,
    pub books: Vec<SeedBook>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedBook {
    pub name: String,
    pub testament: String,
    #[serde(default)]
    pub chapters: Vec<SeedChapter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedChapter {
    pub number: SeedNumber,
    #[serde(default)]
    pub verses: Vec<SeedVerse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedVerse {
    pub number: SeedNumber,
    pub text: String,
}

/// Numbers appear both as JSON integers and as strings in published data sets
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SeedNumber {
    Int(i32),
    Text(String),
}

impl SeedNumber {
    pub fn value(&self) -> Option<i32> {
        match self {
            SeedNumber::Int(n) => Some(*n),
            SeedNumber::Text(s) => s.trim().parse().ok(),
        }
    }

    fn raw(&self) -> String {
        match self {
            SeedNumber::Int(n) => n.to_string(),
            SeedNumber::Text(s) => s.clone(),
        }
    }
}

/// What a seed run wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub books_created: usize,
    pub books_updated: usize,
    pub chapters_created: usize,
    pub verses_created: usize,
    pub verses_skipped: usize,
}

pub fn parse(content: &str) -> Result<SeedBible, SeedError> {
    Ok(serde_json::from_str(content)?)
}

pub async fn seed_file(db: &Database, path: impl AsRef<Path>) -> Result<SeedReport, SeedError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let bible = parse(&content)?;
    info!(
        "Seeding {} book(s) from {}{}",
        bible.books.len(),
        path.as_ref().display(),
        bible.version.as_deref().map(|v| format!(" ({})", v)).unwrap_or_default()
    );
    seed(db, &bible).await
}

pub async fn seed(db: &Database, bible: &SeedBible) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    for (index, book) in bible.books.iter().enumerate() {
        let position = i32::try_from(index + 1).unwrap_or(i32::MAX);

        let mut tx = db.pool().begin().await?;
        seed_book(&mut tx, book, position, &mut report).await?;
        tx.commit().await?;

        info!("Seeded {} ({} chapter(s))", book.name, book.chapters.len());
    }

    info!(
        "Seed complete: {} book(s) created, {} updated, {} chapter(s), {} verse(s) created, {} skipped",
        report.books_created, report.books_updated, report.chapters_created, report.verses_created, report.verses_skipped
    );
    Ok(report)
}

async fn seed_book(
    conn: &mut PgConnection,
    seed: &SeedBook,
    position: i32,
    report: &mut SeedReport,
) -> Result<(), SeedError> {
    let books = OrdinalSequence::<Book>::new(Scope::Global);
    books.lock(conn).await?;

    let draft = BookDraft {
        name: seed.name.clone(),
        testament: Testament::from_label(&seed.testament),
    };

    let existing = book_by_name(conn, &seed.name).await?;
    let count = books.count(conn).await?;
    let target = book_position(position, count, existing.as_ref().map(|book| book.order_index));

    let book = match existing {
        Some(existing) => {
            books.relocate(conn, existing.order_index, target).await?;
            report.books_updated += 1;
            Book::overwrite(conn, existing.id, target, &draft).await?
        }
        None => {
            let ordinal = books.assign(conn, Some(target)).await?;
            report.books_created += 1;
            Book::insert(conn, Uuid::new_v4(), ordinal, &draft).await?
        }
    };

    for chapter in &seed.chapters {
        let number = number_of(&book.name, "chapter number", &chapter.number)?;
        let chapter_id = seed_chapter(conn, book.id, number, report)
            .await
            .map_err(|e| e.within(&book.name, number))?;

        for verse in &chapter.verses {
            let verse_number = number_of(&book.name, "verse number", &verse.number)?;
            seed_verse(conn, chapter_id, verse_number, &verse.text, report)
                .await
                .map_err(|e| e.within(&book.name, number))?;
        }
    }

    Ok(())
}

async fn seed_chapter(
    conn: &mut PgConnection,
    book_id: Uuid,
    number: i32,
    report: &mut SeedReport,
) -> Result<Uuid, SeedError> {
    let scope = Scope::Parent(book_id);
    if let Some(existing) = fetch_by_ordinal::<Chapter>(conn, scope, number).await? {
        return Ok(existing.id);
    }

    let chapters = OrdinalSequence::<Chapter>::new(scope);
    chapters.lock(conn).await?;
    let ordinal = chapters.assign(conn, Some(number)).await?;
    let chapter = Chapter::insert(conn, Uuid::new_v4(), ordinal, &ChapterDraft { book_id }).await?;
    report.chapters_created += 1;
    Ok(chapter.id)
}

async fn seed_verse(
    conn: &mut PgConnection,
    chapter_id: Uuid,
    number: i32,
    text: &str,
    report: &mut SeedReport,
) -> Result<(), SeedError> {
    let scope = Scope::Parent(chapter_id);
    if fetch_by_ordinal::<Verse>(conn, scope, number).await?.is_some() {
        debug!("Verse {} already present in {} {}", number, Chapter::TABLE, chapter_id);
        report.verses_skipped += 1;
        return Ok(());
    }

    let verses = OrdinalSequence::<Verse>::new(scope);
    verses.lock(conn).await?;
    let ordinal = verses.assign(conn, Some(number)).await?;
    let draft = VerseDraft {
        chapter_id,
        text: text.to_string(),
    };
    Verse::insert(conn, Uuid::new_v4(), ordinal, &draft).await?;
    report.verses_created += 1;
    Ok(())
}

/// Where a seeded book lands among `count` books. An existing book moves to
/// its file position only when that position is already occupied; a new book
/// is clamped so the sequence stays dense.
fn book_position(position: i32, count: i64, existing: Option<i32>) -> i32 {
    match existing {
        Some(_) if i64::from(position) <= count => position,
        Some(current) => current,
        None => position.min(i32::try_from(count + 1).unwrap_or(i32::MAX)),
    }
}

fn number_of(book: &str, field: &'static str, number: &SeedNumber) -> Result<i32, SeedError> {
    number.value().ok_or_else(|| SeedError::InvalidNumber {
        book: book.to_string(),
        field,
        value: number.raw(),
    })
}
