//! Nested read of the whole corpus for the public app.

use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Bible, BibleBook, BibleChapter, BibleVerse, RecentUpdate};
use crate::types::Testament;

/// One row of the books/chapters/verses left join
#[derive(Debug, Clone, FromRow)]
pub struct BibleRow {
    pub book_id: Uuid,
    pub book_name: String,
    pub testament: Testament,
    pub chapter_id: Option<Uuid>,
    pub chapter_number: Option<i32>,
    pub verse_number: Option<i32>,
    pub verse_text: Option<String>,
}

/// Load every book with its chapters and verses, all in ordinal order
pub async fn load(pool: &PgPool, version: &str) -> Result<Bible, DatabaseError> {
    let rows = sqlx::query_as::<_, BibleRow>(
        "SELECT b.id AS book_id, b.name AS book_name, b.testament,
                c.id AS chapter_id, c.number AS chapter_number,
                v.number AS verse_number, v.text AS verse_text
         FROM books b
         LEFT JOIN chapters c ON c.book_id = b.id
         LEFT JOIN verses v ON v.chapter_id = c.id
         ORDER BY b.order_index, c.number, v.number",
    )
    .fetch_all(pool)
    .await?;

    Ok(assemble(rows, version))
}

/// Fold ordered join rows into the nested shape. Rows must arrive grouped by
/// book, then chapter, which the ORDER BY above guarantees.
pub fn assemble(rows: Vec<BibleRow>, version: &str) -> Bible {
    let mut books: Vec<BibleBook> = Vec::new();
    let mut current_book: Option<Uuid> = None;
    let mut current_chapter: Option<Uuid> = None;

    for row in rows {
        if current_book != Some(row.book_id) {
            current_book = Some(row.book_id);
            current_chapter = None;
            books.push(BibleBook {
                name: row.book_name,
                testament: row.testament.as_lowercase().to_string(),
                chapters: Vec::new(),
            });
        }
        let Some(book) = books.last_mut() else { continue };

        let (Some(chapter_id), Some(chapter_number)) = (row.chapter_id, row.chapter_number) else {
            continue;
        };
        if current_chapter != Some(chapter_id) {
            current_chapter = Some(chapter_id);
            book.chapters.push(BibleChapter {
                number: chapter_number,
                verses: Vec::new(),
            });
        }
        let Some(chapter) = book.chapters.last_mut() else { continue };

        if let (Some(number), Some(text)) = (row.verse_number, row.verse_text) {
            chapter.verses.push(BibleVerse { number, text });
        }
    }

    Bible {
        version: version.to_string(),
        books,
    }
}

/// Whether anything changed within `window_secs`, and the latest change time
pub async fn recent_update(pool: &PgPool, window_secs: i64) -> Result<RecentUpdate, DatabaseError> {
    let since = Utc::now() - Duration::seconds(window_secs);

    let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT GREATEST(
            (SELECT max(updated_at) FROM books WHERE updated_at > $1),
            (SELECT max(updated_at) FROM chapters WHERE updated_at > $1),
            (SELECT max(updated_at) FROM verses WHERE updated_at > $1)
         )",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(RecentUpdate {
        has_recent_update: latest.is_some(),
        latest_timestamp: latest,
    })
}
