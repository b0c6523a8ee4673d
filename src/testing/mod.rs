use uuid::Uuid;

use crate::config::AppConfig;
use crate::database::models::{Book, BookDraft};
use crate::database::{Database, Repository};
use crate::types::Testament;

/// Test utilities for database-backed tests.
///
/// Connects through `DATABASE_URL` and applies migrations. Every book made
/// through the context is deleted again by `cleanup`, taking its chapters
/// and verses with it.
pub struct TestContext {
    pub db: Database,
    pub books: Repository<Book>,
    created_books: Vec<Uuid>,
}

impl TestContext {
    /// `None` when no database is configured, so callers can skip
    pub async fn connect() -> Option<Self> {
        let _ = dotenvy::dotenv();
        let url = std::env::var("DATABASE_URL").ok()?;

        let mut config = AppConfig::from_env().database;
        config.url = url;

        let db = match Database::connect(&config).await {
            Ok(db) => db,
            Err(e) => {
                println!("Skipping database test, connection failed: {}", e);
                return None;
            }
        };
        if let Err(e) = db.migrate().await {
            println!("Skipping database test, migration failed: {}", e);
            return None;
        }

        Some(Self {
            books: Repository::new(&db),
            db,
            created_books: Vec::new(),
        })
    }

    /// Unique book appended to the global sequence
    pub async fn create_test_book(&mut self) -> anyhow::Result<Book> {
        let draft = BookDraft {
            name: self.generate_book_name(),
            testament: Testament::Custom,
        };
        let book = self.books.create(draft, None).await?;
        self.created_books.push(book.id);
        Ok(book)
    }

    pub fn track_book(&mut self, id: Uuid) {
        self.created_books.push(id);
    }

    fn generate_book_name(&self) -> String {
        format!("test_{}", Uuid::new_v4().simple())
    }

    pub async fn cleanup(&mut self) -> anyhow::Result<()> {
        for id in self.created_books.drain(..) {
            match self.books.delete(id).await {
                Ok(_) | Err(crate::database::DatabaseError::NotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_book_names_are_unique() {
        let Some(ctx) = TestContext::connect().await else {
            println!("DATABASE_URL not set, skipping");
            return;
        };
        assert_ne!(ctx.generate_book_name(), ctx.generate_book_name());
        assert!(ctx.generate_book_name().starts_with("test_"));
    }
}
