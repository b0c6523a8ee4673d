use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use super::{Entity, Parent, Repository};
use crate::database::manager::DatabaseError;
use crate::database::models::{Book, BookDraft};
use crate::database::ordinal::Ordered;
use crate::types::Scope;

impl Ordered for Book {
    const TABLE: &'static str = "books";
    const ORDINAL: &'static str = "order_index";
    const SCOPE: Option<&'static str> = None;
    const ORDINAL_LABEL: &'static str = "orderIndex";
}

#[async_trait]
impl Entity for Book {
    type Draft = BookDraft;

    const LABEL: &'static str = "Book";
    const PLURAL: &'static str = "Books";
    const PARENT: Option<Parent> = None;

    fn id(&self) -> Uuid {
        self.id
    }

    fn ordinal(&self) -> i32 {
        self.order_index
    }

    fn scope(&self) -> Scope {
        Scope::Global
    }

    fn draft_scope(_draft: &BookDraft) -> Scope {
        Scope::Global
    }

    async fn insert(conn: &mut PgConnection, id: Uuid, ordinal: i32, draft: &BookDraft) -> Result<Self, DatabaseError> {
        let book = sqlx::query_as::<_, Book>(
            "INSERT INTO books (id, name, testament, order_index)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(draft.testament)
        .bind(ordinal)
        .fetch_one(&mut *conn)
        .await?;
        Ok(book)
    }

    async fn overwrite(conn: &mut PgConnection, id: Uuid, ordinal: i32, draft: &BookDraft) -> Result<Self, DatabaseError> {
        let book = sqlx::query_as::<_, Book>(
            "UPDATE books
             SET name = $2, testament = $3, order_index = $4, updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&draft.name)
        .bind(draft.testament)
        .bind(ordinal)
        .fetch_one(&mut *conn)
        .await?;
        Ok(book)
    }
}

impl Repository<Book> {
    /// Natural-key lookup by unique name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Book>, DatabaseError> {
        let mut conn = self.pool().acquire().await?;
        book_by_name(&mut conn, name).await
    }
}

pub(crate) async fn book_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Book>, DatabaseError> {
    let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(book)
}
