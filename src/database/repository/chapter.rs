use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use super::{Entity, Parent};
use crate::database::manager::DatabaseError;
use crate::database::models::{Chapter, ChapterDraft};
use crate::database::ordinal::Ordered;
use crate::types::Scope;

impl Ordered for Chapter {
    const TABLE: &'static str = "chapters";
    const ORDINAL: &'static str = "number";
    const SCOPE: Option<&'static str> = Some("book_id");
    const ORDINAL_LABEL: &'static str = "Chapter number";
}

#[async_trait]
impl Entity for Chapter {
    type Draft = ChapterDraft;

    const LABEL: &'static str = "Chapter";
    const PLURAL: &'static str = "Chapters";
    const PARENT: Option<Parent> = Some(Parent {
        table: "books",
        label: "Book",
    });

    fn id(&self) -> Uuid {
        self.id
    }

    fn ordinal(&self) -> i32 {
        self.number
    }

    fn scope(&self) -> Scope {
        Scope::Parent(self.book_id)
    }

    fn draft_scope(draft: &ChapterDraft) -> Scope {
        Scope::Parent(draft.book_id)
    }

    async fn insert(
        conn: &mut PgConnection,
        id: Uuid,
        ordinal: i32,
        draft: &ChapterDraft,
    ) -> Result<Self, DatabaseError> {
        let chapter = sqlx::query_as::<_, Chapter>(
            "INSERT INTO chapters (id, number, book_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(id)
        .bind(ordinal)
        .bind(draft.book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(chapter)
    }

    async fn overwrite(
        conn: &mut PgConnection,
        id: Uuid,
        ordinal: i32,
        draft: &ChapterDraft,
    ) -> Result<Self, DatabaseError> {
        let chapter = sqlx::query_as::<_, Chapter>(
            "UPDATE chapters SET number = $2, book_id = $3, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(ordinal)
        .bind(draft.book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(chapter)
    }
}
