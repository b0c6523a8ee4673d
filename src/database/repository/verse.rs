use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

use super::{Entity, Parent};
use crate::database::manager::DatabaseError;
use crate::database::models::{Verse, VerseDraft};
use crate::database::ordinal::Ordered;
use crate::types::Scope;

impl Ordered for Verse {
    const TABLE: &'static str = "verses";
    const ORDINAL: &'static str = "number";
    const SCOPE: Option<&'static str> = Some("chapter_id");
    const ORDINAL_LABEL: &'static str = "Verse number";
}

#[async_trait]
impl Entity for Verse {
    type Draft = VerseDraft;

    const LABEL: &'static str = "Verse";
    const PLURAL: &'static str = "Verses";
    const PARENT: Option<Parent> = Some(Parent {
        table: "chapters",
        label: "Chapter",
    });

    fn id(&self) -> Uuid {
        self.id
    }

    fn ordinal(&self) -> i32 {
        self.number
    }

    fn scope(&self) -> Scope {
        Scope::Parent(self.chapter_id)
    }

    fn draft_scope(draft: &VerseDraft) -> Scope {
        Scope::Parent(draft.chapter_id)
    }

    async fn insert(conn: &mut PgConnection, id: Uuid, ordinal: i32, draft: &VerseDraft) -> Result<Self, DatabaseError> {
        let verse = sqlx::query_as::<_, Verse>(
            "INSERT INTO verses (id, number, text, chapter_id) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(id)
        .bind(ordinal)
        .bind(&draft.text)
        .bind(draft.chapter_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(verse)
    }

    async fn overwrite(conn: &mut PgConnection, id: Uuid, ordinal: i32, draft: &VerseDraft) -> Result<Self, DatabaseError> {
        let verse = sqlx::query_as::<_, Verse>(
            "UPDATE verses
             SET number = $2, text = $3, chapter_id = $4, updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(ordinal)
        .bind(&draft.text)
        .bind(draft.chapter_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(verse)
    }
}
