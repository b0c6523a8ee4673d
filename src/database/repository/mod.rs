use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::manager::{Database, DatabaseError};
use crate::database::ordinal::{lock_scopes, OrdinalSequence, Ordered};
use crate::types::Scope;

pub mod admin;
pub mod book;
pub mod chapter;
pub mod verse;

pub use admin::AdminRepository;

/// Times `lock_entity` re-reads a row whose scope moved while it waited for a lock
const LOCK_ATTEMPTS: usize = 3;

/// Table that owns the scope of a child entity
#[derive(Debug, Clone, Copy)]
pub struct Parent {
    pub table: &'static str,
    pub label: &'static str,
}

/// A persisted row with a dense ordinal inside its scope.
///
/// Implementors describe their table through `Ordered` and provide the two
/// statements that write content columns; `Repository` owns locking and
/// ordinal bookkeeping around them.
#[async_trait]
pub trait Entity: Ordered + for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + 'static {
    /// Client-supplied content, everything except id and ordinal
    type Draft: Send + Sync;

    const LABEL: &'static str;
    const PLURAL: &'static str;
    const PARENT: Option<Parent>;

    fn id(&self) -> Uuid;
    fn ordinal(&self) -> i32;
    fn scope(&self) -> Scope;
    fn draft_scope(draft: &Self::Draft) -> Scope;

    async fn insert(conn: &mut PgConnection, id: Uuid, ordinal: i32, draft: &Self::Draft) -> Result<Self, DatabaseError>;

    async fn overwrite(conn: &mut PgConnection, id: Uuid, ordinal: i32, draft: &Self::Draft) -> Result<Self, DatabaseError>;
}

pub struct Repository<T> {
    pool: PgPool,
    _phantom: PhantomData<T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            _phantom: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<T>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch::<T>(&mut conn, id).await
    }

    /// Fetch by id, 404 when absent
    pub async fn get(&self, id: Uuid) -> Result<T, DatabaseError> {
        self.find(id).await?.ok_or_else(not_found::<T>)
    }

    /// Natural-key lookup: the entity at `ordinal` within `scope`
    pub async fn find_by_ordinal(&self, scope: Scope, ordinal: i32) -> Result<Option<T>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_ordinal::<T>(&mut conn, scope, ordinal).await
    }

    /// All entities, optionally narrowed to one parent, in ordinal order.
    /// An empty result is reported as NotFound.
    pub async fn list(&self, parent: Option<Uuid>) -> Result<Vec<T>, DatabaseError> {
        let order = match T::SCOPE {
            Some(scope_column) => format!("{}, {}", scope_column, T::ORDINAL),
            None => T::ORDINAL.to_string(),
        };

        let rows = match (T::SCOPE, parent) {
            (Some(scope_column), Some(parent_id)) => {
                let sql = format!("SELECT * FROM {} WHERE {} = $1 ORDER BY {}", T::TABLE, scope_column, order);
                sqlx::query_as::<_, T>(&sql).bind(parent_id).fetch_all(&self.pool).await?
            }
            _ => {
                let sql = format!("SELECT * FROM {} ORDER BY {}", T::TABLE, order);
                sqlx::query_as::<_, T>(&sql).fetch_all(&self.pool).await?
            }
        };

        if rows.is_empty() {
            return Err(DatabaseError::NotFound(format!("{} not found", T::PLURAL)));
        }
        Ok(rows)
    }

    /// Insert at `requested` (or append), shifting later siblings up
    pub async fn create(&self, draft: T::Draft, requested: Option<i32>) -> Result<T, DatabaseError> {
        let scope = T::draft_scope(&draft);
        let sequence = OrdinalSequence::<T>::new(scope);

        let mut tx = self.pool.begin().await?;
        sequence.lock(&mut tx).await?;
        ensure_scope::<T>(&mut tx, scope).await?;

        let ordinal = sequence.assign(&mut tx, requested).await?;
        let entity = T::insert(&mut tx, Uuid::new_v4(), ordinal, &draft).await?;
        tx.commit().await?;

        info!("Created {} {} at {} in scope {}", T::LABEL, entity.id(), ordinal, scope);
        Ok(entity)
    }

    /// Overwrite content and move to `ordinal`, possibly in another scope.
    ///
    /// Within one scope the siblings between the old and new position shift
    /// by one. Across scopes the old scope closes its gap and the new scope
    /// makes room, both inside the same transaction.
    pub async fn update(&self, id: Uuid, draft: T::Draft, ordinal: i32) -> Result<T, DatabaseError> {
        let target = T::draft_scope(&draft);

        let mut tx = self.pool.begin().await?;
        let current = lock_entity::<T>(&mut tx, id, Some(target)).await?;
        ensure_scope::<T>(&mut tx, target).await?;

        let source = current.scope();
        let from = current.ordinal();
        if source == target {
            OrdinalSequence::<T>::new(target).relocate(&mut tx, from, ordinal).await?;
        } else {
            OrdinalSequence::<T>::new(target).assign(&mut tx, Some(ordinal)).await?;
            OrdinalSequence::<T>::new(source).release(&mut tx, from).await?;
        }

        let entity = T::overwrite(&mut tx, id, ordinal, &draft).await?;
        tx.commit().await?;

        info!("Updated {} {}: {}@{} -> {}@{}", T::LABEL, id, source, from, target, ordinal);
        Ok(entity)
    }

    /// Remove the entity and close the gap it leaves. Children go with it
    /// through the cascading foreign keys.
    pub async fn delete(&self, id: Uuid) -> Result<T, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let current = lock_entity::<T>(&mut tx, id, None).await?;

        let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        OrdinalSequence::<T>::new(current.scope()).release(&mut tx, current.ordinal()).await?;
        tx.commit().await?;

        info!("Deleted {} {} from scope {}", T::LABEL, id, current.scope());
        Ok(current)
    }
}

pub(crate) fn not_found<T: Entity>() -> DatabaseError {
    DatabaseError::NotFound(format!("{} not found", T::LABEL))
}

pub(crate) async fn fetch<T: Entity>(conn: &mut PgConnection, id: Uuid) -> Result<Option<T>, DatabaseError> {
    let sql = format!("SELECT * FROM {} WHERE id = $1", T::TABLE);
    Ok(sqlx::query_as::<_, T>(&sql).bind(id).fetch_optional(&mut *conn).await?)
}

pub(crate) async fn fetch_by_ordinal<T: Entity>(
    conn: &mut PgConnection,
    scope: Scope,
    ordinal: i32,
) -> Result<Option<T>, DatabaseError> {
    let row = match (T::SCOPE, scope) {
        (Some(scope_column), Scope::Parent(parent_id)) => {
            let sql = format!("SELECT * FROM {} WHERE {} = $1 AND {} = $2", T::TABLE, scope_column, T::ORDINAL);
            sqlx::query_as::<_, T>(&sql)
                .bind(parent_id)
                .bind(ordinal)
                .fetch_optional(&mut *conn)
                .await?
        }
        (None, Scope::Global) => {
            let sql = format!("SELECT * FROM {} WHERE {} = $1", T::TABLE, T::ORDINAL);
            sqlx::query_as::<_, T>(&sql).bind(ordinal).fetch_optional(&mut *conn).await?
        }
        _ => return Err(scope_mismatch::<T>(scope)),
    };
    Ok(row)
}

/// Lock the scope an entity currently lives in (plus `target`, if any) and
/// return the entity as seen after the locks are held.
///
/// The scope is read before locking, so a concurrent move can change it in
/// between; in that case the row is re-read and the new scope locked too.
async fn lock_entity<T: Entity>(conn: &mut PgConnection, id: Uuid, target: Option<Scope>) -> Result<T, DatabaseError> {
    let mut seen = fetch::<T>(conn, id).await?.ok_or_else(not_found::<T>)?;

    for attempt in 1..=LOCK_ATTEMPTS {
        let scope = seen.scope();
        let scopes: Vec<Scope> = std::iter::once(scope).chain(target).collect();
        lock_scopes::<T>(conn, &scopes).await?;

        let fresh = fetch::<T>(conn, id).await?.ok_or_else(not_found::<T>)?;
        if fresh.scope() == scope {
            return Ok(fresh);
        }
        debug!("{} {} moved scope while locking (attempt {})", T::LABEL, id, attempt);
        seen = fresh;
    }

    Err(DatabaseError::Conflict(format!(
        "{} was modified concurrently, please retry",
        T::LABEL
    )))
}

/// Verify the parent row exists and hold it against deletion until commit
async fn ensure_scope<T: Entity>(conn: &mut PgConnection, scope: Scope) -> Result<(), DatabaseError> {
    match (T::PARENT, scope) {
        (None, Scope::Global) => Ok(()),
        (Some(parent), Scope::Parent(parent_id)) => {
            let sql = format!("SELECT id FROM {} WHERE id = $1 FOR KEY SHARE", parent.table);
            let found: Option<Uuid> = sqlx::query_scalar(&sql)
                .bind(parent_id)
                .fetch_optional(&mut *conn)
                .await?;
            found
                .map(|_| ())
                .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", parent.label)))
        }
        _ => Err(scope_mismatch::<T>(scope)),
    }
}

fn scope_mismatch<T: Entity>(scope: Scope) -> DatabaseError {
    DatabaseError::QueryError(format!("scope {} does not apply to {}", scope, T::TABLE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{Chapter, ChapterDraft, Verse, VerseDraft};
    use crate::testing::TestContext;

    async fn chapter_ids(chapters: &Repository<Chapter>, book_id: Uuid) -> Vec<Uuid> {
        match chapters.list(Some(book_id)).await {
            Ok(rows) => {
                let numbers: Vec<i32> = rows.iter().map(|c| c.number).collect();
                assert_eq!(numbers, (1..=rows.len() as i32).collect::<Vec<_>>(), "chapters not dense");
                rows.into_iter().map(|c| c.id).collect()
            }
            Err(DatabaseError::NotFound(_)) => Vec::new(),
            Err(e) => panic!("listing chapters failed: {}", e),
        }
    }

    async fn with_chapters(ctx: &mut TestContext, n: usize) -> (Uuid, Repository<Chapter>, Vec<Uuid>) {
        let book = ctx.create_test_book().await.unwrap();
        let chapters = Repository::<Chapter>::new(&ctx.db);
        for _ in 0..n {
            chapters.create(ChapterDraft { book_id: book.id }, None).await.unwrap();
        }
        let ids = chapter_ids(&chapters, book.id).await;
        (book.id, chapters, ids)
    }

    #[tokio::test]
    async fn insert_mid_sequence_shifts_later_chapters() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (book_id, chapters, before) = with_chapters(&mut ctx, 5).await;

        let inserted = chapters.create(ChapterDraft { book_id }, Some(2)).await.unwrap();
        assert_eq!(inserted.number, 2);

        let after = chapter_ids(&chapters, book_id).await;
        assert_eq!(after, vec![before[0], inserted.id, before[1], before[2], before[3], before[4]]);

        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn insert_bounds_are_enforced() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (book_id, chapters, _) = with_chapters(&mut ctx, 3).await;

        let err = chapters.create(ChapterDraft { book_id }, Some(5)).await.unwrap_err();
        assert_eq!(err.to_string(), "Chapter number must be between 1 and 4");

        let appended = chapters.create(ChapterDraft { book_id }, Some(4)).await.unwrap();
        assert_eq!(appended.number, 4);

        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn move_forward_and_delete_keep_order() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (book_id, chapters, ids) = with_chapters(&mut ctx, 5).await;

        let moved = chapters.update(ids[1], ChapterDraft { book_id }, 4).await.unwrap();
        assert_eq!(moved.number, 4);
        assert_eq!(chapter_ids(&chapters, book_id).await, vec![ids[0], ids[2], ids[3], ids[1], ids[4]]);

        chapters.delete(ids[2]).await.unwrap();
        assert_eq!(chapter_ids(&chapters, book_id).await, vec![ids[0], ids[3], ids[1], ids[4]]);

        let err = chapters.update(ids[0], ChapterDraft { book_id }, 5).await.unwrap_err();
        assert!(matches!(err, DatabaseError::OutOfRange(_)));

        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn same_position_update_moves_nothing() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (book_id, chapters, ids) = with_chapters(&mut ctx, 3).await;
        let before = chapters.get(ids[0]).await.unwrap();

        chapters.update(ids[1], ChapterDraft { book_id }, 2).await.unwrap();

        let after = chapters.get(ids[0]).await.unwrap();
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(chapter_ids(&chapters, book_id).await, ids);

        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn moving_between_books_closes_and_opens_gaps() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (source, chapters, source_ids) = with_chapters(&mut ctx, 3).await;
        let target = ctx.create_test_book().await.unwrap().id;
        let existing = chapters.create(ChapterDraft { book_id: target }, None).await.unwrap();

        let moved = chapters
            .update(source_ids[0], ChapterDraft { book_id: target }, 1)
            .await
            .unwrap();
        assert_eq!(moved.book_id, target);
        assert_eq!(moved.number, 1);

        assert_eq!(chapter_ids(&chapters, source).await, vec![source_ids[1], source_ids[2]]);
        assert_eq!(chapter_ids(&chapters, target).await, vec![source_ids[0], existing.id]);

        // N + 1 of the target scope is the furthest a moved chapter may land
        let err = chapters
            .update(source_ids[1], ChapterDraft { book_id: target }, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::OutOfRange(_)));

        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn missing_parent_and_empty_scope_are_not_found() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let book = ctx.create_test_book().await.unwrap();
        let chapters = Repository::<Chapter>::new(&ctx.db);
        let verses = Repository::<Verse>::new(&ctx.db);

        let err = chapters.list(Some(book.id)).await.unwrap_err();
        assert_eq!(err.to_string(), "Chapters not found");

        let err = chapters
            .create(ChapterDraft { book_id: Uuid::new_v4() }, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Book not found");

        let draft = VerseDraft {
            chapter_id: Uuid::new_v4(),
            text: "In the beginning".into(),
        };
        assert_eq!(verses.create(draft, None).await.unwrap_err().to_string(), "Chapter not found");

        let err = chapters.delete(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.to_string(), "Chapter not found");

        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn natural_keys_resolve() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (book_id, chapters, ids) = with_chapters(&mut ctx, 2).await;

        let second = chapters.find_by_ordinal(Scope::Parent(book_id), 2).await.unwrap().unwrap();
        assert_eq!(second.id, ids[1]);
        assert!(chapters.find_by_ordinal(Scope::Parent(book_id), 3).await.unwrap().is_none());

        let book = ctx.books.get(book_id).await.unwrap();
        let by_name = ctx.books.find_by_name(&book.name).await.unwrap().unwrap();
        assert_eq!(by_name.id, book_id);

        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn deleting_a_book_cascades() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (book_id, chapters, ids) = with_chapters(&mut ctx, 1).await;
        let verses = Repository::<Verse>::new(&ctx.db);
        let verse = verses
            .create(
                VerseDraft {
                    chapter_id: ids[0],
                    text: "Blessed is the man".into(),
                },
                None,
            )
            .await
            .unwrap();

        ctx.books.delete(book_id).await.unwrap();

        assert!(chapters.find(ids[0]).await.unwrap().is_none());
        assert!(verses.find(verse.id).await.unwrap().is_none());
        ctx.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_relocations_stay_dense() {
        let Some(mut ctx) = TestContext::connect().await else { return };
        let (book_id, chapters, ids) = with_chapters(&mut ctx, 6).await;

        let draft = || ChapterDraft { book_id };
        let (a, b, c, d) = tokio::join!(
            chapters.update(ids[0], draft(), 6),
            chapters.update(ids[5], draft(), 1),
            chapters.update(ids[2], draft(), 4),
            chapters.create(draft(), Some(3)),
        );
        for result in [a, b, c, d] {
            result.unwrap();
        }

        let after = chapter_ids(&chapters, book_id).await;
        assert_eq!(after.len(), 7);

        ctx.cleanup().await.unwrap();
    }
}
