//! Dense ordinal maintenance for scoped sequences.
//!
//! Every ordered entity keeps a 1..N ordinal inside its scope. Planning is
//! pure: `plan_insert`, `plan_move` and `plan_remove` decide which contiguous
//! range has to shift and by how much. `OrdinalSequence` executes a plan
//! against Postgres inside the caller's transaction, after taking a
//! transaction-scoped advisory lock on the scope so that concurrent
//! mutations of one scope serialize while different scopes never contend.

use std::marker::PhantomData;

use sqlx::PgConnection;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::types::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OrdinalError {
    #[error("ordinal {requested} is outside 1..={max}")]
    OutOfRange { requested: i32, max: i64 },
}

/// Every ordinal in `start..=end` (or `start..` when `end` is `None`) moves by `delta`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: i32,
    pub end: Option<i32>,
    pub delta: i32,
}

impl Shift {
    pub fn covers(&self, ordinal: i32) -> bool {
        ordinal >= self.start && self.end.map_or(true, |end| ordinal <= end)
    }

    pub fn apply(&self, ordinal: i32) -> i32 {
        if self.covers(ordinal) {
            ordinal + self.delta
        } else {
            ordinal
        }
    }
}

/// Where an inserted entity lands and what has to make room for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub ordinal: i32,
    pub shift: Option<Shift>,
}

/// Plan an insert into a scope currently holding `count` entities.
///
/// No request appends at `count + 1`. A request must lie in `1..=count + 1`;
/// everything at or after it moves up by one.
pub fn plan_insert(count: i64, requested: Option<i32>) -> Result<Placement, OrdinalError> {
    let next = count + 1;

    let ordinal = match requested {
        None => i32::try_from(next).map_err(|_| OrdinalError::OutOfRange { requested: i32::MAX, max: next })?,
        Some(requested) if requested < 1 || i64::from(requested) > next => {
            return Err(OrdinalError::OutOfRange { requested, max: next })
        }
        Some(requested) => requested,
    };

    let shift = (i64::from(ordinal) <= count).then_some(Shift { start: ordinal, end: None, delta: 1 });
    Ok(Placement { ordinal, shift })
}

/// Plan moving the entity at `from` to `to` in a scope of `count` entities
/// (the moved entity included). Returns `None` when nothing else moves.
pub fn plan_move(count: i64, from: i32, to: i32) -> Result<Option<Shift>, OrdinalError> {
    if to < 1 || i64::from(to) > count {
        return Err(OrdinalError::OutOfRange { requested: to, max: count });
    }

    let shift = if to < from {
        Some(Shift { start: to, end: Some(from - 1), delta: 1 })
    } else if to > from {
        Some(Shift { start: from + 1, end: Some(to), delta: -1 })
    } else {
        None
    };
    Ok(shift)
}

/// Plan closing the gap left by removing the entity at `ordinal`
pub fn plan_remove(ordinal: i32) -> Shift {
    Shift { start: ordinal + 1, end: None, delta: -1 }
}

/// Table layout of an entity that carries a scoped ordinal
pub trait Ordered {
    const TABLE: &'static str;
    const ORDINAL: &'static str;
    /// Foreign key column naming the scope; `None` for the global scope
    const SCOPE: Option<&'static str>;
    /// Field name reported to clients when an ordinal is out of range
    const ORDINAL_LABEL: &'static str;
}

/// Executes ordinal plans for one scope of `T` on a transaction connection
pub struct OrdinalSequence<T> {
    scope: Scope,
    _phantom: PhantomData<T>,
}

impl<T: Ordered> OrdinalSequence<T> {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            _phantom: PhantomData,
        }
    }

    pub fn lock_key(&self) -> String {
        lock_key::<T>(self.scope)
    }

    /// Serialize with every other mutation of this scope until the transaction ends
    pub async fn lock(&self, conn: &mut PgConnection) -> Result<(), DatabaseError> {
        advisory_lock(conn, &self.lock_key()).await
    }

    pub async fn count(&self, conn: &mut PgConnection) -> Result<i64, DatabaseError> {
        let filter = self.filter()?;
        let sql = match filter {
            Some((column, _)) => format!("SELECT COUNT(*) FROM {} WHERE {} = $1", T::TABLE, column),
            None => format!("SELECT COUNT(*) FROM {}", T::TABLE),
        };

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some((_, id)) = filter {
            query = query.bind(id);
        }
        Ok(query.fetch_one(&mut *conn).await?)
    }

    /// Apply one range shift, returning the number of rows moved
    pub async fn shift(&self, conn: &mut PgConnection, shift: Shift) -> Result<u64, DatabaseError> {
        let filter = self.filter()?;
        let column = T::ORDINAL;

        let mut sql = format!(
            "UPDATE {} SET {column} = {column} + $1, updated_at = now() WHERE {column} >= $2",
            T::TABLE
        );
        let mut next = 3;
        if shift.end.is_some() {
            sql.push_str(&format!(" AND {column} <= ${next}"));
            next += 1;
        }
        if let Some((scope_column, _)) = filter {
            sql.push_str(&format!(" AND {scope_column} = ${next}"));
        }

        let mut query = sqlx::query(&sql).bind(shift.delta).bind(shift.start);
        if let Some(end) = shift.end {
            query = query.bind(end);
        }
        if let Some((_, id)) = filter {
            query = query.bind(id);
        }

        let moved = query.execute(&mut *conn).await?.rows_affected();
        debug!(
            "Shifted {} {} row(s) in scope {} by {} from {}",
            moved,
            T::TABLE,
            self.scope,
            shift.delta,
            shift.start
        );
        Ok(moved)
    }

    /// Reserve an ordinal for a new entity, making room when inserting mid-sequence.
    /// The scope must already be locked.
    pub async fn assign(&self, conn: &mut PgConnection, requested: Option<i32>) -> Result<i32, DatabaseError> {
        let count = self.count(conn).await?;
        let placement = plan_insert(count, requested).map_err(out_of_range::<T>)?;
        if let Some(shift) = placement.shift {
            self.shift(conn, shift).await?;
        }
        Ok(placement.ordinal)
    }

    /// Make room for moving an entity from `from` to `to`; the caller writes
    /// the entity's own ordinal. The scope must already be locked.
    pub async fn relocate(&self, conn: &mut PgConnection, from: i32, to: i32) -> Result<(), DatabaseError> {
        let count = self.count(conn).await?;
        if let Some(shift) = plan_move(count, from, to).map_err(out_of_range::<T>)? {
            self.shift(conn, shift).await?;
        }
        Ok(())
    }

    /// Close the gap left by the entity at `ordinal`. The scope must already be locked.
    pub async fn release(&self, conn: &mut PgConnection, ordinal: i32) -> Result<(), DatabaseError> {
        self.shift(conn, plan_remove(ordinal)).await?;
        Ok(())
    }

    fn filter(&self) -> Result<Option<(&'static str, Uuid)>, DatabaseError> {
        match (T::SCOPE, self.scope) {
            (Some(column), Scope::Parent(id)) => Ok(Some((column, id))),
            (None, Scope::Global) => Ok(None),
            _ => Err(DatabaseError::QueryError(format!(
                "scope {} does not apply to {}",
                self.scope,
                T::TABLE
            ))),
        }
    }
}

pub fn lock_key<T: Ordered>(scope: Scope) -> String {
    format!("{}:{}", T::TABLE, scope)
}

/// Lock several scopes of `T` in a stable order so two transactions touching
/// the same pair cannot deadlock
pub async fn lock_scopes<T: Ordered>(conn: &mut PgConnection, scopes: &[Scope]) -> Result<(), DatabaseError> {
    let mut keys: Vec<String> = scopes.iter().map(|scope| lock_key::<T>(*scope)).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        advisory_lock(conn, &key).await?;
    }
    Ok(())
}

async fn advisory_lock(conn: &mut PgConnection, key: &str) -> Result<(), DatabaseError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn out_of_range<T: Ordered>(err: OrdinalError) -> DatabaseError {
    match err {
        OrdinalError::OutOfRange { max, .. } => {
            DatabaseError::OutOfRange(format!("{} must be between 1 and {}", T::ORDINAL_LABEL, max))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// In-memory scope that applies plans the same way the UPDATE statements do
    #[derive(Debug, Default)]
    struct ScopeModel {
        entries: Vec<(u32, i32)>,
        next_id: u32,
    }

    impl ScopeModel {
        fn with_len(len: i32) -> Self {
            let mut model = Self::default();
            for _ in 0..len {
                model.insert(None).unwrap();
            }
            model
        }

        fn count(&self) -> i64 {
            self.entries.len() as i64
        }

        fn apply(&mut self, shift: Shift, except: Option<u32>) {
            for (id, ordinal) in self.entries.iter_mut() {
                if Some(*id) != except {
                    *ordinal = shift.apply(*ordinal);
                }
            }
        }

        fn insert(&mut self, requested: Option<i32>) -> Result<u32, OrdinalError> {
            let placement = plan_insert(self.count(), requested)?;
            if let Some(shift) = placement.shift {
                self.apply(shift, None);
            }
            self.next_id += 1;
            self.entries.push((self.next_id, placement.ordinal));
            Ok(self.next_id)
        }

        fn ordinal_of(&self, id: u32) -> i32 {
            self.entries.iter().find(|(e, _)| *e == id).map(|(_, o)| *o).unwrap()
        }

        fn id_at(&self, ordinal: i32) -> u32 {
            self.entries.iter().find(|(_, o)| *o == ordinal).map(|(e, _)| *e).unwrap()
        }

        fn relocate(&mut self, id: u32, to: i32) -> Result<(), OrdinalError> {
            let from = self.ordinal_of(id);
            if let Some(shift) = plan_move(self.count(), from, to)? {
                self.apply(shift, Some(id));
            }
            for entry in self.entries.iter_mut().filter(|(e, _)| *e == id) {
                entry.1 = to;
            }
            Ok(())
        }

        fn remove(&mut self, id: u32) {
            let ordinal = self.ordinal_of(id);
            self.entries.retain(|(e, _)| *e != id);
            self.apply(plan_remove(ordinal), None);
        }

        fn sorted_ordinals(&self) -> Vec<i32> {
            let mut ordinals: Vec<i32> = self.entries.iter().map(|(_, o)| *o).collect();
            ordinals.sort_unstable();
            ordinals
        }

        fn is_dense(&self) -> bool {
            self.sorted_ordinals() == (1..=self.entries.len() as i32).collect::<Vec<_>>()
        }
    }

    #[test]
    fn empty_scope_accepts_only_first_position() {
        assert_eq!(plan_insert(0, None).unwrap(), Placement { ordinal: 1, shift: None });
        assert_eq!(plan_insert(0, Some(1)).unwrap(), Placement { ordinal: 1, shift: None });
        assert_eq!(
            plan_insert(0, Some(2)),
            Err(OrdinalError::OutOfRange { requested: 2, max: 1 })
        );
        assert!(plan_insert(0, Some(0)).is_err());
    }

    #[test]
    fn insert_bounds() {
        // N + 1 appends without moving anything
        assert_eq!(plan_insert(5, Some(6)).unwrap(), Placement { ordinal: 6, shift: None });
        // N + 2 would leave a gap
        assert_eq!(
            plan_insert(5, Some(7)),
            Err(OrdinalError::OutOfRange { requested: 7, max: 6 })
        );
        assert!(plan_insert(5, Some(-1)).is_err());
    }

    #[test]
    fn insert_mid_sequence_shifts_tail_up() {
        let placement = plan_insert(5, Some(2)).unwrap();
        assert_eq!(placement.ordinal, 2);
        assert_eq!(placement.shift, Some(Shift { start: 2, end: None, delta: 1 }));
    }

    #[test]
    fn move_to_same_position_writes_nothing() {
        assert_eq!(plan_move(5, 3, 3).unwrap(), None);
    }

    #[test]
    fn move_outside_scope_is_rejected() {
        assert_eq!(plan_move(5, 2, 6), Err(OrdinalError::OutOfRange { requested: 6, max: 5 }));
        assert_eq!(plan_move(5, 2, 0), Err(OrdinalError::OutOfRange { requested: 0, max: 5 }));
    }

    #[test]
    fn move_forward_shifts_between_down() {
        let mut model = ScopeModel::with_len(5);
        let ids: Vec<u32> = (1..=5).map(|o| model.id_at(o)).collect();

        model.relocate(ids[1], 4).unwrap();

        assert_eq!(model.ordinal_of(ids[1]), 4);
        assert_eq!(model.ordinal_of(ids[2]), 2);
        assert_eq!(model.ordinal_of(ids[3]), 3);
        assert_eq!(model.ordinal_of(ids[0]), 1);
        assert_eq!(model.ordinal_of(ids[4]), 5);
        assert!(model.is_dense());
    }

    #[test]
    fn move_backward_shifts_between_up() {
        let shift = plan_move(5, 4, 2).unwrap().unwrap();
        assert_eq!(shift, Shift { start: 2, end: Some(3), delta: 1 });

        let mut model = ScopeModel::with_len(5);
        let moved = model.id_at(4);
        let was_second = model.id_at(2);
        model.relocate(moved, 2).unwrap();
        assert_eq!(model.ordinal_of(moved), 2);
        assert_eq!(model.ordinal_of(was_second), 3);
        assert!(model.is_dense());
    }

    #[test]
    fn delete_compacts_and_preserves_order() {
        let mut model = ScopeModel::with_len(5);
        let before: Vec<u32> = (1..=5).map(|o| model.id_at(o)).collect();

        model.remove(before[2]);

        let after: Vec<u32> = (1..=4).map(|o| model.id_at(o)).collect();
        assert_eq!(after, vec![before[0], before[1], before[3], before[4]]);
        assert_eq!(model.sorted_ordinals(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn shift_ranges() {
        let open = Shift { start: 3, end: None, delta: -1 };
        assert!(!open.covers(2));
        assert_eq!(open.apply(10), 9);

        let closed = Shift { start: 2, end: Some(4), delta: 1 };
        assert_eq!(closed.apply(1), 1);
        assert_eq!(closed.apply(4), 5);
        assert_eq!(closed.apply(5), 5);
    }

    #[test]
    fn scope_filter_matches_table_layout() {
        struct Global;
        impl Ordered for Global {
            const TABLE: &'static str = "books";
            const ORDINAL: &'static str = "order_index";
            const SCOPE: Option<&'static str> = None;
            const ORDINAL_LABEL: &'static str = "orderIndex";
        }

        assert!(OrdinalSequence::<Global>::new(Scope::Global).filter().unwrap().is_none());
        assert!(OrdinalSequence::<Global>::new(Scope::Parent(Uuid::new_v4())).filter().is_err());
        assert_eq!(OrdinalSequence::<Global>::new(Scope::Global).lock_key(), "books:global");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(Option<i32>),
        Move(usize, i32),
        Remove(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            proptest::option::of(-1i32..12).prop_map(Op::Insert),
            (0usize..16, -1i32..12).prop_map(|(pick, to)| Op::Move(pick, to)),
            (0usize..16).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn sequences_stay_dense(ops in proptest::collection::vec(op_strategy(), 1..64)) {
            let mut model = ScopeModel::default();

            for op in ops {
                match op {
                    Op::Insert(requested) => {
                        let count = model.count();
                        let result = model.insert(requested);
                        let valid = requested.map_or(true, |r| r >= 1 && i64::from(r) <= count + 1);
                        prop_assert_eq!(result.is_ok(), valid);
                    }
                    Op::Move(pick, to) => {
                        if model.entries.is_empty() {
                            continue;
                        }
                        let id = model.entries[pick % model.entries.len()].0;
                        let before = model.sorted_ordinals();
                        let valid = to >= 1 && i64::from(to) <= model.count();
                        let result = model.relocate(id, to);
                        prop_assert_eq!(result.is_ok(), valid);
                        if valid {
                            prop_assert_eq!(model.ordinal_of(id), to);
                        } else {
                            prop_assert_eq!(model.sorted_ordinals(), before);
                        }
                    }
                    Op::Remove(pick) => {
                        if model.entries.is_empty() {
                            continue;
                        }
                        let id = model.entries[pick % model.entries.len()].0;
                        model.remove(id);
                    }
                }
                prop_assert!(model.is_dense(), "ordinals not dense: {:?}", model.sorted_ordinals());
            }
        }

        #[test]
        fn moves_preserve_relative_order_of_others(
            (len, from, to) in (1i32..12).prop_flat_map(|len| (Just(len), 1..=len, 1..=len)),
        ) {
            let mut model = ScopeModel::with_len(len);
            let moved = model.id_at(from);
            let others: Vec<u32> = (1..=len).map(|o| model.id_at(o)).filter(|id| *id != moved).collect();

            model.relocate(moved, to).unwrap();

            let reordered: Vec<u32> = (1..=len).map(|o| model.id_at(o)).filter(|id| *id != moved).collect();
            prop_assert_eq!(others, reordered);
            prop_assert_eq!(model.ordinal_of(moved), to);
        }
    }
}
