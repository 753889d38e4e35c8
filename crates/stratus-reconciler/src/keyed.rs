//! Diff/apply for keyed rows.
//!
//! Given the keys currently persisted and the rows now declared, every
//! declared row is upserted and every persisted key that is no longer
//! declared is deleted. The plan is computed without I/O so it can be
//! checked on its own; [`reconcile_keyed`] applies it through a
//! [`KeyedRows`] implementation.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use stratus_db::{DbResult, ReconcilerConfigSpec};

/// A row identified by a string key.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for ReconcilerConfigSpec {
    fn key(&self) -> &str {
        &self.key
    }
}

/// What a reconciliation pass will do.
#[derive(Debug, PartialEq, Eq)]
pub struct KeyedPlan<'a, T> {
    /// Declared rows, first occurrence of each key, in declaration order.
    pub upserts: Vec<&'a T>,
    /// Persisted keys no longer declared, sorted.
    pub deletes: Vec<String>,
}

impl<T> KeyedPlan<'_, T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Compute the upserts and deletes that bring `existing` in line with
/// `declared`.
pub fn plan<'a, T, I>(existing: I, declared: &'a [T]) -> KeyedPlan<'a, T>
where
    T: Keyed,
    I: IntoIterator<Item = String>,
{
    let mut remaining: BTreeSet<String> = existing.into_iter().collect();
    let mut seen = HashSet::with_capacity(declared.len());
    let mut upserts = Vec::with_capacity(declared.len());

    for row in declared {
        if !seen.insert(row.key()) {
            continue;
        }
        remaining.remove(row.key());
        upserts.push(row);
    }

    KeyedPlan {
        upserts,
        deletes: remaining.into_iter().collect(),
    }
}

/// Storage for one set of keyed rows.
#[async_trait]
pub trait KeyedRows<T: Keyed + Sync>: Send {
    async fn existing_keys(&mut self) -> DbResult<Vec<String>>;

    async fn upsert(&mut self, row: &T) -> DbResult<()>;

    async fn delete(&mut self, keys: &[String]) -> DbResult<()>;
}

/// Counts of what [`reconcile_keyed`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedOutcome {
    pub upserted: usize,
    pub deleted: Vec<String>,
}

/// Bring `rows` in line with `declared`.
pub async fn reconcile_keyed<T, R>(rows: &mut R, declared: &[T]) -> DbResult<KeyedOutcome>
where
    T: Keyed + Sync,
    R: KeyedRows<T> + ?Sized,
{
    let existing = rows.existing_keys().await?;
    let plan = plan(existing, declared);

    for row in &plan.upserts {
        rows.upsert(row).await?;
    }
    if !plan.deletes.is_empty() {
        rows.delete(&plan.deletes).await?;
    }

    Ok(KeyedOutcome {
        upserted: plan.upserts.len(),
        deleted: plan.deletes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        key: String,
        value: u32,
    }

    impl Keyed for Row {
        fn key(&self) -> &str {
            &self.key
        }
    }

    fn row(key: &str, value: u32) -> Row {
        Row {
            key: key.to_string(),
            value,
        }
    }

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn test_plan_upserts_declared_and_deletes_leftovers() {
        let declared = vec![row("b", 1), row("c", 2)];
        let plan = plan(keys(&["a", "b"]), &declared);

        assert_eq!(plan.upserts, vec![&declared[0], &declared[1]]);
        assert_eq!(plan.deletes, keys(&["a"]));
    }

    #[test]
    fn test_plan_without_leftovers_has_no_deletes() {
        let declared = vec![row("a", 1), row("b", 2)];
        let plan = plan(keys(&["a", "b"]), &declared);

        assert!(plan.deletes.is_empty());
        assert!(plan.deletes.iter().all(|k| !k.is_empty()));
    }

    #[test]
    fn test_plan_never_invents_empty_keys() {
        // Three existing, two declared: exactly one delete and no padding.
        let declared = vec![row("a", 1), row("c", 3)];
        let plan = plan(keys(&["a", "b", "c"]), &declared);

        assert_eq!(plan.deletes, keys(&["b"]));
        assert!(!plan.deletes.contains(&String::new()));
    }

    #[test]
    fn test_plan_deletes_everything_when_nothing_declared() {
        let declared: Vec<Row> = Vec::new();
        let plan = plan(keys(&["z", "a"]), &declared);

        assert!(plan.upserts.is_empty());
        assert_eq!(plan.deletes, keys(&["a", "z"]));
    }

    #[test]
    fn test_plan_keeps_first_of_duplicate_keys() {
        let declared = vec![row("a", 1), row("a", 2)];
        let plan = plan(Vec::new(), &declared);

        assert_eq!(plan.upserts, vec![&declared[0]]);
    }

    #[test]
    fn test_empty_plan() {
        let declared: Vec<Row> = Vec::new();
        assert!(plan(Vec::new(), &declared).is_empty());
    }

    #[derive(Default)]
    struct MapRows {
        rows: BTreeMap<String, u32>,
        delete_calls: usize,
    }

    #[async_trait]
    impl KeyedRows<Row> for MapRows {
        async fn existing_keys(&mut self) -> DbResult<Vec<String>> {
            Ok(self.rows.keys().cloned().collect())
        }

        async fn upsert(&mut self, row: &Row) -> DbResult<()> {
            self.rows.insert(row.key.clone(), row.value);
            Ok(())
        }

        async fn delete(&mut self, keys: &[String]) -> DbResult<()> {
            self.delete_calls += 1;
            for key in keys {
                self.rows.remove(key);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reconcile_keyed_applies_plan() {
        let mut rows = MapRows::default();
        rows.rows.insert("old".into(), 0);
        rows.rows.insert("kept".into(), 0);

        let outcome = reconcile_keyed(&mut rows, &[row("kept", 5), row("new", 6)])
            .await
            .unwrap();

        assert_eq!(outcome.upserted, 2);
        assert_eq!(outcome.deleted, keys(&["old"]));
        assert_eq!(
            rows.rows.into_iter().collect::<Vec<_>>(),
            vec![("kept".to_string(), 5), ("new".to_string(), 6)]
        );
    }

    #[tokio::test]
    async fn test_reconcile_keyed_skips_empty_delete() {
        let mut rows = MapRows::default();
        rows.rows.insert("a".into(), 0);

        reconcile_keyed(&mut rows, &[row("a", 1)]).await.unwrap();

        assert_eq!(rows.delete_calls, 0);
    }
}
