//! Set comparison between local records and external observations

use crate::model::Externalized;
use std::collections::{HashMap, VecDeque};

/// The four disjoint buckets of a set comparison.
///
/// `matched_local[i]` and `matched_external[i]` describe the same object.
#[derive(Debug)]
pub struct SetDiff<L, E> {
    /// Local records with no external counterpart
    pub removed: Vec<L>,
    pub matched_local: Vec<L>,
    pub matched_external: Vec<E>,
    /// External observations with no local counterpart
    pub added: Vec<E>,
}

impl<L, E> SetDiff<L, E> {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.matched_local.is_empty() && self.added.is_empty()
    }

    /// Matched pairs in local order
    pub fn into_pairs(self) -> (Vec<L>, Vec<(L, E)>, Vec<E>) {
        let pairs = self
            .matched_local
            .into_iter()
            .zip(self.matched_external)
            .collect();
        (self.removed, pairs, self.added)
    }
}

/// Compare two collections by exact `global_id` equality.
///
/// `removed` and `matched_local` keep the local input order, `added` keeps the
/// external input order. Duplicate ids pair first-come first-served: the n-th
/// local occurrence pairs with the n-th external occurrence, and the surplus
/// falls into `removed` or `added`.
pub fn compare_sets<L, E>(local: Vec<L>, external: Vec<E>) -> SetDiff<L, E>
where
    L: Externalized,
    E: Externalized,
{
    let mut index: HashMap<String, VecDeque<usize>> = HashMap::with_capacity(external.len());
    for (i, item) in external.iter().enumerate() {
        index
            .entry(item.global_id().to_string())
            .or_default()
            .push_back(i);
    }

    let mut slots: Vec<Option<E>> = external.into_iter().map(Some).collect();
    let mut removed = Vec::new();
    let mut matched_local = Vec::new();
    let mut matched_external = Vec::new();

    for record in local {
        let hit = index
            .get_mut(record.global_id())
            .and_then(|queue| queue.pop_front())
            .and_then(|i| slots[i].take());
        match hit {
            Some(observation) => {
                matched_local.push(record);
                matched_external.push(observation);
            }
            None => removed.push(record),
        }
    }

    let added = slots.into_iter().flatten().collect();

    SetDiff {
        removed,
        matched_local,
        matched_external,
        added,
    }
}
