//! GROUP BY bucketing.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::accumulator::Accumulator;
use crate::query::{SelectItem, Value};

/// Raw group-by values of one bucket, ordered with [`Value::total_cmp`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey(pub Vec<Value>);

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    packets: u64,
    /// Projection values of the first packet in the bucket.
    first: Vec<Value>,
    accumulators: Vec<Option<Accumulator>>,
}

/// Buckets matched packets by their group-by values and aggregates each
/// bucket.
///
/// Inputs are one value per projection item: the field value for a plain
/// field, the argument for an aggregate (Null for `count()`).
#[derive(Debug, Clone)]
pub struct Grouper {
    items: Vec<SelectItem>,
    group_by: Vec<String>,
    buckets: BTreeMap<GroupKey, Bucket>,
}

impl Grouper {
    pub fn new(items: Vec<SelectItem>, group_by: Vec<String>) -> Self {
        Self {
            items,
            group_by,
            buckets: BTreeMap::new(),
        }
    }

    /// Add one packet with group key `key` and projection inputs `values`.
    pub fn push(&mut self, key: Vec<Value>, values: Vec<Value>) {
        let items = &self.items;
        let bucket = self
            .buckets
            .entry(GroupKey(key))
            .or_insert_with(|| new_bucket(items, values.clone()));

        bucket.packets += 1;
        for (acc, value) in bucket.accumulators.iter_mut().zip(&values) {
            if let Some(acc) = acc {
                acc.update(value);
            }
        }
    }

    /// One row per bucket in key order. Without GROUP BY a single global
    /// row is always produced, even when nothing matched.
    pub fn finish(self) -> Vec<Vec<Value>> {
        let mut buckets = self.buckets;
        if self.group_by.is_empty() && buckets.is_empty() {
            let nulls = vec![Value::Null; self.items.len()];
            buckets.insert(GroupKey(Vec::new()), new_bucket(&self.items, nulls));
        }

        buckets
            .into_iter()
            .map(|(key, bucket)| {
                self.items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        SelectItem::Field(name) => self
                            .group_by
                            .iter()
                            .position(|g| g.eq_ignore_ascii_case(name))
                            .and_then(|pos| key.0.get(pos).cloned())
                            .unwrap_or_else(|| bucket.first[i].clone()),
                        SelectItem::Aggregate(_) => bucket.accumulators[i]
                            .as_ref()
                            .map_or(Value::Null, |acc| acc.finish(bucket.packets)),
                    })
                    .collect()
            })
            .collect()
    }
}

fn new_bucket(items: &[SelectItem], first: Vec<Value>) -> Bucket {
    Bucket {
        packets: 0,
        first,
        accumulators: items
            .iter()
            .map(|item| match item {
                SelectItem::Aggregate(call) => Some(Accumulator::new(call.function)),
                SelectItem::Field(_) => None,
            })
            .collect(),
    }
}
