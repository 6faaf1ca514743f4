//! Assertion functions for shard contents.

use crate::row::Row;
use crate::value::Value;

fn sort_key(row: &Row) -> String {
    format!("{:?}|{:?}", row.k, row.v)
}

/// Assert that two row collections hold the same rows as a multiset.
///
/// Timestamps are ignored; only key and value fields are compared.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
pub fn assert_rows_unordered_equal(actual: &[Row], expected: &[Row]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected: {}\n  Actual: {}",
        expected.len(),
        actual.len()
    );
    let mut a: Vec<String> = actual.iter().map(sort_key).collect();
    let mut e: Vec<String> = expected.iter().map(sort_key).collect();
    a.sort();
    e.sort();
    for (i, (a, e)) in a.iter().zip(&e).enumerate() {
        assert_eq!(a, e, "Row mismatch at sorted position {i}");
    }
}

/// Assert that rows with equal values at the 1-based `indexes` share one shard.
///
/// Keys are compared with `Value` equality, so `0.0` and `-0.0` count as one key.
///
/// # Panics
///
/// Panics if a key appears in more than one shard, or an index is out of range.
pub fn assert_co_located(shards: &[Vec<Row>], indexes: &[usize]) {
    let mut seen: Vec<(Vec<&Value>, usize)> = Vec::new();
    for (shard, rows) in shards.iter().enumerate() {
        for row in rows {
            let key: Vec<&Value> = indexes
                .iter()
                .map(|&i| row.field(i).expect("key index in range"))
                .collect();
            match seen.iter().find(|(k, _)| *k == key) {
                Some(&(_, first)) => assert_eq!(
                    first, shard,
                    "Key {key:?} found in shard {first} and shard {shard}"
                ),
                None => seen.push((key, shard)),
            }
        }
    }
}

/// Number of rows in each shard.
#[must_use]
pub fn shard_sizes(shards: &[Vec<Row>]) -> Vec<usize> {
    shards.iter().map(Vec::len).collect()
}
