//! Shard topology primitives: round robin and key-based partitioning.
//!
//! `partition` is built in two phases:
//! 1. **scatter**: one task per input shard splits its records into `n` local
//!    buckets by hashing the key fields. Bucket `p` of input shard `i` becomes
//!    intermediate shard `i * n + p`.
//! 2. **collect**: one task per final shard `p` concatenates intermediate shards
//!    `k * n + p` for every input shard `k`.
//!
//! The bucket for a record is `XxHash64(seed 0)` over the `postcard` encoding of
//! each key field in key order, modulo `n`. Float fields are hashed in canonical
//! form (`-0.0` as `0.0`, every NaN as one NaN) so keys equal under `Value`
//! equality always share a bucket. Changing this function changes where every
//! record lands, so it is part of the partition contract.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::instruction::Instruction;
use crate::row::Row;
use crate::sort_option::{SortOption, field};
use crate::value::Value;
use std::borrow::Cow;
use std::hash::Hasher;
use tracing::debug;
use twox_hash::XxHash64;

/// Bucket in `0..shard_count` for `row`, hashing the fields at the 1-based `indexes`.
///
/// # Errors
/// Fails when an index is 0 or past the row's last field.
pub fn partition_index(row: &Row, indexes: &[usize], shard_count: usize) -> Result<usize> {
    let mut hasher = XxHash64::with_seed(0);
    let mut buf = Vec::new();
    for &index in indexes {
        buf.clear();
        let value = canonical(row.field(index)?);
        buf = postcard::to_extend(&*value, buf)
            .map_err(|e| Error::malformed(format!("encode key field {index}: {e}")))?;
        hasher.write(&buf);
    }
    Ok((hasher.finish() % shard_count.max(1) as u64) as usize)
}

fn canonical(value: &Value) -> Cow<'_, Value> {
    match *value {
        Value::F32(f) if f == 0.0 => Cow::Owned(Value::F32(0.0)),
        Value::F32(f) if f.is_nan() => Cow::Owned(Value::F32(f32::NAN)),
        Value::F64(f) if f == 0.0 => Cow::Owned(Value::F64(0.0)),
        Value::F64(f) if f.is_nan() => Cow::Owned(Value::F64(f64::NAN)),
        _ => Cow::Borrowed(value),
    }
}

impl Dataset {
    /// Redistribute records across `shard_count` shards in turn, regardless of content.
    ///
    /// Returns `self` unchanged when the shard count already matches. The result
    /// carries no partition key.
    pub fn round_robin(&self, name: &str, shard_count: usize) -> Result<Dataset> {
        if self.shard_count == shard_count {
            debug!(name, shard_count, "round robin skipped, shard count unchanged");
            return Ok(self.clone());
        }
        let ret = self.flow.new_dataset(shard_count);
        self.flow
            .add_one_to_all_step(name, self, ret, Instruction::RoundRobin)
    }

    /// Hash-partition records into `shard_count` shards by the fields in `sort_option`.
    ///
    /// Returns `self` unchanged when it is already partitioned by the same fields
    /// into the same number of shards, or when both counts are 1.
    ///
    /// # Errors
    /// [`Error::InvalidKeyIndex`] for a 0 index; [`Error::ShapeMismatch`] for a
    /// `shard_count` of 0.
    pub fn partition(&self, name: &str, shard_count: usize, sort_option: &SortOption) -> Result<Dataset> {
        let indexes = sort_option.indexes();
        if indexes.contains(&0) {
            return Err(Error::InvalidKeyIndex);
        }
        if self.is_partitioned_by(&indexes) && self.shard_count == shard_count {
            debug!(name, shard_count, ?indexes, "partition skipped, already partitioned");
            return Ok(self.clone());
        }
        if self.shard_count == 1 && shard_count == 1 {
            debug!(name, "partition skipped, single shard");
            return Ok(self.clone());
        }
        self.partition_scatter(name, shard_count, &indexes)?
            .partition_collect(name, shard_count, &indexes)
    }

    /// [`partition`](Self::partition) by the first field, the key of a key/value row.
    pub fn partition_by_key(&self, name: &str, shard_count: usize) -> Result<Dataset> {
        self.partition(name, shard_count, &field([1]))
    }

    fn partition_scatter(&self, name: &str, shard_count: usize, indexes: &[usize]) -> Result<Dataset> {
        let ret = self
            .flow
            .new_keyed_dataset(self.shard_count * shard_count, indexes.to_vec());
        let instruction = Instruction::ScatterPartitions(indexes.to_vec());
        self.flow
            .add_one_to_every_n_step(name, self, shard_count, ret, instruction)
    }

    fn partition_collect(&self, name: &str, shard_count: usize, indexes: &[usize]) -> Result<Dataset> {
        let ret = self.flow.new_keyed_dataset(shard_count, indexes.to_vec());
        let group_size = self.shard_count / shard_count.max(1);
        self.flow
            .add_linked_n_to_one_step(name, self, group_size, ret, Instruction::CollectPartitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_depends_only_on_key_fields() {
        let a = Row::from_kv(vec![Value::I64(7)], vec![Value::from("a")]);
        let b = Row::from_kv(vec![Value::I64(7)], vec![Value::from("zzz")]);
        for n in 1..16 {
            assert_eq!(
                partition_index(&a, &[1], n).unwrap(),
                partition_index(&b, &[1], n).unwrap()
            );
        }
    }

    #[test]
    fn bucket_is_in_range() {
        for i in 0..200i64 {
            let row = Row::from_kv(vec![Value::I64(i)], vec![]);
            assert!(partition_index(&row, &[1], 7).unwrap() < 7);
        }
    }

    #[test]
    fn signed_zero_and_nan_keys_share_a_bucket() {
        let pos = Row::from_kv(vec![Value::F64(0.0)], vec![]);
        let neg = Row::from_kv(vec![Value::F64(-0.0)], vec![]);
        let nan = Row::from_kv(vec![Value::F32(f32::NAN)], vec![]);
        let other_nan = Row::from_kv(vec![Value::F32(-f32::NAN)], vec![]);
        for n in 2..16 {
            assert_eq!(
                partition_index(&pos, &[1], n).unwrap(),
                partition_index(&neg, &[1], n).unwrap()
            );
            assert_eq!(
                partition_index(&nan, &[1], n).unwrap(),
                partition_index(&other_nan, &[1], n).unwrap()
            );
        }
    }

    #[test]
    fn out_of_range_key_index_fails() {
        let row = Row::from_kv(vec![Value::I64(1)], vec![]);
        assert!(matches!(
            partition_index(&row, &[2], 4),
            Err(Error::KeyIndexOutOfRange { index: 2, fields: 1 })
        ));
    }
}
