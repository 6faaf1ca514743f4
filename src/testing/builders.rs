//! Row builders for tests.

use crate::row::Row;
use crate::value::Value;

/// Build key/value rows from pairs.
///
/// # Example
///
/// ```
/// use shardflow::testing::keyed_rows;
/// use shardflow::value::Value;
///
/// let rows = keyed_rows([(1i32, "a"), (2, "b")]);
/// assert_eq!(rows[0].k, vec![Value::I32(1)]);
/// assert_eq!(rows[1].v, vec![Value::from("b")]);
/// ```
pub fn keyed_rows<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Vec<Row>
where
    K: Into<Value>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| Row::from_kv(vec![k.into()], vec![v.into()]))
        .collect()
}

/// Deal `rows` into `shards` contiguous chunks of near-equal size.
///
/// Always returns exactly `shards` chunks (some possibly empty).
#[must_use]
pub fn split_evenly<T>(rows: Vec<T>, shards: usize) -> Vec<Vec<T>> {
    let shards = shards.max(1);
    let per = rows.len().div_ceil(shards).max(1);
    let mut out: Vec<Vec<T>> = (0..shards).map(|_| Vec::new()).collect();
    for (i, row) in rows.into_iter().enumerate() {
        out[(i / per).min(shards - 1)].push(row);
    }
    out
}

/// Join lines into one tab-separated byte buffer, as an external process would emit.
#[must_use]
pub fn tsv_bytes<'a>(lines: impl IntoIterator<Item = &'a [&'a str]>) -> Vec<u8> {
    let mut out = Vec::new();
    for fields in lines {
        out.extend_from_slice(fields.join("\t").as_bytes());
        out.push(b'\n');
    }
    out
}
