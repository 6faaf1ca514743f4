//! Tests for round-robin redistribution.

use anyhow::Result;
use shardflow::testing::*;
use shardflow::*;

#[test]
fn same_shard_count_is_identity() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]; 3])?;
    let steps = flow.step_count();
    let same = input.round_robin("rr", 3)?;
    assert_eq!(same, input);
    assert_eq!(flow.step_count(), steps);
    Ok(())
}

#[test]
fn round_robin_adds_one_to_all_step() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]; 2])?;
    let spread = input.round_robin("spread", 5)?;
    assert_eq!(spread.shard_count(), 5);

    let step = flow
        .step(spread.producing_step().expect("producer"))
        .expect("step registered");
    assert_eq!(step.shape, FanoutShape::OneToAll);
    assert_eq!(step.name, "spread");
    assert_eq!(step.input, Some(input.id()));
    Ok(())
}

#[test]
fn single_shard_is_dealt_evenly() -> Result<()> {
    let flow = Flow::new();
    let rows = keyed_rows((0..10i64).map(|i| (i, "v")));
    let input = flow.from_rows("input", vec![rows.clone()])?;
    let spread = input.round_robin("spread", 3)?;

    let shards = Runner::sequential().run(&flow)?.rows(&spread)?;
    assert_eq!(shard_sizes(&shards), vec![4, 3, 3]);
    assert_rows_unordered_equal(&shards.concat(), &rows);

    // Records are dealt in turn: the first three go to shards 0, 1, 2.
    assert_eq!(shards[0][0].k, vec![Value::I64(0)]);
    assert_eq!(shards[1][0].k, vec![Value::I64(1)]);
    assert_eq!(shards[2][0].k, vec![Value::I64(2)]);
    Ok(())
}

#[test]
fn counter_runs_across_input_shards() -> Result<()> {
    let flow = Flow::new();
    let rows = keyed_rows((0..7i64).map(|i| (i, "v")));
    let input = flow.from_rows("input", split_evenly(rows.clone(), 3))?;
    let spread = input.round_robin("spread", 2)?;

    let shards = Runner::sequential().run(&flow)?.rows(&spread)?;
    assert_eq!(shard_sizes(&shards), vec![4, 3]);
    assert_rows_unordered_equal(&shards.concat(), &rows);
    Ok(())
}

#[test]
fn shrinking_preserves_every_record() -> Result<()> {
    let flow = Flow::new();
    let rows = keyed_rows((0..100i64).map(|i| (i, "v")));
    let input = flow.from_rows("input", split_evenly(rows.clone(), 8))?;
    let fewer = input.round_robin("shrink", 3)?;

    let shards = Runner::default().run(&flow)?.rows(&fewer)?;
    assert_eq!(shards.len(), 3);
    for size in shard_sizes(&shards) {
        assert!((33..=34).contains(&size), "uneven shard of {size}");
    }
    assert_rows_unordered_equal(&shards.concat(), &rows);
    Ok(())
}

#[test]
fn round_robin_clears_partition_key() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]; 2])?;
    let parted = input.partition_by_key("by key", 4)?;
    assert_eq!(parted.partition_key(), &[1]);

    let spread = parted.round_robin("spread", 3)?;
    assert!(spread.partition_key().is_empty());
    Ok(())
}

#[test]
fn raw_input_is_converted_to_rows() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_tsv("raw", vec![tsv_bytes([&["a", "1"][..], &["b", "2"][..], &["c", "3"][..]])])?;
    let spread = input.round_robin("spread", 2)?;

    let out = Runner::sequential().run(&flow)?;
    let shards = out.rows(&spread)?;
    assert_eq!(shard_sizes(&shards), vec![2, 1]);
    assert_eq!(shards[0][0].k, vec![Value::from("a")]);
    assert_eq!(shards[0][0].v, vec![Value::from("1")]);
    assert_eq!(shards[1][0].k, vec![Value::from("b")]);
    Ok(())
}
