//! Tests for flow graph construction and fanout shape validation.

use anyhow::Result;
use shardflow::testing::*;
use shardflow::*;

#[test]
fn new_flow_is_empty() {
    let flow = Flow::new();
    assert_eq!(flow.step_count(), 0);
    assert_eq!(flow.dataset_count(), 0);
    assert!(flow.steps().is_empty());
}

#[test]
fn flow_clones_share_one_graph() -> Result<()> {
    let a = Flow::new();
    let b = a.clone();
    a.from_rows("input", vec![keyed_rows([(1i64, "x")])])?;
    assert_eq!(b.step_count(), 1);
    assert_eq!(b.dataset_count(), 1);
    Ok(())
}

#[test]
fn new_dataset_has_no_producer_and_no_key() {
    let flow = Flow::new();
    let d = flow.new_dataset(3);
    assert_eq!(d.shard_count(), 3);
    assert!(d.partition_key().is_empty());
    assert_eq!(d.producing_step(), None);

    let meta = flow.dataset_meta(d.id()).expect("dataset registered");
    assert_eq!(meta.shard_count, 3);
    assert_eq!(meta.producer, None);
}

#[test]
fn source_step_sets_producer() -> Result<()> {
    let flow = Flow::new();
    let d = flow.from_rows("input", vec![vec![], vec![]])?;
    let step = d.producing_step().expect("source has a producer");

    let s = flow.step(step).expect("step registered");
    assert_eq!(s.name, "input");
    assert_eq!(s.shape, FanoutShape::Source);
    assert_eq!(s.input, None);
    assert_eq!(s.output, Some(d.id()));
    assert!(!s.driver_side);
    assert_eq!(flow.dataset_meta(d.id()).and_then(|m| m.producer), Some(step));
    Ok(())
}

#[test]
fn tsv_source_carries_raw_stream_kind() -> Result<()> {
    let flow = Flow::new();
    let d = flow.from_tsv("raw", vec![b"a\t1\n".to_vec()])?;
    let s = flow.step(d.producing_step().expect("producer")).expect("step");
    assert_eq!(s.stream_kind, StreamKind::RawBytes);
    Ok(())
}

#[test]
fn linked_n_to_one_requires_exact_group_size() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]; 6])?;

    let ok = flow.add_linked_n_to_one_step(
        "collect",
        &input,
        3,
        flow.new_dataset(2),
        Instruction::CollectPartitions,
    )?;
    assert_eq!(ok.shard_count(), 2);

    let err = flow
        .add_linked_n_to_one_step(
            "collect",
            &input,
            4,
            flow.new_dataset(2),
            Instruction::CollectPartitions,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ShapeMismatch {
            shape: FanoutShape::LinkedNToOne { group_size: 4 },
            inputs: 6,
            outputs: 2,
        }
    ));
    Ok(())
}

#[test]
fn one_to_every_n_requires_product() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]; 2])?;

    assert!(
        flow.add_one_to_every_n_step(
            "scatter",
            &input,
            3,
            flow.new_dataset(6),
            Instruction::ScatterPartitions(vec![1]),
        )
        .is_ok()
    );
    let err = flow
        .add_one_to_every_n_step(
            "scatter",
            &input,
            3,
            flow.new_dataset(5),
            Instruction::ScatterPartitions(vec![1]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    Ok(())
}

#[test]
fn rejected_step_is_not_recorded() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]; 2])?;
    let before = flow.step_count();
    let target = flow.new_dataset(3);
    assert!(
        flow.add_linked_n_to_one_step("collect", &input, 1, target.clone(), Instruction::CollectPartitions)
            .is_err()
    );
    assert_eq!(flow.step_count(), before);
    assert_eq!(flow.dataset_meta(target.id()).and_then(|m| m.producer), None);
    Ok(())
}

#[test]
fn all_to_one_accepts_zero_or_one_output() -> Result<()> {
    assert!(FanoutShape::AllToOne.accepts(Some(4), None));
    assert!(FanoutShape::AllToOne.accepts(Some(4), Some(1)));
    assert!(!FanoutShape::AllToOne.accepts(Some(4), Some(2)));
    assert!(!FanoutShape::AllToOne.accepts(None, Some(1)));

    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]; 3])?;
    let err = flow
        .add_all_to_one_step("merge", &input, Some(&flow.new_dataset(2)), Instruction::CollectPartitions)
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    Ok(())
}

#[test]
fn source_and_one_to_all_shapes() {
    assert!(FanoutShape::Source.accepts(None, Some(1)));
    assert!(!FanoutShape::Source.accepts(Some(1), Some(1)));
    assert!(!FanoutShape::Source.accepts(None, Some(0)));
    assert!(FanoutShape::OneToAll.accepts(Some(3), Some(5)));
    assert!(!FanoutShape::OneToAll.accepts(Some(3), Some(0)));
}

#[test]
fn task_layouts_follow_shape() {
    let scatter = FanoutShape::OneToEveryN { n: 2 }.tasks(2, 4);
    assert_eq!(scatter.len(), 2);
    assert_eq!(scatter[1].inputs, vec![1]);
    assert_eq!(scatter[1].outputs, vec![2, 3]);

    let collect = FanoutShape::LinkedNToOne { group_size: 3 }.tasks(6, 2);
    assert_eq!(collect.len(), 2);
    assert_eq!(collect[0].inputs, vec![0, 2, 4]);
    assert_eq!(collect[1].inputs, vec![1, 3, 5]);
    assert_eq!(collect[1].outputs, vec![1]);

    let all = FanoutShape::OneToAll.tasks(3, 2);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].inputs, vec![0, 1, 2]);
    assert_eq!(all[0].outputs, vec![0, 1]);
}

#[test]
fn output_cannot_be_produced_twice() -> Result<()> {
    let flow = Flow::new();
    let input = flow.from_rows("input", vec![vec![]])?;
    let target = flow.new_dataset(1);
    flow.add_one_to_all_step("first", &input, target.clone(), Instruction::RoundRobin)?;
    let err = flow
        .add_one_to_all_step("second", &input, target.clone(), Instruction::RoundRobin)
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyProduced(id) if id == target.id()));
    Ok(())
}

#[test]
fn datasets_from_another_flow_are_rejected() -> Result<()> {
    let a = Flow::new();
    let b = Flow::new();
    let input = a.from_rows("input", vec![vec![]])?;
    let err = b
        .add_one_to_all_step("rr", &input, b.new_dataset(2), Instruction::RoundRobin)
        .unwrap_err();
    assert!(matches!(err, Error::ForeignDataset(id) if id == input.id()));
    Ok(())
}

#[test]
fn ids_display_compactly() {
    let flow = Flow::new();
    let d = flow.new_dataset(1);
    assert_eq!(d.id().to_string(), "d0");
    assert_eq!(d.id().raw(), 0);
}
