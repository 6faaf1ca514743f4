use crate::ids::{DatasetId, StepId};
use crate::instruction::Instruction;

/// Structural relation between a step's input shards and output shards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FanoutShape {
    /// No inputs; one task per output shard.
    Source,
    /// One task reading every input shard and writing every output shard.
    OneToAll,
    /// One task per input shard, each writing its own run of `n` output shards.
    OneToEveryN { n: usize },
    /// One task per output shard, each reading `group_size` input shards strided by
    /// the output shard count.
    LinkedNToOne { group_size: usize },
    /// One task reading every input shard, writing at most one output shard.
    AllToOne,
}

/// Which shard-local input/output shards one task of a step touches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskLayout {
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
}

impl FanoutShape {
    /// Whether the shape can wire `inputs` shards into `outputs` shards.
    /// `inputs` is `None` for a step without an input dataset, likewise `outputs`.
    pub fn accepts(&self, inputs: Option<usize>, outputs: Option<usize>) -> bool {
        match (*self, inputs, outputs) {
            (FanoutShape::Source, None, Some(o)) => o >= 1,
            (FanoutShape::OneToAll, Some(i), Some(o)) => i >= 1 && o >= 1,
            (FanoutShape::OneToEveryN { n }, Some(i), Some(o)) => {
                n >= 1 && i >= 1 && i.checked_mul(n) == Some(o)
            }
            (FanoutShape::LinkedNToOne { group_size }, Some(i), Some(o)) => {
                group_size >= 1 && o >= 1 && o.checked_mul(group_size) == Some(i)
            }
            (FanoutShape::AllToOne, Some(i), None) => i >= 1,
            (FanoutShape::AllToOne, Some(i), Some(o)) => i >= 1 && o == 1,
            _ => false,
        }
    }

    /// Task layout for an already validated step.
    pub fn tasks(&self, inputs: usize, outputs: usize) -> Vec<TaskLayout> {
        match *self {
            FanoutShape::Source => (0..outputs)
                .map(|o| TaskLayout {
                    inputs: vec![],
                    outputs: vec![o],
                })
                .collect(),
            FanoutShape::OneToAll | FanoutShape::AllToOne => vec![TaskLayout {
                inputs: (0..inputs).collect(),
                outputs: (0..outputs).collect(),
            }],
            FanoutShape::OneToEveryN { n } => (0..inputs)
                .map(|i| TaskLayout {
                    inputs: vec![i],
                    outputs: (i * n..(i + 1) * n).collect(),
                })
                .collect(),
            FanoutShape::LinkedNToOne { group_size } => (0..outputs)
                .map(|o| TaskLayout {
                    inputs: (0..group_size).map(|k| k * outputs + o).collect(),
                    outputs: vec![o],
                })
                .collect(),
        }
    }
}

/// Encoding carried by the shards a step produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Opaque bytes from an external process, read as tab-separated lines.
    RawBytes,
    /// Length-prefixed binary [`Row`](crate::row::Row) frames.
    StructuredRows,
}

/// A node of the flow graph. Created once by [`Flow::insert_step`](crate::flow::Flow::insert_step)
/// and never changed afterwards.
#[derive(Clone, Debug)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub shape: FanoutShape,
    pub input: Option<DatasetId>,
    pub output: Option<DatasetId>,
    pub instruction: Instruction,
    pub driver_side: bool,
    pub stream_kind: StreamKind,
}
