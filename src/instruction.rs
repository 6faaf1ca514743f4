//! Behaviors attached to steps.
//!
//! An [`Instruction`] carries only what is needed to replay how records move
//! between shards (key indexes, a callback), never the records themselves. The
//! execution runtime calls [`Instruction::execute`] once per task of a step with
//! that task's input streams and output writers.

use crate::error::Result;
use crate::output::drain_shards;
use crate::partition::partition_index;
use crate::row::{decode_row, write_frame};
use crate::step::StreamKind;
use crate::stream::ShardStream;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

/// Per-shard output handler run on the driver.
pub type OutputFn = Arc<dyn Fn(ShardStream<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Writable side of one output shard.
pub type ShardWriter<'w> = Box<dyn Write + Send + 'w>;

#[derive(Clone)]
pub enum Instruction {
    /// Emit pre-encoded bytes, one buffer per output shard, tagged with their encoding.
    Source {
        shards: Arc<Vec<Vec<u8>>>,
        kind: StreamKind,
    },
    /// Deal records from every input shard across the outputs in turn.
    RoundRobin,
    /// Route each record to the output bucket chosen by hashing the fields at these
    /// 1-based indexes.
    ScatterPartitions(Vec<usize>),
    /// Concatenate the input shards into the single output shard.
    CollectPartitions,
    /// Drain every input shard through a handler on the driver.
    Output(OutputFn),
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Source { .. } => "Source",
            Instruction::RoundRobin => "RoundRobin",
            Instruction::ScatterPartitions(_) => "ScatterPartitions",
            Instruction::CollectPartitions => "CollectPartitions",
            Instruction::Output(_) => "Output",
        }
    }

    /// Encoding of the shards a step running this instruction produces.
    pub fn output_kind(&self) -> StreamKind {
        match self {
            Instruction::Source { kind, .. } => *kind,
            _ => StreamKind::StructuredRows,
        }
    }

    /// Whether the step runs in the controlling process.
    pub fn is_driver_side(&self) -> bool {
        matches!(self, Instruction::Output(_))
    }

    /// Run one task of this instruction.
    ///
    /// `task` is the task's position in its step's layout; only sources use it.
    pub fn execute<'w>(
        &self,
        task: usize,
        inputs: Vec<ShardStream<'_>>,
        mut outputs: Vec<ShardWriter<'w>>,
    ) -> Result<()> {
        match self {
            Instruction::Source { shards, .. } => {
                if let (Some(bytes), Some(out)) = (shards.get(task), outputs.first_mut()) {
                    out.write_all(bytes)?;
                }
            }
            Instruction::RoundRobin => {
                let n = outputs.len();
                let mut next = 0;
                for mut input in inputs {
                    while let Some(frame) = input.next_frame()? {
                        write_frame(&mut outputs[next], &frame)?;
                        next = (next + 1) % n;
                    }
                }
            }
            Instruction::ScatterPartitions(indexes) => {
                let n = outputs.len();
                for mut input in inputs {
                    while let Some(frame) = input.next_frame()? {
                        let row = decode_row(&frame)?;
                        let bucket = partition_index(&row, indexes, n)?;
                        write_frame(&mut outputs[bucket], &frame)?;
                    }
                }
            }
            Instruction::CollectPartitions => {
                if let Some(out) = outputs.first_mut() {
                    for mut input in inputs {
                        while let Some(frame) = input.next_frame()? {
                            write_frame(out, &frame)?;
                        }
                    }
                }
            }
            Instruction::Output(handler) => drain_shards(inputs, handler)?,
        }
        for out in &mut outputs {
            out.flush()?;
        }
        Ok(())
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Source { shards, kind } => {
                write!(f, "Source({} shard(s), {kind:?})", shards.len())
            }
            Instruction::ScatterPartitions(indexes) => write!(f, "ScatterPartitions({indexes:?})"),
            other => f.write_str(other.name()),
        }
    }
}
