//! In-memory local execution of a [`Flow`].
//!
//! The runner walks the flow's steps in insertion order, which is always a valid
//! topological order because a step can only reference datasets that already
//! exist. Each step is split into tasks by its [`FanoutShape`](crate::step::FanoutShape);
//! every task reads its input shards from memory and writes fresh output buffers.
//!
//! In parallel mode the tasks of a worker-side step run on Rayon. Driver-side
//! steps always run their single task on the calling thread (the output
//! collector spawns its own per-shard threads).

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::flow::{DatasetMeta, Flow};
use crate::ids::DatasetId;
use crate::instruction::ShardWriter;
use crate::row::Row;
use crate::step::{Step, StreamKind, TaskLayout};
use crate::stream::ShardStream;
use rayon::prelude::*;
use std::collections::HashMap;
use std::io;
use tracing::debug;

#[derive(Clone, Copy, Debug)]
pub enum ExecMode {
    Sequential,
    Parallel { threads: Option<usize> },
}

pub struct Runner {
    pub mode: ExecMode,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Parallel {
                threads: Some(num_cpus::get().max(2)),
            },
        }
    }
}

/// Shard buffers of every dataset produced during a run.
pub struct FlowOutput {
    shards: HashMap<DatasetId, Vec<Vec<u8>>>,
    kinds: HashMap<DatasetId, StreamKind>,
}

impl FlowOutput {
    /// Raw bytes of each shard of `dataset`, if it was produced.
    pub fn shard_bytes(&self, dataset: &Dataset) -> Option<&[Vec<u8>]> {
        self.shards.get(&dataset.id()).map(Vec::as_slice)
    }

    /// Decode every shard of `dataset` into rows, one vector per shard.
    ///
    /// # Errors
    /// [`Error::Unproduced`] if the dataset was not produced by this run, or a decode error.
    pub fn rows(&self, dataset: &Dataset) -> Result<Vec<Vec<Row>>> {
        let id = dataset.id();
        let shards = self.shards.get(&id).ok_or(Error::Unproduced(id))?;
        let kind = self.kinds.get(&id).copied().unwrap_or(StreamKind::StructuredRows);
        shards
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                let mut stream = ShardStream::new(i, kind, &bytes[..]);
                let mut rows = Vec::new();
                while let Some(row) = stream.next_row()? {
                    rows.push(row);
                }
                Ok(rows)
            })
            .collect()
    }
}

impl Runner {
    pub fn sequential() -> Self {
        Self {
            mode: ExecMode::Sequential,
        }
    }

    pub fn run(&self, flow: &Flow) -> Result<FlowOutput> {
        let (datasets, steps) = flow.snapshot();
        match self.mode {
            ExecMode::Sequential => run_steps(&datasets, &steps, false),
            ExecMode::Parallel { threads: None } => run_steps(&datasets, &steps, true),
            ExecMode::Parallel { threads: Some(t) } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(t)
                    .build()
                    .map_err(|e| Error::Io(io::Error::other(e)))?;
                pool.install(|| run_steps(&datasets, &steps, true))
            }
        }
    }
}

fn run_steps(datasets: &[DatasetMeta], steps: &[Step], parallel: bool) -> Result<FlowOutput> {
    let mut shards: HashMap<DatasetId, Vec<Vec<u8>>> = HashMap::new();
    let mut kinds: HashMap<DatasetId, StreamKind> = HashMap::new();

    for step in steps {
        let (inputs, input_kind) = match step.input {
            Some(id) => (
                shards.get(&id).map(Vec::as_slice).ok_or(Error::Unproduced(id))?,
                kinds.get(&id).copied().unwrap_or(StreamKind::StructuredRows),
            ),
            None => (&[][..], StreamKind::StructuredRows),
        };
        let out_count = step.output.map_or(0, |id| datasets[id.raw()].shard_count);
        let layouts = step.shape.tasks(inputs.len(), out_count);
        debug!(step = %step.id, name = %step.name, tasks = layouts.len(), "run step");

        let run = |(task, layout): (usize, &TaskLayout)| run_task(step, task, layout, inputs, input_kind);
        let results: Vec<Vec<Vec<u8>>> = if parallel && !step.driver_side {
            layouts.par_iter().enumerate().map(run).collect::<Result<_>>()?
        } else {
            layouts.iter().enumerate().map(run).collect::<Result<_>>()?
        };

        if let Some(out) = step.output {
            let mut produced = vec![Vec::new(); out_count];
            for (layout, outs) in layouts.iter().zip(results) {
                for (&o, bytes) in layout.outputs.iter().zip(outs) {
                    produced[o] = bytes;
                }
            }
            shards.insert(out, produced);
            kinds.insert(out, step.stream_kind);
        }
    }
    Ok(FlowOutput { shards, kinds })
}

fn run_task(
    step: &Step,
    task: usize,
    layout: &TaskLayout,
    inputs: &[Vec<u8>],
    kind: StreamKind,
) -> Result<Vec<Vec<u8>>> {
    let streams = layout
        .inputs
        .iter()
        .map(|&i| ShardStream::new(i, kind, &inputs[i][..]))
        .collect();
    let mut outs = vec![Vec::new(); layout.outputs.len()];
    let writers = outs
        .iter_mut()
        .map(|buf| Box::new(buf) as ShardWriter<'_>)
        .collect();
    step.instruction.execute(task, streams, writers)?;
    Ok(outs)
}
