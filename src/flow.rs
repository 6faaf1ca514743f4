use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::ids::{DatasetId, StepId};
use crate::instruction::Instruction;
use crate::row::{Row, write_row};
use crate::step::{FanoutShape, Step, StreamKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// -------- Flow graph --------
/// Owns every dataset and step. Handles (`Dataset`) refer back by id only.
#[derive(Default)]
pub struct Flow {
    pub(crate) inner: Arc<Mutex<FlowInner>>,
}

#[derive(Default)]
pub struct FlowInner {
    pub datasets: Vec<DatasetMeta>,
    pub steps: Vec<Step>,
}

/// What the flow records about each dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetMeta {
    pub shard_count: usize,
    pub partition_key: Vec<usize>,
    pub producer: Option<StepId>,
}

/// Allow `Flow` cloning; clones share one graph.
impl Clone for Flow {
    fn clone(&self) -> Self {
        Flow {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn graph(&self) -> MutexGuard<'_, FlowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn same_as(&self, other: &Flow) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Allocate a dataset with `shard_count` shards, no partition key and no producer yet.
    pub fn new_dataset(&self, shard_count: usize) -> Dataset {
        self.new_keyed_dataset(shard_count, Vec::new())
    }

    pub(crate) fn new_keyed_dataset(&self, shard_count: usize, partition_key: Vec<usize>) -> Dataset {
        let mut g = self.graph();
        let id = DatasetId::new(g.datasets.len());
        g.datasets.push(DatasetMeta {
            shard_count,
            partition_key: partition_key.clone(),
            producer: None,
        });
        Dataset {
            flow: self.clone(),
            id,
            shard_count,
            partition_key,
            step: None,
        }
    }

    /// Wire a new step from `input` to `output`.
    ///
    /// # Errors
    /// - [`Error::ShapeMismatch`] when `shape` cannot connect the two shard counts
    /// - [`Error::ForeignDataset`] when a dataset belongs to another flow
    /// - [`Error::AlreadyProduced`] when `output` already has a producing step
    pub fn insert_step(
        &self,
        name: &str,
        input: Option<&Dataset>,
        output: Option<&Dataset>,
        shape: FanoutShape,
        instruction: Instruction,
    ) -> Result<StepId> {
        for d in input.iter().chain(output.iter()) {
            if !d.flow.same_as(self) {
                return Err(Error::ForeignDataset(d.id));
            }
        }
        let inputs = input.map(Dataset::shard_count);
        let outputs = output.map(Dataset::shard_count);
        if !shape.accepts(inputs, outputs) {
            return Err(Error::ShapeMismatch {
                shape,
                inputs: inputs.unwrap_or(0),
                outputs: outputs.unwrap_or(0),
            });
        }

        let mut g = self.graph();
        let id = StepId::new(g.steps.len());
        if let Some(out) = output {
            let meta = &mut g.datasets[out.id.raw()];
            if meta.producer.is_some() {
                return Err(Error::AlreadyProduced(out.id));
            }
            meta.producer = Some(id);
        }
        debug!(
            step = %id,
            name,
            ?shape,
            instruction = instruction.name(),
            inputs = inputs.unwrap_or(0),
            outputs = outputs.unwrap_or(0),
            "insert step"
        );
        g.steps.push(Step {
            id,
            name: name.to_string(),
            shape,
            input: input.map(Dataset::id),
            output: output.map(Dataset::id),
            driver_side: instruction.is_driver_side(),
            stream_kind: instruction.output_kind(),
            instruction,
        });
        Ok(id)
    }

    /// One task reads every shard of `input` and writes every shard of `output`.
    pub fn add_one_to_all_step(
        &self,
        name: &str,
        input: &Dataset,
        output: Dataset,
        instruction: Instruction,
    ) -> Result<Dataset> {
        let step = self.insert_step(name, Some(input), Some(&output), FanoutShape::OneToAll, instruction)?;
        Ok(output.with_producer(step))
    }

    /// One task per input shard, each writing `n` consecutive output shards.
    pub fn add_one_to_every_n_step(
        &self,
        name: &str,
        input: &Dataset,
        n: usize,
        output: Dataset,
        instruction: Instruction,
    ) -> Result<Dataset> {
        let shape = FanoutShape::OneToEveryN { n };
        let step = self.insert_step(name, Some(input), Some(&output), shape, instruction)?;
        Ok(output.with_producer(step))
    }

    /// One task per output shard, each reading `group_size` linked input shards.
    pub fn add_linked_n_to_one_step(
        &self,
        name: &str,
        input: &Dataset,
        group_size: usize,
        output: Dataset,
        instruction: Instruction,
    ) -> Result<Dataset> {
        let shape = FanoutShape::LinkedNToOne { group_size };
        let step = self.insert_step(name, Some(input), Some(&output), shape, instruction)?;
        Ok(output.with_producer(step))
    }

    /// One task reads every shard of `input`; `output`, if any, has a single shard.
    pub fn add_all_to_one_step(
        &self,
        name: &str,
        input: &Dataset,
        output: Option<&Dataset>,
        instruction: Instruction,
    ) -> Result<StepId> {
        self.insert_step(name, Some(input), output, FanoutShape::AllToOne, instruction)
    }

    fn add_source(&self, name: &str, shards: Vec<Vec<u8>>, kind: StreamKind) -> Result<Dataset> {
        let output = self.new_dataset(shards.len());
        let instruction = Instruction::Source {
            shards: Arc::new(shards),
            kind,
        };
        let step = self.insert_step(name, None, Some(&output), FanoutShape::Source, instruction)?;
        Ok(output.with_producer(step))
    }

    /// Create a dataset with one shard per inner vector of rows.
    pub fn from_rows(&self, name: &str, shards: Vec<Vec<Row>>) -> Result<Dataset> {
        let encoded = shards
            .iter()
            .map(|rows| {
                let mut buf = Vec::new();
                for row in rows {
                    write_row(&mut buf, row)?;
                }
                Ok(buf)
            })
            .collect::<Result<Vec<_>>>()?;
        self.add_source(name, encoded, StreamKind::StructuredRows)
    }

    /// Create a dataset from raw tab-separated bytes, as an external process would emit.
    pub fn from_tsv(&self, name: &str, shards: Vec<Vec<u8>>) -> Result<Dataset> {
        self.add_source(name, shards, StreamKind::RawBytes)
    }

    pub fn step_count(&self) -> usize {
        self.graph().steps.len()
    }

    pub fn dataset_count(&self) -> usize {
        self.graph().datasets.len()
    }

    pub fn step(&self, id: StepId) -> Option<Step> {
        self.graph().steps.get(id.raw()).cloned()
    }

    /// Snapshot of every step in insertion order.
    pub fn steps(&self) -> Vec<Step> {
        self.graph().steps.clone()
    }

    pub fn dataset_meta(&self, id: DatasetId) -> Option<DatasetMeta> {
        self.graph().datasets.get(id.raw()).cloned()
    }

    pub(crate) fn snapshot(&self) -> (Vec<DatasetMeta>, Vec<Step>) {
        let g = self.graph();
        (g.datasets.clone(), g.steps.clone())
    }
}
