use crate::flow::Flow;
use crate::ids::{DatasetId, StepId};
use std::fmt;

/// Handle to the shards produced by one step of a [`Flow`].
///
/// Datasets are immutable: topology operations return a new handle rather than
/// changing this one. The producing step is referenced by id; the flow owns it.
#[derive(Clone)]
pub struct Dataset {
    pub(crate) flow: Flow,
    pub(crate) id: DatasetId,
    pub(crate) shard_count: usize,
    pub(crate) partition_key: Vec<usize>,
    pub(crate) step: Option<StepId>,
}

impl Dataset {
    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    /// 1-based field indexes the records are co-located by; empty when unpartitioned.
    pub fn partition_key(&self) -> &[usize] {
        &self.partition_key
    }

    pub fn is_partitioned_by(&self, indexes: &[usize]) -> bool {
        self.partition_key == indexes
    }

    pub fn producing_step(&self) -> Option<StepId> {
        self.step
    }

    pub(crate) fn with_producer(mut self, step: StepId) -> Self {
        self.step = Some(step);
        self
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.flow.same_as(&other.flow) && self.id == other.id
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("id", &self.id)
            .field("shard_count", &self.shard_count)
            .field("partition_key", &self.partition_key)
            .field("step", &self.step)
            .finish()
    }
}
