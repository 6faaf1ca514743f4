//! Lightweight identifiers for steps and datasets within a [`Flow`](crate::flow::Flow).
//!
//! The flow owns every step and dataset; handles refer to them by index only, so a
//! [`Dataset`](crate::dataset::Dataset) never holds its producing step directly.
//!
//! Both ids are small, `Copy`, and hashable, which makes them cheap keys for the
//! runner's shard buffers.

use std::fmt;

/// Position of a step in its flow's step list.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct StepId(usize);

impl StepId {
    pub(crate) fn new(v: usize) -> Self {
        Self(v)
    }

    /// Return the underlying index.
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Position of a dataset in its flow's dataset list.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct DatasetId(usize);

impl DatasetId {
    pub(crate) fn new(v: usize) -> Self {
        Self(v)
    }

    /// Return the underlying index.
    pub fn raw(&self) -> usize {
        self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}
