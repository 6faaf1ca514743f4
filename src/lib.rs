//! # Shardflow
//!
//! The **shard topology layer** of a batch dataflow engine. A [`Flow`] is a graph of
//! steps connecting sharded [`Dataset`]s; this crate provides the graph itself, the
//! primitives that move records between shards, and the driver-side collector that
//! drains a dataset into caller code.
//!
//! ## Key Features
//!
//! - **Flow graph** - steps wired by fanout shape, validated when they are added
//! - **Round robin** - even redistribution of records regardless of content
//! - **Key partitioning** - hash scatter plus collect, so equal keys share a shard
//! - **Output collection** - per-shard concurrent handlers with cancel-on-failure
//! - **Row codec** - length-prefixed binary rows and tab-separated text lines
//! - **Scalar coercion** - checked conversion of field values into typed slots
//! - **Local runner** - sequential or Rayon-parallel in-memory execution
//!
//! ## Quick Start
//!
//! ```no_run
//! use shardflow::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let flow = Flow::new();
//!
//! let rows = vec![
//!     vec![Row::from_kv(vec![1i64.into()], vec!["a".into()])],
//!     vec![Row::from_kv(vec![2i64.into()], vec!["b".into()])],
//! ];
//! let input = flow.from_rows("input", rows)?;
//!
//! input
//!     .partition_by_key("by key", 4)?
//!     .printlnf("{}\t{}")?;
//!
//! Runner::default().run(&flow)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Flow and Dataset
//!
//! A [`Flow`] owns every step and dataset. A [`Dataset`] is a cheap handle naming
//! one set of shards: how many there are, which fields (if any) they are
//! partitioned by, and which step produces them. Topology operations never change
//! a dataset; they return a new handle, or the same one when nothing needs to move.
//!
//! ### Steps and fanout shapes
//!
//! Every [`Step`] declares a [`FanoutShape`] relating its input shard count to its
//! output shard count. The shape decides both whether the wiring is legal and how
//! the step is split into tasks:
//!
//! - `Source` - one task per output shard
//! - `OneToAll` - a single task over every input and output shard
//! - `OneToEveryN` - one task per input shard, each owning `n` output shards
//! - `LinkedNToOne` - one task per output shard, reading a strided group of inputs
//! - `AllToOne` - a single task over every input, writing one shard or none
//!
//! ### Records
//!
//! A [`Row`] carries ordered key fields, ordered value fields and a timestamp. Field
//! indexes used by [`field`] and [`Dataset::partition`] are 1-based over the key
//! fields followed by the value fields.
//!
//! ### Execution
//!
//! [`Runner`] executes a flow in memory, either sequentially or on Rayon, and
//! returns a [`FlowOutput`] holding every produced shard.
//!
//! ## Testing
//!
//! The [`testing`] module has shared writers, row builders and shard assertions.

pub mod dataset;
pub mod error;
pub mod flow;
pub mod format;
pub mod ids;
pub mod instruction;
pub mod output;
pub mod partition;
pub mod row;
pub mod runner;
pub mod sort_option;
pub mod step;
pub mod stream;
pub mod testing;
pub mod value;

pub use dataset::Dataset;
pub use error::{Error, Result};
pub use flow::{DatasetMeta, Flow};
pub use format::Template;
pub use ids::{DatasetId, StepId};
pub use instruction::Instruction;
pub use partition::partition_index;
pub use row::{Row, TimestampMs};
pub use runner::{ExecMode, FlowOutput, Runner};
pub use sort_option::{Order, SortOption, field};
pub use step::{FanoutShape, Step, StreamKind, TaskLayout};
pub use stream::{CancelToken, ShardStream};
pub use value::{ScalarKind, Slot, SlotSet, Value, coerce};
