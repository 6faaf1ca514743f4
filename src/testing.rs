//! Testing utilities for shard topology flows.
//!
//! - **Assertions**: compare shard contents ignoring order, check key co-location
//! - **Builders**: keyed rows and shard splits
//! - **Mock I/O**: an in-memory shared writer and temporary files for output steps
//!
//! # Quick Start
//!
//! ```no_run
//! use shardflow::*;
//! use shardflow::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let flow = Flow::new();
//! let rows = keyed_rows([(1i64, "a"), (2, "b"), (1, "c")]);
//! let input = flow.from_rows("input", split_evenly(rows.clone(), 2))?;
//! let parted = input.partition_by_key("by key", 2)?;
//!
//! let out = Runner::sequential().run(&flow)?;
//! let shards = out.rows(&parted)?;
//! assert_co_located(&shards, &[1]);
//! assert_rows_unordered_equal(&shards.concat(), &rows);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod mock_io;

pub use assertions::*;
pub use builders::*;
pub use mock_io::*;
