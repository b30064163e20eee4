//! Two-level parallel map with ordered streaming results.
//!
//! [`par_map`] computes a function over every tuple of zipped argument
//! sequences on a grid of workers and streams the results back **in input
//! order**, even though completion order is unpredictable. Each worker is an
//! isolated execution unit running a bounded pool of task threads, so the
//! grid mixes well: CPU-bound tasks spread across workers while blocking
//! I/O-bound tasks overlap within each worker's pool.
//!
//! # Usage
//!
//! ```rust
//! use par_map::par_map;
//!
//! let doubled: Vec<u64> = par_map(|x: u64| x * 2, (0..1000u64,), None)
//!     .unwrap()
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! let expect: Vec<u64> = (0..1000).map(|x| x * 2).collect();
//! assert_eq!(doubled, expect);
//! ```
//!
//! Multiple argument sequences are zipped positionally; they must have equal
//! lengths.
//!
//! ```rust
//! use par_map::par_map;
//!
//! let joined: Vec<String> = par_map(
//!     |(a, b): (&str, &str)| format!("{}{}", a, b),
//!     (vec!["a", "b"], vec!["x", "y"]),
//!     None,
//! )
//! .unwrap()
//! .collect::<Result<_, _>>()
//! .unwrap();
//! assert_eq!(joined, vec!["ax", "by"]);
//! ```
//!
//! # Sizing the grid
//!
//! The third parameter accepts anything convertible into [`Limits`]:
//!
//! - `None`: the grid is sized from the host parallelism and the task count.
//! - `8` or any `usize`: cap the total number of task threads at 8.
//! - `(8, 2)`: thread cap 8, worker cap 2.
//!
//! [`SizingPlan::compute`] turns the task count, the limits, and the host
//! parallelism into the worker/thread grid; it never spawns more workers than
//! tasks or than the total thread budget allows.
//!
//! # Failures
//!
//! The output item is `Result<T, Error>`. A panic inside the mapped function
//! is captured in the worker and yielded as
//! [`TaskFailure`](Error::TaskFailure) at the position that task's result
//! would have occupied; the remaining tasks are unaffected. If every worker
//! exits before the full result set is delivered, the output yields one
//! [`PipelineFailure`](Error::PipelineFailure) and fuses. Invalid input (a
//! zero limit or mismatched sequence lengths) is rejected synchronously
//! before anything spawns.
//!
//! # Cancellation
//!
//! The output is lazy; dropping it early cancels the session. Queued tasks
//! are discarded, in-flight tasks run to completion, and every worker exits
//! promptly. [`terminate_all`] additionally cancels every live session in the
//! process, as a last-resort net for embedders wiring their own exit or
//! signal handling.
//!
//! # Async consumption
//!
//! [`ParMap::into_stream`] converts the blocking iterator into a
//! [`futures::Stream`](futures::stream::Stream) with identical semantics.
//! [`par_map_async`] instead drives the pipeline on a background thread and
//! invokes `on_result` per ordered result and `on_done` after exhaustion,
//! returning a joinable [`MapHandle`].
//!
//! # Shared state in the mapped function
//!
//! The engine treats the mapped function as opaque: it is invoked from many
//! pool threads across many workers, and the engine makes no guarantee about
//! the ordering of its side effects. Coordination between task invocations
//! must use primitives designed for concurrent use; holding a captured lock
//! across a blocking task serializes the whole grid. Prefer passing data out
//! through the returned values and keeping the function free of shared
//! mutable state.

mod common;
mod config;
mod error;
mod facade;
mod lifecycle;
mod map;
mod reorder;
mod scatter;
mod task;
mod utils;
mod worker;

pub use config::{Limits, SizingPlan};
pub use error::{Error, InvalidArgument, Result};
pub use facade::{par_map_async, MapHandle};
pub use lifecycle::terminate_all;
pub use map::{par_map, ArgSequences};
pub use reorder::{ParMap, ParMapStream};
