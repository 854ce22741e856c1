//! `ext-line-sort` is a set of memory bounded, order preserving algorithms for large data streams.
//!
//! * [`TopSelector`] retains the *n* highest ranked elements of a stream using a fixed capacity binary
//!   min-heap without materializing the stream.
//! * [`ExternalSorter`] sorts text line streams that do not fit into the main memory. During the
//!   first pass it sorts chunks of data that each fit in the buffer and stores them in temporary files,
//!   during the second pass it merges the sorted chunks together. For more information see
//!   [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//! * [`TournamentMerger`] merges *k* sorted inputs using a loser tree, spending *O*(log *k*) comparisons
//!   per emitted item.
//!
//! All components are single threaded and blocking. Ordering is always supplied by the caller through
//! a compare function, convenience constructors use the natural order of the element type.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io;
//! use std::path;
//!
//! use log;
//!
//! use ext_line_sort::{ExternalSorter, ExternalSorterBuilder, MergeStrategy};
//!
//! fn main() {
//!     let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());
//!
//!     let sorter: ExternalSorter = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .with_buffer_size(1_000_000)
//!         .with_merge_strategy(MergeStrategy::Tournament)
//!         .build()
//!         .unwrap();
//!
//!     let summary = sorter.sort(input_reader, path::Path::new("output.txt")).unwrap();
//!     log::info!("{} lines sorted", summary.records);
//! }
//! ```

pub mod chunk;
pub mod merger;
pub mod sort;
pub mod top;
pub mod tournament;

pub use chunk::{Chunk, ChunkReader, ChunkWriter};
pub use merger::WindowedMerger;
pub use sort::{ExternalSorter, ExternalSorterBuilder, MergeStrategy, SortError, SortSummary};
pub use top::{Added, CapacityError, TopSelector};
pub use tournament::TournamentMerger;
