//! External sorter.

use log;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::io::prelude::*;
use std::iter::Peekable;
use std::path::Path;

use crate::chunk::{Chunk, ChunkWriter};
use crate::merger::WindowedMerger;
use crate::tournament::TournamentMerger;

/// Default maximum number of records held in memory.
pub const DEFAULT_BUFFER_SIZE: usize = 100_000;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Buffer size is not positive.
    InvalidBufferSize(usize),
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Temporary chunk I/O error.
    IO(io::Error),
    /// Input data stream error.
    InputError(io::Error),
    /// Destination creation or writing error.
    OutputError(io::Error),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::InvalidBufferSize(_) => None,
            SortError::TempDir(err) => Some(err),
            SortError::IO(err) => Some(err),
            SortError::InputError(err) => Some(err),
            SortError::OutputError(err) => Some(err),
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::InvalidBufferSize(size) => write!(f, "buffer size must be at least 1 (got {})", size),
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::InputError(err) => write!(f, "input data stream error: {}", err),
            SortError::OutputError(err) => write!(f, "output writing error: {}", err),
        }
    }
}

/// Chunks merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Chunks are merged two at a time until a single one remains.
    Pairwise,
    /// Up to `max(2, buffer_size / 2)` chunks are merged at once by a [`TournamentMerger`], in rounds
    /// until a single one remains.
    Tournament,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Pairwise
    }
}

/// Statistics of a completed sort or merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSummary {
    /// Number of records written to the destination.
    pub records: u64,
    /// Number of chunks spilled to temporary storage.
    pub chunks: usize,
    /// Number of merges performed.
    pub merges: usize,
}

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder {
    /// Maximum number of records held in memory.
    buffer_size: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Chunks merge strategy.
    merge_strategy: MergeStrategy,
}

impl ExternalSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter, SortError> {
        ExternalSorter::new(
            self.buffer_size,
            self.tmp_dir.as_deref(),
            self.rw_buf_size,
            self.merge_strategy,
        )
    }

    /// Sets maximum number of records held in memory.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> ExternalSorterBuilder {
        self.buffer_size = buffer_size;
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets chunk read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder {
        self.rw_buf_size = Some(buf_size);
        return self;
    }

    /// Sets chunks merge strategy.
    pub fn with_merge_strategy(mut self, merge_strategy: MergeStrategy) -> ExternalSorterBuilder {
        self.merge_strategy = merge_strategy;
        return self;
    }
}

impl Default for ExternalSorterBuilder {
    fn default() -> Self {
        ExternalSorterBuilder {
            buffer_size: DEFAULT_BUFFER_SIZE,
            tmp_dir: None,
            rw_buf_size: None,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

/// External sorter of text lines.
///
/// Input lines are split into sorted chunks stored in a temporary directory which are then merged
/// into the destination file. At most `buffer_size` lines are held in memory at any time. Every call
/// uses its own temporary directory which is removed when the call returns, successfully or not.
pub struct ExternalSorter {
    /// Maximum number of records held in memory.
    buffer_size: usize,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,
    /// Chunks merge strategy.
    merge_strategy: MergeStrategy,
}

impl ExternalSorter {
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `buffer_size` - Maximum number of records held in memory, must be at least 1.
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Chunks file read/write buffer size.
    /// * `merge_strategy` - Chunks merge strategy.
    pub fn new(
        buffer_size: usize,
        tmp_path: Option<&Path>,
        rw_buf_size: Option<usize>,
        merge_strategy: MergeStrategy,
    ) -> Result<Self, SortError> {
        if buffer_size == 0 {
            return Err(SortError::InvalidBufferSize(buffer_size));
        }

        log::info!(
            "initializing sorter (buffer: {} records, merge strategy: {:?})",
            buffer_size,
            merge_strategy
        );

        return Ok(ExternalSorter {
            buffer_size,
            tmp_dir: tmp_path.map(Into::into),
            rw_buf_size,
            merge_strategy,
        });
    }

    fn init_tmp_directory(&self) -> Result<tempfile::TempDir, SortError> {
        let tmp_dir = if let Some(tmp_path) = &self.tmp_dir {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Maximum number of records buffered per chunk and per merge window.
    fn window_size(&self) -> usize {
        (self.buffer_size / 2).max(1)
    }

    /// Sorts lines from the input in byte-wise order and writes them to the destination file.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `destination` - Result file path, replaced if already exists
    pub fn sort<R: BufRead>(&self, input: R, destination: &Path) -> Result<SortSummary, SortError> {
        self.sort_by(input, destination, |a: &str, b: &str| a.cmp(b))
    }

    /// Sorts lines from the input using a custom compare function and writes them to the destination file.
    /// The destination is not created if sorting fails.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    /// * `destination` - Result file path, replaced if already exists
    /// * `compare` - Function be be used to compare lines
    pub fn sort_by<R, F>(&self, input: R, destination: &Path, compare: F) -> Result<SortSummary, SortError>
    where
        R: BufRead,
        F: Fn(&str, &str) -> Ordering,
    {
        let mut lines = input.lines().peekable();

        let mut batch = Vec::new();
        fill_batch(&mut lines, &mut batch, self.buffer_size)?;
        batch.sort_unstable_by(|a, b| compare(a, b));

        // the first batch is staged next to the destination and released before the input is peeked
        let mut output = self.create_output(destination)?;
        for line in &batch {
            output.write_line(line).map_err(SortError::OutputError)?;
        }
        let full = batch.len() == self.buffer_size;
        drop(batch);

        if !full || lines.peek().is_none() {
            log::debug!("input fits into the buffer, {} lines sorted in memory", output.len());

            let records = output.len();
            complete_output(output, destination)?;

            return Ok(SortSummary {
                records,
                chunks: 0,
                merges: 0,
            });
        }

        let first = output.finish().map_err(SortError::IO)?;
        let tmp_dir = self.init_tmp_directory()?;
        let chunks = self.split(tmp_dir.path(), first, &mut lines, &compare)?;
        let chunks_count = chunks.len();

        let summary = self.merge_chunks(tmp_dir.path(), chunks, destination, &compare)?;

        log::debug!("external sort done");

        return Ok(SortSummary {
            chunks: chunks_count,
            ..summary
        });
    }

    /// Merges two sorted inputs in byte-wise order and writes the result to the destination file.
    pub fn merge<A, B>(&self, left: A, right: B, destination: &Path) -> Result<SortSummary, SortError>
    where
        A: BufRead,
        B: BufRead,
    {
        self.merge_by(left, right, destination, |a: &str, b: &str| a.cmp(b))
    }

    /// Merges two inputs sorted according to `compare` and writes the result to the destination file.
    /// No more than half of the buffer size lines of each input are held in memory.
    ///
    /// # Arguments
    /// * `left` - First sorted input, its lines go first on equality
    /// * `right` - Second sorted input
    /// * `destination` - Result file path, replaced if already exists
    /// * `compare` - Function be be used to compare lines
    pub fn merge_by<A, B, F>(&self, left: A, right: B, destination: &Path, compare: F) -> Result<SortSummary, SortError>
    where
        A: BufRead,
        B: BufRead,
        F: Fn(&str, &str) -> Ordering,
    {
        let mut output = self.create_output(destination)?;

        let merger = WindowedMerger::new_by(left.lines(), right.lines(), self.window_size(), |a: &String, b: &String| {
            compare(a.as_str(), b.as_str())
        });
        for line in merger {
            let line = line.map_err(SortError::InputError)?;
            output.write_line(&line).map_err(SortError::OutputError)?;
        }

        let records = output.len();
        complete_output(output, destination)?;

        return Ok(SortSummary {
            records,
            chunks: 0,
            merges: 1,
        });
    }

    fn split<R, F>(
        &self,
        dir: &Path,
        first: Chunk,
        lines: &mut Peekable<io::Lines<R>>,
        compare: &F,
    ) -> Result<Vec<Chunk>, SortError>
    where
        R: BufRead,
        F: Fn(&str, &str) -> Ordering,
    {
        let mut chunks = vec![first];
        let mut batch = Vec::with_capacity(self.window_size());

        loop {
            fill_batch(lines, &mut batch, self.window_size())?;
            if batch.is_empty() {
                break;
            }

            log::debug!("sorting chunk data ...");
            batch.sort_unstable_by(|a, b| compare(a, b));

            log::debug!("saving chunk data ({} lines)", batch.len());
            chunks.push(Chunk::build(dir, &batch, self.rw_buf_size).map_err(SortError::IO)?);

            batch.clear();
        }

        log::debug!("external sort preparation done ({} chunks)", chunks.len());

        return Ok(chunks);
    }

    /// Maximum number of chunks merged at once.
    fn fan_in(&self) -> usize {
        match self.merge_strategy {
            MergeStrategy::Pairwise => 2,
            MergeStrategy::Tournament => self.window_size().max(2),
        }
    }

    /// Merges queued chunks in groups of at most [`Self::fan_in`] chunks, appending every intermediate result to
    /// the queue. The last group is merged into the destination.
    fn merge_chunks<F>(
        &self,
        dir: &Path,
        chunks: Vec<Chunk>,
        destination: &Path,
        compare: &F,
    ) -> Result<SortSummary, SortError>
    where
        F: Fn(&str, &str) -> Ordering,
    {
        let fan_in = self.fan_in();
        let mut queue = VecDeque::from(chunks);
        let mut summary = SortSummary::default();

        loop {
            let group_size = fan_in.min(queue.len());
            let group = Vec::from_iter(queue.drain(..group_size));
            let last = queue.is_empty();

            let output = if last {
                self.create_output(destination)?
            } else {
                ChunkWriter::create(dir, self.rw_buf_size).map_err(SortError::TempDir)?
            };
            let output_error: fn(io::Error) -> SortError = if last {
                SortError::OutputError
            } else {
                SortError::IO
            };

            let merged = match self.merge_strategy {
                MergeStrategy::Pairwise => match <[Chunk; 2]>::try_from(group) {
                    Ok([left, right]) => self.merge_pair(left, right, output, output_error, compare)?,
                    Err(group) => self.merge_group(group, output, output_error, compare)?,
                },
                MergeStrategy::Tournament => self.merge_group(group, output, output_error, compare)?,
            };
            summary.merges += 1;

            if last {
                summary.records = merged.len();
                merged.persist(destination).map_err(SortError::OutputError)?;
                break;
            }
            queue.push_back(merged);
        }

        return Ok(summary);
    }

    fn merge_pair<F>(
        &self,
        left: Chunk,
        right: Chunk,
        mut output: ChunkWriter,
        output_error: fn(io::Error) -> SortError,
        compare: &F,
    ) -> Result<Chunk, SortError>
    where
        F: Fn(&str, &str) -> Ordering,
    {
        log::debug!("merging chunks ({} + {} lines)", left.len(), right.len());

        let left_reader = left.reader(self.rw_buf_size).map_err(SortError::IO)?;
        let right_reader = right.reader(self.rw_buf_size).map_err(SortError::IO)?;

        let merger = WindowedMerger::new_by(left_reader, right_reader, self.window_size(), |a: &String, b: &String| {
            compare(a.as_str(), b.as_str())
        });
        for line in merger {
            let line = line.map_err(SortError::IO)?;
            output.write_line(&line).map_err(output_error)?;
        }

        let merged = output.finish().map_err(output_error)?;
        left.delete();
        right.delete();

        return Ok(merged);
    }

    fn merge_group<F>(
        &self,
        group: Vec<Chunk>,
        mut output: ChunkWriter,
        output_error: fn(io::Error) -> SortError,
        compare: &F,
    ) -> Result<Chunk, SortError>
    where
        F: Fn(&str, &str) -> Ordering,
    {
        log::debug!("merging {} chunks at once", group.len());

        let readers = group
            .iter()
            .map(|chunk| chunk.reader(self.rw_buf_size))
            .collect::<io::Result<Vec<_>>>()
            .map_err(SortError::IO)?;

        let merger = TournamentMerger::new_by(readers, |a: &String, b: &String| compare(a.as_str(), b.as_str()));
        for line in merger {
            let line = line.map_err(SortError::IO)?;
            output.write_line(&line).map_err(output_error)?;
        }

        let merged = output.finish().map_err(output_error)?;
        for chunk in group {
            chunk.delete();
        }

        return Ok(merged);
    }

    /// Creates a staging file next to the destination, so the result can be moved in place atomically.
    fn create_output(&self, destination: &Path) -> Result<ChunkWriter, SortError> {
        let dir = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        return ChunkWriter::create(dir, self.rw_buf_size).map_err(SortError::OutputError);
    }
}

fn complete_output(output: ChunkWriter, destination: &Path) -> Result<(), SortError> {
    output
        .finish()
        .and_then(|chunk| chunk.persist(destination))
        .map_err(SortError::OutputError)?;

    log::debug!("result saved to {}", destination.display());

    return Ok(());
}

/// Reads up to `limit` lines into the batch.
fn fill_batch<R: BufRead>(
    lines: &mut Peekable<io::Lines<R>>,
    batch: &mut Vec<String>,
    limit: usize,
) -> Result<(), SortError> {
    while batch.len() < limit {
        match lines.next() {
            Some(line) => batch.push(line.map_err(SortError::InputError)?),
            None => break,
        }
    }

    return Ok(());
}
