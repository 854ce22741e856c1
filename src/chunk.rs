//! Temporary line chunks.

use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use log;
use tempfile;

/// Sorted sequence of text lines stored in a temporary file.
///
/// The file is owned by the chunk and deleted when the chunk is dropped, so a chunk never outlives
/// the operation that created it unless it is explicitly persisted.
pub struct Chunk {
    path: tempfile::TempPath,
    len: u64,
}

impl Chunk {
    /// Builds a chunk in the directory `dir` from the provided lines.
    pub fn build<S: AsRef<str>>(
        dir: &Path,
        lines: impl IntoIterator<Item = S>,
        buf_size: Option<usize>,
    ) -> io::Result<Self> {
        let mut writer = ChunkWriter::create(dir, buf_size)?;
        for line in lines.into_iter() {
            writer.write_line(line.as_ref())?;
        }

        return writer.finish();
    }

    /// Returns the number of lines stored in the chunk.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a reader over the chunk lines.
    pub fn reader(&self, buf_size: Option<usize>) -> io::Result<ChunkReader> {
        let file = fs::File::open(&self.path)?;
        let reader = match buf_size {
            Some(buf_size) => io::BufReader::with_capacity(buf_size, file),
            None => io::BufReader::new(file),
        };

        return Ok(ChunkReader { lines: reader.lines() });
    }

    /// Moves the chunk file to `dest` replacing any existing file.
    /// The chunk must reside on the same file system as `dest`.
    pub fn persist(self, dest: &Path) -> io::Result<()> {
        self.path.persist(dest).map_err(|err| err.error)
    }

    /// Deletes the chunk file. Deletion errors are logged and suppressed.
    pub fn delete(self) {
        let path = self.path.to_path_buf();
        if let Err(err) = self.path.close() {
            log::warn!("chunk {} removal failed: {}", path.display(), err);
        }
    }
}

/// Chunk line writer.
pub struct ChunkWriter {
    writer: io::BufWriter<fs::File>,
    file: tempfile::NamedTempFile,
    len: u64,
}

impl ChunkWriter {
    /// Creates a new empty chunk file in the directory `dir`.
    pub fn create(dir: &Path, buf_size: Option<usize>) -> io::Result<Self> {
        let file = tempfile::Builder::new().prefix(".chunk").tempfile_in(dir)?;

        let writer = match buf_size {
            Some(buf_size) => io::BufWriter::with_capacity(buf_size, file.as_file().try_clone()?),
            None => io::BufWriter::new(file.as_file().try_clone()?),
        };

        return Ok(ChunkWriter { writer, file, len: 0 });
    }

    /// Appends a line. The line must not contain line terminators.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.len += 1;

        return Ok(());
    }

    /// Returns the number of lines written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Flushes buffered data and closes the writer.
    pub fn finish(self) -> io::Result<Chunk> {
        let ChunkWriter { writer, file, len } = self;
        writer.into_inner().map_err(|err| err.into_error())?;

        return Ok(Chunk {
            path: file.into_temp_path(),
            len,
        });
    }
}

#[cfg(test)]
impl ChunkWriter {
    /// Creates a chunk writer backed by a read-only handle, so every write fails.
    pub(crate) fn read_only(dir: &Path) -> io::Result<Self> {
        let file = tempfile::Builder::new().prefix(".chunk").tempfile_in(dir)?;
        let writer = io::BufWriter::with_capacity(0, fs::File::open(file.path())?);

        return Ok(ChunkWriter { writer, file, len: 0 });
    }
}

/// Chunk line reader.
pub struct ChunkReader {
    lines: io::Lines<io::BufReader<fs::File>>,
}

impl Iterator for ChunkReader {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next()
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use rstest::*;

    use super::{Chunk, ChunkWriter};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir_in("./").unwrap()
    }

    #[rstest]
    fn test_chunk(tmp_dir: tempfile::TempDir) {
        let saved = Vec::from_iter((0..100).map(|i| i.to_string()));

        let chunk = Chunk::build(tmp_dir.path(), &saved, None).unwrap();
        assert_eq!(chunk.len(), 100);

        let restored: io::Result<Vec<String>> = chunk.reader(Some(16)).unwrap().collect();
        assert_eq!(restored.unwrap(), saved);
    }

    #[rstest]
    fn test_chunk_removed_on_drop(tmp_dir: tempfile::TempDir) {
        let chunk = Chunk::build(tmp_dir.path(), vec!["a", "b"], None).unwrap();
        let path = chunk.path().to_path_buf();
        assert!(path.exists());

        drop(chunk);
        assert!(!path.exists());
    }

    #[rstest]
    fn test_chunk_delete(tmp_dir: tempfile::TempDir) {
        let chunk = Chunk::build(tmp_dir.path(), vec!["a"], None).unwrap();
        let path = chunk.path().to_path_buf();

        chunk.delete();
        assert!(!path.exists());
    }

    #[rstest]
    fn test_unfinished_writer_removed(tmp_dir: tempfile::TempDir) {
        let mut writer = ChunkWriter::create(tmp_dir.path(), None).unwrap();
        writer.write_line("abandoned").unwrap();
        drop(writer);

        assert_eq!(std::fs::read_dir(tmp_dir.path()).unwrap().count(), 0);
    }

    #[rstest]
    fn test_chunk_persist(tmp_dir: tempfile::TempDir) {
        let dest = tmp_dir.path().join("result.txt");

        let mut writer = ChunkWriter::create(tmp_dir.path(), None).unwrap();
        writer.write_line("1").unwrap();
        writer.write_line("").unwrap();
        writer.write_line("2").unwrap();
        assert_eq!(writer.len(), 3);

        writer.finish().unwrap().persist(&dest).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "1\n\n2\n");
    }

    #[rstest]
    fn test_read_only_writer_fails(tmp_dir: tempfile::TempDir) {
        let mut writer = ChunkWriter::read_only(tmp_dir.path()).unwrap();
        assert!(writer.write_line("x").is_err());
    }
}
