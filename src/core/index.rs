//! Session index side files
//!
//! Each shared log file gets a side file named after its inode inside the
//! index directory. Every indexed write appends one line
//! `<session-identity> <offset> <length>` to it, which lets a reader pull a
//! single session's lines out of a large shared log without scanning it.
//!
//! Recording is best-effort: every failure is swallowed and only counted.

use super::encoder::BoundedWriter;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

/// Default directory for index side files
pub const DEFAULT_INDEX_DIR: &str = "/var/log/siplog.idx";

const INDEX_LINE_LEN: usize = 512;

/// Appends index records for log files into one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexWriter {
    dir: PathBuf,
}

impl IndexWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Side file that holds the records for `log_file`
    pub fn side_file_for(&self, log_file: &File) -> io::Result<PathBuf> {
        let inode = log_file.metadata()?.ino();
        Ok(self.dir.join(inode.to_string()))
    }

    /// Record that `length` bytes at `offset` of `log_file` belong to
    /// `identity`. Must be called while the append lock on `log_file` is
    /// still held so the offset is accurate.
    pub fn record(&self, identity: &str, log_file: &File, offset: u64, length: usize) -> io::Result<()> {
        let side_file = self.side_file_for(log_file)?;

        let mut line = [0u8; INDEX_LINE_LEN];
        let mut out = BoundedWriter::new(&mut line);
        writeln!(out, "{} {} {}", identity, offset, length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "index identity too long"))?;
        let len = out.len();

        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(side_file)?;
        index.write_all(&line[..len])
    }
}

/// One parsed line of an index side file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub identity: String,
    pub offset: u64,
    pub length: u64,
}

impl IndexRecord {
    /// Parse `<identity> <offset> <length>`; the identity may not contain
    /// whitespace.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let identity = fields.next()?;
        let offset = fields.next()?.parse().ok()?;
        let length = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            identity: identity.to_string(),
            offset,
            length,
        })
    }

    /// Read the bytes this record points at.
    ///
    /// A record reaching past the end of `log_file` is rejected with
    /// `InvalidData` before anything is read.
    pub fn extract(&self, log_file: &mut File) -> io::Result<Vec<u8>> {
        let size = log_file.metadata()?.len();
        let in_bounds = self
            .offset
            .checked_add(self.length)
            .is_some_and(|end| end <= size);
        if !in_bounds {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "index record {}+{} exceeds log size {}",
                    self.offset, self.length, size
                ),
            ));
        }
        log_file.seek(SeekFrom::Start(self.offset))?;
        let mut data = vec![0u8; self.length as usize];
        log_file.read_exact(&mut data)?;
        Ok(data)
    }
}

/// Load every well-formed record from the side file for `log_path`.
///
/// Malformed lines are skipped.
pub fn read_index(index_dir: impl AsRef<Path>, log_path: impl AsRef<Path>) -> io::Result<Vec<IndexRecord>> {
    let inode = std::fs::metadata(log_path)?.ino();
    let side_file = File::open(index_dir.as_ref().join(inode.to_string()))?;
    let mut records = Vec::new();
    for line in BufReader::new(side_file).lines() {
        if let Some(record) = IndexRecord::parse(&line?) {
            records.push(record);
        }
    }
    Ok(records)
}

/// Collect the lines recorded for `identity` from `log_path`
pub fn lines_for(
    index_dir: impl AsRef<Path>,
    log_path: impl AsRef<Path>,
    identity: &str,
) -> io::Result<Vec<String>> {
    let log_path = log_path.as_ref();
    let mut log_file = File::open(log_path)?;
    let mut lines = Vec::new();
    for record in read_index(index_dir, log_path)? {
        if record.identity == identity {
            let data = record.extract(&mut log_file)?;
            lines.push(String::from_utf8_lossy(&data).into_owned());
        }
    }
    Ok(lines)
}
