//! Heap record file — the primary row store of a table.
//!
//! One file per table, fixed-slot, append-only:
//!
//! ```text
//! [record_count: i32] [slot_0] [slot_1] ...
//! ```
//!
//! Each slot is exactly `record_size` bytes (the sum of the table's column
//! widths). Slots are identified by their zero-based position, stable for
//! the record's lifetime: the heap never relocates live records except
//! during explicit [`RecordFile::compact`], which invalidates every
//! previously handed-out slot.
//!
//! Deletion tombstones a slot by overwriting its first byte with `0xFF`;
//! scans and reads treat such slots as absent. The header count includes
//! tombstones — [`RecordFile::active_count`] walks the file to count live
//! slots.
//!
//! Files are opened per operation (open → seek → read/write → close); no
//! handles are cached. The header is rewritten only after the body write
//! succeeded, so a failed append leaves the previous count intact.

#[cfg(test)]
mod tests;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::schema::{Column, Record, SchemaError, decode_record, encode_record, record_size};

/// Byte that marks a slot as logically deleted.
pub const TOMBSTONE: u8 = 0xFF;

const HEADER_SIZE: u64 = 4;

/// Errors returned by heap file operations.
#[derive(Debug, Error)]
pub enum HeapError {
    /// Underlying I/O error — fatal to the call.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record serialization or deserialization failed.
    #[error("record codec error: {0}")]
    Schema(#[from] SchemaError),

    /// The file is shorter than its header claims.
    #[error("heap file truncated: {0}")]
    Truncated(String),
}

/// A fixed-slot record file over an ordered column list.
pub struct RecordFile {
    path: PathBuf,
    columns: Vec<Column>,
    record_size: usize,
    record_count: u32,
}

impl RecordFile {
    /// Open the heap file at `path`, creating it (with a zero-count header)
    /// if it does not exist.
    pub fn open(path: impl AsRef<Path>, columns: Vec<Column>) -> Result<Self, HeapError> {
        let path = path.as_ref().to_path_buf();
        let record_size = record_size(&columns);

        let mut heap = Self {
            path,
            columns,
            record_size,
            record_count: 0,
        };

        if heap.path.exists() && fs::metadata(&heap.path)?.len() >= HEADER_SIZE {
            heap.record_count = heap.load_header()?;
        } else {
            heap.initialize_file()?;
        }
        Ok(heap)
    }

    fn initialize_file(&mut self) -> Result<(), HeapError> {
        let mut f = File::create(&self.path)?;
        f.write_all(&0i32.to_le_bytes())?;
        self.record_count = 0;
        Ok(())
    }

    fn load_header(&self) -> Result<u32, HeapError> {
        let mut f = File::open(&self.path)?;
        let mut header = [0u8; 4];
        f.read_exact(&mut header)?;
        Ok(i32::from_le_bytes(header).max(0) as u32)
    }

    fn store_header(&self) -> Result<(), HeapError> {
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(0))?;
        f.write_all(&(self.record_count as i32).to_le_bytes())?;
        Ok(())
    }

    fn slot_offset(&self, position: u64) -> u64 {
        HEADER_SIZE + position * self.record_size as u64
    }

    /// Append a record, returning its new slot.
    ///
    /// The body is written before the header count is bumped; a failure
    /// mid-call leaves no partially counted slot.
    pub fn insert(&mut self, record: &Record) -> Result<u64, HeapError> {
        let bytes = encode_record(&self.columns, record)?;

        let mut f = OpenOptions::new().append(true).open(&self.path)?;
        f.write_all(&bytes)?;
        drop(f);

        let position = u64::from(self.record_count);
        self.record_count += 1;
        self.store_header()?;
        Ok(position)
    }

    /// Read the record at `position`. Returns `None` when the position is
    /// out of range or the slot is tombstoned.
    pub fn read(&self, position: u64) -> Result<Option<Record>, HeapError> {
        if position >= u64::from(self.record_count) {
            return Ok(None);
        }
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(self.slot_offset(position)))?;
        let mut bytes = vec![0u8; self.record_size];
        if f.read_exact(&mut bytes).is_err() {
            return Ok(None);
        }
        if bytes.first() == Some(&TOMBSTONE) {
            return Ok(None);
        }
        Ok(Some(decode_record(&self.columns, &bytes)?))
    }

    /// Overwrite the record at `position` in place. Returns `false` when
    /// the position is out of range. The record must carry every column.
    pub fn update(&mut self, position: u64, record: &Record) -> Result<bool, HeapError> {
        if position >= u64::from(self.record_count) {
            return Ok(false);
        }
        let bytes = encode_record(&self.columns, record)?;
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(self.slot_offset(position)))?;
        f.write_all(&bytes)?;
        Ok(true)
    }

    /// Tombstone the slot at `position`. Idempotent; returns whether the
    /// slot was previously live.
    pub fn delete(&mut self, position: u64) -> Result<bool, HeapError> {
        if position >= u64::from(self.record_count) {
            return Ok(false);
        }
        let was_live = !self.is_deleted(position)?;
        if was_live {
            let mut f = OpenOptions::new().write(true).open(&self.path)?;
            f.seek(SeekFrom::Start(self.slot_offset(position)))?;
            f.write_all(&[TOMBSTONE])?;
        }
        Ok(was_live)
    }

    /// Whether the slot at `position` is tombstoned (out-of-range slots
    /// count as deleted).
    pub fn is_deleted(&self, position: u64) -> Result<bool, HeapError> {
        if position >= u64::from(self.record_count) {
            return Ok(true);
        }
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(self.slot_offset(position)))?;
        let mut first = [0u8; 1];
        f.read_exact(&mut first)?;
        Ok(first[0] == TOMBSTONE)
    }

    /// Lazy sequence of `(slot, record)` pairs for live slots, in slot
    /// order.
    pub fn scan_all(&self) -> Result<ScanIter<'_>, HeapError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut iter = ScanIter {
            columns: &self.columns,
            record_size: self.record_size,
            remaining: u64::from(self.record_count),
            next_slot: 0,
            reader,
        };
        iter.reader.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(iter)
    }

    /// Total slots, tombstoned included.
    pub fn count(&self) -> u64 {
        u64::from(self.record_count)
    }

    /// Live (non-tombstoned) slots. Walks the file.
    pub fn active_count(&self) -> Result<u64, HeapError> {
        let mut live = 0;
        for entry in self.scan_all()? {
            entry?;
            live += 1;
        }
        Ok(live)
    }

    /// Rewrite the file with only live records, returning the new count.
    ///
    /// Every slot id handed out before this call is invalidated. The
    /// rewrite goes through a temporary file and a rename, so a failure
    /// mid-compaction leaves the original file untouched.
    pub fn compact(&mut self) -> Result<u64, HeapError> {
        let mut survivors = Vec::new();
        for entry in self.scan_all()? {
            let (_, record) = entry?;
            survivors.push(record);
        }

        let tmp_path = self.path.with_extension("compact");
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(&(survivors.len() as i32).to_le_bytes())?;
            for record in &survivors {
                f.write_all(&encode_record(&self.columns, record)?)?;
            }
            f.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        self.record_count = survivors.len() as u32;
        debug!(
            path = %self.path.display(),
            live = survivors.len(),
            "heap compacted"
        );
        Ok(self.record_count as u64)
    }

    /// Record width in bytes.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// The ordered column list this heap serializes against.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// Iterator over live `(slot, record)` pairs in slot order.
pub struct ScanIter<'a> {
    columns: &'a [Column],
    record_size: usize,
    remaining: u64,
    next_slot: u64,
    reader: BufReader<File>,
}

impl Iterator for ScanIter<'_> {
    type Item = Result<(u64, Record), HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut bytes = vec![0u8; self.record_size];
        while self.remaining > 0 {
            self.remaining -= 1;
            let slot = self.next_slot;
            self.next_slot += 1;

            match self.reader.read_exact(&mut bytes) {
                Ok(()) => {}
                // A header count beyond the file body: stop cleanly.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return None,
                Err(e) => return Some(Err(e.into())),
            }
            if bytes.first() == Some(&TOMBSTONE) {
                continue;
            }
            return Some(
                decode_record(self.columns, &bytes)
                    .map(|record| (slot, record))
                    .map_err(HeapError::from),
            );
        }
        None
    }
}
