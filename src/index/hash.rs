//! Extendible hashing index.
//!
//! Two files back each index:
//!
//! ```text
//! directory:  [global_depth: i32][ptr_0 ... ptr_{2^d - 1}]       (bucket indices)
//! data:       [bucket_0][bucket_1] ...
//! bucket:     [size: i32][next_bucket: i32][local_depth: i32]
//!             [record_0 ... record_{BUCKET_FACTOR - 1}]          (zero-padded)
//! record:     [key cell][slot: i32][is_deleted: i32]
//! ```
//!
//! The low `global_depth` bits of `h(key)` index the directory. Integer
//! keys hash to their own value and floats to their bit pattern, keeping
//! bucket placement reproducible; string keys hash through crc32.
//!
//! Insert resolution order when the target bucket is full:
//!
//! 1. `local_depth < global_depth` → split the bucket and retry.
//! 2. Append to the overflow chain (bounded by `max_collisions`).
//! 3. `global_depth < max_global_depth` → double the directory, split the
//!    triggering bucket, rehash displaced overflow records, retry.
//! 4. Fail with [`IndexError::CapacityExhausted`].
//!
//! Delete marks the record, compacts the chain, then buddy-merges while
//! both buddies share a depth, carry no overflow, and fit in one bucket,
//! and finally halves the directory when both halves are identical.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher as Crc32;
use tracing::debug;

use crate::index::{Index, IndexError, Key, KeyCodec};
use crate::schema::Value;

const NO_BUCKET: i32 = -1;
const BUCKET_HEADER_SIZE: usize = 12;

/// Capacity knobs for one extendible hash index.
///
/// The bucket byte layout depends on `bucket_factor`, so an index must be
/// reopened with the configuration it was created with.
#[derive(Debug, Clone, Copy)]
pub struct HashConfig {
    /// Records per bucket.
    pub bucket_factor: usize,
    /// Maximum overflow buckets chained behind a base bucket.
    pub max_collisions: usize,
    /// Upper bound on the directory's global depth.
    pub max_global_depth: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            bucket_factor: 32,
            max_collisions: 4,
            max_global_depth: 12,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Records and buckets
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct HashRecord {
    key: Key,
    slot: i32,
    is_deleted: i32,
}

#[derive(Debug, Clone)]
struct Bucket {
    records: Vec<HashRecord>,
    next_bucket: i32,
    local_depth: i32,
}

impl Bucket {
    fn new(local_depth: i32) -> Self {
        Self {
            records: Vec::new(),
            next_bucket: NO_BUCKET,
            local_depth,
        }
    }

    fn active(&self) -> impl Iterator<Item = &HashRecord> {
        self.records.iter().filter(|r| r.is_deleted == 0)
    }

    fn active_count(&self) -> usize {
        self.active().count()
    }

    fn is_full(&self, factor: usize) -> bool {
        self.active_count() >= factor
    }

    fn clear(&mut self) {
        self.records.clear();
        self.next_bucket = NO_BUCKET;
    }
}

#[derive(Debug, Clone)]
struct Directory {
    global_depth: u32,
    ptrs: Vec<i32>,
}

impl Directory {
    fn new(global_depth: u32) -> Self {
        Self {
            global_depth,
            ptrs: vec![NO_BUCKET; 1 << global_depth],
        }
    }

    /// Double the directory; each new pointer mirrors its low-bit twin.
    fn expand(&mut self) {
        let copy = self.ptrs.clone();
        self.ptrs.extend(copy);
        self.global_depth += 1;
    }
}

/// Directory indices that share the bucket reachable from `idx`:
/// `{p + k * 2^local_depth}` where `p` is the bucket's low-bits prefix.
fn indices_for_bucket(idx: usize, local_depth: u32, global_depth: u32) -> Vec<usize> {
    let p = idx & ((1usize << local_depth) - 1);
    let step = 1usize << local_depth;
    let repeat = 1usize << (global_depth - local_depth);
    (0..repeat).map(|k| p + k * step).collect()
}

// ------------------------------------------------------------------------------------------------
// The index
// ------------------------------------------------------------------------------------------------

/// Extendible hash index over `(key, slot)` entries.
pub struct ExtendibleHash {
    dir_path: PathBuf,
    data_path: PathBuf,
    codec: KeyCodec,
    config: HashConfig,
    directory: Directory,
    next_bucket_pos: i32,
}

impl ExtendibleHash {
    /// Open (or create) the index backed by its directory and data files.
    pub fn open(
        dir_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        codec: KeyCodec,
        config: HashConfig,
    ) -> Result<Self, IndexError> {
        let mut index = Self {
            dir_path: dir_path.as_ref().to_path_buf(),
            data_path: data_path.as_ref().to_path_buf(),
            codec,
            config,
            directory: Directory::new(2),
            next_bucket_pos: 0,
        };
        if index.dir_path.exists() && index.data_path.exists() {
            index.load_state()?;
        } else {
            index.initialize_files()?;
        }
        Ok(index)
    }

    fn record_size(&self) -> usize {
        self.codec.encoded_size() + 8
    }

    fn bucket_size(&self) -> usize {
        BUCKET_HEADER_SIZE + self.config.bucket_factor * self.record_size()
    }

    fn initialize_files(&mut self) -> Result<(), IndexError> {
        self.directory = Directory::new(2);

        let b0 = Bucket::new(1);
        let b1 = Bucket::new(1);
        let mut f = File::create(&self.data_path)?;
        f.write_all(&self.pack_bucket(&b0)?)?;
        f.write_all(&self.pack_bucket(&b1)?)?;
        drop(f);

        self.directory.ptrs[0] = 0;
        self.directory.ptrs[1] = 1;
        self.directory.ptrs[2] = 0;
        self.directory.ptrs[3] = 1;
        self.next_bucket_pos = 2;
        self.write_directory()
    }

    fn load_state(&mut self) -> Result<(), IndexError> {
        let mut bytes = Vec::new();
        File::open(&self.dir_path)?.read_to_end(&mut bytes)?;
        if bytes.len() < 4 {
            return Err(IndexError::Corrupt("hash directory too short".into()));
        }
        let global_depth = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if !(0..=30).contains(&global_depth) {
            return Err(IndexError::Corrupt(format!(
                "implausible global depth {global_depth}"
            )));
        }
        let count = 1usize << global_depth;
        if bytes.len() < 4 + count * 4 {
            return Err(IndexError::Corrupt("hash directory truncated".into()));
        }
        let mut ptrs = Vec::with_capacity(count);
        for i in 0..count {
            let off = 4 + i * 4;
            ptrs.push(i32::from_le_bytes([
                bytes[off],
                bytes[off + 1],
                bytes[off + 2],
                bytes[off + 3],
            ]));
        }
        self.directory = Directory {
            global_depth: global_depth as u32,
            ptrs,
        };
        let file_size = std::fs::metadata(&self.data_path)?.len();
        self.next_bucket_pos = (file_size / self.bucket_size() as u64) as i32;
        Ok(())
    }

    fn write_directory(&self) -> Result<(), IndexError> {
        let mut bytes = Vec::with_capacity(4 + self.directory.ptrs.len() * 4);
        bytes.extend_from_slice(&(self.directory.global_depth as i32).to_le_bytes());
        for ptr in &self.directory.ptrs {
            bytes.extend_from_slice(&ptr.to_le_bytes());
        }
        let mut f = File::create(&self.dir_path)?;
        f.write_all(&bytes)?;
        Ok(())
    }

    fn pack_record(&self, record: &HashRecord, buf: &mut Vec<u8>) -> Result<(), IndexError> {
        self.codec.encode(&record.key, buf)?;
        buf.extend_from_slice(&record.slot.to_le_bytes());
        buf.extend_from_slice(&record.is_deleted.to_le_bytes());
        Ok(())
    }

    fn pack_bucket(&self, bucket: &Bucket) -> Result<Vec<u8>, IndexError> {
        let mut buf = Vec::with_capacity(self.bucket_size());
        buf.extend_from_slice(&(bucket.records.len() as i32).to_le_bytes());
        buf.extend_from_slice(&bucket.next_bucket.to_le_bytes());
        buf.extend_from_slice(&bucket.local_depth.to_le_bytes());
        for record in bucket.records.iter().take(self.config.bucket_factor) {
            self.pack_record(record, &mut buf)?;
        }
        buf.resize(self.bucket_size(), 0);
        Ok(buf)
    }

    fn unpack_bucket(&self, bytes: &[u8]) -> Result<Bucket, IndexError> {
        if bytes.len() < BUCKET_HEADER_SIZE {
            return Err(IndexError::Corrupt("bucket shorter than header".into()));
        }
        let size = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let next_bucket = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let local_depth = i32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

        let record_size = self.record_size();
        let mut records = Vec::new();
        let mut off = BUCKET_HEADER_SIZE;
        for _ in 0..size.max(0).min(self.config.bucket_factor as i32) {
            let cell = &bytes[off..off + record_size];
            if cell.iter().any(|&b| b != 0) {
                let (key, n) = self.codec.decode(cell)?;
                let slot = i32::from_le_bytes([cell[n], cell[n + 1], cell[n + 2], cell[n + 3]]);
                let is_deleted =
                    i32::from_le_bytes([cell[n + 4], cell[n + 5], cell[n + 6], cell[n + 7]]);
                records.push(HashRecord {
                    key,
                    slot,
                    is_deleted,
                });
            }
            off += record_size;
        }
        Ok(Bucket {
            records,
            next_bucket,
            local_depth,
        })
    }

    fn read_bucket(&self, pos: i32) -> Result<Bucket, IndexError> {
        let mut f = File::open(&self.data_path)?;
        f.seek(SeekFrom::Start(pos as u64 * self.bucket_size() as u64))?;
        let mut bytes = vec![0u8; self.bucket_size()];
        f.read_exact(&mut bytes)?;
        self.unpack_bucket(&bytes)
    }

    fn write_bucket(&self, pos: i32, bucket: &Bucket) -> Result<(), IndexError> {
        let bytes = self.pack_bucket(bucket)?;
        let mut f = OpenOptions::new().write(true).open(&self.data_path)?;
        f.seek(SeekFrom::Start(pos as u64 * self.bucket_size() as u64))?;
        f.write_all(&bytes)?;
        Ok(())
    }

    fn create_new_bucket(&mut self, local_depth: i32) -> Result<i32, IndexError> {
        let pos = self.next_bucket_pos;
        self.next_bucket_pos += 1;
        let bucket = Bucket::new(local_depth);
        let bytes = self.pack_bucket(&bucket)?;
        let mut f = OpenOptions::new().append(true).open(&self.data_path)?;
        f.write_all(&bytes)?;
        Ok(pos)
    }

    fn hash_index(&self, key: &Key) -> usize {
        let h: u64 = match key {
            // Integer keys hash to themselves; placement stays readable.
            Key::Int(v) => *v as i64 as u64,
            Key::Float(v) => u64::from(v.to_bits()),
            Key::Str(s) => {
                let mut hasher = Crc32::new();
                hasher.update(s.as_bytes());
                u64::from(hasher.finalize())
            }
        };
        (h % (1u64 << self.directory.global_depth)) as usize
    }

    fn chain(&self, start: i32) -> Result<Vec<(i32, Bucket)>, IndexError> {
        let mut out = Vec::new();
        let mut pos = start;
        while pos != NO_BUCKET {
            let bucket = self.read_bucket(pos)?;
            let next = bucket.next_bucket;
            out.push((pos, bucket));
            pos = next;
        }
        Ok(out)
    }

    fn collect_chain_records(&self, start: i32) -> Result<Vec<HashRecord>, IndexError> {
        let mut out = Vec::new();
        for (_, bucket) in self.chain(start)? {
            out.extend(bucket.active().cloned());
        }
        Ok(out)
    }

    fn truncate_chain_to_base(&self, start: i32) -> Result<(), IndexError> {
        let mut base = self.read_bucket(start)?;
        let mut pos = base.next_bucket;
        while pos != NO_BUCKET {
            let mut bucket = self.read_bucket(pos)?;
            let next = bucket.next_bucket;
            bucket.clear();
            self.write_bucket(pos, &bucket)?;
            pos = next;
        }
        base.next_bucket = NO_BUCKET;
        self.write_bucket(start, &base)
    }

    fn append_overflow(&mut self, start: i32, record: HashRecord) -> Result<bool, IndexError> {
        let mut chain_len = 0usize;
        let mut last_pos = start;
        let mut last_bucket = self.read_bucket(last_pos)?;
        while last_bucket.next_bucket != NO_BUCKET {
            chain_len += 1;
            last_pos = last_bucket.next_bucket;
            last_bucket = self.read_bucket(last_pos)?;
        }

        if last_bucket.is_full(self.config.bucket_factor) {
            if chain_len >= self.config.max_collisions {
                return Ok(false);
            }
            let new_pos = self.create_new_bucket(last_bucket.local_depth)?;
            let mut fresh = Bucket::new(last_bucket.local_depth);
            fresh.records.push(record);
            self.write_bucket(new_pos, &fresh)?;

            last_bucket.next_bucket = new_pos;
            self.write_bucket(last_pos, &last_bucket)?;
            Ok(true)
        } else {
            last_bucket.records.push(record);
            self.write_bucket(last_pos, &last_bucket)?;
            Ok(true)
        }
    }

    fn split_bucket_at_index(&mut self, dir_idx: usize) -> Result<(), IndexError> {
        let bucket_pos = self.directory.ptrs[dir_idx];
        let base_bucket = self.read_bucket(bucket_pos)?;
        let old_ld = base_bucket.local_depth as u32;
        let new_ld = base_bucket.local_depth + 1;

        let all_records = self.collect_chain_records(bucket_pos)?;
        self.truncate_chain_to_base(bucket_pos)?;

        let new_bucket_pos = self.create_new_bucket(new_ld)?;

        let mut base_bucket = self.read_bucket(bucket_pos)?;
        base_bucket.local_depth = new_ld;
        self.write_bucket(bucket_pos, &base_bucket)?;

        // Re-point directory entries: those whose (new_ld - 1)-th bit is
        // set move to the new bucket.
        for idx in indices_for_bucket(dir_idx, old_ld, self.directory.global_depth) {
            let bit_is_one = (idx >> (new_ld - 1)) & 1 == 1;
            self.directory.ptrs[idx] = if bit_is_one { new_bucket_pos } else { bucket_pos };
        }
        self.write_directory()?;

        // Redistribute the collected records by the same bit. Each side is
        // repacked as a chain, so a lopsided split spills into overflow
        // buckets instead of dropping records.
        let mut zeros = Vec::new();
        let mut ones = Vec::new();
        for record in all_records {
            let idx = self.hash_index(&record.key);
            if (idx >> (new_ld - 1)) & 1 == 1 {
                ones.push(record);
            } else {
                zeros.push(record);
            }
        }
        self.repack_chain_records(bucket_pos, zeros)?;
        self.repack_chain_records(new_bucket_pos, ones)?;
        Ok(())
    }

    fn expand_directory_and_rehash(&mut self, triggering_idx: usize) -> Result<(), IndexError> {
        self.directory.expand();
        self.write_directory()?;
        debug!(global_depth = self.directory.global_depth, "hash directory doubled");

        self.split_bucket_at_index(triggering_idx)?;

        // Overflow records were placed under the old depth; pull them off
        // their chains and reinsert under the new one.
        let mut unique: Vec<i32> = self.directory.ptrs.clone();
        unique.sort_unstable();
        unique.dedup();

        let mut displaced = Vec::new();
        for pos in unique {
            let chain_records = self.collect_chain_records(pos)?;
            let base = self.read_bucket(pos)?;
            let in_base: Vec<(Key, i32)> =
                base.active().map(|r| (r.key.clone(), r.slot)).collect();
            let to_reinsert: Vec<HashRecord> = chain_records
                .into_iter()
                .filter(|r| !in_base.iter().any(|(k, s)| *s == r.slot && k == &r.key))
                .collect();
            if !to_reinsert.is_empty() {
                self.truncate_chain_to_base(pos)?;
                displaced.extend(to_reinsert);
            }
        }
        for record in displaced {
            self.insert_entry(record.key, record.slot)?;
        }
        Ok(())
    }

    /// Insert `(key, slot)`. Duplicate keys are allowed.
    pub fn insert_entry(&mut self, key: Key, slot: i32) -> Result<(), IndexError> {
        let record = HashRecord {
            key,
            slot,
            is_deleted: 0,
        };
        loop {
            let idx = self.hash_index(&record.key);
            let bucket_pos = self.directory.ptrs[idx];
            let mut bucket = self.read_bucket(bucket_pos)?;

            if !bucket.is_full(self.config.bucket_factor) {
                bucket.records.push(record);
                return self.write_bucket(bucket_pos, &bucket);
            }

            if (bucket.local_depth as u32) < self.directory.global_depth {
                self.split_bucket_at_index(idx)?;
                continue;
            }

            if self.append_overflow(bucket_pos, record.clone())? {
                return Ok(());
            }

            if self.directory.global_depth < self.config.max_global_depth {
                self.expand_directory_and_rehash(idx)?;
                continue;
            }

            return Err(IndexError::CapacityExhausted(format!(
                "global depth {} at maximum and overflow chain full at directory index {idx}",
                self.directory.global_depth
            )));
        }
    }

    /// First active slot stored under `key`.
    pub fn find_entry(&self, key: &Key) -> Result<Option<i32>, IndexError> {
        let idx = self.hash_index(key);
        let start = self.directory.ptrs[idx];
        for (_, bucket) in self.chain(start)? {
            for record in bucket.active() {
                if &record.key == key {
                    return Ok(Some(record.slot));
                }
            }
        }
        Ok(None)
    }

    fn bucket_has_overflow(&self, pos: i32) -> Result<bool, IndexError> {
        Ok(self.read_bucket(pos)?.next_bucket != NO_BUCKET)
    }

    /// Rewrite a chain with exactly `records`, base first, spilling into
    /// fresh overflow buckets as needed.
    fn repack_chain_records(
        &mut self,
        base_pos: i32,
        records: Vec<HashRecord>,
    ) -> Result<(), IndexError> {
        let mut base = self.read_bucket(base_pos)?;
        base.records.clear();
        let mut i = 0;
        while i < records.len() && !base.is_full(self.config.bucket_factor) {
            base.records.push(records[i].clone());
            i += 1;
        }
        let local_depth = base.local_depth;
        self.write_bucket(base_pos, &base)?;
        self.truncate_chain_to_base(base_pos)?;

        let mut tail_pos = base_pos;
        let mut overflows = 0usize;
        while i < records.len() && overflows < self.config.max_collisions {
            let new_pos = self.create_new_bucket(local_depth)?;
            let mut fresh = Bucket::new(local_depth);
            while i < records.len() && !fresh.is_full(self.config.bucket_factor) {
                fresh.records.push(records[i].clone());
                i += 1;
            }
            self.write_bucket(new_pos, &fresh)?;

            let mut tail = self.read_bucket(tail_pos)?;
            tail.next_bucket = new_pos;
            self.write_bucket(tail_pos, &tail)?;
            tail_pos = new_pos;
            overflows += 1;
        }

        if i < records.len() {
            return Err(IndexError::CapacityExhausted(
                "chain repack exceeds the overflow limit".into(),
            ));
        }
        Ok(())
    }

    fn compact_chain(&mut self, base_pos: i32) -> Result<(), IndexError> {
        let live = self.collect_chain_records(base_pos)?;
        self.repack_chain_records(base_pos, live)
    }

    fn buddy_index(dir_idx: usize, local_depth: i32) -> usize {
        if local_depth <= 0 {
            return dir_idx;
        }
        dir_idx ^ (1usize << (local_depth - 1))
    }

    /// Try to fuse the bucket at `dir_idx` with its buddy. Returns whether
    /// a merge happened.
    fn try_merge_once(&mut self, dir_idx: usize) -> Result<bool, IndexError> {
        let pos_a = self.directory.ptrs[dir_idx];
        let mut a = self.read_bucket(pos_a)?;
        let ld = a.local_depth;
        if ld == 0 {
            return Ok(false);
        }

        let buddy_idx = Self::buddy_index(dir_idx, ld);
        if buddy_idx >= self.directory.ptrs.len() {
            return Ok(false);
        }
        let pos_b = self.directory.ptrs[buddy_idx];
        if pos_b == pos_a {
            return Ok(false);
        }

        let mut b = self.read_bucket(pos_b)?;
        if a.local_depth != b.local_depth {
            return Ok(false);
        }
        // A bucket with overflow is never merged.
        if self.bucket_has_overflow(pos_a)? || self.bucket_has_overflow(pos_b)? {
            return Ok(false);
        }
        if a.active_count() + b.active_count() > self.config.bucket_factor {
            return Ok(false);
        }

        let mut merged: Vec<HashRecord> = a.active().cloned().collect();
        merged.extend(b.active().cloned());

        a.clear();
        b.clear();
        self.write_bucket(pos_b, &b)?;

        a.local_depth = ld - 1;
        self.write_bucket(pos_a, &a)?;
        self.repack_chain_records(pos_a, merged)?;

        let new_ld = (ld - 1) as u32;
        for idx in indices_for_bucket(dir_idx, new_ld, self.directory.global_depth) {
            self.directory.ptrs[idx] = pos_a;
        }
        self.write_directory()?;
        Ok(true)
    }

    /// Halve the directory when both halves are identical and no bucket
    /// is deeper than the shrunken depth.
    fn maybe_shrink_directory(&mut self) -> Result<(), IndexError> {
        let g = self.directory.global_depth;
        if g == 0 {
            return Ok(());
        }
        let half = 1usize << (g - 1);
        for i in 0..half {
            if self.directory.ptrs[i] != self.directory.ptrs[i + half] {
                return Ok(());
            }
        }
        let mut seen: Vec<i32> = self.directory.ptrs.clone();
        seen.sort_unstable();
        seen.dedup();
        for pos in seen {
            if self.read_bucket(pos)?.local_depth as u32 > g - 1 {
                return Ok(());
            }
        }
        self.directory.ptrs.truncate(half);
        self.directory.global_depth = g - 1;
        self.write_directory()?;
        debug!(global_depth = self.directory.global_depth, "hash directory halved");
        Ok(())
    }

    /// Mark the first active record for `key` deleted, compact the chain,
    /// then attempt buddy merges and a directory shrink.
    pub fn delete_entry(&mut self, key: &Key) -> Result<bool, IndexError> {
        let idx = self.hash_index(key);
        let start = self.directory.ptrs[idx];

        let mut found = false;
        for (pos, mut bucket) in self.chain(start)? {
            let mut modified = false;
            for record in &mut bucket.records {
                if record.is_deleted == 0 && &record.key == key {
                    record.is_deleted = 1;
                    modified = true;
                    found = true;
                    break;
                }
            }
            if modified {
                self.write_bucket(pos, &bucket)?;
                break;
            }
        }
        if !found {
            return Ok(false);
        }

        self.compact_chain(start)?;
        while self.try_merge_once(idx)? {}
        self.maybe_shrink_directory()?;
        Ok(true)
    }

    /// Current global depth (test support).
    pub(crate) fn global_depth(&self) -> u32 {
        self.directory.global_depth
    }

    /// Verify the directory ↔ bucket invariants:
    /// `local_depth(b) <= global_depth` for every bucket, and every
    /// directory entry `i` points to a bucket whose low `local_depth`
    /// bits match `i`'s.
    pub(crate) fn verify_directory_invariants(&self) -> Result<(), String> {
        let g = self.directory.global_depth;
        let mut prefix_of: std::collections::HashMap<i32, usize> = std::collections::HashMap::new();

        for (i, &pos) in self.directory.ptrs.iter().enumerate() {
            let bucket = self
                .read_bucket(pos)
                .map_err(|e| format!("unreadable bucket {pos}: {e}"))?;
            let ld = bucket.local_depth as u32;
            if ld > g {
                return Err(format!("bucket {pos} has local depth {ld} > global depth {g}"));
            }
            let mask = (1usize << ld) - 1;
            let prefix = i & mask;
            match prefix_of.get(&pos) {
                None => {
                    prefix_of.insert(pos, prefix);
                }
                Some(&expected) if expected == prefix => {}
                Some(&expected) => {
                    return Err(format!(
                        "bucket {pos}: directory entry {i} has prefix {prefix:b}, expected {expected:b}"
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Index for ExtendibleHash {
    fn insert(&mut self, key: &Value, slot: u64) -> Result<(), IndexError> {
        let key = self.codec.key_from_value(key)?;
        self.insert_entry(key, slot as i32)
    }

    fn find(&mut self, key: &Value) -> Result<Option<u64>, IndexError> {
        let key = self.codec.key_from_value(key)?;
        Ok(self.find_entry(&key)?.map(|slot| slot as u64))
    }

    fn range(&mut self, _lo: &Value, _hi: &Value) -> Result<Vec<u64>, IndexError> {
        // Point-only structure; ordered scans fall back to other paths.
        Ok(Vec::new())
    }

    fn remove(&mut self, key: &Value) -> Result<bool, IndexError> {
        let key = self.codec.key_from_value(key)?;
        self.delete_entry(&key)
    }

    fn save(&mut self) -> Result<(), IndexError> {
        self.write_directory()
    }
}
