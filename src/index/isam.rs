//! Two-level ISAM index with overflow chains.
//!
//! Three files: a single-page root index, a mid-level index, and the data
//! file. The two index levels are **static** — built once from a sorted
//! list of `(key, slot)` pairs — while later inserts grow overflow chains
//! behind the data pages.
//!
//! ```text
//! root / mid page:  [n: i32][key_0 ... key_{INDEX_FACTOR-1}][ptr_0 ... ptr_INDEX_FACTOR]
//! data page:        [n: i32][next_page: i32][record_0 ... record_{BLOCK_FACTOR-1}]
//! record:           [key cell][slot: i32][deleted: i32]
//! ```
//!
//! Index pages are standard `n`-key, `n+1`-pointer nodes; `choose_ptr(k)`
//! takes the rightmost `keys[j] <= k` and follows `ptrs[j+1]`, falling
//! back to `ptrs[0]`. Records within a data page stay sorted; overflow
//! pages are linked through `next_page` and appended at end-of-file.
//!
//! Duplicate keys are rejected. Deletion marks the record and never
//! restructures.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::index::{Index, IndexError, Key, KeyCodec};
use crate::schema::Value;

/// Records per data page.
pub const BLOCK_FACTOR: usize = 3;
/// Keys per index page.
pub const INDEX_FACTOR: usize = 4;

const NO_PAGE: i32 = -1;

// ------------------------------------------------------------------------------------------------
// Pages
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct IsamRecord {
    key: Key,
    slot: i32,
    deleted: i32,
}

#[derive(Debug)]
struct IndexPage {
    n: usize,
    keys: Vec<Key>,
    ptrs: Vec<i32>,
}

impl IndexPage {
    fn empty(codec: &KeyCodec) -> Self {
        let filler = match codec.key_type() {
            crate::index::KeyType::Float => Key::Float(0.0),
            crate::index::KeyType::Str(_) => Key::Str(String::new()),
            crate::index::KeyType::Int => Key::Int(0),
        };
        Self {
            n: 0,
            keys: vec![filler; INDEX_FACTOR],
            ptrs: vec![NO_PAGE; INDEX_FACTOR + 1],
        }
    }

    /// Fill from up to `INDEX_FACTOR` `(first_key, page_offset)` entries.
    /// `ptrs[0]` mirrors the first entry so keys below `keys[0]` still
    /// land on a real page.
    fn fill(&mut self, block: &[(Key, i32)]) {
        self.n = block.len();
        if block.is_empty() {
            return;
        }
        self.ptrs[0] = block[0].1;
        for (j, (key, ptr)) in block.iter().enumerate() {
            self.keys[j] = key.clone();
            self.ptrs[j + 1] = *ptr;
        }
    }

    /// Pointer to follow for `key`: rightmost `keys[j] <= key`.
    fn choose_ptr(&self, key: &Key) -> i32 {
        if self.n == 0 {
            return NO_PAGE;
        }
        let mut chosen = None;
        for j in 0..self.n {
            if self.keys[j].cmp_keys(key) != std::cmp::Ordering::Greater {
                chosen = Some(j);
            } else {
                break;
            }
        }
        match chosen {
            None => self.ptrs[0],
            Some(j) => self.ptrs[j + 1],
        }
    }
}

#[derive(Debug)]
struct DataPage {
    records: Vec<IsamRecord>,
    next_page: i32,
}

impl DataPage {
    fn new(records: Vec<IsamRecord>) -> Self {
        Self {
            records,
            next_page: NO_PAGE,
        }
    }

    /// Insert keeping the page sorted; `false` when the page is full.
    fn insert_sorted(&mut self, record: IsamRecord) -> bool {
        if self.records.len() >= BLOCK_FACTOR {
            return false;
        }
        let pos = self
            .records
            .partition_point(|r| r.key.cmp_keys(&record.key) != std::cmp::Ordering::Greater);
        self.records.insert(pos, record);
        true
    }
}

// ------------------------------------------------------------------------------------------------
// The index
// ------------------------------------------------------------------------------------------------

/// Two-level ISAM over `(key, slot)` entries.
pub struct IsamFile {
    root_path: PathBuf,
    mid_path: PathBuf,
    data_path: PathBuf,
    codec: KeyCodec,
}

impl IsamFile {
    /// Open (or create, empty) the three index files. An empty structure
    /// bootstraps itself on the first insert.
    pub fn open(
        root_path: impl AsRef<Path>,
        mid_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        codec: KeyCodec,
    ) -> Result<Self, IndexError> {
        let isam = Self {
            root_path: root_path.as_ref().to_path_buf(),
            mid_path: mid_path.as_ref().to_path_buf(),
            data_path: data_path.as_ref().to_path_buf(),
            codec,
        };
        for path in [&isam.root_path, &isam.mid_path, &isam.data_path] {
            if !path.exists() {
                File::create(path)?;
            }
        }
        Ok(isam)
    }

    fn record_size(&self) -> usize {
        self.codec.encoded_size() + 8
    }

    fn index_page_size(&self) -> usize {
        4 + INDEX_FACTOR * self.codec.encoded_size() + (INDEX_FACTOR + 1) * 4
    }

    fn data_page_size(&self) -> usize {
        8 + BLOCK_FACTOR * self.record_size()
    }

    fn pack_index_page(&self, page: &IndexPage) -> Result<Vec<u8>, IndexError> {
        let mut buf = Vec::with_capacity(self.index_page_size());
        buf.extend_from_slice(&(page.n as i32).to_le_bytes());
        for key in &page.keys {
            self.codec.encode(key, &mut buf)?;
        }
        for ptr in &page.ptrs {
            buf.extend_from_slice(&ptr.to_le_bytes());
        }
        Ok(buf)
    }

    fn unpack_index_page(&self, bytes: &[u8]) -> Result<IndexPage, IndexError> {
        if bytes.len() < self.index_page_size() {
            return Ok(IndexPage::empty(&self.codec));
        }
        let n = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).max(0) as usize;
        let mut off = 4;
        let mut keys = Vec::with_capacity(INDEX_FACTOR);
        for _ in 0..INDEX_FACTOR {
            let (key, consumed) = self.codec.decode(&bytes[off..])?;
            keys.push(key);
            off += consumed;
        }
        let mut ptrs = Vec::with_capacity(INDEX_FACTOR + 1);
        for _ in 0..=INDEX_FACTOR {
            ptrs.push(i32::from_le_bytes([
                bytes[off],
                bytes[off + 1],
                bytes[off + 2],
                bytes[off + 3],
            ]));
            off += 4;
        }
        Ok(IndexPage {
            n: n.min(INDEX_FACTOR),
            keys,
            ptrs,
        })
    }

    fn pack_data_page(&self, page: &DataPage) -> Result<Vec<u8>, IndexError> {
        let mut buf = Vec::with_capacity(self.data_page_size());
        buf.extend_from_slice(&(page.records.len() as i32).to_le_bytes());
        buf.extend_from_slice(&page.next_page.to_le_bytes());
        for record in page.records.iter().take(BLOCK_FACTOR) {
            self.codec.encode(&record.key, &mut buf)?;
            buf.extend_from_slice(&record.slot.to_le_bytes());
            buf.extend_from_slice(&record.deleted.to_le_bytes());
        }
        buf.resize(self.data_page_size(), 0);
        Ok(buf)
    }

    fn unpack_data_page(&self, bytes: &[u8]) -> Result<DataPage, IndexError> {
        if bytes.is_empty() {
            return Ok(DataPage::new(Vec::new()));
        }
        if bytes.len() < 8 {
            return Err(IndexError::Corrupt("ISAM data page shorter than header".into()));
        }
        let n = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).max(0) as usize;
        let next_page = i32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let mut records = Vec::with_capacity(n);
        let mut off = 8;
        for _ in 0..n.min(BLOCK_FACTOR) {
            let (key, consumed) = self.codec.decode(&bytes[off..])?;
            off += consumed;
            let slot = i32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
            off += 4;
            let deleted =
                i32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
            off += 4;
            records.push(IsamRecord { key, slot, deleted });
        }
        let mut page = DataPage::new(records);
        page.next_page = next_page;
        Ok(page)
    }

    fn read_index_page(&self, path: &Path, offset: i32) -> Result<IndexPage, IndexError> {
        let mut f = File::open(path)?;
        f.seek(SeekFrom::Start(offset as u64))?;
        let mut bytes = vec![0u8; self.index_page_size()];
        match f.read_exact(&mut bytes) {
            Ok(()) => self.unpack_index_page(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(IndexPage::empty(&self.codec))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_data_page(&self, offset: i32) -> Result<DataPage, IndexError> {
        let mut f = File::open(&self.data_path)?;
        f.seek(SeekFrom::Start(offset as u64))?;
        let mut bytes = vec![0u8; self.data_page_size()];
        match f.read_exact(&mut bytes) {
            Ok(()) => self.unpack_data_page(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(DataPage::new(Vec::new()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_data_page(&self, offset: i32, page: &DataPage) -> Result<(), IndexError> {
        let bytes = self.pack_data_page(page)?;
        let mut f = OpenOptions::new().write(true).open(&self.data_path)?;
        f.seek(SeekFrom::Start(offset as u64))?;
        f.write_all(&bytes)?;
        Ok(())
    }

    /// Build the two static index levels from `(key, slot)` entries. Any
    /// existing content is replaced. Entries are sorted here; duplicates
    /// are kept as given (use [`IsamFile::insert_entry`] for checked
    /// inserts).
    pub fn build(&mut self, mut entries: Vec<(Key, i32)>) -> Result<(), IndexError> {
        entries.sort_by(|a, b| a.0.cmp_keys(&b.0));

        // Data pages: groups of BLOCK_FACTOR, remembering each first key.
        let mut mid_entries: Vec<(Key, i32)> = Vec::new();
        let mut data = File::create(&self.data_path)?;
        let mut offset = 0i32;
        for block in entries.chunks(BLOCK_FACTOR) {
            let page = DataPage::new(
                block
                    .iter()
                    .map(|(key, slot)| IsamRecord {
                        key: key.clone(),
                        slot: *slot,
                        deleted: 0,
                    })
                    .collect(),
            );
            data.write_all(&self.pack_data_page(&page)?)?;
            mid_entries.push((block[0].0.clone(), offset));
            offset += self.data_page_size() as i32;
        }
        drop(data);

        // Mid level: groups of INDEX_FACTOR data pages.
        let mut root_entries: Vec<(Key, i32)> = Vec::new();
        let mut mid = File::create(&self.mid_path)?;
        let mut mid_offset = 0i32;
        for block in mid_entries.chunks(INDEX_FACTOR) {
            let mut page = IndexPage::empty(&self.codec);
            page.fill(block);
            mid.write_all(&self.pack_index_page(&page)?)?;
            root_entries.push((block[0].0.clone(), mid_offset));
            mid_offset += self.index_page_size() as i32;
        }
        drop(mid);

        // Single root page.
        let mut root_page = IndexPage::empty(&self.codec);
        root_page.fill(&root_entries);
        let mut root = File::create(&self.root_path)?;
        root.write_all(&self.pack_index_page(&root_page)?)?;
        Ok(())
    }

    /// Two-level descent: root → mid → base data page offset.
    fn locate_data_page(&self, key: &Key) -> Result<i32, IndexError> {
        let root = self.read_index_page(&self.root_path, 0)?;
        let mid_ptr = root.choose_ptr(key);
        if mid_ptr == NO_PAGE {
            return Ok(NO_PAGE);
        }
        let mid = self.read_index_page(&self.mid_path, mid_ptr)?;
        Ok(mid.choose_ptr(key))
    }

    /// First live slot stored for `key`, scanning the base page then its
    /// overflow chain.
    pub fn search_entry(&self, key: &Key) -> Result<Option<i32>, IndexError> {
        let mut offset = self.locate_data_page(key)?;
        while offset != NO_PAGE {
            let page = self.read_data_page(offset)?;
            for record in &page.records {
                if record.deleted == 0 && record.key.cmp_keys(key) == std::cmp::Ordering::Equal {
                    return Ok(Some(record.slot));
                }
            }
            offset = page.next_page;
        }
        Ok(None)
    }

    /// Insert `(key, slot)`. Duplicates are rejected. An insert into an
    /// empty structure performs a one-record build.
    pub fn insert_entry(&mut self, key: Key, slot: i32) -> Result<(), IndexError> {
        if self.search_entry(&key)?.is_some() {
            return Err(IndexError::DuplicateKey(key.to_string()));
        }

        let base_offset = self.locate_data_page(&key)?;
        if base_offset == NO_PAGE {
            return self.build(vec![(key, slot)]);
        }

        let record = IsamRecord {
            key,
            slot,
            deleted: 0,
        };

        let mut base = self.read_data_page(base_offset)?;
        if base.insert_sorted(record.clone()) {
            return self.write_data_page(base_offset, &base);
        }

        // Walk the overflow chain, filling the first page with room.
        let mut prev_offset = base_offset;
        let mut prev_page = base;
        while prev_page.next_page != NO_PAGE {
            let offset = prev_page.next_page;
            let mut current = self.read_data_page(offset)?;
            if current.insert_sorted(record.clone()) {
                return self.write_data_page(offset, &current);
            }
            prev_offset = offset;
            prev_page = current;
        }

        // Chain exhausted: append a fresh overflow page and link it.
        let mut f = OpenOptions::new().write(true).open(&self.data_path)?;
        let new_offset = f.seek(SeekFrom::End(0))? as i32;
        let new_page = DataPage::new(vec![record]);
        f.write_all(&self.pack_data_page(&new_page)?)?;
        drop(f);

        prev_page.next_page = new_offset;
        self.write_data_page(prev_offset, &prev_page)
    }

    /// Mark the record for `key` deleted. No restructuring. Returns
    /// whether a live record was found.
    pub fn remove_entry(&mut self, key: &Key) -> Result<bool, IndexError> {
        let mut offset = self.locate_data_page(key)?;
        while offset != NO_PAGE {
            let mut page = self.read_data_page(offset)?;
            let mut hit = false;
            for record in &mut page.records {
                if record.deleted == 0 && record.key.cmp_keys(key) == std::cmp::Ordering::Equal {
                    record.deleted = 1;
                    hit = true;
                    break;
                }
            }
            if hit {
                self.write_data_page(offset, &page)?;
                return Ok(true);
            }
            offset = page.next_page;
        }
        Ok(false)
    }

    /// Live `(key, slot)` entries with `lo <= key <= hi`.
    ///
    /// Descends to the first mid entry at or below `lo`, then walks
    /// forward across mid and root pointers, short-circuiting once a
    /// boundary key exceeds `hi`. Each page's overflow chain is gathered
    /// and sorted before concatenation.
    pub fn range_entries(&self, lo: &Key, hi: &Key) -> Result<Vec<(Key, i32)>, IndexError> {
        let (lo, hi) = if lo.cmp_keys(hi) == std::cmp::Ordering::Greater {
            (hi, lo)
        } else {
            (lo, hi)
        };

        let mut results: Vec<(Key, i32)> = Vec::new();
        let root = self.read_index_page(&self.root_path, 0)?;
        if root.n == 0 {
            return Ok(results);
        }

        let start_in = |page: &IndexPage| {
            let mut idx = None;
            for j in 0..page.n {
                if page.keys[j].cmp_keys(lo) != std::cmp::Ordering::Greater {
                    idx = Some(j);
                } else {
                    break;
                }
            }
            match idx {
                None => 1,
                Some(j) => j + 1,
            }
        };

        let start_root_pos = start_in(&root);
        'roots: for root_pos in start_root_pos..=root.n {
            let mid_offset = root.ptrs[root_pos];
            if mid_offset == NO_PAGE {
                continue;
            }
            let mid = self.read_index_page(&self.mid_path, mid_offset)?;

            let start_mid_pos = if root_pos == start_root_pos {
                start_in(&mid)
            } else {
                1
            };

            for mid_pos in start_mid_pos..=mid.n {
                let base_offset = mid.ptrs[mid_pos];
                if base_offset == NO_PAGE {
                    continue;
                }

                let mut chain: Vec<(Key, i32)> = Vec::new();
                let mut offset = base_offset;
                while offset != NO_PAGE {
                    let page = self.read_data_page(offset)?;
                    for record in &page.records {
                        if record.deleted == 0
                            && record.key.cmp_keys(lo) != std::cmp::Ordering::Less
                            && record.key.cmp_keys(hi) != std::cmp::Ordering::Greater
                        {
                            chain.push((record.key.clone(), record.slot));
                        }
                    }
                    offset = page.next_page;
                }
                chain.sort_by(|a, b| a.0.cmp_keys(&b.0));
                results.extend(chain);

                if mid_pos < mid.n && mid.keys[mid_pos].cmp_keys(hi) == std::cmp::Ordering::Greater
                {
                    break 'roots;
                }
            }

            if root_pos < root.n && root.keys[root_pos].cmp_keys(hi) == std::cmp::Ordering::Greater
            {
                break;
            }
        }
        Ok(results)
    }

    /// Keys of every record (live or deleted) per base page, in page
    /// order, for structural checks.
    pub(crate) fn page_keys(&self) -> Result<Vec<Vec<Key>>, IndexError> {
        let len = std::fs::metadata(&self.data_path)?.len();
        let page_size = self.data_page_size() as u64;
        let mut out = Vec::new();
        let mut offset = 0u64;
        while offset + page_size <= len {
            let page = self.read_data_page(offset as i32)?;
            out.push(page.records.iter().map(|r| r.key.clone()).collect());
            offset += page_size;
        }
        Ok(out)
    }

    /// Offsets visited walking the overflow chain from `base_offset`.
    pub(crate) fn chain_offsets(&self, base_offset: i32) -> Result<Vec<i32>, IndexError> {
        let mut out = Vec::new();
        let mut offset = base_offset;
        while offset != NO_PAGE {
            out.push(offset);
            let page = self.read_data_page(offset)?;
            offset = page.next_page;
        }
        Ok(out)
    }

    /// Base data page offset for `key` (test support).
    pub(crate) fn locate(&self, key: &Key) -> Result<i32, IndexError> {
        self.locate_data_page(key)
    }
}

impl Index for IsamFile {
    fn insert(&mut self, key: &Value, slot: u64) -> Result<(), IndexError> {
        let key = self.codec.key_from_value(key)?;
        self.insert_entry(key, slot as i32)
    }

    fn find(&mut self, key: &Value) -> Result<Option<u64>, IndexError> {
        let key = self.codec.key_from_value(key)?;
        Ok(self.search_entry(&key)?.map(|slot| slot as u64))
    }

    fn range(&mut self, lo: &Value, hi: &Value) -> Result<Vec<u64>, IndexError> {
        let lo = self.codec.key_from_value(lo)?;
        let hi = self.codec.key_from_value(hi)?;
        Ok(self
            .range_entries(&lo, &hi)?
            .into_iter()
            .map(|(_, slot)| slot as u64)
            .collect())
    }

    fn remove(&mut self, key: &Value) -> Result<bool, IndexError> {
        let key = self.codec.key_from_value(key)?;
        self.remove_entry(&key)
    }

    fn save(&mut self) -> Result<(), IndexError> {
        Ok(())
    }
}
