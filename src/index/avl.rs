//! Disk-resident AVL index file.
//!
//! Layout:
//!
//! ```text
//! [root: i32] [node_0] [node_1] ...
//! node = [key cell][slot: i32][left: i32][right: i32][height: i32]
//! ```
//!
//! `-1` denotes an absent child (and an empty tree in the header). Nodes
//! are addressed by their zero-based index in the file; rotations read the
//! affected nodes, rewrite them in place, and propagate the new subtree
//! root upward through the recursion's return value. Deleted nodes are
//! unlinked but not reclaimed — the file only ever grows.
//!
//! Duplicate insert **updates** the stored slot; no second node is
//! created. Removal of a two-child node moves the in-order successor's key
//! and slot into place, then rebalances on the way up.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::index::{Index, IndexError, Key, KeyCodec};
use crate::schema::Value;

const NIL: i32 = -1;
const HEADER_SIZE: u64 = 4;

#[derive(Debug, Clone)]
struct AvlNode {
    key: Key,
    slot: i32,
    left: i32,
    right: i32,
    height: i32,
}

impl AvlNode {
    fn leaf(key: Key, slot: i32) -> Self {
        Self {
            key,
            slot,
            left: NIL,
            right: NIL,
            height: 1,
        }
    }
}

/// AVL index over `(key, slot)` entries, one node per file record.
pub struct AvlFile {
    path: PathBuf,
    codec: KeyCodec,
}

impl AvlFile {
    /// Open (or create) the AVL file at `path`.
    pub fn open(path: impl AsRef<Path>, codec: KeyCodec) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let mut f = File::create(&path)?;
            f.write_all(&NIL.to_le_bytes())?;
        }
        Ok(Self { path, codec })
    }

    fn node_size(&self) -> usize {
        self.codec.encoded_size() + 4 * 4
    }

    fn node_offset(&self, index: i32) -> u64 {
        HEADER_SIZE + index as u64 * self.node_size() as u64
    }

    fn root(&self) -> Result<i32, IndexError> {
        let mut f = File::open(&self.path)?;
        let mut buf = [0u8; 4];
        f.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn set_root(&self, index: i32) -> Result<(), IndexError> {
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(0))?;
        f.write_all(&index.to_le_bytes())?;
        Ok(())
    }

    fn node_count(&self) -> Result<i32, IndexError> {
        let len = std::fs::metadata(&self.path)?.len();
        Ok(((len - HEADER_SIZE) / self.node_size() as u64) as i32)
    }

    fn read_node(&self, index: i32) -> Result<Option<AvlNode>, IndexError> {
        if index == NIL {
            return Ok(None);
        }
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(self.node_offset(index)))?;
        let mut bytes = vec![0u8; self.node_size()];
        f.read_exact(&mut bytes)?;

        let (key, mut off) = self.codec.decode(&bytes)?;
        let read_i32 = |off: &mut usize| {
            let v = i32::from_le_bytes([
                bytes[*off],
                bytes[*off + 1],
                bytes[*off + 2],
                bytes[*off + 3],
            ]);
            *off += 4;
            v
        };
        let slot = read_i32(&mut off);
        let left = read_i32(&mut off);
        let right = read_i32(&mut off);
        let height = read_i32(&mut off);
        Ok(Some(AvlNode {
            key,
            slot,
            left,
            right,
            height,
        }))
    }

    fn encode_node(&self, node: &AvlNode) -> Result<Vec<u8>, IndexError> {
        let mut bytes = Vec::with_capacity(self.node_size());
        self.codec.encode(&node.key, &mut bytes)?;
        bytes.extend_from_slice(&node.slot.to_le_bytes());
        bytes.extend_from_slice(&node.left.to_le_bytes());
        bytes.extend_from_slice(&node.right.to_le_bytes());
        bytes.extend_from_slice(&node.height.to_le_bytes());
        Ok(bytes)
    }

    fn write_node(&self, index: i32, node: &AvlNode) -> Result<(), IndexError> {
        let bytes = self.encode_node(node)?;
        let mut f = OpenOptions::new().write(true).open(&self.path)?;
        f.seek(SeekFrom::Start(self.node_offset(index)))?;
        f.write_all(&bytes)?;
        Ok(())
    }

    fn append_node(&self, node: &AvlNode) -> Result<i32, IndexError> {
        let bytes = self.encode_node(node)?;
        let mut f = OpenOptions::new().append(true).open(&self.path)?;
        f.write_all(&bytes)?;
        drop(f);
        Ok(self.node_count()? - 1)
    }

    fn height(&self, index: i32) -> Result<i32, IndexError> {
        Ok(self.read_node(index)?.map_or(0, |n| n.height))
    }

    fn with_updated_height(&self, mut node: AvlNode) -> Result<AvlNode, IndexError> {
        node.height = 1 + self.height(node.left)?.max(self.height(node.right)?);
        Ok(node)
    }

    fn balance_of(&self, index: i32) -> Result<i32, IndexError> {
        match self.read_node(index)? {
            None => Ok(0),
            Some(n) => Ok(self.height(n.left)? - self.height(n.right)?),
        }
    }

    fn rotate_right(&self, y_idx: i32) -> Result<i32, IndexError> {
        let Some(mut y) = self.read_node(y_idx)? else {
            return Ok(y_idx);
        };
        let x_idx = y.left;
        let Some(mut x) = self.read_node(x_idx)? else {
            return Ok(y_idx);
        };
        y.left = x.right;
        x.right = y_idx;
        let y = self.with_updated_height(y)?;
        self.write_node(y_idx, &y)?;
        let x = self.with_updated_height(x)?;
        self.write_node(x_idx, &x)?;
        Ok(x_idx)
    }

    fn rotate_left(&self, x_idx: i32) -> Result<i32, IndexError> {
        let Some(mut x) = self.read_node(x_idx)? else {
            return Ok(x_idx);
        };
        let y_idx = x.right;
        let Some(mut y) = self.read_node(y_idx)? else {
            return Ok(x_idx);
        };
        x.right = y.left;
        y.left = x_idx;
        let x = self.with_updated_height(x)?;
        self.write_node(x_idx, &x)?;
        let y = self.with_updated_height(y)?;
        self.write_node(y_idx, &y)?;
        Ok(y_idx)
    }

    /// Insert `(key, slot)`. An existing key has its slot updated in place.
    pub fn insert_entry(&mut self, key: Key, slot: i32) -> Result<(), IndexError> {
        let root = self.root()?;
        if root == NIL {
            let new_root = self.append_node(&AvlNode::leaf(key, slot))?;
            self.set_root(new_root)?;
            return Ok(());
        }
        let new_root = self.insert_at(root, &key, slot)?;
        self.set_root(new_root)
    }

    fn insert_at(&self, index: i32, key: &Key, slot: i32) -> Result<i32, IndexError> {
        if index == NIL {
            return self.append_node(&AvlNode::leaf(key.clone(), slot));
        }
        let mut node = self
            .read_node(index)?
            .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;

        match key.cmp_keys(&node.key) {
            std::cmp::Ordering::Less => node.left = self.insert_at(node.left, key, slot)?,
            std::cmp::Ordering::Greater => node.right = self.insert_at(node.right, key, slot)?,
            std::cmp::Ordering::Equal => {
                node.slot = slot;
                self.write_node(index, &node)?;
                return Ok(index);
            }
        }
        let node = self.with_updated_height(node)?;
        self.write_node(index, &node)?;

        let balance = self.balance_of(index)?;
        let node = self
            .read_node(index)?
            .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;

        if balance > 1 {
            let left = self
                .read_node(node.left)?
                .ok_or_else(|| IndexError::Corrupt("left child vanished".into()))?;
            if key.cmp_keys(&left.key) == std::cmp::Ordering::Less {
                return self.rotate_right(index);
            }
            let mut node = node;
            node.left = self.rotate_left(node.left)?;
            self.write_node(index, &node)?;
            return self.rotate_right(index);
        }
        if balance < -1 {
            let right = self
                .read_node(node.right)?
                .ok_or_else(|| IndexError::Corrupt("right child vanished".into()))?;
            if key.cmp_keys(&right.key) == std::cmp::Ordering::Greater {
                return self.rotate_left(index);
            }
            let mut node = node;
            node.right = self.rotate_right(node.right)?;
            self.write_node(index, &node)?;
            return self.rotate_left(index);
        }
        Ok(index)
    }

    /// Slot stored for `key`, if present.
    pub fn find_entry(&self, key: &Key) -> Result<Option<i32>, IndexError> {
        let mut index = self.root()?;
        while index != NIL {
            let node = self
                .read_node(index)?
                .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;
            match key.cmp_keys(&node.key) {
                std::cmp::Ordering::Equal => return Ok(Some(node.slot)),
                std::cmp::Ordering::Less => index = node.left,
                std::cmp::Ordering::Greater => index = node.right,
            }
        }
        Ok(None)
    }

    /// Remove the entry for `key`, if present.
    pub fn remove_entry(&mut self, key: &Key) -> Result<(), IndexError> {
        let root = self.root()?;
        if root == NIL {
            return Ok(());
        }
        let new_root = self.remove_at(root, key)?;
        self.set_root(new_root)
    }

    fn remove_at(&self, index: i32, key: &Key) -> Result<i32, IndexError> {
        if index == NIL {
            return Ok(NIL);
        }
        let mut node = self
            .read_node(index)?
            .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;

        match key.cmp_keys(&node.key) {
            std::cmp::Ordering::Less => node.left = self.remove_at(node.left, key)?,
            std::cmp::Ordering::Greater => node.right = self.remove_at(node.right, key)?,
            std::cmp::Ordering::Equal => {
                if node.left == NIL && node.right == NIL {
                    return Ok(NIL);
                }
                if node.left == NIL {
                    return Ok(node.right);
                }
                if node.right == NIL {
                    return Ok(node.left);
                }
                // Two children: move the in-order successor's entry here,
                // then delete the successor from the right subtree.
                let succ_idx = self.min_index(node.right)?;
                let succ = self
                    .read_node(succ_idx)?
                    .ok_or_else(|| IndexError::Corrupt("missing successor node".into()))?;
                node.key = succ.key.clone();
                node.slot = succ.slot;
                node.right = self.remove_at(node.right, &succ.key)?;
            }
        }
        let node = self.with_updated_height(node)?;
        self.write_node(index, &node)?;

        let balance = self.balance_of(index)?;
        let node = self
            .read_node(index)?
            .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;

        if balance > 1 {
            if self.balance_of(node.left)? >= 0 {
                return self.rotate_right(index);
            }
            let mut node = node;
            node.left = self.rotate_left(node.left)?;
            self.write_node(index, &node)?;
            return self.rotate_right(index);
        }
        if balance < -1 {
            if self.balance_of(node.right)? <= 0 {
                return self.rotate_left(index);
            }
            let mut node = node;
            node.right = self.rotate_right(node.right)?;
            self.write_node(index, &node)?;
            return self.rotate_left(index);
        }
        Ok(index)
    }

    fn min_index(&self, mut index: i32) -> Result<i32, IndexError> {
        loop {
            let node = self
                .read_node(index)?
                .ok_or_else(|| IndexError::Corrupt("missing node in min_index".into()))?;
            if node.left == NIL {
                return Ok(index);
            }
            index = node.left;
        }
    }

    /// Slots for all keys in `[lo, hi]`, in key order. The inorder walk
    /// prunes subtrees the bounds exclude.
    pub fn range_entries(&self, lo: &Key, hi: &Key) -> Result<Vec<i32>, IndexError> {
        let mut out = Vec::new();
        self.range_at(self.root()?, lo, hi, &mut out)?;
        Ok(out)
    }

    fn range_at(&self, index: i32, lo: &Key, hi: &Key, out: &mut Vec<i32>) -> Result<(), IndexError> {
        if index == NIL {
            return Ok(());
        }
        let node = self
            .read_node(index)?
            .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;

        if lo.cmp_keys(&node.key) == std::cmp::Ordering::Less {
            self.range_at(node.left, lo, hi, out)?;
        }
        if lo.cmp_keys(&node.key) != std::cmp::Ordering::Greater
            && hi.cmp_keys(&node.key) != std::cmp::Ordering::Less
        {
            out.push(node.slot);
        }
        if hi.cmp_keys(&node.key) == std::cmp::Ordering::Greater {
            self.range_at(node.right, lo, hi, out)?;
        }
        Ok(())
    }

    /// Full inorder traversal as `(key, slot)` pairs.
    pub fn inorder(&self) -> Result<Vec<(Key, i32)>, IndexError> {
        let mut out = Vec::new();
        self.inorder_at(self.root()?, &mut out)?;
        Ok(out)
    }

    fn inorder_at(&self, index: i32, out: &mut Vec<(Key, i32)>) -> Result<(), IndexError> {
        if index == NIL {
            return Ok(());
        }
        let node = self
            .read_node(index)?
            .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;
        self.inorder_at(node.left, out)?;
        out.push((node.key.clone(), node.slot));
        self.inorder_at(node.right, out)?;
        Ok(())
    }

    /// Verify the height-balance invariant at every reachable node.
    /// Returns the offending node index on violation.
    pub(crate) fn verify_balance(&self) -> Result<Option<i32>, IndexError> {
        self.verify_at(self.root()?)
    }

    fn verify_at(&self, index: i32) -> Result<Option<i32>, IndexError> {
        if index == NIL {
            return Ok(None);
        }
        let node = self
            .read_node(index)?
            .ok_or_else(|| IndexError::Corrupt(format!("missing AVL node {index}")))?;
        if (self.height(node.left)? - self.height(node.right)?).abs() > 1 {
            return Ok(Some(index));
        }
        if let Some(bad) = self.verify_at(node.left)? {
            return Ok(Some(bad));
        }
        self.verify_at(node.right)
    }
}

impl Index for AvlFile {
    fn insert(&mut self, key: &Value, slot: u64) -> Result<(), IndexError> {
        let key = self.codec.key_from_value(key)?;
        self.insert_entry(key, slot as i32)
    }

    fn find(&mut self, key: &Value) -> Result<Option<u64>, IndexError> {
        let key = self.codec.key_from_value(key)?;
        Ok(self.find_entry(&key)?.map(|slot| slot as u64))
    }

    fn range(&mut self, lo: &Value, hi: &Value) -> Result<Vec<u64>, IndexError> {
        let lo = self.codec.key_from_value(lo)?;
        let hi = self.codec.key_from_value(hi)?;
        Ok(self
            .range_entries(&lo, &hi)?
            .into_iter()
            .map(|slot| slot as u64)
            .collect())
    }

    fn remove(&mut self, key: &Value) -> Result<bool, IndexError> {
        let key = self.codec.key_from_value(key)?;
        let existed = self.find_entry(&key)?.is_some();
        if existed {
            self.remove_entry(&key)?;
        }
        Ok(existed)
    }

    fn save(&mut self) -> Result<(), IndexError> {
        // Every mutation writes through; nothing is buffered.
        Ok(())
    }
}
