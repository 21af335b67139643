//! On-disk record layouts for the SNFS file system core.
//!
//! The layout mirrors the original server's in-memory simulation of a block
//! device (see the module docs on [`BLOCK_SIZE`] for the partition table):
//! blocks `0`/`1` hold the free-space bitmaps, blocks `2..10` hold the inode
//! table, and the remainder is data. Every on-disk record here derives
//! [`Pod`] so it can be reinterpreted in place from a raw block buffer via
//! `dataview`, the same zero-copy cast idiom used for the wire protocol.

use core::fmt;

use dataview::Pod;
use strum::FromRepr;

pub mod bitmap;

/// Size in bytes of a single block of the simulated device.
pub const BLOCK_SIZE: usize = 512;

/// Number of blocks reserved for the inode table (blocks `2..=9`).
pub const ITAB_NUM_BLKS: usize = 8;

/// Number of inode slots the inode table can hold.
pub const ITAB_SIZE: usize = ITAB_NUM_BLKS * BLOCK_SIZE / size_of::<Inode>();

/// Number of direct data-block pointers stored in an inode.
pub const INODE_NUM_BLKS: usize = 10;

/// Maximum length of a directory entry name, including the NUL terminator
/// (13 characters + NUL).
pub const FS_MAX_FNAME_SZ: usize = 14;

/// Block number of the free-block bitmap.
pub const BLK_BITMAP_BLOCK: u32 = 0;
/// Block number of the free-inode bitmap.
pub const INODE_BITMAP_BLOCK: u32 = 1;
/// First block number of the inode table.
pub const ITAB_START_BLOCK: u32 = 2;
/// First block number available for file/directory data.
pub const DATA_START_BLOCK: u32 = ITAB_START_BLOCK + ITAB_NUM_BLKS as u32;

/// Number of directory entries packed into a single data block.
pub const DIR_PAGE_ENTRIES: usize = BLOCK_SIZE / size_of::<DirEntry>();

/// Largest device size the single-block free-block bitmap can address
/// (one bit per block, in a `BLOCK_SIZE`-byte bitmap block).
pub const MAX_BLOCKS: u32 = (BLOCK_SIZE * 8) as u32;

/// Root inode id. Always a [`InodeType::Dir`] after `format`.
pub const ROOT_INODE_ID: InodeId = InodeId::new(1);

/// A raw 512-byte block buffer, used uniformly for data blocks, directory
/// pages, and bitmap blocks.
pub type BlockBuf = [u8; BLOCK_SIZE];

/// A block number, `0..num_blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod)]
#[repr(transparent)]
pub struct BlockNum(u32);

impl BlockNum {
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An inode id. Client-visible file handles are equal to inode ids; `0` is
/// never used and `1` ([`ROOT_INODE_ID`]) is always the root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod)]
#[repr(transparent)]
pub struct InodeId(u32);

impl InodeId {
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn as_index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` if this id is a valid index into the inode table
    /// (does not imply the inode is allocated).
    #[must_use]
    pub fn in_table_range(self) -> bool {
        self.as_index() < ITAB_SIZE
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of an inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u16)]
pub enum InodeType {
    /// Unallocated / unknown inode slot.
    Unknown = 0,
    Dir = 1,
    File = 2,
}

impl InodeType {
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self::from_repr(raw).unwrap_or(Self::Unknown)
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self as u16
    }
}

/// Fixed-layout inode record, 64 bytes, matching the original `fs_inode_t`
/// (`type`, `size`, 10 direct block numbers, 4 reserved words).
///
/// The rewrite keeps the reserved words as explicit, documented, unused
/// padding rather than silently resurrecting the half-implemented indirect
/// block extension the source never followed through `blocks[]`.
#[derive(Debug, Clone, Copy, Pod)]
#[repr(C)]
pub struct Inode {
    ty: u16,
    _pad0: u16,
    size: u32,
    blocks: [u32; INODE_NUM_BLKS],
    /// Reserved for a future indirect-block extension; never read or
    /// written by the engine.
    _reserved: [u32; 4],
}

const _: () = assert!(size_of::<Inode>() == 64);

impl Inode {
    #[must_use]
    pub fn new(ty: InodeType) -> Self {
        Self {
            ty: ty.raw(),
            _pad0: 0,
            size: 0,
            blocks: [0; INODE_NUM_BLKS],
            _reserved: [0; 4],
        }
    }

    #[must_use]
    pub fn ty(&self) -> InodeType {
        InodeType::from_raw(self.ty)
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.ty == InodeType::Unknown.raw()
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = size;
    }

    #[must_use]
    pub fn block(&self, i: usize) -> Option<BlockNum> {
        let raw = self.blocks[i];
        (raw != 0).then(|| BlockNum::new(raw))
    }

    pub fn set_block(&mut self, i: usize, block: BlockNum) {
        self.blocks[i] = block.value();
    }

    /// Number of direct blocks currently occupied by `size` bytes of data.
    #[must_use]
    pub fn blocks_used(&self) -> usize {
        self.size
            .div_ceil(u32::try_from(BLOCK_SIZE).unwrap())
            .try_into()
            .unwrap()
    }
}

/// A single directory entry: a fixed-width, NUL-padded name and an inode id.
#[derive(Clone, Copy, Pod)]
#[repr(C)]
pub struct DirEntry {
    inode_id: u32,
    name: [u8; FS_MAX_FNAME_SZ],
    _pad: [u8; 2],
}

const _: () = assert!(size_of::<DirEntry>() % 4 == 0);

impl DirEntry {
    #[must_use]
    pub fn new(inode_id: InodeId, name: &[u8]) -> Self {
        let mut entry = Self {
            inode_id: inode_id.value(),
            name: [0; FS_MAX_FNAME_SZ],
            _pad: [0; 2],
        };
        entry.name[..name.len()].copy_from_slice(name);
        entry
    }

    #[must_use]
    pub fn inode_id(&self) -> InodeId {
        InodeId::new(self.inode_id)
    }

    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(self.name.len());
        &self.name[..len]
    }

    #[must_use]
    pub fn is_named(&self, name: &[u8]) -> bool {
        self.name_bytes() == name
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry")
            .field("inode_id", &self.inode_id())
            .field("name", &String::from_utf8_lossy(self.name_bytes()))
            .finish()
    }
}

/// A directory page: the packed array of [`DirEntry`] records that fits in
/// one data block.
pub type DirPage = [DirEntry; DIR_PAGE_ENTRIES];

#[must_use]
pub fn empty_dir_page() -> DirPage {
    [DirEntry::new(InodeId::new(0), b""); DIR_PAGE_ENTRIES]
}

#[cfg(test)]
mod tests {
    use super::{DirEntry, DirPage, Inode, InodeId, InodeType, ITAB_SIZE};

    #[test]
    fn inode_table_size_matches_budget() {
        assert_eq!(ITAB_SIZE, 64);
    }

    #[test]
    fn inode_round_trips_through_bytes() {
        use dataview::PodMethods as _;

        let mut inode = Inode::new(InodeType::File);
        inode.set_size(123);
        inode.set_block(0, super::BlockNum::new(42));

        let bytes = inode.as_bytes().to_vec();
        let restored: &Inode = dataview::DataView::from(bytes.as_slice()).get(0);
        assert_eq!(restored.ty(), InodeType::File);
        assert_eq!(restored.size(), 123);
        assert_eq!(restored.block(0), Some(super::BlockNum::new(42)));
    }

    #[test]
    fn dir_entry_name_round_trip() {
        let entry = DirEntry::new(InodeId::new(7), b"file1.txt");
        assert!(entry.is_named(b"file1.txt"));
        assert!(!entry.is_named(b"file2.txt"));
        assert_eq!(entry.inode_id(), InodeId::new(7));
    }

    #[test]
    fn dir_page_fits_in_one_block() {
        assert!(size_of::<DirPage>() <= super::BLOCK_SIZE);
    }
}
