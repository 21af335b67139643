use block_io::LastAccessCache;
use snfs_types::{BlockBuf, BlockNum, DirPage, ITAB_SIZE, Inode, InodeId, InodeType, empty_dir_page};

pub const BLOCK_CACHE_SIZE: usize = 10;
pub const INODE_CACHE_SIZE: usize = 4;
pub const DIR_CACHE_SIZE: usize = 4;

/// `DirPage` is a plain array type, which doesn't implement `Default`;
/// this thin wrapper gives [`LastAccessCache`] the `Default` bound it
/// needs for its slot storage.
#[derive(Clone, Copy)]
pub struct DirPageSlot(pub DirPage);

impl Default for DirPageSlot {
    fn default() -> Self {
        Self(empty_dir_page())
    }
}

/// Everything the cache mutex guards: the two bitmaps, the full in-memory
/// inode table, and all three last-access caches.
///
/// Holding all of it under one lock (rather than a lock per structure, or
/// one lock for caches and a separate one for bitmaps/inode table) is a
/// deliberate simplification over the source, which only ever locks
/// caches and lets bitmap/inode-table mutation in `create`/`mkdir`/`format`
/// run unguarded.
pub struct EngineState {
    pub blk_bmap: Box<[u8; snfs_types::BLOCK_SIZE]>,
    pub inode_bmap: Box<[u8; snfs_types::BLOCK_SIZE]>,
    pub inode_tab: Box<[Inode; ITAB_SIZE]>,
    pub block_cache: LastAccessCache<BlockNum, BlockBuf, BLOCK_CACHE_SIZE>,
    pub inode_cache: LastAccessCache<InodeId, Inode, INODE_CACHE_SIZE>,
    pub dir_cache: LastAccessCache<(InodeId, BlockNum), DirPageSlot, DIR_CACHE_SIZE>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            blk_bmap: Box::new([0; snfs_types::BLOCK_SIZE]),
            inode_bmap: Box::new([0; snfs_types::BLOCK_SIZE]),
            inode_tab: Box::new([Inode::new(InodeType::Unknown); ITAB_SIZE]),
            block_cache: LastAccessCache::new(),
            inode_cache: LastAccessCache::new(),
            dir_cache: LastAccessCache::new(),
        }
    }
}
