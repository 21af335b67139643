//! Private cache plumbing shared by every engine operation.
//!
//! Mirrors the coarse-locking pattern of the original server: the single
//! [`super::Engine::state`] mutex is held for in-memory bookkeeping and
//! dropped around every block-device access, because device I/O may sleep
//! (§5). A cache miss is therefore always "lock, check, unlock, do I/O,
//! lock again, insert" rather than a single critical section; two threads
//! racing to fill the same slot is the one small, documented race the
//! specification carries over from the source (§9).

use dataview::{DataView, PodMethods as _};
use snfs_types::{BLOCK_SIZE, BlockBuf, BlockNum, DirEntry, DirPage, InodeId};

use super::Engine;
use super::error::EngineError;
use super::state::DirPageSlot;

impl Engine {
    /// Ensures `block_num` is present (clean or dirty) in the block cache,
    /// evicting (and writing back, if dirty) the LRU slot on a miss.
    pub(super) fn cache_block(&self, block_num: BlockNum) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(idx) = state.block_cache.find_index(block_num) {
                let tick = self.tick.next();
                state.block_cache.touch(idx, tick);
                return Ok(());
            }
        }
        self.evict_lru_block()?;
        let mut buf = [0_u8; BLOCK_SIZE];
        self.device.read(block_num, &mut buf)?;

        let mut state = self.state.lock().unwrap();
        if let Some(idx) = state.block_cache.find_index(block_num) {
            // Raced with another thread's miss on the same block; their
            // fill wins, ours is discarded (see module docs).
            let tick = self.tick.next();
            state.block_cache.touch(idx, tick);
        } else {
            let idx = state.block_cache.lru_index();
            let tick = self.tick.next();
            state.block_cache.place(idx, block_num, buf, false, tick);
        }
        Ok(())
    }

    /// Writes back the current LRU block-cache victim if it is dirty.
    /// Must be called with the mutex unlocked; it takes and releases it
    /// itself around the device write.
    fn evict_lru_block(&self) -> Result<(), EngineError> {
        let (victim, data) = {
            let state = self.state.lock().unwrap();
            let idx = state.block_cache.lru_index();
            let victim = state.block_cache.key_at(idx);
            let data = state.block_cache.is_dirty(idx).then(|| *state.block_cache.value(idx));
            (victim, data)
        };
        if let (Some(block_num), Some(data)) = (victim, data) {
            self.device.write(block_num, &data)?;
        }
        Ok(())
    }

    /// Places `data` into the block cache as a brand-new dirty slot,
    /// without consulting the device (used for newly allocated blocks:
    /// §4.5 "insert an empty block into the block cache as dirty").
    pub(super) fn place_fresh_block(&self, block_num: BlockNum, data: BlockBuf) -> Result<(), EngineError> {
        self.evict_lru_block()?;
        let mut state = self.state.lock().unwrap();
        let idx = state.block_cache.lru_index();
        let tick = self.tick.next();
        state.block_cache.place(idx, block_num, data, true, tick);
        Ok(())
    }

    /// Returns a copy of `block_num`'s cached bytes, fetching it first if
    /// necessary.
    pub(super) fn read_block_copy(&self, block_num: BlockNum) -> Result<BlockBuf, EngineError> {
        self.cache_block(block_num)?;
        let mut state = self.state.lock().unwrap();
        let idx = state
            .block_cache
            .find_index(block_num)
            .expect("just cached, must be present");
        let tick = self.tick.next();
        state.block_cache.touch(idx, tick);
        Ok(*state.block_cache.value(idx))
    }

    /// Copies `data` into `block_num` at byte offset `offset`, fetching
    /// the block into cache first if it is not a brand-new allocation
    /// already sitting there dirty. Marks the slot dirty.
    pub(super) fn patch_block(&self, block_num: BlockNum, offset: usize, data: &[u8]) -> Result<(), EngineError> {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if let Some(idx) = state.block_cache.find_index(block_num) {
                    state.block_cache.value_mut(idx)[offset..offset + data.len()].copy_from_slice(data);
                    state.block_cache.mark_dirty(idx);
                    let tick = self.tick.next();
                    state.block_cache.touch(idx, tick);
                    return Ok(());
                }
            }
            self.cache_block(block_num)?;
        }
    }

    /// Runs `f` against the cached copy of inode `id`, populating the
    /// inode cache from the in-memory inode table on a miss. No device
    /// I/O is ever involved (the table is in-memory), so this never drops
    /// the lock.
    pub(super) fn with_inode<R>(&self, id: InodeId, f: impl FnOnce(&snfs_types::Inode) -> R) -> Result<R, EngineError> {
        let mut state = self.state.lock().unwrap();
        if !id.in_table_range() || !snfs_types::bitmap::test(&state.inode_bmap, id.as_index()) {
            return Err(EngineError::InodeNotAllocated(id.value()));
        }
        if let Some(idx) = state.inode_cache.find_index(id) {
            let tick = self.tick.next();
            state.inode_cache.touch(idx, tick);
            return Ok(f(state.inode_cache.value(idx)));
        }
        let idx = state.inode_cache.lru_index();
        if state.inode_cache.is_dirty(idx)
            && let Some(victim) = state.inode_cache.key_at(idx)
        {
            let data = *state.inode_cache.value(idx);
            state.inode_tab[victim.as_index()] = data;
        }
        let inode = state.inode_tab[id.as_index()];
        let tick = self.tick.next();
        state.inode_cache.place(idx, id, inode, false, tick);
        Ok(f(state.inode_cache.value(idx)))
    }

    /// As [`Engine::with_inode`], but `f` may mutate the cached inode; the
    /// slot is marked dirty afterwards.
    pub(super) fn with_inode_mut<R>(
        &self,
        id: InodeId,
        f: impl FnOnce(&mut snfs_types::Inode) -> R,
    ) -> Result<R, EngineError> {
        let mut state = self.state.lock().unwrap();
        if !id.in_table_range() || !snfs_types::bitmap::test(&state.inode_bmap, id.as_index()) {
            return Err(EngineError::InodeNotAllocated(id.value()));
        }
        if state.inode_cache.find_index(id).is_none() {
            let idx = state.inode_cache.lru_index();
            if state.inode_cache.is_dirty(idx)
                && let Some(victim) = state.inode_cache.key_at(idx)
            {
                let data = *state.inode_cache.value(idx);
                state.inode_tab[victim.as_index()] = data;
            }
            let inode = state.inode_tab[id.as_index()];
            let tick = self.tick.next();
            state.inode_cache.place(idx, id, inode, false, tick);
        }
        let idx = state.inode_cache.find_index(id).unwrap();
        let r = f(state.inode_cache.value_mut(idx));
        state.inode_cache.mark_dirty(idx);
        let tick = self.tick.next();
        state.inode_cache.touch(idx, tick);
        Ok(r)
    }

    /// Returns the type of inode `id` without requiring it be allocated;
    /// used by `readdir` to resolve a dangling entry to
    /// [`snfs_types::InodeType::Unknown`] instead of failing.
    pub(super) fn inode_type_of(&self, id: InodeId) -> snfs_types::InodeType {
        let mut state = self.state.lock().unwrap();
        if let Some(idx) = state.inode_cache.find_index(id) {
            return state.inode_cache.value(idx).ty();
        }
        if !id.in_table_range() || !snfs_types::bitmap::test(&state.inode_bmap, id.as_index()) {
            return snfs_types::InodeType::Unknown;
        }
        state.inode_tab[id.as_index()].ty()
    }

    /// Finds a free inode id, marking its bitmap bit set.
    pub(super) fn alloc_inode(&self) -> Result<InodeId, EngineError> {
        let mut state = self.state.lock().unwrap();
        let idx = snfs_types::bitmap::find_free(&state.inode_bmap, snfs_types::ITAB_SIZE)
            .ok_or(EngineError::NoFreeInode)?;
        snfs_types::bitmap::set(&mut state.inode_bmap, idx);
        Ok(InodeId::new(idx.try_into().unwrap()))
    }

    /// Finds a free data block, marking its bitmap bit set.
    pub(super) fn alloc_block(&self) -> Result<BlockNum, EngineError> {
        let limit = self.device.num_blocks() as usize;
        let mut state = self.state.lock().unwrap();
        let idx = snfs_types::bitmap::find_free(&state.blk_bmap, limit).ok_or(EngineError::NoFreeBlock)?;
        snfs_types::bitmap::set(&mut state.blk_bmap, idx);
        Ok(BlockNum::new(idx.try_into().unwrap()))
    }

    /// Reads one directory page (block `block_num` of directory `dir`),
    /// going through the dir-page cache and populating it on a miss. The
    /// dir cache is read-mostly (§4.3): it is never dirty and never
    /// written back, only invalidated by [`Engine::invalidate_dir_page`].
    pub(super) fn dir_page(&self, dir: InodeId, block_num: BlockNum) -> Result<DirPage, EngineError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(idx) = state.dir_cache.find_index((dir, block_num)) {
                let tick = self.tick.next();
                state.dir_cache.touch(idx, tick);
                return Ok(state.dir_cache.value(idx).0);
            }
        }
        let raw = self.read_block_copy(block_num)?;
        let page = read_dir_page(&raw);

        let mut state = self.state.lock().unwrap();
        if let Some(idx) = state.dir_cache.find_index((dir, block_num)) {
            let tick = self.tick.next();
            state.dir_cache.touch(idx, tick);
            return Ok(state.dir_cache.value(idx).0);
        }
        let idx = state.dir_cache.lru_index();
        let tick = self.tick.next();
        state.dir_cache.place(idx, (dir, block_num), DirPageSlot(page), false, tick);
        Ok(page)
    }

    /// Fixes the dir-cache coherence gap (§9): called after any directory
    /// mutation to drop the now-stale cached page for `(dir, block_num)`
    /// rather than let `readdir`/`dir_search` observe it until eviction.
    pub(super) fn invalidate_dir_page(&self, dir: InodeId, block_num: BlockNum) {
        let mut state = self.state.lock().unwrap();
        state.dir_cache.invalidate_matching(|(d, b)| d == dir && b == block_num);
    }

    /// Writes a directory entry into block `block_num` at slot `slot`,
    /// fetching the block into cache first if needed, and invalidates any
    /// stale cached page for the same `(dir, block_num)`.
    pub(super) fn write_dir_entry(
        &self,
        dir: InodeId,
        block_num: BlockNum,
        slot: usize,
        entry: &DirEntry,
    ) -> Result<(), EngineError> {
        self.patch_block(block_num, slot * size_of::<DirEntry>(), entry.as_bytes())?;
        self.invalidate_dir_page(dir, block_num);
        Ok(())
    }
}

fn read_dir_entry(buf: &BlockBuf, slot: usize) -> DirEntry {
    let off = slot * size_of::<DirEntry>();
    *DataView::from(&buf[off..off + size_of::<DirEntry>()]).get::<DirEntry>(0)
}

fn read_dir_page(buf: &BlockBuf) -> DirPage {
    std::array::from_fn(|i| read_dir_entry(buf, i))
}
