//! The file-system engine: bitmap allocation, the inode table, the three
//! write-back caches, path resolution, and the eight operations the
//! dispatcher exposes over the wire.
//!
//! Grounded in the original server's `fsi_*` entry points, generalized
//! from "one big struct with a single mutex around its caches" to a
//! struct whose single mutex ([`state::EngineState`]) also covers the
//! bitmaps and inode table, closing the locking-coverage gap the source
//! leaves open around `create`/`mkdir`/`format` (§5, §9).

use std::sync::Mutex;

use block_io::{BlockDevice, TickSource};
use dataview::{DataView, PodMethods as _};
use snfs_types::{
    BLK_BITMAP_BLOCK, BLOCK_SIZE, BlockNum, DATA_START_BLOCK, DirEntry, INODE_BITMAP_BLOCK,
    INODE_NUM_BLKS, ITAB_NUM_BLKS, ITAB_SIZE, ITAB_START_BLOCK, Inode, InodeId, InodeType,
    ROOT_INODE_ID,
};

mod cache;
pub mod error;
pub mod state;

pub use error::EngineError;

use state::EngineState;

/// Attributes of an inode, as returned by `get_attrs`.
#[derive(Debug, Clone, Copy)]
pub struct Attrs {
    pub inode_id: InodeId,
    pub ty: InodeType,
    pub size: u32,
    /// `size / entry_size` for a directory, `None` for a file.
    pub num_entries: Option<u32>,
}

/// The result of resolving a path: either the inode it names, or a
/// definite "no such entry", distinct from a malformed-argument error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(InodeId),
    NotFound,
}

/// One entry yielded by [`Engine::readdir`].
#[derive(Debug, Clone)]
pub struct DirListEntry {
    pub inode_id: InodeId,
    pub name: String,
    pub ty: InodeType,
}

const DIR_ENTRY_SIZE: u32 = size_of::<DirEntry>() as u32;

/// The file-system engine: one block device, one lock, three caches.
pub struct Engine {
    device: Box<dyn BlockDevice + Send + Sync>,
    state: Mutex<EngineState>,
    tick: TickSource,
}

impl Engine {
    /// Creates a new engine over `device`. If `format` is set, the device
    /// is formatted fresh (§4.5); otherwise existing metadata is loaded
    /// from it (used when reopening a `--disk`-backed image).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DeviceTooLarge`] if the device has more
    /// blocks than the free-block bitmap can address
    /// ([`snfs_types::MAX_BLOCKS`]), or [`EngineError::Device`] if the
    /// underlying device I/O fails.
    pub fn new(device: Box<dyn BlockDevice + Send + Sync>, format: bool) -> Result<Self, EngineError> {
        let num_blocks = device.num_blocks();
        if num_blocks > snfs_types::MAX_BLOCKS {
            return Err(EngineError::DeviceTooLarge(num_blocks, snfs_types::MAX_BLOCKS));
        }
        let engine = Self {
            device,
            state: Mutex::new(EngineState::default()),
            tick: TickSource::new(),
        };
        if format {
            engine.format()?;
        } else {
            engine.load_fsdata()?;
        }
        Ok(engine)
    }

    /// Zeroes every block, marks the metadata region allocated, creates an
    /// empty root directory, and flushes. Matches §4.5 `format(fs)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Device`] if the underlying device I/O fails.
    pub fn format(&self) -> Result<(), EngineError> {
        let num_blocks = self.device.num_blocks();
        let zero = [0_u8; BLOCK_SIZE];
        for b in 0..num_blocks {
            self.device.write(BlockNum::new(b), &zero)?;
        }

        {
            let mut state = self.state.lock().unwrap();
            *state = EngineState::default();
            for b in 0..DATA_START_BLOCK {
                snfs_types::bitmap::set(&mut state.blk_bmap, b as usize);
            }
            snfs_types::bitmap::set(&mut state.inode_bmap, 0);
            snfs_types::bitmap::set(&mut state.inode_bmap, ROOT_INODE_ID.as_index());
            state.inode_tab[ROOT_INODE_ID.as_index()] = Inode::new(InodeType::Dir);
        }
        self.store_fsdata()?;
        self.device.finish_format();
        Ok(())
    }

    fn load_fsdata(&self) -> Result<(), EngineError> {
        let mut blk_bmap = [0_u8; BLOCK_SIZE];
        self.device.read(BlockNum::new(BLK_BITMAP_BLOCK), &mut blk_bmap)?;
        let mut inode_bmap = [0_u8; BLOCK_SIZE];
        self.device.read(BlockNum::new(INODE_BITMAP_BLOCK), &mut inode_bmap)?;

        let inodes_per_block = BLOCK_SIZE / size_of::<Inode>();
        let mut inode_tab = Box::new([Inode::new(InodeType::Unknown); ITAB_SIZE]);
        for blk in 0..ITAB_NUM_BLKS {
            let mut buf = [0_u8; BLOCK_SIZE];
            self.device.read(BlockNum::new(ITAB_START_BLOCK + blk as u32), &mut buf)?;
            for slot in 0..inodes_per_block {
                let off = slot * size_of::<Inode>();
                let inode = *DataView::from(&buf[off..off + size_of::<Inode>()]).get::<Inode>(0);
                inode_tab[blk * inodes_per_block + slot] = inode;
            }
        }

        let mut state = self.state.lock().unwrap();
        state.blk_bmap = Box::new(blk_bmap);
        state.inode_bmap = Box::new(inode_bmap);
        state.inode_tab = inode_tab;
        Ok(())
    }

    /// Flushes the bitmaps and the full inode table back to the device
    /// (§4.4 `fsi_store_fsdata`). Called by every metadata-mutating
    /// operation before it reports success.
    fn store_fsdata(&self) -> Result<(), EngineError> {
        let (blk_bmap, inode_bmap, itab_blocks) = {
            let state = self.state.lock().unwrap();
            let inodes_per_block = BLOCK_SIZE / size_of::<Inode>();
            let mut itab_blocks = vec![[0_u8; BLOCK_SIZE]; ITAB_NUM_BLKS];
            for blk in 0..ITAB_NUM_BLKS {
                for slot in 0..inodes_per_block {
                    let off = slot * size_of::<Inode>();
                    let inode = state.inode_tab[blk * inodes_per_block + slot];
                    itab_blocks[blk][off..off + size_of::<Inode>()].copy_from_slice(inode.as_bytes());
                }
            }
            (*state.blk_bmap, *state.inode_bmap, itab_blocks)
        };
        self.device.write(BlockNum::new(BLK_BITMAP_BLOCK), &blk_bmap)?;
        self.device.write(BlockNum::new(INODE_BITMAP_BLOCK), &inode_bmap)?;
        for (i, block) in itab_blocks.iter().enumerate() {
            self.device.write(BlockNum::new(ITAB_START_BLOCK + i as u32), block)?;
        }
        Ok(())
    }

    /// Resolves a `/`-rooted path to an inode id. Matches §4.5 `lookup`:
    /// the empty path `"/"` always resolves to the root, and any other
    /// path not starting with `/` is a malformed-argument error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPath`] if `path` does not start with
    /// `/`, or an inode/device error encountered while walking it.
    pub fn lookup(&self, path: &str) -> Result<LookupOutcome, EngineError> {
        let rest = path.strip_prefix('/').ok_or_else(|| EngineError::InvalidPath(path.to_owned()))?;

        let mut current = ROOT_INODE_ID;
        for component in rest.split('/').filter(|c| !c.is_empty()) {
            let is_dir = self.with_inode(current, |inode| inode.ty() == InodeType::Dir)?;
            if !is_dir {
                return Ok(LookupOutcome::NotFound);
            }
            match self.dir_search(current, component.as_bytes())? {
                Some(next) => current = next,
                None => return Ok(LookupOutcome::NotFound),
            }
        }
        Ok(LookupOutcome::Found(current))
    }

    /// Fills `{inodeid, type, size, num_entries}` for an allocated inode.
    /// Matches §4.5 `get_attrs`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InodeNotAllocated`] if `id` does not name an
    /// allocated inode.
    pub fn get_attrs(&self, id: InodeId) -> Result<Attrs, EngineError> {
        self.with_inode(id, |inode| Attrs {
            inode_id: id,
            ty: inode.ty(),
            size: inode.size(),
            num_entries: (inode.ty() == InodeType::Dir).then(|| inode.size() / DIR_ENTRY_SIZE),
        })
    }

    /// Creates a new, empty file named `name` in directory `parent`.
    /// Matches §4.5 `create`.
    ///
    /// # Errors
    ///
    /// See [`Engine::create_entry`].
    pub fn create(&self, parent: InodeId, name: &str) -> Result<InodeId, EngineError> {
        let id = self.create_entry(parent, name, InodeType::File)?;
        self.store_fsdata()?;
        Ok(id)
    }

    /// Creates a new, empty directory named `name` in directory `parent`.
    /// Matches §4.5 `mkdir`.
    ///
    /// # Errors
    ///
    /// See [`Engine::create_entry`].
    pub fn mkdir(&self, parent: InodeId, name: &str) -> Result<InodeId, EngineError> {
        let id = self.create_entry(parent, name, InodeType::Dir)?;
        self.store_fsdata()?;
        Ok(id)
    }

    /// Shared implementation of `create`/`mkdir`/copy's destination
    /// creation: allocate an inode, append a directory entry for it to
    /// `parent`, and initialize it as `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NameTooLong`] if `name` is empty or does not
    /// fit (with its NUL terminator) in `FS_MAX_FNAME_SZ` bytes,
    /// [`EngineError::NotADirectory`] if `parent` is not a directory,
    /// [`EngineError::NameAlreadyExists`] if `name` is already present,
    /// [`EngineError::NoFreeInode`] / [`EngineError::NoFreeBlock`] /
    /// [`EngineError::DirectBlockTableFull`] on exhaustion.
    fn create_entry(&self, parent: InodeId, name: &str, ty: InodeType) -> Result<InodeId, EngineError> {
        validate_name(name)?;
        let name_bytes = name.as_bytes();
        if self.dir_search(parent, name_bytes)?.is_some() {
            return Err(EngineError::NameAlreadyExists(name.to_owned()));
        }

        let new_id = self.alloc_inode()?;

        // Entries per block (§3 `DIR_PAGE_ENTRIES`) do not evenly divide
        // `BLOCK_SIZE`, so a new block is needed whenever the entry count
        // (not the byte size) crosses a block boundary.
        let size = self.with_inode(parent, snfs_types::Inode::size)?;
        let entry_count = size / DIR_ENTRY_SIZE;
        let entries_per_block = snfs_types::DIR_PAGE_ENTRIES as u32;
        let blk_idx = (entry_count / entries_per_block) as usize;
        let slot = (entry_count % entries_per_block) as usize;
        let needs_new_block = slot == 0;
        if blk_idx >= INODE_NUM_BLKS {
            return Err(EngineError::DirectBlockTableFull);
        }

        let block_num = if needs_new_block {
            let block_num = self.alloc_block()?;
            self.place_fresh_block(block_num, [0_u8; BLOCK_SIZE])?;
            self.with_inode_mut(parent, |inode| inode.set_block(blk_idx, block_num))?;
            block_num
        } else {
            self.with_inode(parent, |inode| inode.block(blk_idx))?
                .expect("blk_idx below entry_count must already be allocated")
        };

        let entry = DirEntry::new(new_id, name_bytes);
        self.write_dir_entry(parent, block_num, slot, &entry)?;
        self.with_inode_mut(parent, |inode| inode.set_size(size + DIR_ENTRY_SIZE))?;

        self.with_inode_mut(new_id, |inode| *inode = Inode::new(ty))?;

        Ok(new_id)
    }

    /// Reads up to `out.len()` bytes of file `fileid` starting at
    /// `offset` into `out`, returning the number of bytes actually read
    /// (`0` once `offset >= size`). Matches §4.5 `read`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAFile`] if `fileid` is not a file, or
    /// [`EngineError::IndirectNotSupported`] if the read would need to
    /// follow a block index beyond [`INODE_NUM_BLKS`].
    pub fn read(&self, fileid: InodeId, offset: u32, out: &mut [u8]) -> Result<u32, EngineError> {
        let attrs = self.get_attrs(fileid)?;
        if attrs.ty != InodeType::File {
            return Err(EngineError::NotAFile(fileid.value()));
        }
        if offset >= attrs.size {
            return Ok(0);
        }

        let to_read = (attrs.size - offset).min(out.len() as u32);
        let mut remaining = to_read;
        let mut out_off = 0_usize;
        let mut iblock = (offset / BLOCK_SIZE as u32) as usize;
        let mut start = (offset % BLOCK_SIZE as u32) as usize;

        while remaining > 0 {
            if iblock >= INODE_NUM_BLKS {
                return Err(EngineError::IndirectNotSupported);
            }
            let block_num = self
                .with_inode(fileid, |inode| inode.block(iblock))?
                .expect("block within size must be allocated");
            let data = self.read_block_copy(block_num)?;
            let n = (BLOCK_SIZE - start).min(remaining as usize);
            out[out_off..out_off + n].copy_from_slice(&data[start..start + n]);
            out_off += n;
            remaining -= n as u32;
            start = 0;
            iblock += 1;
        }
        Ok(to_read)
    }

    /// Writes `data` to file `fileid` at `offset`, clamping `offset` to
    /// the current size (append-only semantics), allocating new direct
    /// blocks as needed, and returns the resulting file size. Matches
    /// §4.5 `write`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAFile`] if `fileid` is not a file,
    /// [`EngineError::DirectBlockTableFull`] if the write would need more
    /// than [`INODE_NUM_BLKS`] direct blocks, or an allocator/device
    /// error.
    pub fn write(&self, fileid: InodeId, offset: u32, data: &[u8]) -> Result<u32, EngineError> {
        let attrs = self.get_attrs(fileid)?;
        if attrs.ty != InodeType::File {
            return Err(EngineError::NotAFile(fileid.value()));
        }
        let size = attrs.size;
        let offset = offset.min(size);
        let end = offset + data.len() as u32;

        let currently_allocated = size.div_ceil(BLOCK_SIZE as u32) as usize;
        let needed_total = end.div_ceil(BLOCK_SIZE as u32) as usize;
        if needed_total > INODE_NUM_BLKS {
            return Err(EngineError::DirectBlockTableFull);
        }

        for i in currently_allocated..needed_total {
            let block_num = self.alloc_block()?;
            self.place_fresh_block(block_num, [0_u8; BLOCK_SIZE])?;
            self.with_inode_mut(fileid, |inode| inode.set_block(i, block_num))?;
        }

        let mut written = 0_u32;
        let mut pos = offset;
        while written < data.len() as u32 {
            let iblock = (pos / BLOCK_SIZE as u32) as usize;
            if iblock >= INODE_NUM_BLKS {
                return Err(EngineError::IndirectNotSupported);
            }
            let block_num = self
                .with_inode(fileid, |inode| inode.block(iblock))?
                .expect("block allocated above");
            let in_block_off = (pos % BLOCK_SIZE as u32) as usize;
            let n = (BLOCK_SIZE - in_block_off).min((data.len() as u32 - written) as usize);
            self.patch_block(block_num, in_block_off, &data[written as usize..written as usize + n])?;
            written += n as u32;
            pos += n as u32;
        }

        if end > size {
            self.with_inode_mut(fileid, |inode| inode.set_size(end))?;
        }
        Ok(end.max(size))
    }

    /// Yields up to `max` `(name, type)` entries of directory `dir` in
    /// creation order. Matches §4.5 `readdir`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotADirectory`] if `dir` is not a
    /// directory.
    pub fn readdir(&self, dir: InodeId, max: usize) -> Result<Vec<DirListEntry>, EngineError> {
        let (size, ty) = self.with_inode(dir, |inode| (inode.size(), inode.ty()))?;
        if ty != InodeType::Dir {
            return Err(EngineError::NotADirectory(dir.value()));
        }

        let total_entries = (size / DIR_ENTRY_SIZE) as usize;
        let n = total_entries.min(max);
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        let mut iblock = 0_usize;
        while remaining > 0 {
            let block_num = self
                .with_inode(dir, |inode| inode.block(iblock))?
                .expect("block within directory size must be allocated");
            let page = self.dir_page(dir, block_num)?;
            let in_block = remaining.min(snfs_types::DIR_PAGE_ENTRIES);
            for entry in &page[..in_block] {
                out.push(DirListEntry {
                    inode_id: entry.inode_id(),
                    name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                    ty: self.inode_type_of(entry.inode_id()),
                });
            }
            remaining -= in_block;
            iblock += 1;
        }
        Ok(out)
    }

    /// Copies the file at `src_path` to a new file at `tgt_path`. Matches
    /// §4.5 `copy`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntryNotFound`] if either path fails to
    /// resolve, [`EngineError::NotAFile`] if `src_path` is not a file, or
    /// [`EngineError::MissingPathSeparator`] if `tgt_path` has no `/`.
    pub fn copy(&self, src_path: &str, tgt_path: &str) -> Result<InodeId, EngineError> {
        let src_id = match self.lookup(src_path)? {
            LookupOutcome::Found(id) => id,
            LookupOutcome::NotFound => return Err(EngineError::EntryNotFound(src_path.to_owned())),
        };
        let src_attrs = self.get_attrs(src_id)?;
        if src_attrs.ty != InodeType::File {
            return Err(EngineError::NotAFile(src_id.value()));
        }

        let (parent_path, name) = tgt_path
            .rsplit_once('/')
            .ok_or_else(|| EngineError::MissingPathSeparator(tgt_path.to_owned()))?;
        let parent_path = if parent_path.is_empty() { "/" } else { parent_path };
        let parent_id = match self.lookup(parent_path)? {
            LookupOutcome::Found(id) => id,
            LookupOutcome::NotFound => return Err(EngineError::EntryNotFound(parent_path.to_owned())),
        };

        let dst_id = self.create_entry(parent_id, name, InodeType::File)?;

        let blocks_used = src_attrs.size.div_ceil(BLOCK_SIZE as u32) as usize;
        for i in 0..blocks_used {
            let src_block = self
                .with_inode(src_id, |inode| inode.block(i))?
                .expect("block within size must be allocated");
            let data = self.read_block_copy(src_block)?;
            let dst_block = self.alloc_block()?;
            self.place_fresh_block(dst_block, data)?;
            self.with_inode_mut(dst_id, |inode| inode.set_block(i, dst_block))?;
        }
        self.with_inode_mut(dst_id, |inode| inode.set_size(src_attrs.size))?;
        self.store_fsdata()?;
        Ok(dst_id)
    }

    /// Shared directory-search primitive (§4.5 `dir_search`): consults
    /// any already-cached page of `dir` first, then walks its blocks in
    /// order, populating the dir cache as it goes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotADirectory`] if `dir` is not a
    /// directory.
    fn dir_search(&self, dir: InodeId, name: &[u8]) -> Result<Option<InodeId>, EngineError> {
        let (size, ty) = self.with_inode(dir, |inode| (inode.size(), inode.ty()))?;
        if ty != InodeType::Dir {
            return Err(EngineError::NotADirectory(dir.value()));
        }

        if let Some(found) = self.dir_cache_scan(dir, name) {
            return Ok(Some(found));
        }

        for i in 0..dir_blocks_used(size) {
            let block_num = self
                .with_inode(dir, |inode| inode.block(i))?
                .expect("block within blocks_used must be allocated");
            let page = self.dir_page(dir, block_num)?;
            if let Some(found) = search_page(&page, name) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Scans every currently cached dir page belonging to `dir`,
    /// regardless of which block it holds, before falling back to
    /// iterating blocks in order (§4.5 `dir_search`).
    fn dir_cache_scan(&self, dir: InodeId, name: &[u8]) -> Option<InodeId> {
        let mut state = self.state.lock().unwrap();
        for i in 0..state::DIR_CACHE_SIZE {
            let Some((slot_dir, _block)) = state.dir_cache.key_at(i) else {
                continue;
            };
            if slot_dir != dir {
                continue;
            }
            if let Some(found) = search_page(&state.dir_cache.value(i).0, name) {
                let tick = self.tick.next();
                state.dir_cache.touch(i, tick);
                return Some(found);
            }
        }
        None
    }
}

fn search_page(page: &snfs_types::DirPage, name: &[u8]) -> Option<InodeId> {
    page.iter().find(|e| e.is_named(name)).map(DirEntry::inode_id)
}

/// Number of blocks a directory's entries span, counted the same way
/// `create_entry` decides where to append (entry count, not byte size):
/// `DirEntry` does not evenly divide `BLOCK_SIZE`, so `Inode::blocks_used`
/// (a byte-ceiling-division) can under-count relative to the entry-count
/// ceiling once the directory holds enough entries for the slack per block
/// to accumulate to a full entry.
fn dir_blocks_used(size: u32) -> usize {
    (size / DIR_ENTRY_SIZE).div_ceil(snfs_types::DIR_PAGE_ENTRIES as u32) as usize
}

fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.is_empty() || name.len() + 1 > snfs_types::FS_MAX_FNAME_SZ {
        return Err(EngineError::NameTooLong(name.to_owned()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use block_io::MemoryBlockDevice;
    use snfs_types::{InodeId, InodeType, ROOT_INODE_ID};

    use super::{Engine, LookupOutcome};

    fn fresh_engine(num_blocks: u32) -> Engine {
        let device = Box::new(MemoryBlockDevice::new(num_blocks, Duration::ZERO));
        Engine::new(device, true).unwrap()
    }

    #[test]
    fn device_larger_than_bitmap_capacity_is_rejected() {
        let device = Box::new(MemoryBlockDevice::new(snfs_types::MAX_BLOCKS + 1, Duration::ZERO));
        assert!(matches!(
            Engine::new(device, true),
            Err(super::EngineError::DeviceTooLarge(_, _))
        ));
    }

    #[test]
    fn lookup_root_returns_root_without_search() {
        let engine = fresh_engine(64);
        assert_eq!(engine.lookup("/").unwrap(), LookupOutcome::Found(ROOT_INODE_ID));
    }

    #[test]
    fn lookup_missing_path_rejected() {
        let engine = fresh_engine(64);
        assert!(engine.lookup("no-leading-slash").is_err());
    }

    #[test]
    fn create_write_read_round_trips() {
        let engine = fresh_engine(64);
        let file = engine.create(ROOT_INODE_ID, "file1.txt").unwrap();
        let payload = b"Testing SNFS write/read\0";
        let size = engine.write(file, 0, payload).unwrap();
        assert_eq!(size, payload.len() as u32);

        let mut out = [0_u8; 256];
        let nread = engine.read(file, 0, &mut out).unwrap();
        assert_eq!(nread, payload.len() as u32);
        assert_eq!(&out[..nread as usize], payload);
    }

    #[test]
    fn read_at_eof_returns_zero() {
        let engine = fresh_engine(64);
        let file = engine.create(ROOT_INODE_ID, "empty.txt").unwrap();
        let mut out = [0_u8; 16];
        assert_eq!(engine.read(file, 0, &mut out).unwrap(), 0);
    }

    #[test]
    fn write_past_size_is_clamped_to_append() {
        let engine = fresh_engine(64);
        let file = engine.create(ROOT_INODE_ID, "a.txt").unwrap();
        engine.write(file, 0, b"abc").unwrap();
        let size = engine.write(file, 1000, b"def").unwrap();
        assert_eq!(size, 6);
        let mut out = [0_u8; 6];
        engine.read(file, 0, &mut out).unwrap();
        assert_eq!(&out, b"abcdef");
    }

    #[test]
    fn mkdir_then_readdir_lists_new_entry() {
        let engine = fresh_engine(64);
        let dir = engine.mkdir(ROOT_INODE_ID, "mydir").unwrap();
        let entries = engine.readdir(ROOT_INODE_ID, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "mydir");
        assert_eq!(entries[0].ty, InodeType::Dir);
        assert_eq!(engine.lookup("/mydir").unwrap(), LookupOutcome::Found(dir));
    }

    #[test]
    fn lookup_and_duplicate_detection_reach_the_tail_directory_block() {
        // 25 entries (`DIR_PAGE_ENTRIES`) pack into one block with 20-byte
        // entries; 51 entries span a byte-ceiling-division of 2 blocks
        // (size=1020, div_ceil(1020,512)=2) but an entry-ceiling-division
        // of 3 blocks (div_ceil(51,25)=3). A search bounded by the former
        // would never look at the third block.
        let engine = fresh_engine(64);
        for i in 0..51 {
            engine.create(ROOT_INODE_ID, &format!("f{i}")).unwrap();
        }
        assert_eq!(
            engine.lookup("/f50").unwrap(),
            LookupOutcome::Found(InodeId::new(ROOT_INODE_ID.value() + 51))
        );
        assert!(engine.create(ROOT_INODE_ID, "f50").is_err());
    }

    #[test]
    fn create_duplicate_name_fails_without_mutating_state() {
        let engine = fresh_engine(64);
        engine.create(ROOT_INODE_ID, "dup.txt").unwrap();
        assert!(engine.create(ROOT_INODE_ID, "dup.txt").is_err());
        let entries = engine.readdir(ROOT_INODE_ID, 10).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn create_name_too_long_fails() {
        let engine = fresh_engine(64);
        // FS_MAX_FNAME_SZ is 14 (13 chars + NUL); 14 chars does not fit.
        assert!(engine.create(ROOT_INODE_ID, "12345678901234").is_err());
        assert!(engine.create(ROOT_INODE_ID, "1234567890123").is_ok());
    }

    #[test]
    fn write_exceeding_direct_blocks_fails() {
        let engine = fresh_engine(64);
        let file = engine.create(ROOT_INODE_ID, "big.txt").unwrap();
        let one_block = vec![1_u8; 512];
        let mut offset = 0_u32;
        for _ in 0..10 {
            engine.write(file, offset, &one_block).unwrap();
            offset += 512;
        }
        assert!(matches!(
            engine.write(file, offset, &one_block),
            Err(super::EngineError::DirectBlockTableFull)
        ));
    }

    #[test]
    fn copy_duplicates_contents_and_size() {
        let engine = fresh_engine(64);
        engine.create(ROOT_INODE_ID, "teste.txt").unwrap();
        let src = match engine.lookup("/teste.txt").unwrap() {
            LookupOutcome::Found(id) => id,
            LookupOutcome::NotFound => panic!("just created"),
        };
        engine.write(src, 0, b"abc").unwrap();

        engine.copy("/teste.txt", "/teste_copia.txt").unwrap();
        let dst = match engine.lookup("/teste_copia.txt").unwrap() {
            LookupOutcome::Found(id) => id,
            LookupOutcome::NotFound => panic!("copy must create target"),
        };
        let mut out = [0_u8; 16];
        let n = engine.read(dst, 0, &mut out).unwrap();
        assert_eq!(&out[..n as usize], b"abc");
        assert_eq!(engine.get_attrs(dst).unwrap().size, 3);
    }

    #[test]
    fn lookup_of_missing_file_is_not_found() {
        let engine = fresh_engine(64);
        assert_eq!(engine.lookup("/does_not_exist").unwrap(), LookupOutcome::NotFound);
    }

    #[test]
    fn concurrent_writes_do_not_tear_each_others_bytes() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(fresh_engine(64));
        let file = engine.create(ROOT_INODE_ID, "shared.txt").unwrap();
        engine.write(file, 4 * 64 + 20 - 1, b" ").unwrap(); // pre-grow so all four ranges are direct writes

        let handles: Vec<_> = (0_u32..4)
            .map(|tid| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let msg = format!("Thread {tid} diz oi!\n");
                    engine.write(file, tid * 64, msg.as_bytes()).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for tid in 0_u32..4 {
            let msg = format!("Thread {tid} diz oi!\n");
            let mut out = vec![0_u8; msg.len()];
            engine.read(file, tid * 64, &mut out).unwrap();
            assert_eq!(out, msg.as_bytes());
        }
    }
}
