//! Block device abstraction and the last-access cache shared by the three
//! engine caches (blocks, inodes, directory pages).
//!
//! Factored into its own crate the same way the wider codebase pulls
//! `BlockDevice`/cache plumbing out from under the file system proper: the
//! engine crate depends on this one for both the simulated disk and the
//! generic cache it instantiates three times with different key/value
//! types.

use std::{
    io,
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};

use log::trace;
use snfs_types::{BlockBuf, BlockNum};
use thiserror::Error;

mod file;
mod memory;

pub use file::FileBlockDevice;
pub use memory::MemoryBlockDevice;

/// Errors a [`BlockDevice`] implementation can report.
#[derive(Debug, Error)]
pub enum BlockDeviceError {
    #[error("block number {0} is out of range")]
    OutOfRange(BlockNum),
    #[error("I/O error accessing backing store")]
    Io(#[from] io::Error),
}

/// A fixed-size array of fixed-size blocks, addressed by block number.
///
/// Implementations model real disk latency via their constructors: accesses
/// sleep for the configured delay once the device leaves "format mode" (see
/// [`BlockDevice::finish_format`]), so that formatting a fresh device is
/// never artificially slowed down.
pub trait BlockDevice {
    /// Number of blocks in the device.
    fn num_blocks(&self) -> u32;

    /// Reads block `block_num` into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDeviceError::OutOfRange`] if `block_num >=
    /// num_blocks()`.
    fn read(&self, block_num: BlockNum, out: &mut BlockBuf) -> Result<(), BlockDeviceError>;

    /// Writes `data` to block `block_num`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDeviceError::OutOfRange`] if `block_num >=
    /// num_blocks()`.
    fn write(&self, block_num: BlockNum, data: &BlockBuf) -> Result<(), BlockDeviceError>;

    /// Marks the device as no longer "warming up": subsequent reads/writes
    /// incur the configured per-access delay. `format` calls this once it
    /// has finished zeroing every block, so that format itself is not
    /// slowed down by a simulated disk latency.
    fn finish_format(&self);
}

/// Sleeps for `delay` if `warm` (used by both device implementations to
/// share the exact same "warm up" semantics).
pub(crate) fn simulate_access_delay(delay: Duration, warm: bool) {
    if warm && !delay.is_zero() {
        trace!("simulating disk access delay of {delay:?}");
        thread::sleep(delay);
    }
}

pub(crate) fn check_range(block_num: BlockNum, num_blocks: u32) -> Result<(), BlockDeviceError> {
    if block_num.value() >= num_blocks {
        return Err(BlockDeviceError::OutOfRange(block_num));
    }
    Ok(())
}

/// Process-wide monotonic tick counter used as the `last_access` time source
/// for every [`LastAccessCache`].
///
/// The original server uses wall-clock seconds, giving every cache
/// operation within the same second the same `last_access` and making LRU
/// eviction order within that window arbitrary; this rewrite uses an
/// `AtomicU64` tick instead so operations are always totally ordered (see
/// `DESIGN.md`).
#[derive(Debug, Default)]
pub struct TickSource(AtomicU64);

impl TickSource {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Returns the next tick, strictly greater than any previously returned
    /// value.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
struct CacheSlot<K, V> {
    key: Option<K>,
    value: V,
    dirty: bool,
    last_access: u64,
}

impl<K, V: Default> Default for CacheSlot<K, V> {
    fn default() -> Self {
        Self {
            key: None,
            value: V::default(),
            dirty: false,
            last_access: 0,
        }
    }
}

/// A fixed-capacity, last-access-ordered cache.
///
/// This is a direct generalization of the original server's three ad-hoc
/// caches (block/inode/dir), which all repeat the same "linear scan for a
/// hit, linear scan for the smallest `last_access` on a miss" shape. The
/// generic version is instantiated once per concrete `(K, V, N)` in
/// `snfs_server`'s engine.
///
/// Eviction never happens implicitly: callers look up a slot index, and if
/// there is a miss, explicitly ask for the LRU slot index via
/// [`LastAccessCache::lru_index`] so they can write back a dirty victim
/// (which may require releasing an outer lock around device I/O) before
/// calling [`LastAccessCache::place`].
pub struct LastAccessCache<K, V, const N: usize> {
    slots: [CacheSlot<K, V>; N],
}

impl<K, V, const N: usize> LastAccessCache<K, V, N>
where
    K: Copy + Eq,
    V: Default,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| CacheSlot::default()),
        }
    }

    /// Finds the slot index holding `key`, if any. Does not update
    /// `last_access`; call [`LastAccessCache::touch`] on a hit.
    #[must_use]
    pub fn find_index(&self, key: K) -> Option<usize> {
        self.slots.iter().position(|s| s.key == Some(key))
    }

    /// Bumps the `last_access` of slot `idx` to `tick`.
    pub fn touch(&mut self, idx: usize, tick: u64) {
        self.slots[idx].last_access = tick;
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> &V {
        &self.slots[idx].value
    }

    pub fn value_mut(&mut self, idx: usize) -> &mut V {
        &mut self.slots[idx].value
    }

    #[must_use]
    pub fn key_at(&self, idx: usize) -> Option<K> {
        self.slots[idx].key
    }

    #[must_use]
    pub fn is_dirty(&self, idx: usize) -> bool {
        self.slots[idx].dirty
    }

    pub fn mark_dirty(&mut self, idx: usize) {
        self.slots[idx].dirty = true;
    }

    /// Returns the index of the slot with the smallest `last_access`
    /// (ties broken by lowest index, matching a linear scan that keeps the
    /// first minimum it finds). An empty slot has `last_access == 0` so it
    /// is always picked before any previously used slot.
    #[must_use]
    pub fn lru_index(&self) -> usize {
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.last_access)
            .map_or(0, |(i, _)| i)
    }

    /// Overwrites slot `idx` with a new key/value, clearing `dirty` to the
    /// caller-supplied value and bumping `last_access` to `tick`.
    pub fn place(&mut self, idx: usize, key: K, value: V, dirty: bool, tick: u64) {
        self.slots[idx] = CacheSlot {
            key: Some(key),
            value,
            dirty,
            last_access: tick,
        };
    }

    /// Invalidates every slot whose key satisfies `pred`, without writing
    /// it back. Used to fix the dir-cache coherence gap: a directory
    /// mutation invalidates any cached page of the block it just wrote,
    /// rather than leaving a stale copy to be observed until eviction.
    pub fn invalidate_matching(&mut self, mut pred: impl FnMut(K) -> bool) {
        for slot in &mut self.slots {
            if let Some(k) = slot.key
                && pred(k)
            {
                slot.key = None;
                slot.dirty = false;
                slot.last_access = 0;
            }
        }
    }
}

impl<K, V, const N: usize> Default for LastAccessCache<K, V, N>
where
    K: Copy + Eq,
    V: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::LastAccessCache;

    #[test]
    fn miss_then_hit() {
        let mut cache = LastAccessCache::<u32, [u8; 4], 2>::new();
        assert_eq!(cache.find_index(7), None);

        let idx = cache.lru_index();
        cache.place(idx, 7, [1, 2, 3, 4], false, 1);
        assert_eq!(cache.find_index(7), Some(idx));
        assert_eq!(*cache.value(idx), [1, 2, 3, 4]);
    }

    #[test]
    fn lru_prefers_empty_slot_first() {
        let mut cache = LastAccessCache::<u32, [u8; 1], 2>::new();
        let idx = cache.lru_index();
        cache.place(idx, 1, [0], false, 5);
        // the still-empty slot has last_access 0, which is smaller than 5.
        assert_eq!(cache.lru_index(), 1 - idx);
    }

    #[test]
    fn eviction_picks_oldest_access() {
        let mut cache = LastAccessCache::<u32, [u8; 1], 2>::new();
        cache.place(0, 1, [1], false, 10);
        cache.place(1, 2, [2], false, 20);
        assert_eq!(cache.lru_index(), 0);
        cache.touch(0, 30);
        assert_eq!(cache.lru_index(), 1);
    }

    #[test]
    fn invalidate_matching_clears_slot() {
        let mut cache = LastAccessCache::<(u32, u32), [u8; 1], 2>::new();
        cache.place(0, (1, 5), [0], true, 1);
        cache.invalidate_matching(|(dir, _)| dir == 1);
        assert_eq!(cache.find_index((1, 5)), None);
    }
}
