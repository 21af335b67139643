use std::{
    fs::{File, OpenOptions},
    os::unix::fs::FileExt as _,
    path::Path,
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
    time::Duration,
};

use snfs_types::{BlockBuf, BlockNum};

use crate::{BlockDevice, BlockDeviceError, check_range, simulate_access_delay};

/// A block device backed by a regular file, one `BLOCK_SIZE`-byte region per
/// block number.
///
/// Used when the server is pointed at a disk image on disk (`--disk`)
/// rather than the default in-memory device, and by `mkfs` to lay out a
/// fresh image.
pub struct FileBlockDevice {
    file: File,
    num_blocks: AtomicU32,
    delay: Duration,
    warm: AtomicBool,
}

impl FileBlockDevice {
    /// Opens (creating if necessary) `path` as a block device with
    /// `num_blocks` blocks, truncating/extending it to the exact required
    /// length.
    ///
    /// # Errors
    ///
    /// Returns [`BlockDeviceError::Io`] if the file cannot be opened or
    /// resized.
    pub fn open(path: &Path, num_blocks: u32, delay: Duration) -> Result<Self, BlockDeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = u64::from(num_blocks) * size_of::<BlockBuf>() as u64;
        file.set_len(len)?;
        Ok(Self {
            file,
            num_blocks: AtomicU32::new(num_blocks),
            delay,
            warm: AtomicBool::new(false),
        })
    }

    fn offset(block_num: BlockNum) -> u64 {
        u64::from(block_num.value()) * size_of::<BlockBuf>() as u64
    }
}

impl BlockDevice for FileBlockDevice {
    fn num_blocks(&self) -> u32 {
        self.num_blocks.load(Ordering::Relaxed)
    }

    fn read(&self, block_num: BlockNum, out: &mut BlockBuf) -> Result<(), BlockDeviceError> {
        check_range(block_num, self.num_blocks())?;
        simulate_access_delay(self.delay, self.warm.load(Ordering::Relaxed));
        self.file.read_exact_at(out, Self::offset(block_num))?;
        Ok(())
    }

    fn write(&self, block_num: BlockNum, data: &BlockBuf) -> Result<(), BlockDeviceError> {
        check_range(block_num, self.num_blocks())?;
        simulate_access_delay(self.delay, self.warm.load(Ordering::Relaxed));
        self.file.write_all_at(data, Self::offset(block_num))?;
        Ok(())
    }

    fn finish_format(&self) {
        self.warm.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use snfs_types::BlockNum;
    use tempfile::NamedTempFile;

    use super::FileBlockDevice;
    use crate::BlockDevice;

    #[test]
    fn write_then_read_round_trips() {
        let path = NamedTempFile::new().unwrap().into_temp_path();
        let dev = FileBlockDevice::open(&path, 4, Duration::ZERO).unwrap();
        let mut buf = [9_u8; 512];
        dev.write(BlockNum::new(1), &buf).unwrap();
        buf = [0; 512];
        dev.read(BlockNum::new(1), &mut buf).unwrap();
        assert_eq!(buf, [9_u8; 512]);
    }

    #[test]
    fn reopen_preserves_contents() {
        let path = NamedTempFile::new().unwrap().into_temp_path();
        {
            let dev = FileBlockDevice::open(&path, 2, Duration::ZERO).unwrap();
            dev.write(BlockNum::new(0), &[3_u8; 512]).unwrap();
        }
        let dev = FileBlockDevice::open(&path, 2, Duration::ZERO).unwrap();
        let mut buf = [0_u8; 512];
        dev.read(BlockNum::new(0), &mut buf).unwrap();
        assert_eq!(buf, [3_u8; 512]);
    }
}
