use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use snfs_types::{BlockBuf, BlockNum};

use crate::{BlockDevice, BlockDeviceError, check_range, simulate_access_delay};

/// An in-memory block device: a `Vec` of zeroed blocks.
///
/// The default backing store for the server; convenient for tests and demos
/// since it needs no filesystem of its own to hold the simulated one.
pub struct MemoryBlockDevice {
    blocks: Mutex<Vec<BlockBuf>>,
    delay: Duration,
    warm: AtomicBool,
}

impl MemoryBlockDevice {
    #[must_use]
    pub fn new(num_blocks: u32, delay: Duration) -> Self {
        Self {
            blocks: Mutex::new(vec![[0_u8; size_of::<BlockBuf>()]; num_blocks as usize]),
            delay,
            warm: AtomicBool::new(false),
        }
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn num_blocks(&self) -> u32 {
        self.blocks.lock().unwrap().len().try_into().unwrap()
    }

    fn read(&self, block_num: BlockNum, out: &mut BlockBuf) -> Result<(), BlockDeviceError> {
        let blocks = self.blocks.lock().unwrap();
        check_range(block_num, blocks.len().try_into().unwrap())?;
        simulate_access_delay(self.delay, self.warm.load(Ordering::Relaxed));
        out.copy_from_slice(&blocks[block_num.as_index()]);
        Ok(())
    }

    fn write(&self, block_num: BlockNum, data: &BlockBuf) -> Result<(), BlockDeviceError> {
        let mut blocks = self.blocks.lock().unwrap();
        check_range(block_num, blocks.len().try_into().unwrap())?;
        simulate_access_delay(self.delay, self.warm.load(Ordering::Relaxed));
        blocks[block_num.as_index()].copy_from_slice(data);
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

    use super::MemoryBlockDevice;
    use crate::BlockDevice;

    #[test]
    fn write_then_read_round_trips() {
        let dev = MemoryBlockDevice::new(4, Duration::ZERO);
        let mut buf = [7_u8; 512];
        dev.write(BlockNum::new(2), &buf).unwrap();
        buf = [0; 512];
        dev.read(BlockNum::new(2), &mut buf).unwrap();
        assert_eq!(buf, [7_u8; 512]);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let dev = MemoryBlockDevice::new(2, Duration::ZERO);
        let buf = [0_u8; 512];
        assert!(dev.write(BlockNum::new(5), &buf).is_err());
    }
}
