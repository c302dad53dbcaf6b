use std::collections::HashMap;
use std::sync::Arc;

use fs_lib::BlockData;

use crate::define::fs::{ BlockNo, Dev };
use crate::error::FsError;
use crate::lock::Spinlock;

mod ramdisk;

pub use ramdisk::RamDisk;

/// A device that transfers whole 1 KiB blocks.
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block: BlockNo, data: &mut BlockData) -> Result<(), FsError>;
    fn write_block(&self, block: BlockNo, data: &BlockData) -> Result<(), FsError>;

    /// Whether the medium was swapped since the last call. Removable
    /// devices report each change once.
    fn media_changed(&self) -> bool {
        false
    }
}

/// Drivers registered under their device numbers.
pub struct DeviceTable {
    devices: Spinlock<HashMap<Dev, Arc<dyn BlockDevice>>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self {
            devices: Spinlock::new(HashMap::new(), "devices"),
        }
    }

    pub fn register(&self, dev: Dev, device: Arc<dyn BlockDevice>) {
        if self.devices.acquire().insert(dev, device).is_some() {
            log::warn!("device {:#06x} registered twice", dev);
        }
    }

    pub fn get(&self, dev: Dev) -> Option<Arc<dyn BlockDevice>> {
        self.devices.acquire().get(&dev).cloned()
    }
}
