//! Block device drivers.

pub mod block;

pub use block::{ BlockDevice, DeviceTable, RamDisk };
