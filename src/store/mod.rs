//! Holdings store backends.

pub mod disk;
pub mod memory;

pub use disk::DiskHoldingsStore;
pub use memory::MemoryHoldingsStore;
