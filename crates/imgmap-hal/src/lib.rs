//! imgmap host abstraction layer.
//!
//! Everything that touches the host (loop devices, udev, lsblk, sysfs,
//! `/dev/mapper`) goes through the traits in [`hal`], so the mapper can be
//! exercised against [`FakeHal`] without root or real block devices.

pub mod error;
pub mod guards;
pub mod hal;
pub mod lsblk;
pub mod naming;
pub mod process;
pub mod sysfs;

pub use error::{HalError, HalResult};
pub use guards::LoopGuard;
pub use hal::{
    FakeHal, ImageHal, LinuxHal, LoopOps, MapperOps, Operation, ProbeOps, SystemOps,
};
