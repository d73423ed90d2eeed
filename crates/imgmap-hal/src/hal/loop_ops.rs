//! Loop device operations (losetup).

use crate::HalResult;
use std::path::Path;

pub trait LoopOps {
    /// Attach `image` to the first free loop device, returning its path (e.g. `/dev/loop7`).
    ///
    /// If `scan_partitions` is true, the loop device is created with partition scanning
    /// (`losetup -P`), so the kernel exposes `/dev/loop7p1`, `/dev/loop7p2`, ...
    fn losetup_attach(&self, image: &Path, scan_partitions: bool) -> HalResult<String>;

    /// Detach a loop device.
    fn losetup_detach(&self, loop_device: &str) -> HalResult<()>;
}
