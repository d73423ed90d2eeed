//! Device-mapper namespace queries.

use crate::HalResult;
use std::path::Path;

pub trait MapperOps {
    /// Entry names in the device-mapper directory (normally `/dev/mapper`).
    fn mapper_entries(&self, mapper_dir: &Path) -> HalResult<Vec<String>>;

    /// Kernel names (`dm-N`) of the devices holding the block device `name`.
    fn dm_holders(&self, name: &str) -> HalResult<Vec<String>>;

    /// Device-mapper name of the kernel device `dm-N`, if it has one.
    fn dm_name(&self, kernel_name: &str) -> HalResult<Option<String>>;
}
