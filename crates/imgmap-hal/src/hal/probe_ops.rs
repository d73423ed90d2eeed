//! Block device probing (lsblk, node checks).

use crate::HalResult;
use std::path::Path;

pub trait ProbeOps {
    /// Raw `lsblk -ln -o NAME,TYPE <device>` output. See [`crate::lsblk`] for parsing.
    fn lsblk_name_type(&self, device: &str) -> HalResult<String>;

    /// Whether `path` currently resolves to a block device node.
    fn is_block_device(&self, path: &Path) -> bool;
}
