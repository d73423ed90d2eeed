//! Helpers related to block devices in sysfs.
//!
//! `/sys/class/block/<name>` exists for whole disks and partitions alike, so the same
//! lookups work for `loop7` and `loop7p2`.

use crate::HalResult;
use std::fs;
use std::io;
use std::path::Path;

pub const SYS_CLASS_BLOCK: &str = "/sys/class/block";

/// Kernel names of the devices stacked directly on `name` (e.g. `dm-0` for an LVM
/// volume built on `loop7p2`). A device without a `holders` directory has none.
pub fn holders_in(class_block_root: &Path, name: &str) -> HalResult<Vec<String>> {
    let dir = class_block_root.join(name).join("holders");
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut holders: Vec<String> = entries
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    holders.sort();
    Ok(holders)
}

/// Device-mapper name of a `dm-N` device, read from `/sys/class/block/dm-N/dm/name`.
pub fn dm_name_in(class_block_root: &Path, kernel_name: &str) -> HalResult<Option<String>> {
    match fs::read_to_string(class_block_root.join(kernel_name).join("dm/name")) {
        Ok(name) => {
            let name = name.trim();
            Ok(if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            })
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
