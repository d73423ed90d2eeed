//! Deterministic ordering of mapped devices.

use imgmap_hal::naming::partition_index;
use std::cmp::Ordering;

/// Sort partitions of `loop_name` by numeric index, followed by every other device
/// (LVM volumes) in lexicographic order. The sort is stable.
pub fn sort_devices(devices: &mut [String], loop_name: &str) {
    devices.sort_by(|a, b| {
        match (partition_index(a, loop_name), partition_index(b, loop_name)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    });
}
