//! Discovery of device-mapper volumes built on a loop device.
//!
//! The primary source is the sysfs holder chain: every `dm-N` stacked on the loop device
//! or one of its partitions (directly or through other dm devices) is resolved to its
//! `/dev/mapper` name. Entries named after the loop device (kpartx) and entries matching
//! a configured name hint are included as well.

use crate::config::MapperConfig;
use imgmap_hal::naming::named_after_loop;
use imgmap_hal::MapperOps;
use std::collections::{BTreeSet, HashSet, VecDeque};

const CONTROL_NODE: &str = "control";

/// Device-mapper names stacked on any of `roots`, following holders transitively.
pub fn holder_names<H: MapperOps + ?Sized>(hal: &H, roots: &[String]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut seen: HashSet<String> = roots.iter().cloned().collect();
    let mut queue: VecDeque<String> = roots.iter().cloned().collect();

    while let Some(device) = queue.pop_front() {
        let holders = match hal.dm_holders(&device) {
            Ok(holders) => holders,
            Err(err) => {
                log::debug!("cannot read holders of {}: {}", device, err);
                continue;
            }
        };
        for holder in holders {
            if !seen.insert(holder.clone()) {
                continue;
            }
            match hal.dm_name(&holder) {
                Ok(Some(name)) => {
                    log::debug!("{} holds {} ({})", holder, device, name);
                    names.insert(name);
                }
                Ok(None) => {}
                Err(err) => log::debug!("cannot read dm name of {}: {}", holder, err),
            }
            queue.push_back(holder);
        }
    }
    names
}

/// `/dev/mapper` paths of the volumes belonging to `loop_name`, in directory order.
///
/// `partitions` are the kernel names of the loop device's partitions. A missing or
/// unreadable mapper directory yields no volumes.
pub fn discover_volumes<H: MapperOps + ?Sized>(
    hal: &H,
    config: &MapperConfig,
    loop_name: &str,
    partitions: &[String],
) -> Vec<String> {
    let entries = match hal.mapper_entries(&config.mapper_dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!(
                "no device-mapper entries in {}: {}",
                config.mapper_dir.display(),
                err
            );
            return Vec::new();
        }
    };

    let mut roots = vec![loop_name.to_string()];
    roots.extend(partitions.iter().cloned());
    let held = holder_names(hal, &roots);

    entries
        .into_iter()
        .filter(|name| name != CONTROL_NODE)
        .filter(|name| {
            held.contains(name)
                || named_after_loop(name, loop_name)
                || config
                    .volume_name_hints
                    .iter()
                    .any(|hint| !hint.is_empty() && name.contains(hint.as_str()))
        })
        .map(|name| config.mapper_dir.join(name).display().to_string())
        .collect()
}
