//! Linux HAL implementation driving the real host tools.

use super::{LoopOps, MapperOps, ProbeOps, SystemOps};
use crate::process::{checked_output, output_with_timeout};
use crate::sysfs::block::{dm_name_in, holders_in, SYS_CLASS_BLOCK};
use crate::{HalError, HalResult};
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Real HAL implementation for Linux systems.
#[derive(Debug, Clone)]
pub struct LinuxHal {
    sys_class_block: PathBuf,
}

impl Default for LinuxHal {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxHal {
    pub fn new() -> Self {
        Self {
            sys_class_block: PathBuf::from(SYS_CLASS_BLOCK),
        }
    }

    /// Use an alternate sysfs block class directory (tests, containers).
    pub fn with_sys_class_block(root: impl Into<PathBuf>) -> Self {
        Self {
            sys_class_block: root.into(),
        }
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);
const LOSETUP_TIMEOUT: Duration = Duration::from_secs(30);

impl LoopOps for LinuxHal {
    fn losetup_attach(&self, image: &Path, scan_partitions: bool) -> HalResult<String> {
        let image = image.display().to_string();
        let mut args = vec!["--show", "-f"];
        if scan_partitions {
            args.push("-P");
        }
        args.push(&image);

        let output = checked_output("losetup", &args, LOSETUP_TIMEOUT)?;
        let loop_device = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if loop_device.is_empty() {
            return Err(HalError::Parse(format!(
                "losetup printed no loop device for {}",
                image
            )));
        }
        Ok(loop_device)
    }

    fn losetup_detach(&self, loop_device: &str) -> HalResult<()> {
        checked_output("losetup", &["-d", loop_device], LOSETUP_TIMEOUT)?;
        Ok(())
    }
}

impl SystemOps for LinuxHal {
    fn udev_settle(&self) -> HalResult<()> {
        checked_output("udevadm", &["settle"], SETTLE_TIMEOUT)?;
        Ok(())
    }

    fn tool_available(&self, program: &str) -> bool {
        match output_with_timeout("which", &[program], PROBE_TIMEOUT) {
            Ok(output) => output.status.success(),
            Err(err) => {
                log::debug!("which {} failed: {}", program, err);
                false
            }
        }
    }
}

impl ProbeOps for LinuxHal {
    fn lsblk_name_type(&self, device: &str) -> HalResult<String> {
        let output = checked_output("lsblk", &["-ln", "-o", "NAME,TYPE", device], PROBE_TIMEOUT)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn is_block_device(&self, path: &Path) -> bool {
        fs::metadata(path)
            .map(|meta| meta.file_type().is_block_device())
            .unwrap_or(false)
    }
}

impl MapperOps for LinuxHal {
    fn mapper_entries(&self, mapper_dir: &Path) -> HalResult<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(mapper_dir)?
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn dm_holders(&self, name: &str) -> HalResult<Vec<String>> {
        holders_in(&self.sys_class_block, name)
    }

    fn dm_name(&self, kernel_name: &str) -> HalResult<Option<String>> {
        dm_name_in(&self.sys_class_block, kernel_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn regular_file_is_not_a_block_device() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("disk.img");
        fs::write(&file, b"not a device").unwrap();

        let hal = LinuxHal::new();
        assert!(!hal.is_block_device(&file));
        assert!(!hal.is_block_device(&dir.path().join("missing")));
    }

    #[test]
    fn mapper_entries_lists_directory_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("vg0-swap"), b"").unwrap();
        fs::write(dir.path().join("control"), b"").unwrap();
        fs::write(dir.path().join("vg0-root"), b"").unwrap();

        let hal = LinuxHal::new();
        assert_eq!(
            hal.mapper_entries(dir.path()).unwrap(),
            vec!["control", "vg0-root", "vg0-swap"]
        );
    }

    #[test]
    fn mapper_entries_missing_dir_is_io_error() {
        let dir = tempdir().unwrap();
        let hal = LinuxHal::new();
        let err = hal.mapper_entries(&dir.path().join("mapper")).unwrap_err();
        assert!(matches!(err, HalError::Io(_)));
    }

    #[test]
    fn dm_lookups_use_configured_sysfs_root() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("loop3p1/holders/dm-2")).unwrap();
        fs::create_dir_all(dir.path().join("dm-2/dm")).unwrap();
        fs::write(dir.path().join("dm-2/dm/name"), "data-lv\n").unwrap();

        let hal = LinuxHal::with_sys_class_block(dir.path());
        assert_eq!(hal.dm_holders("loop3p1").unwrap(), vec!["dm-2"]);
        assert_eq!(hal.dm_name("dm-2").unwrap().as_deref(), Some("data-lv"));
    }

    #[test]
    fn tool_available_rejects_unknown_program() {
        let hal = LinuxHal::new();
        assert!(!hal.tool_available("imgmap-no-such-tool"));
    }
}
