//! Fake HAL implementation for testing.
//!
//! Responses are scripted up front and every operation is recorded, so attach/detach
//! flows can be tested in CI without root privileges or real loop devices.

use super::{LoopOps, MapperOps, ProbeOps, SystemOps};
use crate::{HalError, HalResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    LosetupAttach {
        image: PathBuf,
        scan_partitions: bool,
        loop_device: String,
    },
    LosetupDetach {
        loop_device: String,
    },
    UdevSettle,
    ToolProbe {
        program: String,
    },
    Lsblk {
        device: String,
    },
    MapperList {
        dir: PathBuf,
    },
}

#[derive(Debug, Clone)]
struct FakeHalState {
    operations: Vec<Operation>,
    loop_device: String,
    attach_failure: Option<String>,
    detach_failure: Option<String>,
    settle_failure: bool,
    /// Consumed one per `lsblk` call; an exhausted queue reports no partitions.
    lsblk_outputs: VecDeque<String>,
    lsblk_failure: Option<String>,
    /// `None` models a host without a device-mapper directory.
    mapper_entries: Option<Vec<String>>,
    holders: HashMap<String, Vec<String>>,
    dm_names: HashMap<String, String>,
    not_block: HashSet<PathBuf>,
    /// Remaining `is_block_device` checks that still report the node as absent.
    late_nodes: HashMap<PathBuf, usize>,
    tools: HashSet<String>,
    attached: Vec<String>,
}

impl Default for FakeHalState {
    fn default() -> Self {
        Self {
            operations: Vec::new(),
            loop_device: "/dev/loop0".to_string(),
            attach_failure: None,
            detach_failure: None,
            settle_failure: false,
            lsblk_outputs: VecDeque::new(),
            lsblk_failure: None,
            mapper_entries: Some(Vec::new()),
            holders: HashMap::new(),
            dm_names: HashMap::new(),
            not_block: HashSet::new(),
            late_nodes: HashMap::new(),
            tools: HashSet::new(),
            attached: Vec::new(),
        }
    }
}

/// Fake HAL implementation that records operations without executing them.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

fn failed(command: &str, output: &str) -> HalError {
    HalError::CommandFailed {
        command: command.to_string(),
        code: Some(1),
        output: output.to_string(),
    }
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loop device path handed out by `losetup_attach`.
    pub fn with_loop_device(self, loop_device: &str) -> Self {
        self.state.lock().unwrap().loop_device = loop_device.to_string();
        self
    }

    /// Make `losetup_attach` fail with the given tool output.
    pub fn with_attach_failure(self, output: &str) -> Self {
        self.state.lock().unwrap().attach_failure = Some(output.to_string());
        self
    }

    /// Make `losetup_detach` fail with the given tool output.
    pub fn with_detach_failure(self, output: &str) -> Self {
        self.state.lock().unwrap().detach_failure = Some(output.to_string());
        self
    }

    pub fn with_settle_failure(self) -> Self {
        self.state.lock().unwrap().settle_failure = true;
        self
    }

    /// Queue one `lsblk -ln -o NAME,TYPE` response.
    pub fn with_lsblk_output(self, output: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .lsblk_outputs
            .push_back(output.to_string());
        self
    }

    pub fn with_lsblk_failure(self, output: &str) -> Self {
        self.state.lock().unwrap().lsblk_failure = Some(output.to_string());
        self
    }

    pub fn with_mapper_entries(self, entries: &[&str]) -> Self {
        self.state.lock().unwrap().mapper_entries =
            Some(entries.iter().map(|e| e.to_string()).collect());
        self
    }

    pub fn without_mapper_dir(self) -> Self {
        self.state.lock().unwrap().mapper_entries = None;
        self
    }

    /// Record `holder` (a `dm-N` kernel name) as stacked on block device `name`.
    pub fn with_holder(self, name: &str, holder: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .holders
            .entry(name.to_string())
            .or_default()
            .push(holder.to_string());
        self
    }

    pub fn with_dm_name(self, kernel_name: &str, dm_name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .dm_names
            .insert(kernel_name.to_string(), dm_name.to_string());
        self
    }

    /// Every path is a block device unless marked here.
    pub fn with_missing_node(self, path: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .not_block
            .insert(PathBuf::from(path));
        self
    }

    /// The node at `path` only shows up after `checks` queries, like a partition node
    /// udev has not created yet.
    pub fn with_late_node(self, path: &str, checks: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .late_nodes
            .insert(PathBuf::from(path), checks);
        self
    }

    pub fn with_tool(self, program: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .tools
            .insert(program.to_string());
        self
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Number of `losetup -d` calls, successful or not.
    pub fn detach_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| matches!(op, Operation::LosetupDetach { .. }))
            .count()
    }

    /// Number of `lsblk` calls.
    pub fn lsblk_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| matches!(op, Operation::Lsblk { .. }))
            .count()
    }

    /// Loop devices currently attached (the fake's `losetup -a`).
    pub fn attached_loops(&self) -> Vec<String> {
        self.state.lock().unwrap().attached.clone()
    }

    fn record_operation(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }
}

impl LoopOps for FakeHal {
    fn losetup_attach(&self, image: &Path, scan_partitions: bool) -> HalResult<String> {
        let mut state = self.state.lock().unwrap();
        let loop_device = state.loop_device.clone();
        state.operations.push(Operation::LosetupAttach {
            image: image.to_path_buf(),
            scan_partitions,
            loop_device: loop_device.clone(),
        });
        if let Some(output) = &state.attach_failure {
            return Err(failed(
                &format!("losetup --show -f -P {}", image.display()),
                output,
            ));
        }
        log::info!("FAKE HAL: losetup {} -> {}", image.display(), loop_device);
        state.attached.push(loop_device.clone());
        Ok(loop_device)
    }

    fn losetup_detach(&self, loop_device: &str) -> HalResult<()> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::LosetupDetach {
            loop_device: loop_device.to_string(),
        });
        let command = format!("losetup -d {}", loop_device);
        if let Some(output) = &state.detach_failure {
            return Err(failed(&command, output));
        }
        let before = state.attached.len();
        state.attached.retain(|d| d != loop_device);
        if state.attached.len() == before {
            return Err(failed(&command, "No such device or address"));
        }
        Ok(())
    }
}

impl SystemOps for FakeHal {
    fn udev_settle(&self) -> HalResult<()> {
        self.record_operation(Operation::UdevSettle);
        if self.state.lock().unwrap().settle_failure {
            return Err(failed("udevadm settle", "timeout"));
        }
        Ok(())
    }

    fn tool_available(&self, program: &str) -> bool {
        self.record_operation(Operation::ToolProbe {
            program: program.to_string(),
        });
        self.state.lock().unwrap().tools.contains(program)
    }
}

impl ProbeOps for FakeHal {
    fn lsblk_name_type(&self, device: &str) -> HalResult<String> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::Lsblk {
            device: device.to_string(),
        });
        if let Some(output) = &state.lsblk_failure {
            return Err(failed(
                &format!("lsblk -ln -o NAME,TYPE {}", device),
                output,
            ));
        }
        Ok(state.lsblk_outputs.pop_front().unwrap_or_default())
    }

    fn is_block_device(&self, path: &Path) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.not_block.contains(path) {
            return false;
        }
        match state.late_nodes.get_mut(path) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                false
            }
            _ => true,
        }
    }
}

impl MapperOps for FakeHal {
    fn mapper_entries(&self, mapper_dir: &Path) -> HalResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.operations.push(Operation::MapperList {
            dir: mapper_dir.to_path_buf(),
        });
        match &state.mapper_entries {
            Some(entries) => Ok(entries.clone()),
            None => Err(HalError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", mapper_dir.display()),
            ))),
        }
    }

    fn dm_holders(&self, name: &str) -> HalResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .holders
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    fn dm_name(&self, kernel_name: &str) -> HalResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .dm_names
            .get(kernel_name)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_hal_records_attach_and_detach() {
        let hal = FakeHal::new().with_loop_device("/dev/loop7");

        let loop_dev = hal
            .losetup_attach(Path::new("/tmp/image.img"), true)
            .unwrap();
        assert_eq!(loop_dev, "/dev/loop7");
        assert_eq!(hal.attached_loops(), vec!["/dev/loop7"]);

        hal.losetup_detach(&loop_dev).unwrap();

        assert_eq!(hal.operation_count(), 2);
        assert!(hal.attached_loops().is_empty());
        assert!(hal.has_operation(|op| matches!(
            op,
            Operation::LosetupAttach {
                scan_partitions: true,
                ..
            }
        )));
    }

    #[test]
    fn fake_hal_detach_of_unknown_device_fails() {
        let hal = FakeHal::new();
        let err = hal.losetup_detach("/dev/loop9").unwrap_err();
        assert!(matches!(err, HalError::CommandFailed { .. }));
        assert_eq!(hal.detach_count(), 1);
    }

    #[test]
    fn fake_hal_attach_failure_attaches_nothing() {
        let hal = FakeHal::new().with_attach_failure("failed to set up loop device");
        let err = hal
            .losetup_attach(Path::new("/tmp/image.img"), true)
            .unwrap_err();
        assert!(err.to_string().contains("failed to set up loop device"));
        assert!(hal.attached_loops().is_empty());
    }

    #[test]
    fn fake_hal_lsblk_outputs_are_consumed_in_order() {
        let hal = FakeHal::new()
            .with_lsblk_output("loop0 loop\n")
            .with_lsblk_output("loop0 loop\nloop0p1 part\n");

        assert_eq!(hal.lsblk_name_type("/dev/loop0").unwrap(), "loop0 loop\n");
        assert!(hal.lsblk_name_type("/dev/loop0").unwrap().contains("loop0p1"));
        assert_eq!(hal.lsblk_name_type("/dev/loop0").unwrap(), "");
        assert_eq!(hal.lsblk_count(), 3);
    }

    #[test]
    fn fake_hal_missing_mapper_dir_is_io_error() {
        let hal = FakeHal::new().without_mapper_dir();
        let err = hal.mapper_entries(Path::new("/dev/mapper")).unwrap_err();
        assert!(matches!(err, HalError::Io(_)));
    }

    #[test]
    fn fake_hal_late_node_appears_after_checks() {
        let hal = FakeHal::new().with_late_node("/dev/loop0p2", 2);
        let node = Path::new("/dev/loop0p2");

        assert!(!hal.is_block_device(node));
        assert!(!hal.is_block_device(node));
        assert!(hal.is_block_device(node));
        assert!(hal.is_block_device(Path::new("/dev/loop0p1")));
    }
}
