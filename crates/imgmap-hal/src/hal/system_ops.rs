//! System-level operations (udev settle, tool discovery).

use crate::HalResult;

pub trait SystemOps {
    /// Wait for queued udev events to be handled. Advisory: callers ignore failures.
    fn udev_settle(&self) -> HalResult<()>;

    /// Whether `program` resolves on `PATH` (`which <program>`).
    fn tool_available(&self, program: &str) -> bool;
}
