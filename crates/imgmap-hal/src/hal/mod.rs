//! HAL trait definitions and implementations.
//!
//! This module defines the traits for every host operation the mapper performs and
//! provides both the real (LinuxHal) and fake (FakeHal) implementations.

pub mod fake_hal;
pub mod linux_hal;
pub mod loop_ops;
pub mod mapper_ops;
pub mod probe_ops;
pub mod system_ops;

pub use fake_hal::{FakeHal, Operation};
pub use linux_hal::LinuxHal;
pub use loop_ops::LoopOps;
pub use mapper_ops::MapperOps;
pub use probe_ops::ProbeOps;
pub use system_ops::SystemOps;

/// Complete HAL for attaching and enumerating disk images.
pub trait ImageHal: LoopOps + SystemOps + ProbeOps + MapperOps + Send + Sync {}

/// Automatically implement ImageHal for any type implementing all required traits.
impl<T> ImageHal for T where T: LoopOps + SystemOps + ProbeOps + MapperOps + Send + Sync {}
