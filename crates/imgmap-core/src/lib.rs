//! imgmap core library.
//!
//! Two independent building blocks for image-build pipelines:
//!
//! * [`image`] opens a disk image stored raw, zip-wrapped or xz-compressed and exposes
//!   the decoded bytes as one stream with a size estimate.
//! * [`mapper`] attaches a raw image to a loop device and returns its partitions and
//!   LVM volumes as an ordered list of block-device paths.

pub mod config;
pub mod errors;
pub mod image;
pub mod logging;
pub mod mapper;
pub mod ui;

pub use config::{Config, DecoderConfig, MapperConfig, XzStrategy};
pub use errors::{ImgmapError, ImgmapResult};
pub use image::{Image, ImageFormat, ImageOpener};
pub use mapper::{LoopMapper, MappingResult};
pub use ui::{LogUi, NoopUi, Ui};
