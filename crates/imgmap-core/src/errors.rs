use imgmap_hal::HalError;
use thiserror::Error;

/// Result type alias for imgmap operations
pub type ImgmapResult<T> = std::result::Result<T, ImgmapError>;

#[derive(Error, Debug)]
pub enum ImgmapError {
    /// An external tool failed, timed out, or printed something unusable.
    #[error(transparent)]
    Tool(#[from] HalError),

    #[error("Unsupported image format: {0}")]
    Format(String),

    /// The loop device was created but no partition table or LVM volume showed up.
    /// `cause` holds the `lsblk` failure that cut the partition scan short, if any.
    #[error(
        "No partitions or LVM volumes found on {}. GPT or LVM layout may not be detected.{}",
        .loop_device,
        caused_by(.cause)
    )]
    LayoutDetection {
        loop_device: String,
        cause: Option<String>,
    },

    #[error("Already attached to {loop_device}; detach first")]
    AlreadyAttached { loop_device: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

fn caused_by(cause: &Option<String>) -> String {
    match cause {
        Some(cause) => format!(" ({})", cause),
        None => String::new(),
    }
}
