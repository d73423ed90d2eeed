//! Image decoding: one readable stream over a raw, zip-wrapped or xz-compressed disk image.
//!
//! The container format is taken from the file's magic bytes, never from its name.
//! Every [`Image`] owns the resources behind it (file handles, the `xzcat` child), so
//! dropping or closing it releases them all. A failure half-way through opening drops
//! whatever was already acquired on the way out.

mod xz;
mod zipped;

use crate::config::{DecoderConfig, XzStrategy};
use crate::ui::{NoopUi, Ui};
use crate::ImgmapResult;
use imgmap_hal::{HalError, SystemOps};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

const ZIP_MAGIC: [u8; 2] = [0x50, 0x4b];
const XZ_MAGIC: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];
const SNIFF_LEN: u64 = 8;

/// Container format of an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Raw,
    Zip,
    Xz,
}

impl ImageFormat {
    /// Classify a file from its first bytes. Anything unrecognized is raw.
    pub fn detect(header: &[u8]) -> Self {
        if header.starts_with(&XZ_MAGIC) {
            return ImageFormat::Xz;
        }
        // Local file header, empty archive (end of central directory) or spanned marker.
        if header.len() >= 4
            && header.starts_with(&ZIP_MAGIC)
            && matches!(header[2], 0x03 | 0x05 | 0x07)
            && matches!(header[3], 0x04 | 0x06 | 0x08)
        {
            return ImageFormat::Zip;
        }
        ImageFormat::Raw
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Raw => write!(f, "raw"),
            ImageFormat::Zip => write!(f, "zip"),
            ImageFormat::Xz => write!(f, "xz"),
        }
    }
}

/// Decoded image content.
pub struct Image {
    reader: Box<dyn Read + Send>,
    size_estimate: u64,
    format: ImageFormat,
}

impl Image {
    fn new(reader: Box<dyn Read + Send>, size_estimate: u64, format: ImageFormat) -> Self {
        Self {
            reader,
            size_estimate,
            format,
        }
    }

    /// Decoded size in bytes, or `0` when it cannot be known up front (xz).
    pub fn size_estimate(&self) -> u64 {
        self.size_estimate
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Release the stream and everything it owns. Equivalent to dropping it.
    pub fn close(self) {
        drop(self);
    }
}

impl Read for Image {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.format)
            .field("size_estimate", &self.size_estimate)
            .finish_non_exhaustive()
    }
}

/// Opens image files. `hal` is only consulted to probe for `xzcat`.
pub struct ImageOpener<'a, H: SystemOps + ?Sized> {
    hal: &'a H,
    ui: &'a dyn Ui,
    config: DecoderConfig,
}

impl<'a, H: SystemOps + ?Sized> ImageOpener<'a, H> {
    pub fn new(hal: &'a H) -> Self {
        Self {
            hal,
            ui: &NoopUi,
            config: DecoderConfig::default(),
        }
    }

    pub fn with_ui(mut self, ui: &'a dyn Ui) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn open(&self, path: &Path) -> ImgmapResult<Image> {
        let mut file = File::open(path)?;
        let format = sniff(&mut file)?;
        log::debug!("{} detected as {}", path.display(), format);

        match format {
            ImageFormat::Zip => {
                self.ui.say("Image is a zip file.");
                zipped::open(file, self.ui)
            }
            ImageFormat::Xz => {
                self.ui.say("Image is a xz file.");
                self.open_xz(file)
            }
            ImageFormat::Raw => open_raw(file),
        }
    }

    fn open_xz(&self, file: File) -> ImgmapResult<Image> {
        let xzcat = self.config.xzcat.as_str();
        let reap_timeout = self.config.reap_timeout();
        let file = match self.config.xz {
            XzStrategy::InProcess => file,
            XzStrategy::External => {
                if !self.hal.tool_available(xzcat) {
                    return Err(HalError::CommandNotFound(xzcat.to_string()).into());
                }
                let stream = xz::XzcatStream::spawn(xzcat, &file, reap_timeout)?;
                return Ok(Image::new(Box::new(stream), 0, ImageFormat::Xz));
            }
            XzStrategy::Auto => {
                if self.hal.tool_available(xzcat) {
                    match xz::XzcatStream::spawn(xzcat, &file, reap_timeout) {
                        Ok(stream) => return Ok(Image::new(Box::new(stream), 0, ImageFormat::Xz)),
                        Err(err) => {
                            log::warn!("{} failed to start, decoding in-process: {}", xzcat, err)
                        }
                    }
                }
                file
            }
        };
        log::debug!("decoding xz in-process");
        Ok(Image::new(
            Box::new(xz::in_process(file)),
            0,
            ImageFormat::Xz,
        ))
    }
}

/// Read the magic bytes and rewind.
fn sniff(file: &mut File) -> io::Result<ImageFormat> {
    let mut header = Vec::with_capacity(SNIFF_LEN as usize);
    file.by_ref().take(SNIFF_LEN).read_to_end(&mut header)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(ImageFormat::detect(&header))
}

fn open_raw(file: File) -> ImgmapResult<Image> {
    let size = file.metadata()?.len();
    Ok(Image::new(Box::new(file), size, ImageFormat::Raw))
}
