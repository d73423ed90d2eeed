//! Single-entry zip images.
//!
//! The entry is streamed straight from the archive file: the central directory gives the
//! data offset, compression method and CRC, and the returned reader owns the file.

use super::{Image, ImageFormat};
use crate::ui::Ui;
use crate::{ImgmapError, ImgmapResult};
use flate2::read::DeflateDecoder;
use flate2::CrcReader;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

struct EntryInfo {
    name: String,
    method: CompressionMethod,
    data_start: u64,
    compressed_size: u64,
    size: u64,
    crc32: u32,
}

fn zip_err(err: ZipError) -> ImgmapError {
    match err {
        ZipError::Io(err) => ImgmapError::Io(err),
        other => ImgmapError::Format(format!("invalid zip archive: {}", other)),
    }
}

fn single_entry(file: &mut File) -> ImgmapResult<EntryInfo> {
    let mut archive = ZipArchive::new(file).map_err(zip_err)?;
    if archive.len() != 1 {
        return Err(ImgmapError::Format(format!(
            "exactly one file supported in a zip image, found {}",
            archive.len()
        )));
    }
    let entry = archive.by_index(0).map_err(zip_err)?;
    if entry.is_dir() {
        return Err(ImgmapError::Format(format!(
            "zip entry {} is a directory",
            entry.name()
        )));
    }
    Ok(EntryInfo {
        name: entry.name().to_string(),
        method: entry.compression(),
        data_start: entry.data_start(),
        compressed_size: entry.compressed_size(),
        size: entry.size(),
        crc32: entry.crc32(),
    })
}

pub(super) fn open(mut file: File, ui: &dyn Ui) -> ImgmapResult<Image> {
    let entry = single_entry(&mut file)?;
    ui.say(&format!("Unzipping {}", entry.name));

    file.seek(SeekFrom::Start(entry.data_start))?;
    let raw = file.take(entry.compressed_size);
    let decoded: Box<dyn Read + Send> = match entry.method {
        CompressionMethod::Stored => Box::new(raw),
        CompressionMethod::Deflated => Box::new(DeflateDecoder::new(raw)),
        other => {
            return Err(ImgmapError::Format(format!(
                "unsupported compression {:?} for zip entry {}",
                other, entry.name
            )))
        }
    };

    let reader = CheckedEntry {
        inner: CrcReader::new(decoded),
        expected_crc: entry.crc32,
        name: entry.name,
        verified: false,
    };
    Ok(Image::new(Box::new(reader), entry.size, ImageFormat::Zip))
}

/// Verifies the entry's CRC-32 once the decoded stream is exhausted.
struct CheckedEntry<R> {
    inner: CrcReader<R>,
    expected_crc: u32,
    name: String,
    verified: bool,
}

impl<R: Read> Read for CheckedEntry<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() && !self.verified {
            self.verified = true;
            let actual = self.inner.crc().sum();
            if actual != self.expected_crc {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "crc32 mismatch in zip entry {}: expected {:08x}, got {:08x}",
                        self.name, self.expected_crc, actual
                    ),
                ));
            }
        }
        Ok(n)
    }
}
