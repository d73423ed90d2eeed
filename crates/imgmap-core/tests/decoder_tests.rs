use imgmap_core::{DecoderConfig, ImageFormat, ImageOpener, ImgmapError, Ui, XzStrategy};
use imgmap_hal::{FakeHal, HalError, LinuxHal, Operation, SystemOps};
use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Default)]
struct Transcript(RefCell<Vec<String>>);

impl Ui for Transcript {
    fn say(&self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
    fn message(&self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
    fn error(&self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }
    fn ask(&self, _query: &str) -> Option<String> {
        None
    }
}

fn disk_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 253) as u8).collect()
}

fn write_zip(dir: &TempDir, entries: &[(&str, &[u8])], method: CompressionMethod) -> PathBuf {
    let path = dir.path().join("image.zip");
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    let options = FileOptions::default().compression_method(method);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn write_xz(dir: &TempDir, data: &[u8]) -> PathBuf {
    let path = dir.path().join("image.img.xz");
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

fn read_all(opener: &ImageOpener<'_, impl SystemOps>, path: &Path) -> (Vec<u8>, u64) {
    let mut image = opener.open(path).unwrap();
    let estimate = image.size_estimate();
    let mut out = Vec::new();
    image.read_to_end(&mut out).unwrap();
    image.close();
    (out, estimate)
}

fn xzcat_installed() -> bool {
    LinuxHal::new().tool_available("xzcat")
}

#[test]
fn raw_image_size_estimate_is_file_length() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("disk.img");
    let data = disk_bytes(12_345);
    fs::write(&path, &data).unwrap();

    let hal = FakeHal::new();
    let opener = ImageOpener::new(&hal);
    let image = opener.open(&path).unwrap();
    assert_eq!(image.format(), ImageFormat::Raw);
    assert_eq!(image.size_estimate(), 12_345);

    let (out, _) = read_all(&opener, &path);
    assert_eq!(out, data);
}

#[test]
fn empty_file_is_a_raw_image_of_size_zero() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.img");
    fs::write(&path, b"").unwrap();

    let hal = FakeHal::new();
    let (out, estimate) = read_all(&ImageOpener::new(&hal), &path);
    assert!(out.is_empty());
    assert_eq!(estimate, 0);
}

#[test]
fn format_is_detected_from_content_not_name() {
    let dir = tempdir().unwrap();
    let data = disk_bytes(4096);
    let zip_path = write_zip(&dir, &[("disk.img", &data[..])], CompressionMethod::Stored);
    let disguised = dir.path().join("disk.img");
    fs::rename(&zip_path, &disguised).unwrap();

    let hal = FakeHal::new();
    let image = ImageOpener::new(&hal).open(&disguised).unwrap();
    assert_eq!(image.format(), ImageFormat::Zip);
    assert_eq!(image.size_estimate(), 4096);
}

#[test]
fn zip_with_one_stored_entry_streams_it() {
    let dir = tempdir().unwrap();
    let data = disk_bytes(70_000);
    let path = write_zip(&dir, &[("disk.img", &data[..])], CompressionMethod::Stored);

    let hal = FakeHal::new();
    let ui = Transcript::default();
    let (out, estimate) = read_all(&ImageOpener::new(&hal).with_ui(&ui), &path);

    assert_eq!(estimate, 70_000);
    assert_eq!(out, data);
    let lines = ui.0.borrow();
    assert!(lines.contains(&"Image is a zip file.".to_string()));
    assert!(lines.contains(&"Unzipping disk.img".to_string()));
}

#[test]
fn zip_with_one_deflated_entry_streams_it() {
    let dir = tempdir().unwrap();
    let data = disk_bytes(250_000);
    let path = write_zip(&dir, &[("disk.img", &data[..])], CompressionMethod::Deflated);
    assert!(fs::metadata(&path).unwrap().len() < 250_000);

    let hal = FakeHal::new();
    let (out, estimate) = read_all(&ImageOpener::new(&hal), &path);
    assert_eq!(estimate, 250_000);
    assert_eq!(out, data);
}

#[test]
fn zip_without_entries_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = write_zip(&dir, &[], CompressionMethod::Stored);

    let hal = FakeHal::new();
    let err = ImageOpener::new(&hal).open(&path).unwrap_err();
    assert!(matches!(err, ImgmapError::Format(ref msg) if msg.contains("exactly one file")));
}

#[test]
fn zip_with_two_entries_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = write_zip(
        &dir,
        &[("a.img", &b"first"[..]), ("b.img", &b"second"[..])],
        CompressionMethod::Stored,
    );

    let hal = FakeHal::new();
    let err = ImageOpener::new(&hal).open(&path).unwrap_err();
    assert!(matches!(err, ImgmapError::Format(ref msg) if msg.contains("found 2")));
}

#[test]
fn truncated_zip_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.zip");
    fs::write(&path, b"PK\x03\x04 this is not really a zip archive").unwrap();

    let hal = FakeHal::new();
    let err = ImageOpener::new(&hal).open(&path).unwrap_err();
    assert!(matches!(err, ImgmapError::Format(_)));
}

#[test]
fn missing_file_propagates_io_error() {
    let dir = tempdir().unwrap();
    let hal = FakeHal::new();
    let err = ImageOpener::new(&hal)
        .open(&dir.path().join("nope.img"))
        .unwrap_err();
    assert!(matches!(err, ImgmapError::Io(ref e) if e.kind() == std::io::ErrorKind::NotFound));
}

#[test]
fn xz_without_xzcat_decodes_in_process() {
    let dir = tempdir().unwrap();
    let data = disk_bytes(300_000);
    let path = write_xz(&dir, &data);

    let hal = FakeHal::new();
    let (out, estimate) = read_all(&ImageOpener::new(&hal), &path);

    assert_eq!(estimate, 0);
    assert_eq!(out, data);
    assert!(hal.has_operation(|op| matches!(
        op,
        Operation::ToolProbe { program } if program == "xzcat"
    )));
}

#[test]
fn in_process_strategy_skips_the_probe() {
    let dir = tempdir().unwrap();
    let path = write_xz(&dir, b"hello");

    let hal = FakeHal::new().with_tool("xzcat");
    let config = DecoderConfig {
        xz: XzStrategy::InProcess,
        ..DecoderConfig::default()
    };
    let (out, _) = read_all(&ImageOpener::new(&hal).with_config(config), &path);

    assert_eq!(out, b"hello");
    assert_eq!(hal.operation_count(), 0);
}

#[test]
fn external_strategy_requires_xzcat() {
    let dir = tempdir().unwrap();
    let path = write_xz(&dir, b"hello");

    let hal = FakeHal::new();
    let config = DecoderConfig {
        xz: XzStrategy::External,
        ..DecoderConfig::default()
    };
    let err = ImageOpener::new(&hal)
        .with_config(config)
        .open(&path)
        .unwrap_err();
    assert!(matches!(
        err,
        ImgmapError::Tool(HalError::CommandNotFound(ref p)) if p == "xzcat"
    ));
}

#[test]
fn xzcat_and_in_process_decode_identically() {
    if !xzcat_installed() {
        eprintln!("skipping: xzcat not installed");
        return;
    }
    let dir = tempdir().unwrap();
    let data = disk_bytes(1_000_000);
    let path = write_xz(&dir, &data);
    let hal = FakeHal::new().with_tool("xzcat");

    let external = DecoderConfig {
        xz: XzStrategy::External,
        ..DecoderConfig::default()
    };
    let in_process = DecoderConfig {
        xz: XzStrategy::InProcess,
        ..DecoderConfig::default()
    };
    let (fast, fast_estimate) = read_all(&ImageOpener::new(&hal).with_config(external), &path);
    let (slow, slow_estimate) = read_all(&ImageOpener::new(&hal).with_config(in_process), &path);

    assert_eq!(fast_estimate, 0);
    assert_eq!(slow_estimate, 0);
    assert_eq!(fast, slow);
    assert_eq!(fast, data);
}

#[test]
fn abandoning_an_xzcat_stream_does_not_block() {
    if !xzcat_installed() {
        eprintln!("skipping: xzcat not installed");
        return;
    }
    let dir = tempdir().unwrap();
    let path = write_xz(&dir, &disk_bytes(4_000_000));
    let hal = FakeHal::new().with_tool("xzcat");

    let mut image = ImageOpener::new(&hal).open(&path).unwrap();
    let mut head = [0u8; 16];
    image.read_exact(&mut head).unwrap();
    assert_eq!(head.to_vec(), disk_bytes(16));

    let started = std::time::Instant::now();
    drop(image);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn corrupt_xz_fails_on_both_paths() {
    let dir = tempdir().unwrap();
    let path = write_xz(&dir, &disk_bytes(100_000));
    let mut bytes = fs::read(&path).unwrap();
    let middle = bytes.len() / 2;
    bytes.truncate(middle);
    fs::write(&path, &bytes).unwrap();

    let mut strategies = vec![XzStrategy::InProcess];
    if xzcat_installed() {
        strategies.push(XzStrategy::External);
    }
    let hal = FakeHal::new().with_tool("xzcat");
    for xz in strategies {
        let config = DecoderConfig {
            xz,
            ..DecoderConfig::default()
        };
        let mut image = ImageOpener::new(&hal).with_config(config).open(&path).unwrap();
        let mut out = Vec::new();
        assert!(image.read_to_end(&mut out).is_err(), "{:?} accepted truncated input", xz);
    }
}
