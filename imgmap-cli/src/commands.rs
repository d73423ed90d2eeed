use anyhow::{anyhow, Context, Result};
use imgmap_core::{Config, ImageOpener, LogUi, LoopMapper};
use imgmap_hal::naming::loop_device_of;
use imgmap_hal::{ImageHal, LoopOps};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub fn decode<H: ImageHal + ?Sized>(
    hal: &H,
    config: &Config,
    image: &Path,
    output: &Path,
) -> Result<()> {
    let ui = LogUi;
    let mut source = ImageOpener::new(hal)
        .with_ui(&ui)
        .with_config(config.decoder.clone())
        .open(image)
        .with_context(|| format!("failed to open image {}", image.display()))?;

    match source.size_estimate() {
        0 => log::info!("decoding {} ({}, size unknown)", image.display(), source.format()),
        size => log::info!("decoding {} ({}, {} bytes)", image.display(), source.format(), size),
    }

    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let written = io::copy(&mut source, &mut writer)
        .with_context(|| format!("failed to decode {}", image.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write {}", output.display()))?;
    source.close();

    log::info!("wrote {} bytes to {}", written, output.display());
    Ok(())
}

pub fn map<H: ImageHal + ?Sized>(hal: &H, config: &Config, image: &Path, keep: bool) -> Result<()> {
    let ui = LogUi;
    let mut mapper = LoopMapper::new(hal)
        .with_ui(&ui)
        .with_config(config.mapper.clone());
    let devices = mapper
        .attach(image)
        .with_context(|| format!("failed to map {}", image.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for device in &devices {
        writeln!(out, "{}", device)?;
    }
    out.flush()?;

    if keep {
        if let Some(mapping) = mapper.release() {
            log::info!(
                "leaving {} attached; run `imgmap detach {}` when done",
                mapping.loop_device(),
                mapping.loop_device()
            );
        }
    } else {
        mapper.detach();
    }
    Ok(())
}

pub fn detach<H: LoopOps + ?Sized>(hal: &H, device: &str) -> Result<()> {
    let loop_device =
        loop_device_of(device).ok_or_else(|| anyhow!("{} is not a loop device path", device))?;
    log::info!("losetup -d {}", loop_device);
    hal.losetup_detach(&loop_device)
        .with_context(|| format!("failed to detach {}", loop_device))?;
    Ok(())
}
