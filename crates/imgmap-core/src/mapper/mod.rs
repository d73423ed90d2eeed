//! Loopback partition mapping.
//!
//! [`LoopMapper::attach`] binds a raw image to the first free loop device with
//! partition scanning, waits for the kernel to publish the partitions, adds LVM volumes
//! stacked on them and returns the device paths in a stable order. The loop device is
//! detached again by [`LoopMapper::detach`], when the mapper is dropped, or right away
//! when attach fails after the device was created.

pub mod lvm;
pub mod order;

use crate::config::MapperConfig;
use crate::ui::{NoopUi, Ui};
use crate::{ImgmapError, ImgmapResult};
use imgmap_hal::naming::{loop_name, partition_prefix};
use imgmap_hal::{lsblk, HalError, ImageHal, LoopGuard};
use std::path::Path;
use std::thread;

/// Devices produced by one successful attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingResult {
    loop_device: String,
    devices: Vec<String>,
}

impl MappingResult {
    /// The loop device backing every entry, e.g. `/dev/loop7`.
    pub fn loop_device(&self) -> &str {
        &self.loop_device
    }

    /// Partitions by index, then LVM volumes by name.
    pub fn devices(&self) -> &[String] {
        &self.devices
    }
}

pub struct LoopMapper<'a, H: ImageHal + ?Sized> {
    hal: &'a H,
    ui: &'a dyn Ui,
    config: MapperConfig,
    mapping: Option<MappingResult>,
}

impl<'a, H: ImageHal + ?Sized> LoopMapper<'a, H> {
    pub fn new(hal: &'a H) -> Self {
        Self {
            hal,
            ui: &NoopUi,
            config: MapperConfig::default(),
            mapping: None,
        }
    }

    pub fn with_ui(mut self, ui: &'a dyn Ui) -> Self {
        self.ui = ui;
        self
    }

    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// The current mapping, if attached.
    pub fn mapping(&self) -> Option<&MappingResult> {
        self.mapping.as_ref()
    }

    /// Attach `image` and return its partitions and volumes.
    ///
    /// Either returns a non-empty list or an error; on error no loop device is left
    /// behind.
    pub fn attach(&mut self, image: &Path) -> ImgmapResult<Vec<String>> {
        if let Some(mapping) = &self.mapping {
            return Err(ImgmapError::AlreadyAttached {
                loop_device: mapping.loop_device.clone(),
            });
        }

        self.ui.message(&format!("mapping {}", image.display()));
        self.ui
            .say(&format!("losetup --show -f -P {}", image.display()));
        let loop_device = match self.hal.losetup_attach(image, true) {
            Ok(loop_device) => loop_device,
            Err(err) => {
                self.ui.error(&format!("error losetup --show -f -P: {}", err));
                return Err(err.into());
            }
        };
        log::info!("{} attached to {}", image.display(), loop_device);
        let guard = LoopGuard::new(self.hal, loop_device);

        let loop_name = match loop_name(guard.device()) {
            Some(name) => name.to_string(),
            None => {
                let err = HalError::Parse(format!(
                    "losetup returned unexpected device path {}",
                    guard.device()
                ));
                self.ui.error(&err.to_string());
                return Err(err.into());
            }
        };

        if self.config.settle {
            if let Err(err) = self.hal.udev_settle() {
                log::debug!("udevadm settle failed (ignored): {}", err);
            }
        }

        let (partitions, scan_failure) = self.scan_partitions(guard.device(), &loop_name);
        let volumes = lvm::discover_volumes(self.hal, &self.config, &loop_name, &partitions);

        let mut devices: Vec<String> = partitions
            .iter()
            .map(|name| format!("/dev/{}", name))
            .chain(volumes)
            .filter(|path| {
                let present = self.hal.is_block_device(Path::new(path));
                if !present {
                    log::warn!("{} is still not a block device, skipping", path);
                }
                present
            })
            .collect();

        if devices.is_empty() {
            let err = ImgmapError::LayoutDetection {
                loop_device: guard.device().to_string(),
                cause: scan_failure,
            };
            self.ui.error(&err.to_string());
            return Err(err);
        }

        order::sort_devices(&mut devices, &loop_name);
        let loop_device = guard.release();
        self.ui
            .message(&format!("Mapped partitions and volumes: {:?}", devices));

        self.mapping = Some(MappingResult {
            loop_device,
            devices: devices.clone(),
        });
        Ok(devices)
    }

    /// Poll `lsblk` until the kernel has published at least one partition and every
    /// listed partition has its block node. Node lag and table lag share the same
    /// attempt budget. Returns the last non-empty listing along with the `lsblk` error
    /// text if the tool itself failed.
    fn scan_partitions(&self, loop_device: &str, loop_name: &str) -> (Vec<String>, Option<String>) {
        let prefix = partition_prefix(loop_name);
        let attempts = self.config.scan_attempts.max(1);
        let mut listed = Vec::new();
        for attempt in 1..=attempts {
            match self.hal.lsblk_name_type(loop_device) {
                Ok(output) => {
                    let found = lsblk::partition_names(&output, &prefix);
                    if !found.is_empty() {
                        listed = found;
                    }
                }
                Err(err) => {
                    self.ui.error(&format!("lsblk failed: {}", err));
                    return (listed, Some(err.to_string()));
                }
            }

            if listed.is_empty() {
                log::debug!(
                    "no partitions on {} yet (attempt {}/{})",
                    loop_device,
                    attempt,
                    attempts
                );
            } else {
                let pending = listed
                    .iter()
                    .filter(|name| !self.hal.is_block_device(&Path::new("/dev").join(name)))
                    .count();
                if pending == 0 {
                    log::debug!(
                        "found {} partition(s) on {} after {} attempt(s)",
                        listed.len(),
                        loop_device,
                        attempt
                    );
                    return (listed, None);
                }
                log::debug!(
                    "{} of {} partition node(s) on {} not ready (attempt {}/{})",
                    pending,
                    listed.len(),
                    loop_device,
                    attempt,
                    attempts
                );
            }

            if attempt < attempts {
                thread::sleep(self.config.scan_interval());
            }
        }
        (listed, None)
    }

    /// Detach the loop device of the current mapping. A no-op when nothing is attached,
    /// so calling it twice issues a single `losetup -d`. Failures are reported, not
    /// returned.
    pub fn detach(&mut self) {
        let Some(mapping) = self.mapping.take() else {
            return;
        };
        if mapping.devices.is_empty() {
            return;
        }
        self.ui.say(&format!("losetup -d {}", mapping.loop_device));
        if let Err(err) = self.hal.losetup_detach(&mapping.loop_device) {
            log::warn!("failed to detach {}: {}", mapping.loop_device, err);
            self.ui
                .error(&format!("error detaching {}: {}", mapping.loop_device, err));
        }
    }

    /// Keep the loop device attached past the mapper's lifetime.
    pub fn release(mut self) -> Option<MappingResult> {
        self.mapping.take()
    }
}

impl<'a, H: ImageHal + ?Sized> Drop for LoopMapper<'a, H> {
    fn drop(&mut self) {
        self.detach();
    }
}
