use crate::LoopOps;

/// RAII guard that detaches a loop device when dropped.
///
/// Held while a freshly attached device is still being enumerated, so every early
/// return releases the device; [`LoopGuard::release`] hands it over once enumeration
/// succeeded.
#[derive(Debug)]
pub struct LoopGuard<'a, H: LoopOps + ?Sized> {
    hal: &'a H,
    loop_device: String,
    active: bool,
}

impl<'a, H: LoopOps + ?Sized> LoopGuard<'a, H> {
    pub fn new(hal: &'a H, loop_device: impl Into<String>) -> Self {
        Self {
            hal,
            loop_device: loop_device.into(),
            active: true,
        }
    }

    /// Prevent automatic detach and return the loop device path.
    pub fn release(mut self) -> String {
        self.active = false;
        std::mem::take(&mut self.loop_device)
    }

    pub fn device(&self) -> &str {
        &self.loop_device
    }
}

impl<'a, H: LoopOps + ?Sized> Drop for LoopGuard<'a, H> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        log::info!("detaching {}", self.loop_device);
        if let Err(err) = self.hal.losetup_detach(&self.loop_device) {
            log::warn!("loop guard failed to detach {}: {}", self.loop_device, err);
        }
    }
}
