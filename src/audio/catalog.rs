//! Capture device selection

use tracing::{debug, warn};

use super::AudioBackend;

/// Returned when no capture device matches the configured name
pub const NO_DEVICE: &str = "null";

/// Resolves the configured device name against the devices the platform reports
pub struct DeviceCatalog<'a> {
    backend: &'a dyn AudioBackend,
}

impl<'a> DeviceCatalog<'a> {
    pub fn new(backend: &'a dyn AudioBackend) -> Self {
        Self { backend }
    }

    /// Capture device names, empty if enumeration fails
    pub fn capture_devices(&self) -> Vec<String> {
        match self.backend.capture_device_names() {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list capture devices: {}", e);
                Vec::new()
            }
        }
    }

    /// First capture device whose name contains `configured`, or [`NO_DEVICE`]
    pub fn resolve(&self, configured: &str) -> String {
        let device = select_device(&self.capture_devices(), configured);
        debug!("Capture device '{}' resolved to '{}'", configured, device);
        device
    }
}

/// Case-insensitive substring match over `names`
pub fn select_device(names: &[String], configured: &str) -> String {
    let needle = configured.to_lowercase();
    names
        .iter()
        .find(|name| name.to_lowercase().contains(&needle))
        .cloned()
        .unwrap_or_else(|| NO_DEVICE.to_string())
}
