//! CPAL output device discovery.
//!
//! The browser picks the output device for a web context. Natively the offline host
//! can be sized to a real device with [`OfflineHostBuilder::device`](crate::offline::OfflineHostBuilder::device):
//!
//! ```no_run
//! use soundgate::OutputDevice;
//! use soundgate::offline::OfflineHost;
//!
//! for (i, device) in OutputDevice::list_outputs().iter().enumerate() {
//!     println!("[{}] {} ({} Hz, {} ch)", i, device.name(), device.sample_rate(), device.channels());
//! }
//!
//! if let Some(device) = OutputDevice::default_output() {
//!     let host = OfflineHost::builder().device(&device).build();
//! }
//! ```

#[cfg(feature = "cpal_sink")]
use cpal::traits::{DeviceTrait, HostTrait};

/// A discovered audio output device and its default format.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputDevice {
    name: String,
    sample_rate: u32,
    channels: u16,
}

impl OutputDevice {
    /// Describe a device by hand.
    pub fn new(name: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            name: name.into(),
            sample_rate,
            channels,
        }
    }

    /// The system's default output device, or `None` if there is none.
    #[cfg(feature = "cpal_sink")]
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        Self::describe(&host.default_output_device()?)
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn default_output() -> Option<Self> {
        None
    }

    /// Every output device whose default config can be read.
    #[cfg(feature = "cpal_sink")]
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(|device| Self::describe(&device)).collect())
            .unwrap_or_default()
    }

    #[cfg(not(feature = "cpal_sink"))]
    pub fn list_outputs() -> Vec<Self> {
        Vec::new()
    }

    #[cfg(feature = "cpal_sink")]
    fn describe(device: &cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self::new(name, config.sample_rate().0, config.channels()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
