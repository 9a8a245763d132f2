//! Shared Web Audio output for a sound engine.
//!
//! `soundgate` owns the one audio context a page plays through. It decides whether the
//! environment can host Web Audio at all, smooths over both generations of the node
//! API, wires the fixed compressor/gain/output chain and lifts the autoplay block on
//! touch platforms by playing a silent buffer inside the first gesture.
//!
//! The compressor is connected to the destination first, then the master gain to the
//! compressor. Sounds are routed into the master gain, so audio flows
//! gain → compressor → destination.
//!
//! Everything environment-specific sits behind [`AudioHost`](host::AudioHost) and
//! [`HostContext`](host::HostContext). In the browser that is [`web::WebHost`]; anywhere
//! else [`offline::OfflineHost`] renders the graph in-process.
//!
//! ```
//! use soundgate::{AudioPlugin, PluginConfig};
//! use soundgate::offline::OfflineHost;
//!
//! let host = OfflineHost::builder().codecs(["audio/mp3", "audio/ogg"]).build();
//! let mut plugin = AudioPlugin::new(host, PluginConfig::default());
//!
//! if plugin.check_support() {
//!     plugin.set_volume(0.5).unwrap();
//!     println!("{} ready", plugin);
//! }
//! ```

pub mod compat;
pub mod config;
pub mod device;
pub mod error;
pub mod graph;
pub mod host;
pub mod offline;
pub mod plugin;
pub mod probe;
pub mod shared;
pub mod unlock;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use compat::{GraphApi, PanningModel};
pub use config::{PluginConfig, ScratchSpec};
pub use device::OutputDevice;
pub use error::{GraphError, HostError, PluginError, UnsupportedReason};
pub use plugin::{AudioPlugin, MasterVolume};
pub use probe::{Capability, CapabilityTable};
pub use shared::{InstanceShared, LoaderClass, PlaybackInstanceClass, ScratchBuffer, SharedContext};
pub use unlock::UnlockState;
