//! The plugin facade the sound engine talks to.

use core::fmt;

use tracing::{debug, info, instrument, warn};

use crate::compat::PanningModel;
use crate::config::PluginConfig;
use crate::error::{GraphError, PluginError, UnsupportedReason};
use crate::graph::AudioGraph;
use crate::host::{AudioHost, Gesture, HostContext};
use crate::probe::{self, Capability, CapabilityTable};
use crate::shared::{InstanceShared, LoaderClass, PlaybackInstanceClass, ScratchBuffer, SharedContext};
use crate::unlock::{UnlockMachine, UnlockState};

/// Master volume as the engine sees it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MasterVolume {
    pub volume: f32,
    pub muted: bool,
}

impl MasterVolume {
    /// What the gain node should hold.
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

#[derive(Debug)]
enum Detection {
    Pending,
    Unsupported(UnsupportedReason),
    Supported(CapabilityTable),
}

/// Owns the shared audio graph and everything derived from it.
///
/// ```
/// use soundgate::{AudioPlugin, PluginConfig};
/// use soundgate::offline::OfflineHost;
///
/// let host = OfflineHost::builder().codecs(["audio/mp3"]).build();
/// let mut plugin = AudioPlugin::new(host, PluginConfig::default());
///
/// assert!(plugin.check_support());
/// assert!(plugin.capabilities().unwrap().is_playable("mp3"));
/// ```
pub struct AudioPlugin<H: AudioHost> {
    host: H,
    config: PluginConfig,
    graph: AudioGraph<H::Context>,
    unlock: UnlockMachine,
    /// Outcome of the synchronous request check, taken once
    environment_usable: Option<bool>,
    detection: Detection,
    volume: MasterVolume,
    published: bool,
}

impl<H: AudioHost> AudioPlugin<H> {
    pub fn new(host: H, config: PluginConfig) -> Self {
        let volume = MasterVolume {
            volume: config.initial_volume,
            muted: false,
        };
        Self {
            host,
            config,
            graph: AudioGraph::new(),
            unlock: UnlockMachine::new(),
            environment_usable: None,
            detection: Detection::Pending,
            volume,
            published: false,
        }
    }

    /// Use a context the embedder already created. Must happen before [`check_support`](Self::check_support).
    pub fn adopt_context(&mut self, context: H::Context) -> Result<SharedContext<H::Context>, PluginError> {
        if !matches!(self.detection, Detection::Pending) {
            warn!("refusing external context after detection ran");
            return Err(GraphError::ContextAlreadyInstalled.into());
        }
        Ok(self.graph.adopt_context(context)?)
    }

    /// Whether this environment can host the plugin.
    ///
    /// The first successful call detects capabilities, creates the context, arms the
    /// unlock machine and wires the signal chain; later calls only report the result.
    #[instrument(skip_all)]
    pub fn check_support(&mut self) -> bool {
        let usable = match self.environment_usable {
            Some(usable) => usable,
            None => {
                let usable = probe::is_environment_usable(&self.host, &self.config.probe_resource);
                self.environment_usable = Some(usable);
                usable
            }
        };
        if !usable {
            debug!(reason = %UnsupportedReason::LocalRequestsUnavailable, "environment cannot load audio");
            return false;
        }

        if matches!(self.detection, Detection::Pending) {
            self.detection = match self.detect() {
                Ok(table) => Detection::Supported(table),
                Err(reason) => {
                    info!(%reason, "web audio unsupported");
                    Detection::Unsupported(reason)
                }
            };
        }

        match &self.detection {
            Detection::Supported(_) => self.graph.context().is_some() && self.graph.signal_chain().is_some(),
            _ => false,
        }
    }

    fn detect(&mut self) -> Result<CapabilityTable, UnsupportedReason> {
        let query = self.host.codec_query().ok_or(UnsupportedReason::NoCodecQuery)?;

        let context = self
            .graph
            .get_or_create_context(&self.host)
            .ok_or(UnsupportedReason::NoContextConstructor)?;

        let chain_failed = |err: GraphError| UnsupportedReason::SignalChain(err.to_string());
        self.graph
            .get_or_create_scratch_buffer(&self.config.scratch)
            .map_err(chain_failed)?;
        self.graph.vocabulary().map_err(chain_failed)?;

        let unlock = self.unlock.arm(&mut self.host, &mut self.graph, &self.config.unlock_gestures);
        debug!(?unlock, "unlock machine armed");

        let table = probe::capabilities_for(query.as_ref(), &self.config, context.output_channels());

        let chain = self.graph.build_signal_chain().map_err(chain_failed)?;
        let ctx = context.get();
        let effective = self.volume.effective();
        if ctx.gain_value(&chain.master_gain) != effective {
            ctx.set_gain_value(&chain.master_gain, effective)
                .map_err(|err| UnsupportedReason::SignalChain(err.to_string()))?;
        }

        Ok(table)
    }

    /// Why detection failed, if it did.
    pub fn unsupported_reason(&self) -> Option<&UnsupportedReason> {
        match &self.detection {
            Detection::Unsupported(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> Option<&CapabilityTable> {
        match &self.detection {
            Detection::Supported(table) => Some(table),
            _ => None,
        }
    }

    pub fn capability(&self, name: &str) -> Option<Capability> {
        self.capabilities().and_then(|t| t.get(name))
    }

    /// Try to unlock audio from the caller's own gesture handler.
    pub fn play_probe_sound(&mut self) -> UnlockState {
        self.unlock.attempt(&mut self.host, &mut self.graph)
    }

    /// Route a gesture event from the host's listener into the unlock machine.
    pub fn dispatch_gesture(&mut self, gesture: Gesture) -> UnlockState {
        self.unlock.on_gesture(gesture, &mut self.host, &mut self.graph)
    }

    pub fn unlock_state(&self) -> UnlockState {
        self.unlock.state()
    }

    /// Write an already resolved volume into the master gain.
    ///
    /// Returns whether the node was touched; equal values are skipped.
    pub fn set_master_volume(&mut self, effective: f32) -> Result<bool, PluginError> {
        let ctx = self.graph.context().ok_or(PluginError::NotReady)?.get();
        let chain = self.graph.signal_chain().ok_or(PluginError::NotReady)?;

        if ctx.gain_value(&chain.master_gain) == effective {
            return Ok(false);
        }
        ctx.set_gain_value(&chain.master_gain, effective)?;
        debug!(effective, "master volume updated");
        Ok(true)
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<bool, PluginError> {
        self.volume.volume = volume;
        self.update_volume()
    }

    pub fn volume(&self) -> f32 {
        self.volume.volume
    }

    pub fn set_mute(&mut self, muted: bool) -> Result<bool, PluginError> {
        self.volume.muted = muted;
        self.update_volume()
    }

    pub fn is_muted(&self) -> bool {
        self.volume.muted
    }

    pub fn master_volume(&self) -> MasterVolume {
        self.volume
    }

    fn update_volume(&mut self) -> Result<bool, PluginError> {
        if self.graph.signal_chain().is_none() {
            // applied when the chain is built
            return Ok(false);
        }
        self.set_master_volume(self.volume.effective())
    }

    /// Hand the shared graph to the engine's collaborator classes.
    ///
    /// Returns `Ok(true)` the first time and `Ok(false)` afterwards.
    pub fn publish_shared_state<I, L>(&mut self, instances: &mut I, loader: &mut L) -> Result<bool, PluginError>
    where
        I: PlaybackInstanceClass<H::Context>,
        L: LoaderClass<H::Context>,
    {
        if self.published {
            return Ok(false);
        }
        let shared = self.instance_shared().ok_or(PluginError::NotReady)?;

        loader.install_context(shared.context.clone());
        instances.install_shared(shared);
        self.published = true;
        info!("published shared audio state");
        Ok(true)
    }

    /// The bundle published to playback instances, once everything is built.
    pub fn instance_shared(&self) -> Option<InstanceShared<H::Context>> {
        if !matches!(self.detection, Detection::Supported(_)) {
            return None;
        }
        Some(InstanceShared {
            context: self.graph.context()?.clone(),
            scratch_buffer: self.graph.scratch_buffer()?.clone(),
            destination: self.graph.signal_chain()?.master_gain.clone(),
            panning_model: self.graph.api()?.panning_model(),
            vocabulary: self.graph.api()?,
        })
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn context(&self) -> Option<&SharedContext<H::Context>> {
        self.graph.context()
    }

    pub fn master_gain(&self) -> Option<&<H::Context as HostContext>::Node> {
        self.graph.signal_chain().map(|c| &c.master_gain)
    }

    pub fn compressor(&self) -> Option<&<H::Context as HostContext>::Node> {
        self.graph.signal_chain().map(|c| &c.compressor)
    }

    pub fn scratch_buffer(&self) -> Option<&ScratchBuffer<<H::Context as HostContext>::Buffer>> {
        self.graph.scratch_buffer()
    }

    pub fn panning_model(&self) -> Option<PanningModel> {
        self.graph.api().map(|api| api.panning_model())
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: AudioHost> fmt::Display for AudioPlugin<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[WebAudioPlugin]")
    }
}
