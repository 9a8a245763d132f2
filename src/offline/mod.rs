//! An in-process host.
//!
//! [`OfflineHost`] plays the part of a browser: it answers codec queries, serves the
//! synchronous probe, constructs [`OfflineContext`]s and keeps track of the gesture
//! listeners the plugin attaches. Contexts render through a `dasp_graph` graph, so
//! the master chain can be listened to without a browser.
//!
//! ```
//! use soundgate::offline::{AutoplayPolicy, OfflineHost};
//! use soundgate::host::{AudioHost, Gesture};
//!
//! let host = OfflineHost::builder()
//!     .touch(true)
//!     .autoplay(AutoplayPolicy::RequireGesture)
//!     .build();
//! assert!(host.has_touch_input());
//! assert!(!host.is_listening(Gesture::TouchEnd));
//! ```

mod context;
mod nodes;

use std::cell::Cell;

use hashbrown::{HashMap, HashSet};
use tracing::trace;

pub use context::{ApiGeneration, AutoplayPolicy, NodeKind, OfflineBuffer, OfflineContext, OfflineNode, UserActivation};
pub use nodes::Compressor;

use crate::device::OutputDevice;
use crate::error::HostError;
use crate::host::{AudioHost, CodecQuery, ContextConstructor, Gesture, Origin, Platform, ProbeResponse};

/// Whether a gesture listener was attached or detached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerEvent {
    Added(Gesture),
    Removed(Gesture),
}

/// A scripted browser environment.
pub struct OfflineHost {
    origin: Origin,
    platform: Platform,
    touch: bool,
    constructors: Vec<ContextConstructor>,
    api: ApiGeneration,
    codecs: Option<HashMap<String, String>>,
    probe: Result<ProbeResponse, HostError>,
    sample_rate: u32,
    channels: u32,
    autoplay: AutoplayPolicy,
    activation: UserActivation,
    listeners: HashSet<Gesture>,
    listener_log: Vec<ListenerEvent>,
    probes: Cell<usize>,
    codec_queries: Cell<usize>,
    contexts: Cell<usize>,
}

impl Default for OfflineHost {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl OfflineHost {
    pub fn builder() -> OfflineHostBuilder {
        OfflineHostBuilder::new()
    }

    /// The gesture flag shared with every context this host builds.
    pub fn activation(&self) -> &UserActivation {
        &self.activation
    }

    pub fn is_listening(&self, gesture: Gesture) -> bool {
        self.listeners.contains(&gesture)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Every attach and detach, in order.
    pub fn listener_log(&self) -> &[ListenerEvent] {
        &self.listener_log
    }

    /// How many synchronous probe requests were issued.
    pub fn probes_issued(&self) -> usize {
        self.probes.get()
    }

    /// How many codec-support queries were handed out.
    pub fn codec_queries_made(&self) -> usize {
        self.codec_queries.get()
    }

    pub fn contexts_constructed(&self) -> usize {
        self.contexts.get()
    }

    /// Build a context outside the plugin, as an embedder would.
    pub fn new_context(&self) -> OfflineContext {
        OfflineContext::new(self.sample_rate, self.channels, self.api, self.autoplay, self.activation.clone())
    }
}

impl AudioHost for OfflineHost {
    type Context = OfflineContext;

    fn origin(&self) -> Origin {
        self.origin
    }

    fn platform(&self) -> Platform {
        self.platform
    }

    fn probe_request(&self, resource: &str) -> Result<ProbeResponse, HostError> {
        self.probes.set(self.probes.get() + 1);
        trace!(resource, "offline probe request");
        self.probe.clone()
    }

    fn codec_query(&self) -> Option<Box<dyn CodecQuery>> {
        let codecs = self.codecs.clone()?;
        self.codec_queries.set(self.codec_queries.get() + 1);
        Some(Box::new(move |mime: &str| codecs.get(mime).cloned().unwrap_or_default()))
    }

    fn exposes_constructor(&self, constructor: ContextConstructor) -> bool {
        self.constructors.contains(&constructor)
    }

    fn construct_context(&self, constructor: ContextConstructor) -> Result<OfflineContext, HostError> {
        if !self.exposes_constructor(constructor) {
            return Err(HostError::Script(format!("{} is not a constructor", constructor.global_name())));
        }
        self.contexts.set(self.contexts.get() + 1);
        Ok(self.new_context())
    }

    fn has_touch_input(&self) -> bool {
        self.touch
    }

    fn add_gesture_listener(&mut self, gesture: Gesture) {
        if self.listeners.insert(gesture) {
            self.listener_log.push(ListenerEvent::Added(gesture));
        }
    }

    fn remove_gesture_listener(&mut self, gesture: Gesture) {
        if self.listeners.remove(&gesture) {
            self.listener_log.push(ListenerEvent::Removed(gesture));
        }
    }
}

/// Builder for [`OfflineHost`]. Defaults to a desktop page over the network with a
/// modern context at 48 kHz stereo and no codecs.
pub struct OfflineHostBuilder {
    host: OfflineHost,
}

impl OfflineHostBuilder {
    fn new() -> Self {
        Self {
            host: OfflineHost {
                origin: Origin::Network,
                platform: Platform::Desktop,
                touch: false,
                constructors: vec![ContextConstructor::Standard],
                api: ApiGeneration::Modern,
                codecs: Some(HashMap::new()),
                probe: Ok(ProbeResponse::new(404, "")),
                sample_rate: 48000,
                channels: 2,
                autoplay: AutoplayPolicy::Allowed,
                activation: UserActivation::default(),
                listeners: HashSet::new(),
                listener_log: Vec::new(),
                probes: Cell::new(0),
                codec_queries: Cell::new(0),
                contexts: Cell::new(0),
            },
        }
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.host.origin = origin;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.host.platform = platform;
        self
    }

    pub fn touch(mut self, touch: bool) -> Self {
        self.host.touch = touch;
        self
    }

    /// Constructors the global scope exposes. Empty means no Web Audio at all.
    pub fn constructors(mut self, constructors: impl IntoIterator<Item = ContextConstructor>) -> Self {
        self.host.constructors = constructors.into_iter().collect();
        self
    }

    pub fn api(mut self, api: ApiGeneration) -> Self {
        self.host.api = api;
        self
    }

    /// Shorthand for an old WebKit build: prefixed constructor, legacy entry points.
    pub fn legacy_webkit(self) -> Self {
        self.constructors([ContextConstructor::Prefixed]).api(ApiGeneration::Legacy)
    }

    /// MIME types answered with `"probably"`.
    pub fn codecs<I, S>(mut self, mimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codecs = self.host.codecs.get_or_insert_with(HashMap::new);
        for mime in mimes {
            codecs.insert(mime.into(), "probably".to_string());
        }
        self
    }

    /// Answer `mime` with exactly `answer`.
    pub fn codec_answer(mut self, mime: impl Into<String>, answer: impl Into<String>) -> Self {
        self.host
            .codecs
            .get_or_insert_with(HashMap::new)
            .insert(mime.into(), answer.into());
        self
    }

    /// The environment has no media element to ask.
    pub fn no_codec_query(mut self) -> Self {
        self.host.codecs = None;
        self
    }

    pub fn probe_response(mut self, status: u16, body: impl Into<String>) -> Self {
        self.host.probe = Ok(ProbeResponse::new(status, body));
        self
    }

    /// The synchronous request throws.
    pub fn probe_error(mut self, message: impl Into<String>) -> Self {
        self.host.probe = Err(HostError::RequestFailed(message.into()));
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.host.sample_rate = sample_rate;
        self
    }

    pub fn channels(mut self, channels: u32) -> Self {
        self.host.channels = channels;
        self
    }

    pub fn autoplay(mut self, autoplay: AutoplayPolicy) -> Self {
        self.host.autoplay = autoplay;
        self
    }

    /// Render at the format of a real output device.
    pub fn device(self, device: &OutputDevice) -> Self {
        self.sample_rate(device.sample_rate()).channels(device.channels() as u32)
    }

    /// An iPhone: touch input and gesture-gated autoplay.
    pub fn ios(self) -> Self {
        self.platform(Platform::Ios)
            .touch(true)
            .autoplay(AutoplayPolicy::RequireGesture)
    }

    pub fn build(self) -> OfflineHost {
        self.host
    }
}
