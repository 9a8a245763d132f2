//! The boundary between the plugin and the environment it runs in.
//!
//! Everything the plugin needs from a browser (or a stand-in for one) goes through
//! [`AudioHost`] and [`HostContext`]. The web backend implements them on top of
//! `web-sys`; [`OfflineHost`](crate::offline::OfflineHost) implements them with an
//! in-process render graph.
//!
//! Context methods take `&self`: node and buffer handles are shared references into
//! the host's graph, like the JavaScript objects they model.

use core::fmt;

use crate::error::HostError;

/// Where the page was loaded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// `file:` protocol
    LocalFile,
    /// Anything served over a network protocol
    Network,
}

/// The device family the host runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    Blackberry,
    Desktop,
}

impl Platform {
    /// Classify a user-agent string.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
            Platform::Ios
        } else if ua.contains("android") {
            Platform::Android
        } else if ua.contains("blackberry") || ua.contains("bb10") {
            Platform::Blackberry
        } else {
            Platform::Desktop
        }
    }

    /// Mobile webview hosts (PhoneGap and friends) play audio from `file:` pages.
    pub fn tolerates_local_playback(&self) -> bool {
        !matches!(self, Platform::Desktop)
    }
}

/// The audio context constructors a host may expose, in preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextConstructor {
    /// `AudioContext`
    Standard,
    /// `webkitAudioContext`
    Prefixed,
}

impl ContextConstructor {
    pub const PREFERENCE: [ContextConstructor; 2] =
        [ContextConstructor::Standard, ContextConstructor::Prefixed];

    pub fn global_name(&self) -> &'static str {
        match self {
            ContextConstructor::Standard => "AudioContext",
            ContextConstructor::Prefixed => "webkitAudioContext",
        }
    }
}

/// Named entry points on a context or source node, across both API generations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphMethod {
    CreateGain,
    CreateGainNode,
    Start,
    NoteGrainOn,
    Stop,
    NoteOff,
}

impl GraphMethod {
    pub fn js_name(&self) -> &'static str {
        match self {
            GraphMethod::CreateGain => "createGain",
            GraphMethod::CreateGainNode => "createGainNode",
            GraphMethod::Start => "start",
            GraphMethod::NoteGrainOn => "noteGrainOn",
            GraphMethod::Stop => "stop",
            GraphMethod::NoteOff => "noteOff",
        }
    }
}

impl fmt::Display for GraphMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.js_name())
    }
}

/// The reported `state` of an audio context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
    /// Older contexts do not report a state at all.
    Unknown,
}

impl ContextState {
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("suspended") => ContextState::Suspended,
            Some("running") => ContextState::Running,
            Some("closed") => ContextState::Closed,
            _ => ContextState::Unknown,
        }
    }
}

/// An input event type that counts as a user gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// First press of a pointer: `mousedown`
    PointerDown,
    /// End of a touch: `touchend`
    TouchEnd,
}

impl Gesture {
    pub fn event_type(&self) -> &'static str {
        match self {
            Gesture::PointerDown => "mousedown",
            Gesture::TouchEnd => "touchend",
        }
    }
}

/// What came back from a synchronous probe request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

impl ProbeResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// Whether this response proves requests reach the filesystem.
    ///
    /// With security checks disabled a failed read comes back as status 0 with an
    /// empty body, so zero-status responses only count when they carry content.
    pub fn requests_work(&self) -> bool {
        match self.status {
            404 | 200 => true,
            0 => !self.body.is_empty(),
            _ => false,
        }
    }
}

/// The environment's codec-support query (`HTMLMediaElement.canPlayType`).
pub trait CodecQuery {
    /// Raw answer for a MIME type: `"probably"`, `"maybe"`, `""` or `"no"`.
    fn can_play_type(&self, mime: &str) -> String;
}

impl<F> CodecQuery for F
where
    F: Fn(&str) -> String,
{
    fn can_play_type(&self, mime: &str) -> String {
        self(mime)
    }
}

/// The environment hosting the plugin.
pub trait AudioHost {
    type Context: HostContext;

    fn origin(&self) -> Origin;

    fn platform(&self) -> Platform;

    /// Issue a synchronous GET for `resource`.
    fn probe_request(&self, resource: &str) -> Result<ProbeResponse, HostError>;

    /// `None` when the environment has no codec-support query at all.
    ///
    /// The query owns whatever it needs, so it can outlive borrows of the host.
    fn codec_query(&self) -> Option<Box<dyn CodecQuery>>;

    fn exposes_constructor(&self, constructor: ContextConstructor) -> bool;

    fn construct_context(&self, constructor: ContextConstructor) -> Result<Self::Context, HostError>;

    /// `ontouchstart` is present on the window.
    fn has_touch_input(&self) -> bool;

    /// Attach a capturing document-level listener for `gesture`.
    fn add_gesture_listener(&mut self, gesture: Gesture);

    fn remove_gesture_listener(&mut self, gesture: Gesture);
}

/// A live audio context and the node operations the plugin relies on.
///
/// The legacy entry points default to [`HostError::Unsupported`], so hosts that only
/// speak the modern API need not mention them.
pub trait HostContext {
    type Node: Clone + fmt::Debug;
    type Buffer: Clone + fmt::Debug;

    fn state(&self) -> ContextState;

    fn sample_rate(&self) -> f32;

    /// Channel count of the hardware output (0 = none, 1 = mono, 2 = stereo, ...).
    fn output_channels(&self) -> u32;

    fn destination(&self) -> Self::Node;

    fn exposes(&self, method: GraphMethod) -> bool;

    fn create_dynamics_compressor(&self) -> Result<Self::Node, HostError>;

    fn create_buffer(&self, channels: u32, frames: u32, sample_rate: f32) -> Result<Self::Buffer, HostError>;

    fn create_buffer_source(&self) -> Result<Self::Node, HostError>;

    fn set_source_buffer(&self, source: &Self::Node, buffer: &Self::Buffer) -> Result<(), HostError>;

    fn connect(&self, from: &Self::Node, to: &Self::Node) -> Result<(), HostError>;

    fn gain_value(&self, gain: &Self::Node) -> f32;

    fn set_gain_value(&self, gain: &Self::Node, value: f32) -> Result<(), HostError>;

    /// Seconds of audio in the buffer assigned to `source`, if known.
    fn source_duration(&self, _source: &Self::Node) -> Option<f64> {
        None
    }

    fn create_gain(&self) -> Result<Self::Node, HostError> {
        Err(HostError::Unsupported(GraphMethod::CreateGain))
    }

    fn create_gain_node(&self) -> Result<Self::Node, HostError> {
        Err(HostError::Unsupported(GraphMethod::CreateGainNode))
    }

    /// `source.start(when, offset[, duration])`
    fn start(&self, _source: &Self::Node, _when: f64, _offset: f64, _duration: Option<f64>) -> Result<(), HostError> {
        Err(HostError::Unsupported(GraphMethod::Start))
    }

    /// `source.noteGrainOn(when, offset, duration)`; all three are required.
    fn note_grain_on(&self, _source: &Self::Node, _when: f64, _offset: f64, _duration: f64) -> Result<(), HostError> {
        Err(HostError::Unsupported(GraphMethod::NoteGrainOn))
    }

    fn stop(&self, _source: &Self::Node, _when: f64) -> Result<(), HostError> {
        Err(HostError::Unsupported(GraphMethod::Stop))
    }

    fn note_off(&self, _source: &Self::Node, _when: f64) -> Result<(), HostError> {
        Err(HostError::Unsupported(GraphMethod::NoteOff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agents_map_to_platforms() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 9_1 like Mac OS X) AppleWebKit/601.1.46";
        let android = "Mozilla/5.0 (Linux; Android 6.0; Nexus 5) AppleWebKit/537.36";
        let bb = "Mozilla/5.0 (BB10; Touch) AppleWebKit/537.10+";
        let desktop = "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";

        assert_eq!(Platform::from_user_agent(iphone), Platform::Ios);
        assert_eq!(Platform::from_user_agent(android), Platform::Android);
        assert_eq!(Platform::from_user_agent(bb), Platform::Blackberry);
        assert_eq!(Platform::from_user_agent(desktop), Platform::Desktop);
        assert!(!Platform::Desktop.tolerates_local_playback());
        assert!(Platform::Ios.tolerates_local_playback());
    }

    #[test]
    fn probe_responses() {
        assert!(ProbeResponse::new(404, "").requests_work());
        assert!(ProbeResponse::new(200, "").requests_work());
        assert!(ProbeResponse::new(0, "data").requests_work());
        assert!(!ProbeResponse::new(0, "").requests_work());
        assert!(!ProbeResponse::new(500, "oops").requests_work());
    }

    #[test]
    fn context_state_tokens() {
        assert_eq!(ContextState::from_token(Some("running")), ContextState::Running);
        assert_eq!(ContextState::from_token(Some("suspended")), ContextState::Suspended);
        assert_eq!(ContextState::from_token(None), ContextState::Unknown);
    }
}
