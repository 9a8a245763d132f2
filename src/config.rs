//! Plugin configuration.

use hashbrown::HashMap;

use crate::host::Gesture;

/// File extensions probed for playability, in the order the sound engine lists them.
pub const DEFAULT_EXTENSIONS: [&str; 10] = ["mp3", "ogg", "opus", "mpeg", "wav", "m4a", "mp4", "aiff", "wma", "mid"];

/// Resource requested by the synchronous probe. It must not exist.
pub const DEFAULT_PROBE_RESOURCE: &str = "WebAudioPluginTest.fail";

/// Shape of the silent scratch buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScratchSpec {
    pub channels: u32,
    pub frames: u32,
    /// `None` uses the context's own sample rate.
    pub sample_rate: Option<f32>,
}

impl ScratchSpec {
    /// Sized for the shared context instead of a fixed low rate.
    pub fn matching_context() -> Self {
        Self { sample_rate: None, ..Self::default() }
    }

    pub fn resolve_rate(&self, context_rate: f32) -> f32 {
        self.sample_rate.unwrap_or(context_rate)
    }
}

impl Default for ScratchSpec {
    fn default() -> Self {
        Self {
            channels: 1,
            frames: 1,
            sample_rate: Some(22050.0),
        }
    }
}

/// Everything [`AudioPlugin`](crate::AudioPlugin) needs to know up front.
///
/// ```
/// use soundgate::PluginConfig;
///
/// let config = PluginConfig::default()
///     .with_extensions(["mp3", "ogg"])
///     .with_initial_volume(0.8);
/// assert_eq!(config.extensions, vec!["mp3", "ogg"]);
/// ```
#[derive(Clone, Debug)]
pub struct PluginConfig {
    /// Candidate file extensions, without the leading dot
    pub extensions: Vec<String>,
    /// Extension → MIME subtype, for extensions whose container has another name
    pub extension_map: HashMap<String, String>,
    pub probe_resource: String,
    pub scratch: ScratchSpec,
    /// Gestures that may unlock audio on touch platforms
    pub unlock_gestures: Vec<Gesture>,
    pub initial_volume: f32,
}

impl Default for PluginConfig {
    fn default() -> Self {
        let mut extension_map = HashMap::new();
        extension_map.insert("m4a".to_string(), "mp4".to_string());

        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            extension_map,
            probe_resource: DEFAULT_PROBE_RESOURCE.to_string(),
            scratch: ScratchSpec::default(),
            unlock_gestures: vec![Gesture::PointerDown, Gesture::TouchEnd],
            initial_volume: 1.0,
        }
    }
}

impl PluginConfig {
    /// Replace the candidate extension list
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Probe `extension` under `subtype` as well as under its own name
    pub fn with_extension_alias(mut self, extension: impl Into<String>, subtype: impl Into<String>) -> Self {
        self.extension_map.insert(extension.into(), subtype.into());
        self
    }

    pub fn with_probe_resource(mut self, resource: impl Into<String>) -> Self {
        self.probe_resource = resource.into();
        self
    }

    pub fn with_scratch(mut self, scratch: ScratchSpec) -> Self {
        self.scratch = scratch;
        self
    }

    pub fn with_unlock_gestures(mut self, gestures: impl IntoIterator<Item = Gesture>) -> Self {
        self.unlock_gestures = gestures.into_iter().collect();
        self
    }

    pub fn with_initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = volume;
        self
    }

    /// The MIME subtype probed for `extension`.
    pub fn subtype_for<'a>(&'a self, extension: &'a str) -> &'a str {
        self.extension_map.get(extension).map(String::as_str).unwrap_or(extension)
    }
}
