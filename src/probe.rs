//! Environment and codec probing.

use hashbrown::HashMap;
use itertools::Itertools;
use tracing::{debug, trace};

use crate::config::PluginConfig;
use crate::host::{AudioHost, CodecQuery, Origin, ProbeResponse};
use crate::error::HostError;

/// Value of the `tracks` capability: no cap on concurrent sounds.
pub const UNBOUNDED_TRACKS: i32 = -1;

pub const PANNING: &str = "panning";
pub const VOLUME: &str = "volume";
pub const TRACKS: &str = "tracks";

/// One entry of the [`CapabilityTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Flag(bool),
    Count(i32),
}

impl Capability {
    pub fn as_flag(&self) -> Option<bool> {
        match *self {
            Capability::Flag(b) => Some(b),
            Capability::Count(_) => None,
        }
    }

    pub fn as_count(&self) -> Option<i32> {
        match *self {
            Capability::Count(n) => Some(n),
            Capability::Flag(_) => None,
        }
    }
}

impl From<bool> for Capability {
    fn from(b: bool) -> Self {
        Capability::Flag(b)
    }
}

impl From<i32> for Capability {
    fn from(n: i32) -> Self {
        Capability::Count(n)
    }
}

/// Which features and file formats the environment supports.
///
/// Built once by [`build_capability_table`]; there is no way to change it afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityTable {
    entries: HashMap<String, Capability>,
    /// Extensions in probe order
    extensions: Vec<String>,
}

impl CapabilityTable {
    pub fn get(&self, name: &str) -> Option<Capability> {
        self.entries.get(name).copied()
    }

    /// Whether files with this extension can be played. Accepts `"MP3"` or `".mp3"`.
    pub fn is_playable(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        if ext == PANNING || ext == VOLUME || ext == TRACKS {
            return false;
        }
        self.entries.get(&ext).and_then(Capability::as_flag).unwrap_or(false)
    }

    pub fn panning(&self) -> bool {
        self.get(PANNING).and_then(|c| c.as_flag()).unwrap_or(false)
    }

    pub fn volume(&self) -> bool {
        self.get(VOLUME).and_then(|c| c.as_flag()).unwrap_or(false)
    }

    pub fn tracks(&self) -> i32 {
        self.get(TRACKS).and_then(|c| c.as_count()).unwrap_or(UNBOUNDED_TRACKS)
    }

    /// Playable extensions, in probe order.
    pub fn playable_extensions(&self) -> impl Iterator<Item = &str> + '_ {
        self.extensions
            .iter()
            .filter(move |ext| self.is_playable(ext))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Capability)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether audio can be loaded at all from where the page lives.
///
/// Only a desktop page opened from `file:` is in doubt; there the probe request decides.
pub fn is_environment_usable<H: AudioHost>(host: &H, probe_resource: &str) -> bool {
    if host.origin() != Origin::LocalFile {
        return true;
    }
    let platform = host.platform();
    if platform.tolerates_local_playback() {
        trace!(?platform, "local file origin on a mobile host");
        return true;
    }
    let usable = sync_requests_work(host.probe_request(probe_resource));
    debug!(usable, resource = probe_resource, "probed synchronous local requests");
    usable
}

/// Classify the outcome of the synchronous probe.
pub fn sync_requests_work(outcome: Result<ProbeResponse, HostError>) -> bool {
    match outcome {
        Ok(response) => response.requests_work(),
        Err(err) => {
            trace!(%err, "probe request threw");
            false
        }
    }
}

/// `canPlayType` answers `""` or `"no"` when it is sure a type won't play.
pub fn answer_is_positive(answer: &str) -> bool {
    !(answer.is_empty() || answer == "no")
}

/// Probe every candidate extension and record the fixed capabilities.
pub fn build_capability_table(
    query: &dyn CodecQuery,
    extensions: &[String],
    extension_map: &HashMap<String, String>,
    output_channels: u32,
) -> CapabilityTable {
    let mut entries = HashMap::new();
    entries.insert(PANNING.to_string(), Capability::Flag(true));
    entries.insert(VOLUME.to_string(), Capability::Flag(true));
    entries.insert(TRACKS.to_string(), Capability::Count(UNBOUNDED_TRACKS));

    let extensions: Vec<String> = extensions.iter().unique().cloned().collect();
    for ext in &extensions {
        let subtype = extension_map.get(ext).map(String::as_str).unwrap_or(ext.as_str());
        let playable = answer_is_positive(&query.can_play_type(&format!("audio/{}", ext)))
            || answer_is_positive(&query.can_play_type(&format!("audio/{}", subtype)));
        entries.insert(ext.clone(), Capability::Flag(playable));
    }

    // 0 = no output, 1 = mono, 2 = stereo, 4 = surround, 6 = 5.1
    if output_channels < 2 {
        entries.insert(PANNING.to_string(), Capability::Flag(false));
    }

    let table = CapabilityTable { entries, extensions };
    debug!(
        playable = %table.playable_extensions().join(","),
        panning = table.panning(),
        "built capability table"
    );
    table
}

/// [`build_capability_table`] with the candidate lists taken from `config`.
pub fn capabilities_for(query: &dyn CodecQuery, config: &PluginConfig, output_channels: u32) -> CapabilityTable {
    build_capability_table(query, &config.extensions, &config.extension_map, output_channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        assert!(answer_is_positive("probably"));
        assert!(answer_is_positive("maybe"));
        assert!(!answer_is_positive(""));
        assert!(!answer_is_positive("no"));
    }

    #[test]
    fn aliased_subtype_is_probed() {
        let query = |mime: &str| if mime == "audio/mp4" { "maybe".to_string() } else { String::new() };
        let mut map = HashMap::new();
        map.insert("m4a".to_string(), "mp4".to_string());
        let exts = vec!["m4a".to_string(), "wav".to_string()];

        let table = build_capability_table(&query, &exts, &map, 2);

        assert!(table.is_playable("m4a"));
        assert!(table.is_playable(".M4A"));
        assert!(!table.is_playable("wav"));
        assert_eq!(table.playable_extensions().collect::<Vec<_>>(), vec!["m4a"]);
    }

    #[test]
    fn fixed_keys_are_not_extensions() {
        let query = |_: &str| "probably".to_string();
        let table = build_capability_table(&query, &[], &HashMap::new(), 2);
        assert!(!table.is_playable("panning"));
        assert_eq!(table.len(), 3);
    }
}
