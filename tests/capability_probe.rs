mod common;

use soundgate::config::DEFAULT_PROBE_RESOURCE;
use soundgate::host::{ContextConstructor, Origin, Platform};
use soundgate::offline::OfflineHost;
use soundgate::probe::{self, UNBOUNDED_TRACKS};
use soundgate::{Capability, PluginConfig, UnsupportedReason};

fn local_desktop() -> soundgate::offline::OfflineHostBuilder {
    OfflineHost::builder().origin(Origin::LocalFile).platform(Platform::Desktop)
}

#[test]
fn network_pages_skip_the_probe_request() {
    let host = OfflineHost::builder().probe_error("blocked").build();
    assert!(probe::is_environment_usable(&host, DEFAULT_PROBE_RESOURCE));
    assert_eq!(host.probes_issued(), 0);
}

#[test]
fn mobile_hosts_tolerate_local_files() {
    for platform in [Platform::Ios, Platform::Android, Platform::Blackberry] {
        let host = OfflineHost::builder()
            .origin(Origin::LocalFile)
            .platform(platform)
            .probe_error("blocked")
            .build();
        assert!(probe::is_environment_usable(&host, DEFAULT_PROBE_RESOURCE), "{:?}", platform);
        assert_eq!(host.probes_issued(), 0);
    }
}

#[test]
fn local_desktop_pages_are_decided_by_the_probe() {
    let cases = [
        (local_desktop().probe_response(404, ""), true),
        (local_desktop().probe_response(200, "oops, it exists"), true),
        (local_desktop().probe_response(0, "<html>"), true),
        (local_desktop().probe_response(0, ""), false),
        (local_desktop().probe_response(500, ""), false),
        (local_desktop().probe_error("NetworkError"), false),
    ];

    for (builder, expected) in cases {
        let host = builder.build();
        assert_eq!(probe::is_environment_usable(&host, DEFAULT_PROBE_RESOURCE), expected);
        assert_eq!(host.probes_issued(), 1);
    }
}

#[test]
fn unusable_environment_builds_nothing() {
    let host = local_desktop().probe_error("NetworkError").codecs(["audio/mp3"]).build();
    let mut plugin = common::plugin(host);

    assert!(!plugin.check_support());
    assert_eq!(plugin.host().contexts_constructed(), 0);
    assert!(plugin.capabilities().is_none());
    assert!(plugin.context().is_none());
}

#[test]
fn stereo_table_is_exact() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());

    let table = plugin.capabilities().unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.get("panning"), Some(Capability::Flag(true)));
    assert_eq!(table.get("volume"), Some(Capability::Flag(true)));
    assert_eq!(table.get("tracks"), Some(Capability::Count(UNBOUNDED_TRACKS)));
    assert_eq!(table.get("mp3"), Some(Capability::Flag(true)));
    assert_eq!(table.get("ogg"), Some(Capability::Flag(false)));
    assert_eq!(plugin.capability("tracks").and_then(|c| c.as_count()), Some(-1));
}

#[test]
fn mono_output_disables_panning() {
    let host = OfflineHost::builder().channels(1).codecs(["audio/ogg"]).build();
    let mut plugin = common::plugin(host);

    assert!(plugin.check_support());
    let table = plugin.capabilities().unwrap();
    assert!(!table.panning());
    assert!(table.volume());
    assert!(table.is_playable("ogg"));
}

#[test]
fn default_extensions_use_the_m4a_alias() {
    let host = OfflineHost::builder()
        .codec_answer("audio/mp4", "maybe")
        .codec_answer("audio/wav", "no")
        .codec_answer("audio/mpeg", "probably")
        .build();
    let mut plugin = common::plugin(host);
    assert!(plugin.check_support());

    let table = plugin.capabilities().unwrap();
    let playable: Vec<_> = table.playable_extensions().collect();
    assert_eq!(playable, vec!["mpeg", "m4a", "mp4"]);
    assert!(!table.is_playable("wav"));
    assert_eq!(table.len(), 13);
}

#[test]
fn duplicate_extensions_are_probed_once() {
    let host = OfflineHost::builder().codecs(["audio/mp3"]).build();
    let config = PluginConfig::default().with_extensions(["mp3", "ogg", "mp3"]);
    let mut plugin = soundgate::AudioPlugin::new(host, config);

    assert!(plugin.check_support());
    let table = plugin.capabilities().unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.playable_extensions().collect::<Vec<_>>(), vec!["mp3"]);
}

#[test]
fn missing_codec_query_is_remembered() {
    let host = OfflineHost::builder().no_codec_query().build();
    let mut plugin = common::plugin(host);

    assert!(!plugin.check_support());
    assert_eq!(plugin.unsupported_reason(), Some(&UnsupportedReason::NoCodecQuery));
    assert!(!plugin.check_support());
    assert_eq!(plugin.host().contexts_constructed(), 0);
}

#[test]
fn no_context_constructor() {
    let host = OfflineHost::builder().constructors([]).codecs(["audio/mp3"]).build();
    let mut plugin = common::plugin(host);

    assert!(!plugin.check_support());
    assert_eq!(plugin.unsupported_reason(), Some(&UnsupportedReason::NoContextConstructor));
    assert!(plugin.capabilities().is_none());
}

#[test]
fn prefixed_constructor_is_the_fallback() {
    let host = OfflineHost::builder()
        .constructors([ContextConstructor::Prefixed])
        .codecs(["audio/mp3"])
        .build();
    let mut plugin = common::plugin(host);

    assert!(plugin.check_support());
    assert_eq!(plugin.host().contexts_constructed(), 1);
}

#[test]
fn environment_check_is_not_repeated() {
    let host = local_desktop().probe_response(404, "").codecs(["audio/mp3"]).build();
    let mut plugin = common::plugin(host);

    for _ in 0..3 {
        assert!(plugin.check_support());
    }
    assert_eq!(plugin.host().probes_issued(), 1);
}

#[test]
fn failed_environment_check_is_remembered() {
    let host = local_desktop().probe_error("NetworkError").codecs(["audio/mp3"]).build();
    let mut plugin = common::plugin(host);

    for _ in 0..3 {
        assert!(!plugin.check_support());
    }
    assert_eq!(plugin.host().probes_issued(), 1);
    assert_eq!(plugin.host().contexts_constructed(), 0);
}

#[test]
fn one_codec_query_serves_the_whole_table() {
    let host = OfflineHost::builder().codecs(["audio/mp3", "audio/ogg; codecs=\"vorbis\""]).build();
    let mut plugin = common::plugin(host);

    assert!(plugin.check_support());
    assert!(plugin.check_support());
    assert_eq!(plugin.host().codec_queries_made(), 1);
    assert!(plugin.capabilities().unwrap().is_playable("mp3"));
}
