mod common;

use common::{RecordingInstances, RecordingLoader};
use soundgate::host::HostContext;
use soundgate::offline::OfflineHost;
use soundgate::{
    AudioPlugin, GraphError, MasterVolume, PanningModel, PluginConfig, PluginError, ScratchSpec, UnlockState,
};

#[test]
fn end_to_end_mp3_only_desktop() {
    let mut plugin = common::mp3_plugin();

    assert!(plugin.check_support());
    assert_eq!(plugin.unlock_state(), UnlockState::Unlocked);

    let table = plugin.capabilities().unwrap();
    assert!(table.panning());
    assert!(table.volume());
    assert_eq!(table.tracks(), -1);
    assert!(table.is_playable("mp3"));
    assert!(!table.is_playable("ogg"));

    let mut instances = RecordingInstances::default();
    let mut loader = RecordingLoader::default();
    assert_eq!(plugin.publish_shared_state(&mut instances, &mut loader), Ok(true));
    assert_eq!(plugin.publish_shared_state(&mut instances, &mut loader), Ok(false));
    assert!(plugin.is_published());
    assert_eq!(instances.installs, 1);
    assert_eq!(loader.installs, 1);

    let shared = instances.shared.unwrap();
    let context = plugin.context().unwrap();
    assert!(shared.context.same_as(context));
    assert!(loader.context.unwrap().same_as(context));
    assert_eq!(&shared.destination, plugin.master_gain().unwrap());
    assert_eq!(shared.panning_model, PanningModel::EqualPower);
    assert!(!shared.vocabulary.is_legacy());
}

#[test]
fn detection_runs_once() {
    let mut plugin = common::mp3_plugin();

    assert!(plugin.check_support());
    let table = plugin.capabilities().cloned();
    assert!(plugin.check_support());

    assert_eq!(plugin.host().contexts_constructed(), 1);
    assert_eq!(plugin.capabilities().cloned(), table);

    let ctx = common::context(&plugin);
    assert_eq!(ctx.node_count(), 3);
    assert_eq!(ctx.edge_count(), 2);
}

#[test]
fn signal_chain_is_gain_into_compressor_into_destination() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());

    let ctx = common::context(&plugin);
    let gain = plugin.master_gain().unwrap();
    let compressor = plugin.compressor().unwrap();
    assert!(ctx.is_connected(compressor, &ctx.destination()));
    assert!(ctx.is_connected(gain, compressor));
    assert!(!ctx.is_connected(gain, &ctx.destination()));
}

#[test]
fn nothing_is_published_before_support_is_known() {
    let host = OfflineHost::builder().codecs(["audio/mp3"]).build();
    let mut plugin = common::plugin(host);
    let mut instances = RecordingInstances::default();
    let mut loader = RecordingLoader::default();

    assert_eq!(
        plugin.publish_shared_state(&mut instances, &mut loader),
        Err(PluginError::NotReady)
    );
    assert_eq!(plugin.set_master_volume(0.5), Err(PluginError::NotReady));
    assert_eq!(instances.installs, 0);
    assert_eq!(loader.installs, 0);
    assert!(plugin.instance_shared().is_none());
}

#[test]
fn volume_and_mute_only_write_changes() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());
    let gain = plugin.master_gain().cloned().unwrap();
    let writes = |p: &AudioPlugin<OfflineHost>| common::context(p).gain_writes();

    // default volume already matches a fresh gain node
    assert_eq!(writes(&plugin), 0);

    assert_eq!(plugin.set_volume(0.5), Ok(true));
    assert_eq!(plugin.set_volume(0.5), Ok(false));
    assert_eq!(common::context(&plugin).gain_value(&gain), 0.5);
    assert_eq!(writes(&plugin), 1);

    assert_eq!(plugin.set_mute(true), Ok(true));
    assert_eq!(common::context(&plugin).gain_value(&gain), 0.0);
    assert_eq!(plugin.set_volume(0.8), Ok(false));
    assert_eq!(common::context(&plugin).gain_value(&gain), 0.0);

    assert_eq!(plugin.set_mute(false), Ok(true));
    assert_eq!(common::context(&plugin).gain_value(&gain), 0.8);
    assert_eq!(writes(&plugin), 3);
    assert_eq!(plugin.master_volume(), MasterVolume { volume: 0.8, muted: false });
}

#[test]
fn volume_changes_on_a_suspended_context_never_back_up() {
    let host = OfflineHost::builder().ios().codecs(["audio/mp3"]).build();
    let mut plugin = common::plugin(host);
    assert!(plugin.check_support());
    assert_eq!(plugin.unlock_state(), UnlockState::Locked);

    for i in 0..150 {
        let volume = if i % 2 == 0 { 0.2 } else { 0.9 };
        assert_eq!(plugin.set_volume(volume), Ok(true), "write {}", i);
    }

    let ctx = common::context(&plugin);
    assert!(ctx.render_block().is_none());
    assert_eq!(ctx.gain_writes(), 150);
    assert_eq!(ctx.gain_value(plugin.master_gain().unwrap()), 0.9);
}

#[test]
fn set_master_volume_compares_against_the_node() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());

    assert_eq!(plugin.set_master_volume(1.0), Ok(false));
    assert_eq!(plugin.set_master_volume(0.3), Ok(true));
    assert_eq!(plugin.set_master_volume(0.3), Ok(false));
    assert_eq!(common::context(&plugin).gain_writes(), 1);
}

#[test]
fn volume_set_early_is_applied_when_the_chain_is_built() {
    let host = OfflineHost::builder().codecs(["audio/mp3"]).build();
    let mut plugin = AudioPlugin::new(host, PluginConfig::default().with_initial_volume(0.25));

    assert_eq!(plugin.set_mute(true), Ok(false));
    assert!(plugin.is_muted());
    assert!(plugin.check_support());

    let gain = plugin.master_gain().unwrap();
    assert_eq!(common::context(&plugin).gain_value(gain), 0.0);

    assert_eq!(plugin.set_mute(false), Ok(true));
    let gain = plugin.master_gain().unwrap();
    assert_eq!(common::context(&plugin).gain_value(gain), 0.25);
    assert_eq!(plugin.volume(), 0.25);
}

#[test]
fn adopted_context_is_used_instead_of_constructing_one() {
    let host = OfflineHost::builder().codecs(["audio/mp3"]).sample_rate(44100).build();
    let external = host.new_context();
    let mut plugin = common::plugin(host);

    let handle = plugin.adopt_context(external).unwrap();
    assert!(plugin.check_support());

    assert_eq!(plugin.host().contexts_constructed(), 0);
    assert!(handle.same_as(plugin.context().unwrap()));
    assert_eq!(handle.sample_rate(), 44100.0);
}

#[test]
fn second_context_is_rejected() {
    let host = OfflineHost::builder().codecs(["audio/mp3"]).build();
    let first = host.new_context();
    let second = host.new_context();
    let mut plugin = common::plugin(host);

    plugin.adopt_context(first).unwrap();
    assert_eq!(
        plugin.adopt_context(second).err(),
        Some(PluginError::Graph(GraphError::ContextAlreadyInstalled))
    );
}

#[test]
fn context_after_detection_is_rejected() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());

    let late = plugin.host().new_context();
    assert_eq!(
        plugin.adopt_context(late).err(),
        Some(PluginError::Graph(GraphError::ContextAlreadyInstalled))
    );
    assert_eq!(plugin.context().unwrap().handle_count(), 1);
}

#[test]
fn scratch_buffer_shape() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());
    let scratch = plugin.scratch_buffer().unwrap().buffer();
    assert_eq!((scratch.channels(), scratch.frames()), (1, 1));
    assert_eq!(scratch.sample_rate(), 22050.0);
    assert!(scratch.is_silent());

    let host = OfflineHost::builder().codecs(["audio/mp3"]).build();
    let config = PluginConfig::default().with_scratch(ScratchSpec::matching_context());
    let mut plugin = AudioPlugin::new(host, config);
    assert!(plugin.check_support());
    assert_eq!(plugin.scratch_buffer().unwrap().buffer().sample_rate(), 48000.0);
}

#[test]
fn retire_source_stops_and_swaps_the_buffer() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());
    let shared = plugin.instance_shared().unwrap();
    let ctx = shared.context.get();

    let source = ctx.create_buffer_source().unwrap();
    let clip = ctx.create_buffer(1, 48000, 48000.0).unwrap();
    clip.copy_to_channel(0, &[0.1; 512]).unwrap();
    ctx.set_source_buffer(&source, &clip).unwrap();
    ctx.connect(&source, &shared.destination).unwrap();
    shared.vocabulary.start(ctx, &source, 0.0, 0.0, None).unwrap();

    shared.retire_source(&source).unwrap();
    ctx.render(1);

    assert!(ctx.source_ended(&source));
    assert!(ctx.source_buffer(&source).unwrap().same_as(shared.scratch_buffer.buffer()));
}

#[test]
fn displays_like_the_engine_expects() {
    let plugin = common::mp3_plugin();
    assert_eq!(plugin.to_string(), "[WebAudioPlugin]");
}
