mod common;

use soundgate::host::HostContext;
use soundgate::offline::{Compressor, OfflineHost, OfflineNode};
use soundgate::AudioPlugin;

const QUIET: f32 = 0.01;

/// Route a mono clip of `frames` samples at `level` into the master gain and start it.
fn play_clip(plugin: &AudioPlugin<OfflineHost>, level: f32, frames: usize) -> OfflineNode {
    let shared = plugin.instance_shared().unwrap();
    let ctx = shared.context.get();

    let clip = ctx.create_buffer(1, frames as u32, 48000.0).unwrap();
    clip.copy_to_channel(0, &vec![level; frames]).unwrap();

    let source = ctx.create_buffer_source().unwrap();
    ctx.set_source_buffer(&source, &clip).unwrap();
    ctx.connect(&source, &shared.destination).unwrap();
    shared.vocabulary.start(ctx, &source, 0.0, 0.0, None).unwrap();
    source
}

#[test]
fn output_is_scaled_by_the_master_gain() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());
    play_clip(&plugin, QUIET, 256);
    plugin.set_volume(0.5).unwrap();

    let out = common::context(&plugin).render(4);

    // 4 blocks of 64 stereo frames
    assert_eq!(out.len(), 512);
    for frame in out.chunks(2) {
        assert!((frame[0] - QUIET * 0.5).abs() < 1e-6, "{:?}", frame);
        assert_eq!(frame[0], frame[1]);
    }
}

#[test]
fn muted_output_is_silent() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());
    play_clip(&plugin, QUIET, 256);
    plugin.set_mute(true).unwrap();

    let out = common::context(&plugin).render(4);
    assert!(out.iter().all(|s| *s == 0.0));
}

#[test]
fn finished_sources_fall_silent() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());
    let source = play_clip(&plugin, QUIET, 100);

    let out = common::context(&plugin).render(2);

    assert!((out[2 * 99] - QUIET).abs() < 1e-6);
    assert!(out[2 * 100..].iter().all(|s| *s == 0.0));
    assert!(common::context(&plugin).source_ended(&source));
}

#[test]
fn loud_signals_are_compressed() {
    let mut plugin = common::mp3_plugin();
    assert!(plugin.check_support());
    play_clip(&plugin, 1.0, 4096);

    let out = common::context(&plugin).render(64);
    let settled = out[2 * 4000];

    // -24 dB threshold at 12:1 leaves a full-scale input near -22 dB
    assert!(settled > 0.0 && settled < 0.1, "{}", settled);
    assert!((settled - 0.079).abs() < 0.01, "{}", settled);
}

#[test]
fn compressor_curve_matches_web_audio_defaults() {
    let compressor = Compressor::new(48000);

    assert_eq!(compressor.curve(-60.0), -60.0);
    assert!((compressor.curve(0.0) - -22.0).abs() < 1e-4);
    // inside the knee the curve bends but stays monotonic
    assert!(compressor.curve(-30.0) < -30.0);
    assert!(compressor.curve(-30.0) > compressor.curve(-31.0));
}

#[test]
fn render_block_matches_device_format() {
    let device = soundgate::OutputDevice::new("test output", 44100, 1);
    let host = OfflineHost::builder().device(&device).codecs(["audio/mp3"]).build();
    let mut plugin = common::plugin(host);
    assert!(plugin.check_support());

    let ctx = common::context(&plugin);
    assert_eq!(ctx.sample_rate(), 44100.0);
    assert_eq!(ctx.render_block().map(|block| block.len()), Some(64));
    assert!((ctx.current_time() - 64.0 / 44100.0).abs() < 1e-9);
    assert!(!plugin.capabilities().unwrap().panning());
}
