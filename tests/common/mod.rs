#![allow(dead_code)]

use soundgate::offline::{OfflineContext, OfflineHost};
use soundgate::{AudioPlugin, InstanceShared, LoaderClass, PlaybackInstanceClass, PluginConfig, SharedContext};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn plugin(host: OfflineHost) -> AudioPlugin<OfflineHost> {
    init_tracing();
    AudioPlugin::new(host, PluginConfig::default())
}

/// Supported desktop page that can play mp3 only.
pub fn mp3_plugin() -> AudioPlugin<OfflineHost> {
    let host = OfflineHost::builder().codecs(["audio/mp3"]).build();
    init_tracing();
    AudioPlugin::new(host, PluginConfig::default().with_extensions(["mp3", "ogg"]))
}

pub fn context(plugin: &AudioPlugin<OfflineHost>) -> &OfflineContext {
    plugin.context().expect("context was created").get()
}

#[derive(Default)]
pub struct RecordingInstances {
    pub installs: usize,
    pub shared: Option<InstanceShared<OfflineContext>>,
}

impl PlaybackInstanceClass<OfflineContext> for RecordingInstances {
    fn install_shared(&mut self, shared: InstanceShared<OfflineContext>) {
        self.installs += 1;
        self.shared = Some(shared);
    }
}

#[derive(Default)]
pub struct RecordingLoader {
    pub installs: usize,
    pub context: Option<SharedContext<OfflineContext>>,
}

impl LoaderClass<OfflineContext> for RecordingLoader {
    fn install_context(&mut self, context: SharedContext<OfflineContext>) {
        self.installs += 1;
        self.context = Some(context);
    }
}
