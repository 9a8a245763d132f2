//! Shared handles and the collaborator boundary.
//!
//! The playback-instance and loader classes of the sound engine do not own any of
//! the audio graph; they receive reference-counted handles to it once, through
//! [`AudioPlugin::publish_shared_state`](crate::AudioPlugin::publish_shared_state).

use std::rc::Rc;

use delegate::delegate;

use crate::compat::{GraphApi, PanningModel};
use crate::error::HostError;
use crate::host::{ContextState, HostContext};

/// Reference to the one audio context. Cloning shares it.
#[derive(Debug)]
pub struct SharedContext<C> {
    inner: Rc<C>,
}

impl<C> Clone for SharedContext<C> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<C> SharedContext<C> {
    pub(crate) fn new(context: C) -> Self {
        Self { inner: Rc::new(context) }
    }

    pub fn get(&self) -> &C {
        &self.inner
    }

    /// Whether both handles point at the same context.
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles, including this one.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl<C: HostContext> SharedContext<C> {
    delegate! {
        to self.inner {
            pub fn state(&self) -> ContextState;
            pub fn sample_rate(&self) -> f32;
            pub fn output_channels(&self) -> u32;
            pub fn destination(&self) -> C::Node;
        }
    }
}

/// The fixed nodes every sound is routed through.
#[derive(Clone, Debug)]
pub struct SignalChain<N> {
    pub compressor: N,
    /// Master volume lives here
    pub master_gain: N,
}

/// Minimal silent buffer used to unlock audio and to park retired sources on.
#[derive(Clone, Debug)]
pub struct ScratchBuffer<B> {
    buffer: B,
}

impl<B> ScratchBuffer<B> {
    pub(crate) fn new(buffer: B) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }
}

/// What a playback-instance class receives.
#[derive(Debug)]
pub struct InstanceShared<C: HostContext> {
    pub context: SharedContext<C>,
    pub scratch_buffer: ScratchBuffer<C::Buffer>,
    /// Node every instance connects its output to: the master gain
    pub destination: C::Node,
    pub panning_model: PanningModel,
    pub vocabulary: GraphApi,
}

impl<C: HostContext> Clone for InstanceShared<C> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            scratch_buffer: self.scratch_buffer.clone(),
            destination: self.destination.clone(),
            panning_model: self.panning_model,
            vocabulary: self.vocabulary,
        }
    }
}

impl<C: HostContext> InstanceShared<C> {
    /// Stop `source` and swap its buffer for the scratch buffer.
    ///
    /// Some WebKit builds throw later if a stopped source keeps its original buffer.
    pub fn retire_source(&self, source: &C::Node) -> Result<(), HostError> {
        let ctx = self.context.get();
        self.vocabulary.stop(ctx, source, 0.0)?;
        ctx.set_source_buffer(source, self.scratch_buffer.buffer())
    }
}

/// The format-specific playback-instance class.
pub trait PlaybackInstanceClass<C: HostContext> {
    fn install_shared(&mut self, shared: InstanceShared<C>);
}

/// The format-specific loader class. Loaders only need the context, to decode into.
pub trait LoaderClass<C: HostContext> {
    fn install_context(&mut self, context: SharedContext<C>);
}
