//! Audio graph - owns the shared context and the master signal chain

use tracing::{debug, info, warn};

use crate::compat::{reconcile_api_generation, GraphApi};
use crate::config::ScratchSpec;
use crate::error::{GraphError, HostError};
use crate::host::{AudioHost, ContextConstructor, ContextState, HostContext};
use crate::shared::{ScratchBuffer, SharedContext, SignalChain};

/// The shared context, its vocabulary and the nodes built on it.
///
/// Every piece is created at most once; the getters build on first use and hand out
/// the same value afterwards.
pub struct AudioGraph<C: HostContext> {
    context: Option<SharedContext<C>>,
    api: Option<GraphApi>,
    chain: Option<SignalChain<C::Node>>,
    scratch: Option<ScratchBuffer<C::Buffer>>,
}

impl<C: HostContext> Default for AudioGraph<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: HostContext> AudioGraph<C> {
    pub fn new() -> Self {
        Self {
            context: None,
            api: None,
            chain: None,
            scratch: None,
        }
    }

    /// Install a context created outside the plugin. Only possible before one exists.
    pub fn adopt_context(&mut self, context: C) -> Result<SharedContext<C>, GraphError> {
        if self.context.is_some() {
            return Err(GraphError::ContextAlreadyInstalled);
        }
        let shared = SharedContext::new(context);
        info!("adopted external audio context");
        self.context = Some(shared.clone());
        Ok(shared)
    }

    /// Get the shared context, constructing it on the first call.
    ///
    /// `None` means the host has no usable constructor.
    pub fn get_or_create_context<H>(&mut self, host: &H) -> Option<SharedContext<C>>
    where
        H: AudioHost<Context = C>,
    {
        if let Some(ctx) = &self.context {
            return Some(ctx.clone());
        }

        let constructor = ContextConstructor::PREFERENCE
            .iter()
            .copied()
            .find(|c| host.exposes_constructor(*c))?;

        match host.construct_context(constructor) {
            Ok(ctx) => {
                let shared = SharedContext::new(ctx);
                info!(
                    constructor = constructor.global_name(),
                    sample_rate = shared.sample_rate(),
                    channels = shared.output_channels(),
                    "created audio context"
                );
                self.context = Some(shared.clone());
                Some(shared)
            }
            Err(err) => {
                warn!(constructor = constructor.global_name(), %err, "audio context construction failed");
                None
            }
        }
    }

    pub fn context(&self) -> Option<&SharedContext<C>> {
        self.context.as_ref()
    }

    pub fn state(&self) -> Option<ContextState> {
        self.context.as_ref().map(SharedContext::state)
    }

    /// The node vocabulary for this context, chosen on first use.
    pub fn vocabulary(&mut self) -> Result<GraphApi, GraphError> {
        if let Some(api) = self.api {
            return Ok(api);
        }
        let ctx = self.context.as_ref().ok_or(GraphError::NoContext)?;
        let api = reconcile_api_generation(ctx.get());
        self.api = Some(api);
        Ok(api)
    }

    /// The vocabulary, if it has been chosen.
    pub fn api(&self) -> Option<GraphApi> {
        self.api
    }

    /// Build compressor → destination and gain → compressor, once.
    pub fn build_signal_chain(&mut self) -> Result<SignalChain<C::Node>, GraphError> {
        if let Some(chain) = &self.chain {
            return Ok(chain.clone());
        }
        let api = self.vocabulary()?;
        let ctx = self.context.as_ref().ok_or(GraphError::NoContext)?.get();

        let compressor = ctx.create_dynamics_compressor()?;
        ctx.connect(&compressor, &ctx.destination())?;

        let master_gain = api.create_gain(ctx)?;
        ctx.connect(&master_gain, &compressor)?;

        debug!(?compressor, ?master_gain, "wired master signal chain");
        let chain = SignalChain { compressor, master_gain };
        self.chain = Some(chain.clone());
        Ok(chain)
    }

    pub fn signal_chain(&self) -> Option<&SignalChain<C::Node>> {
        self.chain.as_ref()
    }

    /// Get the scratch buffer, creating it on the first call.
    pub fn get_or_create_scratch_buffer(&mut self, shape: &ScratchSpec) -> Result<ScratchBuffer<C::Buffer>, GraphError> {
        if let Some(scratch) = &self.scratch {
            return Ok(scratch.clone());
        }
        let ctx = self.context.as_ref().ok_or(GraphError::NoContext)?;
        let rate = shape.resolve_rate(ctx.sample_rate());
        let buffer = ctx.get().create_buffer(shape.channels, shape.frames, rate)?;
        let scratch = ScratchBuffer::new(buffer);
        self.scratch = Some(scratch.clone());
        Ok(scratch)
    }

    pub fn scratch_buffer(&self) -> Option<&ScratchBuffer<C::Buffer>> {
        self.scratch.as_ref()
    }

    /// Play the scratch buffer straight into the destination.
    ///
    /// Does nothing until a context exists. Touch platforms only allow audio to start
    /// inside a gesture's call stack, so this must run synchronously from the handler.
    pub fn play_probe_sound(&mut self) -> Result<(), GraphError> {
        if self.context.is_none() {
            return Ok(());
        }
        let api = self.vocabulary()?;
        let scratch = self
            .scratch
            .as_ref()
            .ok_or_else(|| HostError::Graph("scratch buffer not created".to_string()))?;
        let ctx = self.context.as_ref().ok_or(GraphError::NoContext)?.get();

        let source = ctx.create_buffer_source()?;
        ctx.set_source_buffer(&source, scratch.buffer())?;
        ctx.connect(&source, &ctx.destination())?;
        api.start(ctx, &source, 0.0, 0.0, Some(0.0))?;
        Ok(())
    }
}
