//! One node vocabulary over both generations of the Web Audio API.
//!
//! Old WebKit builds only know `createGainNode`, `noteGrainOn` and `noteOff`; current
//! browsers only know `createGain`, `start` and `stop`. [`reconcile_api_generation`]
//! looks at the context once and picks a [`GraphApi`] that speaks the right dialect,
//! so the rest of the crate only ever says `create_gain`, `start` and `stop`.

use core::fmt;

use tracing::debug;

use crate::error::HostError;
use crate::host::{GraphMethod, HostContext};

/// The panning model handed to playback instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanningModel {
    /// `"equalpower"`
    EqualPower,
    /// The numeric constant `0`, which deprecated panners use for equal power
    LegacyEqualPower,
}

impl PanningModel {
    /// Numeric form for deprecated panners.
    pub fn legacy_code(&self) -> Option<u16> {
        match self {
            PanningModel::EqualPower => None,
            PanningModel::LegacyEqualPower => Some(0),
        }
    }
}

impl fmt::Display for PanningModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanningModel::EqualPower => f.write_str("equalpower"),
            PanningModel::LegacyEqualPower => f.write_str("0"),
        }
    }
}

/// Calls for contexts that expose the current API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModernApi;

impl ModernApi {
    fn create_gain<C: HostContext>(&self, ctx: &C) -> Result<C::Node, HostError> {
        ctx.create_gain()
    }

    fn start<C: HostContext>(
        &self,
        ctx: &C,
        source: &C::Node,
        when: f64,
        offset: f64,
        duration: Option<f64>,
    ) -> Result<(), HostError> {
        ctx.start(source, when, offset, duration)
    }

    fn stop<C: HostContext>(&self, ctx: &C, source: &C::Node, when: f64) -> Result<(), HostError> {
        ctx.stop(source, when)
    }
}

/// Calls for contexts that only expose the deprecated API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LegacyApi;

impl LegacyApi {
    fn create_gain<C: HostContext>(&self, ctx: &C) -> Result<C::Node, HostError> {
        ctx.create_gain_node()
    }

    fn start<C: HostContext>(
        &self,
        ctx: &C,
        source: &C::Node,
        when: f64,
        offset: f64,
        duration: Option<f64>,
    ) -> Result<(), HostError> {
        // noteGrainOn has no defaults for its trailing arguments
        let duration = duration
            .or_else(|| ctx.source_duration(source).map(|total| (total - offset).max(0.0)))
            .unwrap_or(0.0);
        ctx.note_grain_on(source, when, offset, duration)
    }

    fn stop<C: HostContext>(&self, ctx: &C, source: &C::Node, when: f64) -> Result<(), HostError> {
        ctx.note_off(source, when)
    }
}

/// The vocabulary chosen for a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphApi {
    Modern(ModernApi),
    Legacy(LegacyApi),
}

impl GraphApi {
    pub fn is_legacy(&self) -> bool {
        matches!(self, GraphApi::Legacy(_))
    }

    pub fn panning_model(&self) -> PanningModel {
        match self {
            GraphApi::Modern(_) => PanningModel::EqualPower,
            GraphApi::Legacy(_) => PanningModel::LegacyEqualPower,
        }
    }

    /// Build a gain node.
    pub fn create_gain<C: HostContext>(&self, ctx: &C) -> Result<C::Node, HostError> {
        match self {
            GraphApi::Modern(api) => api.create_gain(ctx),
            GraphApi::Legacy(api) => api.create_gain(ctx),
        }
    }

    /// Start a buffer source. `duration: None` plays to the end of the buffer.
    pub fn start<C: HostContext>(
        &self,
        ctx: &C,
        source: &C::Node,
        when: f64,
        offset: f64,
        duration: Option<f64>,
    ) -> Result<(), HostError> {
        match self {
            GraphApi::Modern(api) => api.start(ctx, source, when, offset, duration),
            GraphApi::Legacy(api) => api.start(ctx, source, when, offset, duration),
        }
    }

    pub fn stop<C: HostContext>(&self, ctx: &C, source: &C::Node, when: f64) -> Result<(), HostError> {
        match self {
            GraphApi::Modern(api) => api.stop(ctx, source, when),
            GraphApi::Legacy(api) => api.stop(ctx, source, when),
        }
    }
}

/// Pick the vocabulary for `ctx`.
///
/// If `createGain` is there, the whole current API is assumed to be there too.
/// The probe has no side effects, so calling it again yields the same answer.
pub fn reconcile_api_generation<C: HostContext>(ctx: &C) -> GraphApi {
    let api = if ctx.exposes(GraphMethod::CreateGain) {
        GraphApi::Modern(ModernApi)
    } else {
        GraphApi::Legacy(LegacyApi)
    };
    debug!(legacy = api.is_legacy(), panning = %api.panning_model(), "reconciled graph API");
    api
}
