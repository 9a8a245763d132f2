//! Offline context - a render graph standing in for a browser's audio context

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use dasp_graph::{Buffer, NodeData, Processor};
use hashbrown::HashMap;
use petgraph::graph::NodeIndex;
use rtrb::{Consumer, RingBuffer};
use tracing::trace;

use crate::error::HostError;
use crate::host::{ContextState, GraphMethod, HostContext};

use super::nodes::{BufferData, BufferSource, Compressor, Destination, Gain, RenderNode};

// stable indices: finished sources are removed while other handles stay valid
type RenderGraph = petgraph::stable_graph::StableGraph<NodeData<RenderNode>, ()>;

/// Which API generation an offline context speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiGeneration {
    /// `createGain` / `start` / `stop`
    Modern,
    /// `createGainNode` / `noteGrainOn` / `noteOff` only
    Legacy,
}

/// Whether a context starts running or waits for a gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoplayPolicy {
    Allowed,
    /// Stay suspended until a source is started during user activation
    RequireGesture,
}

/// Shared flag telling contexts whether code is running inside a user gesture.
#[derive(Clone, Debug, Default)]
pub struct UserActivation(Rc<Cell<bool>>);

impl UserActivation {
    pub fn grant(&self) {
        self.0.set(true);
    }

    pub fn revoke(&self) {
        self.0.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.0.get()
    }

    /// Run `f` as if called from a gesture handler.
    pub fn during<R>(&self, f: impl FnOnce() -> R) -> R {
        self.grant();
        let out = f();
        self.revoke();
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Destination,
    Compressor,
    Gain,
    BufferSource,
}

/// Handle to a node in an [`OfflineContext`].
///
/// A buffer source stays in the render graph while any handle to it is alive, or
/// until it has nothing left to play.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OfflineNode {
    index: NodeIndex,
    kind: NodeKind,
    handle: Rc<()>,
}

impl OfflineNode {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// Handle to PCM data owned by an [`OfflineContext`]. Cloning shares the data.
#[derive(Clone, Debug)]
pub struct OfflineBuffer(pub(crate) Rc<BufferData>);

impl OfflineBuffer {
    pub fn channels(&self) -> usize {
        self.0.channels.borrow().len()
    }

    pub fn frames(&self) -> usize {
        self.0.frames()
    }

    pub fn sample_rate(&self) -> f32 {
        self.0.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.0.duration()
    }

    /// `AudioBuffer.copyToChannel`
    pub fn copy_to_channel(&self, channel: usize, samples: &[f32]) -> Result<(), HostError> {
        let mut channels = self.0.channels.borrow_mut();
        let data = channels
            .get_mut(channel)
            .ok_or_else(|| HostError::Script(format!("IndexSizeError: channel {}", channel)))?;
        for (dst, src) in data.iter_mut().zip(samples) {
            *dst = *src;
        }
        Ok(())
    }

    /// Whether every sample is zero.
    pub fn is_silent(&self) -> bool {
        self.0.channels.borrow().iter().flatten().all(|s| *s == 0.0)
    }

    pub fn same_as(&self, other: &OfflineBuffer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct Inner {
    graph: RenderGraph,
    /// Value slot each gain node reads at the start of a block
    gains: HashMap<NodeIndex, Rc<Cell<f32>>>,
    sources: HashMap<NodeIndex, Weak<()>>,
    sources_created: usize,
    processor: Processor<RenderGraph>,
    destination: NodeIndex,
    output: Consumer<f32>,
    state: ContextState,
    frames_rendered: u64,
    gain_writes: usize,
}

/// An audio context rendered in-process, one 64-frame block at a time.
///
/// Counts every entry-point call so tests can see which API generation was used.
pub struct OfflineContext {
    inner: RefCell<Inner>,
    api: ApiGeneration,
    sample_rate: u32,
    channels: u32,
    activation: UserActivation,
    calls: RefCell<HashMap<GraphMethod, usize>>,
}

impl OfflineContext {
    pub fn new(sample_rate: u32, channels: u32, api: ApiGeneration, autoplay: AutoplayPolicy, activation: UserActivation) -> Self {
        let out_channels = channels.max(1) as usize;
        let (producer, consumer) = RingBuffer::<f32>::new(Buffer::LEN * out_channels * 4);

        let mut graph = RenderGraph::with_capacity(64, 64);
        let destination = graph.add_node(NodeData::new(
            RenderNode::Destination(Destination::new(producer, out_channels)),
            vec![Buffer::SILENT; out_channels],
        ));

        let state = match autoplay {
            AutoplayPolicy::Allowed => ContextState::Running,
            AutoplayPolicy::RequireGesture => ContextState::Suspended,
        };

        Self {
            inner: RefCell::new(Inner {
                graph,
                gains: HashMap::new(),
                sources: HashMap::new(),
                sources_created: 0,
                processor: Processor::with_capacity(64),
                destination,
                output: consumer,
                state,
                frames_rendered: 0,
                gain_writes: 0,
            }),
            api,
            sample_rate,
            channels,
            activation,
            calls: RefCell::new(HashMap::new()),
        }
    }

    pub fn api(&self) -> ApiGeneration {
        self.api
    }

    /// How many times `method` was invoked on this context.
    pub fn calls(&self, method: GraphMethod) -> usize {
        self.calls.borrow().get(&method).copied().unwrap_or(0)
    }

    /// How many times any gain value was written.
    pub fn gain_writes(&self) -> usize {
        self.inner.borrow().gain_writes
    }

    pub fn node_count(&self) -> usize {
        self.inner.borrow().graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.borrow().graph.edge_count()
    }

    /// Whether `from` feeds directly into `to`.
    pub fn is_connected(&self, from: &OfflineNode, to: &OfflineNode) -> bool {
        self.inner.borrow().graph.find_edge(from.index, to.index).is_some()
    }

    /// Number of buffer sources created so far, including collected ones.
    pub fn sources_created(&self) -> usize {
        self.inner.borrow().sources_created
    }

    /// Buffer sources still in the render graph.
    pub fn live_sources(&self) -> usize {
        self.inner.borrow().sources.len()
    }

    /// Whether a buffer source has played to its end or been stopped.
    pub fn source_ended(&self, source: &OfflineNode) -> bool {
        let inner = self.inner.borrow();
        match inner.graph.node_weight(source.index).map(|d| &d.node) {
            Some(RenderNode::BufferSource(src)) => src.has_ended(),
            _ => false,
        }
    }

    /// The buffer currently assigned to a source.
    pub fn source_buffer(&self, source: &OfflineNode) -> Option<OfflineBuffer> {
        let inner = self.inner.borrow();
        match inner.graph.node_weight(source.index).map(|d| &d.node) {
            Some(RenderNode::BufferSource(src)) => src.buffer.clone().map(OfflineBuffer),
            _ => None,
        }
    }

    /// `AudioContext.resume()`
    pub fn resume(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state != ContextState::Closed {
            inner.state = ContextState::Running;
        }
    }

    pub fn current_time(&self) -> f64 {
        self.inner.borrow().frames_rendered as f64 / self.sample_rate as f64
    }

    /// Render one block. Returns interleaved samples, or `None` while not running.
    pub fn render_block(&self) -> Option<Vec<f32>> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.state != ContextState::Running {
            return None;
        }
        inner.processor.process(&mut inner.graph, inner.destination);
        inner.frames_rendered += Buffer::LEN as u64;
        Self::collect_sources(inner);

        let mut out = Vec::with_capacity(Buffer::LEN * self.channels.max(1) as usize);
        while let Ok(sample) = inner.output.pop() {
            out.push(sample);
        }
        Some(out)
    }

    /// Render `blocks` blocks back to back.
    pub fn render(&self, blocks: usize) -> Vec<f32> {
        (0..blocks).filter_map(|_| self.render_block()).flatten().collect()
    }

    /// Drop sources nobody holds a handle to once they have nothing left to play.
    fn collect_sources(inner: &mut Inner) {
        let graph = &mut inner.graph;
        let finished: Vec<NodeIndex> = inner
            .sources
            .iter()
            .filter(|(_, handle)| handle.strong_count() == 0)
            .filter(|(index, _)| match graph.node_weight(**index).map(|d| &d.node) {
                Some(RenderNode::BufferSource(src)) => src.is_finished(),
                _ => true,
            })
            .map(|(index, _)| *index)
            .collect();

        if finished.is_empty() {
            return;
        }
        for index in &finished {
            inner.sources.remove(index);
            graph.remove_node(*index);
        }
        trace!(removed = finished.len(), live = inner.sources.len(), "offline sources collected");
    }

    fn record(&self, method: GraphMethod) {
        *self.calls.borrow_mut().entry(method).or_insert(0) += 1;
    }

    fn speaks(&self, method: GraphMethod) -> bool {
        match self.api {
            ApiGeneration::Modern => matches!(method, GraphMethod::CreateGain | GraphMethod::Start | GraphMethod::Stop),
            ApiGeneration::Legacy => matches!(
                method,
                GraphMethod::CreateGainNode | GraphMethod::NoteGrainOn | GraphMethod::NoteOff
            ),
        }
    }

    fn require(&self, method: GraphMethod) -> Result<(), HostError> {
        if !self.speaks(method) {
            return Err(HostError::Unsupported(method));
        }
        self.record(method);
        Ok(())
    }

    fn add_node(&self, node: RenderNode, kind: NodeKind) -> OfflineNode {
        let channels = self.channels.max(1) as usize;
        let index = self
            .inner
            .borrow_mut()
            .graph
            .add_node(NodeData::new(node, vec![Buffer::SILENT; channels]));
        trace!(?kind, index = index.index(), "offline node added");
        OfflineNode {
            index,
            kind,
            handle: Rc::new(()),
        }
    }

    fn add_gain(&self) -> OfflineNode {
        let value = Rc::new(Cell::new(1.0));
        let node = self.add_node(RenderNode::Gain(Gain::new(Rc::clone(&value))), NodeKind::Gain);
        self.inner.borrow_mut().gains.insert(node.index, value);
        node
    }

    fn with_source<R>(&self, source: &OfflineNode, f: impl FnOnce(&mut BufferSource, u64) -> R) -> Result<R, HostError> {
        let mut inner = self.inner.borrow_mut();
        let now = inner.frames_rendered;
        match inner.graph.node_weight_mut(source.index).map(|d| &mut d.node) {
            Some(RenderNode::BufferSource(src)) => Ok(f(src, now)),
            _ => Err(HostError::Graph(format!("{:?} is not a buffer source", source.kind))),
        }
    }

    fn schedule(&self, source: &OfflineNode, when: f64, offset: f64, duration: Option<f64>) -> Result<(), HostError> {
        self.with_source(source, |src, _| src.schedule(when, offset, duration))?;

        // starting a sound inside a gesture is what lifts the autoplay block
        let mut inner = self.inner.borrow_mut();
        if inner.state == ContextState::Suspended && self.activation.is_active() {
            inner.state = ContextState::Running;
            trace!("offline context resumed by user activation");
        }
        Ok(())
    }

    fn halt(&self, source: &OfflineNode, when: f64) -> Result<(), HostError> {
        let rate = self.sample_rate as f64;
        self.with_source(source, |src, now| {
            src.stop_frame = Some(((when * rate).round() as u64).max(now));
        })
    }
}

impl HostContext for OfflineContext {
    type Node = OfflineNode;
    type Buffer = OfflineBuffer;

    fn state(&self) -> ContextState {
        self.inner.borrow().state
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }

    fn output_channels(&self) -> u32 {
        self.channels
    }

    fn destination(&self) -> OfflineNode {
        OfflineNode {
            index: self.inner.borrow().destination,
            kind: NodeKind::Destination,
            handle: Rc::new(()),
        }
    }

    fn exposes(&self, method: GraphMethod) -> bool {
        self.speaks(method)
    }

    fn create_dynamics_compressor(&self) -> Result<OfflineNode, HostError> {
        Ok(self.add_node(RenderNode::Compressor(Compressor::new(self.sample_rate)), NodeKind::Compressor))
    }

    fn create_buffer(&self, channels: u32, frames: u32, sample_rate: f32) -> Result<OfflineBuffer, HostError> {
        if channels == 0 || frames == 0 || sample_rate <= 0.0 {
            return Err(HostError::Script(format!(
                "NotSupportedError: createBuffer({}, {}, {})",
                channels, frames, sample_rate
            )));
        }
        Ok(OfflineBuffer(Rc::new(BufferData {
            sample_rate,
            channels: RefCell::new(vec![vec![0.0; frames as usize]; channels as usize]),
        })))
    }

    fn create_buffer_source(&self) -> Result<OfflineNode, HostError> {
        // a suspended context never renders, so collect here too
        Self::collect_sources(&mut self.inner.borrow_mut());

        let clock = self.inner.borrow().frames_rendered;
        let node = self.add_node(
            RenderNode::BufferSource(BufferSource::new(clock, self.sample_rate as f32)),
            NodeKind::BufferSource,
        );
        let mut inner = self.inner.borrow_mut();
        inner.sources.insert(node.index, Rc::downgrade(&node.handle));
        inner.sources_created += 1;
        Ok(node)
    }

    fn set_source_buffer(&self, source: &OfflineNode, buffer: &OfflineBuffer) -> Result<(), HostError> {
        let data = Rc::clone(&buffer.0);
        self.with_source(source, move |src, _| src.buffer = Some(data))
    }

    fn connect(&self, from: &OfflineNode, to: &OfflineNode) -> Result<(), HostError> {
        if from.kind == NodeKind::Destination || to.kind == NodeKind::BufferSource {
            return Err(HostError::Graph(format!("cannot connect {:?} to {:?}", from.kind, to.kind)));
        }
        self.inner.borrow_mut().graph.add_edge(from.index, to.index, ());
        Ok(())
    }

    fn gain_value(&self, gain: &OfflineNode) -> f32 {
        self.inner
            .borrow()
            .gains
            .get(&gain.index)
            .map_or(0.0, |value| value.get())
    }

    fn set_gain_value(&self, gain: &OfflineNode, value: f32) -> Result<(), HostError> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        inner
            .gains
            .get(&gain.index)
            .ok_or_else(|| HostError::Graph(format!("{:?} has no gain parameter", gain.kind)))?
            .set(value);
        inner.gain_writes += 1;
        Ok(())
    }

    fn source_duration(&self, source: &OfflineNode) -> Option<f64> {
        self.source_buffer(source).map(|b| b.duration())
    }

    fn create_gain(&self) -> Result<OfflineNode, HostError> {
        self.require(GraphMethod::CreateGain)?;
        Ok(self.add_gain())
    }

    fn create_gain_node(&self) -> Result<OfflineNode, HostError> {
        self.require(GraphMethod::CreateGainNode)?;
        Ok(self.add_gain())
    }

    fn start(&self, source: &OfflineNode, when: f64, offset: f64, duration: Option<f64>) -> Result<(), HostError> {
        self.require(GraphMethod::Start)?;
        self.schedule(source, when, offset, duration)
    }

    fn note_grain_on(&self, source: &OfflineNode, when: f64, offset: f64, duration: f64) -> Result<(), HostError> {
        self.require(GraphMethod::NoteGrainOn)?;
        self.schedule(source, when, offset, Some(duration))
    }

    fn stop(&self, source: &OfflineNode, when: f64) -> Result<(), HostError> {
        self.require(GraphMethod::Stop)?;
        self.halt(source, when)
    }

    fn note_off(&self, source: &OfflineNode, when: f64) -> Result<(), HostError> {
        self.require(GraphMethod::NoteOff)?;
        self.halt(source, when)
    }
}
