//! Browser host over `web-sys`.
//!
//! ```no_run
//! use soundgate::PluginConfig;
//! use soundgate::web::WebHost;
//!
//! let plugin = WebHost::shared_plugin(PluginConfig::default()).unwrap();
//! if plugin.borrow_mut().check_support() {
//!     // hand the graph to the sound engine
//! }
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use js_sys::{Array, Function, Reflect};
use tracing::{trace, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    AudioBuffer, AudioBufferSourceNode, AudioContext, AudioNode, Document, Event, GainNode, HtmlMediaElement, Window,
    XmlHttpRequest,
};

use crate::error::HostError;
use crate::host::{
    AudioHost, CodecQuery, ContextConstructor, ContextState, GraphMethod, Gesture, HostContext, Origin, Platform,
    ProbeResponse,
};
use crate::{AudioPlugin, PluginConfig};

/// An [`AudioPlugin`] the gesture listeners can reach.
pub type SharedPlugin = Rc<RefCell<AudioPlugin<WebHost>>>;

type Listener = Closure<dyn FnMut(Event)>;

fn script_error(err: JsValue) -> HostError {
    HostError::Script(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

fn has_function(target: &JsValue, name: &str) -> bool {
    Reflect::get(target, &JsValue::from_str(name))
        .map(|value| value.is_function())
        .unwrap_or(false)
}

/// Call `target[method](...args)`.
fn invoke(target: &JsValue, method: GraphMethod, args: &Array) -> Result<JsValue, HostError> {
    let func: Function = Reflect::get(target, &JsValue::from_str(method.js_name()))
        .map_err(script_error)?
        .dyn_into()
        .map_err(|_| HostError::Unsupported(method))?;
    Reflect::apply(&func, target, args).map_err(script_error)
}

/// The page the plugin runs in.
pub struct WebHost {
    window: Window,
    document: Document,
    sink: Option<Rc<dyn Fn(Gesture)>>,
    listeners: HashMap<Gesture, Listener>,
    /// Removed listeners may still be on the call stack, so they are kept alive here
    retired: Vec<Listener>,
}

impl WebHost {
    /// `None` outside a window, e.g. in a worker.
    pub fn new() -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;
        Some(Self {
            window,
            document,
            sink: None,
            listeners: HashMap::new(),
            retired: Vec::new(),
        })
    }

    /// Where gesture listeners deliver their events.
    pub fn set_gesture_sink(&mut self, sink: impl Fn(Gesture) + 'static) {
        self.sink = Some(Rc::new(sink));
    }

    /// Build a plugin whose gesture listeners feed back into it.
    pub fn shared_plugin(config: PluginConfig) -> Option<SharedPlugin> {
        let host = Self::new()?;
        let plugin = Rc::new(RefCell::new(AudioPlugin::new(host, config)));

        let weak: Weak<RefCell<AudioPlugin<WebHost>>> = Rc::downgrade(&plugin);
        plugin.borrow_mut().host_mut().set_gesture_sink(move |gesture| {
            let Some(plugin) = weak.upgrade() else {
                return;
            };
            match plugin.try_borrow_mut() {
                Ok(mut plugin) => {
                    plugin.dispatch_gesture(gesture);
                }
                Err(_) => trace!(?gesture, "plugin busy, gesture dropped"),
            };
        });
        Some(plugin)
    }

    fn global(&self) -> &JsValue {
        self.window.as_ref()
    }
}

impl AudioHost for WebHost {
    type Context = WebContext;

    fn origin(&self) -> Origin {
        match self.window.location().protocol() {
            Ok(protocol) if protocol == "file:" => Origin::LocalFile,
            _ => Origin::Network,
        }
    }

    fn platform(&self) -> Platform {
        self.window
            .navigator()
            .user_agent()
            .map(|ua| Platform::from_user_agent(&ua))
            .unwrap_or(Platform::Desktop)
    }

    fn probe_request(&self, resource: &str) -> Result<ProbeResponse, HostError> {
        let failed = |err: JsValue| HostError::RequestFailed(err.as_string().unwrap_or_else(|| format!("{:?}", err)));

        let xhr = XmlHttpRequest::new().map_err(failed)?;
        xhr.open_with_async("GET", resource, false).map_err(failed)?;
        xhr.send().map_err(failed)?;

        let status = xhr.status().map_err(failed)?;
        let body = xhr.response_text().map_err(failed)?.unwrap_or_default();
        Ok(ProbeResponse::new(status, body))
    }

    fn codec_query(&self) -> Option<Box<dyn CodecQuery>> {
        let element = self.document.create_element("audio").ok()?;
        if !has_function(element.as_ref(), "canPlayType") {
            return None;
        }
        let media: HtmlMediaElement = element.dyn_into().ok()?;
        Some(Box::new(move |mime: &str| media.can_play_type(mime)))
    }

    fn exposes_constructor(&self, constructor: ContextConstructor) -> bool {
        has_function(self.global(), constructor.global_name())
    }

    fn construct_context(&self, constructor: ContextConstructor) -> Result<WebContext, HostError> {
        let context = match constructor {
            ContextConstructor::Standard => AudioContext::new().map_err(script_error)?,
            ContextConstructor::Prefixed => {
                let ctor: Function = Reflect::get(self.global(), &JsValue::from_str(constructor.global_name()))
                    .map_err(script_error)?
                    .dyn_into()
                    .map_err(|_| HostError::Script(format!("{} is not a constructor", constructor.global_name())))?;
                Reflect::construct(&ctor, &Array::new())
                    .map_err(script_error)?
                    .unchecked_into::<AudioContext>()
            }
        };
        Ok(WebContext::new(context, &self.window))
    }

    fn has_touch_input(&self) -> bool {
        Reflect::has(self.global(), &JsValue::from_str("ontouchstart")).unwrap_or(false)
    }

    fn add_gesture_listener(&mut self, gesture: Gesture) {
        if self.listeners.contains_key(&gesture) {
            return;
        }
        let Some(sink) = self.sink.clone() else {
            warn!(?gesture, "no gesture sink, listener not attached");
            return;
        };

        let listener = Closure::wrap(Box::new(move |_event: Event| sink(gesture)) as Box<dyn FnMut(Event)>);
        let attached = self.document.add_event_listener_with_callback_and_bool(
            gesture.event_type(),
            listener.as_ref().unchecked_ref(),
            true,
        );
        match attached {
            Ok(()) => {
                self.listeners.insert(gesture, listener);
            }
            Err(err) => warn!(?gesture, err = ?err, "could not attach gesture listener"),
        }
    }

    fn remove_gesture_listener(&mut self, gesture: Gesture) {
        let Some(listener) = self.listeners.remove(&gesture) else {
            return;
        };
        if let Err(err) = self.document.remove_event_listener_with_callback_and_bool(
            gesture.event_type(),
            listener.as_ref().unchecked_ref(),
            true,
        ) {
            warn!(?gesture, err = ?err, "could not detach gesture listener");
        }
        self.retired.push(listener);
    }
}

/// A browser `AudioContext`, standard or prefixed.
#[derive(Debug)]
pub struct WebContext {
    context: AudioContext,
    /// `AudioBufferSourceNode.prototype`, where the start and stop entry points live
    source_prototype: Option<JsValue>,
}

impl WebContext {
    fn new(context: AudioContext, window: &Window) -> Self {
        let source_prototype = Reflect::get(window.as_ref(), &JsValue::from_str("AudioBufferSourceNode"))
            .and_then(|ctor| Reflect::get(&ctor, &JsValue::from_str("prototype")))
            .ok()
            .filter(|proto| proto.is_object());
        Self {
            context,
            source_prototype,
        }
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    /// `AudioContext.resume()`. The returned promise is left to settle on its own.
    pub fn resume(&self) -> Result<(), HostError> {
        self.context.resume().map(|_| ()).map_err(script_error)
    }

    fn source<'a>(&self, node: &'a AudioNode) -> &'a AudioBufferSourceNode {
        node.unchecked_ref()
    }
}

impl HostContext for WebContext {
    type Node = AudioNode;
    type Buffer = AudioBuffer;

    fn state(&self) -> ContextState {
        let token = Reflect::get(self.context.as_ref(), &JsValue::from_str("state"))
            .ok()
            .and_then(|state| state.as_string());
        ContextState::from_token(token.as_deref())
    }

    fn sample_rate(&self) -> f32 {
        self.context.sample_rate()
    }

    fn output_channels(&self) -> u32 {
        let destination = self.context.destination();
        Reflect::get(destination.as_ref(), &JsValue::from_str("numberOfChannels"))
            .ok()
            .and_then(|n| n.as_f64())
            .map(|n| n as u32)
            .unwrap_or_else(|| destination.channel_count())
    }

    fn destination(&self) -> AudioNode {
        AudioNode::from(self.context.destination())
    }

    fn exposes(&self, method: GraphMethod) -> bool {
        match method {
            GraphMethod::CreateGain | GraphMethod::CreateGainNode => has_function(self.context.as_ref(), method.js_name()),
            _ => self
                .source_prototype
                .as_ref()
                .map_or(false, |proto| has_function(proto, method.js_name())),
        }
    }

    fn create_dynamics_compressor(&self) -> Result<AudioNode, HostError> {
        self.context
            .create_dynamics_compressor()
            .map(AudioNode::from)
            .map_err(script_error)
    }

    fn create_buffer(&self, channels: u32, frames: u32, sample_rate: f32) -> Result<AudioBuffer, HostError> {
        self.context
            .create_buffer(channels, frames, sample_rate)
            .map_err(script_error)
    }

    fn create_buffer_source(&self) -> Result<AudioNode, HostError> {
        self.context
            .create_buffer_source()
            .map(AudioNode::from)
            .map_err(script_error)
    }

    fn set_source_buffer(&self, source: &AudioNode, buffer: &AudioBuffer) -> Result<(), HostError> {
        self.source(source).set_buffer(Some(buffer));
        Ok(())
    }

    fn connect(&self, from: &AudioNode, to: &AudioNode) -> Result<(), HostError> {
        from.connect_with_audio_node(to).map(|_| ()).map_err(script_error)
    }

    fn gain_value(&self, gain: &AudioNode) -> f32 {
        gain.unchecked_ref::<GainNode>().gain().value()
    }

    fn set_gain_value(&self, gain: &AudioNode, value: f32) -> Result<(), HostError> {
        gain.unchecked_ref::<GainNode>().gain().set_value(value);
        Ok(())
    }

    fn source_duration(&self, source: &AudioNode) -> Option<f64> {
        self.source(source).buffer().map(|buffer| buffer.duration())
    }

    fn create_gain(&self) -> Result<AudioNode, HostError> {
        self.context.create_gain().map(AudioNode::from).map_err(script_error)
    }

    fn create_gain_node(&self) -> Result<AudioNode, HostError> {
        invoke(self.context.as_ref(), GraphMethod::CreateGainNode, &Array::new()).map(|node| node.unchecked_into::<AudioNode>())
    }

    fn start(&self, source: &AudioNode, when: f64, offset: f64, duration: Option<f64>) -> Result<(), HostError> {
        let source = self.source(source);
        match duration {
            Some(duration) => source.start_with_when_and_grain_offset_and_grain_duration(when, offset, duration),
            None => source.start_with_when_and_grain_offset(when, offset),
        }
        .map_err(script_error)
    }

    fn note_grain_on(&self, source: &AudioNode, when: f64, offset: f64, duration: f64) -> Result<(), HostError> {
        let args = Array::of3(&when.into(), &offset.into(), &duration.into());
        invoke(source.as_ref(), GraphMethod::NoteGrainOn, &args).map(|_| ())
    }

    fn stop(&self, source: &AudioNode, when: f64) -> Result<(), HostError> {
        self.source(source).stop_with_when(when).map_err(script_error)
    }

    fn note_off(&self, source: &AudioNode, when: f64) -> Result<(), HostError> {
        invoke(source.as_ref(), GraphMethod::NoteOff, &Array::of1(&when.into())).map(|_| ())
    }
}
