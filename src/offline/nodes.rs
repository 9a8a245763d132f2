//! Render nodes for the offline context.
//!
//! Each node processes one 64-frame block per call, like every `dasp_graph` node.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use dasp_graph::{Buffer, Input, Node};
use rtrb::Producer;

/// Sum every input onto `output`, upmixing mono inputs to all channels.
fn mix_inputs(inputs: &[Input], output: &mut [Buffer]) {
    for buf in output.iter_mut() {
        buf.iter_mut().for_each(|s| *s = 0.0);
    }

    for input in inputs {
        let buffers = input.buffers();
        if buffers.is_empty() {
            continue;
        }
        for (out_ch, out_buf) in output.iter_mut().enumerate() {
            let in_buf = &buffers[out_ch.min(buffers.len() - 1)];
            for (out_sample, in_sample) in out_buf.iter_mut().zip(in_buf.iter()) {
                *out_sample += *in_sample;
            }
        }
    }
}

/// PCM data behind an [`OfflineBuffer`](super::OfflineBuffer).
#[derive(Debug)]
pub(crate) struct BufferData {
    pub(crate) sample_rate: f32,
    pub(crate) channels: RefCell<Vec<Vec<f32>>>,
}

impl BufferData {
    pub(crate) fn frames(&self) -> usize {
        self.channels.borrow().first().map(Vec::len).unwrap_or(0)
    }

    pub(crate) fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    fn sample(&self, channel: usize, frame: usize) -> f32 {
        let channels = self.channels.borrow();
        if channels.is_empty() {
            return 0.0;
        }
        let data = &channels[channel.min(channels.len() - 1)];
        data.get(frame).copied().unwrap_or(0.0)
    }
}

/// Soft-knee dynamics compressor with the Web Audio default curve.
///
/// No makeup gain is applied, so signals below the knee pass unchanged.
pub struct Compressor {
    pub(crate) threshold_db: f32,
    pub(crate) knee_db: f32,
    pub(crate) ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
}

impl Compressor {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_params(sample_rate, -24.0, 30.0, 12.0, 0.003, 0.25)
    }

    pub fn with_params(sample_rate: u32, threshold_db: f32, knee_db: f32, ratio: f32, attack: f32, release: f32) -> Self {
        let time_coeff = |secs: f32| (-1.0 / (secs * sample_rate as f32)).exp();
        Self {
            threshold_db,
            knee_db,
            ratio: ratio.max(1.0),
            attack_coeff: time_coeff(attack),
            release_coeff: time_coeff(release),
            envelope_db: -120.0,
        }
    }

    /// Output level in dB for an input level in dB.
    pub fn curve(&self, level_db: f32) -> f32 {
        let over = level_db - self.threshold_db;
        if 2.0 * over < -self.knee_db {
            level_db
        } else if 2.0 * over > self.knee_db {
            self.threshold_db + over / self.ratio
        } else {
            let x = over + self.knee_db / 2.0;
            level_db + (1.0 / self.ratio - 1.0) * x * x / (2.0 * self.knee_db)
        }
    }
}

impl Node for Compressor {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        mix_inputs(inputs, output);

        for i in 0..Buffer::LEN {
            let peak = output.iter().map(|b| b[i].abs()).fold(0.0f32, f32::max);
            let level_db = 20.0 * peak.max(1e-6).log10();

            let coeff = if level_db > self.envelope_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope_db = level_db + coeff * (self.envelope_db - level_db);

            let reduction_db = self.curve(self.envelope_db) - self.envelope_db;
            let gain = 10f32.powf(reduction_db / 20.0);
            for buf in output.iter_mut() {
                buf[i] *= gain;
            }
        }
    }
}

/// Scales everything routed into it. The value is shared with the control side
/// and read once per block, so only the latest write is heard.
pub struct Gain {
    gain: Rc<Cell<f32>>,
}

impl Gain {
    pub(crate) fn new(gain: Rc<Cell<f32>>) -> Self {
        Self { gain }
    }
}

impl Node for Gain {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        mix_inputs(inputs, output);
        let gain = self.gain.get();
        for buf in output.iter_mut() {
            buf.iter_mut().for_each(|s| *s *= gain);
        }
    }
}

/// Where a buffer source is in its lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Playback {
    Idle,
    Scheduled {
        /// Absolute context frame playback begins at
        start_frame: u64,
        /// Read position in buffer frames
        position: f64,
        /// Output frames left to play, `None` = until the buffer ends
        remaining: Option<u64>,
    },
    Ended,
}

/// Plays an assigned buffer once, resampled to the context rate.
pub struct BufferSource {
    pub(crate) buffer: Option<Rc<BufferData>>,
    pub(crate) playback: Playback,
    pub(crate) stop_frame: Option<u64>,
    /// Context frame at the start of the next block
    clock: u64,
    context_rate: f32,
}

impl BufferSource {
    pub(crate) fn new(clock: u64, context_rate: f32) -> Self {
        Self {
            buffer: None,
            playback: Playback::Idle,
            stop_frame: None,
            clock,
            context_rate,
        }
    }

    pub(crate) fn schedule(&mut self, when: f64, offset: f64, duration: Option<f64>) {
        let rate = self.context_rate as f64;
        let start_frame = ((when * rate).round() as u64).max(self.clock);
        let buffer_rate = self.buffer.as_ref().map(|b| b.sample_rate as f64).unwrap_or(rate);
        self.playback = Playback::Scheduled {
            start_frame,
            position: offset.max(0.0) * buffer_rate,
            remaining: duration.map(|d| (d.max(0.0) * rate).round() as u64),
        };
    }

    pub(crate) fn has_ended(&self) -> bool {
        self.playback == Playback::Ended
    }

    /// Nothing left to play: ended, stopped, or scheduled with no frames.
    pub(crate) fn is_finished(&self) -> bool {
        let stopped = self.stop_frame.map_or(false, |stop| stop <= self.clock);
        let frames = self.buffer.as_ref().map_or(0, |b| b.frames()) as f64;
        match self.playback {
            Playback::Ended => true,
            Playback::Idle => stopped,
            Playback::Scheduled { position, remaining, .. } => {
                stopped || remaining == Some(0) || position >= frames
            }
        }
    }
}

impl Node for BufferSource {
    fn process(&mut self, _inputs: &[Input], output: &mut [Buffer]) {
        for buf in output.iter_mut() {
            buf.iter_mut().for_each(|s| *s = 0.0);
        }
        let block_start = self.clock;
        self.clock += Buffer::LEN as u64;

        let data = match &self.buffer {
            Some(data) => Rc::clone(data),
            None => return,
        };
        let step = data.sample_rate as f64 / self.context_rate as f64;
        let frames = data.frames() as f64;

        for i in 0..Buffer::LEN {
            let now = block_start + i as u64;
            let mut ended = self.stop_frame.map_or(false, |stop| now >= stop);

            if let Playback::Scheduled { start_frame, position, remaining } = &mut self.playback {
                let playing = !ended && now >= *start_frame;
                if playing && (*position >= frames || *remaining == Some(0)) {
                    ended = true;
                } else if playing {
                    let frame = *position as usize;
                    for (ch, buf) in output.iter_mut().enumerate() {
                        buf[i] = data.sample(ch, frame);
                    }
                    *position += step;
                    if let Some(left) = remaining {
                        *left -= 1;
                    }
                }
            }

            if ended {
                self.playback = Playback::Ended;
            }
        }
    }
}

/// Hardware output stand-in: mixes its inputs and queues them, interleaved.
pub struct Destination {
    producer: Producer<f32>,
    channels: usize,
}

impl Destination {
    pub(crate) fn new(producer: Producer<f32>, channels: usize) -> Self {
        Self {
            producer,
            channels: channels.max(1),
        }
    }
}

impl Node for Destination {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        mix_inputs(inputs, output);

        if output.is_empty() || self.producer.slots() < Buffer::LEN * self.channels {
            return;
        }
        for i in 0..Buffer::LEN {
            for ch in 0..self.channels {
                let src = ch.min(output.len() - 1);
                let _ = self.producer.push(output[src][i]);
            }
        }
    }
}

#[enum_delegate::implement(Node, pub trait Node { fn process(&mut self, inputs: &[Input], output: &mut [Buffer]); })]
pub enum RenderNode {
    Compressor(Compressor),
    Gain(Gain),
    BufferSource(BufferSource),
    Destination(Destination),
}
