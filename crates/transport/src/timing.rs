//! Conversions from a musical transport into beats and sample positions.

use serde::{Deserialize, Serialize};

fn default_denominator() -> u32 {
    4
}

/// The host's musical clock at one instant.
///
/// Only authoritative while `playing` is true. `current_bar_started` is the
/// audio-clock time, in seconds, at which `current_bar` began.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportSnapshot {
    pub playing: bool,
    pub tempo: f64,
    pub time_sig_numerator: u32,
    #[serde(default = "default_denominator")]
    pub time_sig_denominator: u32,
    pub current_bar: f64,
    pub current_bar_started: f64,
}

impl TransportSnapshot {
    /// A playing transport positioned at `bar`, which started at `started` seconds.
    pub fn playing_at(tempo: f64, numerator: u32, bar: f64, started: f64) -> Self {
        Self {
            playing: true,
            tempo,
            time_sig_numerator: numerator,
            time_sig_denominator: default_denominator(),
            current_bar: bar,
            current_bar_started: started,
        }
    }

    pub fn stopped(tempo: f64, numerator: u32) -> Self {
        Self {
            playing: false,
            ..Self::playing_at(tempo, numerator, 0.0, 0.0)
        }
    }

    /// Tempo and meter are usable as divisors.
    pub fn has_valid_timing(&self) -> bool {
        self.tempo.is_finite() && self.tempo > 0.0 && self.time_sig_numerator > 0
    }

    pub fn seconds_per_bar(&self) -> Option<f64> {
        self.has_valid_timing()
            .then(|| self.time_sig_numerator as f64 * 60.0 / self.tempo)
    }

    /// See [`beat_position`].
    pub fn beat_position(&self, now: f64) -> Option<f64> {
        beat_position(self, now)
    }
}

impl Default for TransportSnapshot {
    fn default() -> Self {
        Self::stopped(120.0, 4)
    }
}

/// Beats since the start of the song at audio-clock time `now`.
///
/// `current_bar * numerator + (tempo / 60) * (now - current_bar_started)`.
/// Returns `None` when tempo or meter would make the result meaningless.
pub fn beat_position(transport: &TransportSnapshot, now: f64) -> Option<f64> {
    if !transport.has_valid_timing() {
        return None;
    }
    let bar_beats = transport.current_bar * transport.time_sig_numerator as f64;
    let elapsed = now - transport.current_bar_started;
    Some(bar_beats + (transport.tempo / 60.0) * elapsed)
}

/// Per-take loop settings as sent by the control side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopConfig {
    pub enabled: bool,
    pub start_bar: f64,
    /// Length in bars.
    pub loop_length: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_bar: 0.0,
            loop_length: 8.0,
        }
    }
}

/// Loop boundaries in samples, frozen at the tempo in effect when derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopBounds {
    pub start_sample: u64,
    pub length_samples: u64,
}

/// Derive loop boundaries for `config` under `transport`.
///
/// Both fields are in samples at `sample_rate`. Returns `None` if the
/// transport has no usable tempo or meter.
pub fn loop_bounds(
    config: &LoopConfig,
    transport: &TransportSnapshot,
    sample_rate: u32,
) -> Option<LoopBounds> {
    if !transport.has_valid_timing() {
        return None;
    }
    let numerator = transport.time_sig_numerator as f64;
    let start_secs = (config.start_bar * numerator) * 60.0 / transport.tempo;
    let length_secs = (config.loop_length * numerator) * 60.0 / transport.tempo;

    Some(LoopBounds {
        start_sample: to_samples(start_secs, sample_rate),
        length_samples: to_samples(length_secs, sample_rate),
    })
}

fn to_samples(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).floor().max(0.0) as u64
}

/// Tracks the beat position across blocks, holding it while the transport
/// is stopped or its timing is unusable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransportClock {
    position: f64,
}

impl TransportClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, transport: Option<&TransportSnapshot>, now: f64) -> f64 {
        if let Some(transport) = transport.filter(|t| t.playing) {
            if let Some(beats) = beat_position(transport, now) {
                self.position = beats;
            }
        }
        self.position
    }

    pub fn position(&self) -> f64 {
        self.position
    }
}
