//! Bar/seconds conversion
//!
//! The editing core reasons purely in bar space. Consumers that need wall
//! clock time go through a `TimeService`; `TempoMap` is the piecewise
//! constant-BPM implementation persisted with the document.

use crate::error::{EditorError, Result};
use crate::models::timing::Timing;

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_BPM_DIV: i64 = 4;

/// Monotonic bijection between bar positions and audio seconds
pub trait TimeService {
    fn bar_to_audio_time(&self, bar: Timing) -> f64;
    fn audio_time_to_bar(&self, seconds: f64) -> f64;
}

#[derive(Clone, Debug, PartialEq)]
pub struct BpmPoint {
    pub id: String,
    pub time: Timing,
    pub bpm: f64,
    /// Grid resolution the editor snaps to inside this segment
    pub div: i64,
}

impl BpmPoint {
    pub fn new(id: impl Into<String>, time: Timing, bpm: f64, div: i64) -> Result<Self> {
        if !(bpm >= 1.0) {
            return Err(EditorError::value(format!("BPM must be >= 1, got {}", bpm)));
        }
        if div < 1 {
            return Err(EditorError::value(format!("Div must be >= 1, got {}", div)));
        }
        Ok(Self {
            id: id.into(),
            time,
            bpm,
            div,
        })
    }

    /// Seconds per bar in this segment
    pub fn bar_len(&self) -> f64 {
        60.0 / self.bpm
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TempoMap {
    points: Vec<BpmPoint>,
    /// Audio offset in milliseconds
    offset_ms: f64,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self {
            points: vec![BpmPoint {
                id: "bpm-0".to_string(),
                time: Timing::ZERO,
                bpm: DEFAULT_BPM,
                div: DEFAULT_BPM_DIV,
            }],
            offset_ms: 0.0,
        }
    }
}

impl TempoMap {
    /// Points are sorted by time; at least one is required
    pub fn new(mut points: Vec<BpmPoint>, offset_ms: f64) -> Result<Self> {
        if points.is_empty() {
            return Err(EditorError::value("Tempo map needs at least one BPM point"));
        }
        if points.iter().any(|p| !p.time.is_valid()) {
            return Err(EditorError::value("BPM point with invalid time"));
        }
        points.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(Self { points, offset_ms })
    }

    pub fn points(&self) -> &[BpmPoint] {
        &self.points
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    fn offset_s(&self) -> f64 {
        self.offset_ms / 1000.0
    }

    /// BPM point governing `bar`
    pub fn point_at(&self, bar: Timing) -> &BpmPoint {
        let idx = self.points.partition_point(|p| p.time <= bar);
        &self.points[idx.saturating_sub(1)]
    }

    pub fn bar_value_to_audio_time(&self, bar: f64) -> f64 {
        let mut time = -self.offset_s();
        for (i, point) in self.points.iter().enumerate() {
            match self.points.get(i + 1) {
                Some(next) if bar > next.time.value() => {
                    time += (next.time.value() - point.time.value()) * point.bar_len();
                }
                _ => return time + (bar - point.time.value()) * point.bar_len(),
            }
        }
        time
    }
}

impl TimeService for TempoMap {
    fn bar_to_audio_time(&self, bar: Timing) -> f64 {
        self.bar_value_to_audio_time(bar.value())
    }

    fn audio_time_to_bar(&self, seconds: f64) -> f64 {
        let mut bar = 0.0;
        let mut time = seconds + self.offset_s();
        for (i, point) in self.points.iter().enumerate() {
            if let Some(next) = self.points.get(i + 1) {
                let seg_bar = next.time.value() - point.time.value();
                let seg_sec = seg_bar * point.bar_len();
                if time > seg_sec {
                    bar += seg_bar;
                    time -= seg_sec;
                    continue;
                }
            }
            return bar + time / point.bar_len();
        }
        bar
    }
}
