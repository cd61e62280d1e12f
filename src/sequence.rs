//! Sequence recorder/player (§4.H step 6, §6.3 `Sequence`).
//!
//! Plain `serde`/`serde_json` (de)serialization, matching `preset.rs`'s
//! document shape.

use crate::error::SyncError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SequenceEvent {
    GestureTrigger { kind: String, intensity: f32 },
    MacroChange { knob: String, value: f32 },
    PersonalityChange { archetype: String },
    FormationChange { formation: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimedEvent {
    pub timestamp: f32,
    #[serde(flatten)]
    pub event: SequenceEvent,
}

/// §6.3 `Sequence` document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    pub name: String,
    pub duration: f32,
    pub events: Vec<TimedEvent>,
    #[serde(rename = "createdAt")]
    pub created_at: u64,
    pub tags: Vec<String>,
}

impl Sequence {
    pub fn to_json(&self) -> Result<String, crate::error::ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, crate::error::ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

enum RecorderState {
    Idle,
    Recording { start: f32, events: Vec<TimedEvent> },
}

pub struct SequenceRecorder {
    state: RecorderState,
}

impl Default for SequenceRecorder {
    fn default() -> Self {
        Self { state: RecorderState::Idle }
    }
}

impl SequenceRecorder {
    pub fn start(&mut self, clock: f32) {
        self.state = RecorderState::Recording { start: clock, events: Vec::new() };
    }

    pub fn record(&mut self, clock: f32, event: SequenceEvent) {
        if let RecorderState::Recording { start, events } = &mut self.state {
            events.push(TimedEvent { timestamp: clock - *start, event });
        }
    }

    pub fn stop(&mut self, clock: f32, id: String, name: String) -> Option<Sequence> {
        if let RecorderState::Recording { start, events } = std::mem::replace(&mut self.state, RecorderState::Idle) {
            Some(Sequence { id, name, duration: clock - start, events, created_at: 0, tags: Vec::new() })
        } else {
            None
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }
}

/// Playback cursor (§4.H step 6: "pause/resume/loop/speed").
pub struct SequencePlayer {
    sequence: Sequence,
    cursor: f32,
    speed: f32,
    looped: bool,
    paused: bool,
    next_unemitted: usize,
}

impl SequencePlayer {
    pub fn new(sequence: Sequence) -> Self {
        Self { sequence, cursor: 0.0, speed: 1.0, looped: false, paused: false, next_unemitted: 0 }
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Advances the cursor by `frame_dt` and returns events whose timestamp
    /// has just been crossed (§5: "applied at the top of the frame in which
    /// their timestamp is crossed").
    pub fn advance(&mut self, frame_dt: f32) -> Result<Vec<SequenceEvent>, SyncError> {
        if self.paused {
            return Ok(Vec::new());
        }
        self.cursor += frame_dt * self.speed;

        if self.sequence.duration > 0.0 && self.cursor >= self.sequence.duration {
            if self.looped {
                self.cursor %= self.sequence.duration;
                self.next_unemitted = 0;
            } else {
                self.cursor = self.sequence.duration;
            }
        }

        let mut fired = Vec::new();
        while self.next_unemitted < self.sequence.events.len() {
            let ev = &self.sequence.events[self.next_unemitted];
            if ev.timestamp > self.cursor {
                break;
            }
            if ev.timestamp < 0.0 || ev.timestamp.is_nan() {
                return Err(SyncError { sequence_id: self.sequence.id.clone(), reason: "impossible timestamp".into() });
            }
            fired.push(ev.event.clone());
            self.next_unemitted += 1;
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_stop_captures_relative_timestamps() {
        let mut r = SequenceRecorder::default();
        r.start(10.0);
        r.record(10.5, SequenceEvent::GestureTrigger { kind: "Attack".into(), intensity: 0.8 });
        let seq = r.stop(11.0, "a".into(), "test".into()).unwrap();
        assert_eq!(seq.duration, 1.0);
        assert_eq!(seq.events[0].timestamp, 0.5);
    }

    #[test]
    fn json_round_trip_preserves_events() {
        let seq = Sequence {
            id: "s1".into(),
            name: "demo".into(),
            duration: 5.0,
            events: vec![TimedEvent { timestamp: 1.0, event: SequenceEvent::MacroChange { knob: "chaos".into(), value: 0.5 } }],
            created_at: 1000,
            tags: vec!["test".into()],
        };
        let json = seq.to_json().unwrap();
        let parsed = Sequence::from_json(&json).unwrap();
        assert_eq!(parsed.events.len(), 1);
        assert_eq!(parsed.duration, 5.0);
    }

    #[test]
    fn player_emits_events_once_cursor_crosses_timestamp() {
        let seq = Sequence {
            id: "s1".into(),
            name: "t".into(),
            duration: 2.0,
            events: vec![TimedEvent { timestamp: 1.0, event: SequenceEvent::FormationChange { formation: "Radial".into() } }],
            created_at: 0,
            tags: vec![],
        };
        let mut player = SequencePlayer::new(seq);
        assert!(player.advance(0.5).unwrap().is_empty());
        let fired = player.advance(0.6).unwrap();
        assert_eq!(fired.len(), 1);
    }
}
