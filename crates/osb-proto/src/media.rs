//! Media state enumerations and range types surfaced to the listener.
//!
//! The integer wire values mirror the HTML media element constants the
//! server uses when it relays `getNetworkState`/`getReadyState` replies.

use serde::{Deserialize, Serialize};

/// Media element network state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkState {
    Empty,
    Idle,
    Loading,
    Loaded,
    FormatError,
    NetworkError,
    DecodeError,
}

impl NetworkState {
    /// Integer value sent on the wire.
    pub fn wire_value(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Idle => 1,
            Self::Loading => 2,
            Self::Loaded => 3,
            Self::FormatError => 4,
            Self::NetworkError => 5,
            Self::DecodeError => 6,
        }
    }
}

/// Media element ready state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Integer value sent on the wire.
    pub fn wire_value(self) -> u8 {
        match self {
            Self::HaveNothing => 0,
            Self::HaveMetadata => 1,
            Self::HaveCurrentData => 2,
            Self::HaveFutureData => 3,
            Self::HaveEnoughData => 4,
        }
    }
}

/// MSE source buffer append mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppendMode {
    Segments,
    Sequence,
}

impl AppendMode {
    /// Decode the integer mode from `setAppendMode`.
    pub fn from_wire(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::Segments),
            1 => Some(Self::Sequence),
            _ => None,
        }
    }
}

/// EME `MediaKeysRequirement`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmeRequirement {
    Required,
    #[default]
    Optional,
    NotAllowed,
}

/// EME `MediaKeySessionType`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmeSessionType {
    #[default]
    Temporary,
    PersistentLicense,
}

impl EmeSessionType {
    /// Decode the wire token used by `cdmSessionCreate`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "temporary" => Some(Self::Temporary),
            "persistent-license" => Some(Self::PersistentLicense),
            _ => None,
        }
    }
}

/// Parallel start/end arrays describing buffered or seekable time ranges.
///
/// Invariant: `start.len() == end.len()` and `start[i] <= end[i]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeRanges {
    pub start: Vec<f64>,
    pub end: Vec<f64>,
}

impl TimeRanges {
    /// A single `[0, end]` range, the common whole-duration reply.
    pub fn single(end: f64) -> Self {
        Self {
            start: vec![0.0],
            end: vec![end],
        }
    }

    /// Whether the range arrays are structurally valid.
    pub fn is_well_formed(&self) -> bool {
        self.start.len() == self.end.len()
            && self.start.iter().zip(&self.end).all(|(s, e)| s <= e)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
