//! Typed per-line motion messages: the output of message lowering.
//!
//! Grounded on the reference's `messages.h` (`SourceInfo`, `Pose6`), extended
//! per the full dialect to a three-way `Message` sum type (linear/arc/dwell)
//! since the retrieved reference snapshot only carries a single `G1Message`
//! placeholder.

use gcode_diagnostic::Diagnostic;
use serde::{Deserialize, Serialize};

/// Where a lowered artifact came from: the input line, and the N-address it
/// carried, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub filename: Option<String>,
    pub line: u32,
    pub line_number: Option<u32>,
}

impl SourceInfo {
    pub fn new(line: u32) -> Self {
        Self { filename: None, line, line_number: None }
    }
}

/// The six linear/rotary axes, each independently present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose6 {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
}

impl Pose6 {
    /// True iff every axis that is `Some` on both sides agrees within
    /// `1e-9`, and the same axes are present on both sides.
    pub fn approx_eq(&self, other: &Self) -> bool {
        axis_eq(self.x, other.x)
            && axis_eq(self.y, other.y)
            && axis_eq(self.z, other.z)
            && axis_eq(self.a, other.a)
            && axis_eq(self.b, other.b)
            && axis_eq(self.c, other.c)
    }
}

fn axis_eq(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() < 1e-9,
        _ => false,
    }
}

/// Arc centre-offset/radius parameters; `r` and `{i,j,k}` are alternative
/// radius notations, never both populated by a single lowered word set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArcParams {
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
    pub r: Option<f64>,
}

impl ArcParams {
    pub fn approx_eq(&self, other: &Self) -> bool {
        axis_eq(self.i, other.i)
            && axis_eq(self.j, other.j)
            && axis_eq(self.k, other.k)
            && axis_eq(self.r, other.r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DwellMode {
    Seconds,
    Revolutions,
}

/// The G-code modal group a message belongs to, and whether it updates
/// persistent modal state for subsequent lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalGroup {
    Motion,
    NonModal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalState {
    pub group: ModalGroup,
    pub code: String,
    pub updates_state: bool,
}

impl ModalState {
    pub fn motion(code: impl Into<String>) -> Self {
        Self { group: ModalGroup::Motion, code: code.into(), updates_state: true }
    }

    pub fn non_modal(code: impl Into<String>) -> Self {
        Self { group: ModalGroup::NonModal, code: code.into(), updates_state: false }
    }
}

/// One typed message lowered from a single input line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Linear { source: SourceInfo, modal: ModalState, pose: Pose6, feed: Option<f64> },
    Arc {
        source: SourceInfo,
        modal: ModalState,
        clockwise: bool,
        pose: Pose6,
        arc_params: ArcParams,
        feed: Option<f64>,
    },
    Dwell { source: SourceInfo, modal: ModalState, dwell_mode: DwellMode, dwell_value: f64 },
}

impl Message {
    pub fn source(&self) -> &SourceInfo {
        match self {
            Message::Linear { source, .. } | Message::Arc { source, .. } | Message::Dwell { source, .. } => source,
        }
    }

    /// Structural equality with float tolerance, per the diffing contract:
    /// same variant, same source, same modal tuple, and variant-specific
    /// payload equality within `1e-9`.
    pub fn approx_eq(&self, other: &Message) -> bool {
        match (self, other) {
            (
                Message::Linear { source: s1, modal: m1, pose: p1, feed: f1 },
                Message::Linear { source: s2, modal: m2, pose: p2, feed: f2 },
            ) => s1 == s2 && m1 == m2 && p1.approx_eq(p2) && axis_eq(*f1, *f2),
            (
                Message::Arc { source: s1, modal: m1, clockwise: c1, pose: p1, arc_params: a1, feed: f1 },
                Message::Arc { source: s2, modal: m2, clockwise: c2, pose: p2, arc_params: a2, feed: f2 },
            ) => {
                s1 == s2 && m1 == m2 && c1 == c2 && p1.approx_eq(p2) && a1.approx_eq(a2) && axis_eq(*f1, *f2)
            }
            (
                Message::Dwell { source: s1, modal: m1, dwell_mode: d1, dwell_value: v1 },
                Message::Dwell { source: s2, modal: m2, dwell_mode: d2, dwell_value: v2 },
            ) => s1 == s2 && m1 == m2 && d1 == d2 && (v1 - v2).abs() < 1e-9,
            _ => false,
        }
    }
}

/// A line that failed message lowering: the first error-bearing line halts
/// the whole stream (see the fail-fast contract in `gcode-lower`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedLine {
    pub line: u32,
    pub reasons: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageResult {
    pub messages: Vec<Message>,
    pub diagnostics: Vec<Diagnostic>,
    pub rejected_lines: Vec<RejectedLine>,
}

/// Options controlling message lowering (currently just the filename
/// recorded into every [`SourceInfo`]).
#[derive(Debug, Clone, Default)]
pub struct LowerOptions {
    pub filename: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_approx_eq_tolerates_float_noise() {
        let a = Pose6 { x: Some(1.000_000_000_1), ..Default::default() };
        let b = Pose6 { x: Some(1.0), ..Default::default() };
        assert!(a.approx_eq(&b));
    }

    #[test]
    fn pose_approx_eq_requires_same_presence() {
        let a = Pose6 { x: Some(1.0), ..Default::default() };
        let b = Pose6::default();
        assert!(!a.approx_eq(&b));
    }

    #[test]
    fn message_approx_eq_mismatched_variants() {
        let linear = Message::Linear {
            source: SourceInfo::new(1),
            modal: ModalState::motion("G1"),
            pose: Pose6::default(),
            feed: None,
        };
        let dwell = Message::Dwell {
            source: SourceInfo::new(1),
            modal: ModalState::non_modal("G4"),
            dwell_mode: DwellMode::Seconds,
            dwell_value: 1.0,
        };
        assert!(!linear.approx_eq(&dwell));
    }

    #[test]
    fn dwell_value_tolerance() {
        let a = Message::Dwell {
            source: SourceInfo::new(1),
            modal: ModalState::non_modal("G4"),
            dwell_mode: DwellMode::Seconds,
            dwell_value: 2.000_000_000_1,
        };
        let b = Message::Dwell {
            source: SourceInfo::new(1),
            modal: ModalState::non_modal("G4"),
            dwell_mode: DwellMode::Seconds,
            dwell_value: 2.0,
        };
        assert!(a.approx_eq(&b));
    }
}
