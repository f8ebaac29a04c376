//! Packetization (§4.6): filters an AIL instruction list down to a
//! motion-only packet stream, warning about anything skipped for a reason
//! other than being structural (labels/branches/gotos are dropped silently;
//! only `Assign`/`Sync` produce a warning, matching the grounded original).

use gcode_ail::Instruction;
use gcode_diagnostic::Diagnostic;
use gcode_messages::{ArcParams, DwellMode, ModalState, Pose6, RejectedLine, SourceInfo};
use serde::{Deserialize, Serialize};

/// The packet payload, one per motion instruction kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PacketType {
    #[serde(rename = "linear_move")]
    LinearMove { pose: Pose6, feed: Option<f64> },
    #[serde(rename = "arc_move")]
    ArcMove { clockwise: bool, pose: Pose6, arc_params: ArcParams, feed: Option<f64> },
    #[serde(rename = "dwell")]
    Dwell { dwell_mode: DwellMode, dwell_value: f64 },
}

/// A single packetized motion instruction, with a dense 1-based id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub packet_id: u64,
    pub source: SourceInfo,
    pub modal: ModalState,
    #[serde(flatten)]
    pub payload: PacketType,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PacketResult {
    pub packets: Vec<Packet>,
    pub diagnostics: Vec<Diagnostic>,
    pub rejected_lines: Vec<RejectedLine>,
}

fn kind_for_warning(instruction: &Instruction) -> Option<&'static str> {
    match instruction {
        Instruction::Assign { .. } => Some("assign"),
        Instruction::Sync { .. } => Some("sync"),
        _ => None,
    }
}

/// Walks `instructions` in order, emitting one dense-numbered [`Packet`] per
/// motion instruction. Non-motion instructions are skipped: `Assign`/`Sync`
/// produce a warning at their source location, everything else (labels,
/// gotos, branches) is skipped silently.
pub fn packetize(
    instructions: &[Instruction],
    diagnostics: &[Diagnostic],
    rejected_lines: &[RejectedLine],
) -> PacketResult {
    let mut packets = Vec::new();
    let mut warnings = Vec::new();
    let mut next_id: u64 = 1;

    for instruction in instructions {
        let motion = match instruction {
            Instruction::Linear { modal, pose, feed, .. } => {
                Some((modal.clone(), PacketType::LinearMove { pose: *pose, feed: *feed }))
            }
            Instruction::Arc { modal, clockwise, pose, arc_params, feed, .. } => Some((
                modal.clone(),
                PacketType::ArcMove { clockwise: *clockwise, pose: *pose, arc_params: *arc_params, feed: *feed },
            )),
            Instruction::Dwell { modal, dwell_mode, dwell_value, .. } => {
                Some((modal.clone(), PacketType::Dwell { dwell_mode: *dwell_mode, dwell_value: *dwell_value }))
            }
            other => {
                if let Some(kind) = kind_for_warning(other) {
                    warnings.push(Diagnostic::warning(
                        format!("packetization skipped non-motion instruction: {kind}"),
                        gcode_position::Location::at_line(other.source().line),
                    ));
                }
                None
            }
        };

        if let Some((modal, payload)) = motion {
            packets.push(Packet { packet_id: next_id, source: instruction.source().clone(), modal, payload });
            next_id += 1;
        }
    }

    let mut out_diagnostics = diagnostics.to_vec();
    out_diagnostics.extend(warnings);
    tracing::debug!(packets = packets.len(), diagnostics = out_diagnostics.len(), "packetization complete");
    PacketResult { packets, diagnostics: out_diagnostics, rejected_lines: rejected_lines.to_vec() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode_ail::lower_to_ail;
    use gcode_messages::LowerOptions;
    use gcode_parser::parse;
    use gcode_semantic::apply_semantic_rules;

    fn packetize_source(source: &str) -> PacketResult {
        let (program, mut diags) = parse(source);
        diags.extend(apply_semantic_rules(&program));
        let ail = lower_to_ail(&program, &diags, &LowerOptions::default());
        packetize(&ail.instructions, &ail.diagnostics, &ail.rejected_lines)
    }

    #[test]
    fn packet_ids_are_dense_from_one() {
        let result = packetize_source("G1 X1\nG1 X2\nG1 X3\n");
        assert_eq!(result.packets.len(), 3);
        let ids: Vec<_> = result.packets.iter().map(|p| p.packet_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn assign_is_skipped_with_warning() {
        let result = packetize_source("R1 = 5\nG1 X1\n");
        assert_eq!(result.packets.len(), 1);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("packetization skipped non-motion instruction: assign")));
    }

    #[test]
    fn labels_and_gotos_are_skipped_silently() {
        let result = packetize_source("L1:\nGOTO L1\nG1 X1\n");
        assert_eq!(result.packets.len(), 1);
        assert!(result.diagnostics.iter().all(|d| !d.message.contains("packetization skipped")));
    }

    #[test]
    fn structured_if_else_only_packetizes_motion_arms() {
        let result = packetize_source("IF R1 == 1\nG1 X1\nELSE\nG1 X2\nENDIF\n");
        assert_eq!(result.packets.len(), 2);
    }
}
