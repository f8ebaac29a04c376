//! Stable JSON projections (§4.10/§6) for each pipeline stage. Each
//! top-level envelope carries `schema_version: 1`; field names and shapes
//! are part of the contract and covered by the tests in this crate.

use gcode_ail::{AilResult, GotoInstr, Instruction};
use gcode_ast::Program;
use gcode_diagnostic::{Diagnostic, Severity};
use gcode_messages::{ArcParams, DwellMode, Message, MessageResult, ModalState, Pose6, RejectedLine, SourceInfo};
use gcode_packet::{PacketResult, PacketType};
use serde::{Deserialize, Serialize};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagJson {
    pub severity: String,
    pub message: String,
    pub location: LocationJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationJson {
    pub line: u32,
    pub column: u32,
}

impl From<&Diagnostic> for DiagJson {
    fn from(d: &Diagnostic) -> Self {
        Self {
            severity: match d.severity {
                Severity::Error => "error".to_string(),
                Severity::Warning => "warning".to_string(),
            },
            message: d.message.clone(),
            location: LocationJson { line: d.location.line, column: d.location.column },
        }
    }
}

fn diags_json(diagnostics: &[Diagnostic]) -> Vec<DiagJson> {
    diagnostics.iter().map(DiagJson::from).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedLineJson {
    pub line: u32,
    pub reasons: Vec<DiagJson>,
}

impl From<&RejectedLine> for RejectedLineJson {
    fn from(r: &RejectedLine) -> Self {
        Self { line: r.line, reasons: diags_json(&r.reasons) }
    }
}

fn rejected_json(rejected: &[RejectedLine]) -> Vec<RejectedLineJson> {
    rejected.iter().map(RejectedLineJson::from).collect()
}

/// §6 `Modal` schema: `{ group ∈ "GGroup1"|"GGroup2", code, updates_state }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalJson {
    pub group: String,
    pub code: String,
    pub updates_state: bool,
}

impl From<&ModalState> for ModalJson {
    fn from(m: &ModalState) -> Self {
        let group = match m.group {
            gcode_messages::ModalGroup::Motion => "GGroup1",
            gcode_messages::ModalGroup::NonModal => "GGroup2",
        };
        Self { group: group.to_string(), code: m.code.clone(), updates_state: m.updates_state }
    }
}

/// §6 `Pose` schema: each axis is `number | null`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseJson {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
}

impl From<&Pose6> for PoseJson {
    fn from(p: &Pose6) -> Self {
        Self { x: p.x, y: p.y, z: p.z, a: p.a, b: p.b, c: p.c }
    }
}

/// §6 `Arc` schema: `{ i, j, k, r }`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArcJson {
    pub i: Option<f64>,
    pub j: Option<f64>,
    pub k: Option<f64>,
    pub r: Option<f64>,
}

impl From<&ArcParams> for ArcJson {
    fn from(a: &ArcParams) -> Self {
        Self { i: a.i, j: a.j, k: a.k, r: a.r }
    }
}

fn source_json(source: &SourceInfo) -> SourceJson {
    SourceJson { filename: source.filename.clone(), line: source.line, line_number: source.line_number }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceJson {
    pub filename: Option<String>,
    pub line: u32,
    pub line_number: Option<u32>,
}

// ---- Parse stage -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseJson {
    pub schema_version: u32,
    pub program: Program,
    pub diagnostics: Vec<DiagJson>,
}

pub fn parse_to_json(program: &Program, diagnostics: &[Diagnostic]) -> ParseJson {
    ParseJson { schema_version: SCHEMA_VERSION, program: program.clone(), diagnostics: diags_json(diagnostics) }
}

// ---- Lower stage -------------------------------------------------------

/// §6 `Lower` message schema: one flat object per message, `type` driven by
/// the modal code, with variant-specific fields `None`/omitted as needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: SourceJson,
    pub modal: ModalJson,
    pub target_pose: PoseJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arc: Option<ArcJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_value: Option<f64>,
}

fn dwell_mode_str(mode: DwellMode) -> String {
    match mode {
        DwellMode::Seconds => "seconds".to_string(),
        DwellMode::Revolutions => "revolutions".to_string(),
    }
}

impl From<&Message> for MessageJson {
    fn from(message: &Message) -> Self {
        match message {
            Message::Linear { source, modal, pose, feed } => Self {
                kind: modal.code.clone(),
                source: source_json(source),
                modal: ModalJson::from(modal),
                target_pose: PoseJson::from(pose),
                arc: None,
                feed: *feed,
                dwell_mode: None,
                dwell_value: None,
            },
            Message::Arc { source, modal, pose, arc_params, feed, .. } => Self {
                kind: modal.code.clone(),
                source: source_json(source),
                modal: ModalJson::from(modal),
                target_pose: PoseJson::from(pose),
                arc: Some(ArcJson::from(arc_params)),
                feed: *feed,
                dwell_mode: None,
                dwell_value: None,
            },
            Message::Dwell { source, modal, dwell_mode, dwell_value } => Self {
                kind: modal.code.clone(),
                source: source_json(source),
                modal: ModalJson::from(modal),
                target_pose: PoseJson::default(),
                arc: None,
                feed: None,
                dwell_mode: Some(dwell_mode_str(*dwell_mode)),
                dwell_value: Some(*dwell_value),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowerJson {
    pub schema_version: u32,
    pub messages: Vec<MessageJson>,
    pub diagnostics: Vec<DiagJson>,
    pub rejected_lines: Vec<RejectedLineJson>,
}

pub fn lower_to_json(result: &MessageResult) -> LowerJson {
    LowerJson {
        schema_version: SCHEMA_VERSION,
        messages: result.messages.iter().map(MessageJson::from).collect(),
        diagnostics: diags_json(&result.diagnostics),
        rejected_lines: rejected_json(&result.rejected_lines),
    }
}

// ---- AIL stage -----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GotoJson {
    pub opcode: String,
    pub target: String,
    pub target_kind: String,
}

impl From<&GotoInstr> for GotoJson {
    fn from(goto: &GotoInstr) -> Self {
        Self {
            opcode: goto.opcode.as_str().to_string(),
            target: goto.target.clone(),
            target_kind: target_kind_str(goto.target_kind).to_string(),
        }
    }
}

fn target_kind_str(kind: gcode_ast::GotoTargetKind) -> &'static str {
    match kind {
        gcode_ast::GotoTargetKind::Label => "label",
        gcode_ast::GotoTargetKind::LineNumber => "line_number",
        gcode_ast::GotoTargetKind::Number => "number",
        gcode_ast::GotoTargetKind::SystemVariable => "system_variable",
    }
}

/// §6 `AIL` instruction schema: `{ kind, source, ... }`, variant-specific
/// fields populated only for the relevant `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionJson {
    pub kind: String,
    pub source: SourceJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal: Option<ModalJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_pose: Option<PoseJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arc: Option<ArcJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lhs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto: Option<GotoJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub then: Option<GotoJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "else")]
    pub else_: Option<GotoJson>,
}

impl InstructionJson {
    fn bare(kind: &str, source: SourceJson) -> Self {
        Self {
            kind: kind.to_string(),
            source,
            modal: None,
            target_pose: None,
            arc: None,
            feed: None,
            dwell_mode: None,
            dwell_value: None,
            lhs: None,
            name: None,
            goto: None,
            then: None,
            else_: None,
        }
    }
}

impl From<&Instruction> for InstructionJson {
    fn from(instruction: &Instruction) -> Self {
        let source = source_json(instruction.source());
        match instruction {
            Instruction::Linear { modal, pose, feed, .. } => InstructionJson {
                modal: Some(ModalJson::from(modal)),
                target_pose: Some(PoseJson::from(pose)),
                feed: *feed,
                ..InstructionJson::bare("motion_linear", source)
            },
            Instruction::Arc { modal, pose, arc_params, feed, .. } => InstructionJson {
                modal: Some(ModalJson::from(modal)),
                target_pose: Some(PoseJson::from(pose)),
                arc: Some(ArcJson::from(arc_params)),
                feed: *feed,
                ..InstructionJson::bare("motion_arc", source)
            },
            Instruction::Dwell { modal, dwell_mode, dwell_value, .. } => InstructionJson {
                modal: Some(ModalJson::from(modal)),
                dwell_mode: Some(dwell_mode_str(*dwell_mode)),
                dwell_value: Some(*dwell_value),
                ..InstructionJson::bare("dwell", source)
            },
            Instruction::Assign { lhs, .. } => {
                InstructionJson { lhs: Some(lhs.clone()), ..InstructionJson::bare("assign", source) }
            }
            Instruction::Label { name, .. } => {
                InstructionJson { name: Some(name.clone()), ..InstructionJson::bare("label", source) }
            }
            Instruction::Goto(goto) => {
                InstructionJson { goto: Some(GotoJson::from(goto)), ..InstructionJson::bare("goto", source) }
            }
            Instruction::BranchIf { then, else_, .. } => InstructionJson {
                then: Some(GotoJson::from(then)),
                else_: else_.as_ref().map(GotoJson::from),
                ..InstructionJson::bare("branch_if", source)
            },
            Instruction::Sync { tag, .. } => {
                InstructionJson { name: Some(tag.clone()), ..InstructionJson::bare("sync", source) }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AilJson {
    pub schema_version: u32,
    pub instructions: Vec<InstructionJson>,
    pub diagnostics: Vec<DiagJson>,
    pub rejected_lines: Vec<RejectedLineJson>,
}

pub fn ail_to_json(result: &AilResult) -> AilJson {
    AilJson {
        schema_version: SCHEMA_VERSION,
        instructions: result.instructions.iter().map(InstructionJson::from).collect(),
        diagnostics: diags_json(&result.diagnostics),
        rejected_lines: rejected_json(&result.rejected_lines),
    }
}

// ---- Packet stage --------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketPayloadJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose: Option<PoseJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clockwise: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arc_params: Option<ArcJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketJson {
    pub packet_id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: SourceJson,
    pub modal: ModalJson,
    pub payload: PacketPayloadJson,
}

impl From<&gcode_packet::Packet> for PacketJson {
    fn from(packet: &gcode_packet::Packet) -> Self {
        let (kind, payload) = match &packet.payload {
            PacketType::LinearMove { pose, feed } => (
                "linear_move",
                PacketPayloadJson {
                    pose: Some(PoseJson::from(pose)),
                    clockwise: None,
                    arc_params: None,
                    feed: *feed,
                    dwell_mode: None,
                    dwell_value: None,
                },
            ),
            PacketType::ArcMove { clockwise, pose, arc_params, feed } => (
                "arc_move",
                PacketPayloadJson {
                    pose: Some(PoseJson::from(pose)),
                    clockwise: Some(*clockwise),
                    arc_params: Some(ArcJson::from(arc_params)),
                    feed: *feed,
                    dwell_mode: None,
                    dwell_value: None,
                },
            ),
            PacketType::Dwell { dwell_mode, dwell_value } => (
                "dwell",
                PacketPayloadJson {
                    pose: None,
                    clockwise: None,
                    arc_params: None,
                    feed: None,
                    dwell_mode: Some(dwell_mode_str(*dwell_mode)),
                    dwell_value: Some(*dwell_value),
                },
            ),
        };
        Self {
            packet_id: packet.packet_id,
            kind: kind.to_string(),
            source: source_json(&packet.source),
            modal: ModalJson::from(&packet.modal),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketResultJson {
    pub schema_version: u32,
    pub packets: Vec<PacketJson>,
    pub diagnostics: Vec<DiagJson>,
    pub rejected_lines: Vec<RejectedLineJson>,
}

pub fn packet_to_json(result: &PacketResult) -> PacketResultJson {
    PacketResultJson {
        schema_version: SCHEMA_VERSION,
        packets: result.packets.iter().map(PacketJson::from).collect(),
        diagnostics: diags_json(&result.diagnostics),
        rejected_lines: rejected_json(&result.rejected_lines),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode_ail::lower_to_ail;
    use gcode_messages::LowerOptions;
    use gcode_packet::packetize;
    use gcode_parser::parse;
    use gcode_semantic::apply_semantic_rules;

    #[test]
    fn parse_json_carries_schema_version_one() {
        let (program, diags) = parse("G1 X1\n");
        let json = parse_to_json(&program, &diags);
        assert_eq!(json.schema_version, 1);
        let serialized = serde_json::to_string(&json).expect("serializable");
        assert!(serialized.contains("\"schema_version\":1"));
    }

    #[test]
    fn lower_json_round_trips() {
        let (program, mut diags) = parse("N10 G1 X10 Y20 F100\n");
        diags.extend(apply_semantic_rules(&program));
        let result = gcode_lower::lower_to_messages(&program, &diags, &LowerOptions::default());
        let json = lower_to_json(&result);
        let text = serde_json::to_string(&json).expect("serializable");
        let back: LowerJson = serde_json::from_str(&text).expect("deserializable");
        assert_eq!(back, json);
        assert_eq!(json.messages[0].kind, "G1");
    }

    #[test]
    fn ail_json_tags_branch_if_with_then_and_else() {
        let (program, mut diags) = parse("IF R1 == 1\nG1 X1\nELSE\nG1 X2\nENDIF\n");
        diags.extend(apply_semantic_rules(&program));
        let ail = lower_to_ail(&program, &diags, &LowerOptions::default());
        let json = ail_to_json(&ail);
        let branch = json.instructions.iter().find(|i| i.kind == "branch_if").expect("has branch_if");
        assert!(branch.then.is_some());
        assert!(branch.else_.is_some());
    }

    #[test]
    fn packet_json_uses_snake_case_type_names() {
        let (program, mut diags) = parse("G2 X1 Y1 I1 J1\n");
        diags.extend(apply_semantic_rules(&program));
        let ail = lower_to_ail(&program, &diags, &LowerOptions::default());
        let packets = packetize(&ail.instructions, &ail.diagnostics, &ail.rejected_lines);
        let json = packet_to_json(&packets);
        assert_eq!(json.packets[0].kind, "arc_move");
        assert_eq!(json.packets[0].packet_id, 1);
    }
}
