//! Instruction (AIL) lowering and structured `IF/ELSE/ENDIF` desugaring
//! (§4.4).
//!
//! Runs message lowering internally to get the typed motion messages, then
//! walks the program a second time in source order, emitting one or more
//! [`Instruction`]s per clean line and desugaring structured if-blocks into
//! goto+label sequences. A line carrying a fail-fast semantic error (the
//! first `RejectedLine` from message lowering) halts emission, same as the
//! message stage.

use std::collections::HashMap;

use gcode_ast::{Condition, ExprNode, GotoOpcode, GotoTargetKind, Program, Statement};
use gcode_diagnostic::Diagnostic;
use gcode_messages::{ArcParams, DwellMode, LowerOptions, Message, ModalState, Pose6, RejectedLine, SourceInfo};

/// A goto-family jump: an opcode plus its unresolved target, carried both
/// as a standalone [`Instruction::Goto`] and as the `then`/`else` arms of a
/// [`Instruction::BranchIf`].
#[derive(Debug, Clone, PartialEq)]
pub struct GotoInstr {
    pub source: SourceInfo,
    pub opcode: GotoOpcode,
    pub target: String,
    pub target_kind: GotoTargetKind,
}

/// One action in the abstract instruction language.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
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
    Assign { source: SourceInfo, lhs: String, rhs_expr: ExprNode },
    Label { source: SourceInfo, name: String },
    Goto(GotoInstr),
    BranchIf { source: SourceInfo, condition: Condition, then: GotoInstr, else_: Option<GotoInstr> },
    /// Reserved for future use; never produced by this lowering and
    /// skipped (with a warning) by packetization.
    #[allow(dead_code)]
    Sync { source: SourceInfo, tag: String },
}

impl Instruction {
    pub fn source(&self) -> &SourceInfo {
        match self {
            Instruction::Linear { source, .. }
            | Instruction::Arc { source, .. }
            | Instruction::Dwell { source, .. }
            | Instruction::Assign { source, .. }
            | Instruction::Label { source, .. }
            | Instruction::BranchIf { source, .. }
            | Instruction::Sync { source, .. } => source,
            Instruction::Goto(g) => &g.source,
        }
    }

    /// The stable `kind` tag used in debug output and JSON (§6).
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Instruction::Linear { .. } => "motion_linear",
            Instruction::Arc { .. } => "motion_arc",
            Instruction::Dwell { .. } => "dwell",
            Instruction::Assign { .. } => "assign",
            Instruction::Label { .. } => "label",
            Instruction::Goto(_) => "goto",
            Instruction::BranchIf { .. } => "branch_if",
            Instruction::Sync { .. } => "sync",
        }
    }
}

fn instruction_from_message(message: &Message) -> Instruction {
    match message {
        Message::Linear { source, modal, pose, feed } => {
            Instruction::Linear { source: source.clone(), modal: modal.clone(), pose: *pose, feed: *feed }
        }
        Message::Arc { source, modal, clockwise, pose, arc_params, feed } => Instruction::Arc {
            source: source.clone(),
            modal: modal.clone(),
            clockwise: *clockwise,
            pose: *pose,
            arc_params: *arc_params,
            feed: *feed,
        },
        Message::Dwell { source, modal, dwell_mode, dwell_value } => Instruction::Dwell {
            source: source.clone(),
            modal: modal.clone(),
            dwell_mode: *dwell_mode,
            dwell_value: *dwell_value,
        },
    }
}

fn goto_instr(source: SourceInfo, opcode: GotoOpcode, target: impl Into<String>, target_kind: GotoTargetKind) -> GotoInstr {
    GotoInstr { source, opcode, target: target.into(), target_kind }
}

/// An internal-label goto (§4.4: synthesized labels never collide with
/// user WORDs, which are uppercase letter/digit identifiers starting with
/// a letter; `__CF_...` never matches that shape).
fn internal_goto(source: SourceInfo, label: &str) -> GotoInstr {
    goto_instr(source, GotoOpcode::Goto, label, GotoTargetKind::Label)
}

struct IfContext {
    branch_index: usize,
    then_label: String,
    else_label: String,
    end_label: String,
    has_else: bool,
    if_location: gcode_position::Location,
}

pub struct AilResult {
    pub instructions: Vec<Instruction>,
    pub diagnostics: Vec<Diagnostic>,
    pub rejected_lines: Vec<RejectedLine>,
}

/// Lowers a program to AIL, running message lowering internally. See the
/// module docs for the fail-fast and control-flow desugaring contracts.
pub fn lower_to_ail(program: &Program, diagnostics: &[Diagnostic], options: &LowerOptions) -> AilResult {
    let message_result = gcode_lower::lower_to_messages(program, diagnostics, options);
    let messages_by_line: HashMap<u32, &Message> =
        message_result.messages.iter().map(|m| (m.source().line, m)).collect();
    let stop_at = message_result.rejected_lines.first().map(|r| r.line);

    let mut instructions = Vec::new();
    let mut desugar_errors = Vec::new();
    let mut if_stack: Vec<IfContext> = Vec::new();
    let mut label_counter: u32 = 0;

    for line in &program.lines {
        if stop_at.is_some_and(|stop| line.line_index >= stop) {
            break;
        }

        let source = SourceInfo {
            filename: options.filename.clone(),
            line: line.line_index,
            line_number: line.line_number.map(|n| n.value),
        };

        match &line.statement {
            Some(Statement::Assign { lhs, rhs, .. }) => {
                instructions.push(Instruction::Assign { source, lhs: lhs.clone(), rhs_expr: rhs.clone() });
            }
            Some(Statement::LabelDef { name, .. }) => {
                instructions.push(Instruction::Label { source, name: name.clone() });
            }
            Some(Statement::Goto(target)) => {
                instructions.push(Instruction::Goto(goto_instr(
                    source,
                    target.opcode,
                    target.target.clone(),
                    target.target_kind,
                )));
            }
            Some(Statement::IfGoto { condition, then, else_ }) => {
                let then = goto_instr(source.clone(), then.opcode, then.target.clone(), then.target_kind);
                let else_instr = else_
                    .as_ref()
                    .map(|e| goto_instr(source.clone(), e.opcode, e.target.clone(), e.target_kind));
                instructions.push(Instruction::BranchIf {
                    source,
                    condition: condition.clone(),
                    then,
                    else_: else_instr,
                });
            }
            Some(Statement::IfBlockStart { condition, location }) => {
                let n = label_counter;
                label_counter += 1;
                let then_label = format!("__CF_IF_THEN_{n}");
                let else_label = format!("__CF_IF_ELSE_{n}");
                let end_label = format!("__CF_IF_END_{n}");

                let branch_index = instructions.len();
                instructions.push(Instruction::BranchIf {
                    source: source.clone(),
                    condition: condition.clone(),
                    then: internal_goto(source.clone(), &then_label),
                    else_: Some(internal_goto(source.clone(), &end_label)),
                });
                instructions.push(Instruction::Label { source, name: then_label.clone() });

                if_stack.push(IfContext {
                    branch_index,
                    then_label,
                    else_label,
                    end_label,
                    has_else: false,
                    if_location: *location,
                });
            }
            Some(Statement::Else { location }) => match if_stack.last_mut() {
                None => desugar_errors.push(Diagnostic::error("ELSE without matching IF", *location)),
                Some(ctx) if ctx.has_else => {
                    desugar_errors.push(Diagnostic::error("duplicate ELSE for IF block", *location));
                }
                Some(ctx) => {
                    ctx.has_else = true;
                    if let Some(Instruction::BranchIf { else_, .. }) = instructions.get_mut(ctx.branch_index) {
                        *else_ = Some(internal_goto(source.clone(), &ctx.else_label));
                    }
                    instructions.push(Instruction::Goto(internal_goto(source.clone(), &ctx.end_label)));
                    instructions.push(Instruction::Label { source, name: ctx.else_label.clone() });
                }
            },
            Some(Statement::Endif { location }) => match if_stack.pop() {
                None => desugar_errors.push(Diagnostic::error("ENDIF without matching IF", *location)),
                Some(ctx) => {
                    instructions.push(Instruction::Label { source, name: ctx.end_label });
                }
            },
            // Structured loops are parsed but never lowered in this core (Non-goal).
            Some(Statement::While { .. })
            | Some(Statement::Endwhile { .. })
            | Some(Statement::For { .. })
            | Some(Statement::Endfor { .. })
            | Some(Statement::Repeat { .. })
            | Some(Statement::Until { .. })
            | Some(Statement::Loop { .. })
            | Some(Statement::Endloop { .. }) => {}
            None => {
                if let Some(message) = messages_by_line.get(&line.line_index) {
                    instructions.push(instruction_from_message(message));
                }
            }
        }
    }

    for ctx in if_stack.into_iter().rev() {
        desugar_errors.push(Diagnostic::error("missing ENDIF for IF block", ctx.if_location));
    }

    let mut out_diagnostics = message_result.diagnostics;
    out_diagnostics.extend(desugar_errors);

    tracing::debug!(
        instructions = instructions.len(),
        rejected = message_result.rejected_lines.len(),
        "AIL lowering complete"
    );
    AilResult { instructions, diagnostics: out_diagnostics, rejected_lines: message_result.rejected_lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode_parser::parse;
    use gcode_semantic::apply_semantic_rules;

    fn ail(source: &str) -> AilResult {
        let (program, mut diags) = parse(source);
        diags.extend(apply_semantic_rules(&program));
        lower_to_ail(&program, &diags, &LowerOptions::default())
    }

    #[test]
    fn scenario_6_labels_and_goto() {
        let result = ail("L1:\nGOTO L2\nL2:\n");
        assert!(result.diagnostics.is_empty());
        let kinds: Vec<_> = result.instructions.iter().map(Instruction::kind_str).collect();
        assert_eq!(kinds, vec!["label", "goto", "label"]);
    }

    #[test]
    fn scenario_8_structured_if_else_desugars() {
        let result = ail("IF R1 == 1\nG1 X1\nELSE\nG1 X2\nENDIF\n");
        assert!(result.diagnostics.is_empty());
        let kinds: Vec<_> = result.instructions.iter().map(Instruction::kind_str).collect();
        assert_eq!(
            kinds,
            vec!["branch_if", "label", "motion_linear", "goto", "label", "motion_linear", "label"]
        );
        match &result.instructions[0] {
            Instruction::BranchIf { then, else_, .. } => {
                assert_eq!(then.target, "__CF_IF_THEN_0");
                assert_eq!(else_.as_ref().unwrap().target, "__CF_IF_ELSE_0");
            }
            other => panic!("expected BranchIf, got {other:?}"),
        }
    }

    #[test]
    fn if_without_else_branches_directly_to_end() {
        let result = ail("IF R1 == 1\nG1 X1\nENDIF\n");
        match &result.instructions[0] {
            Instruction::BranchIf { else_, .. } => {
                assert_eq!(else_.as_ref().unwrap().target, "__CF_IF_END_0");
            }
            other => panic!("expected BranchIf, got {other:?}"),
        }
        let kinds: Vec<_> = result.instructions.iter().map(Instruction::kind_str).collect();
        assert_eq!(kinds, vec!["branch_if", "label", "motion_linear", "label"]);
    }

    #[test]
    fn else_without_if_is_an_error() {
        let result = ail("ELSE\n");
        assert!(result.diagnostics.iter().any(|d| d.message.contains("ELSE without matching IF")));
    }

    #[test]
    fn endif_without_if_is_an_error() {
        let result = ail("ENDIF\n");
        assert!(result.diagnostics.iter().any(|d| d.message.contains("ENDIF without matching IF")));
    }

    #[test]
    fn missing_endif_at_eof_is_an_error() {
        let result = ail("IF R1 == 1\nG1 X1\n");
        assert!(result.diagnostics.iter().any(|d| d.message.contains("missing ENDIF")));
    }

    #[test]
    fn rejected_line_halts_instruction_emission() {
        let result = ail("G1 X10\nG1 G2 X10\nG1 X20\n");
        assert_eq!(result.instructions.len(), 1);
        assert_eq!(result.rejected_lines.len(), 1);
    }
}
