//! Message lowering (§4.3): classifies each syntactically clean line into a
//! typed [`Message`], stopping the whole stream at the first line carrying
//! a semantic error (fail-fast).
//!
//! The batch entry point ([`lower_to_messages`]) and the streaming entry
//! point ([`lower_to_messages_streaming`]) share the same per-line logic —
//! the streaming API is a traversal over the same pipeline, not a second
//! implementation (see DESIGN.md).

use std::collections::HashMap;

use gcode_ast::{Line, Program, Word};
use gcode_diagnostic::{Diagnostic, errors_at_line};
use gcode_messages::{
    ArcParams, DwellMode, LowerOptions, Message, MessageResult, ModalState, Pose6, RejectedLine,
    SourceInfo,
};

fn motion_code_of(word: &Word) -> Option<u32> {
    if word.head != "G" {
        return None;
    }
    let value: f64 = word.value.as_deref()?.parse().ok()?;
    if value < 0.0 || value.fract() != 0.0 {
        return None;
    }
    Some(value as u32)
}

fn axis_value(line: &Line, head: &str) -> Option<f64> {
    line.words().find(|w| w.head == head).and_then(|w| w.value.as_deref()?.parse().ok())
}

fn source_of(line: &Line, options: &LowerOptions) -> SourceInfo {
    SourceInfo {
        filename: options.filename.clone(),
        line: line.line_index,
        line_number: line.line_number.map(|n| n.value),
    }
}

const UNSUPPORTED_ARC_HEADS: [&str; 8] = ["AR", "AP", "RP", "CIP", "CT", "I1", "J1", "K1"];

/// A dispatchable per-motion-family lowerer (§9's "family dispatch table").
trait MotionLowerer {
    fn lower(&self, line: &Line, options: &LowerOptions) -> (Message, Vec<Diagnostic>);
}

struct LinearLowerer;
impl MotionLowerer for LinearLowerer {
    fn lower(&self, line: &Line, options: &LowerOptions) -> (Message, Vec<Diagnostic>) {
        let pose = Pose6 {
            x: axis_value(line, "X"),
            y: axis_value(line, "Y"),
            z: axis_value(line, "Z"),
            a: axis_value(line, "A"),
            b: axis_value(line, "B"),
            c: axis_value(line, "C"),
        };
        let feed = axis_value(line, "F");
        let message = Message::Linear {
            source: source_of(line, options),
            modal: ModalState::motion("G1"),
            pose,
            feed,
        };
        (message, Vec::new())
    }
}

struct ArcLowerer {
    clockwise: bool,
}
impl MotionLowerer for ArcLowerer {
    fn lower(&self, line: &Line, options: &LowerOptions) -> (Message, Vec<Diagnostic>) {
        let pose = Pose6 {
            x: axis_value(line, "X"),
            y: axis_value(line, "Y"),
            z: axis_value(line, "Z"),
            a: axis_value(line, "A"),
            b: axis_value(line, "B"),
            c: axis_value(line, "C"),
        };
        let radius = axis_value(line, "R").or_else(|| axis_value(line, "CR"));
        let arc_params = ArcParams {
            i: axis_value(line, "I"),
            j: axis_value(line, "J"),
            k: axis_value(line, "K"),
            r: radius,
        };
        let feed = axis_value(line, "F");
        let warnings = line
            .words()
            .filter(|w| UNSUPPORTED_ARC_HEADS.contains(&w.head.as_str()))
            .map(|w| {
                Diagnostic::warning(format!("lowering ignored unsupported arc word: {}", w.head), w.location)
            })
            .collect();
        let code = if self.clockwise { "G2" } else { "G3" };
        let message = Message::Arc {
            source: source_of(line, options),
            modal: ModalState::motion(code),
            clockwise: self.clockwise,
            pose,
            arc_params,
            feed,
        };
        (message, warnings)
    }
}

struct DwellLowerer;
impl MotionLowerer for DwellLowerer {
    fn lower(&self, line: &Line, options: &LowerOptions) -> (Message, Vec<Diagnostic>) {
        let (mode, value) = line
            .words()
            .find_map(|w| match w.head.as_str() {
                "F" => Some((DwellMode::Seconds, w.value.as_deref())),
                "S" => Some((DwellMode::Revolutions, w.value.as_deref())),
                _ => None,
            })
            .map(|(mode, value)| (mode, value.and_then(|v| v.parse::<f64>().ok()).unwrap_or(0.0)))
            .unwrap_or((DwellMode::Seconds, 0.0));
        let message = Message::Dwell {
            source: source_of(line, options),
            modal: ModalState::non_modal("G4"),
            dwell_mode: mode,
            dwell_value: value,
        };
        (message, Vec::new())
    }
}

fn build_dispatch_table() -> HashMap<u32, Box<dyn MotionLowerer>> {
    let mut table: HashMap<u32, Box<dyn MotionLowerer>> = HashMap::new();
    table.insert(1, Box::new(LinearLowerer));
    table.insert(2, Box::new(ArcLowerer { clockwise: true }));
    table.insert(3, Box::new(ArcLowerer { clockwise: false }));
    table.insert(4, Box::new(DwellLowerer));
    table
}

enum LineOutcome {
    Message(Message, Vec<Diagnostic>),
    Rejected(RejectedLine),
    Skip,
}

fn lower_line(
    line: &Line,
    diagnostics: &[Diagnostic],
    options: &LowerOptions,
    table: &HashMap<u32, Box<dyn MotionLowerer>>,
) -> LineOutcome {
    let errors = errors_at_line(diagnostics, line.line_index);
    if !errors.is_empty() {
        return LineOutcome::Rejected(RejectedLine { line: line.line_index, reasons: errors });
    }

    let mut codes = Vec::new();
    for word in line.words() {
        if let Some(code) = motion_code_of(word) {
            if matches!(code, 1 | 2 | 3 | 4) && !codes.contains(&code) {
                codes.push(code);
            }
        }
    }
    if codes.len() > 1 {
        return LineOutcome::Skip;
    }
    let Some(code) = codes.first().copied() else { return LineOutcome::Skip };
    let Some(lowerer) = table.get(&code) else { return LineOutcome::Skip };
    let (message, warnings) = lowerer.lower(line, options);
    LineOutcome::Message(message, warnings)
}

/// Lowers a parsed, semantically-checked program into typed messages.
/// `diagnostics` is the carried-forward parse + semantic diagnostic list;
/// it is preserved unchanged at the front of the result, with any new
/// lowering warnings appended after it.
pub fn lower_to_messages(program: &Program, diagnostics: &[Diagnostic], options: &LowerOptions) -> MessageResult {
    let table = build_dispatch_table();
    let mut messages = Vec::new();
    let mut rejected_lines = Vec::new();
    let mut warnings = Vec::new();

    for line in &program.lines {
        match lower_line(line, diagnostics, options, &table) {
            LineOutcome::Rejected(rejected) => {
                rejected_lines.push(rejected);
                break;
            }
            LineOutcome::Message(message, mut line_warnings) => {
                messages.push(message);
                warnings.append(&mut line_warnings);
            }
            LineOutcome::Skip => {}
        }
    }

    let mut out_diagnostics = diagnostics.to_vec();
    out_diagnostics.extend(warnings);
    tracing::debug!(
        messages = messages.len(),
        rejected = rejected_lines.len(),
        diagnostics = out_diagnostics.len(),
        "message lowering complete"
    );
    MessageResult { messages, diagnostics: out_diagnostics, rejected_lines }
}

/// Per-class caps for [`lower_to_messages_streaming`]; `None` means
/// unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamLimits {
    pub max_lines: Option<usize>,
    pub max_messages: Option<usize>,
    pub max_diagnostics: Option<usize>,
}

/// The three callback hooks driven by the streaming traversal.
pub struct StreamCallbacks<'a> {
    pub on_message: &'a mut dyn FnMut(&Message),
    pub on_diagnostic: &'a mut dyn FnMut(&Diagnostic),
    pub on_rejected_line: &'a mut dyn FnMut(&RejectedLine),
}

/// Streaming variant of [`lower_to_messages`] for large inputs: the same
/// per-line lowering, driven one line at a time through callbacks rather
/// than collected into a `MessageResult`.
///
/// Returns `false` if the traversal was stopped early by the cancel probe
/// or by a per-class limit; returns `true` if it ran to completion,
/// *including* the case where it stopped at a fail-fast rejected line
/// (that is this lowering's normal termination, not an early-out).
pub fn lower_to_messages_streaming(
    program: &Program,
    diagnostics: &[Diagnostic],
    options: &LowerOptions,
    limits: &StreamLimits,
    cancel: &mut dyn FnMut() -> bool,
    callbacks: &mut StreamCallbacks,
) -> bool {
    let table = build_dispatch_table();
    let mut lines_seen = 0usize;
    let mut messages_emitted = 0usize;
    let mut diagnostics_emitted = 0usize;

    for line in &program.lines {
        if cancel() {
            return false;
        }
        if limits.max_lines.is_some_and(|max| lines_seen >= max) {
            return false;
        }
        lines_seen += 1;

        match lower_line(line, diagnostics, options, &table) {
            LineOutcome::Rejected(rejected) => {
                (callbacks.on_rejected_line)(&rejected);
                return true;
            }
            LineOutcome::Message(message, warnings) => {
                for warning in &warnings {
                    if limits.max_diagnostics.is_some_and(|max| diagnostics_emitted >= max) {
                        return false;
                    }
                    (callbacks.on_diagnostic)(warning);
                    diagnostics_emitted += 1;
                }
                if limits.max_messages.is_some_and(|max| messages_emitted >= max) {
                    return false;
                }
                (callbacks.on_message)(&message);
                messages_emitted += 1;
            }
            LineOutcome::Skip => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode_parser::parse;
    use gcode_semantic::apply_semantic_rules;

    fn lower(source: &str) -> MessageResult {
        let (program, mut diags) = parse(source);
        diags.extend(apply_semantic_rules(&program));
        lower_to_messages(&program, &diags, &LowerOptions::default())
    }

    #[test]
    fn scenario_1_full_linear_pose() {
        let result = lower("N10 G1 X10 Y20 Z30 A40 B50 C60 F100\n");
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.messages.len(), 1);
        match &result.messages[0] {
            Message::Linear { source, modal, pose, feed } => {
                assert_eq!(source.line, 1);
                assert_eq!(source.line_number, Some(10));
                assert_eq!(modal.code, "G1");
                assert!(modal.updates_state);
                assert_eq!(*pose, Pose6 {
                    x: Some(10.0), y: Some(20.0), z: Some(30.0), a: Some(40.0), b: Some(50.0), c: Some(60.0)
                });
                assert_eq!(*feed, Some(100.0));
            }
            other => panic!("expected Linear, got {other:?}"),
        }
    }

    #[test]
    fn scenario_2_fail_fast_on_second_motion_command() {
        let result = lower("G1 X10\nG1 G2 X10\nG1 X20\n");
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.rejected_lines.len(), 1);
        assert_eq!(result.rejected_lines[0].line, 2);
        assert!(result.rejected_lines[0].reasons[0].message.contains("choose only one"));
    }

    #[test]
    fn scenario_3_clockwise_arc() {
        let result = lower("N20 G2 X10 Y20 I1 J2 K3 CR=40 F100\n");
        assert!(result.diagnostics.is_empty());
        match &result.messages[0] {
            Message::Arc { clockwise, arc_params, .. } => {
                assert!(*clockwise);
                assert_eq!(*arc_params, ArcParams { i: Some(1.0), j: Some(2.0), k: Some(3.0), r: Some(40.0) });
            }
            other => panic!("expected Arc, got {other:?}"),
        }
    }

    #[test]
    fn scenario_4_unsupported_arc_words_warn() {
        let result = lower("G2 AP=90 RP=10 AR=30 X10 Y20 F100\n");
        let warnings: Vec<_> = result.diagnostics.iter().filter(|d| !d.is_error()).collect();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|d| d.message.contains("AP")));
        assert!(warnings.iter().any(|d| d.message.contains("RP")));
        assert!(warnings.iter().any(|d| d.message.contains("AR")));
    }

    #[test]
    fn scenario_5_dwell_outside_own_block_is_rejected() {
        let result = lower("N1 G4 F3 X10\n");
        assert!(result.messages.is_empty());
        assert_eq!(result.rejected_lines.len(), 1);
        assert!(result.rejected_lines[0].reasons[0].message.contains("separate block"));
    }

    #[test]
    fn streaming_matches_batch_message_count() {
        let (program, mut diags) = parse("G1 X1\nG2 X2 Y2 I1 J1\nG4 F1\n");
        diags.extend(apply_semantic_rules(&program));
        let mut messages = Vec::new();
        let mut warnings = Vec::new();
        let mut rejected = Vec::new();
        let completed = lower_to_messages_streaming(
            &program,
            &diags,
            &LowerOptions::default(),
            &StreamLimits::default(),
            &mut || false,
            &mut StreamCallbacks {
                on_message: &mut |m| messages.push(m.clone()),
                on_diagnostic: &mut |d| warnings.push(d.clone()),
                on_rejected_line: &mut |r| rejected.push(r.clone()),
            },
        );
        assert!(completed);
        assert_eq!(messages.len(), 3);
        assert!(rejected.is_empty());
    }

    #[test]
    fn streaming_honors_max_lines_limit() {
        let (program, mut diags) = parse("G1 X1\nG1 X2\nG1 X3\n");
        diags.extend(apply_semantic_rules(&program));
        let mut messages = Vec::new();
        let completed = lower_to_messages_streaming(
            &program,
            &diags,
            &LowerOptions::default(),
            &StreamLimits { max_lines: Some(2), ..Default::default() },
            &mut || false,
            &mut StreamCallbacks {
                on_message: &mut |m| messages.push(m.clone()),
                on_diagnostic: &mut |_| {},
                on_rejected_line: &mut |_| {},
            },
        );
        assert!(!completed);
        assert_eq!(messages.len(), 2);
    }
}
