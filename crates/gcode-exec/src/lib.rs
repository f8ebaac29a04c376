//! Stepping executor (§4.5/§4.7): runs an AIL instruction list one step at
//! a time against an externally supplied condition resolver, suspending at
//! `BranchIf` instructions whose condition can't be decided synchronously.

use std::collections::{HashMap, HashSet};

use gcode_ail::{GotoInstr, Instruction};
use gcode_ast::{Condition, GotoOpcode, GotoTargetKind};
use gcode_diagnostic::Diagnostic;
use gcode_messages::SourceInfo;
use gcode_position::Location;

/// What a condition resolver reports back for a `BranchIf`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionResolution {
    True,
    False,
    Pending { wait_key: Option<String>, retry_at_ms: Option<u64> },
    Error { message: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorStatus {
    Ready,
    BlockedOnCondition,
    Completed,
    Fault,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blocked {
    pub instruction_index: usize,
    pub wait_key: Option<String>,
    pub retry_at_ms: Option<u64>,
}

/// A read-only snapshot of the executor's progress, for introspection
/// between `step` calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorState {
    pub status: ExecutorStatus,
    pub pc: usize,
    pub blocked: Option<Blocked>,
    pub fault_message: Option<String>,
}

/// Resolves a `BranchIf` condition; called synchronously from `step`. Must
/// not mutate executor state except indirectly via `notify_event` between
/// `step` calls.
pub type ConditionResolver<'a> = &'a mut dyn FnMut(&Condition, &SourceInfo) -> ConditionResolution;

pub struct AilExecutor {
    instructions: Vec<Instruction>,
    label_positions: HashMap<String, Vec<usize>>,
    line_number_positions: HashMap<u32, Vec<usize>>,
    pending_events: HashSet<String>,
    status: ExecutorStatus,
    pc: usize,
    blocked: Option<Blocked>,
    fault_message: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl AilExecutor {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let mut label_positions: HashMap<String, Vec<usize>> = HashMap::new();
        let mut line_number_positions: HashMap<u32, Vec<usize>> = HashMap::new();

        for (index, instruction) in instructions.iter().enumerate() {
            if let Instruction::Label { name, .. } = instruction {
                label_positions.entry(name.clone()).or_default().push(index);
            }
            if let Some(line_number) = instruction.source().line_number {
                line_number_positions.entry(line_number).or_default().push(index);
            }
        }

        tracing::debug!(instructions = instructions.len(), "executor constructed");
        Self {
            instructions,
            label_positions,
            line_number_positions,
            pending_events: HashSet::new(),
            status: ExecutorStatus::Ready,
            pc: 0,
            blocked: None,
            fault_message: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn state(&self) -> ExecutorState {
        ExecutorState {
            status: self.status,
            pc: self.pc,
            blocked: self.blocked.clone(),
            fault_message: self.fault_message.clone(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Adds `key` to the pending event set. Idempotent; safe to call
    /// between `step` calls regardless of executor status.
    pub fn notify_event(&mut self, key: &str) {
        self.pending_events.insert(key.to_string());
    }

    fn candidates(&self, goto: &GotoInstr) -> &[usize] {
        const EMPTY: &[usize] = &[];
        match goto.target_kind {
            GotoTargetKind::Label => self.label_positions.get(&goto.target).map_or(EMPTY, |v| v.as_slice()),
            GotoTargetKind::LineNumber => goto
                .target
                .strip_prefix('N')
                .and_then(|digits| digits.parse::<u32>().ok())
                .and_then(|value| self.line_number_positions.get(&value))
                .map_or(EMPTY, |v| v.as_slice()),
            GotoTargetKind::Number => goto
                .target
                .parse::<u32>()
                .ok()
                .and_then(|value| self.line_number_positions.get(&value))
                .map_or(EMPTY, |v| v.as_slice()),
            GotoTargetKind::SystemVariable => EMPTY,
        }
    }

    /// Resolves a goto against the current pc, applying directional
    /// selection per §4.5. `None` means unresolved.
    fn resolve(&self, pc: usize, goto: &GotoInstr) -> Option<usize> {
        let candidates = self.candidates(goto);
        let forward = candidates.iter().copied().filter(|&i| i > pc).min();
        let backward = candidates.iter().copied().filter(|&i| i < pc).max();
        match goto.opcode {
            GotoOpcode::Gotof => forward,
            GotoOpcode::Gotob => backward,
            GotoOpcode::Goto | GotoOpcode::Gotoc => forward.or(backward),
        }
    }

    fn fault(&mut self, message: String, source: &SourceInfo) {
        self.status = ExecutorStatus::Fault;
        self.fault_message = Some(message.clone());
        self.diagnostics.push(Diagnostic::error(message, Location::at_line(source.line)));
    }

    /// Jumps to `goto`'s resolved target, or applies unresolved semantics:
    /// `GOTOC` silently advances one instruction, every other opcode
    /// faults.
    fn jump_or_unresolved(&mut self, goto: &GotoInstr, source: &SourceInfo) {
        match self.resolve(self.pc, goto) {
            Some(index) => self.pc = index,
            None if goto.opcode == GotoOpcode::Gotoc => self.pc += 1,
            None => self.fault(format!("unresolved goto target: {}", goto.target), source),
        }
    }

    /// Advances the executor by one instruction. Returns `false` when no
    /// progress was made (terminal state, or still blocked).
    pub fn step(&mut self, now_ms: u64, resolver: ConditionResolver<'_>) -> bool {
        if matches!(self.status, ExecutorStatus::Fault | ExecutorStatus::Completed) {
            return false;
        }

        if self.status == ExecutorStatus::BlockedOnCondition {
            let Some(blocked) = self.blocked.clone() else {
                return false;
            };
            let event_ready = blocked.wait_key.as_ref().is_some_and(|key| self.pending_events.contains(key));
            let deadline_ready = blocked.retry_at_ms.is_some_and(|deadline| now_ms >= deadline);
            if !event_ready && !deadline_ready {
                return false;
            }
            if let Some(key) = &blocked.wait_key {
                self.pending_events.remove(key);
            }
            self.status = ExecutorStatus::Ready;
            self.pc = blocked.instruction_index;
            self.blocked = None;
        }

        if self.pc >= self.instructions.len() {
            self.status = ExecutorStatus::Completed;
            tracing::debug!(pc = self.pc, "executor completed");
            return true;
        }

        let instruction = self.instructions[self.pc].clone();
        let source = instruction.source().clone();

        match &instruction {
            Instruction::Goto(goto) => self.jump_or_unresolved(goto, &source),
            Instruction::BranchIf { condition, then, else_, .. } => {
                match resolver(condition, &source) {
                    ConditionResolution::True => self.jump_or_unresolved(then, &source),
                    ConditionResolution::False => match else_ {
                        Some(else_goto) => self.jump_or_unresolved(else_goto, &source),
                        None => self.pc += 1,
                    },
                    ConditionResolution::Pending { wait_key, retry_at_ms } => {
                        self.status = ExecutorStatus::BlockedOnCondition;
                        self.blocked = Some(Blocked { instruction_index: self.pc, wait_key, retry_at_ms });
                        tracing::trace!(pc = self.pc, "executor blocked on condition");
                        return true;
                    }
                    ConditionResolution::Error { message } => {
                        self.fault(
                            message.unwrap_or_else(|| "condition evaluation failed at runtime".to_string()),
                            &source,
                        );
                    }
                }
            }
            _ => self.pc += 1,
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode_ail::lower_to_ail;
    use gcode_messages::LowerOptions;
    use gcode_parser::parse;
    use gcode_semantic::apply_semantic_rules;

    fn build(source: &str) -> Vec<Instruction> {
        let (program, mut diags) = parse(source);
        diags.extend(apply_semantic_rules(&program));
        lower_to_ail(&program, &diags, &LowerOptions::default()).instructions
    }

    #[test]
    fn scenario_6_simple_goto_loop_completes() {
        let instructions = build("L1:\nGOTO L1\n");
        let mut exec = AilExecutor::new(instructions);
        // Step past the label.
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        // The goto always jumps back to L1 (index 0); give it a few hops,
        // it never completes or faults on its own (an infinite loop is
        // a legitimate program here; the test just proves no premature fault).
        for _ in 0..5 {
            assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        }
        assert_eq!(exec.state().status, ExecutorStatus::Ready);
    }

    #[test]
    fn runs_to_completion_past_last_instruction() {
        let instructions = build("G1 X1\nG1 X2\n");
        let mut exec = AilExecutor::new(instructions);
        while exec.step(0, &mut |_, _| ConditionResolution::True) {
            if exec.state().status == ExecutorStatus::Completed {
                break;
            }
        }
        assert_eq!(exec.state().status, ExecutorStatus::Completed);
    }

    #[test]
    fn branch_if_true_jumps_to_then_label() {
        let instructions = build("IF R1 == 1\nG1 X1\nELSE\nG1 X2\nENDIF\n");
        let mut exec = AilExecutor::new(instructions);
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        // pc is now at the Label(__CF_IF_THEN_0) instruction, immediately after it the then-body.
        assert_eq!(exec.state().status, ExecutorStatus::Ready);
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        // The then-arm's G1 X1 must have executed, never the else-arm's G1 X2.
    }

    #[test]
    fn branch_if_pending_blocks_then_resumes_on_event() {
        let instructions = build("IF R1 == 1\nG1 X1\nENDIF\n");
        let mut exec = AilExecutor::new(instructions);
        let advanced = exec.step(0, &mut |_, _| {
            ConditionResolution::Pending { wait_key: Some("door_closed".to_string()), retry_at_ms: None }
        });
        assert!(advanced);
        assert_eq!(exec.state().status, ExecutorStatus::BlockedOnCondition);
        assert!(!exec.step(0, &mut |_, _| ConditionResolution::True));
        exec.notify_event("door_closed");
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        assert_eq!(exec.state().status, ExecutorStatus::Ready);
    }

    #[test]
    fn branch_if_pending_resumes_on_deadline() {
        let instructions = build("IF R1 == 1\nG1 X1\nENDIF\n");
        let mut exec = AilExecutor::new(instructions);
        assert!(exec.step(0, &mut |_, _| {
            ConditionResolution::Pending { wait_key: None, retry_at_ms: Some(1_000) }
        }));
        assert!(!exec.step(500, &mut |_, _| ConditionResolution::True));
        assert!(exec.step(1_000, &mut |_, _| ConditionResolution::True));
        assert_eq!(exec.state().status, ExecutorStatus::Ready);
    }

    #[test]
    fn unresolved_goto_faults() {
        let instructions = vec![Instruction::Goto(gcode_ail::GotoInstr {
            source: SourceInfo::new(1),
            opcode: GotoOpcode::Goto,
            target: "NOWHERE".to_string(),
            target_kind: GotoTargetKind::Label,
        })];
        let mut exec = AilExecutor::new(instructions);
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        assert_eq!(exec.state().status, ExecutorStatus::Fault);
        assert!(exec.state().fault_message.unwrap().contains("unresolved goto target"));
    }

    #[test]
    fn unresolved_gotoc_advances_silently() {
        let instructions = vec![
            Instruction::Goto(gcode_ail::GotoInstr {
                source: SourceInfo::new(1),
                opcode: GotoOpcode::Gotoc,
                target: "NOWHERE".to_string(),
                target_kind: GotoTargetKind::Label,
            }),
            Instruction::Label { source: SourceInfo::new(2), name: "END".to_string() },
        ];
        let mut exec = AilExecutor::new(instructions);
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        assert_eq!(exec.state().status, ExecutorStatus::Ready);
        assert_eq!(exec.state().pc, 1);
    }

    #[test]
    fn condition_error_faults_with_default_message() {
        let instructions = build("IF R1 == 1\nG1 X1\nENDIF\n");
        let mut exec = AilExecutor::new(instructions);
        assert!(exec.step(0, &mut |_, _| ConditionResolution::Error { message: None }));
        assert_eq!(exec.state().status, ExecutorStatus::Fault);
        assert_eq!(exec.state().fault_message.as_deref(), Some("condition evaluation failed at runtime"));
    }

    #[test]
    fn goto_by_line_number_target() {
        // GOTO N20 jumps to whichever instruction's source line carries N20.
        let instructions = build("N10 G1 X1\nN20 G1 X2\nGOTO N20\n");
        let mut exec = AilExecutor::new(instructions);
        // step through the two motions, then the goto.
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        assert!(exec.step(0, &mut |_, _| ConditionResolution::True));
        assert_eq!(exec.state().pc, 1);
    }
}
