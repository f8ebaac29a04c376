//! Structural diffing (§4.9) between two lowered message results, keyed by
//! `source.line`.

use std::collections::HashMap;

use gcode_messages::{Message, MessageResult};

/// The result of comparing two [`MessageResult`]s: messages present only in
/// the new result, messages whose line is shared but whose content differs,
/// and lines present only in the old result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDiff {
    pub added: Vec<Message>,
    pub updated: Vec<Message>,
    pub removed_lines: Vec<u32>,
}

fn by_line(result: &MessageResult) -> HashMap<u32, &Message> {
    result.messages.iter().map(|m| (m.source().line, m)).collect()
}

/// Diffs `a` (old) against `b` (new). Two messages on the same line compare
/// equal via [`Message::approx_eq`]; anything else on that line counts as
/// an update.
pub fn diff(a: &MessageResult, b: &MessageResult) -> MessageDiff {
    let old_by_line = by_line(a);
    let new_by_line = by_line(b);

    let mut added = Vec::new();
    let mut updated = Vec::new();
    for message in &b.messages {
        let line = message.source().line;
        match old_by_line.get(&line) {
            None => added.push(message.clone()),
            Some(old) if !old.approx_eq(message) => updated.push(message.clone()),
            Some(_) => {}
        }
    }

    let mut removed_lines: Vec<u32> =
        old_by_line.keys().filter(|line| !new_by_line.contains_key(line)).copied().collect();
    removed_lines.sort_unstable();

    tracing::debug!(
        added = added.len(),
        updated = updated.len(),
        removed = removed_lines.len(),
        "message diff computed"
    );
    MessageDiff { added, updated, removed_lines }
}

/// Applies a [`MessageDiff`] to `current`, returning the resulting message
/// list in ascending-line order.
pub fn apply_diff(current: &[Message], diff: &MessageDiff) -> Vec<Message> {
    let updated_by_line: HashMap<u32, &Message> = diff.updated.iter().map(|m| (m.source().line, m)).collect();

    let mut result: Vec<Message> = current
        .iter()
        .filter(|m| !diff.removed_lines.contains(&m.source().line))
        .map(|m| updated_by_line.get(&m.source().line).copied().cloned().unwrap_or_else(|| m.clone()))
        .collect();

    result.extend(diff.added.iter().cloned());
    result.sort_by_key(|m| m.source().line);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode_messages::LowerOptions;
    use gcode_parser::parse;
    use gcode_semantic::apply_semantic_rules;

    fn lower(source: &str) -> MessageResult {
        let (program, mut diags) = parse(source);
        diags.extend(apply_semantic_rules(&program));
        gcode_lower::lower_to_messages(&program, &diags, &LowerOptions::default())
    }

    #[test]
    fn detects_added_line() {
        let a = lower("G1 X1\n");
        let b = lower("G1 X1\nG1 X2\n");
        let d = diff(&a, &b);
        assert_eq!(d.added.len(), 1);
        assert!(d.updated.is_empty());
        assert!(d.removed_lines.is_empty());
    }

    #[test]
    fn detects_updated_line() {
        let a = lower("G1 X1\n");
        let b = lower("G1 X99\n");
        let d = diff(&a, &b);
        assert_eq!(d.updated.len(), 1);
        assert!(d.added.is_empty());
    }

    #[test]
    fn detects_removed_line() {
        let a = lower("G1 X1\nG1 X2\n");
        let b = lower("G1 X1\n");
        let d = diff(&a, &b);
        assert_eq!(d.removed_lines, vec![2]);
    }

    #[test]
    fn apply_diff_round_trips_to_new_state() {
        let a = lower("G1 X1\nG1 X2\n");
        let b = lower("G1 X1\nG1 X99\nG1 X3\n");
        let d = diff(&a, &b);
        let applied = apply_diff(&a.messages, &d);
        assert_eq!(applied.len(), b.messages.len());
        for (left, right) in applied.iter().zip(b.messages.iter()) {
            assert!(left.approx_eq(right));
        }
    }
}
