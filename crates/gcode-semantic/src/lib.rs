//! Pluggable per-line semantic rules (§4.2).
//!
//! Rules run in a fixed order against each [`Line`]; the first rule that
//! produces any diagnostic short-circuits the rest for that line. This
//! mirrors the layered-rule design of the grounded reference, generalized
//! from its single hard-coded check into an ordered list of small,
//! independently testable rule objects.

use gcode_ast::{GotoTargetKind, Line, Program, Statement, Word};
use gcode_diagnostic::Diagnostic;

/// A single line-level semantic check. Returns the diagnostics it finds;
/// an empty vec means the rule passed and the next rule in the ordered
/// list runs.
pub trait SemanticRule {
    fn check(&self, line: &Line) -> Vec<Diagnostic>;
}

/// Parses a `G`-headed word's value as a non-negative integer motion code
/// (`G1`, `G2.0`, ... but not `G1.5`). Returns `None` for non-`G` words or
/// values that aren't whole numbers.
fn motion_code_of(word: &Word) -> Option<u32> {
    if word.head != "G" {
        return None;
    }
    let value = word.value.as_deref()?;
    let parsed: f64 = value.parse().ok()?;
    if parsed < 0.0 || parsed.fract() != 0.0 {
        return None;
    }
    Some(parsed as u32)
}

/// Rule 1: a `G4` dwell must occupy its own block with exactly one of
/// `F` (seconds) or `S` (revolutions).
pub struct DwellBlockRule;

impl SemanticRule for DwellBlockRule {
    fn check(&self, line: &Line) -> Vec<Diagnostic> {
        let g4 = line.words().find(|w| motion_code_of(w) == Some(4));
        let Some(g4) = g4 else { return Vec::new() };

        let other_words: Vec<&Word> = line
            .words()
            .filter(|w| !(motion_code_of(w) == Some(4)) && w.head != "F" && w.head != "S")
            .collect();
        if !other_words.is_empty() {
            return vec![Diagnostic::error(
                "program G4 in a separate block; use only G4 with one of F (seconds) or S (revolutions)",
                g4.location,
            )];
        }

        let f = line.words().find(|w| w.head == "F");
        let s = line.words().find(|w| w.head == "S");
        match (f, s) {
            (None, None) => vec![Diagnostic::error(
                "G4 dwell requires F (seconds) or S (revolutions)",
                g4.location,
            )],
            (Some(_), Some(_)) => vec![Diagnostic::error(
                "G4 dwell must use either F (seconds) or S (revolutions), not both",
                g4.location,
            )],
            (Some(w), None) | (None, Some(w)) => {
                let numeric = w.value.as_deref().is_some_and(|v| v.parse::<f64>().is_ok());
                if numeric {
                    Vec::new()
                } else {
                    vec![Diagnostic::error("G4 dwell value must be numeric", w.location)]
                }
            }
        }
    }
}

/// Rule 2: at most one distinct motion code among `G1`/`G2`/`G3` per line
/// (repeats of the same code are tolerated).
pub struct MotionExclusivityRule;

impl SemanticRule for MotionExclusivityRule {
    fn check(&self, line: &Line) -> Vec<Diagnostic> {
        let mut seen: Option<u32> = None;
        for word in line.words() {
            let Some(code) = motion_code_of(word) else { continue };
            if !matches!(code, 1 | 2 | 3) {
                continue;
            }
            match seen {
                None => seen = Some(code),
                Some(first) if first == code => {}
                Some(_) => {
                    return vec![Diagnostic::error(
                        "multiple motion commands in one line; choose only one of G1/G2/G3",
                        word.location,
                    )];
                }
            }
        }
        Vec::new()
    }
}

const CARTESIAN_HEADS: [&str; 4] = ["X", "Y", "Z", "A"];
const POLAR_HEADS: [&str; 2] = ["AP", "RP"];

/// Rule 3: a `G1` line may not mix cartesian (`X`/`Y`/`Z`/`A`) and polar
/// (`AP`/`RP`) words.
pub struct CoordinateModeMixRule;

impl SemanticRule for CoordinateModeMixRule {
    fn check(&self, line: &Line) -> Vec<Diagnostic> {
        let has_g1 = line.words().any(|w| motion_code_of(w) == Some(1));
        if !has_g1 {
            return Vec::new();
        }
        let has_cartesian = line.words().any(|w| CARTESIAN_HEADS.contains(&w.head.as_str()));
        let polar_word = line.words().find(|w| POLAR_HEADS.contains(&w.head.as_str()));
        match (has_cartesian, polar_word) {
            (true, Some(polar)) => vec![Diagnostic::error(
                "mixed cartesian (X/Y/Z/A) and polar (AP/RP) words in G1 line; choose one coordinate mode",
                polar.location,
            )],
            _ => Vec::new(),
        }
    }
}

/// Rule 4: an `N`-word that survived into `Line::items` (i.e. was not
/// recognized as the block-start N-address by the parser) is always an
/// error, one of two kinds depending on whether its value is a valid
/// unsigned integer.
pub struct NAddressMisuseRule;

impl SemanticRule for NAddressMisuseRule {
    fn check(&self, line: &Line) -> Vec<Diagnostic> {
        let Some(n_word) = line.words().find(|w| w.head == "N") else { return Vec::new() };
        let is_unsigned_int =
            n_word.value.as_deref().is_some_and(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()));
        if is_unsigned_int {
            vec![Diagnostic::error("N-address must be at block start (before statement)", n_word.location)]
        } else {
            vec![Diagnostic::error(
                "invalid N-address; use unsigned integer form like N100",
                n_word.location,
            )]
        }
    }
}

/// The fixed rule order from §4.2.
pub fn default_rules() -> Vec<Box<dyn SemanticRule>> {
    vec![
        Box::new(DwellBlockRule),
        Box::new(MotionExclusivityRule),
        Box::new(CoordinateModeMixRule),
        Box::new(NAddressMisuseRule),
    ]
}

/// Runs the default rule set over every line, then the cross-line
/// duplicate-N-address pre-pass, returning all diagnostics in discovery
/// order (per-line rule diagnostics first, in line order, then duplicate
/// warnings in line order).
pub fn apply_semantic_rules(program: &Program) -> Vec<Diagnostic> {
    apply_rules(program, &default_rules())
}

/// Same as [`apply_semantic_rules`] but with a caller-supplied rule set,
/// for tests and embedders that want to extend or narrow the default list.
pub fn apply_rules(program: &Program, rules: &[Box<dyn SemanticRule>]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for line in &program.lines {
        for rule in rules {
            let found = rule.check(line);
            if !found.is_empty() {
                diagnostics.extend(found);
                break;
            }
        }
    }
    diagnostics.extend(duplicate_n_address_warnings(program));
    tracing::debug!(diagnostics = diagnostics.len(), "semantic rules applied");
    diagnostics
}

fn any_jump_targets_line_number(program: &Program) -> bool {
    let targets_line_number = |kind: GotoTargetKind| matches!(kind, GotoTargetKind::LineNumber | GotoTargetKind::Number);
    program.lines.iter().any(|line| match &line.statement {
        Some(Statement::Goto(target)) => targets_line_number(target.target_kind),
        Some(Statement::IfGoto { then, else_, .. }) => {
            targets_line_number(then.target_kind)
                || else_.as_ref().is_some_and(|e| targets_line_number(e.target_kind))
        }
        _ => false,
    })
}

/// Cross-line pre-pass (§4.2): duplicate N-addresses only matter when some
/// jump in the program targets a line number at all.
fn duplicate_n_address_warnings(program: &Program) -> Vec<Diagnostic> {
    if !any_jump_targets_line_number(program) {
        return Vec::new();
    }
    let mut seen_counts = std::collections::HashMap::new();
    let mut warnings = Vec::new();
    for line in &program.lines {
        let Some(line_number) = &line.line_number else { continue };
        let count: &mut u32 = seen_counts.entry(line_number.value).or_insert(0);
        *count += 1;
        if *count > 1 {
            warnings.push(Diagnostic::warning(
                format!(
                    "duplicate N-address N{}; jumps by line number may be ambiguous",
                    line_number.value
                ),
                line_number.location,
            ));
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcode_parser::parse;

    fn diags_for(source: &str) -> Vec<Diagnostic> {
        let (program, parse_diags) = parse(source);
        assert!(parse_diags.is_empty(), "unexpected parse diagnostics: {parse_diags:?}");
        apply_semantic_rules(&program)
    }

    #[test]
    fn dwell_requires_separate_block() {
        let diags = diags_for("N1 G4 F3 X10\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("separate block"));
    }

    #[test]
    fn dwell_with_only_f_is_clean() {
        assert!(diags_for("G4 F3\n").is_empty());
    }

    #[test]
    fn dwell_needs_f_or_s() {
        let diags = diags_for("G4\n");
        assert!(diags[0].message.contains("requires F"));
    }

    #[test]
    fn dwell_rejects_both_f_and_s() {
        let diags = diags_for("G4 F3 S2\n");
        assert!(diags[0].message.contains("not both"));
    }

    #[test]
    fn motion_exclusivity_allows_repeats() {
        assert!(diags_for("G1 G1 X10\n").is_empty());
    }

    #[test]
    fn motion_exclusivity_rejects_distinct_codes() {
        let diags = diags_for("G1 G2 X10\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("choose only one"));
    }

    #[test]
    fn coordinate_mode_mix_rejected() {
        let diags = diags_for("G1 X10 AP=90\n");
        assert!(diags[0].message.contains("choose one coordinate mode"));
    }

    #[test]
    fn coordinate_mode_cartesian_only_is_clean() {
        assert!(diags_for("G1 X10 Y20\n").is_empty());
    }

    #[test]
    fn mid_line_n_word_is_always_an_error() {
        let diags = diags_for("G1 N100 X10\n");
        assert!(diags[0].message.contains("block start"));
    }

    #[test]
    fn mid_line_n_word_non_integer_reports_invalid_form() {
        let diags = diags_for("G1 N1.5 X10\n");
        assert!(diags[0].message.contains("invalid N-address"));
    }

    #[test]
    fn duplicate_n_address_warns_only_when_jump_targets_line_number() {
        let no_jump = diags_for("N10 G1 X1\nN10 G1 X2\n");
        assert!(no_jump.is_empty());

        let with_jump = diags_for("N10 G1 X1\nN10 G1 X2\nGOTO N10\n");
        assert_eq!(with_jump.len(), 1);
        assert!(with_jump[0].message.contains("duplicate N-address N10"));
    }
}
