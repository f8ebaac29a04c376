//! Abstract syntax tree produced by `gcode-parser`.
//!
//! Mirrors the grounded reference's `ast.h` shape (`Word`, `Comment`,
//! `LineNumber`, `Line`, `Program`) and extends it with the statement and
//! expression types the reference's retrieved snapshot omits but its test
//! suite and the dwell/control-flow semantics require: assignments, labels,
//! gotos, the legacy one-line `IF ... GOTOx` form, structured if/while/for
//! blocks, and a full expression tree.

use gcode_position::Location;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A raw `HEAD[=?VALUE?]` lexeme. See [`split_word_text`] for the splitting rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub head: String,
    pub value: Option<String>,
    pub has_equal: bool,
    pub location: Location,
}

/// Splits a raw word lexeme into `(head, value)` per the dialect's rule: if
/// `=` occurs, split there; otherwise split at the first index >= 1 whose
/// character is a digit, `+`, `-`, or `.`.
pub fn split_word_text(text: &str) -> (String, Option<String>, bool) {
    if let Some(eq_pos) = text.find('=') {
        let head = text[..eq_pos].to_ascii_uppercase();
        let rest = &text[eq_pos + 1..];
        let value = if rest.is_empty() { None } else { Some(rest.to_string()) };
        return (head, value, true);
    }
    let split_at = text
        .char_indices()
        .skip(1)
        .find(|(_, c)| c.is_ascii_digit() || *c == '+' || *c == '-' || *c == '.')
        .map(|(idx, _)| idx);
    match split_at {
        Some(idx) => (text[..idx].to_ascii_uppercase(), Some(text[idx..].to_string()), false),
        None => (text.to_ascii_uppercase(), None, false),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub location: Location,
}

/// A `Word` or `Comment` collected into a [`Line`]'s `items` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LineItem {
    Word(Word),
    Comment(Comment),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineNumber {
    pub value: u32,
    pub location: Location,
}

/// Unary operators in an expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
}

/// Additive/multiplicative operators in an expression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Relational operators, used only in [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Expression tree: literal numbers, variables, and unary/binary operators.
/// Built left-associative via precedence climbing; shared via [`Rc`] since
/// the pipeline is single-threaded and subtrees are cheaply cloned into
/// sibling instructions (e.g. a branch condition's operands).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprNode {
    Literal { value: f64, location: Location },
    Variable { name: String, is_system: bool, location: Location },
    Unary { op: UnaryOp, operand: Rc<ExprNode>, location: Location },
    Binary { op: BinaryOp, lhs: Rc<ExprNode>, rhs: Rc<ExprNode>, location: Location },
}

impl ExprNode {
    pub fn location(&self) -> Location {
        match self {
            ExprNode::Literal { location, .. }
            | ExprNode::Variable { location, .. }
            | ExprNode::Unary { location, .. }
            | ExprNode::Binary { location, .. } => *location,
        }
    }
}

/// A single `lhs op rhs` comparison, plus any `AND`-chained terms kept as
/// raw text. Fuller (multi-term) evaluation is left to the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub lhs: ExprNode,
    pub op: RelOp,
    pub rhs: ExprNode,
    pub location: Location,
    /// Raw source text of each `AND`-joined term after the first, in order.
    pub and_terms: Vec<String>,
}

/// The four jump opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GotoOpcode {
    Goto,
    Gotof,
    Gotob,
    Gotoc,
}

impl GotoOpcode {
    pub const fn as_str(self) -> &'static str {
        match self {
            GotoOpcode::Goto => "GOTO",
            GotoOpcode::Gotof => "GOTOF",
            GotoOpcode::Gotob => "GOTOB",
            GotoOpcode::Gotoc => "GOTOC",
        }
    }
}

/// What kind of lexeme a goto's target came from, which determines how the
/// executor resolves it against the label/line-number indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GotoTargetKind {
    Label,
    LineNumber,
    Number,
    SystemVariable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GotoTarget {
    pub opcode: GotoOpcode,
    pub target: String,
    pub target_kind: GotoTargetKind,
    pub location: Location,
}

/// The single statement a [`Line`] may carry, in addition to its `items`.
/// At most one of these per line (see `Line` invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Assign { lhs: String, rhs: ExprNode, location: Location },
    LabelDef { name: String, location: Location },
    Goto(GotoTarget),
    /// The legacy one-line `IF <cond> GOTOx <tgt> [ELSE GOTOy <tgt>]` form,
    /// lowered directly to a single `BranchIf` instruction.
    IfGoto { condition: Condition, then: GotoTarget, else_: Option<GotoTarget> },
    /// Structured `IF <cond>` opening a block closed later by `ELSE`/`ENDIF`.
    IfBlockStart { condition: Condition, location: Location },
    Else { location: Location },
    Endif { location: Location },
    /// Parsed but never lowered to branches in this core (see Non-goals).
    While { condition: Condition, location: Location },
    Endwhile { location: Location },
    For { var: String, from: ExprNode, to: ExprNode, location: Location },
    Endfor { location: Location },
    Repeat { location: Location },
    Until { condition: Condition, location: Location },
    Loop { location: Location },
    Endloop { location: Location },
}

/// One input line, after lexing and statement recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// 1-based input line number, distinct from any N-address on the line.
    pub line_index: u32,
    pub block_delete: bool,
    pub block_delete_location: Option<Location>,
    pub line_number: Option<LineNumber>,
    pub items: Vec<LineItem>,
    pub statement: Option<Statement>,
}

impl Line {
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.items.iter().filter_map(|item| match item {
            LineItem::Word(word) => Some(word),
            LineItem::Comment(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Program {
    pub lines: Vec<Line>,
}
