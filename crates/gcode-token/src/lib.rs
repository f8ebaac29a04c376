//! Token types produced by the hand-written gcode lexer.
//!
//! The distilled specification treats tokenization as an external grammar
//! layer; this crate and `gcode-lexer` supply a concrete implementation of
//! that layer since no generated grammar artifact ships with this pipeline.
//! Every token carries its own [`Location`] so the parser never has to
//! recompute positions from raw offsets.

use gcode_position::Location;
use std::fmt;

/// Structured-control-flow and jump keywords. Matched case-insensitively at
/// lex time; the canonical spelling is always upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    If,
    Else,
    Endif,
    While,
    Endwhile,
    For,
    Endfor,
    Repeat,
    Until,
    Loop,
    Endloop,
    Goto,
    Gotof,
    Gotob,
    Gotoc,
    And,
}

impl Keyword {
    /// Looks up a keyword by its source spelling, case-insensitively.
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text.to_ascii_uppercase().as_str() {
            "IF" => Keyword::If,
            "ELSE" => Keyword::Else,
            "ENDIF" => Keyword::Endif,
            "WHILE" => Keyword::While,
            "ENDWHILE" => Keyword::Endwhile,
            "FOR" => Keyword::For,
            "ENDFOR" => Keyword::Endfor,
            "REPEAT" => Keyword::Repeat,
            "UNTIL" => Keyword::Until,
            "LOOP" => Keyword::Loop,
            "ENDLOOP" => Keyword::Endloop,
            "GOTO" => Keyword::Goto,
            "GOTOF" => Keyword::Gotof,
            "GOTOB" => Keyword::Gotob,
            "GOTOC" => Keyword::Gotoc,
            "AND" => Keyword::And,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "IF",
            Keyword::Else => "ELSE",
            Keyword::Endif => "ENDIF",
            Keyword::While => "WHILE",
            Keyword::Endwhile => "ENDWHILE",
            Keyword::For => "FOR",
            Keyword::Endfor => "ENDFOR",
            Keyword::Repeat => "REPEAT",
            Keyword::Until => "UNTIL",
            Keyword::Loop => "LOOP",
            Keyword::Endloop => "ENDLOOP",
            Keyword::Goto => "GOTO",
            Keyword::Gotof => "GOTOF",
            Keyword::Gotob => "GOTOB",
            Keyword::Gotoc => "GOTOC",
            Keyword::And => "AND",
        }
    }

    /// True for the four goto-family opcodes (`GOTO`, `GOTOF`, `GOTOB`, `GOTOC`).
    pub const fn is_goto_opcode(self) -> bool {
        matches!(self, Keyword::Goto | Keyword::Gotof | Keyword::Gotob | Keyword::Gotoc)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary/relational operators recognized inside expressions and conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Operator {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::EqEq => "==",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
        }
    }

    pub const fn is_additive(self) -> bool {
        matches!(self, Operator::Plus | Operator::Minus)
    }

    pub const fn is_multiplicative(self) -> bool {
        matches!(self, Operator::Star | Operator::Slash)
    }

    pub const fn is_relational(self) -> bool {
        matches!(
            self,
            Operator::EqEq
                | Operator::NotEq
                | Operator::Lt
                | Operator::LtEq
                | Operator::Gt
                | Operator::GtEq
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a lexical token, carrying its raw source text where relevant.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A raw `HEAD[=?VALUE?]` lexeme, not yet split (see `gcode-parser`).
    Word(String),
    /// An `N<digits>` line-number lexeme, including the leading `N`.
    LineNumber(String),
    /// A numeric literal, e.g. `10`, `-3.5`.
    Number(String),
    /// A `$`-prefixed system variable reference, `$` included in the text.
    SystemVar(String),
    /// A parenthesized or `;`-to-eol comment, raw text without delimiters stripped.
    Comment(String),
    Keyword(Keyword),
    Operator(Operator),
    /// A bare identifier used as a label name or condition operand.
    Identifier(String),
    /// `=` used as an assignment/word separator.
    Equals,
    /// `:` terminating a label definition.
    Colon,
    /// A leading `/` at the very start of a line (block-delete marker).
    BlockDelete,
    Newline,
    Eof,
}

/// A single lexical token with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

impl Token {
    pub const fn new(kind: TokenKind, location: Location) -> Self {
        Self { kind, location }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        assert_eq!(Keyword::from_text("goto"), Some(Keyword::Goto));
        assert_eq!(Keyword::from_text("GOTOF"), Some(Keyword::Gotof));
        assert_eq!(Keyword::from_text("EndIf"), Some(Keyword::Endif));
    }

    #[test]
    fn unknown_keyword_returns_none() {
        assert_eq!(Keyword::from_text("G1"), None);
    }

    #[test]
    fn goto_opcode_classification() {
        assert!(Keyword::Goto.is_goto_opcode());
        assert!(Keyword::Gotoc.is_goto_opcode());
        assert!(!Keyword::If.is_goto_opcode());
    }

    #[test]
    fn operator_precedence_classes() {
        assert!(Operator::Plus.is_additive());
        assert!(Operator::Star.is_multiplicative());
        assert!(Operator::EqEq.is_relational());
        assert!(!Operator::Plus.is_multiplicative());
    }
}
