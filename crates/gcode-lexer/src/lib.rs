//! Line-oriented tokenizer for the gcode dialect.
//!
//! The distilled specification describes tokenization as the job of an
//! external grammar layer; since no such generated artifact ships with this
//! pipeline, this crate supplies a concrete hand-written lexer that produces
//! the same token vocabulary the parser expects (`WORD`, `LINE_NUMBER`,
//! `NUMBER`, `SYSTEM_VAR`, `COMMENT`, keywords, operators, `=`, `:`).
//!
//! # Word gluing
//!
//! A `WORD` token is a maximal run of `[A-Za-z]` followed optionally by an
//! `=` and/or digits/sign/dot, with **no intervening whitespace** — this is
//! what lets `CR=40` lex as a single glued word while `R1 = 40` (spaces
//! around `=`) lexes as three tokens (`WORD("R1")`, `Equals`, `NUMBER("40")`),
//! which is what makes assignment statements parseable as
//! `lhs '=' expression` rather than as a single opaque word.

use gcode_diagnostic::Diagnostic;
use gcode_position::Location;
use gcode_token::{Keyword, Operator, Token, TokenKind};

/// Tokenizes a full source program into a flat token stream with `Newline`
/// tokens separating input lines and a trailing `Eof`. Never panics; lexical
/// errors are reported as diagnostics and lexing continues past them.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();

    for (line_idx, line_text) in source.lines().enumerate() {
        let line_no = (line_idx + 1) as u32;
        let mut lexer = LineLexer::new(line_text, line_no);
        lexer.run(&mut tokens, &mut diagnostics);
        tokens.push(Token::new(TokenKind::Newline, Location::at_line(line_no)));
    }

    let eof_line = source.lines().count() as u32 + 1;
    tokens.push(Token::new(TokenKind::Eof, Location::at_line(eof_line.max(1))));
    (tokens, diagnostics)
}

struct LineLexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    at_line_start: bool,
}

impl LineLexer {
    fn new(text: &str, line: u32) -> Self {
        Self { chars: text.chars().collect(), pos: 0, line, at_line_start: true }
    }

    fn loc(&self, col: usize) -> Location {
        Location::new(self.line, col as u32)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn run(&mut self, tokens: &mut Vec<Token>, diagnostics: &mut Vec<Diagnostic>) {
        loop {
            self.skip_spaces();
            let Some(ch) = self.peek() else { break };
            let col = self.pos + 1;

            if ch == '/' && self.at_line_start {
                self.advance();
                tokens.push(Token::new(TokenKind::BlockDelete, self.loc(col)));
                self.at_line_start = false;
                continue;
            }
            self.at_line_start = false;

            if ch == ';' {
                let text: String = self.chars[self.pos..].iter().collect();
                self.pos = self.chars.len();
                tokens.push(Token::new(TokenKind::Comment(text), self.loc(col)));
                continue;
            }

            if ch == '(' {
                if let Some(text) = self.lex_paren_comment() {
                    tokens.push(Token::new(TokenKind::Comment(text), self.loc(col)));
                    continue;
                }
                self.advance();
                diagnostics.push(unsupported_char_diagnostic(self.loc(col)));
                continue;
            }

            if ch == '$' {
                tokens.push(self.lex_system_var(col));
                continue;
            }

            if ch == ':' {
                self.advance();
                tokens.push(Token::new(TokenKind::Colon, self.loc(col)));
                continue;
            }

            if ch == '=' && self.peek_at(1) == Some('=') {
                self.advance();
                self.advance();
                tokens.push(Token::new(TokenKind::Operator(Operator::EqEq), self.loc(col)));
                continue;
            }

            if ch == '=' {
                self.advance();
                tokens.push(Token::new(TokenKind::Equals, self.loc(col)));
                continue;
            }

            if let Some(op) = self.lex_operator() {
                tokens.push(Token::new(TokenKind::Operator(op), self.loc(col)));
                continue;
            }

            if ch.is_ascii_digit() || ((ch == '+' || ch == '-') && self.next_is_digit_or_dot(1)) {
                tokens.push(self.lex_number(col));
                continue;
            }

            if ch.is_ascii_alphabetic() {
                tokens.push(self.lex_word_or_keyword(col));
                continue;
            }

            self.advance();
            diagnostics.push(unsupported_char_diagnostic(self.loc(col)));
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.advance();
        }
    }

    fn next_is_digit_or_dot(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Some(c) if c.is_ascii_digit() || c == '.')
    }

    fn lex_paren_comment(&mut self) -> Option<String> {
        let start = self.pos;
        self.advance(); // consume '('
        while let Some(c) = self.peek() {
            self.advance();
            if c == ')' {
                return Some(self.chars[start..self.pos].iter().collect());
            }
        }
        // Unterminated: treat rest of line as the comment text.
        Some(self.chars[start..self.pos].iter().collect())
    }

    fn lex_system_var(&mut self, col: usize) -> Token {
        let start = self.pos;
        self.advance(); // consume '$'
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::new(TokenKind::SystemVar(text), self.loc(col))
    }

    fn lex_operator(&mut self) -> Option<Operator> {
        match self.peek()? {
            '+' => {
                self.advance();
                Some(Operator::Plus)
            }
            '-' => {
                self.advance();
                Some(Operator::Minus)
            }
            '*' => {
                self.advance();
                Some(Operator::Star)
            }
            '/' => {
                self.advance();
                Some(Operator::Slash)
            }
            '!' if self.peek_at(1) == Some('=') => {
                self.advance();
                self.advance();
                Some(Operator::NotEq)
            }
            '<' if self.peek_at(1) == Some('=') => {
                self.advance();
                self.advance();
                Some(Operator::LtEq)
            }
            '>' if self.peek_at(1) == Some('=') => {
                self.advance();
                self.advance();
                Some(Operator::GtEq)
            }
            '<' => {
                self.advance();
                Some(Operator::Lt)
            }
            '>' => {
                self.advance();
                Some(Operator::Gt)
            }
            _ => None,
        }
    }

    fn lex_number(&mut self, col: usize) -> Token {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::new(TokenKind::Number(text), self.loc(col))
    }

    /// Lexes a `WORD`, `LINE_NUMBER`, or keyword starting at an alphabetic
    /// character. See the module docs for the gluing rule.
    fn lex_word_or_keyword(&mut self, col: usize) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.advance();
        }
        let letters: String = self.chars[start..self.pos].iter().collect();

        // A pure letter run followed by nothing gluable is either a keyword
        // or a bare identifier (label name, condition operand).
        let glued_start = self.pos;
        if matches!(self.peek(), Some('=')) || self.peek().is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == '.') {
            self.consume_glued_suffix();
        }

        if self.pos == glued_start {
            if let Some(keyword) = Keyword::from_text(&letters) {
                return Token::new(TokenKind::Keyword(keyword), self.loc(col));
            }
            // N followed by nothing is just a bare identifier, not a line number.
            return Token::new(TokenKind::Identifier(letters), self.loc(col));
        }

        let full: String = self.chars[start..self.pos].iter().collect();
        if (letters.eq_ignore_ascii_case("n")) && full[1..].chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Token::new(TokenKind::LineNumber(full), self.loc(col));
        }
        Token::new(TokenKind::Word(full), self.loc(col))
    }

    /// Consumes the glued `=value` or bare numeric/sign/dot suffix immediately
    /// following a letter run, with no intervening whitespace.
    fn consume_glued_suffix(&mut self) {
        if self.peek() == Some('=') {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            self.advance();
        }
    }
}

fn unsupported_char_diagnostic(location: Location) -> Diagnostic {
    Diagnostic::error(
        "syntax error: unexpected character (check for unsupported characters or malformed comments)",
        location,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, _) = tokenize(source);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_motion_line() {
        let ks = kinds("N10 G1 X10 Y20 F100\n");
        assert_eq!(
            ks,
            vec![
                TokenKind::LineNumber("N10".into()),
                TokenKind::Word("G1".into()),
                TokenKind::Word("X10".into()),
                TokenKind::Word("Y20".into()),
                TokenKind::Word("F100".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn glues_equals_without_whitespace() {
        let ks = kinds("CR=40\n");
        assert_eq!(ks[0], TokenKind::Word("CR=40".into()));
    }

    #[test]
    fn splits_assignment_with_spaces_around_equals() {
        let ks = kinds("R1 = 2 + 3\n");
        assert_eq!(
            ks,
            vec![
                TokenKind::Word("R1".into()),
                TokenKind::Equals,
                TokenKind::Number("2".into()),
                TokenKind::Operator(Operator::Plus),
                TokenKind::Number("3".into()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_label_definition() {
        let ks = kinds("L1:\n");
        assert_eq!(ks, vec![
            TokenKind::Word("L1".into()),
            TokenKind::Colon,
            TokenKind::Newline,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn lexes_keywords() {
        let ks = kinds("IF R1 == 1 GOTOF TARGET\n");
        assert_eq!(ks[0], TokenKind::Keyword(Keyword::If));
        assert_eq!(ks[1], TokenKind::Word("R1".into()));
        assert_eq!(ks[2], TokenKind::Operator(Operator::EqEq));
        assert_eq!(ks[3], TokenKind::Number("1".into()));
        assert_eq!(ks[4], TokenKind::Keyword(Keyword::Gotof));
        assert_eq!(ks[5], TokenKind::Identifier("TARGET".into()));
    }

    #[test]
    fn block_delete_only_recognized_at_line_start() {
        let ks = kinds("/N10 G1 X10\n");
        assert_eq!(ks[0], TokenKind::BlockDelete);
        assert_eq!(ks[1], TokenKind::LineNumber("N10".into()));
    }

    #[test]
    fn semicolon_comment_runs_to_end_of_line() {
        let ks = kinds("G1 X10 ; move right\n");
        assert!(matches!(ks[2], TokenKind::Comment(ref s) if s == "; move right"));
    }

    #[test]
    fn parenthesized_comment() {
        let ks = kinds("G1 (move) X10\n");
        assert!(matches!(ks[1], TokenKind::Comment(ref s) if s == "(move)"));
    }

    #[test]
    fn system_variable_token() {
        let ks = kinds("$AA_IM == 1\n");
        assert_eq!(ks[0], TokenKind::SystemVar("$AA_IM".into()));
    }

    #[test]
    fn unknown_character_reports_diagnostic_and_continues() {
        let (tokens, diags) = tokenize("G1 X10 @\n");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unsupported characters"));
        assert!(tokens.iter().any(|t| matches!(t.kind, TokenKind::Newline)));
    }
}
