//! Parser that builds a [`Program`] of [`Line`]s from the token stream
//! produced by `gcode-lexer`.
//!
//! The distilled specification treats tokenization as an external grammar
//! layer and describes only what the parser does with the resulting tokens
//! (§4.1). This crate is that consumer: it groups the flat token stream back
//! into per-source-line chunks (the lexer emits exactly one `Newline` per
//! input line) and recognizes, for each chunk, the line's single optional
//! statement plus its ordered `Word`/`Comment` items.

use std::rc::Rc;

use gcode_ast::{
    BinaryOp, Comment, Condition, ExprNode, GotoOpcode, GotoTarget, GotoTargetKind, Line,
    LineItem, LineNumber, Program, RelOp, Statement, UnaryOp, Word, split_word_text,
};
use gcode_diagnostic::Diagnostic;
use gcode_position::Location;
use gcode_token::{Keyword, Operator, Token, TokenKind};

/// Tokenizes and parses a full source program into a [`Program`] plus every
/// syntax diagnostic discovered along the way (lexer errors first, then
/// parser errors, both in ascending line order).
pub fn parse(source: &str) -> (Program, Vec<Diagnostic>) {
    let (tokens, mut diagnostics) = gcode_lexer::tokenize(source);
    let lines = split_into_lines(&tokens);

    let mut program = Program::default();
    for (line_index, line_tokens) in lines {
        let (line, line_diags) = parse_line(line_tokens, line_index);
        program.lines.push(line);
        diagnostics.extend(line_diags);
    }

    tracing::debug!(lines = program.lines.len(), diagnostics = diagnostics.len(), "parse complete");
    (program, diagnostics)
}

/// Splits the flat token stream into `(line_index, tokens)` chunks, one per
/// `Newline` token (the lexer emits exactly one per input line, including
/// blank lines), dropping the newline and trailing `Eof` markers themselves.
fn split_into_lines(tokens: &[Token]) -> Vec<(u32, &[Token])> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut line_no = 1u32;
    for (idx, tok) in tokens.iter().enumerate() {
        if matches!(tok.kind, TokenKind::Newline) {
            out.push((line_no, &tokens[start..idx]));
            start = idx + 1;
            line_no += 1;
        }
    }
    out
}

fn mismatched_input(location: Location) -> Diagnostic {
    Diagnostic::error("syntax error: unexpected token (check token order for this line)", location)
}

fn token_raw_text(token: &Token) -> String {
    match &token.kind {
        TokenKind::Word(s)
        | TokenKind::LineNumber(s)
        | TokenKind::Number(s)
        | TokenKind::SystemVar(s)
        | TokenKind::Comment(s)
        | TokenKind::Identifier(s) => s.clone(),
        TokenKind::Keyword(k) => k.as_str().to_string(),
        TokenKind::Operator(op) => op.as_str().to_string(),
        TokenKind::Equals => "=".to_string(),
        TokenKind::Colon => ":".to_string(),
        TokenKind::BlockDelete => "/".to_string(),
        TokenKind::Newline | TokenKind::Eof => String::new(),
    }
}

fn parse_line(tokens: &[Token], line_index: u32) -> (Line, Vec<Diagnostic>) {
    let mut diags = Vec::new();
    let mut pos = 0usize;

    let (block_delete, block_delete_location) = match tokens.first() {
        Some(tok) if matches!(tok.kind, TokenKind::BlockDelete) => {
            pos += 1;
            (true, Some(tok.location))
        }
        _ => (false, None),
    };

    let line_number = match tokens.get(pos) {
        Some(tok) => match &tok.kind {
            TokenKind::LineNumber(text) => {
                let digits = &text[1..];
                if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                    digits.parse::<u32>().ok().inspect(|_| pos += 1).map(|value| LineNumber {
                        value,
                        location: tok.location,
                    })
                } else {
                    None
                }
            }
            _ => None,
        },
        None => None,
    };

    let (items, statement) = parse_rest(tokens, &mut pos, &mut diags);

    let line = Line {
        line_index,
        block_delete,
        block_delete_location,
        line_number,
        items,
        statement,
    };
    (line, diags)
}

fn parse_rest(
    tokens: &[Token],
    pos: &mut usize,
    diags: &mut Vec<Diagnostic>,
) -> (Vec<LineItem>, Option<Statement>) {
    let mut items = Vec::new();
    if *pos >= tokens.len() {
        return (items, None);
    }

    let statement = match &tokens[*pos].kind {
        TokenKind::Keyword(Keyword::If) => Some(parse_if(tokens, pos, diags)),
        TokenKind::Keyword(Keyword::Else) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            Some(Statement::Else { location: loc })
        }
        TokenKind::Keyword(Keyword::Endif) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            Some(Statement::Endif { location: loc })
        }
        TokenKind::Keyword(Keyword::While) => Some(parse_while(tokens, pos, diags)),
        TokenKind::Keyword(Keyword::Endwhile) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            Some(Statement::Endwhile { location: loc })
        }
        TokenKind::Keyword(Keyword::For) => Some(parse_for(tokens, pos, diags)),
        TokenKind::Keyword(Keyword::Endfor) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            Some(Statement::Endfor { location: loc })
        }
        TokenKind::Keyword(Keyword::Repeat) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            Some(Statement::Repeat { location: loc })
        }
        TokenKind::Keyword(Keyword::Until) => Some(parse_until(tokens, pos, diags)),
        TokenKind::Keyword(Keyword::Loop) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            Some(Statement::Loop { location: loc })
        }
        TokenKind::Keyword(Keyword::Endloop) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            Some(Statement::Endloop { location: loc })
        }
        TokenKind::Keyword(k) if k.is_goto_opcode() => {
            Some(Statement::Goto(parse_goto_target(tokens, pos, diags)))
        }
        TokenKind::Word(_) | TokenKind::Identifier(_) => {
            match tokens.get(*pos + 1).map(|t| &t.kind) {
                Some(TokenKind::Colon) => Some(parse_label_def(tokens, pos)),
                Some(TokenKind::Equals) => Some(parse_assign(tokens, pos, diags)),
                _ => None,
            }
        }
        _ => None,
    };

    if let Some(statement) = statement {
        consume_trailing_comments(tokens, pos, diags, &mut items);
        return (items, Some(statement));
    }

    while *pos < tokens.len() {
        let tok = &tokens[*pos];
        match &tok.kind {
            TokenKind::Word(text) => {
                let (head, value, has_equal) = split_word_text(text);
                items.push(LineItem::Word(Word {
                    text: text.clone(),
                    head,
                    value,
                    has_equal,
                    location: tok.location,
                }));
            }
            TokenKind::Identifier(text) => {
                items.push(LineItem::Word(Word {
                    text: text.clone(),
                    head: text.to_ascii_uppercase(),
                    value: None,
                    has_equal: false,
                    location: tok.location,
                }));
            }
            TokenKind::LineNumber(text) => {
                let value = if text.len() > 1 { Some(text[1..].to_string()) } else { None };
                items.push(LineItem::Word(Word {
                    text: text.clone(),
                    head: "N".to_string(),
                    value,
                    has_equal: false,
                    location: tok.location,
                }));
            }
            TokenKind::Comment(text) => {
                items.push(LineItem::Comment(Comment { text: text.clone(), location: tok.location }));
            }
            _ => {
                diags.push(mismatched_input(tok.location));
            }
        }
        *pos += 1;
    }

    (items, None)
}

fn consume_trailing_comments(
    tokens: &[Token],
    pos: &mut usize,
    diags: &mut Vec<Diagnostic>,
    items: &mut Vec<LineItem>,
) {
    while let Some(tok) = tokens.get(*pos) {
        match &tok.kind {
            TokenKind::Comment(text) => {
                items.push(LineItem::Comment(Comment { text: text.clone(), location: tok.location }));
                *pos += 1;
            }
            _ => {
                diags.push(mismatched_input(tok.location));
                break;
            }
        }
    }
}

fn parse_label_def(tokens: &[Token], pos: &mut usize) -> Statement {
    let name_tok = &tokens[*pos];
    let name = token_raw_text(name_tok).to_ascii_uppercase();
    let location = name_tok.location;
    *pos += 2; // name + colon
    Statement::LabelDef { name, location }
}

fn parse_assign(tokens: &[Token], pos: &mut usize, diags: &mut Vec<Diagnostic>) -> Statement {
    let name_tok = &tokens[*pos];
    let lhs = token_raw_text(name_tok).to_ascii_uppercase();
    let location = name_tok.location;
    *pos += 2; // name + equals
    let rhs = match parse_expr(tokens, pos) {
        Ok(expr) => expr,
        Err(d) => {
            diags.push(d);
            ExprNode::Literal { value: 0.0, location }
        }
    };
    Statement::Assign { lhs, rhs, location }
}

/// Reads one goto keyword plus its target token, which may or may not be
/// present yet at `*pos` (callers that already consumed `IF <cond>` land
/// here with the goto keyword still at `*pos`).
fn parse_goto_target(tokens: &[Token], pos: &mut usize, diags: &mut Vec<Diagnostic>) -> GotoTarget {
    let kw_tok = &tokens[*pos];
    let location = kw_tok.location;
    let opcode = match &kw_tok.kind {
        TokenKind::Keyword(Keyword::Goto) => GotoOpcode::Goto,
        TokenKind::Keyword(Keyword::Gotof) => GotoOpcode::Gotof,
        TokenKind::Keyword(Keyword::Gotob) => GotoOpcode::Gotob,
        TokenKind::Keyword(Keyword::Gotoc) => GotoOpcode::Gotoc,
        _ => GotoOpcode::Goto,
    };
    *pos += 1;

    let Some(target_tok) = tokens.get(*pos) else {
        diags.push(Diagnostic::error("expected goto target after opcode", location));
        return GotoTarget { opcode, target: String::new(), target_kind: GotoTargetKind::Label, location };
    };
    let (target, target_kind) = match &target_tok.kind {
        TokenKind::Word(text) | TokenKind::Identifier(text) => {
            (text.to_ascii_uppercase(), GotoTargetKind::Label)
        }
        TokenKind::LineNumber(text) => (text.to_ascii_uppercase(), GotoTargetKind::LineNumber),
        TokenKind::Number(text) => (text.clone(), GotoTargetKind::Number),
        TokenKind::SystemVar(text) => (text.clone(), GotoTargetKind::SystemVariable),
        _ => {
            diags.push(mismatched_input(target_tok.location));
            (String::new(), GotoTargetKind::Label)
        }
    };
    *pos += 1;
    GotoTarget { opcode, target, target_kind, location }
}

fn parse_if(tokens: &[Token], pos: &mut usize, diags: &mut Vec<Diagnostic>) -> Statement {
    let if_loc = tokens[*pos].location;
    *pos += 1; // consume IF

    let condition = match parse_condition(tokens, pos) {
        Ok(cond) => cond,
        Err(d) => {
            diags.push(d);
            dummy_condition(if_loc)
        }
    };

    match tokens.get(*pos).map(|t| &t.kind) {
        Some(TokenKind::Keyword(k)) if k.is_goto_opcode() => {
            let then = parse_goto_target(tokens, pos, diags);
            let else_ = if matches!(tokens.get(*pos).map(|t| &t.kind), Some(TokenKind::Keyword(Keyword::Else)))
            {
                *pos += 1;
                if matches!(
                    tokens.get(*pos).map(|t| &t.kind),
                    Some(TokenKind::Keyword(k)) if k.is_goto_opcode()
                ) {
                    Some(parse_goto_target(tokens, pos, diags))
                } else {
                    diags.push(Diagnostic::error(
                        "expected GOTO-family opcode after ELSE in legacy IF form",
                        tokens.get(*pos).map(|t| t.location).unwrap_or(if_loc),
                    ));
                    None
                }
            } else {
                None
            };
            Statement::IfGoto { condition, then, else_ }
        }
        None => Statement::IfBlockStart { condition, location: if_loc },
        Some(_) => {
            diags.push(mismatched_input(tokens[*pos].location));
            Statement::IfBlockStart { condition, location: if_loc }
        }
    }
}

fn parse_while(tokens: &[Token], pos: &mut usize, diags: &mut Vec<Diagnostic>) -> Statement {
    let loc = tokens[*pos].location;
    *pos += 1;
    let condition = match parse_condition(tokens, pos) {
        Ok(c) => c,
        Err(d) => {
            diags.push(d);
            dummy_condition(loc)
        }
    };
    Statement::While { condition, location: loc }
}

fn parse_until(tokens: &[Token], pos: &mut usize, diags: &mut Vec<Diagnostic>) -> Statement {
    let loc = tokens[*pos].location;
    *pos += 1;
    let condition = match parse_condition(tokens, pos) {
        Ok(c) => c,
        Err(d) => {
            diags.push(d);
            dummy_condition(loc)
        }
    };
    Statement::Until { condition, location: loc }
}

/// `FOR <var> = <from> TO <to>`. `TO` is not a lexer keyword in this
/// dialect (see DESIGN.md); it is matched as a bare identifier whose
/// uppercased text is `"TO"`. Loops are parse-only in this core (Non-goal),
/// so this grammar only needs to consume the tokens faithfully, not feed a
/// lowering stage.
fn parse_for(tokens: &[Token], pos: &mut usize, diags: &mut Vec<Diagnostic>) -> Statement {
    let loc = tokens[*pos].location;
    *pos += 1;

    let var = match tokens.get(*pos).map(|t| &t.kind) {
        Some(TokenKind::Word(text) | TokenKind::Identifier(text)) => {
            let name = text.to_ascii_uppercase();
            *pos += 1;
            name
        }
        _ => {
            diags.push(Diagnostic::error("expected loop variable after FOR", loc));
            String::new()
        }
    };

    if matches!(tokens.get(*pos).map(|t| &t.kind), Some(TokenKind::Equals)) {
        *pos += 1;
    } else {
        diags.push(mismatched_input(tokens.get(*pos).map(|t| t.location).unwrap_or(loc)));
    }

    let from = parse_expr(tokens, pos).unwrap_or_else(|d| {
        diags.push(d);
        ExprNode::Literal { value: 0.0, location: loc }
    });

    let is_to = matches!(
        tokens.get(*pos).map(|t| &t.kind),
        Some(TokenKind::Word(text) | TokenKind::Identifier(text)) if text.eq_ignore_ascii_case("TO")
    );
    if is_to {
        *pos += 1;
    } else {
        diags.push(mismatched_input(tokens.get(*pos).map(|t| t.location).unwrap_or(loc)));
    }

    let to = parse_expr(tokens, pos).unwrap_or_else(|d| {
        diags.push(d);
        ExprNode::Literal { value: 0.0, location: loc }
    });

    Statement::For { var, from, to, location: loc }
}

fn dummy_condition(location: Location) -> Condition {
    Condition {
        lhs: ExprNode::Literal { value: 0.0, location },
        op: RelOp::Eq,
        rhs: ExprNode::Literal { value: 0.0, location },
        location,
        and_terms: Vec::new(),
    }
}

fn parse_condition(tokens: &[Token], pos: &mut usize) -> Result<Condition, Diagnostic> {
    let lhs = parse_expr(tokens, pos)?;
    let (op, op_loc) = match tokens.get(*pos).map(|t| &t.kind) {
        Some(TokenKind::Operator(o)) if o.is_relational() => {
            let loc = tokens[*pos].location;
            let op = rel_op_from(*o);
            *pos += 1;
            (op, loc)
        }
        _ => {
            return Err(Diagnostic::error(
                "expected relational operator in condition",
                lhs.location(),
            ));
        }
    };
    let rhs = parse_expr(tokens, pos)?;

    let mut and_terms = Vec::new();
    while matches!(tokens.get(*pos).map(|t| &t.kind), Some(TokenKind::Keyword(Keyword::And))) {
        *pos += 1;
        let start = *pos;
        while let Some(tok) = tokens.get(*pos) {
            match &tok.kind {
                TokenKind::Keyword(Keyword::And) | TokenKind::Keyword(Keyword::Else) => break,
                TokenKind::Keyword(k) if k.is_goto_opcode() => break,
                _ => *pos += 1,
            }
        }
        let raw = tokens[start..*pos].iter().map(token_raw_text).collect::<Vec<_>>().join(" ");
        and_terms.push(raw);
    }

    Ok(Condition { lhs, op, rhs, location: op_loc, and_terms })
}

fn rel_op_from(op: Operator) -> RelOp {
    match op {
        Operator::EqEq => RelOp::Eq,
        Operator::NotEq => RelOp::NotEq,
        Operator::Lt => RelOp::Lt,
        Operator::LtEq => RelOp::LtEq,
        Operator::Gt => RelOp::Gt,
        Operator::GtEq => RelOp::GtEq,
        _ => RelOp::Eq,
    }
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<ExprNode, Diagnostic> {
    let mut lhs = parse_mul(tokens, pos)?;
    loop {
        match tokens.get(*pos).map(|t| &t.kind) {
            Some(TokenKind::Operator(op)) if op.is_additive() => {
                let loc = tokens[*pos].location;
                let bop = if *op == Operator::Plus { BinaryOp::Add } else { BinaryOp::Sub };
                *pos += 1;
                let rhs = parse_mul(tokens, pos)?;
                lhs = ExprNode::Binary { op: bop, lhs: Rc::new(lhs), rhs: Rc::new(rhs), location: loc };
            }
            _ => break,
        }
    }
    Ok(lhs)
}

fn parse_mul(tokens: &[Token], pos: &mut usize) -> Result<ExprNode, Diagnostic> {
    let mut lhs = parse_unary(tokens, pos)?;
    loop {
        match tokens.get(*pos).map(|t| &t.kind) {
            Some(TokenKind::Operator(op)) if op.is_multiplicative() => {
                let loc = tokens[*pos].location;
                let bop = if *op == Operator::Star { BinaryOp::Mul } else { BinaryOp::Div };
                *pos += 1;
                let rhs = parse_unary(tokens, pos)?;
                lhs = ExprNode::Binary { op: bop, lhs: Rc::new(lhs), rhs: Rc::new(rhs), location: loc };
            }
            _ => break,
        }
    }
    Ok(lhs)
}

fn parse_unary(tokens: &[Token], pos: &mut usize) -> Result<ExprNode, Diagnostic> {
    match tokens.get(*pos).map(|t| &t.kind) {
        Some(TokenKind::Operator(Operator::Plus)) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            let operand = parse_unary(tokens, pos)?;
            Ok(ExprNode::Unary { op: UnaryOp::Plus, operand: Rc::new(operand), location: loc })
        }
        Some(TokenKind::Operator(Operator::Minus)) => {
            let loc = tokens[*pos].location;
            *pos += 1;
            let operand = parse_unary(tokens, pos)?;
            Ok(ExprNode::Unary { op: UnaryOp::Minus, operand: Rc::new(operand), location: loc })
        }
        _ => parse_primary(tokens, pos),
    }
}

fn parse_primary(tokens: &[Token], pos: &mut usize) -> Result<ExprNode, Diagnostic> {
    let Some(tok) = tokens.get(*pos) else {
        return Err(Diagnostic::error(
            "expected expression operand (check token order for this line)",
            Location::origin(),
        ));
    };
    let location = tok.location;
    let node = match &tok.kind {
        TokenKind::Number(text) => {
            let value = text.parse::<f64>().map_err(|_| {
                Diagnostic::error(format!("invalid numeric literal: {text}"), location)
            })?;
            ExprNode::Literal { value, location }
        }
        TokenKind::SystemVar(text) => {
            let name = text.trim_start_matches('$').to_ascii_uppercase();
            ExprNode::Variable { name, is_system: true, location }
        }
        TokenKind::Word(text) | TokenKind::Identifier(text) | TokenKind::LineNumber(text) => {
            ExprNode::Variable { name: text.to_ascii_uppercase(), is_system: false, location }
        }
        _ => {
            return Err(mismatched_input(location));
        }
    };
    *pos += 1;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_line(source: &str) -> Line {
        let (program, diags) = parse(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        program.lines.into_iter().next().expect("one line")
    }

    #[test]
    fn parses_motion_line_as_items() {
        let line = only_line("N10 G1 X10 Y20 F100\n");
        assert_eq!(line.line_number.map(|n| n.value), Some(10));
        assert!(line.statement.is_none());
        let heads: Vec<_> = line.words().map(|w| w.head.as_str()).collect();
        assert_eq!(heads, vec!["G", "X", "Y", "F"]);
    }

    #[test]
    fn parses_label_definition() {
        let line = only_line("L1:\n");
        assert!(matches!(line.statement, Some(Statement::LabelDef { ref name, .. }) if name == "L1"));
    }

    #[test]
    fn parses_assignment_with_expression() {
        let line = only_line("R1 = 2 + 3 * 4\n");
        match line.statement {
            Some(Statement::Assign { ref lhs, ref rhs, .. }) => {
                assert_eq!(lhs, "R1");
                assert!(matches!(rhs, ExprNode::Binary { op: BinaryOp::Add, .. }));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn parses_bare_goto() {
        let line = only_line("GOTO L2\n");
        match line.statement {
            Some(Statement::Goto(ref target)) => {
                assert_eq!(target.opcode, GotoOpcode::Goto);
                assert_eq!(target.target, "L2");
                assert_eq!(target.target_kind, GotoTargetKind::Label);
            }
            other => panic!("expected Goto, got {other:?}"),
        }
    }

    #[test]
    fn parses_legacy_if_goto_with_else() {
        let line = only_line("IF R1 == 1 GOTOF TARGET ELSE GOTOB BACK\n");
        match line.statement {
            Some(Statement::IfGoto { ref condition, ref then, ref else_ }) => {
                assert_eq!(condition.op, RelOp::Eq);
                assert_eq!(then.opcode, GotoOpcode::Gotof);
                assert_eq!(then.target, "TARGET");
                let else_ = else_.as_ref().expect("else branch");
                assert_eq!(else_.opcode, GotoOpcode::Gotob);
                assert_eq!(else_.target, "BACK");
            }
            other => panic!("expected IfGoto, got {other:?}"),
        }
    }

    #[test]
    fn parses_structured_if_block_start() {
        let line = only_line("IF R1 == 1\n");
        assert!(matches!(line.statement, Some(Statement::IfBlockStart { .. })));
    }

    #[test]
    fn condition_with_and_chain_keeps_raw_terms() {
        let (program, diags) = parse("IF R1 == 1 AND R2 == 2\n");
        assert!(diags.is_empty());
        match &program.lines[0].statement {
            Some(Statement::IfBlockStart { condition, .. }) => {
                assert_eq!(condition.and_terms, vec!["R2 == 2".to_string()]);
            }
            other => panic!("expected IfBlockStart, got {other:?}"),
        }
    }

    #[test]
    fn n_word_outside_block_start_becomes_item() {
        let line = only_line("G1 N100 X10\n");
        assert!(line.line_number.is_none());
        let n_word = line.words().find(|w| w.head == "N").expect("N item");
        assert_eq!(n_word.value.as_deref(), Some("100"));
    }

    #[test]
    fn block_delete_prefix_recognized() {
        let line = only_line("/N10 G1 X10\n");
        assert!(line.block_delete);
        assert_eq!(line.line_number.map(|n| n.value), Some(10));
    }

    #[test]
    fn trailing_comment_after_statement() {
        let line = only_line("ENDIF ; close the block\n");
        assert!(matches!(line.statement, Some(Statement::Endif { .. })));
        assert_eq!(line.items.len(), 1);
        assert!(matches!(line.items[0], LineItem::Comment(_)));
    }

    #[test]
    fn unsupported_character_reports_syntax_diagnostic() {
        let (_, diags) = parse("G1 X10 @\n");
        assert!(diags.iter().any(|d| d.message.contains("unsupported characters")));
    }
}
