//! Primary dialect recursive-descent parser (spec §4.D).
//!
//! Precedence ladder, loosest to tightest: `or` / `and` (by name) →
//! equality/relational (`=` `<>` `<` `<=` `>` `>=`, left-associative) →
//! range (`to` looser than `step`) → sum (`+` `-`) → term (`*` `/`) →
//! prefix (`-` `+` `not`) → member access (`.`) → atom.

use crate::{
    ast::{Definition, Expression, ExpressionKind, InfixOp, PrefixOp, Statement, StatementKind},
    diagnostics::{Error, ErrorKind, ParserErrorKind},
    lexer::Lexer,
    source_range::SourceRange,
    symbols,
    token::{Keyword, Operator, Token, TokenKind},
};

pub fn parse(source: &str) -> Result<Vec<Statement>, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let statements = parser.parse_block_statements(&[TokenKind::Eof])?;
    parser.expect(&TokenKind::Eof)?;
    Ok(statements)
}

/// Parses a single expression in isolation (used by the secondary-dialect
/// lowering pass to re-parse constant sub-expressions is unnecessary here;
/// exposed for tests and tools that want to parse a standalone expression).
pub fn parse_expression(source: &str) -> Result<Expression, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    parser.expect(&TokenKind::Eof)?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn skip_terminators(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Terminator) {
            self.advance();
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, Error> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek_kind().label();
            let range = self.peek().range;
            Err(Error::new(
                ErrorKind::Parser(ParserErrorKind::UnexpectedToken {
                    found,
                    expected: Some(kind.label()),
                }),
                range,
            ))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> Result<Token, Error> {
        if matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw) {
            Ok(self.advance())
        } else {
            let found = self.peek_kind().label();
            let range = self.peek().range;
            Err(Error::new(
                ErrorKind::Parser(ParserErrorKind::UnexpectedToken {
                    found,
                    expected: Some(kw.to_string()),
                }),
                range,
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, SourceRange), Error> {
        let range = self.peek().range;
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            self.advance();
            Ok((name, range))
        } else {
            let found = self.peek_kind().label();
            Err(Error::new(
                ErrorKind::Parser(ParserErrorKind::UnexpectedToken {
                    found,
                    expected: Some("identifier".to_owned()),
                }),
                range,
            ))
        }
    }

    fn at_block_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::CloseBrace | TokenKind::Eof)
    }

    /// Parses statements until a terminating token kind (checked by
    /// discriminant) is reached. Does not consume the terminator.
    fn parse_block_statements(&mut self, stop: &[TokenKind]) -> Result<Vec<Statement>, Error> {
        let mut statements = Vec::new();
        self.skip_terminators();
        while !stop
            .iter()
            .any(|s| std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(s))
        {
            if self.at_block_end() {
                break;
            }
            statements.push(self.parse_statement()?);
            self.skip_terminators();
        }
        Ok(statements)
    }

    fn parse_brace_block(&mut self) -> Result<Vec<Statement>, Error> {
        self.expect(&TokenKind::OpenBrace)?;
        let statements = self.parse_block_statements(&[TokenKind::CloseBrace])?;
        self.expect(&TokenKind::CloseBrace)?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, Error> {
        let start = self.peek().range;
        match self.peek_kind().clone() {
            TokenKind::Keyword(Keyword::Define) => self.parse_define(start),
            TokenKind::Keyword(Keyword::Option) => self.parse_option(start),
            TokenKind::Keyword(Keyword::For) => self.parse_for(start),
            TokenKind::Keyword(Keyword::If) => self.parse_if(start),
            TokenKind::Keyword(Keyword::Import) => self.parse_import(start),
            TokenKind::OpenBrace => {
                let body = self.parse_brace_block()?;
                let range = start.to(self.tokens[self.pos - 1].range);
                Ok(Statement::new(StatementKind::Block(body), range))
            }
            TokenKind::Identifier(name) => self.parse_command(name, start),
            _ => {
                // Fall back to a bare expression statement (e.g. a reference to a
                // previously `define`d value used for its side effects).
                let expr = self.parse_expr()?;
                let range = expr.range;
                Ok(Statement::new(StatementKind::Expression(expr), range))
            }
        }
    }

    fn parse_define(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let (name, _) = self.expect_identifier()?;
        let definition = if matches!(self.peek_kind(), TokenKind::OpenBrace) {
            Definition::Block(self.parse_brace_block()?)
        } else {
            Definition::Expression(self.parse_tuple_expr()?)
        };
        let end = self.tokens[self.pos - 1].range;
        Ok(Statement::new(StatementKind::Define(name, definition), start.to(end)))
    }

    fn parse_option(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let (name, _) = self.expect_identifier()?;
        let default = self.parse_tuple_expr()?;
        let end = default.range;
        Ok(Statement::new(StatementKind::Option(name, default), start.to(end)))
    }

    fn parse_for(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let mut index = None;
        // `for identifier in expr { ... }` vs. bare `for expr { ... }`.
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            let save = self.pos;
            self.advance();
            if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::In)) {
                self.advance();
                index = Some(name);
            } else {
                self.pos = save;
            }
        }
        let sequence = self.parse_tuple_expr()?;
        let body = self.parse_brace_block()?;
        let end = self.tokens[self.pos - 1].range;
        Ok(Statement::new(
            StatementKind::ForLoop {
                index,
                sequence,
                body,
            },
            start.to(end),
        ))
    }

    fn parse_if(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let condition = self.parse_expr()?;
        let body = self.parse_brace_block()?;
        let mut end = self.tokens[self.pos - 1].range;
        let else_branch = if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Else)) {
            self.advance();
            let branch = if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::If)) {
                let inner_start = self.peek().range;
                vec![self.parse_if(inner_start)?]
            } else {
                self.parse_brace_block()?
            };
            end = self.tokens[self.pos - 1].range;
            Some(branch)
        } else {
            None
        };
        Ok(Statement::new(
            StatementKind::IfElse {
                condition,
                body,
                else_branch,
            },
            start.to(end),
        ))
    }

    fn parse_import(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let expr = self.parse_tuple_expr()?;
        let end = expr.range;
        Ok(Statement::new(StatementKind::Import(expr), start.to(end)))
    }

    /// `identifier { ... }` with no arguments lowers to an expression
    /// statement carrying a block invocation; `identifier expr*` lowers to a
    /// command statement.
    fn parse_command(&mut self, name: String, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        if matches!(self.peek_kind(), TokenKind::OpenBrace) {
            let body = self.parse_brace_block()?;
            let end = self.tokens[self.pos - 1].range;
            let range = start.to(end);
            return Ok(Statement::new(
                StatementKind::Expression(Expression::new(ExpressionKind::Block(name, body), range)),
                range,
            ));
        }
        let mut args = Vec::new();
        while self.can_start_expr() {
            args.push(self.parse_expr()?);
        }
        let end = args.last().map_or(start, |e| e.range);
        Ok(Statement::new(StatementKind::Command(name, args), start.to(end)))
    }

    fn can_start_expr(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Number(_)
                | TokenKind::String(_)
                | TokenKind::HexColor(_)
                | TokenKind::Identifier(_)
                | TokenKind::OpenParen
                | TokenKind::Prefix(_)
                | TokenKind::Keyword(Keyword::Not | Keyword::True | Keyword::False)
        )
    }

    /// Parses a possibly-implicit tuple of space-juxtaposed expressions at
    /// statement level (spec §9): `define foo 1 0 0` defines a 3-tuple.
    fn parse_tuple_expr(&mut self) -> Result<Expression, Error> {
        let first = self.parse_expr()?;
        if !self.can_start_expr() {
            return Ok(first);
        }
        let start = first.range;
        let mut parts = vec![first];
        while self.can_start_expr() {
            parts.push(self.parse_expr()?);
        }
        let end = parts.last().unwrap().range;
        Ok(Expression::new(ExpressionKind::Tuple(parts), start.to(end)))
    }

    fn parse_expr(&mut self) -> Result<Expression, Error> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_and()?;
        while matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Or)) {
            self.advance();
            let right = self.parse_and()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), InfixOp::Or, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_relational()?;
        while matches!(self.peek_kind(), TokenKind::Keyword(Keyword::And)) {
            self.advance();
            let right = self.parse_relational()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), InfixOp::And, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_range()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Infix(Operator::Equal) => InfixOp::Equal,
                TokenKind::Infix(Operator::NotEqual) => InfixOp::NotEqual,
                TokenKind::Infix(Operator::Less) => InfixOp::Less,
                TokenKind::Infix(Operator::LessEqual) => InfixOp::LessEqual,
                TokenKind::Infix(Operator::Greater) => InfixOp::Greater,
                TokenKind::Infix(Operator::GreaterEqual) => InfixOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_range()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), op, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_range(&mut self) -> Result<Expression, Error> {
        let from = self.parse_sum()?;
        if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Step)) {
            self.advance();
            let step = self.parse_sum()?;
            let range = from.range.to(step.range);
            return Ok(Expression::new(ExpressionKind::StepOverride(Box::new(from), Box::new(step)), range));
        }
        if !matches!(self.peek_kind(), TokenKind::Keyword(Keyword::To)) {
            return Ok(from);
        }
        self.advance();
        let to = self.parse_sum()?;
        let step = if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Step)) {
            self.advance();
            Some(Box::new(self.parse_sum()?))
        } else {
            None
        };
        let end = step.as_ref().map_or(to.range, |s| s.range);
        let range = from.range.to(end);
        Ok(Expression::new(
            ExpressionKind::Range {
                from: Box::new(from),
                to: Box::new(to),
                step,
            },
            range,
        ))
    }

    fn parse_sum(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Infix(Operator::Plus) => InfixOp::Add,
                TokenKind::Infix(Operator::Minus) => InfixOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), op, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Infix(Operator::Star) => InfixOp::Multiply,
                TokenKind::Infix(Operator::Slash) => InfixOp::Divide,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), op, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expression, Error> {
        let start = self.peek().range;
        let op = match self.peek_kind() {
            TokenKind::Prefix(Operator::Minus) => Some(PrefixOp::Negate),
            TokenKind::Prefix(Operator::Plus) => Some(PrefixOp::Plus),
            TokenKind::Keyword(Keyword::Not) => Some(PrefixOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_factor()?;
            let range = start.to(operand.range);
            return Ok(Expression::new(ExpressionKind::Prefix(op, Box::new(operand)), range));
        }
        self.parse_member()
    }

    fn parse_member(&mut self) -> Result<Expression, Error> {
        let mut expr = self.parse_atom()?;
        while matches!(self.peek_kind(), TokenKind::Dot) {
            self.advance();
            let (name, name_range) = self.expect_identifier()?;
            let range = expr.range.to(name_range);
            expr = Expression::new(ExpressionKind::Member(Box::new(expr), name), range);
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<Expression, Error> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::Number(n), tok.range))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::String(s), tok.range))
            }
            TokenKind::HexColor(s) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::HexColor(s), tok.range))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::Identifier("true".to_owned()), tok.range))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::Identifier("false".to_owned()), tok.range))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if matches!(self.peek_kind(), TokenKind::OpenBrace) {
                    let body = self.parse_brace_block()?;
                    let end = self.tokens[self.pos - 1].range;
                    Ok(Expression::new(ExpressionKind::Block(name, body), tok.range.to(end)))
                } else if matches!(self.peek_kind(), TokenKind::OpenParen) && !self.peek().space_before {
                    let args = self.parse_call_args()?;
                    let end = self.tokens[self.pos - 1].range;
                    Ok(Expression::new(ExpressionKind::Call(name, args), tok.range.to(end)))
                } else if symbols::is_math_function(&name) && self.can_start_expr() && !matches!(self.peek_kind(), TokenKind::OpenParen) {
                    // Bare juxtaposition application (spec §8 scenario 1: `cos
                    // pi`, no parens): the single following factor is the
                    // argument, same precedence a prefix operator binds its
                    // operand at. A space before `(` still isn't a call (see
                    // `call_with_space_before_paren_is_not_a_call`), so a
                    // following open paren falls through to a bare identifier
                    // instead of being swallowed as this argument.
                    let arg = self.parse_factor()?;
                    let end = arg.range;
                    Ok(Expression::new(ExpressionKind::Call(name, vec![arg]), tok.range.to(end)))
                } else {
                    Ok(Expression::new(ExpressionKind::Identifier(name), tok.range))
                }
            }
            TokenKind::OpenParen => {
                self.advance();
                let mut parts = vec![self.parse_expr()?];
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                }
                while !matches!(self.peek_kind(), TokenKind::CloseParen) {
                    parts.push(self.parse_expr()?);
                    if matches!(self.peek_kind(), TokenKind::Comma) {
                        self.advance();
                    }
                }
                let close = self.expect(&TokenKind::CloseParen)?;
                let range = tok.range.to(close.range);
                if parts.len() == 1 {
                    let mut e = parts.pop().unwrap();
                    e.range = range;
                    Ok(e)
                } else {
                    Ok(Expression::new(ExpressionKind::Tuple(parts), range))
                }
            }
            _ => {
                let found = tok.kind.label();
                Err(Error::new(ErrorKind::Parser(ParserErrorKind::UnexpectedToken { found, expected: None }), tok.range))
            }
        }
    }

    /// Parses the comma-separated, possibly empty argument list of a call
    /// expression: `(`, already consumed up to here, through the closing `)`.
    fn parse_call_args(&mut self) -> Result<Vec<Expression>, Error> {
        self.advance(); // '('
        let mut args = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::CloseParen) {
            args.push(self.parse_expr()?);
            while matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&TokenKind::CloseParen)?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_with_implicit_tuple_args() {
        let stmts = parse("color 1 0 0").unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StatementKind::Command(name, args) => {
                assert_eq!(name, "color");
                assert_eq!(args.len(), 3);
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn block_invocation_as_expression_statement() {
        let stmts = parse("cube { size 1 }").unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StatementKind::Expression(e) => match &e.kind {
                ExpressionKind::Block(name, body) => {
                    assert_eq!(name, "cube");
                    assert_eq!(body.len(), 1);
                }
                other => panic!("expected block expr, got {other:?}"),
            },
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn paren_tuple_vs_single() {
        let e = parse_expression("(1 2 3)").unwrap();
        assert!(matches!(e.kind, ExpressionKind::Tuple(ref v) if v.len() == 3));
        let e = parse_expression("(1 + 2)").unwrap();
        assert!(matches!(e.kind, ExpressionKind::Infix(..)));
    }

    #[test]
    fn range_with_step_precedence() {
        let e = parse_expression("1 + 1 to 5 * 2 step 1 + 1").unwrap();
        match e.kind {
            ExpressionKind::Range { from, to, step } => {
                assert!(matches!(from.kind, ExpressionKind::Infix(..)));
                assert!(matches!(to.kind, ExpressionKind::Infix(..)));
                assert!(step.is_some());
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn bare_step_with_no_preceding_to_is_a_step_override() {
        let e = parse_expression("range step 2").unwrap();
        match e.kind {
            ExpressionKind::StepOverride(base, step) => {
                assert!(matches!(base.kind, ExpressionKind::Identifier(ref n) if n == "range"));
                assert!(matches!(step.kind, ExpressionKind::Number(n) if n == 2.0));
            }
            other => panic!("expected step override, got {other:?}"),
        }
    }

    #[test]
    fn member_binds_tighter_than_prefix() {
        let e = parse_expression("-foo.x").unwrap();
        match e.kind {
            ExpressionKind::Prefix(PrefixOp::Negate, inner) => {
                assert!(matches!(inner.kind, ExpressionKind::Member(..)));
            }
            other => panic!("expected prefix(member), got {other:?}"),
        }
    }

    #[test]
    fn if_else_if_chain() {
        let stmts = parse("if true { print 1 } else if false { print 2 } else { print 3 }").unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0].kind, StatementKind::IfElse { .. }));
    }

    #[test]
    fn for_loop_with_index() {
        let stmts = parse("for i in 1 to 3 { print i }").unwrap();
        match &stmts[0].kind {
            StatementKind::ForLoop { index, .. } => assert_eq!(index.as_deref(), Some("i")),
            other => panic!("expected forloop, got {other:?}"),
        }
    }

    #[test]
    fn identifier_directly_before_paren_is_a_call() {
        let expr = parse_expression("cos(pi)").unwrap();
        match expr.kind {
            ExpressionKind::Call(name, args) => {
                assert_eq!(name, "cos");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn call_with_space_before_paren_is_not_a_call() {
        let stmts = parse("print cos (1)").unwrap();
        match &stmts[0].kind {
            StatementKind::Command(name, args) => {
                assert_eq!(name, "print");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected command, got {other:?}"),
        }
    }
}
