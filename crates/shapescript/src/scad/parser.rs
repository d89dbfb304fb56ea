//! Secondary dialect recursive-descent parser (spec §4.E).
//!
//! Precedence ladder, loosest to tightest: ternary `?:` → `||` → `&&` →
//! `==`/`!=` → `<`/`<=`/`>`/`>=` → `+`/`-` → `*`/`/`/`%` → `^` → prefix
//! (`-`/`!`) → postfix member/index → call/atom.

use crate::{
    diagnostics::{Error, ErrorKind, ParserErrorKind},
    scad::{
        ast::{Argument, Definition, Expression, ExpressionKind, InfixOp, Param, PrefixOp, Statement, StatementKind},
        lexer::Lexer,
        token::{Keyword, Operator, Token, TokenKind},
    },
    source_range::SourceRange,
};

pub fn parse(source: &str) -> Result<Vec<Statement>, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while !matches!(parser.peek_kind(), TokenKind::Eof) {
        statements.push(parser.parse_statement()?);
    }
    Ok(statements)
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

    fn peek_at(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, Error> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            let found = self.peek_kind().label();
            let range = self.peek().range;
            Err(Error::new(
                ErrorKind::Parser(ParserErrorKind::UnexpectedToken { found, expected: Some(kind.label()) }),
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
                ErrorKind::Parser(ParserErrorKind::UnexpectedToken { found, expected: Some("identifier".to_owned()) }),
                range,
            ))
        }
    }

    fn last_range(&self) -> SourceRange {
        self.tokens[self.pos.saturating_sub(1)].range
    }

    // ---- statements --------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement, Error> {
        let start = self.peek().range;
        match self.peek_kind().clone() {
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::new(StatementKind::Empty, start))
            }
            TokenKind::OpenBrace => {
                self.advance();
                let mut stmts = Vec::new();
                while !matches!(self.peek_kind(), TokenKind::CloseBrace | TokenKind::Eof) {
                    stmts.push(self.parse_statement()?);
                }
                self.expect(&TokenKind::CloseBrace)?;
                let range = start.to(self.last_range());
                Ok(Statement::new(StatementKind::Block(stmts), range))
            }
            TokenKind::Keyword(Keyword::Function) => self.parse_function(start),
            TokenKind::Keyword(Keyword::Module) => self.parse_module(start),
            TokenKind::Keyword(Keyword::For) => self.parse_for(start),
            TokenKind::Keyword(Keyword::If) => self.parse_if(start),
            TokenKind::Keyword(Keyword::Let) => self.parse_let_statement(start),
            TokenKind::Identifier(name) => self.parse_identifier_statement(name, start),
            _ => {
                let found = self.peek_kind().label();
                Err(Error::new(ErrorKind::Parser(ParserErrorKind::UnexpectedToken { found, expected: None }), start))
            }
        }
    }

    fn parse_function(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let (name, _) = self.expect_identifier()?;
        let params = self.parse_params()?;
        self.expect(&TokenKind::Infix(Operator::Assign))?;
        let body = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon)?;
        let range = start.to(self.last_range());
        Ok(Statement::new(StatementKind::Define(name, Definition::Function { params, body }), range))
    }

    fn parse_module(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let (name, _) = self.expect_identifier()?;
        let params = self.parse_params()?;
        let body = Box::new(self.parse_statement()?);
        let range = start.to(self.last_range());
        Ok(Statement::new(StatementKind::Define(name, Definition::Module { params, body }), range))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, Error> {
        self.expect(&TokenKind::OpenParen)?;
        let mut params = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::CloseParen) {
            let (name, _) = self.param_name()?;
            let default = if matches!(self.peek_kind(), TokenKind::Infix(Operator::Assign)) {
                self.advance();
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Param { name, default });
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::CloseParen)?;
        Ok(params)
    }

    fn param_name(&mut self) -> Result<(String, SourceRange), Error> {
        let range = self.peek().range;
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok((name, range))
            }
            TokenKind::DollarIdentifier(name) => {
                self.advance();
                Ok((name, range))
            }
            _ => {
                let found = self.peek_kind().label();
                Err(Error::new(
                    ErrorKind::Parser(ParserErrorKind::UnexpectedToken { found, expected: Some("parameter name".to_owned()) }),
                    range,
                ))
            }
        }
    }

    fn parse_for(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        self.expect(&TokenKind::OpenParen)?;
        let (var, _) = self.expect_identifier()?;
        self.expect(&TokenKind::Infix(Operator::Assign))?;
        let sequence = self.parse_expr()?;
        self.expect(&TokenKind::CloseParen)?;
        let body = Box::new(self.parse_statement()?);
        let range = start.to(self.last_range());
        Ok(Statement::new(StatementKind::ForLoop { var, sequence, body }, range))
    }

    fn parse_if(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        self.expect(&TokenKind::OpenParen)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::CloseParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let mut range = start.to(self.last_range());
        let else_branch = if matches!(self.peek_kind(), TokenKind::Keyword(Keyword::Else)) {
            self.advance();
            let branch = Box::new(self.parse_statement()?);
            range = start.to(self.last_range());
            Some(branch)
        } else {
            None
        };
        Ok(Statement::new(StatementKind::IfElse { condition, then_branch, else_branch }, range))
    }

    fn parse_let_statement(&mut self, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        let bindings = self.parse_let_bindings()?;
        let body = Box::new(self.parse_statement()?);
        let range = start.to(self.last_range());
        Ok(Statement::new(StatementKind::Let { bindings, body }, range))
    }

    fn parse_let_bindings(&mut self) -> Result<Vec<(String, crate::scad::ast::Expression)>, Error> {
        self.expect(&TokenKind::OpenParen)?;
        let mut bindings = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::CloseParen) {
            let (name, _) = self.expect_identifier()?;
            self.expect(&TokenKind::Infix(Operator::Assign))?;
            let value = self.parse_expr()?;
            bindings.push((name, value));
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::CloseParen)?;
        Ok(bindings)
    }

    /// `name = expr;` (assignment) or `name(args) [next-stmt | ;]` (a command,
    /// optionally chaining a trailing child statement).
    fn parse_identifier_statement(&mut self, name: String, start: SourceRange) -> Result<Statement, Error> {
        self.advance();
        if matches!(self.peek_kind(), TokenKind::Infix(Operator::Assign)) {
            self.advance();
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon)?;
            let range = start.to(self.last_range());
            return Ok(Statement::new(StatementKind::Define(name, Definition::Expression(expr)), range));
        }
        let args = self.parse_call_args()?;
        let next = if matches!(self.peek_kind(), TokenKind::Semicolon) {
            self.advance();
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        let range = start.to(self.last_range());
        Ok(Statement::new(StatementKind::Command { name, args, next }, range))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Argument>, Error> {
        self.expect(&TokenKind::OpenParen)?;
        let mut args = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::CloseParen) {
            let name = self.try_named_arg()?;
            let value = self.parse_expr()?;
            args.push(Argument { name, value });
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::CloseParen)?;
        Ok(args)
    }

    /// Peeks for `identifier =` (not `==`) to detect a named argument.
    fn try_named_arg(&mut self) -> Result<Option<String>, Error> {
        let is_named = matches!(self.peek_kind(), TokenKind::Identifier(_) | TokenKind::DollarIdentifier(_))
            && matches!(self.peek_at(1), TokenKind::Infix(Operator::Assign));
        if !is_named {
            return Ok(None);
        }
        let name = match self.advance().kind {
            TokenKind::Identifier(n) | TokenKind::DollarIdentifier(n) => n,
            _ => unreachable!(),
        };
        self.advance(); // '='
        Ok(Some(name))
    }

    // ---- expressions ---------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expression, Error> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expression, Error> {
        let condition = self.parse_or()?;
        if matches!(self.peek_kind(), TokenKind::Question) {
            self.advance();
            let then_branch = self.parse_ternary()?;
            self.expect(&TokenKind::Colon)?;
            let else_branch = self.parse_ternary()?;
            let range = condition.range.to(else_branch.range);
            return Ok(Expression::new(
                ExpressionKind::Conditional {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
                range,
            ));
        }
        Ok(condition)
    }

    fn parse_or(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_and()?;
        while matches!(self.peek_kind(), TokenKind::Infix(Operator::Or)) {
            self.advance();
            let right = self.parse_and()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), InfixOp::Or, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_equality()?;
        while matches!(self.peek_kind(), TokenKind::Infix(Operator::And)) {
            self.advance();
            let right = self.parse_equality()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), InfixOp::And, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Infix(Operator::Equal) => InfixOp::Equal,
                TokenKind::Infix(Operator::NotEqual) => InfixOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), op, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_sum()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Infix(Operator::Less) => InfixOp::Less,
                TokenKind::Infix(Operator::LessEqual) => InfixOp::LessEqual,
                TokenKind::Infix(Operator::Greater) => InfixOp::Greater,
                TokenKind::Infix(Operator::GreaterEqual) => InfixOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_sum()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), op, Box::new(right)), range);
        }
        Ok(left)
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
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Infix(Operator::Star) => InfixOp::Multiply,
                TokenKind::Infix(Operator::Slash) => InfixOp::Divide,
                TokenKind::Infix(Operator::Percent) => InfixOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            let range = left.range.to(right.range);
            left = Expression::new(ExpressionKind::Infix(Box::new(left), op, Box::new(right)), range);
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expression, Error> {
        let left = self.parse_prefix()?;
        if matches!(self.peek_kind(), TokenKind::Infix(Operator::Caret)) {
            self.advance();
            // Right-associative.
            let right = self.parse_power()?;
            let range = left.range.to(right.range);
            return Ok(Expression::new(ExpressionKind::Infix(Box::new(left), InfixOp::Power, Box::new(right)), range));
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression, Error> {
        let start = self.peek().range;
        let op = match self.peek_kind() {
            TokenKind::Infix(Operator::Minus) => Some(PrefixOp::Negate),
            TokenKind::Prefix(Operator::Not) => Some(PrefixOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_prefix()?;
            let range = start.to(operand.range);
            return Ok(Expression::new(ExpressionKind::Prefix(op, Box::new(operand)), range));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, Error> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_range) = self.expect_identifier()?;
                    let range = expr.range.to(name_range);
                    expr = Expression::new(ExpressionKind::Member(Box::new(expr), name), range);
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    let close = self.expect(&TokenKind::CloseBracket)?;
                    let range = expr.range.to(close.range);
                    expr = Expression::new(ExpressionKind::Index(Box::new(expr), Box::new(index)), range);
                }
                _ => break,
            }
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
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::Boolean(true), tok.range))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::Boolean(false), tok.range))
            }
            TokenKind::Keyword(Keyword::Undef) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::Undefined, tok.range))
            }
            TokenKind::Keyword(Keyword::Let) => {
                self.advance();
                let bindings = self.parse_let_bindings()?;
                let body = Box::new(self.parse_expr()?);
                let range = tok.range.to(body.range);
                Ok(Expression::new(ExpressionKind::Let { bindings, body }, range))
            }
            TokenKind::DollarIdentifier(name) => {
                self.advance();
                Ok(Expression::new(ExpressionKind::DollarIdentifier(name), tok.range))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if matches!(self.peek_kind(), TokenKind::OpenParen) {
                    let args = self.parse_call_args()?;
                    let range = tok.range.to(self.last_range());
                    Ok(Expression::new(ExpressionKind::Call { name, args }, range))
                } else {
                    Ok(Expression::new(ExpressionKind::Identifier(name), tok.range))
                }
            }
            TokenKind::OpenParen => {
                self.advance();
                let e = self.parse_expr()?;
                let close = self.expect(&TokenKind::CloseParen)?;
                let range = tok.range.to(close.range);
                Ok(Expression::new(e.kind, range))
            }
            TokenKind::OpenBracket => self.parse_bracket(tok.range),
            _ => {
                let found = tok.kind.label();
                Err(Error::new(ErrorKind::Parser(ParserErrorKind::UnexpectedToken { found, expected: None }), tok.range))
            }
        }
    }

    /// `[a, b, c]` is a vector literal; `[lo:hi]`/`[lo:step:hi]` is a range.
    fn parse_bracket(&mut self, start: SourceRange) -> Result<Expression, Error> {
        self.advance();
        if matches!(self.peek_kind(), TokenKind::CloseBracket) {
            let close = self.advance();
            return Ok(Expression::new(ExpressionKind::Vector(Vec::new()), start.to(close.range)));
        }
        let first = self.parse_expr()?;
        if matches!(self.peek_kind(), TokenKind::Colon) {
            self.advance();
            let second = self.parse_expr()?;
            let (step, to) = if matches!(self.peek_kind(), TokenKind::Colon) {
                self.advance();
                let third = self.parse_expr()?;
                (Some(Box::new(second)), third)
            } else {
                (None, second)
            };
            let close = self.expect(&TokenKind::CloseBracket)?;
            let range = start.to(close.range);
            return Ok(Expression::new(ExpressionKind::Range { from: Box::new(first), step, to: Box::new(to) }, range));
        }
        let mut items = vec![first];
        while matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            if matches!(self.peek_kind(), TokenKind::CloseBracket) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        let close = self.expect(&TokenKind::CloseBracket)?;
        let range = start.to(close.range);
        Ok(Expression::new(ExpressionKind::Vector(items), range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_call_with_chained_statement() {
        let stmts = parse("translate([1,2,3]) cube(10);").unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0].kind {
            StatementKind::Command { name, next, .. } => {
                assert_eq!(name, "translate");
                assert!(next.is_some());
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn named_arguments() {
        let stmts = parse("sphere(r=5, $fn=16);").unwrap();
        match &stmts[0].kind {
            StatementKind::Command { args, .. } => {
                assert_eq!(args[0].name.as_deref(), Some("r"));
                assert_eq!(args[1].name.as_deref(), Some("$fn"));
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn range_with_and_without_step() {
        let stmts = parse("x = [1:10];").unwrap();
        match &stmts[0].kind {
            StatementKind::Define(_, Definition::Expression(expr)) => {
                assert!(matches!(expr.kind, ExpressionKind::Range { step: None, .. }));
            }
            other => panic!("expected define, got {other:?}"),
        }
        let stmts = parse("x = [1:2:10];").unwrap();
        match &stmts[0].kind {
            StatementKind::Define(_, Definition::Expression(expr)) => {
                assert!(matches!(expr.kind, ExpressionKind::Range { step: Some(_), .. }));
            }
            other => panic!("expected define, got {other:?}"),
        }
    }

    #[test]
    fn function_and_module_definitions() {
        let stmts = parse("function square2(x) = x * x;\nmodule box(s) { cube(s); }").unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0].kind, StatementKind::Define(_, Definition::Function { .. })));
        assert!(matches!(stmts[1].kind, StatementKind::Define(_, Definition::Module { .. })));
    }

    #[test]
    fn for_and_if_statements() {
        let stmts = parse("for (i = [0:2]) cube(i);\nif (true) sphere(1); else cube(1);").unwrap();
        assert!(matches!(stmts[0].kind, StatementKind::ForLoop { .. }));
        assert!(matches!(stmts[1].kind, StatementKind::IfElse { else_branch: Some(_), .. }));
    }
}
