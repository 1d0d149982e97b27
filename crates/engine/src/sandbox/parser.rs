//! Recursive-descent parser for the strategy language

use std::sync::Arc;

use super::ast::{BinaryOp, Expr, FunctionDef, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
use super::lexer::{Lexer, Token, TokenKind};
use super::SandboxError;

/// Maximum syntactic nesting (blocks + expressions)
const MAX_NESTING: usize = 128;

/// Parse strategy source into a program
pub fn parse_program(source: &str) -> Result<Program, SandboxError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), SandboxError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {:?}", what, self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, SandboxError> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected {}, found {:?}", what, other))),
        }
    }

    fn error(&self, message: String) -> SandboxError {
        SandboxError::Syntax {
            line: self.line(),
            message,
        }
    }

    fn enter(&mut self) -> Result<(), SandboxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {}", MAX_NESTING)));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ------------------------------------------------------------------
    // Declarations and statements
    // ------------------------------------------------------------------

    fn program(mut self) -> Result<Program, SandboxError> {
        let mut program = Program::default();
        while !self.check(&TokenKind::Eof) {
            if !self.check(&TokenKind::Fn) {
                return Err(self.error(
                    "only function definitions are allowed at top level".into(),
                ));
            }
            let function = self.function()?;
            if program.functions.contains_key(&function.name) {
                return Err(SandboxError::Syntax {
                    line: function.line,
                    message: format!("function '{}' is defined twice", function.name),
                });
            }
            program
                .functions
                .insert(function.name.clone(), Arc::new(function));
        }
        Ok(program)
    }

    fn function(&mut self) -> Result<FunctionDef, SandboxError> {
        let line = self.line();
        self.expect(TokenKind::Fn, "'fn'")?;
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "'('")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let param = self.expect_ident("parameter name")?;
                if params.contains(&param) {
                    return Err(self.error(format!("duplicate parameter '{}'", param)));
                }
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.block()?;

        Ok(FunctionDef {
            name,
            params,
            body,
            line,
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, SandboxError> {
        self.enter()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error("unclosed block".into()));
            }
            stmts.push(self.statement()?);
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        self.leave();
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt, SandboxError> {
        let line = self.line();
        let kind = match self.peek() {
            TokenKind::Let => {
                self.advance();
                let name = self.expect_ident("variable name")?;
                self.expect(TokenKind::Assign, "'='")?;
                let value = self.expression()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Let { name, value }
            }
            TokenKind::If => self.if_statement()?,
            TokenKind::While => {
                self.advance();
                let cond = self.expression()?;
                let body = self.block()?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => {
                self.advance();
                let var = self.expect_ident("loop variable")?;
                self.expect(TokenKind::In, "'in'")?;
                let iterable = self.expression()?;
                let body = self.block()?;
                StmtKind::For {
                    var,
                    iterable,
                    body,
                }
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Return(value)
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Continue
            }
            TokenKind::Fn => return Err(self.error("nested functions are not supported".into())),
            TokenKind::Ident(name) if self.is_assignment() => {
                let name = name.clone();
                self.advance();
                let op = match self.advance() {
                    TokenKind::PlusAssign => Some(BinaryOp::Add),
                    TokenKind::MinusAssign => Some(BinaryOp::Sub),
                    TokenKind::StarAssign => Some(BinaryOp::Mul),
                    TokenKind::SlashAssign => Some(BinaryOp::Div),
                    _ => None,
                };
                let value = self.expression()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Assign { name, op, value }
            }
            _ => {
                let expr = self.expression()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                StmtKind::Expr(expr)
            }
        };
        Ok(Stmt { kind, line })
    }

    fn is_assignment(&self) -> bool {
        matches!(
            self.peek_at(1),
            TokenKind::Assign
                | TokenKind::PlusAssign
                | TokenKind::MinusAssign
                | TokenKind::StarAssign
                | TokenKind::SlashAssign
        )
    }

    fn if_statement(&mut self) -> Result<StmtKind, SandboxError> {
        self.expect(TokenKind::If, "'if'")?;
        let mut branches = vec![(self.expression()?, self.block()?)];
        let mut otherwise = None;

        while self.eat(&TokenKind::Else) {
            if self.eat(&TokenKind::If) {
                branches.push((self.expression()?, self.block()?));
            } else {
                otherwise = Some(self.block()?);
                break;
            }
        }

        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    // ------------------------------------------------------------------
    // Expressions, lowest precedence first
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, SandboxError> {
        self.enter()?;
        let expr = self.or_expr();
        self.leave();
        expr
    }

    fn or_expr(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek(), TokenKind::Or | TokenKind::OrOr) {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr::Logical {
                op: LogicalOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.equality()?;
        while matches!(self.peek(), TokenKind::And | TokenKind::AndAnd) {
            self.advance();
            let rhs = self.equality()?;
            lhs = Expr::Logical {
                op: LogicalOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.comparison()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn comparison(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::LtEq,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::GtEq,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SandboxError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, SandboxError> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not | TokenKind::Bang => UnaryOp::Not,
            _ => return self.power(),
        };
        self.advance();
        self.enter()?;
        let expr = self.unary();
        self.leave();
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr?),
        })
    }

    /// `**` is right-associative and binds tighter than a unary minus on its left
    fn power(&mut self) -> Result<Expr, SandboxError> {
        let base = self.postfix()?;
        if self.eat(&TokenKind::StarStar) {
            self.enter()?;
            let exponent = self.unary();
            self.leave();
            return Ok(binary(BinaryOp::Pow, base, exponent?));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, SandboxError> {
        let mut expr = self.primary()?;
        while self.eat(&TokenKind::LBracket) {
            let start = if self.check(&TokenKind::Colon) {
                None
            } else {
                Some(self.expression()?)
            };

            if self.eat(&TokenKind::Colon) {
                let end = if self.check(&TokenKind::RBracket) {
                    None
                } else {
                    Some(Box::new(self.expression()?))
                };
                self.expect(TokenKind::RBracket, "']'")?;
                expr = Expr::Slice {
                    target: Box::new(expr),
                    start: start.map(Box::new),
                    end,
                };
            } else {
                self.expect(TokenKind::RBracket, "']'")?;
                let index = start.ok_or_else(|| self.error("empty index".into()))?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, SandboxError> {
        let line = self.line();
        match self.advance() {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(Arc::from(s.as_str()))),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Nil => Ok(Expr::Nil),
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::LParen) {
                    let args = self.arguments(TokenKind::RParen, "')'")?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Var(name))
                }
            }
            TokenKind::LParen => {
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let items = self.arguments(TokenKind::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            other => Err(SandboxError::Syntax {
                line,
                message: format!("unexpected token {:?}", other),
            }),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is accepted
    fn arguments(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, SandboxError> {
        let mut items = Vec::new();
        while !self.check(&close) {
            items.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(close, what)?;
        Ok(items)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(source: &str) -> Vec<Stmt> {
        let program = parse_program(source).unwrap();
        program.functions["f"].body.clone()
    }

    fn expr_of(source: &str) -> Expr {
        let body = body_of(&format!("fn f() {{ return {}; }}", source));
        match &body[0].kind {
            StmtKind::Return(Some(expr)) => expr.clone(),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let expr = expr_of("1 + 2 * 3");
        assert_eq!(
            expr,
            binary(
                BinaryOp::Add,
                Expr::Number(1.0),
                binary(BinaryOp::Mul, Expr::Number(2.0), Expr::Number(3.0))
            )
        );
    }

    #[test]
    fn test_power_right_assoc_and_unary() {
        // -2 ** 2 parses as -(2 ** 2)
        let expr = expr_of("-2 ** 2");
        assert!(matches!(expr, Expr::Unary { op: UnaryOp::Neg, .. }));

        let expr = expr_of("2 ** 3 ** 2");
        match expr {
            Expr::Binary { op, rhs, .. } => {
                assert_eq!(op, BinaryOp::Pow);
                assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Pow, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slices() {
        assert!(matches!(
            expr_of("prices[-5:]"),
            Expr::Slice { start: Some(_), end: None, .. }
        ));
        assert!(matches!(
            expr_of("prices[:-1]"),
            Expr::Slice { start: None, end: Some(_), .. }
        ));
        assert!(matches!(expr_of("prices[-1]"), Expr::Index { .. }));
    }

    #[test]
    fn test_if_else_chain() {
        let body = body_of("fn f(x) { if x > 1 { return 1; } else if x < -1 { return -1; } else { return 0; } }");
        match &body[0].kind {
            StmtKind::If {
                branches,
                otherwise,
            } => {
                assert_eq!(branches.len(), 2);
                assert!(otherwise.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment() {
        let body = body_of("fn f() { let s = 0; s += 2; }");
        assert!(matches!(
            &body[1].kind,
            StmtKind::Assign { op: Some(BinaryOp::Add), .. }
        ));
    }

    #[test]
    fn test_top_level_statement_rejected() {
        let err = parse_program("let x = 1;").unwrap_err();
        assert!(matches!(err, SandboxError::Syntax { .. }));
    }

    #[test]
    fn test_duplicate_function_rejected() {
        assert!(parse_program("fn f() { } fn f() { }").is_err());
    }

    #[test]
    fn test_missing_semicolon_reports_line() {
        let err = parse_program("fn f() {\n  let x = 1\n  return x;\n}").unwrap_err();
        match err {
            SandboxError::Syntax { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let source = format!("fn f() {{ return {}1{}; }}", "(".repeat(300), ")".repeat(300));
        assert!(parse_program(&source).is_err());
    }
}
