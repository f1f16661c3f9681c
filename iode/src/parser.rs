//! Recursive-descent parser (spec.md §4.2), one token of lookahead.
//!
//! Grounded on the shape of the teacher's hand-written recursive-descent
//! parsers (`compiler::parse`), generalized to spec.md's grammar. The
//! parser never recovers past an error — the first failure aborts the
//! whole parse, exactly as spec.md §4.2 requires.

use crate::common::{
    ast::{Expr, Literal, Param, Stmt},
    error::IodeError,
    token::{Token, TokenKind},
};

pub struct Parser {
    tokens: Vec<Token>,
    pos:    usize,
    /// The `@exportall` latch (spec.md §4.2): set by `@exportall`, cleared
    /// for the duration of a function body, restored on exit.
    exportall: bool,
}

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, IodeError> {
    let mut parser = Parser { tokens, pos: 0, exportall: false };
    parser.program()
}

impl Parser {
    fn peek(&self) -> &Token { &self.tokens[self.pos] }

    fn previous(&self) -> &Token { &self.tokens[self.pos - 1] }

    fn is_at_end(&self) -> bool { self.peek().kind == TokenKind::Eof }

    fn check(&self, kind: TokenKind) -> bool { !self.is_at_end() && self.peek().kind == kind }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous().clone()
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token, IodeError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(IodeError::parser(
                format!("expected {expected}, found {}", self.peek().kind),
                self.peek().location(),
            ))
        }
    }

    fn program(&mut self) -> Result<Vec<Stmt>, IodeError> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.directive_or_statement()? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    /// Parses one `directive | statement` (spec.md §4.2 grammar). Returns
    /// `None` for a bare `#`-escape-hatch line, which contributes no node.
    fn directive_or_statement(&mut self) -> Result<Option<Stmt>, IodeError> {
        if self.check(TokenKind::Pound) {
            return self.directive_import_or_comment();
        }
        if self.check(TokenKind::At) {
            return self.directive_export().map(Some);
        }
        self.statement().map(Some)
    }

    fn directive_import_or_comment(&mut self) -> Result<Option<Stmt>, IodeError> {
        let hash = self.advance(); // '#'
        if self.check(TokenKind::Identifier) && self.peek().lexeme == "import" {
            self.advance();
            let path = self.consume(TokenKind::StringLit, "an import path string")?;
            return Ok(Some(Stmt::Import { path }));
        }
        // A bare `#` not followed by `import`: consume to end of line.
        while !self.is_at_end() && self.peek().line == hash.line {
            self.advance();
        }
        Ok(None)
    }

    fn directive_export(&mut self) -> Result<Stmt, IodeError> {
        self.advance(); // '@'
        let tag = self.consume(TokenKind::Identifier, "'export' or 'exportall'")?;
        match tag.lexeme.as_str() {
            "exportall" => {
                self.exportall = true;
                self.directive_or_statement()?.ok_or_else(|| {
                    IodeError::parser("expected a declaration after '@exportall'", tag.location())
                })
            },
            "export" => {
                let was = self.exportall;
                self.exportall = true;
                let stmt = self.directive_or_statement()?.ok_or_else(|| {
                    IodeError::parser("expected a declaration after '@export'", tag.location())
                })?;
                self.exportall = was;
                Ok(stmt)
            },
            other => Err(IodeError::parser(
                format!("unknown directive '@{other}'"),
                tag.location(),
            )),
        }
    }

    fn statement(&mut self) -> Result<Stmt, IodeError> {
        if self.matches(TokenKind::Val) {
            return self.var_decl(false);
        }
        if self.matches(TokenKind::Var) {
            return self.var_decl(true);
        }
        if self.matches(TokenKind::Def) {
            return self.function();
        }
        if self.matches(TokenKind::Return) {
            return self.return_stmt();
        }
        self.expr_stmt()
    }

    fn var_decl(&mut self, mutable: bool) -> Result<Stmt, IodeError> {
        let name = self.consume(TokenKind::Identifier, "a variable name")?;

        let type_expr = if self.matches(TokenKind::Colon) {
            Some(self.consume(TokenKind::Identifier, "a type name")?)
        } else {
            None
        };

        let initializer = if self.matches(TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        Ok(Stmt::VarDecl { name, type_expr, initializer, mutable, exported: self.exportall })
    }

    fn function(&mut self) -> Result<Stmt, IodeError> {
        let exported = self.exportall;
        let name = self.consume(TokenKind::Identifier, "a function name")?;

        self.consume(TokenKind::LParen, "'('")?;
        let params = self.params()?;
        self.consume(TokenKind::RParen, "')'")?;

        let return_type = if self.matches(TokenKind::Arrow) || self.matches(TokenKind::Colon) {
            Some(self.consume(TokenKind::Identifier, "a return type name")?)
        } else {
            None
        };

        if self.matches(TokenKind::LBrace) {
            let saved_exportall = self.exportall;
            self.exportall = false; // disabled for the duration of a function body
            let mut body = Vec::new();
            while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                if let Some(stmt) = self.directive_or_statement()? {
                    body.push(stmt);
                }
            }
            self.consume(TokenKind::RBrace, "'}'")?;
            self.exportall = saved_exportall;
            Ok(Stmt::FunctionDef { name, params, return_type, body, exported })
        } else {
            Ok(Stmt::FunctionDecl { name, params, return_type, exported })
        }
    }

    fn params(&mut self) -> Result<Vec<Param>, IodeError> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let name = self.consume(TokenKind::Identifier, "a parameter name")?;
            let type_expr = if self.matches(TokenKind::Colon) {
                Some(self.consume(TokenKind::Identifier, "a type name")?)
            } else {
                None
            };
            params.push(Param { name, type_expr });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn return_stmt(&mut self) -> Result<Stmt, IodeError> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::RBrace) || self.is_at_end() {
            None
        } else {
            Some(self.expression()?)
        };
        Ok(Stmt::Return { keyword, value })
    }

    fn expr_stmt(&mut self) -> Result<Stmt, IodeError> {
        let expr = self.expression()?;
        Ok(Stmt::ExprStmt { expr })
    }

    fn expression(&mut self) -> Result<Expr, IodeError> { self.assignment() }

    fn assignment(&mut self) -> Result<Expr, IodeError> {
        let target = self.term()?;

        if self.check(TokenKind::Equal) {
            let equals = self.advance();
            let value = self.assignment()?;
            return match target {
                Expr::Variable { name } => {
                    Ok(Expr::Assign { name, equals, value: Box::new(value) })
                },
                _ => Err(IodeError::parser("invalid assignment target", equals.location())),
            };
        }

        Ok(target)
    }

    fn term(&mut self) -> Result<Expr, IodeError> {
        let mut left = self.factor()?;
        while self.check(TokenKind::Plus) || self.check(TokenKind::Minus) {
            let op = self.advance();
            let right = self.factor()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, IodeError> {
        let mut left = self.unary()?;
        while self.check(TokenKind::Star) || self.check(TokenKind::Slash) {
            let op = self.advance();
            let right = self.unary()?;
            left = Expr::Binary { left: Box::new(left), op, right: Box::new(right) };
        }
        Ok(left)
    }

    /// `unary := '-'? call` (spec.md §4.2). spec.md §3's expression list
    /// has no dedicated unary node, so a leading `-` desugars to
    /// subtraction from a synthetic zero literal: `Binary(0, '-', call)`.
    fn unary(&mut self) -> Result<Expr, IodeError> {
        if self.check(TokenKind::Minus) {
            let op = self.advance();
            let operand = self.call()?;
            let zero = Expr::Literal {
                token: op.clone(),
                value: Literal::Number("0".to_string()),
            };
            return Ok(Expr::Binary { left: Box::new(zero), op, right: Box::new(operand) });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, IodeError> {
        let mut expr = self.primary()?;
        while self.check(TokenKind::LParen) {
            let paren = self.advance();
            let mut arguments = Vec::new();
            if !self.check(TokenKind::RParen) {
                loop {
                    arguments.push(self.expression()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RParen, "')'")?;
            expr = Expr::Call { callee: Box::new(expr), paren, arguments };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, IodeError> {
        if self.check(TokenKind::NumberLit) {
            let token = self.advance();
            let value = Literal::Number(token.lexeme.clone());
            return Ok(Expr::Literal { token, value });
        }
        if self.check(TokenKind::StringLit) {
            let token = self.advance();
            let value = Literal::Str(token.lexeme.clone());
            return Ok(Expr::Literal { token, value });
        }
        if self.check(TokenKind::Identifier) {
            let name = self.advance();
            return Ok(Expr::Variable { name });
        }
        if self.matches(TokenKind::LParen) {
            let inner = self.expression()?;
            self.consume(TokenKind::RParen, "')'")?;
            return Ok(Expr::Grouping { inner: Box::new(inner) });
        }
        Err(IodeError::parser(
            format!("expected an expression, found {}", self.peek().kind),
            self.peek().location(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_src(source: &str) -> Vec<Stmt> { parse(lex(source).unwrap()).unwrap() }

    #[test]
    fn parses_hello_world() {
        let stmts = parse_src("writeOut(\"hi\")\nflush()");
        assert_eq!(stmts.len(), 2);
        matches!(stmts[0], Stmt::ExprStmt { expr: Expr::Call { .. } });
    }

    #[test]
    fn parses_function_with_body() {
        let stmts =
            parse_src("def greet(name: String): String { return name }");
        match &stmts[0] {
            Stmt::FunctionDef { name, params, return_type, body, .. } => {
                assert_eq!(name.lexeme, "greet");
                assert_eq!(params.len(), 1);
                assert!(return_type.is_some());
                assert_eq!(body.len(), 1);
            },
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn function_without_body_is_a_decl() {
        let stmts = parse_src("def f(x: Int): Int");
        matches!(stmts[0], Stmt::FunctionDecl { .. });
    }

    #[test]
    fn invalid_assignment_target_is_an_error() {
        let tokens = lex("1 = 2").unwrap();
        let err = parse(tokens).unwrap_err();
        match err {
            IodeError::Parser { message, .. } => assert!(message.contains("invalid assignment")),
            other => panic!("expected parser error, got {other:?}"),
        }
    }

    #[test]
    fn exportall_latches_until_function_boundary() {
        let stmts = parse_src("@exportall\nval x: Int = 1\ndef f() { val y: Int = 2 }\nval z: Int = 3");
        match &stmts[0] {
            Stmt::VarDecl { exported, .. } => assert!(exported),
            other => panic!("expected VarDecl, got {other:?}"),
        }
        match &stmts[1] {
            Stmt::FunctionDef { exported, body, .. } => {
                assert!(exported);
                match &body[0] {
                    Stmt::VarDecl { exported, .. } => assert!(!exported),
                    other => panic!("expected VarDecl, got {other:?}"),
                }
            },
            other => panic!("expected FunctionDef, got {other:?}"),
        }
        match &stmts[2] {
            Stmt::VarDecl { exported, .. } => assert!(exported),
            other => panic!("expected VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn bare_hash_directive_is_skipped() {
        let stmts = parse_src("# this is a comment-like escape hatch\nval x: Int = 1");
        assert_eq!(stmts.len(), 1);
    }
}
