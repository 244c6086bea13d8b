//! Recursive-descent parser.
//!
//! Grammar, with precedence and associativity made explicit:
//!
//! ```text
//! program     → declaration* EOF
//! declaration → classDecl | funDecl | varDecl | statement
//! classDecl   → "class" IDENTIFIER ("<" IDENTIFIER)? "{" (function | "class" function)* "}"
//! funDecl     → "fun" function
//! function    → IDENTIFIER "(" parameters? ")" block
//! varDecl     → "var" IDENTIFIER ("=" expression)? ";"
//! statement   → exprStmt | forStmt | ifStmt | printStmt | returnStmt | whileStmt | block
//! expression  → assignment
//! assignment  → (call ".")? IDENTIFIER "=" assignment | lambda | logic_or
//! lambda      → "fun" "(" parameters? ")" block
//! logic_or    → logic_and ("or" logic_and)*
//! logic_and   → equality ("and" equality)*
//! equality    → comparison (("!=" | "==") comparison)*
//! comparison  → term ((">" | ">=" | "<" | "<=") term)*
//! term        → factor (("-" | "+") factor)*
//! factor      → unary (("/" | "*") unary)*
//! unary       → ("!" | "-") unary | call
//! call        → primary ("(" arguments? ")" | "." IDENTIFIER)*
//! primary     → "true" | "false" | "nil" | "this" | NUMBER | STRING
//!             | IDENTIFIER | "(" expression ")" | "super" "." IDENTIFIER
//! ```
//!
//! `for` loops are desugared into `Block`/`While` during parsing; there is no
//! `For` node in the AST.  On a syntax error the parser panics to the nearest
//! statement boundary (`synchronize`) and keeps going, so one pass can report
//! several errors.

use std::rc::Rc;

use log::{debug, info};

use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
    next_expr_id: ExprId,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        info!("Initializing Parser with {} token(s)", tokens.len());
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            next_expr_id: 0,
        }
    }

    /// Parses the whole token stream.  The statement list is returned even
    /// when errors occurred; the caller gates later stages on the error list.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<LoxError>) {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),

                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        (statements, self.errors)
    }

    // Declarations

    fn declaration(&mut self) -> Result<Stmt> {
        debug!("Parsing declaration at token {}", self.current);

        if self.match_tokens(&[TokenType::CLASS]) {
            return self.class_declaration();
        }

        if self.match_tokens(&[TokenType::FUN]) {
            let decl: Rc<FunctionDecl> = self.function("function")?;
            return Ok(Stmt::Function(decl));
        }

        if self.match_tokens(&[TokenType::VAR]) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        let superclass: Option<Expr> = if self.match_tokens(&[TokenType::LESS]) {
            let super_name: Token =
                self.consume(TokenType::IDENTIFIER, "Expect superclass name.")?;

            Some(Expr::Variable {
                id: self.next_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();
        let mut static_methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if self.match_tokens(&[TokenType::CLASS]) {
                static_methods.push(self.function("static method")?);
            } else {
                methods.push(self.function("method")?);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            static_methods,
        })
    }

    /// Handles named functions, methods and anonymous lambdas.  A lambda has
    /// no name in the source, so one is fabricated for display purposes.
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        debug!("Parsing {} declaration", kind);

        let name: Token = if kind == "lambda" {
            Token::synthetic(TokenType::IDENTIFIER, "lambda", self.previous().line)
        } else {
            self.consume(TokenType::IDENTIFIER, format!("Expect {} name.", kind))?
        };

        self.consume(TokenType::LEFT_PAREN, format!("Expect '(' after {} name.", kind))?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= 255 {
                    // Reported but non-fatal: parsing continues.
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 parameters.");
                    self.errors.push(err);
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;

        self.consume(TokenType::LEFT_BRACE, format!("Expect '{{' before {} body.", kind))?;

        let body: Vec<Stmt> = self.block_statements()?;

        Ok(Rc::new(FunctionDecl { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // Statements

    fn statement(&mut self) -> Result<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block_statements()?));
        }

        self.expression_statement()
    }

    /// Desugars `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if self.check(&TokenType::RIGHT_PAREN) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let mut body: Stmt = self.statement()?;

        // The increment runs after the body on every iteration.
        if let Some(incr) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(incr)]);
        }

        let condition: Expr = condition.unwrap_or(Expr::Literal(LiteralValue::True));

        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        // The initializer runs once, in a scope enclosing the loop.
        if let Some(init) = initializer {
            body = Stmt::Block(vec![init, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch: Stmt = self.statement()?;

        // The innermost `if` claims a dangling `else` for itself.
        let else_branch: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch: Box::new(then_branch),
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if self.check(&TokenType::SEMICOLON) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition")?;

        let body: Stmt = self.statement()?;

        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    // The opening brace is consumed by the caller so it can report a more
    // precise error (function body vs. block).
    fn block_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // Expressions

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    /// Parses the LHS as a general expression, then rewrites it into an
    /// assignment target if `=` follows: a `Variable` becomes `Assign`, a
    /// `Get` becomes `Set`.  Anything else is reported at the `=` token and
    /// the LHS is returned so parsing can continue.
    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.function_expression()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            match expr {
                Expr::Variable { name, .. } => {
                    return Ok(Expr::Assign {
                        id: self.next_id(),
                        name,
                        value: Box::new(value),
                    });
                }

                Expr::Get { object, name } => {
                    return Ok(Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                    });
                }

                _ => {
                    let err = LoxError::parse(&equals, "Invalid assignment target.");
                    self.errors.push(err);
                }
            }
        }

        Ok(expr)
    }

    fn function_expression(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::FUN]) {
            return Ok(Expr::Function(self.function("lambda")?));
        }

        self.or()
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.term()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.factor()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name: Token =
                    self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let err = LoxError::parse(self.peek(), "Can't have more than 255 arguments.");
                    self.errors.push(err);
                }

                arguments.push(self.expression()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_tokens(&[TokenType::FALSE]) {
            return Ok(Expr::Literal(LiteralValue::False));
        }

        if self.match_tokens(&[TokenType::TRUE]) {
            return Ok(Expr::Literal(LiteralValue::True));
        }

        if self.match_tokens(&[TokenType::NIL]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        if self.match_tokens(&[TokenType::NUMBER(0.0), TokenType::STRING(String::new())]) {
            let literal: LiteralValue = match &self.previous().token_type {
                TokenType::NUMBER(n) => LiteralValue::Number(*n),

                TokenType::STRING(s) => LiteralValue::Str(s.clone()),

                _ => unreachable!("match_tokens only admits NUMBER and STRING here"),
            };

            return Ok(Expr::Literal(literal));
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword: Token = self.previous().clone();
            self.consume(TokenType::DOT, "Expect '.' after 'super'.")?;
            let method: Token =
                self.consume(TokenType::IDENTIFIER, "Expect superclass method name.")?;

            return Ok(Expr::Super {
                id: self.next_id(),
                keyword,
                method,
            });
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                id: self.next_id(),
                keyword: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: self.next_id(),
                name: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr: Expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(LoxError::parse(self.peek(), "Expect expression."))
    }

    // Panic-mode recovery: discard tokens until a statement boundary.

    fn synchronize(&mut self) {
        debug!("Synchronizing parser at token {}", self.current);

        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {
                    self.advance();
                }
            }
        }
    }

    // Token-stream helpers

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume<S: Into<String>>(&mut self, token_type: TokenType, message: S) -> Result<Token> {
        if self.check(&token_type) {
            return Ok(self.advance().clone());
        }

        Err(LoxError::parse(self.peek(), message))
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        &self.peek().token_type == token_type
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        // The scanner guarantees a trailing EOF, so `current` never runs past
        // the last slot.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn next_id(&mut self) -> ExprId {
        let id: ExprId = self.next_expr_id;
        self.next_expr_id += 1;
        id
    }
}
