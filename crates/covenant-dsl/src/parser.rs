//! Recursive descent parser for the constraint DSL.
//!
//! One token of lookahead, fail-fast (no recovery). Grammar:
//!
//! ```text
//! constraint  := activation (':' | THEN) assertion EOF
//! activation  := ALWAYS | WHEN expression | IDENTIFIER
//! assertion   := expression
//! expression  := disjunction
//! disjunction := conjunction (('||' | OR) conjunction)*
//! conjunction := equality (('&&' | AND) equality)*
//! equality    := comparison (('==' | '!=') comparison)?
//! comparison  := term (('<' | '<=' | '>=' | '>') term)?
//! term        := factor (('+' | '-') factor)*
//! factor      := unary (('*' | '/' | '%') unary)*
//! unary       := ('!' | '-' | NOT) unary | primary
//! primary     := IDENTIFIER ['(' args ')']
//!              | ('$' | '#') [IDENTIFIER ('.' IDENTIFIER)*]
//!              | NUMBER | STRING
//!              | '(' expression ')'
//! args        := expression (',' expression)* | ε
//! ```
//!
//! Equality and comparison are deliberately non-chainable: `1 < 3 < 5` is a
//! syntax error, unlike left-associative arithmetic. A bare identifier in
//! activation position is an implicit zero-argument statement call.

use crate::ast::{Ast, Expr, VarStats};
use crate::diag::SyntaxError;
use crate::token::{Token, TokenKind};

pub struct Parser<'src> {
    source: &'src str,
    tokens: &'src [Token],
    current: usize,
    stats: VarStats,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, tokens: &'src [Token]) -> Self {
        Self {
            source,
            tokens,
            current: 0,
            stats: VarStats::default(),
        }
    }

    /// Parse a full `activation : assertion` constraint.
    pub fn parse(source: &'src str, tokens: &'src [Token]) -> Result<Ast, SyntaxError> {
        let mut parser = Self::new(source, tokens);
        if parser.at_eof() {
            return Err(parser.error_at_current("Expected constraint"));
        }
        let root = parser.constraint()?;
        Ok(parser.into_ast(root))
    }

    /// Parse a bare `$`-prefixed model reference (text-processor entry).
    pub fn parse_model(source: &'src str, tokens: &'src [Token]) -> Result<Ast, SyntaxError> {
        Self::parse_variable_entry(source, tokens, TokenKind::Dollar, "Expected '$'")
    }

    /// Parse a bare `#`-prefixed state reference (text-processor entry).
    pub fn parse_state(source: &'src str, tokens: &'src [Token]) -> Result<Ast, SyntaxError> {
        Self::parse_variable_entry(source, tokens, TokenKind::Hash, "Expected '#'")
    }

    /// Parse a function call with arguments (text-processor entry).
    pub fn parse_function(source: &'src str, tokens: &'src [Token]) -> Result<Ast, SyntaxError> {
        let mut parser = Self::new(source, tokens);
        parser.consume(TokenKind::Identifier, "Expected function name")?;
        let root = parser.function_call()?;
        parser.expect_end()?;
        Ok(parser.into_ast(root))
    }

    /// Parse a bare function/statement reference (text-processor entry).
    pub fn parse_function_expr(source: &'src str, tokens: &'src [Token]) -> Result<Ast, SyntaxError> {
        let mut parser = Self::new(source, tokens);
        let name = parser
            .consume(TokenKind::Identifier, "Expected function name")?
            .clone();
        parser.expect_end()?;
        let root = Expr::Function { name, args: vec![] };
        Ok(parser.into_ast(root))
    }

    fn parse_variable_entry(
        source: &'src str,
        tokens: &'src [Token],
        prefix: TokenKind,
        message: &str,
    ) -> Result<Ast, SyntaxError> {
        let mut parser = Self::new(source, tokens);
        parser.consume(prefix, message)?;
        let root = parser.variable()?;
        parser.expect_end()?;
        Ok(parser.into_ast(root))
    }

    fn into_ast(self, root: Expr) -> Ast {
        Ast {
            root,
            source: self.source.to_string(),
            stats: self.stats,
        }
    }

    // === grammar productions ===

    fn constraint(&mut self) -> Result<Expr, SyntaxError> {
        let activation = self.activation()?;
        if !self.match_any(&[TokenKind::Colon, TokenKind::Then]) {
            return Err(self.error_at_current("Expected ':' after activation"));
        }
        let assertion = self.expression()?;
        self.expect_end()?;
        Ok(Expr::Constraint {
            activation: Box::new(activation),
            assertion: Box::new(assertion),
        })
    }

    fn activation(&mut self) -> Result<Expr, SyntaxError> {
        if self.match_any(&[TokenKind::Always]) {
            return Ok(Expr::Literal {
                value: self.previous().clone(),
            });
        }
        if self.match_any(&[TokenKind::When]) {
            return self.expression();
        }
        if self.match_any(&[TokenKind::Identifier]) {
            // Bare identifier: implicit statement call.
            return Ok(Expr::Function {
                name: self.previous().clone(),
                args: vec![],
            });
        }
        Err(self.error_at_current("Expected activation"))
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.disjunction()
    }

    fn disjunction(&mut self) -> Result<Expr, SyntaxError> {
        self.logical_left_assoc(Self::conjunction, &[TokenKind::PipePipe, TokenKind::Or])
    }

    fn conjunction(&mut self) -> Result<Expr, SyntaxError> {
        self.logical_left_assoc(Self::equality, &[TokenKind::AmpAmp, TokenKind::And])
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_at_most_once(
            Self::comparison,
            &[TokenKind::EqualEqual, TokenKind::BangEqual],
        )
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_at_most_once(
            Self::term,
            &[
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Greater,
            ],
        )
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_left_assoc(Self::factor, &[TokenKind::Plus, TokenKind::Minus])
    }

    fn factor(&mut self) -> Result<Expr, SyntaxError> {
        self.binary_left_assoc(
            Self::unary,
            &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
        )
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.match_any(&[TokenKind::Bang, TokenKind::Minus, TokenKind::Not]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        if self.match_any(&[TokenKind::Identifier]) {
            return self.function_call();
        }
        if self.match_any(&[TokenKind::Dollar, TokenKind::Hash]) {
            return self.variable();
        }
        if self.match_any(&[TokenKind::Number, TokenKind::Str]) {
            return Ok(Expr::Literal {
                value: self.previous().clone(),
            });
        }
        if self.match_any(&[TokenKind::ParenOpen]) {
            let inner = self.expression()?;
            self.consume(TokenKind::ParenClose, "Expected ')' after expression")?;
            return Ok(Expr::Grouping {
                inner: Box::new(inner),
            });
        }
        Err(self.error_at_current("Expected expression"))
    }

    /// Variable access; the prefix token has already been consumed.
    fn variable(&mut self) -> Result<Expr, SyntaxError> {
        let prefix = self.previous().clone();
        let mut path = Vec::new();
        if self.match_any(&[TokenKind::Identifier]) {
            path.push(self.previous().clone());
            while self.match_any(&[TokenKind::Dot]) {
                let identifier = self.consume(TokenKind::Identifier, "Expected identifier")?;
                path.push(identifier.clone());
            }
        }
        if !path.is_empty() {
            let dotted: Vec<&str> = path.iter().map(|t| t.lexeme.as_str()).collect();
            self.stats
                .record(Expr::var_prefix(&prefix), &dotted.join("."));
        }
        Ok(Expr::Variable { prefix, path })
    }

    /// Function call or bare function reference; the name token has
    /// already been consumed.
    fn function_call(&mut self) -> Result<Expr, SyntaxError> {
        let name = self.previous().clone();
        let mut args = Vec::new();
        if self.match_any(&[TokenKind::ParenOpen]) {
            args = self.args()?;
            self.consume(TokenKind::ParenClose, "Expected ')' after arguments")?;
        }
        Ok(Expr::Function { name, args })
    }

    fn args(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        if self.check(TokenKind::ParenClose) {
            return Ok(args);
        }
        args.push(self.expression()?);
        while self.match_any(&[TokenKind::Comma]) {
            args.push(self.expression()?);
        }
        Ok(args)
    }

    // === parse combinator helpers ===

    fn logical_left_assoc(
        &mut self,
        production: fn(&mut Self) -> Result<Expr, SyntaxError>,
        operators: &[TokenKind],
    ) -> Result<Expr, SyntaxError> {
        let mut expr = production(self)?;
        while self.match_any(operators) {
            let operator = self.previous().clone();
            let right = production(self)?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn binary_left_assoc(
        &mut self,
        production: fn(&mut Self) -> Result<Expr, SyntaxError>,
        operators: &[TokenKind],
    ) -> Result<Expr, SyntaxError> {
        let mut expr = production(self)?;
        while self.match_any(operators) {
            let operator = self.previous().clone();
            let right = production(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    /// Non-chainable binary operator: at most one occurrence.
    fn binary_at_most_once(
        &mut self,
        production: fn(&mut Self) -> Result<Expr, SyntaxError>,
        operators: &[TokenKind],
    ) -> Result<Expr, SyntaxError> {
        let mut expr = production(self)?;
        if self.match_any(operators) {
            let operator = self.previous().clone();
            let right = production(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    // === token stream helpers ===

    fn expect_end(&mut self) -> Result<(), SyntaxError> {
        if !self.at_eof() {
            let token = self.peek();
            return Err(SyntaxError::new(
                format!("Unexpected token '{}'", token.lexeme),
                token.position,
            ));
        }
        self.advance();
        Ok(())
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, SyntaxError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(self.error_at_current(message))
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.at_eof() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.at_eof() {
            self.current += 1;
        }
        self.previous()
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        // The token stream always ends with an EOF sentinel.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error_at_current(&self, message: &str) -> SyntaxError {
        let token = self.peek();
        let rendered = if token.kind == TokenKind::Eof {
            message.to_string()
        } else {
            format!("{message}, found '{}'", token.lexeme)
        };
        SyntaxError::new(rendered, token.position)
    }
}
