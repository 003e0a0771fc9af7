//! Recursive descent parser
//!
//! Consumes the token stream produced by the lexer and builds the AST. The
//! lexer never fails; it embeds invalid input as error tokens, and it is the
//! parser's job to turn those into `VibeError::Parser` values. The first
//! syntax error aborts the parse.

use crate::error::{VibeError, VibeResult};
use crate::lexer::{Keyword, Literal as TokenLiteral, Token, TokenType};
use crate::parser::ast::{
    Ast, BinaryOp, Expr, FunctionBody, FunctionDecl, Item, Literal, LogicalOp, Param, Stmt,
    TypeAliasDecl, TypeExpr, UnaryOp,
};

/// Parser state
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// Creates a new parser from a token stream
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parses a complete program
    pub fn parse(&mut self) -> VibeResult<Ast> {
        // The lexer is total: malformed input arrives here as error tokens.
        for token in &self.tokens {
            if let TokenType::Error(message) = &token.token_type {
                return Err(VibeError::parser(message.clone(), token.location.clone()));
            }
        }

        let mut items = Vec::new();
        while !self.is_at_end() {
            items.push(self.parse_item()?);
        }
        Ok(Ast { items })
    }

    fn parse_item(&mut self) -> VibeResult<Item> {
        if self.match_keyword(Keyword::Fn) {
            self.parse_function().map(Item::Function)
        } else if self.match_keyword(Keyword::Type) {
            self.parse_type_alias().map(Item::TypeAlias)
        } else {
            Err(self.error_at_current("expected 'fn' or 'type' declaration"))
        }
    }

    /// Parses a function declaration, after the `fn` keyword
    fn parse_function(&mut self) -> VibeResult<FunctionDecl> {
        let location = self.previous().location.clone();
        let name = self.consume_identifier("expected function name after 'fn'")?;

        self.consume(&TokenType::LeftParen, "expected '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                let param_location = self.peek().location.clone();
                let param_name = self.consume_identifier("expected parameter name")?;
                self.consume(&TokenType::Colon, "expected ':' after parameter name")?;
                let ty = self.parse_type()?;
                params.push(Param {
                    name: param_name,
                    ty,
                    location: param_location,
                });
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenType::RightParen, "expected ')' after parameters")?;

        let return_type = if self.match_token(&TokenType::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(&TokenType::LeftBrace, "expected '{' before function body")?;

        // A prompt body stands alone: `fn f(..) -> T { prompt "..."; }`
        let body = if self.check_keyword(Keyword::Prompt) {
            let prompt_location = self.advance().location.clone();
            let template = self.consume_string_literal("expected prompt template string")?;
            self.consume(&TokenType::Semicolon, "expected ';' after prompt template")?;
            self.consume(
                &TokenType::RightBrace,
                "a prompt must be the only statement in a function body",
            )?;
            FunctionBody::Prompt {
                template,
                location: prompt_location,
            }
        } else {
            FunctionBody::Block(self.parse_block()?)
        };

        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
            location,
        })
    }

    /// Parses a type alias, after the `type` keyword
    fn parse_type_alias(&mut self) -> VibeResult<TypeAliasDecl> {
        let location = self.previous().location.clone();
        let name = self.consume_identifier("expected type alias name after 'type'")?;
        self.consume(&TokenType::Assign, "expected '=' in type alias")?;
        let target = self.parse_type()?;
        self.consume(&TokenType::Semicolon, "expected ';' after type alias")?;
        Ok(TypeAliasDecl {
            name,
            target,
            location,
        })
    }

    /// Parses a type expression: a type name or `Meaning<T>("hint")`
    fn parse_type(&mut self) -> VibeResult<TypeExpr> {
        let location = self.peek().location.clone();
        let name = self.consume_identifier("expected type name")?;

        if name == "Meaning" {
            self.consume(&TokenType::Less, "expected '<' after 'Meaning'")?;
            let inner = self.parse_type()?;
            self.consume(&TokenType::Greater, "expected '>' after Meaning type argument")?;
            self.consume(&TokenType::LeftParen, "expected '(' after 'Meaning<..>'")?;
            let hint = self.consume_string_literal("expected meaning hint string")?;
            self.consume(&TokenType::RightParen, "expected ')' after meaning hint")?;
            return Ok(TypeExpr::meaning(inner, hint, location));
        }

        Ok(TypeExpr::named(name, location))
    }

    /// Parses statements until the closing brace of the current block
    fn parse_block(&mut self) -> VibeResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.consume(&TokenType::RightBrace, "expected '}' after block")?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> VibeResult<Stmt> {
        if self.match_keyword(Keyword::Let) {
            self.parse_let()
        } else if self.match_keyword(Keyword::Return) {
            self.parse_return()
        } else if self.match_keyword(Keyword::If) {
            self.parse_if()
        } else if self.match_keyword(Keyword::While) {
            self.parse_while()
        } else if self.match_keyword(Keyword::For) {
            self.parse_for()
        } else if self.match_keyword(Keyword::Break) {
            let location = self.previous().location.clone();
            self.consume(&TokenType::Semicolon, "expected ';' after 'break'")?;
            Ok(Stmt::Break { location })
        } else if self.match_keyword(Keyword::Continue) {
            let location = self.previous().location.clone();
            self.consume(&TokenType::Semicolon, "expected ';' after 'continue'")?;
            Ok(Stmt::Continue { location })
        } else if self.check_keyword(Keyword::Prompt) {
            Err(self.error_at_current(
                "a prompt must be the only statement in a function body",
            ))
        } else if self.check(&TokenType::LeftBrace) {
            let location = self.advance().location.clone();
            let statements = self.parse_block()?;
            Ok(Stmt::Block {
                statements,
                location,
            })
        } else {
            let location = self.peek().location.clone();
            let expr = self.parse_expression()?;
            self.consume(&TokenType::Semicolon, "expected ';' after expression")?;
            Ok(Stmt::Expression { expr, location })
        }
    }

    fn parse_let(&mut self) -> VibeResult<Stmt> {
        let location = self.previous().location.clone();
        let name = self.consume_identifier("expected variable name after 'let'")?;

        let annotation = if self.match_token(&TokenType::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.consume(&TokenType::Assign, "expected '=' after variable name")?;
        let value = self.parse_expression()?;
        self.consume(&TokenType::Semicolon, "expected ';' after let statement")?;

        Ok(Stmt::Let {
            name,
            annotation,
            inferred: None,
            value,
            location,
        })
    }

    fn parse_return(&mut self) -> VibeResult<Stmt> {
        let location = self.previous().location.clone();
        let value = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&TokenType::Semicolon, "expected ';' after return value")?;
        Ok(Stmt::Return { value, location })
    }

    fn parse_if(&mut self) -> VibeResult<Stmt> {
        let location = self.previous().location.clone();
        let condition = self.parse_expression()?;
        self.consume(&TokenType::LeftBrace, "expected '{' after if condition")?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.match_keyword(Keyword::Else) {
            if self.match_keyword(Keyword::If) {
                // else-if chains nest as a single-statement else branch
                Some(vec![self.parse_if()?])
            } else {
                self.consume(&TokenType::LeftBrace, "expected '{' after 'else'")?;
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            location,
        })
    }

    fn parse_while(&mut self) -> VibeResult<Stmt> {
        let location = self.previous().location.clone();
        let condition = self.parse_expression()?;
        self.consume(&TokenType::LeftBrace, "expected '{' after while condition")?;
        let body = self.parse_block()?;
        Ok(Stmt::While {
            condition,
            body,
            location,
        })
    }

    fn parse_for(&mut self) -> VibeResult<Stmt> {
        let location = self.previous().location.clone();
        self.consume(&TokenType::LeftParen, "expected '(' after 'for'")?;

        let initializer = if self.match_token(&TokenType::Semicolon) {
            None
        } else if self.match_keyword(Keyword::Let) {
            Some(Box::new(self.parse_let()?))
        } else {
            let init_location = self.peek().location.clone();
            let expr = self.parse_expression()?;
            self.consume(&TokenType::Semicolon, "expected ';' after for initializer")?;
            Some(Box::new(Stmt::Expression {
                expr,
                location: init_location,
            }))
        };

        let condition = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&TokenType::Semicolon, "expected ';' after for condition")?;

        let increment = if self.check(&TokenType::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&TokenType::RightParen, "expected ')' after for clauses")?;

        self.consume(&TokenType::LeftBrace, "expected '{' after for clauses")?;
        let body = self.parse_block()?;

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            location,
        })
    }

    // Expression parsing, lowest precedence first

    fn parse_expression(&mut self) -> VibeResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> VibeResult<Expr> {
        let expr = self.parse_or()?;

        if self.match_token(&TokenType::Assign) {
            let value = self.parse_assignment()?;
            return match expr {
                Expr::Variable { name, location } => Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    location,
                }),
                other => Err(VibeError::parser(
                    "invalid assignment target",
                    other.location().clone(),
                )),
            };
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> VibeResult<Expr> {
        let mut expr = self.parse_and()?;
        while self.match_keyword(Keyword::Or) {
            let location = self.previous().location.clone();
            let right = self.parse_and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::Or,
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> VibeResult<Expr> {
        let mut expr = self.parse_equality()?;
        while self.match_keyword(Keyword::And) {
            let location = self.previous().location.clone();
            let right = self.parse_equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: LogicalOp::And,
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> VibeResult<Expr> {
        let mut expr = self.parse_comparison()?;
        loop {
            let operator = if self.match_token(&TokenType::Equal) {
                BinaryOp::Equal
            } else if self.match_token(&TokenType::NotEqual) {
                BinaryOp::NotEqual
            } else {
                break;
            };
            let location = self.previous().location.clone();
            let right = self.parse_comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> VibeResult<Expr> {
        let mut expr = self.parse_term()?;
        loop {
            let operator = if self.match_token(&TokenType::Less) {
                BinaryOp::Less
            } else if self.match_token(&TokenType::LessEqual) {
                BinaryOp::LessEqual
            } else if self.match_token(&TokenType::Greater) {
                BinaryOp::Greater
            } else if self.match_token(&TokenType::GreaterEqual) {
                BinaryOp::GreaterEqual
            } else {
                break;
            };
            let location = self.previous().location.clone();
            let right = self.parse_term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> VibeResult<Expr> {
        let mut expr = self.parse_factor()?;
        loop {
            let operator = if self.match_token(&TokenType::Plus) {
                BinaryOp::Add
            } else if self.match_token(&TokenType::Minus) {
                BinaryOp::Subtract
            } else {
                break;
            };
            let location = self.previous().location.clone();
            let right = self.parse_factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> VibeResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let operator = if self.match_token(&TokenType::Star) {
                BinaryOp::Multiply
            } else if self.match_token(&TokenType::Slash) {
                BinaryOp::Divide
            } else if self.match_token(&TokenType::Percent) {
                BinaryOp::Modulo
            } else {
                break;
            };
            let location = self.previous().location.clone();
            let right = self.parse_unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                location,
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> VibeResult<Expr> {
        if self.match_token(&TokenType::Minus) {
            let location = self.previous().location.clone();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                operator: UnaryOp::Negate,
                operand: Box::new(operand),
                location,
            });
        }
        if self.match_keyword(Keyword::Not) {
            let location = self.previous().location.clone();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                operator: UnaryOp::Not,
                operand: Box::new(operand),
                location,
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> VibeResult<Expr> {
        let location = self.peek().location.clone();

        if let TokenType::Literal(literal) = &self.peek().token_type {
            let value = match literal {
                TokenLiteral::Integer(n) => Literal::Integer(*n),
                TokenLiteral::Float(n) => Literal::Float(*n),
                TokenLiteral::String(s) => Literal::String(s.clone()),
            };
            self.advance();
            return Ok(Expr::Literal { value, location });
        }

        if self.match_keyword(Keyword::True) {
            return Ok(Expr::Literal {
                value: Literal::Boolean(true),
                location,
            });
        }
        if self.match_keyword(Keyword::False) {
            return Ok(Expr::Literal {
                value: Literal::Boolean(false),
                location,
            });
        }
        if self.match_keyword(Keyword::Null) {
            return Ok(Expr::Literal {
                value: Literal::Null,
                location,
            });
        }

        if self.check(&TokenType::Identifier) {
            let name = self.advance().lexeme.clone();
            if self.match_token(&TokenType::LeftParen) {
                let mut arguments = Vec::new();
                if !self.check(&TokenType::RightParen) {
                    loop {
                        arguments.push(self.parse_expression()?);
                        if !self.match_token(&TokenType::Comma) {
                            break;
                        }
                    }
                }
                self.consume(&TokenType::RightParen, "expected ')' after arguments")?;
                return Ok(Expr::Call {
                    callee: name,
                    arguments,
                    location,
                });
            }
            return Ok(Expr::Variable { name, location });
        }

        if self.match_token(&TokenType::LeftParen) {
            let expr = self.parse_expression()?;
            self.consume(&TokenType::RightParen, "expected ')' after expression")?;
            return Ok(expr);
        }

        Err(self.error_at_current("expected expression"))
    }

    // Token stream helpers

    fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: &TokenType) -> bool {
        match (&self.peek().token_type, token_type) {
            // Keywords are one discriminant; compare the keyword itself.
            (TokenType::Keyword(actual), TokenType::Keyword(expected)) => actual == expected,
            (actual, expected) => {
                std::mem::discriminant(actual) == std::mem::discriminant(expected)
            }
        }
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.peek().token_type, TokenType::Keyword(k) if *k == keyword)
    }

    fn consume(&mut self, token_type: &TokenType, message: &str) -> VibeResult<&Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> VibeResult<String> {
        if self.check(&TokenType::Identifier) {
            Ok(self.advance().lexeme.clone())
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn consume_string_literal(&mut self, message: &str) -> VibeResult<String> {
        if let TokenType::Literal(TokenLiteral::String(s)) = &self.peek().token_type {
            let s = s.clone();
            self.advance();
            Ok(s)
        } else {
            Err(self.error_at_current(message))
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }

    fn error_at_current(&self, message: &str) -> VibeError {
        let token = self.peek();
        let found = if self.is_at_end() {
            "end of input".to_string()
        } else {
            format!("'{}'", token.lexeme)
        };
        VibeError::parser(
            format!("{}, found {}", message, found),
            token.location.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> VibeResult<Ast> {
        let mut lexer = Lexer::new(source, None);
        let tokens = lexer.tokenize();
        Parser::new(tokens).parse()
    }

    #[test]
    fn test_parse_simple_function() {
        let ast = parse_source("fn add(x: Int, y: Int) -> Int { return x + y; }").unwrap();
        assert_eq!(ast.items.len(), 1);
        let Item::Function(f) = &ast.items[0] else {
            panic!("expected a function item");
        };
        assert_eq!(f.name, "add");
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].name, "x");
        assert!(f.return_type.is_some());
        assert!(!f.is_model_backed());
    }

    #[test]
    fn test_parse_prompt_function() {
        let ast = parse_source(
            r#"fn classify(text: String) -> Bool { prompt "Is this positive? {text}"; }"#,
        )
        .unwrap();
        let Item::Function(f) = &ast.items[0] else {
            panic!("expected a function item");
        };
        assert!(f.is_model_backed());
        let FunctionBody::Prompt { template, .. } = &f.body else {
            panic!("expected a prompt body");
        };
        assert_eq!(template, "Is this positive? {text}");
    }

    #[test]
    fn test_prompt_must_stand_alone() {
        let result = parse_source(
            r#"fn f() -> String { let x = 1; prompt "hello"; }"#,
        );
        assert!(matches!(result, Err(VibeError::Parser { .. })));
    }

    #[test]
    fn test_parse_type_alias() {
        let ast = parse_source(
            r#"type Temperature = Meaning<Int>("temperature in Celsius");"#,
        )
        .unwrap();
        let Item::TypeAlias(alias) = &ast.items[0] else {
            panic!("expected a type alias");
        };
        assert_eq!(alias.name, "Temperature");
        assert_eq!(alias.target.meaning_hint(), Some("temperature in Celsius"));
    }

    #[test]
    fn test_parse_let_with_and_without_annotation() {
        let ast = parse_source("fn f() { let x: Int = 1; let y = 2.5; }").unwrap();
        let Item::Function(f) = &ast.items[0] else {
            panic!("expected a function item");
        };
        let FunctionBody::Block(stmts) = &f.body else {
            panic!("expected a block body");
        };
        assert!(matches!(&stmts[0], Stmt::Let { annotation: Some(_), .. }));
        assert!(matches!(&stmts[1], Stmt::Let { annotation: None, .. }));
    }

    #[test]
    fn test_parse_if_else_chain() {
        let ast = parse_source(
            "fn f(x: Int) -> Int { if x > 0 { return 1; } else if x < 0 { return -1; } else { return 0; } }",
        )
        .unwrap();
        let Item::Function(f) = &ast.items[0] else {
            panic!("expected a function item");
        };
        let FunctionBody::Block(stmts) = &f.body else {
            panic!("expected a block body");
        };
        let Stmt::If { else_branch, .. } = &stmts[0] else {
            panic!("expected an if statement");
        };
        let nested = else_branch.as_ref().unwrap();
        assert!(matches!(&nested[0], Stmt::If { .. }));
    }

    #[test]
    fn test_parse_for_loop() {
        let ast = parse_source(
            "fn f() { for (let i = 0; i < 10; i = i + 1) { continue; } }",
        )
        .unwrap();
        let Item::Function(f) = &ast.items[0] else {
            panic!("expected a function item");
        };
        let FunctionBody::Block(stmts) = &f.body else {
            panic!("expected a block body");
        };
        let Stmt::For {
            initializer,
            condition,
            increment,
            ..
        } = &stmts[0]
        else {
            panic!("expected a for statement");
        };
        assert!(initializer.is_some());
        assert!(condition.is_some());
        assert!(increment.is_some());
    }

    #[test]
    fn test_precedence() {
        let ast = parse_source("fn f() -> Int { return 1 + 2 * 3; }").unwrap();
        let Item::Function(f) = &ast.items[0] else {
            panic!("expected a function item");
        };
        let FunctionBody::Block(stmts) = &f.body else {
            panic!("expected a block body");
        };
        let Stmt::Return {
            value: Some(Expr::Binary { operator, right, .. }),
            ..
        } = &stmts[0]
        else {
            panic!("expected a binary return expression");
        };
        assert_eq!(*operator, BinaryOp::Add);
        assert!(matches!(
            right.as_ref(),
            Expr::Binary {
                operator: BinaryOp::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn test_error_token_becomes_parser_error() {
        let result = parse_source("fn f() { let x = @; }");
        let err = result.unwrap_err();
        assert!(matches!(err, VibeError::Parser { .. }));
    }

    #[test]
    fn test_unexpected_top_level_token() {
        let result = parse_source("let x = 1;");
        assert!(matches!(result, Err(VibeError::Parser { .. })));
    }

    #[test]
    fn test_missing_semicolon_reports_location() {
        let err = parse_source("fn f() { return 1 }").unwrap_err();
        let location = err.location().expect("parser errors carry a location");
        assert_eq!(location.line, 1);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let result = parse_source("fn f() { 1 = 2; }");
        assert!(matches!(result, Err(VibeError::Parser { .. })));
    }
}
