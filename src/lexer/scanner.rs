//! Lexer/Scanner implementation for the Vibe language
//!
//! Tokenization is total: unrecognized input becomes `TokenType::Error`
//! tokens carrying position information, and the parser decides whether
//! to abort. The token stream always ends with a single `Eof` token.

use super::token::{Keyword, Literal, Token, TokenType};
use crate::error::SourceLocation;

/// Lexer for Vibe source code
pub struct Lexer {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    // Position of the token currently being scanned; captured before the
    // first character is consumed so multi-line tokens report their start.
    start_line: usize,
    start_column: usize,
    filename: Option<String>,
}

impl Lexer {
    /// Create a new lexer
    pub fn new(source: &str, filename: Option<&str>) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
            filename: filename.map(|s| s.to_string()),
        }
    }

    /// Tokenize the source code
    pub fn tokenize(&mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            self.current_location(),
        ));

        std::mem::take(&mut self.tokens)
    }

    /// Scan a single token
    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            // Whitespace (skip)
            ' ' | '\r' | '\t' => {}

            '\n' => {
                self.line += 1;
                self.column = 1;
            }

            // Single-character tokens
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            ';' => self.add_token(TokenType::Semicolon),
            ':' => self.add_token(TokenType::Colon),
            '+' => self.add_token(TokenType::Plus),
            '*' => self.add_token(TokenType::Star),
            '%' => self.add_token(TokenType::Percent),

            // Two-character tokens
            '-' => {
                if self.match_char('>') {
                    self.add_token(TokenType::Arrow)
                } else {
                    self.add_token(TokenType::Minus)
                }
            }

            '=' => {
                if self.match_char('=') {
                    self.add_token(TokenType::Equal)
                } else {
                    self.add_token(TokenType::Assign)
                }
            }

            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenType::NotEqual)
                } else {
                    self.error_token("Unexpected character '!'. Did you mean '!='?")
                }
            }

            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenType::LessEqual)
                } else {
                    self.add_token(TokenType::Less)
                }
            }

            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenType::GreaterEqual)
                } else {
                    self.add_token(TokenType::Greater)
                }
            }

            // Comments
            '/' => {
                if self.match_char('/') {
                    // Single-line comment: skip until end of line
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_char('*') {
                    self.scan_multiline_comment();
                } else {
                    self.add_token(TokenType::Slash)
                }
            }

            // String literals
            '"' => self.scan_string(),

            // Number literals
            c if c.is_ascii_digit() => self.scan_number(),

            // Identifiers and keywords
            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            // Unexpected character
            _ => self.error_token(&format!("Unexpected character '{}'", c)),
        }
    }

    /// Scan a string literal
    fn scan_string(&mut self) {
        let mut value = String::new();

        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                value.push(self.advance());
                self.line += 1;
                self.column = 1;
                continue;
            }

            // Handle escape sequences
            if self.peek() == '\\' {
                self.advance(); // consume backslash
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    _ => {
                        return self
                            .error_token(&format!("Invalid escape sequence '\\{}'", escaped));
                    }
                }
            } else {
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string");
        }

        // Consume closing quote
        self.advance();

        self.add_token(TokenType::Literal(Literal::String(value)))
    }

    /// Scan a number literal (integer or float)
    fn scan_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // Check for decimal point
        let is_float = if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume '.'
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            true
        } else {
            false
        };

        let lexeme: String = self.source[self.start..self.current].iter().collect();

        if is_float {
            match lexeme.parse::<f64>() {
                Ok(value) => self.add_token(TokenType::Literal(Literal::Float(value))),
                Err(_) => self.error_token(&format!("Invalid float literal '{}'", lexeme)),
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(value) => self.add_token(TokenType::Literal(Literal::Integer(value))),
                Err(_) => self.error_token(&format!("Invalid integer literal '{}'", lexeme)),
            }
        }
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let lexeme: String = self.source[self.start..self.current].iter().collect();

        let token_type = if let Some(keyword) = Keyword::from_str(&lexeme) {
            TokenType::Keyword(keyword)
        } else {
            TokenType::Identifier
        };

        self.add_token(token_type)
    }

    /// Scan a multi-line comment (nesting allowed)
    fn scan_multiline_comment(&mut self) {
        let mut depth = 1;

        while depth > 0 && !self.is_at_end() {
            if self.peek() == '/' && self.peek_next() == '*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else if self.advance() == '\n' {
                self.line += 1;
                self.column = 1;
            }
        }

        if depth > 0 {
            self.error_token("Unterminated multi-line comment");
        }
    }

    /// Add a token to the token list, located at its first character
    fn add_token(&mut self, token_type: TokenType) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let location = SourceLocation::new(
            self.start_line,
            self.start_column,
            self.filename.clone(),
        );
        self.tokens.push(Token::new(token_type, lexeme, location));
    }

    /// Add an error token, located where the offending token began
    fn error_token(&mut self, message: &str) {
        self.add_token(TokenType::Error(message.to_string()));
    }

    /// Advance to the next character
    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        self.column += 1;
        c
    }

    /// Check if the next character matches and consume it if so
    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            false
        } else {
            self.current += 1;
            self.column += 1;
            true
        }
    }

    /// Peek at the current character without consuming it
    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    /// Peek at the next character without consuming it
    fn peek_next(&self) -> char {
        if self.current + 1 >= self.source.len() {
            '\0'
        } else {
            self.source[self.current + 1]
        }
    }

    /// Check if we've reached the end of the source
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    /// Get the current source location
    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column, self.filename.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize_source(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source, None);
        lexer.tokenize()
    }

    #[test]
    fn test_empty_source() {
        let tokens = tokenize_source("");
        assert_eq!(tokens.len(), 1); // Just EOF
        assert_eq!(tokens[0].token_type, TokenType::Eof);
    }

    #[test]
    fn test_single_character_tokens() {
        let tokens = tokenize_source("(){},;:+-*/%");
        assert_eq!(tokens[0].token_type, TokenType::LeftParen);
        assert_eq!(tokens[1].token_type, TokenType::RightParen);
        assert_eq!(tokens[2].token_type, TokenType::LeftBrace);
        assert_eq!(tokens[3].token_type, TokenType::RightBrace);
        assert_eq!(tokens[4].token_type, TokenType::Comma);
        assert_eq!(tokens[5].token_type, TokenType::Semicolon);
        assert_eq!(tokens[6].token_type, TokenType::Colon);
        assert_eq!(tokens[7].token_type, TokenType::Plus);
        assert_eq!(tokens[8].token_type, TokenType::Minus);
        assert_eq!(tokens[9].token_type, TokenType::Star);
        assert_eq!(tokens[10].token_type, TokenType::Slash);
        assert_eq!(tokens[11].token_type, TokenType::Percent);
    }

    #[test]
    fn test_two_character_tokens() {
        let tokens = tokenize_source("== != <= >= ->");
        assert_eq!(tokens[0].token_type, TokenType::Equal);
        assert_eq!(tokens[1].token_type, TokenType::NotEqual);
        assert_eq!(tokens[2].token_type, TokenType::LessEqual);
        assert_eq!(tokens[3].token_type, TokenType::GreaterEqual);
        assert_eq!(tokens[4].token_type, TokenType::Arrow);
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize_source("fn let return if else while prompt type");
        assert_eq!(tokens[0].token_type, TokenType::Keyword(Keyword::Fn));
        assert_eq!(tokens[1].token_type, TokenType::Keyword(Keyword::Let));
        assert_eq!(tokens[2].token_type, TokenType::Keyword(Keyword::Return));
        assert_eq!(tokens[3].token_type, TokenType::Keyword(Keyword::If));
        assert_eq!(tokens[4].token_type, TokenType::Keyword(Keyword::Else));
        assert_eq!(tokens[5].token_type, TokenType::Keyword(Keyword::While));
        assert_eq!(tokens[6].token_type, TokenType::Keyword(Keyword::Prompt));
        assert_eq!(tokens[7].token_type, TokenType::Keyword(Keyword::Type));
    }

    #[test]
    fn test_type_names_are_identifiers() {
        let tokens = tokenize_source("Int Float String Bool Number Meaning");
        for token in &tokens[..6] {
            assert_eq!(token.token_type, TokenType::Identifier);
        }
    }

    #[test]
    fn test_identifiers() {
        let tokens = tokenize_source("foo bar_baz _private myVar123");
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[0].lexeme, "foo");
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
        assert_eq!(tokens[1].lexeme, "bar_baz");
        assert_eq!(tokens[2].token_type, TokenType::Identifier);
        assert_eq!(tokens[2].lexeme, "_private");
        assert_eq!(tokens[3].token_type, TokenType::Identifier);
        assert_eq!(tokens[3].lexeme, "myVar123");
    }

    #[test]
    fn test_integer_literals() {
        let tokens = tokenize_source("0 42 123456");
        assert_eq!(tokens[0].token_type, TokenType::Literal(Literal::Integer(0)));
        assert_eq!(
            tokens[1].token_type,
            TokenType::Literal(Literal::Integer(42))
        );
        assert_eq!(
            tokens[2].token_type,
            TokenType::Literal(Literal::Integer(123456))
        );
    }

    #[test]
    fn test_float_literals() {
        let tokens = tokenize_source("3.14 0.5 123.456");
        assert_eq!(tokens[0].token_type, TokenType::Literal(Literal::Float(3.14)));
        assert_eq!(tokens[1].token_type, TokenType::Literal(Literal::Float(0.5)));
        assert_eq!(
            tokens[2].token_type,
            TokenType::Literal(Literal::Float(123.456))
        );
    }

    #[test]
    fn test_string_literals() {
        let tokens = tokenize_source(r#""hello" "What is the weather in {city}?""#);
        assert_eq!(
            tokens[0].token_type,
            TokenType::Literal(Literal::String("hello".to_string()))
        );
        assert_eq!(
            tokens[1].token_type,
            TokenType::Literal(Literal::String(
                "What is the weather in {city}?".to_string()
            ))
        );
    }

    #[test]
    fn test_string_escape_sequences() {
        let tokens = tokenize_source(r#""hello\nworld" "quote\"test""#);
        assert_eq!(
            tokens[0].token_type,
            TokenType::Literal(Literal::String("hello\nworld".to_string()))
        );
        assert_eq!(
            tokens[1].token_type,
            TokenType::Literal(Literal::String("quote\"test".to_string()))
        );
    }

    #[test]
    fn test_single_line_comment() {
        let tokens = tokenize_source("let x = 42; // this is a comment\nlet y = 10;");
        assert_eq!(tokens[0].token_type, TokenType::Keyword(Keyword::Let));
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
        assert_eq!(tokens[2].token_type, TokenType::Assign);
        assert_eq!(
            tokens[3].token_type,
            TokenType::Literal(Literal::Integer(42))
        );
        assert_eq!(tokens[4].token_type, TokenType::Semicolon);
        assert_eq!(tokens[5].token_type, TokenType::Keyword(Keyword::Let));
    }

    #[test]
    fn test_nested_multiline_comment() {
        let tokens = tokenize_source("let x /* outer /* inner */ outer */ = 42;");
        assert_eq!(tokens[0].token_type, TokenType::Keyword(Keyword::Let));
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
        assert_eq!(tokens[2].token_type, TokenType::Assign);
        assert_eq!(
            tokens[3].token_type,
            TokenType::Literal(Literal::Integer(42))
        );
    }

    #[test]
    fn test_function_declaration() {
        let tokens = tokenize_source("fn add(a: Int, b: Int) -> Int { return a + b; }");
        assert_eq!(tokens[0].token_type, TokenType::Keyword(Keyword::Fn));
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
        assert_eq!(tokens[1].lexeme, "add");
        assert_eq!(tokens[2].token_type, TokenType::LeftParen);
    }

    #[test]
    fn test_unterminated_string_is_error_token() {
        let tokens = tokenize_source(r#""unterminated"#);
        match &tokens[0].token_type {
            TokenType::Error(message) => assert!(message.contains("Unterminated string")),
            other => panic!("expected error token, got {:?}", other),
        }
        // Stream still terminates in Eof
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
    }

    #[test]
    fn test_invalid_character_is_error_token() {
        let tokens = tokenize_source("let x = @;");
        let has_error = tokens
            .iter()
            .any(|t| matches!(&t.token_type, TokenType::Error(m) if m.contains("Unexpected character")));
        assert!(has_error);
    }

    #[test]
    fn test_source_location() {
        let tokens = tokenize_source("let\nx");
        assert_eq!(tokens[0].location.line, 1);
        assert_eq!(tokens[1].location.line, 2);
    }

    #[test]
    fn test_multiline_string_token_locations() {
        let tokens = tokenize_source("let s = \"a\nb\";\nlet t = 1;");
        // The string token is located at its opening quote.
        assert_eq!(tokens[3].location.line, 1);
        assert_eq!(tokens[3].location.column, 9);
        // Columns stay accurate after the embedded newline.
        assert_eq!(tokens[4].token_type, TokenType::Semicolon);
        assert_eq!(tokens[4].location.line, 2);
        assert_eq!(tokens[4].location.column, 3);
        assert_eq!(tokens[5].token_type, TokenType::Keyword(Keyword::Let));
        assert_eq!(tokens[5].location.line, 3);
        assert_eq!(tokens[5].location.column, 1);
    }

    #[test]
    fn test_error_token_located_at_token_start() {
        let tokens = tokenize_source("let x = \"oops");
        let token = &tokens[3];
        assert!(matches!(&token.token_type, TokenType::Error(_)));
        assert_eq!(token.location.line, 1);
        assert_eq!(token.location.column, 9);
    }

    #[test]
    fn test_restartable() {
        let first = tokenize_source("let x = 1;");
        let second = tokenize_source("let x = 1;");
        assert_eq!(first, second);
    }
}
