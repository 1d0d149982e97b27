//! Tokenizer for the strategy language

use super::SandboxError;

/// Token kinds of the strategy language
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),

    // Keywords
    Fn,
    Let,
    If,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    And,
    Or,
    Not,
    True,
    False,
    Nil,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,

    Eof,
}

impl TokenKind {
    fn keyword(ident: &str) -> Option<Self> {
        let kind = match ident {
            "fn" => Self::Fn,
            "let" => Self::Let,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "for" => Self::For,
            "in" => Self::In,
            "return" => Self::Return,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "true" => Self::True,
            "false" => Self::False,
            "nil" => Self::Nil,
            _ => return None,
        };
        Some(kind)
    }
}

/// A token with its source line (1-based)
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
        }
    }

    /// Tokenize the whole input, always ending with `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, SandboxError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, SandboxError> {
        self.skip_trivia();
        let line = self.line;

        let Some(ch) = self.chars.next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
            });
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '%' => TokenKind::Percent,
            '+' => self.with_eq(TokenKind::PlusAssign, TokenKind::Plus),
            '-' => self.with_eq(TokenKind::MinusAssign, TokenKind::Minus),
            '/' => self.with_eq(TokenKind::SlashAssign, TokenKind::Slash),
            '*' => {
                if self.chars.peek() == Some(&'*') {
                    self.chars.next();
                    TokenKind::StarStar
                } else {
                    self.with_eq(TokenKind::StarAssign, TokenKind::Star)
                }
            }
            '=' => self.with_eq(TokenKind::EqEq, TokenKind::Assign),
            '!' => self.with_eq(TokenKind::NotEq, TokenKind::Bang),
            '<' => self.with_eq(TokenKind::LtEq, TokenKind::Lt),
            '>' => self.with_eq(TokenKind::GtEq, TokenKind::Gt),
            '&' => self.expect_double('&', TokenKind::AndAnd)?,
            '|' => self.expect_double('|', TokenKind::OrOr)?,
            '"' | '\'' => self.read_string(ch)?,
            c if c.is_ascii_digit() || c == '.' => self.read_number(c)?,
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.read_identifier(c);
                TokenKind::keyword(&ident).unwrap_or(TokenKind::Ident(ident))
            }
            other => {
                return Err(SandboxError::Syntax {
                    line,
                    message: format!("unexpected character '{}'", other),
                })
            }
        };

        Ok(Token { kind, line })
    }

    fn with_eq(&mut self, with: TokenKind, without: TokenKind) -> TokenKind {
        if self.chars.peek() == Some(&'=') {
            self.chars.next();
            with
        } else {
            without
        }
    }

    fn expect_double(&mut self, ch: char, kind: TokenKind) -> Result<TokenKind, SandboxError> {
        if self.chars.peek() == Some(&ch) {
            self.chars.next();
            Ok(kind)
        } else {
            Err(SandboxError::Syntax {
                line: self.line,
                message: format!("expected '{}{}'", ch, ch),
            })
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek() {
                Some('\n') => {
                    self.line += 1;
                    self.chars.next();
                }
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('#') => self.skip_line(),
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        self.skip_line();
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn read_number(&mut self, first: char) -> Result<TokenKind, SandboxError> {
        let mut text = String::from(first);
        let mut seen_exponent = false;
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == '_' {
                text.push(c);
            } else if (c == 'e' || c == 'E') && !seen_exponent {
                seen_exponent = true;
                text.push(c);
                self.chars.next();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        text.push(sign);
                        self.chars.next();
                    }
                }
                continue;
            } else {
                break;
            }
            self.chars.next();
        }

        let cleaned: String = text.chars().filter(|c| *c != '_').collect();
        cleaned
            .parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| SandboxError::Syntax {
                line: self.line,
                message: format!("invalid number '{}'", text),
            })
    }

    fn read_string(&mut self, quote: char) -> Result<TokenKind, SandboxError> {
        let start_line = self.line;
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c) => text.push(c),
                    None => break,
                },
                Some('\n') => break,
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(SandboxError::Syntax {
            line: start_line,
            message: "unterminated string literal".into(),
        })
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut ident = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        ident
    }
}
