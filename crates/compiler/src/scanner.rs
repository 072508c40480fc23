//! Lexical scanner.
//!
//! Produces tokens lazily; the compiler pulls one at a time and never looks
//! further ahead than a single token. Tokens borrow their lexeme from the
//! source, so nothing is allocated while scanning — string literals are
//! unescaped later, when the compiler interns them.
//!
//! Errors are tokens too: a [`TokenKind::Error`] token carries the message
//! as its text, and the compiler reports it like any other parse error.

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Single-character tokens.
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Minus,
    Plus,
    Percent,
    Semi,
    Colon,
    Slash,
    Star,

    // One- or two-character tokens.
    Bang,
    BangEq,
    Eq,
    EqEq,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Shl,
    Shr,

    // Literals.
    Identifier,
    Str,
    Number,

    // Keywords.
    And,
    Break,
    Case,
    Class,
    Continue,
    Def,
    Default,
    Else,
    Extends,
    False,
    For,
    If,
    In,
    None,
    Or,
    Print,
    Return,
    Super,
    Switch,
    This,
    True,
    Var,
    While,

    Error,
    Eof,
}

/// A scanned token. `text` is the raw lexeme (for string literals, the span
/// between the quotes, escapes intact); for `Error` tokens it is the
/// message instead.
#[derive(Debug, Clone, Copy)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub line: u32,
}

pub struct Scanner<'src> {
    source: &'src str,
    /// Byte offset of the token being scanned.
    start: usize,
    /// Byte offset of the next unconsumed character.
    current: usize,
    line: u32,
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Scanner {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.source.as_bytes()[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source.as_bytes()[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        *self.source.as_bytes().get(self.current + 1).unwrap_or(&0)
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn make_token(&self, kind: TokenKind) -> Token<'src> {
        Token {
            kind,
            text: &self.source[self.start..self.current],
            line: self.line,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenKind::Error,
            text: message,
            line: self.line,
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                b'#' => {
                    if self.peek_next() == b'|' {
                        // Block comment: #| ... |#
                        self.advance();
                        self.advance();
                        while !self.is_at_end() && !(self.peek() == b'|' && self.peek_next() == b'#')
                        {
                            if self.peek() == b'\n' {
                                self.line += 1;
                            }
                            self.advance();
                        }
                        if !self.is_at_end() {
                            self.advance();
                            self.advance();
                        }
                    } else {
                        while !self.is_at_end() && self.peek() != b'\n' {
                            self.advance();
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn check_keyword(
        &self,
        offset: usize,
        rest: &str,
        kind: TokenKind,
    ) -> TokenKind {
        let lexeme = &self.source[self.start..self.current];
        if lexeme.len() == offset + rest.len() && &lexeme[offset..] == rest {
            kind
        } else {
            TokenKind::Identifier
        }
    }

    /// Keyword classification via a hand-rolled trie over leading bytes.
    fn identifier_kind(&self) -> TokenKind {
        let lexeme = self.source[self.start..self.current].as_bytes();
        match lexeme[0] {
            b'a' => self.check_keyword(1, "nd", TokenKind::And),
            b'b' => self.check_keyword(1, "reak", TokenKind::Break),
            b'c' => {
                if lexeme.len() > 1 {
                    match lexeme[1] {
                        b'a' => self.check_keyword(2, "se", TokenKind::Case),
                        b'l' => self.check_keyword(2, "ass", TokenKind::Class),
                        b'o' => self.check_keyword(2, "ntinue", TokenKind::Continue),
                        _ => TokenKind::Identifier,
                    }
                } else {
                    TokenKind::Identifier
                }
            }
            b'd' => {
                if lexeme.len() == 3 {
                    self.check_keyword(1, "ef", TokenKind::Def)
                } else {
                    self.check_keyword(1, "efault", TokenKind::Default)
                }
            }
            b'e' => {
                if lexeme.len() > 1 {
                    match lexeme[1] {
                        b'l' => self.check_keyword(2, "se", TokenKind::Else),
                        b'x' => self.check_keyword(2, "tends", TokenKind::Extends),
                        _ => TokenKind::Identifier,
                    }
                } else {
                    TokenKind::Identifier
                }
            }
            b'f' => {
                if lexeme.len() > 1 {
                    match lexeme[1] {
                        b'a' => self.check_keyword(2, "lse", TokenKind::False),
                        b'o' => self.check_keyword(2, "r", TokenKind::For),
                        _ => TokenKind::Identifier,
                    }
                } else {
                    TokenKind::Identifier
                }
            }
            b'i' => {
                if lexeme.len() > 1 {
                    match lexeme[1] {
                        b'f' => self.check_keyword(2, "", TokenKind::If),
                        b'n' => self.check_keyword(2, "", TokenKind::In),
                        _ => TokenKind::Identifier,
                    }
                } else {
                    TokenKind::Identifier
                }
            }
            b'n' => self.check_keyword(1, "one", TokenKind::None),
            b'o' => self.check_keyword(1, "r", TokenKind::Or),
            b'p' => self.check_keyword(1, "rint", TokenKind::Print),
            b'r' => self.check_keyword(1, "eturn", TokenKind::Return),
            b's' => {
                if lexeme.len() > 1 {
                    match lexeme[1] {
                        b'u' => self.check_keyword(2, "per", TokenKind::Super),
                        b'w' => self.check_keyword(2, "itch", TokenKind::Switch),
                        _ => TokenKind::Identifier,
                    }
                } else {
                    TokenKind::Identifier
                }
            }
            b't' => {
                if lexeme.len() > 1 {
                    match lexeme[1] {
                        b'h' => self.check_keyword(2, "is", TokenKind::This),
                        b'r' => self.check_keyword(2, "ue", TokenKind::True),
                        _ => TokenKind::Identifier,
                    }
                } else {
                    TokenKind::Identifier
                }
            }
            b'v' => self.check_keyword(1, "ar", TokenKind::Var),
            b'w' => self.check_keyword(1, "hile", TokenKind::While),
            _ => TokenKind::Identifier,
        }
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_alpha(self.peek()) || self.peek().is_ascii_digit() {
            self.advance();
        }
        self.make_token(self.identifier_kind())
    }

    fn number(&mut self) -> Token<'src> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        // A decimal point only counts when a digit follows it.
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        self.make_token(TokenKind::Number)
    }

    fn string(&mut self) -> Token<'src> {
        let content_start = self.current;
        loop {
            if self.is_at_end() {
                return self.error_token("Unterminated string.");
            }
            match self.advance() {
                b'"' => break,
                b'\n' => self.line += 1,
                b'\\' => {
                    if self.is_at_end() {
                        return self.error_token("Unterminated string.");
                    }
                    match self.advance() {
                        b'"' | b'\'' | b'n' | b'r' | b't' | b'v' | b'f' | b'\\' | b'0' | b'e'
                        | b'a' => {}
                        _ => return self.error_token("Unknown escape sequence."),
                    }
                }
                _ => {}
            }
        }
        Token {
            kind: TokenKind::Str,
            text: &self.source[content_start..self.current - 1],
            line: self.line,
        }
    }

    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        let c = self.advance();
        if is_alpha(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenKind::LParen),
            b')' => self.make_token(TokenKind::RParen),
            b'{' => self.make_token(TokenKind::LBrace),
            b'}' => self.make_token(TokenKind::RBrace),
            b'[' => self.make_token(TokenKind::LBracket),
            b']' => self.make_token(TokenKind::RBracket),
            b',' => self.make_token(TokenKind::Comma),
            b'.' => self.make_token(TokenKind::Dot),
            b'-' => self.make_token(TokenKind::Minus),
            b'+' => self.make_token(TokenKind::Plus),
            b';' => self.make_token(TokenKind::Semi),
            b':' => self.make_token(TokenKind::Colon),
            b'/' => self.make_token(TokenKind::Slash),
            b'*' => self.make_token(TokenKind::Star),
            b'%' => self.make_token(TokenKind::Percent),
            b'!' => {
                let kind = if self.matches(b'=') {
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                };
                self.make_token(kind)
            }
            b'=' => {
                let kind = if self.matches(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                };
                self.make_token(kind)
            }
            b'>' => {
                let kind = if self.matches(b'=') {
                    TokenKind::GreaterEq
                } else if self.matches(b'>') {
                    TokenKind::Shr
                } else {
                    TokenKind::Greater
                };
                self.make_token(kind)
            }
            b'<' => {
                let kind = if self.matches(b'=') {
                    TokenKind::LessEq
                } else if self.matches(b'<') {
                    TokenKind::Shl
                } else {
                    TokenKind::Less
                };
                self.make_token(kind)
            }
            b'"' => self.string(),
            _ => self.error_token("Unexpected character."),
        }
    }
}

/// Resolve the escape sequences in a raw string-literal span. The scanner
/// has already rejected unknown escapes, so anything left decodes cleanly.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{0b}'),
            Some('f') => out.push('\u{0c}'),
            Some('\\') => out.push('\\'),
            Some('0') => out.push('\0'),
            Some('e') => out.push('\u{1b}'),
            Some('a') => out.push('\u{07}'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
