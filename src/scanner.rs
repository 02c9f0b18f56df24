use std::fmt::{Display, Formatter};
use std::iter::FusedIterator;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

pub type ScanResult<A> = Result<A, ScanError>;

static NEWLINE_GRAPHEMES: &[&str] = &["\r", "\n", "\r\n"];
static DIGITS: &[&str] = &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
static LOWERCASE_LETTERS: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z",
];

static UPPERCASE_LETTERS: &[&str] = &[
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S",
    "T", "U", "V", "W", "X", "Y", "Z",
];

static UNDERSCORE: &[&str] = &["_"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // One-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Colon,
    Slash,
    Asterisk,
    // One- or two-character tokens
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    AndAnd,
    OrOr,
    // Literals
    Identifier,
    String,
    Number,
    // Keywords
    Class,
    Else,
    False,
    Func,
    If,
    Nil,
    Print,
    Return,
    SelfKw,
    Super,
    True,
    Var,
    While,
    Eof,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    /// Byte offset of the lexeme in the source.
    pub start: usize,
    pub line: usize,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, lexeme: &'a str, start: usize, line: usize) -> Self {
        Self {
            kind,
            lexeme,
            start,
            line,
        }
    }

    pub fn length(&self) -> usize {
        self.lexeme.len()
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "end"),
            _ => write!(f, "{}", self.lexeme),
        }
    }
}

pub struct Scanner<'a> {
    source: &'a str,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn iter(&self) -> SourceIterator<'a> {
        SourceIterator::new(self.source)
    }
}

pub struct SourceIterator<'a> {
    source: &'a str,
    graphemes: Vec<&'a str>,
    line: usize,
    cur_char: usize,
    offset: usize,
    finished: bool,
}

impl<'a> SourceIterator<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            graphemes: source.graphemes(true).collect(),
            line: 1,
            cur_char: 0,
            offset: 0,
            finished: false,
        }
    }

    fn get_and_advance(&mut self) -> Option<&'a str> {
        let res = *self.graphemes.get(self.cur_char)?;
        self.cur_char += 1;
        Some(res)
    }

    fn peek(&self) -> Option<&'a str> {
        self.graphemes.get(self.cur_char).copied()
    }

    fn peek_peek(&self) -> Option<&'a str> {
        self.graphemes.get(self.cur_char + 1).copied()
    }

    fn advance_if_matches(&mut self, c: &str) -> bool {
        match self.peek() {
            Some(res) if res == c => {
                self.cur_char += 1;
                true
            }
            _ => false,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                " " | "\t" => {
                    let _ = self.get_and_advance();
                }
                "\n" | "\r" | "\r\n" => {
                    let _ = self.get_and_advance();
                    self.line += 1;
                }
                "/" => {
                    if let Some("/") = self.peek_peek() {
                        while let Some(c) = self.peek() {
                            if !NEWLINE_GRAPHEMES.contains(&c) {
                                let _ = self.get_and_advance();
                            } else {
                                break;
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => {
                    break;
                }
            };
        }
        self.reset()
    }

    fn current_len(&self) -> usize {
        self.graphemes
            .iter()
            .take(self.cur_char)
            .map(|c| c.len())
            .sum()
    }

    fn reset(&mut self) {
        let advance_len = self.current_len();
        self.graphemes.drain(0..self.cur_char);
        self.source = &self.source[advance_len..];
        self.offset += advance_len;
        self.cur_char = 0;
    }

    fn get_cur_str(&self) -> &'a str {
        let source = self.source;
        &source[..self.current_len()]
    }

    fn token(&self, kind: TokenKind, line: usize) -> Token<'a> {
        Token::new(kind, self.get_cur_str(), self.offset, line)
    }

    fn string(&mut self) -> ScanResult<Token<'a>> {
        let starting_line = self.line;
        while let Some(c) = self.get_and_advance() {
            if NEWLINE_GRAPHEMES.contains(&c) {
                self.line += 1;
            }
            if c == "\"" {
                return Ok(self.token(TokenKind::String, starting_line));
            }
        }

        Err(ScanError::UnterminatedString(
            self.get_cur_str().to_string(),
            starting_line,
        ))
    }

    fn digit(&mut self) -> Token<'a> {
        while let Some(c) = self.peek() {
            if is_digit(c) {
                let _ = self.get_and_advance();
            } else {
                break;
            }
        }
        if let (Some("."), Some(c)) = (self.peek(), self.peek_peek()) {
            if is_digit(c) {
                // Consume .
                let _ = self.get_and_advance();
                while let Some(c) = self.peek() {
                    if is_digit(c) {
                        let _ = self.get_and_advance();
                    } else {
                        break;
                    }
                }
            }
        }

        self.token(TokenKind::Number, self.line)
    }

    fn identifier(&mut self) -> Token<'a> {
        while let Some(c) = self.peek() {
            if is_letter_or_underscore(c) || is_digit(c) {
                let _ = self.get_and_advance();
            } else {
                break;
            }
        }

        use TokenKind::*;
        let kind = match self.get_cur_str() {
            "class" => Class,
            "else" => Else,
            "false" => False,
            "func" => Func,
            "if" => If,
            "nil" => Nil,
            "print" => Print,
            "return" => Return,
            "self" => SelfKw,
            "super" => Super,
            "true" => True,
            "var" => Var,
            "while" => While,
            _ => Identifier,
        };
        self.token(kind, self.line)
    }

    fn match_token(&mut self, c: &'a str) -> Option<ScanResult<Token<'a>>> {
        use TokenKind::*;
        let line = self.line;
        let kind = match c {
            "(" => LeftParen,
            ")" => RightParen,
            "{" => LeftBrace,
            "}" => RightBrace,
            "[" => LeftBracket,
            "]" => RightBracket,
            ";" => Semicolon,
            ":" => Colon,
            "," => Comma,
            "." => Dot,
            "-" => Minus,
            "+" => Plus,
            "/" => Slash,
            "*" => Asterisk,
            "!" if self.advance_if_matches("=") => BangEqual,
            "!" => Bang,
            "=" if self.advance_if_matches("=") => EqualEqual,
            "=" => Equal,
            "<" if self.advance_if_matches("=") => LessEqual,
            "<" => Less,
            ">" if self.advance_if_matches("=") => GreaterEqual,
            ">" => Greater,
            "&" if self.advance_if_matches("&") => AndAnd,
            "|" if self.advance_if_matches("|") => OrOr,
            "\"" => return Some(self.string()),
            _ if is_digit(c) => return Some(Ok(self.digit())),
            _ if is_letter_or_underscore(c) => return Some(Ok(self.identifier())),
            _ => return None,
        };
        Some(Ok(self.token(kind, line)))
    }
}

fn is_digit(c: &str) -> bool {
    DIGITS.contains(&c)
}

fn is_letter_or_underscore(c: &str) -> bool {
    LOWERCASE_LETTERS.contains(&c) || UPPERCASE_LETTERS.contains(&c) || UNDERSCORE.contains(&c)
}

impl<'a> Iterator for SourceIterator<'a> {
    type Item = ScanResult<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.skip_whitespace();
        let line = self.line;
        let Some(c) = self.get_and_advance() else {
            self.finished = true;
            return Some(Ok(Token::new(TokenKind::Eof, "", self.offset, line)));
        };
        let res = self
            .match_token(c)
            .unwrap_or_else(|| Err(ScanError::UnknownToken(self.get_cur_str().to_string(), line)));
        self.reset();
        Some(res)
    }
}

impl<'a> FusedIterator for SourceIterator<'a> {}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ScanError {
    #[error("Unknown token {0} at line {1}")]
    UnknownToken(String, usize),
    #[error("Unterminated string {0} at line {1}")]
    UnterminatedString(String, usize),
}

impl ScanError {
    pub fn line(&self) -> usize {
        match self {
            ScanError::UnknownToken(_, line) | ScanError::UnterminatedString(_, line) => *line,
        }
    }
}
