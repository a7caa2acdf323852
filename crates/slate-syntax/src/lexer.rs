//! Hand-written lexer for Slate.
//!
//! Produces a flat token stream with spans. Whitespace and comments are
//! dropped. Errors are collected rather than aborting, so the parser always
//! receives a usable stream.

use serde::Serialize;
use slate_common::Span;

use crate::kind::SyntaxKind;

/// A single token: kind plus the byte range it covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub span: Span,
}

/// A lexer error with location information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

/// Tokenize `text`. The returned stream never includes an explicit EOF
/// token; the parser synthesizes one at the end of input.
pub fn lex(text: &str) -> (Vec<Token>, Vec<LexError>) {
    let mut lexer = Lexer {
        text,
        pos: 0,
        tokens: Vec::new(),
        errors: Vec::new(),
    };
    lexer.run();
    (lexer.tokens, lexer.errors)
}

struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl Lexer<'_> {
    fn run(&mut self) {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => self.line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.block_comment(),
                c if c == '_' && !is_ident_continue(self.peek_at(1)) => {
                    self.bump();
                    self.push(SyntaxKind::Underscore, start);
                }
                c if c.is_ascii_alphabetic() || c == '_' => self.word(),
                c if c.is_ascii_digit() => self.number(),
                '"' => self.string(),
                _ => self.punct(),
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn push(&mut self, kind: SyntaxKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start as u32, self.pos as u32),
        });
    }

    fn error(&mut self, message: impl Into<String>, start: usize) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start as u32, self.pos as u32),
        });
    }

    fn line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn block_comment(&mut self) {
        let start = self.pos;
        self.bump(); // /
        self.bump(); // *
        loop {
            match self.peek() {
                None => {
                    self.error("unterminated block comment", start);
                    break;
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some(_) => self.bump(),
            }
        }
    }

    fn word(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.text[start..self.pos];
        let kind = SyntaxKind::from_keyword(word).unwrap_or(SyntaxKind::Ident);
        self.push(kind, start);
    }

    fn number(&mut self) {
        let start = self.pos;
        // 0x / 0b prefixes, otherwise decimal.
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X') | Some('b') | Some('B')) {
            self.bump();
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        self.push(SyntaxKind::IntNumber, start);
    }

    fn string(&mut self) {
        let start = self.pos;
        self.bump(); // opening quote
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.error("unterminated string literal", start);
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some(_) => self.bump(),
            }
        }
        self.push(SyntaxKind::StringLit, start);
    }

    fn punct(&mut self) {
        let start = self.pos;
        let one = self.peek().unwrap_or('\0');
        let two = self.peek_at(1);
        let three = self.peek_at(2);

        let (kind, len) = match (one, two, three) {
            ('<', Some('='), Some('>')) => (SyntaxKind::Spaceship, 3),
            ('<', Some('<'), Some('=')) => (SyntaxKind::ShlEq, 3),
            ('>', Some('>'), Some('=')) => (SyntaxKind::ShrEq, 3),
            ('<', Some('<'), _) => (SyntaxKind::Shl, 2),
            ('>', Some('>'), _) => (SyntaxKind::Shr, 2),
            ('<', Some('='), _) => (SyntaxKind::LtEq, 2),
            ('>', Some('='), _) => (SyntaxKind::GtEq, 2),
            ('=', Some('='), _) => (SyntaxKind::EqEq, 2),
            ('!', Some('='), _) => (SyntaxKind::BangEq, 2),
            ('!', Some('i'), Some('s')) if !is_ident_continue(self.peek_at(3)) => {
                (SyntaxKind::NotIsKw, 3)
            }
            ('&', Some('&'), _) => (SyntaxKind::AmpAmp, 2),
            ('|', Some('|'), _) => (SyntaxKind::PipePipe, 2),
            ('?', Some('?'), _) => (SyntaxKind::QuestionQuestion, 2),
            ('-', Some('>'), _) => (SyntaxKind::Arrow, 2),
            ('=', Some('>'), _) => (SyntaxKind::FatArrow, 2),
            ('+', Some('='), _) => (SyntaxKind::PlusEq, 2),
            ('-', Some('='), _) => (SyntaxKind::MinusEq, 2),
            ('*', Some('='), _) => (SyntaxKind::StarEq, 2),
            ('/', Some('='), _) => (SyntaxKind::SlashEq, 2),
            ('%', Some('='), _) => (SyntaxKind::PercentEq, 2),
            ('&', Some('='), _) => (SyntaxKind::AmpEq, 2),
            ('|', Some('='), _) => (SyntaxKind::PipeEq, 2),
            ('^', Some('='), _) => (SyntaxKind::CaretEq, 2),
            ('(', _, _) => (SyntaxKind::LParen, 1),
            (')', _, _) => (SyntaxKind::RParen, 1),
            ('{', _, _) => (SyntaxKind::LBrace, 1),
            ('}', _, _) => (SyntaxKind::RBrace, 1),
            ('[', _, _) => (SyntaxKind::LBrack, 1),
            (']', _, _) => (SyntaxKind::RBrack, 1),
            ('<', _, _) => (SyntaxKind::Lt, 1),
            ('>', _, _) => (SyntaxKind::Gt, 1),
            (',', _, _) => (SyntaxKind::Comma, 1),
            (';', _, _) => (SyntaxKind::Semicolon, 1),
            (':', _, _) => (SyntaxKind::Colon, 1),
            ('.', _, _) => (SyntaxKind::Dot, 1),
            ('?', _, _) => (SyntaxKind::Question, 1),
            ('!', _, _) => (SyntaxKind::Bang, 1),
            ('~', _, _) => (SyntaxKind::Tilde, 1),
            ('=', _, _) => (SyntaxKind::Eq, 1),
            ('+', _, _) => (SyntaxKind::Plus, 1),
            ('-', _, _) => (SyntaxKind::Minus, 1),
            ('*', _, _) => (SyntaxKind::Star, 1),
            ('/', _, _) => (SyntaxKind::Slash, 1),
            ('%', _, _) => (SyntaxKind::Percent, 1),
            ('&', _, _) => (SyntaxKind::Amp, 1),
            ('|', _, _) => (SyntaxKind::Pipe, 1),
            ('^', _, _) => (SyntaxKind::Caret, 1),
            _ => {
                self.bump();
                self.error(format!("unexpected character: {one:?}"), start);
                self.push(SyntaxKind::ErrorToken, start);
                return;
            }
        };
        for _ in 0..len {
            self.bump();
        }
        self.push(kind, start);
    }
}

fn is_ident_continue(c: Option<char>) -> bool {
    matches!(c, Some(c) if c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<SyntaxKind> {
        lex(text).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("fun main val x"),
            vec![
                SyntaxKind::FunKw,
                SyntaxKind::Ident,
                SyntaxKind::ValKw,
                SyntaxKind::Ident
            ]
        );
    }

    #[test]
    fn not_is_operator() {
        assert_eq!(
            kinds("x !is int"),
            vec![SyntaxKind::Ident, SyntaxKind::NotIsKw, SyntaxKind::Ident]
        );
        // `!island` is a negation of an identifier, not the operator.
        assert_eq!(
            kinds("!island"),
            vec![SyntaxKind::Bang, SyntaxKind::Ident]
        );
    }

    #[test]
    fn punctuation_maximal_munch() {
        assert_eq!(
            kinds("?? <=> >>= <<"),
            vec![
                SyntaxKind::QuestionQuestion,
                SyntaxKind::Spaceship,
                SyntaxKind::ShrEq,
                SyntaxKind::Shl
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a // line\nb /* block */ c"),
            vec![SyntaxKind::Ident, SyntaxKind::Ident, SyntaxKind::Ident]
        );
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (tokens, errors) = lex("\"abc");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, SyntaxKind::StringLit);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated"));
    }
}
