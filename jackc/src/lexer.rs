/// Lexer for Jack source text.
///
/// The [`Lexer`] walks the source bytes and implements [`Iterator`] over
/// [`Token`]s, tracking the line each token starts on. Whitespace and both
/// comment forms (`// …` and `/* … */`, including `/** … */` doc comments)
/// are consumed silently; the downstream compilation engine only ever sees
/// the five semantic token classes.
///
/// Jack is an ASCII language: any byte that does not start an identifier,
/// integer, or string constant lexes as a one-character [`TokenKind::Symbol`].
/// The engine rejects symbols the grammar does not expect, so the lexer
/// itself never fails.
use crate::token::{Keyword, Token, TokenKind};

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    /// Current line (1-based).
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn from_str(source: &'a str) -> Self {
        Self {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<u8> {
        self.src.get(self.pos + n).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
        }
        Some(byte)
    }

    /// Consume whitespace and comments until the next token byte.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_ahead(1) == Some(b'/') => {
                    while let Some(b) = self.advance() {
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                Some(b'/') if self.peek_ahead(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    while let Some(b) = self.advance() {
                        if b == b'*' && self.peek() == Some(b'/') {
                            self.advance();
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_int(&mut self) -> TokenKind {
        let mut value: u32 = 0;
        while let Some(b) = self.peek() {
            if !b.is_ascii_digit() {
                break;
            }
            value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            self.advance();
        }
        TokenKind::IntConst(value.min(u32::from(u16::MAX)) as u16)
    }

    fn lex_string(&mut self) -> TokenKind {
        // Opening quote already peeked; Jack strings have no escapes and
        // may not span lines.
        self.advance();
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'"' {
                break;
            }
            self.advance();
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.advance(); // closing quote
        TokenKind::StringConst(text)
    }

    fn lex_word(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !(b.is_ascii_alphanumeric() || b == b'_') {
                break;
            }
            self.advance();
        }
        let word = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        match Keyword::from_ident(&word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(word),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.skip_trivia();
        let line = self.line;
        let byte = self.peek()?;
        let kind = if byte.is_ascii_digit() {
            self.lex_int()
        } else if byte == b'"' {
            self.lex_string()
        } else if byte.is_ascii_alphabetic() || byte == b'_' {
            self.lex_word()
        } else {
            self.advance();
            TokenKind::Symbol(byte as char)
        };
        Some(Token::new(kind, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenKind> {
        Lexer::from_str(src).map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(lex("class Main"), vec![
            TokenKind::Keyword(Keyword::Class),
            TokenKind::Identifier("Main".to_string()),
        ]);
    }

    #[test]
    fn underscore_starts_identifier() {
        assert_eq!(
            lex("_tmp1"),
            vec![TokenKind::Identifier("_tmp1".to_string())]
        );
    }

    #[test]
    fn keyword_prefix_is_identifier() {
        assert_eq!(
            lex("classes"),
            vec![TokenKind::Identifier("classes".to_string())]
        );
    }

    #[test]
    fn symbols() {
        assert_eq!(lex("{ } ( ) [ ] . , ; + - * / & | < > = ~ ^ #"), vec![
            TokenKind::Symbol('{'),
            TokenKind::Symbol('}'),
            TokenKind::Symbol('('),
            TokenKind::Symbol(')'),
            TokenKind::Symbol('['),
            TokenKind::Symbol(']'),
            TokenKind::Symbol('.'),
            TokenKind::Symbol(','),
            TokenKind::Symbol(';'),
            TokenKind::Symbol('+'),
            TokenKind::Symbol('-'),
            TokenKind::Symbol('*'),
            TokenKind::Symbol('/'),
            TokenKind::Symbol('&'),
            TokenKind::Symbol('|'),
            TokenKind::Symbol('<'),
            TokenKind::Symbol('>'),
            TokenKind::Symbol('='),
            TokenKind::Symbol('~'),
            TokenKind::Symbol('^'),
            TokenKind::Symbol('#'),
        ]);
    }

    #[test]
    fn integer_constant() {
        assert_eq!(lex("32767"), vec![TokenKind::IntConst(32767)]);
        assert_eq!(lex("0"), vec![TokenKind::IntConst(0)]);
    }

    #[test]
    fn integer_adjacent_to_symbol() {
        assert_eq!(lex("x[3]"), vec![
            TokenKind::Identifier("x".to_string()),
            TokenKind::Symbol('['),
            TokenKind::IntConst(3),
            TokenKind::Symbol(']'),
        ]);
    }

    #[test]
    fn string_constant() {
        assert_eq!(
            lex(r#""hello world""#),
            vec![TokenKind::StringConst("hello world".to_string())]
        );
    }

    #[test]
    fn empty_string_constant() {
        assert_eq!(
            lex(r#""""#),
            vec![TokenKind::StringConst(String::new())]
        );
    }

    #[test]
    fn line_comment_skipped() {
        assert_eq!(lex("let // the rest\n x"), vec![
            TokenKind::Keyword(Keyword::Let),
            TokenKind::Identifier("x".to_string()),
        ]);
    }

    #[test]
    fn block_comment_skipped() {
        assert_eq!(lex("let /* a\nb */ x"), vec![
            TokenKind::Keyword(Keyword::Let),
            TokenKind::Identifier("x".to_string()),
        ]);
    }

    #[test]
    fn doc_comment_skipped() {
        assert_eq!(lex("/** api doc */ class"), vec![TokenKind::Keyword(
            Keyword::Class
        )]);
    }

    #[test]
    fn slash_is_still_an_operator() {
        assert_eq!(lex("a / b"), vec![
            TokenKind::Identifier("a".to_string()),
            TokenKind::Symbol('/'),
            TokenKind::Identifier("b".to_string()),
        ]);
    }

    #[test]
    fn line_tracking() {
        let tokens: Vec<Token> = Lexer::from_str("class\n\nMain").collect();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn empty_input() {
        assert!(lex("").is_empty());
        assert!(lex("  // only trivia\n/* here */").is_empty());
    }
}
