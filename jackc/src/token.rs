/// Token types produced by the Jack lexer.
use core::fmt;

/// A reserved word of the Jack language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Class,
    Constructor,
    Function,
    Method,
    Field,
    Static,
    Var,
    Int,
    Char,
    Boolean,
    Void,
    True,
    False,
    Null,
    This,
    Let,
    Do,
    If,
    Else,
    While,
    Return,
}

impl Keyword {
    /// Looks up a reserved word; `None` means the word is an identifier.
    pub fn from_ident(word: &str) -> Option<Self> {
        let kw = match word {
            "class" => Self::Class,
            "constructor" => Self::Constructor,
            "function" => Self::Function,
            "method" => Self::Method,
            "field" => Self::Field,
            "static" => Self::Static,
            "var" => Self::Var,
            "int" => Self::Int,
            "char" => Self::Char,
            "boolean" => Self::Boolean,
            "void" => Self::Void,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "this" => Self::This,
            "let" => Self::Let,
            "do" => Self::Do,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "return" => Self::Return,
            _ => return None,
        };
        Some(kw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Constructor => "constructor",
            Self::Function => "function",
            Self::Method => "method",
            Self::Field => "field",
            Self::Static => "static",
            Self::Var => "var",
            Self::Int => "int",
            Self::Char => "char",
            Self::Boolean => "boolean",
            Self::Void => "void",
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::This => "this",
            Self::Let => "let",
            Self::Do => "do",
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::Return => "return",
        }
    }
}

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// A reserved word, e.g. `class`, `let`, `true`.
    Keyword(Keyword),
    /// A single-character symbol, e.g. `{`, `;`, `+`.
    Symbol(char),
    /// A decimal integer constant in `0..=32767`, e.g. `42`.
    IntConst(u16),
    /// A string constant (contents without surrounding quotes).
    StringConst(String),
    /// An identifier, e.g. `Main`, `count`, `_tmp`.
    Identifier(String),
}

impl TokenKind {
    /// Human-readable class name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyword(_) => "keyword",
            Self::Symbol(_) => "symbol",
            Self::IntConst(_) => "integer constant",
            Self::StringConst(_) => "string constant",
            Self::Identifier(_) => "identifier",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(kw) => write!(f, "`{}`", kw.as_str()),
            Self::Symbol(c) => write!(f, "`{c}`"),
            Self::IntConst(v) => write!(f, "{v}"),
            Self::StringConst(s) => write!(f, "\"{s}\""),
            Self::Identifier(name) => write!(f, "`{name}`"),
        }
    }
}

/// A token with the source line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }
}
