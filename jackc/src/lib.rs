//! # jackc
//!
//! A single-pass compiler front end for the Jack object-oriented language.
//! Parsing and code generation are interleaved: the engine recognizes each
//! grammar construct and immediately emits stack-machine VM code for it,
//! with no AST stage and no backtracking.
//!
//! ## Architecture
//!
//! ```text
//!  .jack source (&str)
//!      │
//!      ▼
//!  ┌───────┐   Token stream    ┌───────────────────┐   VM code lines
//!  │ Lexer │ ────────────────▶ │ CompilationEngine │ ────────────────▶ impl Write
//!  └───────┘  (impl Iterator)  │  + SymbolTable    │   (via VmWriter)
//!                              └───────────────────┘
//! ```
//!
//! ```rust
//! use jackc::{CompilationEngine, Lexer};
//!
//! let source = "class Main { function void main() { return; } }";
//! let mut engine = CompilationEngine::new(Lexer::from_str(source), Vec::new());
//! engine.compile_class().expect("compile error");
//!
//! let vm_code = String::from_utf8(engine.into_writer().into_inner()).unwrap();
//! assert!(vm_code.starts_with("function Main.main 0"));
//! ```
//!
//! The engine is generic over any `Iterator<Item = Token>`, so it can be
//! driven by a scripted token sequence in tests just as well as by the
//! [`Lexer`].

pub mod engine;
pub mod lexer;
pub mod symbols;
pub mod token;
pub mod vm;

pub use engine::{CompilationEngine, CompileError};
pub use lexer::Lexer;
pub use symbols::{Kind, Symbol, SymbolTable};
pub use token::{Keyword, Token, TokenKind};
pub use vm::{ArithmeticOp, Segment, VmInstruction, VmWriter};
