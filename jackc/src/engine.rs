/// Grammar-directed translation of Jack source into VM code.
///
/// The engine walks the Jack grammar by recursive descent and emits VM
/// instructions as each construct is recognized — there is no AST and no
/// backtracking, only the single token of lookahead the [`Peekable`] token
/// stream provides. Declarations mutate the [`SymbolTable`]; expressions and
/// statements drive the [`VmWriter`]. One engine instance compiles exactly
/// one class.
use std::io::{self, Write};
use std::iter::Peekable;

use core::fmt;

use log::debug;

use crate::symbols::{Kind, SymbolTable};
use crate::token::{Keyword, Token, TokenKind};
use crate::vm::{ArithmeticOp, Segment, VmWriter};

#[derive(Debug)]
pub enum CompileError {
    /// The token stream ended inside a construct.
    UnexpectedEndOfInput,
    /// The current token cannot continue the grammar rule being compiled.
    UnexpectedToken {
        expected: &'static str,
        found: String,
        line: usize,
    },
    /// An identifier used as a plain value or assignment target resolves in
    /// neither scope. (An unresolvable *call qualifier* is a class name, not
    /// an error.)
    UnresolvedIdentifier { name: String, line: usize },
    /// The output sink failed.
    Io(io::Error),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEndOfInput => {
                write!(f, "unexpected end of input")
            }
            Self::UnexpectedToken {
                expected,
                found,
                line,
            } => {
                write!(f, "expected {expected}, found {found} on line {line}")
            }
            Self::UnresolvedIdentifier { name, line } => {
                write!(f, "unresolved identifier `{name}` on line {line}")
            }
            Self::Io(err) => write!(f, "output error: {err}"),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for CompileError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Single-pass compiler for one Jack class.
pub struct CompilationEngine<I: Iterator<Item = Token>, W: Write> {
    tokens: Peekable<I>,
    symbols: SymbolTable,
    writer: VmWriter<W>,
    class_name: String,
    /// Monotone counters used only to manufacture unique label names; owned
    /// by this engine instance, never shared.
    if_counter: usize,
    while_counter: usize,
}

impl<I: Iterator<Item = Token>, W: Write> CompilationEngine<I, W> {
    pub fn new(tokens: I, out: W) -> Self {
        Self {
            tokens: tokens.peekable(),
            symbols: SymbolTable::new(),
            writer: VmWriter::new(out),
            class_name: String::new(),
            if_counter: 0,
            while_counter: 0,
        }
    }

    /// Releases the writer once compilation of the unit is done.
    pub fn into_writer(self) -> VmWriter<W> {
        self.writer
    }

    // ── token helpers ──────────────────────────────────────────────

    fn advance(&mut self) -> Result<Token, CompileError> {
        self.tokens.next().ok_or(CompileError::UnexpectedEndOfInput)
    }

    fn peek(&mut self) -> Option<&TokenKind> {
        self.tokens.peek().map(|tok| &tok.kind)
    }

    fn peek_symbol(&mut self, symbol: char) -> bool {
        matches!(self.peek(), Some(TokenKind::Symbol(c)) if *c == symbol)
    }

    fn peek_keyword(&mut self, keyword: Keyword) -> bool {
        matches!(self.peek(), Some(TokenKind::Keyword(kw)) if *kw == keyword)
    }

    fn unexpected(expected: &'static str, token: Token) -> CompileError {
        CompileError::UnexpectedToken {
            expected,
            found: token.kind.to_string(),
            line: token.line,
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), CompileError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Symbol(c) if c == symbol => Ok(()),
            _ => Err(CompileError::UnexpectedToken {
                expected: symbol_name(symbol),
                found: tok.kind.to_string(),
                line: tok.line,
            }),
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), CompileError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Keyword(kw) if kw == keyword => Ok(()),
            _ => Err(CompileError::UnexpectedToken {
                expected: keyword.as_str(),
                found: tok.kind.to_string(),
                line: tok.line,
            }),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, CompileError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Identifier(name) => Ok(name),
            _ => Err(Self::unexpected("an identifier", tok)),
        }
    }

    /// Resolves a plain variable reference to its segment and slot.
    fn resolve(&self, name: &str, line: usize) -> Result<(Segment, u16), CompileError> {
        match self.symbols.get(name) {
            Some(sym) => Ok((sym.kind.into(), sym.index)),
            None => Err(CompileError::UnresolvedIdentifier {
                name: name.to_string(),
                line,
            }),
        }
    }

    // ── program structure ──────────────────────────────────────────

    /// `class` Identifier `{` classVarDec* subroutineDec* `}`
    ///
    /// Entry point; must be called exactly once per engine instance.
    pub fn compile_class(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Class)?;
        self.class_name = self.expect_identifier()?;
        debug!("compiling class {}", self.class_name);
        self.expect_symbol('{')?;
        while matches!(
            self.peek(),
            Some(TokenKind::Keyword(Keyword::Static | Keyword::Field))
        ) {
            self.compile_class_var_dec()?;
        }
        while matches!(
            self.peek(),
            Some(TokenKind::Keyword(
                Keyword::Constructor | Keyword::Function | Keyword::Method
            ))
        ) {
            self.compile_subroutine()?;
        }
        self.expect_symbol('}')
    }

    /// (`static`|`field`) Type Identifier (`,` Identifier)* `;`
    fn compile_class_var_dec(&mut self) -> Result<(), CompileError> {
        let tok = self.advance()?;
        let kind = match tok.kind {
            TokenKind::Keyword(Keyword::Static) => Kind::Static,
            TokenKind::Keyword(Keyword::Field) => Kind::Field,
            _ => return Err(Self::unexpected("`static` or `field`", tok)),
        };
        let ty = self.compile_type()?;
        loop {
            let name = self.expect_identifier()?;
            self.symbols.define(name, ty.clone(), kind);
            if self.peek_symbol(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect_symbol(';')
    }

    /// `int` | `char` | `boolean` | class name.
    fn compile_type(&mut self) -> Result<String, CompileError> {
        let tok = self.advance()?;
        match tok.kind {
            TokenKind::Keyword(
                kw @ (Keyword::Int | Keyword::Char | Keyword::Boolean),
            ) => Ok(kw.as_str().to_string()),
            TokenKind::Identifier(name) => Ok(name),
            _ => Err(Self::unexpected("a type", tok)),
        }
    }

    /// (`constructor`|`function`|`method`) (Type|`void`) Identifier
    /// `(` parameterList `)` `{` varDec* statements `}`
    ///
    /// The `function` prologue for the three subroutine kinds differs only
    /// in how `this` gets bound: methods load it from the implicit receiver
    /// in `argument 0`, constructors allocate it, functions never bind it.
    fn compile_subroutine(&mut self) -> Result<(), CompileError> {
        let tok = self.advance()?;
        let kind = match tok.kind {
            TokenKind::Keyword(
                kw @ (Keyword::Constructor | Keyword::Function | Keyword::Method),
            ) => kw,
            _ => {
                return Err(Self::unexpected(
                    "`constructor`, `function` or `method`",
                    tok,
                ));
            }
        };
        // Return type; `void` or a type. Unused beyond consuming the token:
        // every call site discards or uses the stack value uniformly.
        if self.peek_keyword(Keyword::Void) {
            self.advance()?;
        } else {
            self.compile_type()?;
        }
        let name = self.expect_identifier()?;
        debug!("compiling {} {}.{}", kind.as_str(), self.class_name, name);

        self.symbols.start_subroutine();
        self.expect_symbol('(')?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;
        self.expect_symbol('{')?;
        while self.peek_keyword(Keyword::Var) {
            self.compile_var_dec()?;
        }

        let locals = self.symbols.var_count(Kind::Local);
        let full_name = format!("{}.{}", self.class_name, name);
        self.writer.write_function(&full_name, locals)?;
        match kind {
            Keyword::Method => {
                self.writer.write_push(Segment::Argument, 0)?;
                self.writer.write_pop(Segment::Pointer, 0)?;
            }
            Keyword::Constructor => {
                let fields = self.symbols.var_count(Kind::Field);
                self.writer.write_push(Segment::Constant, fields)?;
                self.writer.write_call("Memory.alloc", 1)?;
                self.writer.write_pop(Segment::Pointer, 0)?;
            }
            _ => {}
        }

        self.compile_statements()?;
        self.expect_symbol('}')
    }

    /// (Type Identifier (`,` Type Identifier)*)? — possibly empty.
    ///
    /// Declared parameters start at argument slot 0; the implicit method
    /// receiver is never entered in the symbol table (it is bound by the
    /// `argument 0` / `pointer 0` prologue alone).
    fn compile_parameter_list(&mut self) -> Result<(), CompileError> {
        if self.peek_symbol(')') {
            return Ok(());
        }
        loop {
            let ty = self.compile_type()?;
            let name = self.expect_identifier()?;
            self.symbols.define(name, ty, Kind::Argument);
            if self.peek_symbol(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// `var` Type Identifier (`,` Identifier)* `;`
    fn compile_var_dec(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Var)?;
        let ty = self.compile_type()?;
        loop {
            let name = self.expect_identifier()?;
            self.symbols.define(name, ty.clone(), Kind::Local);
            if self.peek_symbol(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect_symbol(';')
    }

    // ── statements ─────────────────────────────────────────────────

    fn compile_statements(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(TokenKind::Keyword(Keyword::Let)) => self.compile_let()?,
                Some(TokenKind::Keyword(Keyword::If)) => self.compile_if()?,
                Some(TokenKind::Keyword(Keyword::While)) => {
                    self.compile_while()?
                }
                Some(TokenKind::Keyword(Keyword::Do)) => self.compile_do()?,
                Some(TokenKind::Keyword(Keyword::Return)) => {
                    self.compile_return()?
                }
                _ => return Ok(()),
            }
        }
    }

    /// `let` Identifier (`[` expr `]`)? `=` expr `;`
    fn compile_let(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Let)?;
        let tok = self.advance()?;
        let line = tok.line;
        let name = match tok.kind {
            TokenKind::Identifier(name) => name,
            _ => return Err(Self::unexpected("an identifier", tok)),
        };
        let (segment, index) = self.resolve(&name, line)?;

        if self.peek_symbol('[') {
            // The element address must be fully computed and parked before
            // the RHS runs: the RHS may itself index arrays and clobber
            // `pointer 1`.
            self.advance()?;
            self.compile_expression()?;
            self.expect_symbol(']')?;
            self.writer.write_push(segment, index)?;
            self.writer.write_arithmetic(ArithmeticOp::Add)?;
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            self.writer.write_pop(Segment::Temp, 0)?;
            self.writer.write_pop(Segment::Pointer, 1)?;
            self.writer.write_push(Segment::Temp, 0)?;
            self.writer.write_pop(Segment::That, 0)?;
        } else {
            self.expect_symbol('=')?;
            self.compile_expression()?;
            self.expect_symbol(';')?;
            self.writer.write_pop(segment, index)?;
        }
        Ok(())
    }

    /// `if` `(` expr `)` `{` statements `}` (`else` `{` statements `}`)?
    fn compile_if(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::If)?;
        // Take the number before recursing so nested ifs cannot collide.
        let n = self.if_counter;
        self.if_counter += 1;
        let false_label = format!("IF_FALSE{n}");
        let end_label = format!("IF_END{n}");

        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.writer.write_arithmetic(ArithmeticOp::Not)?;
        self.writer.write_if(&false_label)?;

        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.writer.write_goto(&end_label)?;
        self.writer.write_label(&false_label)?;

        if self.peek_keyword(Keyword::Else) {
            self.advance()?;
            self.expect_symbol('{')?;
            self.compile_statements()?;
            self.expect_symbol('}')?;
        }
        self.writer.write_label(&end_label)?;
        Ok(())
    }

    /// `while` `(` expr `)` `{` statements `}`
    fn compile_while(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::While)?;
        let n = self.while_counter;
        self.while_counter += 1;
        let exp_label = format!("WHILE_EXP{n}");
        let end_label = format!("WHILE_END{n}");

        self.writer.write_label(&exp_label)?;
        self.expect_symbol('(')?;
        self.compile_expression()?;
        self.expect_symbol(')')?;
        self.writer.write_arithmetic(ArithmeticOp::Not)?;
        self.writer.write_if(&end_label)?;

        self.expect_symbol('{')?;
        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.writer.write_goto(&exp_label)?;
        self.writer.write_label(&end_label)?;
        Ok(())
    }

    /// `do` subroutineCall `;` — the call's result is always discarded.
    fn compile_do(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Do)?;
        let name = self.expect_identifier()?;
        self.compile_subroutine_call(name)?;
        self.expect_symbol(';')?;
        self.writer.write_pop(Segment::Temp, 0)?;
        Ok(())
    }

    /// `return` expr? `;` — void subroutines still return a value (0).
    fn compile_return(&mut self) -> Result<(), CompileError> {
        self.expect_keyword(Keyword::Return)?;
        if self.peek_symbol(';') {
            self.writer.write_push(Segment::Constant, 0)?;
        } else {
            self.compile_expression()?;
        }
        self.expect_symbol(';')?;
        self.writer.write_return()?;
        Ok(())
    }

    // ── expressions ────────────────────────────────────────────────

    /// term (binaryOp term)* — strictly left-associative, no precedence:
    /// `a + b * c` compiles as `(a + b) * c`. Jack's rule, not an oversight.
    fn compile_expression(&mut self) -> Result<(), CompileError> {
        self.compile_term()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Symbol(c)) if is_binary_op(*c) => *c,
                _ => break,
            };
            self.advance()?;
            self.compile_term()?;
            match op {
                // `*` and `/` have no VM opcode; lower them to OS calls.
                '*' => self.writer.write_call("Math.multiply", 2)?,
                '/' => self.writer.write_call("Math.divide", 2)?,
                '+' => self.writer.write_arithmetic(ArithmeticOp::Add)?,
                '-' => self.writer.write_arithmetic(ArithmeticOp::Sub)?,
                '&' => self.writer.write_arithmetic(ArithmeticOp::And)?,
                '|' => self.writer.write_arithmetic(ArithmeticOp::Or)?,
                '<' => self.writer.write_arithmetic(ArithmeticOp::Lt)?,
                '>' => self.writer.write_arithmetic(ArithmeticOp::Gt)?,
                '=' => self.writer.write_arithmetic(ArithmeticOp::Eq)?,
                _ => unreachable!("is_binary_op covers the operator set"),
            }
        }
        Ok(())
    }

    fn compile_term(&mut self) -> Result<(), CompileError> {
        let Token { kind, line } = self.advance()?;
        match kind {
            TokenKind::IntConst(value) => {
                self.writer.write_push(Segment::Constant, value)?;
            }
            TokenKind::StringConst(text) => {
                // Built at runtime, one appendChar per character; the String
                // object stays on top of the stack throughout.
                self.writer
                    .write_push(Segment::Constant, text.len() as u16)?;
                self.writer.write_call("String.new", 1)?;
                for ch in text.chars() {
                    self.writer.write_push(Segment::Constant, ch as u16)?;
                    self.writer.write_call("String.appendChar", 2)?;
                }
            }
            TokenKind::Keyword(Keyword::True) => {
                // All-ones word.
                self.writer.write_push(Segment::Constant, 0)?;
                self.writer.write_arithmetic(ArithmeticOp::Not)?;
            }
            TokenKind::Keyword(Keyword::False | Keyword::Null) => {
                self.writer.write_push(Segment::Constant, 0)?;
            }
            TokenKind::Keyword(Keyword::This) => {
                self.writer.write_push(Segment::Pointer, 0)?;
            }
            TokenKind::Symbol('(') => {
                self.compile_expression()?;
                self.expect_symbol(')')?;
            }
            TokenKind::Symbol('-') => {
                self.compile_term()?;
                self.writer.write_arithmetic(ArithmeticOp::Neg)?;
            }
            TokenKind::Symbol('~') => {
                self.compile_term()?;
                self.writer.write_arithmetic(ArithmeticOp::Not)?;
            }
            TokenKind::Symbol('^') => {
                self.compile_term()?;
                self.writer.write_arithmetic(ArithmeticOp::ShiftLeft)?;
            }
            TokenKind::Symbol('#') => {
                self.compile_term()?;
                self.writer.write_arithmetic(ArithmeticOp::ShiftRight)?;
            }
            TokenKind::Identifier(name) => {
                if self.peek_symbol('[') {
                    self.advance()?;
                    self.compile_expression()?;
                    self.expect_symbol(']')?;
                    let (segment, index) = self.resolve(&name, line)?;
                    self.writer.write_push(segment, index)?;
                    self.writer.write_arithmetic(ArithmeticOp::Add)?;
                    self.writer.write_pop(Segment::Pointer, 1)?;
                    self.writer.write_push(Segment::That, 0)?;
                } else if self.peek_symbol('(') || self.peek_symbol('.') {
                    self.compile_subroutine_call(name)?;
                } else {
                    let (segment, index) = self.resolve(&name, line)?;
                    self.writer.write_push(segment, index)?;
                }
            }
            other => {
                return Err(CompileError::UnexpectedToken {
                    expected: "a term",
                    found: other.to_string(),
                    line,
                });
            }
        }
        Ok(())
    }

    /// Compiles a subroutine call whose leading identifier has already been
    /// consumed.
    ///
    /// This is the one place identifier *kind* shapes code, not just
    /// storage: a qualifier that resolves in the symbol table is a receiver
    /// variable (method call, callee named after its declared type), an
    /// unresolvable qualifier is a class name (plain call, no receiver). A
    /// bare `name(…)` always targets the current object.
    fn compile_subroutine_call(&mut self, first: String) -> Result<(), CompileError> {
        let (callee, receiver_args) = if self.peek_symbol('.') {
            self.advance()?;
            let member = self.expect_identifier()?;
            match self.symbols.get(&first) {
                Some(sym) => {
                    let segment: Segment = sym.kind.into();
                    let index = sym.index;
                    let ty = sym.ty.clone();
                    self.writer.write_push(segment, index)?;
                    (format!("{ty}.{member}"), 1)
                }
                None => (format!("{first}.{member}"), 0),
            }
        } else {
            self.writer.write_push(Segment::Pointer, 0)?;
            (format!("{}.{}", self.class_name, first), 1)
        };

        self.expect_symbol('(')?;
        let args = receiver_args + self.compile_expression_list()?;
        self.expect_symbol(')')?;
        self.writer.write_call(&callee, args)?;
        Ok(())
    }

    /// (expr (`,` expr)*)? — returns the number of expressions compiled.
    fn compile_expression_list(&mut self) -> Result<u16, CompileError> {
        if self.peek_symbol(')') {
            return Ok(0);
        }
        let mut count = 0;
        loop {
            self.compile_expression()?;
            count += 1;
            if self.peek_symbol(',') {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(count)
    }
}

fn is_binary_op(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '&' | '|' | '<' | '>' | '=')
}

fn symbol_name(symbol: char) -> &'static str {
    match symbol {
        '{' => "`{`",
        '}' => "`}`",
        '(' => "`(`",
        ')' => "`)`",
        '[' => "`[`",
        ']' => "`]`",
        '.' => "`.`",
        ',' => "`,`",
        ';' => "`;`",
        '=' => "`=`",
        _ => "a symbol",
    }
}
