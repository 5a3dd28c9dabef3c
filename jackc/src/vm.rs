/// VM instruction model and line-oriented emitter.
///
/// [`VmInstruction`] is the tagged form of one stack-machine instruction;
/// its [`Display`](core::fmt::Display) impl is the single definition of the
/// textual `op arg1 [arg2]` grammar. [`VmWriter`] owns the output sink and
/// appends exactly one rendered line per emitted instruction — it does no
/// buffering and no validation beyond each tag's fixed arity.
use core::fmt;
use std::io::{self, Write};

use crate::symbols::Kind;

/// An addressable storage region of the target stack machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Argument => "argument",
            Self::Local => "local",
            Self::Static => "static",
            Self::This => "this",
            Self::That => "that",
            Self::Pointer => "pointer",
            Self::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed mapping from storage class to VM segment. This is the only place
/// the two vocabularies meet; the symbol table itself knows nothing about
/// segments.
impl From<Kind> for Segment {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Static => Self::Static,
            Kind::Field => Self::This,
            Kind::Argument => Self::Argument,
            Kind::Local => Self::Local,
        }
    }
}

/// A VM arithmetic/logic opcode, unary and binary alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
    ShiftLeft,
    ShiftRight,
}

impl ArithmeticOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::ShiftLeft => "shiftleft",
            Self::ShiftRight => "shiftright",
        }
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stack-machine instruction, write-once and emitted in program order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmInstruction {
    Push { segment: Segment, index: u16 },
    Pop { segment: Segment, index: u16 },
    Arithmetic(ArithmeticOp),
    Label(String),
    Goto(String),
    IfGoto(String),
    Call { name: String, args: u16 },
    Function { name: String, locals: u16 },
    Return,
}

impl fmt::Display for VmInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push { segment, index } => write!(f, "push {segment} {index}"),
            Self::Pop { segment, index } => write!(f, "pop {segment} {index}"),
            Self::Arithmetic(op) => write!(f, "{op}"),
            Self::Label(name) => write!(f, "label {name}"),
            Self::Goto(name) => write!(f, "goto {name}"),
            Self::IfGoto(name) => write!(f, "if-goto {name}"),
            Self::Call { name, args } => write!(f, "call {name} {args}"),
            Self::Function { name, locals } => {
                write!(f, "function {name} {locals}")
            }
            Self::Return => write!(f, "return"),
        }
    }
}

/// Renders instructions into an output sink, one line each.
///
/// The writer exclusively owns the sink for the lifetime of one compilation
/// unit; nothing else writes to it.
pub struct VmWriter<W: Write> {
    out: W,
}

impl<W: Write> VmWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Releases the sink (used by callers that need to flush or inspect it).
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn emit(&mut self, instruction: VmInstruction) -> io::Result<()> {
        writeln!(self.out, "{instruction}")
    }

    /// `push <segment> <index>`
    pub fn write_push(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        self.emit(VmInstruction::Push { segment, index })
    }

    /// `pop <segment> <index>`
    pub fn write_pop(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        self.emit(VmInstruction::Pop { segment, index })
    }

    /// A bare arithmetic/logic opcode line.
    pub fn write_arithmetic(&mut self, op: ArithmeticOp) -> io::Result<()> {
        self.emit(VmInstruction::Arithmetic(op))
    }

    /// `label <name>`
    pub fn write_label(&mut self, name: &str) -> io::Result<()> {
        self.emit(VmInstruction::Label(name.to_string()))
    }

    /// `goto <name>`
    pub fn write_goto(&mut self, name: &str) -> io::Result<()> {
        self.emit(VmInstruction::Goto(name.to_string()))
    }

    /// `if-goto <name>` — jump if the popped value is non-zero.
    pub fn write_if(&mut self, name: &str) -> io::Result<()> {
        self.emit(VmInstruction::IfGoto(name.to_string()))
    }

    /// `call <name> <args>`
    pub fn write_call(&mut self, name: &str, args: u16) -> io::Result<()> {
        self.emit(VmInstruction::Call {
            name: name.to_string(),
            args,
        })
    }

    /// `function <name> <locals>`
    pub fn write_function(&mut self, name: &str, locals: u16) -> io::Result<()> {
        self.emit(VmInstruction::Function {
            name: name.to_string(),
            locals,
        })
    }

    /// `return`
    pub fn write_return(&mut self) -> io::Result<()> {
        self.emit(VmInstruction::Return)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_instructions() {
        assert_eq!(
            VmInstruction::Push {
                segment: Segment::Constant,
                index: 7
            }
            .to_string(),
            "push constant 7"
        );
        assert_eq!(
            VmInstruction::Pop {
                segment: Segment::That,
                index: 0
            }
            .to_string(),
            "pop that 0"
        );
        assert_eq!(
            VmInstruction::Arithmetic(ArithmeticOp::ShiftLeft).to_string(),
            "shiftleft"
        );
        assert_eq!(
            VmInstruction::IfGoto("WHILE_END0".to_string()).to_string(),
            "if-goto WHILE_END0"
        );
        assert_eq!(
            VmInstruction::Call {
                name: "Math.multiply".to_string(),
                args: 2
            }
            .to_string(),
            "call Math.multiply 2"
        );
        assert_eq!(
            VmInstruction::Function {
                name: "Main.main".to_string(),
                locals: 3
            }
            .to_string(),
            "function Main.main 3"
        );
        assert_eq!(VmInstruction::Return.to_string(), "return");
    }

    #[test]
    fn kind_to_segment_mapping_is_fixed() {
        assert_eq!(Segment::from(Kind::Static), Segment::Static);
        assert_eq!(Segment::from(Kind::Field), Segment::This);
        assert_eq!(Segment::from(Kind::Argument), Segment::Argument);
        assert_eq!(Segment::from(Kind::Local), Segment::Local);
    }

    #[test]
    fn writer_appends_one_line_per_instruction() {
        let mut writer = VmWriter::new(Vec::new());
        writer.write_function("Main.main", 0).unwrap();
        writer.write_push(Segment::Constant, 1).unwrap();
        writer.write_push(Segment::Constant, 2).unwrap();
        writer.write_arithmetic(ArithmeticOp::Add).unwrap();
        writer.write_label("IF_FALSE0").unwrap();
        writer.write_goto("IF_END0").unwrap();
        writer.write_return().unwrap();

        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(
            text,
            "function Main.main 0\n\
             push constant 1\n\
             push constant 2\n\
             add\n\
             label IF_FALSE0\n\
             goto IF_END0\n\
             return\n"
        );
    }
}
