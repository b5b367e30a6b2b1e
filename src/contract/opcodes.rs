//! Instruction set
//!
//! Defines the opcodes programs are lowered to, their immediates, stack
//! effects and the first version each is available in, plus the textual
//! listing form that is the compiled artifact.

use crate::contract::fields::{GlobalField, TxnField};
use crate::core::state::readable_bytes;
use std::fmt;

/// Lowest program version accepted
pub const MIN_PROGRAM_VERSION: u8 = 1;

/// Highest program version accepted
pub const MAX_PROGRAM_VERSION: u8 = 8;

/// Opcodes for the program VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // Constants and context
    /// Push an integer constant
    Int,
    /// Push a byte-string constant
    Byte,
    /// Push a field of the current transaction
    Txn,
    /// Push a field of a group member
    Gtxn,
    /// Push a global field
    Global,

    // Comparison
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Logic
    And,
    Or,
    Not,

    // Byte strings
    Len,
    Itob,
    Btoi,
    Concat,

    // Stack
    Pop,
    Dup,

    // Control flow
    /// Branch if top of stack is non-zero
    Bnz,
    /// Branch if top of stack is zero
    Bz,
    /// Unconditional branch
    B,
    /// Fail immediately
    Err,
    /// End the program, approving if top of stack is non-zero
    Return,

    // Events
    Log,

    // State
    AppGlobalGet,
    AppGlobalGetEx,
    AppGlobalPut,
    AppLocalGet,
    AppLocalGetEx,
    AppLocalPut,
}

/// Kind of immediate operand an opcode takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateKind {
    None,
    Uint,
    Bytes,
    TxnField,
    GroupField,
    GlobalField,
    Label,
}

impl OpCode {
    pub const ALL: [OpCode; 37] = [
        OpCode::Int,
        OpCode::Byte,
        OpCode::Txn,
        OpCode::Gtxn,
        OpCode::Global,
        OpCode::Eq,
        OpCode::Neq,
        OpCode::Lt,
        OpCode::Gt,
        OpCode::Le,
        OpCode::Ge,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::And,
        OpCode::Or,
        OpCode::Not,
        OpCode::Len,
        OpCode::Itob,
        OpCode::Btoi,
        OpCode::Concat,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Bnz,
        OpCode::Bz,
        OpCode::B,
        OpCode::Err,
        OpCode::Return,
        OpCode::Log,
        OpCode::AppGlobalGet,
        OpCode::AppGlobalGetEx,
        OpCode::AppGlobalPut,
        OpCode::AppLocalGet,
        OpCode::AppLocalGetEx,
        OpCode::AppLocalPut,
    ];

    /// Get opcode mnemonic
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Int => "int",
            OpCode::Byte => "byte",
            OpCode::Txn => "txn",
            OpCode::Gtxn => "gtxn",
            OpCode::Global => "global",
            OpCode::Eq => "==",
            OpCode::Neq => "!=",
            OpCode::Lt => "<",
            OpCode::Gt => ">",
            OpCode::Le => "<=",
            OpCode::Ge => ">=",
            OpCode::Add => "+",
            OpCode::Sub => "-",
            OpCode::Mul => "*",
            OpCode::Div => "/",
            OpCode::Mod => "%",
            OpCode::And => "&&",
            OpCode::Or => "||",
            OpCode::Not => "!",
            OpCode::Len => "len",
            OpCode::Itob => "itob",
            OpCode::Btoi => "btoi",
            OpCode::Concat => "concat",
            OpCode::Pop => "pop",
            OpCode::Dup => "dup",
            OpCode::Bnz => "bnz",
            OpCode::Bz => "bz",
            OpCode::B => "b",
            OpCode::Err => "err",
            OpCode::Return => "return",
            OpCode::Log => "log",
            OpCode::AppGlobalGet => "app_global_get",
            OpCode::AppGlobalGetEx => "app_global_get_ex",
            OpCode::AppGlobalPut => "app_global_put",
            OpCode::AppLocalGet => "app_local_get",
            OpCode::AppLocalGetEx => "app_local_get_ex",
            OpCode::AppLocalPut => "app_local_put",
        }
    }

    /// Look up an opcode by mnemonic
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// First program version this opcode may appear in
    pub fn min_version(&self) -> u8 {
        match self {
            OpCode::Concat | OpCode::B | OpCode::Bz | OpCode::Return => 2,
            OpCode::AppGlobalGet
            | OpCode::AppGlobalGetEx
            | OpCode::AppGlobalPut
            | OpCode::AppLocalGet
            | OpCode::AppLocalGetEx
            | OpCode::AppLocalPut => 2,
            OpCode::Log => 5,
            _ => 1,
        }
    }

    /// Values popped and pushed: `(pops, pushes)`
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            OpCode::Int | OpCode::Byte | OpCode::Txn | OpCode::Gtxn | OpCode::Global => (0, 1),
            OpCode::Eq
            | OpCode::Neq
            | OpCode::Lt
            | OpCode::Gt
            | OpCode::Le
            | OpCode::Ge
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::And
            | OpCode::Or
            | OpCode::Concat => (2, 1),
            OpCode::Not | OpCode::Len | OpCode::Itob | OpCode::Btoi => (1, 1),
            OpCode::Pop => (1, 0),
            OpCode::Dup => (1, 2),
            OpCode::Bnz | OpCode::Bz => (1, 0),
            OpCode::B | OpCode::Err => (0, 0),
            OpCode::Return => (1, 0),
            OpCode::Log => (1, 0),
            OpCode::AppGlobalGet => (1, 1),
            OpCode::AppGlobalGetEx => (2, 2),
            OpCode::AppGlobalPut => (2, 0),
            OpCode::AppLocalGet => (2, 1),
            OpCode::AppLocalGetEx => (3, 2),
            OpCode::AppLocalPut => (3, 0),
        }
    }

    /// Immediate operand this opcode expects
    pub fn immediate_kind(&self) -> ImmediateKind {
        match self {
            OpCode::Int => ImmediateKind::Uint,
            OpCode::Byte => ImmediateKind::Bytes,
            OpCode::Txn => ImmediateKind::TxnField,
            OpCode::Gtxn => ImmediateKind::GroupField,
            OpCode::Global => ImmediateKind::GlobalField,
            OpCode::Bnz | OpCode::Bz | OpCode::B => ImmediateKind::Label,
            _ => ImmediateKind::None,
        }
    }

    /// Whether control never continues to the next instruction
    pub fn ends_block(&self) -> bool {
        matches!(self, OpCode::B | OpCode::Err | OpCode::Return)
    }
}

/// Immediate operand of an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Immediate {
    None,
    /// Integer constant, optionally shown by its symbolic name (`int pay`)
    Uint {
        value: u64,
        name: Option<&'static str>,
    },
    Bytes(Vec<u8>),
    Txn(TxnField),
    Gtxn(u8, TxnField),
    Global(GlobalField),
    /// Symbolic jump target
    Label(String),
    /// Resolved jump target (instruction index)
    Target(usize),
}

/// One instruction with its immediate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    pub imm: Immediate,
}

impl Instruction {
    pub fn simple(op: OpCode) -> Self {
        Self {
            op,
            imm: Immediate::None,
        }
    }

    pub fn int(value: u64) -> Self {
        Self {
            op: OpCode::Int,
            imm: Immediate::Uint { value, name: None },
        }
    }

    pub fn named_int(name: &'static str, value: u64) -> Self {
        Self {
            op: OpCode::Int,
            imm: Immediate::Uint {
                value,
                name: Some(name),
            },
        }
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self {
            op: OpCode::Byte,
            imm: Immediate::Bytes(value.into()),
        }
    }

    pub fn txn(field: TxnField) -> Self {
        Self {
            op: OpCode::Txn,
            imm: Immediate::Txn(field),
        }
    }

    pub fn gtxn(index: u8, field: TxnField) -> Self {
        Self {
            op: OpCode::Gtxn,
            imm: Immediate::Gtxn(index, field),
        }
    }

    pub fn global(field: GlobalField) -> Self {
        Self {
            op: OpCode::Global,
            imm: Immediate::Global(field),
        }
    }

    pub fn jump(op: OpCode, label: impl Into<String>) -> Self {
        Self {
            op,
            imm: Immediate::Label(label.into()),
        }
    }

    /// Version this instruction needs, accounting for fields it reads
    pub fn min_version(&self) -> u8 {
        let field_version = match &self.imm {
            Immediate::Txn(field) | Immediate::Gtxn(_, field) => field.min_version(),
            Immediate::Global(field) => field.min_version(),
            _ => 1,
        };
        self.op.min_version().max(field_version)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op.name())?;
        match &self.imm {
            Immediate::None => Ok(()),
            Immediate::Uint {
                name: Some(name), ..
            } => write!(f, " {}", name),
            Immediate::Uint { value, name: None } => write!(f, " {}", value),
            Immediate::Bytes(bytes) => write!(f, " {}", readable_bytes(bytes)),
            Immediate::Txn(field) => write!(f, " {}", field.name()),
            Immediate::Gtxn(index, field) => write!(f, " {} {}", index, field.name()),
            Immediate::Global(field) => write!(f, " {}", field.name()),
            Immediate::Label(label) => write!(f, " {}", label),
            Immediate::Target(index) => write!(f, " @{}", index),
        }
    }
}

/// One line of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Op(Instruction),
    Label(String),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Op(instruction) => write!(f, "{}", instruction),
            Line::Label(name) => write!(f, "{}:", name),
        }
    }
}

/// A versioned program listing: the compiled artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub version: u8,
    pub lines: Vec<Line>,
}

impl Listing {
    /// Number of instructions, labels excluded
    pub fn instruction_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| matches!(line, Line::Op(_)))
            .count()
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#pragma version {}", self.version)?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_name_roundtrip() {
        let opcodes = [
            OpCode::Int,
            OpCode::Eq,
            OpCode::And,
            OpCode::Bnz,
            OpCode::AppGlobalPut,
            OpCode::Log,
        ];

        for op in opcodes {
            assert_eq!(OpCode::from_name(op.name()), Some(op));
        }
        assert_eq!(OpCode::from_name("sstore"), None);
    }

    #[test]
    fn test_instruction_display() {
        assert_eq!(Instruction::int(0).to_string(), "int 0");
        assert_eq!(Instruction::named_int("pay", 1).to_string(), "int pay");
        assert_eq!(Instruction::bytes("Hello").to_string(), "byte \"Hello\"");
        assert_eq!(Instruction::bytes(vec![0xde, 0xad]).to_string(), "byte 0xdead");
        assert_eq!(
            Instruction::gtxn(1, TxnField::TypeEnum).to_string(),
            "gtxn 1 TypeEnum"
        );
        assert_eq!(
            Instruction::jump(OpCode::Bnz, "main_l1").to_string(),
            "bnz main_l1"
        );
    }

    #[test]
    fn test_instruction_version_includes_field() {
        assert_eq!(Instruction::txn(TxnField::Sender).min_version(), 1);
        assert_eq!(Instruction::txn(TxnField::ApplicationId).min_version(), 2);
        assert_eq!(Instruction::simple(OpCode::Log).min_version(), 5);
    }

    #[test]
    fn test_listing_display() {
        let listing = Listing {
            version: 6,
            lines: vec![
                Line::Op(Instruction::int(1)),
                Line::Op(Instruction::simple(OpCode::Return)),
            ],
        };
        assert_eq!(listing.to_string(), "#pragma version 6\nint 1\nreturn\n");
        assert_eq!(listing.instruction_count(), 2);
    }
}
