//! Listing assembler
//!
//! Parses listing text back into instructions the VM can execute. Two passes:
//! the first parses instructions and records label positions, the second
//! resolves jump targets to instruction indices.

use crate::contract::expr::NamedConst;
use crate::contract::fields::{GlobalField, TxnField};
use crate::contract::opcodes::{
    ImmediateKind, Immediate, Instruction, OpCode, MAX_PROGRAM_VERSION, MIN_PROGRAM_VERSION,
};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Assembler errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("Missing '#pragma version' line")]
    MissingPragma,
    #[error("Unsupported program version: {0}")]
    UnsupportedVersion(String),
    #[error("Line {0}: unknown instruction: {1}")]
    UnknownInstruction(usize, String),
    #[error("Line {0}: invalid argument: {1}")]
    InvalidArgument(usize, String),
    #[error("Line {0}: invalid number: {1}")]
    InvalidNumber(usize, String),
    #[error("Line {0}: unknown field: {1}")]
    UnknownField(usize, String),
    #[error("Line {0}: '{1}' needs version {2}, program declares {3}")]
    NotAvailable(usize, String, u8, u8),
    #[error("Undefined label: {0}")]
    UndefinedLabel(String),
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),
}

/// An assembled program ready for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    pub version: u8,
    pub instructions: Vec<Instruction>,
}

impl Executable {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Numbered instruction dump, one per line
impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; version {}", self.version)?;
        for (index, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{:04}: {}", index, instruction)?;
        }
        Ok(())
    }
}

/// Two-pass assembler
pub struct Assembler {
    version: u8,
    instructions: Vec<Instruction>,
    /// Label name -> index of the instruction it precedes
    labels: HashMap<String, usize>,
    /// Pending label references (instruction index, label name)
    label_refs: Vec<(usize, String)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            version: MIN_PROGRAM_VERSION,
            instructions: Vec::new(),
            labels: HashMap::new(),
            label_refs: Vec::new(),
        }
    }

    /// Assemble listing text
    pub fn assemble(&mut self, source: &str) -> Result<Executable, AssemblerError> {
        self.instructions.clear();
        self.labels.clear();
        self.label_refs.clear();

        let mut lines = source
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, strip_comment(line).trim()))
            .filter(|(_, line)| !line.is_empty());

        // First pass: pragma, instructions and label positions
        let (_, pragma) = lines.next().ok_or(AssemblerError::MissingPragma)?;
        self.version = parse_pragma(pragma)?;

        for (number, line) in lines {
            if let Some(label) = line.strip_suffix(':') {
                if label.is_empty() || label.contains(char::is_whitespace) {
                    return Err(AssemblerError::InvalidArgument(number, line.to_string()));
                }
                if self
                    .labels
                    .insert(label.to_string(), self.instructions.len())
                    .is_some()
                {
                    return Err(AssemblerError::DuplicateLabel(label.to_string()));
                }
                continue;
            }
            self.assemble_instruction(number, line)?;
        }

        // Second pass: resolve label references
        for (position, label) in &self.label_refs {
            let target = self
                .labels
                .get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel(label.clone()))?;
            self.instructions[*position].imm = Immediate::Target(*target);
        }

        Ok(Executable {
            version: self.version,
            instructions: self.instructions.clone(),
        })
    }

    fn assemble_instruction(&mut self, number: usize, line: &str) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((mnemonic, rest)) => (mnemonic, rest.trim()),
            None => (line, ""),
        };
        let op = OpCode::from_name(mnemonic)
            .ok_or_else(|| AssemblerError::UnknownInstruction(number, mnemonic.to_string()))?;

        let imm = match op.immediate_kind() {
            ImmediateKind::None => {
                if !rest.is_empty() {
                    return Err(AssemblerError::InvalidArgument(number, line.to_string()));
                }
                Immediate::None
            }
            ImmediateKind::Uint => parse_uint(number, rest)?,
            ImmediateKind::Bytes => Immediate::Bytes(parse_bytes(number, rest)?),
            ImmediateKind::TxnField => Immediate::Txn(parse_txn_field(number, rest)?),
            ImmediateKind::GroupField => {
                let (index, field) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| AssemblerError::InvalidArgument(number, line.to_string()))?;
                let index = index
                    .parse::<u8>()
                    .map_err(|_| AssemblerError::InvalidNumber(number, index.to_string()))?;
                Immediate::Gtxn(index, parse_txn_field(number, field.trim())?)
            }
            ImmediateKind::GlobalField => Immediate::Global(
                GlobalField::from_name(rest)
                    .ok_or_else(|| AssemblerError::UnknownField(number, rest.to_string()))?,
            ),
            ImmediateKind::Label => {
                if rest.is_empty() || rest.contains(char::is_whitespace) {
                    return Err(AssemblerError::InvalidArgument(
                        number,
                        format!("{} requires a label", mnemonic),
                    ));
                }
                self.label_refs
                    .push((self.instructions.len(), rest.to_string()));
                Immediate::Label(rest.to_string())
            }
        };

        let instruction = Instruction { op, imm };
        let required = instruction.min_version();
        if required > self.version {
            return Err(AssemblerError::NotAvailable(
                number,
                instruction.to_string(),
                required,
                self.version,
            ));
        }
        self.instructions.push(instruction);
        Ok(())
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble listing text in one call
pub fn assemble(source: &str) -> Result<Executable, AssemblerError> {
    Assembler::new().assemble(source)
}

fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        match bytes[i] {
            b'"' => in_quotes = !in_quotes,
            b'/' if !in_quotes && bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn parse_pragma(line: &str) -> Result<u8, AssemblerError> {
    let version = line
        .strip_prefix("#pragma")
        .map(str::trim)
        .and_then(|rest| rest.strip_prefix("version"))
        .map(str::trim)
        .ok_or(AssemblerError::MissingPragma)?;
    let parsed = version
        .parse::<u8>()
        .map_err(|_| AssemblerError::UnsupportedVersion(version.to_string()))?;
    if !(MIN_PROGRAM_VERSION..=MAX_PROGRAM_VERSION).contains(&parsed) {
        return Err(AssemblerError::UnsupportedVersion(version.to_string()));
    }
    Ok(parsed)
}

/// Decimal, `0x` hex, or a symbolic constant such as `pay` / `OptIn`
fn parse_uint(number: usize, s: &str) -> Result<Immediate, AssemblerError> {
    if let Some(constant) = NamedConst::from_name(s) {
        return Ok(Immediate::Uint {
            value: constant.value(),
            name: Some(constant.name()),
        });
    }
    let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    }
    .map_err(|_| AssemblerError::InvalidNumber(number, s.to_string()))?;
    Ok(Immediate::Uint { value, name: None })
}

/// `"text"` or `0x` hex
fn parse_bytes(number: usize, s: &str) -> Result<Vec<u8>, AssemblerError> {
    if let Some(quoted) = s.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
        if quoted.contains('"') || quoted.contains('\\') {
            return Err(AssemblerError::InvalidArgument(number, s.to_string()));
        }
        return Ok(quoted.as_bytes().to_vec());
    }
    if let Some(encoded) = s.strip_prefix("0x") {
        return hex::decode(encoded).map_err(|_| AssemblerError::InvalidArgument(number, s.to_string()));
    }
    Err(AssemblerError::InvalidArgument(number, s.to_string()))
}

fn parse_txn_field(number: usize, s: &str) -> Result<TxnField, AssemblerError> {
    TxnField::from_name(s).ok_or_else(|| AssemblerError::UnknownField(number, s.to_string()))
}
