//! Approval / clear-state program pairs
//!
//! A [`Program`] bundles the two trees deployed together with the version
//! they target. Each tree compiles independently with its own label counter.

use crate::contract::compiler::{CompileError, Compiler};
use crate::contract::expr::Expr;
use crate::crypto::hash::sha256_hex;
use serde::{Deserialize, Serialize};

/// The two companion programs of an application
#[derive(Debug, Clone)]
pub struct Program {
    approval: Expr,
    clear_state: Expr,
    version: u8,
}

impl Program {
    pub fn new(approval: Expr, clear_state: Expr, version: u8) -> Self {
        Self {
            approval,
            clear_state,
            version,
        }
    }

    pub fn approval(&self) -> &Expr {
        &self.approval
    }

    pub fn clear_state(&self) -> &Expr {
        &self.clear_state
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Compile both programs; either failing fails the whole pair
    pub fn compile(&self) -> Result<CompiledProgram, CompileError> {
        let compiler = Compiler::new(self.version)?;
        let approval = compiler.compile_named("approval", &self.approval)?;
        let clear_state = compiler.compile_named("clear_state", &self.clear_state)?;

        Ok(CompiledProgram {
            version: self.version,
            approval: approval.to_string(),
            clear_state: clear_state.to_string(),
        })
    }
}

/// Deployable artifact: two listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub version: u8,
    pub approval: String,
    pub clear_state: String,
}

impl CompiledProgram {
    /// SHA-256 of the approval listing, hex encoded
    pub fn approval_hash(&self) -> String {
        sha256_hex(self.approval.as_bytes())
    }

    pub fn clear_state_hash(&self) -> String {
        sha256_hex(self.clear_state.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_pair() {
        let program = Program::new(Expr::approve(), Expr::approve(), 6);
        let compiled = program.compile().unwrap();

        assert_eq!(compiled.version, 6);
        assert_eq!(compiled.approval, "#pragma version 6\nint 1\nreturn\n");
        assert_eq!(compiled.approval, compiled.clear_state);
        assert_eq!(compiled.approval_hash(), compiled.clear_state_hash());
        assert_eq!(compiled.approval_hash().len(), 64);
    }

    #[test]
    fn test_failing_clear_program_fails_pair() {
        let falls_through = Expr::log(Expr::bytes("x")).unwrap();
        let program = Program::new(Expr::approve(), falls_through, 6);
        assert!(matches!(
            program.compile(),
            Err(CompileError::UnreachableTerminal { ref node }) if node.starts_with("clear_state")
        ));
    }

    #[test]
    fn test_invalid_version() {
        let program = Program::new(Expr::approve(), Expr::approve(), 42);
        assert_eq!(program.compile(), Err(CompileError::InvalidVersion(42)));
    }
}
