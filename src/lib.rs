//! tealforge: contract programs as typed expression trees
//!
//! This crate provides:
//! - A typed expression builder for approval and clear-state logic
//! - A compiler producing versioned TEAL-style listings with labels
//! - An assembler and cost-metered stack VM for the emitted listings
//! - Application creation, calls and opt-in with commit-on-approve state
//! - Sample programs and artifact persistence
//!
//! # Example
//!
//! ```rust
//! use tealforge::contract::{compile_program, Expr};
//!
//! let tree = Expr::seq([
//!     Expr::global_put("Hello", Expr::bytes("World!")).unwrap(),
//!     Expr::approve(),
//! ]);
//! let listing = compile_program(&tree, 6).unwrap();
//! assert!(listing.starts_with("#pragma version 6\n"));
//! ```

pub mod cli;
pub mod contract;
pub mod core;
pub mod crypto;
pub mod samples;
pub mod storage;

// Re-export commonly used types
pub use contract::{
    compile_program, ApplicationManager, CompileError, CompiledProgram, Compiler, Expr, OpCode,
    Program, TxnRef, VM,
};
pub use core::{Address, AppState, StateSchema, StateValue, Transaction, TransactionGroup};
pub use samples::Template;
pub use storage::{ArtifactConfig, ArtifactStore};
