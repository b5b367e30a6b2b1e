//! Contract programs
//!
//! Authoring, compilation and reference execution of approval/clear-state
//! program pairs.
//!
//! # Overview
//!
//! This module implements:
//! - A typed expression tree for program logic
//! - A compiler lowering trees to versioned listings
//! - An assembler and stack VM that execute listings
//! - Application creation and calls with commit-on-approve state
//!
//! # Example
//!
//! ```rust
//! use tealforge::contract::{ApplicationManager, Expr, Program};
//! use tealforge::core::{Address, StateSchema, Transaction, TransactionGroup};
//!
//! // Compile a program pair
//! let approval = Expr::seq([
//!     Expr::global_put("Hello", Expr::bytes("World!")).unwrap(),
//!     Expr::approve(),
//! ]);
//! let compiled = Program::new(approval, Expr::approve(), 6).compile().unwrap();
//!
//! // Create the application
//! let creator = Address::derive("creator");
//! let group = TransactionGroup::single(Transaction::app_create(creator));
//! let mut manager = ApplicationManager::new();
//! let outcome = manager
//!     .create(&compiled, StateSchema::default(), StateSchema::default(), &group, 0)
//!     .unwrap();
//! assert!(outcome.approved);
//! ```

pub mod application;
pub mod assembler;
pub mod compiler;
pub mod expr;
pub mod fields;
pub mod opcodes;
pub mod program;
pub mod vm;

pub use application::{Application, ApplicationError, ApplicationManager, CallOutcome};
pub use assembler::{assemble, Assembler, AssemblerError, Executable};
pub use compiler::{compile_program, CompileContext, CompileError, Compiler};
pub use expr::{BinaryOp, Expr, NamedConst, Node, Store, TerminalKind, TxnRef, TxnSource, Type, UnaryOp};
pub use fields::{GlobalField, TxnField};
pub use opcodes::{Instruction, Line, Listing, OpCode, MAX_PROGRAM_VERSION, MIN_PROGRAM_VERSION};
pub use program::{CompiledProgram, Program};
pub use vm::{ExecutionContext, ExecutionResult, VmError, DEFAULT_COST_BUDGET, VM};
