//! Program virtual machine
//!
//! Executes an assembled program against a transaction group and an
//! application's committed state. Stack values are Int or Bytes.
//! Safety limits:
//! - Stack depth capped at 1000 values
//! - Cost budget metered per instruction
//! - Bounded log output
//! - Checked arithmetic (overflow, underflow and division by zero fail)
//!
//! State writes land in a [`StateDelta`] that is handed back only when the
//! program approves; rejection and failure discard it.

use crate::contract::assembler::Executable;
use crate::contract::fields::{GlobalField, TxnField};
use crate::contract::opcodes::{Immediate, Instruction, OpCode};
use crate::core::state::{AppState, StateDelta, StateError, StateValue, StateView, ValueType};
use crate::core::transaction::{
    Address, OnComplete, Transaction, TransactionGroup, TxnKind, TxnType, MIN_TXN_FEE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// VM Constants
// =============================================================================

/// Maximum stack size
pub const MAX_STACK_SIZE: usize = 1000;

/// Default cost budget for one program execution
pub const DEFAULT_COST_BUDGET: u64 = 700;

/// Maximum number of log entries per execution
pub const MAX_LOG_ENTRIES: usize = 32;

/// Maximum total size of logged bytes per execution
pub const MAX_LOG_BYTES: usize = 1024;

/// Maximum length of a byte string value
pub const MAX_BYTES_LEN: usize = 4096;

// =============================================================================
// VM Errors
// =============================================================================

/// VM execution errors. Any of these rejects the transaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("{op}: expected {expected} operand")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
    },
    #[error("Cost budget exceeded (budget: {0})")]
    CostBudgetExceeded(u64),
    #[error("Integer overflow")]
    IntegerOverflow,
    #[error("Integer underflow")]
    IntegerUnderflow,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Program executed err")]
    ExplicitErr,
    #[error("Invalid jump: {0}")]
    InvalidJump(String),
    #[error("Malformed instruction: {0}")]
    MalformedInstruction(String),
    #[error("Field {field} unavailable on {txn_type} transaction")]
    FieldUnavailable {
        field: &'static str,
        txn_type: &'static str,
    },
    #[error("Group index {index} out of range for group of {size}")]
    GroupIndexOutOfRange { index: usize, size: usize },
    #[error("Account not accessible: {0}")]
    AccountNotAccessible(String),
    #[error("Account not opted in: {0}")]
    NotOptedIn(String),
    #[error("State of application {0} is not available")]
    ForeignApplication(u64),
    #[error("Byte string too long: {0} (max: {1})")]
    BytesTooLong(usize, usize),
    #[error("Log limit exceeded")]
    LogLimitExceeded,
    #[error("Program ended with {0} stack values instead of a single integer")]
    InvalidFinalStack(usize),
    #[error("State error: {0}")]
    State(#[from] StateError),
}

// =============================================================================
// Context and result
// =============================================================================

/// Ledger-side inputs of one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Application being executed (0 while it is being created)
    pub app_id: u64,
    /// Creator of the application
    pub creator: Address,
    /// Current round
    pub round: u64,
    /// Latest block timestamp (seconds)
    pub latest_timestamp: u64,
    /// Cost budget for this execution
    pub cost_budget: u64,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            app_id: 0,
            creator: Address::zero(),
            round: 1,
            latest_timestamp: 0,
            cost_budget: DEFAULT_COST_BUDGET,
        }
    }
}

/// Result of a completed execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether the program approved
    pub approved: bool,
    /// Cost consumed
    pub cost: u64,
    /// Logged values, in order (empty unless approved)
    pub logs: Vec<Vec<u8>>,
    /// Pending writes (empty unless approved)
    pub delta: StateDelta,
}

// =============================================================================
// VM
// =============================================================================

/// The program virtual machine
pub struct VM<'a> {
    program: &'a Executable,
    group: &'a TransactionGroup,
    /// Position of the executing transaction in the group
    index: usize,
    context: ExecutionContext,
    state: StateView<'a>,
    stack: Vec<StateValue>,
    pc: usize,
    cost: u64,
    logs: Vec<Vec<u8>>,
    log_bytes: usize,
    /// Set by `return`: whether the program approved
    verdict: Option<bool>,
}

impl<'a> VM<'a> {
    /// Create a VM for the group member at `index`
    pub fn new(
        program: &'a Executable,
        group: &'a TransactionGroup,
        index: usize,
        state: &'a AppState,
        context: ExecutionContext,
    ) -> Result<Self, VmError> {
        if index >= group.len() {
            return Err(VmError::GroupIndexOutOfRange {
                index,
                size: group.len(),
            });
        }
        Ok(Self {
            program,
            group,
            index,
            context,
            state: StateView::new(state),
            stack: Vec::with_capacity(64),
            pc: 0,
            cost: 0,
            logs: Vec::new(),
            log_bytes: 0,
            verdict: None,
        })
    }

    /// Run the program to completion
    pub fn execute(self) -> Result<ExecutionResult, VmError> {
        self.execute_metered().0
    }

    /// Run the program to completion, also reporting the cost spent. The
    /// cost is reported on failure too.
    pub fn execute_metered(mut self) -> (Result<ExecutionResult, VmError>, u64) {
        while self.verdict.is_none() && self.pc < self.program.instructions.len() {
            if let Err(e) = self.step() {
                return (Err(e), self.cost);
            }
        }
        let cost = self.cost;
        (self.finish(), cost)
    }

    fn finish(self) -> Result<ExecutionResult, VmError> {
        let approved = match self.verdict {
            Some(approved) => approved,
            // Ran off the end: exactly one Int must remain
            None => match self.stack.as_slice() {
                [StateValue::Int(value)] => *value != 0,
                other => return Err(VmError::InvalidFinalStack(other.len())),
            },
        };

        if !approved {
            return Ok(ExecutionResult {
                approved,
                cost: self.cost,
                logs: Vec::new(),
                delta: StateDelta::default(),
            });
        }
        Ok(ExecutionResult {
            approved,
            cost: self.cost,
            logs: self.logs,
            delta: self.state.into_delta(),
        })
    }

    fn current(&self) -> &'a Transaction {
        // `new` checked the index
        &self.group.transactions()[self.index]
    }

    /// Execute a single instruction
    fn step(&mut self) -> Result<(), VmError> {
        let program = self.program;
        let instruction = &program.instructions[self.pc];

        self.cost += 1;
        if self.cost > self.context.cost_budget {
            return Err(VmError::CostBudgetExceeded(self.context.cost_budget));
        }
        self.pc += 1;

        match instruction.op {
            OpCode::Int => match instruction.imm {
                Immediate::Uint { value, .. } => self.push(StateValue::Int(value))?,
                _ => return Err(malformed(instruction)),
            },
            OpCode::Byte => match &instruction.imm {
                Immediate::Bytes(bytes) => self.push(StateValue::Bytes(bytes.clone()))?,
                _ => return Err(malformed(instruction)),
            },
            OpCode::Txn => match instruction.imm {
                Immediate::Txn(field) => {
                    let value = txn_field(self.current(), self.index, field)?;
                    self.push(value)?;
                }
                _ => return Err(malformed(instruction)),
            },
            OpCode::Gtxn => match instruction.imm {
                Immediate::Gtxn(index, field) => {
                    let index = index as usize;
                    let txn = self
                        .group
                        .get(index)
                        .ok_or(VmError::GroupIndexOutOfRange {
                            index,
                            size: self.group.len(),
                        })?;
                    let value = txn_field(txn, index, field)?;
                    self.push(value)?;
                }
                _ => return Err(malformed(instruction)),
            },
            OpCode::Global => match instruction.imm {
                Immediate::Global(field) => {
                    let value = self.global_field(field);
                    self.push(value)?;
                }
                _ => return Err(malformed(instruction)),
            },

            OpCode::Eq | OpCode::Neq => {
                let b = self.pop()?;
                let a = self.pop()?;
                if a.value_type() != b.value_type() {
                    return Err(VmError::TypeMismatch {
                        op: instruction.op.name(),
                        expected: "matching",
                    });
                }
                let equal = a == b;
                let result = if instruction.op == OpCode::Eq {
                    equal
                } else {
                    !equal
                };
                self.push_bool(result)?;
            }
            OpCode::Lt | OpCode::Gt | OpCode::Le | OpCode::Ge => {
                let b = self.pop_int(instruction.op)?;
                let a = self.pop_int(instruction.op)?;
                let result = match instruction.op {
                    OpCode::Lt => a < b,
                    OpCode::Gt => a > b,
                    OpCode::Le => a <= b,
                    _ => a >= b,
                };
                self.push_bool(result)?;
            }
            OpCode::Add => {
                let b = self.pop_int(OpCode::Add)?;
                let a = self.pop_int(OpCode::Add)?;
                let sum = a.checked_add(b).ok_or(VmError::IntegerOverflow)?;
                self.push(StateValue::Int(sum))?;
            }
            OpCode::Sub => {
                let b = self.pop_int(OpCode::Sub)?;
                let a = self.pop_int(OpCode::Sub)?;
                let difference = a.checked_sub(b).ok_or(VmError::IntegerUnderflow)?;
                self.push(StateValue::Int(difference))?;
            }
            OpCode::Mul => {
                let b = self.pop_int(OpCode::Mul)?;
                let a = self.pop_int(OpCode::Mul)?;
                let product = a.checked_mul(b).ok_or(VmError::IntegerOverflow)?;
                self.push(StateValue::Int(product))?;
            }
            OpCode::Div | OpCode::Mod => {
                let b = self.pop_int(instruction.op)?;
                let a = self.pop_int(instruction.op)?;
                if b == 0 {
                    return Err(VmError::DivisionByZero);
                }
                let result = if instruction.op == OpCode::Div {
                    a / b
                } else {
                    a % b
                };
                self.push(StateValue::Int(result))?;
            }
            OpCode::And | OpCode::Or => {
                let b = self.pop_int(instruction.op)?;
                let a = self.pop_int(instruction.op)?;
                let result = if instruction.op == OpCode::And {
                    a != 0 && b != 0
                } else {
                    a != 0 || b != 0
                };
                self.push_bool(result)?;
            }
            OpCode::Not => {
                let a = self.pop_int(OpCode::Not)?;
                self.push_bool(a == 0)?;
            }

            OpCode::Len => {
                let bytes = self.pop_bytes(OpCode::Len)?;
                self.push(StateValue::Int(bytes.len() as u64))?;
            }
            OpCode::Itob => {
                let a = self.pop_int(OpCode::Itob)?;
                self.push(StateValue::Bytes(a.to_be_bytes().to_vec()))?;
            }
            OpCode::Btoi => {
                let bytes = self.pop_bytes(OpCode::Btoi)?;
                if bytes.len() > 8 {
                    return Err(VmError::BytesTooLong(bytes.len(), 8));
                }
                let value = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
                self.push(StateValue::Int(value))?;
            }
            OpCode::Concat => {
                let b = self.pop_bytes(OpCode::Concat)?;
                let mut a = self.pop_bytes(OpCode::Concat)?;
                if a.len() + b.len() > MAX_BYTES_LEN {
                    return Err(VmError::BytesTooLong(a.len() + b.len(), MAX_BYTES_LEN));
                }
                a.extend_from_slice(&b);
                self.push(StateValue::Bytes(a))?;
            }

            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let top = self.stack.last().cloned().ok_or(VmError::StackUnderflow)?;
                self.push(top)?;
            }

            OpCode::Bnz | OpCode::Bz => {
                let target = self.jump_target(instruction)?;
                let condition = self.pop_int(instruction.op)?;
                let taken = (condition != 0) == (instruction.op == OpCode::Bnz);
                if taken {
                    self.pc = target;
                }
            }
            OpCode::B => {
                self.pc = self.jump_target(instruction)?;
            }
            OpCode::Err => return Err(VmError::ExplicitErr),
            OpCode::Return => {
                let flag = self.pop_int(OpCode::Return)?;
                self.verdict = Some(flag != 0);
            }

            OpCode::Log => {
                let bytes = self.pop_bytes(OpCode::Log)?;
                if self.logs.len() >= MAX_LOG_ENTRIES
                    || self.log_bytes + bytes.len() > MAX_LOG_BYTES
                {
                    return Err(VmError::LogLimitExceeded);
                }
                self.log_bytes += bytes.len();
                self.logs.push(bytes);
            }

            OpCode::AppGlobalGet => {
                let key = self.pop_bytes(instruction.op)?;
                let value = self
                    .state
                    .get_global(&key)
                    .cloned()
                    .unwrap_or_else(|| StateValue::zero(ValueType::Int));
                self.push(value)?;
            }
            OpCode::AppGlobalGetEx => {
                let key = self.pop_bytes(instruction.op)?;
                let app = self.pop_int(instruction.op)?;
                self.check_own_app(app)?;
                let found = self.state.get_global(&key).cloned();
                self.push_lookup(found)?;
            }
            OpCode::AppGlobalPut => {
                let value = self.pop()?;
                let key = self.pop_bytes(instruction.op)?;
                self.state.put_global(&key, value)?;
            }
            OpCode::AppLocalGet => {
                let key = self.pop_bytes(instruction.op)?;
                let account = self.pop_account()?;
                let value = self
                    .state
                    .get_local(&account, &key)
                    .cloned()
                    .unwrap_or_else(|| StateValue::zero(ValueType::Int));
                self.push(value)?;
            }
            OpCode::AppLocalGetEx => {
                let key = self.pop_bytes(instruction.op)?;
                let app = self.pop_int(instruction.op)?;
                let account = self.pop_account()?;
                self.check_own_app(app)?;
                let found = self.state.get_local(&account, &key).cloned();
                self.push_lookup(found)?;
            }
            OpCode::AppLocalPut => {
                let value = self.pop()?;
                let key = self.pop_bytes(instruction.op)?;
                let account = self.pop_account()?;
                if !self.may_hold_local_state(&account) {
                    return Err(VmError::NotOptedIn(account.to_string()));
                }
                self.state.put_local(&account, &key, value)?;
            }
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Stack helpers
    // -------------------------------------------------------------------------

    fn push(&mut self, value: StateValue) -> Result<(), VmError> {
        if self.stack.len() >= MAX_STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn push_bool(&mut self, value: bool) -> Result<(), VmError> {
        self.push(StateValue::Int(u64::from(value)))
    }

    /// Push `value, 1` if found, else `0, 0`
    fn push_lookup(&mut self, found: Option<StateValue>) -> Result<(), VmError> {
        match found {
            Some(value) => {
                self.push(value)?;
                self.push_bool(true)
            }
            None => {
                self.push(StateValue::zero(ValueType::Int))?;
                self.push_bool(false)
            }
        }
    }

    fn pop(&mut self) -> Result<StateValue, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn pop_int(&mut self, op: OpCode) -> Result<u64, VmError> {
        self.pop()?.as_int().ok_or(VmError::TypeMismatch {
            op: op.name(),
            expected: "uint64",
        })
    }

    fn pop_bytes(&mut self, op: OpCode) -> Result<Vec<u8>, VmError> {
        match self.pop()? {
            StateValue::Bytes(bytes) => Ok(bytes),
            StateValue::Int(_) => Err(VmError::TypeMismatch {
                op: op.name(),
                expected: "bytes",
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Context helpers
    // -------------------------------------------------------------------------

    fn jump_target(&self, instruction: &Instruction) -> Result<usize, VmError> {
        match instruction.imm {
            Immediate::Target(target) if target <= self.program.instructions.len() => Ok(target),
            _ => Err(VmError::InvalidJump(instruction.to_string())),
        }
    }

    /// Account operand: an address, or an index into the current
    /// transaction's accounts (0 is the sender)
    fn pop_account(&mut self) -> Result<Address, VmError> {
        let txn = self.current();
        let account = match self.pop()? {
            StateValue::Int(index) => txn
                .account_at(index)
                .ok_or_else(|| VmError::AccountNotAccessible(format!("index {}", index)))?,
            StateValue::Bytes(bytes) => {
                let address = Address::from_slice(&bytes)
                    .ok_or_else(|| VmError::AccountNotAccessible(hex::encode(&bytes)))?;
                if !txn.accessible_accounts().contains(&address) {
                    return Err(VmError::AccountNotAccessible(address.to_string()));
                }
                address
            }
        };
        Ok(account)
    }

    /// Opted-in accounts, plus the sender of an opt-in call
    fn may_hold_local_state(&self, account: &Address) -> bool {
        let txn = self.current();
        let opting_in = txn.on_completion() == Some(OnComplete::OptIn) && txn.sender == *account;
        opting_in || self.state.is_opted_in(account)
    }

    fn check_own_app(&self, app: u64) -> Result<(), VmError> {
        if app == 0 || app == self.context.app_id {
            Ok(())
        } else {
            Err(VmError::ForeignApplication(app))
        }
    }

    fn global_field(&self, field: GlobalField) -> StateValue {
        match field {
            GlobalField::MinTxnFee => StateValue::Int(MIN_TXN_FEE),
            GlobalField::ZeroAddress => StateValue::Bytes(Address::zero().as_bytes().to_vec()),
            GlobalField::GroupSize => StateValue::Int(self.group.len() as u64),
            GlobalField::Round => StateValue::Int(self.context.round),
            GlobalField::LatestTimestamp => StateValue::Int(self.context.latest_timestamp),
            GlobalField::CurrentApplicationId => StateValue::Int(self.context.app_id),
            GlobalField::CreatorAddress => {
                StateValue::Bytes(self.context.creator.as_bytes().to_vec())
            }
        }
    }
}

fn malformed(instruction: &Instruction) -> VmError {
    VmError::MalformedInstruction(instruction.to_string())
}

fn address_value(address: &Address) -> StateValue {
    StateValue::Bytes(address.as_bytes().to_vec())
}

/// Read a field of `txn`, which sits at `index` in its group
fn txn_field(txn: &Transaction, index: usize, field: TxnField) -> Result<StateValue, VmError> {
    let txn_type = txn.txn_type();
    if !field.applies_to(txn_type) {
        return Err(VmError::FieldUnavailable {
            field: field.name(),
            txn_type: txn_type.name(),
        });
    }

    let value = match field {
        TxnField::Sender => address_value(&txn.sender),
        TxnField::Fee => StateValue::Int(txn.fee),
        TxnField::FirstValid => StateValue::Int(txn.first_valid),
        TxnField::LastValid => StateValue::Int(txn.last_valid),
        TxnField::Note => StateValue::Bytes(txn.note.as_bytes().to_vec()),
        TxnField::TypeEnum => StateValue::Int(txn_type.code()),
        TxnField::Type => StateValue::Bytes(txn_type.name().as_bytes().to_vec()),
        TxnField::GroupIndex => StateValue::Int(index as u64),
        TxnField::TxId => StateValue::Bytes(txn.tx_id().to_vec()),
        TxnField::Receiver | TxnField::Amount | TxnField::CloseRemainderTo => match &txn.kind {
            TxnKind::Payment {
                receiver,
                amount,
                close_remainder_to,
            } => match field {
                TxnField::Receiver => address_value(receiver),
                TxnField::Amount => StateValue::Int(*amount),
                _ => address_value(&close_remainder_to.unwrap_or_else(Address::zero)),
            },
            _ => return Err(unavailable(field, txn_type)),
        },
        TxnField::ApplicationId
        | TxnField::OnCompletion
        | TxnField::NumAppArgs
        | TxnField::NumAccounts => match &txn.kind {
            TxnKind::ApplicationCall {
                app_id,
                on_completion,
                args,
                accounts,
            } => match field {
                TxnField::ApplicationId => StateValue::Int(*app_id),
                TxnField::OnCompletion => StateValue::Int(on_completion.code()),
                TxnField::NumAppArgs => StateValue::Int(args.len() as u64),
                _ => StateValue::Int(accounts.len() as u64),
            },
            _ => return Err(unavailable(field, txn_type)),
        },
        TxnField::XferAsset | TxnField::AssetAmount | TxnField::AssetReceiver => match &txn.kind {
            TxnKind::AssetTransfer {
                asset_id,
                receiver,
                amount,
            } => match field {
                TxnField::XferAsset => StateValue::Int(*asset_id),
                TxnField::AssetAmount => StateValue::Int(*amount),
                _ => address_value(receiver),
            },
            _ => return Err(unavailable(field, txn_type)),
        },
    };
    Ok(value)
}

fn unavailable(field: TxnField, txn_type: TxnType) -> VmError {
    VmError::FieldUnavailable {
        field: field.name(),
        txn_type: txn_type.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::assembler::assemble;
    use crate::core::state::StateSchema;

    fn alice() -> Address {
        Address::derive("alice")
    }

    fn run_with(
        source: &str,
        group: &TransactionGroup,
        index: usize,
        state: &AppState,
        context: ExecutionContext,
    ) -> Result<ExecutionResult, VmError> {
        let program = assemble(source).unwrap();
        VM::new(&program, group, index, state, context)?.execute()
    }

    fn run(source: &str) -> Result<ExecutionResult, VmError> {
        let group = TransactionGroup::single(Transaction::app_call(alice(), 1, OnComplete::NoOp));
        let state = AppState::default();
        run_with(source, &group, 0, &state, ExecutionContext::default())
    }

    #[test]
    fn test_return_verdicts() {
        assert!(run("#pragma version 2\nint 1\nreturn").unwrap().approved);
        assert!(!run("#pragma version 2\nint 0\nreturn").unwrap().approved);
        assert_eq!(run("#pragma version 2\nerr"), Err(VmError::ExplicitErr));
    }

    #[test]
    fn test_run_off_end() {
        assert!(run("#pragma version 2\nint 7").unwrap().approved);
        assert!(!run("#pragma version 2\nint 0").unwrap().approved);
        assert_eq!(
            run("#pragma version 2\nint 1\nint 1"),
            Err(VmError::InvalidFinalStack(2))
        );
        assert_eq!(
            run("#pragma version 2\nbyte \"x\""),
            Err(VmError::InvalidFinalStack(1))
        );
    }

    #[test]
    fn test_arithmetic_faults() {
        assert_eq!(
            run("#pragma version 2\nint 1\nint 2\n-\nreturn"),
            Err(VmError::IntegerUnderflow)
        );
        assert_eq!(
            run("#pragma version 2\nint 18446744073709551615\nint 1\n+\nreturn"),
            Err(VmError::IntegerOverflow)
        );
        assert_eq!(
            run("#pragma version 2\nint 1\nint 0\n/\nreturn"),
            Err(VmError::DivisionByZero)
        );
        let ok = run("#pragma version 2\nint 7\nint 3\n%\nint 1\n==\nreturn").unwrap();
        assert!(ok.approved);
    }

    #[test]
    fn test_byte_ops() {
        let source = "#pragma version 2
byte \"ab\"
byte \"cd\"
concat
len
int 4
==
int 258
itob
btoi
int 258
==
&&
return";
        assert!(run(source).unwrap().approved);
    }

    #[test]
    fn test_type_checks_at_runtime() {
        assert!(matches!(
            run("#pragma version 2\nint 1\nbyte \"1\"\n==\nreturn"),
            Err(VmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_cost_budget() {
        let mut source = String::from("#pragma version 2\n");
        for _ in 0..400 {
            source.push_str("int 1\npop\n");
        }
        source.push_str("int 1\nreturn\n");
        assert_eq!(run(&source), Err(VmError::CostBudgetExceeded(DEFAULT_COST_BUDGET)));
    }

    #[test]
    fn test_stack_overflow() {
        let mut source = String::from("#pragma version 2\n");
        for _ in 0..1001 {
            source.push_str("int 1\n");
        }
        let group = TransactionGroup::single(Transaction::app_call(alice(), 1, OnComplete::NoOp));
        let context = ExecutionContext {
            cost_budget: 5000,
            ..ExecutionContext::default()
        };
        let result = run_with(&source, &group, 0, &AppState::default(), context);
        assert_eq!(result, Err(VmError::StackOverflow));
    }

    #[test]
    fn test_group_fields() {
        let bob = Address::derive("bob");
        let group = TransactionGroup::new(vec![
            Transaction::app_call(alice(), 1, OnComplete::NoOp),
            Transaction::payment(alice(), bob, 2500),
        ])
        .unwrap();
        let source = "#pragma version 6
gtxn 1 Amount
int 2500
==
gtxn 1 TypeEnum
int pay
==
&&
global GroupSize
int 2
==
&&
txn GroupIndex
int 0
==
&&
return";
        let result = run_with(source, &group, 0, &AppState::default(), ExecutionContext::default());
        assert!(result.unwrap().approved);

        let missing = "#pragma version 6\ngtxn 2 Fee\nreturn";
        assert_eq!(
            run_with(missing, &group, 0, &AppState::default(), ExecutionContext::default()),
            Err(VmError::GroupIndexOutOfRange { index: 2, size: 2 })
        );
    }

    #[test]
    fn test_field_unavailable() {
        assert_eq!(
            run("#pragma version 2\ntxn Amount\nreturn"),
            Err(VmError::FieldUnavailable {
                field: "Amount",
                txn_type: "appl"
            })
        );
    }

    #[test]
    fn test_state_writes_only_on_approval() {
        let approve = run("#pragma version 2\nbyte \"k\"\nint 5\napp_global_put\nint 1\nreturn")
            .unwrap();
        assert_eq!(approve.delta.global.get(b"k".as_slice()), Some(&StateValue::Int(5)));

        let reject = run("#pragma version 2\nbyte \"k\"\nint 5\napp_global_put\nint 0\nreturn")
            .unwrap();
        assert!(!reject.approved);
        assert!(reject.delta.is_empty());
    }

    #[test]
    fn test_global_get_ex_lookup() {
        let mut state = AppState::new(StateSchema::default(), StateSchema::default());
        let mut delta = StateDelta::default();
        delta.global.insert(b"name".to_vec(), StateValue::from("tealforge"));
        state.commit(delta);

        let group = TransactionGroup::single(Transaction::app_call(alice(), 1, OnComplete::NoOp));
        let source = "#pragma version 2
int 0
byte \"missing\"
app_global_get_ex
bnz fail
pop
int 0
byte \"name\"
app_global_get_ex
bz fail
byte \"tealforge\"
==
return
fail:
err";
        let result = run_with(source, &group, 0, &state, ExecutionContext::default()).unwrap();
        assert!(result.approved);
    }

    #[test]
    fn test_local_writes_need_access_and_opt_in() {
        let stranger = Address::derive("stranger");
        let source = format!(
            "#pragma version 2\nbyte 0x{}\nbyte \"k\"\nint 1\napp_local_put\nint 1\nreturn",
            hex::encode(stranger.as_bytes())
        );
        assert_eq!(
            run(&source),
            Err(VmError::AccountNotAccessible(stranger.to_string()))
        );

        // The sender is accessible but not opted in on a NoOp call
        let sender_write = "#pragma version 2\ntxn Sender\nbyte \"k\"\nint 1\napp_local_put\nint 1\nreturn";
        assert_eq!(
            run(sender_write),
            Err(VmError::NotOptedIn(alice().to_string()))
        );

        // ...but may write while opting in
        let group = TransactionGroup::single(Transaction::app_call(alice(), 1, OnComplete::OptIn));
        let result = run_with(
            sender_write,
            &group,
            0,
            &AppState::default(),
            ExecutionContext::default(),
        )
        .unwrap();
        assert!(result.approved);
        assert_eq!(result.delta.local.len(), 1);
    }

    #[test]
    fn test_foreign_app_state_unavailable() {
        assert_eq!(
            run("#pragma version 2\nint 99\nbyte \"k\"\napp_global_get_ex\nreturn"),
            Err(VmError::ForeignApplication(99))
        );
    }

    #[test]
    fn test_logs() {
        let result = run("#pragma version 5\nbyte \"hi\"\nlog\nint 1\nreturn").unwrap();
        assert_eq!(result.logs, vec![b"hi".to_vec()]);

        let mut source = String::from("#pragma version 5\n");
        for _ in 0..33 {
            source.push_str("byte \"x\"\nlog\n");
        }
        source.push_str("int 1\nreturn\n");
        assert_eq!(run(&source), Err(VmError::LogLimitExceeded));
    }

    #[test]
    fn test_schema_violation_fails() {
        let source = "#pragma version 2
byte \"k\"
int 1
app_global_put
byte \"k\"
byte \"one\"
app_global_put
int 1
return";
        assert!(matches!(
            run(source),
            Err(VmError::State(StateError::SchemaViolation { .. }))
        ));
    }
}
