//! Application management
//!
//! Creates applications from compiled programs and routes application calls
//! to their approval or clear-state program. State changes are committed
//! only when the executing program approves.

use crate::contract::assembler::{assemble, AssemblerError, Executable};
use crate::contract::program::CompiledProgram;
use crate::contract::vm::{ExecutionContext, ExecutionResult, VmError, DEFAULT_COST_BUDGET, VM};
use crate::core::state::{AppState, StateSchema};
use crate::core::transaction::{
    Address, OnComplete, Transaction, TransactionError, TransactionGroup,
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Application errors: calls that never reach a program
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("Application not found: {0}")]
    NotFound(u64),
    #[error("Transaction {0} is not an application call")]
    NotAnApplicationCall(usize),
    #[error("Creation must use application id 0, got {0}")]
    NotACreation(u64),
    #[error("Application id 0 refers to creation; use create")]
    CreationViaCall,
    #[error("Unsupported on-completion action: {0}")]
    Unsupported(&'static str),
    #[error("Account {0} is already opted in")]
    AlreadyOptedIn(String),
    #[error("Account {0} is not opted in")]
    NotOptedIn(String),
    #[error("Program version mismatch: approval {0}, clear state {1}")]
    VersionMismatch(u8, u8),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Assembler error: {0}")]
    Assembler(#[from] AssemblerError),
}

/// A created application
#[derive(Debug, Clone)]
pub struct Application {
    pub id: u64,
    pub creator: Address,
    pub approval: Executable,
    pub clear_state: Executable,
    pub state: AppState,
    /// Round the application was created in
    pub created_at: u64,
}

/// What happened to one application call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    /// Application the call addressed (0 for a rejected creation)
    pub app_id: u64,
    pub approved: bool,
    pub logs: Vec<Vec<u8>>,
    /// Runtime failure, if the program failed rather than returned
    pub error: Option<String>,
    pub cost: u64,
}

impl CallOutcome {
    fn from_run(app_id: u64, run: &Result<ExecutionResult, VmError>, cost: u64) -> Self {
        match run {
            Ok(result) => Self {
                app_id,
                approved: result.approved,
                logs: result.logs.clone(),
                error: None,
                cost: result.cost,
            },
            Err(e) => Self {
                app_id,
                approved: false,
                logs: Vec::new(),
                error: Some(e.to_string()),
                cost,
            },
        }
    }
}

/// Manages all created applications
#[derive(Debug, Clone)]
pub struct ApplicationManager {
    apps: BTreeMap<u64, Application>,
    /// Next application id to allocate
    next_id: u64,
    round: u64,
    latest_timestamp: u64,
    cost_budget: u64,
}

impl Default for ApplicationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationManager {
    /// Create a new application manager
    pub fn new() -> Self {
        Self {
            apps: BTreeMap::new(),
            next_id: 1,
            round: 1,
            latest_timestamp: 0,
            cost_budget: DEFAULT_COST_BUDGET,
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn set_round(&mut self, round: u64) {
        self.round = round;
    }

    pub fn set_latest_timestamp(&mut self, timestamp: u64) {
        self.latest_timestamp = timestamp;
    }

    pub fn set_cost_budget(&mut self, budget: u64) {
        self.cost_budget = budget;
    }

    fn context(&self, app_id: u64, creator: Address) -> ExecutionContext {
        ExecutionContext {
            app_id,
            creator,
            round: self.round,
            latest_timestamp: self.latest_timestamp,
            cost_budget: self.cost_budget,
        }
    }

    /// Create an application from the group member at `index`, which must be
    /// an application call with id 0. The approval program runs with
    /// `ApplicationID == 0`; nothing is stored unless it approves.
    pub fn create(
        &mut self,
        compiled: &CompiledProgram,
        global_schema: StateSchema,
        local_schema: StateSchema,
        group: &TransactionGroup,
        index: usize,
    ) -> Result<CallOutcome, ApplicationError> {
        let txn = app_call_at(group, index)?;
        let (app_id, on_completion) = call_target(txn, index)?;
        if app_id != 0 {
            return Err(ApplicationError::NotACreation(app_id));
        }

        let approval = assemble(&compiled.approval)?;
        let clear_state = assemble(&compiled.clear_state)?;
        if approval.version != clear_state.version {
            return Err(ApplicationError::VersionMismatch(
                approval.version,
                clear_state.version,
            ));
        }

        let creator = txn.sender;
        let mut state = AppState::new(global_schema, local_schema);
        let context = self.context(0, creator);
        let (run, cost) = run_program(&approval, group, index, &state, context);
        let mut outcome = CallOutcome::from_run(0, &run, cost);

        match run {
            Ok(result) if result.approved => {
                let id = self.next_id;
                self.next_id += 1;

                if on_completion == OnComplete::OptIn {
                    state.opt_in(creator);
                }
                state.commit(result.delta);
                self.apps.insert(
                    id,
                    Application {
                        id,
                        creator,
                        approval,
                        clear_state,
                        state,
                        created_at: self.round,
                    },
                );
                outcome.app_id = id;
                log::info!("Application {} created by {}", id, creator.short());
            }
            _ => log_rejection("create", 0, &outcome),
        }
        Ok(outcome)
    }

    /// Call an existing application with the group member at `index`
    pub fn call(
        &mut self,
        group: &TransactionGroup,
        index: usize,
    ) -> Result<CallOutcome, ApplicationError> {
        let txn = app_call_at(group, index)?;
        let (app_id, on_completion) = call_target(txn, index)?;
        if app_id == 0 {
            return Err(ApplicationError::CreationViaCall);
        }
        let context = self.context(app_id, Address::zero());
        let app = self
            .apps
            .get_mut(&app_id)
            .ok_or(ApplicationError::NotFound(app_id))?;
        let context = ExecutionContext {
            creator: app.creator,
            ..context
        };
        let sender = txn.sender;

        match on_completion {
            OnComplete::UpdateApplication => {
                return Err(ApplicationError::Unsupported(on_completion.name()))
            }
            OnComplete::OptIn if app.state.is_opted_in(&sender) => {
                return Err(ApplicationError::AlreadyOptedIn(sender.to_string()))
            }
            OnComplete::CloseOut | OnComplete::ClearState if !app.state.is_opted_in(&sender) => {
                return Err(ApplicationError::NotOptedIn(sender.to_string()))
            }
            _ => {}
        }

        if on_completion == OnComplete::ClearState {
            let (run, cost) = run_program(&app.clear_state, group, index, &app.state, context);
            let outcome = CallOutcome::from_run(app_id, &run, cost);
            if let Ok(result) = run {
                if result.approved {
                    app.state.commit(result.delta);
                }
            }
            // Local state goes regardless of the verdict
            app.state.close_out(&sender);
            if !outcome.approved {
                log_rejection("clear state", app_id, &outcome);
            }
            return Ok(outcome);
        }

        let (run, cost) = run_program(&app.approval, group, index, &app.state, context);
        let outcome = CallOutcome::from_run(app_id, &run, cost);
        let result = match run {
            Ok(result) if result.approved => result,
            _ => {
                log_rejection(on_completion.name(), app_id, &outcome);
                return Ok(outcome);
            }
        };

        if on_completion == OnComplete::OptIn {
            app.state.opt_in(sender);
        }
        app.state.commit(result.delta);
        match on_completion {
            OnComplete::CloseOut => {
                app.state.close_out(&sender);
            }
            OnComplete::DeleteApplication => {
                self.apps.remove(&app_id);
                log::info!("Application {} deleted", app_id);
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// Get an application by id
    pub fn get(&self, app_id: u64) -> Option<&Application> {
        self.apps.get(&app_id)
    }

    /// Get all application ids
    pub fn list(&self) -> Vec<u64> {
        self.apps.keys().copied().collect()
    }

    /// Get application count
    pub fn count(&self) -> usize {
        self.apps.len()
    }
}

/// Run `program`; a program that cannot start has spent nothing
fn run_program(
    program: &Executable,
    group: &TransactionGroup,
    index: usize,
    state: &AppState,
    context: ExecutionContext,
) -> (Result<ExecutionResult, VmError>, u64) {
    match VM::new(program, group, index, state, context) {
        Ok(vm) => vm.execute_metered(),
        Err(e) => (Err(e), 0),
    }
}

fn app_call_at(group: &TransactionGroup, index: usize) -> Result<&Transaction, ApplicationError> {
    Ok(group.member(index)?)
}

fn call_target(txn: &Transaction, index: usize) -> Result<(u64, OnComplete), ApplicationError> {
    match (txn.app_id(), txn.on_completion()) {
        (Some(app_id), Some(on_completion)) => Ok((app_id, on_completion)),
        _ => Err(ApplicationError::NotAnApplicationCall(index)),
    }
}

fn log_rejection(action: &str, app_id: u64, outcome: &CallOutcome) {
    match &outcome.error {
        Some(error) => log::warn!("{} on application {} failed: {}", action, app_id, error),
        None => log::warn!("{} on application {} rejected", action, app_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::expr::{Expr, TxnRef};
    use crate::contract::fields::GlobalField;
    use crate::contract::program::Program;
    use crate::core::state::{StateValue, ValueType};

    fn alice() -> Address {
        Address::derive("alice")
    }

    fn compile(approval: Expr) -> CompiledProgram {
        Program::new(approval, Expr::approve(), 6).compile().unwrap()
    }

    fn create(manager: &mut ApplicationManager, compiled: &CompiledProgram) -> CallOutcome {
        let group = TransactionGroup::single(Transaction::app_create(alice()));
        manager
            .create(
                compiled,
                StateSchema::default(),
                StateSchema::default(),
                &group,
                0,
            )
            .unwrap()
    }

    fn call(manager: &mut ApplicationManager, app_id: u64, action: OnComplete) -> CallOutcome {
        let group = TransactionGroup::single(Transaction::app_call(alice(), app_id, action));
        manager.call(&group, 0).unwrap()
    }

    #[test]
    fn test_create_and_call() {
        let mut manager = ApplicationManager::new();
        let outcome = create(&mut manager, &compile(Expr::approve()));

        assert!(outcome.approved);
        assert_eq!(outcome.app_id, 1);
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.list(), vec![1]);
        assert!(call(&mut manager, 1, OnComplete::NoOp).approved);
    }

    #[test]
    fn test_failed_run_reports_cost_spent() {
        let mut manager = ApplicationManager::new();
        let program = Expr::cond([
            (
                TxnRef::current().application_id().eq(Expr::int(0)).unwrap(),
                Expr::approve(),
            ),
            (Expr::int(0), Expr::approve()),
        ])
        .unwrap();
        let id = create(&mut manager, &compile(program)).app_id;

        // txn, int, ==, bnz, int, bnz, err
        let outcome = call(&mut manager, id, OnComplete::NoOp);
        assert!(!outcome.approved);
        assert_eq!(outcome.error.as_deref(), Some("Program executed err"));
        assert_eq!(outcome.cost, 7);

        manager.set_cost_budget(3);
        let outcome = call(&mut manager, id, OnComplete::NoOp);
        assert!(!outcome.approved);
        assert_eq!(outcome.cost, 4);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn test_rejected_creation_stores_nothing() {
        let mut manager = ApplicationManager::new();
        let program = Expr::seq([
            Expr::global_put("k", Expr::int(1)).unwrap(),
            Expr::reject(),
        ]);
        let outcome = create(&mut manager, &compile(program));

        assert!(!outcome.approved);
        assert_eq!(outcome.app_id, 0);
        assert_eq!(manager.count(), 0);

        // The id was not consumed
        let outcome = create(&mut manager, &compile(Expr::approve()));
        assert_eq!(outcome.app_id, 1);
    }

    #[test]
    fn test_creation_sees_zero_application_id() {
        let mut manager = ApplicationManager::new();
        let program = Expr::seq([
            Expr::global_put("created_as", TxnRef::current().application_id()).unwrap(),
            Expr::global_put("current", Expr::global(GlobalField::CurrentApplicationId))
                .unwrap(),
            Expr::approve(),
        ]);
        let outcome = create(&mut manager, &compile(program));
        let state = manager.get(outcome.app_id).unwrap().state.global();

        assert_eq!(state.get(b"created_as"), Some(&StateValue::Int(0)));
        assert_eq!(state.get(b"current"), Some(&StateValue::Int(0)));
    }

    #[test]
    fn test_failed_call_discards_writes() {
        let mut manager = ApplicationManager::new();
        let program = Expr::cond([
            (
                TxnRef::current().application_id().eq(Expr::int(0)).unwrap(),
                Expr::approve(),
            ),
            (
                Expr::global(GlobalField::Round).gt(Expr::int(100)).unwrap(),
                Expr::seq([
                    Expr::global_put("late", Expr::int(1)).unwrap(),
                    Expr::approve(),
                ]),
            ),
        ])
        .unwrap();
        let id = create(&mut manager, &compile(program)).app_id;

        let outcome = call(&mut manager, id, OnComplete::NoOp);
        assert!(!outcome.approved);
        assert_eq!(outcome.error.as_deref(), Some("Program executed err"));
        assert!(manager.get(id).unwrap().state.global().is_empty());

        manager.set_round(101);
        assert!(call(&mut manager, id, OnComplete::NoOp).approved);
        assert_eq!(
            manager.get(id).unwrap().state.global().get(b"late"),
            Some(&StateValue::Int(1))
        );
    }

    #[test]
    fn test_opt_in_and_close_out() {
        let mut manager = ApplicationManager::new();
        let program = Expr::seq([
            Expr::cond([
                (
                    TxnRef::current()
                        .on_completion()
                        .eq(Expr::on_complete(OnComplete::OptIn))
                        .unwrap(),
                    Expr::local_put(TxnRef::current().sender(), "joined", Expr::int(1)).unwrap(),
                ),
                (Expr::int(1), Expr::seq([])),
            ])
            .unwrap(),
            Expr::approve(),
        ]);
        let id = create(&mut manager, &compile(program)).app_id;

        assert!(call(&mut manager, id, OnComplete::OptIn).approved);
        let app = manager.get(id).unwrap();
        assert!(app.state.is_opted_in(&alice()));
        assert_eq!(
            app.state.local(&alice()).unwrap().get(b"joined"),
            Some(&StateValue::Int(1))
        );

        let group = TransactionGroup::single(Transaction::app_call(alice(), id, OnComplete::OptIn));
        assert!(matches!(
            manager.call(&group, 0),
            Err(ApplicationError::AlreadyOptedIn(_))
        ));

        assert!(call(&mut manager, id, OnComplete::CloseOut).approved);
        assert!(!manager.get(id).unwrap().state.is_opted_in(&alice()));
    }

    #[test]
    fn test_clear_state_always_removes_local_state() {
        let mut manager = ApplicationManager::new();
        let compiled = Program::new(Expr::approve(), Expr::reject(), 6)
            .compile()
            .unwrap();
        let id = create(&mut manager, &compiled).app_id;
        call(&mut manager, id, OnComplete::OptIn);
        assert!(manager.get(id).unwrap().state.is_opted_in(&alice()));

        let outcome = call(&mut manager, id, OnComplete::ClearState);
        assert!(!outcome.approved);
        assert!(!manager.get(id).unwrap().state.is_opted_in(&alice()));
    }

    #[test]
    fn test_delete_and_unsupported_update() {
        let mut manager = ApplicationManager::new();
        let id = create(&mut manager, &compile(Expr::approve())).app_id;

        let group = TransactionGroup::single(Transaction::app_call(
            alice(),
            id,
            OnComplete::UpdateApplication,
        ));
        assert_eq!(
            manager.call(&group, 0),
            Err(ApplicationError::Unsupported("UpdateApplication"))
        );

        assert!(call(&mut manager, id, OnComplete::DeleteApplication).approved);
        assert!(manager.get(id).is_none());

        let group = TransactionGroup::single(Transaction::app_call(alice(), id, OnComplete::NoOp));
        assert_eq!(manager.call(&group, 0), Err(ApplicationError::NotFound(id)));
    }

    #[test]
    fn test_structural_errors() {
        let mut manager = ApplicationManager::new();
        let compiled = compile(Expr::approve());
        let payment = TransactionGroup::single(Transaction::payment(
            alice(),
            Address::derive("bob"),
            5,
        ));
        assert_eq!(
            manager.create(
                &compiled,
                StateSchema::default(),
                StateSchema::default(),
                &payment,
                0
            ),
            Err(ApplicationError::NotAnApplicationCall(0))
        );
        assert!(matches!(
            manager.call(&payment, 3),
            Err(ApplicationError::Transaction(_))
        ));

        let existing = TransactionGroup::single(Transaction::app_call(alice(), 7, OnComplete::NoOp));
        assert_eq!(
            manager.create(
                &compiled,
                StateSchema::default(),
                StateSchema::default(),
                &existing,
                0
            ),
            Err(ApplicationError::NotACreation(7))
        );
    }

    #[test]
    fn test_bytes_read_defaults_to_empty() {
        let mut manager = ApplicationManager::new();
        let program = Expr::seq([
            Expr::global_put(
                "copy",
                Expr::global_get("missing", ValueType::Bytes)
                    .concat(Expr::bytes("!"))
                    .unwrap(),
            )
            .unwrap(),
            Expr::approve(),
        ]);
        let id = create(&mut manager, &compile(program)).app_id;
        assert_eq!(
            manager.get(id).unwrap().state.global().get(b"copy"),
            Some(&StateValue::Bytes(b"!".to_vec()))
        );
    }
}
