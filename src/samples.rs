//! Sample programs
//!
//! Three ready-made approval programs, each paired with an approve-only
//! clear-state program:
//! - `approve`: accepts every call
//! - `echo`: records the round globally and in the caller's local state,
//!   then logs a greeting
//! - `router`: on creation stores a greeting; afterwards accepts only when
//!   the second group member is a payment, recording its id and amount

use crate::contract::{CompileError, Expr, GlobalField, Program, TxnRef};
use crate::core::state::StateSchema;
use crate::core::transaction::{OnComplete, TxnType};
use serde::{Deserialize, Serialize};

/// Default program version for samples
pub const DEFAULT_VERSION: u8 = 6;

/// Available sample programs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Approve,
    Echo,
    Router,
}

impl Template {
    pub const ALL: [Template; 3] = [Template::Approve, Template::Echo, Template::Router];

    pub fn name(self) -> &'static str {
        match self {
            Template::Approve => "approve",
            Template::Echo => "echo",
            Template::Router => "router",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Template::Approve => "Approves every call",
            Template::Echo => "Stores the round globally and locally, logs a greeting",
            Template::Router => "Creation stores a greeting; calls need a payment as member 1",
        }
    }

    /// Approval program tree
    pub fn approval(self) -> Result<Expr, CompileError> {
        match self {
            Template::Approve => Ok(Expr::approve()),
            Template::Echo => echo(),
            Template::Router => router(),
        }
    }

    /// Clear-state program tree
    pub fn clear_state(self) -> Expr {
        Expr::approve()
    }

    pub fn program(self, version: u8) -> Result<Program, CompileError> {
        Ok(Program::new(self.approval()?, self.clear_state(), version))
    }

    /// Global and local schemas the program needs
    pub fn schemas(self) -> (StateSchema, StateSchema) {
        match self {
            Template::Approve => (StateSchema::new(0, 0), StateSchema::new(0, 0)),
            Template::Echo => (StateSchema::new(1, 0), StateSchema::new(1, 0)),
            Template::Router => (StateSchema::new(1, 2), StateSchema::new(0, 0)),
        }
    }

    /// On-completion action a creation call should use. Echo writes the
    /// creator's local state, so its creator opts in while creating.
    pub fn create_action(self) -> OnComplete {
        match self {
            Template::Echo => OnComplete::OptIn,
            Template::Approve | Template::Router => OnComplete::NoOp,
        }
    }
}

fn echo() -> Result<Expr, CompileError> {
    let round = Expr::global(GlobalField::Round);
    Ok(Expr::seq([
        Expr::global_put("globalRound", round.clone())?,
        Expr::local_put(TxnRef::current().sender(), "localRound", round)?,
        Expr::log(Expr::bytes("Hello World!"))?,
        Expr::approve(),
    ]))
}

fn router() -> Result<Expr, CompileError> {
    let payment = TxnRef::group(1);

    let on_create = Expr::seq([
        Expr::global_put("Hello", Expr::bytes("World!"))?,
        Expr::approve(),
    ]);
    let on_payment = Expr::seq([
        Expr::global_put("TX", payment.tx_id())?,
        Expr::global_put("Amount", payment.amount())?,
        Expr::approve(),
    ]);

    Expr::cond([
        (
            TxnRef::current().application_id().eq(Expr::int(0))?,
            on_create,
        ),
        (
            payment.type_enum().eq(Expr::txn_type(TxnType::Payment))?,
            on_payment,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{compile_program, ApplicationManager, CallOutcome, CompiledProgram};
    use crate::core::state::StateValue;
    use crate::core::transaction::{Address, Transaction, TransactionGroup};
    use rand::Rng;

    const ROUTER_LISTING: &str = "#pragma version 6
txn ApplicationID
int 0
==
bnz main_l1
gtxn 1 TypeEnum
int pay
==
bnz main_l2
err
main_l1:
byte \"Hello\"
byte \"World!\"
app_global_put
int 1
return
main_l2:
byte \"TX\"
gtxn 1 TxID
app_global_put
byte \"Amount\"
gtxn 1 Amount
app_global_put
int 1
return
";

    const ECHO_LISTING: &str = "#pragma version 6
byte \"globalRound\"
global Round
app_global_put
txn Sender
byte \"localRound\"
global Round
app_local_put
byte \"Hello World!\"
log
int 1
return
";

    fn creator() -> Address {
        Address::derive("creator")
    }

    fn compiled(template: Template) -> CompiledProgram {
        template.program(DEFAULT_VERSION).unwrap().compile().unwrap()
    }

    fn deploy(manager: &mut ApplicationManager, template: Template) -> u64 {
        let (global, local) = template.schemas();
        let create = Transaction::app_call(creator(), 0, template.create_action());
        let group = TransactionGroup::single(create);
        let outcome = manager
            .create(&compiled(template), global, local, &group, 0)
            .unwrap();
        assert!(outcome.approved, "{:?}", outcome);
        outcome.app_id
    }

    fn deploy_tree(manager: &mut ApplicationManager, approval: Expr) -> CallOutcome {
        let compiled = Program::new(approval, Expr::approve(), DEFAULT_VERSION)
            .compile()
            .unwrap();
        let group = TransactionGroup::single(Transaction::app_create(creator()));
        manager
            .create(
                &compiled,
                StateSchema::default(),
                StateSchema::default(),
                &group,
                0,
            )
            .unwrap()
    }

    #[test]
    fn test_exact_listings() {
        let approve = compiled(Template::Approve);
        assert_eq!(approve.approval, "#pragma version 6\nint 1\nreturn\n");
        assert_eq!(approve.clear_state, "#pragma version 6\nint 1\nreturn\n");

        assert_eq!(compiled(Template::Echo).approval, ECHO_LISTING);
        assert_eq!(compiled(Template::Router).approval, ROUTER_LISTING);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        for template in Template::ALL {
            assert_eq!(compiled(template), compiled(template));
        }
    }

    #[test]
    fn test_echo_needs_log_support() {
        let tree = Template::Echo.approval().unwrap();
        assert!(matches!(
            compile_program(&tree, 4),
            Err(CompileError::UnsupportedAtVersion { required: 5, .. })
        ));
    }

    #[test]
    fn test_approve_accepts_any_transaction() {
        let mut manager = ApplicationManager::new();
        let id = deploy(&mut manager, Template::Approve);
        let mut rng = rand::thread_rng();

        for _ in 0..25 {
            let sender = Address::derive(&format!("user{}", rng.gen_range(0..1000)));
            let args = (0..rng.gen_range(0..4))
                .map(|i| format!("arg{}", i))
                .collect();
            let call = Transaction::app_call(sender, id, OnComplete::NoOp)
                .with_fee(rng.gen_range(1000..5000))
                .with_note(format!("note {}", rng.gen::<u32>()))
                .with_args(args);
            let outcome = manager.call(&TransactionGroup::single(call), 0).unwrap();
            assert!(outcome.approved);
        }
    }

    #[test]
    fn test_first_truthy_arm_wins() {
        let mut manager = ApplicationManager::new();
        let approval = Expr::cond([
            (
                Expr::int(1),
                Expr::seq([
                    Expr::global_put("arm", Expr::bytes("first")).unwrap(),
                    Expr::approve(),
                ]),
            ),
            (
                Expr::int(1),
                Expr::seq([
                    Expr::global_put("arm", Expr::bytes("second")).unwrap(),
                    Expr::global_put("second", Expr::int(1)).unwrap(),
                    Expr::approve(),
                ]),
            ),
        ])
        .unwrap();
        let id = deploy_tree(&mut manager, approval).app_id;
        let global = manager.get(id).unwrap().state.global();

        assert_eq!(global.get(b"arm"), Some(&StateValue::from("first")));
        assert!(global.get(b"second").is_none());
    }

    #[test]
    fn test_later_arm_wins_and_later_predicates_skip() {
        let mut manager = ApplicationManager::new();
        let predicate = |key: &str, truthy: u64| {
            Expr::seq([
                Expr::global_put(key, Expr::int(1)).unwrap(),
                Expr::int(truthy),
            ])
        };
        let body = |key: &str| {
            Expr::seq([
                Expr::global_put(key, Expr::int(1)).unwrap(),
                Expr::approve(),
            ])
        };
        let approval = Expr::cond([
            (predicate("p1", 0), body("b1")),
            (predicate("p2", 1), body("b2")),
            (predicate("p3", 1), body("b3")),
        ])
        .unwrap();

        let outcome = deploy_tree(&mut manager, approval);
        assert!(outcome.approved, "{:?}", outcome);
        let global = manager.get(outcome.app_id).unwrap().state.global();

        for present in ["p1", "p2", "b2"] {
            assert!(global.get(present.as_bytes()).is_some(), "{} missing", present);
        }
        for absent in ["p3", "b1", "b3"] {
            assert!(global.get(absent.as_bytes()).is_none(), "{} written", absent);
        }
        assert_eq!(global.len(), 3);
    }

    #[test]
    fn test_unmatched_cond_rejects_without_writes() {
        let mut manager = ApplicationManager::new();
        let id = deploy(&mut manager, Template::Router);

        // Second member is not a payment
        let group = TransactionGroup::new(vec![
            Transaction::app_call(creator(), id, OnComplete::NoOp),
            Transaction::key_registration(creator()),
        ])
        .unwrap();
        let outcome = manager.call(&group, 0).unwrap();

        assert!(!outcome.approved);
        assert!(outcome.error.is_some());
        let global = manager.get(id).unwrap().state.global();
        assert!(global.get(b"TX").is_none());
        assert!(global.get(b"Amount").is_none());
    }

    #[test]
    fn test_router_without_second_member_fails() {
        let mut manager = ApplicationManager::new();
        let id = deploy(&mut manager, Template::Router);
        let group = TransactionGroup::single(Transaction::app_call(creator(), id, OnComplete::NoOp));

        let outcome = manager.call(&group, 0).unwrap();
        assert!(!outcome.approved);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Group index 1 out of range for group of 1")
        );
    }

    #[test]
    fn test_router_creation_stores_greeting() {
        let mut manager = ApplicationManager::new();
        let id = deploy(&mut manager, Template::Router);
        let global = manager.get(id).unwrap().state.global();

        assert_eq!(global.get(b"Hello"), Some(&StateValue::from("World!")));
        assert_eq!(global.len(), 1);
    }

    #[test]
    fn test_router_records_payment() {
        let mut manager = ApplicationManager::new();
        let id = deploy(&mut manager, Template::Router);
        let payment = Transaction::payment(creator(), Address::derive("shop"), 2500);
        let group = TransactionGroup::new(vec![
            Transaction::app_call(creator(), id, OnComplete::NoOp),
            payment.clone(),
        ])
        .unwrap();

        assert!(manager.call(&group, 0).unwrap().approved);
        let global = manager.get(id).unwrap().state.global();
        assert_eq!(global.get(b"Amount"), Some(&StateValue::Int(2500)));
        assert_eq!(
            global.get(b"TX"),
            Some(&StateValue::Bytes(payment.tx_id().to_vec()))
        );
        assert_eq!(global.get(b"Hello"), Some(&StateValue::from("World!")));
    }

    #[test]
    fn test_echo_round_matches_globally_and_locally() {
        let mut manager = ApplicationManager::new();
        manager.set_round(42);
        let id = deploy(&mut manager, Template::Echo);

        let user = Address::derive("user");
        manager.set_round(57);
        let group = TransactionGroup::single(Transaction::app_call(user, id, OnComplete::OptIn));
        let outcome = manager.call(&group, 0).unwrap();
        assert!(outcome.approved);
        assert_eq!(outcome.logs, vec![b"Hello World!".to_vec()]);

        let state = &manager.get(id).unwrap().state;
        let global = state.global().get(b"globalRound");
        let local = state.local(&user).and_then(|s| s.get(b"localRound"));
        assert_eq!(global, Some(&StateValue::Int(57)));
        assert_eq!(global, local);

        // The creator's entry still holds the creation round
        let creator_local = state.local(&creator()).and_then(|s| s.get(b"localRound"));
        assert_eq!(creator_local, Some(&StateValue::Int(42)));
    }

    #[test]
    fn test_unequal_literals_reject() {
        let mut manager = ApplicationManager::new();
        let approval = Expr::cond([(Expr::int(3).eq(Expr::int(4)).unwrap(), Expr::approve())])
            .unwrap();
        let outcome = deploy_tree(&mut manager, approval);

        assert!(!outcome.approved);
        assert_eq!(manager.count(), 0);
    }
}
