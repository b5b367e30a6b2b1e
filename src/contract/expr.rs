//! Expression model
//!
//! Programs are immutable trees of [`Expr`] nodes built bottom-up through
//! checked constructors. Every node carries its inferred [`Type`] and whether
//! all paths through it end in a terminal, so trees can be shared freely
//! (`Expr` is a cheap `Arc` clone, `Send + Sync`) and handed to the compiler.
//!
//! # Example
//!
//! ```rust
//! use tealforge::contract::{Expr, TxnRef};
//!
//! let creating = TxnRef::current().application_id().eq(Expr::int(0)).unwrap();
//! let hello = Expr::seq([
//!     Expr::global_put("Hello", Expr::bytes("World!")).unwrap(),
//!     Expr::approve(),
//! ]);
//! let program = Expr::cond([(creating, hello)]).unwrap();
//! assert!(program.terminates());
//! ```

use crate::contract::compiler::CompileError;
use crate::contract::fields::{GlobalField, TxnField};
use crate::core::state::{readable_bytes, ValueType};
use crate::core::transaction::{OnComplete, TxnType};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Types
// =============================================================================

/// Semantic type of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bytes,
    /// Statement: leaves nothing on the stack
    None,
}

impl Type {
    /// The value type, if this is not a statement
    pub fn value(self) -> Option<ValueType> {
        match self {
            Type::Int => Some(ValueType::Int),
            Type::Bytes => Some(ValueType::Bytes),
            Type::None => None,
        }
    }

    /// Net stack effect a node of this type must have
    pub fn stack_delta(self) -> i64 {
        match self {
            Type::None => 0,
            Type::Int | Type::Bytes => 1,
        }
    }
}

impl From<ValueType> for Type {
    fn from(kind: ValueType) -> Self {
        match kind {
            ValueType::Int => Type::Int,
            ValueType::Bytes => Type::Bytes,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "uint64"),
            Type::Bytes => write!(f, "bytes"),
            Type::None => write!(f, "none"),
        }
    }
}

// =============================================================================
// Node kinds
// =============================================================================

/// Which transaction a field is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxnSource {
    Current,
    /// Group member by position; bounds are only known at execution time
    Group(u8),
}

/// Which key-value store a state node addresses
#[derive(Debug, Clone)]
pub enum Store {
    Global,
    /// Local state of the account the expression evaluates to
    Local(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical not: 1 if zero, 0 otherwise
    Not,
    /// Length of a byte string
    Len,
    /// Integer to 8 big-endian bytes
    Itob,
    /// Big-endian bytes (at most 8) to integer
    Btoi,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Len => "len",
            UnaryOp::Itob => "itob",
            UnaryOp::Btoi => "btoi",
        }
    }

    pub fn operand_type(self) -> Type {
        match self {
            UnaryOp::Not | UnaryOp::Itob => Type::Int,
            UnaryOp::Len | UnaryOp::Btoi => Type::Bytes,
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            UnaryOp::Not | UnaryOp::Len | UnaryOp::Btoi => Type::Int,
            UnaryOp::Itob => Type::Bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Concat,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Concat => "concat",
        }
    }

    /// Operand type the operator requires; `None` means either value type
    pub fn operand_type(self) -> Option<Type> {
        match self {
            BinaryOp::Eq | BinaryOp::Neq => None,
            BinaryOp::Concat => Some(Type::Bytes),
            _ => Some(Type::Int),
        }
    }

    pub fn result_type(self) -> Type {
        match self {
            BinaryOp::Concat => Type::Bytes,
            _ => Type::Int,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Approve,
    Reject,
}

/// Integer constant with a symbolic name in the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedConst {
    TxnType(TxnType),
    OnComplete(OnComplete),
}

impl NamedConst {
    pub fn name(self) -> &'static str {
        match self {
            NamedConst::TxnType(t) => t.name(),
            NamedConst::OnComplete(c) => c.name(),
        }
    }

    pub fn value(self) -> u64 {
        match self {
            NamedConst::TxnType(t) => t.code(),
            NamedConst::OnComplete(c) => c.code(),
        }
    }

    /// Resolve a symbolic constant as written after `int`
    pub fn from_name(name: &str) -> Option<Self> {
        TxnType::from_name(name)
            .map(NamedConst::TxnType)
            .or_else(|| OnComplete::from_name(name).map(NamedConst::OnComplete))
    }
}

/// A tree node
#[derive(Debug, Clone)]
pub enum Node {
    Int(u64),
    Bytes(Vec<u8>),
    Named(NamedConst),
    Txn {
        source: TxnSource,
        field: TxnField,
    },
    Global(GlobalField),
    Unary {
        op: UnaryOp,
        operand: Expr,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    StateRead {
        store: Store,
        key: Vec<u8>,
        kind: ValueType,
    },
    StateWrite {
        store: Store,
        key: Vec<u8>,
        value: Expr,
    },
    Log(Expr),
    Terminal(TerminalKind),
    Seq(Vec<Expr>),
    Cond(Vec<(Expr, Expr)>),
}

impl Node {
    /// Short, human-readable description used in error paths
    pub fn describe(&self) -> String {
        match self {
            Node::Int(v) => format!("int({})", v),
            Node::Bytes(b) => format!("bytes({})", readable_bytes(b)),
            Node::Named(c) => format!("int({})", c.name()),
            Node::Txn {
                source: TxnSource::Current,
                field,
            } => format!("txn.{}", field.name()),
            Node::Txn {
                source: TxnSource::Group(i),
                field,
            } => format!("gtxn[{}].{}", i, field.name()),
            Node::Global(field) => format!("global.{}", field.name()),
            Node::Unary { op, .. } => format!("unary({})", op.symbol()),
            Node::Binary { op, .. } => format!("binary({})", op.symbol()),
            Node::StateRead { store, key, .. } => match store {
                Store::Global => format!("global_get({})", readable_bytes(key)),
                Store::Local(_) => format!("local_get({})", readable_bytes(key)),
            },
            Node::StateWrite { store, key, .. } => match store {
                Store::Global => format!("global_put({})", readable_bytes(key)),
                Store::Local(_) => format!("local_put({})", readable_bytes(key)),
            },
            Node::Log(_) => "log".to_string(),
            Node::Terminal(TerminalKind::Approve) => "approve".to_string(),
            Node::Terminal(TerminalKind::Reject) => "reject".to_string(),
            Node::Seq(_) => "seq".to_string(),
            Node::Cond(_) => "cond".to_string(),
        }
    }
}

// =============================================================================
// Typing rules
// =============================================================================

fn expect_value(expr: &Expr, at: &str) -> Result<Type, CompileError> {
    match expr.ty() {
        Type::None => Err(CompileError::MissingValue {
            node: at.to_string(),
        }),
        ty => Ok(ty),
    }
}

fn expect_type(expr: &Expr, expected: Type, at: &str) -> Result<(), CompileError> {
    let found = expect_value(expr, at)?;
    if found != expected {
        return Err(CompileError::TypeMismatch {
            node: at.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn check_store(store: &Store, at: &str) -> Result<(), CompileError> {
    if let Store::Local(account) = store {
        expect_type(account, Type::Bytes, at)?;
    }
    Ok(())
}

/// Infer `(type, terminates)` of a node from its already-typed children.
/// `at` names the node in any error.
pub(crate) fn infer(node: &Node, at: &str) -> Result<(Type, bool), CompileError> {
    let inferred = match node {
        Node::Int(_) | Node::Named(_) => (Type::Int, false),
        Node::Bytes(_) => (Type::Bytes, false),
        Node::Txn { field, .. } => (field.value_type().into(), false),
        Node::Global(field) => (field.value_type().into(), false),
        Node::Unary { op, operand } => {
            expect_type(operand, op.operand_type(), at)?;
            (op.result_type(), false)
        }
        Node::Binary { op, left, right } => {
            let lhs = expect_value(left, at)?;
            let rhs = expect_value(right, at)?;
            if lhs != rhs {
                return Err(CompileError::TypeMismatch {
                    node: at.to_string(),
                    expected: lhs,
                    found: rhs,
                });
            }
            if let Some(required) = op.operand_type() {
                if lhs != required {
                    return Err(CompileError::TypeMismatch {
                        node: at.to_string(),
                        expected: required,
                        found: lhs,
                    });
                }
            }
            (op.result_type(), false)
        }
        Node::StateRead { store, kind, .. } => {
            check_store(store, at)?;
            ((*kind).into(), false)
        }
        Node::StateWrite { store, value, .. } => {
            check_store(store, at)?;
            expect_value(value, at)?;
            (Type::None, false)
        }
        Node::Log(value) => {
            expect_type(value, Type::Bytes, at)?;
            (Type::None, false)
        }
        Node::Terminal(_) => (Type::None, true),
        Node::Seq(children) => {
            if children.iter().any(Expr::terminates) {
                (Type::None, true)
            } else {
                (children.last().map(Expr::ty).unwrap_or(Type::None), false)
            }
        }
        Node::Cond(arms) => {
            let mut value_type: Option<Type> = None;
            for (predicate, body) in arms {
                expect_type(predicate, Type::Int, at)?;
                if body.terminates() {
                    continue;
                }
                match value_type {
                    None => value_type = Some(body.ty()),
                    Some(expected) if expected != body.ty() => {
                        return Err(CompileError::TypeMismatch {
                            node: at.to_string(),
                            expected,
                            found: body.ty(),
                        });
                    }
                    Some(_) => {}
                }
            }
            match value_type {
                Some(ty) => (ty, false),
                None => (Type::None, true),
            }
        }
    };
    Ok(inferred)
}

// =============================================================================
// Expr
// =============================================================================

#[derive(Debug)]
struct ExprInner {
    node: Node,
    ty: Type,
    terminates: bool,
}

/// Immutable, shareable expression tree
#[derive(Debug, Clone)]
pub struct Expr(Arc<ExprInner>);

impl Expr {
    /// Type-check a node and wrap it
    pub fn build(node: Node) -> Result<Self, CompileError> {
        let (ty, terminates) = infer(&node, &node.describe())?;
        Ok(Self(Arc::new(ExprInner {
            node,
            ty,
            terminates,
        })))
    }

    // Leaves can never fail to type.
    fn leaf(node: Node, ty: Type) -> Self {
        Self(Arc::new(ExprInner {
            node,
            ty,
            terminates: false,
        }))
    }

    pub fn node(&self) -> &Node {
        &self.0.node
    }

    pub fn ty(&self) -> Type {
        self.0.ty
    }

    /// Whether every path through this node ends in approve/reject/fail
    pub fn terminates(&self) -> bool {
        self.0.terminates
    }

    pub fn describe(&self) -> String {
        self.0.node.describe()
    }

    /// Whether two handles point at the same node
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // -------------------------------------------------------------------------
    // Literals and context
    // -------------------------------------------------------------------------

    pub fn int(value: u64) -> Self {
        Self::leaf(Node::Int(value), Type::Int)
    }

    pub fn bytes(value: impl AsRef<[u8]>) -> Self {
        Self::leaf(Node::Bytes(value.as_ref().to_vec()), Type::Bytes)
    }

    /// `TypeEnum` constant, rendered symbolically (`int pay`)
    pub fn txn_type(kind: TxnType) -> Self {
        Self::leaf(Node::Named(NamedConst::TxnType(kind)), Type::Int)
    }

    /// `OnCompletion` constant, rendered symbolically (`int OptIn`)
    pub fn on_complete(action: OnComplete) -> Self {
        Self::leaf(Node::Named(NamedConst::OnComplete(action)), Type::Int)
    }

    pub fn txn(field: TxnField) -> Self {
        Self::leaf(
            Node::Txn {
                source: TxnSource::Current,
                field,
            },
            field.value_type().into(),
        )
    }

    pub fn gtxn(index: u8, field: TxnField) -> Self {
        Self::leaf(
            Node::Txn {
                source: TxnSource::Group(index),
                field,
            },
            field.value_type().into(),
        )
    }

    pub fn global(field: GlobalField) -> Self {
        Self::leaf(Node::Global(field), field.value_type().into())
    }

    // -------------------------------------------------------------------------
    // Operators
    // -------------------------------------------------------------------------

    pub fn unary(op: UnaryOp, operand: Expr) -> Result<Self, CompileError> {
        Self::build(Node::Unary { op, operand })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Result<Self, CompileError> {
        Self::build(Node::Binary { op, left, right })
    }

    pub fn eq(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Eq, self, rhs)
    }

    pub fn ne(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Neq, self, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn le(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Le, self, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Ge, self, rhs)
    }

    pub fn and(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::And, self, rhs)
    }

    pub fn or(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Or, self, rhs)
    }

    pub fn plus(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Add, self, rhs)
    }

    pub fn minus(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Sub, self, rhs)
    }

    pub fn concat(self, rhs: Expr) -> Result<Self, CompileError> {
        Self::binary(BinaryOp::Concat, self, rhs)
    }

    pub fn not(self) -> Result<Self, CompileError> {
        Self::unary(UnaryOp::Not, self)
    }

    pub fn len(self) -> Result<Self, CompileError> {
        Self::unary(UnaryOp::Len, self)
    }

    pub fn itob(self) -> Result<Self, CompileError> {
        Self::unary(UnaryOp::Itob, self)
    }

    pub fn btoi(self) -> Result<Self, CompileError> {
        Self::unary(UnaryOp::Btoi, self)
    }

    // -------------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------------

    /// Read a global key; absent keys read as the zero value of `kind`
    pub fn global_get(key: impl AsRef<[u8]>, kind: ValueType) -> Self {
        Self::leaf(
            Node::StateRead {
                store: Store::Global,
                key: key.as_ref().to_vec(),
                kind,
            },
            kind.into(),
        )
    }

    /// Read a local key of `account`; absent keys read as the zero value
    pub fn local_get(
        account: Expr,
        key: impl AsRef<[u8]>,
        kind: ValueType,
    ) -> Result<Self, CompileError> {
        Self::build(Node::StateRead {
            store: Store::Local(account),
            key: key.as_ref().to_vec(),
            kind,
        })
    }

    pub fn global_put(key: impl AsRef<[u8]>, value: Expr) -> Result<Self, CompileError> {
        Self::build(Node::StateWrite {
            store: Store::Global,
            key: key.as_ref().to_vec(),
            value,
        })
    }

    pub fn local_put(
        account: Expr,
        key: impl AsRef<[u8]>,
        value: Expr,
    ) -> Result<Self, CompileError> {
        Self::build(Node::StateWrite {
            store: Store::Local(account),
            key: key.as_ref().to_vec(),
            value,
        })
    }

    /// Emit a Bytes value as an observable log event
    pub fn log(value: Expr) -> Result<Self, CompileError> {
        Self::build(Node::Log(value))
    }

    // -------------------------------------------------------------------------
    // Control flow
    // -------------------------------------------------------------------------

    pub fn approve() -> Self {
        Self(Arc::new(ExprInner {
            node: Node::Terminal(TerminalKind::Approve),
            ty: Type::None,
            terminates: true,
        }))
    }

    pub fn reject() -> Self {
        Self(Arc::new(ExprInner {
            node: Node::Terminal(TerminalKind::Reject),
            ty: Type::None,
            terminates: true,
        }))
    }

    /// Evaluate children in order; the value is that of the last child
    pub fn seq(children: impl IntoIterator<Item = Expr>) -> Self {
        let node = Node::Seq(children.into_iter().collect());
        // Sequencing accepts any child types.
        let (ty, terminates) = match &node {
            Node::Seq(children) if children.iter().any(Expr::terminates) => (Type::None, true),
            Node::Seq(children) => (children.last().map(Expr::ty).unwrap_or(Type::None), false),
            _ => (Type::None, false),
        };
        Self(Arc::new(ExprInner {
            node,
            ty,
            terminates,
        }))
    }

    /// Ordered multi-way dispatch: the body of the first truthy predicate
    /// runs; if none matches the program fails
    pub fn cond(arms: impl IntoIterator<Item = (Expr, Expr)>) -> Result<Self, CompileError> {
        Self::build(Node::Cond(arms.into_iter().collect()))
    }
}

/// Convenience accessor over one transaction, e.g. `TxnRef::group(1).amount()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnRef(TxnSource);

impl TxnRef {
    pub fn current() -> Self {
        Self(TxnSource::Current)
    }

    pub fn group(index: u8) -> Self {
        Self(TxnSource::Group(index))
    }

    pub fn field(&self, field: TxnField) -> Expr {
        match self.0 {
            TxnSource::Current => Expr::txn(field),
            TxnSource::Group(index) => Expr::gtxn(index, field),
        }
    }

    pub fn sender(&self) -> Expr {
        self.field(TxnField::Sender)
    }

    pub fn fee(&self) -> Expr {
        self.field(TxnField::Fee)
    }

    pub fn receiver(&self) -> Expr {
        self.field(TxnField::Receiver)
    }

    pub fn amount(&self) -> Expr {
        self.field(TxnField::Amount)
    }

    pub fn type_enum(&self) -> Expr {
        self.field(TxnField::TypeEnum)
    }

    pub fn tx_id(&self) -> Expr {
        self.field(TxnField::TxId)
    }

    pub fn group_index(&self) -> Expr {
        self.field(TxnField::GroupIndex)
    }

    pub fn application_id(&self) -> Expr {
        self.field(TxnField::ApplicationId)
    }

    pub fn on_completion(&self) -> Expr {
        self.field(TxnField::OnCompletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_types() {
        assert_eq!(Expr::int(5).ty(), Type::Int);
        assert_eq!(Expr::bytes("x").ty(), Type::Bytes);
        assert_eq!(Expr::txn(TxnField::Sender).ty(), Type::Bytes);
        assert_eq!(Expr::global(GlobalField::Round).ty(), Type::Int);
        assert_eq!(Expr::txn_type(TxnType::Payment).ty(), Type::Int);
    }

    #[test]
    fn test_binary_rejects_mismatched_operands() {
        let err = Expr::int(1).eq(Expr::bytes("1")).unwrap_err();
        assert!(matches!(
            err,
            CompileError::TypeMismatch {
                expected: Type::Int,
                found: Type::Bytes,
                ..
            }
        ));
    }

    #[test]
    fn test_logic_ops_require_ints() {
        assert!(Expr::bytes("a").and(Expr::bytes("b")).is_err());
        assert!(Expr::int(1).and(Expr::int(0)).is_ok());
        assert!(Expr::int(1).concat(Expr::int(2)).is_err());
        assert_eq!(
            Expr::bytes("a").concat(Expr::bytes("b")).unwrap().ty(),
            Type::Bytes
        );
        // Equality works on both value types
        assert!(Expr::bytes("a").eq(Expr::bytes("b")).is_ok());
    }

    #[test]
    fn test_statement_is_not_a_value() {
        let err = Expr::approve().eq(Expr::int(1)).unwrap_err();
        assert!(matches!(err, CompileError::MissingValue { .. }));

        let write = Expr::global_put("k", Expr::int(1)).unwrap();
        assert_eq!(write.ty(), Type::None);
        assert!(Expr::global_put("k", write).is_err());
    }

    #[test]
    fn test_log_requires_bytes() {
        assert!(Expr::log(Expr::int(1)).is_err());
        assert!(Expr::log(Expr::bytes("hi")).is_ok());
    }

    #[test]
    fn test_local_account_must_be_bytes() {
        assert!(Expr::local_put(Expr::int(0), "k", Expr::int(1)).is_err());
        let put = Expr::local_put(TxnRef::current().sender(), "k", Expr::int(1)).unwrap();
        assert_eq!(put.ty(), Type::None);
    }

    #[test]
    fn test_seq_type_and_termination() {
        let seq = Expr::seq([Expr::global_put("a", Expr::int(1)).unwrap(), Expr::int(3)]);
        assert_eq!(seq.ty(), Type::Int);
        assert!(!seq.terminates());

        let seq = Expr::seq([Expr::approve(), Expr::int(3)]);
        assert!(seq.terminates());
        assert_eq!(seq.ty(), Type::None);

        assert_eq!(Expr::seq([]).ty(), Type::None);
    }

    #[test]
    fn test_cond_predicates_must_be_ints() {
        let err = Expr::cond([(Expr::bytes("yes"), Expr::approve())]).unwrap_err();
        assert!(matches!(err, CompileError::TypeMismatch { .. }));
    }

    #[test]
    fn test_cond_arm_types_unify() {
        let value = Expr::cond([
            (Expr::int(1), Expr::int(10)),
            (Expr::int(1), Expr::reject()),
            (Expr::int(1), Expr::int(20)),
        ])
        .unwrap();
        assert_eq!(value.ty(), Type::Int);
        assert!(!value.terminates());

        let mixed = Expr::cond([
            (Expr::int(1), Expr::int(10)),
            (Expr::int(1), Expr::bytes("x")),
        ]);
        assert!(mixed.is_err());
    }

    #[test]
    fn test_cond_without_arms_terminates() {
        let empty = Expr::cond(Vec::new()).unwrap();
        assert!(empty.terminates());
        assert_eq!(empty.ty(), Type::None);
    }

    #[test]
    fn test_shared_subtrees() {
        let payment = TxnRef::group(1);
        let amount = payment.amount();
        let a = Expr::global_put("A", amount.clone()).unwrap();
        let b = Expr::global_put("B", amount.clone()).unwrap();
        match (a.node(), b.node()) {
            (Node::StateWrite { value: va, .. }, Node::StateWrite { value: vb, .. }) => {
                assert!(va.ptr_eq(vb));
            }
            _ => panic!("expected state writes"),
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(TxnRef::group(1).amount().describe(), "gtxn[1].Amount");
        assert_eq!(
            Expr::global_put("Hello", Expr::bytes("World!"))
                .unwrap()
                .describe(),
            "global_put(\"Hello\")"
        );
        assert_eq!(NamedConst::from_name("pay").map(|c| c.value()), Some(1));
        assert_eq!(NamedConst::from_name("OptIn").map(|c| c.value()), Some(1));
    }
}
