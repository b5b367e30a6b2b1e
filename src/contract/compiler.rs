//! Program compiler
//!
//! Lowers a validated expression tree to a versioned instruction listing.
//! Each compilation runs four phases over an explicit [`CompileContext`]:
//!
//! 1. **TypeCheck** re-infers types bottom-up, registers state key types and
//!    proves every path ends in a terminal
//! 2. **Lower** emits instructions post-order while simulating stack depth
//! 3. **EmitLabels** names jump targets `main_l1`, `main_l2`, ... in
//!    definition order
//! 4. **Finalize** gates every instruction by the target version
//!
//! Nothing is emitted unless all four phases succeed.

use crate::contract::expr::{
    infer, BinaryOp, Expr, Node, Store, TerminalKind, TxnSource, Type, UnaryOp,
};
use crate::contract::opcodes::{
    Instruction, Line, Listing, OpCode, MAX_PROGRAM_VERSION, MIN_PROGRAM_VERSION,
};
use crate::core::state::{readable_bytes, ValueType};
use crate::core::transaction::MAX_GROUP_SIZE;
use std::collections::HashMap;
use thiserror::Error;

/// Prefix of generated label names
const LABEL_PREFIX: &str = "main_l";

/// Compile errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Type mismatch at {node}: expected {expected}, found {found}")]
    TypeMismatch {
        node: String,
        expected: Type,
        found: Type,
    },

    #[error("Missing value at {node}: a statement cannot be used as a value")]
    MissingValue { node: String },

    #[error("Path through {node} ends without approve or reject")]
    UnreachableTerminal { node: String },

    #[error("Stack imbalance at {node}: expected depth change {expected}, got {actual}")]
    StackImbalance {
        node: String,
        expected: i64,
        actual: i64,
    },

    #[error("'{op}' at {node} requires version {required}, program targets version {available}")]
    UnsupportedAtVersion {
        node: String,
        op: String,
        required: u8,
        available: u8,
    },

    #[error("Invalid program version {0} (supported: 1 to 8)")]
    InvalidVersion(u8),

    #[error("Jump to undefined label #{0}")]
    UndefinedLabel(usize),
}

// =============================================================================
// Context
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeySpace {
    Global,
    Local,
}

/// Opaque label handle, named during EmitLabels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct LabelId(usize);

/// Lowered item before labels are named
#[derive(Debug, Clone)]
enum Item {
    Op {
        instruction: Instruction,
        origin: String,
    },
    Jump {
        op: OpCode,
        target: LabelId,
        origin: String,
    },
    Mark(LabelId),
}

/// State threaded through the phases of one compilation
#[derive(Debug)]
pub struct CompileContext {
    version: u8,
    next_label: usize,
    key_types: HashMap<(KeySpace, Vec<u8>), ValueType>,
    path: Vec<String>,
    items: Vec<Item>,
    /// Simulated stack depth; `None` once control cannot reach the cursor
    depth: Option<i64>,
    label_depths: HashMap<LabelId, i64>,
}

impl CompileContext {
    fn new(version: u8, root: &str) -> Self {
        Self {
            version,
            next_label: 0,
            key_types: HashMap::new(),
            path: vec![root.to_string()],
            items: Vec::new(),
            depth: Some(0),
            label_depths: HashMap::new(),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Current node path, e.g. `approval / cond / then1:seq`
    pub fn path(&self) -> String {
        self.path.join(" / ")
    }

    fn enter(&mut self, role: &str, expr: &Expr) {
        self.path.push(format!("{}{}", role, expr.describe()));
    }

    fn leave(&mut self) {
        self.path.pop();
    }

    // -------------------------------------------------------------------------
    // Key type environment
    // -------------------------------------------------------------------------

    fn register_key(
        &mut self,
        space: KeySpace,
        key: &[u8],
        kind: ValueType,
    ) -> Result<(), CompileError> {
        match self.key_types.get(&(space, key.to_vec())) {
            Some(&registered) if registered != kind => Err(CompileError::TypeMismatch {
                node: format!("{} (key {})", self.path(), readable_bytes(key)),
                expected: registered.into(),
                found: kind.into(),
            }),
            Some(_) => Ok(()),
            None => {
                self.key_types.insert((space, key.to_vec()), kind);
                Ok(())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Emission with simulated stack
    // -------------------------------------------------------------------------

    fn new_label(&mut self) -> LabelId {
        let id = LabelId(self.next_label);
        self.next_label += 1;
        id
    }

    fn imbalance(&self, expected: i64, actual: i64) -> CompileError {
        CompileError::StackImbalance {
            node: self.path(),
            expected,
            actual,
        }
    }

    fn emit(&mut self, instruction: Instruction) -> Result<(), CompileError> {
        if let Some(depth) = self.depth {
            let (pops, pushes) = instruction.op.stack_effect();
            let (pops, pushes) = (pops as i64, pushes as i64);
            if depth < pops {
                return Err(self.imbalance(-pops, -depth));
            }
            self.depth = if instruction.op.ends_block() {
                None
            } else {
                Some(depth - pops + pushes)
            };
        }
        self.items.push(Item::Op {
            instruction,
            origin: self.path(),
        });
        Ok(())
    }

    fn emit_jump(&mut self, op: OpCode, target: LabelId) -> Result<(), CompileError> {
        if let Some(depth) = self.depth {
            let (pops, _) = op.stack_effect();
            let after = depth - pops as i64;
            if after < 0 {
                return Err(self.imbalance(-(pops as i64), -depth));
            }
            self.record_arrival(target, after)?;
            self.depth = if op.ends_block() { None } else { Some(after) };
        }
        self.items.push(Item::Jump {
            op,
            target,
            origin: self.path(),
        });
        Ok(())
    }

    fn record_arrival(&mut self, label: LabelId, depth: i64) -> Result<(), CompileError> {
        match self.label_depths.get(&label) {
            Some(&known) if known != depth => Err(self.imbalance(known, depth)),
            Some(_) => Ok(()),
            None => {
                self.label_depths.insert(label, depth);
                Ok(())
            }
        }
    }

    fn mark(&mut self, label: LabelId) -> Result<(), CompileError> {
        if let Some(depth) = self.depth {
            self.record_arrival(label, depth)?;
        }
        self.depth = self.label_depths.get(&label).copied();
        self.items.push(Item::Mark(label));
        Ok(())
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Compiles expression trees for one target version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compiler {
    version: u8,
}

impl Compiler {
    /// Create a compiler for a program version
    pub fn new(version: u8) -> Result<Self, CompileError> {
        if !(MIN_PROGRAM_VERSION..=MAX_PROGRAM_VERSION).contains(&version) {
            return Err(CompileError::InvalidVersion(version));
        }
        Ok(Self { version })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Compile a tree into a listing
    pub fn compile(&self, root: &Expr) -> Result<Listing, CompileError> {
        self.compile_named("program", root)
    }

    /// Compile a tree, naming its root `name` in error paths
    pub fn compile_named(&self, name: &str, root: &Expr) -> Result<Listing, CompileError> {
        let mut ctx = CompileContext::new(self.version, name);

        type_check(&mut ctx, root)?;
        if !root.terminates() {
            return Err(CompileError::UnreachableTerminal {
                node: fall_through_path(name, root),
            });
        }
        log::debug!("{}: type check passed", name);

        lower(&mut ctx, root)?;
        log::debug!("{}: lowered to {} items", name, ctx.items.len());

        let lines = emit_labels(&ctx.items)?;
        let listing = finalize(&ctx, lines)?;
        log::debug!(
            "{}: {} instructions at version {}",
            name,
            listing.instruction_count(),
            listing.version
        );
        Ok(listing)
    }

    /// Compile a tree straight to listing text
    pub fn compile_to_text(&self, root: &Expr) -> Result<String, CompileError> {
        Ok(self.compile(root)?.to_string())
    }
}

/// Compile one tree at a version, returning the listing text
pub fn compile_program(root: &Expr, version: u8) -> Result<String, CompileError> {
    Compiler::new(version)?.compile_to_text(root)
}

// =============================================================================
// Phase 1: TypeCheck
// =============================================================================

fn children(expr: &Expr) -> Vec<(String, &Expr)> {
    match expr.node() {
        Node::Int(_) | Node::Bytes(_) | Node::Named(_) | Node::Txn { .. } | Node::Global(_) => {
            Vec::new()
        }
        Node::Terminal(_) => Vec::new(),
        Node::Unary { operand, .. } => vec![(String::new(), operand)],
        Node::Binary { left, right, .. } => {
            vec![("lhs:".to_string(), left), ("rhs:".to_string(), right)]
        }
        Node::StateRead { store, .. } => match store {
            Store::Local(account) => vec![("account:".to_string(), account)],
            Store::Global => Vec::new(),
        },
        Node::StateWrite { store, value, .. } => {
            let mut out = Vec::new();
            if let Store::Local(account) = store {
                out.push(("account:".to_string(), account));
            }
            out.push(("value:".to_string(), value));
            out
        }
        Node::Log(value) => vec![(String::new(), value)],
        Node::Seq(items) => items
            .iter()
            .enumerate()
            .map(|(i, child)| (format!("{}:", i), child))
            .collect(),
        Node::Cond(arms) => arms
            .iter()
            .enumerate()
            .flat_map(|(i, (predicate, body))| {
                [(format!("when{}:", i), predicate), (format!("then{}:", i), body)]
            })
            .collect(),
    }
}

fn type_check(ctx: &mut CompileContext, expr: &Expr) -> Result<(), CompileError> {
    for (role, child) in children(expr) {
        ctx.enter(&role, child);
        type_check(ctx, child)?;
        ctx.leave();
    }

    let (ty, terminates) = infer(expr.node(), &ctx.path())?;
    if ty != expr.ty() || terminates != expr.terminates() {
        return Err(CompileError::TypeMismatch {
            node: ctx.path(),
            expected: expr.ty(),
            found: ty,
        });
    }

    match expr.node() {
        Node::StateRead { store, key, kind } => {
            ctx.register_key(key_space(store), key, *kind)?;
        }
        Node::StateWrite { store, key, value } => {
            if let Some(kind) = value.ty().value() {
                ctx.register_key(key_space(store), key, kind)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn key_space(store: &Store) -> KeySpace {
    match store {
        Store::Global => KeySpace::Global,
        Store::Local(_) => KeySpace::Local,
    }
}

/// Path of the first node through which control falls off the end
fn fall_through_path(root_name: &str, root: &Expr) -> String {
    let mut path = vec![root_name.to_string()];
    let mut current = root;
    loop {
        let next = match current.node() {
            Node::Seq(items) => items
                .iter()
                .enumerate()
                .last()
                .map(|(i, child)| (format!("{}:", i), child)),
            Node::Cond(arms) => arms
                .iter()
                .enumerate()
                .find(|(_, (_, body))| !body.terminates())
                .map(|(i, (_, body))| (format!("then{}:", i), body)),
            _ => None,
        };
        match next {
            Some((role, child)) => {
                path.push(format!("{}{}", role, child.describe()));
                current = child;
            }
            None => return path.join(" / "),
        }
    }
}

// =============================================================================
// Phase 2: Lower
// =============================================================================

fn unary_opcode(op: UnaryOp) -> OpCode {
    match op {
        UnaryOp::Not => OpCode::Not,
        UnaryOp::Len => OpCode::Len,
        UnaryOp::Itob => OpCode::Itob,
        UnaryOp::Btoi => OpCode::Btoi,
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Eq => OpCode::Eq,
        BinaryOp::Neq => OpCode::Neq,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Le => OpCode::Le,
        BinaryOp::Ge => OpCode::Ge,
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::And => OpCode::And,
        BinaryOp::Or => OpCode::Or,
        BinaryOp::Concat => OpCode::Concat,
    }
}

fn lower_child(ctx: &mut CompileContext, role: &str, expr: &Expr) -> Result<(), CompileError> {
    ctx.enter(role, expr);
    let result = lower(ctx, expr);
    ctx.leave();
    result
}

fn lower(ctx: &mut CompileContext, expr: &Expr) -> Result<(), CompileError> {
    let before = ctx.depth;
    lower_node(ctx, expr)?;

    // Terminating nodes leave nothing to balance.
    if expr.terminates() {
        return Ok(());
    }
    if let (Some(before), Some(after)) = (before, ctx.depth) {
        let expected = expr.ty().stack_delta();
        if after - before != expected {
            return Err(ctx.imbalance(expected, after - before));
        }
    }
    Ok(())
}

fn lower_node(ctx: &mut CompileContext, expr: &Expr) -> Result<(), CompileError> {
    match expr.node() {
        Node::Int(value) => ctx.emit(Instruction::int(*value)),
        Node::Named(constant) => ctx.emit(Instruction::named_int(constant.name(), constant.value())),
        Node::Bytes(value) => ctx.emit(Instruction::bytes(value.clone())),
        Node::Txn {
            source: TxnSource::Current,
            field,
        } => ctx.emit(Instruction::txn(*field)),
        Node::Txn {
            source: TxnSource::Group(index),
            field,
        } => {
            if *index as usize >= MAX_GROUP_SIZE {
                log::warn!(
                    "{}: group index {} can never be in range (max group size {})",
                    ctx.path(),
                    index,
                    MAX_GROUP_SIZE
                );
            }
            ctx.emit(Instruction::gtxn(*index, *field))
        }
        Node::Global(field) => ctx.emit(Instruction::global(*field)),
        Node::Unary { op, operand } => {
            lower_child(ctx, "", operand)?;
            ctx.emit(Instruction::simple(unary_opcode(*op)))
        }
        Node::Binary { op, left, right } => {
            lower_child(ctx, "lhs:", left)?;
            lower_child(ctx, "rhs:", right)?;
            ctx.emit(Instruction::simple(binary_opcode(*op)))
        }
        Node::StateRead { store, key, kind } => lower_state_read(ctx, store, key, *kind),
        Node::StateWrite { store, key, value } => {
            let op = match store {
                Store::Global => OpCode::AppGlobalPut,
                Store::Local(account) => {
                    lower_child(ctx, "account:", account)?;
                    OpCode::AppLocalPut
                }
            };
            ctx.emit(Instruction::bytes(key.clone()))?;
            lower_child(ctx, "value:", value)?;
            ctx.emit(Instruction::simple(op))
        }
        Node::Log(value) => {
            lower_child(ctx, "", value)?;
            ctx.emit(Instruction::simple(OpCode::Log))
        }
        Node::Terminal(kind) => {
            let flag = match kind {
                TerminalKind::Approve => 1,
                TerminalKind::Reject => 0,
            };
            ctx.emit(Instruction::int(flag))?;
            ctx.emit(Instruction::simple(OpCode::Return))
        }
        Node::Seq(items) => lower_seq(ctx, items),
        Node::Cond(arms) => lower_cond(ctx, arms),
    }
}

/// Int reads use the plain getter (absent reads as 0); Bytes reads use the
/// `_ex` form and substitute `""` when the key is absent.
fn lower_state_read(
    ctx: &mut CompileContext,
    store: &Store,
    key: &[u8],
    kind: ValueType,
) -> Result<(), CompileError> {
    if let Store::Local(account) = store {
        lower_child(ctx, "account:", account)?;
    }
    let local = matches!(store, Store::Local(_));

    match kind {
        ValueType::Int => {
            ctx.emit(Instruction::bytes(key.to_vec()))?;
            let op = if local {
                OpCode::AppLocalGet
            } else {
                OpCode::AppGlobalGet
            };
            ctx.emit(Instruction::simple(op))
        }
        ValueType::Bytes => {
            let present = ctx.new_label();
            ctx.emit(Instruction::int(0))?;
            ctx.emit(Instruction::bytes(key.to_vec()))?;
            let op = if local {
                OpCode::AppLocalGetEx
            } else {
                OpCode::AppGlobalGetEx
            };
            ctx.emit(Instruction::simple(op))?;
            ctx.emit_jump(OpCode::Bnz, present)?;
            ctx.emit(Instruction::simple(OpCode::Pop))?;
            ctx.emit(Instruction::bytes(Vec::new()))?;
            ctx.mark(present)
        }
    }
}

fn lower_seq(ctx: &mut CompileContext, items: &[Expr]) -> Result<(), CompileError> {
    for (i, child) in items.iter().enumerate() {
        let role = format!("{}:", i);
        lower_child(ctx, &role, child)?;

        if child.terminates() {
            let skipped = items.len() - i - 1;
            if skipped > 0 {
                log::warn!(
                    "{}: skipping {} unreachable node(s) after {}",
                    ctx.path(),
                    skipped,
                    child.describe()
                );
            }
            break;
        }
        if child.ty() != Type::None && i + 1 < items.len() {
            ctx.emit(Instruction::simple(OpCode::Pop))?;
        }
    }
    Ok(())
}

/// Predicates first, each branching to its own arm; no match falls into
/// `err`. Arm bodies that do not terminate jump to a shared end label.
fn lower_cond(ctx: &mut CompileContext, arms: &[(Expr, Expr)]) -> Result<(), CompileError> {
    if arms.is_empty() {
        return ctx.emit(Instruction::simple(OpCode::Err));
    }

    let mut targets = Vec::with_capacity(arms.len());
    for (i, (predicate, _)) in arms.iter().enumerate() {
        lower_child(ctx, &format!("when{}:", i), predicate)?;
        let target = ctx.new_label();
        ctx.emit_jump(OpCode::Bnz, target)?;
        targets.push(target);
    }
    ctx.emit(Instruction::simple(OpCode::Err))?;

    let mut end = None;
    for (i, ((_, body), target)) in arms.iter().zip(targets).enumerate() {
        ctx.mark(target)?;
        lower_child(ctx, &format!("then{}:", i), body)?;
        if !body.terminates() {
            let end = *end.get_or_insert_with(|| ctx.new_label());
            ctx.emit_jump(OpCode::B, end)?;
        }
    }
    if let Some(end) = end {
        ctx.mark(end)?;
    }
    Ok(())
}

// =============================================================================
// Phase 3: EmitLabels
// =============================================================================

fn emit_labels(items: &[Item]) -> Result<Vec<(Line, String)>, CompileError> {
    let mut names: HashMap<LabelId, String> = HashMap::new();
    for item in items {
        if let Item::Mark(id) = item {
            let name = format!("{}{}", LABEL_PREFIX, names.len() + 1);
            names.insert(*id, name);
        }
    }

    items
        .iter()
        .map(|item| match item {
            Item::Op {
                instruction,
                origin,
            } => Ok((Line::Op(instruction.clone()), origin.clone())),
            Item::Jump { op, target, origin } => {
                let name = names
                    .get(target)
                    .ok_or(CompileError::UndefinedLabel(target.0))?;
                Ok((Line::Op(Instruction::jump(*op, name.clone())), origin.clone()))
            }
            Item::Mark(id) => {
                let name = names.get(id).ok_or(CompileError::UndefinedLabel(id.0))?;
                Ok((Line::Label(name.clone()), String::new()))
            }
        })
        .collect()
}

// =============================================================================
// Phase 4: Finalize
// =============================================================================

fn finalize(ctx: &CompileContext, lines: Vec<(Line, String)>) -> Result<Listing, CompileError> {
    let mut out = Vec::with_capacity(lines.len());
    for (line, origin) in lines {
        if let Line::Op(instruction) = &line {
            let required = instruction.min_version();
            if required > ctx.version {
                return Err(CompileError::UnsupportedAtVersion {
                    node: origin,
                    op: instruction.to_string(),
                    required,
                    available: ctx.version,
                });
            }
        }
        out.push(line);
    }
    Ok(Listing {
        version: ctx.version,
        lines: out,
    })
}
