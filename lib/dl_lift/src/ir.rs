//! Three-address intermediate representation.
//!
//! Statements and expressions are generic over the representation of the
//! values they read and write: lowering produces [`Stmt<Slot>`], where each
//! operand is a provisional value together with the kinds its consumer
//! accepts, and the splitter rewrites them into [`Stmt<Local>`] over final
//! typed locals.

use crate::diagnostics::Diagnostic;
use crate::kinds::{Kind, KindSet};
use dl_bytecode::errors::BytecodeResult;
use dl_bytecode::pool::{ConstantPool, FieldRef, Index, MethodRef, PrettyPrint};
use dl_bytecode::types::Type;
use dl_bytecode::Addr;
use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A provisional value: one per definition point, plus one per read of an
/// undefined or incompatible register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ValueId(pub(crate) usize);

impl ValueId {
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// A provisional operand: the value, and the kinds its consumer (or, for
/// a destination, its producer) deals with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub value: ValueId,
    pub contract: KindSet,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.value, self.contract)
    }
}

/// A final typed local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Local {
    pub kind: Kind,
    pub index: usize,
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Constant {
    Int(i32),
    Long(i64),
    /// Bit pattern of a `float`.
    Float(u32),
    /// Bit pattern of a `double`.
    Double(u64),
    Null,
    String(Index<String>),
    Class(Index<Type>),
}

impl Constant {
    /// Renders a literal bit pattern as a constant of the given kind.
    #[must_use]
    pub const fn from_bits(kind: Kind, bits: u64) -> Self {
        match kind {
            Kind::Int => Self::Int(bits as u32 as i32),
            Kind::Float => Self::Float(bits as u32),
            Kind::Long => Self::Long(bits as i64),
            Kind::Double => Self::Double(bits),
            Kind::Object if bits == 0 => Self::Null,
            Kind::Object => Self::Int(bits as u32 as i32),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Int(_) => Kind::Int,
            Self::Long(_) => Kind::Long,
            Self::Float(_) => Kind::Float,
            Self::Double(_) => Kind::Double,
            Self::Null | Self::String(_) | Self::Class(_) => Kind::Object,
        }
    }
}

impl PrettyPrint for Constant {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        match self {
            Self::Int(i) => write!(f, "{i}")?,
            Self::Long(l) => write!(f, "{l}L")?,
            Self::Float(bits) => write!(f, "{:?}F", f32::from_bits(*bits))?,
            Self::Double(bits) => write!(f, "{:?}", f64::from_bits(*bits))?,
            Self::Null => write!(f, "null")?,
            Self::String(idx) => write!(f, "{:?}", pool.string(*idx)?)?,
            Self::Class(idx) => write!(f, "class \"{}\"", pool.type_(*idx)?)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CastMode {
    /// Bit preserving reinterpretation between kinds of a same width.
    Reinterpret,
    /// Placeholder between incompatible kinds, tagged with the diagnostic
    /// reporting the conflict.
    Coerce { diagnostic: Option<usize> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Operand<V> {
    Local(V),
    Constant(Constant),
    /// An untyped literal bit pattern, typed after solving as its peer.
    Literal { bits: u64, wide: bool, peer: V },
    /// A value used as another kind.
    Cast {
        value: V,
        from: Kind,
        to: Kind,
        mode: CastMode,
    },
}

impl<V: fmt::Display> PrettyPrint for Operand<V> {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        match self {
            Self::Local(v) => write!(f, "{v}")?,
            Self::Constant(c) => c.pp(f, pool)?,
            Self::Literal { bits, wide, .. } => {
                let suffix = if *wide { "L" } else { "" };
                write!(f, "#{bits:#x}{suffix}")?;
            }
            Self::Cast {
                value,
                to,
                mode: CastMode::Reinterpret,
                ..
            } => write!(f, "reinterpret({value} as {to})")?,
            Self::Cast {
                value,
                to,
                mode: CastMode::Coerce { .. },
                ..
            } => write!(f, "coerce({value} as {to})")?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
    Cmp,
    Cmpl,
    Cmpg,
}

impl BinOp {
    /// Operator named by the leading part of an arithmetic mnemonic
    /// (`add-int/2addr` is `add`).
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let name = mnemonic.split(['-', '/']).next()?;
        match name {
            "add" => Some(Self::Add),
            "sub" | "rsub" => Some(Self::Sub),
            "mul" => Some(Self::Mul),
            "div" => Some(Self::Div),
            "rem" => Some(Self::Rem),
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "xor" => Some(Self::Xor),
            "shl" => Some(Self::Shl),
            "shr" => Some(Self::Shr),
            "ushr" => Some(Self::Ushr),
            "cmp" => Some(Self::Cmp),
            "cmpl" => Some(Self::Cmpl),
            "cmpg" => Some(Self::Cmpg),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::Shl | Self::Shr | Self::Ushr)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Ushr => ">>>",
            Self::Cmp => "cmp",
            Self::Cmpl => "cmpl",
            Self::Cmpg => "cmpg",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl CmpOp {
    /// Comparison of an `if-*` or `if-*z` mnemonic.
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let cond = mnemonic.strip_prefix("if-")?;
        match cond.strip_suffix('z').unwrap_or(cond) {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "gt" => Some(Self::Gt),
            "le" => Some(Self::Le),
            _ => None,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InvokeKind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
}

impl InvokeKind {
    #[must_use]
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        let kind = mnemonic.strip_prefix("invoke-")?;
        match kind.strip_suffix("/range").unwrap_or(kind) {
            "virtual" => Some(Self::Virtual),
            "super" => Some(Self::Super),
            "direct" => Some(Self::Direct),
            "static" => Some(Self::Static),
            "interface" => Some(Self::Interface),
            _ => None,
        }
    }

    #[must_use]
    pub const fn has_receiver(self) -> bool {
        !matches!(self, Self::Static)
    }
}

impl fmt::Display for InvokeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Virtual => write!(f, "virtualinvoke"),
            Self::Super | Self::Direct => write!(f, "specialinvoke"),
            Self::Static => write!(f, "staticinvoke"),
            Self::Interface => write!(f, "interfaceinvoke"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IdentitySource {
    This,
    Parameter { index: usize, type_: Type },
    CaughtException,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::This => write!(f, "@this"),
            Self::Parameter { index, type_ } => {
                write!(f, "@parameter{index}: {}", type_.to_java_string())
            }
            Self::CaughtException => write!(f, "@caughtexception"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr<V> {
    Use(Operand<V>),
    Binop {
        op: BinOp,
        lhs: Operand<V>,
        rhs: Operand<V>,
    },
    Neg(Operand<V>),
    /// Numeric conversion.
    Convert { value: Operand<V>, to: Type },
    CheckCast { value: Operand<V>, type_: Index<Type> },
    InstanceOf { value: Operand<V>, type_: Index<Type> },
    Length(Operand<V>),
    NewInstance(Index<Type>),
    NewArray { type_: Index<Type>, size: Operand<V> },
    NewFilledArray {
        type_: Index<Type>,
        elements: Vec<Operand<V>>,
    },
    ArrayRef { array: Operand<V>, index: Operand<V> },
    InstanceField {
        object: Operand<V>,
        field: Index<FieldRef>,
    },
    StaticField(Index<FieldRef>),
    Invoke {
        kind: InvokeKind,
        method: Index<MethodRef>,
        receiver: Option<Operand<V>>,
        args: Vec<Operand<V>>,
    },
}

fn pp_list<V: fmt::Display>(
    f: &mut fmt::Formatter,
    pool: &dyn ConstantPool,
    ops: &[Operand<V>],
) -> BytecodeResult<()> {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        op.pp(f, pool)?;
    }
    Ok(())
}

impl<V: fmt::Display> PrettyPrint for Expr<V> {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        match self {
            Self::Use(op) => op.pp(f, pool)?,
            Self::Binop { op, lhs, rhs } => {
                lhs.pp(f, pool)?;
                write!(f, " {op} ")?;
                rhs.pp(f, pool)?;
            }
            Self::Neg(op) => {
                write!(f, "neg ")?;
                op.pp(f, pool)?;
            }
            Self::Convert { value, to } => {
                write!(f, "({}) ", to.to_java_string())?;
                value.pp(f, pool)?;
            }
            Self::CheckCast { value, type_ } => {
                write!(f, "({}) ", pool.type_(*type_)?.to_java_string())?;
                value.pp(f, pool)?;
            }
            Self::InstanceOf { value, type_ } => {
                value.pp(f, pool)?;
                write!(f, " instanceof {}", pool.type_(*type_)?.to_java_string())?;
            }
            Self::Length(op) => {
                write!(f, "lengthof ")?;
                op.pp(f, pool)?;
            }
            Self::NewInstance(t) => write!(f, "new {}", pool.type_(*t)?.to_java_string())?,
            Self::NewArray { type_, size } => {
                let elem = pool.type_(*type_)?.element_type().unwrap_or(Type::Void);
                write!(f, "newarray ({})[", elem.to_java_string())?;
                size.pp(f, pool)?;
                write!(f, "]")?;
            }
            Self::NewFilledArray { type_, elements } => {
                write!(f, "newfilledarray {} {{", pool.type_(*type_)?.to_java_string())?;
                pp_list(f, pool, elements)?;
                write!(f, "}}")?;
            }
            Self::ArrayRef { array, index } => {
                array.pp(f, pool)?;
                write!(f, "[")?;
                index.pp(f, pool)?;
                write!(f, "]")?;
            }
            Self::InstanceField { object, field } => {
                object.pp(f, pool)?;
                write!(f, ".<{}>", pool.field(*field)?)?;
            }
            Self::StaticField(field) => write!(f, "<{}>", pool.field(*field)?)?,
            Self::Invoke {
                kind,
                method,
                receiver,
                args,
            } => {
                write!(f, "{kind} ")?;
                if let Some(r) = receiver {
                    r.pp(f, pool)?;
                    write!(f, ".")?;
                }
                write!(f, "<{}>(", pool.method(*method)?)?;
                pp_list(f, pool, args)?;
                write!(f, ")")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LValue<V> {
    Local(V),
    ArrayElem { array: Operand<V>, index: Operand<V> },
    InstanceField {
        object: Operand<V>,
        field: Index<FieldRef>,
    },
    StaticField(Index<FieldRef>),
}

impl<V: fmt::Display> PrettyPrint for LValue<V> {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        match self {
            Self::Local(v) => write!(f, "{v}")?,
            Self::ArrayElem { array, index } => {
                array.pp(f, pool)?;
                write!(f, "[")?;
                index.pp(f, pool)?;
                write!(f, "]")?;
            }
            Self::InstanceField { object, field } => {
                object.pp(f, pool)?;
                write!(f, ".<{}>", pool.field(*field)?)?;
            }
            Self::StaticField(field) => write!(f, "<{}>", pool.field(*field)?)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Stmt<V> {
    Nop,
    Identity { dest: V, source: IdentitySource },
    Assign { dest: LValue<V>, expr: Expr<V> },
    /// An invoke whose result is discarded.
    Invoke(Expr<V>),
    If {
        op: CmpOp,
        lhs: Operand<V>,
        rhs: Operand<V>,
        target: Addr,
    },
    Goto(Addr),
    Switch {
        key: Operand<V>,
        cases: Vec<(i32, Addr)>,
        default: Addr,
    },
    Return(Option<Operand<V>>),
    Throw(Operand<V>),
    EnterMonitor(Operand<V>),
    ExitMonitor(Operand<V>),
    /// Bulk initialization of an array from its data table, elements
    /// typed by the array element type.
    FillArray {
        array: Operand<V>,
        width: u16,
        elements: Vec<Constant>,
    },
}

impl<V> Stmt<V> {
    /// Code addresses this statement may jump to.
    #[must_use]
    pub fn targets(&self) -> Vec<Addr> {
        match self {
            Self::If { target, .. } | Self::Goto(target) => vec![*target],
            Self::Switch { cases, default, .. } => {
                let mut targets: Vec<Addr> = cases.iter().map(|(_, t)| *t).collect();
                targets.push(*default);
                targets
            }
            _ => Vec::new(),
        }
    }
}

/// Renders statements, resolving jump targets through a labels table.
struct StmtPrinter<'a, V> {
    stmt: &'a Stmt<V>,
    labels: &'a BTreeMap<Addr, usize>,
}

fn label_of(labels: &BTreeMap<Addr, usize>, addr: Addr) -> String {
    labels
        .get(&addr)
        .map_or_else(|| format!("@{addr}"), |idx| format!("label{idx}"))
}

impl<'a, V: fmt::Display> PrettyPrint for StmtPrinter<'a, V> {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        match self.stmt {
            Stmt::Nop => write!(f, "nop")?,
            Stmt::Identity { dest, source } => write!(f, "{dest} := {source}")?,
            Stmt::Assign { dest, expr } => {
                dest.pp(f, pool)?;
                write!(f, " = ")?;
                expr.pp(f, pool)?;
            }
            Stmt::Invoke(expr) => expr.pp(f, pool)?,
            Stmt::If {
                op,
                lhs,
                rhs,
                target,
            } => {
                write!(f, "if ")?;
                lhs.pp(f, pool)?;
                write!(f, " {op} ")?;
                rhs.pp(f, pool)?;
                write!(f, " goto {}", label_of(self.labels, *target))?;
            }
            Stmt::Goto(target) => write!(f, "goto {}", label_of(self.labels, *target))?,
            Stmt::Switch {
                key,
                cases,
                default,
            } => {
                write!(f, "lookupswitch(")?;
                key.pp(f, pool)?;
                write!(f, ") {{")?;
                for (k, t) in cases {
                    write!(f, " case {k}: goto {};", label_of(self.labels, *t))?;
                }
                write!(f, " default: goto {}; }}", label_of(self.labels, *default))?;
            }
            Stmt::Return(None) => write!(f, "return")?,
            Stmt::Return(Some(op)) => {
                write!(f, "return ")?;
                op.pp(f, pool)?;
            }
            Stmt::Throw(op) => {
                write!(f, "throw ")?;
                op.pp(f, pool)?;
            }
            Stmt::EnterMonitor(op) => {
                write!(f, "entermonitor ")?;
                op.pp(f, pool)?;
            }
            Stmt::ExitMonitor(op) => {
                write!(f, "exitmonitor ")?;
                op.pp(f, pool)?;
            }
            Stmt::FillArray {
                array,
                width,
                elements,
            } => {
                write!(f, "fillarray ")?;
                array.pp(f, pool)?;
                write!(f, " ({width} bytes) {{")?;
                for (i, element) in elements.iter().enumerate() {
                    write!(f, "{}", if i > 0 { ", " } else { " " })?;
                    element.pp(f, pool)?;
                }
                write!(f, " }}")?;
            }
        }
        Ok(())
    }
}

impl<V: fmt::Display> PrettyPrint for Stmt<V> {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        StmtPrinter {
            stmt: self,
            labels: &BTreeMap::new(),
        }
        .pp(f, pool)
    }
}

lazy_static! {
    /// Exception type caught by catch-all handlers.
    pub static ref JAVA_LANG_THROWABLE: Type = Type::Class("java/lang/Throwable".to_string());
}

/// An exception handler over the statements in `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trap {
    pub exception: Option<Index<Type>>,
    pub begin: usize,
    pub end: usize,
    pub handler: usize,
}

/// A lifted method body.
#[derive(Debug, Clone, Serialize)]
pub struct Body {
    pub method: Index<MethodRef>,
    pub locals: Vec<Local>,
    /// Statements, with the address of the instruction they were lowered
    /// from (`None` for parameter identities).
    pub stmts: Vec<(Option<Addr>, Stmt<Local>)>,
    /// Index of the first statement of each lowered instruction.
    pub labels: BTreeMap<Addr, usize>,
    pub traps: Vec<Trap>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Body {
    #[inline]
    pub fn iter_stmts(&self) -> impl Iterator<Item = &Stmt<Local>> {
        self.stmts.iter().map(|(_, s)| s)
    }

    /// Index of the statement an instruction address jumps to.
    #[inline]
    #[must_use]
    pub fn stmt_index(&self, addr: Addr) -> Option<usize> {
        self.labels.get(&addr).copied()
    }

    /// Statements lowered from the instruction at `addr`.
    pub fn stmts_at(&self, addr: Addr) -> impl Iterator<Item = &Stmt<Local>> {
        self.stmts
            .iter()
            .filter(move |(a, _)| *a == Some(addr))
            .map(|(_, s)| s)
    }

    /// Final local holding the value defined by the first statement
    /// lowered from the instruction at `addr`, if any.
    #[must_use]
    pub fn local_defined_at(&self, addr: Addr) -> Option<Local> {
        self.stmts_at(addr).find_map(|s| match s {
            Stmt::Assign {
                dest: LValue::Local(l),
                ..
            }
            | Stmt::Identity { dest: l, .. } => Some(*l),
            _ => None,
        })
    }
}

impl PrettyPrint for Body {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        writeln!(f, "{} {{", pool.method(self.method)?)?;
        for local in &self.locals {
            writeln!(f, "    {} {local};", local.kind)?;
        }
        if !self.locals.is_empty() {
            writeln!(f)?;
        }

        let mut shown: BTreeSet<usize> = self
            .iter_stmts()
            .flat_map(Stmt::targets)
            .filter_map(|t| self.stmt_index(t))
            .collect();
        for trap in &self.traps {
            shown.extend([trap.begin, trap.end, trap.handler]);
        }
        let labels: BTreeMap<Addr, usize> = self
            .labels
            .iter()
            .filter(|(_, idx)| shown.contains(idx))
            .map(|(a, i)| (*a, *i))
            .collect();

        for (i, (_, stmt)) in self.stmts.iter().enumerate() {
            if shown.contains(&i) {
                writeln!(f, "  label{i}:")?;
            }
            write!(f, "    ")?;
            StmtPrinter {
                stmt,
                labels: &labels,
            }
            .pp(f, pool)?;
            writeln!(f, ";")?;
        }
        if shown.contains(&self.stmts.len()) {
            writeln!(f, "  label{}:", self.stmts.len())?;
        }

        for trap in &self.traps {
            let exception = match trap.exception {
                Some(t) => pool.type_(t)?,
                None => &*JAVA_LANG_THROWABLE,
            };
            writeln!(
                f,
                "    catch {} from label{} to label{} with label{};",
                exception.to_java_string(),
                trap.begin, trap.end, trap.handler
            )?;
        }
        write!(f, "}}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_bytecode::pool::{Pool, PrettyPrinter};

    #[test]
    fn mnemonic_operators() {
        assert_eq!(BinOp::from_mnemonic("add-int/2addr"), Some(BinOp::Add));
        assert_eq!(BinOp::from_mnemonic("rsub-int/lit8"), Some(BinOp::Sub));
        assert_eq!(BinOp::from_mnemonic("ushr-long"), Some(BinOp::Ushr));
        assert_eq!(BinOp::from_mnemonic("cmpl-float"), Some(BinOp::Cmpl));
        assert_eq!(CmpOp::from_mnemonic("if-gez"), Some(CmpOp::Ge));
        assert_eq!(CmpOp::from_mnemonic("if-ne"), Some(CmpOp::Ne));
        assert_eq!(
            InvokeKind::from_mnemonic("invoke-interface/range"),
            Some(InvokeKind::Interface)
        );
        assert_eq!(InvokeKind::from_mnemonic("invoke-custom"), None);
    }

    #[test]
    fn literal_rendering_keeps_bits() {
        assert_eq!(Constant::from_bits(Kind::Float, 0x3fc0_0000), Constant::Float(0x3fc0_0000));
        assert_eq!(Constant::from_bits(Kind::Int, 0xffff_ffff), Constant::Int(-1));
        assert_eq!(Constant::from_bits(Kind::Object, 0), Constant::Null);
        let pool = Pool::new();
        let c = Constant::from_bits(Kind::Float, 0x3fc0_0000);
        assert_eq!(PrettyPrinter(&c, &pool).to_string(), "1.5F");
    }

    #[test]
    fn statements_display() {
        let pool = Pool::new();
        let i0 = Local {
            kind: Kind::Int,
            index: 0,
        };
        let stmt: Stmt<Local> = Stmt::Assign {
            dest: LValue::Local(Local {
                kind: Kind::Int,
                index: 1,
            }),
            expr: Expr::Binop {
                op: BinOp::Xor,
                lhs: Operand::Local(i0),
                rhs: Operand::Constant(Constant::Int(-1)),
            },
        };
        assert_eq!(PrettyPrinter(&stmt, &pool).to_string(), "i1 = i0 ^ -1");
        let cast: Operand<Local> = Operand::Cast {
            value: i0,
            from: Kind::Int,
            to: Kind::Float,
            mode: CastMode::Reinterpret,
        };
        assert_eq!(PrettyPrinter(&cast, &pool).to_string(), "reinterpret(i0 as float)");
    }
}
