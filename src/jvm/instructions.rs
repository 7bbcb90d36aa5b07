//! The slice of the JVM instruction set that matters for structural
//! reconstruction: constants, local variable traffic, arithmetic, and jumps.
//! Everything else never reaches the projector.

use super::Label;

/// Operand kind moved by a load, store, or operator instruction
///
/// This is the leading letter of the mnemonic (`ILOAD`, `DSTORE`, `LXOR`).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum StackKind {
    Int,
    Long,
    Float,
    Double,
    Object,
}

impl StackKind {
    /// Spelled-out type name used on emitted nodes
    pub fn type_name(&self) -> &'static str {
        match self {
            StackKind::Int => "INTEGER",
            StackKind::Long => "LONG",
            StackKind::Float => "FLOAT",
            StackKind::Double => "DOUBLE",
            StackKind::Object => "OBJECT",
        }
    }
}

/// Arithmetic and bitwise operators (`IADD` is `Int` + `Add`)
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl ArithOp {
    /// Name of the BLOCK node an operator application projects to
    pub fn name(&self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
            ArithOp::Rem => "REM",
            ArithOp::Neg => "NEG",
            ArithOp::And => "AND",
            ArithOp::Or => "OR",
            ArithOp::Xor => "XOR",
            ArithOp::Shl => "SHL",
            ArithOp::Shr => "SHR",
            ArithOp::Ushr => "USHR",
        }
    }
}

/// An arithmetic instruction, eg. `IADD` or `LXOR`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct OperatorInsn {
    pub kind: StackKind,
    pub op: ArithOp,
}

/// Constants pushed by operand-free instructions (`ICONST_3`, `DCONST_1`,
/// `ACONST_NULL`, ...)
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ConstInsn {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
}

impl ConstInsn {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstInsn::Int(_) => StackKind::Int.type_name(),
            ConstInsn::Long(_) => StackKind::Long.type_name(),
            ConstInsn::Float(_) => StackKind::Float.type_name(),
            ConstInsn::Double(_) => StackKind::Double.type_name(),
            ConstInsn::Null => "NULL",
        }
    }

    pub fn value_string(&self) -> String {
        match self {
            ConstInsn::Int(v) => v.to_string(),
            ConstInsn::Long(v) => v.to_string(),
            ConstInsn::Float(v) => v.to_string(),
            ConstInsn::Double(v) => v.to_string(),
            ConstInsn::Null => String::from("null"),
        }
    }
}

/// Operand-stack-relevant instructions that carry no explicit operand bytes
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Insn {
    Const(ConstInsn),
    Operator(OperatorInsn),
}

/// Constant-pool payload of an `LDC` instruction
#[derive(Clone, PartialEq, Debug)]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Int(_) => StackKind::Int.type_name(),
            Literal::Long(_) => StackKind::Long.type_name(),
            Literal::Float(_) => StackKind::Float.type_name(),
            Literal::Double(_) => StackKind::Double.type_name(),
            Literal::Str(_) => "java/lang/String",
        }
    }

    pub fn value_string(&self) -> String {
        match self {
            Literal::Int(v) => v.to_string(),
            Literal::Long(v) => v.to_string(),
            Literal::Float(v) => v.to_string(),
            Literal::Double(v) => v.to_string(),
            Literal::Str(v) => v.clone(),
        }
    }
}

/// Comparison baked into a conditional jump mnemonic
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Comparison {
    /// The opposite comparison
    ///
    /// A conditional jump branches when the source-level condition is false,
    /// so the emitted condition node carries the negation of the mnemonic.
    pub fn negated(&self) -> Comparison {
        match self {
            Comparison::Eq => Comparison::Ne,
            Comparison::Ne => Comparison::Eq,
            Comparison::Lt => Comparison::Ge,
            Comparison::Ge => Comparison::Lt,
            Comparison::Gt => Comparison::Le,
            Comparison::Le => Comparison::Gt,
        }
    }

    /// Name of the BLOCK node a comparison projects to
    pub fn name(&self) -> &'static str {
        match self {
            Comparison::Eq => "EQ",
            Comparison::Ne => "NE",
            Comparison::Lt => "LT",
            Comparison::Ge => "GE",
            Comparison::Gt => "GT",
            Comparison::Le => "LE",
        }
    }
}

/// Operand kind compared by a binary conditional jump
///
/// `IF_ICMPxx` compares integers, `IF_ACMPxx` compares references.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum IfCmpKind {
    Int,
    Ref,
}

impl IfCmpKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            IfCmpKind::Int => "INTEGER",
            IfCmpKind::Ref => "OBJECT",
        }
    }
}

/// Unary conditional jumps compare one operand against zero or null
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnaryIf {
    Cmp(Comparison),
    Null,
    NonNull,
}

/// Jump classification carried by ledger records
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum JumpOp {
    Goto,
    If,
    IfCmp,
}

impl JumpOp {
    pub fn is_goto(&self) -> bool {
        matches!(self, JumpOp::Goto)
    }
}

/// A jump instruction as it appears in the event stream
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum JumpInsn {
    Goto { target: Label },
    If { op: UnaryIf, target: Label },
    IfCmp { comparison: Comparison, kind: IfCmpKind, target: Label },
}

impl JumpInsn {
    pub fn op(&self) -> JumpOp {
        match self {
            JumpInsn::Goto { .. } => JumpOp::Goto,
            JumpInsn::If { .. } => JumpOp::If,
            JumpInsn::IfCmp { .. } => JumpOp::IfCmp,
        }
    }

    pub fn target(&self) -> Label {
        match self {
            JumpInsn::Goto { target }
            | JumpInsn::If { target, .. }
            | JumpInsn::IfCmp { target, .. } => *target,
        }
    }
}
