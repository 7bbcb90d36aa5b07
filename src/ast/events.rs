use crate::jvm::{Insn, JumpInsn, Label, Literal, StackKind};

/// One decoded instruction (or marker) of a method body
///
/// The decoder feeds these in bytecode order between `begin_method` and
/// `end_method`. They are buffered rather than interpreted immediately: the
/// reconstruction pass needs the complete jump table of the method before it
/// can place the very first block, so `end_method` pre-scans the buffer and
/// only then replays it.
#[derive(Clone, PartialEq, Debug)]
pub enum MethodEvent {
    /// A new source line starts at `label`
    Line { line: u32, label: Label },

    /// A branch target position that does not start a new source line
    Label { label: Label },

    /// `LDC` of a constant-pool literal
    LoadConstant { literal: Literal },

    /// Operand-free instruction (`ICONST_n`, `IADD`, ...)
    Insn { insn: Insn },

    /// `BIPUSH` / `SIPUSH` immediate
    PushImmediate { kind: StackKind, value: i32 },

    /// Local variable load (`ILOAD n`, ...)
    Load { slot: u16, kind: StackKind },

    /// Local variable store (`ISTORE n`, ...)
    Store { slot: u16, kind: StackKind },

    /// `IINC slot delta`
    Increment { slot: u16, delta: i32 },

    /// Any jump instruction
    Jump { insn: JumpInsn },
}
