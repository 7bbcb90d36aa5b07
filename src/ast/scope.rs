use crate::jvm::Label;

/// Structural role of a block relative to its controlling branch
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum JumpPosition {
    IfRoot,
    IfBody,
    ElseBody,
}

impl JumpPosition {
    pub fn name(&self) -> &'static str {
        match self {
            JumpPosition::IfRoot => "IF_ROOT",
            JumpPosition::IfBody => "IF_BODY",
            JumpPosition::ElseBody => "ELSE_BODY",
        }
    }
}

/// Kind of a recorded jump
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum JumpKind {
    IfCmp,
    Goto,
}

/// A jump met during reconstruction
///
/// Scope items refer to these by index into the per-method jump list rather
/// than holding copies, so a later backfill of `label` (do-while roots learn
/// their origin label only when the condition is finally reached) is visible
/// from every scope that mentions the jump.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct JumpRec {
    pub kind: JumpKind,

    /// Sequence number of the root BLOCK this jump opened (for gotos, which
    /// open no block, the next free number at the time)
    pub order: usize,

    /// Label active when the jump was met; `None` for roots opened before
    /// their condition was reached
    pub label: Option<Label>,

    pub destination: Label,
    pub position: JumpPosition,
    pub pseudo_line: i32,
}

/// One open structural scope
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum ScopeItem {
    /// Transient scope of an assignment being attached
    Store { order: usize, label: Option<Label> },

    /// An open branch root; index into the per-method jump list
    Jump { jump: usize },

    /// A body block reserved but not yet materialized as a node
    NestedBody {
        order: usize,
        label: Option<Label>,
        position: JumpPosition,
    },
}

impl ScopeItem {
    pub fn order(&self, jumps: &[JumpRec]) -> usize {
        match self {
            ScopeItem::Store { order, .. } | ScopeItem::NestedBody { order, .. } => *order,
            ScopeItem::Jump { jump } => jumps[*jump].order,
        }
    }

    pub fn label(&self, jumps: &[JumpRec]) -> Option<Label> {
        match self {
            ScopeItem::Store { label, .. } | ScopeItem::NestedBody { label, .. } => *label,
            ScopeItem::Jump { jump } => jumps[*jump].label,
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, ScopeItem::Jump { .. })
    }
}

/// Index of the topmost open jump on the scope stack
pub fn last_jump(scopes: &[ScopeItem]) -> Option<usize> {
    scopes.iter().rev().find_map(|item| match item {
        ScopeItem::Jump { jump } => Some(*jump),
        _ => None,
    })
}

/// Indices of all open jumps, bottom of the stack first
pub fn jump_history(scopes: &[ScopeItem]) -> Vec<usize> {
    scopes
        .iter()
        .filter_map(|item| match item {
            ScopeItem::Jump { jump } => Some(*jump),
            _ => None,
        })
        .collect()
}

/// Indices of recorded jumps whose destination is `label`, oldest first
pub fn jumps_targeting(jumps: &[JumpRec], label: Label) -> Vec<usize> {
    jumps
        .iter()
        .enumerate()
        .filter(|(_, jump)| jump.destination == label)
        .map(|(index, _)| index)
        .collect()
}

/// Whether any recorded jump lands on `label`
pub fn is_jump_destination(jumps: &[JumpRec], label: Label) -> bool {
    jumps.iter().any(|jump| jump.destination == label)
}
