use super::MethodEvent;
use crate::jvm::{JumpOp, Label};
use std::collections::HashMap;

/// Structural names a branch root can take on
///
/// Roots are registered tentatively when opened and patched when the jump
/// that closes them reveals what they really were.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum JumpRootKind {
    If,
    While,
    DoWhile,
    For,
    Goto,
}

impl JumpRootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JumpRootKind::If => "IF",
            JumpRootKind::While => "WHILE",
            JumpRootKind::DoWhile => "DO_WHILE",
            JumpRootKind::For => "FOR",
            JumpRootKind::Goto => "GOTO",
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            JumpRootKind::While | JumpRootKind::DoWhile | JumpRootKind::For
        )
    }
}

/// One jump instruction as recorded by the pre-scan
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct JumpInfo {
    pub op: JumpOp,
    pub destination: Label,
    pub origin: Label,
    pub pseudo_line: i32,
}

/// One normalized source line and the labels that resolve to it
#[derive(Clone, PartialEq, Debug)]
pub struct LineInfo {
    pub pseudo_line: i32,
    pub source_line: u32,
    pub labels: Vec<Label>,
}

/// Everything the reconstructor needs to know about a method before it
/// touches the first instruction
///
/// Built by one deterministic pre-scan over the buffered events of a method
/// (`MethodLedger::scan`); by the time reconstruction starts, the jump table
/// is complete and every query below is answerable. Pseudo-lines normalize
/// source line numbers to first-seen order (1-based), so debug-info quirks
/// like lines visited out of order cannot perturb before/after comparisons.
#[derive(Default)]
pub struct MethodLedger {
    lines: Vec<LineInfo>,
    line_of_source: HashMap<u32, usize>,
    line_of_label: HashMap<Label, usize>,
    jumps: Vec<JumpInfo>,
    ternary_pairs: Vec<(usize, usize)>,
    jump_roots: HashMap<i32, JumpRootKind>,
}

impl MethodLedger {
    /// Build the ledger for one method body
    pub fn scan(events: &[MethodEvent]) -> MethodLedger {
        let mut ledger = MethodLedger::default();
        let mut current_line: Option<usize> = None;
        let mut pending_labels: Vec<Label> = vec![];
        let mut store_since_cond = false;

        for event in events {
            match event {
                MethodEvent::Line { line, label } => {
                    let index = match ledger.line_of_source.get(line) {
                        Some(index) => *index,
                        None => {
                            let index = ledger.lines.len();
                            ledger.lines.push(LineInfo {
                                pseudo_line: index as i32 + 1,
                                source_line: *line,
                                labels: vec![],
                            });
                            ledger.line_of_source.insert(*line, index);
                            // labels seen before any line belong to the first
                            for pending in pending_labels.drain(..) {
                                ledger.associate(index, pending);
                            }
                            index
                        }
                    };
                    ledger.associate(index, *label);
                    current_line = Some(index);
                }
                MethodEvent::Label { label } => match current_line {
                    Some(index) => ledger.associate(index, *label),
                    None => pending_labels.push(*label),
                },
                MethodEvent::Jump { insn } => {
                    let pseudo_line = current_line
                        .map(|index| ledger.lines[index].pseudo_line)
                        .unwrap_or(-1);
                    let origin = current_line
                        .and_then(|index| ledger.lines[index].labels.last().copied())
                        .unwrap_or(Label::START);
                    let op = insn.op();
                    if op.is_goto() && !store_since_cond && pseudo_line != -1 {
                        // a goto on the very line of the preceding condition,
                        // with no assignment in between, is a ternary
                        if let Some((index, last)) = ledger.jumps.iter().enumerate().last() {
                            if !last.op.is_goto() && last.pseudo_line == pseudo_line {
                                ledger.ternary_pairs.push((index, ledger.jumps.len()));
                            }
                        }
                    }
                    if !op.is_goto() {
                        store_since_cond = false;
                    }
                    ledger.jumps.push(JumpInfo {
                        op,
                        destination: insn.target(),
                        origin,
                        pseudo_line,
                    });
                }
                MethodEvent::Store { .. } | MethodEvent::Increment { .. } => {
                    store_since_cond = true;
                }
                _ => {}
            }
        }
        ledger
    }

    fn associate(&mut self, index: usize, label: Label) {
        if self.line_of_label.contains_key(&label) {
            return;
        }
        self.lines[index].labels.push(label);
        self.line_of_label.insert(label, index);
    }

    /// Pseudo-line a label resolves to; -1 when the label is unknown
    pub fn pseudo_line(&self, label: Label) -> i32 {
        self.line_of_label
            .get(&label)
            .map(|index| self.lines[*index].pseudo_line)
            .unwrap_or(-1)
    }

    /// All recorded jumps whose destination is in `pseudo_line`'s label set
    ///
    /// The -1 "unknown" line has no label set, so nothing associates with
    /// it; without the guard every unresolved destination would appear
    /// associated with every other unresolved jump's line.
    pub fn associated_jumps(&self, pseudo_line: i32) -> Vec<JumpInfo> {
        if pseudo_line == -1 {
            return vec![];
        }
        self.jumps
            .iter()
            .filter(|jump| self.pseudo_line(jump.destination) == pseudo_line)
            .copied()
            .collect()
    }

    /// The goto half of a ternary whose condition sits on `pseudo_line`
    pub fn associated_ternary_goto(&self, pseudo_line: i32) -> Option<JumpInfo> {
        self.ternary_pairs
            .iter()
            .find(|(cond, _)| self.jumps[*cond].pseudo_line == pseudo_line)
            .map(|(_, goto)| self.jumps[*goto])
    }

    /// Registered root kind of a pseudo-line (IF when nothing is registered)
    pub fn jump_root(&self, pseudo_line: i32) -> JumpRootKind {
        self.jump_roots
            .get(&pseudo_line)
            .copied()
            .unwrap_or(JumpRootKind::If)
    }

    /// Registered root kind of the line a label resolves to
    pub fn jump_root_of_label(&self, label: Option<Label>) -> JumpRootKind {
        match label {
            Some(label) => self.jump_root(self.pseudo_line(label)),
            None => JumpRootKind::If,
        }
    }

    /// Whether the line a label resolves to is registered as a loop root
    pub fn is_label_associated_with_loops(&self, label: Label) -> bool {
        self.jump_root(self.pseudo_line(label)).is_loop()
    }

    /// Whether any jump landing on `root_line` originates from `pseudo_line`
    pub fn is_jump_associated_with_line(&self, root_line: i32, pseudo_line: i32) -> bool {
        self.associated_jumps(root_line)
            .iter()
            .any(|jump| self.pseudo_line(jump.origin) == pseudo_line)
    }

    /// Pseudo-line of the origin of some jump landing on `destination`
    pub fn find_jump_line_by_destination(&self, destination: Label) -> Option<i32> {
        self.jumps
            .iter()
            .find(|jump| jump.destination == destination)
            .map(|jump| self.pseudo_line(jump.origin))
            .filter(|pseudo_line| *pseudo_line != -1)
    }

    /// Register or overwrite the root kind of a pseudo-line
    pub fn upsert_jump_root(&mut self, pseudo_line: i32, kind: JumpRootKind) {
        log::debug!("Jump root at pseudo-line {} is {:?}", pseudo_line, kind);
        self.jump_roots.insert(pseudo_line, kind);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{Comparison, IfCmpKind, JumpInsn, StackKind};

    fn line(line: u32, label: u32) -> MethodEvent {
        MethodEvent::Line {
            line,
            label: Label(label),
        }
    }

    fn if_cmp(target: u32) -> MethodEvent {
        MethodEvent::Jump {
            insn: JumpInsn::IfCmp {
                comparison: Comparison::Le,
                kind: IfCmpKind::Int,
                target: Label(target),
            },
        }
    }

    fn goto(target: u32) -> MethodEvent {
        MethodEvent::Jump {
            insn: JumpInsn::Goto {
                target: Label(target),
            },
        }
    }

    #[test]
    fn pseudo_lines_are_first_seen_order() {
        let ledger = MethodLedger::scan(&[
            line(14, 0),
            MethodEvent::Label { label: Label(5) },
            line(9, 1),
            line(14, 2),
        ]);
        assert_eq!(1, ledger.pseudo_line(Label(0)));
        assert_eq!(1, ledger.pseudo_line(Label(5)));
        assert_eq!(2, ledger.pseudo_line(Label(1)));
        assert_eq!(1, ledger.pseudo_line(Label(2)));
        assert_eq!(-1, ledger.pseudo_line(Label(9)));
    }

    #[test]
    fn labels_before_first_line_join_it() {
        let ledger = MethodLedger::scan(&[MethodEvent::Label { label: Label(7) }, line(3, 0)]);
        assert_eq!(1, ledger.pseudo_line(Label(7)));
        assert_eq!(1, ledger.pseudo_line(Label(0)));
    }

    #[test]
    fn jumps_are_recorded_with_origin_line() {
        let ledger = MethodLedger::scan(&[line(3, 0), if_cmp(2), line(4, 1), goto(3), line(5, 2)]);
        let at_dest = ledger.associated_jumps(ledger.pseudo_line(Label(2)));
        assert_eq!(1, at_dest.len());
        assert_eq!(Label(2), at_dest[0].destination);
        assert!(ledger.is_jump_associated_with_line(3, 1));
        assert_eq!(Some(2), ledger.find_jump_line_by_destination(Label(3)));
    }

    #[test]
    fn unresolved_destinations_associate_with_nothing() {
        // both jumps target labels never seen by a line or label event
        let ledger = MethodLedger::scan(&[line(3, 0), if_cmp(8), line(4, 1), goto(9)]);
        assert_eq!(-1, ledger.pseudo_line(Label(8)));
        assert!(ledger.associated_jumps(-1).is_empty());
        assert!(!ledger.is_jump_associated_with_line(-1, 1));
    }

    #[test]
    fn ternary_pairs_need_same_line_and_no_store() {
        // condition and goto on one pseudo-line, nothing stored in between
        let ledger = MethodLedger::scan(&[
            line(5, 0),
            if_cmp(3),
            MethodEvent::Label { label: Label(2) },
            goto(4),
        ]);
        assert!(ledger.associated_ternary_goto(1).is_some());

        // a store in between means a one-line if/else, not a ternary
        let ledger = MethodLedger::scan(&[
            line(5, 0),
            if_cmp(3),
            MethodEvent::Store {
                slot: 1,
                kind: StackKind::Int,
            },
            goto(4),
        ]);
        assert!(ledger.associated_ternary_goto(1).is_none());

        // goto on a later line is ordinary control flow
        let ledger = MethodLedger::scan(&[line(5, 0), if_cmp(3), line(6, 1), goto(4)]);
        assert!(ledger.associated_ternary_goto(1).is_none());
    }

    #[test]
    fn jump_roots_default_and_patch() {
        let mut ledger = MethodLedger::scan(&[line(3, 0)]);
        assert_eq!(JumpRootKind::If, ledger.jump_root(1));
        assert!(!ledger.is_label_associated_with_loops(Label(0)));
        ledger.upsert_jump_root(1, JumpRootKind::While);
        assert_eq!(JumpRootKind::While, ledger.jump_root(1));
        assert!(ledger.is_label_associated_with_loops(Label(0)));
        assert_eq!(JumpRootKind::If, ledger.jump_root_of_label(None));
    }
}
