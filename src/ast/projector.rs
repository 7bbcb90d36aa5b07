use super::{
    is_jump_destination, jump_history, jumps_targeting, last_jump, Error, JumpInfo, JumpKind,
    JumpPosition, JumpRec, JumpRootKind, MethodEvent, MethodLedger, OperandItem, ScopeItem,
    VariablePool,
};
use crate::graph::{GraphSink, Node};
use crate::jvm::{
    ArithOp, Comparison, Insn, JumpInsn, Label, Literal, MethodAccessFlags, MethodDescriptor,
    ParseDescriptor, RenderDescriptor, StackKind, UnaryIf,
};

/// A method whose events are still being buffered
struct MethodInfo {
    name: String,
    descriptor: String,
    access: MethodAccessFlags,
    events: Vec<MethodEvent>,
}

/// A condition root that exists as a node but has not found its place yet
///
/// Do-while roots are opened when the backward jump's destination line is
/// met, long before the condition instruction; ternary roots float free until
/// the consuming store adopts them.
#[derive(Copy, Clone, Debug)]
struct PendingRoot {
    order: usize,
    kind: JumpRootKind,
    pseudo_line: i32,
}

/// Everything torn down when a method ends, successfully or not
struct MethodState {
    ledger: MethodLedger,
    stack: Vec<OperandItem>,
    variables: VariablePool,
    scopes: Vec<ScopeItem>,
    jumps: Vec<JumpRec>,
    /// Condition root index -> goto index, for roots closed by an
    /// unconditional jump (if-else arms, loop back-edges)
    paired: Vec<(usize, usize)>,
    pending_roots: Vec<PendingRoot>,
    current_label: Option<Label>,
    current_line: i32,
    pseudo_line: i32,
}

impl MethodState {
    fn new(ledger: MethodLedger) -> MethodState {
        MethodState {
            ledger,
            stack: vec![],
            variables: VariablePool::default(),
            scopes: vec![],
            jumps: vec![],
            paired: vec![],
            pending_roots: vec![],
            current_label: None,
            current_line: -1,
            pseudo_line: -1,
        }
    }

    fn paired_goto(&self, jump: usize) -> Option<usize> {
        self.paired
            .iter()
            .find(|(root, _)| *root == jump)
            .map(|(_, goto)| *goto)
    }
}

/// Projects buffered bytecode events of a class onto a [`GraphSink`]
///
/// One projector handles any number of classes and methods in sequence;
/// `project_file_and_namespace` switches the class context and `begin_method`
/// / `end_method` bracket each method body. Method bodies are buffered, a
/// ledger is pre-scanned from the buffer, and only then is the buffer
/// replayed through the structural reconstruction below. A method that fails
/// leaves the projector (and the graph built so far) usable for the next one.
pub struct AstProjector<S: GraphSink> {
    sink: S,
    order: usize,
    class_path: String,
    file_id: Option<usize>,
    method: Option<MethodInfo>,
    state: MethodState,
}

impl<S: GraphSink> AstProjector<S> {
    pub fn new(sink: S) -> AstProjector<S> {
        let order = sink.next_order();
        AstProjector {
            sink,
            order,
            class_path: String::new(),
            file_id: None,
            method: None,
            state: MethodState::new(MethodLedger::default()),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn next_id(&mut self) -> usize {
        let id = self.order;
        self.order += 1;
        id
    }

    /// Sequence number new blocks attach under: the innermost open scope, or
    /// the method root when no scope is open
    fn scope_parent(&self) -> usize {
        match self.state.scopes.last() {
            Some(item) => item.order(&self.state.jumps),
            None => 0,
        }
    }

    /// Project the FILE node of a class, chained below its package's
    /// NAMESPACE_BLOCK nodes
    pub fn project_file_and_namespace(&mut self, namespace: &str, class_name: &str) {
        self.class_path = if namespace.is_empty() {
            class_name.to_owned()
        } else {
            format!("{}.{}", namespace, class_name)
        };
        let chain_tail = if namespace.is_empty() {
            None
        } else {
            Some(self.populate_namespace_chain(namespace))
        };
        let file = Node::File {
            id: self.next_id(),
            name: class_name.to_owned(),
        };
        let file_id = file.id();
        self.sink.create_free_node(file);
        if let Some(tail) = chain_tail {
            self.sink.join_nodes(tail, file_id);
        }
        self.file_id = Some(file_id);
    }

    /// Create one NAMESPACE_BLOCK per package segment, joined head to tail,
    /// and return the id of the last one
    fn populate_namespace_chain(&mut self, namespace: &str) -> usize {
        let mut segments = namespace.split('.');
        let first = segments.next().unwrap_or(namespace);
        let mut full_name = first.to_owned();
        let head = Node::NamespaceBlock {
            id: self.next_id(),
            name: first.to_owned(),
            full_name: full_name.clone(),
        };
        let mut previous = head.id();
        self.sink.create_free_node(head);
        for segment in segments {
            full_name.push('.');
            full_name.push_str(segment);
            let current = Node::NamespaceBlock {
                id: self.next_id(),
                name: segment.to_owned(),
                full_name: full_name.clone(),
            };
            let current_id = current.id();
            self.sink.create_free_node(current);
            self.sink.join_nodes(previous, current_id);
            previous = current_id;
        }
        previous
    }

    /// Start buffering a method body
    pub fn begin_method(&mut self, name: &str, descriptor: &str, access: MethodAccessFlags) {
        log::debug!("Visiting method {}{}", name, descriptor);
        self.method = Some(MethodInfo {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            access,
            events: vec![],
        });
    }

    /// Buffer one decoded instruction of the active method
    pub fn event(&mut self, event: MethodEvent) -> Result<(), Error> {
        match &mut self.method {
            Some(method) => {
                method.events.push(event);
                Ok(())
            }
            None => Err(Error::NoActiveMethod),
        }
    }

    pub fn line(&mut self, line: u32, label: Label) -> Result<(), Error> {
        self.event(MethodEvent::Line { line, label })
    }

    pub fn label(&mut self, label: Label) -> Result<(), Error> {
        self.event(MethodEvent::Label { label })
    }

    pub fn load_constant(&mut self, literal: Literal) -> Result<(), Error> {
        self.event(MethodEvent::LoadConstant { literal })
    }

    pub fn insn(&mut self, insn: Insn) -> Result<(), Error> {
        self.event(MethodEvent::Insn { insn })
    }

    pub fn push_immediate(&mut self, kind: StackKind, value: i32) -> Result<(), Error> {
        self.event(MethodEvent::PushImmediate { kind, value })
    }

    pub fn load(&mut self, slot: u16, kind: StackKind) -> Result<(), Error> {
        self.event(MethodEvent::Load { slot, kind })
    }

    pub fn store(&mut self, slot: u16, kind: StackKind) -> Result<(), Error> {
        self.event(MethodEvent::Store { slot, kind })
    }

    pub fn increment(&mut self, slot: u16, delta: i32) -> Result<(), Error> {
        self.event(MethodEvent::Increment { slot, delta })
    }

    pub fn jump(&mut self, insn: JumpInsn) -> Result<(), Error> {
        self.event(MethodEvent::Jump { insn })
    }

    /// Pre-scan and replay the buffered method body
    ///
    /// All per-method state is discarded afterwards whether reconstruction
    /// succeeded or not, so one malformed method cannot poison the next.
    pub fn end_method(&mut self) -> Result<(), Error> {
        let method = self.method.take().ok_or(Error::NoActiveMethod)?;
        self.state = MethodState::new(MethodLedger::scan(&method.events));
        let result = self.replay(&method);
        if let Err(err) = &result {
            log::warn!(
                "Giving up on method {}{}: {:?}",
                method.name,
                method.descriptor,
                err
            );
        }
        self.state = MethodState::new(MethodLedger::default());
        result
    }

    fn replay(&mut self, method: &MethodInfo) -> Result<(), Error> {
        for event in method.events.clone() {
            match event {
                MethodEvent::Line { line, label } => self.on_line(method, line, label)?,
                MethodEvent::Label { label } => self.state.current_label = Some(label),
                MethodEvent::LoadConstant { literal } => self.push_operand(OperandItem::Constant {
                    id: literal.value_string(),
                    type_name: literal.type_name().to_owned(),
                }),
                MethodEvent::Insn { insn } => self.on_insn(insn),
                MethodEvent::PushImmediate { kind, value } => {
                    self.push_operand(OperandItem::Constant {
                        id: value.to_string(),
                        type_name: kind.type_name().to_owned(),
                    })
                }
                MethodEvent::Load { slot, kind } => {
                    let variable = self.state.variables.get_or_insert(slot, kind.type_name());
                    self.push_operand(variable);
                }
                MethodEvent::Store { slot, kind } => self.on_store(slot, kind)?,
                MethodEvent::Increment { slot, delta } => self.on_increment(slot, delta)?,
                MethodEvent::Jump { insn } => self.on_jump(insn)?,
            }
        }
        Ok(())
    }

    /// Emit METHOD, METHOD_PARAMETER_IN, METHOD_RETURN and MODIFIER nodes
    ///
    /// Happens at the first line event of the body; methods without bodies
    /// (abstract, native) therefore never appear in the graph.
    fn create_method(&mut self, method: &MethodInfo, line: i32) -> Result<(), Error> {
        let descriptor = MethodDescriptor::parse(&method.descriptor)?;
        let node = Node::Method {
            id: self.next_id(),
            name: method.name.clone(),
            full_name: format!("{}.{}", self.class_path, method.name),
            signature: method.descriptor.clone(),
            line,
        };
        let method_order = node.id();
        self.sink.create_free_node(node);
        if let Some(file) = self.file_id {
            self.sink.join_nodes(file, method_order);
        }
        for parameter in &descriptor.parameters {
            let node = Node::MethodParameterIn {
                id: self.next_id(),
                code: parameter.render(),
                name: parameter.readable_name(),
                evaluation_strategy: parameter.evaluation_strategy(false),
                type_full_name: parameter.readable_name(),
                line,
            };
            self.sink.attach_node(method_order, node);
        }
        let node = Node::MethodReturn {
            id: self.next_id(),
            name: descriptor.return_name(),
            evaluation_strategy: descriptor.return_strategy(),
            type_full_name: descriptor.return_descriptor(),
            line,
        };
        self.sink.attach_node(method_order, node);
        for modifier in method.access.modifiers(&method.name) {
            let node = Node::Modifier {
                id: self.next_id(),
                modifier,
            };
            self.sink.attach_node(method_order, node);
        }
        Ok(())
    }

    fn push_operand(&mut self, item: OperandItem) {
        log::debug!("Pushing {:?}", item);
        self.state.stack.push(item);
    }

    fn pop_operand(&mut self) -> Result<OperandItem, Error> {
        self.state.stack.pop().ok_or(Error::StackUnderflow {
            line: self.state.current_line,
        })
    }

    fn on_insn(&mut self, insn: Insn) {
        match insn {
            Insn::Const(constant) => self.push_operand(OperandItem::Constant {
                id: constant.value_string(),
                type_name: constant.type_name().to_owned(),
            }),
            Insn::Operator(operator) => self.push_operand(OperandItem::Operator {
                id: operator.op.name().to_owned(),
                type_name: operator.kind.type_name().to_owned(),
            }),
        }
    }

    /// A new source line starts at `label`
    fn on_line(&mut self, method: &MethodInfo, line: u32, label: Label) -> Result<(), Error> {
        if self.state.current_line == -1 {
            self.create_method(method, line as i32 - 1)?;
        }
        self.state.current_line = line as i32;
        self.state.current_label = Some(label);
        let pseudo_line = self.state.ledger.pseudo_line(label);
        if pseudo_line != -1 {
            self.state.pseudo_line = pseudo_line;
        }

        let total = self.state.ledger.associated_jumps(self.state.pseudo_line);
        let conditional_total = total.iter().filter(|jump| !jump.op.is_goto()).count() as i32;
        let encountered = jumps_targeting(&self.state.jumps, label).len() as i32;
        let difference = conditional_total - encountered;

        if is_jump_destination(&self.state.jumps, label) {
            self.handle_jump_destination(label);
        }
        if difference >= 1 {
            self.handle_loop_destination(label, self.state.pseudo_line, difference, &total);
        }
        self.materialize_pending_body(line as i32);
        Ok(())
    }

    /// Turn the topmost reserved body scope into a BLOCK node
    fn materialize_pending_body(&mut self, line: i32) {
        // a ternary's speculative scopes must never become nodes
        if let Some(root) = self.state.pending_roots.last() {
            if self
                .state
                .ledger
                .associated_ternary_goto(root.pseudo_line)
                .is_some()
            {
                return;
            }
        }
        if let Some(ScopeItem::NestedBody {
            order, position, ..
        }) = self.state.scopes.last().copied()
        {
            if self.sink.is_known_node(order) {
                return;
            }
            self.state.scopes.pop();
            let parent = self.scope_parent();
            let body = Node::Block {
                id: order,
                name: position.name().to_owned(),
                type_full_name: "VOID".to_owned(),
                line,
            };
            self.sink.attach_node(parent, body);
            self.state.scopes.push(ScopeItem::NestedBody {
                order,
                label: self.state.current_label,
                position,
            });
        }
    }

    /// A line some already-seen jump lands on: close and realign scopes
    fn handle_jump_destination(&mut self, destination: Label) {
        let associated = jumps_targeting(&self.state.jumps, destination);
        let if_count = associated
            .iter()
            .filter(|jump| self.state.jumps[**jump].kind == JumpKind::IfCmp)
            .count() as i32;
        let goto_count = associated.len() as i32 - if_count;
        log::debug!(
            "Jump destination @ line {} ({}) #IfCmp: {} #Goto: {}",
            self.state.current_line,
            self.state.pseudo_line,
            if_count,
            goto_count
        );
        // if-else-if chains converge here: unwind one body+root pair per arm
        if if_count + goto_count > 1 && goto_count >= if_count && self.state.scopes.len() > 2 {
            for _ in 0..goto_count * (1 + if_count) {
                if self.state.scopes.len() < 2 {
                    break;
                }
                self.state.scopes.pop();
                self.state.scopes.pop();
            }
        }
        // keep sibling bodies of one root on the same level
        while self.state.scopes.len() > 2
            && !self.state.scopes[self.state.scopes.len() - 2].is_jump()
            && !jump_history(&self.state.scopes).is_empty()
        {
            self.state.scopes.pop();
            self.state.scopes.pop();
        }
        if self.state.scopes.len() < 2 {
            return;
        }
        if let ScopeItem::Jump { jump } = self.state.scopes[self.state.scopes.len() - 2] {
            let rec = self.state.jumps[jump];
            if rec.destination == destination {
                self.state.scopes.pop();
                let enclosing_root = self.state.ledger.jump_root_of_label(
                    self.state
                        .scopes
                        .last()
                        .and_then(|item| item.label(&self.state.jumps)),
                );
                let closes_loop = matches!(
                    enclosing_root,
                    JumpRootKind::While | JumpRootKind::DoWhile
                );
                if rec.position == JumpPosition::IfRoot
                    && rec.kind == JumpKind::IfCmp
                    && self.state.paired_goto(jump).is_some()
                    && !closes_loop
                {
                    // entering the else-body
                    let order = self.next_id();
                    self.state.scopes.push(ScopeItem::NestedBody {
                        order,
                        label: self.state.current_label,
                        position: JumpPosition::ElseBody,
                    });
                } else {
                    // exiting the root
                    self.state.scopes.pop();
                }
            } else if let Some(last) = associated.last().copied() {
                let last = self.state.jumps[last];
                if last.kind == JumpKind::Goto && last.destination == destination {
                    // steps off an else-body, and with it off the root
                    self.state.scopes.pop();
                    self.state.scopes.pop();
                }
            }
        }
    }

    /// A line targeted by jumps that have not been met yet: if they come
    /// from below and no goto closes them, a do-while body starts here
    fn handle_loop_destination(
        &mut self,
        start: Label,
        line: i32,
        difference: i32,
        total: &[JumpInfo],
    ) {
        log::debug!(
            "{:?} (pseudo-line {}) expects {} more incoming jump(s): {:?}",
            start,
            line,
            difference,
            total
        );
        for i in 0..difference {
            let first = match total.first() {
                Some(first) => *first,
                None => break,
            };
            let origin_line = self.state.ledger.pseudo_line(first.origin);
            let jumps_at_origin = self.state.ledger.associated_jumps(origin_line);
            if line >= origin_line || jumps_at_origin.iter().any(|jump| jump.op.is_goto()) {
                continue;
            }
            let root = Node::Block {
                id: self.next_id(),
                name: JumpRootKind::DoWhile.as_str().to_owned(),
                type_full_name: "BOOLEAN".to_owned(),
                line: self.state.current_line,
            };
            let root_order = root.id();
            self.state.pending_roots.push(PendingRoot {
                order: root_order,
                kind: JumpRootKind::DoWhile,
                pseudo_line: self.state.pseudo_line,
            });
            match self.state.scopes.last().copied() {
                None => self.sink.attach_node(0, root),
                Some(top) => {
                    let top_order = top.order(&self.state.jumps);
                    if !self.sink.is_known_node(top_order) {
                        // the enclosing body is still only reserved; it must
                        // become a node before the loop root can hang off it
                        let reserved = self.state.scopes.pop();
                        let parent = self.scope_parent();
                        let body = Node::Block {
                            id: top_order,
                            name: JumpPosition::IfBody.name().to_owned(),
                            type_full_name: "BOOLEAN".to_owned(),
                            line: self.state.current_line,
                        };
                        self.sink.attach_node(parent, body);
                        self.sink.attach_node(top_order, root);
                        if let Some(scope) = reserved {
                            self.state.scopes.push(scope);
                        }
                    } else {
                        self.sink.attach_node(top_order, root);
                    }
                }
            }
            // the condition instruction only appears later; its origin label
            // is backfilled once met
            let body_order = self.next_id();
            let rec_index = self.state.jumps.len();
            self.state.jumps.push(JumpRec {
                kind: JumpKind::IfCmp,
                order: root_order,
                label: None,
                destination: start,
                position: JumpPosition::IfRoot,
                pseudo_line: self.state.pseudo_line,
            });
            self.state.scopes.push(ScopeItem::Jump { jump: rec_index });
            self.state.scopes.push(ScopeItem::NestedBody {
                order: body_order,
                label: self.state.current_label,
                position: JumpPosition::IfBody,
            });
            if i != difference - 1 && difference > 1 {
                // nested loops opening on the same line materialize eagerly
                let body = Node::Block {
                    id: body_order,
                    name: JumpPosition::IfBody.name().to_owned(),
                    type_full_name: "VOID".to_owned(),
                    line: self.state.current_line,
                };
                self.sink.attach_node(root_order, body);
            }
        }
    }

    fn on_jump(&mut self, insn: JumpInsn) -> Result<(), Error> {
        match insn {
            JumpInsn::Goto { target } => {
                self.on_goto(target);
                Ok(())
            }
            JumpInsn::If { op, target } => self.on_unary_jump(op, target),
            JumpInsn::IfCmp {
                comparison,
                kind,
                target,
            } => {
                log::debug!(
                    "Recognized binary jump {:?} ({:?}) to {:?}",
                    comparison,
                    kind,
                    target
                );
                self.conditional_jump(comparison, kind.type_name(), target)
            }
        }
    }

    /// Unary jumps compare against an implicit zero or null; they consume
    /// their operand but project no structure of their own
    fn on_unary_jump(&mut self, op: UnaryIf, target: Label) -> Result<(), Error> {
        let argument = self.pop_operand()?;
        log::debug!(
            "Recognized unary jump {:?} to {:?}; argument = {:?}",
            op,
            target,
            argument
        );
        Ok(())
    }

    /// A conditional jump: open, resume, or continue a condition root
    fn conditional_jump(
        &mut self,
        comparison: Comparison,
        type_name: &str,
        target: Label,
    ) -> Result<(), Error> {
        let pseudo_line = self.state.pseudo_line;

        // continuation of a short-circuited condition on the same line
        if let Some(jump) = last_jump(&self.state.scopes) {
            let rec = self.state.jumps[jump];
            if rec.kind == JumpKind::IfCmp
                && rec.pseudo_line == pseudo_line
                && rec.destination == target
                && self.sink.is_known_node(rec.order)
            {
                log::debug!("Continuing condition root #{}", rec.order);
                return self.emit_comparison(rec.order, comparison, type_name);
            }
        }

        // a root opened early (do-while) waiting for this condition
        let resumed = match self.state.pending_roots.last() {
            Some(root)
                if root.kind == JumpRootKind::DoWhile
                    && self
                        .state
                        .ledger
                        .is_jump_associated_with_line(root.pseudo_line, pseudo_line) =>
            {
                self.state.pending_roots.pop()
            }
            _ => None,
        };
        if let Some(root) = resumed {
            log::debug!("Using existing {:?} vertex #{}", root.kind, root.order);
            self.state.ledger.upsert_jump_root(pseudo_line, root.kind);
            // the root finally learns its origin label
            if let Some(rec) = self
                .state
                .jumps
                .iter_mut()
                .find(|rec| rec.order == root.order)
            {
                rec.label = Some(target);
            }
            // the loop scaffolding closes with its condition
            self.state.scopes.pop();
            self.state.scopes.pop();
            return self.emit_comparison(root.order, comparison, type_name);
        }

        // a brand new root
        let is_ternary = self
            .state
            .ledger
            .associated_ternary_goto(pseudo_line)
            .is_some();
        let root = Node::Block {
            id: self.next_id(),
            name: JumpRootKind::If.as_str().to_owned(),
            type_full_name: "BOOLEAN".to_owned(),
            line: self.state.current_line,
        };
        let root_order = root.id();
        self.state
            .ledger
            .upsert_jump_root(pseudo_line, JumpRootKind::If);
        if is_ternary {
            log::debug!("Preparing the stack for a ternary jump");
            // the root floats free until the consuming store adopts it
            self.sink.create_free_node(root);
            self.state.pending_roots.push(PendingRoot {
                order: root_order,
                kind: JumpRootKind::If,
                pseudo_line,
            });
        } else {
            let parent = self.scope_parent();
            self.sink.attach_node(parent, root);
        }
        let rec_index = self.state.jumps.len();
        self.state.jumps.push(JumpRec {
            kind: JumpKind::IfCmp,
            order: root_order,
            label: self.state.current_label,
            destination: target,
            position: JumpPosition::IfRoot,
            pseudo_line,
        });
        self.state.scopes.push(ScopeItem::Jump { jump: rec_index });
        let body_order = self.next_id();
        self.state.scopes.push(ScopeItem::NestedBody {
            order: body_order,
            label: self.state.current_label,
            position: JumpPosition::IfBody,
        });
        self.emit_comparison(root_order, comparison, type_name)
    }

    /// The comparison node under a condition root, with its two operands
    ///
    /// The jump branches when the source condition is false, so the emitted
    /// comparison is the mnemonic's negation.
    fn emit_comparison(
        &mut self,
        root_order: usize,
        comparison: Comparison,
        type_name: &str,
    ) -> Result<(), Error> {
        let condition = Node::Block {
            id: self.next_id(),
            name: comparison.negated().name().to_owned(),
            type_full_name: type_name.to_owned(),
            line: self.state.current_line,
        };
        let condition_order = condition.id();
        self.sink.create_free_node(condition);
        self.sink.join_nodes(root_order, condition_order);
        let right = self.resolve_operand()?;
        let left = self.resolve_operand()?;
        self.sink.join_nodes(condition_order, left);
        self.sink.join_nodes(condition_order, right);
        Ok(())
    }

    /// An unconditional jump: close bodies, pair with its condition root,
    /// and rename the root when this is a loop back-edge
    fn on_goto(&mut self, target: Label) {
        let position = last_jump(&self.state.scopes)
            .map(|jump| self.state.jumps[jump].position)
            .or_else(|| {
                self.state
                    .jumps
                    .iter()
                    .max_by_key(|rec| rec.order)
                    .map(|rec| rec.position)
            })
            .unwrap_or(JumpPosition::IfRoot);
        // gotos never become nodes; the order is bookkeeping only
        let rec_index = self.state.jumps.len();
        self.state.jumps.push(JumpRec {
            kind: JumpKind::Goto,
            order: self.order,
            label: self.state.current_label,
            destination: target,
            position,
            pseudo_line: self.state.pseudo_line,
        });
        log::debug!("Pushing goto to {:?} at {:?}", target, position);
        self.state
            .ledger
            .upsert_jump_root(self.state.pseudo_line, JumpRootKind::Goto);
        self.pair_goto(rec_index);

        let destination_line = self.state.ledger.pseudo_line(target);
        let history = jump_history(&self.state.scopes);
        let mut popped_any = false;
        while let Some(top) = self.state.scopes.last().copied() {
            if top.is_jump() {
                break;
            }
            self.state.scopes.pop();
            popped_any = true;
        }
        if !popped_any {
            return;
        }

        // find which open root this goto belongs to, unwinding roots that
        // were already closed by their own paired goto
        let mut history = history;
        while history.len() > 1 {
            let top = history.pop().unwrap_or_default();
            if self.state.jumps[top].kind == JumpKind::IfCmp {
                if let Some(goto) = self.state.paired_goto(top) {
                    if goto == rec_index {
                        break;
                    }
                }
            }
            self.state.scopes.pop();
            self.state.scopes.pop();
        }
        if let Some(ScopeItem::Jump { jump }) = self.state.scopes.last().copied() {
            if self.state.jumps[jump].label != Some(target) {
                let order = self.next_id();
                self.state.scopes.push(ScopeItem::NestedBody {
                    order,
                    label: Some(target),
                    position: JumpPosition::ElseBody,
                });
            }
        }

        log::debug!(
            "Goto destination line {} vs current {}",
            destination_line,
            self.state.pseudo_line
        );
        if destination_line != -1 && destination_line < self.state.pseudo_line {
            // jumping backwards: every root paired with this goto is a loop
            let mut partners: Vec<usize> = self
                .state
                .paired
                .iter()
                .filter(|(_, goto)| *goto == rec_index)
                .map(|(root, _)| *root)
                .collect();
            partners.sort_unstable();
            for partner in partners {
                let rec = self.state.jumps[partner];
                let (kind, root_line) = match rec.label {
                    Some(label) => {
                        let line = self.state.ledger.pseudo_line(label);
                        (JumpRootKind::While, (line != -1).then(|| line))
                    }
                    None => (
                        JumpRootKind::DoWhile,
                        self.state
                            .ledger
                            .find_jump_line_by_destination(rec.destination),
                    ),
                };
                log::debug!("Loop back-edge closes root #{} as {:?}", rec.order, kind);
                if let Some(line) = root_line {
                    self.state.ledger.upsert_jump_root(line, kind);
                }
                self.sink
                    .update_node_property(rec.order, "name", kind.as_str());
                if !matches!(self.state.scopes.last(), Some(ScopeItem::NestedBody { .. })) {
                    self.state.scopes.pop();
                }
            }
        }
    }

    /// Pair every open condition root that branches elsewhere with this goto
    fn pair_goto(&mut self, goto_index: usize) {
        let destination = self.state.jumps[goto_index].destination;
        for jump in jump_history(&self.state.scopes).into_iter().rev() {
            let rec = self.state.jumps[jump];
            if rec.kind == JumpKind::IfCmp
                && rec.destination != destination
                && self.state.paired_goto(jump).is_none()
            {
                log::debug!("Pairing root #{} with goto to {:?}", rec.order, destination);
                self.state.paired.push((jump, goto_index));
            }
        }
    }

    /// An assignment: STORE block with the target variable on the left and
    /// the consumed operand (expanded recursively for operators) on the right
    fn on_store(&mut self, slot: u16, kind: StackKind) -> Result<(), Error> {
        let operand = self.pop_operand()?;
        let var_type = kind.type_name();
        let variable = self.state.variables.get_or_insert(slot, var_type);
        // assignments hang under the loop body, never under the loop root
        while let Some(top) = self.state.scopes.last().copied() {
            match top.label(&self.state.jumps) {
                Some(label) if self.state.ledger.is_label_associated_with_loops(label) => {
                    self.state.scopes.pop();
                }
                _ => break,
            }
        }
        let base = Node::Block {
            id: self.next_id(),
            name: "STORE".to_owned(),
            type_full_name: var_type.to_owned(),
            line: self.state.current_line,
        };
        log::debug!("Pushing {} for slot {}", base, slot);
        let is_ternary = match self.state.pending_roots.last() {
            Some(root) => self
                .state
                .ledger
                .associated_ternary_goto(root.pseudo_line)
                .is_some(),
            None => false,
        };
        if is_ternary {
            return self.merge_ternary_store(base, variable, operand);
        }
        let base_order = base.id();
        let parent = self.scope_parent();
        self.sink.attach_node(parent, base);
        self.state.scopes.push(ScopeItem::Store {
            order: base_order,
            label: self.state.current_label,
        });
        let local = Node::Local {
            id: self.next_id(),
            name: variable.id().to_owned(),
            type_full_name: variable.type_name().to_owned(),
            line: self.state.current_line,
        };
        self.sink.attach_node(base_order, local);
        self.attach_value(base_order, operand)?;
        self.state.scopes.pop();
        Ok(())
    }

    /// The store consuming a ternary: the floating condition root becomes
    /// the value subtree, its arms direct children next to the condition
    fn merge_ternary_store(
        &mut self,
        base: Node,
        variable: OperandItem,
        else_arm: OperandItem,
    ) -> Result<(), Error> {
        // the speculative body and root scopes never became nodes
        self.state.scopes.pop();
        self.state.scopes.pop();
        let root = match self.state.pending_roots.pop() {
            Some(root) => root,
            None => {
                log::warn!("Ternary store without a pending condition root");
                return Ok(());
            }
        };
        log::debug!("Merging ternary root #{} into {}", root.order, base);
        let base_order = base.id();
        let parent = self.scope_parent();
        self.sink.attach_node(parent, base);
        let local = Node::Local {
            id: self.next_id(),
            name: variable.id().to_owned(),
            type_full_name: variable.type_name().to_owned(),
            line: self.state.current_line,
        };
        self.sink.attach_node(base_order, local);
        self.sink.join_nodes(base_order, root.order);
        // the else arm was pushed after the then arm, so it resolves first
        let else_id = self.resolve_value(else_arm)?;
        let then_id = self.resolve_operand()?;
        self.sink.join_nodes(root.order, then_id);
        self.sink.join_nodes(root.order, else_id);
        Ok(())
    }

    /// Desugared `IINC`: variable, |delta| and ADD/SUB go through the same
    /// machinery as an explicit load/const/operator/store sequence
    fn on_increment(&mut self, slot: u16, delta: i32) -> Result<(), Error> {
        let type_name = StackKind::Int.type_name();
        let variable = self.state.variables.get_or_insert(slot, type_name);
        let op = if delta > 0 { ArithOp::Add } else { ArithOp::Sub };
        self.push_operand(variable);
        self.push_operand(OperandItem::Constant {
            id: delta.abs().to_string(),
            type_name: type_name.to_owned(),
        });
        self.push_operand(OperandItem::Operator {
            id: op.name().to_owned(),
            type_name: type_name.to_owned(),
        });
        self.on_store(slot, StackKind::Int)
    }

    /// Attach a consumed operand below `parent`, expanding operators into
    /// their own blocks
    fn attach_value(&mut self, parent: usize, operand: OperandItem) -> Result<(), Error> {
        let child = self.resolve_value(operand)?;
        self.sink.join_nodes(parent, child);
        Ok(())
    }

    /// Pop one operand and build its subtree
    fn resolve_operand(&mut self) -> Result<usize, Error> {
        let operand = self.pop_operand()?;
        self.resolve_value(operand)
    }

    /// Build the subtree of an already-popped operand and return its root id
    ///
    /// An operator's operands sit on the stack in push order, so the right
    /// subtree must be consumed in full before the left one is even popped.
    /// Edges are joined left first so children still read in source order.
    fn resolve_value(&mut self, operand: OperandItem) -> Result<usize, Error> {
        match operand {
            OperandItem::Operator { id, type_name } => {
                log::debug!("Next operator: {} ({})", id, type_name);
                let block = Node::Block {
                    id: self.next_id(),
                    name: id,
                    type_full_name: type_name,
                    line: self.state.current_line,
                };
                let block_order = block.id();
                self.sink.create_free_node(block);
                let right = self.resolve_operand()?;
                let left = self.resolve_operand()?;
                self.sink.join_nodes(block_order, left);
                self.sink.join_nodes(block_order, right);
                Ok(block_order)
            }
            OperandItem::Constant { id, type_name } => {
                let literal = Node::Literal {
                    id: self.next_id(),
                    name: id,
                    type_full_name: type_name,
                    line: self.state.current_line,
                };
                let order = literal.id();
                self.sink.create_free_node(literal);
                Ok(order)
            }
            OperandItem::Variable { id, type_name } => {
                let local = Node::Local {
                    id: self.next_id(),
                    name: id,
                    type_full_name: type_name,
                    line: self.state.current_line,
                };
                let order = local.id();
                self.sink.create_free_node(local);
                Ok(order)
            }
        }
    }
}
