use bytecode2cpg::ast::{AstProjector, Error};
use bytecode2cpg::graph::{MemoryGraph, Node, NodeKind};
use bytecode2cpg::jvm::{
    ArithOp, Comparison, ConstInsn, IfCmpKind, Insn, JumpInsn, Label, MethodAccessFlags,
    OperatorInsn, StackKind,
};

/// Builds a method body event by event and hands back the projected graph
pub struct TestHarness {
    projector: AstProjector<MemoryGraph>,
}

impl TestHarness {
    pub fn new() -> TestHarness {
        let mut projector = AstProjector::new(MemoryGraph::new());
        projector.project_file_and_namespace("za.ac.example", "Sample");
        TestHarness { projector }
    }

    pub fn method(&mut self, name: &str, descriptor: &str) {
        self.projector.begin_method(
            name,
            descriptor,
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        );
    }

    pub fn line(&mut self, line: u32, label: u32) {
        self.projector.line(line, Label(label)).unwrap();
    }

    pub fn label(&mut self, label: u32) {
        self.projector.label(Label(label)).unwrap();
    }

    pub fn iconst(&mut self, value: i32) {
        self.projector.insn(Insn::Const(ConstInsn::Int(value))).unwrap();
    }

    pub fn bipush(&mut self, value: i32) {
        self.projector.push_immediate(StackKind::Int, value).unwrap();
    }

    pub fn iload(&mut self, slot: u16) {
        self.projector.load(slot, StackKind::Int).unwrap();
    }

    pub fn istore(&mut self, slot: u16) {
        self.projector.store(slot, StackKind::Int).unwrap();
    }

    pub fn iinc(&mut self, slot: u16, delta: i32) {
        self.projector.increment(slot, delta).unwrap();
    }

    pub fn iop(&mut self, op: ArithOp) {
        self.projector
            .insn(Insn::Operator(OperatorInsn {
                kind: StackKind::Int,
                op,
            }))
            .unwrap();
    }

    pub fn if_icmp(&mut self, comparison: Comparison, target: u32) {
        self.projector
            .jump(JumpInsn::IfCmp {
                comparison,
                kind: IfCmpKind::Int,
                target: Label(target),
            })
            .unwrap();
    }

    pub fn goto(&mut self, target: u32) {
        self.projector
            .jump(JumpInsn::Goto {
                target: Label(target),
            })
            .unwrap();
    }

    pub fn end(&mut self) -> Result<(), Error> {
        self.projector.end_method()
    }

    pub fn finish(self) -> MemoryGraph {
        self.projector.into_sink()
    }
}

fn method_id(graph: &MemoryGraph, name: &str) -> usize {
    graph
        .method(&format!("za.ac.example.Sample.{}", name))
        .unwrap_or_else(|| panic!("no METHOD node for {}", name))
        .id()
}

fn child_block<'g>(graph: &'g MemoryGraph, parent: usize, name: &str) -> &'g Node {
    graph
        .child_named(parent, NodeKind::Block, name)
        .unwrap_or_else(|| panic!("no {} block under #{}", name, parent))
}

#[test]
fn projects_namespace_file_and_method_metadata() {
    let mut harness = TestHarness::new();
    harness.method("main", "([Ljava/lang/String;)V");
    harness.line(6, 0);
    harness.iconst(0);
    harness.istore(1);
    harness.end().unwrap();
    let graph = harness.finish();

    let za = graph.find_all(NodeKind::NamespaceBlock, "za")[0];
    let ac = graph.child_named(za.id(), NodeKind::NamespaceBlock, "ac").unwrap();
    let example = graph
        .child_named(ac.id(), NodeKind::NamespaceBlock, "example")
        .unwrap();
    let file = graph.child_named(example.id(), NodeKind::File, "Sample").unwrap();

    let method = graph.method("za.ac.example.Sample.main").unwrap();
    assert_eq!(Some(5), method.line());
    assert!(graph.children(file.id()).iter().any(|n| n.id() == method.id()));

    let parameter = graph
        .child_named(method.id(), NodeKind::MethodParameterIn, "java/lang/String[]")
        .unwrap();
    assert_eq!(Some("java/lang/String[]"), parameter.type_full_name());
    let ret = graph.child_named(method.id(), NodeKind::MethodReturn, "VOID").unwrap();
    assert_eq!(Some("V"), ret.type_full_name());
    assert!(graph.child_named(method.id(), NodeKind::Modifier, "STATIC").is_some());
    assert!(graph.child_named(method.id(), NodeKind::Modifier, "PUBLIC").is_some());
    assert!(graph.child_named(method.id(), NodeKind::Modifier, "VIRTUAL").is_none());
}

#[test]
fn straight_line_stores_nest_operators() {
    // int a = 3; int b = a + c * 2;
    let mut harness = TestHarness::new();
    harness.method("arithmetic", "()V");
    harness.line(6, 0);
    harness.iconst(3);
    harness.istore(1);
    harness.line(7, 1);
    harness.iconst(5);
    harness.istore(2);
    harness.line(8, 2);
    harness.iload(1);
    harness.iload(2);
    harness.iconst(2);
    harness.iop(ArithOp::Mul);
    harness.iop(ArithOp::Add);
    harness.istore(3);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "arithmetic");
    assert_eq!(3, graph.count_descendants(method, NodeKind::Block, "STORE"));

    let add = graph.descendant_named(method, NodeKind::Block, "ADD").unwrap();
    let operands = graph.children(add.id());
    assert_eq!(2, operands.len());
    assert_eq!(NodeKind::Local, operands[0].kind());
    assert_eq!("1", operands[0].name());
    assert_eq!(NodeKind::Block, operands[1].kind());
    assert_eq!("MUL", operands[1].name());

    let factors = graph.children(operands[1].id());
    assert_eq!("2", factors[0].name());
    assert_eq!("2", factors[1].name());
    assert_eq!(NodeKind::Local, factors[0].kind());
    assert_eq!(NodeKind::Literal, factors[1].kind());
}

#[test]
fn simple_if_gets_condition_and_body() {
    // if (a > b) { c = 1; } d = 0;
    let mut harness = TestHarness::new();
    harness.method("branch", "()V");
    harness.line(6, 0);
    harness.iconst(5);
    harness.istore(1);
    harness.line(7, 1);
    harness.iconst(3);
    harness.istore(2);
    harness.line(8, 2);
    harness.iload(1);
    harness.iload(2);
    harness.if_icmp(Comparison::Le, 3);
    harness.line(9, 4);
    harness.iconst(1);
    harness.istore(3);
    harness.line(10, 3);
    harness.iconst(0);
    harness.istore(4);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "branch");
    assert_eq!(1, graph.find_all(NodeKind::Block, "IF").len());
    let root = graph.descendant_named(method, NodeKind::Block, "IF").unwrap();

    let condition = child_block(&graph, root.id(), "GT");
    let arguments = graph.children(condition.id());
    assert_eq!(vec!["1", "2"], arguments.iter().map(|n| n.name()).collect::<Vec<_>>());

    let body = child_block(&graph, root.id(), "IF_BODY");
    assert!(graph.child_named(root.id(), NodeKind::Block, "ELSE_BODY").is_none());
    let store = child_block(&graph, body.id(), "STORE");
    assert!(graph.child_named(store.id(), NodeKind::Local, "3").is_some());

    // the trailing store sits back on the method level
    let top_stores: Vec<&Node> = graph
        .children(method)
        .into_iter()
        .filter(|n| n.kind() == NodeKind::Block && n.name() == "STORE")
        .collect();
    assert_eq!(3, top_stores.len());
}

#[test]
fn if_else_adds_else_body() {
    // if (a > b) { c = 1; } else { c = 2; } d = 0;
    let mut harness = TestHarness::new();
    harness.method("branch", "()V");
    harness.line(6, 0);
    harness.iconst(5);
    harness.istore(1);
    harness.line(7, 1);
    harness.iconst(3);
    harness.istore(2);
    harness.line(8, 2);
    harness.iload(1);
    harness.iload(2);
    harness.if_icmp(Comparison::Le, 3);
    harness.line(9, 4);
    harness.iconst(1);
    harness.istore(3);
    harness.goto(5);
    harness.line(11, 3);
    harness.iconst(2);
    harness.istore(3);
    harness.line(12, 5);
    harness.iconst(0);
    harness.istore(4);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "branch");
    let root = graph.descendant_named(method, NodeKind::Block, "IF").unwrap();
    assert!(graph.child_named(root.id(), NodeKind::Block, "GT").is_some());

    let then_body = child_block(&graph, root.id(), "IF_BODY");
    let then_store = child_block(&graph, then_body.id(), "STORE");
    assert!(graph.child_named(then_store.id(), NodeKind::Literal, "1").is_some());

    let else_body = child_block(&graph, root.id(), "ELSE_BODY");
    let else_store = child_block(&graph, else_body.id(), "STORE");
    assert!(graph.child_named(else_store.id(), NodeKind::Local, "3").is_some());
    assert!(graph.child_named(else_store.id(), NodeKind::Literal, "2").is_some());
}

#[test]
fn else_if_chain_nests_inside_else_body() {
    // if (a < 0) { b = 1; } else if (a > 10) { b = 2; } else { b = 3; } c = 0;
    let mut harness = TestHarness::new();
    harness.method("chain", "()V");
    harness.line(6, 0);
    harness.iconst(5);
    harness.istore(1);
    harness.line(7, 1);
    harness.iload(1);
    harness.iconst(0);
    harness.if_icmp(Comparison::Ge, 2);
    harness.line(8, 3);
    harness.iconst(1);
    harness.istore(2);
    harness.goto(4);
    harness.line(9, 2);
    harness.iload(1);
    harness.bipush(10);
    harness.if_icmp(Comparison::Le, 5);
    harness.line(10, 6);
    harness.iconst(2);
    harness.istore(2);
    harness.goto(4);
    harness.line(11, 5);
    harness.iconst(3);
    harness.istore(2);
    harness.line(12, 4);
    harness.iconst(0);
    harness.istore(3);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "chain");
    let roots = graph.find_all(NodeKind::Block, "IF");
    assert_eq!(2, roots.len());

    let outer = roots[0];
    assert!(graph.child_named(outer.id(), NodeKind::Block, "LT").is_some());
    let outer_else = child_block(&graph, outer.id(), "ELSE_BODY");

    // the second branch hangs inside the first one's else-body
    let inner = child_block(&graph, outer_else.id(), "IF");
    assert_eq!(inner.id(), roots[1].id());
    assert!(graph.child_named(inner.id(), NodeKind::Block, "GT").is_some());
    let inner_then = child_block(&graph, inner.id(), "IF_BODY");
    let inner_else = child_block(&graph, inner.id(), "ELSE_BODY");
    assert!(graph.child_named(inner_then.id(), NodeKind::Block, "STORE").is_some());
    assert!(graph.child_named(inner_else.id(), NodeKind::Block, "STORE").is_some());

    assert_eq!(5, graph.count_descendants(method, NodeKind::Block, "STORE"));
}

#[test]
fn backward_goto_renames_root_to_while() {
    // while (a < 10) { a++; } b = 0;
    let mut harness = TestHarness::new();
    harness.method("looping", "()V");
    harness.line(6, 0);
    harness.iconst(0);
    harness.istore(1);
    harness.line(8, 1);
    harness.iload(1);
    harness.bipush(10);
    harness.if_icmp(Comparison::Ge, 2);
    harness.line(9, 3);
    harness.iinc(1, 1);
    harness.goto(1);
    harness.line(10, 2);
    harness.iconst(0);
    harness.istore(2);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "looping");
    assert!(graph.find_all(NodeKind::Block, "IF").is_empty());
    assert_eq!(3, graph.count_descendants(method, NodeKind::Block, "STORE"));
    let loops = graph.find_all(NodeKind::Block, "WHILE");
    assert_eq!(1, loops.len());

    let root = loops[0];
    let children = graph.children(root.id());
    assert_eq!(vec!["LT", "IF_BODY"], children.iter().map(|n| n.name()).collect::<Vec<_>>());

    let body = child_block(&graph, root.id(), "IF_BODY");
    let store = child_block(&graph, body.id(), "STORE");
    assert!(graph.child_named(store.id(), NodeKind::Block, "ADD").is_some());
}

#[test]
fn do_while_opens_body_before_condition() {
    // do { a++; } while (a < 10);
    let mut harness = TestHarness::new();
    harness.method("repeat", "()V");
    harness.line(6, 0);
    harness.iconst(0);
    harness.istore(1);
    harness.line(8, 1);
    harness.iinc(1, 1);
    harness.line(9, 2);
    harness.iload(1);
    harness.bipush(10);
    harness.if_icmp(Comparison::Lt, 1);
    harness.end().unwrap();
    let graph = harness.finish();

    let loops = graph.find_all(NodeKind::Block, "DO_WHILE");
    assert_eq!(1, loops.len());

    // body first, condition second: the source order of a do-while
    let children = graph.children(loops[0].id());
    assert_eq!(vec!["IF_BODY", "GE"], children.iter().map(|n| n.name()).collect::<Vec<_>>());

    let body = child_block(&graph, loops[0].id(), "IF_BODY");
    let store = child_block(&graph, body.id(), "STORE");
    assert!(graph.child_named(store.id(), NodeKind::Local, "1").is_some());
}

#[test]
fn same_line_conditions_share_one_root() {
    // if (a > 3 && b > 3) { c = 1; } d = 0;
    let mut harness = TestHarness::new();
    harness.method("both", "()V");
    harness.line(6, 0);
    harness.iconst(5);
    harness.istore(1);
    harness.line(7, 1);
    harness.iconst(5);
    harness.istore(2);
    harness.line(8, 2);
    harness.iload(1);
    harness.iconst(3);
    harness.if_icmp(Comparison::Le, 3);
    harness.iload(2);
    harness.iconst(3);
    harness.if_icmp(Comparison::Le, 3);
    harness.line(9, 4);
    harness.iconst(1);
    harness.istore(3);
    harness.line(10, 3);
    harness.iconst(0);
    harness.istore(4);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "both");
    let roots = graph.find_all(NodeKind::Block, "IF");
    assert_eq!(1, roots.len());

    // the second comparison joins the open root instead of opening its own
    let children = graph.children(roots[0].id());
    assert_eq!(
        vec!["GT", "GT", "IF_BODY"],
        children.iter().map(|n| n.name()).collect::<Vec<_>>()
    );
    for condition in &children[..2] {
        assert_eq!(2, graph.children(condition.id()).len());
    }

    let body = child_block(&graph, roots[0].id(), "IF_BODY");
    assert!(graph.child_named(body.id(), NodeKind::Block, "STORE").is_some());

    // the trailing store sits back on the method level
    let trailing = graph
        .find_all(NodeKind::Block, "STORE")
        .into_iter()
        .find(|s| graph.child_named(s.id(), NodeKind::Local, "4").is_some())
        .unwrap();
    assert!(graph.children(method).iter().any(|n| n.id() == trailing.id()));
}

#[test]
fn ternary_arms_hang_directly_under_the_reused_root() {
    // max = a > b ? a : b;
    let mut harness = TestHarness::new();
    harness.method("pick", "()V");
    harness.line(6, 0);
    harness.iconst(5);
    harness.istore(1);
    harness.line(7, 1);
    harness.iconst(3);
    harness.istore(2);
    harness.line(8, 2);
    harness.iload(1);
    harness.iload(2);
    harness.if_icmp(Comparison::Le, 3);
    harness.iload(1);
    harness.goto(4);
    harness.label(3);
    harness.iload(2);
    harness.label(4);
    harness.istore(3);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "pick");
    // no speculative bodies survive the merge
    assert_eq!(0, graph.count_descendants(method, NodeKind::Block, "IF_BODY"));
    assert_eq!(0, graph.count_descendants(method, NodeKind::Block, "ELSE_BODY"));

    let store = graph
        .find_all(NodeKind::Block, "STORE")
        .into_iter()
        .find(|s| graph.child_named(s.id(), NodeKind::Local, "3").is_some())
        .unwrap();
    let root = child_block(&graph, store.id(), "IF");

    let children = graph.children(root.id());
    assert_eq!(
        vec!["GT", "1", "2"],
        children.iter().map(|n| n.name()).collect::<Vec<_>>()
    );
    assert_eq!(NodeKind::Local, children[1].kind());
    assert_eq!(NodeKind::Local, children[2].kind());
}

#[test]
fn stack_underflow_is_confined_to_its_method() {
    let mut harness = TestHarness::new();
    harness.method("broken", "()V");
    harness.line(3, 0);
    harness.istore(1);
    let err = harness.end().unwrap_err();
    assert!(matches!(err, Error::StackUnderflow { line: 3 }));

    harness.method("fine", "()V");
    harness.line(5, 0);
    harness.iconst(2);
    harness.istore(1);
    harness.end().unwrap();
    let graph = harness.finish();

    // the failed method still left its signature behind
    assert!(graph.method("za.ac.example.Sample.broken").is_some());
    let fine = method_id(&graph, "fine");
    assert_eq!(1, graph.count_descendants(fine, NodeKind::Block, "STORE"));
}

#[test]
fn parameters_decode_in_declaration_order() {
    let mut harness = TestHarness::new();
    harness.method("call", "(ILjava/lang/String;)V");
    harness.line(4, 0);
    harness.iconst(0);
    harness.istore(1);
    harness.end().unwrap();
    let graph = harness.finish();

    let method = method_id(&graph, "call");
    let parameters: Vec<&str> = graph
        .children(method)
        .into_iter()
        .filter(|n| n.kind() == NodeKind::MethodParameterIn)
        .map(|n| n.name())
        .collect();
    assert_eq!(vec!["INTEGER", "java/lang/String"], parameters);
    assert!(graph.child_named(method, NodeKind::MethodReturn, "VOID").is_some());
}

#[test]
fn rerunning_a_body_projects_an_isomorphic_subtree() {
    let mut harness = TestHarness::new();
    for name in ["first", "second"] {
        harness.method(name, "()V");
        harness.line(6, 0);
        harness.iconst(5);
        harness.istore(1);
        harness.line(7, 1);
        harness.iconst(3);
        harness.istore(2);
        harness.line(8, 2);
        harness.iload(1);
        harness.iload(2);
        harness.if_icmp(Comparison::Le, 3);
        harness.line(9, 4);
        harness.iconst(1);
        harness.istore(3);
        harness.line(10, 3);
        harness.iconst(0);
        harness.istore(4);
        harness.end().unwrap();
    }
    let graph = harness.finish();

    let shape = |name: &str| -> Vec<(NodeKind, String)> {
        graph
            .descendants(method_id(&graph, name))
            .into_iter()
            .map(|n| (n.kind(), n.name().to_owned()))
            .collect()
    };
    // descendants come back in id order, which follows emission order, so
    // equal shapes mean isomorphic subtrees up to the id offset
    assert_eq!(shape("first"), shape("second"));
}
