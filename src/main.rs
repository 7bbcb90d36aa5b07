use bytecode2cpg::*;

use ast::{AstProjector, MethodEvent};
use clap::{App, Arg};
use graph::MemoryGraph;
use jvm::{
    ArithOp, Comparison, ConstInsn, IfCmpKind, Insn, JumpInsn, Label, Literal,
    MethodAccessFlags, OperatorInsn, StackKind, UnaryIf,
};
use std::fs;
use std::io;

fn main() {
    env_logger::init();

    let matches = App::new("Bytecode structure projector")
        .version("0.1.0")
        .about("Replays javap-style bytecode traces and prints the recovered code property graph")
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input trace files to replay")
                .required(true)
                .multiple(true)
                .index(1),
        )
        .get_matches();

    let mut projector = AstProjector::new(MemoryGraph::new());
    for trace_file in matches.values_of("INPUT").into_iter().flatten() {
        replay_file(&mut projector, trace_file);
    }

    let graph = projector.into_sink();
    let mut rendered = String::new();
    for root in graph.roots() {
        graph.render_tree(root.id(), &mut rendered);
    }
    print!("{}", rendered);
}

/// Read and replay one trace file; one bad trace must not take the others
/// down with it, so read and replay failures are both logged and skipped
fn replay_file(projector: &mut AstProjector<MemoryGraph>, trace_file: &str) {
    log::info!("Reading and replaying '{}'", trace_file);
    let trace = match fs::read_to_string(trace_file) {
        Ok(trace) => trace,
        Err(err) => {
            log::warn!("Cannot read '{}': {}", trace_file, err);
            return;
        }
    };
    if let Err(err) = replay_trace(projector, &trace) {
        log::warn!("Giving up on '{}': {:?}", trace_file, err);
    }
}

/// Feed one trace file, directive by directive, into the projector
fn replay_trace(
    projector: &mut AstProjector<MemoryGraph>,
    trace: &str,
) -> Result<(), ast::Error> {
    for line in trace.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        let directive = words.next().unwrap_or("");
        let rest: Vec<&str> = words.collect();
        parse_directive(projector, directive, &rest)
            .map_err(|err| malformed(&format!("{}: {:?}", line, err)))??;
    }
    Ok(())
}

fn malformed(line: &str) -> ast::Error {
    ast::Error::Descriptor(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("Malformed trace directive: {}", line),
    ))
}

/// Dispatch one directive; the outer error is a parse failure, the inner one
/// a projection failure
fn parse_directive(
    projector: &mut AstProjector<MemoryGraph>,
    directive: &str,
    args: &[&str],
) -> Result<Result<(), ast::Error>, Box<dyn std::error::Error>> {
    match directive {
        "class" => {
            let namespace = args.first().copied().unwrap_or("");
            let name = args.get(1).copied().ok_or("expected: class NAMESPACE NAME")?;
            projector.project_file_and_namespace(namespace, name);
            Ok(Ok(()))
        }
        "method" => {
            let name = args.first().copied().ok_or("expected: method NAME DESC FLAGS")?;
            let descriptor = args.get(1).copied().ok_or("expected a method descriptor")?;
            let mut access = MethodAccessFlags::empty();
            for word in &args[2..] {
                access |= parse_access_flag(word)?;
            }
            projector.begin_method(name, descriptor, access);
            Ok(Ok(()))
        }
        "end" => Ok(projector.end_method()),
        "line" => {
            let line: u32 = args.first().copied().ok_or("expected a line number")?.parse()?;
            let label = parse_label(args.get(1).copied().ok_or("expected a label")?)?;
            Ok(projector.line(line, label))
        }
        "label" => {
            let label = parse_label(args.first().copied().ok_or("expected a label")?)?;
            Ok(projector.label(label))
        }
        "ldc" => {
            let value = args.first().copied().ok_or("expected a literal")?;
            Ok(projector.load_constant(parse_literal(value)?))
        }
        "goto" => {
            let target = parse_label(args.first().copied().ok_or("expected a label")?)?;
            Ok(projector.jump(JumpInsn::Goto { target }))
        }
        "iinc" => {
            let slot: u16 = args.first().copied().ok_or("expected a slot")?.parse()?;
            let delta: i32 = args.get(1).copied().ok_or("expected a delta")?.parse()?;
            Ok(projector.increment(slot, delta))
        }
        "bipush" | "sipush" => {
            let value: i32 = args.first().copied().ok_or("expected a value")?.parse()?;
            Ok(projector.push_immediate(StackKind::Int, value))
        }
        "aconst_null" => Ok(projector.insn(Insn::Const(ConstInsn::Null))),
        _ => parse_mnemonic(projector, directive, args),
    }
}

/// The regular prefixed mnemonics: loads, stores, constants, operators, jumps
fn parse_mnemonic(
    projector: &mut AstProjector<MemoryGraph>,
    mnemonic: &str,
    args: &[&str],
) -> Result<Result<(), ast::Error>, Box<dyn std::error::Error>> {
    if let Some(comparison) = mnemonic.strip_prefix("if_icmp") {
        let target = parse_label(args.first().copied().ok_or("expected a label")?)?;
        return Ok(projector.jump(JumpInsn::IfCmp {
            comparison: parse_comparison(comparison)?,
            kind: IfCmpKind::Int,
            target,
        }));
    }
    if let Some(comparison) = mnemonic.strip_prefix("if_acmp") {
        let target = parse_label(args.first().copied().ok_or("expected a label")?)?;
        return Ok(projector.jump(JumpInsn::IfCmp {
            comparison: parse_comparison(comparison)?,
            kind: IfCmpKind::Ref,
            target,
        }));
    }
    if mnemonic == "ifnull" || mnemonic == "ifnonnull" {
        let target = parse_label(args.first().copied().ok_or("expected a label")?)?;
        let op = if mnemonic == "ifnull" {
            UnaryIf::Null
        } else {
            UnaryIf::NonNull
        };
        return Ok(projector.jump(JumpInsn::If { op, target }));
    }
    if let Some(comparison) = mnemonic.strip_prefix("if") {
        let target = parse_label(args.first().copied().ok_or("expected a label")?)?;
        return Ok(projector.jump(JumpInsn::If {
            op: UnaryIf::Cmp(parse_comparison(comparison)?),
            target,
        }));
    }

    let kind = parse_stack_kind(mnemonic.chars().next().unwrap_or(' '))?;
    let rest = &mnemonic[1..];
    if rest == "load" || rest == "store" {
        let slot: u16 = args.first().copied().ok_or("expected a slot")?.parse()?;
        let event = if rest == "load" {
            MethodEvent::Load { slot, kind }
        } else {
            MethodEvent::Store { slot, kind }
        };
        return Ok(projector.event(event));
    }
    if let Some(value) = rest.strip_prefix("const_") {
        let value: i64 = value.parse()?;
        let constant = match kind {
            StackKind::Int => ConstInsn::Int(value as i32),
            StackKind::Long => ConstInsn::Long(value),
            StackKind::Float => ConstInsn::Float(value as f32),
            StackKind::Double => ConstInsn::Double(value as f64),
            StackKind::Object => return Err("reference constants are aconst_null only".into()),
        };
        return Ok(projector.insn(Insn::Const(constant)));
    }
    let op = parse_operator(rest)?;
    Ok(projector.insn(Insn::Operator(OperatorInsn { kind, op })))
}

fn parse_access_flag(word: &str) -> Result<MethodAccessFlags, Box<dyn std::error::Error>> {
    match word {
        "public" => Ok(MethodAccessFlags::PUBLIC),
        "private" => Ok(MethodAccessFlags::PRIVATE),
        "protected" => Ok(MethodAccessFlags::PROTECTED),
        "static" => Ok(MethodAccessFlags::STATIC),
        "final" => Ok(MethodAccessFlags::FINAL),
        "synchronized" => Ok(MethodAccessFlags::SYNCHRONIZED),
        "native" => Ok(MethodAccessFlags::NATIVE),
        "abstract" => Ok(MethodAccessFlags::ABSTRACT),
        _ => Err(format!("unknown access flag '{}'", word).into()),
    }
}

fn parse_label(word: &str) -> Result<Label, Box<dyn std::error::Error>> {
    let digits = word.strip_prefix('L').unwrap_or(word);
    Ok(Label(digits.parse()?))
}

fn parse_comparison(word: &str) -> Result<Comparison, Box<dyn std::error::Error>> {
    match word {
        "eq" => Ok(Comparison::Eq),
        "ne" => Ok(Comparison::Ne),
        "lt" => Ok(Comparison::Lt),
        "ge" => Ok(Comparison::Ge),
        "gt" => Ok(Comparison::Gt),
        "le" => Ok(Comparison::Le),
        _ => Err(format!("unknown comparison '{}'", word).into()),
    }
}

fn parse_stack_kind(prefix: char) -> Result<StackKind, Box<dyn std::error::Error>> {
    match prefix {
        'i' => Ok(StackKind::Int),
        'l' => Ok(StackKind::Long),
        'f' => Ok(StackKind::Float),
        'd' => Ok(StackKind::Double),
        'a' => Ok(StackKind::Object),
        _ => Err(format!("unknown mnemonic prefix '{}'", prefix).into()),
    }
}

fn parse_operator(word: &str) -> Result<ArithOp, Box<dyn std::error::Error>> {
    match word {
        "add" => Ok(ArithOp::Add),
        "sub" => Ok(ArithOp::Sub),
        "mul" => Ok(ArithOp::Mul),
        "div" => Ok(ArithOp::Div),
        "rem" => Ok(ArithOp::Rem),
        "neg" => Ok(ArithOp::Neg),
        "and" => Ok(ArithOp::And),
        "or" => Ok(ArithOp::Or),
        "xor" => Ok(ArithOp::Xor),
        "shl" => Ok(ArithOp::Shl),
        "shr" => Ok(ArithOp::Shr),
        "ushr" => Ok(ArithOp::Ushr),
        _ => Err(format!("unknown operator '{}'", word).into()),
    }
}

/// `42` is an int, `42L` a long, `1.5f` a float, `1.5` a double, anything
/// else a string
fn parse_literal(word: &str) -> Result<Literal, Box<dyn std::error::Error>> {
    if let Ok(value) = word.parse::<i32>() {
        return Ok(Literal::Int(value));
    }
    if let Some(digits) = word.strip_suffix('L') {
        if let Ok(value) = digits.parse::<i64>() {
            return Ok(Literal::Long(value));
        }
    }
    if let Some(digits) = word.strip_suffix('f') {
        if let Ok(value) = digits.parse::<f32>() {
            return Ok(Literal::Float(value));
        }
    }
    if let Ok(value) = word.parse::<f64>() {
        return Ok(Literal::Double(value));
    }
    Ok(Literal::Str(word.to_owned()))
}
