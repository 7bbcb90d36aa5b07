//! Recover structured control flow from linear JVM bytecode and project it
//! into a code property graph
//!
//! Bytecode erases `if`/`else`, loops and ternaries into conditional jumps
//! and gotos. [`ast::AstProjector`] consumes a stream of decoded method
//! events, pre-scans the jump table of each method, and replays the body to
//! rebuild the block structure onto any [`graph::GraphSink`].

pub mod ast;
pub mod graph;
pub mod jvm;
