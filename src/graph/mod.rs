mod node;
mod sink;

pub use node::*;
pub use sink::*;
