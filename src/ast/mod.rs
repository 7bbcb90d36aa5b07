mod errors;
mod events;
mod ledger;
mod operand;
mod projector;
mod scope;

pub use errors::*;
pub use events::*;
pub use ledger::*;
pub use operand::*;
pub use projector::*;
pub use scope::*;
