mod access_flags;
mod descriptors;
mod instructions;
mod label;

pub use access_flags::*;
pub use descriptors::*;
pub use instructions::*;
pub use label::*;
