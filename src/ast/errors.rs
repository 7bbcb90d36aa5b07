use std::io;

/// Ways projection of a method can fail
///
/// Only genuinely malformed input lands here. Structural surprises (a scope
/// stack that doesn't line up with the jumps actually seen) are not errors:
/// they degrade to an unstructured attachment and a warning, because a graph
/// with one flat region beats no graph at all.
#[derive(Debug)]
pub enum Error {
    /// An instruction needed an operand but the simulated stack was empty
    StackUnderflow { line: i32 },

    /// An instruction or end-of-method event arrived outside any method
    NoActiveMethod,

    /// The method descriptor failed to parse
    Descriptor(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Descriptor(err)
    }
}
