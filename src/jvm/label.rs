use std::fmt;

/// Opaque label marking a position in a method's instruction stream
///
/// Labels are minted by whatever decodes the class file and feeds us events;
/// the reconstructor only ever compares them for identity and looks them up in
/// per-method tables.
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Label(pub u32);

impl Label {
    /// Label for the first position in the method
    pub const START: Label = Label(0);
}

impl fmt::Debug for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("L{}", self.0))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("L{}", self.0))
    }
}
