use std::collections::HashMap;

/// Abstract mirror of one value on the simulated operand stack
///
/// Identity is the `id` string plus the item kind; the concrete runtime value
/// is irrelevant to reconstruction. Constants keep their literal spelling,
/// variables their slot number, operators their operation name.
#[derive(Clone, Eq, Debug)]
pub enum OperandItem {
    Constant { id: String, type_name: String },
    Variable { id: String, type_name: String },
    Operator { id: String, type_name: String },
}

impl OperandItem {
    pub fn id(&self) -> &str {
        match self {
            OperandItem::Constant { id, .. }
            | OperandItem::Variable { id, .. }
            | OperandItem::Operator { id, .. } => id,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            OperandItem::Constant { type_name, .. }
            | OperandItem::Variable { type_name, .. }
            | OperandItem::Operator { type_name, .. } => type_name,
        }
    }
}

impl PartialEq for OperandItem {
    fn eq(&self, other: &OperandItem) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.id() == other.id()
    }
}

/// Local variables of the active method, deduplicated by slot
///
/// A slot keeps the type it had when first seen; later loads and stores of
/// the same slot reuse that item so that equal slots compare equal.
#[derive(Default)]
pub struct VariablePool {
    by_slot: HashMap<u16, OperandItem>,
}

impl VariablePool {
    /// The variable for `slot`, created with `type_name` on first sight
    pub fn get_or_insert(&mut self, slot: u16, type_name: &str) -> OperandItem {
        self.by_slot
            .entry(slot)
            .or_insert_with(|| OperandItem::Variable {
                id: slot.to_string(),
                type_name: type_name.to_owned(),
            })
            .clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_type_wins() {
        let mut pool = VariablePool::default();
        let first = pool.get_or_insert(1, "INTEGER");
        let second = pool.get_or_insert(1, "OBJECT");
        assert_eq!(first, second);
        assert_eq!("INTEGER", second.type_name());
    }

    #[test]
    fn identity_ignores_type() {
        let a = OperandItem::Constant {
            id: "3".into(),
            type_name: "INTEGER".into(),
        };
        let b = OperandItem::Constant {
            id: "3".into(),
            type_name: "LONG".into(),
        };
        let c = OperandItem::Variable {
            id: "3".into(),
            type_name: "INTEGER".into(),
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
