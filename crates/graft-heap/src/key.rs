//! Canonical key forms
//!
//! Hash- and equality-based containers index their entries by a [`KeyForm`]
//! computed from the key's state *at insertion time*. A record type with key
//! fields canonicalises structurally, so mutating those fields after insertion
//! leaves the entry filed under a stale form, exactly like a real hash table.

use std::fmt::{self, Display, Formatter};

use crate::object::ObjectId;
use crate::types::TypeId;

/// Canonical, hashable and totally ordered form of a key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyForm {
    /// Null key
    Null,
    /// Boolean key
    Bool(bool),
    /// Integer key
    Int(i64),
    /// Float key, compared by bit pattern
    Float(u64),
    /// String key
    Str(String),
    /// Type handle key
    Type(TypeId),
    /// Object compared by identity
    Identity(ObjectId),
    /// Record compared by its key fields
    Composite(String, Vec<KeyForm>),
}

impl KeyForm {
    /// Whether the form is the null key
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Display for KeyForm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Type(ty) => write!(f, "type {ty}"),
            Self::Identity(id) => write!(f, "{id}"),
            Self::Composite(name, parts) => {
                write!(f, "{name}(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_display() {
        let form = KeyForm::Composite("Key".into(), vec![KeyForm::Int(1), KeyForm::Str("a".into())]);
        assert_eq!(form.to_string(), "Key(1, \"a\")");
    }

    #[test]
    fn ordering_is_total_across_variants() {
        let mut forms = vec![KeyForm::Int(3), KeyForm::Null, KeyForm::Int(1)];
        forms.sort();
        assert_eq!(forms, vec![KeyForm::Null, KeyForm::Int(1), KeyForm::Int(3)]);
    }
}
