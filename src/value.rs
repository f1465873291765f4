//! Runtime values for packing/unpacking (codec representation).

use crate::ast::{EnumDef, EnumVariant};
use std::collections::HashMap;

/// One segment value of a message instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Bool(bool),
    Enum(EnumValue),
}

/// Values of one message instance keyed by segment name.
pub type MessageValues = HashMap<String, Value>;

/// Raw integer of an enumerated segment.
///
/// Unpacking never range-checks: a raw value with no matching variant is kept
/// as-is and [`EnumValue::narrow`] reports it as [`EnumMember::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMember<'a> {
    Known(&'a EnumVariant),
    Unknown(u64),
}

impl EnumValue {
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Unchecked narrowing of the raw value into `def`.
    pub fn narrow(self, def: &EnumDef) -> EnumMember<'_> {
        match def.variant_by_value(self.0) {
            Some(v) => EnumMember::Known(v),
            None => EnumMember::Unknown(self.0),
        }
    }
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Unsigned(x) => Some(*x),
            Value::Enum(e) => Some(e.raw()),
            Value::Bool(b) => Some(u64::from(*b)),
            Value::Signed(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Signed(x) => Some(*x),
            Value::Unsigned(x) => (*x).try_into().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<EnumValue> {
        match self {
            Value::Enum(e) => Some(*e),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::Unsigned(_) => "unsigned",
            Value::Signed(_) => "signed",
            Value::Bool(_) => "bool",
            Value::Enum(_) => "enum",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gear() -> EnumDef {
        EnumDef {
            name: "Gear".to_string(),
            variants: vec![
                EnumVariant { name: "Park".to_string(), value: 0 },
                EnumVariant { name: "Drive".to_string(), value: 1 },
            ],
        }
    }

    #[test]
    fn narrow_known_and_unknown() {
        let def = gear();
        match EnumValue(1).narrow(&def) {
            EnumMember::Known(v) => assert_eq!(v.name, "Drive"),
            other => panic!("expected Drive, got {:?}", other),
        }
        assert_eq!(EnumValue(7).narrow(&def), EnumMember::Unknown(7));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Unsigned(5).as_i64(), Some(5));
        assert_eq!(Value::Signed(-1).as_u64(), None);
        assert_eq!(Value::Enum(EnumValue(3)).as_u64(), Some(3));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
    }
}
