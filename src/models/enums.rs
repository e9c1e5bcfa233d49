use crate::store::StoreError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StoreError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ValueKind {
    Str => "str",
    Int => "int",
    Date => "date",
    DateTime => "datetime",
    Id => "uuid",
});

/// Declared column type of a field on an external source schema, as reported
/// by the host's schema introspection. Relation-typed fields mirror as an
/// opaque identifier; anything else is unsupported and rejected by the
/// synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datatype {
    Char,
    Text,
    Integer,
    Date,
    DateTime,
    ForeignKey,
    Uuid,
    Other(String),
}

impl Datatype {
    /// The value slot this datatype maps to, or None when it cannot be
    /// mirrored.
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            Datatype::Char | Datatype::Text => Some(ValueKind::Str),
            Datatype::Integer => Some(ValueKind::Int),
            Datatype::Date => Some(ValueKind::Date),
            Datatype::DateTime => Some(ValueKind::DateTime),
            Datatype::ForeignKey | Datatype::Uuid => Some(ValueKind::Id),
            Datatype::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn value_kind_round_trips_through_str() {
        for kind in [
            ValueKind::Str,
            ValueKind::Int,
            ValueKind::Date,
            ValueKind::DateTime,
            ValueKind::Id,
        ] {
            assert_eq!(ValueKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn value_kind_rejects_unknown_tag() {
        let err = ValueKind::from_str("float").unwrap_err();
        assert!(matches!(err, StoreError::InvalidEnum { .. }));
    }

    #[test]
    fn datatype_maps_relations_to_identifier() {
        assert_eq!(Datatype::ForeignKey.value_kind(), Some(ValueKind::Id));
        assert_eq!(Datatype::Uuid.value_kind(), Some(ValueKind::Id));
    }

    #[test]
    fn datatype_other_is_unsupported() {
        assert_eq!(Datatype::Other("JSONField".into()).value_kind(), None);
    }
}
