use crate::candid::label::Label;
use crate::{Error, Result};
use std::collections::BTreeMap;

pub const OPCODE_NULL: i64 = -1;
pub const OPCODE_BOOL: i64 = -2;
pub const OPCODE_NAT: i64 = -3;
pub const OPCODE_INT: i64 = -4;
pub const OPCODE_NAT8: i64 = -5;
pub const OPCODE_NAT16: i64 = -6;
pub const OPCODE_NAT32: i64 = -7;
pub const OPCODE_NAT64: i64 = -8;
pub const OPCODE_INT8: i64 = -9;
pub const OPCODE_INT16: i64 = -10;
pub const OPCODE_INT32: i64 = -11;
pub const OPCODE_INT64: i64 = -12;
pub const OPCODE_FLOAT32: i64 = -13;
pub const OPCODE_FLOAT64: i64 = -14;
pub const OPCODE_TEXT: i64 = -15;
pub const OPCODE_RESERVED: i64 = -16;
pub const OPCODE_EMPTY: i64 = -17;
pub const OPCODE_OPT: i64 = -18;
pub const OPCODE_VECTOR: i64 = -19;
pub const OPCODE_RECORD: i64 = -20;
pub const OPCODE_VARIANT: i64 = -21;
pub const OPCODE_FUNC: i64 = -22;
pub const OPCODE_SERVICE: i64 = -23;
pub const OPCODE_PRINCIPAL: i64 = -24;

/// A type descriptor. Primitives carry nothing; compound descriptors own
/// their children. Recursive definitions name themselves through
/// `rec_id` and close the cycle with `Ref` to that name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdlType {
    Null,
    Bool,
    Nat,
    Int,
    Nat8,
    Nat16,
    Nat32,
    Nat64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Reserved,
    Empty,
    Principal,
    Opt(Box<IdlType>),
    Vector(Box<IdlType>),
    Record(CompoundType),
    Variant(CompoundType),
    Func(FuncType),
    Service(ServiceType),
    Ref(String),
}

/// Field layout shared by records and variants. Fields live in a map
/// keyed by `Label`, which keeps them in ascending tag order, the order
/// both the type table and the value stream require.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundType {
    pub fields: BTreeMap<Label, IdlType>,
    pub rec_id: Option<String>,
}

impl CompoundType {
    pub fn new(fields: Vec<(Label, IdlType)>, rec_id: Option<String>) -> Result<Self> {
        let mut map: BTreeMap<Label, IdlType> = BTreeMap::new();
        for (label, field_type) in fields {
            if let Some((existing, _)) = map.get_key_value(&label) {
                if existing.collides_with(&label) {
                    return Err(Error::InvalidValue(format!(
                        "field names {} and {} hash to the same tag {}",
                        existing,
                        label,
                        label.id()
                    )));
                }
                return Err(Error::InvalidValue(format!("duplicate field tag {}", label)));
            }
            map.insert(label, field_type);
        }
        Ok(CompoundType {
            fields: map,
            rec_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncAnnotation {
    Query,
    Oneway,
    CompositeQuery,
}

impl FuncAnnotation {
    pub fn to_byte(self) -> u8 {
        match self {
            FuncAnnotation::Query => 1,
            FuncAnnotation::Oneway => 2,
            FuncAnnotation::CompositeQuery => 3,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(FuncAnnotation::Query),
            2 => Ok(FuncAnnotation::Oneway),
            3 => Ok(FuncAnnotation::CompositeQuery),
            other => Err(Error::Decoding(format!(
                "unknown function annotation {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    pub args: Vec<IdlType>,
    pub rets: Vec<IdlType>,
    pub annotations: Vec<FuncAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceType {
    /// Methods keyed by name, which keeps them sorted the way the type
    /// table serializes them.
    pub methods: BTreeMap<String, FuncType>,
    pub rec_id: Option<String>,
}

impl IdlType {
    /// The inline opcode for primitive types. Compound types return None;
    /// they are referenced through the type table instead.
    pub fn opcode(&self) -> Option<i64> {
        match self {
            IdlType::Null => Some(OPCODE_NULL),
            IdlType::Bool => Some(OPCODE_BOOL),
            IdlType::Nat => Some(OPCODE_NAT),
            IdlType::Int => Some(OPCODE_INT),
            IdlType::Nat8 => Some(OPCODE_NAT8),
            IdlType::Nat16 => Some(OPCODE_NAT16),
            IdlType::Nat32 => Some(OPCODE_NAT32),
            IdlType::Nat64 => Some(OPCODE_NAT64),
            IdlType::Int8 => Some(OPCODE_INT8),
            IdlType::Int16 => Some(OPCODE_INT16),
            IdlType::Int32 => Some(OPCODE_INT32),
            IdlType::Int64 => Some(OPCODE_INT64),
            IdlType::Float32 => Some(OPCODE_FLOAT32),
            IdlType::Float64 => Some(OPCODE_FLOAT64),
            IdlType::Text => Some(OPCODE_TEXT),
            IdlType::Reserved => Some(OPCODE_RESERVED),
            IdlType::Empty => Some(OPCODE_EMPTY),
            IdlType::Principal => Some(OPCODE_PRINCIPAL),
            _ => None,
        }
    }

    pub fn from_opcode(opcode: i64) -> Result<IdlType> {
        match opcode {
            OPCODE_NULL => Ok(IdlType::Null),
            OPCODE_BOOL => Ok(IdlType::Bool),
            OPCODE_NAT => Ok(IdlType::Nat),
            OPCODE_INT => Ok(IdlType::Int),
            OPCODE_NAT8 => Ok(IdlType::Nat8),
            OPCODE_NAT16 => Ok(IdlType::Nat16),
            OPCODE_NAT32 => Ok(IdlType::Nat32),
            OPCODE_NAT64 => Ok(IdlType::Nat64),
            OPCODE_INT8 => Ok(IdlType::Int8),
            OPCODE_INT16 => Ok(IdlType::Int16),
            OPCODE_INT32 => Ok(IdlType::Int32),
            OPCODE_INT64 => Ok(IdlType::Int64),
            OPCODE_FLOAT32 => Ok(IdlType::Float32),
            OPCODE_FLOAT64 => Ok(IdlType::Float64),
            OPCODE_TEXT => Ok(IdlType::Text),
            OPCODE_RESERVED => Ok(IdlType::Reserved),
            OPCODE_EMPTY => Ok(IdlType::Empty),
            OPCODE_PRINCIPAL => Ok(IdlType::Principal),
            other => Err(Error::Decoding(format!(
                "opcode {} does not name a primitive type",
                other
            ))),
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.opcode().is_some()
    }

    pub fn opt(inner: IdlType) -> IdlType {
        IdlType::Opt(Box::new(inner))
    }

    pub fn vector(inner: IdlType) -> IdlType {
        IdlType::Vector(Box::new(inner))
    }

    pub fn record(fields: Vec<(Label, IdlType)>) -> Result<IdlType> {
        Ok(IdlType::Record(CompoundType::new(fields, None)?))
    }

    /// A record that names itself so nested `Ref`s can point back at it.
    pub fn record_named(rec_id: &str, fields: Vec<(Label, IdlType)>) -> Result<IdlType> {
        Ok(IdlType::Record(CompoundType::new(
            fields,
            Some(rec_id.to_string()),
        )?))
    }

    pub fn variant(options: Vec<(Label, IdlType)>) -> Result<IdlType> {
        Ok(IdlType::Variant(CompoundType::new(options, None)?))
    }

    pub fn variant_named(rec_id: &str, options: Vec<(Label, IdlType)>) -> Result<IdlType> {
        Ok(IdlType::Variant(CompoundType::new(
            options,
            Some(rec_id.to_string()),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_round_trip() {
        for opcode in -17i64..=-1 {
            let idl_type = IdlType::from_opcode(opcode).unwrap();
            assert_eq!(idl_type.opcode(), Some(opcode));
        }
        assert_eq!(
            IdlType::from_opcode(OPCODE_PRINCIPAL).unwrap(),
            IdlType::Principal
        );
        assert!(IdlType::from_opcode(OPCODE_RECORD).is_err());
        assert!(IdlType::from_opcode(0).is_err());
    }

    #[test]
    fn test_record_rejects_duplicate_tags() {
        let duplicate = IdlType::record(vec![
            (Label::from_id(1), IdlType::Nat),
            (Label::from_id(1), IdlType::Text),
        ]);
        assert!(matches!(duplicate, Err(Error::InvalidValue(_))));
    }

    #[test]
    fn test_record_fields_sort_by_tag() {
        let record = IdlType::record(vec![
            (Label::named("b"), IdlType::Nat),
            (Label::named("a"), IdlType::Text),
        ])
        .unwrap();
        if let IdlType::Record(compound) = record {
            let ids: Vec<u32> = compound.fields.keys().map(|label| label.id()).collect();
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            assert_eq!(ids, sorted);
        } else {
            panic!("expected a record");
        }
    }
}
