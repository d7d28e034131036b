use crate::candid::label::Label;
use crate::principal::Principal;
use crate::{Error, Result};
use num_bigint::{BigInt, BigUint};
use std::collections::BTreeMap;

/// A typed value. The union parallels `IdlType`; a value on its own does
/// not know the declared option set of its variant or the element type of
/// an empty vector, so encoding always pairs a value with a descriptor.
#[derive(Debug, Clone)]
pub enum IdlValue {
    Bool(bool),
    Nat(BigUint),
    Int(BigInt),
    Nat8(u8),
    Nat16(u16),
    Nat32(u32),
    Nat64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Null,
    Reserved,
    /// The bottom type has no inhabitants; the variant exists so the
    /// union is total, but encoding one is an error.
    Empty,
    Principal(Principal),
    Vector(Vec<IdlValue>),
    Opt(Option<Box<IdlValue>>),
    Record(BTreeMap<Label, IdlValue>),
    Variant {
        label: Label,
        value: Box<IdlValue>,
    },
    Service(Principal),
    Func(FuncValue),
}

/// A function reference: either an opaque handle minted by the system or
/// a concrete (service, method) pair.
#[derive(Debug, Clone)]
pub enum FuncValue {
    Opaque,
    Method {
        service: Principal,
        method: String,
    },
}

impl IdlValue {
    pub fn record(fields: Vec<(Label, IdlValue)>) -> Result<IdlValue> {
        let mut map: BTreeMap<Label, IdlValue> = BTreeMap::new();
        for (label, value) in fields {
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
            map.insert(label, value);
        }
        Ok(IdlValue::Record(map))
    }

    pub fn variant(label: Label, value: IdlValue) -> IdlValue {
        IdlValue::Variant {
            label,
            value: Box::new(value),
        }
    }

    pub fn opt(value: Option<IdlValue>) -> IdlValue {
        IdlValue::Opt(value.map(Box::new))
    }

    pub fn text(value: &str) -> IdlValue {
        IdlValue::Text(value.to_string())
    }

    /// Short discriminant name, used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            IdlValue::Bool(_) => "bool",
            IdlValue::Nat(_) => "nat",
            IdlValue::Int(_) => "int",
            IdlValue::Nat8(_) => "nat8",
            IdlValue::Nat16(_) => "nat16",
            IdlValue::Nat32(_) => "nat32",
            IdlValue::Nat64(_) => "nat64",
            IdlValue::Int8(_) => "int8",
            IdlValue::Int16(_) => "int16",
            IdlValue::Int32(_) => "int32",
            IdlValue::Int64(_) => "int64",
            IdlValue::Float32(_) => "float32",
            IdlValue::Float64(_) => "float64",
            IdlValue::Text(_) => "text",
            IdlValue::Null => "null",
            IdlValue::Reserved => "reserved",
            IdlValue::Empty => "empty",
            IdlValue::Principal(_) => "principal",
            IdlValue::Vector(_) => "vec",
            IdlValue::Opt(_) => "opt",
            IdlValue::Record(_) => "record",
            IdlValue::Variant { .. } => "variant",
            IdlValue::Service(_) => "service",
            IdlValue::Func(_) => "func",
        }
    }
}

/// Structural equality. Two opaque function references are never equal:
/// without a real identity there is nothing to compare, so the
/// conservative answer is `false` (which also means this type cannot be
/// `Eq`).
impl PartialEq for IdlValue {
    fn eq(&self, other: &Self) -> bool {
        use IdlValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (Nat(a), Nat(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Nat8(a), Nat8(b)) => a == b,
            (Nat16(a), Nat16(b)) => a == b,
            (Nat32(a), Nat32(b)) => a == b,
            (Nat64(a), Nat64(b)) => a == b,
            (Int8(a), Int8(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (Float32(a), Float32(b)) => a == b,
            (Float64(a), Float64(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Null, Null) => true,
            (Reserved, Reserved) => true,
            (Empty, Empty) => true,
            (Principal(a), Principal(b)) => a == b,
            (Vector(a), Vector(b)) => a == b,
            (Opt(a), Opt(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            (
                Variant { label: la, value: va },
                Variant { label: lb, value: vb },
            ) => la == lb && va == vb,
            (Service(a), Service(b)) => a == b,
            (Func(a), Func(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for FuncValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FuncValue::Method {
                    service: sa,
                    method: ma,
                },
                FuncValue::Method {
                    service: sb,
                    method: mb,
                },
            ) => sa == sb && ma == mb,
            // opaque references carry no identity to compare
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_tag_rejected() {
        let result = IdlValue::record(vec![
            (Label::from_id(0), IdlValue::Bool(true)),
            (Label::from_id(0), IdlValue::Bool(false)),
        ]);
        assert!(matches!(result, Err(Error::InvalidValue(_))));
    }

    #[test]
    fn test_hash_collision_rejected() {
        // both names are kept so the collision is detectable
        let a = Label::named("id");
        let b = Label::named("id");
        assert!(IdlValue::record(vec![
            (a, IdlValue::Null),
            (b, IdlValue::Null),
        ])
        .is_err());
    }

    #[test]
    fn test_opaque_func_references_never_equal() {
        let a = IdlValue::Func(FuncValue::Opaque);
        let b = IdlValue::Func(FuncValue::Opaque);
        assert_ne!(a, b);
        assert_ne!(a, a.clone());
    }

    #[test]
    fn test_concrete_func_references_compare() {
        let service = Principal::from_slice(&[1, 2, 3]).unwrap();
        let a = IdlValue::Func(FuncValue::Method {
            service: service.clone(),
            method: "greet".to_string(),
        });
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_structural_equality_nested() {
        let make = || {
            IdlValue::record(vec![
                (Label::named("items"), IdlValue::Vector(vec![
                    IdlValue::opt(Some(IdlValue::Nat64(7))),
                ])),
                (Label::named("label"), IdlValue::text("x")),
            ])
            .unwrap()
        };
        assert_eq!(make(), make());
    }
}
