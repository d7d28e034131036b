use crate::candid::label::Label;
use crate::candid::leb128::{
    write_sleb128, write_sleb128_i64, write_uleb128, write_uleb128_u64, ByteReader,
};
use crate::candid::type_table::TypeTable;
use crate::candid::types::{CompoundType, FuncAnnotation, FuncType, IdlType, ServiceType};
use crate::candid::value::{FuncValue, IdlValue};
use crate::principal::Principal;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};

pub const MAGIC: &[u8; 4] = b"DIDL";

/// Values nest one level per input byte at most, but a hostile payload a
/// megabyte deep would still blow the stack without a ceiling.
const MAX_NESTING_DEPTH: usize = 1024;

type TypeEnv = HashMap<String, IdlType>;

/// Encodes an ordered argument list: magic marker, one shared compound
/// type table, per-argument type codes, then the value stream.
pub fn encode_args(args: &[(IdlValue, IdlType)]) -> Result<Vec<u8>> {
    let mut env = TypeEnv::new();
    for (_, idl_type) in args {
        collect_named_types(idl_type, &mut env)?;
    }

    let mut table = TypeTable::new();
    let mut codes: Vec<i64> = Vec::with_capacity(args.len());
    for (_, idl_type) in args {
        codes.push(table.get_or_add(idl_type)?);
    }

    let mut vbytes: Vec<u8> = vec![];
    vbytes.extend(MAGIC);
    vbytes.extend(table.serialize());
    write_sleb128_i64(&mut vbytes, args.len() as i64);
    for code in codes {
        write_sleb128_i64(&mut vbytes, code);
    }
    for (value, idl_type) in args {
        encode_value(&mut vbytes, value, idl_type, &env)?;
    }
    Ok(vbytes)
}

/// Decodes an argument list produced by `encode_args` (or by a peer
/// speaking the same wire format).
pub fn decode_args(bytes: &[u8]) -> Result<Vec<IdlValue>> {
    Ok(decode_args_with_types(bytes)?
        .into_iter()
        .map(|(value, _)| value)
        .collect())
}

pub fn decode_args_with_types(bytes: &[u8]) -> Result<Vec<(IdlValue, IdlType)>> {
    let mut reader = ByteReader::new(bytes);
    let magic = reader.read_bytes(4).map_err(|_| {
        Error::Decoding("input is too short to carry the magic marker".to_string())
    })?;
    if magic != MAGIC {
        return Err(Error::Decoding(format!(
            "bad magic marker {:02x?}",
            magic
        )));
    }

    let entries = parse_type_table(&mut reader)?;
    let arg_count = reader.read_sleb128_i64()?;
    if arg_count < 0 {
        return Err(Error::Decoding("negative argument count".to_string()));
    }
    let mut codes: Vec<i64> = Vec::with_capacity(arg_count as usize);
    for _ in 0..arg_count {
        codes.push(reader.read_sleb128_i64()?);
    }

    let mut resolver = Resolver::new(&entries);
    let mut arg_types: Vec<IdlType> = Vec::with_capacity(codes.len());
    for code in &codes {
        arg_types.push(resolver.resolve_code(*code)?);
    }
    let env = resolver.into_env();

    let mut args: Vec<(IdlValue, IdlType)> = Vec::with_capacity(arg_types.len());
    for idl_type in arg_types {
        let value = decode_value(&mut reader, &idl_type, &env, 0)?;
        args.push((value, idl_type));
    }
    if !reader.is_empty() {
        return Err(Error::Decoding(format!(
            "{} trailing bytes after the last argument",
            reader.remaining()
        )));
    }
    Ok(args)
}

/// Registers every named compound reachable from `idl_type` so value
/// encoding can chase `Ref`s.
fn collect_named_types(idl_type: &IdlType, env: &mut TypeEnv) -> Result<()> {
    match idl_type {
        IdlType::Opt(inner) | IdlType::Vector(inner) => collect_named_types(inner, env),
        IdlType::Record(compound) | IdlType::Variant(compound) => {
            if let Some(rec_id) = &compound.rec_id {
                if let Some(previous) = env.insert(rec_id.clone(), idl_type.clone()) {
                    if previous != *idl_type {
                        return Err(Error::InvalidValue(format!(
                            "two distinct compound types are both named {}",
                            rec_id
                        )));
                    }
                    return Ok(());
                }
            }
            for (_, field_type) in &compound.fields {
                collect_named_types(field_type, env)?;
            }
            Ok(())
        }
        IdlType::Func(func) => {
            for arg in func.args.iter().chain(func.rets.iter()) {
                collect_named_types(arg, env)?;
            }
            Ok(())
        }
        IdlType::Service(service) => {
            if let Some(rec_id) = &service.rec_id {
                env.insert(rec_id.clone(), idl_type.clone());
            }
            for (_, func) in &service.methods {
                collect_named_types(&IdlType::Func(func.clone()), env)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn mismatch(value: &IdlValue, idl_type: &IdlType) -> Error {
    Error::InvalidValue(format!(
        "a {} value does not inhabit type {:?}",
        value.kind(),
        idl_type
    ))
}

fn encode_value(
    vbytes: &mut Vec<u8>,
    value: &IdlValue,
    idl_type: &IdlType,
    env: &TypeEnv,
) -> Result<()> {
    match (idl_type, value) {
        (IdlType::Ref(name), _) => {
            let resolved = env.get(name).ok_or_else(|| {
                Error::InvalidValue(format!(
                    "type reference {} does not resolve to a named compound type",
                    name
                ))
            })?;
            let resolved = resolved.clone();
            encode_value(vbytes, value, &resolved, env)
        }
        (IdlType::Null, IdlValue::Null) => Ok(()),
        (IdlType::Reserved, IdlValue::Reserved) => Ok(()),
        (IdlType::Empty, _) => Err(Error::InvalidValue(
            "the empty type has no values and cannot be encoded".to_string(),
        )),
        (IdlType::Bool, IdlValue::Bool(flag)) => {
            vbytes.push(*flag as u8);
            Ok(())
        }
        (IdlType::Nat, IdlValue::Nat(nat)) => {
            write_uleb128(vbytes, nat);
            Ok(())
        }
        (IdlType::Int, IdlValue::Int(int)) => {
            write_sleb128(vbytes, int);
            Ok(())
        }
        (IdlType::Nat8, IdlValue::Nat8(n)) => {
            vbytes.push(*n);
            Ok(())
        }
        (IdlType::Nat16, IdlValue::Nat16(n)) => {
            vbytes.extend(&n.to_le_bytes());
            Ok(())
        }
        (IdlType::Nat32, IdlValue::Nat32(n)) => {
            vbytes.extend(&n.to_le_bytes());
            Ok(())
        }
        (IdlType::Nat64, IdlValue::Nat64(n)) => {
            vbytes.extend(&n.to_le_bytes());
            Ok(())
        }
        (IdlType::Int8, IdlValue::Int8(n)) => {
            vbytes.extend(&n.to_le_bytes());
            Ok(())
        }
        (IdlType::Int16, IdlValue::Int16(n)) => {
            vbytes.extend(&n.to_le_bytes());
            Ok(())
        }
        (IdlType::Int32, IdlValue::Int32(n)) => {
            vbytes.extend(&n.to_le_bytes());
            Ok(())
        }
        (IdlType::Int64, IdlValue::Int64(n)) => {
            vbytes.extend(&n.to_le_bytes());
            Ok(())
        }
        (IdlType::Float32, IdlValue::Float32(f)) => {
            vbytes.extend(&f.to_le_bytes());
            Ok(())
        }
        (IdlType::Float64, IdlValue::Float64(f)) => {
            vbytes.extend(&f.to_le_bytes());
            Ok(())
        }
        (IdlType::Text, IdlValue::Text(text)) => {
            write_uleb128_u64(vbytes, text.len() as u64);
            vbytes.extend(text.as_bytes());
            Ok(())
        }
        (IdlType::Principal, IdlValue::Principal(principal)) => {
            encode_principal(vbytes, principal);
            Ok(())
        }
        (IdlType::Service(_), IdlValue::Service(principal)) => {
            encode_principal(vbytes, principal);
            Ok(())
        }
        (IdlType::Func(_), IdlValue::Func(func)) => match func {
            FuncValue::Opaque => {
                vbytes.push(0);
                Ok(())
            }
            FuncValue::Method { service, method } => {
                vbytes.push(1);
                encode_principal(vbytes, service);
                write_uleb128_u64(vbytes, method.len() as u64);
                vbytes.extend(method.as_bytes());
                Ok(())
            }
        },
        (IdlType::Opt(inner), IdlValue::Opt(opt)) => match opt {
            None => {
                vbytes.push(0);
                Ok(())
            }
            Some(boxed) => {
                vbytes.push(1);
                encode_value(vbytes, boxed, inner, env)
            }
        },
        (IdlType::Vector(inner), IdlValue::Vector(elements)) => {
            write_uleb128_u64(vbytes, elements.len() as u64);
            for element in elements {
                encode_value(vbytes, element, inner, env)?;
            }
            Ok(())
        }
        (IdlType::Record(compound), IdlValue::Record(fields)) => {
            encode_record(vbytes, fields, compound, env)
        }
        (IdlType::Variant(compound), IdlValue::Variant { label, value }) => {
            let index = compound
                .fields
                .iter()
                .position(|(option, _)| option == label)
                .ok_or_else(|| {
                    Error::InvalidValue(format!(
                        "variant option {} is not among the declared options",
                        label
                    ))
                })?;
            write_uleb128_u64(vbytes, index as u64);
            let (_, option_type) = compound.fields.iter().nth(index).unwrap();
            encode_value(vbytes, value, option_type, env)
        }
        (_, value) => Err(mismatch(value, idl_type)),
    }
}

fn encode_principal(vbytes: &mut Vec<u8>, principal: &Principal) {
    write_uleb128_u64(vbytes, principal.as_slice().len() as u64);
    vbytes.extend(principal.as_slice());
}

fn encode_record(
    vbytes: &mut Vec<u8>,
    fields: &BTreeMap<Label, IdlValue>,
    compound: &CompoundType,
    env: &TypeEnv,
) -> Result<()> {
    if fields.len() != compound.fields.len() {
        return Err(Error::InvalidValue(format!(
            "record value has {} fields, its type declares {}",
            fields.len(),
            compound.fields.len()
        )));
    }
    // both maps iterate in ascending tag order
    for (label, field_type) in &compound.fields {
        let field_value = fields.get(label).ok_or_else(|| {
            Error::InvalidValue(format!("record value is missing field {}", label))
        })?;
        encode_value(vbytes, field_value, field_type, env)?;
    }
    Ok(())
}

// ---- decoding ----

enum RawEntry {
    Opt(i64),
    Vector(i64),
    Record(Vec<(u32, i64)>),
    Variant(Vec<(u32, i64)>),
    Func {
        args: Vec<i64>,
        rets: Vec<i64>,
        annotations: Vec<FuncAnnotation>,
    },
    Service(Vec<(String, i64)>),
}

fn parse_type_table(reader: &mut ByteReader) -> Result<Vec<RawEntry>> {
    let count = reader.read_uleb128_u64()?;
    let mut entries: Vec<RawEntry> = vec![];
    for _ in 0..count {
        let opcode = reader.read_sleb128_i64()?;
        let entry = match opcode {
            crate::candid::types::OPCODE_OPT => RawEntry::Opt(reader.read_sleb128_i64()?),
            crate::candid::types::OPCODE_VECTOR => RawEntry::Vector(reader.read_sleb128_i64()?),
            crate::candid::types::OPCODE_RECORD => RawEntry::Record(parse_raw_fields(reader)?),
            crate::candid::types::OPCODE_VARIANT => RawEntry::Variant(parse_raw_fields(reader)?),
            crate::candid::types::OPCODE_FUNC => {
                let args = parse_code_list(reader)?;
                let rets = parse_code_list(reader)?;
                let annotation_count = reader.read_uleb128_u64()?;
                let mut annotations = vec![];
                for _ in 0..annotation_count {
                    annotations.push(FuncAnnotation::from_byte(reader.read_byte()?)?);
                }
                RawEntry::Func {
                    args,
                    rets,
                    annotations,
                }
            }
            crate::candid::types::OPCODE_SERVICE => {
                let method_count = reader.read_uleb128_u64()?;
                let mut methods = vec![];
                for _ in 0..method_count {
                    let name_length = read_length(reader)?;
                    let name_bytes = reader.read_bytes(name_length)?;
                    let name = String::from_utf8(name_bytes.to_vec()).map_err(|_| {
                        Error::Decoding("service method name is not UTF-8".to_string())
                    })?;
                    methods.push((name, reader.read_sleb128_i64()?));
                }
                RawEntry::Service(methods)
            }
            other => {
                return Err(Error::Decoding(format!(
                    "opcode {} is not a compound type and cannot appear in the type table",
                    other
                )))
            }
        };
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_raw_fields(reader: &mut ByteReader) -> Result<Vec<(u32, i64)>> {
    let count = reader.read_uleb128_u64()?;
    let mut fields: Vec<(u32, i64)> = vec![];
    let mut previous: Option<u32> = None;
    for _ in 0..count {
        let tag = reader.read_uleb128_u64()?;
        let tag = u32::try_from(tag)
            .map_err(|_| Error::Decoding(format!("field tag {} overflows 32 bits", tag)))?;
        if let Some(previous) = previous {
            if tag <= previous {
                return Err(Error::Decoding(format!(
                    "field tags must be strictly ascending, saw {} after {}",
                    tag, previous
                )));
            }
        }
        previous = Some(tag);
        fields.push((tag, reader.read_sleb128_i64()?));
    }
    Ok(fields)
}

fn parse_code_list(reader: &mut ByteReader) -> Result<Vec<i64>> {
    let count = reader.read_uleb128_u64()?;
    let mut codes = vec![];
    for _ in 0..count {
        codes.push(reader.read_sleb128_i64()?);
    }
    Ok(codes)
}

fn read_length(reader: &mut ByteReader) -> Result<usize> {
    let length = reader.read_uleb128_u64()?;
    let length = usize::try_from(length)
        .map_err(|_| Error::Decoding(format!("length {} overflows usize", length)))?;
    if length > reader.remaining() {
        return Err(Error::Decoding(format!(
            "declared length {} exceeds the {} bytes remaining",
            length,
            reader.remaining()
        )));
    }
    Ok(length)
}

/// Rebuilds `IdlType`s from raw table entries. Cycles come out as
/// `Ref("table<n>")` with the full definition registered in the returned
/// environment.
struct Resolver<'a> {
    entries: &'a [RawEntry],
    cache: Vec<Option<IdlType>>,
    in_progress: Vec<bool>,
    referenced: Vec<bool>,
}

fn rec_name(index: usize) -> String {
    format!("table{}", index)
}

impl<'a> Resolver<'a> {
    fn new(entries: &'a [RawEntry]) -> Self {
        Resolver {
            entries,
            cache: vec![None; entries.len()],
            in_progress: vec![false; entries.len()],
            referenced: vec![false; entries.len()],
        }
    }

    fn resolve_code(&mut self, code: i64) -> Result<IdlType> {
        if code < 0 {
            return IdlType::from_opcode(code);
        }
        let index = code as usize;
        if index >= self.entries.len() {
            return Err(Error::Decoding(format!(
                "type index {} is out of bounds for a table of {} entries",
                index,
                self.entries.len()
            )));
        }
        self.resolve_entry(index)
    }

    fn resolve_entry(&mut self, index: usize) -> Result<IdlType> {
        if let Some(resolved) = &self.cache[index] {
            return Ok(resolved.clone());
        }
        if self.in_progress[index] {
            self.referenced[index] = true;
            return Ok(IdlType::Ref(rec_name(index)));
        }
        self.in_progress[index] = true;
        let resolved = match &self.entries[index] {
            RawEntry::Opt(inner) => IdlType::opt(self.resolve_code(*inner)?),
            RawEntry::Vector(inner) => IdlType::vector(self.resolve_code(*inner)?),
            RawEntry::Record(raw_fields) => {
                IdlType::Record(self.resolve_fields(raw_fields)?)
            }
            RawEntry::Variant(raw_fields) => {
                IdlType::Variant(self.resolve_fields(raw_fields)?)
            }
            RawEntry::Func {
                args,
                rets,
                annotations,
            } => {
                let args = args
                    .iter()
                    .map(|code| self.resolve_code(*code))
                    .collect::<Result<Vec<_>>>()?;
                let rets = rets
                    .iter()
                    .map(|code| self.resolve_code(*code))
                    .collect::<Result<Vec<_>>>()?;
                IdlType::Func(FuncType {
                    args,
                    rets,
                    annotations: annotations.clone(),
                })
            }
            RawEntry::Service(raw_methods) => {
                let mut methods: BTreeMap<String, FuncType> = BTreeMap::new();
                for (name, code) in raw_methods {
                    let method_type = match self.resolve_code(*code)? {
                        IdlType::Func(func) => func,
                        other => {
                            return Err(Error::Decoding(format!(
                                "service method {} has non-function type {:?}",
                                name, other
                            )))
                        }
                    };
                    if methods.insert(name.clone(), method_type).is_some() {
                        return Err(Error::Decoding(format!(
                            "service declares method {} twice",
                            name
                        )));
                    }
                }
                IdlType::Service(ServiceType {
                    methods,
                    rec_id: None,
                })
            }
        };
        self.in_progress[index] = false;
        let resolved = if self.referenced[index] {
            attach_rec_id(resolved, rec_name(index))
        } else {
            resolved
        };
        self.cache[index] = Some(resolved.clone());
        Ok(resolved)
    }

    fn resolve_fields(&mut self, raw_fields: &[(u32, i64)]) -> Result<CompoundType> {
        let mut fields: Vec<(Label, IdlType)> = vec![];
        for (tag, code) in raw_fields {
            fields.push((Label::from_id(*tag), self.resolve_code(*code)?));
        }
        CompoundType::new(fields, None)
    }

    fn into_env(self) -> TypeEnv {
        let mut env = TypeEnv::new();
        for (index, resolved) in self.cache.into_iter().enumerate() {
            if self.referenced[index] {
                if let Some(resolved) = resolved {
                    env.insert(rec_name(index), resolved);
                }
            }
        }
        env
    }
}

fn attach_rec_id(idl_type: IdlType, rec_id: String) -> IdlType {
    match idl_type {
        IdlType::Record(mut compound) => {
            compound.rec_id = Some(rec_id);
            IdlType::Record(compound)
        }
        IdlType::Variant(mut compound) => {
            compound.rec_id = Some(rec_id);
            IdlType::Variant(compound)
        }
        IdlType::Service(mut service) => {
            service.rec_id = Some(rec_id);
            IdlType::Service(service)
        }
        // a cycle whose head is an opt/vec still decodes; the definition
        // lives in the environment under its table name
        other => other,
    }
}

fn decode_value(
    reader: &mut ByteReader,
    idl_type: &IdlType,
    env: &TypeEnv,
    depth: usize,
) -> Result<IdlValue> {
    if depth > MAX_NESTING_DEPTH {
        return Err(Error::Decoding(format!(
            "value nesting exceeds {} levels",
            MAX_NESTING_DEPTH
        )));
    }
    match idl_type {
        IdlType::Ref(name) => {
            let resolved = env
                .get(name)
                .ok_or_else(|| {
                    Error::Decoding(format!("dangling type reference {}", name))
                })?
                .clone();
            decode_value(reader, &resolved, env, depth + 1)
        }
        IdlType::Null => Ok(IdlValue::Null),
        IdlType::Reserved => Ok(IdlValue::Reserved),
        IdlType::Empty => Err(Error::Decoding(
            "the empty type has no values and cannot be decoded".to_string(),
        )),
        IdlType::Bool => match reader.read_byte()? {
            0 => Ok(IdlValue::Bool(false)),
            1 => Ok(IdlValue::Bool(true)),
            other => Err(Error::Decoding(format!("invalid bool byte {}", other))),
        },
        IdlType::Nat => Ok(IdlValue::Nat(reader.read_uleb128()?)),
        IdlType::Int => Ok(IdlValue::Int(reader.read_sleb128()?)),
        IdlType::Nat8 => Ok(IdlValue::Nat8(reader.read_byte()?)),
        IdlType::Nat16 => Ok(IdlValue::Nat16(u16::from_le_bytes(reader.read_array()?))),
        IdlType::Nat32 => Ok(IdlValue::Nat32(u32::from_le_bytes(reader.read_array()?))),
        IdlType::Nat64 => Ok(IdlValue::Nat64(u64::from_le_bytes(reader.read_array()?))),
        IdlType::Int8 => Ok(IdlValue::Int8(i8::from_le_bytes(reader.read_array()?))),
        IdlType::Int16 => Ok(IdlValue::Int16(i16::from_le_bytes(reader.read_array()?))),
        IdlType::Int32 => Ok(IdlValue::Int32(i32::from_le_bytes(reader.read_array()?))),
        IdlType::Int64 => Ok(IdlValue::Int64(i64::from_le_bytes(reader.read_array()?))),
        IdlType::Float32 => Ok(IdlValue::Float32(f32::from_le_bytes(reader.read_array()?))),
        IdlType::Float64 => Ok(IdlValue::Float64(f64::from_le_bytes(reader.read_array()?))),
        IdlType::Text => {
            let length = read_length(reader)?;
            let bytes = reader.read_bytes(length)?;
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| Error::Decoding("text value is not UTF-8".to_string()))?;
            Ok(IdlValue::Text(text))
        }
        IdlType::Principal => Ok(IdlValue::Principal(decode_principal(reader)?)),
        IdlType::Service(_) => Ok(IdlValue::Service(decode_principal(reader)?)),
        IdlType::Func(_) => match reader.read_byte()? {
            0 => Ok(IdlValue::Func(FuncValue::Opaque)),
            1 => {
                let service = decode_principal(reader)?;
                let length = read_length(reader)?;
                let bytes = reader.read_bytes(length)?;
                let method = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    Error::Decoding("function method name is not UTF-8".to_string())
                })?;
                Ok(IdlValue::Func(FuncValue::Method { service, method }))
            }
            other => Err(Error::Decoding(format!(
                "invalid function reference byte {}",
                other
            ))),
        },
        IdlType::Opt(inner) => match reader.read_byte()? {
            0 => Ok(IdlValue::Opt(None)),
            1 => Ok(IdlValue::opt(Some(decode_value(
                reader,
                inner,
                env,
                depth + 1,
            )?))),
            other => Err(Error::Decoding(format!("invalid option byte {}", other))),
        },
        IdlType::Vector(inner) => {
            let count = reader.read_uleb128_u64()?;
            let mut elements: Vec<IdlValue> = vec![];
            for _ in 0..count {
                elements.push(decode_value(reader, inner, env, depth + 1)?);
            }
            Ok(IdlValue::Vector(elements))
        }
        IdlType::Record(compound) => {
            let mut fields: BTreeMap<Label, IdlValue> = BTreeMap::new();
            for (label, field_type) in &compound.fields {
                let value = decode_value(reader, field_type, env, depth + 1)?;
                fields.insert(label.clone(), value);
            }
            Ok(IdlValue::Record(fields))
        }
        IdlType::Variant(compound) => {
            let index = reader.read_uleb128_u64()? as usize;
            let (label, option_type) = compound.fields.iter().nth(index).ok_or_else(|| {
                Error::Decoding(format!(
                    "variant index {} is beyond the {} declared options",
                    index,
                    compound.fields.len()
                ))
            })?;
            let value = decode_value(reader, option_type, env, depth + 1)?;
            Ok(IdlValue::variant(label.clone(), value))
        }
    }
}

fn decode_principal(reader: &mut ByteReader) -> Result<Principal> {
    let length = read_length(reader)?;
    let bytes = reader.read_bytes(length)?;
    Principal::from_slice(bytes).map_err(|err| Error::Decoding(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::{BigInt, BigUint};

    fn round_trip(value: IdlValue, idl_type: IdlType) -> IdlValue {
        let bytes = encode_args(&[(value, idl_type)]).unwrap();
        let mut values = decode_args(&bytes).unwrap();
        assert_eq!(values.len(), 1);
        values.pop().unwrap()
    }

    #[test]
    fn test_nat_golden_vector() {
        let bytes = encode_args(&[(IdlValue::Nat(BigUint::from(624485u32)), IdlType::Nat)])
            .unwrap();
        assert_eq!(bytes, b"DIDL\x00\x01\x7d\xe5\x8e\x26".to_vec());
    }

    #[test]
    fn test_bool_golden_vector() {
        let bytes = encode_args(&[(IdlValue::Bool(true), IdlType::Bool)]).unwrap();
        assert_eq!(bytes, b"DIDL\x00\x01\x7e\x01".to_vec());
    }

    #[test]
    fn test_int_golden_vector() {
        let bytes = encode_args(&[(IdlValue::Int(BigInt::from(-4)), IdlType::Int)]).unwrap();
        assert_eq!(bytes, b"DIDL\x00\x01\x7c\x7c".to_vec());
    }

    #[test]
    fn test_record_golden_vector() {
        let record_type = IdlType::record(vec![(Label::from_id(1), IdlType::Int)]).unwrap();
        let record_value =
            IdlValue::record(vec![(Label::from_id(1), IdlValue::Int(BigInt::from(42)))])
                .unwrap();
        let bytes = encode_args(&[(record_value, record_type)]).unwrap();
        let mut expected = b"DIDL".to_vec();
        expected.extend(&[0x01, 0x6c, 0x01, 0x01, 0x7c, 0x01, 0x00, 0x2a]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_bad_magic_rejected() {
        assert!(matches!(
            decode_args(b"DIDX\x00\x00"),
            Err(Error::Decoding(_))
        ));
        assert!(matches!(decode_args(b"DI"), Err(Error::Decoding(_))));
    }

    #[test]
    fn test_primitive_round_trips() {
        let cases = vec![
            (IdlValue::Bool(false), IdlType::Bool),
            (IdlValue::Nat(BigUint::parse_bytes(b"340282366920938463463374607431768211455", 10).unwrap()), IdlType::Nat),
            (IdlValue::Int(BigInt::from(-624485)), IdlType::Int),
            (IdlValue::Nat8(255), IdlType::Nat8),
            (IdlValue::Nat64(u64::MAX), IdlType::Nat64),
            (IdlValue::Int32(i32::MIN), IdlType::Int32),
            (IdlValue::Float32(1.5), IdlType::Float32),
            (IdlValue::Float64(-0.25), IdlType::Float64),
            (IdlValue::text("grüß dich"), IdlType::Text),
            (IdlValue::Null, IdlType::Null),
            (IdlValue::Reserved, IdlType::Reserved),
        ];
        for (value, idl_type) in cases {
            assert_eq!(round_trip(value.clone(), idl_type), value);
        }
    }

    #[test]
    fn test_reference_value_round_trips() {
        let principal = Principal::from_slice(&[1, 2, 3, 4]).unwrap();
        assert_eq!(
            round_trip(IdlValue::Principal(principal.clone()), IdlType::Principal),
            IdlValue::Principal(principal.clone())
        );
        let service_type = IdlType::Service(ServiceType {
            methods: BTreeMap::new(),
            rec_id: None,
        });
        assert_eq!(
            round_trip(IdlValue::Service(principal.clone()), service_type.clone()),
            IdlValue::Service(principal.clone())
        );
        let func_type = IdlType::Func(FuncType {
            args: vec![IdlType::Text],
            rets: vec![IdlType::Text],
            annotations: vec![FuncAnnotation::Query],
        });
        let concrete = IdlValue::Func(FuncValue::Method {
            service: principal,
            method: "greet".to_string(),
        });
        assert_eq!(round_trip(concrete.clone(), func_type.clone()), concrete);
        // opaque references survive the trip but do not compare equal
        let bytes = encode_args(&[(IdlValue::Func(FuncValue::Opaque), func_type)]).unwrap();
        match decode_args(&bytes).unwrap().pop().unwrap() {
            IdlValue::Func(FuncValue::Opaque) => {}
            other => panic!("expected an opaque reference, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_compound_round_trip() {
        let inner_record =
            IdlType::record(vec![(Label::named("score"), IdlType::Int)]).unwrap();
        let variant_type = IdlType::variant(vec![
            (Label::named("ok"), inner_record.clone()),
            (Label::named("err"), IdlType::Text),
        ])
        .unwrap();
        let list_type = IdlType::vector(IdlType::opt(variant_type.clone()));

        let ok_value = IdlValue::variant(
            Label::named("ok"),
            IdlValue::record(vec![(
                Label::named("score"),
                IdlValue::Int(BigInt::from(42)),
            )])
            .unwrap(),
        );
        let err_value = IdlValue::variant(Label::named("err"), IdlValue::text("nope"));
        let list = IdlValue::Vector(vec![
            IdlValue::opt(Some(ok_value)),
            IdlValue::opt(None),
            IdlValue::opt(Some(err_value)),
        ]);
        assert_eq!(round_trip(list.clone(), list_type), list);
    }

    #[test]
    fn test_recursive_record_round_trip() {
        // type node = record { head: nat64; tail: opt node }
        let node_type = IdlType::record_named(
            "node",
            vec![
                (Label::named("head"), IdlType::Nat64),
                (
                    Label::named("tail"),
                    IdlType::opt(IdlType::Ref("node".to_string())),
                ),
            ],
        )
        .unwrap();
        let leaf = IdlValue::record(vec![
            (Label::named("head"), IdlValue::Nat64(2)),
            (Label::named("tail"), IdlValue::opt(None)),
        ])
        .unwrap();
        let list = IdlValue::record(vec![
            (Label::named("head"), IdlValue::Nat64(1)),
            (Label::named("tail"), IdlValue::opt(Some(leaf))),
        ])
        .unwrap();
        assert_eq!(round_trip(list.clone(), node_type), list);
    }

    #[test]
    fn test_multiple_args_share_one_table() {
        let record_type = IdlType::record(vec![(Label::from_id(0), IdlType::Nat)]).unwrap();
        let record_value =
            IdlValue::record(vec![(Label::from_id(0), IdlValue::Nat(BigUint::from(9u8)))])
                .unwrap();
        let bytes = encode_args(&[
            (record_value.clone(), record_type.clone()),
            (record_value.clone(), record_type),
        ])
        .unwrap();
        // one table entry, two argument slots pointing at it
        let expected = b"DIDL\x01\x6c\x01\x00\x7d\x02\x00\x00\x09\x09".to_vec();
        assert_eq!(bytes, expected);
        let values = decode_args(&bytes).unwrap();
        assert_eq!(values, vec![record_value.clone(), record_value]);
    }

    #[test]
    fn test_variant_index_out_of_bounds() {
        let variant_type = IdlType::variant(vec![(Label::from_id(0), IdlType::Null)]).unwrap();
        let mut table = crate::candid::type_table::TypeTable::new();
        table.get_or_add(&variant_type).unwrap();
        let mut bytes = b"DIDL".to_vec();
        bytes.extend(table.serialize());
        bytes.extend(&[0x01, 0x00]); // one arg of table type 0
        bytes.push(0x05); // variant index 5, only one option declared
        assert!(matches!(decode_args(&bytes), Err(Error::Decoding(_))));
    }

    #[test]
    fn test_declared_length_beyond_input() {
        // text arg claiming 100 bytes with 1 byte present
        let bytes = b"DIDL\x00\x01\x71\x64\x41".to_vec();
        assert!(matches!(decode_args(&bytes), Err(Error::Decoding(_))));
    }

    #[test]
    fn test_dangling_table_index() {
        let bytes = b"DIDL\x00\x01\x05".to_vec(); // arg type = table index 5, empty table
        assert!(matches!(decode_args(&bytes), Err(Error::Decoding(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let bytes = b"DIDL\x00\x01\x7e\x01\xff".to_vec();
        assert!(matches!(decode_args(&bytes), Err(Error::Decoding(_))));
    }

    #[test]
    fn test_invalid_presence_bytes() {
        let opt_nat = b"DIDL\x01\x6e\x7d\x01\x00\x02".to_vec(); // option byte 2
        assert!(matches!(decode_args(&opt_nat), Err(Error::Decoding(_))));
        let bad_bool = b"DIDL\x00\x01\x7e\x02".to_vec();
        assert!(matches!(decode_args(&bad_bool), Err(Error::Decoding(_))));
    }
}
