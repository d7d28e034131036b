use crate::candid::leb128::{write_sleb128_i64, write_uleb128_u64};
use crate::candid::types::{
    FuncType, IdlType, ServiceType, OPCODE_FUNC, OPCODE_OPT, OPCODE_RECORD, OPCODE_SERVICE,
    OPCODE_VARIANT, OPCODE_VECTOR,
};
use crate::{Error, Result};
use ahash::AHashMap;
use std::collections::HashMap;

/// The deduplicated table of compound type definitions built once per
/// encode. Structurally identical definitions share an index; recursive
/// definitions work because an index is handed out *before* the entry's
/// children are encoded, so a child `Ref` can point at its ancestor.
pub struct TypeTable {
    entries: Vec<Vec<u8>>,
    index_of: AHashMap<IdlType, usize>,
    named: HashMap<String, usize>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable {
            entries: vec![],
            index_of: AHashMap::new(),
            named: HashMap::new(),
        }
    }

    /// Returns the inline code for `idl_type`: a non-negative table index
    /// for compound types, a negative opcode for primitives.
    pub fn get_or_add(&mut self, idl_type: &IdlType) -> Result<i64> {
        if let Some(opcode) = idl_type.opcode() {
            return Ok(opcode);
        }
        if let IdlType::Ref(name) = idl_type {
            return match self.named.get(name) {
                Some(index) => Ok(*index as i64),
                None => Err(Error::InvalidValue(format!(
                    "type reference {} does not resolve to a named compound type",
                    name
                ))),
            };
        }
        if let Some(index) = self.index_of.get(idl_type) {
            return Ok(*index as i64);
        }
        Ok(self.add_compound(idl_type)? as i64)
    }

    fn add_compound(&mut self, idl_type: &IdlType) -> Result<usize> {
        let index = self.entries.len();
        self.entries.push(vec![]);
        self.index_of.insert(idl_type.clone(), index);
        if let Some(rec_id) = rec_id_of(idl_type) {
            if self.named.insert(rec_id.to_string(), index).is_some() {
                return Err(Error::InvalidValue(format!(
                    "two distinct compound types are both named {}",
                    rec_id
                )));
            }
        }

        let mut vbytes: Vec<u8> = vec![];
        match idl_type {
            IdlType::Opt(inner) => {
                write_sleb128_i64(&mut vbytes, OPCODE_OPT);
                let inner_code = self.get_or_add(inner)?;
                write_sleb128_i64(&mut vbytes, inner_code);
            }
            IdlType::Vector(inner) => {
                write_sleb128_i64(&mut vbytes, OPCODE_VECTOR);
                let inner_code = self.get_or_add(inner)?;
                write_sleb128_i64(&mut vbytes, inner_code);
            }
            IdlType::Record(compound) => {
                write_sleb128_i64(&mut vbytes, OPCODE_RECORD);
                self.write_fields(&mut vbytes, compound)?;
            }
            IdlType::Variant(compound) => {
                write_sleb128_i64(&mut vbytes, OPCODE_VARIANT);
                self.write_fields(&mut vbytes, compound)?;
            }
            IdlType::Func(func) => {
                write_sleb128_i64(&mut vbytes, OPCODE_FUNC);
                self.write_func(&mut vbytes, func)?;
            }
            IdlType::Service(service) => {
                write_sleb128_i64(&mut vbytes, OPCODE_SERVICE);
                self.write_service(&mut vbytes, service)?;
            }
            _ => unreachable!("primitives and refs are handled by get_or_add"),
        }
        self.entries[index] = vbytes;
        Ok(index)
    }

    fn write_fields(
        &mut self,
        vbytes: &mut Vec<u8>,
        compound: &crate::candid::types::CompoundType,
    ) -> Result<()> {
        write_uleb128_u64(vbytes, compound.fields.len() as u64);
        for (label, field_type) in &compound.fields {
            write_uleb128_u64(vbytes, label.id() as u64);
            let code = self.get_or_add(field_type)?;
            write_sleb128_i64(vbytes, code);
        }
        Ok(())
    }

    fn write_func(&mut self, vbytes: &mut Vec<u8>, func: &FuncType) -> Result<()> {
        write_uleb128_u64(vbytes, func.args.len() as u64);
        for arg in &func.args {
            let code = self.get_or_add(arg)?;
            write_sleb128_i64(vbytes, code);
        }
        write_uleb128_u64(vbytes, func.rets.len() as u64);
        for ret in &func.rets {
            let code = self.get_or_add(ret)?;
            write_sleb128_i64(vbytes, code);
        }
        write_uleb128_u64(vbytes, func.annotations.len() as u64);
        for annotation in &func.annotations {
            vbytes.push(annotation.to_byte());
        }
        Ok(())
    }

    fn write_service(&mut self, vbytes: &mut Vec<u8>, service: &ServiceType) -> Result<()> {
        write_uleb128_u64(vbytes, service.methods.len() as u64);
        for (name, func) in &service.methods {
            write_uleb128_u64(vbytes, name.len() as u64);
            vbytes.extend(name.as_bytes());
            let code = self.get_or_add(&IdlType::Func(func.clone()))?;
            write_sleb128_i64(vbytes, code);
        }
        Ok(())
    }

    /// Entry count followed by the concatenated entries.
    pub fn serialize(&self) -> Vec<u8> {
        let mut vbytes: Vec<u8> = vec![];
        write_uleb128_u64(&mut vbytes, self.entries.len() as u64);
        for entry in &self.entries {
            vbytes.extend(entry);
        }
        vbytes
    }
}

fn rec_id_of(idl_type: &IdlType) -> Option<&str> {
    match idl_type {
        IdlType::Record(compound) | IdlType::Variant(compound) => compound.rec_id.as_deref(),
        IdlType::Service(service) => service.rec_id.as_deref(),
        _ => None,
    }
}
