use crate::candid::leb128::write_uleb128_u64;
use crate::crypto::{hash, Sha256Hash};
use std::fmt;

/// Content that can take part in the representation-independent hash:
/// raw bytes, UTF-8 text, unsigned numbers (hashed through their uleb128
/// encoding), already-computed digests, and nested sequences/maps.
#[derive(Debug, Clone)]
pub enum Hashable {
    Blob(Vec<u8>),
    Text(String),
    U64(u64),
    Digest(Sha256Hash),
    Array(Vec<Hashable>),
    Map(Vec<(String, Hashable)>),
}

impl Hashable {
    pub fn blob(bytes: &[u8]) -> Hashable {
        Hashable::Blob(bytes.to_vec())
    }

    pub fn text(text: &str) -> Hashable {
        Hashable::Text(text.to_string())
    }
}

fn hash_of(hashable: &Hashable) -> Sha256Hash {
    match hashable {
        Hashable::Blob(bytes) => hash(bytes),
        Hashable::Text(text) => hash(text.as_bytes()),
        Hashable::U64(value) => {
            let mut vbytes: Vec<u8> = vec![];
            write_uleb128_u64(&mut vbytes, *value);
            hash(&vbytes)
        }
        Hashable::Digest(digest) => *digest,
        Hashable::Array(elements) => {
            let mut vbytes: Vec<u8> = vec![];
            for element in elements {
                vbytes.extend(&hash_of(element));
            }
            hash(&vbytes)
        }
        Hashable::Map(fields) => representation_independent_hash(fields),
    }
}

/// Hashes a named-field structure independently of field order: each
/// field becomes the pair (hash(name), hash(value)), the pairs sort by
/// the name digest's raw bytes, and the concatenation is hashed once
/// more. The same logical structure therefore hashes identically no
/// matter which code path assembled it.
pub fn representation_independent_hash(fields: &[(String, Hashable)]) -> Sha256Hash {
    let mut pairs: Vec<(Sha256Hash, Sha256Hash)> = fields
        .iter()
        .map(|(name, value)| (hash(name.as_bytes()), hash_of(value)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let mut vbytes: Vec<u8> = vec![];
    for (name_digest, value_digest) in pairs {
        vbytes.extend(&name_digest);
        vbytes.extend(&value_digest);
    }
    hash(&vbytes)
}

/// The unique identifier of a request: the representation-independent
/// hash of its canonical field map. Stable across transport attempts and
/// endpoint generations because it is derived purely from request
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Sha256Hash);

impl RequestId {
    pub fn new(digest: Sha256Hash) -> Self {
        RequestId(digest)
    }

    pub fn from_fields(fields: &[(String, Hashable)]) -> Self {
        RequestId(representation_independent_hash(fields))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", hex::encode(self.0))
    }
}
