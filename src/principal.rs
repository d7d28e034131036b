use crate::crypto::hash224;
use crate::{Error, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const MAX_PRINCIPAL_LENGTH: usize = 29;

const ANONYMOUS_SUFFIX: u8 = 0x04;
const SELF_AUTHENTICATING_SUFFIX: u8 = 0x02;

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// An opaque binary identity: a user, a canister, or a subnet. At most 29
/// bytes. The textual form embeds a CRC32 of the bytes, base32-encoded in
/// dash-separated groups of five, and is what HTTP paths carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal {
    bytes: Vec<u8>,
}

impl Principal {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_PRINCIPAL_LENGTH {
            return Err(Error::InvalidValue(format!(
                "principal is {} bytes, the maximum is {}",
                bytes.len(),
                MAX_PRINCIPAL_LENGTH
            )));
        }
        Ok(Principal {
            bytes: bytes.to_vec(),
        })
    }

    /// The shared management canister: the empty identifier.
    pub fn management_canister() -> Self {
        Principal { bytes: vec![] }
    }

    pub fn anonymous() -> Self {
        Principal {
            bytes: vec![ANONYMOUS_SUFFIX],
        }
    }

    /// Derives the identity owned by a public key: sha224 of the DER key
    /// with a tag byte appended, 29 bytes total.
    pub fn self_authenticating(der_public_key: &[u8]) -> Self {
        let mut bytes = hash224(der_public_key).to_vec();
        bytes.push(SELF_AUTHENTICATING_SUFFIX);
        Principal { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_text(&self) -> String {
        let mut with_checksum = crc32(&self.bytes).to_be_bytes().to_vec();
        with_checksum.extend(&self.bytes);
        let encoded = base32_encode(&with_checksum);
        let mut text = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (index, character) in encoded.chars().enumerate() {
            if index > 0 && index % 5 == 0 {
                text.push('-');
            }
            text.push(character);
        }
        text
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let stripped: String = text
            .chars()
            .filter(|character| *character != '-')
            .map(|character| character.to_ascii_lowercase())
            .collect();
        let decoded = base32_decode(&stripped)?;
        if decoded.len() < 4 {
            return Err(Error::Decoding(format!(
                "principal text {} is too short",
                text
            )));
        }
        let (checksum, bytes) = decoded.split_at(4);
        let principal = Principal::from_slice(bytes)
            .map_err(|_| Error::Decoding(format!("principal text {} is too long", text)))?;
        if checksum != crc32(bytes).to_be_bytes() {
            return Err(Error::Decoding(format!(
                "principal text {} fails its checksum",
                text
            )));
        }
        Ok(principal)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.to_text())
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.bytes)
    }
}

struct PrincipalVisitor;

impl<'de> Visitor<'de> for PrincipalVisitor {
    type Value = Principal;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a principal byte string")
    }

    fn visit_bytes<E: de::Error>(self, bytes: &[u8]) -> std::result::Result<Principal, E> {
        Principal::from_slice(bytes).map_err(|err| E::custom(err.to_string()))
    }

    fn visit_byte_buf<E: de::Error>(self, bytes: Vec<u8>) -> std::result::Result<Principal, E> {
        self.visit_bytes(&bytes)
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Principal, D::Error> {
        deserializer.deserialize_bytes(PrincipalVisitor)
    }
}

fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for byte in bytes {
        crc ^= *byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xedb8_8320 & mask);
        }
    }
    !crc
}

fn base32_encode(bytes: &[u8]) -> String {
    let mut output = String::new();
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for byte in bytes {
        buffer = (buffer << 8) | *byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            output.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        output.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    output
}

fn base32_decode(text: &str) -> Result<Vec<u8>> {
    let mut output = vec![];
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for character in text.bytes() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|entry| *entry == character)
            .ok_or_else(|| {
                Error::Decoding(format!("invalid base32 character {:?}", character as char))
            })? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            output.push((buffer >> bits) as u8);
        }
    }
    Ok(output)
}
