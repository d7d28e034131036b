use crate::{Error, Result};
use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive, Zero};

pub fn write_uleb128(vbytes: &mut Vec<u8>, value: &BigUint) {
    let mut value = value.clone();
    let low_bits = BigUint::from(0x7fu8);
    loop {
        let mut byte = (&value & &low_bits).to_u8().unwrap();
        value >>= 7u8;
        if !value.is_zero() {
            byte |= 0x80;
        }
        vbytes.push(byte);
        if byte & 0x80 == 0 {
            break;
        }
    }
}

pub fn write_uleb128_u64(vbytes: &mut Vec<u8>, value: u64) {
    let mut value = value;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        vbytes.push(byte);
        if byte & 0x80 == 0 {
            break;
        }
    }
}

/// Two's-complement rule: keep emitting groups while the remaining value
/// disagrees with the sign bit of the group just written.
pub fn write_sleb128(vbytes: &mut Vec<u8>, value: &BigInt) {
    let mut value = value.clone();
    let low_bits = BigInt::from(0x7f);
    loop {
        let byte = (&value & &low_bits).to_u8().unwrap();
        value >>= 7u8;
        let done = (value.is_zero() && byte & 0x40 == 0)
            || (value == BigInt::from(-1) && byte & 0x40 != 0);
        if done {
            vbytes.push(byte);
            break;
        }
        vbytes.push(byte | 0x80);
    }
}

pub fn write_sleb128_i64(vbytes: &mut Vec<u8>, value: i64) {
    let mut value = value;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            vbytes.push(byte);
            break;
        }
        vbytes.push(byte | 0x80);
    }
}

/// Bounds-checked cursor over an input buffer. Every read that would run
/// past the end fails with `Error::Decoding` instead of panicking.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        if self.position >= self.bytes.len() {
            return Err(Error::Decoding("unexpected end of input".to_string()));
        }
        let byte = self.bytes[self.position];
        self.position += 1;
        Ok(byte)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if count > self.remaining() {
            return Err(Error::Decoding(format!(
                "wanted {} bytes but only {} remain",
                count,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.read_bytes(N)?;
        Ok(slice.try_into().unwrap())
    }

    pub fn read_uleb128(&mut self) -> Result<BigUint> {
        let mut result = BigUint::zero();
        let mut shift = 0u64;
        loop {
            let byte = self.read_byte()?;
            result |= BigUint::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// LEB128 value that must fit in a u64 (lengths, counts, indices).
    pub fn read_uleb128_u64(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_byte()?;
            if shift >= 64 || (shift == 63 && byte & 0x7e != 0) {
                return Err(Error::Decoding("leb128 value overflows u64".to_string()));
            }
            result |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    pub fn read_sleb128(&mut self) -> Result<BigInt> {
        let mut result = BigInt::zero();
        let mut shift = 0u64;
        loop {
            let byte = self.read_byte()?;
            result |= BigInt::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if byte & 0x40 != 0 {
                    result -= BigInt::one() << shift;
                }
                return Ok(result);
            }
        }
    }

    pub fn read_sleb128_i64(&mut self) -> Result<i64> {
        let value = self.read_sleb128()?;
        value
            .to_i64()
            .ok_or_else(|| Error::Decoding("sleb128 value overflows i64".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uleb(value: u64) -> Vec<u8> {
        let mut vbytes = vec![];
        write_uleb128_u64(&mut vbytes, value);
        vbytes
    }

    fn sleb(value: i64) -> Vec<u8> {
        let mut vbytes = vec![];
        write_sleb128_i64(&mut vbytes, value);
        vbytes
    }

    #[test]
    fn test_uleb128_vectors() {
        assert_eq!(uleb(0), vec![0x00]);
        assert_eq!(uleb(127), vec![0x7f]);
        assert_eq!(uleb(624485), vec![0xe5, 0x8e, 0x26]);
    }

    #[test]
    fn test_sleb128_vectors() {
        assert_eq!(sleb(-4), vec![0x7c]);
        assert_eq!(sleb(-64), vec![0x40]);
        assert_eq!(sleb(42), vec![0x2a]);
        assert_eq!(sleb(-123456), vec![0xc0, 0xbb, 0x78]);
    }

    #[test]
    fn test_bignum_round_trip() {
        let big = BigUint::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
        let mut vbytes = vec![];
        write_uleb128(&mut vbytes, &big);
        let mut reader = ByteReader::new(&vbytes);
        assert_eq!(reader.read_uleb128().unwrap(), big);
        assert!(reader.is_empty());

        let negative = BigInt::parse_bytes(b"-987654321098765432109876543210", 10).unwrap();
        let mut vbytes = vec![];
        write_sleb128(&mut vbytes, &negative);
        let mut reader = ByteReader::new(&vbytes);
        assert_eq!(reader.read_sleb128().unwrap(), negative);
    }

    #[test]
    fn test_reader_bounds() {
        let mut reader = ByteReader::new(&[0x80]);
        // continuation bit set but no following byte
        assert!(reader.read_uleb128_u64().is_err());
        let mut reader = ByteReader::new(&[1, 2]);
        assert!(reader.read_bytes(3).is_err());
    }
}
