use crate::{Error, Result};
use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine};
use sha2::{Digest, Sha224, Sha256};
use std::convert::TryInto;

pub type Sha256Hash = [u8; 32];

/// Domain separation tag for the network's threshold signatures:
/// signatures live in G1, public keys in G2.
pub(crate) const BLS_DST: &[u8] = b"BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_NUL_";

lazy_static! {
    /// SubjectPublicKeyInfo prefix wrapping a 96-byte BLS12-381 G2 key.
    pub static ref BLS_DER_PREFIX: Vec<u8> = hex::decode(
        "308182301d060d2b0601040182dc7c0503010201060c2b0601040182dc7c05030201036100"
    )
    .unwrap();
    /// SubjectPublicKeyInfo prefix wrapping a 32-byte Ed25519 key.
    pub static ref ED25519_DER_PREFIX: Vec<u8> =
        hex::decode("302a300506032b6570032100").unwrap();
    /// SubjectPublicKeyInfo prefix wrapping a 65-byte uncompressed
    /// secp256k1 point.
    pub static ref SECP256K1_DER_PREFIX: Vec<u8> =
        hex::decode("3056301006072a8648ce3d020106052b8104000a034200").unwrap();
}

pub fn hash(data: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn hash224(data: &[u8]) -> [u8; 28] {
    let mut hasher = Sha224::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Wraps a raw public key in the given DER SubjectPublicKeyInfo prefix.
pub fn der_wrap(prefix: &[u8], raw: &[u8]) -> Vec<u8> {
    let mut vbytes: Vec<u8> = Vec::with_capacity(prefix.len() + raw.len());
    vbytes.extend(prefix);
    vbytes.extend(raw);
    vbytes
}

/// Strips a DER SubjectPublicKeyInfo prefix, checking it byte-for-byte.
pub fn der_unwrap<'a>(prefix: &[u8], der: &'a [u8]) -> Result<&'a [u8]> {
    if der.len() <= prefix.len() || &der[..prefix.len()] != prefix {
        return Err(Error::Decoding(
            "unexpected DER prefix on public key".to_string(),
        ));
    }
    Ok(&der[prefix.len()..])
}

/// Verifies a threshold signature: 48-byte compressed G1 signature over
/// `msg` under a 96-byte compressed G2 public key via the pairing
/// equality `e(sig, g2) == e(H(msg), pk)`. Callers get a plain boolean
/// and decide how to fail.
pub fn verify_threshold_sig(public_key: &[u8], signature: &[u8], msg: &[u8]) -> bool {
    let pk_bytes: [u8; 96] = match public_key.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let sig_bytes: [u8; 48] = match signature.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let pk = match Option::<G2Affine>::from(G2Affine::from_compressed(&pk_bytes)) {
        Some(pk) => pk,
        None => return false,
    };
    let sig = match Option::<G1Affine>::from(G1Affine::from_compressed(&sig_bytes)) {
        Some(sig) => sig,
        None => return false,
    };
    let msg_point =
        <G1Projective as HashToCurve<ExpandMsgXmd<Sha256>>>::hash_to_curve(msg, BLS_DST);
    pairing(&sig, &G2Affine::generator()) == pairing(&G1Affine::from(msg_point), &pk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash() {
        // sha256 of the empty string
        assert_eq!(
            hex::encode(hash(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_der_round_trip() {
        let raw = [7u8; 32];
        let der = der_wrap(&ED25519_DER_PREFIX, &raw);
        assert_eq!(der.len(), 44);
        assert_eq!(der_unwrap(&ED25519_DER_PREFIX, &der).unwrap(), &raw);
        assert!(der_unwrap(&BLS_DER_PREFIX, &der).is_err());
    }

    #[test]
    fn test_threshold_sig_rejects_garbage() {
        assert!(!verify_threshold_sig(&[0u8; 96], &[0u8; 48], b"msg"));
        assert!(!verify_threshold_sig(&[1u8; 12], &[0u8; 48], b"msg"));
    }
}
