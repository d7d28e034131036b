use crate::crypto::{der_wrap, hash, ED25519_DER_PREFIX, SECP256K1_DER_PREFIX};
use crate::principal::Principal;
use crate::request_id::{Hashable, RequestId};
use crate::{Error, Result};
use serde::Serialize;
use serde_bytes::ByteBuf;

/// Prefix mixed into every request signature so a signature over a
/// request id can never be replayed as a signature over other content.
pub const REQUEST_DOMAIN_SEPARATOR: &[u8] = b"\x0aic-request";

/// Prefix for delegation link signatures.
pub const DELEGATION_DOMAIN_SEPARATOR: &[u8] = b"\x1aic-request-auth-delegation";

/// What a signing operation hands back: everything the envelope needs.
/// The anonymous identity produces a bundle with no key and no signature.
#[derive(Debug, Clone, Default)]
pub struct SignatureBundle {
    pub public_key: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub delegations: Vec<SignedDelegation>,
}

/// One link in a delegation chain: a statement that `pubkey` may act on
/// the delegator's behalf until `expiration` (nanoseconds), optionally
/// scoped to specific canisters.
#[derive(Debug, Clone, Serialize)]
pub struct Delegation {
    pub pubkey: ByteBuf,
    pub expiration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<Principal>>,
}

impl Delegation {
    /// The digest a delegator signs, behind its own domain separator.
    pub fn signable(&self) -> Vec<u8> {
        let mut fields: Vec<(String, Hashable)> = vec![
            ("pubkey".to_string(), Hashable::blob(&self.pubkey)),
            ("expiration".to_string(), Hashable::U64(self.expiration)),
        ];
        if let Some(targets) = &self.targets {
            fields.push((
                "targets".to_string(),
                Hashable::Array(
                    targets
                        .iter()
                        .map(|target| Hashable::blob(target.as_slice()))
                        .collect(),
                ),
            ));
        }
        let digest = crate::request_id::representation_independent_hash(&fields);
        let mut vbytes: Vec<u8> = vec![];
        vbytes.extend(DELEGATION_DOMAIN_SEPARATOR);
        vbytes.extend(&digest);
        vbytes
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedDelegation {
    pub delegation: Delegation,
    pub signature: ByteBuf,
}

/// Something that can authorize requests. `sign` has a default
/// implementation in terms of `sign_raw`; the anonymous identity
/// overrides it to produce an empty bundle instead.
pub trait Identity: Send + Sync {
    /// The principal requests are sent as.
    fn sender(&self) -> Principal;

    /// DER-encoded SubjectPublicKeyInfo, absent for anonymous.
    fn public_key(&self) -> Option<Vec<u8>>;

    /// Signs an arbitrary message with the identity's private key.
    fn sign_raw(&self, msg: &[u8]) -> Result<Vec<u8>>;

    /// The delegation chain this identity carries, outermost first.
    fn delegation_chain(&self) -> Vec<SignedDelegation> {
        vec![]
    }

    fn sign(&self, request_id: &RequestId) -> Result<SignatureBundle> {
        let mut msg: Vec<u8> = vec![];
        msg.extend(REQUEST_DOMAIN_SEPARATOR);
        msg.extend(request_id.as_slice());
        Ok(SignatureBundle {
            public_key: self.public_key(),
            signature: Some(self.sign_raw(&msg)?),
            delegations: self.delegation_chain(),
        })
    }
}

/// The identity of nobody in particular. Requests go out unsigned under
/// the well-known anonymous principal.
pub struct AnonymousIdentity;

impl Identity for AnonymousIdentity {
    fn sender(&self) -> Principal {
        Principal::anonymous()
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        None
    }

    fn sign_raw(&self, _msg: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Signing(
            "the anonymous identity cannot produce signatures".to_string(),
        ))
    }

    fn sign(&self, _request_id: &RequestId) -> Result<SignatureBundle> {
        Ok(SignatureBundle::default())
    }
}

/// An Ed25519 identity.
pub struct BasicIdentity {
    key_pair: ring::signature::Ed25519KeyPair,
    der_public_key: Vec<u8>,
}

impl BasicIdentity {
    pub fn from_key_pair(key_pair: ring::signature::Ed25519KeyPair) -> Self {
        use ring::signature::KeyPair;
        let der_public_key = der_wrap(&ED25519_DER_PREFIX, key_pair.public_key().as_ref());
        BasicIdentity {
            key_pair,
            der_public_key,
        }
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self> {
        let key_pair = ring::signature::Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|err| Error::Signing(format!("bad pkcs8 document: {}", err)))?;
        Ok(BasicIdentity::from_key_pair(key_pair))
    }

    /// Deterministic identity from a 32-byte seed. Handy for tests and
    /// throwaway development keys.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self> {
        let key_pair = ring::signature::Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|err| Error::Signing(format!("bad ed25519 seed: {}", err)))?;
        Ok(BasicIdentity::from_key_pair(key_pair))
    }
}

impl Identity for BasicIdentity {
    fn sender(&self) -> Principal {
        Principal::self_authenticating(&self.der_public_key)
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.der_public_key.clone())
    }

    fn sign_raw(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key_pair.sign(msg).as_ref().to_vec())
    }
}

/// A secp256k1 identity signing with 64-byte compact signatures over the
/// sha256 of the message.
pub struct Secp256k1Identity {
    secret_key: secp256k1::SecretKey,
    der_public_key: Vec<u8>,
}

impl Secp256k1Identity {
    pub fn from_secret_key(secret_key: secp256k1::SecretKey) -> Self {
        let public_key = secp256k1::PublicKey::from_secret_key(secp256k1::SECP256K1, &secret_key);
        let der_public_key = der_wrap(
            &SECP256K1_DER_PREFIX,
            &public_key.serialize_uncompressed(),
        );
        Secp256k1Identity {
            secret_key,
            der_public_key,
        }
    }

    pub fn from_secret_slice(slice: &[u8]) -> Result<Self> {
        let secret_key = secp256k1::SecretKey::from_slice(slice)
            .map_err(|err| Error::Signing(format!("bad secp256k1 secret: {}", err)))?;
        Ok(Secp256k1Identity::from_secret_key(secret_key))
    }

    /// A fresh throwaway identity.
    pub fn generate() -> Result<Self> {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Secp256k1Identity::from_secret_slice(&seed)
    }
}

impl Identity for Secp256k1Identity {
    fn sender(&self) -> Principal {
        Principal::self_authenticating(&self.der_public_key)
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.der_public_key.clone())
    }

    fn sign_raw(&self, msg: &[u8]) -> Result<Vec<u8>> {
        let digest = hash(msg);
        let message = secp256k1::Message::from_slice(&digest)
            .map_err(|err| Error::Signing(err.to_string()))?;
        let signature = secp256k1::SECP256K1.sign(&message, &self.secret_key);
        Ok(signature.serialize_compact().to_vec())
    }
}

/// An identity whose authority is borrowed: requests are signed with the
/// inner (session) key, while the envelope carries the delegating key and
/// the chain proving the loan. Each link must be signed by its
/// predecessor, terminating in a link signed by the key holder itself.
pub struct DelegatedIdentity {
    der_public_key: Vec<u8>,
    inner: Box<dyn Identity>,
    chain: Vec<SignedDelegation>,
}

impl DelegatedIdentity {
    pub fn new(
        der_public_key: Vec<u8>,
        inner: Box<dyn Identity>,
        chain: Vec<SignedDelegation>,
    ) -> Self {
        DelegatedIdentity {
            der_public_key,
            inner,
            chain,
        }
    }
}

impl Identity for DelegatedIdentity {
    fn sender(&self) -> Principal {
        Principal::self_authenticating(&self.der_public_key)
    }

    fn public_key(&self) -> Option<Vec<u8>> {
        Some(self.der_public_key.clone())
    }

    fn sign_raw(&self, msg: &[u8]) -> Result<Vec<u8>> {
        self.inner.sign_raw(msg)
    }

    fn delegation_chain(&self) -> Vec<SignedDelegation> {
        let mut chain = self.chain.clone();
        chain.extend(self.inner.delegation_chain());
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity() {
        let identity = AnonymousIdentity;
        assert_eq!(identity.sender(), Principal::anonymous());
        let bundle = identity.sign(&RequestId::new([9; 32])).unwrap();
        assert!(bundle.public_key.is_none());
        assert!(bundle.signature.is_none());
        assert!(bundle.delegations.is_empty());
    }

    #[test]
    fn test_basic_identity_signature_verifies() {
        let identity = BasicIdentity::from_seed(&[42; 32]).unwrap();
        let request_id = RequestId::new([7; 32]);
        let bundle = identity.sign(&request_id).unwrap();
        let der = bundle.public_key.unwrap();
        let raw = crate::crypto::der_unwrap(&ED25519_DER_PREFIX, &der).unwrap();

        let mut msg: Vec<u8> = vec![];
        msg.extend(REQUEST_DOMAIN_SEPARATOR);
        msg.extend(request_id.as_slice());
        let verifier =
            ring::signature::UnparsedPublicKey::new(&ring::signature::ED25519, raw);
        verifier
            .verify(&msg, bundle.signature.as_ref().unwrap())
            .unwrap();
    }

    #[test]
    fn test_basic_identity_sender_is_self_authenticating() {
        let identity = BasicIdentity::from_seed(&[1; 32]).unwrap();
        let sender = identity.sender();
        assert_eq!(sender.as_slice().len(), 29);
        assert_eq!(
            sender,
            Principal::self_authenticating(&identity.public_key().unwrap())
        );
    }

    #[test]
    fn test_generated_identities_are_distinct() {
        let first = Secp256k1Identity::generate().unwrap();
        let second = Secp256k1Identity::generate().unwrap();
        assert_ne!(first.sender(), second.sender());
    }

    #[test]
    fn test_secp256k1_identity_signature_verifies() {
        let identity = Secp256k1Identity::from_secret_slice(&[5; 32]).unwrap();
        let msg = b"attempt";
        let compact = identity.sign_raw(msg).unwrap();
        assert_eq!(compact.len(), 64);

        let digest = hash(msg);
        let message = secp256k1::Message::from_slice(&digest).unwrap();
        let signature = secp256k1::Signature::from_compact(&compact).unwrap();
        let der = identity.public_key().unwrap();
        let raw = crate::crypto::der_unwrap(&SECP256K1_DER_PREFIX, &der).unwrap();
        let public_key = secp256k1::PublicKey::from_slice(raw).unwrap();
        assert!(secp256k1::SECP256K1
            .verify(&message, &signature, &public_key)
            .is_ok());
    }

    #[test]
    fn test_delegated_identity_carries_chain() {
        let delegator = BasicIdentity::from_seed(&[2; 32]).unwrap();
        let session = BasicIdentity::from_seed(&[3; 32]).unwrap();
        let delegation = Delegation {
            pubkey: ByteBuf::from(session.public_key().unwrap()),
            expiration: 1_700_000_000_000_000_000,
            targets: None,
        };
        let signature = delegator.sign_raw(&delegation.signable()).unwrap();
        let delegated = DelegatedIdentity::new(
            delegator.public_key().unwrap(),
            Box::new(session),
            vec![SignedDelegation {
                delegation,
                signature: ByteBuf::from(signature),
            }],
        );
        // the sender is the delegator, not the session key
        assert_eq!(delegated.sender(), delegator.sender());
        let bundle = delegated.sign(&RequestId::new([0; 32])).unwrap();
        assert_eq!(bundle.delegations.len(), 1);
        assert_eq!(bundle.public_key.unwrap(), delegator.public_key().unwrap());
    }
}
