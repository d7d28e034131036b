use crate::crypto::{der_unwrap, verify_threshold_sig, BLS_DER_PREFIX};
use crate::hash_tree::{domain_sep, HashTree, LookupResult};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{event, Level};

/// A signed attestation of a subnet's state: a hash tree, a threshold
/// signature over its root hash, and optionally a delegation proving the
/// signing subnet's key was authorized by the network's root key.
/// Parsed once and never mutated; verification is a pure function of the
/// certificate and the expected root public key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub tree: HashTree,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<CertificateDelegation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateDelegation {
    #[serde(with = "serde_bytes")]
    pub subnet_id: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub certificate: Vec<u8>,
}

impl Certificate {
    pub fn from_cbor(bytes: &[u8]) -> Result<Certificate> {
        serde_cbor::from_slice(bytes)
            .map_err(|err| Error::Decoding(format!("malformed certificate: {}", err)))
    }

    /// Verifies the certificate against `root_public_key` (DER). With a
    /// delegation present, the delegation's own certificate is verified
    /// against the root key first and the subnet key extracted from its
    /// verified tree takes over. There is no partial success: any
    /// mismatch is `Error::InvalidCertificate`.
    pub fn verify(&self, root_public_key: &[u8]) -> Result<()> {
        let effective_key = match &self.delegation {
            Some(delegation) => verify_delegation(delegation, root_public_key)?,
            None => root_public_key.to_vec(),
        };
        let raw_key = der_unwrap(&BLS_DER_PREFIX, &effective_key)
            .map_err(|err| Error::InvalidCertificate(err.to_string()))?;

        let mut msg = domain_sep("ic-state-root");
        msg.extend(&self.tree.digest());
        if !verify_threshold_sig(raw_key, &self.signature, &msg) {
            event!(Level::WARN, "certificate signature rejected");
            return Err(Error::InvalidCertificate(
                "threshold signature does not match the tree's root hash".to_string(),
            ));
        }
        Ok(())
    }

    pub fn lookup_path(&self, path: &[&[u8]]) -> LookupResult<'_> {
        self.tree.lookup_path(path)
    }
}

fn verify_delegation(
    delegation: &CertificateDelegation,
    root_public_key: &[u8],
) -> Result<Vec<u8>> {
    let parent = Certificate::from_cbor(&delegation.certificate)?;
    if parent.delegation.is_some() {
        return Err(Error::InvalidCertificate(
            "a delegation certificate must not itself carry a delegation".to_string(),
        ));
    }
    parent.verify(root_public_key)?;
    match parent.lookup_path(&[b"subnet", &delegation.subnet_id, b"public_key"]) {
        LookupResult::Found(der_key) => Ok(der_key.to_vec()),
        other => Err(Error::InvalidCertificate(format!(
            "the delegated subnet's public key is not in the delegation tree ({:?})",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utilities::mocks::ThresholdKey;

    fn labeled(label: &[u8], subtree: HashTree) -> HashTree {
        HashTree::Labeled(label.to_vec(), Box::new(subtree))
    }

    fn sample_tree() -> HashTree {
        labeled(b"time", HashTree::Leaf(vec![0x01]))
    }

    #[test]
    fn test_verify_accepts_a_correctly_signed_certificate() {
        let key = ThresholdKey::new(7);
        let certificate = key.certify(sample_tree());
        certificate.verify(&key.public_key_der()).unwrap();
    }

    #[test]
    fn test_verify_rejects_a_flipped_signature_byte() {
        let key = ThresholdKey::new(7);
        let mut certificate = key.certify(sample_tree());
        certificate.signature[5] ^= 0x01;
        assert!(matches!(
            certificate.verify(&key.public_key_der()),
            Err(Error::InvalidCertificate(_))
        ));
    }

    #[test]
    fn test_verify_rejects_a_tampered_tree() {
        let key = ThresholdKey::new(7);
        let mut certificate = key.certify(sample_tree());
        certificate.tree = labeled(b"time", HashTree::Leaf(vec![0x02]));
        assert!(matches!(
            certificate.verify(&key.public_key_der()),
            Err(Error::InvalidCertificate(_))
        ));
    }

    #[test]
    fn test_verify_rejects_the_wrong_key() {
        let key = ThresholdKey::new(7);
        let other = ThresholdKey::new(8);
        let certificate = key.certify(sample_tree());
        assert!(certificate.verify(&other.public_key_der()).is_err());
    }

    #[test]
    fn test_delegated_certificate_verifies_against_the_root_key() {
        let root = ThresholdKey::new(11);
        let subnet = ThresholdKey::new(13);
        let certificate = subnet.certify_with_delegation(sample_tree(), &root, b"subnet-9");
        certificate.verify(&root.public_key_der()).unwrap();
        // the subnet key alone is not a trust root
        assert!(certificate.verify(&subnet.public_key_der()).is_err());
    }

    #[test]
    fn test_nested_delegation_rejected() {
        let root = ThresholdKey::new(11);
        let subnet = ThresholdKey::new(13);
        let mut certificate = subnet.certify_with_delegation(sample_tree(), &root, b"subnet-9");
        // graft a second delegation layer into the parent certificate
        let parent = certificate.delegation.as_ref().unwrap();
        let mut nested = Certificate::from_cbor(&parent.certificate).unwrap();
        nested.delegation = Some(CertificateDelegation {
            subnet_id: b"deeper".to_vec(),
            certificate: parent.certificate.clone(),
        });
        certificate.delegation = Some(CertificateDelegation {
            subnet_id: parent.subnet_id.clone(),
            certificate: serde_cbor::to_vec(&nested).unwrap(),
        });
        assert!(matches!(
            certificate.verify(&root.public_key_der()),
            Err(Error::InvalidCertificate(_))
        ));
    }

    #[test]
    fn test_malformed_certificate_bytes() {
        assert!(matches!(
            Certificate::from_cbor(&[0xff, 0x00, 0x01]),
            Err(Error::Decoding(_))
        ));
    }
}
