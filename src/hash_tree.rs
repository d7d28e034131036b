use crate::crypto::{hash, Sha256Hash};
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::ByteBuf;
use std::fmt;

/// A partial Merkle tree over the network's certified state. Subtrees the
/// responder chose not to disclose arrive as `Pruned` digests; they still
/// contribute to the root hash but hide their contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashTree {
    Empty,
    Fork(Box<HashTree>, Box<HashTree>),
    Labeled(Vec<u8>, Box<HashTree>),
    Leaf(Vec<u8>),
    Pruned(Sha256Hash),
}

/// Outcome of a path lookup. `Unknown` means the path ran into a pruned
/// subtree: the value existed but was redacted, which callers must treat
/// differently from proven absence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult<'a> {
    Found(&'a [u8]),
    Absent,
    Unknown,
    Error,
}

pub(crate) fn domain_sep(tag: &str) -> Vec<u8> {
    let mut vbytes: Vec<u8> = Vec::with_capacity(1 + tag.len());
    vbytes.push(tag.len() as u8);
    vbytes.extend(tag.as_bytes());
    vbytes
}

impl HashTree {
    /// Recomputes the root hash. Each node kind hashes behind its own
    /// domain separator; a pruned node contributes its stored digest
    /// unchanged.
    pub fn digest(&self) -> Sha256Hash {
        match self {
            HashTree::Empty => hash(&domain_sep("ic-hashtree-empty")),
            HashTree::Fork(left, right) => {
                let mut vbytes = domain_sep("ic-hashtree-fork");
                vbytes.extend(&left.digest());
                vbytes.extend(&right.digest());
                hash(&vbytes)
            }
            HashTree::Labeled(label, subtree) => {
                let mut vbytes = domain_sep("ic-hashtree-labeled");
                vbytes.extend(label);
                vbytes.extend(&subtree.digest());
                hash(&vbytes)
            }
            HashTree::Leaf(bytes) => {
                let mut vbytes = domain_sep("ic-hashtree-leaf");
                vbytes.extend(bytes);
                hash(&vbytes)
            }
            HashTree::Pruned(digest) => *digest,
        }
    }

    /// Descends label by label. Forks are unordered: both children are
    /// searched and the labels decide the direction.
    pub fn lookup_path(&self, path: &[&[u8]]) -> LookupResult<'_> {
        match path.split_first() {
            None => match self {
                HashTree::Leaf(bytes) => LookupResult::Found(bytes),
                HashTree::Pruned(_) => LookupResult::Unknown,
                _ => LookupResult::Error,
            },
            Some((label, rest)) => {
                let mut flattened: Vec<&HashTree> = vec![];
                flatten_forks(self, &mut flattened);
                let mut saw_pruned = false;
                for node in flattened {
                    match node {
                        HashTree::Labeled(node_label, subtree) if node_label == label => {
                            return subtree.lookup_path(rest);
                        }
                        HashTree::Pruned(_) => saw_pruned = true,
                        _ => {}
                    }
                }
                if saw_pruned {
                    // absence cannot be proven past a redacted sibling
                    LookupResult::Unknown
                } else {
                    LookupResult::Absent
                }
            }
        }
    }
}

fn flatten_forks<'a>(tree: &'a HashTree, out: &mut Vec<&'a HashTree>) {
    match tree {
        HashTree::Empty => {}
        HashTree::Fork(left, right) => {
            flatten_forks(left, out);
            flatten_forks(right, out);
        }
        other => out.push(other),
    }
}

/// Wire form: `[0]`, `[1, left, right]`, `[2, label, subtree]`,
/// `[3, leaf]`, `[4, digest]`.
impl Serialize for HashTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            HashTree::Empty => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(&0u8)?;
                seq.end()
            }
            HashTree::Fork(left, right) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&1u8)?;
                seq.serialize_element(left)?;
                seq.serialize_element(right)?;
                seq.end()
            }
            HashTree::Labeled(label, subtree) => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(&2u8)?;
                seq.serialize_element(&ByteBuf::from(label.clone()))?;
                seq.serialize_element(subtree)?;
                seq.end()
            }
            HashTree::Leaf(bytes) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&3u8)?;
                seq.serialize_element(&ByteBuf::from(bytes.clone()))?;
                seq.end()
            }
            HashTree::Pruned(digest) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&4u8)?;
                seq.serialize_element(&ByteBuf::from(digest.to_vec()))?;
                seq.end()
            }
        }
    }
}

struct TreeVisitor;

impl<'de> Visitor<'de> for TreeVisitor {
    type Value = HashTree;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a hash tree node encoded as a tagged array")
    }

    fn visit_seq<A: SeqAccess<'de>>(
        self,
        mut seq: A,
    ) -> std::result::Result<HashTree, A::Error> {
        let tag: u8 = seq
            .next_element()?
            .ok_or_else(|| de::Error::custom("hash tree node without a tag"))?;
        match tag {
            0 => Ok(HashTree::Empty),
            1 => {
                let left: HashTree = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("fork without a left child"))?;
                let right: HashTree = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("fork without a right child"))?;
                Ok(HashTree::Fork(Box::new(left), Box::new(right)))
            }
            2 => {
                let label: ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("labeled node without a label"))?;
                let subtree: HashTree = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("labeled node without a subtree"))?;
                Ok(HashTree::Labeled(label.into_vec(), Box::new(subtree)))
            }
            3 => {
                let bytes: ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("leaf without contents"))?;
                Ok(HashTree::Leaf(bytes.into_vec()))
            }
            4 => {
                let digest: ByteBuf = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::custom("pruned node without a digest"))?;
                let digest: Sha256Hash = digest
                    .as_slice()
                    .try_into()
                    .map_err(|_| de::Error::custom("pruned digest is not 32 bytes"))?;
                Ok(HashTree::Pruned(digest))
            }
            other => Err(de::Error::custom(format!(
                "unknown hash tree node tag {}",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for HashTree {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<HashTree, D::Error> {
        deserializer.deserialize_seq(TreeVisitor)
    }
}
