use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A field tag inside a record or variant: either an explicit numeric id
/// or a name folded into a 32-bit id with the rolling hash
/// `h = h * 223 + byte (mod 2^32)`. Tags sort and compare as unsigned
/// 32-bit integers; the name, when present, is carried for display only.
#[derive(Debug, Clone)]
pub struct Label {
    id: u32,
    name: Option<String>,
}

pub fn label_hash(name: &str) -> u32 {
    name.bytes()
        .fold(0u32, |h, byte| h.wrapping_mul(223).wrapping_add(byte as u32))
}

impl Label {
    pub fn from_id(id: u32) -> Self {
        Label { id, name: None }
    }

    pub fn named(name: &str) -> Self {
        Label {
            id: label_hash(name),
            name: Some(name.to_string()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True when the two labels share an id but were built from different
    /// names. Such a pair cannot legally coexist in one structure.
    pub fn collides_with(&self, other: &Label) -> bool {
        self.id == other.id
            && matches!((&self.name, &other.name), (Some(a), Some(b)) if a != b)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Label {}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Label {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(formatter, "{}", name),
            None => write!(formatter, "{}", self.id),
        }
    }
}
