use crate::collection::TagError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Four character frame identifier, `A-Z0-9` only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(String);

impl FrameId {
    pub fn new(raw: &str) -> Option<Self> {
        let valid = raw.len() == 4
            && raw
                .bytes()
                .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit());
        valid.then(|| Self(raw.to_string()))
    }

    pub fn from_bytes(raw: [u8; 4]) -> Option<Self> {
        std::str::from_utf8(&raw).ok().and_then(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Distinguishes several frames sharing one identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Qualifier {
    None,
    Comment {
        description: String,
        language: String,
    },
    /// Second and later copies of a frame that could not be keyed any other way.
    Duplicate(u32),
}

/// Collection key. Sorts by frame id first, then by qualifier.
///
/// Text form is `TIT2`, `COMM:<description>:<lng>` or `APIC#2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagKey {
    pub id: FrameId,
    pub qualifier: Qualifier,
}

impl TagKey {
    pub fn plain(id: FrameId) -> Self {
        Self {
            id,
            qualifier: Qualifier::None,
        }
    }

    pub fn comment(id: FrameId, description: &str, language: &str) -> Self {
        Self {
            id,
            qualifier: Qualifier::Comment {
                description: description.to_string(),
                language: language.to_string(),
            },
        }
    }

    pub fn duplicate(id: FrameId, ordinal: u32) -> Self {
        Self {
            id,
            qualifier: Qualifier::Duplicate(ordinal),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Qualifier::None => write!(f, "{}", self.id),
            Qualifier::Comment {
                description,
                language,
            } => write!(f, "{}:{description}:{language}", self.id),
            Qualifier::Duplicate(ordinal) => write!(f, "{}#{ordinal}", self.id),
        }
    }
}

impl FromStr for TagKey {
    type Err = TagError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let head_len = trimmed.find([':', '#']).unwrap_or(trimmed.len());
        let (head, tail) = trimmed.split_at(head_len);
        let id = FrameId::new(&head.to_ascii_uppercase())
            .ok_or_else(|| TagError::UnsupportedTagKind(trimmed.to_string()))?;

        if tail.is_empty() {
            return Ok(Self::plain(id));
        }

        if let Some(ordinal) = tail.strip_prefix('#') {
            let ordinal = ordinal
                .parse::<u32>()
                .ok()
                .filter(|ordinal| *ordinal >= 2)
                .ok_or_else(|| {
                    TagError::InvalidTagParameters(format!("bad duplicate ordinal in {trimmed}"))
                })?;
            return Ok(Self::duplicate(id, ordinal));
        }

        let rest = &tail[1..];
        let Some((description, language)) = rest.rsplit_once(':') else {
            return Err(TagError::InvalidTagParameters(format!(
                "{trimmed}: expected {id}:<description>:<language>"
            )));
        };
        Ok(Self::comment(id, description, language))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    SimpleText,
    Comment,
}

/// One editable metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRecord {
    SimpleText {
        id: FrameId,
        text: String,
    },
    Comment {
        id: FrameId,
        description: String,
        language: String,
        text: String,
    },
}

impl TagRecord {
    pub fn id(&self) -> &FrameId {
        match self {
            Self::SimpleText { id, .. } | Self::Comment { id, .. } => id,
        }
    }

    pub fn key(&self) -> TagKey {
        match self {
            Self::SimpleText { id, .. } => TagKey::plain(id.clone()),
            Self::Comment {
                id,
                description,
                language,
                ..
            } => TagKey::comment(id.clone(), description, language),
        }
    }

    pub fn kind(&self) -> TagKind {
        match self {
            Self::SimpleText { .. } => TagKind::SimpleText,
            Self::Comment { .. } => TagKind::Comment,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::SimpleText { text, .. } | Self::Comment { text, .. } => text,
        }
    }

    pub(crate) fn set_value(&mut self, value: String) {
        match self {
            Self::SimpleText { text, .. } | Self::Comment { text, .. } => *text = value,
        }
    }
}

/// Read-only view of one collection slot, as handed to a front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEntry {
    Record(TagRecord),
    Unsupported { key: TagKey, size: usize },
}

impl TagEntry {
    pub const UNSUPPORTED_LABEL: &'static str = "Unsupported";

    pub fn key(&self) -> TagKey {
        match self {
            Self::Record(record) => record.key(),
            Self::Unsupported { key, .. } => key.clone(),
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    pub fn display_value(&self) -> &str {
        match self {
            Self::Record(record) => record.value(),
            Self::Unsupported { .. } => Self::UNSUPPORTED_LABEL,
        }
    }
}

/// A frame exactly as stored in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub id: FrameId,
    pub flags: [u8; 2],
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(id: FrameId, data: Vec<u8>) -> Self {
        Self {
            id,
            flags: [0, 0],
            data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Id3Version {
    V23,
    #[default]
    V24,
}

impl Id3Version {
    pub fn major(self) -> u8 {
        match self {
            Self::V23 => 3,
            Self::V24 => 4,
        }
    }

    pub fn from_major(major: u8) -> Option<Self> {
        match major {
            3 => Some(Self::V23),
            4 => Some(Self::V24),
            _ => None,
        }
    }
}

impl fmt::Display for Id3Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID3v2.{}", self.major())
    }
}

/// Everything a gateway reads from or writes to one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagContents {
    pub version: Id3Version,
    pub frames: Vec<RawFrame>,
}
