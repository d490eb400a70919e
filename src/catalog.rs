use crate::collection::TagError;
use crate::model::{FrameId, Qualifier, TagKey, TagKind, TagRecord};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

const UNAVAILABLE: &str = "Unavailable";
const REFERENCE_URL: &str = "http://id3.org/id3v2.3.0#Declared_ID3v2_frames";

pub type Creator = fn(&TagKey, String) -> Result<TagRecord, TagError>;

#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub description: &'static str,
    kind: Option<TagKind>,
    creator: Option<Creator>,
}

impl CatalogEntry {
    const fn text(id: &'static str, description: &'static str) -> Self {
        Self {
            id,
            description,
            kind: Some(TagKind::SimpleText),
            creator: Some(create_text),
        }
    }

    const fn comment(id: &'static str, description: &'static str) -> Self {
        Self {
            id,
            description,
            kind: Some(TagKind::Comment),
            creator: Some(create_comment),
        }
    }

    const fn display_only(id: &'static str, description: &'static str) -> Self {
        Self {
            id,
            description,
            kind: None,
            creator: None,
        }
    }
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry::comment("COMM", "Comment"),
    CatalogEntry::text("TALB", "Album title"),
    CatalogEntry::text("TBPM", "Tempo (beats per minute)"),
    CatalogEntry::text("TCON", "Content type"),
    CatalogEntry::text("TCOP", "Copyright message"),
    CatalogEntry::display_only("TDAT", "Date"),
    CatalogEntry::text("TDRC", "Recording time"),
    CatalogEntry::display_only("TFLT", "File type"),
    CatalogEntry::text("TIT1", "Content group description"),
    CatalogEntry::text("TIT2", "Title/songname/content description"),
    CatalogEntry::text("TIT3", "Subtitle/description refinement"),
    CatalogEntry::text("TPE1", "Lead performer/soloist(s)"),
    CatalogEntry::text("TPE2", "Band/orchestra/accompaniment"),
    CatalogEntry::text("TPE3", "Conductor/performer refinement"),
    CatalogEntry::text("TPE4", "Interpreted, remixed, or otherwise modified by"),
    CatalogEntry::text("TPOS", "Part of set"),
    CatalogEntry::text("TRCK", "Track number/position in set"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagInfo {
    pub description: &'static str,
    pub supported: bool,
}

/// Process-wide registry of the frame kinds the editor knows how to build.
#[derive(Debug)]
pub struct TagCatalog {
    entries: BTreeMap<&'static str, CatalogEntry>,
}

impl TagCatalog {
    pub fn global() -> &'static TagCatalog {
        static CATALOG: OnceLock<TagCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| TagCatalog {
            entries: ENTRIES.iter().map(|entry| (entry.id, *entry)).collect(),
        })
    }

    pub fn lookup(&self, id: &str) -> TagInfo {
        match self.entries.get(id) {
            Some(entry) => TagInfo {
                description: entry.description,
                supported: entry.creator.is_some(),
            },
            None => TagInfo {
                description: UNAVAILABLE,
                supported: false,
            },
        }
    }

    pub fn kind(&self, id: &FrameId) -> Option<TagKind> {
        self.entries.get(id.as_str()).and_then(|entry| entry.kind)
    }

    pub fn create(&self, key: &TagKey, value: String) -> Result<TagRecord, TagError> {
        let creator = self
            .entries
            .get(key.id.as_str())
            .and_then(|entry| entry.creator)
            .ok_or_else(|| TagError::UnsupportedTagKind(key.id.to_string()))?;
        creator(key, value)
    }

    /// Identifiers in display order, display-only ones included.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn help_text(&self) -> String {
        let mut out = String::from("Currently Supported Tags\n------------------------\n");
        for entry in self.entries.values() {
            let _ = writeln!(out, "{}: {}", entry.id, entry.description);
        }
        out.push_str("\nMore information\n----------------\n");
        out.push_str(REFERENCE_URL);
        out.push('\n');
        out
    }
}

fn create_text(key: &TagKey, value: String) -> Result<TagRecord, TagError> {
    if key.qualifier != Qualifier::None {
        return Err(TagError::InvalidTagParameters(format!(
            "{} takes no description or language",
            key.id
        )));
    }
    Ok(TagRecord::SimpleText {
        id: key.id.clone(),
        text: value,
    })
}

fn create_comment(key: &TagKey, value: String) -> Result<TagRecord, TagError> {
    let Qualifier::Comment {
        description,
        language,
    } = &key.qualifier
    else {
        return Err(TagError::InvalidTagParameters(format!(
            "{} requires {}:<description>:<language>",
            key.id, key.id
        )));
    };

    if description.is_empty() {
        return Err(TagError::InvalidTagParameters(format!(
            "{key}: description must not be empty"
        )));
    }
    if language.len() != 3 || !language.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(TagError::InvalidTagParameters(format!(
            "{key}: language must be a 3 letter code"
        )));
    }

    Ok(TagRecord::Comment {
        id: key.id.clone(),
        description: description.clone(),
        language: language.clone(),
        text: value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> TagKey {
        text.parse().expect("key")
    }

    fn id(raw: &str) -> FrameId {
        FrameId::new(raw).expect("frame id")
    }

    #[test]
    fn lookup_reports_description_and_support() {
        let catalog = TagCatalog::global();
        assert_eq!(
            catalog.lookup("TALB"),
            TagInfo {
                description: "Album title",
                supported: true
            }
        );
        assert_eq!(
            catalog.lookup("TDAT"),
            TagInfo {
                description: "Date",
                supported: false
            }
        );
        assert_eq!(
            catalog.lookup("APIC"),
            TagInfo {
                description: "Unavailable",
                supported: false
            }
        );
    }

    #[test]
    fn keys_are_sorted_and_include_display_only_kinds() {
        let keys: Vec<&str> = TagCatalog::global().keys().collect();
        assert_eq!(keys.len(), 17);
        assert_eq!(keys.first(), Some(&"COMM"));
        assert_eq!(keys.last(), Some(&"TRCK"));
        assert!(keys.contains(&"TDAT"));
    }

    #[test]
    fn create_builds_simple_text_records() {
        let record = TagCatalog::global()
            .create(&key("TIT2"), String::from("Song"))
            .expect("record");
        assert_eq!(record.value(), "Song");
        assert_eq!(record.kind(), TagKind::SimpleText);
    }

    #[test]
    fn create_rejects_unknown_and_display_only_kinds() {
        let catalog = TagCatalog::global();
        for id in ["APIC", "TDAT", "TFLT"] {
            assert_eq!(
                catalog.create(&key(id), String::new()),
                Err(TagError::UnsupportedTagKind(id.to_string()))
            );
        }
    }

    #[test]
    fn comment_language_must_be_three_characters() {
        let catalog = TagCatalog::global();
        assert!(matches!(
            catalog.create(&key("COMM:x:en"), String::from("hi")),
            Err(TagError::InvalidTagParameters(_))
        ));
        assert!(matches!(
            catalog.create(&key("COMM::eng"), String::from("hi")),
            Err(TagError::InvalidTagParameters(_))
        ));
        assert!(matches!(
            catalog.create(&key("COMM:x:e1g"), String::from("hi")),
            Err(TagError::InvalidTagParameters(_))
        ));
        assert!(matches!(
            catalog.create(&TagKey::comment(id("COMM"), "x", "e:g"), String::from("hi")),
            Err(TagError::InvalidTagParameters(_))
        ));
        assert!(matches!(
            catalog.create(&key("COMM"), String::from("hi")),
            Err(TagError::InvalidTagParameters(_))
        ));
        let record = catalog
            .create(&key("COMM:x:eng"), String::from("hi"))
            .expect("comment");
        assert_eq!(record.key().to_string(), "COMM:x:eng");
    }

    #[test]
    fn text_kinds_reject_comment_qualifiers() {
        assert!(matches!(
            TagCatalog::global().create(&key("TALB:x:eng"), String::new()),
            Err(TagError::InvalidTagParameters(_))
        ));
    }

    #[test]
    fn help_text_lists_every_entry_in_order() {
        let help = TagCatalog::global().help_text();
        assert!(help.starts_with("Currently Supported Tags"));
        let comm = help.find("COMM: Comment").expect("COMM line");
        let trck = help.find("TRCK: Track number/position in set").expect("TRCK line");
        assert!(comm < trck);
        assert!(help.contains(REFERENCE_URL));
    }
}
