use crate::catalog::TagCatalog;
use crate::frame;
use crate::model::{Id3Version, RawFrame, TagEntry, TagKey, TagRecord};
use std::collections::BTreeMap;

/// Error type for tag editing operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("unsupported tag kind: {0}")]
    UnsupportedTagKind(String),
    #[error("invalid tag parameters: {0}")]
    InvalidTagParameters(String),
    #[error("tag not found: {0}")]
    TagNotFound(String),
}

#[derive(Debug, Clone)]
enum Content {
    /// `origin` is the frame as loaded; cleared once the record is edited.
    Record {
        record: TagRecord,
        origin: Option<RawFrame>,
    },
    Passthrough(RawFrame),
}

#[derive(Debug, Clone)]
struct Slot {
    content: Content,
    order: u64,
}

impl Slot {
    fn entry(&self, key: &TagKey) -> TagEntry {
        match &self.content {
            Content::Record { record, .. } => TagEntry::Record(record.clone()),
            Content::Passthrough(raw) => TagEntry::Unsupported {
                key: key.clone(),
                size: raw.data.len(),
            },
        }
    }
}

/// The tags of one open file, keyed and sorted for display.
///
/// Every slot also remembers where it sat in the file, so writing the
/// collection back keeps the stored frame order.
#[derive(Debug, Clone, Default)]
pub struct TagCollection {
    slots: BTreeMap<TagKey, Slot>,
    next_order: u64,
    dirty: bool,
}

impl TagCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        let mut collection = Self::new();
        collection.load(frames);
        collection
    }

    /// Replaces the contents with `frames`. Never fails: frames the catalog
    /// cannot type are kept as passthrough slots.
    pub fn load(&mut self, frames: impl IntoIterator<Item = RawFrame>) {
        let catalog = TagCatalog::global();
        self.slots.clear();
        self.next_order = 0;
        self.dirty = false;

        for raw in frames {
            let typed = catalog
                .kind(&raw.id)
                .and_then(|kind| frame::decode_frame(&raw, kind))
                .and_then(|(key, value)| {
                    let record = catalog.create(&key, value).ok()?;
                    (!self.slots.contains_key(&key)).then_some((key, record))
                });

            let (key, content) = match typed {
                Some((key, record)) => (
                    key,
                    Content::Record {
                        record,
                        origin: Some(raw),
                    },
                ),
                None => (self.free_passthrough_key(&raw), Content::Passthrough(raw)),
            };
            self.insert_new(key, content);
        }
    }

    /// Adds a record, or replaces the one already stored under the same key.
    pub fn add(&mut self, identifier: &str, value: impl Into<String>) -> Result<TagKey, TagError> {
        let key: TagKey = identifier.parse()?;
        let record = TagCatalog::global().create(&key, value.into())?;
        let content = Content::Record {
            record,
            origin: None,
        };

        match self.slots.get_mut(&key) {
            Some(slot) => slot.content = content,
            None => self.insert_new(key.clone(), content),
        }
        self.dirty = true;
        Ok(key)
    }

    pub fn update(&mut self, identifier: &str, value: impl Into<String>) -> Result<(), TagError> {
        let key = self.resolve(identifier)?;
        let value = value.into();
        let Some(slot) = self.slots.get_mut(&key) else {
            return Err(TagError::TagNotFound(key.to_string()));
        };

        match &mut slot.content {
            Content::Passthrough(_) => Err(TagError::UnsupportedTagKind(key.to_string())),
            Content::Record { record, origin } => {
                if record.value() != value {
                    record.set_value(value);
                    *origin = None;
                    self.dirty = true;
                }
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, identifier: &str) -> Result<TagEntry, TagError> {
        let key = self.resolve(identifier)?;
        let slot = self
            .slots
            .remove(&key)
            .ok_or_else(|| TagError::TagNotFound(key.to_string()))?;
        self.dirty = true;
        Ok(slot.entry(&key))
    }

    pub fn get(&self, identifier: &str) -> Option<TagEntry> {
        let key: TagKey = identifier.parse().ok()?;
        self.slots.get(&key).map(|slot| slot.entry(&key))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    /// Snapshot in key order, unsupported entries included.
    pub fn list(&self) -> Vec<TagEntry> {
        self.slots
            .iter()
            .map(|(key, slot)| slot.entry(key))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Frames to hand back to the container, in stored order. Untouched
    /// frames come back exactly as they were loaded.
    pub fn raw_frames(&self, version: Id3Version) -> Vec<RawFrame> {
        let mut slots: Vec<&Slot> = self.slots.values().collect();
        slots.sort_by_key(|slot| slot.order);
        slots
            .into_iter()
            .map(|slot| match &slot.content {
                Content::Record {
                    origin: Some(raw), ..
                } => raw.clone(),
                Content::Record { record, .. } => frame::encode_record(record, version),
                Content::Passthrough(raw) => raw.clone(),
            })
            .collect()
    }

    fn resolve(&self, identifier: &str) -> Result<TagKey, TagError> {
        let key: TagKey = identifier
            .parse()
            .map_err(|_| TagError::TagNotFound(identifier.trim().to_string()))?;
        if self.slots.contains_key(&key) {
            Ok(key)
        } else {
            Err(TagError::TagNotFound(key.to_string()))
        }
    }

    fn free_passthrough_key(&self, raw: &RawFrame) -> TagKey {
        let plain = TagKey::plain(raw.id.clone());
        if !self.slots.contains_key(&plain) {
            return plain;
        }
        (2..)
            .map(|ordinal| TagKey::duplicate(raw.id.clone(), ordinal))
            .find(|key| !self.slots.contains_key(key))
            .unwrap_or(plain)
    }

    fn insert_new(&mut self, key: TagKey, content: Content) {
        let order = self.next_order;
        self.next_order += 1;
        self.slots.insert(key, Slot { content, order });
    }
}
