use crate::collection::{TagCollection, TagError};
use crate::gateway::{GatewayError, Id3FileGateway, PersistenceGateway};
use crate::model::{Id3Version, TagContents, TagEntry, TagKey};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("no file is open")]
    NoFileOpen,
    #[error("{} has unsaved changes", .0.display())]
    UnsavedChanges(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Loaded,
    Dirty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { frames: usize },
    /// The file carries no tag yet; the session starts from an empty collection.
    NoHeaderFound,
}

#[derive(Debug)]
struct OpenFile {
    path: PathBuf,
    version: Id3Version,
    collection: TagCollection,
}

/// One open file at a time: load, edit, save.
///
/// The session never asks whether unsaved edits may be dropped. Callers check
/// [`EditSession::can_discard`] and use [`EditSession::load_discarding`] once the
/// user has agreed.
#[derive(Debug)]
pub struct EditSession<G = Id3FileGateway> {
    gateway: G,
    open: Option<OpenFile>,
}

impl<G: PersistenceGateway> EditSession<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            open: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.open {
            None => SessionState::Empty,
            Some(open) if open.collection.is_dirty() => SessionState::Dirty,
            Some(_) => SessionState::Loaded,
        }
    }

    pub fn can_discard(&self) -> bool {
        self.state() != SessionState::Dirty
    }

    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().map(|open| open.path.as_path())
    }

    pub fn version(&self) -> Option<Id3Version> {
        self.open.as_ref().map(|open| open.version)
    }

    pub fn collection(&self) -> Option<&TagCollection> {
        self.open.as_ref().map(|open| &open.collection)
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn load(&mut self, path: &Path) -> Result<LoadOutcome, SessionError> {
        if !self.can_discard() {
            let open_path = self.path().map(Path::to_path_buf).unwrap_or_default();
            return Err(SessionError::UnsavedChanges(open_path));
        }
        self.load_discarding(path)
    }

    /// Loads `path` even when the current file has unsaved edits.
    ///
    /// On failure other than a missing tag the session keeps what it had.
    pub fn load_discarding(&mut self, path: &Path) -> Result<LoadOutcome, SessionError> {
        let (contents, outcome) = match self.gateway.load(path) {
            Ok(contents) => {
                let frames = contents.frames.len();
                (contents, LoadOutcome::Loaded { frames })
            }
            Err(GatewayError::NoHeader(_)) => (
                TagContents {
                    version: self.gateway.default_version(),
                    frames: Vec::new(),
                },
                LoadOutcome::NoHeaderFound,
            ),
            Err(err) => return Err(err.into()),
        };

        self.open = Some(OpenFile {
            path: path.to_path_buf(),
            version: contents.version,
            collection: TagCollection::from_frames(contents.frames),
        });
        Ok(outcome)
    }

    pub fn add(
        &mut self,
        identifier: &str,
        value: impl Into<String>,
    ) -> Result<TagKey, SessionError> {
        Ok(self.open_mut()?.collection.add(identifier, value)?)
    }

    pub fn update(
        &mut self,
        identifier: &str,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        Ok(self.open_mut()?.collection.update(identifier, value)?)
    }

    pub fn remove(&mut self, identifier: &str) -> Result<TagEntry, SessionError> {
        Ok(self.open_mut()?.collection.remove(identifier)?)
    }

    pub fn list(&self) -> Vec<TagEntry> {
        self.collection().map(TagCollection::list).unwrap_or_default()
    }

    /// Writes the collection back to the file it came from. On failure the
    /// edits stay pending.
    pub fn save(&mut self) -> Result<(), SessionError> {
        let open = self.open.as_mut().ok_or(SessionError::NoFileOpen)?;
        let contents = TagContents {
            version: open.version,
            frames: open.collection.raw_frames(open.version),
        };
        self.gateway.save(&open.path, &contents)?;
        open.collection.mark_clean();
        Ok(())
    }

    /// Writes to `path` and makes it the open file.
    pub fn save_as(&mut self, path: &Path) -> Result<(), SessionError> {
        let open = self.open.as_mut().ok_or(SessionError::NoFileOpen)?;
        let contents = TagContents {
            version: open.version,
            frames: open.collection.raw_frames(open.version),
        };
        self.gateway.save(path, &contents)?;
        open.path = path.to_path_buf();
        open.collection.mark_clean();
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), SessionError> {
        if !self.can_discard() {
            let open_path = self.path().map(Path::to_path_buf).unwrap_or_default();
            return Err(SessionError::UnsavedChanges(open_path));
        }
        self.open = None;
        Ok(())
    }

    fn open_mut(&mut self) -> Result<&mut OpenFile, SessionError> {
        self.open.as_mut().ok_or(SessionError::NoFileOpen)
    }
}

impl Default for EditSession<Id3FileGateway> {
    fn default() -> Self {
        Self::new(Id3FileGateway::default())
    }
}
