use crate::config::{self, EditorSettings};
use crate::model::{FrameId, Id3Version, RawFrame, TagContents};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const HEADER_LEN: usize = 10;
const FRAME_HEADER_LEN: usize = 10;
const MAX_SYNCSAFE: usize = 0x0FFF_FFFF;

const FLAG_UNSYNCHRONISATION: u8 = 0x80;
const FLAG_EXTENDED_HEADER: u8 = 0x40;
const FLAG_FOOTER: u8 = 0x10;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("no ID3v2 header in {}", .0.display())]
    NoHeader(PathBuf),
    #[error("failed to decode tag in {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where an edit session reads tags from and writes them back to.
pub trait PersistenceGateway {
    fn load(&mut self, path: &Path) -> Result<TagContents, GatewayError>;

    fn save(&mut self, path: &Path, contents: &TagContents) -> Result<(), GatewayError>;

    /// Version used for files that carry no tag yet.
    fn default_version(&self) -> Id3Version {
        Id3Version::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no ID3v2 header")]
    NoHeader,
    #[error("{0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub version: Id3Version,
    pub flags: u8,
    /// Size of everything after the header, footer excluded.
    pub size: usize,
}

impl TagHeader {
    /// Bytes the tag occupies at the start of the file.
    pub fn total_len(&self) -> usize {
        let footer = if self.version == Id3Version::V24 && self.flags & FLAG_FOOTER != 0 {
            HEADER_LEN
        } else {
            0
        };
        HEADER_LEN + self.size + footer
    }
}

pub fn parse_header(bytes: &[u8]) -> Result<TagHeader, ParseError> {
    if bytes.len() < HEADER_LEN || &bytes[..3] != b"ID3" {
        return Err(ParseError::NoHeader);
    }
    let version = Id3Version::from_major(bytes[3]).ok_or_else(|| {
        ParseError::Malformed(format!("unsupported ID3v2 major version {}", bytes[3]))
    })?;
    let size = read_syncsafe(&bytes[6..10])
        .ok_or_else(|| ParseError::Malformed(String::from("tag size is not syncsafe")))?;
    Ok(TagHeader {
        version,
        flags: bytes[5],
        size,
    })
}

/// Splits a tag body into frames.
pub fn parse_frames(header: &TagHeader, body: &[u8]) -> Result<Vec<RawFrame>, ParseError> {
    let body: Cow<'_, [u8]> =
        if header.version == Id3Version::V23 && header.flags & FLAG_UNSYNCHRONISATION != 0 {
            Cow::Owned(remove_unsynchronisation(body))
        } else {
            Cow::Borrowed(body)
        };

    let mut pos = 0;
    if header.flags & FLAG_EXTENDED_HEADER != 0 {
        pos = extended_header_len(header.version, &body)?;
    }

    let mut frames = Vec::new();
    while pos + FRAME_HEADER_LEN <= body.len() {
        if body[pos] == 0 {
            break;
        }

        let id_bytes = [body[pos], body[pos + 1], body[pos + 2], body[pos + 3]];
        let id = FrameId::from_bytes(id_bytes)
            .ok_or_else(|| ParseError::Malformed(format!("invalid frame id at offset {pos}")))?;
        let size_bytes = &body[pos + 4..pos + 8];
        let size = match header.version {
            Id3Version::V23 => {
                u32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]])
                    as usize
            }
            Id3Version::V24 => read_syncsafe(size_bytes).ok_or_else(|| {
                ParseError::Malformed(format!("frame {id} size is not syncsafe"))
            })?,
        };
        let flags = [body[pos + 8], body[pos + 9]];

        let start = pos + FRAME_HEADER_LEN;
        let end = start
            .checked_add(size)
            .filter(|end| *end <= body.len())
            .ok_or_else(|| ParseError::Malformed(format!("frame {id} overruns the tag")))?;

        frames.push(RawFrame {
            id,
            flags,
            data: body[start..end].to_vec(),
        });
        pos = end;
    }

    Ok(frames)
}

/// Parses a whole tag from the start of `bytes`.
pub fn parse_tag(bytes: &[u8]) -> Result<TagContents, ParseError> {
    let header = parse_header(bytes)?;
    let body = bytes
        .get(HEADER_LEN..HEADER_LEN + header.size)
        .ok_or_else(|| ParseError::Malformed(String::from("tag is truncated")))?;
    let frames = parse_frames(&header, body)?;
    Ok(TagContents {
        version: header.version,
        frames,
    })
}

/// Serializes `contents` as a tag with no unsynchronisation and no extended header.
pub fn render_tag(contents: &TagContents, padding: usize) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    for frame in &contents.frames {
        let len = frame.data.len();
        let size = match contents.version {
            Id3Version::V23 => u32::try_from(len)
                .map(u32::to_be_bytes)
                .map_err(|_| too_large(&frame.id))?,
            Id3Version::V24 => write_syncsafe(len).ok_or_else(|| too_large(&frame.id))?,
        };
        body.extend_from_slice(frame.id.as_bytes());
        body.extend_from_slice(&size);
        body.extend_from_slice(&frame.flags);
        body.extend_from_slice(&frame.data);
    }
    body.resize(body.len() + padding, 0);

    let size = write_syncsafe(body.len()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "tag exceeds the ID3v2 size limit")
    })?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(b"ID3");
    out.extend_from_slice(&[contents.version.major(), 0, 0]);
    out.extend_from_slice(&size);
    out.extend_from_slice(&body);
    Ok(out)
}

fn too_large(id: &FrameId) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("frame {id} exceeds the ID3v2 size limit"),
    )
}

fn extended_header_len(version: Id3Version, body: &[u8]) -> Result<usize, ParseError> {
    let truncated = || ParseError::Malformed(String::from("extended header is truncated"));
    let size_bytes = body.get(..4).ok_or_else(truncated)?;
    let len = match version {
        // v2.3 excludes the size field itself.
        Id3Version::V23 => {
            u32::from_be_bytes([size_bytes[0], size_bytes[1], size_bytes[2], size_bytes[3]])
                as usize
                + 4
        }
        Id3Version::V24 => read_syncsafe(size_bytes).ok_or_else(truncated)?,
    };
    if len > body.len() {
        return Err(truncated());
    }
    Ok(len)
}

fn read_syncsafe(bytes: &[u8]) -> Option<usize> {
    if bytes.len() != 4 || bytes.iter().any(|byte| byte & 0x80 != 0) {
        return None;
    }
    Some(
        (usize::from(bytes[0]) << 21)
            | (usize::from(bytes[1]) << 14)
            | (usize::from(bytes[2]) << 7)
            | usize::from(bytes[3]),
    )
}

fn write_syncsafe(value: usize) -> Option<[u8; 4]> {
    if value > MAX_SYNCSAFE {
        return None;
    }
    Some([
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ])
}

fn remove_unsynchronisation(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut previous = 0u8;
    for &byte in bytes {
        if !(previous == 0xFF && byte == 0x00) {
            out.push(byte);
        }
        previous = byte;
    }
    out
}

/// Reads and writes ID3v2.3 / ID3v2.4 tags stored at the start of a file.
#[derive(Debug, Clone)]
pub struct Id3FileGateway {
    padding: usize,
    default_version: Id3Version,
}

impl Default for Id3FileGateway {
    fn default() -> Self {
        Self::from_settings(&EditorSettings::default())
    }
}

impl Id3FileGateway {
    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self {
            padding: settings.padding,
            default_version: settings.default_version,
        }
    }

    fn read_tag(path: &Path) -> Result<TagContents, GatewayError> {
        let read_error = |source: io::Error| GatewayError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => GatewayError::NotFound(path.to_path_buf()),
            _ => read_error(source),
        })?;

        let mut header_bytes = [0u8; HEADER_LEN];
        match file.read_exact(&mut header_bytes) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(GatewayError::NoHeader(path.to_path_buf()));
            }
            Err(err) => return Err(read_error(err)),
        }

        let decode_error = |err: ParseError| match err {
            ParseError::NoHeader => GatewayError::NoHeader(path.to_path_buf()),
            ParseError::Malformed(reason) => GatewayError::Decode {
                path: path.to_path_buf(),
                reason,
            },
        };

        let header = parse_header(&header_bytes).map_err(decode_error)?;
        let mut body = vec![0u8; header.size];
        file.read_exact(&mut body).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => GatewayError::Decode {
                path: path.to_path_buf(),
                reason: String::from("tag is truncated"),
            },
            _ => read_error(err),
        })?;

        let frames = parse_frames(&header, &body).map_err(decode_error)?;
        Ok(TagContents {
            version: header.version,
            frames,
        })
    }

    fn write_tag(&self, path: &Path, contents: &TagContents) -> io::Result<usize> {
        let original = fs::read(path)?;
        let audio_start = match parse_header(&original) {
            Ok(header) => header.total_len().min(original.len()),
            Err(ParseError::NoHeader) => 0,
            Err(ParseError::Malformed(reason)) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("existing tag cannot be replaced: {reason}"),
                ));
            }
        };
        let tag = render_tag(contents, self.padding)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&tag)?;
        tmp.write_all(&original[audio_start..])?;
        tmp.as_file().sync_all()?;
        fs::set_permissions(tmp.path(), fs::metadata(path)?.permissions())?;
        tmp.persist(path).map_err(|err| err.error)?;
        Ok(tag.len())
    }
}

impl PersistenceGateway for Id3FileGateway {
    fn load(&mut self, path: &Path) -> Result<TagContents, GatewayError> {
        let path = config::strip_windows_verbatim_prefix(path);
        let contents = Self::read_tag(&path)?;
        debug!(
            path = %path.display(),
            version = %contents.version,
            frames = contents.frames.len(),
            "loaded tag"
        );
        Ok(contents)
    }

    fn save(&mut self, path: &Path, contents: &TagContents) -> Result<(), GatewayError> {
        let path = config::strip_windows_verbatim_prefix(path);
        if !path.is_file() {
            return Err(GatewayError::NotFound(path));
        }

        let written = self
            .write_tag(&path, contents)
            .map_err(|source| GatewayError::Write {
                path: path.clone(),
                source,
            })?;
        info!(
            path = %path.display(),
            version = %contents.version,
            frames = contents.frames.len(),
            bytes = written,
            "saved tag"
        );
        Ok(())
    }

    fn default_version(&self) -> Id3Version {
        self.default_version
    }
}
