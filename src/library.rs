use anyhow::{Context, Result};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

const EDITABLE_EXTENSIONS: &[&str] = &["mp3"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSummary {
    pub format_label: String,
    pub duration: Duration,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
    pub channels: Option<u8>,
}

impl AudioSummary {
    pub fn duration_label(&self) -> String {
        let total = self.duration.as_secs();
        format!("{}:{:02}", total / 60, total % 60)
    }
}

/// Files in `root` whose tags can be edited, sorted by path.
pub fn list_editable_files(root: &Path, recursive: bool) -> Vec<PathBuf> {
    let root = crate::config::strip_windows_verbatim_prefix(root);
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut files: Vec<PathBuf> = WalkDir::new(&root)
        .follow_links(true)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_editable(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    debug!(root = %root.display(), count = files.len(), "listed editable files");
    files
}

pub fn audio_summary(path: &Path) -> Result<AudioSummary> {
    let stripped = crate::config::strip_windows_verbatim_prefix(path);
    let tagged_file = Probe::open(&stripped)
        .with_context(|| format!("failed to open {}", stripped.display()))?
        .read()
        .with_context(|| format!("failed to read audio properties of {}", stripped.display()))?;

    let props = tagged_file.properties();
    Ok(AudioSummary {
        format_label: format!("{:?}", tagged_file.file_type()),
        duration: props.duration(),
        bitrate_kbps: props.audio_bitrate(),
        sample_rate_hz: props.sample_rate(),
        channels: props.channels(),
    })
}

pub fn is_editable(path: &Path) -> bool {
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
    EDITABLE_EXTENSIONS
        .iter()
        .any(|supported| ext.eq_ignore_ascii_case(supported))
}
