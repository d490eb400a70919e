use crate::catalog::TagCatalog;
use crate::config::{self, EditorSettings};
use crate::gateway::PersistenceGateway;
use crate::library;
use crate::model::TagEntry;
use crate::session::{EditSession, LoadOutcome, SessionError};
use anyhow::{Context, Result, bail};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAX_KEY_WIDTH: usize = 30;

const EDITOR_HELP: &str = "\
commands:
  ls                     list tags of the open file
  add <key> <value>      add a tag (COMM:<description>:<lng> for comments)
  set <key> <value>      change the value of an existing tag
  rm <key>               delete a tag
  open <path>            open another file
  save                   write tags back to the open file
  saveas <path>          write tags to another existing file
  tags                   list the tags this editor can create
  help                   show this text
  quit                   leave the editor";

/// Label shown for a key. Editable keys are printed in full so they can be
/// typed back; long unsupported keys are shortened to their frame id.
pub fn key_label(entry: &TagEntry) -> String {
    let key = entry.key().to_string();
    let length = key.chars().count();
    match entry {
        TagEntry::Unsupported { .. } if length > MAX_KEY_WIDTH => {
            format!("{}[length={length}]", entry.key().id)
        }
        _ => key,
    }
}

pub fn render_entries(entries: &[TagEntry]) -> String {
    let catalog = TagCatalog::global();
    let mut out = String::new();
    for entry in entries {
        let description = catalog.lookup(entry.key().id.as_str()).description;
        let value = match entry {
            TagEntry::Record(record) => record.value().to_string(),
            TagEntry::Unsupported { size, .. } => {
                format!("{} ({size} bytes)", TagEntry::UNSUPPORTED_LABEL)
            }
        };
        out.push_str(&format!(
            "{:<width$}  {value}  [{description}]\n",
            key_label(entry),
            width = MAX_KEY_WIDTH
        ));
    }
    out
}

pub fn print_catalog(out: &mut impl Write) -> Result<()> {
    write!(out, "{}", TagCatalog::global().help_text())?;
    Ok(())
}

pub fn list_directory(
    settings: &mut EditorSettings,
    dir: Option<&Path>,
    recursive: bool,
    out: &mut impl Write,
) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => settings
            .last_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    for file in library::list_editable_files(&dir, recursive) {
        writeln!(out, "{}", file.display())?;
    }
    config::remember_directory(settings, &dir);
    Ok(())
}

pub fn show_file<G: PersistenceGateway>(
    session: &mut EditSession<G>,
    path: &Path,
    out: &mut impl Write,
) -> Result<()> {
    open_file(session, path, out)?;
    match library::audio_summary(path) {
        Ok(summary) => writeln!(
            out,
            "{} {} {} kbps {} Hz",
            summary.format_label,
            summary.duration_label(),
            summary.bitrate_kbps.unwrap_or_default(),
            summary.sample_rate_hz.unwrap_or_default()
        )?,
        Err(err) => debug!("no audio properties: {err:#}"),
    }
    write!(out, "{}", render_entries(&session.list()))?;
    Ok(())
}

/// Adds the tag when missing, otherwise updates it, then saves.
pub fn set_tag<G: PersistenceGateway>(
    session: &mut EditSession<G>,
    path: &Path,
    key: &str,
    value: &str,
) -> Result<()> {
    session
        .load(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let exists = session
        .collection()
        .is_some_and(|collection| collection.contains(key));
    if exists {
        session.update(key, value)?;
    } else {
        session.add(key, value)?;
    }
    session.save()?;
    Ok(())
}

pub fn remove_tag<G: PersistenceGateway>(
    session: &mut EditSession<G>,
    path: &Path,
    key: &str,
) -> Result<()> {
    session
        .load(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    session.remove(key)?;
    session.save()?;
    Ok(())
}

fn open_file<G: PersistenceGateway>(
    session: &mut EditSession<G>,
    path: &Path,
    out: &mut impl Write,
) -> Result<()> {
    match session.load_discarding(path)? {
        LoadOutcome::Loaded { frames } => {
            writeln!(out, "{}: {frames} frames", path.display())?;
        }
        LoadOutcome::NoHeaderFound => {
            writeln!(out, "{}: no tag yet, starting empty", path.display())?;
        }
    }
    Ok(())
}

/// Interactive editing loop over `input`, used by `tagdeck edit`.
///
/// Unsaved edits are only dropped after an explicit `y` answer.
pub fn run_editor<G: PersistenceGateway>(
    session: &mut EditSession<G>,
    settings: &mut EditorSettings,
    input: impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next().transpose()? else {
            if session.can_discard() {
                break;
            }
            writeln!(out)?;
            let path = session.path().map(Path::to_path_buf).unwrap_or_default();
            warn!(path = %path.display(), "input ended with unsaved changes");
            bail!("input ended with unsaved changes in {}", path.display());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let result: Result<()> = match command {
            "quit" | "exit" => {
                if session.can_discard() || confirm_discard(&mut lines, out)? {
                    break;
                }
                Ok(())
            }
            "help" => writeln!(out, "{EDITOR_HELP}").map_err(Into::into),
            "tags" => print_catalog(out),
            "ls" => write!(out, "{}", render_entries(&session.list())).map_err(Into::into),
            "open" => {
                if rest.is_empty() {
                    writeln!(out, "usage: open <path>")?;
                    continue;
                }
                if !session.can_discard() && !confirm_discard(&mut lines, out)? {
                    continue;
                }
                let path = PathBuf::from(rest);
                let opened = open_file(session, &path, out);
                if opened.is_ok() {
                    config::remember_directory(settings, &path);
                }
                opened
            }
            "add" | "set" => {
                let Some((key, value)) = split_key_value(rest) else {
                    writeln!(out, "usage: {command} <key> <value>")?;
                    continue;
                };
                let edited = if command == "add" {
                    session.add(key, value).map(|_| ())
                } else {
                    session.update(key, value)
                };
                edited.map_err(Into::into)
            }
            "rm" => session.remove(rest).map(|_| ()).map_err(Into::into),
            "save" => session.save().map_err(Into::into),
            "saveas" => session.save_as(Path::new(rest)).map_err(Into::into),
            other => {
                writeln!(out, "unknown command {other}, try help")?;
                continue;
            }
        };

        if let Err(err) = result {
            report(out, &err)?;
        }
    }
    Ok(())
}

fn split_key_value(rest: &str) -> Option<(&str, &str)> {
    let key_end = comment_key_end(rest)
        .or_else(|| rest.find(char::is_whitespace))
        .unwrap_or(rest.len());
    let (key, value) = rest.split_at(key_end);
    (!key.is_empty()).then_some((key, value.trim()))
}

/// End of an `ID:<description>:<lng>` key, whose description may hold spaces.
/// The key ends at the first `:<lng>` followed by whitespace or end of input.
fn comment_key_end(rest: &str) -> Option<usize> {
    let head = rest.split(char::is_whitespace).next()?;
    let first = head.find(':')?;
    let bytes = rest.as_bytes();
    rest[first + 1..]
        .match_indices(':')
        .map(|(offset, _)| first + 1 + offset + 4)
        .find(|&end| {
            end <= bytes.len()
                && bytes[end - 3..end].iter().all(u8::is_ascii_alphabetic)
                && rest[end..].chars().next().is_none_or(char::is_whitespace)
        })
}

fn confirm_discard(
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
    out: &mut impl Write,
) -> Result<bool> {
    write!(out, "Unsaved changes. Discard changes? [y/N] ")?;
    out.flush()?;
    let answer = lines.next().transpose()?.unwrap_or_default();
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn report(out: &mut impl Write, err: &anyhow::Error) -> Result<()> {
    match err.downcast_ref::<SessionError>() {
        Some(SessionError::Gateway(inner)) => warn!("{inner:#}"),
        _ => debug!("{err:#}"),
    }
    writeln!(out, "error: {err:#}")?;
    Ok(())
}
