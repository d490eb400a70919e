use crate::model::{FrameId, Id3Version, RawFrame, TagKey, TagKind, TagRecord};

const LATIN1: u8 = 0;
const UTF16_BOM: u8 = 1;
const UTF16_BE: u8 = 2;
const UTF8: u8 = 3;

/// Decodes the payload of a catalog frame into its key and text value.
///
/// Returns `None` when the payload cannot be read; such frames stay opaque.
pub(crate) fn decode_frame(raw: &RawFrame, kind: TagKind) -> Option<(TagKey, String)> {
    if raw.flags[1] != 0 {
        return None;
    }

    let (&encoding, body) = raw.data.split_first()?;
    match kind {
        TagKind::SimpleText => {
            let (value, _) = split_terminated(body, encoding);
            let text = decode_string(value, encoding)?;
            Some((TagKey::plain(raw.id.clone()), text))
        }
        TagKind::Comment => {
            if body.len() < 3 {
                return None;
            }
            let (language, rest) = body.split_at(3);
            if !language.iter().all(u8::is_ascii_graphic) {
                return None;
            }
            let language = String::from_utf8_lossy(language).into_owned();
            let (description, rest) = split_terminated(rest, encoding);
            let description = decode_string(description, encoding)?;
            let (value, _) = split_terminated(rest, encoding);
            let text = decode_string(value, encoding)?;
            Some((
                TagKey::comment(raw.id.clone(), &description, &language),
                text,
            ))
        }
    }
}

pub(crate) fn encode_record(record: &TagRecord, version: Id3Version) -> RawFrame {
    match record {
        TagRecord::SimpleText { id, text } => {
            let encoding = encoding_for(version, [text.as_str()]);
            let mut data = vec![encoding];
            data.extend(encode_string(text, encoding));
            RawFrame::new(id.clone(), data)
        }
        TagRecord::Comment {
            id,
            description,
            language,
            text,
        } => encode_comment(id, description, language, text, version),
    }
}

fn encode_comment(
    id: &FrameId,
    description: &str,
    language: &str,
    text: &str,
    version: Id3Version,
) -> RawFrame {
    let encoding = encoding_for(version, [description, text]);
    let mut data = vec![encoding];
    data.extend(language.bytes().take(3));
    data.extend(encode_string(description, encoding));
    data.extend(terminator(encoding));
    data.extend(encode_string(text, encoding));
    RawFrame::new(id.clone(), data)
}

fn encoding_for<'a>(version: Id3Version, values: impl IntoIterator<Item = &'a str>) -> u8 {
    match version {
        Id3Version::V24 => UTF8,
        Id3Version::V23 => {
            let fits_latin1 = values
                .into_iter()
                .all(|value| value.chars().all(|ch| u32::from(ch) <= 0xFF));
            if fits_latin1 { LATIN1 } else { UTF16_BOM }
        }
    }
}

fn terminator(encoding: u8) -> &'static [u8] {
    match encoding {
        UTF16_BOM | UTF16_BE => &[0, 0],
        _ => &[0],
    }
}

fn encode_string(value: &str, encoding: u8) -> Vec<u8> {
    match encoding {
        LATIN1 => value
            .chars()
            .map(|ch| u8::try_from(u32::from(ch)).unwrap_or(b'?'))
            .collect(),
        UTF16_BOM => {
            let mut out = vec![0xFF, 0xFE];
            out.extend(value.encode_utf16().flat_map(u16::to_le_bytes));
            out
        }
        UTF16_BE => value.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        _ => value.as_bytes().to_vec(),
    }
}

/// Splits at the first string terminator for `encoding`.
fn split_terminated(bytes: &[u8], encoding: u8) -> (&[u8], &[u8]) {
    match encoding {
        UTF16_BOM | UTF16_BE => {
            let end = bytes
                .chunks_exact(2)
                .position(|pair| pair == [0, 0])
                .map(|index| index * 2);
            match end {
                Some(end) => (&bytes[..end], &bytes[end + 2..]),
                None => (bytes, &[]),
            }
        }
        _ => match bytes.iter().position(|byte| *byte == 0) {
            Some(end) => (&bytes[..end], &bytes[end + 1..]),
            None => (bytes, &[]),
        },
    }
}

fn decode_string(bytes: &[u8], encoding: u8) -> Option<String> {
    match encoding {
        LATIN1 => Some(bytes.iter().map(|b| char::from(*b)).collect()),
        UTF16_BOM => Some(decode_utf16_with_bom(bytes)),
        UTF16_BE => Some(decode_utf16(bytes, true)),
        UTF8 => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn decode_utf16_with_bom(bytes: &[u8]) -> String {
    if bytes.len() >= 2 {
        if bytes[0] == 0xFE && bytes[1] == 0xFF {
            return decode_utf16(&bytes[2..], true);
        }
        if bytes[0] == 0xFF && bytes[1] == 0xFE {
            return decode_utf16(&bytes[2..], false);
        }
    }
    decode_utf16(bytes, false)
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
