//! Content type detection from leading bytes.
//!
//! Implements the signature tables of the WHATWG MIME sniffing algorithm
//! for the types a file host sees in practice. Only the first
//! [`SNIFF_LEN`] bytes are considered.

/// Number of leading bytes inspected.
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";
const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Byte pattern with a mask; `mask[i] & data[i] == pattern[i]`.
struct Masked {
    mask: &'static [u8],
    pattern: &'static [u8],
    skip_ws: bool,
    content_type: &'static str,
}

impl Masked {
    fn matches(&self, data: &[u8]) -> bool {
        let data = if self.skip_ws {
            skip_whitespace(data)
        } else {
            data
        };
        if data.len() < self.pattern.len() {
            return false;
        }
        self.pattern
            .iter()
            .zip(self.mask)
            .zip(data)
            .all(|((p, m), d)| d & m == *p)
    }
}

const EXACT: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", PLAIN_TEXT),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b".snd", "audio/basic"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"ID3", "audio/mpeg"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"\x52\x61\x72\x20\x1A\x07\x00", "application/x-rar-compressed"),
    (b"\x52\x61\x72\x21\x1A\x07\x00", "application/x-rar-compressed"),
    (b"\x50\x4B\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    (b"\x00\x61\x73\x6D", "application/wasm"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"\x00\x01\x00\x00", "font/ttf"),
    (b"OTTO", "font/otf"),
    (b"ttcf", "font/collection"),
];

const MASKED: &[Masked] = &[
    Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WEBPVP",
        skip_ws: false,
        content_type: "image/webp",
    },
    Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00WAVE",
        skip_ws: false,
        content_type: "audio/wave",
    },
    Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF",
        pattern: b"RIFF\x00\x00\x00\x00AVI ",
        skip_ws: false,
        content_type: "video/avi",
    },
    Masked {
        mask: b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\x00\xFF",
        pattern: b"FORM\x00\x00\x00\x00AIFF\x00\x00",
        skip_ws: false,
        content_type: "audio/aiff",
    },
    Masked {
        mask: b"\xFF\xFF\xFF\xFF\xFF",
        pattern: b"<?xml",
        skip_ws: true,
        content_type: "text/xml; charset=utf-8",
    },
];

/// HTML openers, matched case-insensitively and followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn is_html(data: &[u8]) -> bool {
    let data = skip_whitespace(data);
    HTML_TAGS.iter().any(|tag| {
        if data.len() < tag.len() + 1 {
            return false;
        }
        let head_matches = tag
            .iter()
            .zip(data)
            .all(|(t, d)| d.to_ascii_uppercase() == *t);
        head_matches && matches!(data[tag.len()], b' ' | b'>')
    })
}

fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size % 4 != 0 || data.len() < box_size || &data[4..8] != b"ftyp" {
        return false;
    }
    // Major brand, then compatible brands after the minor version.
    std::iter::once(8)
        .chain((16..box_size).step_by(4))
        .any(|i| data.get(i..i + 3) == Some(b"mp4".as_slice()))
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Detect the content type of `data`.
///
/// Always returns a valid MIME type; unknown binary data is
/// `application/octet-stream` and unknown text is UTF-8 plain text.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if is_html(data) {
        return "text/html; charset=utf-8";
    }
    if let Some(m) = MASKED.iter().find(|m| m.matches(data)) {
        return m.content_type;
    }
    if let Some((_, ct)) = EXACT.iter().find(|(sig, _)| data.starts_with(sig)) {
        return *ct;
    }
    if is_mp4(data) {
        return "video/mp4";
    }
    if data.iter().copied().any(is_binary_byte) {
        return OCTET_STREAM;
    }
    PLAIN_TEXT
}
