use std::borrow::Cow;

use encoding_rs::{Encoding, WINDOWS_1252};
use simdutf8::basic;

use super::byteorder::trim_padding;

/// Maps the header's character-set code to an encoding. Code 0 (unspecified)
/// and codes without an `encoding_rs` counterpart yield `None`.
#[must_use]
pub fn encoding_for_code(code: u8) -> Option<&'static Encoding> {
    lookup_label(code).and_then(resolve_label)
}

/// Encoding used when the header does not name a usable character set.
#[must_use]
pub const fn default_encoding() -> &'static Encoding {
    WINDOWS_1252
}

/// Decodes a fixed-width text field, trimming surrounding whitespace.
/// Borrows from `bytes` when the trimmed field is already valid UTF-8.
#[must_use]
pub fn decode_text<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    let trimmed = trim_padding(bytes);
    if trimmed.is_empty() {
        return Cow::Borrowed("");
    }
    if let Ok(text) = basic::from_utf8(trimmed) {
        return Cow::Borrowed(text);
    }
    let (decoded, _) = encoding.decode_without_bom_handling(trimmed);
    Cow::Owned(decoded.into_owned())
}

fn resolve_label(name: &str) -> Option<&'static Encoding> {
    let lower = name.to_ascii_lowercase();
    Encoding::for_label(lower.as_bytes()).or_else(|| mac_compat_encoding(&lower))
}

fn mac_compat_encoding(lower_label: &str) -> Option<&'static Encoding> {
    match lower_label {
        "macroman" => Encoding::for_label(b"macintosh"),
        "maccyrillic" | "macukraine" => Encoding::for_label(b"x-mac-cyrillic"),
        _ => None,
    }
}

const fn lookup_label(code: u8) -> Option<&'static str> {
    const ENCODING_MAP: &[(u8, &str)] = &[
        (20, "UTF-8"),
        (28, "US-ASCII"),
        (29, "ISO-8859-1"),
        (30, "ISO-8859-2"),
        (31, "ISO-8859-3"),
        (32, "ISO-8859-4"),
        (33, "ISO-8859-5"),
        (34, "ISO-8859-6"),
        (35, "ISO-8859-7"),
        (36, "ISO-8859-8"),
        (37, "ISO-8859-9"),
        (39, "ISO-8859-11"),
        (40, "ISO-8859-15"),
        (49, "CP866"),
        (51, "WINDOWS-874"),
        (60, "WINDOWS-1250"),
        (61, "WINDOWS-1251"),
        (62, "WINDOWS-1252"),
        (63, "WINDOWS-1253"),
        (64, "WINDOWS-1254"),
        (65, "WINDOWS-1255"),
        (66, "WINDOWS-1256"),
        (67, "WINDOWS-1257"),
        (68, "WINDOWS-1258"),
        (69, "MACROMAN"),
        (76, "MACUKRAINE"),
        (118, "BIG5"),
        (123, "BIG5"),
        (125, "GB18030"),
        (126, "GBK"),
        (134, "EUC-JP"),
        (136, "WINDOWS-949"),
        (138, "MS932"),
        (140, "EUC-KR"),
        (141, "WINDOWS-949"),
        (142, "WINDOWS-949"),
        (167, "ISO-2022-JP"),
        (204, "WINDOWS-1252"),
        (205, "GB18030"),
        (227, "ISO-8859-14"),
        (242, "ISO-8859-13"),
        (246, "MACCYRILLIC"),
        (248, "SHIFT_JIS"),
    ];

    let mut i = 0usize;
    while i < ENCODING_MAP.len() {
        if ENCODING_MAP[i].0 == code {
            return Some(ENCODING_MAP[i].1);
        }
        i += 1;
    }
    None
}
