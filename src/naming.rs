use crate::metadata::ItemMetadata;
use regex::Regex;
use std::sync::OnceLock;

pub const UNKNOWN_TITLE: &str = "unknown title";
pub const UNTITLED: &str = "untitled";
/// Byte budget for one path component before any `-P{n}` suffix and extension are added.
pub const MAX_NAME_BYTES: usize = 200;

static ILLEGAL_CHARS: OnceLock<Regex> = OnceLock::new();

fn illegal_chars() -> &'static Regex {
    ILLEGAL_CHARS.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap())
}

/// Maps `text` to a filesystem-safe name of at most `max_len` characters.
///
/// Path-illegal characters become spaces; trailing spaces and periods are removed both
/// before and after truncation. The result can be empty, see [`display_name`].
pub fn sanitize(text: &str, max_len: usize) -> String {
    let replaced = illegal_chars().replace_all(text, " ");
    let trimmed = trim_trailing(&replaced);
    let truncated: String = trimmed.chars().take(max_len).collect();
    trim_trailing(&truncated).to_string()
}

fn trim_trailing(text: &str) -> &str {
    text.trim_end_matches([' ', '.'])
}

/// Cuts `name` to at most `max_bytes` UTF-8 bytes on a char boundary, then re-trims.
pub fn fit_bytes(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let mut end = max_bytes;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    trim_trailing(&name[..end]).to_string()
}

/// Like [`sanitize`] but never blank: whitespace-only results become [`UNTITLED`].
pub fn display_name(text: &str, max_len: usize) -> String {
    let name = sanitize(text, max_len);
    if name.trim().is_empty() {
        UNTITLED.to_string()
    } else {
        name
    }
}

/// Episode/part title for an item: the part title when present, else the top-level title.
pub fn resolve_title(metadata: Option<&ItemMetadata>, max_len: usize) -> String {
    let Some(meta) = metadata else {
        return UNKNOWN_TITLE.to_string();
    };
    match meta.part_title.as_deref() {
        Some(part) => display_name(part, max_len),
        None => display_name(&meta.title, max_len),
    }
}
