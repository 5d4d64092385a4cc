use crate::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Descriptor fields, normalized. Only `title` is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub title: String,
    pub part_title: Option<String>,
    pub type_tag: Option<String>,
    pub owner_name: Option<String>,
    pub owner_id: Option<String>,
    pub avid: String,
    pub bvid: Option<String>,
    pub cover_url: Option<String>,
    pub updated_at_ms: i64,
    pub page: Option<u32>,
    pub page_width: Option<u32>,
    pub page_height: Option<u32>,
}

impl ItemMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            part_title: None,
            type_tag: None,
            owner_name: None,
            owner_id: None,
            avid: String::new(),
            bvid: None,
            cover_url: None,
            updated_at_ms: 0,
            page: None,
            page_width: None,
            page_height: None,
        }
    }

    /// `(width, height)` when both are known and non-zero.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.page_width, self.page_height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

// Cache writers are inconsistent about numbers vs strings for ids.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn into_text(self) -> Option<String> {
        let text = match self {
            Loose::Int(v) => v.to_string(),
            Loose::Float(v) => format!("{v}"),
            Loose::Text(v) => v.trim().to_string(),
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn into_u32(self) -> Option<u32> {
        match self {
            Loose::Int(v) => u32::try_from(v).ok(),
            Loose::Float(v) if v.is_finite() && v >= 0.0 => Some(v.round() as u32),
            Loose::Float(_) => None,
            Loose::Text(v) => v.trim().parse().ok(),
        }
    }

    fn into_i64(self) -> Option<i64> {
        match self {
            Loose::Int(v) => Some(v),
            Loose::Float(v) if v.is_finite() => Some(v as i64),
            Loose::Float(_) => None,
            Loose::Text(v) => v.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    title: String,
    #[serde(default)]
    type_tag: Option<Loose>,
    #[serde(default)]
    owner_id: Option<Loose>,
    #[serde(default)]
    owner_name: Option<String>,
    #[serde(default)]
    avid: Option<Loose>,
    #[serde(default)]
    bvid: Option<String>,
    #[serde(default)]
    cover: Option<String>,
    #[serde(default)]
    time_update_stamp: Option<Loose>,
    #[serde(default)]
    time_create_stamp: Option<Loose>,
    #[serde(default)]
    page_data: Option<RawPageData>,
    #[serde(default)]
    ep: Option<RawEpisode>,
}

#[derive(Debug, Deserialize)]
struct RawPageData {
    #[serde(default)]
    part: Option<String>,
    #[serde(default)]
    page: Option<Loose>,
    #[serde(default)]
    width: Option<Loose>,
    #[serde(default)]
    height: Option<Loose>,
}

#[derive(Debug, Deserialize)]
struct RawEpisode {
    #[serde(default)]
    index: Option<Loose>,
    #[serde(default)]
    index_title: Option<String>,
    #[serde(default)]
    av_id: Option<Loose>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let t = v.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

impl From<RawEntry> for ItemMetadata {
    fn from(raw: RawEntry) -> Self {
        let (part, page, width, height) = match raw.page_data {
            Some(p) => (
                non_blank(p.part),
                p.page.and_then(Loose::into_u32),
                p.width.and_then(Loose::into_u32),
                p.height.and_then(Loose::into_u32),
            ),
            None => (None, None, None, None),
        };
        let (ep_title, ep_index, ep_avid) = match raw.ep {
            Some(ep) => (
                non_blank(ep.index_title),
                ep.index.and_then(Loose::into_u32),
                ep.av_id.and_then(Loose::into_text),
            ),
            None => (None, None, None),
        };

        ItemMetadata {
            title: raw.title,
            part_title: part.or(ep_title),
            type_tag: raw.type_tag.and_then(Loose::into_text),
            owner_name: non_blank(raw.owner_name),
            owner_id: raw.owner_id.and_then(Loose::into_text),
            avid: raw
                .avid
                .and_then(Loose::into_text)
                .or(ep_avid)
                .unwrap_or_default(),
            bvid: non_blank(raw.bvid),
            cover_url: non_blank(raw.cover),
            updated_at_ms: raw
                .time_update_stamp
                .and_then(Loose::into_i64)
                .or_else(|| raw.time_create_stamp.and_then(Loose::into_i64))
                .unwrap_or(0),
            page: page.or(ep_index),
            page_width: width,
            page_height: height,
        }
    }
}

pub fn parse_metadata(bytes: &[u8]) -> std::result::Result<ItemMetadata, serde_json::Error> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let raw: RawEntry = serde_json::from_slice(bytes)?;
    Ok(raw.into())
}

/// Reads a descriptor. Missing, unreadable and malformed files all map to `MetadataInvalid`.
pub fn read_metadata(path: &Path) -> Result<ItemMetadata> {
    let bytes = std::fs::read(path).map_err(|e| ConvertError::MetadataInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_metadata(&bytes).map_err(|e| ConvertError::MetadataInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_video_entry_with_numeric_ids() {
        let json = r#"{
            "avid": 170001,
            "bvid": "BV17x411w7KC",
            "title": "Show A",
            "type_tag": "80",
            "cover": "http://i0.hdslb.com/bfs/archive/cover.jpg",
            "owner_id": 2,
            "owner_name": "someone",
            "time_update_stamp": 1600000000000,
            "page_data": { "page": 2, "part": "Episode 2", "width": 1920, "height": 1080 }
        }"#;
        let meta = parse_metadata(json.as_bytes()).expect("parse");
        assert_eq!(meta.title, "Show A");
        assert_eq!(meta.part_title.as_deref(), Some("Episode 2"));
        assert_eq!(meta.avid, "170001");
        assert_eq!(meta.owner_id.as_deref(), Some("2"));
        assert_eq!(meta.type_tag.as_deref(), Some("80"));
        assert_eq!(meta.updated_at_ms, 1_600_000_000_000);
        assert_eq!(meta.page, Some(2));
        assert_eq!(meta.dimensions(), Some((1920, 1080)));
    }

    #[test]
    fn episode_cache_falls_back_to_ep_fields() {
        let json = r#"{
            "title": "Some Series",
            "ep": { "av_id": 42, "index": "3", "index_title": "The Third" },
            "time_create_stamp": 1500000000000
        }"#;
        let meta = parse_metadata(json.as_bytes()).expect("parse");
        assert_eq!(meta.part_title.as_deref(), Some("The Third"));
        assert_eq!(meta.avid, "42");
        assert_eq!(meta.page, Some(3));
        assert_eq!(meta.updated_at_ms, 1_500_000_000_000);
        assert_eq!(meta.dimensions(), None);
    }

    #[test]
    fn optional_fields_degrade_to_none() {
        let meta = parse_metadata(br#"{ "title": "Only Title", "page_data": { "part": "  " } }"#)
            .expect("parse");
        assert_eq!(meta.part_title, None);
        assert_eq!(meta.owner_id, None);
        assert_eq!(meta.cover_url, None);
        assert_eq!(meta.avid, "");
        assert_eq!(meta.updated_at_ms, 0);
    }

    #[test]
    fn missing_title_is_rejected() {
        assert!(parse_metadata(br#"{ "avid": 1 }"#).is_err());
    }

    #[test]
    fn byte_order_mark_is_tolerated() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(br#"{ "title": "BOM" }"#);
        assert_eq!(parse_metadata(&bytes).expect("parse").title, "BOM");
    }

    #[test]
    fn read_errors_are_metadata_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("entry.json");
        assert!(matches!(
            read_metadata(&missing),
            Err(ConvertError::MetadataInvalid { .. })
        ));

        std::fs::write(&missing, "{ \"title\": ").expect("write");
        let err = read_metadata(&missing).expect_err("malformed");
        assert!(matches!(err, ConvertError::MetadataInvalid { .. }));
        assert!(!err.is_fatal());
    }
}
