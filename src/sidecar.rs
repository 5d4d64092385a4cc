//! Media-library sidecar (`.nfo`) and cover image for a merged item.

use crate::metadata::ItemMetadata;
use crate::{ConvertError, Result};
use chrono::{DateTime, Datelike, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info};

pub const UNKNOWN_CREDITS: &str = "unknown";
const SOURCE_VIDEO_URL_BASE: &str = "https://www.bilibili.com/video/";
const COVER_DOWNLOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HTTP_USER_AGENT: &str = concat!("bilimerge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarDocument {
    pub title: String,
    pub credits: String,
    pub year: Option<i32>,
    pub unique_id: String,
    pub aired: Option<String>,
    pub plot: String,
}

#[derive(Debug, Clone)]
pub struct SidecarReport {
    pub document_path: PathBuf,
    /// Set when a cover is present on disk after the call.
    pub cover_path: Option<PathBuf>,
}

pub fn credits_for(meta: &ItemMetadata) -> String {
    match meta.owner_id.as_deref() {
        Some(id) => {
            let name = meta.owner_name.as_deref().unwrap_or(UNKNOWN_CREDITS);
            format!("{name}[{id}]")
        }
        None => UNKNOWN_CREDITS.to_string(),
    }
}

fn source_id(meta: &ItemMetadata) -> String {
    if !meta.avid.is_empty() {
        return format!("av{}", meta.avid);
    }
    match meta.bvid.as_deref() {
        Some(bvid) => bvid.to_string(),
        None => UNKNOWN_CREDITS.to_string(),
    }
}

pub fn build_document(meta: &ItemMetadata) -> SidecarDocument {
    let released: Option<DateTime<Utc>> = if meta.updated_at_ms > 0 {
        DateTime::<Utc>::from_timestamp_millis(meta.updated_at_ms)
    } else {
        None
    };
    let title = match meta.part_title.as_deref() {
        Some(part) if part != meta.title => format!("{} - {part}", meta.title),
        _ => meta.title.clone(),
    };
    let unique_id = source_id(meta);

    SidecarDocument {
        plot: format!("{SOURCE_VIDEO_URL_BASE}{unique_id}\n{title}"),
        credits: credits_for(meta),
        year: released.map(|d| d.year()),
        aired: released.map(|d| d.format("%Y-%m-%d").to_string()),
        unique_id,
        title,
    }
}

pub fn render(doc: &SidecarDocument) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n");
    out.push_str("<movie>\n");
    push_element(&mut out, "title", &doc.title);
    push_element(&mut out, "credits", &doc.credits);
    if let Some(year) = doc.year {
        push_element(&mut out, "year", &year.to_string());
    }
    out.push_str(&format!(
        "  <uniqueid type=\"bilibili\" default=\"true\">{}</uniqueid>\n",
        escape_xml(&doc.unique_id)
    ));
    if let Some(aired) = &doc.aired {
        push_element(&mut out, "premiered", aired);
        push_element(&mut out, "aired", aired);
    }
    push_element(&mut out, "plot", &doc.plot);
    out.push_str("</movie>\n");
    out
}

fn push_element(out: &mut String, tag: &str, value: &str) {
    out.push_str(&format!("  <{tag}>{}</{tag}>\n", escape_xml(value)));
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && c != '\n' && c != '\t' => {}
            c => out.push(c),
        }
    }
    out
}

/// Writes the document, then tries the cover. A failed cover download is logged and
/// reported through `cover_path: None`; only a failed document write is an error.
pub fn write_sidecar(
    meta: &ItemMetadata,
    document_path: &Path,
    cover_path: &Path,
) -> Result<SidecarReport> {
    if let Some(parent) = document_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let doc = build_document(meta);
    std::fs::write(document_path, render(&doc))?;
    debug!(path = %document_path.display(), "sidecar written");

    let cover_path = match meta.cover_url.as_deref() {
        None => None,
        Some(_) if cover_path.exists() => Some(cover_path.to_path_buf()),
        Some(url) => match download_cover(url, cover_path) {
            Ok(()) => {
                info!(path = %cover_path.display(), "cover downloaded");
                Some(cover_path.to_path_buf())
            }
            Err(e) => {
                error!(url, error = %e, "cover download failed");
                None
            }
        },
    };

    Ok(SidecarReport {
        document_path: document_path.to_path_buf(),
        cover_path,
    })
}

/// Extension for the cover file, taken from the URL path when it looks like an image.
pub fn cover_extension(url: Option<&str>) -> String {
    let ext = url
        .and_then(|u| url::Url::parse(u).ok())
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
        });
    match ext.as_deref() {
        Some(e @ ("jpg" | "jpeg" | "png" | "webp" | "gif")) => e.to_string(),
        _ => "jpg".to_string(),
    }
}

pub fn download_cover(url: &str, destination: &Path) -> Result<()> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(COVER_DOWNLOAD_TIMEOUT_SECS)))
        .build()
        .into();

    let resp = agent
        .get(url)
        .header("User-Agent", DEFAULT_HTTP_USER_AGENT)
        .call()
        .map_err(|e| ConvertError::Network(format!("cover request failed: {e}")))?;
    let status = resp.status();
    if status.as_u16() != 200 {
        return Err(ConvertError::Network(format!(
            "cover request returned status={status}"
        )));
    }

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = destination.with_extension("download");
    let copied = {
        let mut reader = resp.into_body().into_reader();
        let mut file = std::fs::File::create(&tmp_path)?;
        std::io::copy(&mut reader, &mut file).and_then(|_| file.flush())
    };
    if let Err(e) = copied {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(ConvertError::Network(format!("cover body read failed: {e}")));
    }
    std::fs::rename(&tmp_path, destination)?;
    Ok(())
}
