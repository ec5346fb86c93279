//! Content types of files to be served.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Result, Context, anyhow};
use imagesize::ImageType;
use lazy_static::lazy_static;
use rouille::extension_to_mime;

pub const OCTET_STREAM: &str = "application/octet-stream";

lazy_static!{
    /// Extensions that are looked up before rouille's table: pages
    /// (including the legacy `.php` ones) are always composed as HTML.
    static ref MIME_TABLE: HashMap<&'static str, &'static str> = [
        ("html", "text/html"),
        ("htm", "text/html"),
        ("php", "text/html"),
        ("css", "text/css"),
        ("js", "application/x-javascript"),
        ("ico", "image/x-icon"),
        ("vbs", "application/x-vbs"),
    ].into_iter().collect();
}

/// How many bytes are read for sniffing.
const SNIFF_LEN: u64 = 512;

pub fn mime_from_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.to_ascii_lowercase();
    if let Some(mime) = MIME_TABLE.get(extension.as_str()) {
        return Some(mime)
    }
    // rouille appends a charset to some text types; we add our own
    match extension_to_mime(&extension).split(';').next() {
        Some(OCTET_STREAM) | None => None,
        Some(mime) => Some(mime.trim())
    }
}

fn image_mime(t: ImageType) -> Option<&'static str> {
    match t {
        ImageType::Png => Some("image/png"),
        ImageType::Jpeg => Some("image/jpeg"),
        ImageType::Gif => Some("image/gif"),
        ImageType::Webp => Some("image/webp"),
        ImageType::Bmp => Some("image/bmp"),
        ImageType::Tiff => Some("image/tiff"),
        _ => None
    }
}

/// Guess from the first bytes of a file.
pub fn sniff_mime(head: &[u8]) -> &'static str {
    if let Some(mime) = imagesize::image_type(head).ok().and_then(image_mime) {
        return mime
    }
    match std::str::from_utf8(head) {
        Ok(s) =>
            if s.trim_start().starts_with('<') {
                "text/html"
            } else {
                "text/plain"
            },
        // The cut may have split a multi-byte character.
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => "text/plain",
        Err(_) => OCTET_STREAM,
    }
}

pub fn mime_for_path(path: &Path) -> Result<&'static str> {
    if let Some(mime) = path.extension()
        .and_then(|e| e.to_str())
        .and_then(mime_from_extension)
    {
        return Ok(mime)
    }
    let mut head = Vec::new();
    std::fs::File::open(path)
        .and_then(|f| f.take(SNIFF_LEN).read_to_end(&mut head))
        .with_context(|| anyhow!("reading {path:?} to determine its type"))?;
    Ok(sniff_mime(&head))
}
