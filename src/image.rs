//! Serving images at a requested width.

use std::fmt::Debug;
use std::path::Path;

use anyhow::{Result, Context, anyhow};

use crate::note;

/// Produces the bytes of an image scaled to at most `width` pixels
/// wide. `Ok(None)` means the resizer can't do it, the original file
/// is then served as is.
pub trait ImageResizer: Debug + Send + Sync {
    fn resize(&self, path: &Path, mime: &str, width: Option<u32>) -> Result<Option<Vec<u8>>>;
}

/// The formats that can be served through a resizer.
pub const RESIZABLE_MIMES: &[&str] = &["image/png", "image/jpeg", "image/gif", "image/webp"];

/// Serves images unchanged when they are already narrow enough;
/// declines when an actual downscale would be needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SizeCheckingResizer;

impl ImageResizer for SizeCheckingResizer {
    fn resize(&self, path: &Path, mime: &str, width: Option<u32>) -> Result<Option<Vec<u8>>> {
        if !RESIZABLE_MIMES.contains(&mime) {
            return Ok(None)
        }
        let size = match imagesize::size(path) {
            Ok(size) => size,
            Err(e) => {
                note!("can't get size of image {path:?}, serving it as is: {e}");
                return Ok(None)
            }
        };
        if let Some(width) = width {
            if (width as usize) < size.width {
                note!("no scaler available to reduce {path:?} from {} to {width}",
                      size.width);
                return Ok(None)
            }
        }
        let data = std::fs::read(path).with_context(
            || anyhow!("reading image {path:?}"))?;
        Ok(Some(data))
    }
}

/// The width requested through the query value: positive integers
/// only, anything else means the original width.
pub fn requested_width(value: Option<&str>) -> Option<u32> {
    value?.trim().parse().ok().filter(|w| *w > 0)
}
