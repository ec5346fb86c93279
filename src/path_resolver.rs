//! Mapping request URIs to files below the public root.

//! Names are matched case-insensitively on every platform: each
//! segment is looked up in a listing of its directory, preferring an
//! exact match.

use std::path::{Path, PathBuf};

use crate::easy_fs::{sorted_filenames_in_dir, FileKind};
use crate::interrupt::{Interrupt, Flow};
use crate::markup::serialize::html_escape;
use crate::url_encoding::url_decode_lenient;
use crate::note;

/// Removes "." and empty segments and resolves "..". None if ".."
/// would leave the root.
pub fn canonicalize_path<'s, S>(path: &'s [S]) -> Option<Vec<&'s str>>
where S: AsRef<str> + 's
{
    let mut out = Vec::new();
    for segment in path {
        let segment = segment.as_ref();
        match segment {
            "." => (),
            ".." =>
                if out.pop().is_none() {
                    return None
                },
            // multiple slashes to one
            "" => (),
            _ => out.push(segment)
        }
    }
    Some(out)
}

/// The path segments of `uri`: without query and fragment,
/// percent-decoded, lowercased, HTML escaped, canonicalized, and
/// with `index.php` segments removed. None if the path climbs above
/// the root.
pub fn normalize_uri(uri: &str) -> Option<Vec<String>> {
    let path = uri.split(['?', '#']).next().unwrap_or("");
    let path = html_escape(&url_decode_lenient(path).to_lowercase());
    let segments: Vec<&str> = path.split('/').collect();
    Some(canonicalize_path(&segments)?
         .into_iter()
         .filter(|s| *s != "index.php")
         .map(String::from)
         .collect())
}

/// Find the entry of `dir` named `name`, ignoring case. An exact
/// match wins, otherwise the first one in sorted order.
pub fn find_entry_ignoring_case(dir: &Path, name: &str) -> Option<(String, FileKind)> {
    let entries = sorted_filenames_in_dir(dir).ok()?;
    let mut found = None;
    for (entry, kind) in entries {
        if entry == name {
            return Some((entry, kind))
        }
        if found.is_none() && entry.to_lowercase() == name.to_lowercase() {
            found = Some((entry, kind));
        }
    }
    found
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    public_root: PathBuf,
    index_file: String,
    route_file: String,
}

impl PathResolver {
    pub fn new(public_root: impl Into<PathBuf>, index_file: &str, route_file: &str) -> Self {
        PathResolver {
            public_root: public_root.into(),
            index_file: index_file.into(),
            route_file: route_file.into(),
        }
    }

    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    /// The physical path `uri` denotes, with existing entries spelled
    /// as on disk. The path need not exist.
    pub fn locate(&self, uri: &str) -> Flow<PathBuf> {
        let segments = normalize_uri(uri).ok_or_else(
            || Interrupt::NotFound(uri.into()))?;
        let mut path = self.public_root.clone();
        let mut exists = true;
        for segment in &segments {
            if exists {
                if let Some((entry, _)) = find_entry_ignoring_case(&path, segment) {
                    path.push(entry);
                    continue
                }
                exists = false;
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// The file to serve for a located path: directories get the
    /// index file, the name must exist (ignoring case), and route
    /// files are never served.
    pub fn resolve_located(&self, located: &Path) -> Flow<PathBuf> {
        let not_found = || Interrupt::NotFound(located.to_string_lossy().into_owned());
        let path = if located.is_dir() {
            located.join(&self.index_file)
        } else {
            located.to_path_buf()
        };
        let (dir, name) = match (path.parent(), path.file_name().and_then(|n| n.to_str())) {
            (Some(dir), Some(name)) => (dir, name),
            _ => return Err(not_found())
        };
        let (entry, kind) = find_entry_ignoring_case(dir, name).ok_or_else(not_found)?;
        if kind != FileKind::File {
            return Err(not_found())
        }
        if entry.eq_ignore_ascii_case(&self.route_file) {
            note!("refusing to serve route file {:?}", path);
            return Err(not_found())
        }
        Ok(dir.join(entry))
    }

    pub fn resolve(&self, uri: &str) -> Flow<PathBuf> {
        let located = self.locate(uri)?;
        self.resolve_located(&located)
    }
}
