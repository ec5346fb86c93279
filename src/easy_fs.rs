use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, Context, anyhow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileKind {
    Dir,
    File,
    Other
}

impl FileKind {
    /// Following symlinks.
    pub fn of_path(path: &Path) -> Option<FileKind> {
        let m = fs::metadata(path).ok()?;
        Some(if m.is_dir() {
            FileKind::Dir
        } else if m.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        })
    }
}

pub fn easy_filenames_in_dir<P>(
    path: P
) -> Result<impl Iterator<Item = Result<(OsString, FileKind)>>>
where PathBuf: From<P>
{
    let pathbuf: PathBuf = path.into();
    Ok(fs::read_dir(&pathbuf).with_context(
        || anyhow!("can't open directory for reading: {:?}",
                   pathbuf.to_string_lossy()))?
       .map(
           move |entry_result: Result<fs::DirEntry, std::io::Error>|
                                      -> Result<(OsString, FileKind)>
           {
               let entry = entry_result.with_context(
                   || anyhow!("reading directory: {:?}", pathbuf.to_string_lossy()))?;
               let filename = entry.file_name();
               let kind = FileKind::of_path(&entry.path()).unwrap_or(FileKind::Other);
               Ok((filename, kind))
           }))
}

/// The entries of a directory whose names are valid UTF-8, sorted by
/// name. Other names can't be requested through an URI anyway.
pub fn sorted_filenames_in_dir(path: &Path) -> Result<Vec<(String, FileKind)>> {
    let mut names = Vec::new();
    for entry in easy_filenames_in_dir(path)? {
        let (name, kind) = entry?;
        if let Ok(name) = name.into_string() {
            names.push((name, kind));
        }
    }
    names.sort();
    Ok(names)
}
