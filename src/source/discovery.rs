//! Recursive discovery of CTF trace directories.

use crate::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the metadata stream file that marks a CTF trace directory.
pub const METADATA_FILENAME: &str = "metadata";

/// A discovered CTF trace directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredTrace {
    /// Canonical absolute path of the trace directory.
    pub path: PathBuf,
    /// Display name: the path with the longest common prefix stripped.
    pub name: String,
}

/// True when `path` is a CTF trace directory, i.e. contains a regular
/// `metadata` file.
pub fn is_ctf_trace_dir(path: &Path) -> bool {
    path.join(METADATA_FILENAME).is_file()
}

/// Recursively finds every CTF trace directory under `root` and derives a
/// unique display name for each.
///
/// A trace directory is not descended into: a CTF trace cannot contain
/// another CTF trace. Permission-denied subdirectories are skipped;
/// anything wrong with `root` itself is fatal, as is an empty result.
pub fn discover(root: &Path) -> Result<Vec<DiscoveredTrace>, Error> {
    let root = fs::canonicalize(root).map_err(|source| Error::Io {
        path: root.to_path_buf(),
        source,
    })?;
    if root == Path::new("/") {
        return Err(Error::RootIsFilesystemRoot);
    }

    let mut trace_paths = Vec::new();
    find_traces(&root, &mut trace_paths, true)?;
    if trace_paths.is_empty() {
        return Err(Error::NoTracesFound(root));
    }

    let paths: Vec<String> = trace_paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let strip = common_prefix_strip_len(&paths);
    Ok(trace_paths
        .into_iter()
        .zip(paths)
        .map(|(path, as_str)| DiscoveredTrace {
            path,
            name: as_str[strip..].to_string(),
        })
        .collect())
}

fn find_traces(path: &Path, traces: &mut Vec<PathBuf>, is_root: bool) -> Result<(), Error> {
    if is_ctf_trace_dir(path) {
        debug!("Found CTF trace directory `{}`", path.display());
        traces.push(path.to_path_buf());
        return Ok(());
    }
    if !path.is_dir() {
        return Ok(());
    }

    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && !is_root => {
            debug!("Skipping unreadable directory `{}`. {e}", path.display());
            return Ok(());
        }
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        find_traces(&entry.path(), traces, false)?;
    }
    Ok(())
}

/// Number of leading bytes shared by every path up to and including the
/// last common `/`. Canonical paths never end with a slash, so stripping
/// through a common slash can never empty a name.
fn common_prefix_strip_len(paths: &[String]) -> usize {
    let mut strip = 0;
    let mut at = 0;
    loop {
        let mut common = None;
        for path in paths {
            match path.as_bytes().get(at) {
                None => return strip,
                Some(&b) => match common {
                    None => common = Some(b),
                    Some(c) if c != b => return strip,
                    Some(_) => {}
                },
            }
        }
        if common == Some(b'/') {
            strip = at + 1;
        }
        at += 1;
    }
}
