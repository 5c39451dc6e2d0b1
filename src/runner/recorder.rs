//! Hashing of an inspection's working directory.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use toto_rules::{ArtifactMap, Digests};
use walkdir::WalkDir;

/// Digest algorithm name used in recorded digest sets.
pub const HASH_ALGORITHM: &str = "sha256";

/// Errors while recording artifacts
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("invalid exclude pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("path is not inside the recorded root: {0}")]
    PathNotInRoot(String),
}

/// SHA-256 digest set of a single file.
pub fn hash_file(path: &Path) -> Result<Digests, RecordError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    let mut digests = Digests::new();
    digests.insert(HASH_ALGORITHM.to_string(), hex::encode(hasher.finalize()));
    Ok(digests)
}

/// Records every regular file below a directory as an artifact.
#[derive(Debug, Clone)]
pub struct ArtifactRecorder {
    excludes: GlobSet,
}

impl Default for ArtifactRecorder {
    fn default() -> Self {
        Self {
            excludes: GlobSet::empty(),
        }
    }
}

impl ArtifactRecorder {
    /// Create a recorder skipping paths that match any of `patterns`.
    ///
    /// A directory that matches is skipped with everything below it.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, RecordError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(
                GlobBuilder::new(pattern.as_ref())
                    .literal_separator(false)
                    .backslash_escape(false)
                    .build()?,
            );
        }

        Ok(Self {
            excludes: builder.build()?,
        })
    }

    /// Hash all regular files below `root`, keyed by forward-slash
    /// relative path. Symlinks are not followed.
    pub fn record(&self, root: &Path) -> Result<ArtifactMap, RecordError> {
        let mut artifacts = ArtifactMap::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| match relative_path(root, entry.path()) {
                Ok(rel) => rel.is_empty() || !self.excludes.is_match(&rel),
                Err(_) => true,
            });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel = relative_path(root, entry.path())?;
            artifacts.insert(rel, hash_file(entry.path())?);
        }

        tracing::debug!(root = %root.display(), count = artifacts.len(), "recorded artifacts");
        Ok(artifacts)
    }
}

fn relative_path(root: &Path, path: &Path) -> Result<String, RecordError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| RecordError::PathNotInRoot(path.display().to_string()))?;

    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
