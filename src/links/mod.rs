//! Link discovery and resolution.
//!
//! Link files are named `<step-name>.<keyid-prefix>.link`, where the prefix
//! is the first eight hex characters of the signer's keyid. A step's
//! candidate links are those recording the step's name whose file prefix
//! belongs to one of the step's authorized keys.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::envelope::Envelope;
use crate::error::VerifyError;
use crate::metadata::{Link, Step};

/// File extension of link files.
pub const LINK_EXTENSION: &str = "link";

/// A link envelope together with its decoded payload.
#[derive(Debug, Clone)]
pub struct LoadedLink {
    /// File the link was read from, if any
    pub source: Option<PathBuf>,

    /// Keyid prefix taken from the file name
    pub keyid_prefix: Option<String>,

    pub envelope: Envelope,

    pub link: Link,
}

impl LoadedLink {
    /// Wrap an in-memory envelope.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, VerifyError> {
        let link = Link::from_envelope(&envelope)?;
        Ok(Self {
            source: None,
            keyid_prefix: None,
            envelope,
            link,
        })
    }

    /// Load a link file, checking that its name matches its payload.
    pub fn from_file(path: &Path) -> Result<Self, VerifyError> {
        let load = || -> Result<Self, VerifyError> {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let (step_name, keyid_prefix) = parse_link_file_name(&file_name);

            let envelope = Envelope::from_file(path)?;
            let link = Link::from_envelope(&envelope)?;
            if link.name != step_name {
                return Err(VerifyError::LinkNameMismatch {
                    file: file_name,
                    expected: step_name,
                    actual: link.name,
                });
            }

            Ok(Self {
                source: Some(path.to_path_buf()),
                keyid_prefix,
                envelope,
                link,
            })
        };

        load().map_err(|e| VerifyError::LinkLoad {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }

    /// Short description for logs and reports.
    pub fn label(&self) -> String {
        match &self.source {
            Some(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            None => format!("{} (in memory)", self.link.name),
        }
    }
}

/// Split `clone.776a00e2.link` into `("clone", Some("776a00e2"))`.
///
/// Step names may contain dots; only the last component before the
/// extension is taken as the prefix.
pub fn parse_link_file_name(file_name: &str) -> (String, Option<String>) {
    let stem = file_name
        .strip_suffix(&format!(".{}", LINK_EXTENSION))
        .unwrap_or(file_name);
    match stem.rsplit_once('.') {
        Some((name, prefix)) if !name.is_empty() && !prefix.is_empty() => {
            (name.to_string(), Some(prefix.to_string()))
        }
        _ => (stem.to_string(), None),
    }
}

/// The links available to a verification run.
#[derive(Debug, Clone, Default)]
pub struct LinkStore {
    links: Vec<LoadedLink>,
}

impl LinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, link: LoadedLink) {
        self.links.push(link);
    }

    /// Load every `*.link` file directly inside `dir`, in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Self, VerifyError> {
        let mut store = Self::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| VerifyError::LinkLoad {
                path: dir.to_path_buf(),
                source: Box::new(VerifyError::Record(e.into())),
            })?;
            let path = entry.path();
            let is_link = path.extension().map_or(false, |ext| ext == LINK_EXTENSION);
            if !entry.file_type().is_file() || !is_link {
                continue;
            }

            store.add(LoadedLink::from_file(path)?);
        }

        tracing::debug!(dir = %dir.display(), count = store.len(), "loaded links");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Candidate links for `step`, in load order.
    ///
    /// Links from files whose keyid prefix names no authorized key are
    /// skipped. A prefix shared by two authorized keys cannot be attributed
    /// and is an [`VerifyError::AmbiguousLink`].
    pub fn candidates(&self, step: &Step) -> Result<Vec<&LoadedLink>, VerifyError> {
        let mut candidates = Vec::new();

        for loaded in self.links.iter().filter(|l| l.link.name == step.name) {
            if let Some(prefix) = &loaded.keyid_prefix {
                let owners = step
                    .pubkeys
                    .iter()
                    .filter(|keyid| keyid.starts_with(prefix.as_str()))
                    .count();
                match owners {
                    0 => {
                        tracing::debug!(
                            step = %step.name,
                            link = %loaded.label(),
                            "skipping link signed by unauthorized key prefix"
                        );
                        continue;
                    }
                    1 => {}
                    _ => {
                        return Err(VerifyError::AmbiguousLink {
                            step: step.name.clone(),
                            prefix: prefix.clone(),
                        });
                    }
                }
            }
            candidates.push(loaded);
        }

        if candidates.is_empty() {
            return Err(VerifyError::LinkNotFound {
                step: step.name.clone(),
            });
        }
        Ok(candidates)
    }
}
