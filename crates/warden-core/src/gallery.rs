//! Enrollment gallery: the known identities and their reference embeddings.
//!
//! Loaded once at startup from `<dir>/<person>/<image>` and never mutated.

use crate::analyzer::FaceAnalyzer;
use crate::frame::Frame;
use crate::types::Embedding;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENROLLMENT_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("known faces directory {path} is not readable: {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("embedding for {name} has {actual} dimensions, gallery uses {expected}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// One reference embedding for a named person.
#[derive(Debug, Clone)]
pub struct EnrolledIdentity {
    pub name: String,
    pub embedding: Embedding,
}

/// Ordered set of enrolled identities sharing one embedding dimension.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<EnrolledIdentity>,
}

impl Gallery {
    /// Build a gallery from already-embedded entries, keeping their order.
    pub fn from_entries(entries: Vec<EnrolledIdentity>) -> Result<Self, GalleryError> {
        let mut gallery = Self::default();
        for entry in entries {
            gallery.push(entry)?;
        }
        Ok(gallery)
    }

    /// Load every `<dir>/<person>/*.{jpg,jpeg,png}` image that contains
    /// exactly one face. Directory entries are visited in name order.
    ///
    /// Only an unreadable `dir` is an error; problems with individual images
    /// are logged and the image is skipped.
    pub fn load(dir: &Path, analyzer: &mut dyn FaceAnalyzer) -> Result<Self, GalleryError> {
        let people = sorted_dir_entries(dir).map_err(|source| GalleryError::Inaccessible {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut gallery = Self::default();
        let mut skipped = 0usize;

        for person_dir in people.into_iter().filter(|p| p.is_dir()) {
            let name = person_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let images = match sorted_dir_entries(&person_dir) {
                Ok(images) => images,
                Err(e) => {
                    tracing::warn!(path = %person_dir.display(), error = %e, "skipping unreadable person directory");
                    continue;
                }
            };

            for path in images.into_iter().filter(|p| is_enrollment_image(p)) {
                match enroll_image(&path, &name, analyzer) {
                    Ok(embedding) => {
                        let entry = EnrolledIdentity {
                            name: name.clone(),
                            embedding,
                        };
                        if let Err(e) = gallery.push(entry) {
                            skipped += 1;
                            tracing::warn!(path = %path.display(), error = %e, "skipped enrollment image");
                        }
                    }
                    Err(reason) => {
                        skipped += 1;
                        tracing::warn!(path = %path.display(), %reason, "skipped enrollment image");
                    }
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            entries = gallery.len(),
            identities = gallery.identities().len(),
            skipped,
            "gallery loaded"
        );

        Ok(gallery)
    }

    fn push(&mut self, entry: EnrolledIdentity) -> Result<(), GalleryError> {
        if let Some(expected) = self.dim() {
            if entry.embedding.dim() != expected {
                return Err(GalleryError::DimensionMismatch {
                    name: entry.name,
                    expected,
                    actual: entry.embedding.dim(),
                });
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn entries(&self) -> &[EnrolledIdentity] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by every entry, `None` when empty.
    pub fn dim(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.dim())
    }

    /// Distinct identity names with their reference image counts, by name.
    pub fn identities(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.name.as_str()).or_default() += 1;
        }
        counts.into_iter().map(|(name, n)| (name.to_string(), n)).collect()
    }
}

/// Embed a single enrollment image, or say why it cannot be used.
fn enroll_image(path: &Path, name: &str, analyzer: &mut dyn FaceAnalyzer) -> Result<Embedding, String> {
    let image = image::open(path).map_err(|e| format!("decode failed: {e}"))?;
    let frame = Frame::new(image.to_rgb8(), 0);

    let mut faces = analyzer
        .analyze(&frame)
        .map_err(|e| format!("analysis failed: {e}"))?;

    if faces.len() != 1 {
        return Err(format!("found {} faces (expected 1)", faces.len()));
    }

    tracing::debug!(path = %path.display(), name, "enrolled image");
    Ok(faces.remove(0).embedding)
}

fn is_enrollment_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| ENROLLMENT_EXTENSIONS.iter().any(|ok| e.eq_ignore_ascii_case(ok)))
            .unwrap_or(false)
}

fn sorted_dir_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect::<Vec<_>>();
    paths.sort();
    Ok(paths)
}
