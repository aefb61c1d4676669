use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::recognition::domain::gallery::Gallery;
use crate::shared::constants::GALLERY_FILE_EXTENSION;
use crate::shared::embedding::Embedding;

#[derive(Error, Debug)]
pub enum GalleryStoreError {
    #[error("identity name {0:?} is not usable as a file name")]
    InvalidName(String),
    #[error("failed to read gallery directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid reference embedding in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize reference embedding for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("empty reference embedding in {path}")]
    EmptyEmbedding { path: PathBuf },
    #[error("dimension mismatch in {path}: expected {expected}, found {found}")]
    Dimension {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

/// Persists reference embeddings as one JSON array per identity.
///
/// The file stem is the identity name (`<dir>/<name>.json`), mirroring how
/// callers look identities up. Loading walks the directory in sorted
/// file-name order so results are stable across platforms; `Gallery`'s
/// last-wins insert then makes any duplicate-name handling explicit rather
/// than an accident of iteration order.
pub struct GalleryStore {
    dir: PathBuf,
}

impl GalleryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `embedding` as the reference for `name`, replacing any
    /// previous file. Returns the path written.
    pub fn save(&self, name: &str, embedding: &Embedding) -> Result<PathBuf, GalleryStoreError> {
        validate_name(name)?;

        fs::create_dir_all(&self.dir).map_err(|e| GalleryStoreError::WriteFile {
            path: self.dir.clone(),
            source: e,
        })?;

        let path = self.dir.join(format!("{name}.{GALLERY_FILE_EXTENSION}"));
        // serde_json rejects non-finite floats, which a reference embedding
        // could theoretically carry
        let json = serde_json::to_vec(embedding).map_err(|e| GalleryStoreError::Serialize {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, json).map_err(|e| GalleryStoreError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Loads every stored reference embedding into a fresh [`Gallery`].
    ///
    /// A missing directory is an empty gallery (nothing enrolled yet);
    /// non-JSON files are ignored. All embeddings must share one
    /// dimensionality, enforced against the first file loaded.
    pub fn load(&self) -> Result<Gallery, GalleryStoreError> {
        let mut gallery = Gallery::new();

        if !self.dir.exists() {
            return Ok(gallery);
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| GalleryStoreError::ReadDir {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map_or(false, |ext| ext == GALLERY_FILE_EXTENSION)
            })
            .collect();
        paths.sort();

        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let bytes = fs::read(&path).map_err(|e| GalleryStoreError::ReadFile {
                path: path.clone(),
                source: e,
            })?;
            let embedding: Embedding =
                serde_json::from_slice(&bytes).map_err(|e| GalleryStoreError::Parse {
                    path: path.clone(),
                    source: e,
                })?;

            if embedding.dim() == 0 {
                return Err(GalleryStoreError::EmptyEmbedding { path });
            }
            if let Some(expected) = gallery.dim() {
                if embedding.dim() != expected {
                    return Err(GalleryStoreError::Dimension {
                        path,
                        expected,
                        found: embedding.dim(),
                    });
                }
            }

            gallery.insert(name.to_string(), embedding);
        }

        Ok(gallery)
    }
}

fn validate_name(name: &str) -> Result<(), GalleryStoreError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");
    if bad {
        return Err(GalleryStoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
