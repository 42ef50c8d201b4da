//! The decorations collection: profile badge and border metadata.
//!
//! Entries live as `*.json` files in one directory. The entry ID is the file
//! stem, and entries keep file-name order. Every entry is validated when the
//! collection is loaded, so a bad file stops startup instead of a request.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A profile decoration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    pub version: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limited: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub border: Border,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Elements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
}

/// Border drawn around the avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Border {
    Solid {
        color: String,
    },
    LinearGradient {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        angle: Option<f64>,
        colors: Vec<ColorStop>,
    },
    ConicGradient {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        angle: Option<f64>,
        colors: Vec<ColorStop>,
    },
}

/// A gradient stop: colour `c` at offset `o`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub c: String,
    pub o: String,
}

/// Positional overlays. At least one slot must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Elements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_right: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_left: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom_right: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<String>,
}

impl Elements {
    pub fn is_empty(&self) -> bool {
        self.top_left.is_none()
            && self.top_right.is_none()
            && self.bottom_left.is_none()
            && self.bottom_right.is_none()
            && self.center.is_none()
    }
}

/// Animations for the border and overlays. At least one slot must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    #[serde(flatten)]
    pub elements: Elements,
}

impl Animation {
    pub fn is_empty(&self) -> bool {
        self.border.is_none() && self.elements.is_empty()
    }
}

impl Decoration {
    /// Checks the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.elements.as_ref().is_some_and(Elements::is_empty) {
            return Err("`elements` must set at least one slot");
        }
        if self.animation.as_ref().is_some_and(Animation::is_empty) {
            return Err("`animation` must set at least one slot");
        }
        Ok(())
    }
}

/// Errors raised while loading the collection.
#[derive(Debug, thiserror::Error)]
pub enum DecorationError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid decoration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid decoration {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: &'static str },
}

/// A decoration and its collection ID.
#[derive(Debug, Clone, PartialEq)]
pub struct DecorationEntry {
    pub id: String,
    pub data: Decoration,
}

/// Validated, ordered set of decorations.
#[derive(Debug, Clone, Default)]
pub struct DecorationCollection {
    entries: Vec<DecorationEntry>,
}

impl DecorationCollection {
    /// Load every `*.json` file in `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, DecorationError> {
        let dir = dir.as_ref();
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| DecorationError::Io { path, source }
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
            let path = entry.map_err(io_err(dir))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(String::from) else {
                tracing::warn!("Skipping decoration with a non UTF-8 name: {}", path.display());
                continue;
            };

            let raw = std::fs::read_to_string(&path).map_err(io_err(&path))?;
            let data = parse_decoration(&raw).map_err(|e| match e {
                ParseFailure::Json(source) => DecorationError::Parse {
                    path: path.clone(),
                    source,
                },
                ParseFailure::Invalid(reason) => DecorationError::Invalid {
                    path: path.clone(),
                    reason,
                },
            })?;
            entries.push(DecorationEntry { id, data });
        }

        tracing::info!("Loaded {} decorations from {}", entries.len(), dir.display());
        Ok(Self { entries })
    }

    /// Build a collection from already-parsed entries, kept in the given order.
    pub fn from_entries(entries: Vec<DecorationEntry>) -> Self {
        Self { entries }
    }

    /// Entry IDs in stored order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Decoration> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.data)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum ParseFailure {
    Json(serde_json::Error),
    Invalid(&'static str),
}

fn parse_decoration(raw: &str) -> Result<Decoration, ParseFailure> {
    let decoration: Decoration = serde_json::from_str(raw).map_err(ParseFailure::Json)?;
    decoration.validate().map_err(ParseFailure::Invalid)?;
    Ok(decoration)
}
