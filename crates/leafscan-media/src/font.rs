//! Label font discovery.

use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Fonts tried when `FONT_PATH` is not set.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load a TrueType/OpenType font from disk.
pub fn load_font(path: impl AsRef<Path>) -> MediaResult<FontArc> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    FontArc::try_from_vec(data).map_err(|e| MediaError::Font(format!("{}: {}", path.display(), e)))
}

/// Pick the label font: `FONT_PATH` first, then well-known system locations.
///
/// Returns `None` when nothing usable is found; labels are then skipped and
/// only boxes are drawn.
pub fn locate_font() -> Option<FontArc> {
    let configured = std::env::var("FONT_PATH").ok().map(PathBuf::from);

    if let Some(path) = &configured {
        match load_font(path) {
            Ok(font) => return Some(font),
            Err(e) => warn!("Configured FONT_PATH is unusable, falling back: {}", e),
        }
    }

    for candidate in SYSTEM_FONT_CANDIDATES {
        if let Ok(font) = load_font(candidate) {
            debug!("Using label font {}", candidate);
            return Some(font);
        }
    }

    warn!("No label font found; annotations will contain boxes only");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_font_missing_file() {
        assert!(matches!(
            load_font("/definitely/not/here.ttf"),
            Err(MediaError::Io(_))
        ));
    }

    #[test]
    fn test_load_font_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(load_font(&path), Err(MediaError::Font(_))));
    }
}
