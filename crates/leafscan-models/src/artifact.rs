//! Names of files the service writes to local disk.
//!
//! Every file gets a random v4 UUID so concurrent requests never share a
//! name. Parsing is strict: only names this module could have generated are
//! accepted, which keeps path separators and `..` out of lookups.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Kind of managed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Uploaded image kept only for the duration of one request
    Upload,
    /// Annotated output served by the download endpoint
    Annotated,
}

impl ArtifactKind {
    pub const ALL: &'static [ArtifactKind] = &[ArtifactKind::Upload, ArtifactKind::Annotated];

    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::Upload => "temp_",
            ArtifactKind::Annotated => "annotated_",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Upload => "upload",
            ArtifactKind::Annotated => "annotated",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A generated file name: `<prefix><32 hex>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    kind: ArtifactKind,
    id: Uuid,
    extension: String,
}

impl ArtifactName {
    /// Fresh random name for `kind` with the given extension.
    pub fn generate(kind: ArtifactKind, extension: &str) -> Self {
        Self {
            kind,
            id: Uuid::new_v4(),
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// URL path under which the download endpoint serves this file.
    pub fn download_path(&self) -> String {
        format!("/download/{}", self)
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}.{}",
            self.kind.prefix(),
            self.id.simple(),
            self.extension
        )
    }
}

impl FromStr for ArtifactName {
    type Err = ArtifactNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(['/', '\\']) || s.contains("..") {
            return Err(ArtifactNameError::InvalidCharacters(s.to_string()));
        }

        let (kind, rest) = ArtifactKind::ALL
            .iter()
            .find_map(|kind| s.strip_prefix(kind.prefix()).map(|rest| (*kind, rest)))
            .ok_or_else(|| ArtifactNameError::UnknownPrefix(s.to_string()))?;

        let (hex, extension) = rest
            .split_once('.')
            .ok_or_else(|| ArtifactNameError::MissingExtension(s.to_string()))?;

        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ArtifactNameError::InvalidId(s.to_string()));
        }
        let id = Uuid::parse_str(hex).map_err(|_| ArtifactNameError::InvalidId(s.to_string()))?;

        if extension.is_empty()
            || extension.len() > 5
            || !extension.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(ArtifactNameError::MissingExtension(s.to_string()));
        }

        Ok(Self {
            kind,
            id,
            extension: extension.to_ascii_lowercase(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtifactNameError {
    #[error("File name contains path characters: {0}")]
    InvalidCharacters(String),

    #[error("File name is not a managed artifact: {0}")]
    UnknownPrefix(String),

    #[error("File name has an invalid identifier: {0}")]
    InvalidId(String),

    #[error("File name has no valid extension: {0}")]
    MissingExtension(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_name_format() {
        let name = ArtifactName::generate(ArtifactKind::Annotated, ".JPG");
        let text = name.to_string();
        assert!(text.starts_with("annotated_"));
        assert!(text.ends_with(".jpg"));
        assert_eq!(text.len(), "annotated_".len() + 32 + ".jpg".len());
        assert_eq!(name.download_path(), format!("/download/{}", text));
    }

    #[test]
    fn test_generated_names_roundtrip_through_parse() {
        let name = ArtifactName::generate(ArtifactKind::Upload, "png");
        let parsed: ArtifactName = name.to_string().parse().unwrap();
        assert_eq!(parsed, name);
        assert_eq!(parsed.kind(), ArtifactKind::Upload);
    }

    #[test]
    fn test_generated_names_are_unique() {
        let names: HashSet<String> = (0..1000)
            .map(|_| ArtifactName::generate(ArtifactKind::Annotated, "jpg").to_string())
            .collect();
        assert_eq!(names.len(), 1000);
    }

    #[test]
    fn test_parse_rejects_traversal_and_foreign_names() {
        assert!(matches!(
            "../annotated_00000000000000000000000000000000.jpg".parse::<ArtifactName>(),
            Err(ArtifactNameError::InvalidCharacters(_))
        ));
        assert!(matches!(
            "main.rs".parse::<ArtifactName>(),
            Err(ArtifactNameError::UnknownPrefix(_))
        ));
        assert!(matches!(
            "annotated_xyz.jpg".parse::<ArtifactName>(),
            Err(ArtifactNameError::InvalidId(_))
        ));
        assert!(matches!(
            "annotated_0123456789abcdef0123456789abcdef".parse::<ArtifactName>(),
            Err(ArtifactNameError::MissingExtension(_))
        ));
        assert!(matches!(
            "annotated_0123456789abcdef0123456789abcdef.tar.gz".parse::<ArtifactName>(),
            Err(ArtifactNameError::MissingExtension(_))
        ));
    }
}
