/// Poster attachment storage
///
/// Validates uploaded poster names, derives the on-disk and public paths
/// of a film's poster from the film id, and writes/replaces/deletes the
/// poster file through a storage backend.

pub mod disk;

pub use disk::DiskAttachmentBackend;

use crate::error::{CatalogError, CatalogResult};
use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

/// Extensions accepted for posters. Matching is case-sensitive.
pub const ALLOWED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

/// URL prefix under which posters are served
pub const PUBLIC_PREFIX: &str = "/attachments";

/// A poster extension that passed the allow-list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosterExtension(&'static str);

impl PosterExtension {
    /// Look up an extension (leading dot included) in the allow-list
    pub fn from_extension(ext: &str) -> Option<Self> {
        ALLOWED_EXTENSIONS
            .iter()
            .find(|allowed| **allowed == ext)
            .map(|allowed| PosterExtension(*allowed))
    }

    /// Recover the extension of a previously stored poster from its public path
    pub fn from_public_path(path: &str) -> Option<Self> {
        extension_of(path).and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

/// How a write treats an existing file at the derived path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// The path must be free; an existing file is an integrity error
    CreateNew,
    /// Intentionally overwrite the current poster
    Replace,
}

/// Where a stored poster lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentLocation {
    pub storage_path: PathBuf,
    pub public_path: String,
}

/// A copy of a live poster kept while it is being replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedAttachment {
    pub film_id: Uuid,
    pub extension: PosterExtension,
    pub backup_path: PathBuf,
}

/// Attachment storage backend trait
#[async_trait]
pub trait AttachmentBackend: Send + Sync {
    /// Store poster bytes for a film and return where they landed
    async fn write(
        &self,
        film_id: Uuid,
        data: &[u8],
        extension: PosterExtension,
        mode: WriteMode,
    ) -> CatalogResult<AttachmentLocation>;

    /// Remove a film's poster. Removing a missing poster succeeds.
    async fn delete(&self, film_id: Uuid, extension: PosterExtension) -> CatalogResult<()>;

    /// Check whether a film's poster exists
    async fn exists(&self, film_id: Uuid, extension: PosterExtension) -> CatalogResult<bool>;

    /// Keep a copy of the current poster so a replacement can be undone.
    /// Returns `None` if there is no poster at the derived path.
    async fn preserve(
        &self,
        film_id: Uuid,
        extension: PosterExtension,
    ) -> CatalogResult<Option<PreservedAttachment>>;

    /// Put a preserved poster back at its derived path
    async fn restore(&self, preserved: PreservedAttachment) -> CatalogResult<()>;

    /// Drop a preserved copy once the replacement is final
    async fn release(&self, preserved: PreservedAttachment) -> CatalogResult<()>;
}

/// `<id as 32 hex digits><ext>`
pub fn attachment_file_name(film_id: Uuid, extension: PosterExtension) -> String {
    format!("{}{}", film_id.simple(), extension.as_str())
}

/// `/attachments/<id as 32 hex digits><ext>`
pub fn public_path(film_id: Uuid, extension: PosterExtension) -> String {
    format!("{}/{}", PUBLIC_PREFIX, attachment_file_name(film_id, extension))
}

/// Validate an uploaded poster's file name against the allow-list
///
/// Accepts plain names as well as quoted disposition values, and ignores
/// any client-side directory components.
pub fn validate(file_name: &str) -> CatalogResult<PosterExtension> {
    let name = unquote(file_name.trim());

    extension_of(&name)
        .and_then(PosterExtension::from_extension)
        .ok_or_else(|| CatalogError::validation("poster", "This file type is prohibited"))
}

/// Pull the `filename` parameter out of a Content-Disposition header value
///
/// e.g. `form-data; name="poster"; filename="the.matrix.jpg"`
pub fn file_name_from_disposition(value: &str) -> Option<String> {
    split_params(value)
        .into_iter()
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, raw)| unquote(raw.trim()))
        .filter(|name| !name.is_empty())
}

/// Extension of the last path component, leading dot included
fn extension_of(file_name: &str) -> Option<&str> {
    let base = file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);

    match base.rfind('.') {
        Some(idx) if idx + 1 < base.len() => Some(&base[idx..]),
        _ => None,
    }
}

/// Split header parameters on `;`, ignoring separators inside quotes
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);

    params
}

/// Strip a quoted-string's quotes and backslash escapes
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let mut out = String::with_capacity(value.len());
        let mut chars = value[1..value.len() - 1].chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        value.trim_matches('"').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_allowed_extensions() {
        for name in ["poster.jpg", "poster.jpeg", "poster.png", "poster.gif"] {
            assert!(validate(name).is_ok(), "{} should be accepted", name);
        }
        assert_eq!(validate("poster.png").unwrap().as_str(), ".png");
    }

    #[test]
    fn test_validate_rejects_other_types() {
        for name in ["poster.exe", "poster", "poster.", "poster.JPG", "poster.jpg.exe", ""] {
            match validate(name) {
                Err(CatalogError::Validation { field, .. }) => assert_eq!(field, "poster"),
                other => panic!("{} should be rejected, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_validate_multiple_dots() {
        assert_eq!(validate("the.matrix.1999.jpeg").unwrap().as_str(), ".jpeg");
        assert!(validate("archive.png.zip").is_err());
    }

    #[test]
    fn test_validate_ignores_directories() {
        assert_eq!(validate("C:\\posters\\alien.gif").unwrap().as_str(), ".gif");
        assert_eq!(validate("/home/me/alien.png").unwrap().as_str(), ".png");
        assert!(validate("dir.jpg/poster").is_err());
    }

    #[test]
    fn test_validate_quoted_name() {
        assert_eq!(validate("\"poster.jpg\"").unwrap().as_str(), ".jpg");
    }

    #[test]
    fn test_file_name_from_disposition() {
        assert_eq!(
            file_name_from_disposition("form-data; name=\"poster\"; filename=\"the.matrix.jpg\""),
            Some("the.matrix.jpg".to_string())
        );
        assert_eq!(
            file_name_from_disposition("form-data; name=poster; filename=plain.png"),
            Some("plain.png".to_string())
        );
        assert_eq!(
            file_name_from_disposition("form-data; name=\"poster\"; filename=\"we;ird \\\"name\\\".gif\""),
            Some("we;ird \"name\".gif".to_string())
        );
        assert_eq!(file_name_from_disposition("form-data; name=\"poster\""), None);
        assert_eq!(file_name_from_disposition("form-data; filename=\"\""), None);
    }

    #[test]
    fn test_derived_paths() {
        let id = Uuid::parse_str("3f2504e0-4f89-11d3-9a0c-0305e82c3301").unwrap();
        let ext = PosterExtension::from_extension(".png").unwrap();

        assert_eq!(attachment_file_name(id, ext), "3f2504e04f8911d39a0c0305e82c3301.png");
        assert_eq!(
            public_path(id, ext),
            "/attachments/3f2504e04f8911d39a0c0305e82c3301.png"
        );
    }

    #[test]
    fn test_extension_from_public_path() {
        let ext = PosterExtension::from_public_path("/attachments/abc.jpeg").unwrap();
        assert_eq!(ext.as_str(), ".jpeg");
        assert_eq!(PosterExtension::from_public_path("/attachments/abc.bmp"), None);
    }
}
