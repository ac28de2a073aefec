//! Model source paths
//!
//! A source is the URL (or site-relative path) of the uploaded asset. Every
//! other resource the viewer touches is derived from it: companion material
//! files, the archive extraction directory, the view-state record and the
//! storage key used when saving.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source path is empty")]
    Empty,
    #[error("Source has no file extension: {0}")]
    MissingExtension(String),
}

/// An uploaded model path split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    /// The path as given
    pub original: String,
    /// Everything up to and including the last `/`
    pub dir: String,
    /// Last path segment, e.g. `bust.obj`
    pub filename: String,
    /// Filename without its extension
    pub basename: String,
    /// Lower-cased extension used for dispatch
    pub extension: String,
}

impl ModelSource {
    pub fn parse(path: &str) -> Result<Self, SourceError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(SourceError::Empty);
        }

        let (dir, filename) = match path.rfind('/') {
            Some(idx) => (&path[..=idx], &path[idx + 1..]),
            None => ("", path),
        };

        let (basename, extension) = match filename.rfind('.') {
            Some(idx) if idx + 1 < filename.len() => (&filename[..idx], &filename[idx + 1..]),
            _ => return Err(SourceError::MissingExtension(path.to_string())),
        };

        Ok(Self {
            original: path.to_string(),
            dir: dir.to_string(),
            filename: filename.to_string(),
            basename: basename.to_string(),
            extension: extension.to_lowercase(),
        })
    }

    /// Storage key of the source directory relative to `domain`
    pub fn uri(&self, domain: &str) -> String {
        let prefix = format!("{}/", domain.trim_end_matches('/'));
        self.dir
            .strip_prefix(&prefix)
            .unwrap_or(&self.dir)
            .to_string()
    }

    /// Suffix naming the server-side extraction directory, e.g. `bust_ZIP/`
    pub fn archive_suffix(&self) -> String {
        format!("{}_{}/", self.basename, self.extension.to_uppercase())
    }

    /// Directory the server extracts an uploaded archive into
    pub fn archive_dir(&self) -> String {
        format!("{}{}", self.dir, self.archive_suffix())
    }

    /// Sibling file with a different extension, e.g. the `.mtl` of an `.obj`
    pub fn sibling(&self, extension: &str) -> String {
        format!("{}{}.{}", self.dir, self.basename, extension)
    }
}

/// Rewrite `url` through a lightweight proxy template.
///
/// The template is stored percent-encoded and embeds the original source
/// path; that path is swapped for the encoded resource URL.
pub fn proxy_path(template: &str, original_path: &str, url: &str) -> String {
    percent_decode(template).replace(original_path, &percent_encode(url))
}

/// Percent-encode everything outside the URI component unreserved set
pub fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Extract the entity id from a page path.
///
/// `pattern` contains one `(.*)` capture, e.g. `/entity/(.*)/view`. The capture
/// is greedy: it runs to the last occurrence of the trailing literal.
pub fn entity_id_from_path(pattern: &str, path: &str) -> Option<String> {
    let (prefix, suffix) = pattern.split_once("(.*)")?;
    let start = path.find(prefix)? + prefix.len();
    let rest = &path[start..];
    let captured = if suffix.is_empty() {
        rest
    } else {
        &rest[..rest.rfind(suffix)?]
    };
    (!captured.is_empty()).then(|| captured.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        let src = ModelSource::parse("https://repo.example/files/2024/Bust.OBJ").unwrap();
        assert_eq!(src.dir, "https://repo.example/files/2024/");
        assert_eq!(src.filename, "Bust.OBJ");
        assert_eq!(src.basename, "Bust");
        assert_eq!(src.extension, "obj");
        assert_eq!(src.uri("https://repo.example"), "files/2024/");
    }

    #[test]
    fn test_parse_dotted_basename() {
        let src = ModelSource::parse("/files/scan.v2.tar.gz").unwrap();
        assert_eq!(src.basename, "scan.v2.tar");
        assert_eq!(src.extension, "gz");
        assert_eq!(src.archive_dir(), "/files/scan.v2.tar_GZ/");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ModelSource::parse("  "), Err(SourceError::Empty));
        assert!(matches!(
            ModelSource::parse("/files/README"),
            Err(SourceError::MissingExtension(_))
        ));
        assert!(matches!(
            ModelSource::parse("/files/trailing."),
            Err(SourceError::MissingExtension(_))
        ));
    }

    #[test]
    fn test_proxy_path() {
        let template = "%2Fproxy%3Ffile%3D%2Ffiles%2Fship.zip";
        let rewritten = proxy_path(template, "/files/ship.zip", "/files/ship_ZIP/ship.glb");
        assert_eq!(rewritten, "/proxy?file=%2Ffiles%2Fship_ZIP%2Fship.glb");
    }

    #[test]
    fn test_percent_round_trip() {
        let raw = "a b/ä?x=1&y=(2)";
        assert_eq!(percent_decode(&percent_encode(raw)), raw);
        assert_eq!(percent_decode("100%"), "100%");
    }

    #[test]
    fn test_entity_id_from_path() {
        let pattern = "/entity/(.*)/view";
        assert_eq!(
            entity_id_from_path(pattern, "/site/entity/abc123/view"),
            Some("abc123".to_string())
        );
        assert_eq!(entity_id_from_path(pattern, "/site/other/abc/view"), None);
        assert_eq!(entity_id_from_path("/id/(.*)", "/id/42"), Some("42".to_string()));
    }
}
