//! Entity metadata
//!
//! The repository exports one XML document per entity. The first child of the
//! document element holds flat `<tag>text</tag>` pairs whose names share a
//! common path prefix.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::scene::MeshStats;

/// Prefix shared by every field name in the export
pub const FIELD_PREFIX: &str = "wisski_path_3d_model__";

/// Hierarchy labels longer than this are shortened
const MAX_LABEL_CHARS: usize = 35;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MetadataError {
    #[error("XML error: {0}")]
    Xml(String),
    #[error("Export contains no record")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataField {
    /// Tag name with the export prefix removed
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityMetadata {
    pub fields: Vec<MetadataField>,
}

/// Display label for a recognized field
pub fn display_label(tag: &str) -> Option<&'static str> {
    match tag {
        "title" => Some("Title"),
        "author_name" => Some("Author"),
        "author_affiliation" => Some("Author affiliation"),
        "license" => Some("License"),
        _ => None,
    }
}

impl EntityMetadata {
    pub fn parse(xml: &str) -> Result<Self, MetadataError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut depth = 0usize;
        let mut root_seen = false;
        let mut record_taken = false;
        let mut in_record = false;
        let mut current: Option<MetadataField> = None;
        let mut fields = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| MetadataError::Xml(e.to_string()))?;
            match event {
                Event::Start(e) => {
                    depth += 1;
                    if depth == 1 {
                        root_seen = true;
                    } else if depth == 2 && !record_taken {
                        record_taken = true;
                        in_record = true;
                    } else if depth == 3 && in_record {
                        current = Some(MetadataField {
                            tag: strip_prefix(e.name().as_ref()),
                            value: String::new(),
                        });
                    }
                }
                // Self-closing element one level below the current depth
                Event::Empty(e) => match depth + 1 {
                    1 => root_seen = true,
                    2 => record_taken = true,
                    3 if in_record => fields.push(MetadataField {
                        tag: strip_prefix(e.name().as_ref()),
                        value: String::new(),
                    }),
                    _ => {}
                },
                Event::Text(t) => {
                    if let Some(field) = current.as_mut() {
                        let text = t.unescape().map_err(|e| MetadataError::Xml(e.to_string()))?;
                        field.value.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(field) = current.as_mut() {
                        field.value.push_str(&String::from_utf8_lossy(&c));
                    }
                }
                Event::End(_) => {
                    if depth == 3 {
                        if let Some(field) = current.take() {
                            fields.push(field);
                        }
                    } else if depth == 2 {
                        in_record = false;
                    }
                    depth = depth.saturating_sub(1);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !root_seen {
            return Err(MetadataError::Empty);
        }
        Ok(Self { fields })
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    /// Converted (viewer-ready) file that should be loaded instead of the upload
    pub fn converted_file(&self) -> Option<&str> {
        self.get("converted_file").map(str::trim).filter(|v| !v.is_empty())
    }

    /// Recognized fields with their display labels, in document order
    pub fn labelled(&self) -> Vec<(&'static str, &str)> {
        self.fields
            .iter()
            .filter(|f| !f.value.is_empty())
            .filter_map(|f| display_label(&f.tag).map(|label| (label, f.value.as_str())))
            .collect()
    }
}

fn strip_prefix(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    name.strip_prefix(FIELD_PREFIX).unwrap_or(&name).to_string()
}

/// Facts about the loaded file shown under the descriptive metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechnicalMetadata {
    pub uploaded_file: String,
    pub loaded_format: String,
    pub stats: MeshStats,
}

impl TechnicalMetadata {
    pub fn rows(&self) -> [(&'static str, String); 4] {
        [
            ("Uploaded file name", self.uploaded_file.clone()),
            ("Loaded format", self.loaded_format.clone()),
            ("Vertices", self.stats.vertices.to_string()),
            ("Faces", self.stats.faces.to_string()),
        ]
    }
}

/// Label for a node in the scene hierarchy list
pub fn hierarchy_label(name: &str) -> String {
    if name.is_empty() {
        return "Mesh".to_string();
    }
    if name.chars().count() > MAX_LABEL_CHARS {
        let short: String = name.chars().take(MAX_LABEL_CHARS).collect();
        format!("{}...", short)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <item>
    <wisski_path_3d_model__title>Bronze &amp; Bust</wisski_path_3d_model__title>
    <wisski_path_3d_model__author_name>A. Sculptor</wisski_path_3d_model__author_name>
    <wisski_path_3d_model__license>CC-BY 4.0</wisski_path_3d_model__license>
    <wisski_path_3d_model__converted_file>https://repo.example/files/gltf/bust.glb</wisski_path_3d_model__converted_file>
    <wisski_path_3d_model__author_affiliation/>
    <internal_note><![CDATA[raw <data>]]></internal_note>
  </item>
  <item>
    <wisski_path_3d_model__title>Ignored</wisski_path_3d_model__title>
  </item>
</response>"#;

    #[test]
    fn test_parse_export() {
        let meta = EntityMetadata::parse(EXPORT).unwrap();
        assert_eq!(meta.get("title"), Some("Bronze & Bust"));
        assert_eq!(meta.get("author_affiliation"), Some(""));
        assert_eq!(meta.get("internal_note"), Some("raw <data>"));
        assert_eq!(
            meta.converted_file(),
            Some("https://repo.example/files/gltf/bust.glb")
        );
        assert_eq!(meta.fields.len(), 6);
    }

    #[test]
    fn test_labelled_fields() {
        let meta = EntityMetadata::parse(EXPORT).unwrap();
        assert_eq!(
            meta.labelled(),
            vec![
                ("Title", "Bronze & Bust"),
                ("Author", "A. Sculptor"),
                ("License", "CC-BY 4.0"),
            ]
        );
    }

    #[test]
    fn test_empty_export() {
        assert_eq!(EntityMetadata::parse("<response/>"), Ok(EntityMetadata::default()));
        assert_eq!(EntityMetadata::parse(""), Err(MetadataError::Empty));
        assert!(EntityMetadata::parse("<a><b></c></a>").is_err());
    }

    #[test]
    fn test_converted_file_blank_is_ignored() {
        let meta = EntityMetadata::parse(
            "<r><i><wisski_path_3d_model__converted_file> </wisski_path_3d_model__converted_file></i></r>",
        )
        .unwrap();
        assert_eq!(meta.converted_file(), None);
    }

    #[test]
    fn test_hierarchy_label() {
        assert_eq!(hierarchy_label(""), "Mesh");
        assert_eq!(hierarchy_label("Head"), "Head");
        let long = "a".repeat(40);
        assert_eq!(hierarchy_label(&long), format!("{}...", "a".repeat(35)));
    }

    #[test]
    fn test_technical_rows() {
        let tech = TechnicalMetadata {
            uploaded_file: "bust.zip".to_string(),
            loaded_format: "glb".to_string(),
            stats: MeshStats::from_counts(Some(300), 120),
        };
        let rows = tech.rows();
        assert_eq!(rows[2], ("Vertices", "300".to_string()));
        assert_eq!(rows[3], ("Faces", "100".to_string()));
    }
}
