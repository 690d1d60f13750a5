//! Top-level type lookup on Java sources.

use abiscope_core::error::{AbiscopeError, Result};
use abiscope_core::plugin::SourceTypeResolver;
use std::path::Path;
use tree_sitter::{Node, Parser};

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "annotation_type_declaration",
    "record_declaration",
];

/// Finds the internal name of the top-level type a `.java` file declares, preferring the
/// type named after the file.
pub struct JavaSourceResolver {
    language: tree_sitter::Language,
}

impl Default for JavaSourceResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl JavaSourceResolver {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// Same as [`SourceTypeResolver::top_level_type_name`], on already loaded text.
    pub fn resolve(&self, source: &str, file_stem: &str) -> std::result::Result<String, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| e.to_string())?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| "Failed to parse Java file".to_string())?;

        let root = tree.root_node();
        let bytes = source.as_bytes();
        let mut package = None;
        let mut declared = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "package_declaration" => package = package_name(child, bytes),
                kind if TYPE_DECLARATIONS.contains(&kind) => {
                    if let Some(name) = child
                        .child_by_field_name("name")
                        .and_then(|n| n.utf8_text(bytes).ok())
                    {
                        declared.push(name.to_string());
                    }
                }
                _ => {}
            }
        }

        let name = declared
            .iter()
            .find(|name| name.as_str() == file_stem)
            .or_else(|| declared.first())
            .ok_or_else(|| "no top-level type declaration".to_string())?;

        Ok(match package {
            Some(package) => format!("{}/{}", package.replace('.', "/"), name),
            None => name.clone(),
        })
    }
}

fn package_name(declaration: Node, source: &[u8]) -> Option<String> {
    let mut cursor = declaration.walk();
    declaration
        .named_children(&mut cursor)
        .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
        .and_then(|n| n.utf8_text(source).ok())
        .map(|text| text.split_whitespace().collect())
}

impl SourceTypeResolver for JavaSourceResolver {
    fn top_level_type_name(&self, source_file: &Path) -> Result<String> {
        let source = std::fs::read_to_string(source_file)?;
        let file_stem = source_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        self.resolve(&source, file_stem)
            .map_err(|reason| AbiscopeError::SourceParse {
                path: source_file.to_path_buf(),
                reason,
            })
    }
}
