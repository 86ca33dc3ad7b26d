//! The manifest sidecar: the JSON document pairing packed paths with chunk
//! identities and carrying the dependency record.
//!
//! Neither chunk ids nor dependency edges can be reconstructed from
//! extracted files alone, so the manifest is required to round-trip a
//! container.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use utoc::DependencyBundle;

use crate::container::Container;
use crate::error::{ContainerError, Result};

/// One packed file: its path and its chunk id in hex form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "ChunkId")]
    pub chunk_id: String,
}

/// The manifest document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Packed files in the order the writer will consume them.
    #[serde(rename = "Files", default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ManifestFile>,
    #[serde(rename = "Dependencies", default)]
    pub dependencies: DependencyBundle,
}

impl Manifest {
    /// Build a manifest from a parsed container and its decoded dependency
    /// record.
    pub fn from_container(container: &Container, dependencies: DependencyBundle) -> Self {
        let files = container
            .files
            .iter()
            .filter(|record| !record.path.is_empty())
            .map(|record| ManifestFile {
                path: record.path.clone(),
                chunk_id: record.chunk_id.to_hex(),
            })
            .collect();
        Self {
            files,
            dependencies,
        }
    }

    /// Read a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(ContainerError::io(path))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the manifest as pretty-printed JSON with two-space indent.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(ContainerError::io(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoc::PackageDependency;

    #[test]
    fn json_field_names_match_the_sidecar_format() {
        let mut manifest = Manifest {
            files: vec![ManifestFile {
                path: "Game/a.bin".to_string(),
                chunk_id: "00000000000000420000000a".to_string(),
            }],
            dependencies: DependencyBundle {
                package_id: 7,
                entries: Default::default(),
            },
        };
        manifest.dependencies.entries.insert(
            0x42,
            PackageDependency {
                file_size: 12,
                export_objects: 1,
                mostly_one: 1,
                some_index: 0,
                dependencies: vec![0x43],
            },
        );

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        for field in [
            "\"Files\"",
            "\"Path\"",
            "\"ChunkId\"",
            "\"Dependencies\"",
            "\"packageID\"",
            "\"ChunkIDToDependencies\"",
            "\"uncompressedSize\"",
            "\"exportObjects\"",
            "\"requiredValueSomehow\"",
            "\"uniqueIndex\"",
            "\"dependencies\"",
        ] {
            assert!(json.contains(field), "missing {field} in {json}");
        }

        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.dependencies.entries[&0x42].dependencies, vec![0x43]);
    }

    #[test]
    fn null_dependency_lists_deserialize_as_empty() {
        let json = r#"{
          "Files": [],
          "Dependencies": {
            "packageID": 1,
            "ChunkIDToDependencies": {
              "5": {
                "uncompressedSize": 10,
                "exportObjects": 0,
                "requiredValueSomehow": 1,
                "uniqueIndex": 2,
                "dependencies": null
              }
            }
          }
        }"#;
        let parsed: Manifest = serde_json::from_str(json).unwrap();
        assert!(parsed.dependencies.entries[&5].dependencies.is_empty());
    }
}
