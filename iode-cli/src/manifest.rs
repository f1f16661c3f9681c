//! The project manifest reader (spec.md §6 "Project manifest").
//!
//! Grounded on `passerine-aspen::manifest::Manifest`, which reads a
//! `serde`+`toml` struct by searching upward from a starting directory
//! for the manifest file. This reimplementation's manifest has exactly
//! the three keys spec.md §6 names, with unrecognised keys tolerated via
//! `#[serde(flatten)]` into an ignored map rather than rejected.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

pub const MANIFEST_FILE: &str = "iode.toml";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Executable,
    Library,
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub sources: Vec<String>,
    #[serde(flatten)]
    pub other: HashMap<String, toml::Value>,
}

impl Manifest {
    /// Searches `start` and its ancestors for `iode.toml`, mirroring the
    /// teacher's `Manifest::package`.
    pub fn discover(start: &Path) -> Result<(Manifest, PathBuf), String> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let source = fs::read_to_string(&candidate)
                    .map_err(|e| format!("could not read manifest '{}': {e}", candidate.display()))?;
                let manifest: Manifest = toml::from_str(&source)
                    .map_err(|e| format!("could not parse manifest '{}': {e}", candidate.display()))?;
                return Ok((manifest, dir));
            }
            dir = match dir.parent() {
                Some(parent) => parent.to_path_buf(),
                None => {
                    return Err(format!(
                        "no '{MANIFEST_FILE}' found in '{}' or any parent directory",
                        start.display()
                    ));
                },
            };
        }
    }

    /// Resolves `sources` relative to the manifest's directory (spec.md
    /// §6: "array of strings resolved relative to the manifest's
    /// directory").
    pub fn source_paths(&self, manifest_dir: &Path) -> Vec<PathBuf> {
        self.sources.iter().map(|source| manifest_dir.join(source)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_recognised_keys_and_ignores_others() {
        let source = r#"
            name = "demo"
            type = "executable"
            sources = ["main.iodc", "util.iodc"]
            authors = ["nobody"]
        "#;
        let manifest: Manifest = toml::from_str(source).unwrap();
        assert_eq!(manifest.name, "demo");
        assert!(matches!(manifest.kind, Kind::Executable));
        assert_eq!(manifest.sources, vec!["main.iodc", "util.iodc"]);
    }

    #[test]
    fn discover_finds_a_manifest_in_a_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "name = \"x\"\ntype = \"library\"\nsources = []\n").unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        let (manifest, manifest_dir) = Manifest::discover(&nested).unwrap();
        assert_eq!(manifest.name, "x");
        assert_eq!(manifest_dir, dir.path());
    }
}
