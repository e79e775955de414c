//! Compiled bundle layout
//!
//! A compiled bundle is the output of the (external) compile step:
//!
//! ```text
//! <dest>/
//!   meta.json              {"name": ..., "namespace": ..., "pure": ...}
//!   crds/rendered/*.yaml
//!   namespaces/Chart.yaml, templates/, rendered/*.yaml
//!   resources/Chart.yaml,  templates/, rendered/*.yaml
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// File name of the bundle metadata document
pub const META_FILE: &str = "meta.json";

/// Folder holding the rendered documents of a sub-release
pub const RENDERED_DIR: &str = "rendered";

/// Helm refuses release names longer than this
pub const MAX_RELEASE_NAME_LEN: usize = 53;

/// Longest DNS-1123 label
const MAX_LABEL_LEN: usize = 63;

/// One of the three independently deployable partitions of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubReleaseKind {
    Crds,
    Namespaces,
    Resources,
}

impl SubReleaseKind {
    /// All kinds, in deployment order
    pub const ALL: [SubReleaseKind; 3] = [Self::Crds, Self::Namespaces, Self::Resources];

    /// Directory name inside the compiled bundle
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Crds => "crds",
            Self::Namespaces => "namespaces",
            Self::Resources => "resources",
        }
    }

    /// Name of this sub-release for a given bundle release id
    pub fn release_name(self, release_id: &str) -> String {
        format!("{}-{}", release_id, self.dir_name())
    }
}

impl fmt::Display for SubReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Contents of `meta.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMeta {
    /// Release identifier
    pub name: String,

    /// Namespace where the Helm release records are stored
    pub namespace: String,

    /// Whether rendering is a deterministic function of the inputs
    #[serde(default)]
    pub pure: bool,
}

/// A compiled bundle on disk
#[derive(Debug, Clone)]
pub struct CompiledBundle {
    /// Bundle root directory
    pub root: PathBuf,

    /// Validated metadata
    pub meta: BundleMeta,
}

impl CompiledBundle {
    /// Load and validate a compiled bundle
    pub fn load(root: &Path) -> Result<Self> {
        let meta_path = root.join(META_FILE);
        let content = std::fs::read_to_string(&meta_path)
            .map_err(|e| invalid(root, format!("cannot read {}: {}", META_FILE, e)))?;

        let meta: BundleMeta = serde_json::from_str(&content)
            .map_err(|e| invalid(root, format!("malformed {}: {}", META_FILE, e)))?;

        validate_meta(&meta).map_err(|message| invalid(root, message))?;

        for kind in [SubReleaseKind::Namespaces, SubReleaseKind::Resources] {
            let rendered = root.join(kind.dir_name()).join(RENDERED_DIR);
            if !rendered.is_dir() {
                return Err(invalid(
                    root,
                    format!("missing {}/{} directory", kind.dir_name(), RENDERED_DIR),
                ));
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            meta,
        })
    }

    /// Release identifier
    pub fn release_id(&self) -> &str {
        &self.meta.name
    }

    /// Namespace of the release records
    pub fn release_namespace(&self) -> &str {
        &self.meta.namespace
    }

    /// Directory of a sub-release (the Helm chart for namespaces and resources)
    pub fn sub_release_dir(&self, kind: SubReleaseKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Folder of rendered documents for a sub-release
    pub fn rendered_dir(&self, kind: SubReleaseKind) -> PathBuf {
        self.sub_release_dir(kind).join(RENDERED_DIR)
    }

    /// Rendered YAML documents of a sub-release, sorted by name
    ///
    /// A missing folder yields an empty list.
    pub fn rendered_files(&self, kind: SubReleaseKind) -> Result<Vec<PathBuf>> {
        let dir = self.rendered_dir(kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false);
            if is_yaml && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        Ok(files)
    }
}

fn invalid(root: &Path, message: String) -> CoreError {
    CoreError::InvalidBundle {
        path: root.display().to_string(),
        message,
    }
}

fn validate_meta(meta: &BundleMeta) -> std::result::Result<(), String> {
    if !is_dns_label(&meta.name) {
        return Err(format!(
            "name '{}' must be a lowercase DNS-1123 label",
            meta.name
        ));
    }

    let longest = SubReleaseKind::Namespaces.release_name(&meta.name);
    if longest.len() > MAX_RELEASE_NAME_LEN {
        return Err(format!(
            "name '{}' is too long: release '{}' exceeds {} characters",
            meta.name, longest, MAX_RELEASE_NAME_LEN
        ));
    }

    if !is_dns_label(&meta.namespace) {
        return Err(format!(
            "namespace '{}' must be a lowercase DNS-1123 label",
            meta.namespace
        ));
    }

    Ok(())
}

/// Check the DNS-1123 label rules Kubernetes applies to names and namespaces
pub fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_LABEL_LEN
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bundle_dir(meta: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(META_FILE), meta).unwrap();
        for kind in SubReleaseKind::ALL {
            std::fs::create_dir_all(dir.path().join(kind.dir_name()).join(RENDERED_DIR)).unwrap();
        }
        dir
    }

    #[test]
    fn test_load_bundle() {
        let dir = bundle_dir(r#"{"name": "foo", "namespace": "ns", "pure": true}"#);
        let bundle = CompiledBundle::load(dir.path()).unwrap();
        assert_eq!(bundle.release_id(), "foo");
        assert_eq!(bundle.release_namespace(), "ns");
        assert!(bundle.meta.pure);
    }

    #[test]
    fn test_pure_defaults_to_false() {
        let dir = bundle_dir(r#"{"name": "foo", "namespace": "ns"}"#);
        assert!(!CompiledBundle::load(dir.path()).unwrap().meta.pure);
    }

    #[test]
    fn test_malformed_meta() {
        let dir = bundle_dir(r#"{"name": "foo""#);
        let err = CompiledBundle::load(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidBundle { .. }));
    }

    #[test]
    fn test_invalid_names() {
        let dir = bundle_dir(r#"{"name": "Foo_Bar", "namespace": "ns"}"#);
        assert!(CompiledBundle::load(dir.path()).is_err());

        let long = "a".repeat(43);
        let dir = bundle_dir(&format!(r#"{{"name": "{}", "namespace": "ns"}}"#, long));
        let err = CompiledBundle::load(dir.path()).unwrap_err().to_string();
        assert!(err.contains("too long"));

        let dir = bundle_dir(r#"{"name": "foo", "namespace": "-ns"}"#);
        assert!(CompiledBundle::load(dir.path()).is_err());
    }

    #[test]
    fn test_missing_rendered_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(META_FILE),
            r#"{"name": "foo", "namespace": "ns"}"#,
        )
        .unwrap();
        let err = CompiledBundle::load(dir.path()).unwrap_err().to_string();
        assert!(err.contains("namespaces/rendered"));
    }

    #[test]
    fn test_rendered_files_filters_yaml() {
        let dir = bundle_dir(r#"{"name": "foo", "namespace": "ns"}"#);
        let rendered = dir.path().join("crds").join(RENDERED_DIR);
        std::fs::write(rendered.join("b.yaml"), "kind: B").unwrap();
        std::fs::write(rendered.join("a.yml"), "kind: A").unwrap();
        std::fs::write(rendered.join("notes.txt"), "hello").unwrap();

        let bundle = CompiledBundle::load(dir.path()).unwrap();
        let files = bundle.rendered_files(SubReleaseKind::Crds).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.yml"));
    }

    #[test]
    fn test_release_names() {
        assert_eq!(SubReleaseKind::Crds.release_name("foo"), "foo-crds");
        assert_eq!(SubReleaseKind::Resources.release_name("foo"), "foo-resources");
        assert_eq!(SubReleaseKind::ALL[0], SubReleaseKind::Crds);
    }
}
