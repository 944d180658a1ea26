//! Batch manifests: a JSON array of design units.

use anyhow::{Context as _, Result};
use fidelity::DesignWorkspace;
use serde::Deserialize;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestUnit {
    #[serde(alias = "figmaJsonPath")]
    pub design_tree_path: PathBuf,
    #[serde(alias = "cssPath")]
    pub stylesheet_path: PathBuf,
    #[serde(default, alias = "htmlPath")]
    pub markup_path: Option<PathBuf>,
}

impl ManifestUnit {
    /// Workspace with relative paths anchored at `base`.
    pub fn into_workspace(self, base: &Path) -> DesignWorkspace {
        DesignWorkspace::new(base.join(self.design_tree_path), base.join(self.stylesheet_path))
            .with_markup(self.markup_path.map(|markup| base.join(markup)))
    }
}

/// Parse manifest text, resolving relative paths against `base`.
///
/// # Errors
///
/// Returns an error if `text` is not a JSON array of units.
pub fn parse_manifest(text: &str, base: &Path) -> Result<Vec<DesignWorkspace>> {
    let units: Vec<ManifestUnit> = serde_json::from_str(text).context("parsing batch manifest")?;
    Ok(units.into_iter().map(|unit| unit.into_workspace(base)).collect())
}

/// Load a manifest file; relative paths are taken from its directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_manifest(path: &Path) -> Result<Vec<DesignWorkspace>> {
    let text = read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_manifest(&text, base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_follow_the_manifest() -> Result<()> {
        let text = r#"[
            {"designTreePath": "cart/design.json", "stylesheetPath": "cart/style.css"},
            {"figmaJsonPath": "/abs/home.json", "cssPath": "home.css", "htmlPath": "home.html"}
        ]"#;
        let units = parse_manifest(text, Path::new("/work"))?;
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].design_tree, Path::new("/work/cart/design.json"));
        assert_eq!(units[0].markup, None);
        assert_eq!(units[1].design_tree, Path::new("/abs/home.json"));
        assert_eq!(units[1].markup.as_deref(), Some(Path::new("/work/home.html")));
        Ok(())
    }

    #[test]
    fn non_array_manifest_is_rejected() {
        let err = parse_manifest("{}", Path::new(".")).err();
        assert!(err.is_some_and(|failure| failure.to_string().contains("batch manifest")));
    }
}
