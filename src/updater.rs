//! Updater protocol — contract only.
//!
//! The native launcher/self-updater is an external collaborator (out of
//! core scope); this module exists only so `main.rs` can show where it
//! would be wired, the way the teacher gates functionality outside its
//! core behind a stub/feature-gated module (`otel`, `local-embeddings`)
//! rather than omitting the seam entirely. No network call or file
//! extraction is implemented here.

use serde::Deserialize;

/// One entry in `update.json`'s `files` array.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestFile {
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

/// The `update.json` manifest shape: a target version plus the file list
/// used to decide what's outdated and, after extraction, to verify the
/// result.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateManifest {
    pub version: String,
    pub files: Vec<ManifestFile>,
}

/// What `apply_update` would do, given a manifest and a local installation
/// root: download `files.zip`, extract only entries whose local SHA-256
/// differs from (or is absent in) the manifest, verify every manifest
/// entry post-extraction, delete orphan files under `lib/` not listed in
/// the manifest (pruning empty parent directories without removing the
/// install root), and record `manifest.version` into `version.txt`.
///
/// Unimplemented: the updater lives outside this crate's core per the
/// spec's Out-of-scope list. Calling this is always an error.
pub fn apply_update(_manifest: &UpdateManifest, _install_root: &std::path::Path) -> anyhow::Result<()> {
    Err(anyhow::anyhow!(
        "apply_update is an external collaborator contract, not implemented in this crate"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_deserializes_from_json() {
        let json = r#"{
            "version": "1.2.3",
            "files": [{"path": "lib/sentinel.jar", "sha256": "abc123", "size": 42}]
        }"#;
        let manifest: UpdateManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.version, "1.2.3");
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].path, "lib/sentinel.jar");
    }

    #[test]
    fn apply_update_is_unimplemented() {
        let manifest = UpdateManifest {
            version: "1.0.0".to_string(),
            files: vec![],
        };
        assert!(apply_update(&manifest, std::path::Path::new(".")).is_err());
    }
}
