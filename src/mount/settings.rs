//! Persisted settings file (spec §6) with its two schema migrations:
//! dict-keyed `Mounts` flattened to a list, and `OriginalFolderId`
//! renamed to `OriginalStorableId`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

use super::config::MountConfig;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    pub mounts: Vec<MountConfig>,
}

impl Settings {
    /// Directory under the user's per-app data area where the settings
    /// file lives, matching spec §6 ("one file per process installation").
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("io", "owlcore", "storable-vfs")
            .map(|dirs| dirs.data_dir().join("mounts.json"))
            .unwrap_or_else(|| PathBuf::from("mounts.json"))
    }

    pub fn load(path: &Path) -> CoreResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(CoreError::from(e)),
        };
        let (settings, migrated) = parse_with_migrations(&raw)?;
        if migrated {
            info!(path = %path.display(), "migrated legacy mount settings schema");
        }
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::invalid_argument(format!("serializing settings: {e}")))?;
        std::fs::write(path, body)?;
        Ok(())
    }

    pub fn remove_scheme(&mut self, scheme: &str) {
        self.mounts.retain(|m| m.protocol_scheme != scheme);
    }

    pub fn upsert(&mut self, config: MountConfig) {
        self.remove_scheme(&config.protocol_scheme);
        self.mounts.push(config);
    }
}

/// Parses the settings JSON, applying both documented migrations:
///
/// 1. dict→list: a legacy `"Mounts": {scheme: config}` object is
///    flattened to a list.
/// 2. field rename: a legacy `OriginalFolderId` is copied into
///    `OriginalStorableId` when the latter is empty, then dropped.
fn parse_with_migrations(raw: &str) -> CoreResult<(Settings, bool)> {
    let root: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::invalid_argument(format!("invalid settings json: {e}")))?;

    let mut migrated = false;
    let mounts_value = root.get("Mounts").cloned().unwrap_or(serde_json::Value::Array(Vec::new()));

    let raw_entries: Vec<serde_json::Value> = match mounts_value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(map) => {
            migrated = true;
            map.into_values().collect()
        }
        other => {
            warn!(?other, "unexpected 'Mounts' shape in settings file, ignoring");
            Vec::new()
        }
    };

    let mut mounts = Vec::with_capacity(raw_entries.len());
    for mut entry in raw_entries {
        if let serde_json::Value::Object(obj) = &mut entry {
            let needs_legacy = obj
                .get("OriginalStorableId")
                .and_then(|v| v.as_str())
                .map(|s| s.is_empty())
                .unwrap_or(true);
            if needs_legacy {
                if let Some(legacy) = obj.remove("OriginalFolderId") {
                    if let Some(legacy) = legacy.as_str().filter(|s| !s.is_empty()) {
                        obj.insert(
                            "OriginalStorableId".to_string(),
                            serde_json::Value::String(legacy.to_string()),
                        );
                        migrated = true;
                    }
                }
            } else {
                obj.remove("OriginalFolderId");
            }
        }
        let config: MountConfig = serde_json::from_value(entry)
            .map_err(|e| CoreError::invalid_argument(format!("invalid mount entry: {e}")))?;
        mounts.push(config);
    }

    Ok((Settings { mounts }, migrated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_legacy_dict_form() {
        let raw = r#"{
            "Mounts": {
                "skills": {
                    "ProtocolScheme": "skills",
                    "OriginalStorableId": "",
                    "OriginalFolderId": "/home/a",
                    "MountName": "skills",
                    "CreatedAt": "2024-01-01T00:00:00Z",
                    "DependsOn": [],
                    "MountType": "Folder"
                }
            }
        }"#;
        let (settings, migrated) = parse_with_migrations(raw).unwrap();
        assert!(migrated);
        assert_eq!(settings.mounts.len(), 1);
        assert_eq!(settings.mounts[0].original_storable_id, "/home/a");
    }

    #[test]
    fn list_form_without_legacy_field_is_untouched() {
        let raw = r#"{
            "Mounts": [
                {
                    "ProtocolScheme": "z",
                    "OriginalStorableId": "/tmp/data.zip",
                    "MountName": "z",
                    "CreatedAt": "2024-01-01T00:00:00Z",
                    "DependsOn": [],
                    "MountType": "File"
                }
            ]
        }"#;
        let (settings, migrated) = parse_with_migrations(raw).unwrap();
        assert!(!migrated);
        assert_eq!(settings.mounts[0].original_storable_id, "/tmp/data.zip");
    }
}
