//! Mount Registry (spec §4.B): binds caller-chosen schemes to existing
//! folders or archive files, with persistence across restarts, cycle
//! prevention, and dependency-ordered restoration.

pub mod config;
pub mod settings;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};

use crate::archive::ArchiveMountAdapter;
use crate::error::{CoreError, CoreResult};
use crate::handler::local;
use crate::handler::mounted::MountedFolderHandler;
use crate::handler::ProtocolHandler;
use crate::registry::Registry;
use crate::storable::{FileStorable, FolderStorable, Storable, StorableId, StorableNode};

pub use config::{MountConfig, MountType};
pub use settings::Settings;

/// A live mount: its persisted configuration plus the materialized
/// folder view and the native id it ultimately resolves to (used for
/// cycle checks and the archive-mount uniqueness invariant).
#[derive(Clone)]
pub struct MountedEntry {
    pub config: MountConfig,
    pub folder: Storable,
    pub underlying_native_id: StorableId,
}

/// What `list_mounts` reports to callers.
#[derive(Debug, Clone)]
pub struct MountSummary {
    pub scheme: String,
    pub display_name: String,
    pub root_uri: String,
    pub backing_type_tag: &'static str,
    pub mount_type: MountType,
    pub original_id: String,
}

fn validate_scheme(scheme: &str) -> CoreResult<()> {
    if scheme.is_empty() || scheme.contains('/') || scheme.contains('\\') || scheme.contains("://") {
        return Err(CoreError::invalid_argument(format!("'{scheme}' is not a valid mount scheme")));
    }
    Ok(())
}

impl Registry {
    /// Binds `storable` to a fresh scheme. See spec §4.B for the full
    /// algorithm; `original_id`, when given, must already be in alias
    /// form if `storable` sits under another mount (the caller's
    /// responsibility - typically it is whatever id resolved the
    /// storable in the first place).
    #[instrument(skip(self, storable))]
    pub async fn mount(
        &self,
        storable: Storable,
        scheme: &str,
        display_name: &str,
        original_id: Option<StorableId>,
    ) -> CoreResult<StorableId> {
        let _guard = self.mutation_lock.lock().await;

        validate_scheme(scheme)?;
        if self.is_builtin(scheme) {
            return Err(CoreError::invalid_argument(format!("'{scheme}' shadows a built-in scheme")));
        }
        if self.handlers.contains_key(scheme) {
            return Err(CoreError::conflict(format!("scheme '{scheme}' is already registered")));
        }

        let original_id = original_id.unwrap_or_else(|| storable.id());

        let (folder, mount_type) = match &storable {
            Storable::Folder(_) => {
                // The spec scopes the cycle check to `StorableChild` folders
                // (items with a parent), but none of this crate's concrete
                // `Storable` implementations populate `parent_id`, which
                // would make that gate a no-op. The check is run
                // unconditionally instead. It is cheap, and correctness
                // depends only on the dependency chain reachable from
                // `original_id`, not on whether the folder object itself
                // happens to expose a parent.
                if self.would_cycle(scheme, &original_id) {
                    return Err(CoreError::conflict(format!(
                        "mounting '{scheme}' on '{original_id}' would create a cycle"
                    )));
                }
                (storable.clone(), MountType::Folder)
            }
            Storable::File(file) => {
                let filename = file.name();
                if crate::archive::classify(&filename).is_none() {
                    return Err(CoreError::unsupported(format!(
                        "'{filename}' has no supported archive extension"
                    )));
                }
                let native_original = self.resolve_alias_to_full(&original_id)?;
                let native_key = native_original.as_str().to_string();
                if self.original_to_scheme.contains_key(&native_key) {
                    return Err(CoreError::conflict(format!(
                        "'{native_original}' is already mounted as an archive"
                    )));
                }
                let path = PathBuf::from(native_original.as_str());
                let folder = ArchiveMountAdapter::mount(path, file.is_modifiable()).await?;
                (folder, MountType::File)
            }
        };

        let depends_on = self
            .immediate_dependency_scheme(&original_id)
            .map(|s| vec![s])
            .unwrap_or_default();

        let config = MountConfig {
            protocol_scheme: scheme.to_string(),
            original_storable_id: original_id.into_string(),
            mount_name: display_name.to_string(),
            created_at: Utc::now(),
            depends_on,
            mount_type,
        };

        self.install_mount(scheme, config.clone(), folder).await?;

        let mut settings = self.settings();
        settings.upsert(config);
        self.save_settings(&settings)?;

        Ok(StorableId::root_of(scheme))
    }

    /// Installs the in-memory side of a mount: handler, mount table entry,
    /// archive-original-id uniqueness entry, and the `scheme://` cache
    /// entry. Shared by `mount()` and `restore()`.
    async fn install_mount(&self, scheme: &str, config: MountConfig, folder: Storable) -> CoreResult<()> {
        let underlying_native_id = self.resolve_alias_to_full(&StorableId::new(config.original_storable_id.clone()))?;

        let handler = Arc::new(MountedFolderHandler::new(scheme, folder.clone(), config.mount_name.clone()));
        self.handlers.insert(scheme.to_string(), handler);

        if config.mount_type == MountType::File {
            self.original_to_scheme.insert(underlying_native_id.as_str().to_string(), scheme.to_string());
        }

        self.mounts.insert(
            scheme.to_string(),
            MountedEntry { config, folder: folder.clone(), underlying_native_id },
        );

        self.cache.insert(format!("{scheme}://"), folder);
        Ok(())
    }

    /// Unmounts `scheme`. Flushes the folder view before disposing it;
    /// a flush failure is propagated so the caller can report it (spec
    /// §7: "archive flush-on-disposal logs and re-raises").
    #[instrument(skip(self))]
    pub async fn unmount(&self, scheme: &str) -> CoreResult<bool> {
        let _guard = self.mutation_lock.lock().await;

        let Some((_, entry)) = self.mounts.remove(scheme) else {
            return Ok(false);
        };

        let flush_result = entry.folder.flush().await;
        if let Err(e) = &flush_result {
            warn!(scheme, error = %e, "archive flush failed during unmount");
        }
        entry.folder.dispose().await?;
        flush_result?;

        self.handlers.remove(scheme);
        self.original_to_scheme.remove(entry.underlying_native_id.as_str());
        self.cache.remove(&format!("{scheme}://"));

        let mut settings = self.settings();
        settings.remove_scheme(scheme);
        self.save_settings(&settings)?;

        Ok(true)
    }

    /// Renames a mount's scheme and/or display name. Atomic from the
    /// perspective of subsequent lookups: the three in-memory maps and
    /// the `scheme://` cache entry are re-keyed together while holding
    /// the mutation lock.
    #[instrument(skip(self))]
    pub async fn rename(
        &self,
        current_scheme: &str,
        new_scheme: Option<&str>,
        new_name: Option<&str>,
    ) -> CoreResult<StorableId> {
        let _guard = self.mutation_lock.lock().await;

        if self.is_builtin(current_scheme) {
            return Err(CoreError::invalid_argument("cannot rename a built-in scheme"));
        }
        let Some((_, mut entry)) = self.mounts.remove(current_scheme) else {
            return Err(CoreError::not_found(current_scheme));
        };

        let target_scheme = new_scheme.unwrap_or(current_scheme).to_string();
        if target_scheme != current_scheme {
            validate_scheme(&target_scheme)?;
            if self.is_builtin(&target_scheme) || self.handlers.contains_key(&target_scheme) {
                // restore the entry we speculatively removed before failing
                self.mounts.insert(current_scheme.to_string(), entry);
                return Err(CoreError::conflict(format!("scheme '{target_scheme}' is already registered")));
            }
        }

        if let Some(name) = new_name {
            entry.config.mount_name = name.to_string();
        }
        entry.config.protocol_scheme = target_scheme.clone();

        if target_scheme != current_scheme {
            self.handlers.remove(current_scheme);
            self.cache.remove(&format!("{current_scheme}://"));
            let handler = Arc::new(MountedFolderHandler::new(
                target_scheme.clone(),
                entry.folder.clone(),
                entry.config.mount_name.clone(),
            ));
            self.handlers.insert(target_scheme.clone(), handler);
            self.cache.insert(format!("{target_scheme}://"), entry.folder.clone());
            if entry.config.mount_type == MountType::File {
                self.original_to_scheme.insert(entry.underlying_native_id.as_str().to_string(), target_scheme.clone());
            }
        }
        self.mounts.insert(target_scheme.clone(), entry.clone());

        let mut settings = self.settings();
        settings.remove_scheme(current_scheme);
        settings.upsert(entry.config.clone());
        self.save_settings(&settings)?;

        Ok(StorableId::root_of(&target_scheme))
    }

    pub fn list_mounts(&self) -> Vec<MountSummary> {
        self.mounts
            .iter()
            .map(|e| {
                let entry = e.value();
                MountSummary {
                    scheme: entry.config.protocol_scheme.clone(),
                    display_name: entry.config.mount_name.clone(),
                    root_uri: format!("{}://", entry.config.protocol_scheme),
                    backing_type_tag: match entry.config.mount_type {
                        MountType::Folder => "folder",
                        MountType::File => "archive",
                    },
                    mount_type: entry.config.mount_type,
                    original_id: entry.config.original_storable_id.clone(),
                }
            })
            .collect()
    }

    /// DFS from `source_id` over the "is under mount X, follow to X's
    /// underlying storable" edge relation. A cycle exists iff the walk
    /// reaches `target_scheme://` - which can happen directly (a
    /// self-referential `original_id`) or transitively through a chain
    /// of existing mounts whose stored `original_storable_id`s loop back
    /// on themselves (e.g. after hand-edited settings).
    fn would_cycle(&self, target_scheme: &str, source_id: &StorableId) -> bool {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(target_scheme.to_string());

        let mut current = source_id.scheme().map(|s| s.to_string());
        while let Some(scheme) = current {
            if visited.contains(&scheme) {
                return true;
            }
            let Some(entry) = self.mounts.get(&scheme) else { break };
            visited.insert(scheme);
            current = StorableId::new(entry.config.original_storable_id.clone())
                .scheme()
                .map(|s| s.to_string());
        }
        false
    }

    fn immediate_dependency_scheme(&self, id: &StorableId) -> Option<String> {
        let scheme = id.scheme()?;
        self.mounts.contains_key(scheme).then(|| scheme.to_string())
    }

    /// Loads persisted configurations, restores them in dependency order,
    /// and returns the `(scheme, error)` pairs for entries that failed.
    /// Failures never abort the loop (spec §7).
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Vec<(String, CoreError)> {
        let mut settings = self.settings();
        let ordered = topo_sort_configs(settings.mounts.clone());

        let mut failures = Vec::new();
        for config in ordered {
            if let Err(e) = self.restore_one(config.clone()).await {
                warn!(scheme = %config.protocol_scheme, error = %e, "mount restoration failed");
                failures.push((config.protocol_scheme.clone(), e));
            }
        }

        // Rewrite settings unconditionally: this is what persists the
        // dict->list and field-rename migrations applied during load.
        settings.mounts.retain(|c| !failures.iter().any(|(s, _)| s == &c.protocol_scheme));
        if let Err(e) = self.save_settings(&settings) {
            warn!(error = %e, "failed to persist settings after restore");
        }

        failures
    }

    async fn restore_one(&self, config: MountConfig) -> CoreResult<()> {
        let original = StorableId::new(config.original_storable_id.clone());
        let resolved = self.resolve_alias_to_full(&original)?;

        let materialized = match resolved.scheme() {
            Some(scheme) => {
                let handler = self
                    .handler_for(scheme)
                    .ok_or_else(|| CoreError::UnknownScheme { scheme: scheme.to_string(), known: self.known_schemes() })?;
                if handler.has_browsable_root() {
                    let root = handler.create_root(&StorableId::root_of(scheme)).await?;
                    let suffix = resolved.tail().unwrap_or("").trim_start_matches('/');
                    if suffix.is_empty() {
                        root
                    } else {
                        navigate_relative(root, suffix).await?
                    }
                } else {
                    handler.create_resource(&resolved).await?
                }
            }
            None => local::probe_path(Path::new(resolved.as_str()))
                .await?
                .ok_or_else(|| CoreError::not_found(resolved.as_str()))?,
        };

        let folder = match config.mount_type {
            MountType::Folder => match materialized {
                Storable::Folder(_) => materialized,
                Storable::File(_) => {
                    return Err(CoreError::invalid_argument(format!(
                        "'{}' resolved to a file, expected a folder",
                        config.original_storable_id
                    )))
                }
            },
            MountType::File => {
                let path = PathBuf::from(resolved.as_str());
                let parent_modifiable = match &materialized {
                    Storable::File(f) => f.is_modifiable(),
                    Storable::Folder(_) => true,
                };
                ArchiveMountAdapter::mount(path, parent_modifiable).await?
            }
        };

        self.install_mount(&config.protocol_scheme, config, folder).await
    }
}

/// Descends `root` along `relative` (a `/`-separated path with no leading
/// slash), matching child names at each step. Used only by restoration
/// (spec §4.B step 4), which is explicitly allowed to navigate a deep
/// alias chain - unlike the storable cache, which refuses to (spec §4.D
/// step 6) and asks callers to navigate themselves.
async fn navigate_relative(root: Storable, relative: &str) -> CoreResult<Storable> {
    let mut current = root;
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        let Some(folder) = current.as_folder() else {
            return Err(CoreError::invalid_argument(format!(
                "cannot navigate into '{segment}': parent is not a folder"
            )));
        };
        let children = folder.list_children().await?;
        current = children
            .into_iter()
            .find(|c| c.name() == segment)
            .ok_or_else(|| CoreError::not_found(segment))?;
    }
    Ok(current)
}

/// Kahn's algorithm over `depends_on` edges, ties broken by `created_at`
/// ascending. On cycle detection, the remaining (unorderable) entries are
/// emitted in creation order: resilience over strictness, per spec §4.B.
fn topo_sort_configs(mut configs: Vec<MountConfig>) -> Vec<MountConfig> {
    configs.sort_by_key(|c| c.created_at);

    let by_scheme: HashMap<String, MountConfig> =
        configs.iter().map(|c| (c.protocol_scheme.clone(), c.clone())).collect();
    let mut in_degree: HashMap<String, usize> =
        configs.iter().map(|c| (c.protocol_scheme.clone(), 0)).collect();
    for c in &configs {
        for dep in &c.depends_on {
            if by_scheme.contains_key(dep) {
                *in_degree.get_mut(&c.protocol_scheme).unwrap() += 1;
            }
        }
    }

    let mut ready: Vec<String> = in_degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(s, _)| s.clone())
        .collect();
    ready.sort_by_key(|s| by_scheme[s].created_at);

    let mut ordered = Vec::with_capacity(configs.len());
    let mut emitted: HashSet<String> = HashSet::new();

    while let Some(scheme) = ready.first().cloned() {
        ready.remove(0);
        if emitted.contains(&scheme) {
            continue;
        }
        emitted.insert(scheme.clone());
        ordered.push(by_scheme[&scheme].clone());

        let mut newly_ready = Vec::new();
        for c in &configs {
            if emitted.contains(&c.protocol_scheme) {
                continue;
            }
            if c.depends_on.contains(&scheme) {
                let deg = in_degree.get_mut(&c.protocol_scheme).unwrap();
                *deg = deg.saturating_sub(1);
                if *deg == 0 {
                    newly_ready.push(c.protocol_scheme.clone());
                }
            }
        }
        newly_ready.sort_by_key(|s| by_scheme[s].created_at);
        ready.extend(newly_ready);
        ready.sort_by_key(|s| by_scheme[s].created_at);
    }

    if ordered.len() < configs.len() {
        // Cycle: append whatever's left in creation order.
        for c in configs {
            if !emitted.contains(&c.protocol_scheme) {
                ordered.push(c);
            }
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scheme: &str, depends_on: &[&str], created_at: chrono::DateTime<Utc>) -> MountConfig {
        MountConfig {
            protocol_scheme: scheme.to_string(),
            original_storable_id: String::new(),
            mount_name: scheme.to_string(),
            created_at,
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            mount_type: MountType::Folder,
        }
    }

    #[test]
    fn topo_sort_orders_leaves_first() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);
        let t2 = t0 + chrono::Duration::seconds(2);
        let configs = vec![config("tasks", &["skills"], t2), config("skills", &[], t0), config("mem", &[], t1)];
        let ordered = topo_sort_configs(configs);
        let schemes: Vec<_> = ordered.iter().map(|c| c.protocol_scheme.as_str()).collect();
        let skills_idx = schemes.iter().position(|s| *s == "skills").unwrap();
        let tasks_idx = schemes.iter().position(|s| *s == "tasks").unwrap();
        assert!(skills_idx < tasks_idx);
    }

    #[test]
    fn topo_sort_cycle_falls_back_to_creation_order() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(1);
        let configs = vec![config("a", &["b"], t0), config("b", &["a"], t1)];
        let ordered = topo_sort_configs(configs);
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].protocol_scheme, "a");
        assert_eq!(ordered[1].protocol_scheme, "b");
    }
}
