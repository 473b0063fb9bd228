//! Storable Cache (spec §4.D): process-wide cache of materialized items,
//! keyed by both alias and native IDs, with inbound canonicalization.
//! Shares a compilation unit with the alias engine ([`crate::alias`]) per
//! the spec's own note that the two are mutually referenced.

use crate::error::{CoreError, CoreResult};
use crate::handler::local;
use crate::handler::ProtocolHandler;
use crate::registry::Registry;
use crate::storable::{Storable, StorableId};

impl Registry {
    /// Trims trailing `/` from scheme-form IDs of browsable schemes,
    /// except when the ID is exactly `scheme://`. Resource-only schemes
    /// and internal-form IDs pass through unchanged; idempotent.
    pub fn canonicalize(&self, id: &StorableId) -> StorableId {
        let Some(scheme) = id.scheme() else { return id.clone() };
        let browsable = self.handler_for(scheme).map(|h| h.has_browsable_root()).unwrap_or(false);
        if !browsable || id.is_root_of(scheme) {
            return id.clone();
        }
        let trimmed = id.as_str().trim_end_matches('/');
        if trimmed == format!("{scheme}://") {
            StorableId::root_of(scheme)
        } else {
            StorableId::new(trimmed.to_string())
        }
    }

    /// Resolves `id` to a materialized [`Storable`], registering it (and
    /// every alias that reached it) in the cache. Implements spec §4.D's
    /// eight-step lookup/registration algorithm.
    pub async fn ensure_registered(&self, id: &StorableId) -> CoreResult<Storable> {
        let canon = self.canonicalize(id);

        // Step 1: canonical form already cached under a different key.
        if canon.as_str() != id.as_str() {
            if let Some(hit) = self.cache.get(canon.as_str()) {
                let storable = hit.value().clone();
                self.cache.insert(id.as_str().to_string(), storable.clone());
                return Ok(storable);
            }
        }
        // Step 2: canonical form itself cached.
        if let Some(hit) = self.cache.get(canon.as_str()) {
            return Ok(hit.value().clone());
        }

        // Step 3: resolve through the alias engine; check the native form.
        let resolved = self.resolve_alias_to_full(&canon)?;
        if resolved.as_str() != canon.as_str() {
            if let Some(hit) = self.cache.get(resolved.as_str()) {
                let storable = hit.value().clone();
                self.cache.insert(canon.as_str().to_string(), storable.clone());
                if canon.as_str() != id.as_str() {
                    self.cache.insert(id.as_str().to_string(), storable.clone());
                }
                return Ok(storable);
            }
        }

        // Step 4: probe the local filesystem directly for internal-form IDs.
        if resolved.scheme().is_none() {
            if let Some(storable) = local::probe_path(std::path::Path::new(resolved.as_str())).await? {
                self.register(&id, &canon, &resolved, storable.clone());
                return Ok(storable);
            }
        }

        // Steps 5-8: scheme-form resolution through a protocol handler.
        let Some(scheme) = resolved.scheme() else {
            return Err(CoreError::not_found(resolved.as_str()));
        };
        let Some(handler) = self.handler_for(scheme) else {
            return Err(CoreError::UnknownScheme { scheme: scheme.to_string(), known: self.known_schemes() });
        };

        if handler.has_browsable_root() && !resolved.is_root_of(scheme) && !handler.needs_registration(&resolved) {
            return Err(CoreError::NavigationRequired {
                id: resolved.to_string(),
                root: format!("{scheme}://"),
                suffix: resolved.tail().unwrap_or("").to_string(),
            });
        }

        let storable = if !handler.has_browsable_root() {
            handler.create_resource(&resolved).await?
        } else if resolved.is_root_of(scheme) {
            let root = handler.create_root(&resolved).await?;
            if self.is_builtin(scheme) {
                self.builtin_roots.insert(scheme.to_string(), root.id());
            }
            root
        } else {
            // Browsable handler opting into lazy deep materialization.
            handler.create_resource(&resolved).await?
        };

        self.register(&id, &canon, &resolved, storable.clone());
        Ok(storable)
    }

    fn register(&self, id: &StorableId, canon: &StorableId, resolved: &StorableId, storable: Storable) {
        self.cache.insert(resolved.as_str().to_string(), storable.clone());
        if canon.as_str() != resolved.as_str() {
            self.cache.insert(canon.as_str().to_string(), storable.clone());
        }
        if id.as_str() != canon.as_str() {
            self.cache.insert(id.as_str().to_string(), storable);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn registry(root: &std::path::Path) -> Registry {
        Registry::with_roots(
            root.join("settings.json"),
            root.join("local-file-root"),
            root.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn canonicalize_trims_trailing_slash_for_browsable_scheme() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let id = StorableId::new("mfs://sub/dir/");
        assert_eq!(registry.canonicalize(&id).as_str(), "mfs://sub/dir");
        // idempotent
        let twice = registry.canonicalize(&registry.canonicalize(&id));
        assert_eq!(twice.as_str(), registry.canonicalize(&id).as_str());
    }

    #[tokio::test]
    async fn canonicalize_preserves_bare_root() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let id = StorableId::root_of("mfs");
        assert_eq!(registry.canonicalize(&id).as_str(), "mfs://");
    }

    #[tokio::test]
    async fn ensure_registered_materializes_root_once_and_caches() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let id = StorableId::root_of("mfs");
        let first = registry.ensure_registered(&id).await.unwrap();
        assert!(first.is_folder());
        assert!(registry.cache.contains_key("mfs://"));
    }

    #[tokio::test]
    async fn ensure_registered_rejects_deep_unseen_browsable_id() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        let registry = registry(dir.path());
        let id = StorableId::new("mfs://a/b");
        let err = registry.ensure_registered(&id).await.unwrap_err();
        assert!(matches!(err, CoreError::NavigationRequired { .. }));
    }

    #[tokio::test]
    async fn ensure_registered_unknown_scheme_lists_known_schemes() {
        let dir = tempdir().unwrap();
        let registry = registry(dir.path());
        let id = StorableId::new("nope://x");
        let err = registry.ensure_registered(&id).await.unwrap_err();
        match err {
            CoreError::UnknownScheme { scheme, known } => {
                assert_eq!(scheme, "nope");
                assert!(known.contains(&"mfs".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ensure_registered_probes_internal_form_paths() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("file.txt"), b"hi").unwrap();
        let registry = registry(dir.path());
        let id = StorableId::new(dir.path().join("file.txt").to_string_lossy().into_owned());
        let storable = registry.ensure_registered(&id).await.unwrap();
        assert!(!storable.is_folder());
    }
}
