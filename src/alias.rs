//! Alias Engine (spec §4.C): pure string substitution between native IDs
//! and the `scheme://` aliases mounts and built-in roots provide. Lives
//! next to the storable cache in [`crate::cache`] - the two share a
//! compilation unit, per the spec's own note that they're mutually
//! referenced (cache uses the engine during lookup; the engine consults
//! handler introspection the cache also drives).

use crate::error::{CoreError, CoreResult};
use crate::registry::Registry;
use crate::storable::StorableId;

const MAX_ALIAS_DEPTH: u32 = 10;

impl Registry {
    /// Native → alias. Finds the longest mount (or materialized browsable
    /// built-in root) whose underlying native ID is a leading substring of
    /// `full_id`, replaces that prefix with `scheme://`, and recurses to a
    /// fixed point so chained mounts fully collapse.
    pub fn substitute_with_alias(&self, full_id: &StorableId) -> StorableId {
        let mut current = full_id.as_str().to_string();

        loop {
            let mut best: Option<(String, usize)> = None; // (scheme, prefix_len)

            for entry in self.mounts.iter() {
                let prefix = entry.value().underlying_native_id.as_str();
                if !prefix.is_empty() && current.starts_with(prefix) {
                    let better = match &best {
                        Some((_, len)) => prefix.len() > *len,
                        None => true,
                    };
                    if better {
                        best = Some((entry.key().clone(), prefix.len()));
                    }
                }
            }

            for root in self.builtin_roots.iter() {
                let prefix = root.value().as_str();
                if !prefix.is_empty() && current.starts_with(prefix) {
                    let better = match &best {
                        Some((_, len)) => prefix.len() > *len,
                        None => true,
                    };
                    if better {
                        best = Some((root.key().clone(), prefix.len()));
                    }
                }
            }

            match best {
                Some((scheme, prefix_len)) => {
                    let remainder = current[prefix_len..].trim_start_matches(['/', '\\']);
                    let next =
                        if remainder.is_empty() { format!("{scheme}://") } else { format!("{scheme}://{remainder}") };
                    if next == current {
                        return StorableId::new(next);
                    }
                    current = next;
                }
                None => return StorableId::new(current),
            }
        }
    }

    /// Alias → native. Repeatedly replaces `scheme://` with the mount's
    /// underlying native ID, or with a materialized browsable built-in
    /// root's native ID, while `scheme` names either one, up to
    /// `max_depth` substitutions. Symmetric with `substitute_with_alias`,
    /// which performs the same two lookups in the opposite direction.
    pub fn resolve_alias_to_full(&self, alias_id: &StorableId) -> CoreResult<StorableId> {
        let mut current = alias_id.clone();
        let mut depth = 0u32;

        loop {
            let Some(scheme) = current.scheme() else { break };
            let remainder = current.tail().unwrap_or("");

            let native = if let Some(entry) = self.mounts.get(scheme) {
                // An archive mount's native form only names the archive
                // *file* itself; entries inside it have no filesystem-path
                // counterpart to compose with, so a deep id under such a
                // mount is left in scheme form (the cache's navigation gate
                // then applies).
                if !remainder.is_empty() && entry.config.mount_type == crate::mount::MountType::File {
                    break;
                }
                entry.underlying_native_id.as_str().to_string()
            } else if let Some(root) = self.builtin_roots.get(scheme) {
                root.as_str().to_string()
            } else {
                break;
            };

            if depth >= MAX_ALIAS_DEPTH {
                return Err(CoreError::AliasDepthExceeded { id: alias_id.to_string(), max_depth: MAX_ALIAS_DEPTH });
            }
            let next = if remainder.is_empty() {
                native
            } else if native.ends_with('/') || native.ends_with('\\') {
                format!("{native}{remainder}")
            } else {
                format!("{native}/{remainder}")
            };
            current = StorableId::new(next);
            depth += 1;
        }

        Ok(current)
    }

    /// Scans `s` for whitespace/quote-delimited tokens starting with a
    /// known scheme prefix and replaces each with its resolved native
    /// form. Used by consumers that accept free-text input referencing
    /// storable IDs (e.g. a CLI argument embedding a `skills://` path).
    pub fn resolve_aliases_in_text(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for token in split_keeping_delimiters(s) {
            if token.chars().next().map(|c| c.is_whitespace() || c == '"' || c == '\'').unwrap_or(false) {
                out.push_str(token);
                continue;
            }
            let candidate = token.trim_matches(['"', '\'']);
            if let Some(scheme) = StorableId::new(candidate.to_string()).scheme() {
                if self.mounts.contains_key(scheme) {
                    if let Ok(resolved) = self.resolve_alias_to_full(&StorableId::new(candidate.to_string())) {
                        let prefix_len = token.len() - token.trim_start_matches(['"', '\'']).len();
                        let suffix_len = token.len() - token.trim_end_matches(['"', '\'']).len();
                        out.push_str(&token[..prefix_len]);
                        out.push_str(resolved.as_str());
                        out.push_str(&token[token.len() - suffix_len..]);
                        continue;
                    }
                }
            }
            out.push_str(token);
        }
        out
    }
}

/// Splits `s` into alternating whitespace and non-whitespace runs,
/// preserving every byte (`out.concat() == s`).
fn split_keeping_delimiters(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_space = s.chars().next().map(|c| c.is_whitespace()).unwrap_or(false);
    for (i, c) in s.char_indices() {
        if c.is_whitespace() != in_space {
            out.push(&s[start..i]);
            start = i;
            in_space = c.is_whitespace();
        }
    }
    out.push(&s[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{MountConfig, MountType};
    use crate::storable::{FolderStorable, Storable, StorableNode};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    struct StubFolder(&'static str);
    impl StorableNode for StubFolder {
        fn id(&self) -> StorableId {
            StorableId::new(self.0)
        }
        fn name(&self) -> String {
            self.0.to_string()
        }
    }
    #[async_trait]
    impl FolderStorable for StubFolder {
        fn is_modifiable(&self) -> bool {
            true
        }
        async fn list_children(&self) -> CoreResult<Vec<Storable>> {
            Ok(Vec::new())
        }
    }

    fn registry_with_mount(scheme: &str, native: &str) -> Registry {
        let registry = Registry::for_test(std::env::temp_dir().join("alias-test-settings.json"));
        registry.mounts.insert(
            scheme.to_string(),
            crate::mount::MountedEntry {
                config: MountConfig {
                    protocol_scheme: scheme.to_string(),
                    original_storable_id: native.to_string(),
                    mount_name: scheme.to_string(),
                    created_at: Utc::now(),
                    depends_on: Vec::new(),
                    mount_type: MountType::Folder,
                },
                folder: Storable::Folder(Arc::new(StubFolder("root"))),
                underlying_native_id: StorableId::new(native),
            },
        );
        registry
    }

    #[test]
    fn substitute_and_resolve_round_trip() {
        let registry = registry_with_mount("skills", "/home/user/skills");
        let native = StorableId::new("/home/user/skills/pending/task.md");
        let alias = registry.substitute_with_alias(&native);
        assert_eq!(alias.as_str(), "skills://pending/task.md");

        let back = registry.resolve_alias_to_full(&alias).unwrap();
        assert_eq!(back.as_str(), native.as_str());
    }

    #[test]
    fn substitute_root_has_no_trailing_slash_issue() {
        let registry = registry_with_mount("skills", "/home/user/skills");
        let native = StorableId::new("/home/user/skills");
        assert_eq!(registry.substitute_with_alias(&native).as_str(), "skills://");
    }

    #[test]
    fn unrelated_id_is_unchanged() {
        let registry = registry_with_mount("skills", "/home/user/skills");
        let native = StorableId::new("/var/log/syslog");
        assert_eq!(registry.substitute_with_alias(&native).as_str(), native.as_str());
    }

    #[test]
    fn depth_exceeded_is_reported() {
        let registry = Registry::for_test(std::env::temp_dir().join("alias-depth-settings.json"));
        // Build a chain scheme_0 -> scheme_1 -> ... -> scheme_11 (self-referential loop,
        // simulating corrupted settings) to exercise the max-depth guard.
        for i in 0..12 {
            let scheme = format!("s{i}");
            let native = format!("s{}://x", i + 1);
            registry.mounts.insert(
                scheme.clone(),
                crate::mount::MountedEntry {
                    config: MountConfig {
                        protocol_scheme: scheme.clone(),
                        original_storable_id: native.clone(),
                        mount_name: scheme.clone(),
                        created_at: Utc::now(),
                        depends_on: Vec::new(),
                        mount_type: MountType::Folder,
                    },
                    folder: Storable::Folder(Arc::new(StubFolder("root"))),
                    underlying_native_id: StorableId::new(native),
                },
            );
        }
        let result = registry.resolve_alias_to_full(&StorableId::new("s0://x"));
        assert!(matches!(result, Err(CoreError::AliasDepthExceeded { .. })));
    }

    #[test]
    fn resolve_aliases_in_text_replaces_known_tokens() {
        let registry = registry_with_mount("skills", "/home/user/skills");
        let text = r#"open "skills://pending/task.md" please"#;
        let replaced = registry.resolve_aliases_in_text(text);
        assert_eq!(replaced, r#"open "/home/user/skills/pending/task.md" please"#);
    }
}
