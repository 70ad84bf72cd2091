//! Identifier mapping between canonical and provider-qualified group names.
//!
//! Canonical group names are shaped like the primary provider's naming
//! convention; secondary providers' groups appear inside the primary under
//! a compound name `{prefix}-{canonical}`. Parsing back out uses
//! longest-prefix matching across all active providers' effective prefixes
//! so that overlapping prefixes (`a` and `ab`) resolve deterministically:
//! the longest match wins, and equal-length ties break lexicographically.
//!
//! Everything here is a pure function over the registry (or an explicit
//! prefix list for batch paths where no registry is available).

use crate::error::{GroupSyncError, GroupSyncResult};
use crate::registry::ProviderRegistry;

/// Separators tried, in order, when splitting a compound group name.
pub const SEPARATORS: [char; 3] = [':', '/', '-'];

/// Result of parsing a primary-style group name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGroupName {
    /// Matched provider prefix; empty when no prefix matched.
    pub prefix: String,
    /// Provider-neutral remainder of the name.
    pub canonical: String,
}

/// Parse a primary-style group name into `{prefix, canonical}`.
///
/// Each active provider contributes its effective prefix (explicit
/// configured prefix, else provider name; empty prefixes are skipped).
/// When no prefix matches, the whole name is canonical with an empty
/// prefix, after dropping any email domain part (`devteam@example.com`
/// parses to canonical `devteam`).
pub fn parse_primary_group_name(name: &str, registry: &ProviderRegistry) -> ParsedGroupName {
    let prefixes: Vec<String> = registry
        .prefix_table()
        .into_iter()
        .map(|(prefix, _)| prefix)
        .collect();

    match best_prefix_match(name, &prefixes) {
        Some((prefix, canonical)) => ParsedGroupName { prefix, canonical },
        None => ParsedGroupName {
            prefix: String::new(),
            canonical: strip_email_domain(name).to_string(),
        },
    }
}

/// Strip a known prefix from a primary-style name, registry-free.
///
/// Used by list-and-associate batch operations that carry an explicit
/// prefix list instead of a live registry. Names with no matching prefix
/// are returned unchanged.
pub fn primary_group_to_canonical(name: &str, prefixes: &[String]) -> String {
    match best_prefix_match(name, prefixes) {
        Some((_, canonical)) => canonical,
        None => name.to_string(),
    }
}

/// Compose a canonical name into its primary-style compound form.
pub fn canonical_to_primary_group(canonical: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        canonical.to_string()
    } else {
        format!("{prefix}-{canonical}")
    }
}

/// Translate a group identifier between two providers.
///
/// Same-provider mapping is the identity. Mapping into the primary
/// composes `{prefix}-{group_id}`; mapping out of the primary parses the
/// compound name and returns the bare canonical. Mapping between two
/// non-primary providers is not directly supported and must round-trip
/// through the canonical form. Unknown provider names are classified
/// errors, never a silent fallback.
pub fn map_provider_group_id(
    from: &str,
    group_id: &str,
    to: &str,
    registry: &ProviderRegistry,
) -> GroupSyncResult<String> {
    if registry.get(from).is_none() {
        return Err(GroupSyncError::UnknownSourceProvider(from.to_string()));
    }
    if registry.get(to).is_none() {
        return Err(GroupSyncError::UnknownTargetProvider(to.to_string()));
    }
    if from == to {
        return Ok(group_id.to_string());
    }
    if registry.is_primary(to) {
        let prefix = registry.effective_prefix(from).unwrap_or_default();
        return Ok(canonical_to_primary_group(group_id, prefix));
    }
    if registry.is_primary(from) {
        return Ok(parse_primary_group_name(group_id, registry).canonical);
    }
    Err(GroupSyncError::UnsupportedMapping {
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// Find the longest matching prefix across all separators.
///
/// Returns `(prefix, remainder)` for the winning match. Ties on length
/// break lexicographically (smallest prefix wins); in practice prefix
/// uniqueness makes equal-length ties impossible for distinct providers,
/// but the rule keeps the function total and deterministic.
fn best_prefix_match(name: &str, prefixes: &[String]) -> Option<(String, String)> {
    let mut best: Option<(&String, &str)> = None;

    for sep in SEPARATORS {
        for prefix in prefixes {
            if prefix.is_empty() {
                continue;
            }
            let Some(rest) = name.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let Some(rest) = rest.strip_prefix(sep) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, _)) => {
                    prefix.len() > current.len()
                        || (prefix.len() == current.len() && prefix < current)
                }
            };
            if better {
                best = Some((prefix, rest));
            }
        }
    }

    best.map(|(prefix, rest)| (prefix.clone(), rest.to_string()))
}

fn strip_email_domain(name: &str) -> &str {
    name.split('@').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupSyncConfig, ProviderSettings};
    use crate::operation::OperationResult;
    use crate::provider::{GroupProvider, ProviderCapabilities, ProviderError};
    use crate::registry::ProviderCatalog;

    struct NamedProvider {
        name: String,
        primary: bool,
    }

    impl GroupProvider for NamedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                is_primary: self.primary,
                ..Default::default()
            }
        }

        async fn add_member(
            &self,
            _group_key: &str,
            _email: &str,
        ) -> Result<OperationResult, ProviderError> {
            Ok(OperationResult::success("ok"))
        }

        async fn remove_member(
            &self,
            _group_key: &str,
            _email: &str,
        ) -> Result<OperationResult, ProviderError> {
            Ok(OperationResult::success("ok"))
        }

        async fn list_members(&self, _group_key: &str) -> Result<OperationResult, ProviderError> {
            Ok(OperationResult::success("ok"))
        }

        async fn list_groups(&self) -> Result<OperationResult, ProviderError> {
            Ok(OperationResult::success("ok"))
        }

        async fn health_check(&self) -> Result<OperationResult, ProviderError> {
            Ok(OperationResult::success("ok"))
        }
    }

    /// Registry with primary `google` and secondary `aws`, default prefixes.
    fn registry_with(entries: &[(&str, bool, Option<&str>)]) -> ProviderRegistry {
        let mut catalog = ProviderCatalog::new();
        let mut config = GroupSyncConfig::default();
        for (name, primary, prefix) in entries {
            let name_owned = name.to_string();
            let primary = *primary;
            catalog.register(*name, move |_s| {
                Ok(NamedProvider {
                    name: name_owned.clone(),
                    primary,
                })
            });
            config.providers.insert(
                name.to_string(),
                ProviderSettings {
                    prefix: prefix.map(str::to_string),
                    ..Default::default()
                },
            );
        }
        ProviderRegistry::activate(&catalog, &config).unwrap()
    }

    fn standard_registry() -> ProviderRegistry {
        registry_with(&[("google", true, None), ("aws", false, None)])
    }

    #[test]
    fn parses_prefixed_name_to_provider_and_canonical() {
        let registry = standard_registry();
        let parsed = parse_primary_group_name("aws-devteam", &registry);
        assert_eq!(parsed.prefix, "aws");
        assert_eq!(parsed.canonical, "devteam");
    }

    #[test]
    fn unprefixed_name_is_canonical_with_empty_prefix() {
        let registry = standard_registry();
        let parsed = parse_primary_group_name("devteam", &registry);
        assert_eq!(parsed.prefix, "");
        assert_eq!(parsed.canonical, "devteam");
    }

    #[test]
    fn email_domain_is_stripped_when_no_prefix_matches() {
        let registry = standard_registry();
        let parsed = parse_primary_group_name("devteam@example.com", &registry);
        assert_eq!(parsed.prefix, "");
        assert_eq!(parsed.canonical, "devteam");
    }

    #[test]
    fn longest_prefix_wins_over_strict_prefix_of_it() {
        let registry = registry_with(&[
            ("google", true, None),
            ("a", false, Some("a")),
            ("ab", false, Some("ab")),
        ]);
        let parsed = parse_primary_group_name("ab-x", &registry);
        assert_eq!(parsed.prefix, "ab");
        assert_eq!(parsed.canonical, "x");

        // The shorter prefix still matches names it alone can claim.
        let parsed = parse_primary_group_name("a-x", &registry);
        assert_eq!(parsed.prefix, "a");
        assert_eq!(parsed.canonical, "x");
    }

    #[test]
    fn all_separators_are_recognized() {
        let registry = standard_registry();
        for name in ["aws:devteam", "aws/devteam", "aws-devteam"] {
            let parsed = parse_primary_group_name(name, &registry);
            assert_eq!(parsed.prefix, "aws", "for {name}");
            assert_eq!(parsed.canonical, "devteam", "for {name}");
        }
    }

    #[test]
    fn separator_with_empty_remainder_is_not_a_match() {
        let registry = standard_registry();
        let parsed = parse_primary_group_name("aws-", &registry);
        assert_eq!(parsed.prefix, "");
        assert_eq!(parsed.canonical, "aws-");
    }

    #[test]
    fn registry_free_canonicalization() {
        let prefixes = vec!["aws".to_string(), "okta".to_string()];
        assert_eq!(primary_group_to_canonical("aws-devteam", &prefixes), "devteam");
        assert_eq!(primary_group_to_canonical("devteam", &prefixes), "devteam");
    }

    #[test]
    fn compose_canonical_to_primary() {
        assert_eq!(canonical_to_primary_group("devteam", "aws"), "aws-devteam");
        assert_eq!(canonical_to_primary_group("devteam", ""), "devteam");
    }

    #[test]
    fn same_provider_mapping_is_identity() {
        let registry = standard_registry();
        assert_eq!(
            map_provider_group_id("aws", "devteam", "aws", &registry).unwrap(),
            "devteam"
        );
    }

    #[test]
    fn mapping_into_primary_composes_prefix() {
        let registry = standard_registry();
        assert_eq!(
            map_provider_group_id("aws", "devteam", "google", &registry).unwrap(),
            "aws-devteam"
        );
    }

    #[test]
    fn mapping_out_of_primary_parses_canonical() {
        let registry = standard_registry();
        assert_eq!(
            map_provider_group_id("google", "aws-devteam", "aws", &registry).unwrap(),
            "devteam"
        );
    }

    #[test]
    fn round_trip_through_primary_is_lossless() {
        let registry = standard_registry();
        let into = map_provider_group_id("aws", "devteam", "google", &registry).unwrap();
        let back = map_provider_group_id("google", &into, "aws", &registry).unwrap();
        assert_eq!(back, "devteam");
    }

    #[test]
    fn non_primary_to_non_primary_is_unsupported() {
        let registry = registry_with(&[
            ("google", true, None),
            ("aws", false, None),
            ("okta", false, None),
        ]);
        let err = map_provider_group_id("aws", "devteam", "okta", &registry).unwrap_err();
        assert!(matches!(err, GroupSyncError::UnsupportedMapping { .. }));
    }

    #[test]
    fn unknown_providers_are_classified_errors() {
        let registry = standard_registry();
        let err = map_provider_group_id("azure", "g", "google", &registry).unwrap_err();
        assert_eq!(err.to_string(), "Unknown source provider: azure");
        let err = map_provider_group_id("google", "g", "azure", &registry).unwrap_err();
        assert_eq!(err.to_string(), "Unknown target provider: azure");
    }
}
