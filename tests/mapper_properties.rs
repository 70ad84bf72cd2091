//! Property tests for group-name mapping.

mod common;

use common::{ScriptState, ScriptedProvider};
use group_sync::{
    GroupSyncConfig, ProviderCatalog, ProviderRegistry, ProviderSettings,
    canonical_to_primary_group, map_provider_group_id, parse_primary_group_name,
    primary_group_to_canonical,
};
use proptest::prelude::*;
use std::sync::Arc;

/// Primary `google` plus secondaries carrying the given prefixes.
fn registry(prefixes: &[String]) -> ProviderRegistry {
    let mut catalog = ProviderCatalog::new();
    let mut config = GroupSyncConfig::default();

    catalog.register("google", |_s| {
        Ok(ScriptedProvider::new(
            "google",
            true,
            Arc::new(ScriptState::default()),
        ))
    });
    config
        .providers
        .insert("google".to_string(), ProviderSettings::default());

    for (i, prefix) in prefixes.iter().enumerate() {
        let name = format!("secondary{i}");
        {
            let name = name.clone();
            catalog.register(name.clone(), move |_s| {
                Ok(ScriptedProvider::new(
                    &name,
                    false,
                    Arc::new(ScriptState::default()),
                ))
            });
        }
        config.providers.insert(
            name,
            ProviderSettings {
                prefix: Some(prefix.clone()),
                ..Default::default()
            },
        );
    }

    ProviderRegistry::activate(&catalog, &config).unwrap()
}

proptest! {
    /// Composing a canonical name under a prefix and stripping it again is
    /// lossless, for any canonical name free of separator characters.
    #[test]
    fn compose_then_strip_is_identity(
        prefix in "[a-z]{1,8}",
        canonical in "[a-z0-9_]{1,20}",
    ) {
        let composed = canonical_to_primary_group(&canonical, &prefix);
        let stripped = primary_group_to_canonical(&composed, &[prefix.clone()]);
        prop_assert_eq!(stripped, canonical);
    }

    /// Mapping a secondary group id into the primary and back returns the
    /// original id, through a live registry.
    #[test]
    fn round_trip_through_primary_registry(
        prefix in "[a-f]{1,6}",
        group_id in "[a-z0-9_]{1,16}",
    ) {
        let registry = registry(&[prefix]);
        let into = map_provider_group_id("secondary0", &group_id, "google", &registry).unwrap();
        let back = map_provider_group_id("google", &into, "secondary0", &registry).unwrap();
        prop_assert_eq!(back, group_id);
    }

    /// With overlapping prefixes, the longer one always wins for names it
    /// fully matches.
    #[test]
    fn longest_prefix_wins(
        short in "[a-f]{1,5}",
        ext in "[a-f]{1,5}",
        rest in "[a-z0-9]{1,10}",
        sep in prop::sample::select(vec![':', '/', '-']),
    ) {
        let long = format!("{short}{ext}");
        let registry = registry(&[short.clone(), long.clone()]);
        let name = format!("{long}{sep}{rest}");
        let parsed = parse_primary_group_name(&name, &registry);
        prop_assert_eq!(parsed.prefix, long);
        prop_assert_eq!(parsed.canonical, rest);
    }

    /// Names matching no active prefix pass through canonicalization
    /// unchanged.
    #[test]
    fn unmatched_names_are_unchanged(
        name in "[0-9]{1,12}",
        prefixes in prop::collection::vec("[a-z]{1,6}", 0..4),
    ) {
        prop_assert_eq!(primary_group_to_canonical(&name, &prefixes), name);
    }
}
