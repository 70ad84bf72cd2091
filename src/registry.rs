//! Provider catalog and activation.
//!
//! Two-stage lifecycle: implementations are registered into a
//! [`ProviderCatalog`] by an explicit call at process start (a table of
//! name → constructor, no import-time side effects), then
//! [`ProviderRegistry::activate`] instantiates every enabled entry from
//! configuration, applies prefix and capability overrides, elects exactly
//! one primary provider, and validates prefix uniqueness. Ambiguity is a
//! fatal activation error, never silently resolved.
//!
//! The registry is built once during startup and passed by reference to
//! the orchestrator and identifier mapper; there is no ambient global
//! lookup.

use crate::config::{CircuitBreakerSettings, GroupSyncConfig, ProviderSettings};
use crate::error::{ActivationError, ActivationResult, GroupSyncError, GroupSyncResult};
use crate::provider::{GroupProvider, ProviderCapabilities, ProviderHandle, ResilientProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Constructor for one provider, invoked during activation.
pub type ProviderFactory = Box<
    dyn Fn(&ProviderSettings, &CircuitBreakerSettings) -> ActivationResult<Arc<dyn ProviderHandle>>
        + Send
        + Sync,
>;

/// Static table of provider constructors.
///
/// Populated once at process start; no provider is instantiated until
/// activation.
#[derive(Default)]
pub struct ProviderCatalog {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider constructor under a name.
    ///
    /// The constructor receives the provider's configuration entry and
    /// returns the concrete [`GroupProvider`]; the catalog wraps it in a
    /// [`ResilientProvider`] so every activated provider is circuit-breaker
    /// guarded.
    pub fn register<P, F>(&mut self, name: impl Into<String>, constructor: F)
    where
        P: GroupProvider,
        F: Fn(&ProviderSettings) -> ActivationResult<P> + Send + Sync + 'static,
    {
        let name = name.into();
        self.factories.insert(
            name,
            Box::new(move |settings, breaker| {
                let provider = constructor(settings)?;
                Ok(Arc::new(ResilientProvider::new(provider, breaker.into()))
                    as Arc<dyn ProviderHandle>)
            }),
        );
    }

    /// Register a raw factory producing an already-wrapped handle.
    pub fn register_factory(&mut self, name: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Names of all registered providers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn get(&self, name: &str) -> Option<&ProviderFactory> {
        self.factories.get(name)
    }
}

/// One activated provider with its post-override view.
pub struct ActiveProvider {
    handle: Arc<dyn ProviderHandle>,
    capabilities: ProviderCapabilities,
    prefix: String,
}

impl ActiveProvider {
    /// The circuit-breaker-wrapped provider handle.
    pub fn handle(&self) -> Arc<dyn ProviderHandle> {
        self.handle.clone()
    }

    /// Capabilities after configuration overrides.
    pub fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    /// Effective group-name prefix; empty string means the provider opted
    /// out of prefix-based parsing.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Live registry of activated providers with an elected primary.
pub struct ProviderRegistry {
    providers: HashMap<String, ActiveProvider>,
    primary: String,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("primary", &self.primary)
            .finish()
    }
}

impl ProviderRegistry {
    /// Instantiate and activate every enabled provider from configuration.
    ///
    /// Primary election, applied once after all providers are instantiated:
    /// exactly one provider with `is_primary` wins; otherwise a single
    /// active provider is primary by default; otherwise activation fails.
    /// Prefix uniqueness across active providers is validated at the same
    /// time.
    pub fn activate(
        catalog: &ProviderCatalog,
        config: &GroupSyncConfig,
    ) -> ActivationResult<Self> {
        let mut providers = HashMap::new();
        let mut prefix_owners: HashMap<String, String> = HashMap::new();

        // Deterministic activation order regardless of map iteration.
        let mut names: Vec<&String> = config.providers.keys().collect();
        names.sort_unstable();

        for name in names {
            let settings = &config.providers[name];
            if !settings.enabled {
                log::debug!("provider '{name}' disabled by configuration, skipping");
                continue;
            }
            let factory = catalog
                .get(name)
                .ok_or_else(|| ActivationError::UnknownProvider { name: name.clone() })?;
            let handle = factory(settings, &config.circuit_breaker)?;
            let capabilities = settings.effective_capabilities(handle.capabilities());
            let prefix = match &settings.prefix {
                Some(explicit) => explicit.clone(),
                None => name.clone(),
            };

            if !prefix.is_empty() {
                if let Some(owner) = prefix_owners.get(&prefix) {
                    return Err(ActivationError::PrefixCollision {
                        prefix,
                        first: owner.clone(),
                        second: name.clone(),
                    });
                }
                prefix_owners.insert(prefix.clone(), name.clone());
            }

            log::info!(
                "activated provider '{name}' (prefix '{prefix}', primary: {})",
                capabilities.is_primary
            );
            providers.insert(
                name.clone(),
                ActiveProvider {
                    handle,
                    capabilities,
                    prefix,
                },
            );
        }

        let primary = Self::elect_primary(&providers)?;
        log::info!("elected primary provider '{primary}'");
        Ok(Self { providers, primary })
    }

    fn elect_primary(providers: &HashMap<String, ActiveProvider>) -> ActivationResult<String> {
        let mut declared: Vec<&String> = providers
            .iter()
            .filter(|(_, p)| p.capabilities.is_primary)
            .map(|(name, _)| name)
            .collect();
        declared.sort_unstable();

        match declared.len() {
            1 => Ok(declared[0].clone()),
            0 if providers.len() == 1 => {
                // Sole active provider is primary by default.
                Ok(providers.keys().next().cloned().unwrap_or_default())
            }
            0 => Err(ActivationError::NoPrimary {
                active: providers.len(),
            }),
            _ => Err(ActivationError::AmbiguousPrimary {
                candidates: declared.into_iter().cloned().collect(),
            }),
        }
    }

    /// Look up an active provider by name.
    pub fn get(&self, name: &str) -> Option<&ActiveProvider> {
        self.providers.get(name)
    }

    /// Look up a provider handle, failing with a classified error.
    pub fn handle(&self, name: &str) -> GroupSyncResult<Arc<dyn ProviderHandle>> {
        self.providers
            .get(name)
            .map(ActiveProvider::handle)
            .ok_or_else(|| GroupSyncError::UnknownProvider(name.to_string()))
    }

    /// Name of the elected primary provider.
    pub fn primary_name(&self) -> &str {
        &self.primary
    }

    /// Handle of the elected primary provider.
    pub fn primary_handle(&self) -> Arc<dyn ProviderHandle> {
        self.providers[&self.primary].handle()
    }

    /// Whether the named provider is the elected primary.
    pub fn is_primary(&self, name: &str) -> bool {
        self.primary == name
    }

    /// Sorted names of all active providers.
    pub fn active_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Effective prefix for one provider, if active.
    pub fn effective_prefix(&self, name: &str) -> Option<&str> {
        self.providers.get(name).map(ActiveProvider::prefix)
    }

    /// All `(prefix, provider)` pairs with non-empty prefixes.
    ///
    /// This is the input to longest-prefix matching in the identifier
    /// mapper; empty prefixes are skipped.
    pub fn prefix_table(&self) -> Vec<(String, String)> {
        let mut table: Vec<(String, String)> = self
            .providers
            .iter()
            .filter(|(_, p)| !p.prefix.is_empty())
            .map(|(name, p)| (p.prefix.clone(), name.clone()))
            .collect();
        table.sort_unstable();
        table
    }

    /// Resolve the provider owning a prefix, if any.
    pub fn provider_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.providers
            .iter()
            .find(|(_, p)| !p.prefix.is_empty() && p.prefix == prefix)
            .map(|(name, _)| name.as_str())
    }
}
