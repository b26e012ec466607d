pub mod dispatch;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::RoutingConfig;

/// How a client model name was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Listed in the routing table.
    Mapped,
    /// Unknown name that looked like a large/premium tier.
    FallbackLarge,
    /// Any other unknown name.
    FallbackSmall,
}

/// The resolved backend target for a request.
#[derive(Debug, Clone, Copy)]
pub struct RouteTarget<'a> {
    pub backend_model: &'a str,
    pub kind: RouteKind,
}

/// Maps client-facing model names to backend model identifiers.
///
/// Built once from config and read-only afterwards. Resolution never fails:
/// names missing from the table fall back to one of two configured models.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    model_index: FxHashMap<String, Arc<str>>,
    /// Client-facing names in config order, for `/v1/models`.
    client_models: Vec<Arc<str>>,
    large_markers: Vec<String>,
    fallback_large: Arc<str>,
    fallback_small: Arc<str>,
}

impl ModelRouter {
    /// Build a `ModelRouter` from the routing configuration.
    ///
    /// Entries without a colon are skipped here; config validation rejects them
    /// before a router is ever built from a loaded file.
    #[must_use]
    pub fn new(config: &RoutingConfig) -> Self {
        let mut model_index: FxHashMap<String, Arc<str>> = FxHashMap::default();
        let mut client_models = Vec::with_capacity(config.models.len());
        let mut interned: FxHashMap<&str, Arc<str>> = FxHashMap::default();

        for entry in &config.models {
            let Some((alias, backend_model)) = entry.split_once(':') else {
                continue;
            };
            let backend_model = interned
                .entry(backend_model)
                .or_insert_with(|| Arc::from(backend_model))
                .clone();
            if model_index.insert(alias.to_string(), backend_model).is_none() {
                client_models.push(Arc::from(alias));
            }
        }

        Self {
            model_index,
            client_models,
            large_markers: config
                .large_markers
                .iter()
                .map(|marker| marker.to_lowercase())
                .collect(),
            fallback_large: Arc::from(config.fallback_large.as_str()),
            fallback_small: Arc::from(config.fallback_small.as_str()),
        }
    }

    /// Backend model id for `client_model`.
    #[must_use]
    pub fn resolve(&self, client_model: &str) -> &str {
        self.route(client_model).backend_model
    }

    /// Resolve and report which rule matched.
    ///
    /// Lookup is exact first; on a miss the lowercased name is checked for any
    /// large-tier marker.
    #[must_use]
    pub fn route(&self, client_model: &str) -> RouteTarget<'_> {
        if let Some(backend_model) = self.model_index.get(client_model) {
            return RouteTarget {
                backend_model,
                kind: RouteKind::Mapped,
            };
        }

        let lowered = client_model.to_lowercase();
        if self
            .large_markers
            .iter()
            .any(|marker| lowered.contains(marker.as_str()))
        {
            RouteTarget {
                backend_model: &self.fallback_large,
                kind: RouteKind::FallbackLarge,
            }
        } else {
            RouteTarget {
                backend_model: &self.fallback_small,
                kind: RouteKind::FallbackSmall,
            }
        }
    }

    #[must_use]
    pub fn client_models(&self) -> &[Arc<str>] {
        &self.client_models
    }

    #[must_use]
    pub fn known_model_count(&self) -> usize {
        self.model_index.len()
    }
}
