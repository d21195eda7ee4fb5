//! Process-wide scheme registry
//!
//! Hosts that dispatch paths by scheme tag look providers up here. A path
//! carries a scheme when it contains a `:` at index 2 or later, so Windows
//! drive letters (`C:\data`) never read as schemes. Paths without a scheme
//! have no provider in this registry.

use crate::error::{Result, Zip2Error};
use crate::provider::FileSystemProvider;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::info;

type Providers = RwLock<HashMap<String, Arc<dyn FileSystemProvider>>>;

fn providers() -> &'static Providers {
    static PROVIDERS: OnceLock<Providers> = OnceLock::new();
    PROVIDERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Install a provider under its scheme, replacing any earlier one
pub fn register(provider: Arc<dyn FileSystemProvider>) {
    let scheme = provider.scheme().to_string();
    let replaced = providers().write().insert(scheme.clone(), provider).is_some();
    info!("Registered file system for scheme '{}' (replaced: {})", scheme, replaced);
}

/// Remove a scheme; returns the provider that was registered for it
pub fn unregister(scheme: &str) -> Option<Arc<dyn FileSystemProvider>> {
    let removed = providers().write().remove(scheme);
    if removed.is_some() {
        info!("Unregistered file system for scheme '{}'", scheme);
    }
    removed
}

/// Scheme tag of a path, if it has one
pub fn scheme_of(path: &str) -> Option<&str> {
    match path.find(':') {
        Some(idx) if idx >= 2 => Some(&path[..idx]),
        _ => None,
    }
}

/// Provider responsible for `path`
pub fn provider_for(path: &str) -> Result<Arc<dyn FileSystemProvider>> {
    let scheme = scheme_of(path).ok_or_else(|| Zip2Error::UnknownScheme(path.to_string()))?;
    providers()
        .read()
        .get(scheme)
        .cloned()
        .ok_or_else(|| Zip2Error::UnknownScheme(path.to_string()))
}

/// Registered scheme tags, sorted
pub fn registered_schemes() -> Vec<String> {
    let mut schemes: Vec<String> = providers().read().keys().cloned().collect();
    schemes.sort();
    schemes
}
