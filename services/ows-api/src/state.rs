//! Application state and shared resources.

use std::sync::Arc;

use anyhow::{bail, Result};
use ows_common::Protocol;
use ows_protocol::{ServiceContext, VersionRegistry};
use tracing::info;

use crate::backends::build_dispatcher;
use crate::config::ServiceConfig;
use crate::metrics::MetricsCollector;

/// Shared application state. Built once at startup, read-only afterwards.
pub struct AppState {
    pub context: Arc<ServiceContext>,
    pub config: ServiceConfig,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let registry = build_registry(&config)?;
        let dispatcher = build_dispatcher(&config, &registry)?;
        let context = ServiceContext::new(registry, dispatcher).with_fault_status(config.fault_status);

        Ok(Self {
            context: Arc::new(context),
            config,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    /// Protocols with at least one codec, for the readiness check.
    pub fn protocols(&self) -> Vec<Protocol> {
        self.context.registry().protocols().collect()
    }
}

/// The default codec set narrowed to the protocols and versions the
/// configuration enables.
pub fn build_registry(config: &ServiceConfig) -> Result<VersionRegistry> {
    let mut registry = VersionRegistry::with_default_codecs()?;

    for protocol in registry.protocols().collect::<Vec<_>>() {
        match config.enabled_versions(protocol)? {
            None => {}
            Some(versions) if versions.is_empty() => registry.remove_protocol(protocol),
            Some(versions) => {
                let available = registry.supported_versions(protocol);
                if let Some(missing) = versions.iter().find(|v| !available.contains(v)) {
                    bail!("{} {} is enabled in the configuration but not implemented", protocol, missing);
                }
                registry.retain_versions(protocol, &versions);
            }
        }
    }

    if registry.is_empty() {
        bail!("No protocol is enabled");
    }
    for protocol in registry.protocols() {
        let versions: Vec<String> = registry
            .supported_versions(protocol)
            .iter()
            .map(|v| v.to_string())
            .collect();
        info!(protocol = %protocol, versions = ?versions, "Protocol enabled");
    }
    Ok(registry)
}
