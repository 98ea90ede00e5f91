//! Configuration backed operation handlers.
//!
//! Each backend owns the data of one service family and registers its
//! operations with the dispatcher. Capabilities handlers are registered last
//! so they can advertise exactly the operations that have a handler.

pub mod capabilities;
pub mod features;
pub mod locks;
pub mod processes;
pub mod records;
pub mod sensors;
pub mod tiles;

use std::sync::Arc;

use anyhow::{Context, Result};
use ows_common::{OwsError, Protocol};
use ows_protocol::response::CapabilitiesContents;
use ows_protocol::{CanonicalRequest, Dispatcher, Handler, VersionRegistry};
use tracing::info;

use crate::config::ServiceConfig;
use capabilities::CapabilitiesHandler;
use features::FeatureStore;
use locks::LockManager;
use processes::ProcessRegistry;
use records::RecordCatalogue;
use sensors::SensorRegistry;
use tiles::TileDirectory;

/// Build the handler table for every protocol `registry` has codecs for.
pub fn build_dispatcher(config: &ServiceConfig, registry: &VersionRegistry) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();
    let mut contents = Vec::new();

    for protocol in registry.protocols().collect::<Vec<_>>() {
        let content = match protocol {
            Protocol::Wfs => {
                let store = Arc::new(FeatureStore::from_config(&config.features));
                let locks = Arc::new(LockManager::new(store.clone(), config.features.lock_expiry_seconds));
                register(&mut dispatcher, protocol, "DescribeFeatureType", features::describe_feature_type(store.clone()))?;
                register(&mut dispatcher, protocol, "GetFeature", features::get_feature(store.clone()))?;
                register(&mut dispatcher, protocol, "LockFeature", locks)?;
                CapabilitiesContents::FeatureTypes(store.feature_type_infos())
            }
            Protocol::Sos => {
                let sensors = Arc::new(SensorRegistry::from_config(&config.sensors)?);
                register(&mut dispatcher, protocol, "DescribeSensor", sensors::describe_sensor(sensors.clone()))?;
                register(&mut dispatcher, protocol, "GetObservation", sensors::get_observation(sensors.clone()))?;
                CapabilitiesContents::Offerings(sensors.offering_infos())
            }
            Protocol::Wmts => {
                let tiles = Arc::new(TileDirectory::from_config(&config.tiles)?);
                register(&mut dispatcher, protocol, "GetTile", tiles::get_tile(tiles.clone()))?;
                register(&mut dispatcher, protocol, "GetFeatureInfo", tiles::get_feature_info(tiles.clone()))?;
                tiles.capabilities_contents()
            }
            Protocol::Wps => {
                let processes = Arc::new(ProcessRegistry::from_config(&config.processes)?);
                register(&mut dispatcher, protocol, "DescribeProcess", processes::describe_process(processes.clone()))?;
                register(&mut dispatcher, protocol, "Execute", processes::execute(processes.clone()))?;
                CapabilitiesContents::Processes(processes.briefs())
            }
            Protocol::Csw => {
                let catalogue = Arc::new(RecordCatalogue::from_config(&config.records));
                register(&mut dispatcher, protocol, "GetRecordById", records::get_record_by_id(catalogue))?;
                CapabilitiesContents::None
            }
            Protocol::Wms => continue,
        };
        contents.push((protocol, content));
    }

    for (protocol, content) in contents {
        let mut operations = dispatcher.operations(protocol);
        operations.push("GetCapabilities".into());
        operations.sort();
        let handler = CapabilitiesHandler::new(config, operations, content);
        register(&mut dispatcher, protocol, "GetCapabilities", Arc::new(handler))?;
        info!(protocol = %protocol, "Registered handlers");
    }

    Ok(dispatcher)
}

fn register(
    dispatcher: &mut Dispatcher,
    protocol: Protocol,
    operation: &str,
    handler: Arc<dyn Handler>,
) -> Result<()> {
    dispatcher
        .register(protocol, operation, handler)
        .with_context(|| format!("Failed to register {} {}", protocol, operation))
}

/// A handler was routed a payload it does not serve.
pub(crate) fn unexpected(request: &CanonicalRequest) -> OwsError {
    OwsError::Internal(format!(
        "{} handler received a {} payload",
        request.operation,
        request.payload.operation_name()
    ))
}

/// Current time as an ISO 8601 UTC timestamp with second precision.
pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_protocol_gets_handlers() {
        let dispatcher = build_dispatcher(&ServiceConfig::default(), &VersionRegistry::with_default_codecs().unwrap()).unwrap();

        let wfs: Vec<String> = dispatcher.operations(Protocol::Wfs).iter().map(|o| o.to_string()).collect();
        assert_eq!(wfs, vec!["DescribeFeatureType", "GetCapabilities", "GetFeature", "LockFeature"]);
        assert_eq!(dispatcher.operations(Protocol::Csw).len(), 2);
        assert_eq!(dispatcher.operations(Protocol::Wmts).len(), 3);
        assert!(dispatcher.operations(Protocol::Wms).is_empty());
    }

    #[test]
    fn test_removed_protocol_gets_no_handlers() {
        let mut registry = VersionRegistry::with_default_codecs().unwrap();
        registry.remove_protocol(Protocol::Sos);
        let dispatcher = build_dispatcher(&ServiceConfig::default(), &registry).unwrap();
        assert!(dispatcher.operations(Protocol::Sos).is_empty());
        assert!(!dispatcher.operations(Protocol::Wfs).is_empty());
    }
}
