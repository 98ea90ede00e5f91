//! Version registry: which codec serves which protocol version.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ows_common::{OwsError, OwsResult, Protocol, ProtocolVersion};

use crate::codec::RequestCodec;
use crate::csw::CswCodec;
use crate::sos::SosCodec;
use crate::wfs::WfsCodec;
use crate::wmts::WmtsCodec;
use crate::wps::WpsCodec;

/// Maps `(protocol, version)` to a codec.
///
/// Built once at startup and only read afterwards, so it is shared across
/// request threads behind an `Arc` without locking.
#[derive(Clone, Default)]
pub struct VersionRegistry {
    codecs: BTreeMap<Protocol, BTreeMap<ProtocolVersion, Arc<dyn RequestCodec>>>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in codec.
    pub fn with_default_codecs() -> OwsResult<Self> {
        let mut registry = Self::new();
        let codecs: Vec<Arc<dyn RequestCodec>> = vec![
            Arc::new(WfsCodec::v1_0_0()),
            Arc::new(WfsCodec::v1_1_0()),
            Arc::new(WfsCodec::v2_0_0()),
            Arc::new(SosCodec::new()),
            Arc::new(WmtsCodec::new()),
            Arc::new(WpsCodec::new()),
            Arc::new(CswCodec::new()),
        ];
        for codec in codecs {
            registry.register_codec(codec)?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        protocol: Protocol,
        version: ProtocolVersion,
        codec: Arc<dyn RequestCodec>,
    ) -> OwsResult<()> {
        let versions = self.codecs.entry(protocol).or_default();
        if versions.contains_key(&version) {
            return Err(OwsError::DuplicateRegistration(format!(
                "{} {} already has a codec",
                protocol, version
            )));
        }
        versions.insert(version, codec);
        Ok(())
    }

    /// Register a codec under its own protocol and version.
    pub fn register_codec(&mut self, codec: Arc<dyn RequestCodec>) -> OwsResult<()> {
        self.register(codec.protocol(), codec.version(), codec)
    }

    /// Drop every codec of `protocol` that is not in `keep`.
    pub fn retain_versions(&mut self, protocol: Protocol, keep: &BTreeSet<ProtocolVersion>) {
        if let Some(versions) = self.codecs.get_mut(&protocol) {
            versions.retain(|v, _| keep.contains(v));
            if versions.is_empty() {
                self.codecs.remove(&protocol);
            }
        }
    }

    /// Remove a protocol entirely.
    pub fn remove_protocol(&mut self, protocol: Protocol) {
        self.codecs.remove(&protocol);
    }

    pub fn codec_for(
        &self,
        protocol: Protocol,
        version: ProtocolVersion,
    ) -> OwsResult<Arc<dyn RequestCodec>> {
        let versions = self
            .codecs
            .get(&protocol)
            .ok_or_else(|| OwsError::UnknownProtocol(protocol.to_string()))?;
        versions
            .get(&version)
            .cloned()
            .ok_or_else(|| OwsError::UnsupportedVersion(format!("{} {}", protocol, version)))
    }

    /// Versions registered for `protocol`; empty when it has none.
    pub fn supported_versions(&self, protocol: Protocol) -> BTreeSet<ProtocolVersion> {
        self.codecs
            .get(&protocol)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn protocols(&self) -> impl Iterator<Item = Protocol> + '_ {
        self.codecs.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl std::fmt::Debug for VersionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: BTreeMap<Protocol, Vec<String>> = self
            .codecs
            .iter()
            .map(|(p, vs)| (*p, vs.keys().map(|v| v.to_string()).collect()))
            .collect();
        f.debug_struct("VersionRegistry")
            .field("codecs", &entries)
            .finish()
    }
}
