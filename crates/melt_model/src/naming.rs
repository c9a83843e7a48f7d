//! Cloud naming seam.
//!
//! The engine works with provider-neutral [`MetricKind`]s and only asks a
//! [`CloudNaming`] implementation for provider-specific names and host
//! identities when it builds output records.

use crate::fleet::CloudProvider;
use crate::metric::MetricKind;
use std::collections::BTreeMap;

/// Translates provider-neutral names into provider-specific ones.
///
/// Implementations must be pure: the same arguments always give the same
/// answer. Any variation (instance types, zones) is derived from `token`,
/// which the caller draws from a seeded stream.
pub trait CloudNaming: Send + Sync {
    /// Returns the provider-specific name of a metric.
    fn metric_name(&self, kind: MetricKind, cloud: CloudProvider) -> String;

    /// Returns a provider-style host identifier.
    fn host_id(&self, cloud: CloudProvider, service: &str, index: usize, token: u64) -> String;

    /// Returns provider-specific metadata for a host.
    fn host_metadata(
        &self,
        cloud: CloudProvider,
        host_id: &str,
        service: &str,
        region: &str,
        token: u64,
    ) -> BTreeMap<String, serde_json::Value>;
}

/// Naming without any provider flavor: base metric names, `service-NN`
/// host ids, no metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNaming;

impl CloudNaming for PlainNaming {
    fn metric_name(&self, kind: MetricKind, _cloud: CloudProvider) -> String {
        kind.base_name().to_string()
    }

    fn host_id(&self, _cloud: CloudProvider, service: &str, index: usize, _token: u64) -> String {
        format!("{service}-{index:02}")
    }

    fn host_metadata(
        &self,
        _cloud: CloudProvider,
        _host_id: &str,
        _service: &str,
        _region: &str,
        _token: u64,
    ) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::new()
    }
}
