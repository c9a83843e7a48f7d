//! Hosts and cloud providers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cloud or datacenter provider a host runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services.
    Aws,
    /// Microsoft Azure.
    Azure,
    /// Google Cloud Platform.
    Gcp,
    /// OpenStack private cloud.
    Openstack,
    /// Nutanix cluster.
    Nutanix,
    /// VMware vSphere.
    Vmware,
    /// Bare on-premise datacenter.
    Onpremise,
}

impl CloudProvider {
    /// All providers, in configuration order.
    pub const ALL: [Self; 7] = [
        Self::Aws,
        Self::Azure,
        Self::Gcp,
        Self::Openstack,
        Self::Nutanix,
        Self::Vmware,
        Self::Onpremise,
    ];

    /// Returns the lowercase provider name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Azure => "azure",
            Self::Gcp => "gcp",
            Self::Openstack => "openstack",
            Self::Nutanix => "nutanix",
            Self::Vmware => "vmware",
            Self::Onpremise => "onpremise",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A host in the simulated fleet.
///
/// Hosts are created once when the topology is built and never destroyed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Provider-specific host identifier.
    pub id: String,
    /// Owning service.
    pub service: String,
    /// Provider the host runs on.
    pub cloud_provider: CloudProvider,
    /// Region (or datacenter) of the host.
    pub region: String,
    /// Provider-specific metadata (zone, instance type, rack...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Host {
    /// Creates a host without metadata.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        service: impl Into<String>,
        cloud_provider: CloudProvider,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            service: service.into(),
            cloud_provider,
            region: region.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the provider metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: BTreeMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}
