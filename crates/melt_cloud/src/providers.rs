//! Static per-provider tables.

use melt_model::{CloudProvider, MetricKind};

/// Naming data for one provider.
#[derive(Debug)]
pub struct ProviderProfile {
    /// Provider described by this profile.
    pub provider: CloudProvider,
    /// Known regions (or clusters / datacenters).
    pub regions: &'static [&'static str],
    /// Metric names, indexed like [`MetricKind::ALL`].
    metric_names: [&'static str; MetricKind::COUNT],
    /// Instance sizes offered by the provider.
    pub sizes: &'static [&'static str],
}

impl ProviderProfile {
    /// Returns the provider-specific name of `kind`.
    pub fn metric_name(&self, kind: MetricKind) -> &'static str {
        MetricKind::ALL
            .iter()
            .position(|k| *k == kind)
            .map_or_else(|| kind.base_name(), |i| self.metric_names[i])
    }
}

/// Returns the profile of `provider`.
pub const fn profile(provider: CloudProvider) -> &'static ProviderProfile {
    match provider {
        CloudProvider::Aws => &AWS,
        CloudProvider::Azure => &AZURE,
        CloudProvider::Gcp => &GCP,
        CloudProvider::Openstack => &OPENSTACK,
        CloudProvider::Nutanix => &NUTANIX,
        CloudProvider::Vmware => &VMWARE,
        CloudProvider::Onpremise => &ONPREMISE,
    }
}

static AWS: ProviderProfile = ProviderProfile {
    provider: CloudProvider::Aws,
    regions: &[
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        "eu-central-1",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-northeast-1",
        "sa-east-1",
        "ca-central-1",
    ],
    metric_names: [
        "AWS/EC2.CPUUtilization",
        "CWAgent.MemoryUtilization",
        "AWS/ApplicationELB.TargetResponseTime",
        "AWS/ApplicationELB.HTTPCode_Target_5XX_Count",
        "AWS/ApplicationELB.RequestCount",
        "AWS/EC2.NetworkPacketsOut",
        "AWS/RDS.DatabaseConnections",
        "AWS/ElastiCache.CurrConnections",
    ],
    sizes: &[
        "t3.micro",
        "t3.small",
        "t3.medium",
        "t3.large",
        "m5.large",
        "m5.xlarge",
        "m5.2xlarge",
        "c5.large",
        "c5.xlarge",
        "c5.2xlarge",
        "r5.large",
        "r5.xlarge",
    ],
};

static AZURE: ProviderProfile = ProviderProfile {
    provider: CloudProvider::Azure,
    regions: &[
        "eastus",
        "eastus2",
        "westus",
        "westus2",
        "westeurope",
        "northeurope",
        "southeastasia",
        "japaneast",
        "japanwest",
        "australiaeast",
        "brazilsouth",
        "canadacentral",
        "centralus",
    ],
    metric_names: [
        "Azure/VM.Percentage CPU",
        "Azure/VM.Available Memory Bytes",
        "Azure/ApplicationGateway.ResponseTime",
        "Azure/ApplicationGateway.Http5xx",
        "Azure/ApplicationGateway.RequestCount",
        "Azure/VM.Network In",
        "Azure/SQL.DatabaseConnections",
        "Azure/Redis.CacheConnections",
    ],
    sizes: &[
        "Standard_B1s",
        "Standard_B2s",
        "Standard_B2ms",
        "Standard_D2s_v3",
        "Standard_D4s_v3",
        "Standard_D8s_v3",
        "Standard_F2s_v2",
        "Standard_F4s_v2",
        "Standard_E2s_v3",
        "Standard_E4s_v3",
    ],
};

static GCP: ProviderProfile = ProviderProfile {
    provider: CloudProvider::Gcp,
    regions: &[
        "us-east1",
        "us-east4",
        "us-west1",
        "us-west2",
        "us-west3",
        "us-west4",
        "europe-west1",
        "europe-west2",
        "europe-west3",
        "europe-west4",
        "asia-southeast1",
        "asia-east1",
        "asia-northeast1",
        "southamerica-east1",
        "australia-southeast1",
    ],
    metric_names: [
        "compute.googleapis.com/instance/cpu/utilization",
        "compute.googleapis.com/instance/memory/utilization",
        "loadbalancing.googleapis.com/https/backend_latencies",
        "loadbalancing.googleapis.com/https/backend_request_count",
        "compute.googleapis.com/instance/network/received_bytes_count",
        "compute.googleapis.com/instance/network/received_packets_count",
        "cloudsql.googleapis.com/database/postgresql/database/num_backends",
        "redis.googleapis.com/stats/connected_clients",
    ],
    sizes: &[
        "n1-standard-1",
        "n1-standard-2",
        "n1-standard-4",
        "e2-small",
        "e2-medium",
        "e2-standard-2",
        "e2-standard-4",
        "n2-standard-2",
        "n2-standard-4",
        "c2-standard-4",
        "c2-standard-8",
    ],
};

static OPENSTACK: ProviderProfile = ProviderProfile {
    provider: CloudProvider::Openstack,
    regions: &[
        "region-one",
        "region-two",
        "region-three",
        "region-a",
        "region-b",
        "region-c",
    ],
    metric_names: [
        "openstack.instance.cpu.util",
        "openstack.instance.memory.util",
        "openstack.lb.response_time",
        "openstack.lb.http_5xx",
        "openstack.lb.request_count",
        "openstack.instance.network.rx_packets",
        "openstack.database.connections",
        "openstack.cache.connections",
    ],
    sizes: &[
        "m1.tiny",
        "m1.small",
        "m1.medium",
        "m1.large",
        "m1.xlarge",
        "m2.medium",
        "m2.large",
        "m2.xlarge",
        "c1.medium",
        "c1.large",
        "c1.xlarge",
    ],
};

static NUTANIX: ProviderProfile = ProviderProfile {
    provider: CloudProvider::Nutanix,
    regions: &[
        "cluster-1",
        "cluster-2",
        "cluster-3",
        "datacenter-a",
        "datacenter-b",
        "datacenter-c",
    ],
    metric_names: [
        "nutanix.vm.cpu.usage",
        "nutanix.vm.memory.usage",
        "nutanix.vm.network.latency",
        "nutanix.vm.application.errors",
        "nutanix.vm.application.requests",
        "nutanix.vm.network.packet_loss",
        "nutanix.database.connections",
        "nutanix.resource.pool.usage",
    ],
    sizes: &["small", "medium", "large", "xlarge", "2xlarge", "4xlarge"],
};

static VMWARE: ProviderProfile = ProviderProfile {
    provider: CloudProvider::Vmware,
    regions: &[
        "datacenter-1",
        "datacenter-2",
        "datacenter-3",
        "dc-east",
        "dc-west",
        "dc-central",
    ],
    metric_names: [
        "vmware.vm.cpu.usage",
        "vmware.vm.memory.usage",
        "vmware.vm.network.latency",
        "vmware.vm.application.errors",
        "vmware.vm.application.requests",
        "vmware.vm.network.packet_loss",
        "vmware.database.connections",
        "vmware.resource.pool.usage",
    ],
    sizes: &[
        "cluster-1",
        "cluster-2",
        "cluster-3",
        "compute-cluster",
        "storage-cluster",
    ],
};

static ONPREMISE: ProviderProfile = ProviderProfile {
    provider: CloudProvider::Onpremise,
    regions: &[
        "on-prem-dc1",
        "on-prem-dc2",
        "on-prem-dc3",
        "datacenter-east",
        "datacenter-west",
        "primary-dc",
        "secondary-dc",
    ],
    metric_names: [
        "system.cpu.util",
        "system.mem.util",
        "net.latency.ms",
        "app.error_rate",
        "app.request_count",
        "net.packet_loss.pct",
        "db.connection_pool.util",
        "resource.pool.util",
    ],
    sizes: &[
        "rack-01", "rack-02", "rack-03", "rack-04", "rack-A1", "rack-A2", "rack-B1", "rack-B2",
    ],
};
