//! Provider-flavored naming behind [`CloudNaming`].

use crate::providers::profile;
use melt_model::{CloudNaming, CloudProvider, MetricKind};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use xxhash_rust::xxh64::xxh64;

/// Naming tables for every supported provider.
///
/// All output is a pure function of the arguments: identifiers and metadata
/// are drawn from a ChaCha8 stream seeded by `token` mixed with the host
/// coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudCatalog;

impl CloudCatalog {
    /// Creates the catalog.
    pub const fn new() -> Self {
        Self
    }

    /// Returns the known regions of a provider.
    pub const fn regions(cloud: CloudProvider) -> &'static [&'static str] {
        profile(cloud).regions
    }

    fn stream(token: u64, scope: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(xxh64(scope.as_bytes(), token))
    }
}

fn hex(rng: &mut ChaCha8Rng, len: usize) -> String {
    let mut out = format!("{:032x}", rng.gen::<u128>());
    out.truncate(len);
    out
}

fn uuid_string(rng: &mut ChaCha8Rng) -> String {
    uuid::Builder::from_random_bytes(rng.gen()).into_uuid().to_string()
}

fn pick(rng: &mut ChaCha8Rng, items: &'static [&'static str]) -> &'static str {
    items.choose(rng).copied().unwrap_or_default()
}

impl CloudNaming for CloudCatalog {
    fn metric_name(&self, kind: MetricKind, cloud: CloudProvider) -> String {
        profile(cloud).metric_name(kind).to_string()
    }

    fn host_id(&self, cloud: CloudProvider, service: &str, index: usize, token: u64) -> String {
        let mut rng = Self::stream(token, &format!("host-id/{service}/{index}"));
        match cloud {
            CloudProvider::Aws => format!("i-{}", hex(&mut rng, 15)),
            CloudProvider::Azure => format!("vm-{}", hex(&mut rng, 12)),
            CloudProvider::Gcp => format!("instance-{}", rng.gen_range(100_000_000..=999_999_999u32)),
            CloudProvider::Openstack => format!("server-{}", hex(&mut rng, 12)),
            CloudProvider::Nutanix => format!("vm-{}", rng.gen_range(10_000..=99_999u32)),
            CloudProvider::Vmware => format!("vm-{}", rng.gen_range(1..=9_999u32)),
            CloudProvider::Onpremise => format!("host-{}", hex(&mut rng, 6)),
        }
    }

    fn host_metadata(
        &self,
        cloud: CloudProvider,
        host_id: &str,
        service: &str,
        region: &str,
        token: u64,
    ) -> BTreeMap<String, Value> {
        let mut rng = Self::stream(token, &format!("host-meta/{host_id}"));
        let sizes = profile(cloud).sizes;
        let mut meta: BTreeMap<String, Value> = BTreeMap::new();
        meta.insert("cloud_provider".into(), json!(cloud.as_str()));

        match cloud {
            CloudProvider::Aws => {
                let zone = pick(&mut rng, &["a", "b", "c", "d"]);
                meta.insert("availability_zone".into(), json!(format!("{region}{zone}")));
                meta.insert("instance_type".into(), json!(pick(&mut rng, sizes)));
                meta.insert("vpc_id".into(), json!(format!("vpc-{}", hex(&mut rng, 8))));
                meta.insert("subnet_id".into(), json!(format!("subnet-{}", hex(&mut rng, 8))));
                meta.insert("instance_id".into(), json!(host_id));
                meta.insert("ami_id".into(), json!(format!("ami-{}", hex(&mut rng, 8))));
            }
            CloudProvider::Azure => {
                let group = format!("rg-{service}-{region}");
                let subscription = uuid_string(&mut rng);
                meta.insert("vm_size".into(), json!(pick(&mut rng, sizes)));
                meta.insert(
                    "resource_id".into(),
                    json!(format!(
                        "/subscriptions/{subscription}/resourceGroups/{group}/providers/Microsoft.Compute/virtualMachines/{host_id}"
                    )),
                );
                if rng.gen_bool(0.5) {
                    meta.insert("availability_set".into(), json!(format!("aset-{}", hex(&mut rng, 8))));
                }
                meta.insert("resource_group".into(), json!(group));
                meta.insert("subscription_id".into(), json!(subscription));
            }
            CloudProvider::Gcp => {
                let zone = pick(&mut rng, &["a", "b", "c", "d", "e", "f"]);
                meta.insert("zone".into(), json!(format!("{region}-{zone}")));
                meta.insert("machine_type".into(), json!(pick(&mut rng, sizes)));
                meta.insert("project_id".into(), json!(format!("project-{}", hex(&mut rng, 8))));
                meta.insert("instance_name".into(), json!(format!("{service}-{}", hex(&mut rng, 6))));
                meta.insert("network".into(), json!(format!("network-{}", hex(&mut rng, 8))));
            }
            CloudProvider::Openstack => {
                let zone = pick(&mut rng, &["nova", "zone-a", "zone-b", "zone-c"]);
                meta.insert("availability_zone".into(), json!(zone));
                meta.insert("flavor".into(), json!(pick(&mut rng, sizes)));
                meta.insert("tenant_id".into(), json!(uuid_string(&mut rng)));
                meta.insert("instance_uuid".into(), json!(uuid_string(&mut rng)));
                meta.insert("image_id".into(), json!(format!("image-{}", hex(&mut rng, 8))));
                meta.insert(
                    "hypervisor_hostname".into(),
                    json!(format!("hypervisor-{}", hex(&mut rng, 6))),
                );
            }
            CloudProvider::Nutanix => {
                let container = pick(
                    &mut rng,
                    &["container-1", "container-2", "container-3", "ssd-pool", "hdd-pool", "hybrid-pool"],
                );
                meta.insert("cluster_name".into(), json!(region));
                meta.insert("vm_size".into(), json!(pick(&mut rng, sizes)));
                meta.insert("storage_container".into(), json!(container));
                meta.insert("vm_uuid".into(), json!(uuid_string(&mut rng)));
                meta.insert("host_uuid".into(), json!(uuid_string(&mut rng)));
                meta.insert("vdisk_uuid".into(), json!(uuid_string(&mut rng)));
            }
            CloudProvider::Vmware => {
                let pool = pick(
                    &mut rng,
                    &["pool-1", "pool-2", "production", "development", "staging", "qa"],
                );
                meta.insert("datacenter".into(), json!(region));
                meta.insert("cluster".into(), json!(pick(&mut rng, sizes)));
                meta.insert("resource_pool".into(), json!(pool));
                meta.insert("vm_moid".into(), json!(format!("vm-{}", uuid_string(&mut rng))));
                meta.insert("host_moid".into(), json!(format!("host-{}", uuid_string(&mut rng))));
                meta.insert("datastore".into(), json!(format!("datastore-{}", hex(&mut rng, 8))));
            }
            CloudProvider::Onpremise => {
                meta.insert("rack".into(), json!(pick(&mut rng, sizes)));
                meta.insert("datacenter".into(), json!(region));
                meta.insert(
                    "physical_server".into(),
                    json!(format!("server-{}", hex(&mut rng, 8))),
                );
                meta.insert(
                    "switch_port".into(),
                    json!(format!("port-{}", rng.gen_range(1..=48))),
                );
                meta.insert(
                    "power_supply_unit".into(),
                    json!(format!("psu-{}", pick(&mut rng, &["A", "B"]))),
                );
            }
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn host_id_formats() {
        let catalog = CloudCatalog::new();
        let aws = catalog.host_id(CloudProvider::Aws, "web", 0, 1);
        assert!(aws.starts_with("i-"));
        assert_eq!(aws.len(), 17);

        let gcp = catalog.host_id(CloudProvider::Gcp, "web", 0, 1);
        let digits = gcp.trim_start_matches("instance-");
        assert_eq!(digits.len(), 9);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));

        let onprem = catalog.host_id(CloudProvider::Onpremise, "web", 0, 1);
        assert!(onprem.starts_with("host-"));
        assert_eq!(onprem.len(), 11);
    }

    #[test]
    fn metric_names_translate() {
        let catalog = CloudCatalog::new();
        assert_eq!(
            catalog.metric_name(MetricKind::CpuUtil, CloudProvider::Aws),
            "AWS/EC2.CPUUtilization"
        );
        insta::assert_snapshot!(
            catalog.metric_name(MetricKind::CpuUtil, CloudProvider::Gcp),
            @"compute.googleapis.com/instance/cpu/utilization"
        );
        assert_eq!(
            catalog.metric_name(MetricKind::LatencyMs, CloudProvider::Onpremise),
            "net.latency.ms"
        );
    }

    #[test]
    fn onpremise_metadata_fields() {
        let meta = CloudCatalog::new().host_metadata(
            CloudProvider::Onpremise,
            "host-abc123",
            "auth-service",
            "on-prem-dc1",
            9,
        );
        assert_eq!(meta["datacenter"], "on-prem-dc1");
        assert_eq!(meta["cloud_provider"], "onpremise");
        for key in ["rack", "physical_server", "switch_port", "power_supply_unit"] {
            assert!(meta.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn aws_metadata_zone_follows_region() {
        let meta =
            CloudCatalog::new().host_metadata(CloudProvider::Aws, "i-1", "web", "us-east-1", 3);
        let zone = meta["availability_zone"].as_str().unwrap();
        assert!(zone.starts_with("us-east-1"));
        assert_eq!(meta["instance_id"], "i-1");
    }

    #[test]
    fn nutanix_metadata_carries_uuids() {
        let meta =
            CloudCatalog::new().host_metadata(CloudProvider::Nutanix, "vm-1", "db", "cluster-1", 3);
        assert!(uuid::Uuid::parse_str(meta["vm_uuid"].as_str().unwrap()).is_ok());
    }

    proptest! {
        #[test]
        fn naming_is_pure(token in any::<u64>(), index in 0usize..64, cloud_idx in 0usize..7) {
            let cloud = CloudProvider::ALL[cloud_idx];
            let catalog = CloudCatalog::new();
            let a = catalog.host_id(cloud, "svc", index, token);
            let b = catalog.host_id(cloud, "svc", index, token);
            prop_assert_eq!(&a, &b);
            let ma = catalog.host_metadata(cloud, &a, "svc", "r1", token);
            let mb = catalog.host_metadata(cloud, &b, "svc", "r1", token);
            prop_assert_eq!(ma, mb);
        }
    }
}
