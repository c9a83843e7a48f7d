//! Cloud provider naming for meltwater.
//!
//! Maps provider-neutral metric kinds to each provider's metric names and
//! derives provider-style host identifiers and metadata (zones, instance
//! types, racks). Supported providers: AWS, Azure, GCP, OpenStack, Nutanix,
//! VMware and bare on-premise datacenters.
//!
//! ```rust,ignore
//! use melt_cloud::CloudCatalog;
//! use melt_model::{CloudNaming, CloudProvider, MetricKind};
//!
//! let name = CloudCatalog::new().metric_name(MetricKind::CpuUtil, CloudProvider::Aws);
//! assert_eq!(name, "AWS/EC2.CPUUtilization");
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod catalog;
pub mod providers;

pub use catalog::CloudCatalog;
pub use providers::{profile, ProviderProfile};
