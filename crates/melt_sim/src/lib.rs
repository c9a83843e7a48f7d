//! Deterministic incident simulation for meltwater.
//!
//! The engine runs one simulated day at a time:
//!
//! - **Scheduling**: scripted and random primary incidents, bounded per host
//! - **Cascades**: dependency-graph and regional propagation with decay
//! - **Recording**: an append-only ground-truth ledger and the final catalog
//! - **Synthesis**: metrics, events, logs and traces driven by the frozen
//!   incident index, fanned out per host
//!
//! Every random draw comes from a stream keyed by `(seed, day, scope, name)`,
//! so output is byte-identical across runs and independent of thread count.
//!
//! # Example
//!
//! ```rust,ignore
//! use melt_model::{GenerationConfig, PlainNaming};
//! use melt_sim::{Generator, GroundTruthRecorder};
//!
//! let generator = Generator::new(GenerationConfig::default(), Box::new(PlainNaming))?;
//! let mut recorder = GroundTruthRecorder::new();
//! generator.run(&mut recorder, |day| write_day(&day))?;
//! let catalog = recorder.finalize(generator.config(), generator.topology());
//! println!("{}", catalog.root_cause_report());
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cascade;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod generators;
pub mod index;
pub mod lifecycle;
pub mod recorder;
pub mod rng;
pub mod scheduler;
pub mod synth;
pub mod topology;

pub use cascade::CascadePropagator;
pub use correlate::{correlate, Correlation, CorrelationSummary, StreamSlice};
pub use engine::{DayOutput, Generator};
pub use error::{Error, Result, SinkError};
pub use index::ActiveIncidentIndex;
pub use lifecycle::{phase_at, SeverityModel};
pub use recorder::{Catalog, CatalogSettings, CatalogSummary, GroundTruthRecorder, IncidentDelta};
pub use rng::RngStreams;
pub use scheduler::{Schedule, Scheduler, SchedulingConflict};
pub use topology::Topology;
