//! # taghub-prober
//!
//! Periodic reachability checks for stored articles.
//!
//! A probe run samples a batch of articles, requests each permalink on a
//! bounded worker pool and records the outcome on the article. The sweep
//! removes articles that failed too often, going through the ingestion
//! coordinator so tag counts stay consistent. Author runs check each
//! author's blog the same way and drop authors whose blog is gone.

pub mod authors;
pub mod error;
mod pool;
pub mod probe;
pub mod prober;
pub mod state;

pub use authors::{AuthorProbeReport, AuthorProber};
pub use error::ProbeError;
pub use probe::{HttpProbe, Probe};
pub use prober::{AccessibilityProber, ProbeRunReport, ProberConfig, SweepReport};
pub use state::{FailureReason, ProbeOutcome, ProbeState};
