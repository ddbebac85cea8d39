//! Latency and throughput measurements

pub mod latency;
pub mod throughput;

#[cfg(test)]
pub(crate) mod testing;

pub use latency::LatencyProbe;
pub use throughput::{chunk_count, generate_payload, ThroughputMeasurer};
