use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::config::ServerConfig;

/// A lightweight metric event. The core crate only defines the shape and a
/// sink trait; exposition (Prometheus, StatsD, ...) is explicitly out of
/// scope (spec §1 "metrics exposition servers").
#[derive(Debug, Clone)]
pub enum MetricEvent {
	CounterIncrement { name: &'static str, value: u64 },
	Gauge { name: &'static str, value: f64 },
	Histogram { name: &'static str, value_ms: f64 },
}

/// The explicit context threaded into every component constructor instead of
/// process-wide mutable singletons (spec §9 design note: "pass an explicit
/// `Services` context ... into component constructors").
///
/// Cheap to clone: `config` is behind an `Arc`, `metrics` is a cloneable
/// channel sender. `tracing`'s own span/subscriber machinery is left as a
/// true ambient global (that is how the `tracing` crate is designed to be
/// used) but every log call site still goes through `#[instrument]`d
/// functions that take `&self`/`&Services`, never a bare `static`.
#[derive(Clone)]
pub struct Services {
	pub config: Arc<ServerConfig>,
	metrics: Sender<MetricEvent>,
}

impl Services {
	pub fn new(config: ServerConfig, metrics: Sender<MetricEvent>) -> Self {
		Services { config: Arc::new(config), metrics }
	}

	/// Best-effort metric emission: a full channel or no registered
	/// consumer never blocks or panics request handling.
	pub fn record(&self, event: MetricEvent) {
		let _ = self.metrics.try_send(event);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn record_does_not_block_without_consumer() {
		let (tx, _rx) = crossbeam_channel::bounded(1);
		let services = Services::new(ServerConfig::default(), tx);
		services.record(MetricEvent::CounterIncrement { name: "test", value: 1 });
	}
}
