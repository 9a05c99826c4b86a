//! Prometheus metrics (ambient observability). Gathered in-process but
//! not served over HTTP — see the non-goal note in the design ledger.

use prometheus::{CounterVec, IntCounter, IntGauge, Opts, Registry};

use crate::Result;

/// The handful of counters/gauges this simulator considers
/// observability-relevant. Held behind `Arc` by callers that share it
/// across the device pool and individual devices.
pub struct SimulatorMetrics {
    registry: Registry,
    pub decode_errors_total: IntCounter,
    pub encode_errors_total: IntCounter,
    pub requests_total: CounterVec,
    pub pool_devices_active: IntGauge,
    pub pool_full_total: IntCounter,
    pub profile_reloads_total: IntCounter,
}

impl SimulatorMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let decode_errors_total = IntCounter::with_opts(Opts::new(
            "snmp_decode_errors_total",
            "BER messages that failed to decode",
        ))
        .map_err(|e| crate::Error::internal(e.to_string()))?;

        let encode_errors_total = IntCounter::with_opts(Opts::new(
            "snmp_encode_errors_total",
            "Responses that failed to encode",
        ))
        .map_err(|e| crate::Error::internal(e.to_string()))?;

        let requests_total = CounterVec::new(
            Opts::new("snmp_requests_total", "SNMP requests handled, by PDU type"),
            &["pdu_type"],
        )
        .map_err(|e| crate::Error::internal(e.to_string()))?;

        let pool_devices_active = IntGauge::with_opts(Opts::new(
            "snmp_pool_devices_active",
            "Devices currently instantiated in the pool",
        ))
        .map_err(|e| crate::Error::internal(e.to_string()))?;

        let pool_full_total = IntCounter::with_opts(Opts::new(
            "snmp_pool_full_total",
            "get_or_create calls rejected because the pool was at capacity",
        ))
        .map_err(|e| crate::Error::internal(e.to_string()))?;

        let profile_reloads_total = IntCounter::with_opts(Opts::new(
            "snmp_profile_reloads_total",
            "Successful profile reloads across all device classes",
        ))
        .map_err(|e| crate::Error::internal(e.to_string()))?;

        registry
            .register(Box::new(decode_errors_total.clone()))
            .map_err(|e| crate::Error::internal(e.to_string()))?;
        registry
            .register(Box::new(encode_errors_total.clone()))
            .map_err(|e| crate::Error::internal(e.to_string()))?;
        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|e| crate::Error::internal(e.to_string()))?;
        registry
            .register(Box::new(pool_devices_active.clone()))
            .map_err(|e| crate::Error::internal(e.to_string()))?;
        registry
            .register(Box::new(pool_full_total.clone()))
            .map_err(|e| crate::Error::internal(e.to_string()))?;
        registry
            .register(Box::new(profile_reloads_total.clone()))
            .map_err(|e| crate::Error::internal(e.to_string()))?;

        Ok(Self {
            registry,
            decode_errors_total,
            encode_errors_total,
            requests_total,
            pool_devices_active,
            pool_full_total,
            profile_reloads_total,
        })
    }

    pub fn record_request(&self, pdu_type: &str) {
        self.requests_total.with_label_values(&[pdu_type]).inc();
    }

    /// Renders the current values in the Prometheus text exposition
    /// format, for a caller that wants to surface them without this
    /// crate owning an HTTP listener.
    pub fn gather_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| crate::Error::internal(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| crate::Error::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_all_metrics_without_panicking() {
        let metrics = SimulatorMetrics::new().unwrap();
        metrics.decode_errors_total.inc();
        metrics.pool_devices_active.set(3);
        metrics.record_request("get");
        let text = metrics.gather_text().unwrap();
        assert!(text.contains("snmp_decode_errors_total"));
        assert!(text.contains("snmp_pool_devices_active"));
        assert!(text.contains("snmp_requests_total"));
    }

    #[test]
    fn requests_total_is_labeled_by_pdu_type() {
        let metrics = SimulatorMetrics::new().unwrap();
        metrics.record_request("get");
        metrics.record_request("get_next");
        metrics.record_request("get");
        let text = metrics.gather_text().unwrap();
        assert!(text.contains("pdu_type=\"get\""));
        assert!(text.contains("pdu_type=\"get_next\""));
    }
}
