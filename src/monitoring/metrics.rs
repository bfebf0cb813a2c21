use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};

// Global Prometheus registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn register_counter(name: &str, help: &str) -> IntCounter {
    let c = IntCounter::with_opts(
        Opts::new(name, help).const_label("version", env!("CARGO_PKG_VERSION")),
    )
    .expect("valid counter opts");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
}

pub static CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_counter("prediction_cache_hits_total", "Cached predictions served")
});

pub static CACHE_MISSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_counter("prediction_cache_misses_total", "Prediction cache lookups that missed")
});

pub static CACHE_EVICTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_counter("prediction_cache_evictions_total", "Predictions evicted to stay within the cache bound")
});

pub static API_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_counter("prediction_api_attempts_total", "HTTP attempts made against the prediction backend")
});

pub static API_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_counter("prediction_api_failures_total", "Prediction fetches that failed after every retry")
});

pub static CACHE_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("prediction_cache_size", "Predictions currently cached").expect("valid gauge opts");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

pub static FETCH_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "prediction_fetch_duration_ms",
        "Wall time of a prediction fetch including retries, in milliseconds",
    )
    .buckets(vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 15000.0, 60000.0]);
    let h = Histogram::with_opts(opts).expect("valid histogram opts");
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

pub fn observe_fetch_duration_ms(duration_ms: f64) {
    FETCH_DURATION_MS.observe(duration_ms);
}

/// Touch every metric so it shows up in the export before its first event.
pub fn init() {
    Lazy::force(&CACHE_HITS_TOTAL);
    Lazy::force(&CACHE_MISSES_TOTAL);
    Lazy::force(&CACHE_EVICTIONS_TOTAL);
    Lazy::force(&API_ATTEMPTS_TOTAL);
    Lazy::force(&API_FAILURES_TOTAL);
    Lazy::force(&CACHE_SIZE);
    Lazy::force(&FETCH_DURATION_MS);
}

// Exporter for Prometheus text format
pub fn export_prometheus() -> String {
    let metric_families = REGISTRY.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        "".to_string()
    }
}
