use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, handler.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const FANOUT_SIZE: MetricDef = MetricDef {
    name: "fanout.size",
    metric_type: MetricType::Histogram,
    description: "Number of upstream calls issued for one request. Tagged with handler.",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Duration of a single upstream call in seconds. Tagged with method.",
};

pub const UPSTREAM_FAILURES: MetricDef = MetricDef {
    name: "upstream.failures",
    metric_type: MetricType::Counter,
    description: "Upstream calls that failed or returned a non-2xx status. Tagged with reason.",
};

pub const TOKEN_REFRESHES: MetricDef = MetricDef {
    name: "credentials.refresh",
    metric_type: MetricType::Counter,
    description: "Number of times the upstream access token was fetched",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    FANOUT_SIZE,
    UPSTREAM_DURATION,
    UPSTREAM_FAILURES,
    TOKEN_REFRESHES,
];
