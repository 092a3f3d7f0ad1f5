use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

pub const DISPATCH_TOTAL: &str = "hookmux_dispatch_total";
pub const DISPATCH_EXTENSIONS: &str = "hookmux_dispatch_extensions";
pub const DISPATCH_LATENCY_US: &str = "hookmux_dispatch_latency_us";
pub const FEE_RESOLVED: &str = "hookmux_fee_resolved";
pub const ADMIN_CHANGE_TOTAL: &str = "hookmux_admin_change_total";
pub const ADMIN_REJECTED_TOTAL: &str = "hookmux_admin_rejected_total";

static EXPORTER: OnceCell<SocketAddr> = OnceCell::new();
static PROMETHEUS_ENABLED: AtomicBool = AtomicBool::new(false);

/// 安装 Prometheus 导出器；重复调用只会生效一次，返回实际监听地址。
pub fn try_init_prometheus(listen: &str) -> Result<SocketAddr> {
    EXPORTER
        .get_or_try_init(|| {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("invalid prometheus listen address: {listen}"))?;
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .context("failed to install prometheus exporter")?;
            describe_all();
            PROMETHEUS_ENABLED.store(true, Ordering::Relaxed);
            Ok(addr)
        })
        .copied()
}

pub fn prometheus_enabled() -> bool {
    PROMETHEUS_ENABLED.load(Ordering::Relaxed)
}

fn describe_all() {
    describe_counter!(DISPATCH_TOTAL, "lifecycle dispatches by event and outcome");
    describe_histogram!(
        DISPATCH_EXTENSIONS,
        Unit::Count,
        "extensions invoked per dispatch"
    );
    describe_histogram!(
        DISPATCH_LATENCY_US,
        Unit::Microseconds,
        "end-to-end dispatch latency"
    );
    describe_histogram!(FEE_RESOLVED, "resolved fee per before_swap dispatch");
    describe_counter!(ADMIN_CHANGE_TOTAL, "applied administrative changes");
    describe_counter!(
        ADMIN_REJECTED_TOTAL,
        "administrative calls rejected before mutation"
    );
}
