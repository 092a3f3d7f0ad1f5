use std::time::Duration;

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::engine::{ChangeRecord, FeeSource, LifecycleEvent, OrchestratorError, VenueId};

use super::metrics::{
    ADMIN_CHANGE_TOTAL, ADMIN_REJECTED_TOTAL, DISPATCH_EXTENSIONS, DISPATCH_LATENCY_US,
    DISPATCH_TOTAL, FEE_RESOLVED, prometheus_enabled,
};

pub fn dispatch_completed(
    venue: &VenueId,
    event: LifecycleEvent,
    extensions: usize,
    fee: Option<(u32, FeeSource)>,
    elapsed: Duration,
) {
    let (fee_value, fee_source) = match fee {
        Some((value, source)) => (value, fee_source_label(source)),
        None => (0, "none"),
    };
    info!(
        target: "monitoring::dispatch",
        event = event.as_str(),
        venue = %venue,
        extensions,
        fee = fee_value,
        fee_source,
        elapsed_us = elapsed.as_micros() as u64,
        "dispatch completed"
    );

    if prometheus_enabled() {
        counter!(
            DISPATCH_TOTAL,
            "event" => event.as_str(),
            "outcome" => "ok"
        )
        .increment(1);
        histogram!(DISPATCH_EXTENSIONS, "event" => event.as_str()).record(extensions as f64);
        histogram!(DISPATCH_LATENCY_US, "event" => event.as_str())
            .record(elapsed.as_micros() as f64);
        if fee.is_some() {
            histogram!(FEE_RESOLVED, "source" => fee_source).record(fee_value as f64);
        }
    }
}

/// 注册表为空时的快速路径。
pub fn dispatch_skipped(venue: &VenueId, event: LifecycleEvent) {
    debug!(
        target: "monitoring::dispatch",
        event = event.as_str(),
        venue = %venue,
        "no extensions registered, identity result"
    );

    if prometheus_enabled() {
        counter!(
            DISPATCH_TOTAL,
            "event" => event.as_str(),
            "outcome" => "empty"
        )
        .increment(1);
    }
}

pub fn dispatch_failed(venue: &VenueId, event: LifecycleEvent, error: &OrchestratorError) {
    warn!(
        target: "monitoring::dispatch",
        event = event.as_str(),
        venue = %venue,
        kind = error.label(),
        error = %error,
        "dispatch aborted"
    );

    if prometheus_enabled() {
        counter!(
            DISPATCH_TOTAL,
            "event" => event.as_str(),
            "outcome" => error.label()
        )
        .increment(1);
    }
}

pub fn admin_change(record: &ChangeRecord) {
    match record.venue() {
        Some(venue) => info!(
            target: "monitoring::admin",
            change = record.label(),
            venue = %venue,
            ?record,
            "registry change applied"
        ),
        None => info!(
            target: "monitoring::admin",
            change = record.label(),
            ?record,
            "registry change applied"
        ),
    }

    if prometheus_enabled() {
        counter!(ADMIN_CHANGE_TOTAL, "change" => record.label()).increment(1);
    }
}

pub fn admin_rejected(operation: &'static str, error: &OrchestratorError) {
    warn!(
        target: "monitoring::admin",
        operation,
        kind = error.label(),
        error = %error,
        "administrative call rejected"
    );

    if prometheus_enabled() {
        counter!(
            ADMIN_REJECTED_TOTAL,
            "operation" => operation,
            "kind" => error.label()
        )
        .increment(1);
    }
}

fn fee_source_label(source: FeeSource) -> &'static str {
    match source {
        FeeSource::Governance => "governance",
        FeeSource::VenueSpecific => "venue_specific",
        FeeSource::Method(method) => method.as_str(),
        FeeSource::Default => "default",
    }
}
