use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, OnceLock},
};

static METRICS: OnceLock<Mutex<MetricsState>> = OnceLock::new();

#[derive(Default)]
struct MetricsState {
    total: u64,
    errors: u64,
    per_endpoint: HashMap<&'static str, u64>,
    per_endpoint_err: HashMap<&'static str, u64>,
    // 上游成功/失败与时延统计（毫秒）
    upstream_ok: u64,
    upstream_err: u64,
    upstream_latency_sum_ms: u128,
    // 简易直方图分桶（毫秒）：<50, <100, <250, <500, <1000, >=1000
    upstream_hist_buckets: [u64; 6],
    // 交易生命周期
    broadcast_ok: u64,
    broadcast_err: u64,
    settled_confirmed: u64,
    settled_failed: u64,
    validations_valid: u64,
    validations_invalid: u64,
}

fn state() -> MutexGuard<'static, MetricsState> {
    let lock = METRICS.get_or_init(|| Mutex::new(MetricsState::default()));
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(), // 避免因锁污染导致 panic
    }
}

pub fn count_ok(endpoint: &'static str) {
    let mut s = state();
    s.total += 1;
    *s.per_endpoint.entry(endpoint).or_insert(0) += 1;
}

pub fn count_err(endpoint: &'static str) {
    let mut s = state();
    s.total += 1;
    s.errors += 1;
    *s.per_endpoint.entry(endpoint).or_insert(0) += 1;
    *s.per_endpoint_err.entry(endpoint).or_insert(0) += 1;
}

pub fn observe_upstream_latency_ms(latency_ms: u128, ok: bool) {
    let mut s = state();
    if ok {
        s.upstream_ok += 1;
    } else {
        s.upstream_err += 1;
    }
    s.upstream_latency_sum_ms += latency_ms;
    let b = match latency_ms {
        0..=49 => 0,
        50..=99 => 1,
        100..=249 => 2,
        250..=499 => 3,
        500..=999 => 4,
        _ => 5,
    };
    s.upstream_hist_buckets[b] += 1;
}

pub fn record_broadcast(ok: bool) {
    let mut s = state();
    if ok {
        s.broadcast_ok += 1;
    } else {
        s.broadcast_err += 1;
    }
}

pub fn record_settled(confirmed: bool) {
    let mut s = state();
    if confirmed {
        s.settled_confirmed += 1;
    } else {
        s.settled_failed += 1;
    }
}

pub fn record_validation(valid: bool) {
    let mut s = state();
    if valid {
        s.validations_valid += 1;
    } else {
        s.validations_invalid += 1;
    }
}

fn push_counter(out: &mut String, name: &str, help: &str) {
    out.push_str(&format!("# HELP {} {}\n", name, help));
    out.push_str(&format!("# TYPE {} counter\n", name));
}

pub fn render_prometheus() -> String {
    let s = state();
    let mut out = String::new();

    push_counter(&mut out, "ethflow_requests_total", "Total requests");
    out.push_str(&format!("ethflow_requests_total {}\n", s.total));

    push_counter(&mut out, "ethflow_errors_total", "Total error responses");
    out.push_str(&format!("ethflow_errors_total {}\n", s.errors));

    push_counter(
        &mut out,
        "ethflow_endpoint_requests_total",
        "Requests per endpoint",
    );
    for (k, v) in s.per_endpoint.iter() {
        out.push_str(&format!(
            "ethflow_endpoint_requests_total{{endpoint=\"{}\"}} {}\n",
            k, v
        ));
    }

    push_counter(&mut out, "ethflow_endpoint_errors_total", "Errors per endpoint");
    for (k, v) in s.per_endpoint_err.iter() {
        out.push_str(&format!(
            "ethflow_endpoint_errors_total{{endpoint=\"{}\"}} {}\n",
            k, v
        ));
    }

    // 上游统计
    push_counter(
        &mut out,
        "ethflow_gateway_requests_total",
        "Chain gateway calls",
    );
    out.push_str(&format!(
        "ethflow_gateway_requests_total{{result=\"ok\"}} {}\n",
        s.upstream_ok
    ));
    out.push_str(&format!(
        "ethflow_gateway_requests_total{{result=\"err\"}} {}\n",
        s.upstream_err
    ));

    push_counter(
        &mut out,
        "ethflow_gateway_latency_ms_sum",
        "Sum of chain gateway latency in ms",
    );
    out.push_str(&format!(
        "ethflow_gateway_latency_ms_sum {}\n",
        s.upstream_latency_sum_ms
    ));

    out.push_str("# HELP ethflow_gateway_latency_ms_bucket Chain gateway latency histogram\n");
    out.push_str("# TYPE ethflow_gateway_latency_ms_bucket histogram\n");
    let bounds = [50, 100, 250, 500, 1000];
    let mut cumulative = 0;
    for (i, bound) in bounds.iter().enumerate() {
        cumulative += s.upstream_hist_buckets[i];
        out.push_str(&format!(
            "ethflow_gateway_latency_ms_bucket{{le=\"{}\"}} {}\n",
            bound, cumulative
        ));
    }
    out.push_str(&format!(
        "ethflow_gateway_latency_ms_bucket{{le=\"+Inf\"}} {}\n",
        s.upstream_hist_buckets.iter().sum::<u64>()
    ));

    // 交易生命周期
    push_counter(&mut out, "ethflow_broadcasts_total", "Transaction broadcasts");
    out.push_str(&format!(
        "ethflow_broadcasts_total{{result=\"ok\"}} {}\n",
        s.broadcast_ok
    ));
    out.push_str(&format!(
        "ethflow_broadcasts_total{{result=\"err\"}} {}\n",
        s.broadcast_err
    ));

    push_counter(
        &mut out,
        "ethflow_transactions_settled_total",
        "Pending transactions reaching a terminal status",
    );
    out.push_str(&format!(
        "ethflow_transactions_settled_total{{status=\"confirmed\"}} {}\n",
        s.settled_confirmed
    ));
    out.push_str(&format!(
        "ethflow_transactions_settled_total{{status=\"failed\"}} {}\n",
        s.settled_failed
    ));

    push_counter(&mut out, "ethflow_validations_total", "Credit validations");
    out.push_str(&format!(
        "ethflow_validations_total{{valid=\"true\"}} {}\n",
        s.validations_valid
    ));
    out.push_str(&format!(
        "ethflow_validations_total{{valid=\"false\"}} {}\n",
        s.validations_invalid
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        count_ok("metrics_test_endpoint");
        count_err("metrics_test_endpoint");
        record_broadcast(true);
        record_validation(false);
        observe_upstream_latency_ms(120, true);

        let text = render_prometheus();
        assert!(text.contains("ethflow_endpoint_requests_total{endpoint=\"metrics_test_endpoint\"}"));
        assert!(text.contains("ethflow_broadcasts_total{result=\"ok\"}"));
        assert!(text.contains("ethflow_validations_total{valid=\"false\"}"));
        assert!(text.contains("ethflow_gateway_latency_ms_bucket{le=\"+Inf\"}"));
    }
}
