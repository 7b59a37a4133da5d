//! 진단 메트릭 엔드포인트
//!
//! 설정된 주소에 Prometheus exporter HTTP 리스너를 설치합니다.
//! 설치 후 모든 메트릭 설명을 등록합니다.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Prometheus exporter를 설치합니다. tokio 런타임 안에서 호출해야 합니다.
pub fn install(bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid diag bind address '{bind}'"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("failed to install metrics exporter on {addr}"))?;

    loghive_core::metrics::describe_all();
    info!(addr = %addr, "diagnostics endpoint available");
    Ok(())
}
