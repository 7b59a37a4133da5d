//! loghive-daemon 진입점
//!
//! 설정을 읽고 검증한 뒤 엔진, 배처, 수집기, 쿼리 서버를 조립하고
//! 종료 시그널까지 대기합니다. 종료 시에는 수집기 -> 배처 -> 엔진
//! 순서로 정리되어 버퍼에 남은 이벤트가 플러시된 후 엔진이 닫힙니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use loghive_core::config::LoghiveConfig;
use loghive_daemon::cli::DaemonCli;
use loghive_daemon::{logging, metrics_server, server, tls};
use loghive_engine::engine::{Engine, EngineOptions};
use loghive_ingest::batcher::Batcher;
use loghive_ingest::collector::{TcpCollector, UdpCollector};
use loghive_ingest::config::{BatcherConfig, TcpCollectorConfig, UdpCollectorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = load_config(&cli)?;
    config.validate().context("invalid configuration")?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    info!(
        data_dir = %config.general.data_dir,
        "loghive-daemon starting"
    );

    // 진단 엔드포인트 (설정된 경우)
    if !config.diag.bind.is_empty() {
        metrics_server::install(&config.diag.bind)?;
    }

    let cancel = CancellationToken::new();

    // 엔진
    let mut engine_options = EngineOptions::new(&config.general.data_dir);
    engine_options.num_shards = config.engine.num_shards;
    engine_options.index_duration = config.index_duration();
    engine_options.retention_period = config.retention_period().context("invalid retention")?;
    let engine = Arc::new(
        Engine::open(engine_options)
            .await
            .context("failed to open engine")?,
    );
    info!(
        shards = config.engine.num_shards,
        retention = %config.engine.retention,
        "engine opened"
    );

    // 배처 + 에러 싱크 드레인
    let (flush_tx, mut flush_rx) = mpsc::channel(64);
    let batcher = Batcher::new(Arc::clone(&engine), BatcherConfig::from_core(&config.ingest))
        .error_sink(flush_tx);
    let event_tx = batcher.sender();
    let batcher_task = tokio::spawn(batcher.run(cancel.clone()));

    tokio::spawn(async move {
        while let Some(outcome) = flush_rx.recv().await {
            if let Err(e) = outcome {
                error!(error = %e, "error indexing batch");
            }
        }
    });

    // TCP 수집기 (설정된 경우, 선택적 상호 TLS)
    if !config.ingest.tcp_bind.is_empty() {
        let acceptor = if !config.ingest.tls_cert.is_empty() {
            Some(tls::build_acceptor(
                &config.ingest.tls_cert,
                &config.ingest.tls_key,
            )?)
        } else {
            None
        };

        let collector = TcpCollector::bind(
            TcpCollectorConfig::from_core(&config.ingest),
            event_tx.clone(),
            cancel.clone(),
            acceptor,
        )
        .await
        .context("failed to start TCP collector")?;
        info!(addr = %config.ingest.tcp_bind, "TCP collector started");
        tokio::spawn(collector.run());
    }

    // UDP 수집기 (설정된 경우)
    if !config.ingest.udp_bind.is_empty() {
        let collector = UdpCollector::bind(
            UdpCollectorConfig::from_core(&config.ingest),
            event_tx.clone(),
            cancel.clone(),
        )
        .await
        .context("failed to start UDP collector")?;
        info!(addr = %config.ingest.udp_bind, "UDP collector started");
        tokio::spawn(collector.run());
    }
    drop(event_tx);

    // 쿼리 서버
    let query_server = server::QueryServer::bind(&config.query.bind, Arc::clone(&engine), cancel.clone())
        .await
        .context("failed to start query server")?;
    info!(addr = %config.query.bind, "query server started");
    tokio::spawn(query_server.run());

    // 종료 시그널 대기
    wait_for_shutdown().await;
    info!("shutdown signal received");

    // 수집기/서버/배처 중단 -> 잔여 배치 플러시 -> 엔진 닫기
    cancel.cancel();
    let _ = batcher_task.await;
    engine.close().await.context("failed to close engine")?;

    info!("loghive-daemon shut down");
    Ok(())
}

/// 설정 파일을 읽고 CLI 오버라이드를 적용합니다.
///
/// 기본 경로의 파일이 없으면 기본 설정으로 동작하고, 사용자가 명시한
/// 경로가 없으면 에러입니다.
fn load_config(cli: &DaemonCli) -> Result<LoghiveConfig> {
    let mut config = if cli.config.exists() {
        let raw = std::fs::read_to_string(&cli.config)
            .with_context(|| format!("cannot read config '{}'", cli.config.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("cannot parse config '{}'", cli.config.display()))?
    } else if cli.config == std::path::Path::new("/etc/loghive/loghive.toml") {
        LoghiveConfig::default()
    } else {
        anyhow::bail!("config file not found: {}", cli.config.display());
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.general.data_dir = data_dir.clone();
    }

    Ok(config)
}

/// SIGINT 또는 SIGTERM을 기다립니다.
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
