//! 배처 — 이벤트 스트림을 유한한 벌크 인덱싱 호출로 변환
//!
//! 유한 유입 채널(`max_pending`)로 이벤트를 받아 버퍼링하고,
//! 배치 크기 도달 또는 타이머 만료 시 [`EventIndexer::index`]를
//! 동기적으로 호출합니다. 첫 이벤트가 타이머를 시작하며, 타이머 만료
//! 시점에 버퍼가 비어 있으면 플러시하지 않습니다.
//!
//! 내부 재시도는 없습니다. 인덱싱에 실패한 배치는 유실된 것으로
//! 간주되며, 에러 싱크가 설정되어 있으면 성공/실패를 불문하고 플러시
//! 결과가 싱크로 전달되어 호출자가 완료를 관측할 수 있습니다.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use loghive_core::error::LoghiveError;
use loghive_core::event::Event;
use loghive_core::metrics as metric_names;
use loghive_core::pipeline::EventIndexer;

use crate::config::BatcherConfig;

/// 플러시 결과. 성공이면 배치 크기, 실패면 에러입니다.
pub type FlushResult = Result<usize, LoghiveError>;

/// 이벤트 배처
pub struct Batcher<I: EventIndexer> {
    indexer: Arc<I>,
    config: BatcherConfig,
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
    error_tx: Option<mpsc::Sender<FlushResult>>,
}

impl<I: EventIndexer + 'static> Batcher<I> {
    /// 새 배처를 생성합니다.
    pub fn new(indexer: Arc<I>, config: BatcherConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.max_pending);
        Self {
            indexer,
            config,
            tx,
            rx,
            error_tx: None,
        }
    }

    /// 플러시 결과를 받을 에러 싱크를 설정합니다.
    pub fn error_sink(mut self, tx: mpsc::Sender<FlushResult>) -> Self {
        self.error_tx = Some(tx);
        self
    }

    /// 이벤트를 밀어 넣을 송신 채널을 반환합니다.
    ///
    /// 채널이 가득 차면 송신자가 블로킹되어 배압이 상류로 전파됩니다.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    /// 배칭 루프를 실행합니다. 취소되거나 모든 송신자가 닫히면
    /// 남은 이벤트를 플러시하고 종료합니다.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            indexer,
            config,
            tx,
            mut rx,
            error_tx,
        } = self;
        // 배처 자신이 채널을 열어 두지 않도록 내부 송신자를 버린다
        drop(tx);

        info!(
            size = config.size,
            timeout_ms = config.duration.as_millis() as u64,
            max_pending = config.max_pending,
            "batcher started"
        );

        let mut batch: Vec<Event> = Vec::with_capacity(config.size);
        let mut deadline = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // 채널에 남아 있는 이벤트까지 끌어모아 마지막 플러시
                    while let Ok(event) = rx.try_recv() {
                        batch.push(event);
                    }
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "flushing on shutdown");
                        flush(&*indexer, &mut batch, error_tx.as_ref()).await;
                    }
                    break;
                }

                received = rx.recv() => {
                    match received {
                        Some(event) => {
                            batch.push(event);
                            if batch.len() == 1 {
                                deadline = Instant::now() + config.duration;
                            }
                            if batch.len() >= config.size {
                                flush(&*indexer, &mut batch, error_tx.as_ref()).await;
                            }
                        }
                        None => {
                            if !batch.is_empty() {
                                flush(&*indexer, &mut batch, error_tx.as_ref()).await;
                            }
                            break;
                        }
                    }
                }

                _ = tokio::time::sleep_until(deadline), if !batch.is_empty() => {
                    counter!(metric_names::BATCH_TIMEOUTS_TOTAL).increment(1);
                    flush(&*indexer, &mut batch, error_tx.as_ref()).await;
                }
            }
        }

        info!("batcher stopped");
    }
}

/// 버퍼를 비우고 인덱서를 호출합니다. 완료까지 반환하지 않습니다.
async fn flush<I: EventIndexer>(
    indexer: &I,
    batch: &mut Vec<Event>,
    error_tx: Option<&mpsc::Sender<FlushResult>>,
) {
    let events = std::mem::take(batch);
    let count = events.len();

    let result = match indexer.index(events).await {
        Ok(()) => {
            counter!(metric_names::BATCH_INDEXED_TOTAL).increment(1);
            counter!(metric_names::EVENTS_INDEXED_TOTAL).increment(count as u64);
            Ok(count)
        }
        Err(e) => {
            counter!(metric_names::BATCH_INDEX_ERRORS_TOTAL).increment(1);
            error!(error = %e, count, "failed to index batch");
            Err(e)
        }
    };

    if let Some(error_tx) = error_tx {
        let _ = error_tx.send(result).await;
    }
}
