//! UDP 수집기
//!
//! 데이터그램 하나를 레코드 하나로 취급합니다. delimiter 없이 꼬리의
//! CR/LF만 제거하고 파서로 넘깁니다.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loghive_core::event::Event;

use super::forward_record;
use crate::config::{UdpCollectorConfig, MSG_BUF_SIZE};
use crate::error::IngestPipelineError;
use crate::parser::RecordParser;

/// UDP 수집기
pub struct UdpCollector {
    config: UdpCollectorConfig,
    socket: UdpSocket,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
}

impl UdpCollector {
    /// 설정된 주소에 바인드하여 수집기를 생성합니다.
    pub async fn bind(
        config: UdpCollectorConfig,
        tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Result<Self, IngestPipelineError> {
        let socket = UdpSocket::bind(&config.bind_addr).await.map_err(|e| {
            IngestPipelineError::Collector {
                source_type: "udp".to_owned(),
                reason: format!("failed to bind to {}: {}", config.bind_addr, e),
            }
        })?;
        Ok(Self {
            config,
            socket,
            tx,
            cancel,
        })
    }

    /// 실제로 바인드된 로컬 주소를 반환합니다.
    pub fn local_addr(&self) -> Result<SocketAddr, IngestPipelineError> {
        Ok(self.socket.local_addr()?)
    }

    /// 데이터그램 수신 루프를 실행합니다. 취소될 때까지 실행됩니다.
    pub async fn run(self) -> Result<(), IngestPipelineError> {
        info!(addr = %self.config.bind_addr, "UDP collector listening");

        let parser = RecordParser::new(self.config.format);
        let mut buf = [0u8; MSG_BUF_SIZE];

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    let (len, peer_addr) = match received {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "UDP recv error");
                            continue;
                        }
                    };
                    if len == 0 {
                        continue;
                    }

                    let record = String::from_utf8_lossy(&buf[..len]);
                    let record = record.trim_end_matches(['\r', '\n']);

                    if !forward_record(record, &parser, &peer_addr.to_string(), "udp", &self.tx).await {
                        debug!("batcher channel closed, stopping UDP collector");
                        return Ok(());
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("UDP collector received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }
}
