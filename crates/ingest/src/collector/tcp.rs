//! TCP 수집기
//!
//! 연결 수락 루프와 연결별 핸들러로 구성됩니다. 핸들러는 소켓에서
//! 바이트를 하나씩 읽어 delimiter에 밀어 넣고, 레코드가 완성되면
//! 파싱하여 배처 채널로 보냅니다.
//!
//! 읽기에는 데드라인이 걸려 있습니다. 데드라인이 만료되면 delimiter의
//! vestige를 트리거해 유휴 연결의 잔여 레코드를 회수하고 읽기를
//! 계속합니다. EOF에서는 마지막 vestige 후 연결을 끝냅니다.
//!
//! TLS acceptor가 주어지면 리스너가 상호 TLS로 감싸져 클라이언트
//! 인증서를 요구하고 검증합니다.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loghive_core::event::Event;
use loghive_core::metrics as metric_names;

use super::forward_record;
use crate::config::TcpCollectorConfig;
use crate::delimiter::{Delimiter, FramingError};
use crate::error::IngestPipelineError;
use crate::parser::RecordParser;

/// TCP 수집기
pub struct TcpCollector {
    config: TcpCollectorConfig,
    listener: TcpListener,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    tls: Option<TlsAcceptor>,
}

impl TcpCollector {
    /// 설정된 주소에 바인드하여 수집기를 생성합니다.
    pub async fn bind(
        config: TcpCollectorConfig,
        tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
        tls: Option<TlsAcceptor>,
    ) -> Result<Self, IngestPipelineError> {
        let listener = TcpListener::bind(&config.bind_addr).await.map_err(|e| {
            IngestPipelineError::Collector {
                source_type: "tcp".to_owned(),
                reason: format!("failed to bind to {}: {}", config.bind_addr, e),
            }
        })?;
        Ok(Self {
            config,
            listener,
            tx,
            cancel,
            tls,
        })
    }

    /// 실제로 바인드된 로컬 주소를 반환합니다.
    pub fn local_addr(&self) -> Result<SocketAddr, IngestPipelineError> {
        Ok(self.listener.local_addr()?)
    }

    /// 연결 수락 루프를 실행합니다. 취소될 때까지 실행됩니다.
    pub async fn run(self) -> Result<(), IngestPipelineError> {
        info!(
            addr = %self.config.bind_addr,
            tls = self.tls.is_some(),
            "TCP collector listening"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                        warn!(peer = %peer_addr, "max connections reached, rejecting");
                        continue;
                    };

                    debug!(peer = %peer_addr, "accepted connection");
                    gauge!(metric_names::INGEST_ACTIVE_CONNECTIONS).increment(1.0);

                    let config = self.config.clone();
                    let tx = self.tx.clone();
                    let cancel = self.cancel.clone();
                    let tls = self.tls.clone();

                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, config, tx, cancel, tls).await;
                        gauge!(metric_names::INGEST_ACTIVE_CONNECTIONS).decrement(1.0);
                        drop(permit);
                    });
                }
                _ = self.cancel.cancelled() => {
                    info!("TCP collector received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// 단일 연결을 처리합니다. TLS가 설정되어 있으면 핸드셰이크를 먼저
/// 수행합니다.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    config: TcpCollectorConfig,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    tls: Option<TlsAcceptor>,
) {
    match tls {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                handle_stream(tls_stream, peer_addr, &config, &tx, &cancel).await;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "TLS handshake failed");
            }
        },
        None => {
            handle_stream(stream, peer_addr, &config, &tx, &cancel).await;
        }
    }
    debug!(peer = %peer_addr, "connection closed");
}

/// 바이트 단위 읽기 루프. 연결마다 독립된 delimiter/parser를 씁니다.
async fn handle_stream<S: AsyncRead + Unpin>(
    stream: S,
    peer_addr: SocketAddr,
    config: &TcpCollectorConfig,
    tx: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut delimiter = Delimiter::new(config.framing);
    let parser = RecordParser::new(config.format);
    let peer = peer_addr.to_string();

    loop {
        tokio::select! {
            read = timeout(config.read_timeout, reader.read_u8()) => {
                match read {
                    Ok(Ok(byte)) => {
                        match delimiter.push(byte) {
                            Ok(Some(record)) => {
                                if !forward_record(&record, &parser, &peer, "tcp", tx).await {
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(FramingError::Broken) => {
                                // 프레이밍이 복구 불가능하게 깨짐 — 연결 종료
                                debug!(peer = %peer, "framing broken, closing connection");
                                return;
                            }
                            Err(e) => {
                                counter!(metric_names::INGEST_FRAMING_ERRORS_TOTAL).increment(1);
                                debug!(peer = %peer, error = %e, "framing error");
                            }
                        }
                    }
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        // EOF — 마지막 vestige 후 종료
                        if let Some(record) = delimiter.vestige() {
                            forward_record(&record, &parser, &peer, "tcp", tx).await;
                        }
                        return;
                    }
                    Ok(Err(e)) => {
                        debug!(peer = %peer, error = %e, "read error, closing connection");
                        return;
                    }
                    Err(_elapsed) => {
                        // 읽기 데드라인 만료 — 유휴 연결의 잔여 레코드 회수
                        counter!(metric_names::INGEST_READ_TIMEOUTS_TOTAL).increment(1);
                        if let Some(record) = delimiter.vestige() {
                            if !forward_record(&record, &parser, &peer, "tcp", tx).await {
                                return;
                            }
                        }
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!(peer = %peer, "connection handler received shutdown signal");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    use crate::delimiter::Framing;
    use crate::parser::LogFormat;

    async fn start_collector(
        framing: Framing,
        read_timeout: Duration,
    ) -> (SocketAddr, mpsc::Receiver<Event>, CancellationToken) {
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let config = TcpCollectorConfig {
            bind_addr: "127.0.0.1:0".to_owned(),
            framing,
            format: LogFormat::Rfc5424,
            read_timeout,
            max_connections: 8,
        };
        let collector = TcpCollector::bind(config, tx, cancel.clone(), None)
            .await
            .unwrap();
        let addr = collector.local_addr().unwrap();
        tokio::spawn(collector.run());
        (addr, rx, cancel)
    }

    #[tokio::test]
    async fn receives_newline_delimited_records() {
        let (addr, mut rx, cancel) =
            start_collector(Framing::Syslog, Duration::from_millis(100)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - first\n<33>5 1985-04-12T23:20:51.52Z test.com cron 304 - second\n",
            )
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            first.text,
            "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - first"
        );

        // 두 번째 레코드는 EOF vestige로 회수됨
        let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            second.text,
            "<33>5 1985-04-12T23:20:51.52Z test.com cron 304 - second"
        );
        assert!(second.sequence > first.sequence);

        cancel.cancel();
    }

    #[tokio::test]
    async fn idle_timeout_triggers_vestige() {
        let (addr, mut rx, cancel) =
            start_collector(Framing::Syslog, Duration::from_millis(50)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        // 개행 없이 레코드 하나 — 데드라인 만료가 vestige를 트리거해야 함
        stream
            .write_all(b"<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - no newline")
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event.text,
            "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - no newline"
        );

        cancel.cancel();
    }

    #[tokio::test]
    async fn octet_count_framing_end_to_end() {
        let (addr, mut rx, cancel) =
            start_collector(Framing::OctetCount, Duration::from_millis(100)).await;

        let record = "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - framed";
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("{}:{};", record.len(), record).as_bytes())
            .await
            .unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.text, record);

        cancel.cancel();
    }

    #[tokio::test]
    async fn unparsable_records_are_dropped() {
        let (addr, mut rx, cancel) =
            start_collector(Framing::Syslog, Duration::from_millis(50)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        // 헤더는 있지만 RFC 5424 형태가 아님 — delimiter는 자르지만 파서가 거부
        stream
            .write_all(b"<33>5 incomplete\n<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - good\n")
            .await
            .unwrap();
        stream.shutdown().await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(event.text.ends_with("good"));

        cancel.cancel();
    }

    #[tokio::test]
    async fn multiple_connections_are_isolated() {
        let (addr, mut rx, cancel) =
            start_collector(Framing::Syslog, Duration::from_millis(50)).await;

        // 연결 A는 부분 레코드만 보내고, 연결 B는 완전한 레코드를 보냄.
        // A의 부분 상태가 B에 영향을 주어서는 안 됨.
        let mut a = TcpStream::connect(addr).await.unwrap();
        a.write_all(b"<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - from-a")
            .await
            .unwrap();

        let mut b = TcpStream::connect(addr).await.unwrap();
        b.write_all(b"<34>5 1985-04-12T23:20:51.52Z other.com sshd 99 - from-b")
            .await
            .unwrap();
        b.shutdown().await.unwrap();

        let mut texts = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            texts.push(event.text);
        }
        texts.sort();
        assert!(texts[0].ends_with("from-a"));
        assert!(texts[1].ends_with("from-b"));

        cancel.cancel();
    }
}
