//! 쿼리 서버 — 라인 프로토콜 TCP 응답기
//!
//! 연결당 처리:
//! 1. LF로 끝나는 쿼리 한 줄을 읽고 CR/LF를 제거
//! 2. 빈 줄이면 다음 줄 대기
//! 3. `engine.search`를 호출해 레코드를 한 줄씩 내려보냄
//! 4. 스트림이 끝나면 빈 줄(연속 LF 두 개)로 결과의 끝을 알림
//! 5. 다음 쿼리를 위해 루프
//!
//! 검색 에러는 에러 메시지를 그대로 클라이언트에 보내고, 연결은
//! 다음 쿼리를 위해 유지됩니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loghive_engine::Engine;

/// 라인 프로토콜 쿼리 서버
pub struct QueryServer {
    listener: TcpListener,
    engine: Arc<Engine>,
    cancel: CancellationToken,
}

impl QueryServer {
    /// 설정된 주소에 바인드하여 서버를 생성합니다.
    pub async fn bind(
        bind_addr: &str,
        engine: Arc<Engine>,
        cancel: CancellationToken,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            listener,
            engine,
            cancel,
        })
    }

    /// 실제로 바인드된 로컬 주소를 반환합니다.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// 연결 수락 루프를 실행합니다. 취소될 때까지 실행됩니다.
    pub async fn run(self) {
        info!(addr = ?self.listener.local_addr().ok(), "query server listening");

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
                    debug!(peer = %peer_addr, "new query connection");

                    let engine = Arc::clone(&self.engine);
                    let cancel = self.cancel.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, engine, cancel).await;
                        debug!(peer = %peer_addr, "query connection closed");
                    });
                }
                _ = self.cancel.cancelled() => {
                    info!("query server received shutdown signal");
                    break;
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, engine: Arc<Engine>, cancel: CancellationToken) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            read = reader.read_line(&mut line) => {
                match read {
                    Ok(0) => return,
                    Ok(_) => {}
                    Err(_) => return,
                }

                let query = line.trim_end_matches(['\r', '\n']);
                if query.is_empty() {
                    continue;
                }

                debug!(query = %query, "executing query");
                match engine.search(query).await {
                    Ok(mut results) => {
                        while let Some(item) = results.recv().await {
                            match item {
                                Ok(doc) => {
                                    if write_half.write_all(doc.as_bytes()).await.is_err()
                                        || write_half.write_all(b"\n").await.is_err()
                                    {
                                        return;
                                    }
                                }
                                Err(e) => {
                                    // 검색 에러는 그대로 클라이언트로
                                    let _ = write_half.write_all(e.to_string().as_bytes()).await;
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        if write_half.write_all(e.to_string().as_bytes()).await.is_err() {
                            return;
                        }
                    }
                }

                // 결과의 끝 — 연속 LF 두 개
                if write_half.write_all(b"\n\n").await.is_err() {
                    return;
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}
