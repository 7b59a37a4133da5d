//! 시스템 끝단 테스트 — 수집기부터 쿼리 서버까지 실제 소켓으로 검증
//!
//! 각 테스트는 임시 디렉토리와 임시 포트로 전체 파이프라인을 조립하고,
//! syslog 라인을 TCP로 보낸 뒤 쿼리 서버의 라인 프로토콜로 결과를
//! 확인합니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use loghive_daemon::server::QueryServer;
use loghive_engine::engine::{Engine, EngineOptions};
use loghive_ingest::batcher::Batcher;
use loghive_ingest::collector::{TcpCollector, UdpCollector};
use loghive_ingest::config::{BatcherConfig, TcpCollectorConfig, UdpCollectorConfig};
use loghive_ingest::delimiter::Framing;
use loghive_ingest::parser::LogFormat;

/// 조립된 테스트 시스템
struct TestSystem {
    ingest_addr: std::net::SocketAddr,
    query_addr: std::net::SocketAddr,
    engine: Arc<Engine>,
    event_tx: mpsc::Sender<loghive_core::event::Event>,
    cancel: CancellationToken,
    _data_dir: tempfile::TempDir,
}

impl TestSystem {
    /// 작은 배치/짧은 타임아웃으로 전체 파이프라인을 띄웁니다.
    async fn start() -> Self {
        Self::start_with_framing(Framing::Syslog).await
    }

    async fn start_with_framing(framing: Framing) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();

        let mut engine_options = EngineOptions::new(data_dir.path());
        engine_options.num_shards = 4;
        let engine = Arc::new(Engine::open(engine_options).await.unwrap());

        let batcher_config = BatcherConfig {
            size: 16,
            duration: Duration::from_millis(50),
            max_pending: 256,
        };
        let (flush_tx, mut flush_rx) = mpsc::channel(16);
        let batcher =
            Batcher::new(Arc::clone(&engine), batcher_config).error_sink(flush_tx);
        let event_tx = batcher.sender();
        tokio::spawn(batcher.run(cancel.clone()));
        tokio::spawn(async move { while flush_rx.recv().await.is_some() {} });

        let collector_config = TcpCollectorConfig {
            bind_addr: "127.0.0.1:0".to_owned(),
            framing,
            format: LogFormat::Rfc5424,
            read_timeout: Duration::from_millis(50),
            max_connections: 8,
        };
        let collector = TcpCollector::bind(collector_config, event_tx.clone(), cancel.clone(), None)
            .await
            .unwrap();
        let ingest_addr = collector.local_addr().unwrap();
        tokio::spawn(collector.run());

        let query_server = QueryServer::bind("127.0.0.1:0", Arc::clone(&engine), cancel.clone())
            .await
            .unwrap();
        let query_addr = query_server.local_addr().unwrap();
        tokio::spawn(query_server.run());

        Self {
            ingest_addr,
            query_addr,
            engine,
            event_tx,
            cancel,
            _data_dir: data_dir,
        }
    }

    /// syslog 라인들을 보내고 모두 색인될 때까지 기다립니다.
    async fn ingest(&self, lines: &[&str]) {
        let mut stream = TcpStream::connect(self.ingest_addr).await.unwrap();
        for line in lines {
            stream.write_all(line.as_bytes()).await.unwrap();
            stream.write_all(b"\n").await.unwrap();
        }
        stream.shutdown().await.unwrap();

        let want = lines.len() as u64;
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if self.engine.total().await >= want {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("events were not indexed in time"));
    }

    /// 쿼리 하나를 보내고 빈 줄 전까지의 응답 라인들을 돌려받습니다.
    async fn query(&self, query: &str) -> Vec<String> {
        let stream = TcpStream::connect(self.query_addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half
            .write_all(format!("{query}\n").as_bytes())
            .await
            .unwrap();

        let mut reader = BufReader::new(read_half);
        let mut results = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = tokio::time::timeout(Duration::from_secs(10), reader.read_line(&mut line))
                .await
                .unwrap()
                .unwrap();
            if n == 0 {
                break;
            }
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                // 결과의 끝
                break;
            }
            results.push(trimmed.to_owned());
        }
        results
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        // 배처/수집기가 멈춘 뒤 엔진을 닫는다
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.engine.close().await.unwrap();
    }
}

/// 한 응답을 읽습니다. 결과 라인들 뒤의 `\n\n` 종결자까지 소비하므로
/// 같은 연결에서 다음 응답을 이어 읽을 수 있습니다.
async fn read_until_blank(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> Vec<String> {
    let mut out = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        let n = tokio::time::timeout(Duration::from_secs(10), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        if n == 0 {
            return out;
        }
        if line.trim_end_matches('\n').is_empty() {
            break;
        }
        out.push(line.trim_end_matches('\n').to_owned());
    }
    // 종결자의 두 번째 LF 소비
    line.clear();
    let _ = tokio::time::timeout(Duration::from_secs(10), reader.read_line(&mut line))
        .await
        .unwrap()
        .unwrap();
    out
}

// 시나리오 1: 빈 시스템 검색 -> 단일 이벤트 색인 -> 검색
#[tokio::test]
async fn empty_system_then_single_event() {
    let system = TestSystem::start().await;

    let results = system.query("server").await;
    assert!(results.is_empty());

    let line = "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - password accepted";
    system.ingest(&[line]).await;

    let results = system.query("password").await;
    assert_eq!(results, vec![line.to_owned()]);

    system.shutdown().await;
}

// 시나리오 2: 두 건 매칭, 기준 시각 오름차순, 바이트 단위 동일
#[tokio::test]
async fn two_matches_come_back_in_time_order() {
    let system = TestSystem::start().await;

    let earlier = "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - password accepted";
    let later = "<33>5 1985-04-12T23:20:51.52Z test.com cron 304 - password rejected";
    system.ingest(&[earlier, later]).await;

    let results = system.query("password").await;
    assert_eq!(results, vec![earlier.to_owned(), later.to_owned()]);

    system.shutdown().await;
}

// 같은 연결에서 여러 쿼리를 연달아 실행할 수 있어야 함
#[tokio::test]
async fn connection_survives_multiple_queries() {
    let system = TestSystem::start().await;

    let line = "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - GET /wp-login.php";
    system.ingest(&[line]).await;

    let stream = TcpStream::connect(system.query_addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"login\n").await.unwrap();
    let first = read_until_blank(&mut reader).await;
    assert_eq!(first.len(), 1);

    write_half.write_all(b"nomatch\n").await.unwrap();
    let second = read_until_blank(&mut reader).await;
    assert!(second.is_empty());

    write_half.write_all(b"wp\n").await.unwrap();
    let third = read_until_blank(&mut reader).await;
    assert_eq!(third.len(), 1);

    system.shutdown().await;
}

// 잘못된 쿼리의 에러 메시지가 그대로 전달되고, 연결은 유지됨
#[tokio::test]
async fn malformed_query_returns_parser_error() {
    let system = TestSystem::start().await;

    let stream = TcpStream::connect(system.query_addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"apache.status:\n").await.unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(
        line.trim_end_matches('\n'),
        "found 'EOF', expected SEARCH TERM"
    );

    system.shutdown().await;
}

// octet-count 프레이밍으로도 같은 끝단 흐름이 동작해야 함
#[tokio::test]
async fn octet_count_ingest_end_to_end() {
    let system = TestSystem::start_with_framing(Framing::OctetCount).await;

    let line = "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - framed payload";
    let mut stream = TcpStream::connect(system.ingest_addr).await.unwrap();
    stream
        .write_all(format!("{}:{};", line.len(), line).as_bytes())
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if system.engine.total().await >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    let results = system.query("framed").await;
    assert_eq!(results, vec![line.to_owned()]);

    system.shutdown().await;
}

// UDP 데이터그램 수집의 끝단 흐름
#[tokio::test]
async fn udp_ingest_end_to_end() {
    let system = TestSystem::start().await;

    // 같은 엔진/배처에 UDP 수집기를 추가로 연결
    let udp_config = UdpCollectorConfig {
        bind_addr: "127.0.0.1:0".to_owned(),
        format: LogFormat::Rfc5424,
    };
    let udp = UdpCollector::bind(udp_config, system.event_tx.clone(), system.cancel.clone())
        .await
        .unwrap();
    let udp_addr = udp.local_addr().unwrap();
    tokio::spawn(udp.run());

    let line = "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - datagram record";
    let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(format!("{line}\n").as_bytes(), udp_addr)
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if system.engine.total().await >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    let results = system.query("datagram").await;
    assert_eq!(results, vec![line.to_owned()]);

    system.shutdown().await;
}

// 여러 라인과 불리언 쿼리의 끝단 조합
#[tokio::test]
async fn boolean_query_end_to_end() {
    let system = TestSystem::start().await;

    let get_line =
        "<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - GET /wp-content/uploads/2012/03/steelhead.jpg";
    let post_line =
        "<33>5 1985-04-12T23:21:50.52Z test.com cron 304 - POST /log-includes/smilies/frownie.png";
    system.ingest(&[get_line, post_line]).await;

    let results = system.query("GET OR POST").await;
    assert_eq!(results.len(), 2);

    let results = system.query("steelhead").await;
    assert_eq!(results, vec![get_line.to_owned()]);

    let results = system.query("uploads NOT frownie").await;
    assert_eq!(results, vec![get_line.to_owned()]);

    system.shutdown().await;
}
