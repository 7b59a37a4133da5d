//! 수집기 — 네트워크 바이트를 이벤트로 바꾸는 수신 루프
//!
//! - [`TcpCollector`]: 연결 수락 루프와 연결별 핸들러. 연결마다 독립된
//!   delimiter/parser를 쓰고, 읽기 데드라인 만료 시 vestige를 트리거
//!   합니다. 선택적으로 상호 TLS를 지원합니다.
//! - [`UdpCollector`]: 데이터그램 하나가 레코드 하나인 수신 루프.
//!
//! 각 수집기는 자체 tokio 태스크에서 실행되며, 파싱에 성공한 이벤트를
//! `mpsc::Sender<Event>`를 통해 배처로 전달합니다. 채널이 가득 차면
//! 핸들러가 블로킹되어 배압이 연결까지 전파됩니다.

pub mod tcp;
pub mod udp;

pub use tcp::TcpCollector;
pub use udp::UdpCollector;

use loghive_core::event::Event;
use loghive_core::metrics as metric_names;
use metrics::counter;
use tokio::sync::mpsc;

use crate::parser::RecordParser;

/// 레코드를 파싱해 이벤트로 만들어 배처 채널로 전달합니다.
///
/// 파싱 실패 레코드는 폐기됩니다 (파서가 메트릭을 집계).
/// 채널이 닫혔으면 `false`를 반환하여 호출자가 루프를 끝내게 합니다.
pub(crate) async fn forward_record(
    record: &str,
    parser: &RecordParser,
    source_addr: &str,
    protocol: &'static str,
    tx: &mpsc::Sender<Event>,
) -> bool {
    counter!(
        metric_names::INGEST_EVENTS_RECEIVED_TOTAL,
        metric_names::LABEL_PROTOCOL => protocol
    )
    .increment(1);

    let Some(parsed) = parser.parse(record) else {
        return true;
    };

    let event = Event::new(record, Some(parsed), source_addr);
    tx.send(event).await.is_ok()
}
