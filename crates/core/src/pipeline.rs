//! 모듈 경계 trait — 배처와 인덱스 엔진 사이의 계약
//!
//! [`EventIndexer`]는 이벤트 배치를 영속화할 수 있는 컴포넌트가 구현하는
//! trait입니다. 배처(`loghive-ingest`)는 이 trait을 통해서만 엔진
//! (`loghive-engine`)과 통신하므로 두 크레이트는 서로를 직접 알지 못합니다.

use std::future::Future;

use crate::error::LoghiveError;
use crate::event::Event;

/// 이벤트 배치를 인덱싱하는 컴포넌트의 trait
///
/// `index`는 배치의 모든 서브 배치가 완료될 때까지 반환하지 않습니다.
/// 실패 시 배치 전체가 유실된 것으로 간주되며, 내부 재시도는 없습니다.
pub trait EventIndexer: Send + Sync {
    /// 이벤트 배치를 인덱싱합니다.
    fn index(
        &self,
        events: Vec<Event>,
    ) -> impl Future<Output = Result<(), LoghiveError>> + Send;
}
