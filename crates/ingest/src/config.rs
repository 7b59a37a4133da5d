//! 수집 파이프라인 런타임 설정
//!
//! core의 [`IngestConfig`](loghive_core::config::IngestConfig)에서
//! 파생되는 수집기/배처 옵션입니다. 문자열 기반 설정을 타입 있는
//! 옵션으로 변환합니다.

use std::time::Duration;

use crate::delimiter::Framing;
use crate::parser::LogFormat;

/// TCP 연결의 읽기 데드라인 기본값. 만료 시 delimiter vestige가
/// 트리거됩니다.
pub const NEWLINE_TIMEOUT: Duration = Duration::from_millis(1000);

/// UDP 데이터그램 수신 버퍼 크기. 한 데이터그램이 한 레코드입니다.
pub const MSG_BUF_SIZE: usize = 256;

/// TCP 수집기 설정
#[derive(Debug, Clone)]
pub struct TcpCollectorConfig {
    /// 바인드 주소 (예: "127.0.0.1:5514")
    pub bind_addr: String,
    /// 프레이밍 방식
    pub framing: Framing,
    /// 레코드 형식
    pub format: LogFormat,
    /// 읽기 데드라인
    pub read_timeout: Duration,
    /// 최대 동시 연결 수
    pub max_connections: usize,
}

impl Default for TcpCollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5514".to_owned(),
            framing: Framing::Syslog,
            format: LogFormat::Rfc5424,
            read_timeout: NEWLINE_TIMEOUT,
            max_connections: 256,
        }
    }
}

impl TcpCollectorConfig {
    /// core 설정에서 TCP 수집기 설정을 만듭니다.
    ///
    /// 형식/프레이밍 문자열은 `LoghiveConfig::validate`가 먼저 검증하므로
    /// 해석 불가 값은 기본값으로 대체됩니다.
    pub fn from_core(core: &loghive_core::config::IngestConfig) -> Self {
        Self {
            bind_addr: core.tcp_bind.clone(),
            framing: Framing::from_name(&core.framing).unwrap_or_default(),
            format: LogFormat::from_name(&core.input_format).unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// UDP 수집기 설정
#[derive(Debug, Clone)]
pub struct UdpCollectorConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 레코드 형식
    pub format: LogFormat,
}

impl Default for UdpCollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:5514".to_owned(),
            format: LogFormat::Rfc5424,
        }
    }
}

impl UdpCollectorConfig {
    /// core 설정에서 UDP 수집기 설정을 만듭니다.
    pub fn from_core(core: &loghive_core::config::IngestConfig) -> Self {
        Self {
            bind_addr: core.udp_bind.clone(),
            format: LogFormat::from_name(&core.input_format).unwrap_or_default(),
        }
    }
}

/// 배처 설정
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// 배치당 최대 이벤트 수
    pub size: usize,
    /// 배치 타임아웃
    pub duration: Duration,
    /// 유입 채널 용량 (이 이상 쌓이면 생산자가 블로킹)
    pub max_pending: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            size: 300,
            duration: Duration::from_millis(1000),
            max_pending: 1000,
        }
    }
}

impl BatcherConfig {
    /// core 설정에서 배처 설정을 만듭니다.
    pub fn from_core(core: &loghive_core::config::IngestConfig) -> Self {
        Self {
            size: core.batch_size,
            duration: Duration::from_millis(core.batch_timeout_ms),
            max_pending: core.max_pending,
        }
    }
}
