//! 설정 관리 — loghive.toml 파싱 및 유효성 검증
//!
//! [`LoghiveConfig`]는 데몬이 읽는 통합 설정입니다. 각 섹션은
//! 담당 크레이트의 런타임 옵션으로 변환되어 전달됩니다.
//! `validate()`가 기동 전에 값 범위를 강제합니다 (보존 기간 최소 24시간 포함).

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 보존 기간 하한 (시간). CLI 도움말이 약속하는 값을 코드에서도 강제합니다.
pub const MIN_RETENTION_HOURS: i64 = 24;

/// Loghive 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoghiveConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// 수집 설정
    pub ingest: IngestConfig,
    /// 인덱스 엔진 설정
    pub engine: EngineConfig,
    /// 쿼리 서버 설정
    pub query: QueryConfig,
    /// 진단 엔드포인트 설정
    pub diag: DiagConfig,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 인덱스 데이터 루트 디렉토리
    pub data_dir: String,
}

/// 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// TCP 수집기 바인드 주소. 비어 있으면 비활성화.
    pub tcp_bind: String,
    /// UDP 수집기 바인드 주소. 비어 있으면 비활성화.
    pub udp_bind: String,
    /// TLS 서버 인증서(PEM) 경로. 키와 함께 설정 시 상호 TLS 활성화.
    pub tls_cert: String,
    /// TLS 개인 키(PEM) 경로
    pub tls_key: String,
    /// 입력 형식 (syslog, json)
    pub input_format: String,
    /// TCP 프레이밍 방식 (syslog, octet-count)
    pub framing: String,
    /// 배치 크기 (이 개수만큼 모이면 플러시)
    pub batch_size: usize,
    /// 배치 타임아웃 (밀리초)
    pub batch_timeout_ms: u64,
    /// 인덱싱 대기 큐 상한 (배처 유입 채널 용량)
    pub max_pending: usize,
}

/// 인덱스 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 새 인덱스당 샤드 수
    pub num_shards: usize,
    /// 인덱스 파티션 폭 (시간)
    pub index_duration_hours: u64,
    /// 보존 기간 문자열 (예: "168h", "24h30m"). 최소 24시간.
    pub retention: String,
}

/// 쿼리 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// 라인 프로토콜 쿼리 서버 바인드 주소
    pub bind: String,
}

/// 진단 엔드포인트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagConfig {
    /// Prometheus 메트릭 바인드 주소. 비어 있으면 비활성화.
    pub bind: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            data_dir: "/var/lib/loghive".to_owned(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            tcp_bind: "127.0.0.1:5514".to_owned(),
            udp_bind: String::new(),
            tls_cert: String::new(),
            tls_key: String::new(),
            input_format: "syslog".to_owned(),
            framing: "syslog".to_owned(),
            batch_size: 300,
            batch_timeout_ms: 1000,
            max_pending: 1000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_shards: 16,
            index_duration_hours: 24,
            retention: "168h".to_owned(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9950".to_owned(),
        }
    }
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            bind: String::new(),
        }
    }
}

impl Default for LoghiveConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            ingest: IngestConfig::default(),
            engine: EngineConfig::default(),
            query: QueryConfig::default(),
            diag: DiagConfig::default(),
        }
    }
}

impl LoghiveConfig {
    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MAX_BATCH_SIZE: usize = 100_000;
        const MAX_PENDING: usize = 10_000_000;
        const MAX_BATCH_TIMEOUT_MS: u64 = 3_600_000;
        const MAX_NUM_SHARDS: usize = 1024;

        let ingest = &self.ingest;

        if ingest.batch_size == 0 || ingest.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "ingest.batch_size".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_SIZE}"),
            });
        }

        if ingest.batch_timeout_ms == 0 || ingest.batch_timeout_ms > MAX_BATCH_TIMEOUT_MS {
            return Err(ConfigError::InvalidValue {
                field: "ingest.batch_timeout_ms".to_owned(),
                reason: format!("must be 1-{MAX_BATCH_TIMEOUT_MS}"),
            });
        }

        if ingest.max_pending == 0 || ingest.max_pending > MAX_PENDING {
            return Err(ConfigError::InvalidValue {
                field: "ingest.max_pending".to_owned(),
                reason: format!("must be 1-{MAX_PENDING}"),
            });
        }

        match ingest.input_format.as_str() {
            "syslog" | "json" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "ingest.input_format".to_owned(),
                    reason: format!("unsupported format '{other}', expected 'syslog' or 'json'"),
                });
            }
        }

        match ingest.framing.as_str() {
            "syslog" | "octet-count" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "ingest.framing".to_owned(),
                    reason: format!(
                        "unsupported framing '{other}', expected 'syslog' or 'octet-count'"
                    ),
                });
            }
        }

        // TLS는 인증서와 키가 모두 있어야 활성화됩니다.
        if ingest.tls_cert.is_empty() != ingest.tls_key.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "ingest.tls_cert".to_owned(),
                reason: "tls_cert and tls_key must be set together".to_owned(),
            });
        }

        if self.engine.num_shards == 0 || self.engine.num_shards > MAX_NUM_SHARDS {
            return Err(ConfigError::InvalidValue {
                field: "engine.num_shards".to_owned(),
                reason: format!("must be 1-{MAX_NUM_SHARDS}"),
            });
        }

        if self.engine.index_duration_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.index_duration_hours".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let retention = self.retention_period()?;
        if retention < Duration::hours(MIN_RETENTION_HOURS) {
            return Err(ConfigError::InvalidValue {
                field: "engine.retention".to_owned(),
                reason: "minimum retention is 24h".to_owned(),
            });
        }

        match self.general.log_format.as_str() {
            "json" | "pretty" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "general.log_format".to_owned(),
                    reason: format!("unknown log format '{other}', expected 'json' or 'pretty'"),
                });
            }
        }

        Ok(())
    }

    /// 보존 기간 설정을 [`Duration`]으로 파싱합니다.
    pub fn retention_period(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.engine.retention).map_err(|reason| ConfigError::InvalidValue {
            field: "engine.retention".to_owned(),
            reason,
        })
    }

    /// 인덱스 파티션 폭을 [`Duration`]으로 반환합니다.
    pub fn index_duration(&self) -> Duration {
        Duration::hours(self.engine.index_duration_hours as i64)
    }
}

/// `168h`, `24h30m`, `90s` 형태의 기간 문자열을 파싱합니다.
///
/// 단위: `ms`, `s`, `m`, `h`. 여러 구간을 이어 쓸 수 있으며 합산됩니다.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_owned());
    }

    let mut total = Duration::zero();
    let mut chars = s.chars().peekable();

    while chars.peek().is_some() {
        let mut digits = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_digit() {
                digits.push(*c);
                chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return Err(format!("invalid duration '{input}': expected a number"));
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| format!("invalid duration '{input}': number out of range"))?;

        let mut unit = String::new();
        while let Some(c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                unit.push(*c);
                chars.next();
            } else {
                break;
            }
        }

        let span = match unit.as_str() {
            "ms" => Duration::milliseconds(value),
            "s" => Duration::seconds(value),
            "m" => Duration::minutes(value),
            "h" => Duration::hours(value),
            "" => return Err(format!("invalid duration '{input}': missing unit")),
            other => return Err(format!("invalid duration '{input}': unknown unit '{other}'")),
        };
        total += span;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LoghiveConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn parse_duration_single_unit() {
        assert_eq!(parse_duration("168h").unwrap(), Duration::hours(168));
        assert_eq!(parse_duration("90s").unwrap(), Duration::seconds(90));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::milliseconds(500));
    }

    #[test]
    fn parse_duration_compound() {
        assert_eq!(
            parse_duration("24h30m").unwrap(),
            Duration::hours(24) + Duration::minutes(30)
        );
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("ten hours").is_err());
    }

    #[test]
    fn validate_enforces_retention_minimum() {
        let mut config = LoghiveConfig::default();
        config.engine.retention = "23h".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("24h"));

        config.engine.retention = "24h".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = LoghiveConfig::default();
        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_format() {
        let mut config = LoghiveConfig::default();
        config.ingest.input_format = "cef".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_framing() {
        let mut config = LoghiveConfig::default();
        config.ingest.framing = "newline".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_lonely_tls_cert() {
        let mut config = LoghiveConfig::default();
        config.ingest.tls_cert = "/etc/loghive/server.pem".to_owned();
        assert!(config.validate().is_err());

        config.ingest.tls_key = "/etc/loghive/server.key".to_owned();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_shards() {
        let mut config = LoghiveConfig::default();
        config.engine.num_shards = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn index_duration_from_hours() {
        let mut config = LoghiveConfig::default();
        config.engine.index_duration_hours = 6;
        assert_eq!(config.index_duration(), Duration::hours(6));
    }

    #[test]
    fn config_roundtrips_through_serde() {
        let config = LoghiveConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: LoghiveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ingest.batch_size, config.ingest.batch_size);
        assert_eq!(back.engine.retention, config.engine.retention);
    }

    #[test]
    fn partial_config_fills_defaults() {
        // 섹션과 필드가 일부만 있어도 나머지는 기본값이 적용되어야 함
        let parsed: LoghiveConfig =
            serde_json::from_str(r#"{"engine": {"num_shards": 4}}"#).unwrap();
        assert_eq!(parsed.engine.num_shards, 4);
        assert_eq!(parsed.engine.retention, "168h");
        assert_eq!(parsed.ingest.batch_size, 300);
    }
}
