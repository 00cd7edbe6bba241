//! 환경변수 기반 설정 모듈.
//!
//! 시작 시점에 한 번 로드해 생성자에 명시적으로 전달합니다. 런타임에
//! 환경변수를 다시 읽는 곳은 없습니다.

use std::time::Duration;

use metals_core::{HttpConfig, RetryPolicy, SkipFlags};
use metals_data::extract::pdf::NumericPick;

use crate::error::CollectorError;
use crate::Result;

/// Collector 전체 설정.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// HTTP 클라이언트 설정 (프록시 포함)
    pub http: HttpConfig,
    /// 소스별 스킵 플래그
    pub skip: SkipFlags,
    /// 제공자 호출 재시도 정책
    pub retry: RetryConfig,
    /// 오케스트레이터 튜닝
    pub orchestrator: OrchestratorTuning,
    /// CFTC 백필 설정
    pub cftc: CftcConfig,
    /// SGE PDF 숫자 토큰 선택 전략
    pub sge_numeric_pick: NumericPick,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 재시도 정책 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 제공자당 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간 (초)
    pub base_delay_secs: u64,
    /// 시도마다 곱해지는 계수
    pub multiplier: f64,
}

impl RetryConfig {
    /// 정책 객체로 변환.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.base_delay_secs),
            self.multiplier,
        )
    }
}

/// 오케스트레이터 튜닝 값.
#[derive(Debug, Clone)]
pub struct OrchestratorTuning {
    /// 제공자 호출 하드 타임아웃 (초)
    pub call_timeout_secs: u64,
    /// 동일 소스 연속 호출 간 예의 지연 (밀리초)
    pub courtesy_delay_ms: u64,
    /// 경보를 발화하는 연속 실패 임계값
    pub alert_threshold: u32,
    /// SHFE 수증 lookback 일수 (장기 연휴 커버)
    pub shfe_lookback_days: u32,
}

impl OrchestratorTuning {
    /// 호출 타임아웃 Duration.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// 예의 지연 Duration.
    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }
}

/// CFTC 백필 설정.
#[derive(Debug, Clone)]
pub struct CftcConfig {
    /// 백필 시작 연도
    pub backfill_start_year: i32,
}

/// 데몬 모드 설정.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 워크플로우 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl DaemonConfig {
    /// 워크플로우 실행 주기를 Duration으로 반환.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("MQ_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/precious_metals.db?mode=rwc".to_string());
        if database_url.is_empty() {
            return Err(CollectorError::Config(
                "MQ_DATABASE_URL이 빈 값입니다".to_string(),
            ));
        }

        let sge_numeric_pick = match std::env::var("MQ_SGE_NUMERIC_PICK")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "first" => NumericPick::First,
            _ => NumericPick::Last,
        };

        Ok(Self {
            database_url,
            http: HttpConfig::from_env(),
            skip: SkipFlags::from_env(),
            retry: RetryConfig {
                max_attempts: env_var_parse("MQ_RETRY_MAX_ATTEMPTS", 4),
                base_delay_secs: env_var_parse("MQ_RETRY_BASE_DELAY_SECS", 2),
                multiplier: env_var_parse("MQ_RETRY_MULTIPLIER", 2.0),
            },
            orchestrator: OrchestratorTuning {
                call_timeout_secs: env_var_parse("MQ_CALL_TIMEOUT_SECS", 15),
                courtesy_delay_ms: env_var_parse("MQ_COURTESY_DELAY_MS", 500),
                alert_threshold: env_var_parse("MQ_ALERT_THRESHOLD", 3),
                shfe_lookback_days: env_var_parse("MQ_SHFE_LOOKBACK_DAYS", 6),
            },
            cftc: CftcConfig {
                backfill_start_year: env_var_parse("MQ_CFTC_BACKFILL_START_YEAR", 2010),
            },
            sge_numeric_pick,
            daemon: DaemonConfig {
                interval_minutes: env_var_parse("MQ_DAEMON_INTERVAL_MINUTES", 1440),
            },
        })
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용).
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_to_policy() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_secs: 1,
            multiplier: 2.0,
        };
        let policy = config.to_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    }
}
