//! HTTP/수집 공통 설정.
//!
//! 환경변수 기반 feature flag 대신, 시작 시점에 한 번 구성해 생성자에
//! 명시적으로 전달하는 설정 구조체를 사용합니다. 런타임 중 변하는
//! 전역 상태는 없습니다.

use std::time::Duration;

/// 기본 브라우저 User-Agent.
///
/// CME/LBMA 등 일부 소스는 기본 클라이언트 UA를 차단합니다.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// HTTP 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// User-Agent 헤더
    pub user_agent: String,
    /// 프록시 URL (해외 소스 접근용)
    pub proxy_url: Option<String>,
    /// 프록시 사용 여부
    pub use_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy_url: None,
            use_proxy: false,
        }
    }
}

impl HttpConfig {
    /// 환경변수에서 설정 로드.
    ///
    /// - `MQ_PROXY`: 프록시 URL (기본 `http://127.0.0.1:10808`)
    /// - `MQ_USE_PROXY`: `1`이면 프록시 활성화
    /// - `MQ_HTTP_TIMEOUT_SECS`: 요청 타임아웃
    pub fn from_env() -> Self {
        let proxy_url = std::env::var("MQ_PROXY")
            .ok()
            .or_else(|| Some("http://127.0.0.1:10808".to_string()));
        let use_proxy = std::env::var("MQ_USE_PROXY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let timeout_secs = std::env::var("MQ_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            timeout_secs,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy_url,
            use_proxy,
        }
    }

    /// 요청 타임아웃을 Duration으로 반환.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// 소스별 수집 스킵 플래그.
///
/// 특정 소스가 네트워크 환경에서 접근 불가할 때 개별적으로 끕니다.
#[derive(Debug, Clone, Default)]
pub struct SkipFlags {
    /// Yahoo 차트 API 스킵 (GitHub Actions 등 차단 환경)
    pub skip_yahoo: bool,
    /// CFTC 수집 스킵
    pub skip_cftc: bool,
}

impl SkipFlags {
    /// 환경변수에서 플래그 로드 (`MQ_SKIP_YAHOO`, `MQ_SKIP_CFTC`).
    pub fn from_env() -> Self {
        Self {
            skip_yahoo: env_flag("MQ_SKIP_YAHOO"),
            skip_cftc: env_flag("MQ_SKIP_CFTC"),
        }
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_http_config() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(!config.use_proxy);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }
}
