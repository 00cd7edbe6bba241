//! 소스별 제공자 어댑터.
//!
//! 각 어댑터는 하나의 (네트워크) 소스와 그 포맷 추출기를
//! [`metals_core::DataProvider`] 계약 뒤로 묶습니다. 재시도·lookback·
//! fallback 순서는 어댑터가 아니라 오케스트레이터의 책임입니다.
//!
//! 원시 페이로드(바이트, 파싱 전 텍스트)는 호출 내부에서만 존재하며
//! 절대 영속화되지 않습니다.

pub mod cftc;
pub mod comex;
pub mod lbma;
pub mod sge;
pub mod shfe;
pub mod sina;
pub mod yahoo;

use metals_core::{FetchError, HttpConfig};
use reqwest::StatusCode;

/// 공통 HTTP 클라이언트 생성.
///
/// 타임아웃·브라우저 UA·(선택) 프록시를 설정합니다.
pub(crate) fn build_client(config: &HttpConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone());

    if config.use_proxy {
        if let Some(url) = &config.proxy_url {
            if let Ok(proxy) = reqwest::Proxy::all(url) {
                builder = builder.proxy(proxy);
            }
        }
    }

    builder.build().expect("HTTP 클라이언트 생성 실패")
}

/// reqwest 전송 오류 → 수집 실패 분류.
pub(crate) fn transport_error(err: reqwest::Error) -> FetchError {
    FetchError::Transient(err.to_string())
}

/// HTTP 상태 코드 → 수집 실패 분류. 404만 확정적 미발행으로 취급.
pub(crate) fn status_error(status: StatusCode, what: &str) -> FetchError {
    if status == StatusCode::NOT_FOUND {
        FetchError::NotPublished(format!("{}: HTTP 404", what))
    } else {
        FetchError::Transient(format!("{}: HTTP {}", what, status))
    }
}
