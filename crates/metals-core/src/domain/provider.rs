//! 데이터 소스 capability trait.
//!
//! 하나의 (네트워크/파일) 소스와 그에 맞는 추출기를 묶어 균일한
//! `fetch(context) -> Records | Failure` 계약 뒤로 감춥니다.
//! 오케스트레이터는 이 trait의 우선순위 목록을 순회할 뿐, 소스별
//! 분기를 가지지 않습니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// 한 번의 수집 호출에 전달되는 컨텍스트.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchContext {
    /// 수집 대상 날짜.
    pub target_date: NaiveDate,
    /// 파이프라인 실행 날짜. 보고서 날짜 마커가 없을 때의 fallback.
    pub run_date: NaiveDate,
    /// 시계열 소스가 당겨올 최근 이력 일수 힌트.
    ///
    /// 호출자가 콜드스타트(저장 이력 부족) 시 30으로 올려 줍니다.
    pub history_days: u32,
}

impl FetchContext {
    /// 대상 날짜와 실행 날짜가 같은 컨텍스트 생성.
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            target_date: date,
            run_date: date,
            history_days: 5,
        }
    }

    /// 대상 날짜만 바꾼 컨텍스트 반환. lookback 회귀 시 사용.
    pub fn with_target(&self, date: NaiveDate) -> Self {
        Self {
            target_date: date,
            ..*self
        }
    }

    /// 이력 일수 힌트를 바꾼 컨텍스트 반환.
    pub fn with_history_days(&self, days: u32) -> Self {
        Self {
            history_days: days,
            ..*self
        }
    }
}

/// 수집 실패 분류.
///
/// 예상된 실패 모드는 스테이지 경계를 넘지 않습니다. `Transient`만
/// 백오프 재시도 대상이며, 나머지는 해당 시도를 종료하고 다음
/// 날짜/제공자로 넘어갑니다.
#[derive(Debug, Error)]
pub enum FetchError {
    /// 일시적 네트워크 실패 (타임아웃, 연결 오류). 재시도 대상.
    #[error("일시적 네트워크 오류: {0}")]
    Transient(String),

    /// 확정적 404. 미발행일 또는 경로 변경.
    #[error("데이터 미발행 (404): {0}")]
    NotPublished(String),

    /// 기대한 헤더/컬럼/키워드가 없음. 소스 레이아웃 변경 신호.
    #[error("구조 변경 감지: {0}")]
    Structural(String),

    /// 페이로드 디코딩 실패 (XLS/PDF/JSON/ZIP).
    #[error("페이로드 디코딩 실패: {0}")]
    Decode(String),
}

impl FetchError {
    /// 백오프 재시도 대상인지 여부.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// 실패 스트릭(연속 실패 카운터)을 증가시키는 확정적 실패인지 여부.
    ///
    /// 404와 구조 불일치는 소스 측 변경 신호이므로 스트릭을 올립니다.
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            Self::NotPublished(_) | Self::Structural(_) | Self::Decode(_)
        )
    }
}

/// 수집 호출 Result 타입.
pub type FetchResult<T> = Result<T, FetchError>;

/// 하나의 데이터 제공자 (소스 + 추출기).
///
/// 구현체는 순수하게 "컨텍스트 → 레코드 목록"만 책임지며, 재시도·
/// fallback·영속화는 오케스트레이터와 저장소의 몫입니다. 빈 Vec은
/// "유효하지만 데이터 없음"을 의미하고 에러가 아닙니다.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// 이 제공자가 생산하는 canonical 레코드 타입.
    type Record: Send;

    /// 결과 레코드에 새겨지는 출처 태그.
    fn source_id(&self) -> &'static str;

    /// 대상 날짜의 데이터를 수집합니다.
    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<Self::Record>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_classification() {
        assert!(FetchError::Transient("timeout".into()).is_retryable());
        assert!(!FetchError::NotPublished("404".into()).is_retryable());

        assert!(FetchError::NotPublished("404".into()).is_hard());
        assert!(FetchError::Structural("no header".into()).is_hard());
        assert!(!FetchError::Transient("reset".into()).is_hard());
    }

    #[test]
    fn test_context_with_target() {
        let run = NaiveDate::from_ymd_opt(2026, 2, 6).unwrap();
        let ctx = FetchContext::for_date(run);
        let back = ctx.with_target(run.pred_opt().unwrap());
        assert_eq!(back.run_date, run);
        assert_eq!(back.target_date, run.pred_opt().unwrap());
    }
}
