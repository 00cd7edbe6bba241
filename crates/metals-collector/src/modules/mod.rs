//! 도메인별 수집 모듈.
//!
//! 각 모듈은 자기 도메인의 제공자 체인을 조립해 오케스트레이터에 넣고,
//! 결과 배치를 저장소에 upsert한 뒤 [`CollectionStats`]를 반환합니다.
//! 제공자별 실패 스트릭이 프로세스 수명 동안 유지되도록, 모듈 구조체는
//! 파이프라인 기동 시 한 번만 생성됩니다.

pub mod cftc_sync;
pub mod etf_sync;
pub mod fx_sync;
pub mod inventory_sync;
pub mod price_sync;

pub use cftc_sync::CftcSync;
pub use etf_sync::EtfSync;
pub use fx_sync::FxSync;
pub use inventory_sync::InventorySync;
pub use price_sync::PriceSync;

use crate::config::CollectorConfig;
use crate::orchestrator::OrchestratorConfig;

use crate::stats::CollectionStats;

/// 설정에서 공통 오케스트레이터 설정 생성.
pub(crate) fn base_orchestrator_config(config: &CollectorConfig) -> OrchestratorConfig {
    OrchestratorConfig {
        retry: config.retry.to_policy(),
        call_timeout: config.orchestrator.call_timeout(),
        courtesy_delay: config.orchestrator.courtesy_delay(),
        lookback_days: 0,
        publication_weekday: None,
        alert_threshold: config.orchestrator.alert_threshold,
    }
}

/// 오케스트레이터 실행 결과를 통계에 반영.
pub(crate) fn tally<R>(
    stats: &mut CollectionStats,
    outcome: &crate::orchestrator::FetchOutcome<R>,
) {
    stats.total += 1;
    match outcome {
        crate::orchestrator::FetchOutcome::Fetched { .. } => stats.success += 1,
        crate::orchestrator::FetchOutcome::Empty => stats.empty += 1,
        crate::orchestrator::FetchOutcome::Skipped => stats.skipped += 1,
    }
}
