//! CFTC COT 수집 모듈.
//!
//! 주간 보고서는 금요일에만 발행되므로 발행 요일 게이트를 적용합니다.
//! 당해 연도 API 조회가 비면 전년도 조회로 fallback합니다 (연초 구간).
//! 히스토리 백필은 연도별 공식 ZIP으로 수행합니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Weekday};
use tracing::{info, warn};

use metals_core::{CftcPositionRecord, FetchContext, Sleeper};
use metals_data::provider::cftc::{CftcApiProvider, CftcArchiveClient};
use metals_data::MetalsStore;
use metals_notification::NotificationSender;

use crate::config::CollectorConfig;
use crate::modules::{base_orchestrator_config, tally};
use crate::orchestrator::FallbackOrchestrator;
use crate::stats::CollectionStats;
use crate::Result;

/// COT 보고서 발행 요일.
const REPORT_WEEKDAY: Weekday = Weekday::Fri;

/// CFTC 도메인 수집기.
pub struct CftcSync {
    orchestrator: FallbackOrchestrator<CftcPositionRecord>,
    archive: CftcArchiveClient,
    backfill_start_year: i32,
    sleeper: Arc<dyn Sleeper>,
    courtesy_delay: std::time::Duration,
}

impl CftcSync {
    /// 제공자 체인 조립.
    pub fn new(
        config: &CollectorConfig,
        sleeper: Arc<dyn Sleeper>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let mut orch_config = base_orchestrator_config(config);
        orch_config.publication_weekday = Some(REPORT_WEEKDAY);

        let orchestrator = FallbackOrchestrator::new(
            "positions/CFTC",
            orch_config,
            sleeper.clone(),
            notifier,
        )
        .with_provider(Box::new(CftcApiProvider::new(&config.http, 0)))
        .with_provider(Box::new(CftcApiProvider::new(&config.http, 1)));

        Self {
            orchestrator,
            archive: CftcArchiveClient::new(&config.http),
            backfill_start_year: config.cftc.backfill_start_year,
            sleeper,
            courtesy_delay: config.orchestrator.courtesy_delay(),
        }
    }

    /// 발행 요일일 때만 수집.
    pub async fn run(&mut self, store: &MetalsStore, ctx: &FetchContext) -> Result<CollectionStats> {
        self.run_inner(store, ctx, false).await
    }

    /// 발행 요일과 무관하게 강제 주간 갱신.
    pub async fn run_forced(
        &mut self,
        store: &MetalsStore,
        ctx: &FetchContext,
    ) -> Result<CollectionStats> {
        self.run_inner(store, ctx, true).await
    }

    async fn run_inner(
        &mut self,
        store: &MetalsStore,
        ctx: &FetchContext,
        forced: bool,
    ) -> Result<CollectionStats> {
        let started = Instant::now();
        let mut stats = CollectionStats::new();

        let outcome = if forced {
            self.orchestrator.run_forced(ctx).await
        } else {
            self.orchestrator.run(ctx).await
        };
        tally(&mut stats, &outcome);

        let records = outcome.into_records();
        stats.records_written = store.upsert_cftc_positions(&records).await?;
        stats.elapsed = started.elapsed();
        Ok(stats)
    }

    /// 공식 ZIP으로 히스토리 전량 백필.
    ///
    /// 연도 단위로 다운로드·파싱·upsert하며, 한 해의 실패가 다음 해를
    /// 막지 않습니다.
    pub async fn backfill(&self, store: &MetalsStore, ctx: &FetchContext) -> Result<u64> {
        let current_year = ctx.run_date.year();
        let mut total_written = 0u64;

        for year in self.backfill_start_year..=current_year {
            match self.archive.fetch_year(year).await {
                Ok(records) if records.is_empty() => {
                    warn!(year = year, "CFTC 연간 데이터 없음");
                }
                Ok(records) => {
                    let written = store.upsert_cftc_positions(&records).await?;
                    total_written += written;
                    info!(year = year, written = written, "CFTC 연간 백필 완료");
                }
                Err(e) => {
                    warn!(year = year, error = %e, "CFTC 연간 백필 실패, 다음 해 진행");
                }
            }

            if year < current_year {
                self.sleeper.sleep(self.courtesy_delay).await;
            }
        }

        Ok(total_written)
    }
}
