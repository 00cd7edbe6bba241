//! ETF 보유량 수집 모듈.
//!
//! GLD / SLV 일봉에서 거래량 기반 근사 보유량을 수집합니다. 저장 이력이
//! 2행 미만이면 콜드스타트로 간주해 30일 이력을 당겨옵니다.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use metals_core::{EtfHoldingRecord, FetchContext, Metal, Sleeper};
use metals_data::provider::yahoo::{EtfHoldingsProvider, YahooChartClient};
use metals_data::MetalsStore;
use metals_notification::NotificationSender;

use crate::config::CollectorConfig;
use crate::modules::{base_orchestrator_config, tally};
use crate::orchestrator::FallbackOrchestrator;
use crate::stats::CollectionStats;
use crate::Result;

/// 콜드스타트 판정 기준 행 수.
const COLD_START_MIN_ROWS: i64 = 2;
/// 콜드스타트 시 당겨올 이력 일수.
const COLD_START_DAYS: u32 = 30;

/// ETF 도메인 수집기.
pub struct EtfSync {
    series: Vec<(String, FallbackOrchestrator<EtfHoldingRecord>)>,
}

impl EtfSync {
    /// 제공자 체인 조립. Yahoo 스킵 환경에서는 빈 수집기가 됩니다.
    pub fn new(
        config: &CollectorConfig,
        sleeper: Arc<dyn Sleeper>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let mut series = Vec::new();
        if config.skip.skip_yahoo {
            return Self { series };
        }

        let chart = YahooChartClient::new(&config.http);
        for (symbol, metal) in [("GLD", Metal::Gold), ("SLV", Metal::Silver)] {
            series.push((
                symbol.to_string(),
                FallbackOrchestrator::new(
                    format!("etf/{}", symbol),
                    base_orchestrator_config(config),
                    sleeper.clone(),
                    notifier.clone(),
                )
                .with_provider(Box::new(EtfHoldingsProvider::new(
                    chart.clone(),
                    symbol,
                    metal,
                ))),
            ));
        }

        Self { series }
    }

    /// 전 심볼 수집 후 일괄 upsert.
    pub async fn run(&mut self, store: &MetalsStore, ctx: &FetchContext) -> Result<CollectionStats> {
        let started = Instant::now();
        let mut stats = CollectionStats::new();
        let mut records: Vec<EtfHoldingRecord> = Vec::new();

        for (symbol, orchestrator) in &mut self.series {
            // 콜드스타트: 이력이 거의 없으면 30일치 강제 수집
            let symbol_ctx = if store.etf_row_count(symbol).await? < COLD_START_MIN_ROWS {
                info!(symbol = %symbol, "저장 이력 부족, 콜드스타트 30일 이력 수집");
                ctx.with_history_days(COLD_START_DAYS)
            } else {
                *ctx
            };

            let outcome = orchestrator.run(&symbol_ctx).await;
            tally(&mut stats, &outcome);
            records.extend(outcome.into_records());
        }

        stats.records_written = store.upsert_etf_holdings(&records).await?;
        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}
