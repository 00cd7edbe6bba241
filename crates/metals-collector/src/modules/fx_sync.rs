//! 환율 수집 모듈.
//!
//! USDCNH: Sina 즉시 환율 우선, 실패 시 Yahoo 차트 fallback.

use std::sync::Arc;
use std::time::Instant;

use metals_core::{FetchContext, FxRateRecord, Sleeper};
use metals_data::provider::sina::SinaFxProvider;
use metals_data::provider::yahoo::{YahooChartClient, YahooFxProvider};
use metals_data::MetalsStore;
use metals_notification::NotificationSender;

use crate::config::CollectorConfig;
use crate::modules::{base_orchestrator_config, tally};
use crate::orchestrator::FallbackOrchestrator;
use crate::stats::CollectionStats;
use crate::Result;

/// 환율 도메인 수집기.
pub struct FxSync {
    orchestrator: FallbackOrchestrator<FxRateRecord>,
}

impl FxSync {
    /// 제공자 체인 조립.
    pub fn new(
        config: &CollectorConfig,
        sleeper: Arc<dyn Sleeper>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let mut orchestrator = FallbackOrchestrator::new(
            "fx/USDCNH",
            base_orchestrator_config(config),
            sleeper,
            notifier,
        )
        .with_provider(Box::new(SinaFxProvider::new(&config.http)));

        if !config.skip.skip_yahoo {
            let chart = YahooChartClient::new(&config.http);
            orchestrator = orchestrator.with_provider(Box::new(YahooFxProvider::new(chart)));
        }

        Self { orchestrator }
    }

    /// 수집 후 upsert.
    pub async fn run(&mut self, store: &MetalsStore, ctx: &FetchContext) -> Result<CollectionStats> {
        let started = Instant::now();
        let mut stats = CollectionStats::new();

        let outcome = self.orchestrator.run(ctx).await;
        tally(&mut stats, &outcome);

        let records = outcome.into_records();
        stats.records_written = store.upsert_fx_rates(&records).await?;
        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}
