//! 가격 수집 모듈.
//!
//! 선물: CME 연속(Yahoo 차트), SHFE 주력 연속(Sina 일봉).
//! 현물: SGE 시세 페이지, 런던 현물은 Sina → LBMA 가격 페이지 → Yahoo
//! 순서의 fallback 체인.

use std::sync::Arc;
use std::time::Instant;

use metals_core::{FetchContext, FuturePriceRecord, Metal, Sleeper, SpotPriceRecord};
use metals_data::provider::lbma::LbmaPricePageProvider;
use metals_data::provider::sge::SgeSpotProvider;
use metals_data::provider::sina::{SinaFuturesProvider, SinaSpotProvider};
use metals_data::provider::yahoo::{CmeFuturesProvider, YahooChartClient, YahooSpotProvider};
use metals_data::MetalsStore;
use metals_notification::NotificationSender;

use crate::config::CollectorConfig;
use crate::modules::{base_orchestrator_config, tally};
use crate::orchestrator::FallbackOrchestrator;
use crate::stats::CollectionStats;
use crate::Result;

/// 가격 도메인 수집기.
pub struct PriceSync {
    futures: Vec<FallbackOrchestrator<FuturePriceRecord>>,
    spots: Vec<FallbackOrchestrator<SpotPriceRecord>>,
}

impl PriceSync {
    /// 제공자 체인 조립.
    pub fn new(
        config: &CollectorConfig,
        sleeper: Arc<dyn Sleeper>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let chart = YahooChartClient::new(&config.http);
        let mut futures = Vec::new();
        let mut spots = Vec::new();

        // CME 연속 선물 (Yahoo 차단 환경에서는 시계열 자체를 제외)
        if !config.skip.skip_yahoo {
            for metal in [Metal::Gold, Metal::Silver] {
                futures.push(
                    FallbackOrchestrator::new(
                        format!("futures/CME-{}", metal),
                        base_orchestrator_config(config),
                        sleeper.clone(),
                        notifier.clone(),
                    )
                    .with_provider(Box::new(CmeFuturesProvider::new(chart.clone(), metal))),
                );
            }
        }

        // SHFE 주력 연속 선물
        for metal in [Metal::Gold, Metal::Silver] {
            futures.push(
                FallbackOrchestrator::new(
                    format!("futures/SHFE-{}", metal),
                    base_orchestrator_config(config),
                    sleeper.clone(),
                    notifier.clone(),
                )
                .with_provider(Box::new(SinaFuturesProvider::new(&config.http, metal))),
            );
        }

        // SGE 현물
        for metal in [Metal::Gold, Metal::Silver] {
            spots.push(
                FallbackOrchestrator::new(
                    format!("spot/SGE-{}", metal),
                    base_orchestrator_config(config),
                    sleeper.clone(),
                    notifier.clone(),
                )
                .with_provider(Box::new(SgeSpotProvider::new(&config.http, metal))),
            );
        }

        // 런던 현물: Sina → LBMA 가격 페이지 → Yahoo
        let mut lbma = FallbackOrchestrator::new(
            "spot/LBMA",
            base_orchestrator_config(config),
            sleeper,
            notifier,
        )
        .with_provider(Box::new(SinaSpotProvider::new(&config.http)))
        .with_provider(Box::new(LbmaPricePageProvider::new(&config.http)));
        if !config.skip.skip_yahoo {
            lbma = lbma.with_provider(Box::new(YahooSpotProvider::new(chart)));
        }
        spots.push(lbma);

        Self { futures, spots }
    }

    /// 전 시계열 수집 후 테이블별 일괄 upsert.
    pub async fn run(&mut self, store: &MetalsStore, ctx: &FetchContext) -> Result<CollectionStats> {
        let started = Instant::now();
        let mut stats = CollectionStats::new();

        let mut future_records: Vec<FuturePriceRecord> = Vec::new();
        for orchestrator in &mut self.futures {
            let outcome = orchestrator.run(ctx).await;
            tally(&mut stats, &outcome);
            future_records.extend(outcome.into_records());
        }

        let mut spot_records: Vec<SpotPriceRecord> = Vec::new();
        for orchestrator in &mut self.spots {
            let outcome = orchestrator.run(ctx).await;
            tally(&mut stats, &outcome);
            spot_records.extend(outcome.into_records());
        }

        stats.records_written = store.upsert_future_prices(&future_records).await?
            + store.upsert_spot_prices(&spot_records).await?;
        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}
