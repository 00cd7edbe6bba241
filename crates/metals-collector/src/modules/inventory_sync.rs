//! 재고 수집 모듈.
//!
//! 네 개 소스를 각자의 시계열로 수집합니다:
//! - COMEX: CME 공식 XLS (금/은 파일 분리)
//! - SHFE: 일일 수증 JSON, 장기 연휴 커버를 위한 날짜 lookback
//! - LBMA: 월간 금고 XLSX (매일 시도, natural-key replace로 중복 해소)
//! - SGE: 공고 목록 JSON → 인도 PDF

use std::sync::Arc;
use std::time::Instant;

use metals_core::{FetchContext, InventoryRecord, Metal, Sleeper};
use metals_data::provider::comex::ComexInventoryProvider;
use metals_data::provider::lbma::LbmaVaultProvider;
use metals_data::provider::sge::SgeDeliveryProvider;
use metals_data::provider::shfe::ShfeWarrantProvider;
use metals_data::MetalsStore;
use metals_notification::NotificationSender;

use crate::config::CollectorConfig;
use crate::modules::{base_orchestrator_config, tally};
use crate::orchestrator::FallbackOrchestrator;
use crate::stats::CollectionStats;
use crate::Result;

/// 재고 도메인 수집기.
pub struct InventorySync {
    series: Vec<FallbackOrchestrator<InventoryRecord>>,
}

impl InventorySync {
    /// 제공자 체인 조립.
    pub fn new(
        config: &CollectorConfig,
        sleeper: Arc<dyn Sleeper>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let mut series = Vec::new();

        for metal in [Metal::Gold, Metal::Silver] {
            series.push(
                FallbackOrchestrator::new(
                    format!("inventory/COMEX-{}", metal),
                    base_orchestrator_config(config),
                    sleeper.clone(),
                    notifier.clone(),
                )
                .with_provider(Box::new(ComexInventoryProvider::new(&config.http, metal))),
            );
        }

        // SHFE: 비발행일 404를 lookback으로 흡수
        let mut shfe_config = base_orchestrator_config(config);
        shfe_config.lookback_days = config.orchestrator.shfe_lookback_days;
        series.push(
            FallbackOrchestrator::new(
                "inventory/SHFE",
                shfe_config,
                sleeper.clone(),
                notifier.clone(),
            )
            .with_provider(Box::new(ShfeWarrantProvider::new(&config.http))),
        );

        series.push(
            FallbackOrchestrator::new(
                "inventory/LBMA",
                base_orchestrator_config(config),
                sleeper.clone(),
                notifier.clone(),
            )
            .with_provider(Box::new(LbmaVaultProvider::new(&config.http))),
        );

        series.push(
            FallbackOrchestrator::new(
                "inventory/SGE",
                base_orchestrator_config(config),
                sleeper,
                notifier,
            )
            .with_provider(Box::new(SgeDeliveryProvider::new(
                &config.http,
                config.sge_numeric_pick,
            ))),
        );

        Self { series }
    }

    /// 전 시계열 수집 후 일괄 upsert.
    pub async fn run(&mut self, store: &MetalsStore, ctx: &FetchContext) -> Result<CollectionStats> {
        let started = Instant::now();
        let mut stats = CollectionStats::new();
        let mut records: Vec<InventoryRecord> = Vec::new();

        for orchestrator in &mut self.series {
            let outcome = orchestrator.run(ctx).await;
            tally(&mut stats, &outcome);
            records.extend(outcome.into_records());
        }

        stats.records_written = store.upsert_inventory(&records).await?;
        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}
