//! 일일 수집 파이프라인.
//!
//! 도메인을 순차로 처리합니다 (재고 → CFTC → 환율 → 가격 → ETF). 각
//! 스테이지는 자기 실패를 스스로 잡아 기록하며 이웃 스테이지를 중단하지
//! 않습니다. 영속화가 멱등이므로 부분 실패 후 언제든 안전하게 재실행할
//! 수 있습니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use metals_core::{FetchContext, Metal, Sleeper};
use metals_data::storage::SeriesSelector;
use metals_data::{DataError, MetalsStore};
use metals_notification::{
    Notification, NotificationEvent, NotificationPriority, NotificationSender,
};

use crate::config::CollectorConfig;
use crate::error::CollectorError;
use crate::modules::{CftcSync, EtfSync, FxSync, InventorySync, PriceSync};

/// 파이프라인 실행 요약.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub date: NaiveDate,
    /// 전 도메인 합산 기록 수
    pub total_records: u64,
    /// 실패한 도메인 이름
    pub failed_domains: Vec<String>,
    /// 오늘 날짜 관측이 없는 핵심 시계열
    pub missing_today: Vec<String>,
}

/// 일일 파이프라인.
///
/// 제공자별 실패 스트릭이 프로세스 수명 동안 유지되도록 한 번 만들어
/// 데몬 주기마다 재사용합니다.
pub struct DailyPipeline {
    store: MetalsStore,
    notifier: Arc<dyn NotificationSender>,
    skip_cftc: bool,
    inventory: InventorySync,
    cftc: CftcSync,
    fx: FxSync,
    prices: PriceSync,
    etf: EtfSync,
}

impl DailyPipeline {
    /// 파이프라인 조립.
    pub fn new(
        config: &CollectorConfig,
        store: MetalsStore,
        sleeper: Arc<dyn Sleeper>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            store,
            notifier: notifier.clone(),
            skip_cftc: config.skip.skip_cftc,
            inventory: InventorySync::new(config, sleeper.clone(), notifier.clone()),
            cftc: CftcSync::new(config, sleeper.clone(), notifier.clone()),
            fx: FxSync::new(config, sleeper.clone(), notifier.clone()),
            prices: PriceSync::new(config, sleeper.clone(), notifier.clone()),
            etf: EtfSync::new(config, sleeper, notifier),
        }
    }

    /// CFTC 백필 전용 진입점.
    pub async fn backfill_cftc(&self, date: NaiveDate) -> crate::Result<u64> {
        let ctx = FetchContext::for_date(date);
        self.cftc.backfill(&self.store, &ctx).await
    }

    /// 하루치 수집 실행.
    pub async fn run(&mut self, date: NaiveDate) -> PipelineSummary {
        let started = Instant::now();
        let ctx = FetchContext::for_date(date);

        info!(date = %date, "일일 수집 파이프라인 시작");

        let mut summary = PipelineSummary {
            date,
            total_records: 0,
            failed_domains: Vec::new(),
            missing_today: Vec::new(),
        };

        // 1. 재고
        let outcome = self.inventory.run(&self.store, &ctx).await;
        match outcome {
            Ok(stats) => {
                stats.log_summary("재고 수집");
                summary.total_records += stats.records_written;
            }
            Err(e) => self.record_stage_failure(&mut summary, "inventory", e).await,
        }

        // 2. CFTC (주간, 발행 요일 게이트)
        if self.skip_cftc {
            info!("CFTC 수집 스킵 플래그 활성, 건너뜀");
        } else {
            let outcome = self.cftc.run(&self.store, &ctx).await;
            match outcome {
                Ok(stats) => {
                    stats.log_summary("CFTC 수집");
                    summary.total_records += stats.records_written;
                }
                Err(e) => self.record_stage_failure(&mut summary, "cftc", e).await,
            }
        }

        // 3. 환율
        let outcome = self.fx.run(&self.store, &ctx).await;
        match outcome {
            Ok(stats) => {
                stats.log_summary("환율 수집");
                summary.total_records += stats.records_written;
            }
            Err(e) => self.record_stage_failure(&mut summary, "fx", e).await,
        }

        // 4. 가격 (선물 + 현물)
        let outcome = self.prices.run(&self.store, &ctx).await;
        match outcome {
            Ok(stats) => {
                stats.log_summary("가격 수집");
                summary.total_records += stats.records_written;
            }
            Err(e) => self.record_stage_failure(&mut summary, "prices", e).await,
        }

        // 5. ETF
        let outcome = self.etf.run(&self.store, &ctx).await;
        match outcome {
            Ok(stats) => {
                stats.log_summary("ETF 수집");
                summary.total_records += stats.records_written;
            }
            Err(e) => self.record_stage_failure(&mut summary, "etf", e).await,
        }

        // 6. 핵심 시계열 신선도 점검
        self.check_freshness(&mut summary).await;

        // 7. 일일 요약 알림
        let priority = if summary.failed_domains.is_empty() {
            NotificationPriority::Normal
        } else {
            NotificationPriority::High
        };
        let notification = Notification::new(NotificationEvent::DailySummary {
            date,
            total_records: summary.total_records,
            failed_domains: summary.failed_domains.clone(),
        })
        .with_priority(priority);
        if let Err(e) = self.notifier.send(&notification).await {
            warn!(error = %e, "일일 요약 알림 전송 실패");
        }

        info!(
            date = %date,
            records = summary.total_records,
            failed = summary.failed_domains.len(),
            elapsed = format!("{:.1}s", started.elapsed().as_secs_f64()),
            "일일 수집 파이프라인 완료"
        );
        summary
    }

    /// 스테이지 실패 기록. 저장소 무결성 실패는 별도 경보.
    async fn record_stage_failure(
        &self,
        summary: &mut PipelineSummary,
        domain: &str,
        err: CollectorError,
    ) {
        error!(domain = domain, error = %err, "도메인 수집 실패");
        summary.failed_domains.push(domain.to_string());

        if let CollectorError::Data(DataError::BatchAborted(message)) = &err {
            let notification = Notification::new(NotificationEvent::DataIntegrity {
                table: domain.to_string(),
                message: message.clone(),
            })
            .with_priority(NotificationPriority::Critical);
            if let Err(e) = self.notifier.send(&notification).await {
                warn!(error = %e, "무결성 경보 전송 실패");
            }
        }
    }

    /// 오늘자 핵심 가격 시계열이 들어왔는지 확인.
    async fn check_freshness(&self, summary: &mut PipelineSummary) {
        let checks: Vec<(&str, SeriesSelector)> = vec![
            (
                "CME 금 선물",
                SeriesSelector::future_prices("CME", Metal::Gold),
            ),
            (
                "SGE 금 현물",
                SeriesSelector::spot_prices("SGE", Metal::Gold),
            ),
        ];

        for (name, selector) in checks {
            match self.store.has_observation_on(&selector, summary.date).await {
                Ok(true) => {}
                Ok(false) => summary.missing_today.push(name.to_string()),
                Err(e) => warn!(series = name, error = %e, "신선도 점검 실패"),
            }
        }

        if summary.missing_today.is_empty() {
            info!("핵심 가격 시계열 오늘자 데이터 모두 확보");
        } else {
            // 장 마감 전이거나 인터페이스 지연일 수 있어 경고에 그침
            warn!(
                missing = summary.missing_today.join(", "),
                date = %summary.date,
                "오늘자 미확보 핵심 시계열"
            );
        }
    }
}
