//! Fallback 오케스트레이터.
//!
//! 도메인 하나의 제공자 목록을 우선순위 순서로 순회합니다. 제공자
//! 추가/제거는 목록 확장으로 끝나며, 소스별 분기는 없습니다.
//!
//! - 제공자당 `max_attempts`회 시도, 시도 사이 지수 백오프
//! - (설정 시) 날짜 lookback: 최근 날짜부터 offset을 늘려 가며 동일한
//!   재시도 로직 적용
//! - (설정 시) 발행 요일 게이트: 미충족이면 네트워크 활동 없이 skip
//! - 호출당 하드 타임아웃 (취소 전용, 병렬 작업 아님)
//! - 동일 소스 연속 호출 간 고정 예의 지연
//! - 첫 비어 있지 않은 결과에서 중단, 해당 제공자의 source 태그로 반환
//!
//! 제공자별 `ProviderState`는 오케스트레이터 수명(=프로세스) 동안
//! 유지되며, 연속 실패 스트릭이 임계값을 넘는 순간 정확히 한 번 경보를
//! 보냅니다. 빈-하지만-유효한 응답은 하드 실패 스트릭을 리셋합니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, Utc, Weekday};
use tracing::{debug, info, warn};

use metals_core::{DataProvider, FetchContext, RetryPolicy, Sleeper};
use metals_notification::{
    Notification, NotificationEvent, NotificationPriority, NotificationSender,
};

/// 오케스트레이터 설정.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 제공자당 재시도 정책
    pub retry: RetryPolicy,
    /// 제공자 호출 하드 타임아웃
    pub call_timeout: Duration,
    /// 동일 소스 연속 호출 간 예의 지연
    pub courtesy_delay: Duration,
    /// 날짜 lookback 일수 (0 = 대상 날짜만)
    pub lookback_days: u32,
    /// 발행 요일 게이트 (예: CFTC = 금요일)
    pub publication_weekday: Option<Weekday>,
    /// 경보를 발화하는 연속 실패 임계값
    pub alert_threshold: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(15),
            courtesy_delay: Duration::from_millis(500),
            lookback_days: 0,
            publication_weekday: None,
            alert_threshold: 3,
        }
    }
}

/// 제공자별 실패 스트릭 상태. 프로세스 수명 동안 유지됩니다.
#[derive(Debug, Clone, Default)]
pub struct ProviderState {
    /// 호출(invocation) 단위 연속 실패 횟수
    pub consecutive_failures: u32,
    /// 임계 돌파 여부
    pub circuit_open: bool,
    /// 마지막 경보 발송 시각
    pub last_alert_at: Option<DateTime<Utc>>,
}

/// 오케스트레이터 실행 결과.
#[derive(Debug)]
pub enum FetchOutcome<R> {
    /// 어느 제공자가 비어 있지 않은 레코드를 반환
    Fetched {
        /// 레코드를 생산한 제공자의 source 태그
        source: &'static str,
        records: Vec<R>,
    },
    /// 모든 제공자가 빈 결과/실패 (에러 아님)
    Empty,
    /// 발행 게이트 미충족, 시도 없음
    Skipped,
}

impl<R> FetchOutcome<R> {
    /// 레코드 목록으로 변환. Empty/Skipped는 빈 Vec.
    pub fn into_records(self) -> Vec<R> {
        match self {
            Self::Fetched { records, .. } => records,
            Self::Empty | Self::Skipped => Vec::new(),
        }
    }

    /// 레코드를 얻었는지 여부.
    pub fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched { .. })
    }
}

/// 제공자 하나를 모든 날짜/시도에 대해 돌린 내부 결과.
enum ProviderRun<R> {
    Records(Vec<R>),
    ValidEmpty,
    Failed,
}

/// 도메인 하나의 fallback 오케스트레이터.
pub struct FallbackOrchestrator<R> {
    domain: String,
    providers: Vec<Box<dyn DataProvider<Record = R>>>,
    states: Vec<ProviderState>,
    config: OrchestratorConfig,
    sleeper: Arc<dyn Sleeper>,
    notifier: Arc<dyn NotificationSender>,
}

impl<R: Send + 'static> FallbackOrchestrator<R> {
    /// 새 오케스트레이터 생성.
    pub fn new(
        domain: impl Into<String>,
        config: OrchestratorConfig,
        sleeper: Arc<dyn Sleeper>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            domain: domain.into(),
            providers: Vec::new(),
            states: Vec::new(),
            config,
            sleeper,
            notifier,
        }
    }

    /// 우선순위 목록 끝에 제공자 추가.
    pub fn with_provider(mut self, provider: Box<dyn DataProvider<Record = R>>) -> Self {
        self.providers.push(provider);
        self.states.push(ProviderState::default());
        self
    }

    /// 제공자별 상태 조회 (우선순위 순서와 동일).
    pub fn provider_states(&self) -> &[ProviderState] {
        &self.states
    }

    /// 도메인 이름.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// 발행 게이트를 적용해 수집 실행.
    pub async fn run(&mut self, ctx: &FetchContext) -> FetchOutcome<R> {
        if let Some(weekday) = self.config.publication_weekday {
            if ctx.target_date.weekday() != weekday {
                info!(
                    domain = %self.domain,
                    target = %ctx.target_date,
                    "발행 요일 아님, 수집 생략"
                );
                return FetchOutcome::Skipped;
            }
        }
        self.run_chain(ctx).await
    }

    /// 발행 게이트를 무시하고 수집 실행 (강제 주간 갱신 등).
    pub async fn run_forced(&mut self, ctx: &FetchContext) -> FetchOutcome<R> {
        self.run_chain(ctx).await
    }

    async fn run_chain(&mut self, ctx: &FetchContext) -> FetchOutcome<R> {
        for idx in 0..self.providers.len() {
            let run = self.try_provider(idx, ctx).await;
            match run {
                ProviderRun::Records(records) => {
                    let source = self.providers[idx].source_id();
                    self.states[idx].consecutive_failures = 0;
                    self.states[idx].circuit_open = false;
                    info!(
                        domain = %self.domain,
                        source = source,
                        count = records.len(),
                        "수집 성공"
                    );
                    return FetchOutcome::Fetched { source, records };
                }
                ProviderRun::ValidEmpty => {
                    // 빈-하지만-유효한 응답: 하드 실패 스트릭 리셋
                    self.states[idx].consecutive_failures = 0;
                    self.states[idx].circuit_open = false;
                    debug!(
                        domain = %self.domain,
                        source = self.providers[idx].source_id(),
                        "빈 결과, 다음 제공자로"
                    );
                }
                ProviderRun::Failed => {
                    self.record_failure(idx, ctx).await;
                }
            }
        }

        warn!(domain = %self.domain, "모든 제공자가 데이터를 반환하지 않음");
        FetchOutcome::Empty
    }

    /// 제공자 하나를 lookback 날짜 × 재시도 횟수만큼 시도.
    async fn try_provider(&self, idx: usize, ctx: &FetchContext) -> ProviderRun<R> {
        let provider = &self.providers[idx];
        let source = provider.source_id();
        let mut saw_valid_empty = false;
        let mut first_call = true;

        for offset in 0..=self.config.lookback_days {
            let date = match ctx.target_date.checked_sub_days(Days::new(offset as u64)) {
                Some(d) => d,
                None => break,
            };
            let day_ctx = ctx.with_target(date);

            for attempt in 0..self.config.retry.max_attempts {
                if !first_call {
                    // 동일 소스 연속 호출 간 고정 예의 지연
                    self.sleeper.sleep(self.config.courtesy_delay).await;
                }
                first_call = false;

                let result =
                    tokio::time::timeout(self.config.call_timeout, provider.fetch(&day_ctx)).await;

                match result {
                    Ok(Ok(records)) if !records.is_empty() => {
                        if offset > 0 {
                            info!(
                                domain = %self.domain,
                                source = source,
                                offset = offset,
                                date = %date,
                                "lookback 회귀로 데이터 확보"
                            );
                        }
                        return ProviderRun::Records(records);
                    }
                    Ok(Ok(_)) => {
                        debug!(domain = %self.domain, source = source, date = %date, "빈 결과");
                        saw_valid_empty = true;
                        // 빈 결과는 재시도 대상이 아님, 다음 날짜로
                        break;
                    }
                    Ok(Err(e)) if e.is_retryable() => {
                        warn!(
                            domain = %self.domain,
                            source = source,
                            attempt = attempt + 1,
                            error = %e,
                            "일시적 실패, 백오프 후 재시도"
                        );
                        if attempt + 1 < self.config.retry.max_attempts {
                            self.sleeper.sleep(self.config.retry.delay_for(attempt)).await;
                        }
                    }
                    Ok(Err(e)) => {
                        debug!(
                            domain = %self.domain,
                            source = source,
                            date = %date,
                            error = %e,
                            "확정적 실패, 다음 날짜로"
                        );
                        break;
                    }
                    Err(_) => {
                        warn!(
                            domain = %self.domain,
                            source = source,
                            attempt = attempt + 1,
                            "호출 타임아웃"
                        );
                        if attempt + 1 < self.config.retry.max_attempts {
                            self.sleeper.sleep(self.config.retry.delay_for(attempt)).await;
                        }
                    }
                }
            }
        }

        if saw_valid_empty {
            ProviderRun::ValidEmpty
        } else {
            ProviderRun::Failed
        }
    }

    /// 호출 단위 실패 기록. 임계 돌파 시점에 정확히 한 번 경보.
    async fn record_failure(&mut self, idx: usize, ctx: &FetchContext) {
        self.states[idx].consecutive_failures += 1;
        let failures = self.states[idx].consecutive_failures;
        let source = self.providers[idx].source_id();

        warn!(
            domain = %self.domain,
            source = source,
            consecutive_failures = failures,
            "제공자 호출 실패"
        );

        if failures == self.config.alert_threshold {
            self.states[idx].circuit_open = true;
            self.states[idx].last_alert_at = Some(Utc::now());

            let notification = Notification::new(NotificationEvent::ProviderFailureStreak {
                domain: self.domain.clone(),
                provider: source.to_string(),
                consecutive_failures: failures,
                date: ctx.target_date,
            })
            .with_priority(NotificationPriority::Critical);

            if let Err(e) = self.notifier.send(&notification).await {
                warn!(domain = %self.domain, error = %e, "경보 전송 실패");
            }
        }
    }
}
