//! Fallback 오케스트레이터 통합 테스트.
//!
//! 실제 제공자 대신 스텁을 꽂고, no-op sleeper로 벽시계 지연 없이
//! fallback 순서·재시도·발행 게이트·lookback·경보 1회 발화를 검증합니다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Weekday};

use metals_collector::{FallbackOrchestrator, FetchOutcome, OrchestratorConfig};
use metals_core::{DataProvider, FetchContext, FetchError, FetchResult, NoopSleeper, RetryPolicy};
use metals_notification::{Notification, NotificationResult, NotificationSender};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 전송 횟수를 세는 알림 스텁.
#[derive(Default)]
struct CountingNotifier {
    sent: AtomicUsize,
}

#[async_trait]
impl NotificationSender for CountingNotifier {
    async fn send(&self, _notification: &Notification) -> NotificationResult<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 미리 정해 둔 응답을 순서대로 반환하는 제공자 스텁.
///
/// 응답이 소진되면 빈 결과를 반환합니다. 호출마다 대상 날짜를
/// 기록합니다.
struct ScriptedProvider {
    source: &'static str,
    responses: Mutex<VecDeque<FetchResult<Vec<String>>>>,
    seen_dates: Mutex<Vec<NaiveDate>>,
}

impl ScriptedProvider {
    fn new(source: &'static str, responses: Vec<FetchResult<Vec<String>>>) -> Self {
        Self {
            source,
            responses: Mutex::new(responses.into()),
            seen_dates: Mutex::new(Vec::new()),
        }
    }

    fn always_empty(source: &'static str) -> Self {
        Self::new(source, Vec::new())
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    type Record = String;

    fn source_id(&self) -> &'static str {
        self.source
    }

    async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<String>> {
        self.seen_dates.lock().unwrap().push(ctx.target_date);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry: RetryPolicy::no_retry(),
        call_timeout: std::time::Duration::from_secs(5),
        courtesy_delay: std::time::Duration::ZERO,
        lookback_days: 0,
        publication_weekday: None,
        alert_threshold: 3,
    }
}

fn orchestrator(
    config: OrchestratorConfig,
    notifier: Arc<CountingNotifier>,
) -> FallbackOrchestrator<String> {
    FallbackOrchestrator::new("test/domain", config, Arc::new(NoopSleeper), notifier)
}

#[tokio::test]
async fn first_non_empty_provider_wins_and_tags_source() {
    let notifier = Arc::new(CountingNotifier::default());
    let mut orch = orchestrator(test_config(), notifier.clone())
        .with_provider(Box::new(ScriptedProvider::always_empty("provider_a")))
        .with_provider(Box::new(ScriptedProvider::new(
            "provider_b",
            vec![Ok(vec!["r1".to_string(), "r2".to_string()])],
        )));

    let outcome = orch.run(&FetchContext::for_date(date(2026, 2, 6))).await;
    match outcome {
        FetchOutcome::Fetched { source, records } => {
            assert_eq!(source, "provider_b");
            assert_eq!(records, vec!["r1".to_string(), "r2".to_string()]);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // A의 빈 결과는 실패가 아님: 스트릭 없음, 경보 없음
    assert_eq!(orch.provider_states()[0].consecutive_failures, 0);
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_providers_failing_yields_empty_not_error() {
    let notifier = Arc::new(CountingNotifier::default());
    let mut orch = orchestrator(test_config(), notifier)
        .with_provider(Box::new(ScriptedProvider::new(
            "broken",
            vec![Err(FetchError::Structural("no header".into()))],
        )));

    let outcome = orch.run(&FetchContext::for_date(date(2026, 2, 6))).await;
    assert!(matches!(outcome, FetchOutcome::Empty));
}

#[tokio::test]
async fn alert_fires_exactly_once_at_threshold_crossing() {
    let notifier = Arc::new(CountingNotifier::default());
    let failures: Vec<FetchResult<Vec<String>>> = (0..5)
        .map(|_| Err(FetchError::NotPublished("404".into())))
        .collect();
    let mut orch = orchestrator(test_config(), notifier.clone())
        .with_provider(Box::new(ScriptedProvider::new("flaky", failures)));

    // 연속 5회 호출 실패: 임계(3) 돌파 시점에만 경보 1회
    for day in 2..7 {
        let outcome = orch.run(&FetchContext::for_date(date(2026, 2, day))).await;
        assert!(matches!(outcome, FetchOutcome::Empty));
    }

    assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    let state = &orch.provider_states()[0];
    assert_eq!(state.consecutive_failures, 5);
    assert!(state.circuit_open);
    assert!(state.last_alert_at.is_some());
}

#[tokio::test]
async fn success_resets_streak_and_allows_new_alert() {
    let notifier = Arc::new(CountingNotifier::default());
    let script: Vec<FetchResult<Vec<String>>> = vec![
        Err(FetchError::NotPublished("404".into())),
        Err(FetchError::NotPublished("404".into())),
        // 성공 → 스트릭 리셋
        Ok(vec!["data".to_string()]),
        Err(FetchError::NotPublished("404".into())),
        Err(FetchError::NotPublished("404".into())),
        Err(FetchError::NotPublished("404".into())),
    ];
    let mut orch = orchestrator(test_config(), notifier.clone())
        .with_provider(Box::new(ScriptedProvider::new("flaky", script)));

    for day in 2..8 {
        orch.run(&FetchContext::for_date(date(2026, 2, day))).await;
    }

    // 첫 스트릭은 2에서 끊겨 경보 없음, 두 번째 스트릭이 3에 도달해 1회
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 1);
    assert_eq!(orch.provider_states()[0].consecutive_failures, 3);
}

#[tokio::test]
async fn empty_but_valid_response_resets_hard_streak() {
    let notifier = Arc::new(CountingNotifier::default());
    let script: Vec<FetchResult<Vec<String>>> = vec![
        Err(FetchError::NotPublished("404".into())),
        Err(FetchError::NotPublished("404".into())),
        // 빈-하지만-유효 응답 → 하드 스트릭 리셋
        Ok(Vec::new()),
        Err(FetchError::NotPublished("404".into())),
        Err(FetchError::NotPublished("404".into())),
    ];
    let mut orch = orchestrator(test_config(), notifier.clone())
        .with_provider(Box::new(ScriptedProvider::new("flaky", script)));

    for day in 2..7 {
        orch.run(&FetchContext::for_date(date(2026, 2, day))).await;
    }

    // 임계 3에 도달한 적이 없으므로 경보 없음
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
    assert_eq!(orch.provider_states()[0].consecutive_failures, 2);
}

#[tokio::test]
async fn publication_gate_skips_without_any_call() {
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = test_config();
    config.publication_weekday = Some(Weekday::Fri);

    let provider = ScriptedProvider::new("gated", vec![Ok(vec!["data".to_string()])]);
    let mut orch = orchestrator(config, notifier).with_provider(Box::new(provider));

    // 2026-02-02는 월요일
    let outcome = orch.run(&FetchContext::for_date(date(2026, 2, 2))).await;
    assert!(matches!(outcome, FetchOutcome::Skipped));

    // 금요일에는 통과
    let outcome = orch.run(&FetchContext::for_date(date(2026, 2, 6))).await;
    assert!(outcome.is_fetched());
}

#[tokio::test]
async fn forced_run_ignores_publication_gate() {
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = test_config();
    config.publication_weekday = Some(Weekday::Fri);

    let mut orch = orchestrator(config, notifier).with_provider(Box::new(
        ScriptedProvider::new("gated", vec![Ok(vec!["data".to_string()])]),
    ));

    let outcome = orch
        .run_forced(&FetchContext::for_date(date(2026, 2, 2)))
        .await;
    assert!(outcome.is_fetched());
}

#[tokio::test]
async fn transient_failure_is_retried_within_policy() {
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = test_config();
    config.retry = RetryPolicy::new(3, std::time::Duration::from_secs(1), 2.0);

    let mut orch = orchestrator(config, notifier.clone()).with_provider(Box::new(
        ScriptedProvider::new(
            "wobbly",
            vec![
                Err(FetchError::Transient("timeout".into())),
                Err(FetchError::Transient("reset".into())),
                Ok(vec!["data".to_string()]),
            ],
        ),
    ));

    let outcome = orch.run(&FetchContext::for_date(date(2026, 2, 6))).await;
    assert!(outcome.is_fetched());
    assert_eq!(orch.provider_states()[0].consecutive_failures, 0);
    assert_eq!(notifier.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lookback_tries_more_recent_dates_first() {
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = test_config();
    config.lookback_days = 3;

    // 토요일/일요일 404, 금요일에 데이터
    let provider = ScriptedProvider::new(
        "lookback",
        vec![
            Err(FetchError::NotPublished("404".into())), // 2/8 (일)
            Err(FetchError::NotPublished("404".into())), // 2/7 (토)
            Ok(vec!["friday_data".to_string()]),         // 2/6 (금)
        ],
    );
    let mut orch = orchestrator(config, notifier).with_provider(Box::new(provider));
    let outcome = orch.run(&FetchContext::for_date(date(2026, 2, 8))).await;
    match outcome {
        FetchOutcome::Fetched { records, .. } => {
            assert_eq!(records, vec!["friday_data".to_string()])
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn lookback_passes_shifted_dates_to_provider() {
    let notifier = Arc::new(CountingNotifier::default());
    let mut config = test_config();
    config.lookback_days = 2;

    let provider = Arc::new(ScriptedProvider::new(
        "lookback",
        vec![
            Err(FetchError::NotPublished("404".into())),
            Err(FetchError::NotPublished("404".into())),
            Ok(vec!["data".to_string()]),
        ],
    ));

    struct SharedProvider(Arc<ScriptedProvider>);

    #[async_trait]
    impl DataProvider for SharedProvider {
        type Record = String;

        fn source_id(&self) -> &'static str {
            self.0.source_id()
        }

        async fn fetch(&self, ctx: &FetchContext) -> FetchResult<Vec<String>> {
            self.0.fetch(ctx).await
        }
    }

    let mut orch =
        orchestrator(config, notifier).with_provider(Box::new(SharedProvider(provider.clone())));
    let outcome = orch.run(&FetchContext::for_date(date(2026, 2, 8))).await;
    assert!(outcome.is_fetched());

    let seen = provider.seen_dates.lock().unwrap().clone();
    let base = date(2026, 2, 8);
    assert_eq!(
        seen,
        vec![
            base,
            base - ChronoDuration::days(1),
            base - ChronoDuration::days(2)
        ]
    );
}
