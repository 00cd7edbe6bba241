//! Standalone data collector CLI.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metals_collector::pipeline::DailyPipeline;
use metals_collector::{gaps, CollectorConfig};
use metals_core::TokioSleeper;
use metals_data::MetalsStore;
use metals_notification::{NotificationSender, NoopSender, TelegramSender};

#[derive(Parser)]
#[command(name = "metals-collector")]
#[command(about = "MetalQuant Precious Metals Data Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 일일 수집 실행 (재고 → CFTC → 환율 → 가격 → ETF)
    RunDaily {
        /// 수집 대상 날짜 (YYYY-MM-DD, 기본 오늘)
        #[arg(long)]
        date: Option<String>,
    },

    /// CFTC 히스토리 백필 (연도별 공식 ZIP)
    Backfill,

    /// 저장소 공백(gap) 감사
    CheckGaps {
        /// 감사 시작일 (YYYY-MM-DD)
        #[arg(long, default_value = "2010-01-01")]
        start_date: String,
    },

    /// 데몬 모드: 주기적으로 일일 수집 실행
    Daemon,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("metals_collector={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("MetalQuant Data Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(database_url = %config.database_url, "설정 로드 완료");

    // 저장소 연결 (스키마 자동 생성)
    let store = MetalsStore::connect(&config.database_url).await?;

    // 알림 채널: 텔레그램 설정이 없으면 no-op
    let notifier: Arc<dyn NotificationSender> = match TelegramSender::from_env() {
        Some(sender) => {
            tracing::info!("텔레그램 알림 채널 활성");
            Arc::new(sender)
        }
        None => {
            tracing::info!("텔레그램 미설정, 알림 생략 모드");
            Arc::new(NoopSender)
        }
    };
    let sleeper = Arc::new(TokioSleeper);

    match cli.command {
        Commands::RunDaily { date } => {
            let date = parse_date_arg(date.as_deref())?;
            let mut pipeline = DailyPipeline::new(&config, store, sleeper, notifier);
            let summary = pipeline.run(date).await;
            tracing::info!(
                records = summary.total_records,
                failed = ?summary.failed_domains,
                "일일 수집 종료"
            );
        }

        Commands::Backfill => {
            let pipeline = DailyPipeline::new(&config, store, sleeper, notifier);
            let today = Local::now().date_naive();
            let written = pipeline.backfill_cftc(today).await?;
            tracing::info!(written = written, "CFTC 히스토리 백필 종료");
        }

        Commands::CheckGaps { start_date } => {
            let start = NaiveDate::parse_from_str(&start_date, "%Y-%m-%d")?;
            let today = Local::now().date_naive();
            tracing::info!(start = %start, "저장소 공백 감사 시작");
            let results = gaps::audit_standard_series(&store, start, today).await?;
            let anomalies: usize = results.iter().map(|(_, g)| g.len()).sum();
            tracing::info!(
                series = results.len(),
                anomalies = anomalies,
                "공백 감사 완료. 춘절/국경절 연휴는 3-7일 공백이 정상입니다"
            );
        }

        Commands::Daemon => {
            tracing::info!(
                "데몬 모드 시작 (주기: {}분)",
                config.daemon.interval_minutes
            );

            let mut pipeline = DailyPipeline::new(&config, store, sleeper, notifier);
            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        let today = Local::now().date_naive();
                        let summary = pipeline.run(today).await;
                        tracing::info!(
                            records = summary.total_records,
                            failed = ?summary.failed_domains,
                            "워크플로우 완료, 다음 실행: {}분 후",
                            config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
    }

    tracing::info!("MetalQuant Data Collector 종료");
    Ok(())
}

/// `--date` 인자 파싱. 없으면 오늘.
fn parse_date_arg(arg: Option<&str>) -> Result<NaiveDate, chrono::ParseError> {
    match arg {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d"),
        None => Ok(Local::now().date_naive()),
    }
}
