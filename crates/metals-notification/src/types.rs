//! 알림 타입 및 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 알림 우선순위 레벨.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    /// 낮은 우선순위 (정보성)
    Low,
    /// 일반 우선순위
    #[default]
    Normal,
    /// 높은 우선순위 (중요 이벤트)
    High,
    /// 긴급 우선순위 (즉시 대응 필요)
    Critical,
}

/// 알림 이벤트 타입.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// 제공자 연속 실패 임계 돌파 (경로 변경/차단 의심)
    ProviderFailureStreak {
        domain: String,
        provider: String,
        consecutive_failures: u32,
        date: NaiveDate,
    },
    /// 저장소 배치 쓰기 무결성 실패
    DataIntegrity { table: String, message: String },
    /// 일일 수집 요약
    DailySummary {
        date: NaiveDate,
        total_records: u64,
        failed_domains: Vec<String>,
    },
    /// 사용자 정의 알림
    Custom { title: String, message: String },
}

/// 알림 메시지.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// 고유 알림 ID
    pub id: String,
    /// 알림 이벤트
    pub event: NotificationEvent,
    /// 우선순위 레벨
    pub priority: NotificationPriority,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// 새 알림을 생성합니다.
    pub fn new(event: NotificationEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
            priority: NotificationPriority::Normal,
            timestamp: Utc::now(),
        }
    }

    /// 우선순위 레벨을 설정합니다.
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// 알림 제목/날짜 태그.
    pub fn subject(&self) -> String {
        match &self.event {
            NotificationEvent::ProviderFailureStreak { domain, date, .. } => {
                format!("{} ({} 경보)", date, domain)
            }
            NotificationEvent::DataIntegrity { table, .. } => {
                format!("데이터 무결성 경보 ({})", table)
            }
            NotificationEvent::DailySummary { date, .. } => {
                format!("일일 수집 요약 ({})", date)
            }
            NotificationEvent::Custom { title, .. } => title.clone(),
        }
    }
}

/// 알림 작업용 Result 타입.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// 알림 에러.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// 전송 실패
    #[error("알림 전송 실패: {0}")]
    SendFailed(String),

    /// 설정 오류
    #[error("알림 설정 오류: {0}")]
    Config(String),
}

/// 알림 전송기 trait.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 알림을 전송합니다.
    async fn send(&self, notification: &Notification) -> NotificationResult<()>;
}

/// 아무것도 보내지 않는 전송기.
///
/// 알림 채널 미설정 환경에서 파이프라인을 그대로 돌릴 때 사용합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSender;

#[async_trait]
impl NotificationSender for NoopSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        tracing::debug!(subject = %notification.subject(), "알림 채널 미설정, 전송 생략");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_carries_date_tag() {
        let event = NotificationEvent::ProviderFailureStreak {
            domain: "inventory/SHFE".to_string(),
            provider: "shfe_json".to_string(),
            consecutive_failures: 3,
            date: NaiveDate::from_ymd_opt(2026, 2, 6).unwrap(),
        };
        let notification = Notification::new(event).with_priority(NotificationPriority::Critical);
        assert!(notification.subject().contains("2026-02-06"));
        assert!(notification.subject().contains("inventory/SHFE"));
        assert_eq!(notification.priority, NotificationPriority::Critical);
    }
}
