//! 텔레그램 알림 전송기.
//!
//! Telegram Bot API `sendMessage`를 통해 수집 경보를 전송합니다.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::types::{
    Notification, NotificationError, NotificationEvent, NotificationPriority, NotificationResult,
    NotificationSender,
};

const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// 텔레그램 전송 설정.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// @BotFather에서 받은 봇 토큰
    pub bot_token: String,
    /// 메시지를 보낼 채팅 ID
    pub chat_id: String,
    /// 전송 활성화 여부
    pub enabled: bool,
    /// 파싱 모드 (HTML)
    pub parse_mode: String,
}

impl TelegramConfig {
    /// 새 텔레그램 설정을 생성합니다.
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            enabled: true,
            parse_mode: "HTML".to_string(),
        }
    }

    /// 환경 변수에서 설정을 생성합니다.
    ///
    /// `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`가 없으면 None.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        let enabled = std::env::var("TELEGRAM_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);

        Some(Self {
            bot_token,
            chat_id,
            enabled,
            parse_mode: "HTML".to_string(),
        })
    }
}

/// 텔레그램 알림 전송기.
pub struct TelegramSender {
    config: TelegramConfig,
    client: reqwest::Client,
    api_base_url: String,
}

impl TelegramSender {
    /// 새 텔레그램 전송기를 생성합니다.
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    /// 환경 변수에서 전송기를 생성합니다.
    pub fn from_env() -> Option<Self> {
        TelegramConfig::from_env().map(Self::new)
    }

    /// API base URL을 지정해 생성 (테스트용).
    pub fn with_api_base_url(config: TelegramConfig, api_base_url: String) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base_url,
        }
    }

    /// 알림을 텔레그램 HTML 메시지로 포맷합니다.
    fn format_message(&self, notification: &Notification) -> String {
        let priority_emoji = match notification.priority {
            NotificationPriority::Low => "ℹ️",
            NotificationPriority::Normal => "📊",
            NotificationPriority::High => "⚠️",
            NotificationPriority::Critical => "🚨",
        };

        let content = match &notification.event {
            NotificationEvent::ProviderFailureStreak {
                domain,
                provider,
                consecutive_failures,
                date,
            } => {
                format!(
                    "<b>제공자 연속 실패 경보</b>\n\n\
                     도메인: <code>{domain}</code>\n\
                     제공자: <code>{provider}</code>\n\
                     연속 실패: {consecutive_failures}회\n\
                     기준일: {date}\n\n\
                     소스 경로 변경 또는 차단 가능성이 있습니다. \
                     추출 규칙을 점검하세요."
                )
            }

            NotificationEvent::DataIntegrity { table, message } => {
                format!(
                    "<b>저장소 무결성 실패</b>\n\n\
                     테이블: <code>{table}</code>\n\
                     내용: {message}"
                )
            }

            NotificationEvent::DailySummary {
                date,
                total_records,
                failed_domains,
            } => {
                let failed = if failed_domains.is_empty() {
                    "없음".to_string()
                } else {
                    failed_domains.join(", ")
                };
                format!(
                    "<b>일일 수집 요약</b>\n\n\
                     날짜: {date}\n\
                     기록: {total_records}건\n\
                     실패 도메인: {failed}"
                )
            }

            NotificationEvent::Custom { title, message } => {
                format!("<b>{title}</b>\n\n{message}")
            }
        };

        format!("{priority_emoji} {content}")
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        if !self.config.enabled {
            debug!("텔레그램 전송 비활성화 상태, 생략");
            return Ok(());
        }

        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base_url, self.config.bot_token
        );
        let payload = json!({
            "chat_id": self.config.chat_id,
            "text": self.format_message(notification),
            "parse_mode": self.config.parse_mode,
        });

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(status = %status, "텔레그램 API 오류 응답");
            return Err(NotificationError::SendFailed(format!(
                "Telegram API HTTP {}",
                status
            )));
        }

        info!(subject = %notification.subject(), "텔레그램 알림 전송 완료");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_provider_streak_message() {
        let sender = TelegramSender::new(TelegramConfig::new("token".into(), "chat".into()));
        let notification = Notification::new(NotificationEvent::ProviderFailureStreak {
            domain: "inventory/SHFE".to_string(),
            provider: "shfe_json".to_string(),
            consecutive_failures: 3,
            date: NaiveDate::from_ymd_opt(2026, 2, 6).unwrap(),
        })
        .with_priority(NotificationPriority::Critical);

        let text = sender.format_message(&notification);
        assert!(text.starts_with("🚨"));
        assert!(text.contains("shfe_json"));
        assert!(text.contains("3회"));
    }

    #[tokio::test]
    async fn test_disabled_sender_is_noop() {
        let mut config = TelegramConfig::new("token".into(), "chat".into());
        config.enabled = false;
        let sender = TelegramSender::new(config);

        let notification = Notification::new(NotificationEvent::Custom {
            title: "t".into(),
            message: "m".into(),
        });
        assert!(sender.send(&notification).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_posts_to_bot_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bottoken/sendMessage")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let sender = TelegramSender::with_api_base_url(
            TelegramConfig::new("token".into(), "chat".into()),
            server.url(),
        );
        let notification = Notification::new(NotificationEvent::Custom {
            title: "수집 경보".into(),
            message: "테스트".into(),
        });

        sender.send(&notification).await.unwrap();
        mock.assert_async().await;
    }
}
