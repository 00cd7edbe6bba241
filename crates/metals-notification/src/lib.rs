//! # Metals Notification
//!
//! 수집 파이프라인의 경보(알림) 전송 서비스입니다. 오케스트레이터가
//! 제공자 연속 실패 임계 돌파 시 호출하는 유일한 바깥 방향 인터페이스로,
//! 메시지 본문과 제목/날짜 태그를 받습니다.

pub mod telegram;
pub mod types;

pub use telegram::{TelegramConfig, TelegramSender};
pub use types::{
    Notification, NotificationError, NotificationEvent, NotificationPriority, NotificationResult,
    NotificationSender, NoopSender,
};
