//! 에러 타입 정의.

use thiserror::Error;

/// Collector 에러 타입.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 데이터 계층 에러 (저장소 무결성 실패 포함)
    #[error("Data error: {0}")]
    Data(#[from] metals_data::DataError),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 알림 전송 에러
    #[error("Notification error: {0}")]
    Notification(#[from] metals_notification::NotificationError),
}

/// Result 타입 별칭.
pub type Result<T> = std::result::Result<T, CollectorError>;
