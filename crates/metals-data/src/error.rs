//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 계층 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    Connection(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    Query(String),

    /// 배치 쓰기 무결성 오류. 배치 전체가 롤백된 상태.
    #[error("Batch write aborted: {0}")]
    BatchAborted(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 페이로드 디코딩 오류 (XLS/PDF/ZIP/CSV)
    #[error("Decode error: {0}")]
    Decode(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    Parse(String),

    /// 외부 소스 요청 오류
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(db_err) => DataError::Query(db_err.message().to_string()),
            _ => DataError::Query(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        DataError::Fetch(err.to_string())
    }
}

/// 데이터 계층 Result 타입.
pub type Result<T> = std::result::Result<T, DataError>;
