//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 도메인 하나의 수집 작업 통계.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 시도한 시계열 수
    pub total: usize,
    /// 레코드를 얻은 시계열 수
    pub success: usize,
    /// 발행 게이트로 건너뛴 시계열 수
    pub skipped: usize,
    /// 모든 제공자가 빈 결과였던 시계열 수
    pub empty: usize,
    /// 저장된 총 레코드 수
    pub records_written: u64,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%).
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력.
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            skipped = self.skipped,
            empty = self.empty,
            records = self.records_written,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let stats = CollectionStats {
            total: 4,
            success: 3,
            ..Default::default()
        };
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(CollectionStats::new().success_rate(), 0.0);
    }
}
