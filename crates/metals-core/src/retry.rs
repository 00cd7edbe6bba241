//! 재시도/백오프 정책.
//!
//! sleep 기반 재시도를 정책 객체로 캡슐화하고, 대기 자체는 주입 가능한
//! `Sleeper` 추상화 뒤로 분리합니다. 테스트는 no-op sleeper로 벽시계
//! 지연 없이 실행됩니다.

use async_trait::async_trait;
use std::time::Duration;

/// 지수 백오프 재시도 정책.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 제공자당 최대 시도 횟수 (1 = 재시도 없음).
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간.
    pub base_delay: Duration,
    /// 시도마다 대기 시간에 곱해지는 계수.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// 새 정책 생성.
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
        }
    }

    /// 재시도 없는 정책.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// `attempt`번째 실패 후 대기 시간 (attempt는 0부터).
    ///
    /// base_delay × multiplier^attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        self.base_delay.mul_f64(factor.max(0.0))
    }
}

impl Default for RetryPolicy {
    /// 기본: 4회 시도, 2초에서 시작해 2배씩 증가.
    fn default() -> Self {
        Self::new(4, Duration::from_secs(2), 2.0)
    }
}

/// 주입 가능한 대기 추상화.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// 지정 시간만큼 대기합니다.
    async fn sleep(&self, duration: Duration);
}

/// tokio 타이머 기반 실제 sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 대기하지 않는 테스트용 sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_progression() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2), 2.0);
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn test_max_attempts_floor() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1), 2.0);
        assert_eq!(policy.max_attempts, 1);
    }
}
