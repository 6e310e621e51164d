//! 每分钟请求配额
//!
//! 固定窗口计数：窗口内请求数超过配额后返回 429，窗口到期后清零

use std::time::{Duration, Instant};

use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// 固定窗口限流器
#[derive(Debug)]
pub struct RateLimiter {
    /// 每分钟允许的请求数，0 表示不限流
    limit: u32,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// 占用一个配额，超出时返回 false
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }

        let mut window = self.window.lock();
        if now.duration_since(window.started) >= WINDOW {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.limit {
            return false;
        }
        window.count += 1;
        true
    }

    /// 客户端应等待的秒数
    pub fn retry_after_secs(&self) -> u64 {
        WINDOW.as_secs()
    }
}
