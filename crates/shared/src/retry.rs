//! 重试策略与执行器
//!
//! 包装所有对事务存储的调用：瞬时故障（连接中断、连接池耗尽）按线性退避重试，
//! 永久性错误（约束冲突、参数无效）直接返回。分类器和取消信号都是策略对象的一部分，
//! 每个调用点按需构造一个新的策略，策略本身不跨调用保存状态。

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::error::{LoyaltyError, Result};
use crate::shutdown;

/// 错误分类器：返回 true 表示该错误可重试
pub type Classifier = Arc<dyn Fn(&LoyaltyError) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// RetryPolicy — 重试策略配置
// ---------------------------------------------------------------------------

/// 重试策略
///
/// 第 N 次失败（从 0 开始）后等待 `initial_delay + step * N`，
/// 总共最多执行 `max_attempts` 次（含首次）。
#[derive(Clone)]
pub struct RetryPolicy {
    /// 最大执行次数（含首次执行）
    pub max_attempts: u32,
    /// 首次重试前的等待时间
    pub initial_delay: Duration,
    /// 每多失败一次增加的等待时间
    pub step: Duration,
    classifier: Classifier,
    cancel: Option<watch::Receiver<bool>>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("step", &self.step)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl Default for RetryPolicy {
    /// 默认策略：最多执行 3 次，初始等待 1 秒，每次递增 2 秒，
    /// 使用 `LoyaltyError::is_transient` 作为分类器
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000), Duration::from_millis(2000))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, step: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            step,
            classifier: Arc::new(LoyaltyError::is_transient),
            cancel: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.step_ms),
        )
    }

    /// 替换错误分类器
    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&LoyaltyError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// 绑定调用方的取消信号，退避等待期间收到信号立即返回 `LoyaltyError::Cancelled`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// 第 N 次失败后的等待时间（attempt 从 0 开始）
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay + self.step * attempt
    }

    /// 该错误是否可重试
    pub fn is_retryable(&self, err: &LoyaltyError) -> bool {
        (self.classifier)(err)
    }

    /// 执行操作并按策略重试
    ///
    /// 首次执行不检查取消信号，只有退避等待可以被打断；
    /// 这样关闭阶段的最后一次落库仍然会真正执行一次。
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation = operation_name, attempt, "操作在重试后成功");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !self.is_retryable(&err) {
                        return Err(err);
                    }

                    attempt += 1;
                    if attempt >= max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %err,
                            "已达最大尝试次数，放弃重试"
                        );
                        return Err(err);
                    }

                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "操作失败，将在退避后重试"
                    );

                    self.wait(delay).await?;
                }
            }
        }
    }

    async fn wait(&self, delay: Duration) -> Result<()> {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(delay).await;
            return Ok(());
        };

        let mut cancel = cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = shutdown::cancelled(&mut cancel) => Err(LoyaltyError::Cancelled),
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
