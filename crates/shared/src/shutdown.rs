//! 关闭信号
//!
//! 进程内所有后台任务共用一个 `watch::channel(false)`，关闭时置为 true。
//! 发送端被 drop 不视为关闭。

use tokio::sync::watch;

/// 创建关闭信号通道
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// 等待关闭信号
///
/// 信号已置位时立即返回；发送端被 drop 且未置位时永远挂起。
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// 当前是否已收到关闭信号
pub fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_returns_once_signalled() {
        let (tx, mut rx) = channel();
        assert!(!is_cancelled(&rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .expect("信号置位后应立即返回");
        assert!(is_cancelled(&rx));
    }

    #[tokio::test]
    async fn test_dropped_sender_is_not_cancellation() {
        let (tx, mut rx) = channel();
        drop(tx);

        let waited = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(waited.is_err());
    }
}
