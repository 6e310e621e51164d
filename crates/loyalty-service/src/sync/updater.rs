//! 批量写回
//!
//! 结果队列的唯一消费者。按时间间隔或批量上限触发写回，每批一个事务。
//! 写回失败的批次记录日志后丢弃：这些订单在存储中仍是待对账状态，下一轮调度会重新发现。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::observability::metrics;
use loyalty_shared::retry::RetryPolicy;
use loyalty_shared::shutdown;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::models::OrderVerdict;
use crate::repository::OrderStore;

pub struct BatchUpdater {
    store: Arc<dyn OrderStore>,
    retry: RetryPolicy,
    flush_interval: Duration,
    max_batch_size: usize,
}

impl BatchUpdater {
    pub fn new(
        store: Arc<dyn OrderStore>,
        retry: RetryPolicy,
        flush_interval: Duration,
        max_batch_size: usize,
    ) -> Self {
        Self {
            store,
            retry,
            flush_interval,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// 主循环
    ///
    /// 收到关闭信号后继续接收，直到所有 worker 退出、结果队列关闭，
    /// 然后把剩余结论做最后一次写回。
    pub async fn run(
        self,
        mut results: mpsc::Receiver<OrderVerdict>,
        mut cancel: watch::Receiver<bool>,
    ) {
        info!(
            flush_interval = ?self.flush_interval,
            max_batch_size = self.max_batch_size,
            "批量写回已启动"
        );

        let mut batch = Vec::with_capacity(self.max_batch_size);
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut draining = false;
        loop {
            tokio::select! {
                verdict = results.recv() => match verdict {
                    Some(verdict) => {
                        batch.push(verdict);
                        if batch.len() >= self.max_batch_size {
                            self.flush(&mut batch, &cancel).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.flush(&mut batch, &cancel).await,
                _ = shutdown::cancelled(&mut cancel), if !draining => {
                    info!(pending = batch.len(), "收到关闭信号，排空结果队列");
                    draining = true;
                }
            }
        }

        self.flush(&mut batch, &cancel).await;
        info!("批量写回已停止");
    }

    /// 写回当前批次，无论成败都清空累加器
    async fn flush(&self, batch: &mut Vec<OrderVerdict>, cancel: &watch::Receiver<bool>) {
        if batch.is_empty() {
            return;
        }

        let verdicts = dedupe(std::mem::take(batch));
        let size = verdicts.len();
        let policy = self.retry.clone().with_cancellation(cancel.clone());

        match policy
            .execute("persist_verdicts", || self.store.persist_verdicts(&verdicts))
            .await
        {
            Ok(updated) => {
                info!(batch_size = size, updated, "批量写回完成");
                metrics::record_batch_flush(size, "committed");
                metrics::set_worker_last_run("updater");
            }
            Err(e) if e.is_cancelled() => {
                info!(batch_size = size, "关闭期间放弃重试，订单保持待对账状态");
                metrics::record_batch_flush(size, "cancelled");
            }
            Err(e) => {
                error!(batch_size = size, error = %e, "批量写回失败，本批丢弃");
                metrics::record_batch_flush(size, "failed");
            }
        }
    }
}

/// 同一订单在一批中只保留最后一个结论，保持首次出现的位置
fn dedupe(verdicts: Vec<OrderVerdict>) -> Vec<OrderVerdict> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(verdicts.len());
    let mut unique: Vec<OrderVerdict> = Vec::with_capacity(verdicts.len());

    for verdict in verdicts {
        match positions.get(&verdict.number) {
            Some(&idx) => unique[idx] = verdict,
            None => {
                positions.insert(verdict.number.clone(), unique.len());
                unique.push(verdict);
            }
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use crate::repository::{MemoryStore, MockOrderStore};
    use loyalty_shared::error::LoyaltyError;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1))
    }

    fn verdict(number: &str, status: OrderStatus, accrual: Decimal) -> OrderVerdict {
        OrderVerdict::new(number, status, accrual)
    }

    #[test]
    fn test_dedupe_keeps_latest() {
        let unique = dedupe(vec![
            verdict("2000000000008", OrderStatus::Processing, Decimal::ZERO),
            verdict("1000000000009", OrderStatus::Invalid, Decimal::ZERO),
            verdict("2000000000008", OrderStatus::Processed, dec!(10)),
        ]);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].status, OrderStatus::Processed);
        assert_eq!(unique[1].number, "1000000000009");
    }

    #[tokio::test]
    async fn test_flushes_on_max_batch_size() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let seen = batches.clone();

        let mut store = MockOrderStore::new();
        store.expect_persist_verdicts().returning(move |verdicts| {
            seen.lock().unwrap().push(verdicts.len());
            Ok(verdicts.len() as u64)
        });

        let updater = BatchUpdater::new(Arc::new(store), fast_retry(), Duration::from_secs(3600), 2);
        let (tx, rx) = mpsc::channel(8);
        let (_cancel_tx, cancel_rx) = shutdown::channel();

        for number in ["2000000000008", "1000000000009", "3000000000007"] {
            tx.send(verdict(number, OrderStatus::Invalid, Decimal::ZERO))
                .await
                .unwrap();
        }
        drop(tx);

        updater.run(rx, cancel_rx).await;

        // 满 2 条写一次，队列关闭时写剩余 1 条
        assert_eq!(*batches.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut store = MockOrderStore::new();
        store.expect_persist_verdicts().returning(move |verdicts| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LoyaltyError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(verdicts.len() as u64)
            }
        });

        let updater =
            BatchUpdater::new(Arc::new(store), fast_retry(), Duration::from_secs(3600), 10);
        let (tx, rx) = mpsc::channel(8);
        let (_cancel_tx, cancel_rx) = shutdown::channel();

        tx.send(verdict("2000000000008", OrderStatus::Processed, dec!(1)))
            .await
            .unwrap();
        drop(tx);
        updater.run(rx, cancel_rx).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_batch_is_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut store = MockOrderStore::new();
        store.expect_persist_verdicts().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LoyaltyError::Validation("check violation".to_string()))
        });

        let updater =
            BatchUpdater::new(Arc::new(store), fast_retry(), Duration::from_millis(10), 10);
        let (tx, rx) = mpsc::channel(8);
        let (_cancel_tx, cancel_rx) = shutdown::channel();

        tx.send(verdict("2000000000008", OrderStatus::Processed, dec!(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(tx);
        updater.run(rx, cancel_rx).await;

        // 永久错误只执行一次；失败批次被清空，关闭时的最后一次写回没有内容
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_queued_verdicts_are_flushed_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        store.upload_order("2000000000008", "alice").await.unwrap();

        let updater = BatchUpdater::new(
            store.clone(),
            fast_retry(),
            Duration::from_secs(3600),
            100,
        );
        let (tx, rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = shutdown::channel();

        let handle = tokio::spawn(updater.run(rx, cancel_rx));
        tx.send(verdict("2000000000008", OrderStatus::Processed, dec!(500)))
            .await
            .unwrap();

        cancel_tx.send(true).unwrap();
        drop(tx);
        handle.await.unwrap();

        let order = store.get_order("2000000000008").await.unwrap();
        assert_eq!(order.status, OrderStatus::Processed);
        assert_eq!(order.accrual, dec!(500));
    }
}
