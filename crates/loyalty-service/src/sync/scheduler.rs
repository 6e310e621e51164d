//! 对账调度器
//!
//! 两个状态：等待（定时器或关闭信号）与派发（把待对账订单推入工作队列）。
//! 工作队列有界，队列满时派发阻塞，调度器最多领先 worker 一个队列深度。
//! 上一轮派发的订单仍在队列中或正在查询时，本轮跳过。

use std::sync::Arc;
use std::time::Duration;

use loyalty_shared::observability::metrics;
use loyalty_shared::retry::RetryPolicy;
use loyalty_shared::shutdown;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::InFlightOrders;
use crate::models::Order;
use crate::repository::OrderStore;

/// 调度器
pub struct ReconciliationScheduler {
    store: Arc<dyn OrderStore>,
    retry: RetryPolicy,
    poll_interval: Duration,
    in_flight: InFlightOrders,
}

/// 单轮派发的结果
enum Dispatch {
    Continue,
    Stop,
}

impl ReconciliationScheduler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        retry: RetryPolicy,
        poll_interval: Duration,
        in_flight: InFlightOrders,
    ) -> Self {
        Self {
            store,
            retry,
            poll_interval,
            in_flight,
        }
    }

    /// 主循环，首个 tick 立即触发
    ///
    /// 收到关闭信号后不再派发，返回时 drop 工作队列发送端，worker 读完剩余订单后退出。
    pub async fn run(self, work_tx: mpsc::Sender<Order>, mut cancel: watch::Receiver<bool>) {
        info!(poll_interval = ?self.poll_interval, "调度器已启动");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown::cancelled(&mut cancel) => break,
                _ = ticker.tick() => {}
            }

            match self.dispatch(&work_tx, &mut cancel).await {
                Dispatch::Continue => metrics::set_worker_last_run("scheduler"),
                Dispatch::Stop => break,
            }
        }

        info!("调度器已停止");
    }

    /// 拉取待对账订单并逐个推入工作队列
    async fn dispatch(
        &self,
        work_tx: &mpsc::Sender<Order>,
        cancel: &mut watch::Receiver<bool>,
    ) -> Dispatch {
        let policy = self.retry.clone().with_cancellation(cancel.clone());
        let orders = match policy
            .execute("fetch_pending_orders", || self.store.fetch_pending_orders())
            .await
        {
            Ok(orders) => orders,
            Err(e) if e.is_cancelled() => return Dispatch::Stop,
            Err(e) => {
                error!(error = %e, "拉取待对账订单失败，等待下一轮");
                return Dispatch::Continue;
            }
        };

        if orders.is_empty() {
            debug!("没有待对账订单");
            return Dispatch::Continue;
        }

        let total = orders.len();
        let mut dispatched = 0u64;
        for order in orders {
            if !self.in_flight.try_claim(&order.number) {
                continue;
            }
            let number = order.number.clone();

            tokio::select! {
                biased;
                _ = shutdown::cancelled(cancel) => {
                    self.in_flight.release(&number);
                    metrics::record_orders_dispatched(dispatched);
                    return Dispatch::Stop;
                }
                sent = work_tx.send(order) => {
                    if sent.is_err() {
                        // 所有 worker 都已退出
                        self.in_flight.release(&number);
                        return Dispatch::Stop;
                    }
                    dispatched += 1;
                }
            }
        }

        debug!(total, dispatched, "本轮订单已派发");
        metrics::record_orders_dispatched(dispatched);
        Dispatch::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockOrderStore;
    use loyalty_shared::error::LoyaltyError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_dispatches_pending_orders_in_store_order() {
        let mut store = MockOrderStore::new();
        store.expect_fetch_pending_orders().returning(|| {
            Ok(vec![
                Order::new("2000000000008", "alice"),
                Order::new("1000000000009", "bob"),
            ])
        });

        let scheduler = ReconciliationScheduler::new(
            Arc::new(store),
            fast_retry(),
            Duration::from_secs(60),
            InFlightOrders::new(),
        );
        let (work_tx, mut work_rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = shutdown::channel();

        let handle = tokio::spawn(scheduler.run(work_tx, cancel_rx));

        assert_eq!(work_rx.recv().await.unwrap().number, "2000000000008");
        assert_eq!(work_rx.recv().await.unwrap().number, "1000000000009");

        cancel_tx.send(true).unwrap();
        handle.await.unwrap();
        // 调度器退出后发送端被 drop
        assert!(work_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_waits_for_next_tick() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut store = MockOrderStore::new();
        store.expect_fetch_pending_orders().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LoyaltyError::Validation("broken".to_string()))
        });

        let scheduler = ReconciliationScheduler::new(
            Arc::new(store),
            fast_retry(),
            Duration::from_millis(10),
            InFlightOrders::new(),
        );
        let (work_tx, mut work_rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = shutdown::channel();

        let handle = tokio::spawn(scheduler.run(work_tx, cancel_rx));
        tokio::time::sleep(Duration::from_millis(80)).await;
        cancel_tx.send(true).unwrap();
        handle.await.unwrap();

        // 永久错误不重试，但每个 tick 都会再试一次
        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert!(work_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_in_flight_orders_are_not_redispatched() {
        let mut store = MockOrderStore::new();
        store
            .expect_fetch_pending_orders()
            .returning(|| Ok(vec![Order::new("2000000000008", "alice")]));

        let in_flight = InFlightOrders::new();
        let scheduler = ReconciliationScheduler::new(
            Arc::new(store),
            fast_retry(),
            Duration::from_millis(10),
            in_flight.clone(),
        );
        let (work_tx, mut work_rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = shutdown::channel();

        let handle = tokio::spawn(scheduler.run(work_tx, cancel_rx));

        // 多个 tick 过去，订单始终未被消费
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(in_flight.contains("2000000000008"));

        // 释放后下一轮重新派发
        assert_eq!(work_rx.recv().await.unwrap().number, "2000000000008");
        assert!(work_rx.try_recv().is_err(), "在途订单不应重复入队");
        in_flight.release("2000000000008");
        let again = tokio::time::timeout(Duration::from_secs(1), work_rx.recv())
            .await
            .expect("释放后应重新派发");
        assert_eq!(again.unwrap().number, "2000000000008");

        cancel_tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(work_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_full_queue_is_released_by_cancellation() {
        let mut store = MockOrderStore::new();
        store.expect_fetch_pending_orders().returning(|| {
            Ok(vec![
                Order::new("2000000000008", "alice"),
                Order::new("1000000000009", "alice"),
                Order::new("3000000000007", "alice"),
            ])
        });

        let scheduler = ReconciliationScheduler::new(
            Arc::new(store),
            fast_retry(),
            Duration::from_secs(60),
            InFlightOrders::new(),
        );
        let (work_tx, work_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = shutdown::channel();

        let handle = tokio::spawn(scheduler.run(work_tx, cancel_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        cancel_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("队列满时关闭信号应立即解除阻塞")
            .unwrap();
        drop(work_rx);
    }
}
