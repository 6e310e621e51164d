//! accrual 查询 worker
//!
//! 多个 worker 共享一个工作队列接收端，逐个查询订单并把有变化的结论推入结果队列。
//! 没有结论（Pending / RateLimited / Unavailable）的订单直接放弃，下一轮调度会重新拉取。

use std::sync::Arc;

use loyalty_shared::shutdown;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, info};

use super::InFlightOrders;
use crate::accrual::{AccrualClient, AccrualResponse};
use crate::models::{Order, OrderVerdict};

/// 多消费者共享的工作队列
pub type SharedWorkQueue = Arc<Mutex<mpsc::Receiver<Order>>>;

pub struct AccrualWorker {
    id: usize,
    client: Arc<dyn AccrualClient>,
    in_flight: InFlightOrders,
}

impl AccrualWorker {
    pub fn new(id: usize, client: Arc<dyn AccrualClient>, in_flight: InFlightOrders) -> Self {
        Self {
            id,
            client,
            in_flight,
        }
    }

    /// 主循环
    ///
    /// 只在等待队列时响应关闭信号：已经发出的 accrual 请求会完成（受客户端超时约束），
    /// 拿到的结论照常推入结果队列后再退出。
    pub async fn run(
        self,
        queue: SharedWorkQueue,
        result_tx: mpsc::Sender<OrderVerdict>,
        mut cancel: watch::Receiver<bool>,
    ) {
        debug!(worker_id = self.id, "worker 已启动");

        loop {
            let order = tokio::select! {
                biased;
                _ = shutdown::cancelled(&mut cancel) => break,
                order = next_order(&queue) => match order {
                    Some(order) => order,
                    None => break,
                },
            };

            let verdict = self.process(&order).await;
            // 查询结束即释放，结论尚未写回时被再次派发也只会得到相同结论
            self.in_flight.release(&order.number);

            if let Some(verdict) = verdict
                && result_tx.send(verdict).await.is_err()
            {
                // 结果队列已关闭
                break;
            }
        }

        debug!(worker_id = self.id, "worker 已退出");
    }

    async fn process(&self, order: &Order) -> Option<OrderVerdict> {
        match self.client.query(&order.number).await {
            AccrualResponse::Verdict(verdict) => {
                if verdict.changes(order) {
                    Some(verdict)
                } else {
                    debug!(order = %order.number, status = %order.status, "状态未变化");
                    None
                }
            }
            AccrualResponse::Pending => {
                debug!(order = %order.number, "accrual 尚未受理");
                None
            }
            AccrualResponse::RateLimited { retry_after } => {
                info!(order = %order.number, ?retry_after, "accrual 限流，本轮跳过");
                None
            }
            AccrualResponse::Unavailable => None,
        }
    }
}

/// 从共享队列取下一个订单，锁只在单次接收期间持有
async fn next_order(queue: &SharedWorkQueue) -> Option<Order> {
    queue.lock().await.recv().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accrual::MockAccrualClient;
    use crate::models::OrderStatus;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn shared(rx: mpsc::Receiver<Order>) -> SharedWorkQueue {
        Arc::new(Mutex::new(rx))
    }

    #[tokio::test]
    async fn test_forwards_changed_verdicts_only() {
        let mut client = MockAccrualClient::new();
        client.expect_query().returning(|number| match number {
            "2000000000008" => AccrualResponse::Verdict(OrderVerdict::new(
                number,
                OrderStatus::Processed,
                dec!(500),
            )),
            "1000000000009" => {
                AccrualResponse::Verdict(OrderVerdict::new(number, OrderStatus::New, dec!(0)))
            }
            "3000000000007" => AccrualResponse::RateLimited {
                retry_after: Some(Duration::from_secs(60)),
            },
            _ => AccrualResponse::Pending,
        });

        let (work_tx, work_rx) = mpsc::channel(8);
        let (result_tx, mut result_rx) = mpsc::channel(8);
        let (_cancel_tx, cancel_rx) = shutdown::channel();

        for number in ["2000000000008", "1000000000009", "3000000000007", "79927398713"] {
            work_tx.send(Order::new(number, "alice")).await.unwrap();
        }
        drop(work_tx);

        let in_flight = InFlightOrders::new();
        for number in ["2000000000008", "1000000000009", "3000000000007", "79927398713"] {
            in_flight.try_claim(number);
        }

        AccrualWorker::new(0, Arc::new(client), in_flight.clone())
            .run(shared(work_rx), result_tx, cancel_rx)
            .await;

        // 无论是否得到结论，查询结束后都释放
        assert!(in_flight.is_empty());

        let verdict = result_rx.recv().await.unwrap();
        assert_eq!(verdict.number, "2000000000008");
        assert_eq!(verdict.accrual, dec!(500));
        assert!(result_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_exits_on_cancellation_while_idle() {
        let client = MockAccrualClient::new();
        let (_work_tx, work_rx) = mpsc::channel::<Order>(8);
        let (result_tx, _result_rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = shutdown::channel();

        let handle = tokio::spawn(
            AccrualWorker::new(0, Arc::new(client), InFlightOrders::new()).run(
                shared(work_rx),
                result_tx,
                cancel_rx,
            ),
        );
        cancel_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("空闲 worker 应立即响应关闭信号")
            .unwrap();
    }
}
