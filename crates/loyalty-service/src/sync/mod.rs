//! 订单积分同步引擎
//!
//! 一个调度器、N 个 worker、一个批量写回任务，彼此只通过两个有界队列通信：
//!
//! ```text
//! scheduler --(work queue)--> worker x N --(result queue)--> updater --> OrderStore
//! ```
//!
//! 所有任务共用一个关闭信号。关闭时调度器停止派发，worker 完成手上的请求后退出，
//! updater 排空结果队列做最后一次写回；整个过程受宽限期约束，
//! 未写回的订单保持待对账状态，下次启动时会重新对账。

mod in_flight;
mod scheduler;
mod updater;
mod worker;

pub use in_flight::InFlightOrders;
pub use scheduler::ReconciliationScheduler;
pub use updater::BatchUpdater;
pub use worker::{AccrualWorker, SharedWorkQueue};

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use loyalty_shared::config::SyncConfig;
use loyalty_shared::retry::RetryPolicy;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

use crate::accrual::AccrualClient;
use crate::repository::OrderStore;

/// 引擎参数
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub worker_count: usize,
    pub work_queue_size: usize,
    pub result_queue_size: usize,
    pub flush_interval: Duration,
    pub max_batch_size: usize,
    pub shutdown_grace: Duration,
}

impl SyncSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            worker_count: config.worker_count.max(1),
            work_queue_size: config.work_queue_size.max(1),
            result_queue_size: config.result_queue_size.max(1),
            flush_interval: Duration::from_millis(config.flush_interval_ms.max(1)),
            max_batch_size: config.max_batch_size.max(1),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// 运行中的同步引擎
pub struct SyncEngine {
    handles: Vec<JoinHandle<()>>,
    shutdown_grace: Duration,
}

impl SyncEngine {
    /// 启动全部任务
    ///
    /// `retry` 作为模板，每次存储调用都会复制一份并绑定关闭信号。
    pub fn spawn(
        store: Arc<dyn OrderStore>,
        client: Arc<dyn AccrualClient>,
        settings: SyncSettings,
        retry: RetryPolicy,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let (work_tx, work_rx) = mpsc::channel(settings.work_queue_size);
        let (result_tx, result_rx) = mpsc::channel(settings.result_queue_size);
        let queue: SharedWorkQueue = Arc::new(Mutex::new(work_rx));
        let in_flight = InFlightOrders::new();

        let mut handles = Vec::with_capacity(settings.worker_count + 2);

        let updater = BatchUpdater::new(
            store.clone(),
            retry.clone(),
            settings.flush_interval,
            settings.max_batch_size,
        );
        handles.push(tokio::spawn(
            updater
                .run(result_rx, cancel.clone())
                .instrument(info_span!("sync", component = "updater")),
        ));

        for id in 0..settings.worker_count {
            let worker = AccrualWorker::new(id, client.clone(), in_flight.clone());
            handles.push(tokio::spawn(
                worker
                    .run(queue.clone(), result_tx.clone(), cancel.clone())
                    .instrument(info_span!("sync", component = "worker", worker_id = id)),
            ));
        }
        // 结果队列在最后一个 worker 退出时关闭
        drop(result_tx);

        let scheduler =
            ReconciliationScheduler::new(store, retry, settings.poll_interval, in_flight);
        handles.push(tokio::spawn(
            scheduler
                .run(work_tx, cancel)
                .instrument(info_span!("sync", component = "scheduler")),
        ));

        info!(
            workers = settings.worker_count,
            poll_interval = ?settings.poll_interval,
            "同步引擎已启动"
        );

        Self {
            handles,
            shutdown_grace: settings.shutdown_grace,
        }
    }

    /// 等待所有任务退出，超过宽限期后强制终止
    ///
    /// 调用前应先置位关闭信号。
    pub async fn join(self) {
        let aborts: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();

        match tokio::time::timeout(self.shutdown_grace, join_all(self.handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result
                        && e.is_panic()
                    {
                        warn!(error = %e, "同步任务异常退出");
                    }
                }
                info!("同步引擎已停止");
            }
            Err(_) => {
                warn!(grace = ?self.shutdown_grace, "同步引擎未在宽限期内退出，强制终止");
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}
