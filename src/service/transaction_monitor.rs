// 交易监控服务
// 周期性刷新所有 pending 交易的状态，单笔失败只记录日志，不影响本轮其余交易

use std::{sync::Arc, time::Duration};

use futures::{stream, StreamExt};
use tokio::time::interval;

use crate::{
    domain::{entities::PendingTransaction, error::CoreError},
    repository::{PendingCursor, PendingTransactionRepository},
    service::transaction_tracker::TransactionTracker,
};

const BATCH_SIZE: i64 = 50; // 每页50笔
const CONCURRENCY: usize = 8;

/// 单轮处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorRound {
    pub checked: usize,
    pub settled: usize,
    pub errors: usize,
}

pub struct TransactionMonitor {
    tracker: Arc<TransactionTracker>,
    repo: Arc<dyn PendingTransactionRepository>,
    interval: Duration,
}

impl TransactionMonitor {
    pub fn new(
        tracker: Arc<TransactionTracker>,
        repo: Arc<dyn PendingTransactionRepository>,
        interval: Duration,
    ) -> Self {
        Self {
            tracker,
            repo,
            interval,
        }
    }

    /// 启动后台监控任务（持续运行）
    pub async fn start_background_monitor(self: Arc<Self>) {
        let mut ticker = interval(self.interval);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Transaction monitor started"
        );

        loop {
            ticker.tick().await;

            match self.run_once().await {
                Ok(round) => {
                    if round.settled > 0 || round.errors > 0 {
                        tracing::info!(
                            checked = round.checked,
                            settled = round.settled,
                            errors = round.errors,
                            "Processed pending transactions"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to load pending transactions");
                }
            }
        }
    }

    /// 分页遍历全部 pending 交易，逐页刷新
    pub async fn run_once(&self) -> Result<MonitorRound, CoreError> {
        let mut round = MonitorRound::default();
        let mut cursor: Option<PendingCursor> = None;

        loop {
            let page = self.repo.find_pending(cursor, BATCH_SIZE).await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some((last.created_at, last.id));
            let is_last_page = (page.len() as i64) < BATCH_SIZE;

            self.refresh_page(page, &mut round).await;
            if is_last_page {
                break;
            }
        }

        Ok(round)
    }

    async fn refresh_page(&self, page: Vec<PendingTransaction>, round: &mut MonitorRound) {
        round.checked += page.len();

        let outcomes: Vec<_> = stream::iter(page)
            .map(|tx| {
                let tracker = self.tracker.clone();
                async move {
                    let result = tracker.refresh_status(&tx.tx_hash).await;
                    (tx.tx_hash, result)
                }
            })
            .buffer_unordered(CONCURRENCY)
            .collect()
            .await;

        for (tx_hash, result) in outcomes {
            match result {
                Ok(record) if record.status.is_final() => round.settled += 1,
                Ok(_) => {}
                Err(e) => {
                    round.errors += 1;
                    tracing::warn!(
                        tx_hash = %tx_hash,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Failed to refresh transaction status"
                    );
                }
            }
        }
    }
}
