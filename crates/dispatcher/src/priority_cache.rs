use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use swarm_core::{
    traits::{CandidateOrder, CandidateQuery, RecordRepository},
    SwarmResult,
};

struct CachedRanking {
    ids: Arc<Vec<String>>,
    loaded_at: Instant,
}

/// 按优先级排序的队首记录id缓存
///
/// 只缓存排序结果，记录内容每次都重新读取并重新过滤，缓存过期或缺失只会影响顺序。
pub struct PriorityCache {
    record_repo: Arc<dyn RecordRepository>,
    completion_threshold: u32,
    ttl: Duration,
    capacity: usize,
    entry: RwLock<Option<CachedRanking>>,
}

impl PriorityCache {
    pub fn new(
        record_repo: Arc<dyn RecordRepository>,
        completion_threshold: u32,
        ttl: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            record_repo,
            completion_threshold,
            ttl,
            capacity,
            entry: RwLock::new(None),
        }
    }

    /// 返回缓存的队首id，过期时重新加载
    pub async fn ranked_head(&self) -> SwarmResult<Arc<Vec<String>>> {
        {
            let entry = self.entry.read().await;
            if let Some(cached) = entry.as_ref() {
                if cached.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&cached.ids));
                }
            }
        }

        // 加载期间不持有锁，并发刷新最多重复查询一次
        let records = self
            .record_repo
            .find_candidates(&CandidateQuery {
                below_component_count: self.completion_threshold,
                missing_any_of: &[],
                order: CandidateOrder::RankAscending,
                limit: self.capacity,
            })
            .await?;
        let ids: Arc<Vec<String>> = Arc::new(records.into_iter().map(|r| r.id).collect());
        debug!("优先级缓存刷新，缓存 {} 条记录", ids.len());

        *self.entry.write().await = Some(CachedRanking {
            ids: Arc::clone(&ids),
            loaded_at: Instant::now(),
        });
        Ok(ids)
    }

    pub async fn invalidate(&self) {
        *self.entry.write().await = None;
    }

    pub async fn is_warm(&self) -> bool {
        self.entry
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.loaded_at.elapsed() < self.ttl)
    }
}
