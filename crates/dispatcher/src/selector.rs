use std::sync::Arc;

use tracing::debug;

use swarm_core::{
    config::SelectionMode,
    models::{AnalysisRecord, ComponentType},
    traits::{CandidateOrder, CandidateQuery, RecordRepository},
    SwarmResult,
};

use crate::priority_cache::PriorityCache;

/// 候选记录选择器，只读
pub struct PrioritySelector {
    record_repo: Arc<dyn RecordRepository>,
    completion_threshold: u32,
    cache: Option<Arc<PriorityCache>>,
}

impl PrioritySelector {
    pub fn new(record_repo: Arc<dyn RecordRepository>, completion_threshold: u32) -> Self {
        Self {
            record_repo,
            completion_threshold,
            cache: None,
        }
    }

    /// 在排序查询前加一层可选的优先级缓存
    pub fn with_cache(mut self, cache: Arc<PriorityCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn completion_threshold(&self) -> u32 {
        self.completion_threshold
    }

    /// 选择需要补全组件的候选记录
    ///
    /// - `Ranked`：有排名且未完成的记录，按排名升序
    /// - `Sampled`：同一条件下均匀随机抽样
    ///
    /// 两种方式都只返回至少缺少 `wanted` 中一个组件的记录，`wanted` 为空时不做组件过滤。
    pub async fn select_candidates(
        &self,
        limit: usize,
        mode: SelectionMode,
        wanted: &[ComponentType],
    ) -> SwarmResult<Vec<AnalysisRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        match mode {
            SelectionMode::Sampled => self.query(limit, CandidateOrder::Random, wanted).await,
            SelectionMode::Ranked => match &self.cache {
                Some(cache) => self.select_via_cache(cache, limit, wanted).await,
                None => self.query(limit, CandidateOrder::RankAscending, wanted).await,
            },
        }
    }

    async fn query(
        &self,
        limit: usize,
        order: CandidateOrder,
        wanted: &[ComponentType],
    ) -> SwarmResult<Vec<AnalysisRecord>> {
        self.record_repo
            .find_candidates(&CandidateQuery {
                below_component_count: self.completion_threshold,
                missing_any_of: wanted,
                order,
                limit,
            })
            .await
    }

    async fn select_via_cache(
        &self,
        cache: &PriorityCache,
        limit: usize,
        wanted: &[ComponentType],
    ) -> SwarmResult<Vec<AnalysisRecord>> {
        let head = cache.ranked_head().await?;
        let mut selected = Vec::with_capacity(limit);
        let mut head_has_open = false;

        for window in head.chunks(limit) {
            let records = self.record_repo.get_many(window).await?;
            for record in records {
                if record.priority_rank.is_none() || !record.needs_work(self.completion_threshold) {
                    continue;
                }
                head_has_open = true;
                if record.lacks_any_of(wanted) {
                    selected.push(record);
                }
            }
            if selected.len() >= limit {
                selected.truncate(limit);
                return Ok(selected);
            }
        }

        // 缓存的队首已全部完成时才丢弃缓存；只是当前Worker补不上时保留给其他Worker
        if !head_has_open {
            cache.invalidate().await;
        }
        debug!("优先级缓存中的候选不足 {}，回退到直接查询", limit);
        self.query(limit, CandidateOrder::RankAscending, wanted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use swarm_core::models::{ComponentEntry, ComponentType, RecordData};
    use swarm_infrastructure::InMemoryRecordRepository;

    fn seeded_repo() -> Arc<InMemoryRecordRepository> {
        Arc::new(InMemoryRecordRepository::with_records(
            (1..=5).map(|i| {
                AnalysisRecord::new(format!("r{i}"), format!("Card {i}"), RecordData::default(), Some(i))
            }),
        ))
    }

    fn batch(component: ComponentType) -> BTreeMap<ComponentType, ComponentEntry> {
        let mut batch = BTreeMap::new();
        batch.insert(
            component,
            ComponentEntry {
                content: "done".into(),
                generated_at: chrono::Utc::now(),
                generated_by: "w".into(),
                model_info: serde_json::Value::Null,
            },
        );
        batch
    }

    #[tokio::test]
    async fn test_ranked_without_cache() {
        let selector = PrioritySelector::new(seeded_repo(), 20);
        let ids: Vec<_> = selector
            .select_candidates(3, SelectionMode::Ranked, &[])
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn test_sampled_returns_eligible_records() {
        let selector = PrioritySelector::new(seeded_repo(), 20);
        let found = selector.select_candidates(10, SelectionMode::Sampled, &[]).await.unwrap();
        assert_eq!(found.len(), 5);
    }

    #[tokio::test]
    async fn test_cache_filters_records_completed_after_caching() {
        let repo = seeded_repo();
        let cache = Arc::new(PriorityCache::new(repo.clone(), 1, Duration::from_secs(300), 100));
        let selector = PrioritySelector::new(repo.clone(), 1).with_cache(cache.clone());

        assert_eq!(selector.select_candidates(2, SelectionMode::Ranked, &[]).await.unwrap().len(), 2);

        repo.merge_components("r1", &batch(ComponentType::PlayTips), 1).await.unwrap();

        let ids: Vec<_> = selector
            .select_candidates(2, SelectionMode::Ranked, &[])
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["r2", "r3"]);
    }

    #[tokio::test]
    async fn test_short_cache_falls_back_to_query() {
        let repo = seeded_repo();
        let cache = Arc::new(PriorityCache::new(repo.clone(), 20, Duration::from_secs(300), 100));
        let selector = PrioritySelector::new(repo.clone(), 20).with_cache(cache.clone());

        assert_eq!(selector.select_candidates(5, SelectionMode::Ranked, &[]).await.unwrap().len(), 5);
        assert_eq!(selector.select_candidates(6, SelectionMode::Ranked, &[]).await.unwrap().len(), 5);
        assert!(cache.is_warm().await);
    }

    #[tokio::test]
    async fn test_completed_cache_head_is_invalidated() {
        let repo = seeded_repo();
        let cache = Arc::new(PriorityCache::new(repo.clone(), 1, Duration::from_secs(300), 2));
        let selector = PrioritySelector::new(repo.clone(), 1).with_cache(cache.clone());
        assert_eq!(selector.select_candidates(2, SelectionMode::Ranked, &[]).await.unwrap().len(), 2);

        for id in ["r1", "r2"] {
            repo.merge_components(id, &batch(ComponentType::PlayTips), 1).await.unwrap();
        }

        let ids: Vec<_> = selector
            .select_candidates(2, SelectionMode::Ranked, &[])
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["r3", "r4"]);
        assert!(!cache.is_warm().await);
    }

    #[tokio::test]
    async fn test_cached_head_skips_records_the_worker_cannot_fill() {
        let repo = seeded_repo();
        for id in ["r1", "r2"] {
            repo.merge_components(id, &batch(ComponentType::PlayTips), 20).await.unwrap();
        }
        let cache = Arc::new(PriorityCache::new(repo.clone(), 20, Duration::from_secs(300), 2));
        let selector = PrioritySelector::new(repo.clone(), 20).with_cache(cache.clone());

        let ids: Vec<_> = selector
            .select_candidates(1, SelectionMode::Ranked, &[ComponentType::PlayTips])
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(ids, vec!["r3"]);
        // r1和r2仍可由其他Worker补全
        assert!(cache.is_warm().await);
    }

    #[tokio::test]
    async fn test_ranked_and_sampled_agree_on_eligibility() {
        let repo = seeded_repo();
        for id in ["r1", "r2", "r4"] {
            repo.merge_components(id, &batch(ComponentType::PlayTips), 20).await.unwrap();
        }
        let selector = PrioritySelector::new(repo, 20);
        let wanted = [ComponentType::PlayTips];

        let mut ranked: Vec<_> = selector
            .select_candidates(10, SelectionMode::Ranked, &wanted)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let mut sampled: Vec<_> = selector
            .select_candidates(10, SelectionMode::Sampled, &wanted)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ranked.sort();
        sampled.sort();

        assert_eq!(ranked, vec!["r3", "r5"]);
        assert_eq!(sampled, ranked);
    }
}
