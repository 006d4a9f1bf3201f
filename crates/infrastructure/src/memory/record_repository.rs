use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::debug;

use swarm_core::{
    models::{AnalysisRecord, ComponentEntry, ComponentType, RecordCounts},
    traits::{CandidateOrder, CandidateQuery, RecordRepository},
    SwarmResult,
};

/// 内存分析记录仓储
#[derive(Clone, Default)]
pub struct InMemoryRecordRepository {
    records: Arc<RwLock<HashMap<String, AnalysisRecord>>>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始记录创建仓储
    pub fn with_records(records: impl IntoIterator<Item = AnalysisRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn shuffle_and_take(mut candidates: Vec<AnalysisRecord>, limit: usize) -> Vec<AnalysisRecord> {
    candidates.shuffle(&mut rand::rng());
    candidates.truncate(limit);
    candidates
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn upsert(&self, record: &AnalysisRecord) -> SwarmResult<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> SwarmResult<Option<AnalysisRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn get_by_alternate_id(&self, alternate_id: &str) -> SwarmResult<Option<AnalysisRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.alternate_id.as_deref() == Some(alternate_id))
            .cloned())
    }

    async fn get_by_name(&self, name: &str) -> SwarmResult<Option<AnalysisRecord>> {
        let records = self.records.read().await;
        Ok(records.values().find(|r| r.name == name).cloned())
    }

    async fn get_many(&self, ids: &[String]) -> SwarmResult<Vec<AnalysisRecord>> {
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn find_candidates(&self, query: &CandidateQuery<'_>) -> SwarmResult<Vec<AnalysisRecord>> {
        let eligible: Vec<AnalysisRecord> = {
            let records = self.records.read().await;
            records
                .values()
                .filter(|r| r.priority_rank.is_some())
                .filter(|r| r.component_count < query.below_component_count)
                .filter(|r| r.lacks_any_of(query.missing_any_of))
                .cloned()
                .collect()
        };

        let candidates = match query.order {
            CandidateOrder::RankAscending => {
                let mut sorted = eligible;
                sorted.sort_by(|a, b| {
                    a.priority_rank
                        .cmp(&b.priority_rank)
                        .then_with(|| a.id.cmp(&b.id))
                });
                sorted.truncate(query.limit);
                sorted
            }
            CandidateOrder::Random => shuffle_and_take(eligible, query.limit),
        };

        debug!("候选记录查询返回 {} 条", candidates.len());
        Ok(candidates)
    }

    async fn merge_components(
        &self,
        record_id: &str,
        components: &BTreeMap<ComponentType, ComponentEntry>,
        completion_threshold: u32,
    ) -> SwarmResult<Option<AnalysisRecord>> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(record_id) else {
            return Ok(None);
        };

        record.apply_components(components, completion_threshold, Utc::now());
        Ok(Some(record.clone()))
    }

    async fn recompute_completion(&self, completion_threshold: u32) -> SwarmResult<u64> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let mut changed = 0;
        for record in records.values_mut() {
            let before = (record.component_count, record.fully_analyzed);
            record.recompute_completion(completion_threshold, now);
            if before != (record.component_count, record.fully_analyzed) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn counts(&self) -> SwarmResult<RecordCounts> {
        let records = self.records.read().await;
        let total = records.len() as u64;
        let analyzed = records.values().filter(|r| r.component_count > 0).count() as u64;
        let fully = records.values().filter(|r| r.fully_analyzed).count() as u64;
        Ok(RecordCounts::new(total, analyzed, fully))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_core::models::RecordData;

    fn record(id: &str, rank: Option<i64>, count: u32) -> AnalysisRecord {
        let mut r = AnalysisRecord::new(id, format!("Card {id}"), RecordData::default(), rank);
        r.component_count = count;
        r
    }

    fn entry() -> ComponentEntry {
        ComponentEntry {
            content: "text".into(),
            generated_at: Utc::now(),
            generated_by: "w-1".into(),
            model_info: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn test_ranked_candidates_filter_and_order() {
        let repo = InMemoryRecordRepository::with_records([
            record("a", Some(30), 0),
            record("b", Some(10), 5),
            record("c", None, 0),
            record("d", Some(20), 20),
            record("e", Some(5), 19),
        ]);

        let found = repo
            .find_candidates(&CandidateQuery {
                below_component_count: 20,
                missing_any_of: &[],
                order: CandidateOrder::RankAscending,
                limit: 10,
            })
            .await
            .unwrap();

        let ids: Vec<_> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["e", "b", "a"]);
    }

    #[tokio::test]
    async fn test_candidates_skip_records_without_wanted_gaps() {
        let mut covered = record("covered", Some(1), 1);
        covered.components.insert(ComponentType::PlayTips, entry());
        let repo = InMemoryRecordRepository::with_records([covered, record("open", Some(50), 0)]);

        let found = repo
            .find_candidates(&CandidateQuery {
                below_component_count: 20,
                missing_any_of: &[ComponentType::PlayTips],
                order: CandidateOrder::RankAscending,
                limit: 1,
            })
            .await
            .unwrap();

        let ids: Vec<_> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["open"]);
    }

    #[tokio::test]
    async fn test_random_candidates_respect_filter_and_limit() {
        let repo = InMemoryRecordRepository::with_records(
            (0..50).map(|i| record(&format!("r{i}"), Some(i), if i % 2 == 0 { 20 } else { 0 })),
        );

        let found = repo
            .find_candidates(&CandidateQuery {
                below_component_count: 20,
                missing_any_of: &[],
                order: CandidateOrder::Random,
                limit: 10,
            })
            .await
            .unwrap();

        assert_eq!(found.len(), 10);
        assert!(found.iter().all(|r| r.component_count < 20));
    }

    #[tokio::test]
    async fn test_merge_components_missing_record() {
        let repo = InMemoryRecordRepository::new();
        let mut batch = BTreeMap::new();
        batch.insert(ComponentType::PlayTips, entry());

        assert!(repo.merge_components("nope", &batch, 20).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recompute_completion_fixes_drift() {
        let mut drifted = record("a", Some(1), 7);
        drifted.fully_analyzed = true;
        let repo = InMemoryRecordRepository::with_records([drifted, record("b", Some(2), 0)]);

        assert_eq!(repo.recompute_completion(20).await.unwrap(), 1);
        let fixed = repo.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(fixed.component_count, 0);
        assert!(!fixed.fully_analyzed);
    }

    #[tokio::test]
    async fn test_lookup_by_alternate_id_and_name() {
        let repo = InMemoryRecordRepository::with_records([
            record("a", Some(1), 0).with_alternate_id("scry-1")
        ]);

        assert_eq!(repo.get_by_alternate_id("scry-1").await.unwrap().unwrap().id, "a");
        assert_eq!(repo.get_by_name("Card a").await.unwrap().unwrap().id, "a");
        assert!(repo.get_by_name("card a").await.unwrap().is_none());
    }
}
