use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ComponentType;

/// 推理所需的卡牌文本字段
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordData {
    pub mana_cost: Option<String>,
    pub type_line: Option<String>,
    pub oracle_text: Option<String>,
    pub power: Option<String>,
    pub toughness: Option<String>,
    pub rarity: Option<String>,
}

/// 单个已生成的分析组件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub content: String,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    #[serde(default)]
    pub model_info: serde_json::Value,
}

/// 待补全分析内容的卡牌记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    /// 上游数据源使用的另一套标识
    pub alternate_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub data: RecordData,
    /// 数值越小越优先处理
    pub priority_rank: Option<i64>,
    #[serde(default)]
    pub components: BTreeMap<ComponentType, ComponentEntry>,
    pub component_count: u32,
    pub fully_analyzed: bool,
    pub analysis_completed_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

/// 随任务下发给Worker的记录摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub name: String,
    #[serde(flatten)]
    pub data: RecordData,
    #[serde(default)]
    pub priority_rank: Option<i64>,
}

impl AnalysisRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        data: RecordData,
        priority_rank: Option<i64>,
    ) -> Self {
        Self {
            id: id.into(),
            alternate_id: None,
            name: name.into(),
            data,
            priority_rank,
            components: BTreeMap::new(),
            component_count: 0,
            fully_analyzed: false,
            analysis_completed_at: None,
            last_updated: Utc::now(),
        }
    }

    pub fn with_alternate_id(mut self, alternate_id: impl Into<String>) -> Self {
        self.alternate_id = Some(alternate_id.into());
        self
    }

    /// 已存在的组件键
    pub fn existing_components(&self) -> BTreeSet<ComponentType> {
        self.components.keys().copied().collect()
    }

    /// 给定集合中记录尚未拥有的组件，保持输入顺序
    pub fn missing_from(&self, wanted: &[ComponentType]) -> Vec<ComponentType> {
        wanted
            .iter()
            .copied()
            .filter(|c| !self.components.contains_key(c))
            .collect()
    }

    /// 是否至少缺少 `wanted` 中的一个组件，`wanted` 为空时视为不限
    pub fn lacks_any_of(&self, wanted: &[ComponentType]) -> bool {
        wanted.is_empty() || wanted.iter().any(|c| !self.components.contains_key(c))
    }

    /// 是否仍低于完成阈值
    pub fn needs_work(&self, completion_threshold: u32) -> bool {
        self.component_count < completion_threshold
    }

    /// 逐键写入组件，并根据组件表重新计算数量与完成状态
    pub fn apply_components(
        &mut self,
        entries: &BTreeMap<ComponentType, ComponentEntry>,
        completion_threshold: u32,
        now: DateTime<Utc>,
    ) {
        for (component, entry) in entries {
            self.components.insert(*component, entry.clone());
        }
        self.last_updated = now;
        self.recompute_completion(completion_threshold, now);
    }

    /// `component_count` 取组件表大小，`fully_analyzed` 由数量推导
    pub fn recompute_completion(&mut self, completion_threshold: u32, now: DateTime<Utc>) {
        self.component_count = self.components.len() as u32;
        self.fully_analyzed = self.component_count >= completion_threshold;
        if self.fully_analyzed && self.analysis_completed_at.is_none() {
            self.analysis_completed_at = Some(now);
        }
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            name: self.name.clone(),
            data: self.data.clone(),
            priority_rank: self.priority_rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str) -> ComponentEntry {
        ComponentEntry {
            content: content.to_string(),
            generated_at: Utc::now(),
            generated_by: "w-1".to_string(),
            model_info: serde_json::json!({"model": "test"}),
        }
    }

    #[test]
    fn test_apply_components_recomputes_count() {
        let mut record = AnalysisRecord::new("r-1", "Lightning Bolt", RecordData::default(), Some(1));
        let mut batch = BTreeMap::new();
        batch.insert(ComponentType::PlayTips, entry("a"));
        batch.insert(ComponentType::DeckArchetypes, entry("b"));

        record.apply_components(&batch, 3, Utc::now());
        record.apply_components(&batch, 3, Utc::now());

        assert_eq!(record.component_count, 2);
        assert!(!record.fully_analyzed);

        let mut more = BTreeMap::new();
        more.insert(ComponentType::ThematicAnalysis, entry("c"));
        record.apply_components(&more, 3, Utc::now());

        assert_eq!(record.component_count, 3);
        assert!(record.fully_analyzed);
        assert!(record.analysis_completed_at.is_some());
    }

    #[test]
    fn test_missing_from_preserves_order() {
        let mut record = AnalysisRecord::new("r-1", "Counterspell", RecordData::default(), None);
        let mut batch = BTreeMap::new();
        batch.insert(ComponentType::SideboardGuide, entry("x"));
        record.apply_components(&batch, 20, Utc::now());

        let wanted = [
            ComponentType::NewPlayerGuide,
            ComponentType::SideboardGuide,
            ComponentType::BudgetAlternatives,
        ];
        assert_eq!(
            record.missing_from(&wanted),
            vec![ComponentType::NewPlayerGuide, ComponentType::BudgetAlternatives]
        );
    }

    #[test]
    fn test_lacks_any_of() {
        let mut record = AnalysisRecord::new("r-1", "Opt", RecordData::default(), Some(1));
        let mut batch = BTreeMap::new();
        batch.insert(ComponentType::PlayTips, entry("a"));
        record.apply_components(&batch, 20, Utc::now());

        assert!(!record.lacks_any_of(&[ComponentType::PlayTips]));
        assert!(record.lacks_any_of(&[ComponentType::PlayTips, ComponentType::DeckArchetypes]));
        assert!(record.lacks_any_of(&[]));
    }

    #[test]
    fn test_summary_flattens_card_fields() {
        let data = RecordData {
            mana_cost: Some("{R}".into()),
            oracle_text: Some("Lightning Bolt deals 3 damage to any target.".into()),
            ..Default::default()
        };
        let record = AnalysisRecord::new("r-1", "Lightning Bolt", data, Some(12));
        let json = serde_json::to_value(record.summary()).unwrap();

        assert_eq!(json["name"], "Lightning Bolt");
        assert_eq!(json["mana_cost"], "{R}");
        assert_eq!(json["priority_rank"], 12);
    }
}
