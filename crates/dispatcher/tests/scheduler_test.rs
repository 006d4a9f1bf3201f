mod common;

use std::collections::BTreeSet;

use swarm_core::{
    config::{DispatcherConfig, SelectionMode},
    models::{AnalysisRecord, ComponentTier, ComponentType},
};

use common::{card, card_with, Harness};

#[tokio::test]
async fn test_unknown_worker_gets_no_work() {
    let harness = Harness::new(vec![card("r1", Some(1))]);

    let tasks = harness.swarm.scheduler.get_work("ghost", 3).await.unwrap();
    assert!(tasks.is_empty());
    assert!(harness.tasks.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_single_task_drawn_from_worker_components() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_fast("w-fast").await;
    let worker = harness.swarm.registry.get("w-fast").await.unwrap().unwrap();

    let tasks = harness.swarm.scheduler.get_work("w-fast", 1).await.unwrap();

    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.record_id, "r1");
    assert!(!task.components.is_empty() && task.components.len() <= 3);
    assert!(task
        .components
        .iter()
        .all(|c| worker.assigned_components.contains(c)));
    assert!(task.is_owned_by("w-fast"));
    assert_eq!(task.record_data.name, "Card r1");
}

#[tokio::test]
async fn test_tasks_never_include_existing_components() {
    let present = [
        ComponentType::PlayTips,
        ComponentType::MulliganConsiderations,
        ComponentType::RulesClarifications,
    ];
    let harness = Harness::new(vec![card_with("r1", Some(1), &present)]);
    harness.register_fast("w-fast").await;

    let tasks = harness.swarm.scheduler.get_work("w-fast", 1).await.unwrap();

    assert_eq!(tasks.len(), 1);
    for component in &tasks[0].components {
        assert!(!present.contains(component));
    }
}

#[tokio::test]
async fn test_completed_records_are_never_scheduled() {
    let harness = Harness::new(vec![
        card_with("done", Some(1), &ComponentType::ALL),
        card("open", Some(2)),
    ]);
    harness.register_balanced("w-1").await;

    let tasks = harness.swarm.scheduler.get_work("w-1", 5).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].record_id, "open");
}

#[tokio::test]
async fn test_records_without_rank_are_ineligible() {
    let harness = Harness::new(vec![card("unranked", None)]);
    harness.register_balanced("w-1").await;

    assert!(harness.swarm.scheduler.get_work("w-1", 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_skips_records_with_nothing_left_for_this_worker() {
    // r1 缺少的只有快速层组件，均衡层Worker无法处理
    let balanced = ComponentTier::Balanced.components();
    let harness = Harness::new(vec![card_with("r1", Some(1), &balanced), card("r2", Some(2))]);
    harness.register_balanced("w-1").await;

    let tasks = harness.swarm.scheduler.get_work("w-1", 1).await.unwrap();

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].record_id, "r2");
}

#[tokio::test]
async fn test_multiple_tasks_use_distinct_records_in_rank_order() {
    let harness = Harness::new(vec![card("r3", Some(3)), card("r1", Some(1)), card("r2", Some(2))]);
    harness.register_balanced("w-1").await;

    let tasks = harness.swarm.scheduler.get_work("w-1", 3).await.unwrap();
    let ids: Vec<_> = tasks.iter().map(|t| t.record_id.as_str()).collect();

    assert_eq!(ids, vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn test_max_tasks_is_capped_per_poll() {
    let records = (1..=20).map(|i| card(&format!("r{i}"), Some(i))).collect();
    let config = DispatcherConfig {
        max_tasks_per_poll: 4,
        ..Default::default()
    };
    let harness = Harness::with_config(records, config);
    harness.register_balanced("w-1").await;

    assert_eq!(harness.swarm.scheduler.get_work("w-1", 50).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_zero_max_tasks_returns_nothing() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_balanced("w-1").await;

    assert!(harness.swarm.scheduler.get_work("w-1", 0).await.unwrap().is_empty());
    assert!(harness.tasks.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_get_work_refreshes_heartbeat() {
    let harness = Harness::new(vec![]);
    harness.register_balanced("w-1").await;
    let before = harness.swarm.registry.get("w-1").await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    harness.swarm.scheduler.get_work("w-1", 1).await.unwrap();

    let after = harness.swarm.registry.get("w-1").await.unwrap().unwrap();
    assert!(after.last_heartbeat > before.last_heartbeat);
}

#[tokio::test]
async fn test_sequential_polls_may_overlap_without_in_flight_avoidance() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_balanced("w-1").await;
    harness.register_balanced("w-2").await;

    let first = harness.swarm.scheduler.get_work("w-1", 1).await.unwrap();
    let second = harness.swarm.scheduler.get_work("w-2", 1).await.unwrap();

    assert_eq!(first[0].record_id, second[0].record_id);
    assert_eq!(first[0].components, second[0].components);
    assert_ne!(first[0].task_id, second[0].task_id);
}

#[tokio::test]
async fn test_in_flight_avoidance_hands_out_disjoint_components() {
    let config = DispatcherConfig {
        avoid_in_flight: true,
        ..Default::default()
    };
    let harness = Harness::with_config(vec![card("r1", Some(1))], config);
    harness.register_balanced("w-1").await;
    harness.register_balanced("w-2").await;

    let first = harness.swarm.scheduler.get_work("w-1", 1).await.unwrap();
    let second = harness.swarm.scheduler.get_work("w-2", 1).await.unwrap();

    let a: BTreeSet<_> = first[0].components.iter().collect();
    let b: BTreeSet<_> = second[0].components.iter().collect();
    assert!(a.is_disjoint(&b));
    assert_eq!(a.len() + b.len(), 6);

    // 均衡层的6个组件全部在处理中，第三个Worker拿不到任务
    harness.register_balanced("w-3").await;
    assert!(harness.swarm.scheduler.get_work("w-3", 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sampled_mode_only_returns_eligible_records() {
    let config = DispatcherConfig {
        selection_mode: SelectionMode::Sampled,
        ..Default::default()
    };
    let harness = Harness::with_config(
        vec![
            card("a", Some(1)),
            card("b", Some(2)),
            card("c", None),
            card_with("d", Some(3), &ComponentType::ALL),
        ],
        config,
    );
    harness.register_balanced("w-1").await;

    let tasks = harness.swarm.scheduler.get_work("w-1", 10).await.unwrap();
    let ids: BTreeSet<_> = tasks.iter().map(|t| t.record_id.as_str()).collect();

    assert_eq!(ids, BTreeSet::from(["a", "b"]));
}

#[tokio::test]
async fn test_cached_selection_matches_direct_query() {
    let mut config = DispatcherConfig::default();
    config.priority_cache.enabled = true;
    let harness = Harness::with_config(
        vec![card("r2", Some(2)), card("r1", Some(1)), card("r3", Some(3))],
        config,
    );
    harness.register_balanced("w-1").await;

    let tasks = harness.swarm.scheduler.get_work("w-1", 2).await.unwrap();
    let ids: Vec<_> = tasks.iter().map(|t| t.record_id.as_str()).collect();

    assert_eq!(ids, vec!["r1", "r2"]);
}

/// 排名靠前的记录只缺深度层组件，快速层Worker只能处理排名靠后的记录
fn head_blocked_by_deep_gaps() -> Vec<AnalysisRecord> {
    let mut non_deep = ComponentTier::Fast.components();
    non_deep.extend(ComponentTier::Balanced.components());

    let mut records: Vec<_> = (0..10)
        .map(|i| card_with(&format!("head-{i}"), Some(i), &non_deep))
        .collect();
    records.push(card("tail", Some(100)));
    records
}

async fn first_task_for_fast_worker(config: DispatcherConfig) -> Vec<String> {
    let harness = Harness::with_config(head_blocked_by_deep_gaps(), config);
    harness.register_fast("w-fast").await;

    let tasks = harness.swarm.scheduler.get_work("w-fast", 1).await.unwrap();
    tasks.into_iter().map(|t| t.record_id).collect()
}

#[tokio::test]
async fn test_ranked_mode_looks_past_head_blocked_by_other_tiers() {
    let ids = first_task_for_fast_worker(DispatcherConfig::default()).await;
    assert_eq!(ids, vec!["tail"]);
}

#[tokio::test]
async fn test_sampled_mode_looks_past_head_blocked_by_other_tiers() {
    let config = DispatcherConfig {
        selection_mode: SelectionMode::Sampled,
        ..Default::default()
    };
    let ids = first_task_for_fast_worker(config).await;
    assert_eq!(ids, vec!["tail"]);
}

#[tokio::test]
async fn test_cached_mode_looks_past_head_blocked_by_other_tiers() {
    let mut config = DispatcherConfig::default();
    config.priority_cache.enabled = true;
    let ids = first_task_for_fast_worker(config).await;
    assert_eq!(ids, vec!["tail"]);
}

#[tokio::test]
async fn test_ranked_and_sampled_modes_agree_on_eligibility() {
    let records = || {
        let balanced = ComponentTier::Balanced.components();
        vec![
            card_with("covered-1", Some(1), &balanced),
            card("open-2", Some(2)),
            card_with("covered-3", Some(3), &balanced),
            card("open-4", Some(4)),
            card_with("done", Some(5), &ComponentType::ALL),
            card("unranked", None),
        ]
    };

    let mut seen = Vec::new();
    for mode in [SelectionMode::Ranked, SelectionMode::Sampled] {
        let config = DispatcherConfig {
            selection_mode: mode,
            ..Default::default()
        };
        let harness = Harness::with_config(records(), config);
        harness.register_balanced("w-1").await;

        let tasks = harness.swarm.scheduler.get_work("w-1", 10).await.unwrap();
        let ids: BTreeSet<_> = tasks.into_iter().map(|t| t.record_id).collect();
        seen.push(ids);
    }

    let expected: BTreeSet<String> = ["open-2", "open-4"].iter().map(|s| s.to_string()).collect();
    assert_eq!(seen[0], expected);
    assert_eq!(seen[1], expected);
}
