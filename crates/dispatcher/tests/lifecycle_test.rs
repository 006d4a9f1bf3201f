mod common;

use chrono::{Duration, Utc};
use swarm_core::{
    models::{ComponentType, TaskStatus},
    traits::{TaskRepository, WorkerRepository},
    SwarmError,
};

use common::{card, card_with, submission_for, Harness};

#[tokio::test]
async fn test_reaped_task_reappears_for_next_worker() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_balanced("w-crashed").await;
    harness.register_balanced("w-healthy").await;

    let abandoned = harness
        .swarm
        .scheduler
        .get_work("w-crashed", 1)
        .await
        .unwrap()
        .remove(0);

    let timeout = harness.swarm.reaper.config().task_timeout_seconds;
    let report = harness
        .swarm
        .reaper
        .sweep(Utc::now() + Duration::seconds(timeout + 1))
        .await
        .unwrap();
    assert_eq!(report.released_tasks, vec![abandoned.task_id.clone()]);

    let picked_up = harness
        .swarm
        .scheduler
        .get_work("w-healthy", 1)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(picked_up.task_id, abandoned.task_id);
    assert_eq!(picked_up.components, abandoned.components);
    assert!(picked_up.is_owned_by("w-healthy"));
    assert_eq!(picked_up.reassign_count, 1);

    // 原Worker恢复后提交的旧任务已不属于它
    let err = harness
        .swarm
        .merger
        .submit_results(&submission_for(&abandoned, "w-crashed"))
        .await
        .unwrap_err();
    assert!(matches!(err, SwarmError::Forbidden { .. }));

    harness
        .swarm
        .merger
        .submit_results(&submission_for(&picked_up, "w-healthy"))
        .await
        .unwrap();
    assert_eq!(
        harness.record("r1").await.component_count,
        abandoned.components.len() as u32
    );
}

#[tokio::test]
async fn test_failed_task_is_recycled_with_remaining_components() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_balanced("w-1").await;
    harness.register_balanced("w-2").await;

    let task = harness.swarm.scheduler.get_work("w-1", 1).await.unwrap().remove(0);
    harness
        .swarm
        .merger
        .report_failure(&task.task_id, "w-1", "out of memory")
        .await
        .unwrap();

    let retried = harness.swarm.scheduler.get_work("w-2", 1).await.unwrap().remove(0);

    assert_eq!(retried.task_id, task.task_id);
    assert_eq!(retried.status, TaskStatus::Assigned);
    assert!(retried.failure_reason.is_none());
}

#[tokio::test]
async fn test_recycled_task_already_covered_is_closed() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_balanced("w-1").await;
    harness.register_balanced("w-2").await;

    // 两个Worker拿到相同组件，w-1 失败，w-2 成功
    let failed = harness.swarm.scheduler.get_work("w-1", 1).await.unwrap().remove(0);
    let done = harness.swarm.scheduler.get_work("w-2", 1).await.unwrap().remove(0);
    assert_eq!(failed.components, done.components);
    harness
        .swarm
        .merger
        .report_failure(&failed.task_id, "w-1", "timeout")
        .await
        .unwrap();
    harness
        .swarm
        .merger
        .submit_results(&submission_for(&done, "w-2"))
        .await
        .unwrap();

    let next = harness.swarm.scheduler.get_work("w-2", 1).await.unwrap().remove(0);

    assert_ne!(next.task_id, failed.task_id);
    for component in &next.components {
        assert!(!done.components.contains(component));
    }
    let closed = harness.tasks.get_by_id(&failed.task_id).await.unwrap().unwrap();
    assert_eq!(closed.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_recycled_task_is_narrowed_to_worker_components() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_fast("w-fast").await;
    harness.register_balanced("w-small").await;

    let task = harness.swarm.scheduler.get_work("w-fast", 1).await.unwrap().remove(0);
    assert!(task
        .components
        .iter()
        .all(|c| c.tier() == swarm_core::models::ComponentTier::Fast));
    harness
        .swarm
        .merger
        .report_failure(&task.task_id, "w-fast", "gpu reset")
        .await
        .unwrap();

    // 均衡层Worker无法处理快速层组件，拿到的是新任务
    let other = harness.swarm.scheduler.get_work("w-small", 1).await.unwrap().remove(0);
    assert_ne!(other.task_id, task.task_id);

    let stored = harness.tasks.get_by_id(&task.task_id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_status_reports_counts() {
    let harness = Harness::new(vec![
        card("r1", Some(1)),
        card_with("r2", Some(2), &ComponentType::ALL),
        card_with("r3", Some(3), &[ComponentType::PlayTips]),
    ]);
    harness.register_balanced("w-1").await;
    harness.register_balanced("w-2").await;

    let task = harness.swarm.scheduler.get_work("w-1", 1).await.unwrap().remove(0);
    harness
        .swarm
        .merger
        .submit_results(&submission_for(&task, "w-1"))
        .await
        .unwrap();
    harness.swarm.scheduler.get_work("w-2", 1).await.unwrap();

    let status = harness.swarm.status.status(Utc::now()).await.unwrap();
    assert_eq!(status.workers.total, 2);
    assert_eq!(status.workers.active, 2);
    assert_eq!(status.tasks.completed, 1);
    assert_eq!(status.tasks.assigned, 1);
    assert_eq!(status.records.total, 3);
    assert_eq!(status.records.fully_analyzed, 1);
    assert_eq!(status.records.analyzed, 3);
    assert_eq!(status.records.completion_rate, 33.33);

    let later = harness
        .swarm
        .status
        .status(Utc::now() + Duration::seconds(301))
        .await
        .unwrap();
    assert_eq!(later.workers.stale, 2);
    assert_eq!(later.workers.active, 0);
}

#[tokio::test]
async fn test_admin_reset_clears_workers_and_assigned_tasks() {
    let harness = Harness::new(vec![card("r1", Some(1)), card("r2", Some(2)), card("r3", Some(3))]);
    harness.register_balanced("w-1").await;

    let tasks = harness.swarm.scheduler.get_work("w-1", 3).await.unwrap();
    harness
        .swarm
        .merger
        .submit_results(&submission_for(&tasks[0], "w-1"))
        .await
        .unwrap();
    harness
        .swarm
        .merger
        .report_failure(&tasks[1].task_id, "w-1", "backend down")
        .await
        .unwrap();

    let report = harness.swarm.admin.reset_all().await.unwrap();

    assert_eq!(report.workers_removed, 1);
    assert_eq!(report.tasks_deleted, 1);
    assert!(harness.workers.list().await.unwrap().is_empty());
    let mut remaining: Vec<_> = harness.tasks.snapshot().await.into_iter().map(|t| t.status).collect();
    remaining.sort_by_key(|s| s.as_str());
    assert_eq!(remaining, vec![TaskStatus::Completed, TaskStatus::Failed]);

    // 重置后未注册的Worker拿不到任务
    assert!(harness.swarm.scheduler.get_work("w-1", 1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reset_single_worker_releases_its_tasks() {
    let harness = Harness::new(vec![card("r1", Some(1))]);
    harness.register_balanced("w-1").await;
    harness.register_balanced("w-2").await;
    let task = harness.swarm.scheduler.get_work("w-1", 1).await.unwrap().remove(0);

    let released = harness.swarm.admin.reset_worker("w-1").await.unwrap();
    assert_eq!(released, 1);
    assert!(harness.workers.get_by_id("w-1").await.unwrap().is_none());

    let picked_up = harness.swarm.scheduler.get_work("w-2", 1).await.unwrap().remove(0);
    assert_eq!(picked_up.task_id, task.task_id);

    let err = harness.swarm.admin.reset_worker("w-1").await.unwrap_err();
    assert!(matches!(err, SwarmError::WorkerNotFound { .. }));
}

#[tokio::test]
async fn test_heartbeat_for_unknown_worker_is_not_found() {
    let harness = Harness::new(vec![]);

    let err = harness
        .swarm
        .registry
        .heartbeat("nobody", Some("idle"), Some(0))
        .await
        .unwrap_err();

    assert!(matches!(err, SwarmError::WorkerNotFound { .. }));
}
