use serde::{Deserialize, Serialize};

/// Worker数量统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCounts {
    pub total: u64,
    pub active: u64,
    pub stale: u64,
}

/// 任务数量统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub assigned: u64,
    pub completed: u64,
    pub failed: u64,
}

/// 记录完成度统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub total: u64,
    /// 至少拥有一个组件的记录
    pub analyzed: u64,
    pub fully_analyzed: u64,
    /// 完全分析的记录占比（百分比，保留两位小数）
    pub completion_rate: f64,
}

impl RecordCounts {
    pub fn new(total: u64, analyzed: u64, fully_analyzed: u64) -> Self {
        let completion_rate = if total == 0 {
            0.0
        } else {
            (fully_analyzed as f64 / total as f64 * 10000.0).round() / 100.0
        };
        Self {
            total,
            analyzed,
            fully_analyzed,
            completion_rate,
        }
    }
}

/// 系统整体状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmStatus {
    pub workers: WorkerCounts,
    pub tasks: TaskCounts,
    pub records: RecordCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_rate_rounding() {
        assert_eq!(RecordCounts::new(3, 2, 1).completion_rate, 33.33);
        assert_eq!(RecordCounts::new(0, 0, 0).completion_rate, 0.0);
        assert_eq!(RecordCounts::new(4, 4, 4).completion_rate, 100.0);
    }
}
