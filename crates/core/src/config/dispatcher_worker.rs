use serde::{Deserialize, Serialize};

use crate::routing::TierThresholds;

/// 候选记录选择方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// 按优先级排名升序
    Ranked,
    /// 均匀随机抽样，避免所有Worker集中在队首记录
    Sampled,
}

/// 优先级缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityCacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    /// 缓存的队首记录数量上限
    pub capacity: usize,
}

impl Default for PriorityCacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_seconds: 60,
            capacity: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 记录被视为完全分析所需的组件数
    pub completion_threshold: u32,
    pub max_components_per_task: usize,
    /// 候选记录过采样倍数
    pub oversample_factor: usize,
    pub max_tasks_per_poll: u32,
    pub selection_mode: SelectionMode,
    /// 创建新任务时跳过仍在处理中的组件
    pub avoid_in_flight: bool,
    pub staleness_window_seconds: i64,
    pub task_timeout_seconds: i64,
    pub reap_interval_seconds: u64,
    /// 每次拉取时扫描的可回收任务上限
    pub recycle_scan_limit: usize,
    pub priority_cache: PriorityCacheConfig,
    pub tiers: TierThresholds,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            completion_threshold: 20,
            max_components_per_task: 3,
            oversample_factor: 10,
            max_tasks_per_poll: 10,
            selection_mode: SelectionMode::Ranked,
            avoid_in_flight: false,
            staleness_window_seconds: 300,
            task_timeout_seconds: 1800,
            reap_interval_seconds: 60,
            recycle_scan_limit: 50,
            priority_cache: PriorityCacheConfig::default(),
            tiers: TierThresholds::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.completion_threshold == 0 {
            return Err(anyhow::anyhow!("完成阈值必须大于0"));
        }

        if self.max_components_per_task == 0 {
            return Err(anyhow::anyhow!("每个任务的组件上限必须大于0"));
        }

        if self.oversample_factor == 0 {
            return Err(anyhow::anyhow!("过采样倍数必须大于0"));
        }

        if self.max_tasks_per_poll == 0 {
            return Err(anyhow::anyhow!("单次拉取任务上限必须大于0"));
        }

        if self.staleness_window_seconds <= 0 {
            return Err(anyhow::anyhow!("Worker失活窗口必须大于0"));
        }

        if self.task_timeout_seconds <= 0 {
            return Err(anyhow::anyhow!("任务超时时间必须大于0"));
        }

        if self.reap_interval_seconds == 0 {
            return Err(anyhow::anyhow!("回收扫描间隔必须大于0"));
        }

        if self.priority_cache.enabled
            && (self.priority_cache.ttl_seconds == 0 || self.priority_cache.capacity == 0)
        {
            return Err(anyhow::anyhow!("优先级缓存的TTL和容量必须大于0"));
        }

        Ok(())
    }
}

/// 推理后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 为空时使用 `<tier>-<hostname>`
    pub worker_id: Option<String>,
    pub dispatcher_url: String,
    /// 覆盖自动检测的硬件信息
    pub gpu_available: Option<bool>,
    pub ram_gb: Option<u32>,
    pub cpu_cores: Option<u32>,
    /// 为空时fast层级取2，其余取1
    pub max_tasks: Option<u32>,
    pub heartbeat_interval_seconds: u64,
    /// 为空时按层级取值：fast 3秒，balanced 4秒，deep 5秒
    pub idle_backoff_seconds: Option<u64>,
    pub error_backoff_seconds: u64,
    pub register_timeout_seconds: u64,
    pub heartbeat_timeout_seconds: u64,
    pub get_work_timeout_seconds: u64,
    pub submit_timeout_seconds: u64,
    pub inference: InferenceConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: None,
            dispatcher_url: "http://localhost:8080".to_string(),
            gpu_available: None,
            ram_gb: None,
            cpu_cores: None,
            max_tasks: None,
            heartbeat_interval_seconds: 30,
            idle_backoff_seconds: None,
            error_backoff_seconds: 10,
            register_timeout_seconds: 30,
            heartbeat_timeout_seconds: 10,
            get_work_timeout_seconds: 30,
            submit_timeout_seconds: 60,
            inference: InferenceConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(id) = &self.worker_id {
            if id.trim().is_empty() {
                return Err(anyhow::anyhow!("Worker ID不能为空"));
            }
        }

        if !self.dispatcher_url.starts_with("http://") && !self.dispatcher_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!("无效的调度中心地址: {}", self.dispatcher_url));
        }

        if self.max_tasks == Some(0) {
            return Err(anyhow::anyhow!("单次拉取任务数必须大于0"));
        }

        if self.heartbeat_interval_seconds == 0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        if self.idle_backoff_seconds == Some(0) || self.error_backoff_seconds == 0 {
            return Err(anyhow::anyhow!("退避时间必须大于0"));
        }

        let timeouts = [
            self.register_timeout_seconds,
            self.heartbeat_timeout_seconds,
            self.get_work_timeout_seconds,
            self.submit_timeout_seconds,
            self.inference.timeout_seconds,
        ];
        if timeouts.contains(&0) {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }

        if self.inference.model.is_empty() {
            return Err(anyhow::anyhow!("推理模型名称不能为空"));
        }

        Ok(())
    }
}
