use thiserror::Error;

/// 系统错误类型定义
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: String },

    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },

    #[error("分析记录未找到: {id}")]
    RecordNotFound { id: String },

    #[error("任务 {task_id} 不属于Worker {worker_id}")]
    Forbidden { task_id: String, worker_id: String },

    #[error("基础设施暂时不可用: {0}")]
    TransientInfra(String),

    #[error("推理后端错误: {0}")]
    Inference(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl SwarmError {
    /// 是否为可重试的瞬时错误，调用方按自己的节奏重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwarmError::Database(_)
                | SwarmError::TransientInfra(_)
                | SwarmError::Network(_)
                | SwarmError::Inference(_)
        )
    }

    /// 是否为资源不存在类错误
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SwarmError::WorkerNotFound { .. }
                | SwarmError::TaskNotFound { .. }
                | SwarmError::RecordNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for SwarmError {
    fn from(err: serde_json::Error) -> Self {
        SwarmError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SwarmError>;
