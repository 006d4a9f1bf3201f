use async_trait::async_trait;

use crate::SwarmResult;

/// 外部推理后端
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// 根据提示词生成文本，可能超时或失败
    async fn generate(&self, prompt: &str) -> SwarmResult<String>;

    /// 写入组件 `model_info` 的模型名称
    fn model_name(&self) -> &str;
}
