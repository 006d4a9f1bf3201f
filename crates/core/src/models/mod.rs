//! # 领域模型
//!
//! 调度中心与Worker共享的数据结构：
//!
//! - [`ComponentType`] / [`ComponentTier`] - 固定的分析组件目录及其所属层级
//! - [`WorkerCapabilities`] / [`CapabilityTier`] - Worker硬件描述与推导出的能力层级
//! - [`WorkerInfo`] - 已注册Worker的状态
//! - [`AnalysisRecord`] - 逐步补全分析组件的卡牌记录
//! - [`Task`] - 分配给单个Worker的一批缺失组件
//!
//! 记录的 `fully_analyzed` 始终由 `component_count` 推导，只有结果合并会修改记录。

pub mod capability;
pub mod component;
pub mod record;
pub mod stats;
pub mod task;
pub mod worker;

pub use capability::*;
pub use component::*;
pub use record::*;
pub use stats::*;
pub use task::*;
pub use worker::*;
