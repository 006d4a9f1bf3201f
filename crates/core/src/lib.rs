//! # Swarm Core
//!
//! 卡牌分析内容分布式生成系统的核心模块，定义所有crate共享的领域模型、错误类型和抽象接口。
//!
//! ## 模块组成
//!
//! - [`models`] - Worker、分析记录、任务、组件目录等领域模型
//! - [`routing`] - 根据硬件能力划分Worker层级的能力路由
//! - [`traits`] - 仓储与推理后端的抽象接口
//! - [`protocol`] - Worker与调度中心之间的HTTP协议数据结构
//! - [`config`] - 应用配置的加载与校验
//! - [`logging`] - 日志系统初始化
//! - [`errors`] - 统一错误类型
//!
//! 调度中心与Worker进程都只依赖这里的类型，具体存储实现位于 `swarm-infrastructure`。

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod protocol;
pub mod routing;
pub mod traits;

pub use errors::SwarmError;

/// 统一的Result类型
pub type SwarmResult<T> = std::result::Result<T, SwarmError>;
