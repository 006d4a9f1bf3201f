//! 能力路由：把Worker硬件描述映射为能力层级与可生成的组件集合。
//!
//! 路由是纯函数，每次注册都会重新计算，硬件升级后重新注册即可生效。

use serde::{Deserialize, Serialize};

use crate::models::{CapabilityTier, ComponentTier, ComponentType, WorkerCapabilities};

/// 层级划分阈值表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    /// 进入fast层级所需内存（同时需要GPU）
    pub fast_min_ram_gb: u32,
    /// 进入deep层级所需内存
    pub deep_min_ram_gb: u32,
    /// 已进入fast层级的GPU Worker不再分配deep组件
    pub gpu_workers_skip_deep: bool,
}

impl TierThresholds {
    pub const DEFAULT: TierThresholds = TierThresholds {
        fast_min_ram_gb: 32,
        deep_min_ram_gb: 64,
        gpu_workers_skip_deep: true,
    };
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// 路由结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub tier: CapabilityTier,
    /// 按目录顺序排列的组件集合
    pub components: Vec<ComponentType>,
}

/// 能力路由
#[derive(Debug, Clone, Default)]
pub struct CapabilityRouter {
    thresholds: TierThresholds,
}

impl CapabilityRouter {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }

    pub fn classify(&self, capabilities: &WorkerCapabilities) -> Classification {
        let t = &self.thresholds;
        let fast = capabilities.gpu_available && capabilities.ram_gb >= t.fast_min_ram_gb;
        let deep = capabilities.ram_gb >= t.deep_min_ram_gb && !(fast && t.gpu_workers_skip_deep);
        let tier = CapabilityTier::from_flags(fast, deep);

        let components = ComponentType::ALL
            .iter()
            .copied()
            .filter(|c| match c.tier() {
                ComponentTier::Fast => tier.includes_fast(),
                ComponentTier::Deep => tier.includes_deep(),
                ComponentTier::Balanced => true,
            })
            .collect();

        Classification { tier, components }
    }
}

/// 使用默认阈值表分类
pub fn classify(capabilities: &WorkerCapabilities) -> Classification {
    CapabilityRouter::default().classify(capabilities)
}
