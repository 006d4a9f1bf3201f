use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Worker硬件能力描述
///
/// 缺失字段或 `null` 按最保守的取值处理，只会得到balanced层级。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerCapabilities {
    #[serde(default, deserialize_with = "null_as_default")]
    pub gpu_available: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ram_gb: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cpu_cores: u32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl WorkerCapabilities {
    pub fn new(gpu_available: bool, ram_gb: u32, cpu_cores: u32) -> Self {
        Self {
            gpu_available,
            ram_gb,
            cpu_cores,
        }
    }
}

/// Worker能力层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    /// 仅balanced组件
    Balanced,
    /// GPU组件 + balanced
    Fast,
    /// 深度组件 + balanced
    Deep,
    /// GPU组件 + 深度组件 + balanced
    FastAndDeep,
}

impl CapabilityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityTier::Balanced => "balanced",
            CapabilityTier::Fast => "fast",
            CapabilityTier::Deep => "deep",
            CapabilityTier::FastAndDeep => "fast_and_deep",
        }
    }

    pub fn from_flags(fast: bool, deep: bool) -> Self {
        match (fast, deep) {
            (true, true) => CapabilityTier::FastAndDeep,
            (true, false) => CapabilityTier::Fast,
            (false, true) => CapabilityTier::Deep,
            (false, false) => CapabilityTier::Balanced,
        }
    }

    pub fn includes_fast(&self) -> bool {
        matches!(self, CapabilityTier::Fast | CapabilityTier::FastAndDeep)
    }

    pub fn includes_deep(&self) -> bool {
        matches!(self, CapabilityTier::Deep | CapabilityTier::FastAndDeep)
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CapabilityTier {
    type Err = crate::SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "balanced" => Ok(CapabilityTier::Balanced),
            "fast" => Ok(CapabilityTier::Fast),
            "deep" => Ok(CapabilityTier::Deep),
            "fast_and_deep" => Ok(CapabilityTier::FastAndDeep),
            _ => Err(crate::SwarmError::Validation(format!("未知的能力层级: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_fields_are_conservative() {
        let caps: WorkerCapabilities =
            serde_json::from_str(r#"{"gpu_available":null,"ram_gb":null,"cpu_cores":4}"#).unwrap();
        assert_eq!(caps, WorkerCapabilities::new(false, 0, 4));
    }

    #[test]
    fn test_missing_fields_are_conservative() {
        let caps: WorkerCapabilities = serde_json::from_str("{}").unwrap();
        assert_eq!(caps, WorkerCapabilities::new(false, 0, 0));

        let caps: WorkerCapabilities = serde_json::from_str(r#"{"ram_gb": 48}"#).unwrap();
        assert!(!caps.gpu_available);
        assert_eq!(caps.ram_gb, 48);
    }

    #[test]
    fn test_tier_flags() {
        assert_eq!(CapabilityTier::from_flags(true, true), CapabilityTier::FastAndDeep);
        assert!(CapabilityTier::FastAndDeep.includes_fast());
        assert!(CapabilityTier::FastAndDeep.includes_deep());
        assert!(!CapabilityTier::Balanced.includes_fast());
        assert_eq!("deep".parse::<CapabilityTier>().unwrap(), CapabilityTier::Deep);
    }
}
