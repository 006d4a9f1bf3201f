use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SwarmError;

/// 组件目录版本，目录变更时递增
pub const CATALOG_VERSION: u32 = 1;

/// 组件所属的能力层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTier {
    /// 需要GPU的快速生成组件
    Fast,
    /// 需要大内存的深度分析组件
    Deep,
    /// 所有Worker都可生成的组件
    Balanced,
}

impl ComponentTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentTier::Fast => "fast",
            ComponentTier::Deep => "deep",
            ComponentTier::Balanced => "balanced",
        }
    }

    /// 该层级包含的全部组件
    pub fn components(&self) -> Vec<ComponentType> {
        ComponentType::ALL
            .iter()
            .copied()
            .filter(|c| c.tier() == *self)
            .collect()
    }
}

/// 分析组件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    // fast
    PlayTips,
    MulliganConsiderations,
    RulesClarifications,
    ComboSuggestions,
    FormatAnalysis,
    SynergyAnalysis,
    CompetitiveAnalysis,
    TacticalAnalysis,
    // deep
    ThematicAnalysis,
    HistoricalContext,
    ArtFlavorAnalysis,
    DesignPhilosophy,
    AdvancedInteractions,
    MetaPositioning,
    // balanced
    BudgetAlternatives,
    DeckArchetypes,
    NewPlayerGuide,
    SideboardGuide,
    PowerLevelAssessment,
    InvestmentOutlook,
}

impl ComponentType {
    pub const ALL: [ComponentType; 20] = [
        ComponentType::PlayTips,
        ComponentType::MulliganConsiderations,
        ComponentType::RulesClarifications,
        ComponentType::ComboSuggestions,
        ComponentType::FormatAnalysis,
        ComponentType::SynergyAnalysis,
        ComponentType::CompetitiveAnalysis,
        ComponentType::TacticalAnalysis,
        ComponentType::ThematicAnalysis,
        ComponentType::HistoricalContext,
        ComponentType::ArtFlavorAnalysis,
        ComponentType::DesignPhilosophy,
        ComponentType::AdvancedInteractions,
        ComponentType::MetaPositioning,
        ComponentType::BudgetAlternatives,
        ComponentType::DeckArchetypes,
        ComponentType::NewPlayerGuide,
        ComponentType::SideboardGuide,
        ComponentType::PowerLevelAssessment,
        ComponentType::InvestmentOutlook,
    ];

    /// 组件所属层级
    pub fn tier(&self) -> ComponentTier {
        use ComponentType::*;
        match self {
            PlayTips | MulliganConsiderations | RulesClarifications | ComboSuggestions
            | FormatAnalysis | SynergyAnalysis | CompetitiveAnalysis | TacticalAnalysis => {
                ComponentTier::Fast
            }
            ThematicAnalysis | HistoricalContext | ArtFlavorAnalysis | DesignPhilosophy
            | AdvancedInteractions | MetaPositioning => ComponentTier::Deep,
            BudgetAlternatives | DeckArchetypes | NewPlayerGuide | SideboardGuide
            | PowerLevelAssessment | InvestmentOutlook => ComponentTier::Balanced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use ComponentType::*;
        match self {
            PlayTips => "play_tips",
            MulliganConsiderations => "mulligan_considerations",
            RulesClarifications => "rules_clarifications",
            ComboSuggestions => "combo_suggestions",
            FormatAnalysis => "format_analysis",
            SynergyAnalysis => "synergy_analysis",
            CompetitiveAnalysis => "competitive_analysis",
            TacticalAnalysis => "tactical_analysis",
            ThematicAnalysis => "thematic_analysis",
            HistoricalContext => "historical_context",
            ArtFlavorAnalysis => "art_flavor_analysis",
            DesignPhilosophy => "design_philosophy",
            AdvancedInteractions => "advanced_interactions",
            MetaPositioning => "meta_positioning",
            BudgetAlternatives => "budget_alternatives",
            DeckArchetypes => "deck_archetypes",
            NewPlayerGuide => "new_player_guide",
            SideboardGuide => "sideboard_guide",
            PowerLevelAssessment => "power_level_assessment",
            InvestmentOutlook => "investment_outlook",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentType::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SwarmError::Validation(format!("未知的组件类型: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_partition_sizes() {
        assert_eq!(ComponentTier::Fast.components().len(), 8);
        assert_eq!(ComponentTier::Deep.components().len(), 6);
        assert_eq!(ComponentTier::Balanced.components().len(), 6);
    }

    #[test]
    fn test_name_parsing_matches_serde() {
        for component in ComponentType::ALL {
            let parsed: ComponentType = component.as_str().parse().unwrap();
            assert_eq!(parsed, component);

            let json = serde_json::to_string(&component).unwrap();
            assert_eq!(json, format!("\"{}\"", component.as_str()));
        }
    }

    #[test]
    fn test_unknown_component_rejected() {
        let err = "fortune_telling".parse::<ComponentType>().unwrap_err();
        assert!(matches!(err, SwarmError::Validation(_)));
    }
}
