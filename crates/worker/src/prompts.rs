use swarm_core::models::{ComponentType, RecordSummary};

/// Per-component focus instructions appended to the record description.
const FOCUS: &[(ComponentType, &str)] = &[
    (
        ComponentType::PlayTips,
        "Give practical gameplay tips: when to cast it, what to pair it with, \
         and the most common misplays. Keep it concise and actionable.",
    ),
    (
        ComponentType::MulliganConsiderations,
        "Explain how this card affects mulligan decisions: which opening hands \
         it makes keepable and when it should be shipped back.",
    ),
    (
        ComponentType::RulesClarifications,
        "Clarify the rules around this card: timing, tricky interactions, \
         common misconceptions and relevant edge cases.",
    ),
    (
        ComponentType::ComboSuggestions,
        "List notable combos and strong synergistic pieces, explaining how each \
         line actually wins or generates value.",
    ),
    (
        ComponentType::FormatAnalysis,
        "Assess how the card performs in each format where it is legal, \
         noting where it sees play and why.",
    ),
    (
        ComponentType::SynergyAnalysis,
        "Describe the mechanics, tribes and card types this card synergizes \
         with, and the deck shells that reward it.",
    ),
    (
        ComponentType::CompetitiveAnalysis,
        "Evaluate the card's competitive standing: tournament results, \
         matchups where it shines and the answers that keep it in check.",
    ),
    (
        ComponentType::TacticalAnalysis,
        "Break down in-game tactics: sequencing, combat math, and how to play \
         around opposing interaction.",
    ),
    (
        ComponentType::ThematicAnalysis,
        "Analyze the card's theme: how its mechanics express its name, art and \
         place in the setting.",
    ),
    (
        ComponentType::HistoricalContext,
        "Place the card in history: the set it came from, reprints, and how its \
         perception changed over time.",
    ),
    (
        ComponentType::ArtFlavorAnalysis,
        "Discuss the artwork and flavor text, what they depict and how they \
         connect to the wider story.",
    ),
    (
        ComponentType::DesignPhilosophy,
        "Examine the design choices behind the card: the problem it solves, \
         its costing and the tensions it creates.",
    ),
    (
        ComponentType::AdvancedInteractions,
        "Cover advanced interactions with layers, replacement effects, \
         the stack and state-based actions.",
    ),
    (
        ComponentType::MetaPositioning,
        "Position the card in the current metagame: which archetypes want it \
         and which trends push it up or down.",
    ),
    (
        ComponentType::BudgetAlternatives,
        "Suggest cheaper alternatives that fill a similar role and explain \
         what is lost with each substitute.",
    ),
    (
        ComponentType::DeckArchetypes,
        "Name the deck archetypes that use this card and the role it fills \
         in each of them.",
    ),
    (
        ComponentType::NewPlayerGuide,
        "Explain the card to a newer player in plain language, including what \
         makes it good or bad.",
    ),
    (
        ComponentType::SideboardGuide,
        "Describe when to bring the card in from the sideboard, what to take \
         out, and which matchups it targets.",
    ),
    (
        ComponentType::PowerLevelAssessment,
        "Rate the card's power level on a 1-10 scale for casual and \
         competitive play and justify the rating.",
    ),
    (
        ComponentType::InvestmentOutlook,
        "Comment on the card's market outlook: price drivers, reprint risk \
         and collectibility.",
    ),
];

/// Name, cost, type, stats and rules text in a fixed layout.
pub fn record_header(record: &RecordSummary) -> String {
    let data = &record.data;
    let mut header = format!(
        "Card: {}\nMana Cost: {}\nType: {}",
        record.name,
        data.mana_cost.as_deref().unwrap_or("N/A"),
        data.type_line.as_deref().unwrap_or("N/A"),
    );
    if let (Some(power), Some(toughness)) = (&data.power, &data.toughness) {
        header.push_str(&format!("\nPower/Toughness: {power}/{toughness}"));
    }
    header.push_str(&format!(
        "\nText: {}",
        data.oracle_text.as_deref().unwrap_or("N/A")
    ));
    header
}

pub fn build_prompt(record: &RecordSummary, component: ComponentType) -> String {
    match FOCUS.iter().find(|(c, _)| *c == component) {
        Some((_, focus)) => format!(
            "{}\n\nAnalysis focus for [[{}]]: {}\n\n{}",
            record_header(record),
            record.name,
            component.as_str().replace('_', " "),
            focus
        ),
        None => generic_prompt(record, component.as_str()),
    }
}

/// Used for components without a dedicated focus instruction.
pub fn generic_prompt(record: &RecordSummary, component: &str) -> String {
    format!(
        "{}\n\nAnalyze [[{}]] with a focus on {}. Provide specific insights and \
         practical recommendations.",
        record_header(record),
        record.name,
        component.replace('_', " ")
    )
}
