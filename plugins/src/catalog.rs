use vigil_core::api::{RiskProfile, TaskPriority, TaskTemplate, TemplateCatalog};

/// Research templates for a crypto market decision.
///
/// Core coverage (sentiment, on-chain, technical, macro) applies to every
/// profile. Conservative runs add liquidity and correlation checks,
/// aggressive runs add momentum signals. Pattern matching and keyword
/// extraction are optional and the first to go under a budget cap.
#[derive(Debug, Clone, Default)]
pub struct StandardResearchCatalog;

impl StandardResearchCatalog {
    pub fn new() -> Self {
        Self
    }
}

struct Entry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    priority: TaskPriority,
    sources: &'static [&'static str],
    deps: &'static [&'static str],
    cost: f64,
    timeout_secs: u64,
    optional: bool,
    profiles: &'static [RiskProfile],
}

const STANDARD: &[Entry] = &[
    Entry {
        id: "task_sentiment",
        name: "Market Sentiment Analysis",
        description: "Gather sentiment from news, social media, and fear/greed index for {symbol}",
        priority: TaskPriority::Critical,
        sources: &["news", "social", "fear_greed"],
        deps: &[],
        cost: 0.05,
        timeout_secs: 30,
        optional: false,
        profiles: &[],
    },
    Entry {
        id: "task_onchain",
        name: "On-Chain Metrics",
        description: "Fetch on-chain data: whale activity, exchange flows, active addresses for {base}",
        priority: TaskPriority::Critical,
        sources: &["onchain", "coingecko"],
        deps: &[],
        cost: 0.03,
        timeout_secs: 20,
        optional: false,
        profiles: &[],
    },
    Entry {
        id: "task_technical",
        name: "Technical Analysis",
        description: "Calculate technical indicators: RSI, MACD, Bollinger Bands, patterns for {symbol}",
        priority: TaskPriority::Critical,
        sources: &["price_data", "volume_data"],
        deps: &[],
        cost: 0.02,
        timeout_secs: 15,
        optional: false,
        profiles: &[],
    },
    Entry {
        id: "task_macro",
        name: "Macroeconomic Factors",
        description: "Analyze macro environment: rates policy, DXY, risk sentiment, correlation with traditional markets",
        priority: TaskPriority::High,
        sources: &["macro_data", "fear_greed"],
        deps: &[],
        cost: 0.03,
        timeout_secs: 20,
        optional: false,
        profiles: &[],
    },
    Entry {
        id: "task_liquidity",
        name: "Liquidity Analysis",
        description: "Assess market liquidity and order book depth for {symbol}",
        priority: TaskPriority::High,
        sources: &["orderbook", "volume_data"],
        deps: &[],
        cost: 0.02,
        timeout_secs: 15,
        optional: false,
        profiles: &[RiskProfile::Conservative],
    },
    Entry {
        id: "task_correlation",
        name: "Correlation Analysis",
        description: "Analyze correlation with BTC and major altcoins for {symbol}",
        priority: TaskPriority::Medium,
        sources: &["price_data"],
        deps: &["task_technical"],
        cost: 0.02,
        timeout_secs: 15,
        optional: false,
        profiles: &[RiskProfile::Conservative],
    },
    Entry {
        id: "task_momentum",
        name: "Momentum Signals",
        description: "Identify short-term momentum and breakout signals for {symbol}",
        priority: TaskPriority::High,
        sources: &["price_data", "volume_data"],
        deps: &["task_technical"],
        cost: 0.02,
        timeout_secs: 10,
        optional: false,
        profiles: &[RiskProfile::Aggressive],
    },
    Entry {
        id: "task_patterns",
        name: "Historical Pattern Matching",
        description: "Find similar historical patterns and their outcomes for {symbol}",
        priority: TaskPriority::Medium,
        sources: &["historical_data"],
        deps: &["task_technical"],
        cost: 0.04,
        timeout_secs: 25,
        optional: true,
        profiles: &[],
    },
    Entry {
        id: "task_keywords",
        name: "News Keyword Extraction",
        description: "Extract trending keywords and themes from recent {base} news",
        priority: TaskPriority::Low,
        sources: &["news"],
        deps: &["task_sentiment"],
        cost: 0.02,
        timeout_secs: 15,
        optional: true,
        profiles: &[],
    },
];

impl TemplateCatalog for StandardResearchCatalog {
    fn name(&self) -> &str {
        "standard-research"
    }

    fn templates(&self) -> Vec<TaskTemplate> {
        STANDARD
            .iter()
            .map(|s| TaskTemplate {
                id: s.id.to_string(),
                name: s.name.to_string(),
                description: s.description.to_string(),
                priority: s.priority,
                data_sources: s.sources.iter().map(|x| x.to_string()).collect(),
                dependencies: s.deps.iter().map(|x| x.to_string()).collect(),
                estimated_cost: s.cost,
                // Planned against the worst case
                estimated_duration_ms: s.timeout_secs * 1_000,
                timeout_ms: s.timeout_secs * 1_000,
                max_retries: 1,
                optional: s.optional,
                profiles: s.profiles.to_vec(),
            })
            .collect()
    }
}

/// Primary data source of every standard template, deduplicated in
/// catalog order.
pub fn standard_primary_sources() -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for entry in STANDARD {
        if let Some(&source) = entry.sources.first() {
            if !out.contains(&source) {
                out.push(source);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vigil_core::api::{PlannerConfig, PlanningProfile, RequestContext, TaskPlanner};

    fn planner() -> TaskPlanner {
        TaskPlanner::new(Arc::new(StandardResearchCatalog), PlannerConfig::default())
    }

    fn ids(profile: &PlanningProfile) -> Vec<String> {
        let plan = planner()
            .plan(&RequestContext::new("BTC/USDT"), profile)
            .unwrap();
        plan.tasks().iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn test_balanced_plan_has_core_and_optional_tasks() {
        assert_eq!(
            ids(&PlanningProfile::balanced()),
            vec![
                "task_sentiment",
                "task_onchain",
                "task_technical",
                "task_macro",
                "task_patterns",
                "task_keywords",
            ]
        );
    }

    #[test]
    fn test_profiles_select_their_extras() {
        let conservative = ids(&PlanningProfile::conservative().with_optional_tasks(false));
        assert!(conservative.contains(&"task_liquidity".to_string()));
        assert!(conservative.contains(&"task_correlation".to_string()));
        assert!(!conservative.contains(&"task_momentum".to_string()));

        let aggressive = ids(&PlanningProfile::aggressive().with_optional_tasks(false));
        assert!(aggressive.contains(&"task_momentum".to_string()));
        assert!(!aggressive.contains(&"task_liquidity".to_string()));
    }

    #[test]
    fn test_balanced_plan_batches() {
        let plan = planner()
            .plan(&RequestContext::new("ETH/USDT"), &PlanningProfile::balanced())
            .unwrap();
        assert_eq!(plan.batches().len(), 2);
        assert_eq!(
            plan.batches()[0],
            vec!["task_sentiment", "task_onchain", "task_technical", "task_macro"]
        );
        assert_eq!(plan.batches()[1], vec!["task_patterns", "task_keywords"]);
        assert!((plan.estimates.total_cost - 0.19).abs() < 1e-9);
    }

    #[test]
    fn test_budget_cap_drops_optional_tasks_first() {
        let plan = planner()
            .plan(
                &RequestContext::new("BTC/USDT"),
                &PlanningProfile::balanced().with_budget_cap(0.18),
            )
            .unwrap();
        assert_eq!(plan.dropped_tasks, vec!["task_keywords".to_string()]);
        assert!(plan.estimates.total_cost <= 0.18);

        let tight = planner()
            .plan(
                &RequestContext::new("BTC/USDT"),
                &PlanningProfile::balanced().with_budget_cap(0.14),
            )
            .unwrap();
        assert_eq!(tight.dropped_tasks, vec!["task_keywords", "task_patterns"]);
    }

    #[test]
    fn test_descriptions_are_rendered() {
        let plan = planner()
            .plan(&RequestContext::new("SOL/USDT"), &PlanningProfile::balanced())
            .unwrap();
        let onchain = plan.task("task_onchain").unwrap();
        assert!(onchain.description.ends_with("for SOL"));
    }

    #[test]
    fn test_primary_sources() {
        assert_eq!(
            standard_primary_sources(),
            vec!["news", "onchain", "price_data", "macro_data", "orderbook", "historical_data"]
        );
    }
}
