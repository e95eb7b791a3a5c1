// =============================================================================
// Decision Envelope — Auditable record of every per-instrument decision
// =============================================================================
//
// Each tick the engine produces one envelope per instrument: what the arbiter
// decided, which rule fired, and what the position manager did with it.
// Envelopes are kept in a bounded ring on `AppState` (`recent_decisions`) and
// exposed through the API so every trade / no-trade can be audited afterwards.
// =============================================================================

use serde::Serialize;

use crate::position_engine::ExecutionResult;
use crate::strategy::Decision;

/// Final disposition of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// A trade was written to the ledger.
    Executed,
    /// BUY / SELL blocked by a position constraint.
    Rejected,
    /// No rule fired.
    Hold,
    /// Not enough history to evaluate any rule.
    InsufficientHistory,
}

/// Complete auditable record of one decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionEnvelope {
    /// Unique identifier for this decision (UUID v4).
    pub id: String,

    /// Tick number the decision was made in.
    pub tick: u64,

    pub symbol: String,

    /// Price the decision was evaluated at.
    pub price: f64,

    /// "BUY", "SELL" or "HOLD".
    pub action: String,

    /// Rule that produced the signal, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,

    pub outcome: Outcome,

    /// Ledger id of the executed trade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<u64>,

    /// Human-readable reason from the strategy rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Why execution was blocked or evaluation skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,

    /// ISO 8601 timestamp of when this decision was created.
    pub created_at: String,
}

impl DecisionEnvelope {
    fn base(tick: u64, symbol: impl Into<String>, price: f64, action: &str, outcome: Outcome) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tick,
            symbol: symbol.into(),
            price,
            action: action.to_string(),
            rule: None,
            outcome,
            trade_id: None,
            reason: None,
            blocked_by: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Record a decision together with what execution made of it.
    pub fn from_execution(
        tick: u64,
        symbol: impl Into<String>,
        price: f64,
        decision: &Decision,
        result: &ExecutionResult,
    ) -> Self {
        let outcome = match result {
            ExecutionResult::Filled(_) => Outcome::Executed,
            ExecutionResult::Rejected(_) => Outcome::Rejected,
            ExecutionResult::Skipped => Outcome::Hold,
        };

        let mut envelope = Self::base(tick, symbol, price, decision.action(), outcome);
        envelope.rule = decision.rule().map(|r| r.to_string());
        envelope.reason = decision.reason().map(str::to_string);
        match result {
            ExecutionResult::Filled(trade) => envelope.trade_id = Some(trade.id),
            ExecutionResult::Rejected(rejection) => envelope.blocked_by = Some(rejection.to_string()),
            ExecutionResult::Skipped => {}
        }
        envelope
    }

    /// Record an instrument skipped for lack of history.
    pub fn insufficient_history(
        tick: u64,
        symbol: impl Into<String>,
        price: f64,
        have: usize,
        need: usize,
    ) -> Self {
        let mut envelope = Self::base(tick, symbol, price, "HOLD", Outcome::InsufficientHistory);
        envelope.blocked_by = Some(format!("Insufficient history: {have} < {need} samples"));
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position_engine::TradeRejection;
    use crate::strategy::StrategyRule;

    #[test]
    fn rejected_buy_carries_rule_and_block_reason() {
        let decision = Decision::Buy {
            symbol: "ETH".into(),
            rule: StrategyRule::RsiExtremes,
            reason: "oversold".into(),
        };
        let result = ExecutionResult::Rejected(TradeRejection::CapacityExceeded { open: 10, max: 10 });
        let env = DecisionEnvelope::from_execution(7, "ETH", 2_000.0, &decision, &result);

        assert_eq!(env.outcome, Outcome::Rejected);
        assert_eq!(env.action, "BUY");
        assert_eq!(env.rule.as_deref(), Some("RsiExtremes"));
        assert_eq!(env.reason.as_deref(), Some("oversold"));
        assert!(env.blocked_by.unwrap().contains("diversification cap"));
        assert!(env.trade_id.is_none());
    }

    #[test]
    fn hold_serialises_without_optional_fields() {
        let env = DecisionEnvelope::from_execution(1, "BTC", 1.0, &Decision::Hold, &ExecutionResult::Skipped);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["outcome"], "HOLD");
        assert_eq!(json["action"], "HOLD");
        assert!(json.get("rule").is_none());
        assert!(json.get("blocked_by").is_none());
    }

    #[test]
    fn insufficient_history_records_counts() {
        let env = DecisionEnvelope::insufficient_history(2, "AAPL", 180.0, 3, 30);
        assert_eq!(env.outcome, Outcome::InsufficientHistory);
        assert_eq!(env.blocked_by.as_deref(), Some("Insufficient history: 3 < 30 samples"));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["outcome"], "INSUFFICIENT_HISTORY");
    }
}
