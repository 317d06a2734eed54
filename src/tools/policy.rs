//! Pure, stateless tool-execution policy.
//!
//! This is a narrow rewrite of the decision rule at the heart of the
//! original implementation's `core/policy.py::ToolPolicy`. It intentionally
//! does not carry the teacher's much richer `security::SecurityPolicy`
//! (autonomy levels, rate limiting, shell-injection detection, audit log) —
//! that machinery is repurposed at the tool level instead (see
//! `tools::local::fs` for the path-containment check it grounds), because
//! the gateway's contract calls for a pure `evaluate(tool_name, risk)`
//! function with no side effects and no mutable state.

use std::collections::HashSet;

use super::traits::RiskLevel;

/// What the gateway should do with a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Confirm,
    Deny,
}

/// A policy decision together with the reason a human or log line would want.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub reason: String,
}

impl PolicyDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Allow,
            reason: reason.into(),
        }
    }
    fn confirm(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Confirm,
            reason: reason.into(),
        }
    }
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: reason.into(),
        }
    }
}

/// Evaluates a tool call against operator-configured overrides, falling
/// back to a risk-level default. Dangerous tools are denied by default on
/// purpose — lifting that requires an explicit operator action (adding the
/// tool to `confirm_tools`, never a code change in the runtime itself).
#[derive(Debug, Clone, Default)]
pub struct ToolPolicy {
    confirm_tools: HashSet<String>,
    deny_tools: HashSet<String>,
}

impl ToolPolicy {
    pub fn new(confirm_tools: impl IntoIterator<Item = String>, deny_tools: impl IntoIterator<Item = String>) -> Self {
        Self {
            confirm_tools: confirm_tools.into_iter().collect(),
            deny_tools: deny_tools.into_iter().collect(),
        }
    }

    /// Evaluate `tool_name`/`risk` in the order spec.md mandates: an
    /// explicit deny-list entry wins first, then an explicit confirm-list
    /// entry, and only then the risk-level default.
    pub fn evaluate(&self, tool_name: &str, risk: RiskLevel) -> PolicyDecision {
        if self.deny_tools.contains(tool_name) {
            return PolicyDecision::deny("Tool is blocked by policy");
        }
        if self.confirm_tools.contains(tool_name) {
            return PolicyDecision::confirm("Tool requires confirmation");
        }
        match risk {
            RiskLevel::Safe => PolicyDecision::allow("Safe tool"),
            RiskLevel::Confirm => PolicyDecision::confirm("Tool requires confirmation"),
            RiskLevel::Dangerous => PolicyDecision::deny("Tool is dangerous by default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_deny_wins_regardless_of_risk() {
        let policy = ToolPolicy::new([], ["shell.exec".to_string()]);
        for risk in [RiskLevel::Safe, RiskLevel::Confirm, RiskLevel::Dangerous] {
            assert_eq!(policy.evaluate("shell.exec", risk).decision, Decision::Deny);
        }
    }

    #[test]
    fn explicit_confirm_wins_over_risk_default() {
        let policy = ToolPolicy::new(["web.search".to_string()], []);
        for risk in [RiskLevel::Safe, RiskLevel::Confirm, RiskLevel::Dangerous] {
            assert_eq!(policy.evaluate("web.search", risk).decision, Decision::Confirm);
        }
    }

    #[test]
    fn risk_based_default_matrix() {
        let policy = ToolPolicy::default();
        assert_eq!(policy.evaluate("x", RiskLevel::Safe).decision, Decision::Allow);
        assert_eq!(policy.evaluate("x", RiskLevel::Confirm).decision, Decision::Confirm);
        assert_eq!(policy.evaluate("x", RiskLevel::Dangerous).decision, Decision::Deny);
    }
}
