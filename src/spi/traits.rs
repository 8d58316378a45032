use crate::api::config::{EngineConfig, RuleDef};
use crate::api::error::EngineError;
use crate::api::types::Finding;
use crate::core::fact_index::FactIndex;

/// A single rule implementation. Extension authors implement this trait and
/// register it via [`crate::core::rule_registry::RuleRegistry::with_extra`].
pub trait Rule: Send + Sync {
    /// Canonical base id this rule publishes, e.g. `"arch.forbiddenRoleDependencies"`.
    fn base_id(&self) -> &'static str;

    /// Human-readable display name.
    fn display_name(&self) -> &'static str {
        self.base_id()
    }

    /// Evaluate this rule for one instance (already role-scoped, if
    /// applicable) against the fact index. Rules must not mutate `facts`
    /// and must not perform I/O.
    fn evaluate(
        &self,
        facts: &FactIndex,
        def: &RuleDef,
        config: &EngineConfig,
    ) -> Result<Vec<Finding>, RuleFailure>;
}

/// A rule's evaluation failure: either its params were invalid, or something
/// unexpected happened mid-evaluation. Both are non-fatal to the run.
#[derive(Debug, Clone)]
pub enum RuleFailure {
    /// Params failed a runtime constraint check; maps to `RuleParamError`.
    Param(String),
    /// Unexpected failure during evaluation; maps to `RuleExecutionFailed`.
    Execution(String),
}

impl From<RuleFailure> for EngineError {
    fn from(f: RuleFailure) -> Self {
        use crate::api::error::EngineErrorKind;
        match f {
            RuleFailure::Param(msg) => EngineError::new(EngineErrorKind::RuleParamError, msg),
            RuleFailure::Execution(msg) => EngineError::new(EngineErrorKind::RuleExecutionFailed, msg),
        }
    }
}
