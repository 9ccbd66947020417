//! Process-wide generation configuration.
//!
//! Constructed once at startup and passed by reference into the
//! classifier and orchestrator. Immutable after construction; safe to
//! share across concurrent requests.

/// Token/timeout budget for one class of LLM call.
#[derive(Debug, Clone, Copy)]
pub struct CallBudget {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_s: f64,
}

/// Tuning knobs for the classifier ensemble and the orchestrator.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Weight of the LLM scorer in the candidate merge
    pub llm_weight: f64,

    /// Weight of the rule-based scorer in the candidate merge
    pub rule_weight: f64,

    /// Bonus added when two or more sources agree on a type (capped at 1.0)
    pub consensus_bonus: f64,

    /// Cap on the rule-based candidate list
    pub max_rule_candidates: usize,

    /// Outer retry count for resilient JSON calls
    pub llm_retries: u32,

    /// Linear backoff base in seconds (`backoff * attempt` between retries)
    pub llm_backoff_s: f64,

    /// Budget for classifier rubric calls
    pub router_budget: CallBudget,

    /// Budget for single-question generation calls
    pub single_budget: CallBudget,

    /// Budget for multi-question set generation calls
    ///
    /// Sets are more failure-prone and costlier to retry, so they run
    /// under tighter limits.
    pub set_budget: CallBudget,

    /// Budget for quote-mode generation calls
    pub quote_budget: CallBudget,

    /// Budget for the passage semantic-repair call
    pub repair_budget: CallBudget,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            llm_weight: 0.55,
            rule_weight: 0.45,
            consensus_bonus: 0.08,
            max_rule_candidates: 12,
            llm_retries: 2,
            llm_backoff_s: 0.8,
            router_budget: CallBudget {
                temperature: 0.2,
                max_tokens: 600,
                timeout_s: 30.0,
            },
            single_budget: CallBudget {
                temperature: 0.2,
                max_tokens: 1500,
                timeout_s: 18.0,
            },
            set_budget: CallBudget {
                temperature: 0.2,
                max_tokens: 1000,
                timeout_s: 16.0,
            },
            quote_budget: CallBudget {
                temperature: 0.2,
                max_tokens: 1200,
                timeout_s: 18.0,
            },
            repair_budget: CallBudget {
                temperature: 0.0,
                max_tokens: 2000,
                timeout_s: 30.0,
            },
        }
    }
}

impl GenerationConfig {
    /// Set the outer retry count for resilient JSON calls.
    pub fn with_llm_retries(mut self, retries: u32) -> Self {
        self.llm_retries = retries;
        self
    }

    /// Set the linear backoff base.
    pub fn with_backoff_s(mut self, backoff_s: f64) -> Self {
        self.llm_backoff_s = backoff_s;
        self
    }
}
