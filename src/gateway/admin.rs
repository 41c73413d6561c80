use std::sync::{Arc, PoisonError, RwLock};

use super::guardrails::GuardrailsConfig;
use super::limits::RateLimitPlan;

/// Per-request view of the admin-settable values. Each field is an immutable
/// handle published by a writer; a request takes one snapshot at entry and
/// never observes a mid-flight change.
#[derive(Clone)]
pub struct ControlSnapshot {
    pub system_prompt: Arc<String>,
    pub guardrails: Arc<GuardrailsConfig>,
    pub plan: Option<Arc<RateLimitPlan>>,
}

/// Process-wide mutable configuration. Writers swap whole handles; readers
/// only ever clone an `Arc` under a briefly-held lock.
pub struct AdminState {
    system_prompt: RwLock<Arc<String>>,
    guardrails: RwLock<Arc<GuardrailsConfig>>,
    plan: RwLock<Option<Arc<RateLimitPlan>>>,
}

impl AdminState {
    pub fn new(
        system_prompt: String,
        guardrails: GuardrailsConfig,
        plan: Option<RateLimitPlan>,
    ) -> Self {
        Self {
            system_prompt: RwLock::new(Arc::new(system_prompt)),
            guardrails: RwLock::new(Arc::new(guardrails)),
            plan: RwLock::new(plan.map(Arc::new)),
        }
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            system_prompt: self.system_prompt(),
            guardrails: self.guardrails(),
            plan: self.plan(),
        }
    }

    pub fn system_prompt(&self) -> Arc<String> {
        self.system_prompt
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_system_prompt(&self, prompt: String) {
        *self
            .system_prompt
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(prompt);
    }

    pub fn guardrails(&self) -> Arc<GuardrailsConfig> {
        self.guardrails
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_guardrails(&self, guardrails: GuardrailsConfig) {
        *self
            .guardrails
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(guardrails);
    }

    pub fn plan(&self) -> Option<Arc<RateLimitPlan>> {
        self.plan
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_plan(&self, plan: Option<RateLimitPlan>) {
        *self.plan.write().unwrap_or_else(PoisonError::into_inner) = plan.map(Arc::new);
    }
}
