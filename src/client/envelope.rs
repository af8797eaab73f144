use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::class::{RequestClass, TimeoutTiers};
use crate::scheduler::PriorityClass;

/// A typed request ready for dispatch. Fields are fixed once built.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    id: Uuid,
    priority: PriorityClass,
    class: RequestClass,
    payload: Value,
    submitted_at: DateTime<Utc>,
    timeout_budget: Duration,
}

impl RequestEnvelope {
    /// Envelope with the class's default priority and tier budget.
    pub fn new(class: RequestClass, payload: Value, tiers: &TimeoutTiers) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority: class.default_priority(),
            class,
            payload,
            submitted_at: Utc::now(),
            timeout_budget: tiers.budget(class.tier()),
        }
    }

    pub fn with_priority(mut self, priority: PriorityClass) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.timeout_budget = budget;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn priority(&self) -> PriorityClass {
        self.priority
    }

    pub fn class(&self) -> RequestClass {
        self.class
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn timeout_budget(&self) -> Duration {
        self.timeout_budget
    }
}
