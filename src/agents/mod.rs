//! Agent Roles
//!
//! Every role is a pure function from `(role instructions, context)` to generated text. The
//! orchestrator owns all history and passes it in explicitly as context; roles keep no state.
//!
//! ## Role Line-up
//!
//! ```text
//! Planner ─▶ Explorer ─▶ Ontologist ─▶ Scientist
//!                                          │
//!             ┌────────────────────────────┘
//!             ▼            (per hypothesis)
//!      KeywordExtractor ─▶ Critic ─▶ Revision ─▶ Refine ─┐
//!                            ▲                           │
//!                            └───────────────────────────┘
//!                                          │
//!                                          ▼
//!                                       Decision
//! ```
//!
//! The group-chat variant additionally uses the HypothesisExpander.

pub mod invoker;
pub mod roles;

pub use invoker::LlmRoleInvoker;
pub use roles::RoleSpec;

use crate::types::AppResult;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    Planner,
    Explorer,
    Ontologist,
    Scientist,
    KeywordExtractor,
    Critic,
    Revision,
    Refine,
    Decision,
    HypothesisExpander,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Planner => "PlannerAgent",
            Role::Explorer => "DiseaseExplorerAgent",
            Role::Ontologist => "Ontologist",
            Role::Scientist => "ScientistAgent",
            Role::KeywordExtractor => "KeywordExtractorAgent",
            Role::Critic => "CriticAgent",
            Role::Revision => "RevisionAgent",
            Role::Refine => "RefineAgent",
            Role::Decision => "DecisionAgent",
            Role::HypothesisExpander => "HypothesisAgent",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The language-model seam. Implementations must not keep per-call state.
#[async_trait]
pub trait RoleInvoker: Send + Sync {
    async fn invoke(&self, role: Role, context: &str) -> AppResult<String>;
}
