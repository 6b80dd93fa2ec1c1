//! Group-chat variant
//!
//! A manager reacts to each posted message with exactly one action. Legal moves live in
//! [`TRANSITIONS`]; a `(state, speaker)` pair missing from the table is ignored.
//!
//! ```text
//! Planner → Ontologist → Scientist ─┬─ non-compliant ─▶ Scientist (retry) … ─▶ halt
//!                                   ├─ no entities ───▶ HypothesisExpander
//!                                   └─ entities ──────▶ lookup × n ─▶ HypothesisExpander
//! HypothesisExpander → Critic → done
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};

use crate::agents::roles;
use crate::agents::Role;
use crate::graph::SubgraphRequest;
use crate::orchestrator::{parsing, Orchestrator, PipelineStatus, Transcript, SCIENTIST_FAILURE};
use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChatState {
    AwaitingPlan,
    AwaitingDefinitions,
    AwaitingHypotheses,
    AwaitingLookup,
    AwaitingExpansion,
    AwaitingCritique,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Planner,
    Ontologist,
    Scientist,
    /// Result of a related-entity lookup
    Tool,
    HypothesisExpander,
    Critic,
}

impl Speaker {
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Planner => Some(Speaker::Planner),
            Role::Ontologist => Some(Speaker::Ontologist),
            Role::Scientist => Some(Speaker::Scientist),
            Role::HypothesisExpander => Some(Speaker::HypothesisExpander),
            Role::Critic => Some(Speaker::Critic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    AskOntologist,
    AskScientist,
    ReviewHypotheses,
    RecordLookup,
    AskCritic,
    Conclude,
}

const TRANSITIONS: &[(ChatState, Speaker, Transition)] = &[
    (ChatState::AwaitingPlan, Speaker::Planner, Transition::AskOntologist),
    (ChatState::AwaitingDefinitions, Speaker::Ontologist, Transition::AskScientist),
    (ChatState::AwaitingHypotheses, Speaker::Scientist, Transition::ReviewHypotheses),
    (ChatState::AwaitingLookup, Speaker::Tool, Transition::RecordLookup),
    (ChatState::AwaitingExpansion, Speaker::HypothesisExpander, Transition::AskCritic),
    (ChatState::AwaitingCritique, Speaker::Critic, Transition::Conclude),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Ask { role: Role, context: String },
    LookupRelated { entity: String },
    Finish { status: PipelineStatus, text: String },
}

pub struct GroupChatManager {
    state: ChatState,
    query: String,
    kg_summary: String,
    expected: usize,
    max_attempts: u32,
    scientist_attempts: u32,
    scientist_context: String,
    hypotheses: String,
    pending: VecDeque<String>,
    in_flight: Option<String>,
    related: BTreeMap<String, String>,
    expanded: String,
}

impl GroupChatManager {
    pub fn new(query: &str, kg_summary: &str, expected: usize, max_attempts: u32) -> Self {
        Self {
            state: ChatState::AwaitingPlan,
            query: query.to_string(),
            kg_summary: kg_summary.to_string(),
            expected,
            max_attempts,
            scientist_attempts: 0,
            scientist_context: String::new(),
            hypotheses: String::new(),
            pending: VecDeque::new(),
            in_flight: None,
            related: BTreeMap::new(),
            expanded: String::new(),
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Opening move: the Planner speaks first
    pub fn start(&mut self) -> Action {
        self.state = ChatState::AwaitingPlan;
        Action::Ask {
            role: Role::Planner,
            context: roles::planner_context(&self.query),
        }
    }

    pub fn on_message(&mut self, speaker: Speaker, content: &str) -> Option<Action> {
        let Some(transition) = TRANSITIONS
            .iter()
            .find(|(state, from, _)| *state == self.state && *from == speaker)
            .map(|(_, _, transition)| *transition)
        else {
            debug!(state = ?self.state, speaker = ?speaker, "No transition, message ignored");
            return None;
        };

        let action = match transition {
            Transition::AskOntologist => {
                self.state = ChatState::AwaitingDefinitions;
                Action::Ask {
                    role: Role::Ontologist,
                    context: format!(
                        "Execution Plan:\n{}\n\n{}",
                        content,
                        roles::ontologist_context(&self.kg_summary)
                    ),
                }
            }
            Transition::AskScientist => {
                self.state = ChatState::AwaitingHypotheses;
                self.scientist_context = roles::scientist_context(&self.kg_summary, content, self.expected);
                Action::Ask {
                    role: Role::Scientist,
                    context: self.scientist_context.clone(),
                }
            }
            Transition::ReviewHypotheses => self.review_hypotheses(content),
            Transition::RecordLookup => {
                if let Some(entity) = self.in_flight.take() {
                    self.related.insert(entity, content.to_string());
                }
                self.next_lookup()
            }
            Transition::AskCritic => {
                self.state = ChatState::AwaitingCritique;
                self.expanded = content.to_string();
                Action::Ask {
                    role: Role::Critic,
                    context: roles::group_critic_context(content),
                }
            }
            Transition::Conclude => {
                self.state = ChatState::Finished;
                Action::Finish {
                    status: PipelineStatus::Completed,
                    text: format!("{}\n\n{}", self.expanded, content),
                }
            }
        };

        Some(action)
    }

    fn review_hypotheses(&mut self, content: &str) -> Action {
        self.scientist_attempts += 1;

        if parsing::has_terminal_enumerator(content, self.expected) {
            self.hypotheses = content.to_string();
            self.pending = parsing::extract_entities(content).into();
            info!(entities = self.pending.len(), "Scientist complied");
            return self.next_lookup();
        }

        if self.scientist_attempts < self.max_attempts {
            info!(attempt = self.scientist_attempts + 1, "Re-asking Scientist");
            return Action::Ask {
                role: Role::Scientist,
                context: roles::scientist_retry_context(&self.scientist_context, content, self.expected),
            };
        }

        warn!(attempts = self.scientist_attempts, "Scientist failed to comply");
        self.state = ChatState::Finished;
        Action::Finish {
            status: PipelineStatus::Halted,
            text: SCIENTIST_FAILURE.to_string(),
        }
    }

    fn next_lookup(&mut self) -> Action {
        if let Some(entity) = self.pending.pop_front() {
            self.state = ChatState::AwaitingLookup;
            self.in_flight = Some(entity.clone());
            return Action::LookupRelated { entity };
        }

        self.state = ChatState::AwaitingExpansion;
        let entity_map = if self.related.is_empty() {
            "(no entities found, no lookups performed)".to_string()
        } else {
            serde_json::to_string_pretty(&self.related).unwrap_or_default()
        };
        Action::Ask {
            role: Role::HypothesisExpander,
            context: roles::expander_context(&self.hypotheses, &entity_map),
        }
    }
}

impl Orchestrator {
    /// Run the manager against the live roles and graph until it finishes
    pub(crate) async fn run_group_chat(
        &self,
        query: &str,
        transcript: &mut Transcript,
    ) -> AppResult<(PipelineStatus, String)> {
        let seed = parsing::query_keywords(query);
        let kg_summary = self.graph.get_subgraph(&SubgraphRequest::new(seed)).await?;
        transcript.record("KnowledgeGraph", None, &kg_summary);

        let mut manager = GroupChatManager::new(
            query,
            &kg_summary,
            self.config.variant.hypothesis_count(),
            self.config.scientist_max_attempts,
        );
        let mut action = manager.start();

        loop {
            let (speaker, message) = match action {
                Action::Ask { role, context } => {
                    let reply = self.call(role, &context, transcript, None).await?;
                    let speaker = Speaker::for_role(role)
                        .ok_or_else(|| AppError::Internal(format!("{} cannot speak in the group chat", role)))?;
                    (speaker, reply)
                }
                Action::LookupRelated { entity } => {
                    debug!(entity = %entity, "Looking up related entities");
                    let related = self.graph.get_subgraph(&SubgraphRequest::single(entity.as_str())).await?;
                    transcript.record("KnowledgeGraph", None, &related);
                    (Speaker::Tool, related)
                }
                Action::Finish { status, text } => {
                    let closing = match status {
                        PipelineStatus::Completed => roles::TERMINATE_TOKEN,
                        PipelineStatus::Halted => SCIENTIST_FAILURE,
                    };
                    transcript.record("GroupChatManager", None, closing);
                    return Ok((status, text));
                }
            };

            action = manager.on_message(speaker, &message).ok_or_else(|| {
                AppError::Internal(format!("Group chat stalled in state {:?}", manager.state()))
            })?;
        }
    }
}
