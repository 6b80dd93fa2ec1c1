//! Orchestration
//!
//! Drives the roles through a fixed sequence of stages:
//!
//! ```text
//! Planning → Exploring → Defining → Hypothesizing → Refining (per hypothesis) → Deciding → Done
//! ```
//!
//! Every role call, graph lookup and literature search is awaited before the next one starts.
//! The group-chat variant swaps the fixed sequence for an event-driven manager, see
//! [`group_chat`].

pub mod group_chat;
pub mod parsing;
pub mod refine;

pub use group_chat::{Action, ChatState, GroupChatManager, Speaker};
pub use parsing::RevisionDirective;
pub use refine::{HypothesisOutcome, Verdict};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agents::roles;
use crate::agents::{Role, RoleInvoker};
use crate::config::{PipelineConfig, PipelineVariant};
use crate::graph::{GraphQuery, SubgraphRequest};
use crate::search::LiteratureSearch;
use crate::types::AppResult;

/// Terminal message when the Scientist never produces the requested enumeration
pub const SCIENTIST_FAILURE: &str = "Scientist failed to comply. Terminating.\nTERMINATE";

/// Decision input when every hypothesis was discarded
pub const NO_SURVIVORS: &str = "(no hypotheses survived refinement)";

const DEFAULT_MAX_RESULTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Planning,
    Exploring,
    Defining,
    Hypothesizing,
    Refining,
    Deciding,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Planning => "planning",
            PipelineStage::Exploring => "exploring",
            PipelineStage::Defining => "defining",
            PipelineStage::Hypothesizing => "hypothesizing",
            PipelineStage::Refining => "refining",
            PipelineStage::Deciding => "deciding",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStatus {
    Completed,
    /// Stopped on a policy violation, not an error
    Halted,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub speaker: String,
    /// Index of the hypothesis whose loop produced this turn
    pub hypothesis: Option<usize>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Every role turn and tool result of a run, in order
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, speaker: impl Into<String>, hypothesis: Option<usize>, content: &str) {
        self.entries.push(TranscriptEntry {
            speaker: speaker.into(),
            hypothesis,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_by(&self, speaker: &str) -> usize {
        self.entries.iter().filter(|e| e.speaker == speaker).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub query: String,
    pub variant: PipelineVariant,
    pub status: PipelineStatus,
    pub final_text: String,
    pub hypotheses: Vec<HypothesisOutcome>,
    pub transcript: Transcript,
}

pub struct Orchestrator {
    roles: Arc<dyn RoleInvoker>,
    graph: Arc<dyn GraphQuery>,
    literature: Arc<dyn LiteratureSearch>,
    config: PipelineConfig,
    max_results: u32,
}

impl Orchestrator {
    pub fn new(
        roles: Arc<dyn RoleInvoker>,
        graph: Arc<dyn GraphQuery>,
        literature: Arc<dyn LiteratureSearch>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            roles,
            graph,
            literature,
            config,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Articles requested per PubMed search
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, query: &str) -> AppResult<PipelineReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", run_id = %run_id, variant = ?self.config.variant);

        self.execute(run_id, query).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, query: &str) -> AppResult<PipelineReport> {
        info!(query = %query, "Starting pipeline run");
        let mut transcript = Transcript::new();

        let (status, final_text, hypotheses) = match self.config.variant {
            PipelineVariant::GroupChat => {
                let (status, text) = self.run_group_chat(query, &mut transcript).await?;
                (status, text, Vec::new())
            }
            PipelineVariant::Lightweight | PipelineVariant::Extended => {
                self.run_sequential(query, &mut transcript).await?
            }
        };

        info!(status = ?status, turns = transcript.len(), "Pipeline run finished");
        Ok(PipelineReport {
            run_id,
            query: query.to_string(),
            variant: self.config.variant,
            status,
            final_text,
            hypotheses,
            transcript,
        })
    }

    async fn run_sequential(
        &self,
        query: &str,
        transcript: &mut Transcript,
    ) -> AppResult<(PipelineStatus, String, Vec<HypothesisOutcome>)> {
        let count = self.config.variant.hypothesis_count();

        enter(PipelineStage::Planning);
        let plan = self
            .call(Role::Planner, &roles::planner_context(query), transcript, None)
            .await?;

        enter(PipelineStage::Exploring);
        let explorer_output = self
            .call(Role::Explorer, &roles::explorer_context(query, &plan), transcript, None)
            .await?;
        let seed_keywords = parsing::explorer_keywords(&explorer_output, query);
        let kg_summary = self.graph.get_subgraph(&SubgraphRequest::new(seed_keywords)).await?;
        transcript.record("KnowledgeGraph", None, &kg_summary);

        enter(PipelineStage::Defining);
        let definitions = self
            .call(Role::Ontologist, &roles::ontologist_context(&kg_summary), transcript, None)
            .await?;

        enter(PipelineStage::Hypothesizing);
        let base_context = roles::scientist_context(&kg_summary, &definitions, count);
        let Some(scientist_output) = self.ask_scientist(&base_context, count, transcript).await? else {
            return Ok((PipelineStatus::Halted, SCIENTIST_FAILURE.to_string(), Vec::new()));
        };
        let mut candidates = parsing::split_hypotheses(&scientist_output);
        if candidates.len() > count {
            debug!(found = candidates.len(), expected = count, "Dropping surplus hypotheses");
            candidates.truncate(count);
        }

        enter(PipelineStage::Refining);
        let mut outcomes = Vec::with_capacity(candidates.len());
        for (index, hypothesis) in candidates.into_iter().enumerate() {
            outcomes.push(self.refine_hypothesis(index, hypothesis, transcript).await?);
        }

        enter(PipelineStage::Deciding);
        let last_feedback = outcomes
            .iter()
            .rev()
            .find_map(|o| o.last_feedback.clone())
            .unwrap_or_default();
        let survivors: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.survived())
            .map(|o| o.final_text.as_str())
            .collect();
        let joined = if survivors.is_empty() {
            warn!("No hypotheses survived refinement");
            NO_SURVIVORS.to_string()
        } else {
            survivors.join("\n")
        };
        let decision = self
            .call(Role::Decision, &roles::decision_context(&last_feedback, &joined), transcript, None)
            .await?;

        enter(PipelineStage::Done);
        Ok((PipelineStatus::Completed, decision, outcomes))
    }

    /// Ask until the terminal enumerator shows up. `None` once the attempt cap is spent.
    async fn ask_scientist(
        &self,
        base_context: &str,
        count: usize,
        transcript: &mut Transcript,
    ) -> AppResult<Option<String>> {
        let mut output = self.call(Role::Scientist, base_context, transcript, None).await?;
        let mut attempts = 1;

        while !parsing::has_terminal_enumerator(&output, count) {
            if attempts >= self.config.scientist_max_attempts {
                warn!(attempts, expected = count, "Scientist failed to comply");
                return Ok(None);
            }
            info!(attempt = attempts + 1, expected = count, "Re-asking Scientist");
            let retry = roles::scientist_retry_context(base_context, &output, count);
            output = self.call(Role::Scientist, &retry, transcript, None).await?;
            attempts += 1;
        }

        Ok(Some(output))
    }

    /// Invoke a role and record the turn
    async fn call(
        &self,
        role: Role,
        context: &str,
        transcript: &mut Transcript,
        hypothesis: Option<usize>,
    ) -> AppResult<String> {
        let reply = self.roles.invoke(role, context).await?;
        debug!(role = %role, reply_len = reply.len(), "Role replied");
        transcript.record(role.name(), hypothesis, &reply);
        Ok(reply)
    }
}

fn enter(stage: PipelineStage) {
    info!(stage = %stage, "Entering stage");
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory collaborators

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::agents::{Role, RoleInvoker};
    use crate::graph::{GraphQuery, SubgraphRequest};
    use crate::search::{ArticleRecord, LiteratureSearch};
    use crate::types::{AppError, AppResult};

    /// Replies from per-role queues. The last reply of a queue repeats once it runs dry.
    #[derive(Default)]
    pub struct ScriptedRoles {
        replies: Mutex<HashMap<Role, VecDeque<String>>>,
        calls: Mutex<Vec<(Role, String)>>,
    }

    impl ScriptedRoles {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, role: Role, text: &str) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(role)
                .or_default()
                .push_back(text.to_string());
            self
        }

        pub fn calls(&self) -> Vec<(Role, String)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, role: Role) -> usize {
            self.calls.lock().unwrap().iter().filter(|(r, _)| *r == role).count()
        }
    }

    #[async_trait]
    impl RoleInvoker for ScriptedRoles {
        async fn invoke(&self, role: Role, context: &str) -> AppResult<String> {
            self.calls.lock().unwrap().push((role, context.to_string()));
            let mut replies = self.replies.lock().unwrap();
            let queue = replies
                .get_mut(&role)
                .ok_or_else(|| AppError::Internal(format!("no scripted reply for {}", role)))?;
            if queue.len() > 1 {
                Ok(queue.pop_front().unwrap_or_default())
            } else {
                Ok(queue.front().cloned().unwrap_or_default())
            }
        }
    }

    /// Echoes the requested keywords and records every request
    #[derive(Default)]
    pub struct RecordingGraph {
        requests: Mutex<Vec<SubgraphRequest>>,
    }

    impl RecordingGraph {
        pub fn requests(&self) -> Vec<SubgraphRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GraphQuery for RecordingGraph {
        async fn get_subgraph(&self, request: &SubgraphRequest) -> AppResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(format!("{} --[disease_protein]--> SNCA", request.keywords.join("+")))
        }
    }

    /// One article per searched term
    #[derive(Default)]
    pub struct EchoSearch {
        terms: Mutex<Vec<String>>,
    }

    impl EchoSearch {
        pub fn terms(&self) -> Vec<String> {
            self.terms.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LiteratureSearch for EchoSearch {
        async fn search_keyword(&self, term: &str, _max_results: u32) -> AppResult<Vec<ArticleRecord>> {
            self.terms.lock().unwrap().push(term.to_string());
            Ok(vec![ArticleRecord {
                id: "1".to_string(),
                title: format!("Study of {}", term),
                abstract_text: "Abstract".to_string(),
                pub_date: "2023-01-01".to_string(),
                url: "https://pubmed.ncbi.nlm.nih.gov/1/".to_string(),
            }])
        }
    }
}
