//! Per-hypothesis critique loop
//!
//! ```text
//!   prime (first pass only): KeywordExtractor → graph + literature, cached
//!   Critic ──score < discard──▶ Discarded
//!     │ ────score ≥ accept or TERMINATE──▶ Accepted
//!     ▼
//!   Revision ──terminate──▶ Terminated
//!     │ neo4j:/pubmed:
//!     ▼
//!   Refine ──▶ next iteration, Exhausted after max_iterations
//! ```

use serde::Serialize;
use tracing::{debug, info};

use crate::agents::roles;
use crate::agents::Role;
use crate::graph::SubgraphRequest;
use crate::orchestrator::parsing::{self, RevisionDirective};
use crate::orchestrator::{Orchestrator, Transcript};
use crate::search::gather_evidence;
use crate::types::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    /// Scored at or above the accept threshold, or the Critic said TERMINATE
    Accepted,
    /// Scored below the discard threshold
    Discarded,
    /// Revision asked for no more information
    Terminated,
    /// Ran out of iterations
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct HypothesisOutcome {
    pub index: usize,
    pub original: String,
    pub final_text: String,
    pub verdict: Verdict,
    /// Completed Refine passes
    pub iterations: u32,
    pub last_score: Option<f64>,
    pub last_feedback: Option<String>,
}

impl HypothesisOutcome {
    pub fn survived(&self) -> bool {
        self.verdict != Verdict::Discarded
    }
}

/// Owned by exactly one loop
struct IterationState {
    hypothesis: String,
    kg_info: String,
    evidence: String,
    iteration: u32,
    last_score: Option<f64>,
    last_feedback: Option<String>,
}

impl IterationState {
    fn new(hypothesis: String) -> Self {
        Self {
            hypothesis,
            kg_info: String::new(),
            evidence: String::new(),
            iteration: 0,
            last_score: None,
            last_feedback: None,
        }
    }

    fn finish(self, index: usize, original: String, verdict: Verdict) -> HypothesisOutcome {
        HypothesisOutcome {
            index,
            original,
            final_text: self.hypothesis,
            verdict,
            iterations: self.iteration,
            last_score: self.last_score,
            last_feedback: self.last_feedback,
        }
    }
}

fn append(cache: &mut String, fresh: &str) {
    if !cache.is_empty() {
        cache.push('\n');
    }
    cache.push_str(fresh);
}

impl Orchestrator {
    pub(crate) async fn refine_hypothesis(
        &self,
        index: usize,
        hypothesis: String,
        transcript: &mut Transcript,
    ) -> AppResult<HypothesisOutcome> {
        let original = hypothesis.clone();
        let mut state = IterationState::new(hypothesis);
        let here = Some(index);

        while state.iteration < self.config.max_iterations {
            if state.iteration == 0 {
                self.prime(&mut state, index, transcript).await?;
            }

            let feedback = self
                .call(
                    Role::Critic,
                    &roles::critic_context(&state.hypothesis, &state.kg_info, &state.evidence),
                    transcript,
                    here,
                )
                .await?;
            let score = parsing::extract_score(&feedback);
            info!(hypothesis = index, iteration = state.iteration, score, "Critic evaluated hypothesis");
            state.last_score = Some(score);
            state.last_feedback = Some(feedback.clone());

            if score < self.config.discard_threshold {
                info!(hypothesis = index, score, "Hypothesis discarded");
                return Ok(state.finish(index, original, Verdict::Discarded));
            }
            if score >= self.config.accept_threshold || parsing::contains_terminate(&feedback) {
                info!(hypothesis = index, score, "Hypothesis accepted");
                return Ok(state.finish(index, original, Verdict::Accepted));
            }

            let revision = self
                .call(
                    Role::Revision,
                    &roles::revision_context(&feedback, &state.hypothesis),
                    transcript,
                    here,
                )
                .await?;
            let directive = parsing::parse_directive(&revision);
            debug!(hypothesis = index, directive = %directive, "Revision directive parsed");

            let new_info = match directive {
                RevisionDirective::Terminate => {
                    info!(hypothesis = index, "Revision requested termination");
                    return Ok(state.finish(index, original, Verdict::Terminated));
                }
                RevisionDirective::Graph(keywords) => {
                    let info = self.graph.get_subgraph(&SubgraphRequest::new(keywords)).await?;
                    transcript.record("KnowledgeGraph", here, &info);
                    append(&mut state.kg_info, &info);
                    info
                }
                RevisionDirective::Literature(keywords) => {
                    let info = gather_evidence(self.literature.as_ref(), &keywords, self.max_results).await?;
                    transcript.record("PubMed", here, &info);
                    append(&mut state.evidence, &info);
                    info
                }
            };

            state.hypothesis = self
                .call(
                    Role::Refine,
                    &roles::refine_context(&state.hypothesis, &new_info),
                    transcript,
                    here,
                )
                .await?;
            state.iteration += 1;
        }

        info!(hypothesis = index, iterations = state.iteration, "Iteration cap reached");
        Ok(state.finish(index, original, Verdict::Exhausted))
    }

    /// First-pass lookups, cached for every later Critic call
    async fn prime(&self, state: &mut IterationState, index: usize, transcript: &mut Transcript) -> AppResult<()> {
        let extracted = self
            .call(
                Role::KeywordExtractor,
                &roles::keyword_context(&state.hypothesis),
                transcript,
                Some(index),
            )
            .await?;
        let keywords = parsing::parse_keywords(&extracted);
        let fallback = parsing::first_two_words(&state.hypothesis);

        let graph_keyword = keywords.first().cloned().unwrap_or_else(|| fallback.clone());
        let kg_info = self.graph.get_subgraph(&SubgraphRequest::single(graph_keyword)).await?;
        transcript.record("KnowledgeGraph", Some(index), &kg_info);

        let search_keywords = if keywords.is_empty() {
            fallback.split_whitespace().map(str::to_string).collect()
        } else {
            keywords
        };
        let evidence = gather_evidence(self.literature.as_ref(), &search_keywords, self.max_results).await?;
        transcript.record("PubMed", Some(index), &evidence);

        state.kg_info = kg_info;
        state.evidence = evidence;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::orchestrator::testing::{EchoSearch, RecordingGraph, ScriptedRoles};
    use std::sync::Arc;

    const HYPOTHESIS: &str = "SNCA may affect Parkinson disease through protein aggregation";

    struct Harness {
        roles: Arc<ScriptedRoles>,
        graph: Arc<RecordingGraph>,
        search: Arc<EchoSearch>,
        orch: Orchestrator,
    }

    fn harness(roles: ScriptedRoles) -> Harness {
        let roles = Arc::new(roles);
        let graph = Arc::new(RecordingGraph::default());
        let search = Arc::new(EchoSearch::default());
        let orch = Orchestrator::new(roles.clone(), graph.clone(), search.clone(), PipelineConfig::default());
        Harness {
            roles,
            graph,
            search,
            orch,
        }
    }

    async fn refine(h: &Harness) -> HypothesisOutcome {
        let mut transcript = Transcript::new();
        h.orch
            .refine_hypothesis(0, HYPOTHESIS.to_string(), &mut transcript)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_score_exactly_three_is_not_discarded() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA")
                .reply(Role::Critic, "Overall Score: 3")
                .reply(Role::Revision, "terminate"),
        );
        let outcome = refine(&h).await;
        assert_eq!(outcome.verdict, Verdict::Terminated);
        assert_eq!(outcome.last_score, Some(3.0));
        assert_eq!(outcome.final_text, HYPOTHESIS);
    }

    #[tokio::test]
    async fn test_score_below_three_discards() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA")
                .reply(Role::Critic, "Overall Score: 2.9"),
        );
        let outcome = refine(&h).await;
        assert_eq!(outcome.verdict, Verdict::Discarded);
        assert!(!outcome.survived());
        assert_eq!(h.roles.count(Role::Revision), 0);
    }

    #[tokio::test]
    async fn test_missing_score_counts_as_zero() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA")
                .reply(Role::Critic, "Interesting idea."),
        );
        assert_eq!(refine(&h).await.verdict, Verdict::Discarded);
    }

    #[tokio::test]
    async fn test_score_exactly_nine_accepts() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA")
                .reply(Role::Critic, "Overall Score: 9"),
        );
        let outcome = refine(&h).await;
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.iterations, 0);
    }

    #[tokio::test]
    async fn test_terminate_in_feedback_accepts() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA")
                .reply(Role::Critic, "Overall Score: 6\nGood enough. Terminate."),
        );
        assert_eq!(refine(&h).await.verdict, Verdict::Accepted);
        assert_eq!(h.roles.count(Role::Revision), 0);
    }

    #[tokio::test]
    async fn test_exhausts_after_three_iterations_keeping_last_refine() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA, LRRK2")
                .reply(Role::Critic, "Overall Score: 6")
                .reply(Role::Revision, "pubmed:alpha-synuclein")
                .reply(Role::Refine, "refined 1")
                .reply(Role::Refine, "refined 2")
                .reply(Role::Refine, "refined 3"),
        );
        let outcome = refine(&h).await;
        assert_eq!(outcome.verdict, Verdict::Exhausted);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.final_text, "refined 3");
        assert_eq!(outcome.original, HYPOTHESIS);
        assert_eq!(h.roles.count(Role::Critic), 3);
        assert_eq!(h.roles.count(Role::Refine), 3);
        // priming happens once
        assert_eq!(h.roles.count(Role::KeywordExtractor), 1);
    }

    #[tokio::test]
    async fn test_priming_uses_first_keyword_and_all_keywords() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA, LRRK2")
                .reply(Role::Critic, "Overall Score: 9"),
        );
        refine(&h).await;
        assert_eq!(h.graph.requests()[0].keywords, vec!["SNCA".to_string()]);
        assert_eq!(h.search.terms(), vec!["SNCA LRRK2"]);
    }

    #[tokio::test]
    async fn test_priming_falls_back_to_first_two_words() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "disease, research")
                .reply(Role::Critic, "Overall Score: 9"),
        );
        refine(&h).await;
        assert_eq!(h.graph.requests()[0].keywords, vec!["SNCA may".to_string()]);
        assert_eq!(h.search.terms(), vec!["SNCA may"]);
    }

    #[tokio::test]
    async fn test_graph_directive_appends_and_feeds_refine() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA")
                .reply(Role::Critic, "Overall Score: 5")
                .reply(Role::Critic, "Overall Score: 9.2")
                .reply(Role::Revision, "neo4j:BRCA1,TP53")
                .reply(Role::Refine, "SNCA may affect PD via TP53 signaling"),
        );
        let outcome = refine(&h).await;
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.final_text, "SNCA may affect PD via TP53 signaling");

        let requests = h.graph.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].keywords, vec!["BRCA1".to_string(), "TP53".to_string()]);

        let calls = h.roles.calls();
        let refine_ctx = &calls.iter().find(|(r, _)| *r == Role::Refine).unwrap().1;
        assert!(refine_ctx.contains("BRCA1+TP53"));
        // second critique sees the original lookup and the appended one
        let critic_ctx = &calls.iter().filter(|(r, _)| *r == Role::Critic).nth(1).unwrap().1;
        assert!(critic_ctx.contains("SNCA --[disease_protein]--> SNCA\nBRCA1+TP53"));
    }

    #[tokio::test]
    async fn test_literature_directive_appends_evidence() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA, LRRK2")
                .reply(Role::Critic, "Overall Score: 5")
                .reply(Role::Critic, "Overall Score: 9")
                .reply(Role::Revision, "pubmed:alpha-synuclein")
                .reply(Role::Refine, "SNCA may affect PD via alpha-synuclein oligomers"),
        );
        let outcome = refine(&h).await;
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(h.search.terms(), vec!["SNCA LRRK2", "alpha-synuclein"]);

        let calls = h.roles.calls();
        let refine_ctx = &calls.iter().find(|(r, _)| *r == Role::Refine).unwrap().1;
        assert!(refine_ctx.contains("Study of alpha-synuclein"));
        assert!(!refine_ctx.contains("Study of SNCA LRRK2"));

        // second critique keeps the primed articles and adds the new ones after them
        let critic_ctx = &calls.iter().filter(|(r, _)| *r == Role::Critic).nth(1).unwrap().1;
        let primed = critic_ctx.find("Study of SNCA LRRK2").unwrap();
        let fresh = critic_ctx.find("Study of alpha-synuclein").unwrap();
        assert!(primed < fresh);
    }

    #[tokio::test]
    async fn test_garbage_revision_terminates() {
        let h = harness(
            ScriptedRoles::new()
                .reply(Role::KeywordExtractor, "SNCA")
                .reply(Role::Critic, "Overall Score: 7")
                .reply(Role::Revision, "I am not sure what to do."),
        );
        let outcome = refine(&h).await;
        assert_eq!(outcome.verdict, Verdict::Terminated);
        assert!(outcome.survived());
        assert_eq!(h.roles.count(Role::Refine), 0);
    }
}
