//! Role instructions and context builders
//!
//! Instructions are the fixed system prompt of a role. The `*_context` builders assemble the
//! per-call input from whatever the orchestrator has accumulated so far.

use crate::agents::Role;

/// Output budget for roles working from short inputs
const BASE_MAX_TOKENS: u32 = 1024;
/// Output budget for roles that read graph summaries or evidence
const GRAPH_MAX_TOKENS: u32 = 2000;
const CRITIC_MAX_TOKENS: u32 = 1500;

/// Token that ends a conversation when a role emits it
pub const TERMINATE_TOKEN: &str = "TERMINATE";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleSpec {
    pub role: Role,
    pub instructions: &'static str,
    pub max_tokens: u32,
}

impl RoleSpec {
    pub fn for_role(role: Role) -> Self {
        let (instructions, max_tokens) = match role {
            Role::Planner => (PLANNER, BASE_MAX_TOKENS),
            Role::Explorer => (EXPLORER, GRAPH_MAX_TOKENS),
            Role::Ontologist => (ONTOLOGIST, BASE_MAX_TOKENS),
            Role::Scientist => (SCIENTIST, GRAPH_MAX_TOKENS),
            Role::KeywordExtractor => (KEYWORD_EXTRACTOR, BASE_MAX_TOKENS),
            Role::Critic => (CRITIC, CRITIC_MAX_TOKENS),
            Role::Revision => (REVISION, BASE_MAX_TOKENS),
            Role::Refine => (REFINE, GRAPH_MAX_TOKENS),
            Role::Decision => (DECISION, GRAPH_MAX_TOKENS),
            Role::HypothesisExpander => (HYPOTHESIS_EXPANDER, CRITIC_MAX_TOKENS),
        };
        Self {
            role,
            instructions,
            max_tokens,
        }
    }
}

const PLANNER: &str = "PlannerAgent:
Task: Develop a concise multi-step plan for the research query.
Steps:
1. Retrieve a KG summary from the knowledge graph (via DiseaseExplorerAgent).
2. Define the terms and relationships of the subgraph (via Ontologist).
3. Generate initial hypotheses in the 'Entity-Relation-Entity' format (via ScientistAgent).
4. For each hypothesis, perform individual iterative refinement using KGAgent, PubmedAgent, CriticAgent, RevisionAgent and RefineAgent.
5. Finally, output a final decision (via DecisionAgent).
Do not call any tools directly.";

const EXPLORER: &str = "DiseaseExplorerAgent:
Task: Extract the precise disease or biomedical entity the user wants to investigate.
Return only the entity name as it would appear in a biomedical knowledge graph (e.g. 'Parkinson disease'). \
If the query names several entities, return them separated by commas. No explanations.";

const ONTOLOGIST: &str = "Ontologist:
Given a subgraph summary, perform the following:
1) Provide concise definitions for each node (including type, function, and relevance).
2) Describe each relationship (type, effect, direction) without adding extra nodes or edges.";

const SCIENTIST: &str = "ScientistAgent:
You are a biomedical researcher specializing in hypothesis generation.
With only the subgraph summary and definitions available (no external literature), generate hypotheses \
about the potential roles of biomedical entities (genes, proteins, metabolites) in the occurrence, \
progression or pathology of the disease.
Each hypothesis must be strictly based on the nodes and relationships of the provided subgraph.
Output exactly the number of enumerated items requested, in the format requested. No disclaimers, no concluding statements.";

const KEYWORD_EXTRACTOR: &str = "KeywordExtractorAgent:
Task: Extract all relevant biomedical keywords from the given text. \
Ignore generic words such as 'research', 'information', 'hypotheses', 'based', 'factors:', 'disease', \
'genetic', 'initial', 'subgraph', 'related', 'provided'.
Return the keywords as a comma-separated list.";

const CRITIC: &str = "CriticAgent:
Task: Evaluate the hypothesis using the following dimensions:
1. Scientific Plausibility (alignment with known biological principles)
2. Novelty (innovation compared to current knowledge)
3. Testability (specificity for experimental validation)
4. Clinical/Biological Relevance (potential diagnostic/therapeutic implications)
5. Confidence & Reliability (strength of supporting evidence)
6. Technical Clarity & Completeness (logical clarity and context)

Provide an overall score from 0 to 10 on a separate line in the format:
Overall Score: X
Then add your feedback. If the hypothesis needs no further work, end with TERMINATE.";

const REVISION: &str = "RevisionAgent:
Task: Based on the CriticAgent's feedback for this hypothesis, decide whether additional external information is needed. \
If the feedback indicates insufficient mechanistic details (e.g. mechanism too generic or lack of pathway details), \
output 'neo4j:<new keywords>' with the new keywords separated by commas (e.g. 'neo4j:DDT,BRCA1'). \
If further literature support is required, output 'pubmed:<new keywords>'. \
If the hypothesis is acceptable, output 'terminate'.";

const REFINE: &str = "RefineAgent:
Task: Refine the given hypothesis using the new external information provided. \
Keep the original structure of the hypothesis and return only the refined hypothesis.";

const DECISION: &str = "DecisionAgent:
Task: Based on the final refined hypotheses and supporting evidence, output the final set of \
high-quality hypotheses and recommendations.";

const HYPOTHESIS_EXPANDER: &str = "HypothesisAgent:
You receive:
(1) The raw hypotheses from the Scientist.
(2) The knowledge graph lookups for each Entity (a map: entity name -> related entities and relation types).
Task: Produce '### Expanded Hypothesis' combining each hypothesis with the related info from the map.";

pub fn planner_context(user_query: &str) -> String {
    format!("User Input: {}\nPlease generate a detailed execution plan.", user_query)
}

pub fn explorer_context(user_query: &str, plan: &str) -> String {
    format!(
        "Execution Plan:\n{}\n\nUser Input: {}\nWhich entity should be looked up in the knowledge graph?",
        plan, user_query
    )
}

pub fn ontologist_context(kg_summary: &str) -> String {
    format!("KG Summary:\n{}\n\nPlease define the knowledge path now.", kg_summary)
}

/// Output format demanded from the Scientist for `count` hypotheses
pub fn scientist_format(count: usize) -> String {
    if count <= 2 {
        format!(
            "Generate exactly {count} hypotheses, one per line, numbered 1. to {count}., each in the format \
'EntityA may affect EntityB through RelationC'.\n\
Examples:\n  1. DiseaseA may affect DiseaseB through GeneC\n  2. GeneX may influence DrugY efficacy via PathwayZ"
        )
    } else {
        format!(
            "Generate exactly {count} structured hypotheses labeled 1. through {count}., each formatted as:\n\
1. **Disease**: ...\n   **Entity**: ...\n   **Relationship Type**: Causal/Indirect\n   **Effect**: Promotes/Inhibits/Neutral\n   **Rationale**: (one or two lines)"
        )
    }
}

pub fn scientist_context(kg_summary: &str, definitions: &str, count: usize) -> String {
    format!(
        "KG Summary:\n{}\n\nDefinitions:\n{}\n\n{}",
        kg_summary,
        definitions,
        scientist_format(count)
    )
}

/// Stricter re-ask after a non-compliant Scientist answer
pub fn scientist_retry_context(base_context: &str, previous: &str, count: usize) -> String {
    format!(
        "{}\n\nYour previous answer was:\n{}\n\nYou must produce {} structured items labeled 1..{}, \
no extra lines or disclaimers. Try again.",
        base_context, previous, count, count
    )
}

pub fn keyword_context(text: &str) -> String {
    format!("Text:\n{}\nKeywords:", text)
}

pub fn critic_context(hypothesis: &str, kg_info: &str, evidence: &str) -> String {
    format!(
        "Hypothesis:\n{}\n\nLiterature Support:\nKG Info:\n{}\n\nLiterature Evidence:\n{}\n\n\
Please evaluate and output your evaluation, ending with a line 'Overall Score: X' where X is the score.",
        hypothesis, kg_info, evidence
    )
}

pub fn revision_context(critic_feedback: &str, hypothesis: &str) -> String {
    format!(
        "Critic Feedback (text):\n{}\n\nHypothesis:\n{}\n\n\
Please decide and output in the format '<option>:<new keywords>' where <option> is either 'neo4j' or 'pubmed', \
or output 'terminate' if no further external information is needed.",
        critic_feedback, hypothesis
    )
}

pub fn refine_context(hypothesis: &str, new_info: &str) -> String {
    format!(
        "Hypothesis:\n{}\nNew Information:\n{}\nPlease produce a refined hypothesis that integrates both sources.",
        hypothesis, new_info
    )
}

pub fn decision_context(final_feedback: &str, hypotheses: &str) -> String {
    format!(
        "Final Feedback:\n{}\nFinal Hypotheses:\n{}\n\
Please output the final decision including refined hypotheses and recommendations.",
        final_feedback, hypotheses
    )
}

pub fn expander_context(hypotheses: &str, entity_map: &str) -> String {
    format!(
        "Scientist's base hypotheses:\n{}\n\nrelated_entities_map:\n{}",
        hypotheses, entity_map
    )
}

pub fn group_critic_context(expanded: &str) -> String {
    format!(
        "Please evaluate the final expanded hypotheses:\n{}\n\nConclude by outputting \"{}\".",
        expanded, TERMINATE_TOKEN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_instructions() {
        for role in [
            Role::Planner,
            Role::Explorer,
            Role::Ontologist,
            Role::Scientist,
            Role::KeywordExtractor,
            Role::Critic,
            Role::Revision,
            Role::Refine,
            Role::Decision,
            Role::HypothesisExpander,
        ] {
            let spec = RoleSpec::for_role(role);
            assert_eq!(spec.role, role);
            assert!(!spec.instructions.is_empty());
            assert!(spec.max_tokens >= BASE_MAX_TOKENS);
        }
    }

    #[test]
    fn test_critic_demands_score_line() {
        assert!(RoleSpec::for_role(Role::Critic).instructions.contains("Overall Score: X"));
        assert_eq!(RoleSpec::for_role(Role::Critic).max_tokens, CRITIC_MAX_TOKENS);
    }

    #[test]
    fn test_scientist_format_names_terminal_enumerator() {
        assert!(scientist_format(2).contains("1. to 2."));
        assert!(scientist_format(5).contains("1. through 5."));
        assert!(scientist_format(5).contains("**Entity**"));
    }

    #[test]
    fn test_critic_context_carries_cached_info() {
        let ctx = critic_context("SNCA may affect PD", "SNCA --[ppi]--> LRRK2", "no evidence");
        assert!(ctx.contains("KG Info:\nSNCA --[ppi]--> LRRK2"));
        assert!(ctx.contains("Literature Evidence:\nno evidence"));
    }
}
