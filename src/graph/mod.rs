//! Knowledge Graph
//!
//! Read-only subgraph retrieval over a labeled property graph. The orchestrator only ever sees the
//! aggregated text digest produced by [`summary::summarize_subgraph`].

pub mod neo4j;
pub mod summary;

pub use neo4j::Neo4jGraph;
pub use summary::{
    summarize_subgraph, NodeRecord, RelationshipRecord, SubgraphCollector, NO_KEYWORD_PROVIDED,
    NO_SUBGRAPH_FOUND,
};

use crate::types::AppResult;
use async_trait::async_trait;

pub const DEFAULT_MAX_DEPTH: u32 = 2;
pub const DEFAULT_NODE_LIMIT: u32 = 100;
/// Neighbours fetched per requested relationship type
pub const PER_TYPE_LIMIT: u32 = 50;
/// Neighbours fetched per discovered relationship type
pub const DISCOVERED_TYPE_LIMIT: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct SubgraphRequest {
    pub keywords: Vec<String>,
    pub relationship_types: Option<Vec<String>>,
    pub max_depth: u32,
    pub limit: u32,
}

impl SubgraphRequest {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            relationship_types: None,
            max_depth: DEFAULT_MAX_DEPTH,
            limit: DEFAULT_NODE_LIMIT,
        }
    }

    pub fn single(keyword: impl Into<String>) -> Self {
        Self::new(vec![keyword.into()])
    }

    pub fn with_relationship_types(mut self, types: Vec<String>) -> Self {
        self.relationship_types = Some(types);
        self
    }

    /// Pick the retrieval strategy for this request
    pub fn plan(&self) -> SubgraphPlan {
        match self.keywords.as_slice() {
            [] => SubgraphPlan::NoKeyword,
            [keyword] => match &self.relationship_types {
                Some(types) if !types.is_empty() => SubgraphPlan::SingleWithTypes {
                    keyword: keyword.clone(),
                    types: types.clone(),
                    per_type_limit: PER_TYPE_LIMIT,
                },
                _ => SubgraphPlan::SingleAllTypes {
                    keyword: keyword.clone(),
                    per_type_limit: DISCOVERED_TYPE_LIMIT,
                },
            },
            keywords => SubgraphPlan::MultiKeyword {
                keywords: keywords.to_vec(),
                max_depth: self.max_depth,
                limit: self.limit,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubgraphPlan {
    NoKeyword,
    /// Expand from all seed nodes up to `max_depth` hops, bounded to `limit` nodes
    MultiKeyword {
        keywords: Vec<String>,
        max_depth: u32,
        limit: u32,
    },
    /// One hop per requested relationship type
    SingleWithTypes {
        keyword: String,
        types: Vec<String>,
        per_type_limit: u32,
    },
    /// Discover incident relationship types, then one hop per type
    SingleAllTypes {
        keyword: String,
        per_type_limit: u32,
    },
}

#[async_trait]
pub trait GraphQuery: Send + Sync {
    /// Aggregated text summary of the subgraph around the request's keywords
    async fn get_subgraph(&self, request: &SubgraphRequest) -> AppResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_empty_keywords() {
        assert_eq!(SubgraphRequest::new(vec![]).plan(), SubgraphPlan::NoKeyword);
    }

    #[test]
    fn test_plan_single_keyword_without_types() {
        let plan = SubgraphRequest::single("Parkinson disease").plan();
        assert_eq!(
            plan,
            SubgraphPlan::SingleAllTypes {
                keyword: "Parkinson disease".to_string(),
                per_type_limit: DISCOVERED_TYPE_LIMIT,
            }
        );
    }

    #[test]
    fn test_plan_single_keyword_with_types() {
        let plan = SubgraphRequest::single("Parkinson disease")
            .with_relationship_types(vec!["disease_protein".to_string()])
            .plan();
        assert!(matches!(
            plan,
            SubgraphPlan::SingleWithTypes { per_type_limit: PER_TYPE_LIMIT, ref types, .. }
                if types == &vec!["disease_protein".to_string()]
        ));
    }

    #[test]
    fn test_empty_type_list_behaves_like_none() {
        let plan = SubgraphRequest::single("TP53").with_relationship_types(vec![]).plan();
        assert!(matches!(plan, SubgraphPlan::SingleAllTypes { .. }));
    }

    #[test]
    fn test_plan_multiple_keywords_ignores_types() {
        let plan = SubgraphRequest::new(vec!["TP53".into(), "BRCA1".into(), "PARP1".into()])
            .with_relationship_types(vec!["disease_protein".to_string()])
            .plan();
        assert_eq!(
            plan,
            SubgraphPlan::MultiKeyword {
                keywords: vec!["TP53".into(), "BRCA1".into(), "PARP1".into()],
                max_depth: DEFAULT_MAX_DEPTH,
                limit: DEFAULT_NODE_LIMIT,
            }
        );
    }
}
