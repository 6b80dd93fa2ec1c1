//! Neo4j-backed subgraph retrieval
//!
//! Multi-keyword requests use `apoc.path.subgraphAll`, so the APOC plugin must be installed on the
//! server. Single-keyword requests are plain one-hop matches per relationship type.

use neo4rs::{query, Graph, Node, Relation, Row};
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::graph::summary::{NodeRecord, RelationshipRecord, SubgraphCollector, NO_KEYWORD_PROVIDED};
use crate::graph::{GraphQuery, SubgraphPlan, SubgraphRequest};
use crate::types::{AppError, AppResult};
use async_trait::async_trait;

const MULTI_KEYWORD_QUERY: &str = "MATCH (n)
WHERE n.name IN $keywords
WITH collect(n) AS startNodes
CALL apoc.path.subgraphAll(startNodes, {maxLevel: $max_level, limit: $limit})
YIELD nodes, relationships
RETURN nodes, relationships";

const DISTINCT_TYPES_QUERY: &str = "MATCH (n {name: $keyword})-[r]-()
RETURN DISTINCT type(r) AS rtype";

pub struct Neo4jGraph {
    graph: Graph,
}

impl Neo4jGraph {
    pub async fn connect(config: &GraphConfig) -> AppResult<Self> {
        info!(uri = %config.uri, user = %config.user, "Connecting to Neo4j");
        let graph = Graph::new(config.uri.as_str(), config.user.as_str(), config.password.as_str()).await?;
        Ok(Self { graph })
    }

    async fn multiple_keywords(&self, keywords: &[String], max_depth: u32, limit: u32) -> AppResult<String> {
        let q = query(MULTI_KEYWORD_QUERY)
            .param("keywords", keywords.to_vec())
            .param("max_level", max_depth as i64)
            .param("limit", limit as i64);

        let mut stream = self.graph.execute(q).await?;
        let mut collector = SubgraphCollector::new();

        if let Some(row) = stream.next().await? {
            let nodes: Vec<Node> = row_get(&row, "nodes")?;
            let relationships: Vec<Relation> = row_get(&row, "relationships")?;
            for node in &nodes {
                collector.add_node(node_record(node));
            }
            for rel in &relationships {
                collector.add_relationship(relationship_record(rel));
            }
        }

        debug!(keywords = ?keywords, "Multi-keyword subgraph retrieved");
        Ok(collector.summarize())
    }

    async fn single_keyword(&self, keyword: &str, types: &[String], per_type_limit: u32) -> AppResult<String> {
        let mut collector = SubgraphCollector::new();

        for rel_type in types {
            let cypher = format!(
                "MATCH (n {{name: $keyword}})-[r:`{}`]-(m)\nRETURN n, r, m\nLIMIT {}",
                escape_identifier(rel_type),
                per_type_limit
            );
            let mut stream = self.graph.execute(query(&cypher).param("keyword", keyword)).await?;

            while let Some(row) = stream.next().await? {
                let n: Node = row_get(&row, "n")?;
                let m: Node = row_get(&row, "m")?;
                let r: Relation = row_get(&row, "r")?;
                collector.add_node(node_record(&n));
                collector.add_node(node_record(&m));
                collector.add_relationship(relationship_record(&r));
            }
        }

        debug!(keyword = %keyword, types = types.len(), "Single-keyword subgraph retrieved");
        Ok(collector.summarize())
    }

    async fn relationship_types(&self, keyword: &str) -> AppResult<Vec<String>> {
        let mut stream = self
            .graph
            .execute(query(DISTINCT_TYPES_QUERY).param("keyword", keyword))
            .await?;

        let mut types = Vec::new();
        while let Some(row) = stream.next().await? {
            types.push(row_get::<String>(&row, "rtype")?);
        }
        Ok(types)
    }
}

#[async_trait]
impl GraphQuery for Neo4jGraph {
    async fn get_subgraph(&self, request: &SubgraphRequest) -> AppResult<String> {
        info!(keywords = ?request.keywords, "Querying knowledge graph");

        let summary = match request.plan() {
            SubgraphPlan::NoKeyword => NO_KEYWORD_PROVIDED.to_string(),
            SubgraphPlan::MultiKeyword { keywords, max_depth, limit } => {
                self.multiple_keywords(&keywords, max_depth, limit).await?
            }
            SubgraphPlan::SingleWithTypes { keyword, types, per_type_limit } => {
                self.single_keyword(&keyword, &types, per_type_limit).await?
            }
            SubgraphPlan::SingleAllTypes { keyword, per_type_limit } => {
                let types = self.relationship_types(&keyword).await?;
                self.single_keyword(&keyword, &types, per_type_limit).await?
            }
        };

        debug!(summary_len = summary.len(), "Aggregated KG summary");
        Ok(summary)
    }
}

fn row_get<T>(row: &Row, key: &str) -> AppResult<T>
where
    T: for<'de> serde::Deserialize<'de>,
{
    row.get::<T>(key)
        .map_err(|e| AppError::Graph(format!("Missing or invalid column '{}': {}", key, e)))
}

fn node_record(node: &Node) -> NodeRecord {
    NodeRecord {
        id: node.id(),
        name: node.get::<String>("name").unwrap_or_default(),
    }
}

fn relationship_record(rel: &Relation) -> RelationshipRecord {
    RelationshipRecord {
        rel_type: rel.typ().to_string(),
        start_id: rel.start_node_id(),
        end_id: rel.end_node_id(),
        display_relation: rel.get::<String>("display_relation").unwrap_or_default(),
    }
}

/// Relationship types are interpolated into Cypher, so backticks must be doubled
fn escape_identifier(raw: &str) -> String {
    raw.replace('`', "``")
}
