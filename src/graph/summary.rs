//! Aggregated subgraph digest
//!
//! Relationships are grouped by `(source name, relationship type, display label)` and every group
//! becomes one line listing its target names:
//!
//! ```text
//! Parkinson disease --[disease_protein]--> LRRK2, PARK7, SNCA
//! Parkinson disease --[disease_phenotype_positive | phenotype present]--> Bradykinesia, Tremor
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

pub const NO_KEYWORD_PROVIDED: &str = "No keyword provided.";
pub const NO_SUBGRAPH_FOUND: &str = "No subgraph found for the given keywords.";

const UNKNOWN_NAME: &str = "Unknown";

/// A node as seen by the summarizer
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: i64,
    pub name: String,
}

/// A directed relationship between two node ids
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipRecord {
    pub rel_type: String,
    pub start_id: i64,
    pub end_id: i64,
    pub display_relation: String,
}

type GroupKey = (String, String, String);

/// Render the grouped digest. Groups keep first-seen order, targets are sorted and unique.
pub fn summarize_subgraph(nodes: &[NodeRecord], relationships: &[RelationshipRecord]) -> String {
    let names: HashMap<i64, &str> = nodes.iter().map(|n| (n.id, n.name.as_str())).collect();
    let name_of = |id: i64| -> String {
        names
            .get(&id)
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    };

    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, BTreeSet<String>> = HashMap::new();

    for rel in relationships {
        let key = (
            name_of(rel.start_id),
            rel.rel_type.clone(),
            rel.display_relation.trim().to_string(),
        );
        let targets = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            BTreeSet::new()
        });
        targets.insert(name_of(rel.end_id));
    }

    order
        .iter()
        .filter_map(|key| groups.get(key).map(|targets| (key, targets)))
        .map(|((source, rel_type, display), targets)| {
            let targets = targets.iter().cloned().collect::<Vec<_>>().join(", ");
            if display.is_empty() {
                format!("{} --[{}]--> {}", source, rel_type, targets)
            } else {
                format!("{} --[{} | {}]--> {}", source, rel_type, display, targets)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Accumulates nodes and relationships across several queries, de-duplicating nodes by id
#[derive(Debug, Default)]
pub struct SubgraphCollector {
    nodes: Vec<NodeRecord>,
    seen: HashSet<i64>,
    relationships: Vec<RelationshipRecord>,
}

impl SubgraphCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeRecord) {
        if self.seen.insert(node.id) {
            self.nodes.push(node);
        }
    }

    pub fn add_relationship(&mut self, rel: RelationshipRecord) {
        self.relationships.push(rel);
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Summary text, or the "no subgraph" sentinel when nothing was collected
    pub fn summarize(&self) -> String {
        if self.is_empty() {
            return NO_SUBGRAPH_FOUND.to_string();
        }
        summarize_subgraph(&self.nodes, &self.relationships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, name: &str) -> NodeRecord {
        NodeRecord {
            id,
            name: name.to_string(),
        }
    }

    fn rel(rel_type: &str, start: i64, end: i64, display: &str) -> RelationshipRecord {
        RelationshipRecord {
            rel_type: rel_type.to_string(),
            start_id: start,
            end_id: end,
            display_relation: display.to_string(),
        }
    }

    fn sample() -> (Vec<NodeRecord>, Vec<RelationshipRecord>) {
        let nodes = vec![
            node(1, "Parkinson disease"),
            node(2, "SNCA"),
            node(3, "LRRK2"),
            node(4, "Tremor"),
        ];
        let rels = vec![
            rel("disease_protein", 1, 3, ""),
            rel("disease_protein", 1, 2, ""),
            rel("disease_protein", 1, 3, ""),
            rel("disease_phenotype_positive", 1, 4, " phenotype present "),
        ];
        (nodes, rels)
    }

    #[test]
    fn test_groups_sorted_and_deduplicated() {
        let (nodes, rels) = sample();
        let summary = summarize_subgraph(&nodes, &rels);
        let lines: Vec<&str> = summary.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Parkinson disease --[disease_protein]--> LRRK2, SNCA");
        assert_eq!(
            lines[1],
            "Parkinson disease --[disease_phenotype_positive | phenotype present]--> Tremor"
        );
    }

    #[test]
    fn test_summary_is_idempotent() {
        let (nodes, rels) = sample();
        assert_eq!(summarize_subgraph(&nodes, &rels), summarize_subgraph(&nodes, &rels));
    }

    #[test]
    fn test_unknown_node_names() {
        let nodes = vec![node(1, "TP53")];
        let rels = vec![rel("interacts_with", 1, 99, "")];
        assert_eq!(summarize_subgraph(&nodes, &rels), "TP53 --[interacts_with]--> Unknown");
    }

    #[test]
    fn test_collector_dedupes_nodes_and_reports_empty() {
        let mut collector = SubgraphCollector::new();
        assert_eq!(collector.summarize(), NO_SUBGRAPH_FOUND);

        collector.add_node(node(1, "BRCA1"));
        collector.add_node(node(1, "BRCA1"));
        collector.add_node(node(2, "PARP1"));
        collector.add_relationship(rel("protein_protein", 1, 2, "ppi"));

        assert_eq!(collector.nodes.len(), 2);
        assert_eq!(collector.summarize(), "BRCA1 --[protein_protein | ppi]--> PARP1");
    }
}
