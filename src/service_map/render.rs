//! Visualization-ready service map: registry nodes plus resolved edges.

use crate::core::{ServiceIdentity, ServiceRecord, TimeWindow};
use crate::service_map::edges::EdgeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ahash::AHashMap;

/// Service node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNode {
    /// Registry UID, or `<name>_<namespace>`
    pub id: String,
    pub name: String,
    pub namespace: String,
}

/// Service dependency edge, with endpoints as node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMapEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub src_name: String,
    pub src_namespace: String,
    pub dst_name: String,
    pub dst_namespace: String,
}

/// Window the map was computed over, in microseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub from: i64,
    pub to: i64,
}

/// Service dependency map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMap {
    /// All registered services
    pub nodes: Vec<ServiceNode>,
    /// Dependencies between them
    pub edges: Vec<ServiceMapEdge>,
    pub window: WindowInfo,
    pub generated_at: DateTime<Utc>,
}

impl ServiceMap {
    /// Joins an edge set against the registry records.
    ///
    /// Edges whose endpoints have no record are dropped and logged.
    pub fn resolve(records: &[ServiceRecord], edges: &EdgeSet, window: TimeWindow) -> Self {
        let ids: AHashMap<ServiceIdentity, String> =
            records.iter().map(|r| (r.identity(), r.id())).collect();

        let mut nodes: Vec<ServiceNode> = records
            .iter()
            .map(|r| ServiceNode {
                id: r.id(),
                name: r.name.clone(),
                namespace: r.namespace.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.namespace.cmp(&b.namespace).then_with(|| a.name.cmp(&b.name)));
        nodes.dedup_by(|a, b| a.id == b.id);

        let mut resolved = Vec::with_capacity(edges.len());
        for edge in edges {
            match (ids.get(&edge.source), ids.get(&edge.target)) {
                (Some(source), Some(target)) => resolved.push(ServiceMapEdge {
                    id: format!(
                        "{}_{}_{}_{}",
                        edge.source.name, edge.source.namespace, edge.target.name, edge.target.namespace
                    ),
                    source: source.clone(),
                    target: target.clone(),
                    src_name: edge.source.name.clone(),
                    src_namespace: edge.source.namespace.clone(),
                    dst_name: edge.target.name.clone(),
                    dst_namespace: edge.target.namespace.clone(),
                }),
                _ => {
                    tracing::error!(%edge, "Cannot find registry node for edge endpoint, dropping edge");
                },
            }
        }

        ServiceMap {
            nodes,
            edges: resolved,
            window: WindowInfo {
                from: window.start_micros(),
                to: window.end_micros(),
            },
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Edge;

    fn window() -> TimeWindow {
        TimeWindow::from_micros(1_000, 2_000).unwrap()
    }

    #[test]
    fn test_resolve_edges_to_node_ids() {
        let records = vec![
            ServiceRecord::new("orders", "shop").with_uid("uid-orders"),
            ServiceRecord::new("payments", "shop"),
        ];
        let edges: EdgeSet = vec![Edge::new(
            ServiceIdentity::new("orders", "shop"),
            ServiceIdentity::new("payments", "shop"),
        )]
        .into_iter()
        .collect();

        let map = ServiceMap::resolve(&records, &edges, window());

        assert_eq!(map.nodes.len(), 2);
        assert_eq!(map.edges.len(), 1);
        let edge = &map.edges[0];
        assert_eq!(edge.id, "orders_shop_payments_shop");
        assert_eq!(edge.source, "uid-orders");
        assert_eq!(edge.target, "payments_shop");
        assert_eq!(map.window, WindowInfo { from: 1_000, to: 2_000 });
    }

    #[test]
    fn test_unknown_endpoint_is_dropped() {
        let records = vec![ServiceRecord::new("orders", "shop")];
        let edges: EdgeSet = vec![Edge::new(
            ServiceIdentity::new("orders", "shop"),
            ServiceIdentity::new("ghost", "shop"),
        )]
        .into_iter()
        .collect();

        let map = ServiceMap::resolve(&records, &edges, window());
        assert!(map.edges.is_empty());
        assert_eq!(map.nodes.len(), 1);
    }

    #[test]
    fn test_nodes_sorted_and_serialized_camel_case() {
        let records = vec![
            ServiceRecord::new("b", "ns2"),
            ServiceRecord::new("z", "ns1"),
            ServiceRecord::new("a", "ns1"),
        ];
        let edges: EdgeSet = vec![Edge::new(ServiceIdentity::new("a", "ns1"), ServiceIdentity::new("b", "ns2"))]
            .into_iter()
            .collect();
        let map = ServiceMap::resolve(&records, &edges, window());

        let names: Vec<&str> = map.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "z", "b"]);

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["edges"][0]["srcNamespace"], "ns1");
        assert_eq!(json["edges"][0]["dstName"], "b");
        assert!(json["generatedAt"].is_string());
    }
}
