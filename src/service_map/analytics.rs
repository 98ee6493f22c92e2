//! Per-window results, with drill-down views around a single service.

use super::{compute_from_collection, EdgeSet, KnownServices, ServiceMap, TraceCollection, Visibility};
use crate::core::{KnmapError, Result, ServiceIdentity, ServiceRecord, TimeWindow, Trace, TraceId};
use std::collections::{BTreeMap, BTreeSet};

/// Everything computed for one window: the registry records, the edge set
/// and, per visible service, the traces it appeared in.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Vec<ServiceRecord>,
    edges: EdgeSet,
    traces_by_service: BTreeMap<ServiceIdentity, BTreeSet<TraceId>>,
    window: TimeWindow,
}

impl Snapshot {
    /// Runs the edge computation over `traces` against the registry records.
    pub fn compute(records: Vec<ServiceRecord>, traces: Vec<Trace>, window: TimeWindow) -> Self {
        let known = KnownServices::from_records(&records);
        let collection: TraceCollection = traces.into_iter().collect();

        let visibility = Visibility::new(&known);
        let mut traces_by_service: BTreeMap<ServiceIdentity, BTreeSet<TraceId>> = BTreeMap::new();
        for span in collection.spans() {
            if let Some(identity) = visibility.identity(span) {
                traces_by_service
                    .entry(identity.clone())
                    .or_default()
                    .insert(span.trace_id.clone());
            }
        }

        let edges = compute_from_collection(&known, collection);
        Self {
            records,
            edges,
            traces_by_service,
            window,
        }
    }

    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }

    pub fn records(&self) -> &[ServiceRecord] {
        &self.records
    }

    /// The full service map.
    pub fn service_map(&self) -> ServiceMap {
        ServiceMap::resolve(&self.records, &self.edges, self.window)
    }

    /// The registry record of a focus service.
    pub fn record(&self, focus: &ServiceIdentity) -> Result<&ServiceRecord> {
        self.records
            .iter()
            .find(|r| r.name == focus.name && r.namespace == focus.namespace)
            .ok_or_else(|| KnmapError::ServiceNotFound {
                name: focus.name.clone(),
                namespace: focus.namespace.clone(),
            })
    }

    /// The map restricted to edges touching `focus`, with the focus and
    /// its neighbours as nodes.
    pub fn focus_map(&self, focus: &ServiceIdentity) -> Result<ServiceMap> {
        self.record(focus)?;

        let edges: EdgeSet = self.edges.iter().filter(|e| e.touches(focus)).cloned().collect();
        let endpoints = edges.endpoints();
        let records: Vec<ServiceRecord> = self
            .records
            .iter()
            .filter(|r| {
                let identity = r.identity();
                &identity == focus || endpoints.contains(&identity)
            })
            .cloned()
            .collect();

        Ok(ServiceMap::resolve(&records, &edges, self.window))
    }

    /// Services that call, or are called by, `focus`. Self-calls do not
    /// list the focus itself.
    pub fn linked_services(&self, focus: &ServiceIdentity) -> Result<Vec<ServiceRecord>> {
        self.record(focus)?;

        let linked: BTreeSet<&ServiceIdentity> = self
            .edges
            .iter()
            .filter_map(|e| {
                if &e.source == focus {
                    Some(&e.target)
                } else if &e.target == focus {
                    Some(&e.source)
                } else {
                    None
                }
            })
            .filter(|identity| *identity != focus)
            .collect();

        let mut services: Vec<ServiceRecord> = self
            .records
            .iter()
            .filter(|r| linked.contains(&r.identity()))
            .cloned()
            .collect();
        services.sort_by(|a, b| a.namespace.cmp(&b.namespace).then_with(|| a.name.cmp(&b.name)));
        services.dedup_by(|a, b| a.name == b.name && a.namespace == b.namespace);
        Ok(services)
    }

    /// Ids of the traces holding at least one span visible as `focus`, sorted.
    pub fn traces_with(&self, focus: &ServiceIdentity) -> Result<Vec<TraceId>> {
        self.record(focus)?;
        Ok(self
            .traces_by_service
            .get(focus)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Span;

    fn span(trace: &str, id: &str, parent: Option<&str>, start: i64, service: Option<&str>) -> Span {
        let mut builder = Span::builder().trace_id(trace).span_id(id).start_time(start);
        if let Some(parent) = parent {
            builder = builder.child_of(parent);
        }
        if let Some(service) = service {
            builder = builder.tag("http.url", format!("http://{}.shop.svc.cluster.local", service));
        }
        builder.build().unwrap()
    }

    fn snapshot() -> Snapshot {
        let records = vec![
            ServiceRecord::new("gateway", "shop"),
            ServiceRecord::new("orders", "shop"),
            ServiceRecord::new("payments", "shop"),
            ServiceRecord::new("email", "shop"),
            ServiceRecord::new("idle", "shop"),
        ];
        let t1 = Trace::new(
            TraceId::new("t1").unwrap(),
            vec![
                span("t1", "a", None, 0, Some("gateway")),
                span("t1", "b", Some("a"), 1, Some("orders")),
                span("t1", "c", Some("b"), 2, Some("payments")),
            ],
        );
        let t2 = Trace::new(
            TraceId::new("t2").unwrap(),
            vec![
                span("t2", "d", None, 0, Some("email")),
                span("t2", "e", Some("d"), 1, Some("email")),
            ],
        );
        Snapshot::compute(records, vec![t1, t2], TimeWindow::from_micros(0, 10).unwrap())
    }

    fn orders() -> ServiceIdentity {
        ServiceIdentity::new("orders", "shop")
    }

    #[test]
    fn test_focus_map_keeps_touching_edges() {
        let map = snapshot().focus_map(&orders()).unwrap();

        let ids: Vec<&str> = map.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["gateway_shop_orders_shop", "orders_shop_payments_shop"]);
        let nodes: Vec<&str> = map.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(nodes, vec!["gateway", "orders", "payments"]);
    }

    #[test]
    fn test_focus_map_of_isolated_service() {
        let map = snapshot().focus_map(&ServiceIdentity::new("idle", "shop")).unwrap();
        assert!(map.edges.is_empty());
        assert_eq!(map.nodes.len(), 1);
    }

    #[test]
    fn test_linked_services_skip_self_calls() {
        let snapshot = snapshot();
        let linked = snapshot.linked_services(&orders()).unwrap();
        let names: Vec<&str> = linked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["gateway", "payments"]);

        assert!(snapshot.linked_services(&ServiceIdentity::new("email", "shop")).unwrap().is_empty());
    }

    #[test]
    fn test_traces_with_visible_spans() {
        let snapshot = snapshot();
        let traces = snapshot.traces_with(&orders()).unwrap();
        assert_eq!(traces, vec![TraceId::new("t1").unwrap()]);
        assert!(snapshot.traces_with(&ServiceIdentity::new("idle", "shop")).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_focus_is_not_found() {
        let err = snapshot().linked_services(&ServiceIdentity::new("ghost", "shop")).unwrap_err();
        assert_eq!(err.category(), "not_found");
    }
}
