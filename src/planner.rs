//! Delegation Planner
//!
//! Turns a RoutingDecision into an ordered list of invocation specs.
//! Pure function, no I/O, cannot fail.

use crate::models::{InvocationSpec, RoutingDecision};

pub struct DelegationPlanner;

impl DelegationPlanner {
    /// Emit one spec per kind named by the decision, preserving order for
    /// sequential plans. Each worker is invoked at most once per query, so
    /// duplicate kinds collapse to their first occurrence.
    pub fn plan(decision: &RoutingDecision, query: &str) -> Vec<InvocationSpec> {
        let mut specs: Vec<InvocationSpec> = Vec::new();

        for kind in decision.kinds() {
            if specs.iter().any(|spec| spec.kind == kind) {
                continue;
            }
            specs.push(InvocationSpec {
                kind,
                query: query.to_string(),
            });
        }

        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkerKind;

    #[test]
    fn test_single_plan() {
        let specs = DelegationPlanner::plan(
            &RoutingDecision::Single(WorkerKind::Data),
            "price of AAPL",
        );
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, WorkerKind::Data);
        assert_eq!(specs[0].query, "price of AAPL");
    }

    #[test]
    fn test_sequential_plan_preserves_order() {
        let decision = RoutingDecision::Sequential(vec![WorkerKind::Data, WorkerKind::Web]);
        let specs = DelegationPlanner::plan(&decision, "tesla price and news");
        let kinds: Vec<WorkerKind> = specs.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![WorkerKind::Data, WorkerKind::Web]);
    }

    #[test]
    fn test_duplicate_kinds_collapse() {
        let decision = RoutingDecision::Sequential(vec![
            WorkerKind::Web,
            WorkerKind::Data,
            WorkerKind::Web,
        ]);
        let specs = DelegationPlanner::plan(&decision, "q");
        let kinds: Vec<WorkerKind> = specs.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![WorkerKind::Web, WorkerKind::Data]);
    }

    #[test]
    fn test_parallel_plan_covers_all_kinds() {
        let decision = RoutingDecision::Parallel(vec![WorkerKind::Data, WorkerKind::Web]);
        let specs = DelegationPlanner::plan(&decision, "q");
        assert_eq!(specs.len(), 2);
    }
}
