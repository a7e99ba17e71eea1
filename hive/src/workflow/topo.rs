//! Topological ordering of workflow nodes (Kahn's algorithm).

use std::collections::{HashMap, VecDeque};

use crate::error::ConfigError;

use super::NodeDefinition;

/// Computes the execution order over node dependencies.
///
/// Ties are broken by declaration order, so the result is deterministic.
/// Unknown dependencies and cycles are configuration errors.
pub fn topological_order(nodes: &[NodeDefinition]) -> Result<Vec<String>, ConfigError> {
    let positions: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.name.as_str(), i))
        .collect();

    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.name.as_str(), 0)).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in nodes {
        for dep in &node.depends_on {
            if !positions.contains_key(dep.as_str()) {
                return Err(ConfigError::UnknownNode(dep.clone()));
            }
            if let Some(degree) = in_degree.get_mut(node.name.as_str()) {
                *degree += 1;
            }
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(node.name.as_str());
        }
    }

    let mut ready: VecDeque<&str> = nodes
        .iter()
        .filter(|n| in_degree[n.name.as_str()] == 0)
        .map(|n| n.name.as_str())
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(current) = ready.pop_front() {
        order.push(current.to_string());
        let mut unlocked: Vec<&str> = Vec::new();
        for dependent in dependents.remove(current).unwrap_or_default() {
            let Some(degree) = in_degree.get_mut(dependent) else {
                continue;
            };
            *degree -= 1;
            if *degree == 0 {
                unlocked.push(dependent);
            }
        }
        unlocked.sort_by_key(|name| positions[name]);
        ready.extend(unlocked);
    }

    if order.len() != nodes.len() {
        let stuck = nodes
            .iter()
            .find(|n| !order.contains(&n.name))
            .map(|n| n.name.clone())
            .unwrap_or_default();
        return Err(ConfigError::CircularDependency(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::NodeDefinition;

    fn node(name: &str, deps: &[&str]) -> NodeDefinition {
        let mut n = NodeDefinition::new(name);
        n = n.depends_on(deps.iter().copied());
        n
    }

    #[test]
    fn linear_chain_orders_by_dependency() {
        let nodes = vec![
            node("verify", &["build"]),
            node("plan", &[]),
            node("build", &["plan"]),
        ];
        let order = topological_order(&nodes).unwrap();
        assert_eq!(order, vec!["plan", "build", "verify"]);
    }

    #[test]
    fn diamond_respects_declaration_order_for_ties() {
        let nodes = vec![
            node("start", &[]),
            node("left", &["start"]),
            node("right", &["start"]),
            node("join", &["left", "right"]),
        ];
        let order = topological_order(&nodes).unwrap();
        assert_eq!(order, vec!["start", "left", "right", "join"]);
    }

    #[test]
    fn cycle_is_rejected() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"])];
        let err = topological_order(&nodes).unwrap_err();
        assert!(matches!(err, ConfigError::CircularDependency(_)));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let nodes = vec![node("a", &["ghost"])];
        let err = topological_order(&nodes).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNode(name) if name == "ghost"));
    }
}
