use crate::types::{GraphDef, ItemKind, ItemRole, StatusPredicate, TransitionTarget};
use std::collections::{HashMap, HashSet};

/// Validate a `GraphDef` for structural correctness.
///
/// Returns `Ok(())` if the graph is valid, or `Err(Vec<String>)` with a list
/// of human-readable validation errors.
pub fn validate_graph<P>(graph: &GraphDef<P>) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // 1. Graph must have at least one item.
    if graph.items.is_empty() {
        errors.push("Graph has no processing items".to_string());
    }

    // 2. No duplicate item IDs.
    let mut seen_ids = HashSet::new();
    for item in &graph.items {
        if !seen_ids.insert(item.id.as_str()) {
            errors.push(format!("Duplicate item ID: {}", item.id));
        }
    }

    let roles: HashMap<&str, (ItemRole, bool)> = graph
        .items
        .iter()
        .map(|item| (item.id.as_str(), (item.kind.role(), item.kind.has_merger())))
        .collect();

    // 3. Start targets exist. A merge point receives the payload on its
    //    incoming-merge join.
    let mut handle_inputs: HashMap<&str, usize> = HashMap::new();
    let mut merge_inputs: HashMap<&str, usize> = HashMap::new();
    if graph.start.is_empty() {
        errors.push("Graph has no start transitions".to_string());
    }
    for target in &graph.start {
        match roles.get(target.as_str()) {
            None => errors.push(format!("Start references unknown item: {target}")),
            Some((ItemRole::MergePoint, _)) => {
                *merge_inputs.entry(target.as_str()).or_default() += 1
            }
            Some(_) => *handle_inputs.entry(target.as_str()).or_default() += 1,
        }
    }

    // 4. Transitions.
    let mut has_terminal = false;
    for item in &graph.items {
        if !item.kind.has_merger() && !item.transitions.is_empty() {
            errors.push(format!(
                "Item {} declares transitions but has no merger",
                item.id
            ));
        }
        if item.kind.has_merger() && item.transitions.is_empty() {
            errors.push(format!(
                "Merge point of {} has no outgoing transitions",
                item.id
            ));
        }

        for transition in &item.transitions {
            if let StatusPredicate::OneOf(set) = &transition.on {
                if set.is_empty() {
                    errors.push(format!(
                        "Item {} has a transition with an empty status set",
                        item.id
                    ));
                }
            }

            match &transition.target {
                TransitionTarget::Complete => has_terminal = true,
                TransitionTarget::Handle(to) => match roles.get(to.as_str()) {
                    None => errors.push(format!(
                        "Transition from {} references unknown item: {to}",
                        item.id
                    )),
                    Some((ItemRole::MergePoint, _)) => errors.push(format!(
                        "Detached merge point {to} can not be a handle-by target of {}",
                        item.id
                    )),
                    Some(_) => *handle_inputs.entry(to.as_str()).or_default() += 1,
                },
                TransitionTarget::Merge(to) => match roles.get(to.as_str()) {
                    None => errors.push(format!(
                        "Transition from {} references unknown item: {to}",
                        item.id
                    )),
                    Some((_, false)) => errors.push(format!(
                        "Transition from {} merges by {to}, which has no merger",
                        item.id
                    )),
                    Some(_) => *merge_inputs.entry(to.as_str()).or_default() += 1,
                },
            }
        }

        // 5. A declared status domain must be fully covered.
        if let Some(domain) = item.kind.declared_domain() {
            for status in domain {
                if !item.transitions.iter().any(|t| t.on.matches(status)) {
                    errors.push(format!(
                        "Merge point of {} can return status {status} that no transition covers",
                        item.id
                    ));
                }
            }
        }
    }

    // 6. Handling items need an incoming handling flow; detached merge
    //    points need an incoming merge flow.
    for item in &graph.items {
        match &item.kind {
            ItemKind::Processor { .. } | ItemKind::Subgraph { .. } => {
                if !handle_inputs.contains_key(item.id.as_str()) {
                    errors.push(format!(
                        "{} {} has no incoming handling flows. Probably missing handle-by transition",
                        capitalize(item.kind.role()),
                        item.id
                    ));
                }
            }
            ItemKind::MergePoint { .. } => {
                if !merge_inputs.contains_key(item.id.as_str()) {
                    errors.push(format!(
                        "Merge point {} has no incoming merging flows",
                        item.id
                    ));
                }
            }
        }
    }

    // 7. At least one terminal transition.
    if !has_terminal && !graph.items.is_empty() {
        errors.push("Graph should contain at least one terminal transition".to_string());
    }

    // 8. Every join is one-shot, so the graph must be acyclic.
    if let Some(id) = find_cycle(graph) {
        errors.push(format!("Cycle detected through item {id}"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn capitalize(role: ItemRole) -> &'static str {
    match role {
        ItemRole::Processor => "Processor",
        ItemRole::Subgraph => "Subgraph",
        ItemRole::MergePoint => "Merge point",
    }
}

/// Find an item on a cycle via DFS. Returns the item where the back-edge
/// lands.
fn find_cycle<P>(graph: &GraphDef<P>) -> Option<String> {
    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for item in &graph.items {
        let targets = outgoing.entry(item.id.as_str()).or_default();
        targets.extend(item.transitions.iter().filter_map(|t| t.target.vertex()));
    }

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();
    for item in &graph.items {
        if !visited.contains(item.id.as_str()) {
            if let Some(id) = dfs(&item.id, &outgoing, &mut visited, &mut in_stack) {
                return Some(id.to_string());
            }
        }
    }
    None
}

fn dfs<'a>(
    node: &'a str,
    outgoing: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    in_stack: &mut HashSet<&'a str>,
) -> Option<&'a str> {
    visited.insert(node);
    in_stack.insert(node);

    if let Some(targets) = outgoing.get(node) {
        for &target in targets {
            if in_stack.contains(target) {
                return Some(target);
            }
            if !visited.contains(target) {
                if let Some(found) = dfs(target, outgoing, visited, in_stack) {
                    return Some(found);
                }
            }
        }
    }

    in_stack.remove(node);
    None
}
