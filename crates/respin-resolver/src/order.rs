use std::collections::{BTreeMap, BTreeSet, HashSet};

use respin_core::CoordinatorError;

/// Orders `selected` (package → direct dependencies) so every package comes
/// after its dependencies. Edges to packages outside `selected` are ignored.
/// Independent packages come out in name order.
pub(crate) fn topo_order(
    selected: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, CoordinatorError> {
    let mut reverse: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

    for (name, dependencies) in selected {
        let mut degree = 0;
        for dep_name in dependencies {
            if !selected.contains_key(dep_name) {
                continue;
            }
            degree += 1;
            reverse
                .entry(dep_name.as_str())
                .or_default()
                .insert(name.as_str());
        }
        in_degree.insert(name.as_str(), degree);
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter_map(|(name, degree)| (*degree == 0).then_some(*name))
        .collect();
    let mut ordered = Vec::with_capacity(selected.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(next.to_string());
        if let Some(children) = reverse.get(next) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
    }

    if ordered.len() != selected.len() {
        let ordered_set: HashSet<&str> = ordered.iter().map(String::as_str).collect();
        let members = selected
            .keys()
            .filter(|name| !ordered_set.contains(name.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        return Err(CoordinatorError::Cycle { members });
    }

    Ok(ordered)
}
