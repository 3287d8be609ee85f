//! Cycle detection for the variable dependency graph
//!
//! Edges live with the variables themselves; this module only walks them.
//! Names are compared case-insensitively.

use ahash::AHashSet;

/// Check whether `target` is reachable from `start` by following
/// `dependencies`, which lists the direct dependencies of a variable.
///
/// `start` itself counts as reachable. The walk is iterative, so deep chains
/// cannot overflow the stack.
pub fn reaches<F, I>(start: &str, target: &str, mut dependencies: F) -> bool
where
    F: FnMut(&str) -> I,
    I: IntoIterator<Item = String>,
{
    let target = target.to_uppercase();
    let mut visited: AHashSet<String> = AHashSet::new();
    let mut stack = vec![start.to_uppercase()];

    while let Some(name) = stack.pop() {
        if name == target {
            return true;
        }
        if !visited.insert(name.clone()) {
            continue;
        }
        for next in dependencies(&name) {
            let next = next.to_uppercase();
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }
    false
}

/// Would adding the edge `dependent -> dependency` close a cycle?
pub fn creates_cycle<F, I>(dependent: &str, dependency: &str, dependencies: F) -> bool
where
    F: FnMut(&str) -> I,
    I: IntoIterator<Item = String>,
{
    dependent.eq_ignore_ascii_case(dependency) || reaches(dependency, dependent, dependencies)
}
