use respin_core::{ExclusionSet, Package};

/// Packages a build executor must process for one root, dependencies first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildPlan {
    pub root: String,
    pub excluded: ExclusionSet,
    pub packages: Vec<Package>,
}

impl RebuildPlan {
    pub(crate) fn clean(root: &str) -> Self {
        Self {
            root: root.to_string(),
            excluded: ExclusionSet::new(),
            packages: Vec::new(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.packages
            .iter()
            .map(|package| package.name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeState {
    Built,
    Failed { reason: String },
    /// Not attempted because the named dependency failed or was itself
    /// blocked.
    Blocked { by: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub name: String,
    pub version: String,
    pub state: OutcomeState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub root: String,
    /// False when the root was clean and nothing was planned.
    pub was_dirty: bool,
    pub outcomes: Vec<PackageOutcome>,
    pub marker_cleared: bool,
}

impl RebuildReport {
    pub fn built(&self) -> Vec<&str> {
        self.names_where(|state| matches!(state, OutcomeState::Built))
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_where(|state| matches!(state, OutcomeState::Failed { .. }))
    }

    pub fn blocked(&self) -> Vec<&str> {
        self.names_where(|state| matches!(state, OutcomeState::Blocked { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|outcome| outcome.state == OutcomeState::Built)
    }

    fn names_where(&self, predicate: impl Fn(&OutcomeState) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.state))
            .map(|outcome| outcome.name.as_str())
            .collect()
    }
}
