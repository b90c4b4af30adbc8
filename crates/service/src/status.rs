//! Work order and home visit status machines.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use workshop_core::DomainError;

/// Work order lifecycle.
///
/// Forward one step at a time:
/// `intake → quote → confirmation → in_progress → finished → delivered`.
/// `cancelled` is reachable from every non-terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    #[default]
    Intake,
    Quote,
    Confirmation,
    InProgress,
    Finished,
    Delivered,
    Cancelled,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 7] = [
        WorkOrderStatus::Intake,
        WorkOrderStatus::Quote,
        WorkOrderStatus::Confirmation,
        WorkOrderStatus::InProgress,
        WorkOrderStatus::Finished,
        WorkOrderStatus::Delivered,
        WorkOrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Intake => "intake",
            WorkOrderStatus::Quote => "quote",
            WorkOrderStatus::Confirmation => "confirmation",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::Finished => "finished",
            WorkOrderStatus::Delivered => "delivered",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderStatus::Delivered | WorkOrderStatus::Cancelled)
    }

    /// The single forward step, if any.
    pub fn next(&self) -> Option<WorkOrderStatus> {
        match self {
            WorkOrderStatus::Intake => Some(WorkOrderStatus::Quote),
            WorkOrderStatus::Quote => Some(WorkOrderStatus::Confirmation),
            WorkOrderStatus::Confirmation => Some(WorkOrderStatus::InProgress),
            WorkOrderStatus::InProgress => Some(WorkOrderStatus::Finished),
            WorkOrderStatus::Finished => Some(WorkOrderStatus::Delivered),
            WorkOrderStatus::Delivered | WorkOrderStatus::Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, target: WorkOrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == WorkOrderStatus::Cancelled || self.next() == Some(target)
    }
}

impl core::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = DomainError;

    /// Only the seven wire names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkOrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::field("status", format!("'{s}' is not a valid choice")))
    }
}

/// Home visit status. Any non-cancelled status may move to any other;
/// `cancelled` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    #[default]
    Scheduled,
    OnTheWay,
    CheckedOnSite,
    MovedToWorkshop,
    NotChecked,
    Cancelled,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 6] = [
        VisitStatus::Scheduled,
        VisitStatus::OnTheWay,
        VisitStatus::CheckedOnSite,
        VisitStatus::MovedToWorkshop,
        VisitStatus::NotChecked,
        VisitStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::OnTheWay => "on_the_way",
            VisitStatus::CheckedOnSite => "checked_on_site",
            VisitStatus::MovedToWorkshop => "moved_to_workshop",
            VisitStatus::NotChecked => "not_checked",
            VisitStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == VisitStatus::Cancelled
    }
}

impl core::fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisitStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::field("status", format!("'{s}' is not a valid choice")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn forward_chain_reaches_delivered() {
        let mut s = WorkOrderStatus::Intake;
        let mut steps = 0;
        while let Some(next) = s.next() {
            assert!(s.can_transition_to(next));
            s = next;
            steps += 1;
        }
        assert_eq!(s, WorkOrderStatus::Delivered);
        assert_eq!(steps, 5);
    }

    #[test]
    fn skipping_and_going_back_are_rejected() {
        assert!(!WorkOrderStatus::Intake.can_transition_to(WorkOrderStatus::InProgress));
        assert!(!WorkOrderStatus::Finished.can_transition_to(WorkOrderStatus::Quote));
        assert!(!WorkOrderStatus::Quote.can_transition_to(WorkOrderStatus::Quote));
    }

    #[test]
    fn terminal_states_go_nowhere() {
        for target in WorkOrderStatus::ALL {
            assert!(!WorkOrderStatus::Delivered.can_transition_to(target));
            assert!(!WorkOrderStatus::Cancelled.can_transition_to(target));
        }
    }

    #[test]
    fn cancel_from_any_open_state() {
        for s in WorkOrderStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(s.can_transition_to(WorkOrderStatus::Cancelled));
        }
    }

    #[test]
    fn legacy_names_are_not_statuses() {
        assert!("ingreso".parse::<WorkOrderStatus>().is_err());
        assert!("IN_PROGRESS".parse::<WorkOrderStatus>().is_err());
        assert_eq!("in_progress".parse::<WorkOrderStatus>().unwrap(), WorkOrderStatus::InProgress);
    }

    proptest! {
        #[test]
        fn only_the_seven_names_parse(s in "\\PC{0,16}") {
            let known = WorkOrderStatus::ALL.iter().any(|st| st.as_str() == s);
            prop_assert_eq!(s.parse::<WorkOrderStatus>().is_ok(), known);
        }

        #[test]
        fn visit_status_parse_matches_display(idx in 0usize..6) {
            let status = VisitStatus::ALL[idx];
            prop_assert_eq!(status.to_string().parse::<VisitStatus>().unwrap(), status);
        }
    }
}
