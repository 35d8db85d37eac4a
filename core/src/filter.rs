//! Query filters for pool and event listings.
//!
//! Filters are plain data; each store implementation translates them into its
//! own query language. `matches` gives the reference semantics used by the
//! in-memory store and by tests.

use crate::constants::{MachineEventType, PoolType, TicketType};
use crate::models::{DirtyMachine, MachineEvent, Ticket};

/// Split a comma separated list, trimming blanks and dropping empty items.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Split a free form IP list as pasted by users: commas, whitespace or newlines.
#[must_use]
pub fn split_ips(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Filter for the dirty machine listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyMachineFilter {
    /// Host IPs.
    pub ip_list: Option<Vec<String>>,
    /// Ticket that left the hosts.
    pub ticket_id: Option<i64>,
    /// Flow root id.
    pub task_id: Option<String>,
    /// Type of the referenced ticket.
    pub ticket_type: Option<TicketType>,
    /// Creator of the referenced ticket.
    pub operator: Option<String>,
}

impl DirtyMachineFilter {
    /// Whether `machine` (with its ticket, if loaded) passes the filter.
    #[must_use]
    pub fn matches(&self, machine: &DirtyMachine, ticket: Option<&Ticket>) -> bool {
        if let Some(ips) = &self.ip_list {
            if !ips.contains(&machine.ip) {
                return false;
            }
        }
        if self.ticket_id.is_some() && machine.ticket_id != self.ticket_id {
            return false;
        }
        if self.task_id.is_some() && machine.task_id != self.task_id {
            return false;
        }
        if let Some(ticket_type) = self.ticket_type {
            if ticket.map(|t| t.ticket_type) != Some(ticket_type) {
                return false;
            }
        }
        if let Some(operator) = &self.operator {
            if ticket.map(|t| t.creator.as_str()) != Some(operator.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Filter for the machine pool listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachinePoolFilter {
    /// Pool.
    pub pool: Option<PoolType>,
    /// Host IPs.
    pub ips: Option<Vec<String>>,
    /// Business.
    pub bk_biz_id: Option<i64>,
    /// City.
    pub city: Option<String>,
    /// Availability zone.
    pub sub_zone: Option<String>,
    /// Device class.
    pub device_class: Option<String>,
    /// OS name (substring match).
    pub os_name: Option<String>,
}

impl MachinePoolFilter {
    /// Whether `machine` passes the filter.
    #[must_use]
    pub fn matches(&self, machine: &DirtyMachine) -> bool {
        self.pool.is_none_or(|pool| machine.pool == pool)
            && self.ips.as_ref().is_none_or(|ips| ips.contains(&machine.ip))
            && self.bk_biz_id.is_none_or(|biz| machine.bk_biz_id == biz)
            && self.city.as_ref().is_none_or(|city| &machine.city == city)
            && self
                .sub_zone
                .as_ref()
                .is_none_or(|zone| &machine.sub_zone == zone)
            && self
                .device_class
                .as_ref()
                .is_none_or(|class| &machine.device_class == class)
            && self
                .os_name
                .as_ref()
                .is_none_or(|os| machine.os_name.contains(os.as_str()))
    }
}

/// Filter for the machine event listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineEventFilter {
    /// Host IPs.
    pub ips: Option<Vec<String>>,
    /// Business.
    pub bk_biz_id: Option<i64>,
    /// Event kind.
    pub event: Option<MachineEventType>,
    /// Operator.
    pub operator: Option<String>,
}

impl MachineEventFilter {
    /// Whether `event` passes the filter.
    #[must_use]
    pub fn matches(&self, event: &MachineEvent) -> bool {
        self.ips.as_ref().is_none_or(|ips| ips.contains(&event.ip))
            && self.bk_biz_id.is_none_or(|biz| event.bk_biz_id == biz)
            && self.event.is_none_or(|kind| event.event == kind)
            && self
                .operator
                .as_ref()
                .is_none_or(|operator| &event.creator == operator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_list_trims_and_drops_empty() {
        assert_eq!(
            split_list(" 1.1.1.1, ,2.2.2.2,"),
            vec!["1.1.1.1".to_string(), "2.2.2.2".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn split_ips_accepts_mixed_separators() {
        assert_eq!(
            split_ips("1.1.1.1\n2.2.2.2;3.3.3.3 4.4.4.4"),
            vec!["1.1.1.1", "2.2.2.2", "3.3.3.3", "4.4.4.4"]
        );
    }

    proptest! {
        #[test]
        fn split_list_roundtrips_clean_items(items in proptest::collection::vec("[a-z0-9.]{1,12}", 0..10)) {
            let joined = items.join(",");
            prop_assert_eq!(split_list(&joined), items);
        }
    }
}
