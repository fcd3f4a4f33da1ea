//! Roll call - Who has to be accounted for when an evacuation starts

use std::collections::{HashMap, HashSet};

use crate::model::employee::Employee;
use crate::model::evacuation::{PersonKind, RollCallEntry};
use crate::model::visit::Visit;
use crate::model::visitor::Visitor;

/// Build the roll from visits currently on site and active employees
///
/// With a `location_id`, only visits and employees at that location are
/// included. Each visitor appears once even with several open visits; a
/// visit whose visitor record is missing is still listed under its id.
pub fn build_roll(
    visits: &[Visit],
    visitors: &[Visitor],
    employees: &[Employee],
    location_id: Option<&str>,
) -> Vec<RollCallEntry> {
    let at_location = |loc: Option<&str>| location_id.map_or(true, |wanted| loc == Some(wanted));
    let names: HashMap<&str, &str> = visitors.iter().map(|v| (v.id.as_str(), v.name.as_str())).collect();

    let mut seen = HashSet::new();
    let mut roll = Vec::new();

    let mut on_site: Vec<&Visit> = visits
        .iter()
        .filter(|v| v.is_on_site() && at_location(v.location_id.as_deref()))
        .collect();
    on_site.sort_by_key(|v| v.check_in_at());

    for visit in on_site {
        if !seen.insert(visit.visitor_id.as_str()) {
            continue;
        }
        let name = names.get(visit.visitor_id.as_str()).copied().unwrap_or("Unknown visitor");
        roll.push(RollCallEntry::new(&visit.visitor_id, PersonKind::Visitor, name).with_visit(&visit.id));
    }

    let mut staff: Vec<&Employee> = employees
        .iter()
        .filter(|e| e.active && at_location(e.location_id.as_deref()))
        .collect();
    staff.sort_by(|a, b| a.name.cmp(&b.name));

    roll.extend(
        staff
            .into_iter()
            .map(|e| RollCallEntry::new(&e.id, PersonKind::Employee, &e.name)),
    );
    roll
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::visit::NewVisit;
    use chrono::{Duration, Utc};
    use shared::CompanyId;

    fn visit_for(visitor: &Visitor, location: Option<&str>, checked_in: bool) -> Visit {
        let now = Utc::now();
        let mut visit = Visit::new(
            visitor.company_id.clone(),
            NewVisit {
                visitor_id: visitor.id.clone(),
                host_employee_id: "host".to_string(),
                location_id: location.map(String::from),
                purpose: None,
                scheduled_start: now,
                scheduled_end: now + Duration::hours(1),
            },
            false,
            now,
        );
        if checked_in {
            visit.check_in("B-000001", now).unwrap();
        }
        visit
    }

    #[test]
    fn test_roll_includes_on_site_visitors_and_active_staff() {
        let company = CompanyId::new("acme");
        let now = Utc::now();
        let alice = Visitor::new(company.clone(), "Alice", now);
        let bob = Visitor::new(company.clone(), "Bob", now);
        let visits = vec![visit_for(&alice, None, true), visit_for(&bob, None, false)];

        let mut retired = Employee::new(company.clone(), "Retired", now);
        retired.active = false;
        let employees = vec![Employee::new(company.clone(), "Grace", now), retired];

        let roll = build_roll(&visits, &[alice.clone(), bob], &employees, None);

        assert_eq!(roll.len(), 2);
        assert_eq!(roll[0].name, "Alice");
        assert_eq!(roll[0].person_kind, PersonKind::Visitor);
        assert_eq!(roll[0].visit_id.as_deref(), Some(visits[0].id.as_str()));
        assert_eq!(roll[1].name, "Grace");
        assert_eq!(roll[1].person_kind, PersonKind::Employee);
        assert!(roll.iter().all(|e| !e.accounted));
    }

    #[test]
    fn test_roll_restricted_to_location() {
        let company = CompanyId::new("acme");
        let now = Utc::now();
        let alice = Visitor::new(company.clone(), "Alice", now);
        let bob = Visitor::new(company.clone(), "Bob", now);
        let visits = vec![visit_for(&alice, Some("hq"), true), visit_for(&bob, Some("lab"), true)];
        let employees = vec![
            Employee::new(company.clone(), "At HQ", now).with_location("hq"),
            Employee::new(company.clone(), "Remote", now),
        ];

        let roll = build_roll(&visits, &[alice, bob], &employees, Some("hq"));

        let names: Vec<&str> = roll.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "At HQ"]);
    }

    #[test]
    fn test_visitor_listed_once() {
        let company = CompanyId::new("acme");
        let alice = Visitor::new(company, "Alice", Utc::now());
        let visits = vec![visit_for(&alice, None, true), visit_for(&alice, None, true)];

        let roll = build_roll(&visits, &[alice], &[], None);
        assert_eq!(roll.len(), 1);
    }

    #[test]
    fn test_missing_visitor_record_still_listed() {
        let company = CompanyId::new("acme");
        let ghost = Visitor::new(company, "Ghost", Utc::now());
        let visits = vec![visit_for(&ghost, None, true)];

        let roll = build_roll(&visits, &[], &[], None);
        assert_eq!(roll[0].name, "Unknown visitor");
        assert_eq!(roll[0].person_id, ghost.id);
    }
}
