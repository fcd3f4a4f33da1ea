//! Visit reports

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::model::visit::{Visit, VisitStatus};

/// Aggregate figures for the visits in a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total: usize,
    /// Keyed by status name; every status is present
    pub by_status: BTreeMap<String, usize>,
    pub completed: usize,
    pub walk_ins: usize,
    pub average_on_site_minutes: Option<f64>,
    pub busiest_host: Option<HostCount>,
    /// Hour of day (UTC) with the most check-ins
    pub peak_check_in_hour: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCount {
    pub host_employee_id: String,
    pub visits: usize,
}

/// Summarize visits whose scheduled window overlaps `[from, to)`
///
/// Ties for busiest host and peak hour go to the smaller id or hour.
pub fn summarize_visits(visits: &[Visit], from: DateTime<Utc>, to: DateTime<Utc>) -> VisitSummary {
    let in_window: Vec<&Visit> = visits
        .iter()
        .filter(|v| v.scheduled_start < to && v.scheduled_end > from)
        .collect();

    let mut by_status: BTreeMap<String, usize> =
        VisitStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
    let mut per_host: HashMap<&str, usize> = HashMap::new();
    let mut per_hour: BTreeMap<u32, usize> = BTreeMap::new();
    let mut durations = Vec::new();
    let mut walk_ins = 0;

    for visit in &in_window {
        *by_status.entry(visit.status().as_str().to_string()).or_default() += 1;
        *per_host.entry(visit.host_employee_id.as_str()).or_default() += 1;
        if let Some(at) = visit.check_in_at() {
            *per_hour.entry(at.hour()).or_default() += 1;
        }
        if let Some(d) = visit.duration() {
            durations.push(d.num_seconds() as f64 / 60.0);
        }
        if visit.walk_in {
            walk_ins += 1;
        }
    }

    let average_on_site_minutes =
        (!durations.is_empty()).then(|| durations.iter().sum::<f64>() / durations.len() as f64);

    let busiest_host = per_host
        .into_iter()
        .max_by(|(a_id, a), (b_id, b)| a.cmp(b).then_with(|| b_id.cmp(a_id)))
        .map(|(id, visits)| HostCount {
            host_employee_id: id.to_string(),
            visits,
        });

    let peak_check_in_hour = per_hour
        .into_iter()
        .max_by(|(a_hour, a), (b_hour, b)| a.cmp(b).then_with(|| b_hour.cmp(a_hour)))
        .map(|(hour, _)| hour);

    VisitSummary {
        from,
        to,
        total: in_window.len(),
        completed: by_status.get(VisitStatus::CheckedOut.as_str()).copied().unwrap_or(0),
        by_status,
        walk_ins,
        average_on_site_minutes,
        busiest_host,
        peak_check_in_hour,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::visit::NewVisit;
    use chrono::{Duration, TimeZone};
    use shared::CompanyId;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn visit(host: &str, start: DateTime<Utc>) -> Visit {
        Visit::new(
            CompanyId::new("acme"),
            NewVisit {
                visitor_id: "v".to_string(),
                host_employee_id: host.to_string(),
                location_id: None,
                purpose: None,
                scheduled_start: start,
                scheduled_end: start + Duration::hours(1),
            },
            false,
            start,
        )
    }

    #[test]
    fn test_empty_window() {
        let summary = summarize_visits(&[], at(0, 0), at(23, 0));
        assert_eq!(summary.total, 0);
        assert_eq!(summary.by_status.len(), VisitStatus::ALL.len());
        assert!(summary.average_on_site_minutes.is_none());
        assert!(summary.busiest_host.is_none());
        assert!(summary.peak_check_in_hour.is_none());
    }

    #[test]
    fn test_summary_figures() {
        let mut a = visit("host-a", at(9, 0));
        a.check_in("B-1", at(9, 5)).unwrap();
        a.check_out(at(9, 35)).unwrap();

        let mut b = visit("host-a", at(9, 30));
        b.check_in("B-2", at(9, 40)).unwrap();
        b.check_out(at(10, 40)).unwrap();

        let mut c = visit("host-b", at(14, 0));
        c.check_in("B-3", at(14, 10)).unwrap();

        let mut d = visit("host-b", at(15, 0));
        d.cancel(at(12, 0)).unwrap();
        d.walk_in = true;

        let summary = summarize_visits(&[a, b, c, d], at(0, 0), at(23, 59));

        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.by_status["checked_in"], 1);
        assert_eq!(summary.by_status["cancelled"], 1);
        assert_eq!(summary.by_status["scheduled"], 0);
        assert_eq!(summary.walk_ins, 1);
        assert_eq!(summary.average_on_site_minutes, Some(45.0));
        assert_eq!(summary.peak_check_in_hour, Some(9));

        // 2 visits each; ties go to the smaller id
        let host = summary.busiest_host.unwrap();
        assert_eq!(host.host_employee_id, "host-a");
        assert_eq!(host.visits, 2);
    }

    #[test]
    fn test_window_excludes_outside_visits() {
        let early = visit("host", at(6, 0));
        let inside = visit("host", at(12, 0));

        let summary = summarize_visits(&[early, inside], at(8, 0), at(18, 0));
        assert_eq!(summary.total, 1);
    }
}
