// Copyright 2026 Agrimatch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application lifecycle: statuses, allowed transitions, and per-status
//! tallies for dashboard tabs.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    InterviewScheduled,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Pending,
        ApplicationStatus::UnderReview,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|s| s.as_label() == normalized)
            .ok_or_else(|| anyhow::anyhow!("unknown application status: {input}"))
    }

    pub fn is_final(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved | ApplicationStatus::Rejected
        )
    }

    pub fn can_move_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        if self.is_final() {
            return false;
        }
        match self {
            Pending => matches!(next, UnderReview | InterviewScheduled | Approved | Rejected),
            UnderReview => matches!(next, InterviewScheduled | Approved | Rejected),
            InterviewScheduled | Approved | Rejected => matches!(next, Approved | Rejected),
        }
    }

    pub fn transition(self, next: ApplicationStatus) -> Result<ApplicationStatus> {
        if !self.can_move_to(next) {
            anyhow::bail!(
                "cannot move application from {} to {}",
                self.as_label(),
                next.as_label()
            );
        }
        Ok(next)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationRow {
    pub id: String,
    pub listing_id: String,
    pub applicant_id: String,
    pub status: ApplicationStatus,
    pub message: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Counts per status, every status present even when zero.
pub fn status_counts(rows: &[ApplicationRow]) -> BTreeMap<&'static str, usize> {
    let mut counts: BTreeMap<&'static str, usize> = ApplicationStatus::ALL
        .into_iter()
        .map(|s| (s.as_label(), 0))
        .collect();
    for row in rows {
        *counts.entry(row.status.as_label()).or_default() += 1;
    }
    counts
}

pub fn filter_by_status(
    rows: Vec<ApplicationRow>,
    status: Option<ApplicationStatus>,
) -> Vec<ApplicationRow> {
    match status {
        None => rows,
        Some(status) => rows.into_iter().filter(|r| r.status == status).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, status: ApplicationStatus) -> ApplicationRow {
        ApplicationRow {
            id: id.to_string(),
            listing_id: "1".to_string(),
            applicant_id: "farmer".to_string(),
            status,
            message: String::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn parse_accepts_dashboard_spellings() -> Result<()> {
        assert_eq!(
            ApplicationStatus::parse("under-review")?,
            ApplicationStatus::UnderReview
        );
        assert_eq!(
            ApplicationStatus::parse("Interview Scheduled")?,
            ApplicationStatus::InterviewScheduled
        );
        assert!(ApplicationStatus::parse("withdrawn").is_err());
        Ok(())
    }

    #[test]
    fn final_statuses_cannot_move() {
        for status in ApplicationStatus::ALL {
            assert!(!ApplicationStatus::Approved.can_move_to(status));
            assert!(!ApplicationStatus::Rejected.can_move_to(status));
        }
        assert!(ApplicationStatus::Approved.is_final());
    }

    #[test]
    fn review_cannot_go_back_to_pending() {
        let err = ApplicationStatus::UnderReview
            .transition(ApplicationStatus::Pending)
            .unwrap_err();
        assert!(err.to_string().contains("under_review to pending"));
        assert!(
            ApplicationStatus::Pending
                .transition(ApplicationStatus::Approved)
                .is_ok()
        );
    }

    #[test]
    fn counts_include_empty_statuses() {
        let rows = vec![
            row("a", ApplicationStatus::Pending),
            row("b", ApplicationStatus::Pending),
            row("c", ApplicationStatus::Approved),
        ];
        let counts = status_counts(&rows);
        assert_eq!(counts["pending"], 2);
        assert_eq!(counts["approved"], 1);
        assert_eq!(counts["rejected"], 0);
        assert_eq!(counts.len(), 5);

        let pending = filter_by_status(rows, Some(ApplicationStatus::Pending));
        assert_eq!(pending.len(), 2);
    }
}
