//! Report builder
//!
//! Collects per-account outcomes and capacity snapshots and renders them as
//! the text block pushed to the webhooks.

pub mod table;

use crate::capacity::{format_delta, format_gb, CapacityDelta, CapacitySnapshot};
use crate::tasks::TaskOutcome;
use chrono::{DateTime, Utc};
use table::Table;

/// Timestamp type used across reports
pub type Timestamp = DateTime<Utc>;

/// How far an account got
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountStatus {
    Completed,
    LoginFailed(String),
}

/// Everything recorded for one account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountReport {
    pub masked_user: String,
    pub status: AccountStatus,
    pub outcomes: Vec<TaskOutcome>,
    pub before: Option<CapacitySnapshot>,
    pub after: Option<CapacitySnapshot>,
}

impl AccountReport {
    pub fn new(masked_user: impl Into<String>) -> Self {
        Self {
            masked_user: masked_user.into(),
            status: AccountStatus::Completed,
            outcomes: Vec::new(),
            before: None,
            after: None,
        }
    }

    pub fn login_failed(masked_user: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: AccountStatus::LoginFailed(reason.into()),
            ..Self::new(masked_user)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AccountStatus::Completed
    }

    /// Capacity gained during the run, when both snapshots were taken
    pub fn delta(&self) -> Option<CapacityDelta> {
        match (self.before, self.after) {
            (Some(before), Some(after)) => Some(after.delta_since(&before)),
            _ => None,
        }
    }

    fn render_into(&self, out: &mut Vec<String>) {
        out.push(format!("🔔 Account {}", self.masked_user));

        if let AccountStatus::LoginFailed(ref reason) = self.status {
            out.push(format!("❌ Login failed: {}", reason));
            return;
        }

        out.extend(self.outcomes.iter().map(ToString::to_string));

        match (self.after, self.delta()) {
            (Some(after), Some(delta)) => out.push(format!(
                "📦 Personal {} GB ({}) | Family {} GB ({})",
                format_gb(after.personal.total_bytes),
                format_delta(delta.personal_bytes),
                format_gb(after.family.total_bytes),
                format_delta(delta.family_bytes),
            )),
            (Some(after), None) => out.push(format!(
                "📦 Personal {} GB | Family {} GB",
                format_gb(after.personal.total_bytes),
                format_gb(after.family.total_bytes),
            )),
            _ => out.push("📦 Capacity unavailable".to_string()),
        }
    }
}

/// Sums over every account with an `after` snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityTotals {
    pub personal_total_bytes: u64,
    pub family_total_bytes: u64,
    pub personal_gained_bytes: i64,
    pub family_gained_bytes: i64,
}

/// Report of one complete run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub started_at: Timestamp,
    pub accounts: Vec<AccountReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(started_at: Timestamp) -> Self {
        Self {
            started_at,
            accounts: Vec::new(),
        }
    }

    pub fn push(&mut self, account: AccountReport) {
        self.accounts.push(account);
    }

    pub fn succeeded(&self) -> usize {
        self.accounts.iter().filter(|a| a.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.accounts.len() - self.succeeded()
    }

    /// True when there were accounts and none of them logged in
    pub fn all_failed(&self) -> bool {
        !self.accounts.is_empty() && self.succeeded() == 0
    }

    pub fn totals(&self) -> CapacityTotals {
        let mut totals = CapacityTotals::default();

        for account in &self.accounts {
            let Some(after) = account.after else {
                continue;
            };
            totals.personal_total_bytes += after.personal.total_bytes;
            totals.family_total_bytes += after.family.total_bytes;

            if let Some(delta) = account.delta() {
                totals.personal_gained_bytes += delta.personal_bytes;
                totals.family_gained_bytes += delta.family_bytes;
            }
        }

        totals
    }

    pub fn title(&self) -> String {
        format!(
            "Cloud check-in {}: {}/{} accounts succeeded",
            self.started_at.format("%Y-%m-%d"),
            self.succeeded(),
            self.accounts.len()
        )
    }

    /// Render the full report text
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        for account in &self.accounts {
            account.render_into(&mut lines);
            lines.push(String::new());
        }

        let with_capacity: Vec<&AccountReport> =
            self.accounts.iter().filter(|a| a.after.is_some()).collect();

        if !with_capacity.is_empty() {
            let totals = self.totals();

            lines.push("📊 Capacity summary".to_string());
            let mut table = Table::new(vec!["Account", "Personal (GB)", "Family (GB)"]);
            for account in with_capacity {
                if let Some(after) = account.after {
                    table.add_row(vec![
                        account.masked_user.clone(),
                        format_gb(after.personal.total_bytes),
                        format_gb(after.family.total_bytes),
                    ]);
                }
            }
            table.add_row(vec![
                "Total".to_string(),
                format_gb(totals.personal_total_bytes),
                format_gb(totals.family_total_bytes),
            ]);
            lines.push(table.render());

            lines.push(format!(
                "📈 Gained this run: personal {}, family {}",
                format_delta(totals.personal_gained_bytes),
                format_delta(totals.family_gained_bytes),
            ));
        }

        if self.failed() > 0 {
            lines.push(format!("❗ {} account(s) failed to log in", self.failed()));
        }

        lines.join("\n").trim_end().to_string()
    }
}
