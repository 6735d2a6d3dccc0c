//! Per-account orchestration
//!
//! For every account: build a client, log in with a fixed number of
//! attempts, snapshot capacity, run the personal and family task runners,
//! snapshot capacity again. Nothing an account does can abort the run for
//! the accounts after it.

use crate::capacity::CapacitySnapshot;
use crate::cloud::{CloudApi, HttpCloudClient, MockCloud};
use crate::config::{Account, TaskConfig};
use crate::error::CloudError;
use crate::report::{AccountReport, RunReport};
use crate::tasks::{run_family_tasks, run_personal_tasks};
use log::{info, warn};
use std::sync::Arc;

/// Builds the storage service client for one account
pub type ClientFactory =
    Box<dyn Fn(&Account) -> Result<Arc<dyn CloudApi>, CloudError> + Send + Sync>;

/// Runs the daily tasks for a list of accounts
pub struct CheckinRunner {
    tasks: TaskConfig,
    factory: ClientFactory,
}

impl CheckinRunner {
    pub fn new(tasks: TaskConfig, factory: ClientFactory) -> Self {
        Self { tasks, factory }
    }

    /// Runner talking to the real service
    pub fn http(tasks: TaskConfig) -> Self {
        Self::new(
            tasks,
            Box::new(|account| {
                let client = HttpCloudClient::new(account.clone())?;
                Ok(Arc::new(client) as Arc<dyn CloudApi>)
            }),
        )
    }

    /// Runner against a fresh in-process mock per account
    pub fn dry_run(tasks: TaskConfig) -> Self {
        Self::new(
            tasks,
            Box::new(|_| Ok(Arc::new(MockCloud::success()) as Arc<dyn CloudApi>)),
        )
    }

    /// Process every account in order
    pub async fn run(&self, accounts: &[Account]) -> RunReport {
        let mut report = RunReport::new();

        for account in accounts {
            report.push(self.run_account(account).await);
        }

        info!(
            "Run finished: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }

    /// Process one account
    pub async fn run_account(&self, account: &Account) -> AccountReport {
        let masked = account.masked();
        info!("Processing account {}", masked);

        let api = match (self.factory)(account) {
            Ok(api) => api,
            Err(e) => {
                warn!("Could not create client for {}: {}", masked, e);
                return AccountReport::login_failed(masked, e.to_string());
            }
        };
        let api = api.as_ref();

        if let Err(e) = self.login(api, &masked).await {
            return AccountReport::login_failed(masked, e.to_string());
        }

        let mut report = AccountReport::new(masked);
        report.before = Self::snapshot(api, &report.masked_user, "before").await;

        let delay = self.tasks.delay();
        let personal = run_personal_tasks(api, &self.tasks.lotteries, delay);

        let (personal_outcomes, family_outcomes) = if !self.tasks.family {
            (personal.await, Vec::new())
        } else if self.tasks.parallel {
            tokio::join!(personal, run_family_tasks(api))
        } else {
            let personal_outcomes = personal.await;
            (personal_outcomes, run_family_tasks(api).await)
        };

        report.outcomes = personal_outcomes;
        report.outcomes.extend(family_outcomes);

        report.after = Self::snapshot(api, &report.masked_user, "after").await;
        report
    }

    /// Log in with a fixed number of attempts, pausing between them
    async fn login(&self, api: &dyn CloudApi, masked: &str) -> Result<(), CloudError> {
        let attempts = self.tasks.login_attempts.max(1);
        let mut last_error = CloudError::NotLoggedIn;

        for attempt in 1..=attempts {
            match api.login().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Login attempt {}/{} for {} failed: {}",
                        attempt, attempts, masked, e
                    );
                    last_error = e;
                }
            }

            if attempt < attempts && !self.tasks.delay().is_zero() {
                tokio::time::sleep(self.tasks.delay()).await;
            }
        }

        Err(last_error)
    }

    async fn snapshot(api: &dyn CloudApi, masked: &str, label: &str) -> Option<CapacitySnapshot> {
        match api.capacity().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Capacity snapshot ({}) for {} failed: {}", label, masked, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::LotteryTask;
    use crate::report::AccountStatus;
    use crate::tasks::TaskOutcome;

    const MB: i64 = 1024 * 1024;

    fn fast_tasks() -> TaskConfig {
        TaskConfig {
            delay_ms: 0,
            ..TaskConfig::default()
        }
    }

    fn runner_with(tasks: TaskConfig, cloud: Arc<MockCloud>) -> CheckinRunner {
        CheckinRunner::new(
            tasks,
            Box::new(move |_| Ok(Arc::clone(&cloud) as Arc<dyn CloudApi>)),
        )
    }

    fn account() -> Account {
        Account::new("13812345678", "secret")
    }

    #[tokio::test]
    async fn test_full_account_run() {
        let cloud = Arc::new(MockCloud::success());
        let runner = runner_with(fast_tasks(), Arc::clone(&cloud));

        let report = runner.run_account(&account()).await;

        assert_eq!(report.masked_user, "138****5678");
        assert_eq!(report.status, AccountStatus::Completed);
        // sign-in, three draws, one family
        assert_eq!(report.outcomes.len(), 5);
        assert!(matches!(
            report.outcomes.last(),
            Some(TaskOutcome::FamilySignIn { .. })
        ));

        let delta = report.delta().unwrap();
        assert_eq!(delta.personal_bytes, 50 * MB);
        assert_eq!(delta.family_bytes, 20 * MB);

        let calls = cloud.calls();
        assert_eq!(calls.first().map(String::as_str), Some("login"));
        assert_eq!(calls[1], "capacity");
        assert_eq!(calls.last().map(String::as_str), Some("capacity"));
    }

    #[tokio::test]
    async fn test_sequential_mode_runs_personal_before_family() {
        let cloud = Arc::new(MockCloud::success());
        let tasks = TaskConfig {
            parallel: false,
            lotteries: vec![LotteryTask::Sign],
            ..fast_tasks()
        };
        let runner = runner_with(tasks, Arc::clone(&cloud));

        runner.run_account(&account()).await;

        assert_eq!(
            cloud.calls(),
            vec![
                "login",
                "capacity",
                "user_sign",
                "draw_prize:TASK_SIGNIN",
                "family_list",
                "family_sign:165515815004439",
                "capacity"
            ]
        );
    }

    #[tokio::test]
    async fn test_parallel_mode_interleaves_family_with_draws() {
        let cloud = Arc::new(MockCloud::success());
        let tasks = TaskConfig {
            delay_ms: 10,
            parallel: true,
            ..TaskConfig::default()
        };
        let runner = runner_with(tasks, Arc::clone(&cloud));

        let report = runner.run_account(&account()).await;
        assert_eq!(report.outcomes.len(), 5);

        let calls = cloud.calls();
        let position = |name: &str| calls.iter().position(|c| c == name).unwrap();
        let first_draw = calls
            .iter()
            .position(|c| c.starts_with("draw_prize:"))
            .unwrap();
        let second_draw = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| c.starts_with("draw_prize:"))
            .nth(1)
            .map(|(index, _)| index)
            .unwrap();

        // Family runner proceeds while the personal runner sleeps before its draws
        assert!(position("family_list") < second_draw);
        assert!(position("family_list") < first_draw);
        assert!(position("family_sign:165515815004439") < first_draw);
    }

    #[tokio::test]
    async fn test_family_tasks_can_be_disabled() {
        let cloud = Arc::new(MockCloud::success());
        let tasks = TaskConfig {
            family: false,
            ..fast_tasks()
        };
        let runner = runner_with(tasks, Arc::clone(&cloud));

        let report = runner.run_account(&account()).await;

        assert_eq!(report.outcomes.len(), 4);
        assert!(!cloud.calls().iter().any(|c| c.starts_with("family")));
    }

    #[tokio::test]
    async fn test_login_retried_fixed_number_of_times() {
        let cloud = Arc::new(MockCloud::success().with_login_failures(2));
        let runner = runner_with(fast_tasks(), Arc::clone(&cloud));

        let report = runner.run_account(&account()).await;

        assert!(report.is_success());
        assert_eq!(cloud.login_count(), 3);
    }

    #[tokio::test]
    async fn test_login_failure_skips_tasks() {
        let cloud = Arc::new(
            MockCloud::success()
                .with_login_error(CloudError::LoginFailed("wrong password".to_string())),
        );
        let runner = runner_with(fast_tasks(), Arc::clone(&cloud));

        let report = runner.run_account(&account()).await;

        assert_eq!(
            report.status,
            AccountStatus::LoginFailed("Login failed: wrong password".to_string())
        );
        assert!(report.outcomes.is_empty());
        assert_eq!(cloud.calls(), vec!["login", "login", "login"]);
    }

    #[tokio::test]
    async fn test_factory_error_is_reported() {
        let runner = CheckinRunner::new(
            fast_tasks(),
            Box::new(|_| Err(CloudError::Http("no tls backend".to_string()))),
        );

        let report = runner.run_account(&account()).await;
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_capacity_failure_leaves_snapshots_empty() {
        let cloud = Arc::new(
            MockCloud::success().with_capacity_error(CloudError::Http("503".to_string())),
        );
        let runner = runner_with(fast_tasks(), cloud);

        let report = runner.run_account(&account()).await;

        assert!(report.is_success());
        assert!(report.before.is_none());
        assert!(report.after.is_none());
        assert!(report.delta().is_none());
    }

    #[tokio::test]
    async fn test_run_accumulates_accounts() {
        let runner = CheckinRunner::dry_run(fast_tasks());
        let accounts = vec![
            Account::new("13800000001", "a"),
            Account::new("13800000002", "b"),
        ];

        let report = runner.run(&accounts).await;

        assert_eq!(report.accounts.len(), 2);
        assert_eq!(report.succeeded(), 2);
        let totals = report.totals();
        assert_eq!(totals.personal_gained_bytes, 100 * MB);
        assert_eq!(totals.family_gained_bytes, 40 * MB);
    }
}
