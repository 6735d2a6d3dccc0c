use crate::capacity::{CapacitySnapshot, StorageUsage};
use crate::cloud::{
    ApiFuture, CloudApi, FamilyInfo, FamilySignResponse, LotteryTask, PrizeResponse,
    UserSignResponse,
};
use crate::error::CloudError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

/// In-process storage service for tests and dry runs
///
/// Every call is recorded. Sign-ins that were not already done today add
/// their bonus to the reported capacity, so before/after snapshots show the
/// same deltas the real service would.
pub struct MockCloud {
    login_error: Option<CloudError>,
    login_failures_remaining: Mutex<u32>,
    user_sign: Result<UserSignResponse, CloudError>,
    prizes: Vec<Result<PrizeResponse, CloudError>>,
    prize_index: Mutex<usize>,
    families: Result<Vec<FamilyInfo>, CloudError>,
    family_sign: FamilySignResponse,
    family_sign_errors: HashMap<String, CloudError>,
    base_capacity: CapacitySnapshot,
    capacity_error: Option<CloudError>,
    awarded: Mutex<(u64, u64)>,
    calls: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockCloud {
    /// A service where every call succeeds and one family space exists
    pub fn success() -> Self {
        Self {
            login_error: None,
            login_failures_remaining: Mutex::new(0),
            user_sign: Ok(UserSignResponse {
                is_sign: false,
                netdisk_bonus: 50,
            }),
            prizes: vec![Ok(PrizeResponse {
                error_code: None,
                prize_name: Some("50M space".to_string()),
            })],
            prize_index: Mutex::new(0),
            families: Ok(vec![FamilyInfo {
                family_id: Some("165515815004439".to_string()),
            }]),
            family_sign: FamilySignResponse {
                sign_status: false,
                bonus_space: 20,
            },
            family_sign_errors: HashMap::new(),
            base_capacity: CapacitySnapshot::new(
                StorageUsage {
                    used_bytes: 100 * GB,
                    total_bytes: 1024 * GB,
                },
                StorageUsage {
                    used_bytes: 10 * GB,
                    total_bytes: 2048 * GB,
                },
            ),
            capacity_error: None,
            awarded: Mutex::new((0, 0)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every login attempt fails with `error`
    pub fn with_login_error(mut self, error: CloudError) -> Self {
        self.login_error = Some(error);
        self
    }

    /// The first `failures` login attempts fail, later ones succeed
    pub fn with_login_failures(self, failures: u32) -> Self {
        *lock(&self.login_failures_remaining) = failures;
        self
    }

    pub fn with_user_sign(mut self, response: UserSignResponse) -> Self {
        self.user_sign = Ok(response);
        self
    }

    pub fn with_user_sign_error(mut self, error: CloudError) -> Self {
        self.user_sign = Err(error);
        self
    }

    /// Lottery responses, returned in order and cycled
    pub fn with_prizes(mut self, prizes: Vec<Result<PrizeResponse, CloudError>>) -> Self {
        self.prizes = prizes;
        self
    }

    pub fn with_families(mut self, families: Vec<FamilyInfo>) -> Self {
        self.families = Ok(families);
        self
    }

    pub fn with_family_list_error(mut self, error: CloudError) -> Self {
        self.families = Err(error);
        self
    }

    pub fn with_family_sign(mut self, response: FamilySignResponse) -> Self {
        self.family_sign = response;
        self
    }

    pub fn with_family_sign_error(mut self, family_id: &str, error: CloudError) -> Self {
        self.family_sign_errors.insert(family_id.to_string(), error);
        self
    }

    pub fn with_capacity(mut self, capacity: CapacitySnapshot) -> Self {
        self.base_capacity = capacity;
        self
    }

    pub fn with_capacity_error(mut self, error: CloudError) -> Self {
        self.capacity_error = Some(error);
        self
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of login attempts made so far
    pub fn login_count(&self) -> usize {
        lock(&self.calls).iter().filter(|c| *c == "login").count()
    }

    fn record(&self, call: impl Into<String>) {
        lock(&self.calls).push(call.into());
    }
}

impl CloudApi for MockCloud {
    fn login(&self) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record("login");

            if let Some(ref error) = self.login_error {
                return Err(error.clone());
            }

            let mut remaining = lock(&self.login_failures_remaining);
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CloudError::LoginFailed("mock login failure".to_string()));
            }
            Ok(())
        })
    }

    fn user_sign(&self) -> ApiFuture<'_, UserSignResponse> {
        Box::pin(async move {
            self.record("user_sign");

            let response = self.user_sign.clone()?;
            if !response.is_sign {
                lock(&self.awarded).0 += response.netdisk_bonus * MB;
            }
            Ok(response)
        })
    }

    fn draw_prize(&self, task: LotteryTask) -> ApiFuture<'_, PrizeResponse> {
        Box::pin(async move {
            self.record(format!("draw_prize:{}", task.task_id()));

            if self.prizes.is_empty() {
                return Ok(PrizeResponse::default());
            }

            let mut index = lock(&self.prize_index);
            let response = self.prizes[*index % self.prizes.len()].clone();
            *index += 1;
            response
        })
    }

    fn family_list(&self) -> ApiFuture<'_, Vec<FamilyInfo>> {
        Box::pin(async move {
            self.record("family_list");
            self.families.clone()
        })
    }

    fn family_sign<'a>(&'a self, family_id: &'a str) -> ApiFuture<'a, FamilySignResponse> {
        Box::pin(async move {
            self.record(format!("family_sign:{}", family_id));

            if let Some(error) = self.family_sign_errors.get(family_id) {
                return Err(error.clone());
            }

            let response = self.family_sign.clone();
            if !response.sign_status {
                lock(&self.awarded).1 += response.bonus_space * MB;
            }
            Ok(response)
        })
    }

    fn capacity(&self) -> ApiFuture<'_, CapacitySnapshot> {
        Box::pin(async move {
            self.record("capacity");

            if let Some(ref error) = self.capacity_error {
                return Err(error.clone());
            }

            let (personal, family) = *lock(&self.awarded);
            let mut snapshot = self.base_capacity;
            snapshot.personal.total_bytes += personal;
            snapshot.family.total_bytes += family;
            Ok(snapshot)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capacity_grows_with_awarded_bonus() {
        let cloud = MockCloud::success();

        let before = cloud.capacity().await.unwrap();
        cloud.user_sign().await.unwrap();
        cloud.family_sign("165515815004439").await.unwrap();
        let after = cloud.capacity().await.unwrap();

        let delta = after.delta_since(&before);
        assert_eq!(delta.personal_bytes, (50 * MB) as i64);
        assert_eq!(delta.family_bytes, (20 * MB) as i64);
    }

    #[tokio::test]
    async fn test_already_signed_awards_nothing() {
        let cloud = MockCloud::success().with_user_sign(UserSignResponse {
            is_sign: true,
            netdisk_bonus: 50,
        });

        let before = cloud.capacity().await.unwrap();
        cloud.user_sign().await.unwrap();
        assert_eq!(cloud.capacity().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_login_failures_then_success() {
        let cloud = MockCloud::success().with_login_failures(2);

        assert!(cloud.login().await.is_err());
        assert!(cloud.login().await.is_err());
        assert!(cloud.login().await.is_ok());
        assert_eq!(cloud.login_count(), 3);
    }

    #[tokio::test]
    async fn test_prizes_cycle() {
        let cloud = MockCloud::success().with_prizes(vec![
            Ok(PrizeResponse::default()),
            Err(CloudError::NotLoggedIn),
        ]);

        assert!(cloud.draw_prize(LotteryTask::Sign).await.is_ok());
        assert!(cloud.draw_prize(LotteryTask::Photo).await.is_err());
        assert!(cloud.draw_prize(LotteryTask::Kj).await.is_ok());
    }
}
