//! Storage service client
//!
//! The service is reached through the [`CloudApi`] trait. [`HttpCloudClient`]
//! talks to the real endpoints; [`MockCloud`] is an in-process stand-in used
//! by tests and dry runs.

pub mod auth;
pub mod client;
pub mod mock;

pub use client::HttpCloudClient;
pub use mock::MockCloud;

use crate::capacity::CapacitySnapshot;
use crate::error::CloudError;
use serde::{Deserialize, Deserializer, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`CloudApi`] methods
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CloudError>> + Send + 'a>>;

/// Remote operations offered by the storage service
pub trait CloudApi: Send + Sync {
    /// Establish a session for the account this client was built for
    fn login(&self) -> ApiFuture<'_, ()>;

    /// Daily personal sign-in
    fn user_sign(&self) -> ApiFuture<'_, UserSignResponse>;

    /// One lottery draw
    fn draw_prize(&self, task: LotteryTask) -> ApiFuture<'_, PrizeResponse>;

    /// Family spaces the account belongs to
    fn family_list(&self) -> ApiFuture<'_, Vec<FamilyInfo>>;

    /// Daily sign-in for one family space
    fn family_sign<'a>(&'a self, family_id: &'a str) -> ApiFuture<'a, FamilySignResponse>;

    /// Current personal and family capacity
    fn capacity(&self) -> ApiFuture<'_, CapacitySnapshot>;
}

/// Lottery endpoints, all part of the daily sign-in activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LotteryTask {
    /// Sign-in lottery
    Sign,
    /// Photo album lottery
    Photo,
    /// Extra lottery draw
    Kj,
}

impl LotteryTask {
    pub const ACTIVITY_ID: &'static str = "ACT_SIGNIN";

    pub fn task_id(&self) -> &'static str {
        match self {
            LotteryTask::Sign => "TASK_SIGNIN",
            LotteryTask::Photo => "TASK_SIGNIN_PHOTOS",
            LotteryTask::Kj => "TASK_2022_FLDFS_KJ",
        }
    }
}

/// Response of the personal sign-in call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSignResponse {
    /// Already signed in today before this call
    #[serde(rename = "isSign")]
    pub is_sign: bool,
    /// Bonus in MB
    #[serde(rename = "netdiskBonus", default)]
    pub netdisk_bonus: u64,
}

/// Response of a lottery call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrizeResponse {
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
    #[serde(rename = "prizeName", default)]
    pub prize_name: Option<String>,
}

/// Error code returned when the lottery has no chances left today
pub const NO_CHANCE_CODE: &str = "User_Not_Chance";

/// One entry of the family list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyInfo {
    #[serde(
        rename = "familyId",
        default,
        deserialize_with = "deserialize_optional_id"
    )]
    pub family_id: Option<String>,
}

/// Envelope of the family list call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FamilyListResponse {
    #[serde(rename = "familyInfoResp", default)]
    pub family_info_resp: Option<Vec<FamilyInfo>>,
}

/// Response of a family sign-in call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySignResponse {
    /// Already signed in today before this call
    #[serde(rename = "signStatus", deserialize_with = "deserialize_flag")]
    pub sign_status: bool,
    /// Bonus in MB
    #[serde(rename = "bonusSpace", default)]
    pub bonus_space: u64,
}

/// Capacity info block as returned by the size-info call
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct CapacityInfo {
    #[serde(rename = "totalSize", default)]
    pub total_size: u64,
    #[serde(rename = "usedSize", default)]
    pub used_size: u64,
}

/// Envelope of the size-info call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSizeInfoResponse {
    #[serde(rename = "cloudCapacityInfo", default)]
    pub cloud_capacity_info: Option<CapacityInfo>,
    #[serde(rename = "familyCapacityInfo", default)]
    pub family_capacity_info: Option<CapacityInfo>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

/// Ids arrive as JSON numbers or strings depending on the endpoint
fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawId> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawId::Text(text)) if !text.trim().is_empty() => Some(text),
        Some(RawId::Number(number)) if number != 0 => Some(number.to_string()),
        _ => None,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Number(i64),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawFlag::deserialize(deserializer)? {
        RawFlag::Bool(flag) => flag,
        RawFlag::Number(number) => number != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lottery_task_ids() {
        assert_eq!(LotteryTask::Sign.task_id(), "TASK_SIGNIN");
        assert_eq!(LotteryTask::Photo.task_id(), "TASK_SIGNIN_PHOTOS");
        assert_eq!(LotteryTask::Kj.task_id(), "TASK_2022_FLDFS_KJ");
    }

    #[test]
    fn test_user_sign_deserialization() {
        let response: UserSignResponse =
            serde_json::from_str(r#"{"isSign": true, "netdiskBonus": 50, "userSignId": 1}"#)
                .unwrap();
        assert!(response.is_sign);
        assert_eq!(response.netdisk_bonus, 50);
    }

    #[test]
    fn test_prize_response_with_error_code() {
        let response: PrizeResponse =
            serde_json::from_str(r#"{"errorCode": "User_Not_Chance"}"#).unwrap();
        assert_eq!(response.error_code.as_deref(), Some(NO_CHANCE_CODE));
        assert_eq!(response.prize_name, None);
    }

    #[test]
    fn test_family_list_accepts_numeric_and_string_ids() {
        let response: FamilyListResponse = serde_json::from_str(
            r#"{"familyInfoResp": [{"familyId": 165515815004439}, {"familyId": "300001234"}, {}]}"#,
        )
        .unwrap();

        let ids: Vec<Option<String>> = response
            .family_info_resp
            .unwrap()
            .into_iter()
            .map(|info| info.family_id)
            .collect();
        assert_eq!(
            ids,
            vec![
                Some("165515815004439".to_string()),
                Some("300001234".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_family_list_without_entries() {
        let response: FamilyListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.family_info_resp.is_none());
    }

    #[test]
    fn test_family_sign_accepts_numeric_status() {
        let signed: FamilySignResponse =
            serde_json::from_str(r#"{"signStatus": 1, "bonusSpace": 20}"#).unwrap();
        assert!(signed.sign_status);
        assert_eq!(signed.bonus_space, 20);

        let fresh: FamilySignResponse =
            serde_json::from_str(r#"{"signStatus": false, "bonusSpace": 10}"#).unwrap();
        assert!(!fresh.sign_status);
    }

    #[test]
    fn test_size_info_with_missing_family_block() {
        let response: UserSizeInfoResponse = serde_json::from_str(
            r#"{"cloudCapacityInfo": {"totalSize": 1073741824, "usedSize": 1024, "freeSize": 0}}"#,
        )
        .unwrap();
        let cloud = response.cloud_capacity_info.unwrap();
        assert_eq!(cloud.total_size, 1073741824);
        assert_eq!(cloud.used_size, 1024);
        assert!(response.family_capacity_info.is_none());
    }
}
