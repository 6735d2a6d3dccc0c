use crate::cloud::CloudApi;
use crate::tasks::TaskOutcome;
use log::{debug, warn};

/// Sign in to every family space of the account, one after another
///
/// A failure to list families is recorded as a single `Failed` outcome.
/// Per-family failures are recorded and the loop continues with the next
/// family. Entries without an id are skipped.
pub async fn run_family_tasks(api: &dyn CloudApi) -> Vec<TaskOutcome> {
    let families = match api.family_list().await {
        Ok(families) => families,
        Err(e) => {
            warn!("Failed to list family spaces: {}", e);
            return vec![TaskOutcome::failed("Family list", e)];
        }
    };

    if families.is_empty() {
        return vec![TaskOutcome::NoFamilies];
    }

    let mut outcomes = Vec::with_capacity(families.len());
    for info in families {
        let Some(family_id) = info.family_id else {
            warn!("Skipping family space entry without an id");
            continue;
        };

        let label = family_label(&family_id);
        debug!("Signing in to family space {}", label);

        match api.family_sign(&family_id).await {
            Ok(response) => outcomes.push(TaskOutcome::FamilySignIn {
                family: label,
                already_signed: response.sign_status,
                bonus_mb: response.bonus_space,
            }),
            Err(e) => {
                warn!("Family space {} sign-in failed: {}", label, e);
                outcomes.push(TaskOutcome::failed(format!("Family {}", label), e));
            }
        }
    }

    if outcomes.is_empty() {
        outcomes.push(TaskOutcome::NoFamilies);
    }

    outcomes
}

/// Last four characters of a family id
pub fn family_label(family_id: &str) -> String {
    let chars: Vec<char> = family_id.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{FamilyInfo, MockCloud};
    use crate::error::CloudError;

    fn family(id: Option<&str>) -> FamilyInfo {
        FamilyInfo {
            family_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_family_label() {
        assert_eq!(family_label("165515815004439"), "4439");
        assert_eq!(family_label("12"), "12");
        assert_eq!(family_label(""), "");
    }

    #[tokio::test]
    async fn test_signs_every_family() {
        let cloud = MockCloud::success().with_families(vec![
            family(Some("100000001111")),
            family(Some("100000002222")),
        ]);

        let outcomes = run_family_tasks(&cloud).await;

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            &outcomes[0],
            TaskOutcome::FamilySignIn { family, .. } if family == "1111"
        ));
        assert!(matches!(
            &outcomes[1],
            TaskOutcome::FamilySignIn { family, .. } if family == "2222"
        ));
        assert_eq!(
            cloud.calls(),
            vec![
                "family_list",
                "family_sign:100000001111",
                "family_sign:100000002222"
            ]
        );
    }

    #[tokio::test]
    async fn test_no_families() {
        let cloud = MockCloud::success().with_families(vec![]);
        assert_eq!(run_family_tasks(&cloud).await, vec![TaskOutcome::NoFamilies]);
    }

    #[tokio::test]
    async fn test_entries_without_id_are_skipped() {
        let cloud = MockCloud::success().with_families(vec![family(None), family(Some("9876"))]);

        let outcomes = run_family_tasks(&cloud).await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(cloud.calls(), vec!["family_list", "family_sign:9876"]);

        let cloud = MockCloud::success().with_families(vec![family(None)]);
        assert_eq!(run_family_tasks(&cloud).await, vec![TaskOutcome::NoFamilies]);
    }

    #[tokio::test]
    async fn test_family_failure_does_not_stop_loop() {
        let cloud = MockCloud::success()
            .with_families(vec![family(Some("111122223333")), family(Some("444455556666"))])
            .with_family_sign_error(
                "111122223333",
                CloudError::Api {
                    code: "FamilyNotExist".to_string(),
                    message: String::new(),
                },
            );

        let outcomes = run_family_tasks(&cloud).await;

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(&outcomes[0], TaskOutcome::Failed { task, .. } if task == "Family 3333"));
        assert!(matches!(&outcomes[1], TaskOutcome::FamilySignIn { .. }));
    }

    #[tokio::test]
    async fn test_list_failure() {
        let cloud = MockCloud::success().with_family_list_error(CloudError::NotLoggedIn);

        let outcomes = run_family_tasks(&cloud).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_failure());
    }
}
