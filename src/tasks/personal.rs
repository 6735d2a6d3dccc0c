use crate::cloud::{CloudApi, LotteryTask};
use crate::tasks::{LotteryResult, TaskOutcome};
use log::{debug, warn};
use std::time::Duration;

/// Run the personal sign-in followed by the configured lottery draws
///
/// Every lottery call is preceded by `delay`. A failing call is recorded
/// as a `Failed` outcome and the remaining calls still run.
pub async fn run_personal_tasks(
    api: &dyn CloudApi,
    lotteries: &[LotteryTask],
    delay: Duration,
) -> Vec<TaskOutcome> {
    let mut outcomes = Vec::with_capacity(lotteries.len() + 1);

    match api.user_sign().await {
        Ok(response) => outcomes.push(TaskOutcome::SignIn {
            already_signed: response.is_sign,
            bonus_mb: response.netdisk_bonus,
        }),
        Err(e) => {
            warn!("Personal sign-in failed: {}", e);
            outcomes.push(TaskOutcome::failed("Sign-in", e));
        }
    }

    for (index, task) in lotteries.iter().enumerate() {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let draw = index + 1;
        debug!("Lottery draw {} ({})", draw, task.task_id());

        let outcome = match api.draw_prize(*task).await {
            Ok(response) => TaskOutcome::Lottery {
                draw,
                result: LotteryResult::from_response(&response),
            },
            Err(e) => {
                warn!("Lottery draw {} failed: {}", draw, e);
                TaskOutcome::failed(format!("Draw {}", draw), e)
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}
