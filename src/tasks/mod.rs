//! Daily task runners and their outcomes

pub mod family;
pub mod personal;

pub use family::run_family_tasks;
pub use personal::run_personal_tasks;

use crate::cloud::{PrizeResponse, NO_CHANCE_CODE};
use std::fmt;

/// Result of one lottery draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotteryResult {
    Won(String),
    NoChance,
    Failed(String),
}

impl LotteryResult {
    pub fn from_response(response: &PrizeResponse) -> Self {
        match response.error_code.as_deref() {
            Some(NO_CHANCE_CODE) => LotteryResult::NoChance,
            Some(code) if !code.is_empty() => LotteryResult::Failed(code.to_string()),
            _ => LotteryResult::Won(
                response
                    .prize_name
                    .clone()
                    .unwrap_or_else(|| "an unnamed prize".to_string()),
            ),
        }
    }
}

/// Outcome of one remote task call, rendered as one report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    SignIn {
        already_signed: bool,
        bonus_mb: u64,
    },
    Lottery {
        /// 1-based draw number
        draw: usize,
        result: LotteryResult,
    },
    FamilySignIn {
        /// Last four characters of the family id
        family: String,
        already_signed: bool,
        bonus_mb: u64,
    },
    NoFamilies,
    Failed {
        task: String,
        reason: String,
    },
}

impl TaskOutcome {
    pub fn failed(task: impl Into<String>, reason: impl fmt::Display) -> Self {
        TaskOutcome::Failed {
            task: task.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskOutcome::Failed { .. }
                | TaskOutcome::Lottery {
                    result: LotteryResult::Failed(_),
                    ..
                }
        )
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::SignIn {
                already_signed,
                bonus_mb,
            } => write!(
                f,
                "✅ {}, received {}M of space",
                if *already_signed {
                    "Already signed in"
                } else {
                    "Signed in"
                },
                bonus_mb
            ),
            TaskOutcome::Lottery { draw, result } => match result {
                LotteryResult::Won(prize) => write!(f, "🎁 Draw {}: won {}", draw, prize),
                LotteryResult::NoChance => {
                    write!(f, "🎲 Draw {}: failed, no chances left", draw)
                }
                LotteryResult::Failed(code) => write!(f, "⚠️ Draw {}: failed ({})", draw, code),
            },
            TaskOutcome::FamilySignIn {
                family,
                already_signed,
                bonus_mb,
            } => write!(
                f,
                "🏠 Family {}: {}, received {}M of space",
                family,
                if *already_signed {
                    "already signed in"
                } else {
                    "signed in"
                },
                bonus_mb
            ),
            TaskOutcome::NoFamilies => write!(f, "🏠 No family space found"),
            TaskOutcome::Failed { task, reason } => write!(f, "⚠️ {} failed: {}", task, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prize(error_code: Option<&str>, prize_name: Option<&str>) -> PrizeResponse {
        PrizeResponse {
            error_code: error_code.map(str::to_string),
            prize_name: prize_name.map(str::to_string),
        }
    }

    #[test]
    fn test_lottery_result_from_response() {
        assert_eq!(
            LotteryResult::from_response(&prize(None, Some("50M space"))),
            LotteryResult::Won("50M space".to_string())
        );
        assert_eq!(
            LotteryResult::from_response(&prize(Some("User_Not_Chance"), None)),
            LotteryResult::NoChance
        );
        assert_eq!(
            LotteryResult::from_response(&prize(Some("ACTIVITY_OVER"), None)),
            LotteryResult::Failed("ACTIVITY_OVER".to_string())
        );
        assert_eq!(
            LotteryResult::from_response(&prize(Some(""), Some("1G"))),
            LotteryResult::Won("1G".to_string())
        );
    }

    #[test]
    fn test_outcome_lines() {
        let sign = TaskOutcome::SignIn {
            already_signed: false,
            bonus_mb: 50,
        };
        assert_eq!(sign.to_string(), "✅ Signed in, received 50M of space");

        let lottery = TaskOutcome::Lottery {
            draw: 2,
            result: LotteryResult::NoChance,
        };
        assert_eq!(lottery.to_string(), "🎲 Draw 2: failed, no chances left");

        let family = TaskOutcome::FamilySignIn {
            family: "4439".to_string(),
            already_signed: true,
            bonus_mb: 0,
        };
        assert_eq!(
            family.to_string(),
            "🏠 Family 4439: already signed in, received 0M of space"
        );

        let failed = TaskOutcome::failed("Sign-in", "HTTP error: timeout");
        assert_eq!(failed.to_string(), "⚠️ Sign-in failed: HTTP error: timeout");
    }

    #[test]
    fn test_is_failure() {
        assert!(TaskOutcome::failed("x", "y").is_failure());
        assert!(TaskOutcome::Lottery {
            draw: 1,
            result: LotteryResult::Failed("E".to_string())
        }
        .is_failure());
        assert!(!TaskOutcome::Lottery {
            draw: 1,
            result: LotteryResult::NoChance
        }
        .is_failure());
        assert!(!TaskOutcome::NoFamilies.is_failure());
    }
}
