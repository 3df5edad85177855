//! User-facing messages for startup and action results.

use crate::{ActionOutcome, Startup};
use serde::Serialize;
use sim_core::EconomyConfig;
use sim_econ::ActionError;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A short message for the notification area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn startup(startup: &Startup, cfg: &EconomyConfig) -> Self {
        match startup {
            Startup::Fresh => Self::new(
                NoticeLevel::Success,
                format!(
                    "Welcome to CryptoMiner Pro! Starting bonus: ${}",
                    cfg.starting_bonus
                ),
            ),
            Startup::Restored => Self::new(NoticeLevel::Success, "Progress loaded!"),
            Startup::Recovered(_) => Self::new(NoticeLevel::Error, "Failed to load saved game"),
        }
    }

    pub fn for_result(result: &Result<ActionOutcome, ActionError>) -> Self {
        match result {
            Ok(outcome) => Self::for_outcome(outcome),
            Err(e) => Self::for_error(e),
        }
    }

    pub fn for_outcome(outcome: &ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Purchased(p) => {
                Self::new(NoticeLevel::Success, format!("Purchased: {}!", p.equipment))
            }
            ActionOutcome::MiningChanged {
                asset,
                enabled,
                changed,
            } => match (enabled, changed) {
                (true, true) => Self::new(NoticeLevel::Success, format!("Mining {asset} started!")),
                (false, true) => Self::new(NoticeLevel::Info, format!("Mining {asset} stopped")),
                (true, false) => Self::new(NoticeLevel::Info, format!("Already mining {asset}")),
                (false, false) => Self::new(NoticeLevel::Info, format!("Not mining {asset}")),
            },
            ActionOutcome::Converted(c) => Self::new(
                NoticeLevel::Success,
                format!(
                    "Converted {:.8} {} to ${:.2}",
                    c.amount,
                    c.asset.ticker(),
                    c.value.round_dp(2)
                ),
            ),
            ActionOutcome::Withdrawn(r) => Self::new(
                NoticeLevel::Success,
                format!(
                    "Withdrawal of ${:.2} processed! Fee: ${:.2}",
                    r.net.round_dp(2),
                    r.fee.round_dp(2)
                ),
            ),
        }
    }

    pub fn for_error(err: &ActionError) -> Self {
        let message = match err {
            ActionError::InsufficientFunds { .. } => "Insufficient funds!".to_string(),
            ActionError::NoEquipment => "Buy equipment to start mining!".to_string(),
            ActionError::NothingToConvert(asset) => {
                format!("You have no {} to convert", asset.ticker())
            }
            ActionError::BelowMinimum { minimum } => format!("Minimum withdrawal: ${minimum}"),
            ActionError::MissingAddress => "Enter a wallet address".to_string(),
            other => other.to_string(),
        };
        Self::new(NoticeLevel::Error, message)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use sim_core::{AssetId, WithdrawalReceipt, WithdrawalStatus};
    use sim_econ::Conversion;

    #[test]
    fn welcome_mentions_bonus() {
        let n = Notice::startup(&Startup::Fresh, &EconomyConfig::default());
        assert_eq!(n.level, NoticeLevel::Success);
        assert_eq!(n.message, "Welcome to CryptoMiner Pro! Starting bonus: $1000");
    }

    #[test]
    fn withdrawal_and_conversion_messages() {
        let receipt = WithdrawalReceipt {
            requested: Decimal::new(10, 0),
            fee: Decimal::new(2, 1),
            net: Decimal::new(98, 1),
            address: "X".into(),
            timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            status: WithdrawalStatus::Processed,
        };
        let n = Notice::for_outcome(&ActionOutcome::Withdrawn(receipt));
        assert_eq!(n.message, "Withdrawal of $9.80 processed! Fee: $0.20");

        let n = Notice::for_outcome(&ActionOutcome::Converted(Conversion {
            asset: AssetId::Bitcoin,
            amount: 2.0,
            value: Decimal::new(90_000, 0),
        }));
        assert_eq!(n.message, "Converted 2.00000000 BTC to $90000.00");
    }

    #[test]
    fn unchanged_toggle_is_not_a_start() {
        let toggle = |enabled, changed| {
            Notice::for_outcome(&ActionOutcome::MiningChanged {
                asset: AssetId::Ethereum,
                enabled,
                changed,
            })
        };
        let started = toggle(true, true);
        assert_eq!(started.level, NoticeLevel::Success);
        assert_eq!(started.message, "Mining ethereum started!");
        let again = toggle(true, false);
        assert_eq!(again.level, NoticeLevel::Info);
        assert_eq!(again.message, "Already mining ethereum");
        assert_eq!(toggle(false, true).message, "Mining ethereum stopped");
        assert_eq!(toggle(false, false).message, "Not mining ethereum");
    }

    #[test]
    fn errors_are_error_level() {
        let n = Notice::for_result(&Err(ActionError::NothingToConvert(AssetId::Dogecoin)));
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.message, "You have no DOGE to convert");
        assert_eq!(n.to_string(), "[error] You have no DOGE to convert");
    }
}
