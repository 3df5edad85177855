//! Player actions as data, so the input layer and the scheduler feed the
//! engine through one ordered queue.

use crate::SimulationEngine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{AssetId, EquipmentId, WithdrawalReceipt};
use sim_econ::{parse_amount, ActionError, Conversion, Purchase};

/// A discrete request from the input layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    BuyEquipment {
        equipment: EquipmentId,
        displayed_price: Decimal,
    },
    SetMining {
        asset: AssetId,
        enabled: bool,
    },
    Convert {
        asset: AssetId,
    },
    Withdraw {
        amount: Option<Decimal>,
        address: String,
    },
}

impl Action {
    /// Withdrawal from raw form fields; an unparseable amount is kept as
    /// missing and rejected by the engine.
    pub fn withdraw_from_input(amount: &str, address: &str) -> Self {
        Action::Withdraw {
            amount: parse_amount(amount),
            address: address.to_string(),
        }
    }
}

/// What a successful action did.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Purchased(Purchase),
    MiningChanged {
        asset: AssetId,
        enabled: bool,
        changed: bool,
    },
    Converted(Conversion),
    Withdrawn(WithdrawalReceipt),
}

impl SimulationEngine {
    /// Apply one action. Runs to completion before anything else touches
    /// the state.
    pub fn dispatch(
        &mut self,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<ActionOutcome, ActionError> {
        match action {
            Action::BuyEquipment {
                equipment,
                displayed_price,
            } => self
                .buy_equipment(equipment, displayed_price)
                .map(ActionOutcome::Purchased),
            Action::SetMining { asset, enabled } => {
                self.set_mining(asset, enabled)
                    .map(|changed| ActionOutcome::MiningChanged {
                        asset,
                        enabled,
                        changed,
                    })
            }
            Action::Convert { asset } => self.convert(asset).map(ActionOutcome::Converted),
            Action::Withdraw { amount, address } => self
                .withdraw(amount, &address, now)
                .map(ActionOutcome::Withdrawn),
        }
    }
}
