//! Player transactions. Each either applies completely or returns an
//! [`ActionError`] with the state untouched.

use crate::{ActionError, MONEY_DP};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    AssetId, EconomyConfig, EquipmentId, GameState, WithdrawalReceipt, WithdrawalStatus,
};
use std::str::FromStr;
use tracing::warn;

/// Result of a successful equipment purchase.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Purchase {
    pub equipment: EquipmentId,
    /// Catalog price actually debited.
    pub price: Decimal,
    /// Units owned after the purchase.
    pub owned: u32,
    pub total_hashrate: f64,
}

/// Result of converting mined holdings into balance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Conversion {
    pub asset: AssetId,
    /// Holdings converted.
    pub amount: f64,
    /// USD credited.
    pub value: Decimal,
}

/// Buy one unit of `id`.
///
/// `expected_price` is what the caller displayed; the catalog price is
/// authoritative and a mismatch is only logged.
pub fn buy_equipment(
    state: &mut GameState,
    cfg: &EconomyConfig,
    id: EquipmentId,
    expected_price: Decimal,
) -> Result<Purchase, ActionError> {
    let spec = cfg
        .equipment_spec(id)
        .ok_or(ActionError::UnknownEquipment(id))?;
    if expected_price != spec.price {
        warn!(equipment = %id, %expected_price, catalog = %spec.price, "stale price, using catalog");
    }
    if state.balance < spec.price {
        return Err(ActionError::InsufficientFunds {
            needed: spec.price,
            available: state.balance,
        });
    }
    state.balance -= spec.price;
    let owned = state.equipment.entry(id).or_insert(0);
    *owned = owned.saturating_add(1);
    let owned = *owned;
    state.total_hashrate += spec.hashrate;
    Ok(Purchase {
        equipment: id,
        price: spec.price,
        owned,
        total_hashrate: state.total_hashrate,
    })
}

/// Switch mining of `asset` on or off.
///
/// Enabling requires hashrate. Returns whether the flag actually changed.
pub fn set_mining(state: &mut GameState, asset: AssetId, enabled: bool) -> Result<bool, ActionError> {
    if enabled && state.total_hashrate <= 0.0 {
        return Err(ActionError::NoEquipment);
    }
    let previous = state.mining.insert(asset, enabled).unwrap_or(false);
    Ok(previous != enabled)
}

/// Sell all holdings of `asset` at the current price.
pub fn convert(state: &mut GameState, asset: AssetId) -> Result<Conversion, ActionError> {
    let amount = state.holding(asset);
    if !(amount > 0.0) {
        return Err(ActionError::NothingToConvert(asset));
    }
    let units = Decimal::from_f64(amount).ok_or(ActionError::NonFinite)?;
    let value = units
        .checked_mul(state.price(asset))
        .ok_or(ActionError::NonFinite)?
        .round_dp(MONEY_DP);
    let balance = state
        .balance
        .checked_add(value)
        .ok_or(ActionError::NonFinite)?;
    state.balance = balance;
    state.holdings.insert(asset, 0.0);
    Ok(Conversion {
        asset,
        amount,
        value,
    })
}

/// Parse a user-entered withdrawal amount. Blank or non-numeric input yields
/// `None`, which [`withdraw`] rejects as below the minimum.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .ok()
        .or_else(|| Decimal::from_scientific(trimmed).ok())
}

/// Withdraw `amount` from the balance to `address`, keeping the fee out of
/// the withdrawn amount.
///
/// Checks run in order: amount (missing or under the minimum), address
/// (blank after trimming), funds. The receipt is prepended to the log.
pub fn withdraw(
    state: &mut GameState,
    cfg: &EconomyConfig,
    amount: Option<Decimal>,
    address: &str,
    now: DateTime<Utc>,
) -> Result<WithdrawalReceipt, ActionError> {
    let below = ActionError::BelowMinimum {
        minimum: cfg.withdrawal_minimum,
    };
    let amount = amount.ok_or_else(|| below.clone())?;
    if amount <= Decimal::ZERO || amount < cfg.withdrawal_minimum {
        return Err(below);
    }
    let address = address.trim();
    if address.is_empty() {
        return Err(ActionError::MissingAddress);
    }
    if amount > state.balance {
        return Err(ActionError::InsufficientFunds {
            needed: amount,
            available: state.balance,
        });
    }
    let fee = (amount * cfg.withdrawal_fee_rate).round_dp(MONEY_DP);
    let receipt = WithdrawalReceipt {
        requested: amount,
        fee,
        net: amount - fee,
        address: address.to_string(),
        timestamp: now,
        status: WithdrawalStatus::Processed,
    };
    state.balance -= amount;
    state.withdrawals.push_front(receipt.clone());
    Ok(receipt)
}
