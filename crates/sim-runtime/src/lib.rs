#![deny(warnings)]

//! Runtime for the crypto miner: the engine that owns the game state, the
//! command surface consumed by the input layer, the read-only snapshot for
//! the view layer, and the drivers that advance time.

use chrono::{DateTime, Utc};
use persistence::{Gateway, LoadError, LoadOutcome};
use rust_decimal::Decimal;
use sim_core::{AssetId, EconomyConfig, EquipmentId, GameState, WithdrawalReceipt};
use sim_econ::{ActionError, Conversion, MiningReport, Purchase, RandomSource};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub mod command;
pub mod driver;
pub mod notice;
pub mod scheduler;
pub mod snapshot;

pub use command::{Action, ActionOutcome};
pub use driver::{run_seconds, RunSummary};
pub use notice::{Notice, NoticeLevel};
pub use scheduler::{EngineHandle, Scheduler, SchedulerConfig, SchedulerError};
pub use snapshot::{AssetView, EquipmentView, GameSnapshot};

/// How the engine obtained its initial state.
#[derive(Debug)]
pub enum Startup {
    /// No save existed; the starting bonus was granted and saved.
    Fresh,
    /// A save was merged over the defaults.
    Restored,
    /// A save existed but was unusable; the plain default state is used.
    Recovered(LoadError),
}

/// Owns the one game state and applies every mutation to it, writing the
/// state through the gateway after each successful change.
pub struct SimulationEngine {
    config: EconomyConfig,
    state: GameState,
    rng: Box<dyn RandomSource + Send>,
    gateway: Gateway,
}

impl SimulationEngine {
    /// Load the saved state or create a new one.
    ///
    /// Without a save the starting bonus is granted and written once. An
    /// unusable save falls back to the default state with no bonus and is
    /// left in place until the next write.
    pub fn initialize<R>(config: EconomyConfig, gateway: Gateway, rng: R) -> (Self, Startup)
    where
        R: RandomSource + Send + 'static,
    {
        let (state, startup) = match gateway.load(&config) {
            LoadOutcome::Absent => (GameState::with_starting_bonus(&config), Startup::Fresh),
            LoadOutcome::Restored(state) => (state, Startup::Restored),
            LoadOutcome::Failed(e) => {
                warn!(error = %e, "saved state unusable, starting from defaults");
                (GameState::new(&config), Startup::Recovered(e))
            }
        };
        let mut engine = Self {
            config,
            state,
            rng: Box::new(rng),
            gateway,
        };
        if matches!(startup, Startup::Fresh) {
            info!(bonus = %engine.config.starting_bonus, "new game");
            engine.save();
        }
        (engine, startup)
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Read-only view for rendering.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot::capture(&self.state, &self.config)
    }

    /// Write the current state. Failures are logged and reported as `false`.
    pub fn save(&mut self) -> bool {
        self.gateway.save_or_warn(&self.state)
    }

    pub fn buy_equipment(
        &mut self,
        id: EquipmentId,
        displayed_price: Decimal,
    ) -> Result<Purchase, ActionError> {
        let purchase = sim_econ::buy_equipment(&mut self.state, &self.config, id, displayed_price)?;
        info!(equipment = %id, owned = purchase.owned, hashrate = purchase.total_hashrate, "equipment bought");
        self.save();
        Ok(purchase)
    }

    /// Returns whether the flag changed; an unchanged flag is not re-saved.
    pub fn set_mining(&mut self, asset: AssetId, enabled: bool) -> Result<bool, ActionError> {
        let changed = sim_econ::set_mining(&mut self.state, asset, enabled)?;
        if changed {
            info!(%asset, enabled, "mining toggled");
            self.save();
        }
        Ok(changed)
    }

    pub fn convert(&mut self, asset: AssetId) -> Result<Conversion, ActionError> {
        let conversion = sim_econ::convert(&mut self.state, asset)?;
        info!(%asset, amount = conversion.amount, value = %conversion.value, "holdings converted");
        self.save();
        Ok(conversion)
    }

    pub fn withdraw(
        &mut self,
        amount: Option<Decimal>,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalReceipt, ActionError> {
        let receipt = sim_econ::withdraw(&mut self.state, &self.config, amount, address, now)?;
        info!(requested = %receipt.requested, fee = %receipt.fee, "withdrawal processed");
        self.save();
        Ok(receipt)
    }

    /// One production tick. Saved when anything was mined.
    pub fn tick(&mut self, now: DateTime<Utc>) -> MiningReport {
        let report = sim_econ::mine_tick(&mut self.state, &self.config, self.rng.as_mut(), now);
        if !report.is_empty() {
            self.save();
        }
        report
    }

    /// One price drift tick.
    pub fn drift_prices(&mut self) -> BTreeMap<AssetId, Decimal> {
        let prices = sim_econ::drift_prices(&mut self.state, &self.config, self.rng.as_mut());
        self.save();
        prices
    }

    /// Projected hourly USD earnings of `asset`.
    pub fn hourly_earnings(&self, asset: AssetId) -> Decimal {
        sim_econ::hourly_earnings(&self.state, &self.config, asset)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use persistence::MemoryStore;
    use sim_econ::FixedSequence;

    pub fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    /// Fresh engine over a memory store with neutral noise.
    pub fn fresh_engine() -> (SimulationEngine, MemoryStore) {
        let store = MemoryStore::new();
        let (engine, startup) = SimulationEngine::initialize(
            EconomyConfig::default(),
            Gateway::new(store.clone()),
            FixedSequence::midpoint(),
        );
        assert!(matches!(startup, Startup::Fresh));
        (engine, store)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use persistence::{MemoryStore, DEFAULT_RECORD_KEY};
    use sim_econ::{FixedSequence, SeededRng};

    #[test]
    fn fresh_start_grants_bonus_and_saves_once() {
        let (engine, store) = fresh_engine();
        assert_eq!(engine.state().balance, Decimal::new(1_000, 0));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn restart_restores_without_bonus() {
        let (mut engine, store) = fresh_engine();
        engine
            .buy_equipment(EquipmentId::GpuBasic, Decimal::new(300, 0))
            .unwrap();
        let (again, startup) = SimulationEngine::initialize(
            EconomyConfig::default(),
            Gateway::new(store.clone()),
            SeededRng::new(7),
        );
        assert!(matches!(startup, Startup::Restored));
        assert_eq!(again.state().balance, Decimal::new(700, 0));
        assert_eq!(again.state().total_hashrate, 20.0);
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn corrupt_save_recovers_to_zero_balance_without_writing() {
        let store = MemoryStore::with_record(DEFAULT_RECORD_KEY, "{not json");
        let (engine, startup) = SimulationEngine::initialize(
            EconomyConfig::default(),
            Gateway::new(store.clone()),
            FixedSequence::midpoint(),
        );
        assert!(matches!(startup, Startup::Recovered(LoadError::Corrupt(_))));
        assert_eq!(engine.state(), &GameState::new(&EconomyConfig::default()));
        assert_eq!(engine.state().balance, Decimal::ZERO);
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.get(DEFAULT_RECORD_KEY).as_deref(), Some("{not json"));
    }

    #[test]
    fn rejected_actions_do_not_write() {
        let (mut engine, store) = fresh_engine();
        assert!(engine.set_mining(AssetId::Bitcoin, true).is_err());
        assert!(engine.convert(AssetId::Bitcoin).is_err());
        assert!(engine
            .buy_equipment(EquipmentId::Farm, Decimal::new(100_000, 0))
            .is_err());
        assert!(engine.withdraw(Some(Decimal::new(5, 0)), "X", at(0)).is_err());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn mining_flow_end_to_end() {
        let (mut engine, store) = fresh_engine();
        engine
            .buy_equipment(EquipmentId::GpuBasic, Decimal::new(300, 0))
            .unwrap();
        assert!(engine.set_mining(AssetId::Dogecoin, true).unwrap());
        assert!(!engine.set_mining(AssetId::Dogecoin, true).unwrap());
        let writes = store.write_count();
        for s in 0..3_600 {
            engine.tick(at(s));
        }
        assert_eq!(store.write_count(), writes + 3_600);
        // 1e-3 * 20 per hour at neutral noise
        let mined = engine.state().holding(AssetId::Dogecoin);
        assert!((mined - 0.02).abs() < 1e-9, "mined {mined}");
        let conversion = engine.convert(AssetId::Dogecoin).unwrap();
        assert!(conversion.value > Decimal::ZERO);
        assert_eq!(engine.state().balance, Decimal::new(700, 0) + conversion.value);
        assert!(engine.hourly_earnings(AssetId::Dogecoin) > Decimal::ZERO);
        assert_eq!(engine.hourly_earnings(AssetId::Bitcoin), Decimal::ZERO);
    }

    #[test]
    fn idle_tick_does_not_write() {
        let (mut engine, store) = fresh_engine();
        assert!(engine.tick(at(1)).is_empty());
        assert_eq!(store.write_count(), 1);
    }

    fn reload(store: &MemoryStore) -> GameState {
        match Gateway::new(store.clone()).load(&EconomyConfig::default()) {
            LoadOutcome::Restored(state) => state,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn saved_record_keeps_up_with_ticks() {
        let (mut engine, store) = fresh_engine();
        engine.tick(at(1));
        assert_eq!(&reload(&store), engine.state());

        engine
            .buy_equipment(EquipmentId::GpuBasic, Decimal::new(300, 0))
            .unwrap();
        engine.set_mining(AssetId::Bitcoin, true).unwrap();
        engine.tick(at(2));
        engine.tick(at(3));
        assert_eq!(engine.state().last_tick_at, Some(at(3)));
        let saved = reload(&store);
        assert_eq!(saved.last_tick_at, Some(at(3)));
        assert!(saved.holding(AssetId::Bitcoin) > 0.0);
    }

    #[test]
    fn drift_writes_and_respects_floor() {
        let store = MemoryStore::new();
        let (mut engine, _) = SimulationEngine::initialize(
            EconomyConfig::default(),
            Gateway::new(store.clone()),
            FixedSequence::new(vec![0.0]),
        );
        for _ in 0..500 {
            engine.drift_prices();
        }
        for asset in AssetId::ALL {
            assert_eq!(engine.state().price(asset), engine.config().min_price(asset));
            assert_eq!(engine.state().history_len(asset), 50);
        }
        assert_eq!(store.write_count(), 501);
    }
}
