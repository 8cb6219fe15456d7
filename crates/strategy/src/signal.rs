use serde::{Deserialize, Serialize};

use common::{Direction, Error, Result};

/// Whether the strategy currently holds the asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Flat,
    Long,
}

/// Latched decision state of one signal engine.
///
/// While `Flat`, `entry_price` is 0 and `passed_fall_point` is false.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineState {
    pub position: Position,
    pub entry_price: f64,
    /// Set once the slow RSI climbs above the fall-latch level while long.
    pub passed_fall_point: bool,
    pub last_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub oversold: f64,
    pub overbought: f64,
    pub fall_latch: f64,
}

impl Thresholds {
    /// Requires `oversold < fall_latch < overbought`.
    pub fn validate(&self) -> Result<()> {
        let all_finite = [self.oversold, self.overbought, self.fall_latch]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(Error::Config("RSI thresholds must be finite numbers".into()));
        }
        if !(self.oversold < self.fall_latch && self.fall_latch < self.overbought) {
            return Err(Error::Config(format!(
                "RSI thresholds must satisfy oversold < sell_when_rsi_falls_to < overbought, \
                 got {} / {} / {}",
                self.oversold, self.fall_latch, self.overbought
            )));
        }
        Ok(())
    }
}

/// Both oscillator readings for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings {
    pub fast: f64,
    pub slow: f64,
}

/// A state change that produces advice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Slow frame oversold while the fast frame is already overbought.
    Enter,
    /// Slow frame overbought.
    ExitOnStrength { entry_price: f64 },
    /// Slow frame fell back under the fall-latch level after crossing it.
    ExitOnStall { entry_price: f64 },
}

impl Decision {
    pub fn direction(&self) -> Direction {
        match self {
            Decision::Enter => Direction::Long,
            Decision::ExitOnStrength { .. } | Decision::ExitOnStall { .. } => Direction::Short,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Decision::Enter => "Buying",
            Decision::ExitOnStrength { .. } => "Selling",
            Decision::ExitOnStall { .. } => "Selling due to RSI stall",
        }
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self {
            Decision::Enter => None,
            Decision::ExitOnStrength { entry_price } | Decision::ExitOnStall { entry_price } => {
                Some(*entry_price)
            }
        }
    }
}

/// One tick of the rule table.
///
/// Rules run in order and each sees the position left by the previous one, so
/// an exit on strength pre-empts a stall exit in the same tick.
pub fn transition(
    mut state: EngineState,
    thresholds: &Thresholds,
    readings: Readings,
    price: f64,
) -> (EngineState, Option<Decision>) {
    state.last_price = price;
    let mut decision = None;

    if state.position == Position::Flat
        && readings.slow < thresholds.oversold
        && readings.fast > thresholds.overbought
    {
        state.position = Position::Long;
        state.entry_price = state.last_price;
        state.passed_fall_point = false;
        decision = Some(Decision::Enter);
    }

    if state.position == Position::Long && readings.slow > thresholds.overbought {
        decision = Some(Decision::ExitOnStrength {
            entry_price: state.entry_price,
        });
        go_flat(&mut state);
    }

    if state.position == Position::Long && readings.slow > thresholds.fall_latch {
        state.passed_fall_point = true;
    }

    if state.position == Position::Long
        && state.passed_fall_point
        && readings.slow < thresholds.fall_latch
    {
        decision = Some(Decision::ExitOnStall {
            entry_price: state.entry_price,
        });
        go_flat(&mut state);
    }

    (state, decision)
}

fn go_flat(state: &mut EngineState) {
    state.position = Position::Flat;
    state.entry_price = 0.0;
    state.passed_fall_point = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Thresholds = Thresholds {
        oversold: 30.0,
        overbought: 70.0,
        fall_latch: 50.0,
    };

    fn long_at(entry_price: f64, passed_fall_point: bool) -> EngineState {
        EngineState {
            position: Position::Long,
            entry_price,
            passed_fall_point,
            last_price: entry_price,
        }
    }

    fn r(fast: f64, slow: f64) -> Readings {
        Readings { fast, slow }
    }

    #[test]
    fn enters_long_when_slow_oversold_and_fast_overbought() {
        let (state, decision) = transition(EngineState::default(), &T, r(75.0, 25.0), 101.5);
        assert_eq!(decision, Some(Decision::Enter));
        assert_eq!(state.position, Position::Long);
        assert_eq!(state.entry_price, 101.5);
        assert!(!state.passed_fall_point);
        assert_eq!(state.last_price, 101.5);
    }

    #[test]
    fn no_entry_without_fast_confirmation() {
        let (state, decision) = transition(EngineState::default(), &T, r(65.0, 25.0), 100.0);
        assert!(decision.is_none());
        assert_eq!(state.position, Position::Flat);
        assert_eq!(state.last_price, 100.0);
    }

    #[test]
    fn exits_on_strength_regardless_of_latch() {
        for latched in [false, true] {
            let (state, decision) = transition(long_at(90.0, latched), &T, r(50.0, 75.0), 120.0);
            assert_eq!(decision, Some(Decision::ExitOnStrength { entry_price: 90.0 }));
            assert_eq!(state.position, Position::Flat);
            assert_eq!(state.entry_price, 0.0);
            assert!(!state.passed_fall_point);
        }
    }

    #[test]
    fn latches_fall_point_above_mid_level() {
        let (state, decision) = transition(long_at(90.0, false), &T, r(50.0, 55.0), 95.0);
        assert!(decision.is_none());
        assert_eq!(state.position, Position::Long);
        assert!(state.passed_fall_point);
        assert_eq!(state.entry_price, 90.0);
    }

    #[test]
    fn stall_exit_requires_latch() {
        let (state, decision) = transition(long_at(90.0, false), &T, r(50.0, 45.0), 92.0);
        assert!(decision.is_none());
        assert_eq!(state.position, Position::Long);

        let (state, decision) = transition(long_at(90.0, true), &T, r(50.0, 45.0), 92.0);
        assert_eq!(decision, Some(Decision::ExitOnStall { entry_price: 90.0 }));
        assert_eq!(state.position, Position::Flat);
        assert_eq!(state.entry_price, 0.0);
    }

    #[test]
    fn rise_then_fall_fires_one_stall_exit() {
        let mut state = long_at(90.0, false);
        let mut decisions = Vec::new();
        for slow in [40.0, 48.0, 55.0, 52.0, 50.0, 45.0, 40.0] {
            let (next, decision) = transition(state, &T, r(50.0, slow), 100.0);
            state = next;
            decisions.extend(decision);
        }
        assert_eq!(decisions, vec![Decision::ExitOnStall { entry_price: 90.0 }]);
        assert_eq!(state.position, Position::Flat);
    }

    #[test]
    fn reading_on_the_latch_level_neither_arms_nor_exits() {
        let (state, decision) = transition(long_at(90.0, false), &T, r(50.0, 50.0), 91.0);
        assert!(decision.is_none());
        assert!(!state.passed_fall_point);

        let (state, decision) = transition(long_at(90.0, true), &T, r(50.0, 50.0), 91.0);
        assert!(decision.is_none());
        assert_eq!(state.position, Position::Long);
    }

    #[test]
    fn strength_exit_wins_over_stall_exit() {
        // Thresholds that could never pass validation, to force both exit guards.
        let broken = Thresholds {
            oversold: 10.0,
            overbought: 60.0,
            fall_latch: 80.0,
        };
        let (state, decision) = transition(long_at(90.0, true), &broken, r(50.0, 70.0), 99.0);
        assert_eq!(decision, Some(Decision::ExitOnStrength { entry_price: 90.0 }));
        assert_eq!(state.position, Position::Flat);
    }

    #[test]
    fn flat_state_never_exits() {
        let (state, decision) = transition(EngineState::default(), &T, r(50.0, 75.0), 100.0);
        assert!(decision.is_none());
        assert_eq!(state.position, Position::Flat);
        assert!(!state.passed_fall_point);
    }

    #[test]
    fn thresholds_validate_ordering() {
        assert!(T.validate().is_ok());
        let inverted = Thresholds {
            oversold: 70.0,
            overbought: 30.0,
            fall_latch: 50.0,
        };
        assert!(inverted.validate().is_err());
        let nan = Thresholds {
            fall_latch: f64::NAN,
            ..T
        };
        assert!(nan.validate().is_err());
    }
}
