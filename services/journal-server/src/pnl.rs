//! PnL derivation shared by every ingestion path
//!
//! Manual POSTs, webhook opens and webhook closes with missing numbers all go
//! through [`resolve`], so two callers supplying different subsets of fields
//! end up with the same stored values.

use rust_decimal::Decimal;

use crate::error::{JournalError, Result};
use crate::models::{Direction, Outcome};

/// Decimal places kept for derived values
const PNL_SCALE: u32 = 8;

/// Largest accepted price. Keeps `diff * leverage` well inside Decimal range.
pub const MAX_PRICE: Decimal = Decimal::from_parts(0xA4C6_8000, 0x0003_8D7E, 0, false, 0); // 1e15

/// Largest accepted |pnl|, so any realistic number of stored trades can be summed
pub const MAX_ABS_PNL: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0); // 1e18

/// Derived numeric fields of a closed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub outcome: Outcome,
}

fn overflow(what: &str) -> JournalError {
    JournalError::Validation(format!("{} is out of range for the given prices", what))
}

/// Compute pnl, pnl percent and outcome from prices alone.
///
/// `pnl = (LONG ? exit - entry : entry - exit) * leverage`
/// `pnl_percent = diff / entry * 100 * leverage` (0 when entry is 0)
pub fn derive(direction: Direction, entry: Decimal, exit: Decimal, leverage: u32) -> Result<Derived> {
    let diff = match direction {
        Direction::Long => exit.checked_sub(entry),
        Direction::Short => entry.checked_sub(exit),
    }
    .ok_or_else(|| overflow("pnl"))?;
    let leverage = Decimal::from(leverage.max(1));
    let pnl = bounded_pnl(diff.checked_mul(leverage).ok_or_else(|| overflow("pnl"))?.round_dp(PNL_SCALE))?;
    let pnl_percent = match diff.checked_div(entry) {
        Some(ratio) => ratio
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|pct| pct.checked_mul(leverage))
            .ok_or_else(|| overflow("pnl_percent"))?
            .round_dp(PNL_SCALE),
        None => Decimal::ZERO,
    };

    Ok(Derived {
        pnl,
        pnl_percent,
        outcome: outcome_for(pnl),
    })
}

/// Reject a pnl too large to be aggregated safely
pub fn bounded_pnl(pnl: Decimal) -> Result<Decimal> {
    if pnl.abs() > MAX_ABS_PNL {
        return Err(JournalError::Validation(format!("pnl magnitude must not exceed {}", MAX_ABS_PNL)));
    }
    Ok(pnl)
}

/// Outcome from the sign of pnl
pub fn outcome_for(pnl: Decimal) -> Outcome {
    if pnl > Decimal::ZERO {
        Outcome::Win
    } else if pnl < Decimal::ZERO {
        Outcome::Loss
    } else {
        Outcome::Breakeven
    }
}

/// Fill in whatever the caller left out. Explicit values always win; an
/// explicit `Open` outcome is ignored since the trade is being closed.
pub fn resolve(
    direction: Direction,
    entry: Decimal,
    exit: Decimal,
    leverage: u32,
    pnl: Option<Decimal>,
    pnl_percent: Option<Decimal>,
    outcome: Option<Outcome>,
) -> Result<Derived> {
    let computed = derive(direction, entry, exit, leverage)?;
    let pnl = bounded_pnl(pnl.unwrap_or(computed.pnl))?;
    Ok(Derived {
        pnl,
        pnl_percent: pnl_percent.unwrap_or(computed.pnl_percent),
        outcome: outcome.filter(Outcome::is_closed).unwrap_or_else(|| outcome_for(pnl)),
    })
}
