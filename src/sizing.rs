use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::SizingError;
use crate::events::Side;

/// Static facts about the traded instrument, consumed but never owned by the sizer.
#[derive(Debug, Clone)]
pub struct Instrument {
    pub symbol: String,
    /// Smallest price unit, e.g. 0.0001 for EUR/USD.
    pub pip_size: Decimal,
    /// Smallest price increment the exchange will accept.
    pub tick_size: Decimal,
    /// Quote-currency units per one whole contract/lot.
    pub contract_size: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
    pub min_quantity: Decimal,
}

/// Everything the sizer needs to turn ladder state into concrete order parameters.
#[derive(Debug, Clone, Copy)]
pub struct SizingInput {
    pub side: Side,
    pub entry_price: Decimal,
    /// `G - 1`: the fractional move from entry to the take-profit price.
    pub profit_fraction: Decimal,
    /// `loss_percentage_for_step_back()` at entry time: the fractional move from entry to the
    /// stop-loss price.
    pub loss_percentage: Decimal,
    /// `loss_for_step_back()` at entry time — the exact cash amount a fill at `stop_loss_price`
    /// must realize.
    pub target_loss: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingResult {
    pub quantity: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    /// Cash loss actually realized if the stop fills, after the quantity was snapped down.
    pub effective_risk: Decimal,
    /// `target_loss - effective_risk`, always >= 0.
    pub risk_residual: Decimal,
}

/// Round a price away from `entry`, never tightening the distance between entry and the
/// protective/target price.
fn snap_away_from_entry(price: Decimal, entry: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size <= Decimal::ZERO {
        return price;
    }
    let ticks = price / tick_size;
    let snapped_ticks = if price >= entry {
        ticks.round_dp_with_strategy(0, RoundingStrategy::ToPositiveInfinity)
    } else {
        ticks.round_dp_with_strategy(0, RoundingStrategy::ToNegativeInfinity)
    };
    snapped_ticks * tick_size
}

/// Convert ladder state + market price + instrument metadata into exact order parameters.
///
/// Returns `Err` without mutating anything if the loss-exact quantity rounds down below the
/// instrument's minimum order size; the caller must not touch the ladder in that case.
pub fn size_trade(input: SizingInput, instrument: &Instrument) -> Result<SizingResult, SizingError> {
    if input.entry_price <= Decimal::ZERO {
        return Err(SizingError::NonPositiveEntryPrice(input.entry_price));
    }

    let (raw_take_profit, raw_stop_loss) = match input.side {
        Side::Long => (
            input.entry_price * (Decimal::ONE + input.profit_fraction),
            input.entry_price * (Decimal::ONE - input.loss_percentage),
        ),
        Side::Short => (
            input.entry_price * (Decimal::ONE - input.profit_fraction),
            input.entry_price * (Decimal::ONE + input.loss_percentage),
        ),
    };

    let take_profit_price =
        snap_away_from_entry(raw_take_profit, input.entry_price, instrument.tick_size)
            .round_dp_with_strategy(instrument.price_precision, RoundingStrategy::MidpointAwayFromZero);
    let stop_loss_price =
        snap_away_from_entry(raw_stop_loss, input.entry_price, instrument.tick_size)
            .round_dp_with_strategy(instrument.price_precision, RoundingStrategy::MidpointAwayFromZero);

    let stop_distance = (input.entry_price - stop_loss_price).abs();
    if stop_distance <= Decimal::ZERO {
        return Err(SizingError::NonPositiveEntryPrice(input.entry_price));
    }

    let raw_quantity = input.target_loss / (instrument.contract_size * stop_distance);
    let quantity = raw_quantity
        .round_dp_with_strategy(instrument.quantity_precision, RoundingStrategy::ToZero);

    if quantity < instrument.min_quantity {
        return Err(SizingError::BelowMinimumQuantity {
            quantity,
            minimum: instrument.min_quantity,
        });
    }

    let effective_risk = quantity * instrument.contract_size * stop_distance;
    let risk_residual = (input.target_loss - effective_risk).max(Decimal::ZERO);

    Ok(SizingResult {
        quantity,
        take_profit_price,
        stop_loss_price,
        effective_risk,
        risk_residual,
    })
}
