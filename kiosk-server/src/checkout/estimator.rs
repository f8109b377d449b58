//! Progress estimation
//!
//! Pure projection over the sequencer state: remaining item/unit counts and
//! a rough time estimate. No side effects; recomputed on every state change
//! for display.

use shared::dispense::{OverallStatus, SequencerState};

/// Estimation parameters
#[derive(Debug, Clone, Copy)]
pub struct ProgressParams {
    /// Calibrated actuator cycle time per unit, in seconds
    pub per_unit_seconds: f64,
}

impl Default for ProgressParams {
    fn default() -> Self {
        Self {
            per_unit_seconds: 2.5,
        }
    }
}

/// Derived progress figures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    /// Queue items not yet fully dispensed, counting the current one
    pub items_remaining: usize,
    /// Physical units still to attempt
    pub units_remaining: u32,
    /// `units_remaining × per_unit_seconds`
    pub estimated_seconds_remaining: f64,
}

/// Project remaining work from the sequencer state
pub fn estimate(state: &SequencerState, params: &ProgressParams) -> ProgressReport {
    if state.overall_status == OverallStatus::Complete {
        return ProgressReport {
            items_remaining: 0,
            units_remaining: 0,
            estimated_seconds_remaining: 0.0,
        };
    }

    let items_remaining = state.queue.len().saturating_sub(state.current_index);

    let current_remainder = state
        .queue
        .get(state.current_index)
        .map(|item| item.remaining())
        .unwrap_or(0);
    let later: u32 = state
        .queue
        .iter()
        .skip(state.current_index + 1)
        .map(|item| item.total_quantity)
        .sum();
    let units_remaining = current_remainder + later;

    ProgressReport {
        items_remaining,
        units_remaining,
        estimated_seconds_remaining: f64::from(units_remaining) * params.per_unit_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::dispense::{DispenseItemState, ItemStatus};

    fn state_with(queue: Vec<DispenseItemState>, current_index: usize) -> SequencerState {
        SequencerState {
            queue,
            current_index,
            in_flight: false,
            overall_status: OverallStatus::Dispensing,
        }
    }

    fn item(id: &str, total: u32, dispensed: u32) -> DispenseItemState {
        let mut item = DispenseItemState::new(id, id.to_uppercase(), None, total);
        item.dispensed_count = dispensed;
        if dispensed >= total {
            item.status = ItemStatus::Complete;
        }
        item
    }

    #[test]
    fn counts_current_remainder_plus_later_items() {
        // A: 1 of 2 done, B: 1 untouched
        let state = state_with(vec![item("a", 2, 1), item("b", 1, 0)], 0);
        let report = estimate(&state, &ProgressParams { per_unit_seconds: 2.0 });
        assert_eq!(report.items_remaining, 2);
        assert_eq!(report.units_remaining, 2);
        assert_eq!(report.estimated_seconds_remaining, 4.0);
    }

    #[test]
    fn last_item_in_progress() {
        let state = state_with(vec![item("a", 2, 2), item("b", 3, 1)], 1);
        let report = estimate(&state, &ProgressParams::default());
        assert_eq!(report.items_remaining, 1);
        assert_eq!(report.units_remaining, 2);
        assert_eq!(report.estimated_seconds_remaining, 5.0);
    }

    #[test]
    fn complete_state_reports_zero() {
        let mut state = state_with(vec![item("a", 2, 2)], 0);
        state.overall_status = OverallStatus::Complete;
        let report = estimate(&state, &ProgressParams::default());
        assert_eq!(report.items_remaining, 0);
        assert_eq!(report.units_remaining, 0);
        assert_eq!(report.estimated_seconds_remaining, 0.0);
    }
}
