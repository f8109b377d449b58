//! Dispense Sequencer
//!
//! 出货序列器：把已提交订单展开为有序的出货单元队列，逐件驱动远端
//! 执行器，并跟踪单品与整体进度。
//!
//! # 单飞保证
//!
//! 执行器同一时刻只能安全接受一条电机指令。序列器是唯一的工作者任务，
//! 每次 await 完一个请求的响应才会评估下一条转移规则，因此"最多一个
//! 未决请求"由结构保证，而不是由被检查的布尔标志保证。`in_flight`
//! 仅用于进度读模型。
//!
//! # 向前推进
//!
//! 失败或超时的单元照样计入 `dispensed_count`（并计入 `failed_count`），
//! 状态机永不因执行器拒绝确认而停滞；队列总会排空到 complete 终态。

use super::estimator::{self, ProgressParams};
use crate::machine::{DispenseError, DispenseGateway};
use parking_lot::RwLock;
use shared::cart::CartLine;
use shared::dispense::{
    CheckoutPhase, CheckoutStatus, DispenseItemState, DispenseRequest, DispenseRequestItem,
    DispenseUnit, ItemStatus, OverallStatus, SequencerState,
};
use shared::order::ValidatedOrder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Expand cart lines into the per-product dispense queue
///
/// Cart-line order is preserved; a product appearing on more than one line
/// is merged into its first occurrence (one queue record per distinct
/// product).
pub fn build_queue(lines: &[CartLine]) -> Vec<DispenseItemState> {
    let mut queue: Vec<DispenseItemState> = Vec::new();
    for line in lines {
        if let Some(existing) = queue.iter_mut().find(|i| i.product_id == line.product_id) {
            existing.total_quantity += line.quantity;
        } else {
            queue.push(DispenseItemState::new(
                &line.product_id,
                &line.name,
                line.image.clone(),
                line.quantity,
            ));
        }
    }
    queue
}

/// Flatten the queue into discrete dispense units
///
/// The only place a quantity-N purchase becomes N hardware actions. Unit
/// order is queue order, ascending unit index within each product.
pub fn expand_units(queue: &[DispenseItemState]) -> Vec<DispenseUnit> {
    let mut units = Vec::new();
    for item in queue {
        for unit_index in 0..item.total_quantity {
            units.push(DispenseUnit {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                image: item.image.clone(),
                sequence_index: units.len(),
                unit_index_within_product: unit_index,
            });
        }
    }
    units
}

/// The dispense state machine worker
///
/// One instance per checkout session, created from the committed order and
/// run as a single spawned task. Progress snapshots go out on the session's
/// watch channel after every mutation.
pub struct DispenseSequencer {
    machine_id: String,
    transaction_id: String,
    gateway: Arc<dyn DispenseGateway>,
    state: RwLock<SequencerState>,
    units: Vec<DispenseUnit>,
    progress_tx: watch::Sender<CheckoutStatus>,
    dispense_timeout: Duration,
    params: ProgressParams,
}

impl DispenseSequencer {
    pub fn new(
        order: &ValidatedOrder,
        gateway: Arc<dyn DispenseGateway>,
        progress_tx: watch::Sender<CheckoutStatus>,
        dispense_timeout: Duration,
        params: ProgressParams,
    ) -> Self {
        let queue = build_queue(&order.lines);
        let units = expand_units(&queue);
        let state = SequencerState {
            queue,
            current_index: 0,
            in_flight: false,
            overall_status: OverallStatus::Pending,
        };
        Self {
            machine_id: order.machine_id.clone(),
            transaction_id: order.transaction_id.clone(),
            gateway,
            state: RwLock::new(state),
            units,
            progress_tx,
            dispense_timeout,
            params,
        }
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> SequencerState {
        self.state.read().clone()
    }

    /// Evaluate the transition rules and pick the next unit to issue
    ///
    /// Returns the global sequence index of the unit to dispense, or `None`
    /// once the queue has drained (overall status is then `Complete`).
    fn next_step(state: &mut SequencerState) -> Option<usize> {
        // Rule 1: never issue while a request is outstanding. The single
        // worker task can't actually get here in-flight; keep the guard so
        // the contract survives refactors.
        if state.in_flight {
            return None;
        }
        loop {
            if state.queue.is_empty() {
                state.overall_status = OverallStatus::Complete;
                return None;
            }
            let idx = state.current_index;
            let last = state.queue.len() - 1;
            let attempted_before: u32 = state.queue[..idx].iter().map(|i| i.total_quantity).sum();
            let item = &mut state.queue[idx];
            match item.status {
                ItemStatus::Complete => {
                    if idx == last {
                        state.overall_status = OverallStatus::Complete;
                        return None;
                    }
                    state.current_index += 1;
                    continue;
                }
                ItemStatus::Pending => item.status = ItemStatus::Dispensing,
                ItemStatus::Dispensing => {}
            }
            if item.dispensed_count < item.total_quantity {
                let sequence_index = (attempted_before + item.dispensed_count) as usize;
                state.in_flight = true;
                state.overall_status = OverallStatus::Dispensing;
                return Some(sequence_index);
            }
            // Zero-quantity entry: nothing to dispense, close it out
            item.status = ItemStatus::Complete;
        }
    }

    /// Record the response for the current unit and release the flight slot
    ///
    /// Success and failure both count as attempted: the sequencer never
    /// waits for a unit the actuator refuses to acknowledge again.
    fn record_outcome(&self, unit: &DispenseUnit, outcome: &Result<(), DispenseError>) {
        let mut state = self.state.write();
        let idx = state.current_index;
        let item = &mut state.queue[idx];
        item.dispensed_count += 1;
        match outcome {
            Ok(()) => {
                tracing::debug!(
                    transaction_id = %self.transaction_id,
                    product_id = %unit.product_id,
                    unit = unit.unit_index_within_product,
                    sequence = unit.sequence_index,
                    "Unit dispensed"
                );
            }
            Err(e) => {
                item.failed_count += 1;
                tracing::warn!(
                    transaction_id = %self.transaction_id,
                    product_id = %unit.product_id,
                    unit = unit.unit_index_within_product,
                    error = %e,
                    "Dispense unit failed, continuing with next unit"
                );
            }
        }
        if item.dispensed_count >= item.total_quantity {
            item.status = ItemStatus::Complete;
        }
        state.in_flight = false;
    }

    /// Drive the queue to completion
    ///
    /// Runs until every item is complete. A shutdown mid-sequence abandons
    /// the loop (operator intervention territory); shoppers cannot cancel
    /// once dispensing has started.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            transaction_id = %self.transaction_id,
            machine_id = %self.machine_id,
            units = self.units.len(),
            "Dispense sequencer started"
        );

        loop {
            let next = {
                let mut state = self.state.write();
                Self::next_step(&mut state)
            };

            let Some(sequence_index) = next else {
                self.publish(CheckoutPhase::Complete);
                let failed = self.state.read().failed_units();
                tracing::info!(
                    transaction_id = %self.transaction_id,
                    failed_units = failed,
                    "Dispense queue drained"
                );
                break;
            };

            self.publish(CheckoutPhase::Dispensing);

            let unit = &self.units[sequence_index];
            let request = DispenseRequest {
                transaction_id: self.transaction_id.clone(),
                items: vec![DispenseRequestItem {
                    product_id: unit.product_id.clone(),
                    name: unit.name.clone(),
                    quantity: 1,
                }],
            };

            // Awaiting the response here, in the only worker task, is what
            // makes overlapping actuator commands impossible.
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::warn!(
                        transaction_id = %self.transaction_id,
                        sequence = unit.sequence_index,
                        "Sequencer shut down mid-sequence, abandoning queue"
                    );
                    self.state.write().in_flight = false;
                    return;
                }
                result = tokio::time::timeout(
                    self.dispense_timeout,
                    self.gateway.dispense_unit(&self.machine_id, &request),
                ) => match result {
                    Ok(r) => r,
                    Err(_) => Err(DispenseError::Timeout),
                },
            };

            self.record_outcome(unit, &outcome);
            self.publish(CheckoutPhase::Dispensing);
        }
    }

    /// Publish a progress snapshot on the session watch channel
    fn publish(&self, phase: CheckoutPhase) {
        let state = self.snapshot();
        let report = estimator::estimate(&state, &self.params);
        let status = CheckoutStatus {
            phase,
            transaction_id: Some(self.transaction_id.clone()),
            rejections: None,
            abort_reason: None,
            failed_units: state.failed_units(),
            current_index: state.current_index,
            overall_status: state.overall_status,
            queue: state.queue,
            items_remaining: report.items_remaining,
            units_remaining: report.units_remaining,
            estimated_seconds_remaining: report.estimated_seconds_remaining,
        };
        self.progress_tx.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: id.into(),
            name: id.to_uppercase(),
            unit_price: 10.0,
            quantity,
            image: None,
        }
    }

    #[test]
    fn queue_preserves_cart_order_with_fresh_counters() {
        let queue = build_queue(&[line("a", 2), line("b", 1)]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].product_id, "a");
        assert_eq!(queue[0].total_quantity, 2);
        assert_eq!(queue[0].dispensed_count, 0);
        assert_eq!(queue[0].status, ItemStatus::Pending);
        assert_eq!(queue[1].product_id, "b");
        assert_eq!(queue[1].total_quantity, 1);
        assert_eq!(queue[1].status, ItemStatus::Pending);
    }

    #[test]
    fn duplicate_product_lines_merge_into_first_occurrence() {
        let queue = build_queue(&[line("a", 1), line("b", 1), line("a", 2)]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].product_id, "a");
        assert_eq!(queue[0].total_quantity, 3);
        assert_eq!(queue[1].product_id, "b");
    }

    #[test]
    fn units_expand_in_queue_order_with_ascending_indices() {
        let queue = build_queue(&[line("a", 2), line("b", 1)]);
        let units = expand_units(&queue);
        let ids: Vec<&str> = units.iter().map(|u| u.product_id.as_str()).collect();
        assert_eq!(ids, ["a", "a", "b"]);
        assert_eq!(units[0].unit_index_within_product, 0);
        assert_eq!(units[1].unit_index_within_product, 1);
        assert_eq!(units[2].unit_index_within_product, 0);
        let sequence: Vec<usize> = units.iter().map(|u| u.sequence_index).collect();
        assert_eq!(sequence, [0, 1, 2]);
    }

    #[test]
    fn next_step_walks_the_queue_in_order() {
        let mut state = SequencerState {
            queue: build_queue(&[line("a", 2), line("b", 1)]),
            current_index: 0,
            in_flight: false,
            overall_status: OverallStatus::Pending,
        };

        // First unit of A
        assert_eq!(DispenseSequencer::next_step(&mut state), Some(0));
        assert!(state.in_flight);
        assert_eq!(state.queue[0].status, ItemStatus::Dispensing);
        assert_eq!(state.overall_status, OverallStatus::Dispensing);

        // Rule 1: in-flight blocks further issues
        assert_eq!(DispenseSequencer::next_step(&mut state), None);

        // A unit 1 attempted
        state.in_flight = false;
        state.queue[0].dispensed_count = 1;
        assert_eq!(DispenseSequencer::next_step(&mut state), Some(1));

        // A done, move on to B
        state.in_flight = false;
        state.queue[0].dispensed_count = 2;
        state.queue[0].status = ItemStatus::Complete;
        assert_eq!(DispenseSequencer::next_step(&mut state), Some(2));
        assert_eq!(state.current_index, 1);

        // B done, queue drains
        state.in_flight = false;
        state.queue[1].dispensed_count = 1;
        state.queue[1].status = ItemStatus::Complete;
        assert_eq!(DispenseSequencer::next_step(&mut state), None);
        assert_eq!(state.overall_status, OverallStatus::Complete);
    }

    #[test]
    fn empty_queue_completes_immediately() {
        let mut state = SequencerState::default();
        assert_eq!(DispenseSequencer::next_step(&mut state), None);
        assert_eq!(state.overall_status, OverallStatus::Complete);
    }
}
