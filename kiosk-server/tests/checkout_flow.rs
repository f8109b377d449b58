//! 结算端到端测试
//!
//! 使用内存假网关驱动完整的 validate → commit → dispense 流程，
//! 覆盖展开、单飞、单调性、向前推进、顺序等核心性质。

use async_trait::async_trait;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use kiosk_server::api::checkout::handler::{self, CheckoutRequest};
use kiosk_server::checkout::CheckoutError;
use kiosk_server::{
    AppError, Config, DispenseError, DispenseGateway, ServerState, StoreError, StoreGateway,
};
use parking_lot::Mutex;
use shared::cart::{CartLine, CartLineInput};
use shared::catalog::CatalogProduct;
use shared::dispense::{CheckoutPhase, ItemStatus, OverallStatus};
use shared::order::{OrderRecord, RejectReason, StoredOrder};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// Fake gateways
// ============================================================================

/// 内存商店后端
#[derive(Default)]
struct FakeStore {
    catalog: Mutex<Vec<CatalogProduct>>,
    orders: Mutex<Vec<OrderRecord>>,
    decrements: Mutex<Vec<(String, u32)>>,
    fail_decrements: bool,
    fail_catalog: bool,
}

impl FakeStore {
    fn with_catalog(catalog: Vec<CatalogProduct>) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            ..Default::default()
        }
    }

    fn stock_of(&self, product_id: &str) -> u32 {
        self.catalog
            .lock()
            .iter()
            .find(|p| p.id == product_id)
            .map(|p| p.stock)
            .expect("product in catalog")
    }
}

#[async_trait]
impl StoreGateway for FakeStore {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogProduct>, StoreError> {
        if self.fail_catalog {
            return Err(StoreError::Status {
                status: 500,
                body: "db down".into(),
            });
        }
        Ok(self.catalog.lock().clone())
    }

    async fn create_order(&self, record: &OrderRecord) -> Result<StoredOrder, StoreError> {
        let mut orders = self.orders.lock();
        orders.push(record.clone());
        Ok(StoredOrder {
            id: format!("order-{}", orders.len()),
            created_at: Utc::now(),
        })
    }

    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        if self.fail_decrements {
            return Err(StoreError::Status {
                status: 500,
                body: "induced decrement failure".into(),
            });
        }
        let mut catalog = self.catalog.lock();
        let product = catalog
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or(StoreError::Status {
                status: 404,
                body: "unknown product".into(),
            })?;
        product.stock = product.stock.saturating_sub(quantity);
        self.decrements.lock().push((product_id.to_string(), quantity));
        Ok(())
    }
}

/// 内存售货机执行器
///
/// 记录每次调用的商品与并发度。`max_in_flight` 超过 1 即违反单飞约束。
#[derive(Default)]
struct FakeMachine {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
    fail_all: bool,
}

#[async_trait]
impl DispenseGateway for FakeMachine {
    async fn dispense_unit(
        &self,
        _machine_id: &str,
        request: &shared::dispense::DispenseRequest,
    ) -> Result<(), DispenseError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        assert_eq!(request.items.len(), 1, "one item per dispense request");
        assert_eq!(request.items[0].quantity, 1, "one unit per dispense request");
        self.calls.lock().push(request.items[0].product_id.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_all {
            Err(DispenseError::Status {
                status: 503,
                body: "motor jam".into(),
            })
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn product(id: &str, price: f64, stock: u32) -> CatalogProduct {
    CatalogProduct {
        id: id.into(),
        name: id.to_uppercase(),
        price,
        stock,
        image: None,
    }
}

fn cart_line(id: &str, price: f64, quantity: u32) -> CartLine {
    CartLine {
        product_id: id.into(),
        name: id.to_uppercase(),
        unit_price: price,
        quantity,
        image: None,
    }
}

fn line_input(id: &str, price: f64, quantity: u32) -> CartLineInput {
    CartLineInput {
        product_id: id.into(),
        name: id.to_uppercase(),
        unit_price: price,
        quantity,
        image: None,
    }
}

fn test_state(store: Arc<FakeStore>, machine: Arc<FakeMachine>) -> ServerState {
    let mut config = Config::from_env();
    config.machine_id = "kiosk-test".into();
    config.tax_rate_percent = 8.0;
    config.dispense_timeout_ms = 1000;
    config.per_unit_seconds = 2.0;
    ServerState::with_gateways(config, store, machine)
}

async fn wait_complete(session: &kiosk_server::CheckoutSession) {
    let mut rx = session.subscribe();
    rx.wait_for(|s| s.phase == CheckoutPhase::Complete)
        .await
        .expect("session reaches complete");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn end_to_end_checkout_dispenses_and_decrements() {
    let store = Arc::new(FakeStore::with_catalog(vec![product("x", 10.0, 5)]));
    let machine = Arc::new(FakeMachine::default());
    let state = test_state(store.clone(), machine.clone());

    let session = state.create_session();
    let status = state
        .orchestrator()
        .run_checkout(&session, vec![cart_line("x", 10.0, 3)], None)
        .await
        .expect("checkout succeeds");

    // Synchronous part done: order committed with 8% tax
    assert_eq!(status.phase, CheckoutPhase::AwaitingConfirm);
    let orders = store.orders.lock().clone();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].subtotal, 30.0);
    assert_eq!(orders[0].tax, 2.40);
    assert_eq!(orders[0].total, 32.40);
    assert_eq!(orders[0].machine_id, "kiosk-test");

    wait_complete(&session).await;

    // Stock decremented exactly once per purchased unit set
    assert_eq!(store.stock_of("x"), 2);
    assert_eq!(store.decrements.lock().as_slice(), &[("x".to_string(), 3)]);

    // Three sequential unit-dispense calls
    assert_eq!(machine.calls.lock().as_slice(), &["x", "x", "x"]);

    let final_status = session.status();
    assert_eq!(final_status.overall_status, OverallStatus::Complete);
    assert_eq!(final_status.failed_units, 0);
    assert_eq!(final_status.units_remaining, 0);
    assert_eq!(final_status.estimated_seconds_remaining, 0.0);
}

#[tokio::test]
async fn queue_expansion_and_dispense_ordering() {
    let store = Arc::new(FakeStore::with_catalog(vec![
        product("a", 2.0, 10),
        product("b", 3.0, 10),
    ]));
    let machine = Arc::new(FakeMachine::default());
    let state = test_state(store, machine.clone());

    let session = state.create_session();
    let status = state
        .orchestrator()
        .run_checkout(
            &session,
            vec![cart_line("a", 2.0, 2), cart_line("b", 3.0, 1)],
            None,
        )
        .await
        .expect("checkout succeeds");

    // Initial queue: [(A, total 2), (B, total 1)], pristine counters
    assert_eq!(status.queue.len(), 2);
    assert_eq!(status.queue[0].product_id, "a");
    assert_eq!(status.queue[0].total_quantity, 2);
    assert_eq!(status.queue[0].dispensed_count, 0);
    assert_eq!(status.queue[0].status, ItemStatus::Pending);
    assert_eq!(status.queue[1].product_id, "b");
    assert_eq!(status.queue[1].total_quantity, 1);
    assert_eq!(status.units_remaining, 3);
    assert_eq!(status.estimated_seconds_remaining, 6.0);

    wait_complete(&session).await;

    // Strict cart order: A, A, B - never B before A's two units
    assert_eq!(machine.calls.lock().as_slice(), &["a", "a", "b"]);
}

#[tokio::test]
async fn single_flight_holds_with_slow_actuator() {
    let store = Arc::new(FakeStore::with_catalog(vec![
        product("a", 2.0, 10),
        product("b", 3.0, 10),
    ]));
    let machine = Arc::new(FakeMachine {
        delay: Duration::from_millis(20),
        ..Default::default()
    });
    let state = test_state(store, machine.clone());

    let session = state.create_session();
    state
        .orchestrator()
        .run_checkout(
            &session,
            vec![cart_line("a", 2.0, 3), cart_line("b", 3.0, 2)],
            None,
        )
        .await
        .expect("checkout succeeds");

    wait_complete(&session).await;

    assert_eq!(machine.calls.lock().len(), 5);
    assert_eq!(
        machine.max_in_flight.load(Ordering::SeqCst),
        1,
        "at most one dispense request may ever be outstanding"
    );
}

#[tokio::test]
async fn forward_progress_when_every_dispense_fails() {
    let store = Arc::new(FakeStore::with_catalog(vec![
        product("a", 2.0, 10),
        product("b", 3.0, 10),
    ]));
    let machine = Arc::new(FakeMachine {
        fail_all: true,
        ..Default::default()
    });
    let state = test_state(store, machine.clone());

    let session = state.create_session();
    state
        .orchestrator()
        .run_checkout(
            &session,
            vec![cart_line("a", 2.0, 2), cart_line("b", 3.0, 1)],
            None,
        )
        .await
        .expect("checkout succeeds");

    wait_complete(&session).await;

    // Exactly Σ quantity attempts, then the terminal state - no stall
    assert_eq!(machine.calls.lock().len(), 3);
    let status = session.status();
    assert_eq!(status.overall_status, OverallStatus::Complete);
    assert_eq!(status.failed_units, 3);
    for item in &status.queue {
        assert_eq!(item.status, ItemStatus::Complete);
        assert_eq!(item.failed_count, item.total_quantity);
    }
}

#[tokio::test]
async fn dispense_timeout_counts_as_attempted_failure() {
    let store = Arc::new(FakeStore::with_catalog(vec![product("a", 2.0, 10)]));
    let machine = Arc::new(FakeMachine {
        delay: Duration::from_millis(100),
        ..Default::default()
    });
    let mut config = Config::from_env();
    config.machine_id = "kiosk-test".into();
    config.dispense_timeout_ms = 10;
    let state = ServerState::with_gateways(config, store, machine.clone());

    let session = state.create_session();
    state
        .orchestrator()
        .run_checkout(&session, vec![cart_line("a", 2.0, 2)], None)
        .await
        .expect("checkout succeeds");

    wait_complete(&session).await;

    let status = session.status();
    assert_eq!(status.overall_status, OverallStatus::Complete);
    assert_eq!(status.failed_units, 2, "timed-out units count as failed attempts");
}

#[tokio::test]
async fn progress_counters_are_monotonic() {
    let store = Arc::new(FakeStore::with_catalog(vec![
        product("a", 2.0, 10),
        product("b", 3.0, 10),
    ]));
    let machine = Arc::new(FakeMachine {
        delay: Duration::from_millis(5),
        ..Default::default()
    });
    let state = test_state(store, machine.clone());

    let session = state.create_session();
    let mut rx = session.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = vec![rx.borrow().clone()];
        while rx.changed().await.is_ok() {
            let status = rx.borrow().clone();
            let done = status.phase == CheckoutPhase::Complete;
            seen.push(status);
            if done {
                break;
            }
        }
        seen
    });

    state
        .orchestrator()
        .run_checkout(
            &session,
            vec![cart_line("a", 2.0, 3), cart_line("b", 3.0, 2)],
            None,
        )
        .await
        .expect("checkout succeeds");

    let seen = collector.await.expect("collector finishes");

    fn status_rank(status: ItemStatus) -> u8 {
        match status {
            ItemStatus::Pending => 0,
            ItemStatus::Dispensing => 1,
            ItemStatus::Complete => 2,
        }
    }

    let mut last_counts: std::collections::HashMap<String, (u32, u8)> = Default::default();
    for snapshot in seen.iter().filter(|s| !s.queue.is_empty()) {
        for item in &snapshot.queue {
            assert!(item.dispensed_count <= item.total_quantity);
            let rank = status_rank(item.status);
            if let Some((prev_count, prev_rank)) = last_counts.get(&item.product_id) {
                assert!(item.dispensed_count >= *prev_count, "dispensed_count regressed");
                assert!(rank >= *prev_rank, "item status regressed");
            }
            last_counts.insert(item.product_id.clone(), (item.dispensed_count, rank));
        }
    }
}

#[tokio::test]
async fn validation_failure_blocks_commit_entirely() {
    let store = Arc::new(FakeStore::with_catalog(vec![product("x", 10.0, 1)]));
    let machine = Arc::new(FakeMachine::default());
    let state = test_state(store.clone(), machine.clone());

    let session = state.create_session();
    let err = state
        .orchestrator()
        .run_checkout(&session, vec![cart_line("x", 10.0, 2)], None)
        .await
        .expect_err("validation must reject");

    match err {
        CheckoutError::Rejected(rejections) => {
            assert_eq!(rejections.len(), 1);
            assert_eq!(
                rejections[0].reason,
                RejectReason::InsufficientStock {
                    available: 1,
                    requested: 2
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }

    // No order record, no stock mutation, no hardware calls
    assert!(store.orders.lock().is_empty());
    assert!(store.decrements.lock().is_empty());
    assert_eq!(store.stock_of("x"), 1);
    assert!(machine.calls.lock().is_empty());
    assert_eq!(session.phase(), CheckoutPhase::Aborted);
}

#[tokio::test]
async fn decrement_failure_aborts_and_records_issue() {
    let store = Arc::new(FakeStore {
        catalog: Mutex::new(vec![product("x", 10.0, 5)]),
        fail_decrements: true,
        ..Default::default()
    });
    let machine = Arc::new(FakeMachine::default());
    let state = test_state(store.clone(), machine.clone());

    let session = state.create_session();
    let err = state
        .orchestrator()
        .run_checkout(&session, vec![cart_line("x", 10.0, 2)], None)
        .await
        .expect_err("commit must fail");
    assert!(matches!(err, CheckoutError::Commit(_)));

    // Order persisted but inconsistent: issue recorded for reconciliation
    let orders = store.orders.lock().clone();
    assert_eq!(orders.len(), 1);
    let issues = state.issues.list();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].transaction_id, orders[0].transaction_id);
    assert_eq!(issues[0].product_id, "x");
    assert_eq!(issues[0].quantity, 2);

    // Aborted before anything physical: no dispense calls
    assert!(machine.calls.lock().is_empty());
    assert_eq!(session.phase(), CheckoutPhase::Aborted);
    assert!(session.status().abort_reason.is_some());
}

#[tokio::test]
async fn commit_failure_surfaces_reason_and_keeps_session_reachable() {
    let store = Arc::new(FakeStore {
        catalog: Mutex::new(vec![product("x", 10.0, 5)]),
        fail_decrements: true,
        ..Default::default()
    });
    let machine = Arc::new(FakeMachine::default());
    let state = test_state(store, machine);

    let err = handler::start(
        State(state.clone()),
        Json(CheckoutRequest {
            lines: vec![line_input("x", 10.0, 2)],
            buyer_id: None,
        }),
    )
    .await
    .expect_err("commit must fail");

    match err {
        AppError::CheckoutAborted { session_id, reason } => {
            // The caller gets the specific cause, not a blanked-out 502
            assert!(
                reason.contains("needs reconciliation"),
                "reason must name the commit failure: {reason}"
            );
            // And the disclosed id still resolves to the abort trail
            let session = state
                .get_session(&session_id)
                .expect("aborted session stays registered under the returned id");
            assert_eq!(session.phase(), CheckoutPhase::Aborted);
            assert!(session.status().abort_reason.is_some());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn catalog_outage_reports_cause_and_recycles_session() {
    let store = Arc::new(FakeStore {
        fail_catalog: true,
        ..Default::default()
    });
    let machine = Arc::new(FakeMachine::default());
    let state = test_state(store, machine);

    let err = handler::start(
        State(state.clone()),
        Json(CheckoutRequest {
            lines: vec![line_input("x", 10.0, 1)],
            buyer_id: None,
        }),
    )
    .await
    .expect_err("catalog fetch must fail");

    match err {
        AppError::Gateway(msg) => {
            assert!(msg.contains("Catalog fetch failed"), "got: {msg}");
            assert!(msg.contains("db down"), "got: {msg}");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing was persisted, so no session lingers behind an undisclosed id
    assert!(state.sessions.is_empty());
}

#[tokio::test]
async fn clear_is_only_legal_in_terminal_phases() {
    let store = Arc::new(FakeStore::with_catalog(vec![product("a", 2.0, 10)]));
    let machine = Arc::new(FakeMachine {
        delay: Duration::from_millis(50),
        ..Default::default()
    });
    let state = test_state(store, machine);

    let session = state.create_session();
    state
        .orchestrator()
        .run_checkout(&session, vec![cart_line("a", 2.0, 2)], None)
        .await
        .expect("checkout succeeds");

    // Still dispensing: clear must refuse
    assert!(!session.can_clear());
    assert!(state.clear_session(&session.id).is_err());

    wait_complete(&session).await;

    assert!(session.can_clear());
    state.clear_session(&session.id).expect("clear succeeds");
    assert!(state.get_session(&session.id).is_none());
}
