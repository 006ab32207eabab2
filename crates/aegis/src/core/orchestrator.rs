//! Transaction orchestrator for the two dashboard buttons.
//!
//! Write flow:
//! 1. Validate (busy, wallet, amount) before touching the chain
//! 2. Route the (mode, action) pair to one intent, resolving repay vs
//!    approve from the latest allowance snapshot
//! 3. Encode against the pool address read at submit time
//! 4. Sign + broadcast, then wait for the receipt with no local timeout
//! 5. On confirmation clear the amount and refresh all account reads
//!
//! The orchestrator is the single writer of the form state and the tx
//! status.

use std::sync::Arc;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ChainAddresses;
use crate::constants::{REFERRAL_CODE, USDC_DECIMALS, VARIABLE_RATE_MODE};
use crate::core::account_aggregator::{needs_approval, RefreshHandle};
use crate::core::activity_log::ActivityLog;
use crate::errors::AegisError;
use crate::execution::aave_client::AaveClient;
use crate::execution::tx_submitter::TxSender;
use crate::types::wad_ray::{parse_decimal, parse_ether, parse_units};
use crate::types::{Action, FormState, IntentKind, Mode, TxIntent, TxStatus};

pub const CONNECT_WALLET: &str = "Connect Wallet";
pub const INVALID_AMOUNT: &str = "Invalid Amount";
pub const READ_ONLY: &str = "Read-only session: set WALLET_PRIVATE_KEY to enable writes";
pub const WRITE_ABORTED: &str = "write aborted before completion";

// ---------------------------------------------------------------------------
// Pure routing
// ---------------------------------------------------------------------------

/// Label of the primary button.
pub fn primary_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Earn => "Supply",
        Mode::Leverage => "Borrow",
    }
}

/// Label of the secondary button; in Leverage it flips to the approval step
/// when the allowance does not cover the amount.
pub fn secondary_label(mode: Mode, amount: &str, allowance: Option<U256>) -> &'static str {
    match mode {
        Mode::Earn => "Recall",
        Mode::Leverage if needs_approval(mode, amount, allowance, USDC_DECIMALS) => "Unlock USDC",
        Mode::Leverage => "Repay Debt",
    }
}

/// Validate the amount and pick the write for `action`.
pub fn plan_intent(
    action: Action,
    form: &FormState,
    allowance: Option<U256>,
) -> Result<TxIntent, AegisError> {
    let amount = form.amount.trim();
    match parse_decimal(amount) {
        Some(value) if value > Decimal::ZERO => {}
        _ => return Err(AegisError::InvalidInput(INVALID_AMOUNT.into())),
    }

    let (kind, raw_amount) = match (form.mode, action) {
        (Mode::Earn, Action::Primary) => (IntentKind::Supply, parse_ether(amount)),
        (Mode::Earn, Action::Secondary) => (IntentKind::Withdraw, parse_ether(amount)),
        (Mode::Leverage, Action::Primary) => {
            (IntentKind::Borrow, parse_units(amount, USDC_DECIMALS))
        }
        (Mode::Leverage, Action::Secondary) => {
            let kind = if needs_approval(form.mode, amount, allowance, USDC_DECIMALS) {
                IntentKind::Approve
            } else {
                IntentKind::Repay
            };
            (kind, parse_units(amount, USDC_DECIMALS))
        }
    };

    // Dust below the asset's smallest unit rounds to zero.
    let raw_amount = raw_amount
        .ok()
        .filter(|raw| !raw.is_zero())
        .ok_or_else(|| AegisError::InvalidInput(INVALID_AMOUNT.into()))?;

    Ok(TxIntent {
        kind,
        amount: amount.to_string(),
        raw_amount,
    })
}

/// Encode `intent` into an unsigned request. `from` is filled by the sender.
pub fn build_request(
    intent: &TxIntent,
    pool: Address,
    user: Address,
    addresses: &ChainAddresses,
) -> TransactionRequest {
    let rate_mode = U256::from(VARIABLE_RATE_MODE);
    let amount = intent.raw_amount;

    match intent.kind {
        IntentKind::Supply => TransactionRequest::default()
            .with_to(addresses.wrapped_token_gateway)
            .with_input(AaveClient::encode_deposit_eth(pool, user, REFERRAL_CODE))
            .with_value(amount),
        IntentKind::Withdraw => TransactionRequest::default()
            .with_to(addresses.wrapped_token_gateway)
            .with_input(AaveClient::encode_withdraw_eth(pool, amount, user)),
        IntentKind::Borrow => TransactionRequest::default()
            .with_to(pool)
            .with_input(AaveClient::encode_borrow(
                addresses.usdc,
                amount,
                rate_mode,
                REFERRAL_CODE,
                user,
            )),
        IntentKind::Approve => TransactionRequest::default()
            .with_to(addresses.usdc)
            .with_input(AaveClient::encode_approve(pool, amount)),
        IntentKind::Repay => TransactionRequest::default()
            .with_to(pool)
            .with_input(AaveClient::encode_repay(addresses.usdc, amount, rate_mode, user)),
    }
}

// ---------------------------------------------------------------------------
// TxOrchestrator
// ---------------------------------------------------------------------------

pub struct TxOrchestrator<S: TxSender> {
    /// `None` in watch-only sessions.
    sender: Option<Arc<S>>,
    addresses: ChainAddresses,
    pool_rx: watch::Receiver<Address>,
    user_rx: watch::Receiver<Option<Address>>,
    allowance_rx: watch::Receiver<Option<U256>>,
    form_tx: watch::Sender<FormState>,
    status_tx: watch::Sender<TxStatus>,
    refresh: RefreshHandle,
    log: Arc<ActivityLog>,
}

impl<S: TxSender> TxOrchestrator<S> {
    pub fn new(
        sender: Option<Arc<S>>,
        addresses: ChainAddresses,
        pool_rx: watch::Receiver<Address>,
        user_rx: watch::Receiver<Option<Address>>,
        allowance_rx: watch::Receiver<Option<U256>>,
        refresh: RefreshHandle,
        log: Arc<ActivityLog>,
    ) -> Self {
        let (form_tx, _) = watch::channel(FormState::default());
        let (status_tx, _) = watch::channel(TxStatus::Idle);
        Self {
            sender,
            addresses,
            pool_rx,
            user_rx,
            allowance_rx,
            form_tx,
            status_tx,
            refresh,
            log,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.sender.is_none()
    }

    // -- form ---------------------------------------------------------------

    pub fn set_mode(&self, mode: Mode) {
        self.form_tx.send_if_modified(|form| {
            let changed = form.mode != mode;
            form.mode = mode;
            changed
        });
    }

    pub fn set_amount(&self, amount: impl Into<String>) {
        let amount = amount.into();
        self.form_tx.send_modify(|form| form.amount = amount);
    }

    pub fn form(&self) -> FormState {
        self.form_tx.borrow().clone()
    }

    // -- status -------------------------------------------------------------

    pub fn status(&self) -> TxStatus {
        self.status_tx.borrow().clone()
    }

    #[cfg(test)]
    pub(crate) fn subscribe_status(&self) -> watch::Receiver<TxStatus> {
        self.status_tx.subscribe()
    }

    // -- submit -------------------------------------------------------------

    /// Run one write to completion. Returns the confirmed hash.
    pub async fn submit(&self, action: Action) -> Result<B256, AegisError> {
        if self.status_tx.borrow().is_busy() {
            return Err(AegisError::Busy);
        }
        let Some(user) = *self.user_rx.borrow() else {
            return Err(AegisError::InvalidInput(CONNECT_WALLET.into()));
        };
        let form = self.form();
        let intent = plan_intent(action, &form, *self.allowance_rx.borrow())?;
        let Some(sender) = self.sender.as_ref() else {
            return Err(AegisError::InvalidInput(READ_ONLY.into()));
        };

        let pool = *self.pool_rx.borrow();
        let request = build_request(&intent, pool, user, &self.addresses);

        // Claim the in-flight slot; a concurrent submit may have won it.
        let claimed = self.status_tx.send_if_modified(|status| {
            if status.is_busy() {
                false
            } else {
                *status = TxStatus::Pending;
                true
            }
        });
        if !claimed {
            return Err(AegisError::Busy);
        }
        let in_flight = InFlight::new(&self.status_tx);

        info!(
            kind = ?intent.kind,
            amount = %intent.amount,
            pool = %pool,
            user = %user,
            "submitting write"
        );
        self.log.push(intent.log_line());

        match self.execute(sender, request).await {
            Ok(tx_hash) => {
                info!(tx_hash = %tx_hash, kind = ?intent.kind, "write confirmed");
                in_flight.settle(TxStatus::Confirmed {
                    tx_hash: tx_hash.to_string(),
                });
                self.log.push("Success: Ledger Updated.");
                self.form_tx.send_modify(|form| form.amount.clear());
                self.refresh.refresh_all();
                Ok(tx_hash)
            }
            Err(e) => {
                let message = match e {
                    AegisError::WriteFailed { message } => message,
                    other => other.to_string(),
                };
                warn!(kind = ?intent.kind, error = %message, "write failed");
                in_flight.settle(TxStatus::Failed {
                    message: message.clone(),
                });
                self.log.push_error(&message);
                Err(AegisError::WriteFailed { message })
            }
        }
    }

    async fn execute(&self, sender: &S, request: TransactionRequest) -> Result<B256, AegisError> {
        let tx_hash = sender.send(request).await?;
        self.status_tx.send_replace(TxStatus::Confirming {
            tx_hash: tx_hash.to_string(),
        });
        self.log.push("Broadcast: Confirming Transaction...");
        sender.wait_for_receipt(tx_hash).await?;
        Ok(tx_hash)
    }
}

/// A claimed write slot. Dropped unsettled (the write panicked or was
/// cancelled), it moves the status to `Failed` so later submits are not
/// refused as busy.
struct InFlight<'a> {
    status_tx: &'a watch::Sender<TxStatus>,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn new(status_tx: &'a watch::Sender<TxStatus>) -> Self {
        Self {
            status_tx,
            settled: false,
        }
    }

    fn settle(mut self, status: TxStatus) {
        self.status_tx.send_replace(status);
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("write ended without a terminal status");
            self.status_tx.send_replace(TxStatus::Failed {
                message: WRITE_ABORTED.into(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{chain_addresses, FALLBACK_POOL, GATEWAY, RESOLVED_POOL, USDC, USER};
    use alloy::primitives::{b256, TxKind};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const HASH: B256 = b256!("00000000000000000000000000000000000000000000000000000000000000f1");

    #[derive(Default)]
    struct MockSender {
        sent: Mutex<Vec<TransactionRequest>>,
        send_calls: AtomicUsize,
        send_error: Mutex<Option<String>>,
        receipt_error: Mutex<Option<String>>,
        /// When set, `wait_for_receipt` parks until notified.
        hold_receipt: Option<Arc<Notify>>,
        /// The next `send` panics instead of returning.
        panic_next_send: AtomicBool,
    }

    impl TxSender for MockSender {
        async fn send(&self, tx: TransactionRequest) -> Result<B256, AegisError> {
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_next_send.swap(false, Ordering::SeqCst) {
                panic!("signer backend crashed");
            }
            if let Some(message) = self.send_error.lock().unwrap().clone() {
                return Err(AegisError::WriteFailed { message });
            }
            self.sent.lock().unwrap().push(tx);
            Ok(HASH)
        }

        async fn wait_for_receipt(&self, _tx_hash: B256) -> Result<(), AegisError> {
            if let Some(gate) = &self.hold_receipt {
                gate.notified().await;
            }
            match self.receipt_error.lock().unwrap().clone() {
                Some(message) => Err(AegisError::WriteFailed { message }),
                None => Ok(()),
            }
        }
    }

    struct Fixture {
        sender: Arc<MockSender>,
        orchestrator: TxOrchestrator<MockSender>,
        allowance_tx: watch::Sender<Option<U256>>,
        refresh: RefreshHandle,
        log: Arc<ActivityLog>,
        pool_tx: watch::Sender<Address>,
        _user_tx: watch::Sender<Option<Address>>,
    }

    fn fixture_with(sender: MockSender, user: Option<Address>, read_only: bool) -> Fixture {
        let sender = Arc::new(sender);
        let (pool_tx, pool_rx) = watch::channel(RESOLVED_POOL);
        let (user_tx, user_rx) = watch::channel(user);
        let (allowance_tx, allowance_rx) = watch::channel(None);
        let refresh = RefreshHandle::new();
        let log = Arc::new(ActivityLog::new());
        let orchestrator = TxOrchestrator::new(
            (!read_only).then(|| sender.clone()),
            chain_addresses(),
            pool_rx,
            user_rx,
            allowance_rx,
            refresh.clone(),
            log.clone(),
        );
        Fixture {
            sender,
            orchestrator,
            allowance_tx,
            refresh,
            log,
            pool_tx,
            _user_tx: user_tx,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockSender::default(), Some(USER), false)
    }

    fn usdc(whole: u64) -> U256 {
        U256::from(whole) * U256::from(1_000_000u64)
    }

    fn form(mode: Mode, amount: &str) -> FormState {
        FormState {
            mode,
            amount: amount.into(),
        }
    }

    fn selector(req: &TransactionRequest) -> [u8; 4] {
        let input = req.input.input().expect("calldata");
        input[..4].try_into().unwrap()
    }

    // -- routing ------------------------------------------------------------

    #[test]
    fn test_plan_earn_routes_through_gateway() {
        let supply = plan_intent(Action::Primary, &form(Mode::Earn, "0.5"), None).unwrap();
        assert_eq!(supply.kind, IntentKind::Supply);
        assert_eq!(supply.raw_amount, U256::from(500_000_000_000_000_000u64));

        let recall = plan_intent(Action::Secondary, &form(Mode::Earn, "0.5"), None).unwrap();
        assert_eq!(recall.kind, IntentKind::Withdraw);
    }

    #[test]
    fn test_plan_leverage_secondary_uses_allowance() {
        // Scenario C
        let intent =
            plan_intent(Action::Secondary, &form(Mode::Leverage, "100"), Some(usdc(50))).unwrap();
        assert_eq!(intent.kind, IntentKind::Approve);
        assert_eq!(intent.raw_amount, usdc(100));

        // Scenario D
        let intent =
            plan_intent(Action::Secondary, &form(Mode::Leverage, "100"), Some(usdc(150))).unwrap();
        assert_eq!(intent.kind, IntentKind::Repay);

        let borrow =
            plan_intent(Action::Primary, &form(Mode::Leverage, "100"), Some(usdc(0))).unwrap();
        assert_eq!(borrow.kind, IntentKind::Borrow);
    }

    #[test]
    fn test_plan_rejects_bad_amounts() {
        for amount in ["", "0", "-1", "abc", "0.0000001"] {
            let err = plan_intent(Action::Primary, &form(Mode::Leverage, amount), None).unwrap_err();
            assert!(
                matches!(&err, AegisError::InvalidInput(m) if m == INVALID_AMOUNT),
                "amount {amount:?}: {err}"
            );
        }
    }

    #[test]
    fn test_build_supply_carries_value() {
        let intent = plan_intent(Action::Primary, &form(Mode::Earn, "1"), None).unwrap();
        let req = build_request(&intent, RESOLVED_POOL, USER, &chain_addresses());
        assert_eq!(req.to, Some(TxKind::Call(GATEWAY)));
        assert_eq!(req.value, Some(U256::from(10u64).pow(U256::from(18u8))));
        assert_eq!(selector(&req), [0x47, 0x4c, 0xf5, 0x3d]);
    }

    #[test]
    fn test_build_targets() {
        let addrs = chain_addresses();
        let cases = [
            (Mode::Earn, Action::Secondary, None, GATEWAY, [0x80, 0x50, 0x0d, 0x20]),
            (Mode::Leverage, Action::Primary, None, RESOLVED_POOL, [0xa4, 0x15, 0xbc, 0xad]),
            (Mode::Leverage, Action::Secondary, None, USDC, [0x09, 0x5e, 0xa7, 0xb3]),
            (
                Mode::Leverage,
                Action::Secondary,
                Some(usdc(1_000)),
                RESOLVED_POOL,
                [0x57, 0x3a, 0xde, 0x81],
            ),
        ];
        for (mode, action, allowance, to, sel) in cases {
            let intent = plan_intent(action, &form(mode, "10"), allowance).unwrap();
            let req = build_request(&intent, RESOLVED_POOL, USER, &addrs);
            assert_eq!(req.to, Some(TxKind::Call(to)), "{:?}", intent.kind);
            assert_eq!(selector(&req), sel, "{:?}", intent.kind);
            assert_eq!(req.value, None);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(primary_label(Mode::Earn), "Supply");
        assert_eq!(primary_label(Mode::Leverage), "Borrow");
        assert_eq!(secondary_label(Mode::Earn, "100", None), "Recall");
        assert_eq!(secondary_label(Mode::Leverage, "100", Some(usdc(50))), "Unlock USDC");
        assert_eq!(secondary_label(Mode::Leverage, "100", Some(usdc(150))), "Repay Debt");
        assert_eq!(secondary_label(Mode::Leverage, "", None), "Repay Debt");
    }

    // -- submit -------------------------------------------------------------

    #[tokio::test]
    async fn test_submit_without_wallet() {
        let fx = fixture_with(MockSender::default(), None, false);
        fx.orchestrator.set_amount("1");
        let err = fx.orchestrator.submit(Action::Primary).await.unwrap_err();
        assert!(matches!(err, AegisError::InvalidInput(m) if m == CONNECT_WALLET));
        assert_eq!(fx.sender.send_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.orchestrator.status(), TxStatus::Idle);
    }

    #[tokio::test]
    async fn test_submit_invalid_amount_never_sends() {
        let fx = fixture();
        fx.orchestrator.set_amount("0");
        let err = fx.orchestrator.submit(Action::Primary).await.unwrap_err();
        assert!(matches!(err, AegisError::InvalidInput(m) if m == INVALID_AMOUNT));
        assert_eq!(fx.sender.send_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_submit_read_only() {
        let fx = fixture_with(MockSender::default(), Some(USER), true);
        fx.orchestrator.set_amount("1");
        assert!(fx.orchestrator.is_read_only());
        let err = fx.orchestrator.submit(Action::Primary).await.unwrap_err();
        assert!(matches!(err, AegisError::InvalidInput(m) if m == READ_ONLY));
    }

    #[tokio::test]
    async fn test_submit_confirmed_clears_amount_and_refreshes() {
        let fx = fixture();
        fx.orchestrator.set_mode(Mode::Leverage);
        fx.orchestrator.set_amount("25");

        let hash = fx.orchestrator.submit(Action::Primary).await.unwrap();

        assert_eq!(hash, HASH);
        assert_eq!(
            fx.orchestrator.status(),
            TxStatus::Confirmed {
                tx_hash: HASH.to_string()
            }
        );
        assert!(fx.orchestrator.form().amount.is_empty());
        assert_eq!(fx.orchestrator.form().mode, Mode::Leverage);
        assert_eq!(fx.refresh.take_pending(), 3);

        let lines: Vec<_> = fx.log.recent(3).into_iter().map(|l| l.message).collect();
        assert_eq!(
            lines,
            vec![
                "Success: Ledger Updated.",
                "Broadcast: Confirming Transaction...",
                "Strategy: Borrow 25 USDC",
            ]
        );
    }

    #[tokio::test]
    async fn test_submit_uses_pool_at_submit_time() {
        let fx = fixture();
        fx.pool_tx.send_replace(FALLBACK_POOL);
        fx.orchestrator.set_mode(Mode::Leverage);
        fx.orchestrator.set_amount("1");
        fx.orchestrator.submit(Action::Primary).await.unwrap();

        let sent = fx.sender.sent.lock().unwrap();
        assert_eq!(sent[0].to, Some(TxKind::Call(FALLBACK_POOL)));
    }

    #[tokio::test]
    async fn test_submit_approve_when_allowance_short() {
        let fx = fixture();
        fx.allowance_tx.send_replace(Some(usdc(50)));
        fx.orchestrator.set_mode(Mode::Leverage);
        fx.orchestrator.set_amount("100");
        assert_eq!(secondary_label(Mode::Leverage, "100", Some(usdc(50))), "Unlock USDC");

        fx.orchestrator.submit(Action::Secondary).await.unwrap();
        let sent = fx.sender.sent.lock().unwrap();
        assert_eq!(sent[0].to, Some(TxKind::Call(USDC)));
        assert_eq!(
            fx.log.recent(3)[2].message,
            "Authorization: Approving 100 USDC..."
        );
    }

    #[tokio::test]
    async fn test_rejected_signature_fails_with_raw_message() {
        let sender = MockSender::default();
        *sender.send_error.lock().unwrap() = Some("User rejected the request.".into());
        let fx = fixture_with(sender, Some(USER), false);
        fx.orchestrator.set_amount("0.1");

        let err = fx.orchestrator.submit(Action::Primary).await.unwrap_err();
        assert!(matches!(&err, AegisError::WriteFailed { message } if message == "User rejected the request."));
        assert_eq!(
            fx.orchestrator.status(),
            TxStatus::Failed {
                message: "User rejected the request.".into()
            }
        );
        // Amount is kept so the user can retry.
        assert_eq!(fx.orchestrator.form().amount, "0.1");
        assert_eq!(fx.refresh.take_pending(), 0);
        assert_eq!(fx.log.recent(1)[0].message, "ERROR: User rejected the re...");

        *fx.sender.send_error.lock().unwrap() = None;
        fx.orchestrator.submit(Action::Primary).await.unwrap();
        assert!(matches!(fx.orchestrator.status(), TxStatus::Confirmed { .. }));
    }

    #[tokio::test]
    async fn test_panicking_sender_releases_busy_slot() {
        let sender = MockSender::default();
        sender.panic_next_send.store(true, Ordering::SeqCst);
        let fx = Arc::new(fixture_with(sender, Some(USER), false));
        fx.orchestrator.set_amount("1");

        let crashed = {
            let fx = fx.clone();
            tokio::spawn(async move { fx.orchestrator.submit(Action::Primary).await })
        };
        assert!(crashed.await.unwrap_err().is_panic());
        assert_eq!(
            fx.orchestrator.status(),
            TxStatus::Failed {
                message: WRITE_ABORTED.into()
            }
        );

        let hash = fx.orchestrator.submit(Action::Primary).await.unwrap();
        assert_eq!(hash, HASH);
        assert_eq!(fx.sender.send_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reverted_receipt_fails() {
        let sender = MockSender::default();
        *sender.receipt_error.lock().unwrap() = Some("transaction reverted".into());
        let fx = fixture_with(sender, Some(USER), false);
        fx.orchestrator.set_amount("1");

        let err = fx.orchestrator.submit(Action::Secondary).await.unwrap_err();
        assert!(matches!(err, AegisError::WriteFailed { .. }));
        assert!(matches!(fx.orchestrator.status(), TxStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_second_submit_while_confirming_is_busy() {
        let gate = Arc::new(Notify::new());
        let sender = MockSender {
            hold_receipt: Some(gate.clone()),
            ..MockSender::default()
        };
        let fx = Arc::new(fixture_with(sender, Some(USER), false));
        fx.orchestrator.set_amount("1");

        let mut status = fx.orchestrator.subscribe_status();
        let first = {
            let fx = fx.clone();
            tokio::spawn(async move { fx.orchestrator.submit(Action::Primary).await })
        };
        status
            .wait_for(|s| matches!(s, TxStatus::Confirming { .. }))
            .await
            .unwrap();

        let err = fx.orchestrator.submit(Action::Primary).await.unwrap_err();
        assert!(matches!(err, AegisError::Busy));
        assert_eq!(fx.sender.send_calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(!fx.orchestrator.status().is_busy());
    }
}
