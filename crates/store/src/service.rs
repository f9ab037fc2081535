//! The engine's transactional entry points.
//!
//! [`EngineService`] combines the rule evaluation engine with the
//! balance state machine: every mutating call takes the wallet lock,
//! evaluates against a point-in-time read, stages the full mutation,
//! and only then commits wallet, invoice, and ledger together. A
//! failure at any stage leaves nothing behind.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use kasira_core::engine::{EvaluationInput, EvaluationOutcome, RuleEvaluationEngine, Verdict};
use kasira_core::compliance::ComplianceVerificationService;
use kasira_core::customer::{Customer, CustomerDirectory};
use kasira_core::events::{EngineEvent, EventSink};
use kasira_core::invoice::{validate_draft, Invoice, InvoiceDraft, InvoiceStatus};
use kasira_core::ledger::{EntryKind, LedgerEntry, WalletBalances};
use kasira_core::wallet::{ModeDecision, Wallet, WalletLimits, WalletMode};
use kasira_shared::config::EngineConfig;
use kasira_shared::types::money::is_payable_amount;
use kasira_shared::types::pagination::{PageRequest, PageResponse};
use kasira_shared::types::{
    Currency, CustomerId, IdempotencyKey, InvoiceId, LedgerEntryId, TransferId, WalletId,
};
use kasira_shared::{EngineError, EngineResult};

use crate::lock::WalletLockManager;
use crate::repositories::{
    IdempotencyStore, InvoiceRepository, LedgerStore, RuleRepository, WalletRepository,
};

/// Request to provision a wallet.
#[derive(Debug, Clone)]
pub struct CreateWalletInput {
    /// Owning customer account.
    pub owner: CustomerId,
    /// Initial mode.
    pub mode: WalletMode,
    /// Wallet currency.
    pub currency: Currency,
    /// Spending caps.
    pub limits: WalletLimits,
    /// Conversion threshold for Adaptive wallets.
    pub adaptive_threshold: Option<Decimal>,
}

/// Request to evaluate an invoice and, on accept, apply it.
#[derive(Debug, Clone)]
pub struct EvaluateAndApplyInput {
    /// The wallet the invoice draws on.
    pub wallet_id: WalletId,
    /// The submitted invoice fields.
    pub draft: InvoiceDraft,
    /// Amount to capture now; defaults to the full remaining amount.
    pub capture_amount: Option<Decimal>,
    /// Caller-supplied retry-safety key.
    pub idempotency_key: IdempotencyKey,
}

/// Result of `evaluate_and_apply`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyOutcome {
    /// The verdict the rule chain produced.
    pub verdict: Verdict,
    /// The invoice record, when one was persisted.
    pub invoice_id: Option<InvoiceId>,
    /// Its status after this call.
    pub invoice_status: Option<InvoiceStatus>,
    /// Wallet balances after this call.
    pub wallet_balances: WalletBalances,
}

/// Result of `release`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseOutcome {
    /// The released invoice.
    pub invoice_id: InvoiceId,
    /// Its status after the release (always cancelled).
    pub invoice_status: InvoiceStatus,
    /// Wallet balances after the release.
    pub wallet_balances: WalletBalances,
}

/// Result of `transfer`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferOutcome {
    /// Correlation id shared by both ledger legs.
    pub transfer_id: TransferId,
    /// Source balances after the transfer.
    pub source_balances: WalletBalances,
    /// Target balances after the transfer.
    pub target_balances: WalletBalances,
}

/// Result of `deposit`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositOutcome {
    /// Wallet balances after the deposit.
    pub wallet_balances: WalletBalances,
}

/// Result of `withdraw`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawOutcome {
    /// Wallet balances after the withdrawal.
    pub wallet_balances: WalletBalances,
}

/// Audit view comparing materialized balances with a ledger replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletAudit {
    /// Balances as stored on the wallet record.
    pub materialized: WalletBalances,
    /// Balances rebuilt by replaying the wallet's ledger from zero.
    pub replayed: WalletBalances,
    /// True when the two views agree.
    pub consistent: bool,
}

/// Outcome stored under an idempotency key.
#[derive(Debug, Clone)]
enum RecordedOutcome {
    Apply(ApplyOutcome),
    Release(ReleaseOutcome),
    Transfer(TransferOutcome),
    Deposit(DepositOutcome),
    Withdraw(WithdrawOutcome),
}

/// The engine's single transactional entry point.
pub struct EngineService {
    wallets: WalletRepository,
    invoices: InvoiceRepository,
    rules: RuleRepository,
    ledger: LedgerStore,
    idempotency: IdempotencyStore<RecordedOutcome>,
    locks: WalletLockManager,
    engine: RuleEvaluationEngine,
    verifier: Arc<dyn ComplianceVerificationService>,
    directory: Arc<dyn CustomerDirectory>,
    events: Arc<dyn EventSink>,
    retry_limit: u32,
}

impl EngineService {
    /// Creates a service over empty stores.
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        verifier: Arc<dyn ComplianceVerificationService>,
        directory: Arc<dyn CustomerDirectory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            wallets: WalletRepository::new(),
            invoices: InvoiceRepository::new(),
            rules: RuleRepository::new(),
            ledger: LedgerStore::new(),
            idempotency: IdempotencyStore::new(),
            locks: WalletLockManager::new(),
            engine: RuleEvaluationEngine::new(Decimal::from(config.kyc_required_threshold)),
            verifier,
            directory,
            events,
            retry_limit: config.concurrency_retry_limit,
        }
    }

    /// The business rule table, for administration.
    #[must_use]
    pub fn rules(&self) -> &RuleRepository {
        &self.rules
    }

    /// The wallet repository, for administrative status changes.
    #[must_use]
    pub fn wallets(&self) -> &WalletRepository {
        &self.wallets
    }

    // ========================================================================
    // Wallet provisioning and reads
    // ========================================================================

    /// Provisions a wallet.
    ///
    /// # Errors
    ///
    /// `Validation` when an Adaptive wallet is created without a
    /// threshold, or a threshold is supplied for another mode.
    pub fn create_wallet(&self, input: CreateWalletInput) -> EngineResult<Wallet> {
        match (input.mode, input.adaptive_threshold) {
            (WalletMode::Adaptive, None) => {
                return Err(EngineError::Validation(
                    "adaptive wallets require an adaptive_threshold".to_string(),
                ));
            }
            (WalletMode::Adaptive, Some(threshold)) if !is_payable_amount(threshold) => {
                return Err(EngineError::Validation(
                    "adaptive_threshold must be a positive whole number of minor units"
                        .to_string(),
                ));
            }
            (WalletMode::Ephemeral | WalletMode::Persistent, Some(_)) => {
                return Err(EngineError::Validation(format!(
                    "adaptive_threshold is only meaningful for adaptive wallets, not {}",
                    input.mode
                )));
            }
            _ => {}
        }

        let wallet = Wallet::new(
            input.owner,
            input.mode,
            input.currency,
            input.limits,
            input.adaptive_threshold,
            Utc::now(),
        );
        self.wallets.insert(wallet.clone());
        info!(wallet_id = %wallet.id, mode = %wallet.mode, "wallet provisioned");
        self.events.emit(EngineEvent::WalletCreated {
            wallet_id: wallet.id,
        });
        Ok(wallet)
    }

    /// Fetches a wallet snapshot.
    pub fn get_wallet(&self, id: WalletId) -> EngineResult<Wallet> {
        self.wallets.get(id)
    }

    /// Fetches an invoice snapshot.
    pub fn get_invoice(&self, id: InvoiceId) -> EngineResult<Invoice> {
        self.invoices.get(id)
    }

    /// One page of a wallet's ledger, oldest first.
    pub fn wallet_entries(
        &self,
        wallet_id: WalletId,
        page: PageRequest,
    ) -> EngineResult<PageResponse<LedgerEntry>> {
        self.wallets.get(wallet_id)?;
        Ok(self.ledger.page_for(wallet_id, page))
    }

    /// Compares a wallet's materialized balances with a full replay of
    /// its ledger.
    pub fn audit_wallet(&self, wallet_id: WalletId) -> EngineResult<WalletAudit> {
        let wallet = self.wallets.get(wallet_id)?;
        let replayed = self.ledger.replay_balances(wallet_id)?;
        Ok(WalletAudit {
            materialized: wallet.balances,
            replayed,
            consistent: wallet.balances == replayed,
        })
    }

    // ========================================================================
    // Evaluate and apply
    // ========================================================================

    /// Evaluates an invoice against the rule chain and, on accept,
    /// reserves its amount and captures the requested portion.
    ///
    /// Submitting the same reference again routes by the stored
    /// invoice's state: an open invoice takes a follow-up capture from
    /// its reservation, a blocked invoice is re-evaluated from scratch,
    /// and a terminal invoice rejects the reference as a duplicate.
    pub fn evaluate_and_apply(&self, input: &EvaluateAndApplyInput) -> EngineResult<ApplyOutcome> {
        Self::ensure_key(&input.idempotency_key)?;
        validate_draft(&input.draft)?;

        let capture_tag = input
            .capture_amount
            .map_or_else(|| "full".to_string(), |a| a.to_string());
        let fingerprint = format!(
            "apply:{}:{}:{}:{capture_tag}",
            input.wallet_id, input.draft.reference, input.draft.amount
        );
        if let Some(RecordedOutcome::Apply(outcome)) =
            self.idempotency.recall(&input.idempotency_key, &fingerprint)?
        {
            return Ok(outcome);
        }

        self.with_retries(|| {
            self.locks
                .with_lock(input.wallet_id, || self.apply_locked(input, &fingerprint))
        })
    }

    fn apply_locked(
        &self,
        input: &EvaluateAndApplyInput,
        fingerprint: &str,
    ) -> EngineResult<ApplyOutcome> {
        let now = Utc::now();
        let wallet = self.wallets.get(input.wallet_id)?;
        wallet.ensure_active()?;
        wallet.ensure_currency(input.draft.currency)?;
        let customer = self
            .directory
            .get(input.draft.customer)
            .ok_or(EngineError::CustomerNotFound(input.draft.customer))?;

        match self
            .invoices
            .find_by_reference(wallet.owner, &input.draft.reference)
        {
            Some(existing) => {
                self.apply_existing(wallet, &customer, existing, input, fingerprint, now)
            }
            None => {
                if wallet.mode == WalletMode::Ephemeral
                    && self.invoices.open_invoice_count(wallet.id) > 0
                {
                    return Err(EngineError::Validation(
                        "ephemeral wallet already has an open invoice".to_string(),
                    ));
                }
                let invoice = Invoice::from_draft(input.draft.clone(), wallet.id, now);
                self.apply_fresh(wallet, &customer, invoice, false, input, fingerprint, now)
            }
        }
    }

    /// Evaluates and settles an invoice that holds no reservation yet:
    /// either brand new (`reopened = false`) or previously blocked.
    #[allow(clippy::too_many_arguments)]
    fn apply_fresh(
        &self,
        wallet: Wallet,
        customer: &Customer,
        mut invoice: Invoice,
        reopened: bool,
        input: &EvaluateAndApplyInput,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ApplyOutcome> {
        let eval = match self.evaluate(&wallet, &invoice, customer, now) {
            Ok(eval) => eval,
            Err(EngineError::ComplianceTimeout(check)) => {
                // Not silently accepted: the invoice lands in blocked.
                invoice.mark_blocked();
                self.persist_invoice(&wallet, invoice.clone(), reopened)?;
                self.events.emit(EngineEvent::InvoiceBlocked {
                    invoice_id: invoice.id,
                    wallet_id: wallet.id,
                    reason: "COMPLIANCE_TIMEOUT".to_string(),
                });
                return Err(EngineError::ComplianceTimeout(check));
            }
            Err(other) => return Err(other),
        };

        match eval.verdict {
            Verdict::Block { reason } => {
                invoice.mark_blocked();
                self.persist_invoice(&wallet, invoice.clone(), reopened)?;
                info!(invoice_id = %invoice.id, %reason, "invoice blocked");
                self.events.emit(EngineEvent::InvoiceBlocked {
                    invoice_id: invoice.id,
                    wallet_id: wallet.id,
                    reason: reason.clone(),
                });
                let outcome = ApplyOutcome {
                    verdict: Verdict::Block { reason },
                    invoice_id: Some(invoice.id),
                    invoice_status: Some(InvoiceStatus::Blocked),
                    wallet_balances: wallet.balances,
                };
                self.idempotency.record(
                    input.idempotency_key.clone(),
                    fingerprint,
                    RecordedOutcome::Apply(outcome.clone()),
                );
                Ok(outcome)
            }
            Verdict::RequiresAdditionalCheck { checks } => {
                // Nothing is persisted; the caller resubmits with the
                // gathered checks and loses no invoice state.
                let outcome = ApplyOutcome {
                    verdict: Verdict::RequiresAdditionalCheck { checks },
                    invoice_id: reopened.then_some(invoice.id),
                    invoice_status: reopened.then_some(invoice.status),
                    wallet_balances: wallet.balances,
                };
                self.idempotency.record(
                    input.idempotency_key.clone(),
                    fingerprint,
                    RecordedOutcome::Apply(outcome.clone()),
                );
                Ok(outcome)
            }
            Verdict::Accept => {
                self.settle_accepted(wallet, invoice, reopened, eval.mode, input, fingerprint, now)
            }
        }
    }

    /// Reserves the invoice amount and captures the requested portion,
    /// committing wallet, invoice, and ledger entries together.
    #[allow(clippy::too_many_arguments)]
    fn settle_accepted(
        &self,
        wallet: Wallet,
        mut invoice: Invoice,
        reopened: bool,
        mode: ModeDecision,
        input: &EvaluateAndApplyInput,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ApplyOutcome> {
        let capture = input.capture_amount.unwrap_or(invoice.amount);
        if !is_payable_amount(capture) || capture > invoice.amount {
            return Err(EngineError::Validation(format!(
                "capture amount {capture} must be positive and at most the invoice amount {}",
                invoice.amount
            )));
        }

        if reopened {
            invoice.reopen()?;
        }

        let before = wallet.balances;
        let after_reserve = before.apply(EntryKind::Reserve, invoice.amount)?;
        let after_capture = after_reserve.apply(EntryKind::Capture, capture)?;
        invoice.record_capture(capture)?;

        let mut updated = wallet.clone();
        updated.balances = after_capture;
        if mode.converted {
            updated.mode = mode.mode;
        }

        if reopened {
            // Reference is already claimed; commit the wallet before
            // overwriting the invoice record.
            self.wallets.update_versioned(updated)?;
            self.invoices.update(invoice.clone())?;
        } else {
            // Claim the reference atomically, then commit the versioned
            // wallet. A conflict rolls the claim back so a retry starts
            // clean.
            self.invoices.insert(wallet.owner, invoice.clone())?;
            if let Err(err) = self.wallets.update_versioned(updated) {
                self.invoices.remove(wallet.owner, invoice.id);
                return Err(err);
            }
        }

        self.ledger.append(Self::entry(
            &wallet,
            EntryKind::Reserve,
            invoice.amount,
            before,
            after_reserve,
            Some(invoice.id),
            None,
            &input.idempotency_key,
            now,
        ));
        self.ledger.append(Self::entry(
            &wallet,
            EntryKind::Capture,
            capture,
            after_reserve,
            after_capture,
            Some(invoice.id),
            None,
            &input.idempotency_key,
            now,
        ));

        if mode.converted {
            info!(wallet_id = %wallet.id, from = %wallet.mode, to = %mode.mode, "wallet mode converted");
            self.events.emit(EngineEvent::WalletModeChanged {
                wallet_id: wallet.id,
                from: wallet.mode,
                to: mode.mode,
            });
        }
        self.emit_capture_event(&invoice);
        info!(
            invoice_id = %invoice.id,
            wallet_id = %wallet.id,
            amount = %invoice.amount,
            captured = %capture,
            "invoice accepted and applied"
        );

        let outcome = ApplyOutcome {
            verdict: Verdict::Accept,
            invoice_id: Some(invoice.id),
            invoice_status: Some(invoice.status),
            wallet_balances: after_capture,
        };
        self.idempotency.record(
            input.idempotency_key.clone(),
            fingerprint,
            RecordedOutcome::Apply(outcome.clone()),
        );
        Ok(outcome)
    }

    /// Routes a resubmitted reference by the stored invoice's state.
    fn apply_existing(
        &self,
        wallet: Wallet,
        customer: &Customer,
        existing: Invoice,
        input: &EvaluateAndApplyInput,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ApplyOutcome> {
        let same_terms = existing.wallet_id == wallet.id
            && existing.amount == input.draft.amount
            && existing.currency == input.draft.currency;
        if !same_terms {
            return Err(EngineError::DuplicateInvoiceReference(
                input.draft.reference.clone(),
            ));
        }

        match existing.status {
            // Remediation path: a blocked invoice is re-evaluated from
            // scratch (checks are never cached across evaluations).
            InvoiceStatus::Blocked => {
                self.apply_fresh(wallet, customer, existing, true, input, fingerprint, now)
            }
            // Follow-up capture from the outstanding reservation; the
            // funds were approved and limit-counted at reserve time.
            InvoiceStatus::Pending | InvoiceStatus::PartiallyPaid => {
                self.capture_followup(wallet, existing, input, fingerprint, now)
            }
            InvoiceStatus::Paid | InvoiceStatus::Cancelled => Err(
                EngineError::DuplicateInvoiceReference(input.draft.reference.clone()),
            ),
        }
    }

    fn capture_followup(
        &self,
        wallet: Wallet,
        mut invoice: Invoice,
        input: &EvaluateAndApplyInput,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<ApplyOutcome> {
        let capture = input.capture_amount.unwrap_or_else(|| invoice.remaining());
        if !is_payable_amount(capture) {
            return Err(EngineError::Validation(format!(
                "capture amount {capture} must be a positive whole number of minor units"
            )));
        }

        let before = wallet.balances;
        let after = before.apply(EntryKind::Capture, capture)?;
        invoice.record_capture(capture)?;

        let mut updated = wallet.clone();
        updated.balances = after;
        self.wallets.update_versioned(updated)?;
        self.invoices.update(invoice.clone())?;
        self.ledger.append(Self::entry(
            &wallet,
            EntryKind::Capture,
            capture,
            before,
            after,
            Some(invoice.id),
            None,
            &input.idempotency_key,
            now,
        ));
        self.emit_capture_event(&invoice);
        info!(
            invoice_id = %invoice.id,
            captured = %capture,
            amount_paid = %invoice.amount_paid,
            "follow-up capture applied"
        );

        let outcome = ApplyOutcome {
            verdict: Verdict::Accept,
            invoice_id: Some(invoice.id),
            invoice_status: Some(invoice.status),
            wallet_balances: after,
        };
        self.idempotency.record(
            input.idempotency_key.clone(),
            fingerprint,
            RecordedOutcome::Apply(outcome.clone()),
        );
        Ok(outcome)
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Releases an invoice's outstanding reservation and cancels it.
    pub fn release(
        &self,
        invoice_id: InvoiceId,
        idempotency_key: &IdempotencyKey,
    ) -> EngineResult<ReleaseOutcome> {
        Self::ensure_key(idempotency_key)?;
        let fingerprint = format!("release:{invoice_id}");
        if let Some(RecordedOutcome::Release(outcome)) =
            self.idempotency.recall(idempotency_key, &fingerprint)?
        {
            return Ok(outcome);
        }

        let wallet_id = self.invoices.get(invoice_id)?.wallet_id;
        self.with_retries(|| {
            self.locks.with_lock(wallet_id, || {
                self.release_locked(invoice_id, idempotency_key, &fingerprint)
            })
        })
    }

    fn release_locked(
        &self,
        invoice_id: InvoiceId,
        idempotency_key: &IdempotencyKey,
        fingerprint: &str,
    ) -> EngineResult<ReleaseOutcome> {
        let now = Utc::now();
        let mut invoice = self.invoices.get(invoice_id)?;
        let wallet = self.wallets.get(invoice.wallet_id)?;
        wallet.ensure_active()?;

        if !invoice.holds_reservation() {
            return Err(EngineError::Validation(format!(
                "invoice {invoice_id} has no outstanding reservation (status {})",
                invoice.status
            )));
        }

        let remaining = invoice.remaining();
        let before = wallet.balances;
        let after = before.apply(EntryKind::Release, remaining)?;
        invoice.mark_cancelled()?;

        let mut updated = wallet.clone();
        updated.balances = after;
        self.wallets.update_versioned(updated)?;
        self.invoices.update(invoice.clone())?;
        self.ledger.append(Self::entry(
            &wallet,
            EntryKind::Release,
            remaining,
            before,
            after,
            Some(invoice.id),
            None,
            idempotency_key,
            now,
        ));
        info!(invoice_id = %invoice.id, released = %remaining, "reservation released");

        let outcome = ReleaseOutcome {
            invoice_id: invoice.id,
            invoice_status: invoice.status,
            wallet_balances: after,
        };
        self.idempotency.record(
            idempotency_key.clone(),
            fingerprint,
            RecordedOutcome::Release(outcome.clone()),
        );
        Ok(outcome)
    }

    // ========================================================================
    // Transfer
    // ========================================================================

    /// Moves funds between two wallets atomically.
    pub fn transfer(
        &self,
        source: WalletId,
        target: WalletId,
        amount: Decimal,
        idempotency_key: &IdempotencyKey,
    ) -> EngineResult<TransferOutcome> {
        Self::ensure_key(idempotency_key)?;
        if source == target {
            return Err(EngineError::Validation(
                "transfer source and target must differ".to_string(),
            ));
        }
        if !is_payable_amount(amount) {
            return Err(EngineError::Validation(format!(
                "transfer amount must be a positive whole number of minor units, got {amount}"
            )));
        }

        let fingerprint = format!("transfer:{source}:{target}:{amount}");
        if let Some(RecordedOutcome::Transfer(outcome)) =
            self.idempotency.recall(idempotency_key, &fingerprint)?
        {
            return Ok(outcome);
        }

        self.with_retries(|| {
            self.locks.with_pair_lock(source, target, || {
                self.transfer_locked(source, target, amount, idempotency_key, &fingerprint)
            })
        })
    }

    fn transfer_locked(
        &self,
        source: WalletId,
        target: WalletId,
        amount: Decimal,
        idempotency_key: &IdempotencyKey,
        fingerprint: &str,
    ) -> EngineResult<TransferOutcome> {
        let now = Utc::now();
        let source_wallet = self.wallets.get(source)?;
        let target_wallet = self.wallets.get(target)?;
        source_wallet.ensure_active()?;
        target_wallet.ensure_active()?;
        if source_wallet.currency != target_wallet.currency {
            return Err(EngineError::CurrencyMismatch {
                expected: source_wallet.currency,
                actual: target_wallet.currency,
            });
        }

        let source_after = source_wallet
            .balances
            .apply(EntryKind::TransferOut, amount)?;
        let target_after = target_wallet.balances.apply(EntryKind::TransferIn, amount)?;
        let transfer_id = TransferId::new();

        let mut source_updated = source_wallet.clone();
        source_updated.balances = source_after;
        let mut target_updated = target_wallet.clone();
        target_updated.balances = target_after;

        self.wallets.update_versioned(source_updated)?;
        if let Err(err) = self.wallets.update_versioned(target_updated) {
            // Compensate the already-committed source leg before
            // surfacing, so no transfer is ever left half-applied.
            if let Ok(mut current) = self.wallets.get(source) {
                current.balances = source_wallet.balances;
                let _ = self.wallets.update_versioned(current);
            }
            return Err(err);
        }

        self.ledger.append(Self::entry(
            &source_wallet,
            EntryKind::TransferOut,
            amount,
            source_wallet.balances,
            source_after,
            None,
            Some(transfer_id),
            idempotency_key,
            now,
        ));
        self.ledger.append(Self::entry(
            &target_wallet,
            EntryKind::TransferIn,
            amount,
            target_wallet.balances,
            target_after,
            None,
            Some(transfer_id),
            idempotency_key,
            now,
        ));
        info!(%transfer_id, %source, %target, %amount, "funds transferred");
        self.events.emit(EngineEvent::FundsTransferred {
            transfer_id,
            source,
            target,
            amount,
        });

        let outcome = TransferOutcome {
            transfer_id,
            source_balances: source_after,
            target_balances: target_after,
        };
        self.idempotency.record(
            idempotency_key.clone(),
            fingerprint,
            RecordedOutcome::Transfer(outcome.clone()),
        );
        Ok(outcome)
    }

    // ========================================================================
    // Deposit and withdrawal
    // ========================================================================

    /// Deposits external funds into a wallet.
    pub fn deposit(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        idempotency_key: &IdempotencyKey,
    ) -> EngineResult<DepositOutcome> {
        Self::ensure_key(idempotency_key)?;
        if !is_payable_amount(amount) {
            return Err(EngineError::Validation(format!(
                "deposit amount must be a positive whole number of minor units, got {amount}"
            )));
        }
        let fingerprint = format!("deposit:{wallet_id}:{amount}");
        if let Some(RecordedOutcome::Deposit(outcome)) =
            self.idempotency.recall(idempotency_key, &fingerprint)?
        {
            return Ok(outcome);
        }

        self.with_retries(|| {
            self.locks.with_lock(wallet_id, || {
                let now = Utc::now();
                let wallet = self.wallets.get(wallet_id)?;
                wallet.ensure_active()?;
                let before = wallet.balances;
                let after = before.apply(EntryKind::Deposit, amount)?;

                let mut updated = wallet.clone();
                updated.balances = after;
                self.wallets.update_versioned(updated)?;
                self.ledger.append(Self::entry(
                    &wallet,
                    EntryKind::Deposit,
                    amount,
                    before,
                    after,
                    None,
                    None,
                    idempotency_key,
                    now,
                ));
                self.events.emit(EngineEvent::FundsDeposited { wallet_id, amount });

                let outcome = DepositOutcome {
                    wallet_balances: after,
                };
                self.idempotency.record(
                    idempotency_key.clone(),
                    fingerprint.as_str(),
                    RecordedOutcome::Deposit(outcome.clone()),
                );
                Ok(outcome)
            })
        })
    }

    /// Withdraws available funds from a wallet.
    pub fn withdraw(
        &self,
        wallet_id: WalletId,
        amount: Decimal,
        idempotency_key: &IdempotencyKey,
    ) -> EngineResult<WithdrawOutcome> {
        Self::ensure_key(idempotency_key)?;
        if !is_payable_amount(amount) {
            return Err(EngineError::Validation(format!(
                "withdrawal amount must be a positive whole number of minor units, got {amount}"
            )));
        }
        let fingerprint = format!("withdraw:{wallet_id}:{amount}");
        if let Some(RecordedOutcome::Withdraw(outcome)) =
            self.idempotency.recall(idempotency_key, &fingerprint)?
        {
            return Ok(outcome);
        }

        self.with_retries(|| {
            self.locks.with_lock(wallet_id, || {
                let now = Utc::now();
                let wallet = self.wallets.get(wallet_id)?;
                wallet.ensure_active()?;
                let before = wallet.balances;
                let after = before.apply(EntryKind::Withdrawal, amount)?;

                let mut updated = wallet.clone();
                updated.balances = after;
                self.wallets.update_versioned(updated)?;
                self.ledger.append(Self::entry(
                    &wallet,
                    EntryKind::Withdrawal,
                    amount,
                    before,
                    after,
                    None,
                    None,
                    idempotency_key,
                    now,
                ));

                let outcome = WithdrawOutcome {
                    wallet_balances: after,
                };
                self.idempotency.record(
                    idempotency_key.clone(),
                    fingerprint.as_str(),
                    RecordedOutcome::Withdraw(outcome.clone()),
                );
                Ok(outcome)
            })
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Runs the rule chain against a point-in-time read of the stores.
    fn evaluate(
        &self,
        wallet: &Wallet,
        invoice: &Invoice,
        customer: &Customer,
        now: DateTime<Utc>,
    ) -> EngineResult<EvaluationOutcome> {
        let rules = self.rules.all();
        let window_usage = self.ledger.window_usage(wallet.id, now);
        let rolling_volume_30d = self
            .invoices
            .rolling_volume(wallet.id, now - Duration::days(30))
            + invoice.amount;

        self.engine.evaluate(
            &EvaluationInput {
                wallet,
                invoice,
                customer,
                rules: &rules,
                window_usage,
                rolling_volume_30d,
            },
            self.verifier.as_ref(),
        )
    }

    /// Inserts a new invoice record or overwrites a reopened one.
    fn persist_invoice(&self, wallet: &Wallet, invoice: Invoice, reopened: bool) -> EngineResult<()> {
        if reopened {
            self.invoices.update(invoice)
        } else {
            self.invoices.insert(wallet.owner, invoice)
        }
    }

    fn emit_capture_event(&self, invoice: &Invoice) {
        match invoice.status {
            InvoiceStatus::Paid => self.events.emit(EngineEvent::InvoicePaid {
                invoice_id: invoice.id,
                wallet_id: invoice.wallet_id,
                amount: invoice.amount_paid,
            }),
            InvoiceStatus::PartiallyPaid => self.events.emit(EngineEvent::InvoicePartiallyPaid {
                invoice_id: invoice.id,
                wallet_id: invoice.wallet_id,
                amount_paid: invoice.amount_paid,
                remaining: invoice.remaining(),
            }),
            _ => {}
        }
    }

    /// Retries `op` on `ConcurrencyConflict` up to the configured limit.
    fn with_retries<T>(&self, mut op: impl FnMut() -> EngineResult<T>) -> EngineResult<T> {
        let mut attempts = 0;
        loop {
            match op() {
                Err(err) if err.is_retryable() && attempts < self.retry_limit => {
                    attempts += 1;
                    warn!(attempt = attempts, "retrying after concurrency conflict");
                }
                other => return other,
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn entry(
        wallet: &Wallet,
        kind: EntryKind,
        amount: Decimal,
        balance_before: WalletBalances,
        balance_after: WalletBalances,
        invoice_id: Option<InvoiceId>,
        correlation_id: Option<TransferId>,
        idempotency_key: &IdempotencyKey,
        timestamp: DateTime<Utc>,
    ) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            wallet_id: wallet.id,
            kind,
            amount,
            balance_before,
            balance_after,
            invoice_id,
            correlation_id,
            timestamp,
            idempotency_key: idempotency_key.clone(),
        }
    }

    fn ensure_key(key: &IdempotencyKey) -> EngineResult<()> {
        if key.is_empty() {
            return Err(EngineError::Validation(
                "idempotency key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
