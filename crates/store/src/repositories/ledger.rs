//! Append-only ledger store with window queries.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use kasira_core::ledger::{EntryKind, LedgerEntry, WalletBalances};
use kasira_core::limits::WindowUsage;
use kasira_shared::types::pagination::{PageRequest, PageResponse};
use kasira_shared::types::WalletId;
use kasira_shared::EngineResult;

/// In-memory append-only ledger log, indexed per wallet in append order.
#[derive(Debug, Default)]
pub struct LedgerStore {
    entries: DashMap<WalletId, Vec<LedgerEntry>>,
}

impl LedgerStore {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry. Entries are immutable once appended.
    pub fn append(&self, entry: LedgerEntry) {
        self.entries.entry(entry.wallet_id).or_default().push(entry);
    }

    /// Snapshot of a wallet's full log, oldest first.
    #[must_use]
    pub fn entries_for(&self, wallet_id: WalletId) -> Vec<LedgerEntry> {
        self.entries
            .get(&wallet_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// One page of a wallet's log, oldest first.
    #[must_use]
    pub fn page_for(&self, wallet_id: WalletId, page: PageRequest) -> PageResponse<LedgerEntry> {
        let all = self.entries_for(wallet_id);
        let total = all.len() as u64;
        let data: Vec<LedgerEntry> = all
            .into_iter()
            .skip(page.offset())
            .take(page.limit())
            .collect();
        PageResponse::new(data, page, total)
    }

    /// Captured + reserved volume committed in the current UTC day and
    /// calendar month.
    ///
    /// Captures always consume an earlier reservation, so usage is the
    /// reserve volume net of releases within each window; it never
    /// counts the same funds twice.
    #[must_use]
    pub fn window_usage(&self, wallet_id: WalletId, now: DateTime<Utc>) -> WindowUsage {
        let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let month_start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
            .unwrap_or(now.date_naive())
            .and_time(NaiveTime::MIN)
            .and_utc();

        let mut usage = WindowUsage::default();
        if let Some(entries) = self.entries.get(&wallet_id) {
            for entry in entries.iter() {
                let weight = match entry.kind {
                    EntryKind::Reserve => entry.amount,
                    EntryKind::Release => -entry.amount,
                    _ => continue,
                };
                if entry.timestamp >= day_start {
                    usage.day += weight;
                }
                if entry.timestamp >= month_start {
                    usage.month += weight;
                }
            }
        }
        usage.day = usage.day.max(Decimal::ZERO);
        usage.month = usage.month.max(Decimal::ZERO);
        usage
    }

    /// Rebuilds a wallet's balances by replaying its full log from zero.
    ///
    /// # Errors
    ///
    /// Propagates a transition error, which would mean the persisted log
    /// itself is inconsistent.
    pub fn replay_balances(&self, wallet_id: WalletId) -> EngineResult<WalletBalances> {
        WalletBalances::replay(
            self.entries_for(wallet_id)
                .into_iter()
                .map(|e| (e.kind, e.amount)),
        )
    }
}
