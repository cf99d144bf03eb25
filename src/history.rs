// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Operation history.
//!
//! [`HistoryItem`]s are immutable facts. The [`History`] store keeps one
//! append-only sequence per account behind a reader/writer lock: transfers
//! append under the write guard, statistic queries and snapshots read under
//! the shared guard.

use crate::base::AccountId;
use crate::period::Window;
use chrono::NaiveDateTime;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// Direction of a history entry relative to its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Funds left the account.
    Withdraw,
    /// Funds arrived on the account.
    Topup,
}

/// One recorded movement on an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    operation: OperationType,
    amount: Decimal,
    timestamp: NaiveDateTime,
}

impl HistoryItem {
    pub fn new(operation: OperationType, amount: Decimal, timestamp: NaiveDateTime) -> Self {
        Self {
            operation,
            amount,
            timestamp,
        }
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Per-account history sequences guarded by a reader/writer lock.
#[derive(Debug, Default)]
pub struct History {
    entries: RwLock<HashMap<AccountId, Vec<HistoryItem>>>,
}

impl History {
    pub fn new(initial: HashMap<AccountId, Vec<HistoryItem>>) -> Self {
        Self {
            entries: RwLock::new(initial),
        }
    }

    /// Appends the WITHDRAW/TOPUP pair of one transfer and returns the
    /// timestamp both entries carry.
    ///
    /// Both entries go in under the same write guard, so no other transfer's
    /// pair can interleave with them. `now` is called while the guard is
    /// held, which keeps every sequence's timestamps in insertion order.
    pub fn record_transfer<F>(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
        now: F,
    ) -> NaiveDateTime
    where
        F: FnOnce() -> NaiveDateTime,
    {
        let mut entries = self.entries.write();
        let timestamp = now();
        entries
            .entry(sender)
            .or_default()
            .push(HistoryItem::new(OperationType::Withdraw, amount, timestamp));
        entries
            .entry(receiver)
            .or_default()
            .push(HistoryItem::new(OperationType::Topup, amount, timestamp));
        timestamp
    }

    /// Entries of `account` inside `window`, in recording order.
    pub fn entries_in(&self, account: AccountId, window: Window) -> Vec<HistoryItem> {
        let entries = self.entries.read();
        entries
            .get(&account)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| window.contains(item.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All entries of `account`, in recording order.
    pub fn entries(&self, account: AccountId) -> Vec<HistoryItem> {
        self.entries
            .read()
            .get(&account)
            .cloned()
            .unwrap_or_default()
    }

    /// Point-in-time copy of the whole store.
    pub fn snapshot(&self) -> HashMap<AccountId, Vec<HistoryItem>> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn record_transfer_appends_one_entry_per_side() {
        let history = History::default();
        history.record_transfer(AccountId(1), AccountId(2), dec!(1000), || at(10));

        assert_eq!(
            history.entries(AccountId(1)),
            vec![HistoryItem::new(OperationType::Withdraw, dec!(1000), at(10))]
        );
        assert_eq!(
            history.entries(AccountId(2)),
            vec![HistoryItem::new(OperationType::Topup, dec!(1000), at(10))]
        );
    }

    #[test]
    fn self_transfer_records_both_entries_on_one_account() {
        let history = History::default();
        history.record_transfer(AccountId(5), AccountId(5), dec!(3), || at(10));

        let operations: Vec<_> = history
            .entries(AccountId(5))
            .iter()
            .map(HistoryItem::operation)
            .collect();
        assert_eq!(operations, vec![OperationType::Withdraw, OperationType::Topup]);
    }

    #[test]
    fn entries_keep_insertion_order() {
        let history = History::default();
        history.record_transfer(AccountId(1), AccountId(2), dec!(1), || at(9));
        history.record_transfer(AccountId(2), AccountId(1), dec!(2), || at(10));
        history.record_transfer(AccountId(1), AccountId(2), dec!(3), || at(11));

        let amounts: Vec<_> = history
            .entries(AccountId(1))
            .iter()
            .map(HistoryItem::amount)
            .collect();
        assert_eq!(amounts, vec![dec!(1), dec!(2), dec!(3)]);
    }

    #[test]
    fn entries_in_filters_by_window() {
        let history = History::default();
        history.record_transfer(AccountId(1), AccountId(2), dec!(1), || at(8));
        history.record_transfer(AccountId(1), AccountId(2), dec!(2), || at(10));
        history.record_transfer(AccountId(1), AccountId(2), dec!(3), || at(12));

        let window = Window {
            start: at(10),
            end: at(12),
        };
        let items = history.entries_in(AccountId(1), window);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount(), dec!(2));
    }

    #[test]
    fn unknown_account_has_no_entries() {
        let history = History::default();
        assert!(history.entries(AccountId(9)).is_empty());
        let window = Window {
            start: at(0),
            end: at(23),
        };
        assert!(history.entries_in(AccountId(9), window).is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let history = History::default();
        history.record_transfer(AccountId(1), AccountId(2), dec!(1), || at(8));
        let snapshot = history.snapshot();
        history.record_transfer(AccountId(1), AccountId(2), dec!(1), || at(9));

        assert_eq!(snapshot[&AccountId(1)].len(), 1);
        assert_eq!(history.entries(AccountId(1)).len(), 2);
    }

    #[test]
    fn record_transfer_returns_the_recorded_timestamp() {
        let history = History::default();
        let timestamp = history.record_transfer(AccountId(1), AccountId(2), dec!(1), || at(14));

        assert_eq!(timestamp, at(14));
        assert_eq!(history.entries(AccountId(1))[0].timestamp(), at(14));
        assert_eq!(history.entries(AccountId(2))[0].timestamp(), at(14));
    }

    #[test]
    fn timestamp_is_read_under_the_write_guard() {
        let history = History::default();
        history.record_transfer(AccountId(1), AccountId(2), dec!(1), || {
            // Readers are shut out while the clock is consulted.
            assert!(history.entries.try_read().is_none());
            at(10)
        });
    }

    #[test]
    fn operation_type_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(OperationType::Topup).unwrap(),
            "TOPUP"
        );
        assert_eq!(
            serde_json::to_value(OperationType::Withdraw).unwrap(),
            "WITHDRAW"
        );
    }
}
