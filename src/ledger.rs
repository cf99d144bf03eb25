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

//! Transfer ledger.
//!
//! The [`Ledger`] owns the account registry and the history store. It moves
//! funds between two accounts atomically and serves per-account statistics
//! over calendar periods.
//!
//! # Locking
//!
//! - **Accounts**: each account has its own mutex. A transfer locks both
//!   participants in ascending id order regardless of which one is sending,
//!   so two transfers over the same pair in opposite directions request the
//!   locks in the same sequence and cannot wait on each other in a cycle.
//!   A self-transfer takes its single lock once.
//! - **History**: one reader/writer lock. A transfer appends its two entries
//!   under the write guard after the account locks are released; statistic
//!   queries and snapshots take the read guard and run alongside each other.
//!
//! No code path holds the history lock while waiting for an account lock.

use crate::account::{self, Account, AccountData};
use crate::base::AccountId;
use crate::error::LedgerError;
use crate::history::{History, HistoryItem};
use crate::period::{Clock, Period, SystemClock};
use crate::registry::AccountRegistry;
use parking_lot::MutexGuard;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// In-memory ledger over a fixed set of accounts.
///
/// # Invariants
///
/// - Transfers are zero-sum: the sum of all balances never changes.
/// - A transfer is never observable half-applied through the account locks.
/// - Every successful transfer appends exactly one WITHDRAW entry for the
///   sender and one TOPUP entry for the receiver, timestamped after the
///   balances changed.
pub struct Ledger<C = SystemClock> {
    registry: AccountRegistry,
    history: History,
    clock: C,
}

impl Ledger {
    /// Creates a ledger that timestamps entries with the local system clock.
    ///
    /// # Errors
    ///
    /// See [`Ledger::with_clock`].
    pub fn new(
        accounts: Vec<Account>,
        initial_history: HashMap<AccountId, Vec<HistoryItem>>,
    ) -> Result<Self, LedgerError> {
        Self::with_clock(accounts, initial_history, SystemClock)
    }
}

impl<C: Clock> Ledger<C> {
    /// Creates a ledger reading "now" from `clock`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::DuplicateAccount`] - Two accounts share an id.
    /// - [`LedgerError::AccountNotFound`] - Initial history names an unknown account.
    pub fn with_clock(
        accounts: Vec<Account>,
        initial_history: HashMap<AccountId, Vec<HistoryItem>>,
        clock: C,
    ) -> Result<Self, LedgerError> {
        let registry = AccountRegistry::new(accounts)?;
        if let Some(unknown) = initial_history.keys().find(|id| !registry.contains(**id)) {
            return Err(LedgerError::AccountNotFound(*unknown));
        }

        debug!(
            accounts = registry.len(),
            seeded_histories = initial_history.len(),
            "ledger created"
        );

        Ok(Self {
            registry,
            history: History::new(initial_history),
            clock,
        })
    }

    /// Transfers `amount` from `sender` to `receiver`.
    ///
    /// Blocks until both account locks are available.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - `amount` is zero or negative.
    /// - [`LedgerError::AccountNotFound`] - Either id is unknown.
    /// - [`LedgerError::BalanceOverflow`] - A balance would leave the decimal range.
    ///
    /// On error nothing has been changed.
    pub fn transfer(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.execute(sender, receiver, amount, None)
    }

    /// Like [`Ledger::transfer`], but gives up on any account lock not
    /// acquired within `timeout`.
    ///
    /// # Errors
    ///
    /// As [`Ledger::transfer`], plus [`LedgerError::LockTimeout`]. A timed-out
    /// call releases whatever it had locked and changes nothing.
    pub fn try_transfer_for(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
        timeout: Duration,
    ) -> Result<(), LedgerError> {
        self.execute(sender, receiver, amount, Some(timeout))
    }

    fn execute(
        &self,
        sender: AccountId,
        receiver: AccountId,
        amount: Decimal,
        timeout: Option<Duration>,
    ) -> Result<(), LedgerError> {
        self.move_funds(sender, receiver, amount, timeout)
            .inspect_err(|error| {
                warn!(%sender, %receiver, %amount, %error, "transfer rejected");
            })?;

        // Account locks are released; the entries are stamped after the mutation.
        let timestamp = self
            .history
            .record_transfer(sender, receiver, amount, || self.clock.now());

        debug!(%sender, %receiver, %amount, %timestamp, "transfer recorded");
        Ok(())
    }

    fn move_funds(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
        timeout: Option<Duration>,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let sender = self.registry.resolve(sender_id)?;
        let receiver = self.registry.resolve(receiver_id)?;

        if sender_id == receiver_id {
            let mut data = lock_account(sender, timeout)?;
            return account::move_funds_within(&mut data, amount);
        }

        let sender_first = sender_id < receiver_id;
        let (first, second) = if sender_first {
            (sender, receiver)
        } else {
            (receiver, sender)
        };

        let mut first_guard = lock_account(first, timeout)?;
        let mut second_guard = lock_account(second, timeout)?;

        if sender_first {
            account::move_funds(&mut first_guard, &mut second_guard, amount)
        } else {
            account::move_funds(&mut second_guard, &mut first_guard, amount)
        }
    }

    /// History entries of `account` that fall inside `period`, in recording order.
    ///
    /// "Now" is read once per call, so every boundary of the window agrees.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if the account is unknown.
    pub fn account_statistic(
        &self,
        account: AccountId,
        period: Period,
    ) -> Result<Vec<HistoryItem>, LedgerError> {
        self.registry.resolve(account)?;

        let window = period.window(self.clock.now());
        let items = self.history.entries_in(account, window);

        trace!(
            %account,
            %period,
            start = %window.start,
            end = %window.end,
            entries = items.len(),
            "account statistic"
        );
        Ok(items)
    }

    /// [`Ledger::account_statistic`] with the period given by name.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::UnsupportedPeriod`] - The name is not day, week or month.
    /// - [`LedgerError::AccountNotFound`] - The account is unknown.
    pub fn account_statistic_by_name(
        &self,
        account: AccountId,
        period: &str,
    ) -> Result<Vec<HistoryItem>, LedgerError> {
        let period = period.parse::<Period>()?;
        self.account_statistic(account, period)
    }

    /// Full history of one account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if the account is unknown.
    pub fn account_history(&self, account: AccountId) -> Result<Vec<HistoryItem>, LedgerError> {
        self.registry.resolve(account)?;
        Ok(self.history.entries(account))
    }

    /// Snapshot of the whole history store.
    pub fn history(&self) -> HashMap<AccountId, Vec<HistoryItem>> {
        self.history.snapshot()
    }

    /// Looks up an account.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if the account is unknown.
    pub fn account(&self, id: AccountId) -> Result<&Arc<Account>, LedgerError> {
        self.registry.resolve(id)
    }

    /// All accounts in ascending id order.
    pub fn accounts(&self) -> impl Iterator<Item = &Arc<Account>> {
        self.registry.iter()
    }

    /// Sum of all balances.
    ///
    /// Locks one account at a time, so the figure is only exact while no
    /// transfer is in flight.
    pub fn total_balance(&self) -> Decimal {
        self.registry.iter().map(|account| account.balance()).sum()
    }
}

fn lock_account(
    account: &Account,
    timeout: Option<Duration>,
) -> Result<MutexGuard<'_, AccountData>, LedgerError> {
    match timeout {
        None => Ok(account.lock()),
        Some(timeout) => account
            .try_lock_for(timeout)
            .ok_or(LedgerError::LockTimeout),
    }
}
