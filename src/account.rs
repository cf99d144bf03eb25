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

//! Account balances and the per-account lock.
//!
//! Each [`Account`] owns a mutex around its balance. That mutex is the unit of
//! exclusive locking for transfers: the ledger takes the locks of both
//! participants in ascending [`AccountId`] order before touching either balance.
//!
//! # Example
//!
//! ```
//! use rust_decimal::Decimal;
//! use bank_ledger::{Account, AccountId};
//!
//! let account = Account::new(AccountId(1), Decimal::new(1_000_000, 0));
//! assert_eq!(account.balance(), Decimal::new(1_000_000, 0));
//! ```

use crate::base::AccountId;
use crate::error::LedgerError;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct AccountData {
    id: AccountId,
    balance: Decimal,
}

impl AccountData {
    fn new(id: AccountId, balance: Decimal) -> Self {
        Self { id, balance }
    }

    fn debited(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.balance
            .checked_sub(amount)
            .ok_or(LedgerError::BalanceOverflow(self.id))
    }

    fn credited(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(self.id))
    }
}

/// Moves `amount` from `sender` to `receiver`.
///
/// Both new balances are computed before either is written, so an overflow
/// on one side leaves both accounts unchanged.
pub(crate) fn move_funds(
    sender: &mut AccountData,
    receiver: &mut AccountData,
    amount: Decimal,
) -> Result<(), LedgerError> {
    let sender_balance = sender.debited(amount)?;
    let receiver_balance = receiver.credited(amount)?;
    sender.balance = sender_balance;
    receiver.balance = receiver_balance;
    Ok(())
}

/// Self-transfer under a single lock: debit then credit the same balance.
pub(crate) fn move_funds_within(data: &mut AccountData, amount: Decimal) -> Result<(), LedgerError> {
    let debited = data.debited(amount)?;
    let credited = debited
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow(data.id))?;
    data.balance = credited;
    Ok(())
}

/// Ledger account.
///
/// Equality and hashing use the id only; the balance is mutable state behind
/// the account's own lock.
pub struct Account {
    id: AccountId,
    inner: Mutex<AccountData>,
}

impl Account {
    pub fn new(id: AccountId, balance: Decimal) -> Self {
        Self {
            id,
            inner: Mutex::new(AccountData::new(id, balance)),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Current balance. Blocks while a transfer holds this account.
    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }

    pub(crate) fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, AccountData>> {
        self.inner.try_lock_for(timeout)
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("balance", &self.balance())
            .finish()
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.inner.lock();
        let mut state = serializer.serialize_struct("Account", 2)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("balance", &data.balance)?;
        state.end()
    }
}
