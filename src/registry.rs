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

//! Account registry.
//!
//! Populated once at construction and read-only afterwards, so lookups need
//! no locking of their own.

use crate::account::Account;
use crate::base::AccountId;
use crate::error::LedgerError;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// Fixed collection of accounts indexed by id.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: HashMap<AccountId, Arc<Account>>,
    /// Same accounts in ascending id order.
    ordered: Vec<Arc<Account>>,
}

impl AccountRegistry {
    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateAccount`] if two accounts share an id.
    pub fn new(accounts: Vec<Account>) -> Result<Self, LedgerError> {
        let mut by_id = HashMap::with_capacity(accounts.len());
        for account in accounts {
            match by_id.entry(account.id()) {
                Entry::Occupied(entry) => {
                    return Err(LedgerError::DuplicateAccount(*entry.key()));
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(account));
                }
            }
        }
        let mut ordered: Vec<_> = by_id.values().cloned().collect();
        ordered.sort_by_key(|account| account.id());
        Ok(Self {
            accounts: by_id,
            ordered,
        })
    }

    /// Looks up an account by id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AccountNotFound`] if no account has this id.
    pub fn resolve(&self, id: AccountId) -> Result<&Arc<Account>, LedgerError> {
        self.accounts.get(&id).ok_or(LedgerError::AccountNotFound(id))
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Account>> {
        self.ordered.iter()
    }
}
