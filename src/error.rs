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

//! Error types for ledger operations.

use crate::base::AccountId;
use thiserror::Error;

/// Ledger errors.
///
/// Every failing operation leaves balances and history untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced account id is not in the registry
    #[error("account not found, accountId={0}")]
    AccountNotFound(AccountId),

    /// Statistics period selector is not one of day, week or month
    #[error("unsupported period type={0}")]
    UnsupportedPeriod(String),

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Two accounts were supplied with the same id at construction
    #[error("duplicate account, accountId={0}")]
    DuplicateAccount(AccountId),

    /// Applying the transfer would overflow the decimal range of a balance
    #[error("balance overflow, accountId={0}")]
    BalanceOverflow(AccountId),

    /// An account lock could not be acquired within the allowed time
    #[error("timed out waiting for account lock")]
    LockTimeout,
}
