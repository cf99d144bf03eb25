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

//! # Bank Ledger
//!
//! This library provides an in-memory ledger that moves funds between accounts
//! from many threads at once and records an append-only history of every
//! movement.
//!
//! ## Core Components
//!
//! - [`Ledger`]: Performs transfers and answers history queries
//! - [`Account`]: Balance cell with its own lock, identified by [`AccountId`]
//! - [`HistoryItem`]: Immutable WITHDRAW or TOPUP record
//! - [`Period`]: Day, week or month window for statistics
//! - [`LedgerError`]: Error types for rejected operations
//!
//! ## Example
//!
//! ```
//! use bank_ledger::{Account, AccountId, Ledger, OperationType, Period};
//! use rust_decimal::Decimal;
//! use std::collections::HashMap;
//!
//! let accounts = vec![
//!     Account::new(AccountId(1), Decimal::new(1_000_000, 0)),
//!     Account::new(AccountId(2), Decimal::new(1_000_000, 0)),
//! ];
//! let ledger = Ledger::new(accounts, HashMap::new()).unwrap();
//!
//! ledger.transfer(AccountId(1), AccountId(2), Decimal::new(1_000, 0)).unwrap();
//!
//! assert_eq!(ledger.account(AccountId(1)).unwrap().balance(), Decimal::new(999_000, 0));
//! assert_eq!(ledger.account(AccountId(2)).unwrap().balance(), Decimal::new(1_001_000, 0));
//!
//! let today = ledger.account_statistic(AccountId(1), Period::Day).unwrap();
//! assert_eq!(today.len(), 1);
//! assert_eq!(today[0].operation(), OperationType::Withdraw);
//! ```
//!
//! ## Thread Safety
//!
//! [`Ledger`] is `Send + Sync`; share it behind an `Arc`. Transfers over
//! disjoint account pairs run in parallel, and transfers over the same pair in
//! either direction serialize without deadlocking.

pub mod account;
mod base;
pub mod error;
pub mod history;
mod ledger;
pub mod period;
mod registry;

pub use account::Account;
pub use base::AccountId;
pub use error::LedgerError;
pub use history::{HistoryItem, OperationType};
pub use ledger::Ledger;
pub use period::{Clock, Period, SystemClock, Window};
pub use registry::AccountRegistry;
