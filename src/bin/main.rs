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

use bank_ledger::{Account, AccountId, HistoryItem, Ledger, OperationType, Period};
use chrono::NaiveDateTime;
use clap::Parser;
use crossbeam::channel;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::process;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Bank Ledger - Drive concurrent transfers against an in-memory ledger
///
/// Seeds accounts, runs worker threads that transfer funds between
/// neighbouring accounts in both directions, verifies that the total balance
/// is unchanged and writes account balances as CSV to stdout.
#[derive(Parser, Debug)]
#[command(name = "bank-ledger")]
#[command(about = "Runs concurrent transfers against an in-memory ledger", long_about = None)]
struct Args {
    /// Number of accounts, with ids 1..=N
    #[arg(long, default_value_t = 100)]
    accounts: u64,

    /// Starting balance of every account
    #[arg(long, default_value = "1000000")]
    initial_balance: Decimal,

    /// Number of worker threads
    #[arg(long, default_value_t = 10)]
    workers: u64,

    /// Transfers performed by each worker
    #[arg(long, default_value_t = 10)]
    transfers_per_worker: u32,

    /// Amount moved by each transfer
    #[arg(long, default_value = "1000")]
    amount: Decimal,

    /// Pause before each transfer, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Also write the full history as CSV
    #[arg(long)]
    history: bool,

    /// Write statistics for this account id as CSV (repeatable)
    #[arg(long = "statistic", value_name = "ID")]
    statistics: Vec<u64>,

    /// Period for --statistic: day, week or month
    #[arg(long, default_value = "day")]
    period: Period,
}

/// Outcome of one worker, sent back over the report channel.
#[derive(Debug)]
struct WorkerReport {
    worker: u64,
    completed: u32,
    failed: u32,
}

/// Flat CSV row for one history entry.
#[derive(Debug, Serialize)]
struct HistoryRecord {
    account: AccountId,
    operation: OperationType,
    amount: Decimal,
    timestamp: NaiveDateTime,
}

impl HistoryRecord {
    fn new(account: AccountId, item: &HistoryItem) -> Self {
        Self {
            account,
            operation: item.operation(),
            amount: item.amount(),
            timestamp: item.timestamp(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.accounts == 0 {
        error!("at least one account is required");
        process::exit(1);
    }

    let ledger = match Ledger::new(
        provision_accounts(args.accounts, args.initial_balance),
        HashMap::new(),
    ) {
        Ok(ledger) => ledger,
        Err(e) => {
            error!(error = %e, "failed to create ledger");
            process::exit(1);
        }
    };

    let expected_total = ledger.total_balance();
    let reports = run_workers(&ledger, &args);
    let failed: u32 = reports.iter().map(|report| report.failed).sum();
    let completed: u32 = reports.iter().map(|report| report.completed).sum();
    info!(workers = reports.len(), completed, failed, "all workers finished");

    let actual_total = ledger.total_balance();
    if actual_total != expected_total {
        error!(%expected_total, %actual_total, "total balance changed");
        process::exit(1);
    }

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = write_report(&ledger, &args, &mut stdout) {
        error!(error = %e, "failed to write output");
        process::exit(1);
    }
}

/// Seeds `count` accounts, ids 1..=count, each holding `balance`.
fn provision_accounts(count: u64, balance: Decimal) -> Vec<Account> {
    (1..=count)
        .map(|id| Account::new(AccountId(id), balance))
        .collect()
}

/// Account pair worked by `worker`. Workers come in twos over the same pair
/// of neighbouring accounts, the odd one sending in the opposite direction.
fn worker_pair(worker: u64, accounts: u64) -> (AccountId, AccountId) {
    let pair = worker / 2;
    let a = AccountId(pair % accounts + 1);
    let b = AccountId((pair + 1) % accounts + 1);
    if worker % 2 == 0 { (a, b) } else { (b, a) }
}

fn run_workers(ledger: &Ledger, args: &Args) -> Vec<WorkerReport> {
    let (sender, receiver) = channel::unbounded();
    let delay = Duration::from_millis(args.delay_ms);

    let scope_result = crossbeam::scope(|scope| {
        for worker in 0..args.workers {
            let report_tx = sender.clone();
            scope.spawn(move |_| {
                let (from, to) = worker_pair(worker, args.accounts);
                let mut report = WorkerReport {
                    worker,
                    completed: 0,
                    failed: 0,
                };
                info!(worker, %from, %to, "transfer started");
                for _ in 0..args.transfers_per_worker {
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    match ledger.transfer(from, to, args.amount) {
                        Ok(()) => report.completed += 1,
                        Err(error) => {
                            warn!(worker, %from, %to, %error, "transfer failed");
                            report.failed += 1;
                        }
                    }
                }
                info!(worker, completed = report.completed, "transfer finished");
                let _ = report_tx.send(report);
            });
        }
    });
    drop(sender);

    if scope_result.is_err() {
        warn!("a worker thread panicked");
    }

    let mut reports: Vec<WorkerReport> = receiver.iter().collect();
    reports.sort_by_key(|report| report.worker);
    reports
}

/// Writes balances, then the optional history and statistics sections.
///
/// # Errors
///
/// Returns a CSV error if writing fails, or a ledger error for an unknown
/// statistics account.
fn write_report<W: Write>(
    ledger: &Ledger,
    args: &Args,
    mut out: W,
) -> Result<(), Box<dyn std::error::Error>> {
    write_accounts(ledger, &mut out)?;

    if args.history {
        writeln!(out)?;
        let mut history: Vec<_> = ledger.history().into_iter().collect();
        history.sort_by_key(|(id, _)| *id);
        let records = history
            .iter()
            .flat_map(|(id, items)| items.iter().map(|item| HistoryRecord::new(*id, item)));
        write_records(records, &mut out)?;
    }

    for id in &args.statistics {
        writeln!(out)?;
        let account = AccountId(*id);
        let items = ledger.account_statistic(account, args.period)?;
        write_records(
            items.iter().map(|item| HistoryRecord::new(account, item)),
            &mut out,
        )?;
    }

    Ok(())
}

/// Writes account states as CSV.
///
/// Columns: `id, balance`
fn write_accounts<W: Write>(ledger: &Ledger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in ledger.accounts() {
        wtr.serialize(account.as_ref())?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_records<W: Write>(
    records: impl Iterator<Item = HistoryRecord>,
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["bank-ledger"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn ledger(count: u64) -> Ledger {
        Ledger::new(provision_accounts(count, dec!(1000000)), HashMap::new()).unwrap()
    }

    #[test]
    fn provisions_sequential_ids() {
        let accounts = provision_accounts(3, dec!(5));
        let ids: Vec<_> = accounts.iter().map(|account| account.id().0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(accounts.iter().all(|account| account.balance() == dec!(5)));
    }

    #[test]
    fn neighbouring_workers_use_opposite_directions() {
        assert_eq!(worker_pair(0, 2), (AccountId(1), AccountId(2)));
        assert_eq!(worker_pair(1, 2), (AccountId(2), AccountId(1)));
        assert_eq!(worker_pair(2, 3), (AccountId(2), AccountId(3)));
        assert_eq!(worker_pair(3, 3), (AccountId(3), AccountId(2)));
        assert_eq!(worker_pair(4, 3), (AccountId(3), AccountId(1)));
    }

    #[test]
    fn single_account_workers_self_transfer() {
        assert_eq!(worker_pair(0, 1), (AccountId(1), AccountId(1)));
        assert_eq!(worker_pair(1, 1), (AccountId(1), AccountId(1)));
    }

    #[test]
    fn parses_defaults() {
        let args = args(&[]);
        assert_eq!(args.accounts, 100);
        assert_eq!(args.initial_balance, dec!(1000000));
        assert_eq!(args.amount, dec!(1000));
        assert_eq!(args.period, Period::Day);
        assert!(args.statistics.is_empty());
    }

    #[test]
    fn rejects_unknown_period() {
        let result = Args::try_parse_from(["bank-ledger", "--period", "year"]);
        assert!(result.is_err());
    }

    #[test]
    fn workers_preserve_total_balance() {
        let ledger = ledger(4);
        let args = args(&["--accounts", "4", "--workers", "8", "--transfers-per-worker", "25"]);

        let reports = run_workers(&ledger, &args);

        assert_eq!(reports.len(), 8);
        assert!(reports.iter().all(|report| report.completed == 25 && report.failed == 0));
        assert_eq!(ledger.total_balance(), dec!(4000000));
    }

    #[test]
    fn rejected_transfers_are_counted_as_failed() {
        let ledger = ledger(2);
        let args = args(&["--accounts", "2", "--workers", "2", "--amount", "0"]);

        let reports = run_workers(&ledger, &args);

        assert!(reports.iter().all(|report| report.completed == 0 && report.failed == 10));
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn report_contains_balances_and_statistics() {
        let ledger = ledger(2);
        ledger
            .transfer(AccountId(1), AccountId(2), dec!(1000))
            .unwrap();
        let args = args(&["--accounts", "2", "--statistic", "1", "--history"]);

        let mut output = Vec::new();
        write_report(&ledger, &args, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();

        assert!(output.starts_with("id,balance\n1,999000\n2,1001000\n"));
        assert!(output.contains("account,operation,amount,timestamp"));
        assert!(output.contains("1,WITHDRAW,1000,"));
        assert!(output.contains("2,TOPUP,1000,"));
    }

    #[test]
    fn report_fails_for_unknown_statistic_account() {
        let ledger = ledger(2);
        let args = args(&["--accounts", "2", "--statistic", "9"]);
        let mut output = Vec::new();
        assert!(write_report(&ledger, &args, &mut output).is_err());
    }
}
