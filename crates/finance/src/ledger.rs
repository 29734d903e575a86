//! Finance ledger aggregate.
//!
//! A single append-only ledger of income and expense entries. Settling a day
//! folds that day's entries into a `DailySettlement` with a per-method
//! breakdown; settlement is idempotent, so settling an already settled date
//! emits nothing and the stored figures stay as first computed. Recording is
//! a pure append, so a late entry for a settled date still posts; it simply
//! lands after the snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, OperatorId, PaymentMethod,
};
use shopledger_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinanceType {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinanceCategory {
    Sale,
    Purchase,
    CustomerRepay,
    SupplierPay,
    Salary,
    Rent,
    Utility,
    Other,
}

/// One ledger row. Amounts are always positive; the sign lives in `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceEntry {
    pub finance_no: String,
    pub kind: FinanceType,
    pub category: FinanceCategory,
    pub amount: i64,
    pub method: PaymentMethod,
    /// Document number of the originating order or purchase, if any.
    pub related_no: Option<String>,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Per payment method totals within one settled day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBreakdown {
    pub method: PaymentMethod,
    pub income: i64,
    pub expense: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySettlement {
    pub date: NaiveDate,
    pub total_income: i64,
    pub total_expense: i64,
    pub net_amount: i64,
    pub entry_count: u64,
    /// Sale-income entries that day, one per order payment.
    pub order_count: u64,
    /// One row per method that saw money that day, in reporting order.
    pub by_method: Vec<MethodBreakdown>,
    pub settled_at: DateTime<Utc>,
}

/// Totals over an arbitrary date range, computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinanceSummary {
    pub total_income: i64,
    pub total_expense: i64,
    pub net_amount: i64,
    pub entry_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    pub finance_no: String,
    pub kind: FinanceType,
    pub category: FinanceCategory,
    pub amount: i64,
    pub method: PaymentMethod,
    pub related_no: Option<String>,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleDay {
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LedgerCommand {
    RecordEntry(RecordEntry),
    SettleDay(SettleDay),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LedgerEvent {
    EntryRecorded(FinanceEntry),
    DaySettled(DailySettlement),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::EntryRecorded(_) => "finance.ledger.entry_recorded",
            LedgerEvent::DaySettled(_) => "finance.ledger.day_settled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::EntryRecorded(entry) => entry.occurred_at,
            LedgerEvent::DaySettled(settlement) => settlement.settled_at,
        }
    }
}

/// The shop's single finance ledger.
#[derive(Debug, Clone)]
pub struct FinanceLedger {
    ledger_id: AggregateId,
    entries: Vec<FinanceEntry>,
    settlements: BTreeMap<NaiveDate, DailySettlement>,
    version: u64,
}

impl FinanceLedger {
    pub fn empty(ledger_id: AggregateId) -> Self {
        Self {
            ledger_id,
            entries: Vec::new(),
            settlements: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn entries(&self) -> &[FinanceEntry] {
        &self.entries
    }

    pub fn settlement(&self, date: NaiveDate) -> Option<&DailySettlement> {
        self.settlements.get(&date)
    }

    pub fn is_settled(&self, date: NaiveDate) -> bool {
        self.settlements.contains_key(&date)
    }

    /// Fold entries whose date falls in `[from, to]` (inclusive).
    pub fn summarize(&self, from: NaiveDate, to: NaiveDate) -> FinanceSummary {
        let mut summary = FinanceSummary {
            total_income: 0,
            total_expense: 0,
            net_amount: 0,
            entry_count: 0,
        };
        for entry in &self.entries {
            let date = entry.occurred_at.date_naive();
            if date < from || date > to {
                continue;
            }
            match entry.kind {
                FinanceType::Income => summary.total_income += entry.amount,
                FinanceType::Expense => summary.total_expense += entry.amount,
            }
            summary.entry_count += 1;
        }
        summary.net_amount = summary.total_income - summary.total_expense;
        summary
    }

    fn settle(&self, date: NaiveDate, settled_at: DateTime<Utc>) -> DailySettlement {
        let mut total_income = 0i64;
        let mut total_expense = 0i64;
        let mut entry_count = 0u64;
        let mut order_count = 0u64;
        let mut per_method: BTreeMap<usize, MethodBreakdown> = BTreeMap::new();

        for entry in &self.entries {
            if entry.occurred_at.date_naive() != date {
                continue;
            }
            entry_count += 1;
            if entry.kind == FinanceType::Income && entry.category == FinanceCategory::Sale {
                order_count += 1;
            }
            let slot = PaymentMethod::ALL
                .iter()
                .position(|m| *m == entry.method)
                .unwrap_or(PaymentMethod::ALL.len() - 1);
            let breakdown = per_method.entry(slot).or_insert(MethodBreakdown {
                method: entry.method,
                income: 0,
                expense: 0,
            });
            match entry.kind {
                FinanceType::Income => {
                    total_income += entry.amount;
                    breakdown.income += entry.amount;
                }
                FinanceType::Expense => {
                    total_expense += entry.amount;
                    breakdown.expense += entry.amount;
                }
            }
        }

        DailySettlement {
            date,
            total_income,
            total_expense,
            net_amount: total_income - total_expense,
            entry_count,
            order_count,
            by_method: per_method.into_values().collect(),
            settled_at,
        }
    }

    fn handle_record(&self, cmd: &RecordEntry) -> DomainResult<Vec<LedgerEvent>> {
        if cmd.amount <= 0 {
            return Err(DomainError::invalid_amount(
                "ledger amount must be positive",
            ));
        }
        if cmd.finance_no.trim().is_empty() {
            return Err(DomainError::validation("finance number must not be empty"));
        }
        Ok(vec![LedgerEvent::EntryRecorded(FinanceEntry {
            finance_no: cmd.finance_no.clone(),
            kind: cmd.kind,
            category: cmd.category,
            amount: cmd.amount,
            method: cmd.method,
            related_no: cmd.related_no.clone(),
            remark: cmd.remark.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_settle(&self, cmd: &SettleDay) -> DomainResult<Vec<LedgerEvent>> {
        if self.is_settled(cmd.date) {
            // Idempotent: the first settlement stands.
            return Ok(vec![]);
        }
        Ok(vec![LedgerEvent::DaySettled(
            self.settle(cmd.date, cmd.occurred_at),
        )])
    }
}

impl AggregateRoot for FinanceLedger {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.ledger_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for FinanceLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            LedgerCommand::RecordEntry(cmd) => self.handle_record(cmd),
            LedgerCommand::SettleDay(cmd) => self.handle_settle(cmd),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::EntryRecorded(entry) => {
                self.entries.push(entry.clone());
            }
            LedgerEvent::DaySettled(settlement) => {
                self.settlements.insert(settlement.date, settlement.clone());
            }
        }
        self.version += 1;
    }
}
