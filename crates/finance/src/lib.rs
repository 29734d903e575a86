//! Finance ledger: income/expense entries, range summaries and idempotent
//! daily settlement.

pub mod ledger;

pub use ledger::{
    DailySettlement, FinanceCategory, FinanceEntry, FinanceLedger, FinanceSummary, FinanceType,
    LedgerCommand, LedgerEvent, MethodBreakdown, RecordEntry, SettleDay,
};
