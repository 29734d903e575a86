//! Settlement aggregator: manual ledger entries, daily close, and range
//! summaries.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use shopledger_core::{DomainError, OperatorId, PaymentMethod};
use shopledger_finance::{
    DailySettlement, FinanceCategory, FinanceEntry, FinanceSummary, FinanceType, LedgerCommand,
    RecordEntry, SettleDay,
};

use crate::error::AppResult;
use crate::Shop;

pub struct SettlementAggregator<'a> {
    shop: &'a Shop,
}

impl<'a> SettlementAggregator<'a> {
    pub(crate) fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    /// Record a manual ledger entry (salary, rent, utilities and the like).
    /// Order and purchase money flows land in the ledger through their own
    /// engines.
    pub fn record_entry(
        &self,
        kind: FinanceType,
        category: FinanceCategory,
        amount: i64,
        method: PaymentMethod,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<String> {
        let finance_no = self.shop.numbers.next("FIN", occurred_at.date_naive());
        self.shop.ledger.execute(
            self.shop.ledger_id,
            &LedgerCommand::RecordEntry(RecordEntry {
                finance_no: finance_no.clone(),
                kind,
                category,
                amount,
                method,
                related_no: None,
                remark,
                operator,
                occurred_at,
            }),
        )?;
        info!(%finance_no, ?kind, ?category, amount, "ledger entry recorded");
        Ok(finance_no)
    }

    /// Close a day. Re-running for an already settled date returns the
    /// stored row unchanged.
    pub fn settle(&self, date: NaiveDate, occurred_at: DateTime<Utc>) -> AppResult<DailySettlement> {
        let events = self.shop.ledger.execute(
            self.shop.ledger_id,
            &LedgerCommand::SettleDay(SettleDay { date, occurred_at }),
        )?;
        let settlement = self
            .shop
            .ledger
            .read(self.shop.ledger_id, |l| l.settlement(date).cloned())?
            .flatten()
            .ok_or_else(|| DomainError::not_found(format!("settlement for {date}")))?;
        if events.is_empty() {
            info!(%date, "settlement already existed");
        } else {
            info!(%date, net_amount = settlement.net_amount, "day settled");
        }
        Ok(settlement)
    }

    pub fn summary(&self, from: NaiveDate, to: NaiveDate) -> AppResult<FinanceSummary> {
        let summary = self
            .shop
            .ledger
            .read(self.shop.ledger_id, |l| l.summarize(from, to))?;
        Ok(summary.unwrap_or(FinanceSummary {
            total_income: 0,
            total_expense: 0,
            net_amount: 0,
            entry_count: 0,
        }))
    }

    /// All ledger rows, oldest first.
    pub fn entries(&self) -> AppResult<Vec<FinanceEntry>> {
        let entries = self
            .shop
            .ledger
            .read(self.shop.ledger_id, |l| l.entries().to_vec())?;
        Ok(entries.unwrap_or_default())
    }
}
