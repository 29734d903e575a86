//! Credit service: customer registration, the credit ledger, and repayment
//! (which doubles as finance income).

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use shopledger_core::{CustomerId, OperatorId, OrderId, PaymentMethod};
use shopledger_events::JournalEntry;
use shopledger_finance::{FinanceCategory, FinanceType, LedgerCommand, RecordEntry};
use shopledger_parties::{
    AmendCustomer, Customer, CustomerCommand, ExtendCredit, RegisterCustomer, RepayCredit,
};

use crate::error::AppResult;
use crate::Shop;

pub struct CreditService<'a> {
    shop: &'a Shop,
}

impl<'a> CreditService<'a> {
    pub(crate) fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    pub fn register(
        &self,
        name: String,
        phone: Option<String>,
        credit_limit: i64,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<CustomerId> {
        let customer_id = CustomerId::new();
        self.shop.customers.execute(
            customer_id,
            &CustomerCommand::Register(RegisterCustomer {
                customer_id,
                name,
                phone,
                credit_limit,
                occurred_at,
            }),
        )?;
        info!(%customer_id, credit_limit, "customer registered");
        Ok(customer_id)
    }

    pub fn amend(
        &self,
        customer_id: CustomerId,
        name: Option<String>,
        phone: Option<String>,
        credit_limit: Option<i64>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.shop.customers.execute(
            customer_id,
            &CustomerCommand::Amend(AmendCustomer {
                customer_id,
                name,
                phone,
                credit_limit,
                occurred_at,
            }),
        )?;
        Ok(())
    }

    /// Manual credit extension, outside any order.
    pub fn extend_credit(
        &self,
        customer_id: CustomerId,
        amount: i64,
        order_id: Option<OrderId>,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.shop
            .customers
            .execute(
                customer_id,
                &CustomerCommand::ExtendCredit(ExtendCredit {
                    customer_id,
                    amount,
                    order_id,
                    remark,
                    operator,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%customer_id, error = %err, "credit extension refused"))?;
        info!(%customer_id, amount, "credit extended");
        Ok(())
    }

    /// Repay outstanding credit. Money comes in, so an income entry lands in
    /// the finance ledger alongside the credit ledger row.
    pub fn repay(
        &self,
        customer_id: CustomerId,
        amount: i64,
        method: PaymentMethod,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.shop
            .customers
            .execute(
                customer_id,
                &CustomerCommand::RepayCredit(RepayCredit {
                    customer_id,
                    amount,
                    method,
                    remark: remark.clone(),
                    operator,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%customer_id, error = %err, "repayment rejected"))?;

        let finance_no = self.shop.numbers.next("FIN", occurred_at.date_naive());
        self.shop.ledger.execute(
            self.shop.ledger_id,
            &LedgerCommand::RecordEntry(RecordEntry {
                finance_no,
                kind: FinanceType::Income,
                category: FinanceCategory::CustomerRepay,
                amount,
                method,
                related_no: None,
                remark,
                operator,
                occurred_at,
            }),
        )?;
        info!(%customer_id, amount, "credit repaid");
        Ok(())
    }

    /// The customer's credit ledger rows, oldest first.
    pub fn credit_log(&self, customer_id: CustomerId) -> AppResult<Vec<JournalEntry>> {
        let entries = self.shop.customers.stream(customer_id)?;
        Ok(entries
            .into_iter()
            .filter(|e| {
                e.event_type == "parties.customer.credit_extended"
                    || e.event_type == "parties.customer.credit_repaid"
            })
            .collect())
    }

    pub fn snapshot(&self, customer_id: CustomerId) -> AppResult<Option<Customer>> {
        let customer = self.shop.customers.get(customer_id)?;
        Ok(customer.filter(Customer::exists))
    }
}
