//! Customer aggregate.
//!
//! A customer carries a credit limit and a running credit balance. Every
//! balance change is emitted as an event that records the balance before and
//! after the change, so the stream of events forms a chained credit ledger:
//! each entry's `balance_before` equals its predecessor's `balance_after`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopledger_core::{
    Aggregate, AggregateRoot, CustomerId, DomainError, DomainResult, OperatorId, OrderId,
    PaymentMethod,
};
use shopledger_events::Event;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCustomer {
    pub customer_id: CustomerId,
    pub name: String,
    pub phone: Option<String>,
    pub credit_limit: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Put an amount on the customer's tab, typically when an order is paid on
/// credit. Fails when the result would breach the credit limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendCredit {
    pub customer_id: CustomerId,
    pub amount: i64,
    pub order_id: Option<OrderId>,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Pay down the outstanding balance. Repaying more than is owed is rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayCredit {
    pub customer_id: CustomerId,
    pub amount: i64,
    pub method: PaymentMethod,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

/// Roll a completed order into the customer's lifetime stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordOrderStats {
    pub customer_id: CustomerId,
    pub order_amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Patch profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendCustomer {
    pub customer_id: CustomerId,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub credit_limit: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CustomerCommand {
    Register(RegisterCustomer),
    ExtendCredit(ExtendCredit),
    RepayCredit(RepayCredit),
    RecordOrderStats(RecordOrderStats),
    Amend(AmendCustomer),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CustomerEvent {
    Registered {
        customer_id: CustomerId,
        name: String,
        phone: Option<String>,
        credit_limit: i64,
        occurred_at: DateTime<Utc>,
    },
    CreditExtended {
        customer_id: CustomerId,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        order_id: Option<OrderId>,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
    CreditRepaid {
        customer_id: CustomerId,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        method: PaymentMethod,
        remark: Option<String>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    },
    OrderStatsRecorded {
        customer_id: CustomerId,
        order_amount: i64,
        occurred_at: DateTime<Utc>,
    },
    Amended {
        customer_id: CustomerId,
        name: Option<String>,
        phone: Option<String>,
        credit_limit: Option<i64>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::Registered { .. } => "parties.customer.registered",
            CustomerEvent::CreditExtended { .. } => "parties.customer.credit_extended",
            CustomerEvent::CreditRepaid { .. } => "parties.customer.credit_repaid",
            CustomerEvent::OrderStatsRecorded { .. } => "parties.customer.order_stats_recorded",
            CustomerEvent::Amended { .. } => "parties.customer.amended",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::Registered { occurred_at, .. }
            | CustomerEvent::CreditExtended { occurred_at, .. }
            | CustomerEvent::CreditRepaid { occurred_at, .. }
            | CustomerEvent::OrderStatsRecorded { occurred_at, .. }
            | CustomerEvent::Amended { occurred_at, .. } => *occurred_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Customer {
    customer_id: CustomerId,
    name: String,
    phone: Option<String>,
    credit_limit: i64,
    credit_balance: i64,
    total_orders: i64,
    total_spent: i64,
    last_order_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Customer {
    pub fn empty(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            name: String::new(),
            phone: None,
            credit_limit: 0,
            credit_balance: 0,
            total_orders: 0,
            total_spent: 0,
            last_order_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn credit_limit(&self) -> i64 {
        self.credit_limit
    }

    pub fn credit_balance(&self) -> i64 {
        self.credit_balance
    }

    pub fn available_credit(&self) -> i64 {
        self.credit_limit - self.credit_balance
    }

    pub fn total_orders(&self) -> i64 {
        self.total_orders
    }

    pub fn total_spent(&self) -> i64 {
        self.total_spent
    }

    pub fn last_order_at(&self) -> Option<DateTime<Utc>> {
        self.last_order_at
    }

    fn ensure_exists(&self) -> DomainResult<()> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::not_found(format!(
                "customer {}",
                self.customer_id
            )))
        }
    }

    fn handle_register(&self, cmd: &RegisterCustomer) -> DomainResult<Vec<CustomerEvent>> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "customer {} already registered",
                cmd.customer_id
            )));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("customer name must not be empty"));
        }
        if cmd.credit_limit < 0 {
            return Err(DomainError::validation(
                "credit limit must not be negative",
            ));
        }
        Ok(vec![CustomerEvent::Registered {
            customer_id: cmd.customer_id,
            name: cmd.name.clone(),
            phone: cmd.phone.clone(),
            credit_limit: cmd.credit_limit,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_extend(&self, cmd: &ExtendCredit) -> DomainResult<Vec<CustomerEvent>> {
        self.ensure_exists()?;
        if cmd.amount <= 0 {
            return Err(DomainError::invalid_amount(
                "credit amount must be positive",
            ));
        }
        if self.credit_balance + cmd.amount > self.credit_limit {
            return Err(DomainError::CreditLimitExceeded {
                customer_id: cmd.customer_id,
                attempted: cmd.amount,
                balance: self.credit_balance,
                limit: self.credit_limit,
            });
        }
        Ok(vec![CustomerEvent::CreditExtended {
            customer_id: cmd.customer_id,
            amount: cmd.amount,
            balance_before: self.credit_balance,
            balance_after: self.credit_balance + cmd.amount,
            order_id: cmd.order_id,
            remark: cmd.remark.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_repay(&self, cmd: &RepayCredit) -> DomainResult<Vec<CustomerEvent>> {
        self.ensure_exists()?;
        if cmd.amount <= 0 {
            return Err(DomainError::invalid_amount(
                "repayment amount must be positive",
            ));
        }
        if cmd.amount > self.credit_balance {
            return Err(DomainError::invalid_amount(format!(
                "repayment of {} exceeds outstanding balance {}",
                cmd.amount, self.credit_balance
            )));
        }
        if cmd.method == PaymentMethod::Credit {
            return Err(DomainError::validation(
                "a credit balance cannot be repaid on credit",
            ));
        }
        Ok(vec![CustomerEvent::CreditRepaid {
            customer_id: cmd.customer_id,
            amount: cmd.amount,
            balance_before: self.credit_balance,
            balance_after: self.credit_balance - cmd.amount,
            method: cmd.method,
            remark: cmd.remark.clone(),
            operator: cmd.operator,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_order_stats(&self, cmd: &RecordOrderStats) -> DomainResult<Vec<CustomerEvent>> {
        self.ensure_exists()?;
        if cmd.order_amount < 0 {
            return Err(DomainError::invalid_amount(
                "order amount must not be negative",
            ));
        }
        Ok(vec![CustomerEvent::OrderStatsRecorded {
            customer_id: cmd.customer_id,
            order_amount: cmd.order_amount,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_amend(&self, cmd: &AmendCustomer) -> DomainResult<Vec<CustomerEvent>> {
        self.ensure_exists()?;
        if cmd.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("customer name must not be empty"));
        }
        if cmd.credit_limit.is_some_and(|l| l < 0) {
            return Err(DomainError::validation(
                "credit limit must not be negative",
            ));
        }
        if cmd.name.is_none() && cmd.phone.is_none() && cmd.credit_limit.is_none() {
            return Ok(vec![]);
        }
        Ok(vec![CustomerEvent::Amended {
            customer_id: cmd.customer_id,
            name: cmd.name.clone(),
            phone: cmd.phone.clone(),
            credit_limit: cmd.credit_limit,
            occurred_at: cmd.occurred_at,
        }])
    }
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.customer_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for Customer {
    type Command = CustomerCommand;
    type Event = CustomerEvent;
    type Error = DomainError;

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>> {
        match command {
            CustomerCommand::Register(cmd) => self.handle_register(cmd),
            CustomerCommand::ExtendCredit(cmd) => self.handle_extend(cmd),
            CustomerCommand::RepayCredit(cmd) => self.handle_repay(cmd),
            CustomerCommand::RecordOrderStats(cmd) => self.handle_order_stats(cmd),
            CustomerCommand::Amend(cmd) => self.handle_amend(cmd),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::Registered {
                name,
                phone,
                credit_limit,
                ..
            } => {
                self.name = name.clone();
                self.phone = phone.clone();
                self.credit_limit = *credit_limit;
                self.created = true;
            }
            CustomerEvent::CreditExtended { balance_after, .. }
            | CustomerEvent::CreditRepaid { balance_after, .. } => {
                self.credit_balance = *balance_after;
            }
            CustomerEvent::OrderStatsRecorded {
                order_amount,
                occurred_at,
                ..
            } => {
                self.total_orders += 1;
                self.total_spent += order_amount;
                self.last_order_at = Some(*occurred_at);
            }
            CustomerEvent::Amended {
                name,
                phone,
                credit_limit,
                ..
            } => {
                if let Some(name) = name {
                    self.name = name.clone();
                }
                if let Some(phone) = phone {
                    self.phone = Some(phone.clone());
                }
                if let Some(limit) = credit_limit {
                    self.credit_limit = *limit;
                }
            }
        }
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered(limit: i64) -> Customer {
        let id = CustomerId::new();
        let mut customer = Customer::empty(id);
        let events = customer
            .handle(&CustomerCommand::Register(RegisterCustomer {
                customer_id: id,
                name: "Wang's Grocery".into(),
                phone: Some("13800000000".into()),
                credit_limit: limit,
                occurred_at: now(),
            }))
            .unwrap();
        for event in &events {
            customer.apply(event);
        }
        customer
    }

    fn extend(customer: &mut Customer, amount: i64) -> DomainResult<Vec<CustomerEvent>> {
        let events = customer.handle(&CustomerCommand::ExtendCredit(ExtendCredit {
            customer_id: customer.customer_id(),
            amount,
            order_id: None,
            remark: None,
            operator: None,
            occurred_at: now(),
        }))?;
        for event in &events {
            customer.apply(event);
        }
        Ok(events)
    }

    fn repay(customer: &mut Customer, amount: i64) -> DomainResult<Vec<CustomerEvent>> {
        let events = customer.handle(&CustomerCommand::RepayCredit(RepayCredit {
            customer_id: customer.customer_id(),
            amount,
            method: PaymentMethod::Cash,
            remark: None,
            operator: None,
            occurred_at: now(),
        }))?;
        for event in &events {
            customer.apply(event);
        }
        Ok(events)
    }

    #[test]
    fn ledger_rows_carry_before_and_after_balances() {
        let mut customer = registered(10_000);
        let events = extend(&mut customer, 3_000).unwrap();
        match &events[0] {
            CustomerEvent::CreditExtended {
                balance_before,
                balance_after,
                ..
            } => {
                assert_eq!(*balance_before, 0);
                assert_eq!(*balance_after, 3_000);
            }
            other => panic!("expected CreditExtended, got {other:?}"),
        }

        let events = repay(&mut customer, 1_000).unwrap();
        match &events[0] {
            CustomerEvent::CreditRepaid {
                balance_before,
                balance_after,
                ..
            } => {
                assert_eq!(*balance_before, 3_000);
                assert_eq!(*balance_after, 2_000);
            }
            other => panic!("expected CreditRepaid, got {other:?}"),
        }
        assert_eq!(customer.credit_balance(), 2_000);
        assert_eq!(customer.available_credit(), 8_000);
    }

    #[test]
    fn extension_past_the_limit_fails_and_leaves_balance_untouched() {
        let mut customer = registered(10_000);
        extend(&mut customer, 9_000).unwrap();

        let err = extend(&mut customer, 2_000).unwrap_err();
        match err {
            DomainError::CreditLimitExceeded {
                attempted,
                balance,
                limit,
                ..
            } => {
                assert_eq!(attempted, 2_000);
                assert_eq!(balance, 9_000);
                assert_eq!(limit, 10_000);
            }
            other => panic!("expected CreditLimitExceeded, got {other}"),
        }
        assert_eq!(customer.credit_balance(), 9_000);
    }

    #[test]
    fn extension_exactly_to_the_limit_is_allowed() {
        let mut customer = registered(10_000);
        extend(&mut customer, 10_000).unwrap();
        assert_eq!(customer.available_credit(), 0);
    }

    #[test]
    fn zero_limit_admits_no_credit() {
        let mut customer = registered(0);
        assert!(matches!(
            extend(&mut customer, 1).unwrap_err(),
            DomainError::CreditLimitExceeded { .. }
        ));
    }

    #[test]
    fn repaying_more_than_owed_fails() {
        let mut customer = registered(10_000);
        extend(&mut customer, 2_000).unwrap();
        assert!(matches!(
            repay(&mut customer, 3_000).unwrap_err(),
            DomainError::InvalidAmount(_)
        ));
    }

    #[test]
    fn repaying_on_credit_is_nonsense() {
        let mut customer = registered(10_000);
        extend(&mut customer, 2_000).unwrap();
        let err = customer
            .handle(&CustomerCommand::RepayCredit(RepayCredit {
                customer_id: customer.customer_id(),
                amount: 1_000,
                method: PaymentMethod::Credit,
                remark: None,
                operator: None,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn unregistered_customer_rejects_credit_operations() {
        let customer = Customer::empty(CustomerId::new());
        let err = customer
            .handle(&CustomerCommand::ExtendCredit(ExtendCredit {
                customer_id: customer.customer_id(),
                amount: 100,
                order_id: None,
                remark: None,
                operator: None,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn double_registration_conflicts() {
        let customer = registered(0);
        let err = customer
            .handle(&CustomerCommand::Register(RegisterCustomer {
                customer_id: customer.customer_id(),
                name: "Again".into(),
                phone: None,
                credit_limit: 0,
                occurred_at: now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn completed_orders_accumulate_lifetime_stats() {
        let mut customer = registered(0);
        for amount in [3_500, 1_200] {
            let events = customer
                .handle(&CustomerCommand::RecordOrderStats(RecordOrderStats {
                    customer_id: customer.customer_id(),
                    order_amount: amount,
                    occurred_at: now(),
                }))
                .unwrap();
            for event in &events {
                customer.apply(event);
            }
        }
        assert_eq!(customer.total_orders(), 2);
        assert_eq!(customer.total_spent(), 4_700);
        assert!(customer.last_order_at().is_some());
    }

    proptest! {
        /// Every accepted ledger row chains onto the previous one: its
        /// balance_before equals the running balance, and the balance stays
        /// within [0, limit].
        #[test]
        fn credit_ledger_chains(
            ops in proptest::collection::vec((any::<bool>(), 1i64..5_000), 1..40),
            limit in 0i64..10_000,
        ) {
            let mut customer = registered(limit);
            let mut running = 0i64;
            for (is_extend, amount) in ops {
                let result = if is_extend {
                    extend(&mut customer, amount)
                } else {
                    repay(&mut customer, amount)
                };
                match result {
                    Ok(events) => {
                        let (before, after) = match &events[0] {
                            CustomerEvent::CreditExtended { balance_before, balance_after, .. }
                            | CustomerEvent::CreditRepaid { balance_before, balance_after, .. } => {
                                (*balance_before, *balance_after)
                            }
                            other => return Err(TestCaseError::fail(format!("{other:?}"))),
                        };
                        prop_assert_eq!(before, running);
                        running = after;
                    }
                    Err(DomainError::CreditLimitExceeded { .. }) => prop_assert!(is_extend),
                    Err(DomainError::InvalidAmount(_)) => prop_assert!(!is_extend),
                    Err(other) => return Err(TestCaseError::fail(format!("{other}"))),
                }
                prop_assert_eq!(customer.credit_balance(), running);
                prop_assert!(running >= 0 && running <= limit);
            }
        }
    }
}
