//! Customers (with a running credit ledger) and suppliers (with a payable
//! balance).

pub mod customer;
pub mod supplier;

pub use customer::{
    AmendCustomer, Customer, CustomerCommand, CustomerEvent, ExtendCredit, RecordOrderStats,
    RegisterCustomer, RepayCredit,
};
pub use supplier::{
    AccruePayable, PayDownPayable, RegisterSupplier, Supplier, SupplierCommand, SupplierEvent,
};
