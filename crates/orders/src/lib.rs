//! Sales orders: line-item totals, payment progress, lifecycle.

pub mod order;

pub use order::{
    AmendOrder, CancelOrder, CreateOrder, FulfillLine, LineFulfilled, LineInput, Order,
    OrderCancelled, OrderCommand, OrderCreated, OrderEvent, OrderLine, OrderStatus,
    PaymentRecorded, RecordPayment,
};
