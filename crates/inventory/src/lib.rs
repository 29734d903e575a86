//! Stock levels, inbound/outbound movements and low-stock alerting.

pub mod stock;

pub use stock::{
    AlertLevel, HandleAlert, InboundKind, OpenAlert, OutboundKind, RecordInbound, RecordOutbound,
    SetThresholds, Stock, StockCommand, StockEvent,
};
