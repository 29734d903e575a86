//! Purchase orders against suppliers.

pub mod purchase;

pub use purchase::{
    CancelPurchase, ConfirmPurchase, CreatePurchase, PurchaseCommand, PurchaseEvent, PurchaseLine,
    PurchaseLineInput, PurchaseOrder, PurchaseStatus, ReceiptLine, ReceivePurchase,
    RecordPurchasePayment,
};
