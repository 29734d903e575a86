//! Purchase workflow: purchase order lifecycle and its fan-out to stock,
//! supplier payable and the finance ledger.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use shopledger_core::{DomainError, OperatorId, PaymentMethod, PurchaseOrderId, SupplierId};
use shopledger_finance::{FinanceCategory, FinanceType, LedgerCommand, RecordEntry};
use shopledger_inventory::InboundKind;
use shopledger_parties::{
    AccruePayable, PayDownPayable, RegisterSupplier, SupplierCommand,
};
use shopledger_purchasing::{
    CancelPurchase, ConfirmPurchase, CreatePurchase, PurchaseCommand, PurchaseLineInput,
    PurchaseOrder, ReceiptLine, ReceivePurchase, RecordPurchasePayment,
};

use crate::engines::inventory::InboundRequest;
use crate::error::AppResult;
use crate::Shop;

#[derive(Debug, Clone)]
pub struct CreatePurchaseRequest {
    pub supplier_id: SupplierId,
    pub lines: Vec<PurchaseLineInput>,
    pub remark: Option<String>,
    pub operator: Option<OperatorId>,
    pub occurred_at: DateTime<Utc>,
}

pub struct PurchaseWorkflow<'a> {
    shop: &'a Shop,
}

impl<'a> PurchaseWorkflow<'a> {
    pub(crate) fn new(shop: &'a Shop) -> Self {
        Self { shop }
    }

    pub fn register_supplier(
        &self,
        name: String,
        contact: Option<String>,
        phone: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<SupplierId> {
        let supplier_id = SupplierId::new();
        self.shop.suppliers.execute(
            supplier_id,
            &SupplierCommand::Register(RegisterSupplier {
                supplier_id,
                name,
                contact,
                phone,
                occurred_at,
            }),
        )?;
        info!(%supplier_id, "supplier registered");
        Ok(supplier_id)
    }

    pub fn create(&self, req: CreatePurchaseRequest) -> AppResult<PurchaseOrder> {
        let supplier_name = self
            .shop
            .suppliers
            .read(req.supplier_id, |s| {
                s.exists().then(|| s.name().to_string())
            })?
            .flatten()
            .ok_or_else(|| DomainError::not_found(format!("supplier {}", req.supplier_id)))?;

        let purchase_id = PurchaseOrderId::new();
        let purchase_no = self.shop.numbers.next("PO", req.occurred_at.date_naive());
        self.shop
            .purchases
            .execute(
                purchase_id,
                &PurchaseCommand::Create(CreatePurchase {
                    purchase_id,
                    purchase_no: purchase_no.clone(),
                    supplier_id: req.supplier_id,
                    supplier_name,
                    lines: req.lines,
                    remark: req.remark,
                    operator: req.operator,
                    occurred_at: req.occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%purchase_no, error = %err, "purchase rejected"))?;

        let po = self.snapshot_required(purchase_id)?;
        info!(%purchase_no, total_amount = po.total_amount(), "purchase order created");
        Ok(po)
    }

    pub fn confirm(
        &self,
        purchase_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<PurchaseOrder> {
        self.shop
            .purchases
            .execute(
                purchase_id,
                &PurchaseCommand::Confirm(ConfirmPurchase {
                    purchase_id,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%purchase_id, error = %err, "confirm rejected"))?;
        let po = self.snapshot_required(purchase_id)?;
        info!(purchase_no = %po.purchase_no(), "purchase order confirmed");
        Ok(po)
    }

    /// Receive the goods: mark the purchase received, record one inbound
    /// movement per non-empty receipt line, and accrue the supplier payable
    /// for the full order total.
    pub fn receive(
        &self,
        purchase_id: PurchaseOrderId,
        receipts: Vec<ReceiptLine>,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<PurchaseOrder> {
        self.shop
            .purchases
            .execute(
                purchase_id,
                &PurchaseCommand::Receive(ReceivePurchase {
                    purchase_id,
                    receipts: receipts.clone(),
                    remark: None,
                    operator,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%purchase_id, error = %err, "receive rejected"))?;

        let po = self.snapshot_required(purchase_id)?;
        for receipt in &receipts {
            if receipt.quantity == 0 {
                continue;
            }
            let Some(line) = po.lines().iter().find(|l| l.line_no == receipt.line_no) else {
                continue;
            };
            self.shop.inventory().inbound(InboundRequest {
                product_id: line.product_id,
                kind: InboundKind::Purchase,
                quantity: receipt.quantity,
                weight: receipt.weight,
                unit_price: Some(line.unit_price),
                purchase_id: Some(purchase_id),
                supplier_id: Some(po.supplier_id()),
                batch_no: None,
                remark: None,
                operator,
                occurred_at,
            })?;
        }

        if po.total_amount() > 0 {
            self.shop.suppliers.execute(
                po.supplier_id(),
                &SupplierCommand::AccruePayable(AccruePayable {
                    supplier_id: po.supplier_id(),
                    amount: po.total_amount(),
                    purchase_id: Some(purchase_id),
                    occurred_at,
                }),
            )?;
        }

        info!(purchase_no = %po.purchase_no(), "purchase order received");
        Ok(po)
    }

    pub fn cancel(
        &self,
        purchase_id: PurchaseOrderId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<PurchaseOrder> {
        self.shop
            .purchases
            .execute(
                purchase_id,
                &PurchaseCommand::Cancel(CancelPurchase {
                    purchase_id,
                    reason,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%purchase_id, error = %err, "cancel rejected"))?;
        let po = self.snapshot_required(purchase_id)?;
        info!(purchase_no = %po.purchase_no(), "purchase order cancelled");
        Ok(po)
    }

    /// Pay the supplier for a purchase. The purchase's overpayment guard runs
    /// first; the payable pay-down and the expense entry are sized to the
    /// accepted payment.
    pub fn pay(
        &self,
        purchase_id: PurchaseOrderId,
        amount: i64,
        method: PaymentMethod,
        operator: Option<OperatorId>,
        occurred_at: DateTime<Utc>,
    ) -> AppResult<PurchaseOrder> {
        self.shop
            .purchases
            .execute(
                purchase_id,
                &PurchaseCommand::RecordPayment(RecordPurchasePayment {
                    purchase_id,
                    amount,
                    method,
                    operator,
                    occurred_at,
                }),
            )
            .inspect_err(|err| warn!(%purchase_id, error = %err, "payment rejected"))?;

        let po = self.snapshot_required(purchase_id)?;

        // Payable only exists once the goods were received; a prepayment
        // before receipt pays down whatever is outstanding, possibly nothing.
        let payable = self
            .shop
            .suppliers
            .read(po.supplier_id(), |s| s.payable_balance())?
            .unwrap_or(0);
        let pay_down = amount.min(payable);
        if pay_down > 0 {
            self.shop.suppliers.execute(
                po.supplier_id(),
                &SupplierCommand::PayDownPayable(PayDownPayable {
                    supplier_id: po.supplier_id(),
                    amount: pay_down,
                    method,
                    purchase_id: Some(purchase_id),
                    operator,
                    occurred_at,
                }),
            )?;
        }

        let finance_no = self.shop.numbers.next("FIN", occurred_at.date_naive());
        self.shop.ledger.execute(
            self.shop.ledger_id,
            &LedgerCommand::RecordEntry(RecordEntry {
                finance_no,
                kind: FinanceType::Expense,
                category: FinanceCategory::Purchase,
                amount,
                method,
                related_no: Some(po.purchase_no().to_string()),
                remark: None,
                operator,
                occurred_at,
            }),
        )?;

        info!(
            purchase_no = %po.purchase_no(),
            amount,
            paid_amount = po.paid_amount(),
            payment_status = ?po.payment_status(),
            "purchase payment recorded"
        );
        Ok(po)
    }

    pub fn snapshot(&self, purchase_id: PurchaseOrderId) -> AppResult<Option<PurchaseOrder>> {
        let po = self.shop.purchases.get(purchase_id)?;
        Ok(po.filter(PurchaseOrder::exists))
    }

    fn snapshot_required(&self, purchase_id: PurchaseOrderId) -> AppResult<PurchaseOrder> {
        self.snapshot(purchase_id)?
            .ok_or_else(|| DomainError::not_found(format!("purchase order {purchase_id}")).into())
    }
}
