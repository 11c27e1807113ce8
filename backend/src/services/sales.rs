//! Sales invoice and payment service
//!
//! An invoice takes its lines out of stock at the selling location and
//! opens a receivable on the customer. Payments settle it in one or more
//! instalments; an invoice with no payments can be cancelled, which puts
//! the stock back.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    apply_payment, outstanding_balance, quotation_totals, settlement_status,
    validate_non_negative_amount, validate_percent, validate_positive_quantity, InvoiceStatus,
    LedgerDelta, LedgerTransactionType, PaymentMethod, QuotationLine, QuotationStatus,
    ReferenceType,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::customer::{lock_active_customer, outstanding_for};
use super::items::{ensure_location, fetch_active_item};
use super::ledger::{LedgerPosting, LedgerWriter};
use super::next_document_number;
use super::price_list::resolve_price;
use crate::config::InventoryConfig;
use crate::error::{ensure, AppError, AppResult};

/// Sales service
#[derive(Clone)]
pub struct SalesService {
    db: PgPool,
    writer: LedgerWriter,
}

/// Sales invoice header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SalesInvoice {
    pub id: Uuid,
    pub invoice_no: String,
    pub customer_id: Uuid,
    pub location_id: Uuid,
    pub quotation_id: Option<Uuid>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub discount_percent: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl SalesInvoice {
    pub fn status(&self) -> AppResult<InvoiceStatus> {
        InvoiceStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown invoice status {}", self.status)))
    }
}

/// Sales invoice line
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SalesInvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub item_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub line_total: Decimal,
}

impl SalesInvoiceItem {
    fn sale_posting(&self, invoice: &SalesInvoice) -> LedgerPosting<'static> {
        LedgerPosting::new(
            self.item_id,
            invoice.location_id,
            LedgerTransactionType::Sale,
            ReferenceType::SalesInvoice,
            invoice.id,
            LedgerDelta::outbound(self.quantity),
        )
        .unit_cost(self.unit_cost)
    }
}

/// Invoice with its lines and what is still owed
#[derive(Debug, Clone, Serialize)]
pub struct SalesInvoiceDetail {
    #[serde(flatten)]
    pub invoice: SalesInvoice,
    pub customer_name: String,
    pub outstanding: Decimal,
    pub items: Vec<SalesInvoiceItem>,
}

/// Payment record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub payment_no: String,
    pub invoice_id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: String,
    pub reference_no: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// Line on an invoice request; price falls back to the price list
#[derive(Debug, Deserialize, Serialize)]
pub struct SalesLineInput {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Option<Decimal>,
}

/// Input for raising an invoice
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceInput {
    pub customer_id: Uuid,
    pub location_id: Uuid,
    pub quotation_id: Option<Uuid>,
    pub price_list_id: Option<Uuid>,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub discount_percent: Option<Decimal>,
    #[validate(length(min = 1, message = "At least one line is required"))]
    pub items: Vec<SalesLineInput>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Invoice list filter
#[derive(Debug, Deserialize)]
pub struct InvoiceQuery {
    pub customer_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

/// Input for recording a payment
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: PaymentMethod,
    #[validate(length(max = 100, message = "Reference must be at most 100 characters"))]
    pub reference_no: Option<String>,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Payment together with the invoice it settled
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub invoice: SalesInvoice,
    pub outstanding: Decimal,
}

/// Payment list filter
#[derive(Debug, Deserialize)]
pub struct PaymentQuery {
    pub invoice_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
}

const INVOICE_COLUMNS: &str = "id, invoice_no, customer_id, location_id, quotation_id, invoice_date, \
     due_date, discount_percent, subtotal, discount_amount, total, amount_paid, status, notes, \
     created_at, created_by, cancelled_at";

const PAYMENT_COLUMNS: &str = "id, payment_no, invoice_id, customer_id, amount, payment_date, method, \
     reference_no, notes, created_at, created_by";

async fn lock_invoice(conn: &mut PgConnection, invoice_id: Uuid) -> AppResult<SalesInvoice> {
    sqlx::query_as::<_, SalesInvoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM sales_invoices WHERE id = $1 FOR UPDATE"
    ))
    .bind(invoice_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Sales invoice".to_string()))
}

async fn load_invoice_items(
    conn: &mut PgConnection,
    invoice_id: Uuid,
) -> AppResult<Vec<SalesInvoiceItem>> {
    let items = sqlx::query_as::<_, SalesInvoiceItem>(
        r#"
        SELECT si.id, si.invoice_id, si.item_id, i.code AS item_code, i.name AS item_name,
               si.quantity, si.unit_price, si.unit_cost, si.line_total
        FROM sales_invoice_items si
        JOIN items i ON i.id = si.item_id
        WHERE si.invoice_id = $1
        ORDER BY i.code
        "#,
    )
    .bind(invoice_id)
    .fetch_all(conn)
    .await?;

    Ok(items)
}

impl SalesService {
    /// Create a new SalesService instance
    pub fn new(db: PgPool, settings: &InventoryConfig) -> Self {
        Self {
            db,
            writer: LedgerWriter::new(settings),
        }
    }

    /// Raise an invoice: lines leave stock at the location, the total is owed
    pub async fn create_invoice(
        &self,
        user_id: Uuid,
        input: CreateInvoiceInput,
    ) -> AppResult<SalesInvoiceDetail> {
        input.validate()?;
        let discount_percent = input.discount_percent.unwrap_or(Decimal::ZERO);
        ensure("discount_percent", validate_percent(discount_percent))?;
        if let Some(due_date) = input.due_date {
            if due_date < input.invoice_date {
                return Err(AppError::validation(
                    "due_date",
                    "Due date cannot precede the invoice date",
                ));
            }
        }
        let mut seen = HashSet::new();
        for line in &input.items {
            ensure("quantity", validate_positive_quantity(line.quantity))?;
            if let Some(price) = line.unit_price {
                ensure("unit_price", validate_non_negative_amount(price))?;
            }
            if !seen.insert(line.item_id) {
                return Err(AppError::validation("items", "Each item may appear only once"));
            }
        }

        let mut tx = self.db.begin().await?;

        let customer = lock_active_customer(&mut tx, input.customer_id).await?;
        ensure_location(&mut tx, input.location_id).await?;

        if let Some(quotation_id) = input.quotation_id {
            let (status, quoted_customer) = sqlx::query_as::<_, (String, Option<Uuid>)>(
                "SELECT status, customer_id FROM quotations WHERE id = $1",
            )
            .bind(quotation_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Quotation".to_string()))?;

            if QuotationStatus::from_str(&status) != Some(QuotationStatus::Accepted) {
                return Err(AppError::InvalidStateTransition(
                    "Only accepted quotations can be invoiced".to_string(),
                ));
            }
            if quoted_customer.is_some_and(|id| id != customer.id) {
                return Err(AppError::validation(
                    "quotation_id",
                    "Quotation belongs to another customer",
                ));
            }
        }

        let price_list_id = input.price_list_id.or(customer.price_list_id);
        let mut priced = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = fetch_active_item(&mut tx, line.item_id).await?;
            let unit_price = match line.unit_price {
                Some(price) => price,
                None => resolve_price(&mut tx, line.item_id, price_list_id)
                    .await?
                    .map(|p| p.unit_price)
                    .ok_or_else(|| {
                        AppError::validation(
                            "unit_price",
                            format!("No price for item {} on the price list", item.code),
                        )
                    })?,
            };
            priced.push((
                item,
                QuotationLine {
                    quantity: line.quantity,
                    unit_price: unit_price.round_dp(2),
                },
            ));
        }

        let lines: Vec<QuotationLine> = priced.iter().map(|(_, line)| line.clone()).collect();
        let totals = quotation_totals(&lines, discount_percent);

        if let Some(limit) = customer.credit_limit {
            let open = outstanding_for(&mut tx, customer.id).await?;
            if open.outstanding + totals.total > limit {
                return Err(AppError::conflict(
                    "credit_limit",
                    format!(
                        "Customer {} would owe {} against a credit limit of {}",
                        customer.code,
                        open.outstanding + totals.total,
                        limit
                    ),
                ));
            }
        }

        let invoice_no =
            next_document_number(&mut tx, "sales_invoices", "invoice_no", "INV", input.invoice_date)
                .await?;

        let invoice = sqlx::query_as::<_, SalesInvoice>(&format!(
            r#"
            INSERT INTO sales_invoices (
                invoice_no, customer_id, location_id, quotation_id, invoice_date, due_date,
                discount_percent, subtotal, discount_amount, total, status, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(&invoice_no)
        .bind(customer.id)
        .bind(input.location_id)
        .bind(input.quotation_id)
        .bind(input.invoice_date)
        .bind(input.due_date)
        .bind(discount_percent)
        .bind(totals.subtotal)
        .bind(totals.discount_amount)
        .bind(totals.total)
        .bind(settlement_status(totals.total, Decimal::ZERO).as_str())
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "invoice_no"))?;

        let mut items = Vec::with_capacity(priced.len());
        for (item, line) in &priced {
            let row = sqlx::query_as::<_, SalesInvoiceItem>(
                r#"
                INSERT INTO sales_invoice_items (invoice_id, item_id, quantity, unit_price, unit_cost, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, invoice_id, item_id, $7::text AS item_code, $8::text AS item_name,
                          quantity, unit_price, unit_cost, line_total
                "#,
            )
            .bind(invoice.id)
            .bind(item.id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(item.cost_price)
            .bind(line.line_total())
            .bind(&item.code)
            .bind(&item.name)
            .fetch_one(&mut *tx)
            .await?;

            self.writer
                .post(&mut tx, row.sale_posting(&invoice).created_by(user_id))
                .await?;
            items.push(row);
        }

        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_no = %invoice.invoice_no,
            customer = %customer.code,
            total = %invoice.total,
            "Sales invoice created"
        );

        Ok(SalesInvoiceDetail {
            outstanding: outstanding_balance(invoice.total, invoice.amount_paid),
            invoice,
            customer_name: customer.name,
            items,
        })
    }

    /// Get an invoice with its lines
    pub async fn get_invoice(&self, invoice_id: Uuid) -> AppResult<SalesInvoiceDetail> {
        let mut conn = self.db.acquire().await?;

        let invoice = sqlx::query_as::<_, SalesInvoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM sales_invoices WHERE id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Sales invoice".to_string()))?;

        let customer_name = sqlx::query_scalar::<_, String>("SELECT name FROM customers WHERE id = $1")
            .bind(invoice.customer_id)
            .fetch_one(&mut *conn)
            .await?;

        let items = load_invoice_items(&mut conn, invoice_id).await?;

        Ok(SalesInvoiceDetail {
            outstanding: outstanding_balance(invoice.total, invoice.amount_paid),
            invoice,
            customer_name,
            items,
        })
    }

    /// List invoices, newest first
    pub async fn list_invoices(&self, query: InvoiceQuery) -> AppResult<Vec<SalesInvoice>> {
        let invoices = sqlx::query_as::<_, SalesInvoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM sales_invoices
            WHERE ($1::uuid IS NULL OR customer_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::date IS NULL OR invoice_date >= $3)
              AND ($4::date IS NULL OR invoice_date <= $4)
            ORDER BY invoice_date DESC, created_at DESC
            "#
        ))
        .bind(query.customer_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.from_date)
        .bind(query.to_date)
        .fetch_all(&self.db)
        .await?;

        Ok(invoices)
    }

    /// Cancel an invoice nobody has paid against, returning its stock
    pub async fn cancel_invoice(&self, user_id: Uuid, invoice_id: Uuid) -> AppResult<SalesInvoice> {
        let mut tx = self.db.begin().await?;

        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        if invoice.status()? == InvoiceStatus::Cancelled {
            return Err(AppError::InvalidStateTransition(format!(
                "Invoice {} is already cancelled",
                invoice.invoice_no
            )));
        }
        if invoice.amount_paid > Decimal::ZERO {
            return Err(AppError::conflict(
                "sales_invoice",
                format!(
                    "Invoice {} has {} in payments recorded against it",
                    invoice.invoice_no, invoice.amount_paid
                ),
            ));
        }

        let items = load_invoice_items(&mut tx, invoice_id).await?;
        for item in &items {
            self.writer
                .reverse(&mut tx, &item.sale_posting(&invoice), user_id)
                .await?;
        }

        let invoice = sqlx::query_as::<_, SalesInvoice>(&format!(
            r#"
            UPDATE sales_invoices
            SET status = $2, cancelled_at = NOW()
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(InvoiceStatus::Cancelled.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(invoice_id = %invoice.id, invoice_no = %invoice.invoice_no, "Sales invoice cancelled");

        Ok(invoice)
    }

    /// Record a payment against an open invoice
    pub async fn record_payment(
        &self,
        user_id: Uuid,
        invoice_id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<PaymentReceipt> {
        input.validate()?;

        let mut tx = self.db.begin().await?;

        let invoice = lock_invoice(&mut tx, invoice_id).await?;
        let status = invoice.status()?;
        if !status.accepts_payment() {
            return Err(AppError::InvalidStateTransition(format!(
                "Invoice {} is {} and takes no payments",
                invoice.invoice_no,
                status.as_str()
            )));
        }
        if input.payment_date < invoice.invoice_date {
            return Err(AppError::validation(
                "payment_date",
                "Payment date cannot precede the invoice date",
            ));
        }

        let (amount_paid, next_status) = apply_payment(invoice.total, invoice.amount_paid, input.amount)?;

        let payment_no =
            next_document_number(&mut tx, "payments", "payment_no", "RCT", input.payment_date).await?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (
                payment_no, invoice_id, customer_id, amount, payment_date, method, reference_no, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(&payment_no)
        .bind(invoice.id)
        .bind(invoice.customer_id)
        .bind(input.amount)
        .bind(input.payment_date)
        .bind(input.method.as_str())
        .bind(&input.reference_no)
        .bind(&input.notes)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique(e, "payment_no"))?;

        let invoice = sqlx::query_as::<_, SalesInvoice>(&format!(
            r#"
            UPDATE sales_invoices
            SET amount_paid = $2, status = $3
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(amount_paid)
        .bind(next_status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            payment_id = %payment.id,
            payment_no = %payment.payment_no,
            invoice_no = %invoice.invoice_no,
            amount = %payment.amount,
            status = %invoice.status,
            "Payment recorded"
        );

        Ok(PaymentReceipt {
            outstanding: outstanding_balance(invoice.total, invoice.amount_paid),
            payment,
            invoice,
        })
    }

    /// List payments, newest first
    pub async fn list_payments(&self, query: PaymentQuery) -> AppResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE ($1::uuid IS NULL OR invoice_id = $1)
              AND ($2::uuid IS NULL OR customer_id = $2)
            ORDER BY payment_date DESC, created_at DESC
            "#
        ))
        .bind(query.invoice_id)
        .bind(query.customer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use shared::{ItemType, LocationType};

    use super::*;
    use crate::services::customer::{CreateCustomerInput, CustomerService};
    use crate::services::ledger::location_balance;
    use crate::services::quotation::{
        CreateQuotationInput, QuotationLineInput, QuotationService, UpdateQuotationStatusInput,
    };
    use crate::services::opening_stock::{CreateOpeningStockInput, OpeningStockService};
    use crate::test_support::{
        create_item, create_location, ledger_rows, settings, test_db, unique_code, unique_date,
        user,
    };

    struct Shop {
        service: SalesService,
        customer_id: Uuid,
        item_id: Uuid,
        location_id: Uuid,
        date: NaiveDate,
    }

    /// A customer and 50 units of one item on hand at a store
    async fn shop(db: &PgPool, credit_limit: Option<Decimal>) -> Shop {
        let item = create_item(db, ItemType::Finished, None).await;
        let store = create_location(db, LocationType::Store).await;
        let date = unique_date();
        OpeningStockService::new(db.clone(), &settings())
            .create(
                user(),
                CreateOpeningStockInput {
                    item_id: item.id,
                    location_id: store.id,
                    quantity: Decimal::from(50),
                    unit_cost: Some(Decimal::from(10)),
                    opening_date: date,
                    notes: None,
                },
            )
            .await
            .unwrap();
        let customer = CustomerService::new(db.clone())
            .create(CreateCustomerInput {
                code: unique_code("CU"),
                name: "Corner Bakery".to_string(),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
                credit_limit,
                price_list_id: None,
            })
            .await
            .unwrap();

        Shop {
            service: SalesService::new(db.clone(), &settings()),
            customer_id: customer.id,
            item_id: item.id,
            location_id: store.id,
            date,
        }
    }

    impl Shop {
        fn invoice(&self, quantity: i64) -> CreateInvoiceInput {
            CreateInvoiceInput {
                customer_id: self.customer_id,
                location_id: self.location_id,
                quotation_id: None,
                price_list_id: None,
                invoice_date: self.date,
                due_date: None,
                discount_percent: None,
                items: vec![SalesLineInput {
                    item_id: self.item_id,
                    quantity: Decimal::from(quantity),
                    unit_price: Some(Decimal::from(15)),
                }],
                notes: None,
            }
        }

        fn payment(&self, amount: i64) -> RecordPaymentInput {
            RecordPaymentInput {
                amount: Decimal::from(amount),
                payment_date: self.date,
                method: PaymentMethod::Cash,
                reference_no: None,
                notes: None,
            }
        }

        async fn on_hand(&self, db: &PgPool) -> Decimal {
            let mut conn = db.acquire().await.unwrap();
            location_balance(&mut conn, self.item_id, self.location_id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_invoice_takes_stock_and_payments_settle_it() {
        let Some(db) = test_db().await else { return };
        let shop = shop(&db, None).await;

        let detail = shop.service.create_invoice(user(), shop.invoice(20)).await.unwrap();
        let invoice_id = detail.invoice.id;
        assert_eq!(detail.invoice.total, Decimal::from(300));
        assert_eq!(detail.invoice.status, "unpaid");
        assert_eq!(detail.outstanding, Decimal::from(300));
        assert_eq!(shop.on_hand(&db).await, Decimal::from(30));
        assert_eq!(
            ledger_rows(&db, invoice_id).await,
            vec![("sale".to_string(), Decimal::ZERO, Decimal::from(20))]
        );

        let receipt = shop
            .service
            .record_payment(user(), invoice_id, shop.payment(100))
            .await
            .unwrap();
        assert_eq!(receipt.invoice.status, "partially_paid");
        assert_eq!(receipt.outstanding, Decimal::from(200));

        let err = shop
            .service
            .record_payment(user(), invoice_id, shop.payment(250))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        let receipt = shop
            .service
            .record_payment(user(), invoice_id, shop.payment(200))
            .await
            .unwrap();
        assert_eq!(receipt.invoice.status, "paid");
        assert_eq!(receipt.outstanding, Decimal::ZERO);

        let err = shop
            .service
            .record_payment(user(), invoice_id, shop.payment(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));

        let payments = shop
            .service
            .list_payments(PaymentQuery {
                invoice_id: Some(invoice_id),
                customer_id: None,
            })
            .await
            .unwrap();
        assert_eq!(payments.len(), 2);

        let balance = CustomerService::new(db.clone())
            .balance(shop.customer_id)
            .await
            .unwrap();
        assert_eq!(balance.open_invoices, 0);
        assert_eq!(balance.total_paid, Decimal::from(300));
        assert_eq!(balance.outstanding, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_cancelling_an_unpaid_invoice_returns_stock() {
        let Some(db) = test_db().await else { return };
        let shop = shop(&db, None).await;

        let detail = shop.service.create_invoice(user(), shop.invoice(20)).await.unwrap();
        let cancelled = shop
            .service
            .cancel_invoice(user(), detail.invoice.id)
            .await
            .unwrap();

        assert_eq!(cancelled.status, "cancelled");
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(shop.on_hand(&db).await, Decimal::from(50));
        assert_eq!(
            ledger_rows(&db, detail.invoice.id).await,
            vec![
                ("reversal".to_string(), Decimal::from(20), Decimal::ZERO),
                ("sale".to_string(), Decimal::ZERO, Decimal::from(20)),
            ]
        );

        let err = shop
            .service
            .cancel_invoice(user(), detail.invoice.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));
    }

    #[tokio::test]
    async fn test_paid_invoice_cannot_be_cancelled() {
        let Some(db) = test_db().await else { return };
        let shop = shop(&db, None).await;

        let detail = shop.service.create_invoice(user(), shop.invoice(4)).await.unwrap();
        shop.service
            .record_payment(user(), detail.invoice.id, shop.payment(10))
            .await
            .unwrap();

        let err = shop
            .service
            .cancel_invoice(user(), detail.invoice.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(shop.on_hand(&db).await, Decimal::from(46));
    }

    #[tokio::test]
    async fn test_rejected_invoices_leave_no_trace() {
        let Some(db) = test_db().await else { return };
        let limited = shop(&db, Some(Decimal::from(100))).await;
        let unlimited = shop(&db, None).await;

        // 20 x 15 = 300 is over the 100 credit limit
        let err = limited
            .service
            .create_invoice(user(), limited.invoice(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        let err = unlimited
            .service
            .create_invoice(user(), unlimited.invoice(80))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientInventory(_)));

        for rejected in [&limited, &unlimited] {
            assert_eq!(rejected.on_hand(&db).await, Decimal::from(50));
            let invoices = rejected
                .service
                .list_invoices(InvoiceQuery {
                    customer_id: Some(rejected.customer_id),
                    status: None,
                    from_date: None,
                    to_date: None,
                })
                .await
                .unwrap();
            assert!(invoices.is_empty());
        }
    }

    #[tokio::test]
    async fn test_only_accepted_quotations_are_invoiced() {
        let Some(db) = test_db().await else { return };
        let shop = shop(&db, None).await;
        let quotations = QuotationService::new(db.clone());

        let quotation = quotations
            .create(
                user(),
                CreateQuotationInput {
                    customer_id: Some(shop.customer_id),
                    customer_name: None,
                    customer_contact: None,
                    price_list_id: None,
                    quotation_date: shop.date,
                    valid_until: None,
                    discount_percent: None,
                    items: vec![QuotationLineInput {
                        item_id: shop.item_id,
                        quantity: Decimal::from(5),
                        unit_price: Some(Decimal::from(15)),
                    }],
                    notes: None,
                },
            )
            .await
            .unwrap()
            .quotation;
        assert_eq!(quotation.customer_name, "Corner Bakery");

        let mut input = shop.invoice(5);
        input.quotation_id = Some(quotation.id);
        let err = shop.service.create_invoice(user(), input).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidStateTransition(_)));

        for status in [QuotationStatus::Sent, QuotationStatus::Accepted] {
            quotations
                .update_status(quotation.id, UpdateQuotationStatusInput { status })
                .await
                .unwrap();
        }

        let mut input = shop.invoice(5);
        input.quotation_id = Some(quotation.id);
        let detail = shop.service.create_invoice(user(), input).await.unwrap();
        assert_eq!(detail.invoice.quotation_id, Some(quotation.id));
        assert_eq!(detail.customer_name, "Corner Bakery");
    }
}
