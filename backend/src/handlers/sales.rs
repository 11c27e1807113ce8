//! HTTP handlers for sales invoice and payment endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sales::{
    CreateInvoiceInput, InvoiceQuery, Payment, PaymentQuery, PaymentReceipt, RecordPaymentInput,
    SalesInvoice, SalesInvoiceDetail, SalesService,
};
use crate::AppState;

/// Raise a sales invoice
pub async fn create_sales_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateInvoiceInput>,
) -> AppResult<Json<SalesInvoiceDetail>> {
    current_user.0.require("sales", "create")?;
    let service = SalesService::new(state.db, &state.config.inventory);
    let invoice = service
        .create_invoice(current_user.0.user_id, input)
        .await?;
    Ok(Json(invoice))
}

/// Get a sales invoice with its lines
pub async fn get_sales_invoice(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<SalesInvoiceDetail>> {
    let service = SalesService::new(state.db, &state.config.inventory);
    let invoice = service.get_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

/// List sales invoices
pub async fn list_sales_invoices(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<InvoiceQuery>,
) -> AppResult<Json<Vec<SalesInvoice>>> {
    let service = SalesService::new(state.db, &state.config.inventory);
    let invoices = service.list_invoices(query).await?;
    Ok(Json(invoices))
}

/// Cancel an unpaid sales invoice
pub async fn cancel_sales_invoice(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<SalesInvoice>> {
    current_user.0.require("sales", "cancel")?;
    let service = SalesService::new(state.db, &state.config.inventory);
    let invoice = service
        .cancel_invoice(current_user.0.user_id, invoice_id)
        .await?;
    Ok(Json(invoice))
}

/// Record a payment against an invoice
pub async fn record_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<Json<PaymentReceipt>> {
    current_user.0.require("payments", "create")?;
    let service = SalesService::new(state.db, &state.config.inventory);
    let receipt = service
        .record_payment(current_user.0.user_id, invoice_id, input)
        .await?;
    Ok(Json(receipt))
}

/// List payments
pub async fn list_payments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<PaymentQuery>,
) -> AppResult<Json<Vec<Payment>>> {
    let service = SalesService::new(state.db, &state.config.inventory);
    let payments = service.list_payments(query).await?;
    Ok(Json(payments))
}
