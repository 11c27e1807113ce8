//! Business logic services for the Stock Ledger Platform

pub mod bom;
pub mod bundle;
pub mod customer;
pub mod grn;
pub mod items;
pub mod ledger;
pub mod opening_stock;
pub mod price_list;
pub mod production;
pub mod quotation;
pub mod repacking;
pub mod sales;
pub mod supplier;
pub mod trolley;

use chrono::NaiveDate;
use shared::generate_document_number;
use sqlx::PgConnection;

use crate::error::AppResult;

/// Next `PREFIX-YYYYMMDD-NNNN` number for a document table
///
/// Numbers come from the per-stem counter in `document_sequences`, so a
/// deleted document's number is never issued again. The first number of a
/// stem continues after the highest one already in `table`. `table` and
/// `column` are compile-time names, never user input.
pub(crate) async fn next_document_number(
    conn: &mut PgConnection,
    table: &'static str,
    column: &'static str,
    prefix: &str,
    date: NaiveDate,
) -> AppResult<String> {
    let stem = format!("{}-{}-", prefix, date.format("%Y%m%d"));
    let next = sqlx::query_scalar::<_, i32>(&format!(
        r#"
        INSERT INTO document_sequences (stem, last_number)
        VALUES (
            $1,
            (SELECT COALESCE(MAX(SUBSTRING({column} FROM char_length($1) + 1)::int), 0) + 1
             FROM {table}
             WHERE {column} LIKE $1 || '%')
        )
        ON CONFLICT (stem)
        DO UPDATE SET last_number = document_sequences.last_number + 1, updated_at = NOW()
        RETURNING last_number
        "#
    ))
    .bind(&stem)
    .fetch_one(conn)
    .await?;

    Ok(generate_document_number(prefix, date, i64::from(next)))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::test_support::{test_db, unique_date};

    use super::next_document_number;

    #[tokio::test]
    async fn test_numbers_continue_after_existing_documents() {
        let Some(db) = test_db().await else { return };
        let date = unique_date();
        let mut conn = db.acquire().await.unwrap();

        // a document numbered before the counter existed
        let stem = format!("QTN-{}-", date.format("%Y%m%d"));
        sqlx::query(
            r#"
            INSERT INTO quotations (quotation_no, customer_name, quotation_date, subtotal, discount_amount, total)
            VALUES ($1, 'Walk-in', $2, 0, 0, 0)
            "#,
        )
        .bind(format!("{stem}0007"))
        .bind(date)
        .execute(&mut *conn)
        .await
        .unwrap();

        let first = next_document_number(&mut conn, "quotations", "quotation_no", "QTN", date)
            .await
            .unwrap();
        let second = next_document_number(&mut conn, "quotations", "quotation_no", "QTN", date)
            .await
            .unwrap();
        assert_eq!(first, format!("{stem}0008"));
        assert_eq!(second, format!("{stem}0009"));
    }

    #[tokio::test]
    async fn test_stems_are_numbered_independently() {
        let Some(db) = test_db().await else { return };
        let date = unique_date();
        let next_day = date.succ_opt().unwrap_or(NaiveDate::MAX);
        let mut conn = db.acquire().await.unwrap();

        let grn = next_document_number(&mut conn, "grn", "grn_no", "GRN", date).await.unwrap();
        let other_day = next_document_number(&mut conn, "grn", "grn_no", "GRN", next_day)
            .await
            .unwrap();
        assert!(grn.ends_with("-0001"));
        assert!(other_day.ends_with("-0001"));
    }
}
