//! Inventory movement ledger
//!
//! Every stock change is recorded as an append-only movement written in the
//! same transaction as the stock update it explains.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::notifier::{StockNotifier, StockUpdate};
use shared::{
    apply_stock_delta, InventoryMovement, MovementType, PageQuery, PaginatedResponse,
    RecordMovementRequest,
};

/// Inventory service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    notifier: StockNotifier,
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: Uuid,
    company_product_id: Uuid,
    movement_type: String,
    quantity: i32,
    comment: Option<String>,
    order_id: Option<Uuid>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for InventoryMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let movement_type = MovementType::parse(&row.movement_type).ok_or_else(|| {
            AppError::Internal(format!("unknown movement type {}", row.movement_type))
        })?;
        Ok(InventoryMovement {
            id: row.id,
            company_product_id: row.company_product_id,
            movement_type,
            quantity: row.quantity,
            comment: row.comment,
            order_id: row.order_id,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

/// Result of recording a movement
#[derive(Debug, serde::Serialize)]
pub struct RecordedMovement {
    pub movement: InventoryMovement,
    pub new_stock: i32,
}

impl InventoryService {
    pub fn new(db: PgPool, notifier: StockNotifier) -> Self {
        Self { db, notifier }
    }

    /// Apply a manual movement to one of the acting company's products
    pub async fn record_movement(
        &self,
        user: &AuthUser,
        product_id: Uuid,
        input: RecordMovementRequest,
    ) -> AppResult<RecordedMovement> {
        let company_id = user.require_company()?;
        input.validate()?;
        let delta = input.movement_type.signed_effect(input.quantity)?;

        let mut tx = self.db.begin().await?;

        let current = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT stock_quantity FROM company_products
            WHERE id = $1 AND company_id = $2 AND NOT is_deleted
            FOR UPDATE
            "#,
        )
        .bind(product_id)
        .bind(company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let new_stock = apply_stock_delta(current, delta)?;

        sqlx::query("UPDATE company_products SET stock_quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(new_stock)
            .execute(&mut *tx)
            .await?;

        let movement = insert_movement(
            &mut tx,
            product_id,
            input.movement_type,
            delta,
            input.comment.as_deref(),
            None,
            &user.user_name,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            product_id = %product_id,
            movement_type = input.movement_type.as_str(),
            delta,
            new_stock,
            "inventory movement recorded"
        );

        self.notifier.notify(StockUpdate {
            product_id,
            company_id,
            new_stock,
        });

        Ok(RecordedMovement {
            movement,
            new_stock,
        })
    }

    /// Movements of one product, newest first
    pub async fn list_movements(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        page: &PageQuery,
    ) -> AppResult<PaginatedResponse<InventoryMovement>> {
        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM company_products WHERE id = $1 AND company_id = $2)",
        )
        .bind(product_id)
        .bind(company_id)
        .fetch_one(&self.db)
        .await?;
        if !owned {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let pagination = page.pagination();

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM inventory_movements WHERE company_product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, company_product_id, movement_type, quantity, comment, order_id, created_by, created_at
            FROM inventory_movements
            WHERE company_product_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(product_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let movements = rows
            .into_iter()
            .map(InventoryMovement::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(movements, pagination, total.max(0) as u64))
    }
}

/// Append one movement with its signed quantity
pub(crate) async fn insert_movement(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    movement_type: MovementType,
    signed_quantity: i32,
    comment: Option<&str>,
    order_id: Option<Uuid>,
    created_by: &str,
) -> AppResult<InventoryMovement> {
    let row = sqlx::query_as::<_, MovementRow>(
        r#"
        INSERT INTO inventory_movements
            (company_product_id, movement_type, quantity, comment, order_id, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, company_product_id, movement_type, quantity, comment, order_id, created_by, created_at
        "#,
    )
    .bind(product_id)
    .bind(movement_type.as_str())
    .bind(signed_quantity)
    .bind(comment)
    .bind(order_id)
    .bind(created_by)
    .fetch_one(&mut **tx)
    .await?;

    row.try_into()
}
