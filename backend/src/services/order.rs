//! Order lifecycle service
//!
//! Loads rows, asks the rules in `shared::lifecycle` what an operation may
//! do, and applies the resulting plan in one transaction. The order row and
//! the affected product rows are locked `FOR UPDATE`, so concurrent
//! transitions on the same order serialize and the loser sees the new status.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::ExchangeRateProvider;
use crate::middleware::AuthUser;
use crate::services::inventory::insert_movement;
use crate::services::notifier::StockNotifier;
use crate::services::product::catalog_by_eans;
use shared::{
    allowed_actions, authorize_party, authorize_viewer, currencies_to_convert, ensure_not_self_order,
    ensure_pending, order_total, plan_transition, validate_currency_code, validate_order_lines,
    CreateOrderRequest, LineStock, Money, OrderAction, OrderDetails, OrderFilter, OrderLineView,
    OrderParty, OrderStatus, PageQuery, PaginatedResponse, PlannedMovement, StockChange,
    UpdateOrderProductsRequest, ValidatedLine,
};

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    notifier: StockNotifier,
    exchange_rates: Arc<dyn ExchangeRateProvider>,
}

/// Order row joined with both parties
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    seller_id: Uuid,
    seller_name: String,
    seller_tax_id: String,
    buyer_id: Uuid,
    buyer_name: String,
    buyer_tax_id: String,
    status: i16,
    created_at: DateTime<Utc>,
    user_name_who_made_order: String,
    total_amount: Decimal,
    total_currency: String,
}

impl OrderRow {
    fn status(&self) -> AppResult<OrderStatus> {
        OrderStatus::from_code(self.status)
            .ok_or_else(|| AppError::Internal(format!("unknown order status {}", self.status)))
    }
}

/// Minimal locked view of an order used by transitions
#[derive(Debug, sqlx::FromRow)]
struct LockedOrder {
    seller_id: Uuid,
    buyer_id: Uuid,
    status: i16,
    total_currency: String,
}

impl LockedOrder {
    fn status(&self) -> AppResult<OrderStatus> {
        OrderStatus::from_code(self.status)
            .ok_or_else(|| AppError::Internal(format!("unknown order status {}", self.status)))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    order_id: Uuid,
    company_product_id: Uuid,
    ean: String,
    name: String,
    quantity: i32,
    price_amount: Decimal,
    price_currency: String,
    is_available: bool,
    is_deleted: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct LineStockRow {
    company_product_id: Uuid,
    ean: String,
    quantity: i32,
    stock_quantity: i32,
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.seller_id, s.name AS seller_name, s.tax_id AS seller_tax_id,
           o.buyer_id, b.name AS buyer_name, b.tax_id AS buyer_tax_id,
           o.status, o.created_at, o.user_name_who_made_order,
           o.total_amount, o.total_currency
    FROM orders o
    JOIN companies s ON s.id = o.seller_id
    JOIN companies b ON b.id = o.buyer_id
"#;

const ORDER_SORT_COLUMNS: [(&str, &str); 3] = [
    ("created_at", "o.created_at"),
    ("total", "o.total_amount"),
    ("status", "o.status"),
];

impl OrderService {
    pub fn new(
        db: PgPool,
        notifier: StockNotifier,
        exchange_rates: Arc<dyn ExchangeRateProvider>,
    ) -> Self {
        Self {
            db,
            notifier,
            exchange_rates,
        }
    }

    /// Place a Pending order against a seller's catalog. Stock is not touched.
    pub async fn create(&self, user: &AuthUser, input: CreateOrderRequest) -> AppResult<OrderDetails> {
        let buyer_id = user.require_company()?;
        input.validate()?;
        let currency = input.currency_code.trim().to_uppercase();
        validate_currency_code(&currency)
            .map_err(|msg| AppError::validation("currency_code", msg))?;

        let seller_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM companies WHERE tax_id = $1")
            .bind(input.seller_tax_id.trim())
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Company with tax ID {}", input.seller_tax_id.trim()))
            })?;

        ensure_not_self_order(buyer_id, seller_id)?;

        let (lines, total) = self
            .price_lines(&self.db, seller_id, &input.products, &currency)
            .await?;

        let mut tx = self.db.begin().await?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders (seller_id, buyer_id, status, user_name_who_made_order, total_amount, total_currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(seller_id)
        .bind(buyer_id)
        .bind(OrderStatus::Pending.code())
        .bind(&user.user_name)
        .bind(total.amount)
        .bind(&total.currency_code)
        .fetch_one(&mut *tx)
        .await?;

        insert_lines(&mut tx, order_id, &lines).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            seller_id = %seller_id,
            buyer_id = %buyer_id,
            total = %total,
            "order created"
        );

        self.get(buyer_id, order_id).await
    }

    /// Read an order; either party may
    pub async fn get(&self, company_id: Uuid, order_id: Uuid) -> AppResult<OrderDetails> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        authorize_viewer(row.seller_id, row.buyer_id, company_id)?;

        let mut lines = load_line_views(&self.db, &[row.id]).await?;
        let products = lines.remove(&row.id).unwrap_or_default();
        to_details(row, products, company_id)
    }

    /// Orders the company takes part in
    pub async fn list(
        &self,
        company_id: Uuid,
        filter: &OrderFilter,
        page: &PageQuery,
    ) -> AppResult<PaginatedResponse<OrderDetails>> {
        let pagination = page.pagination();
        let sort = page.sort_column(&ORDER_SORT_COLUMNS);
        let party = filter.party.map(|p| match p {
            OrderParty::Seller => "seller",
            OrderParty::Buyer => "buyer",
        });
        let status = filter.status.map(|s| s.code());

        let condition = r#"
            (($2::TEXT IS NULL AND (o.seller_id = $1 OR o.buyer_id = $1))
              OR ($2 = 'seller' AND o.seller_id = $1)
              OR ($2 = 'buyer' AND o.buyer_id = $1))
            AND ($3::SMALLINT IS NULL OR o.status = $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM orders o WHERE {condition}"
        ))
        .bind(company_id)
        .bind(party)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} WHERE {condition} ORDER BY {sort} {dir}, o.id LIMIT $4 OFFSET $5",
            dir = page.direction().as_sql()
        ))
        .bind(company_id)
        .bind(party)
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut lines = load_line_views(&self.db, &ids).await?;
        let orders = rows
            .into_iter()
            .map(|row| {
                let products = lines.remove(&row.id).unwrap_or_default();
                to_details(row, products, company_id)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(PaginatedResponse::new(orders, pagination, total.max(0) as u64))
    }

    /// Replace the lines of a Pending order and recompute its total
    pub async fn update_products(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        input: UpdateOrderProductsRequest,
    ) -> AppResult<OrderDetails> {
        let company_id = user.require_company()?;
        input.validate()?;

        let order = self.load_order(&self.db, order_id, false).await?;
        authorize_party(order.seller_id, order.buyer_id, company_id, OrderParty::Buyer)?;
        ensure_pending(order.status()?, "edit")?;

        let (lines, total) = self
            .price_lines(&self.db, order.seller_id, &input.products, &order.total_currency)
            .await?;

        let mut tx = self.db.begin().await?;

        // Status may have moved while rates were fetched
        let locked = self.load_order(&mut *tx, order_id, true).await?;
        ensure_pending(locked.status()?, "edit")?;

        sqlx::query("DELETE FROM order_products WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        insert_lines(&mut tx, order_id, &lines).await?;

        sqlx::query("UPDATE orders SET total_amount = $2 WHERE id = $1")
            .bind(order_id)
            .bind(total.amount)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order_id, total = %total, "order lines replaced");

        self.get(company_id, order_id).await
    }

    pub async fn accept(&self, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetails> {
        self.apply_action(user, order_id, OrderAction::Accept).await
    }

    pub async fn reject(&self, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetails> {
        self.apply_action(user, order_id, OrderAction::Reject).await
    }

    pub async fn cancel(&self, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetails> {
        self.apply_action(user, order_id, OrderAction::Cancel).await
    }

    pub async fn complete(&self, user: &AuthUser, order_id: Uuid) -> AppResult<OrderDetails> {
        self.apply_action(user, order_id, OrderAction::Complete).await
    }

    /// Run one status transition with its stock side effects.
    ///
    /// Checks run in order: existence, party, state edge, stock.
    async fn apply_action(
        &self,
        user: &AuthUser,
        order_id: Uuid,
        action: OrderAction,
    ) -> AppResult<OrderDetails> {
        let company_id = user.require_company()?;

        let mut tx = self.db.begin().await?;

        let order = self.load_order(&mut *tx, order_id, true).await?;
        let current = order.status()?;
        // Product rows are locked before the checks; a failed check rolls back
        let lines = if action.moves_stock() {
            lock_line_stock(&mut tx, order_id).await?
        } else {
            Vec::new()
        };
        let plan = plan_transition(
            order.seller_id,
            order.buyer_id,
            company_id,
            current,
            action,
            &lines,
        )?;

        if let Some(movement) = plan.movement {
            apply_stock_changes(&mut tx, order_id, &plan.changes, movement, &user.user_name).await?;
        }

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(plan.next.code())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            from = %current,
            to = %plan.next,
            acting_company = %company_id,
            "order status changed"
        );

        self.notifier.notify_changes(order.seller_id, &plan.changes);

        self.get(company_id, order_id).await
    }

    /// Delete a Pending order; only the buyer may
    pub async fn delete(&self, user: &AuthUser, order_id: Uuid) -> AppResult<()> {
        let company_id = user.require_company()?;

        let mut tx = self.db.begin().await?;

        let order = self.load_order(&mut *tx, order_id, true).await?;
        authorize_party(order.seller_id, order.buyer_id, company_id, OrderParty::Buyer)?;
        ensure_pending(order.status()?, "delete")?;

        sqlx::query("DELETE FROM order_products WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_id = %order_id, acting_company = %company_id, "order deleted");
        Ok(())
    }

    async fn load_order<'e, E>(&self, executor: E, order_id: Uuid, lock: bool) -> AppResult<LockedOrder>
    where
        E: PgExecutor<'e>,
    {
        let sql = if lock {
            "SELECT seller_id, buyer_id, status, total_currency FROM orders WHERE id = $1 FOR UPDATE"
        } else {
            "SELECT seller_id, buyer_id, status, total_currency FROM orders WHERE id = $1"
        };
        sqlx::query_as::<_, LockedOrder>(sql)
            .bind(order_id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))
    }

    /// Validate requested lines against the seller's catalog and total them in `currency`
    async fn price_lines<'e, E>(
        &self,
        executor: E,
        seller_id: Uuid,
        requested: &BTreeMap<String, i32>,
        currency: &str,
    ) -> AppResult<(Vec<ValidatedLine>, Money)>
    where
        E: PgExecutor<'e>,
    {
        let eans: Vec<String> = requested.keys().cloned().collect();
        let catalog = catalog_by_eans(executor, seller_id, &eans).await?;
        let lines = validate_order_lines(requested, &catalog)?;

        let mut rates = HashMap::new();
        for from in currencies_to_convert(&lines, currency) {
            let rate = self.exchange_rates.rate(&from, currency).await?;
            rates.insert(from, rate);
        }

        let total = order_total(&lines, currency, &rates)?;
        Ok((lines, total))
    }
}

async fn insert_lines(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    lines: &[ValidatedLine],
) -> AppResult<()> {
    for line in lines {
        sqlx::query(
            "INSERT INTO order_products (order_id, company_product_id, quantity) VALUES ($1, $2, $3)",
        )
        .bind(order_id)
        .bind(line.company_product_id)
        .bind(line.quantity)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Lock the order's products in id order and read their stock
async fn lock_line_stock(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> AppResult<Vec<LineStock>> {
    let rows = sqlx::query_as::<_, LineStockRow>(
        r#"
        SELECT op.company_product_id, p.ean, op.quantity, p.stock_quantity
        FROM order_products op
        JOIN company_products p ON p.id = op.company_product_id
        WHERE op.order_id = $1
        ORDER BY p.id
        FOR UPDATE OF p
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| LineStock {
            company_product_id: r.company_product_id,
            ean: r.ean,
            quantity: r.quantity,
            stock_quantity: r.stock_quantity,
        })
        .collect())
}

async fn apply_stock_changes(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    changes: &[StockChange],
    movement: PlannedMovement,
    created_by: &str,
) -> AppResult<()> {
    for change in changes {
        sqlx::query(
            "UPDATE company_products SET stock_quantity = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(change.company_product_id)
        .bind(change.new_stock)
        .execute(&mut **tx)
        .await?;

        insert_movement(
            &mut *tx,
            change.company_product_id,
            movement.movement_type,
            change.delta,
            Some(movement.comment),
            Some(order_id),
            created_by,
        )
        .await?;
    }
    Ok(())
}

async fn load_line_views<'e, E>(
    executor: E,
    order_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<OrderLineView>>>
where
    E: PgExecutor<'e>,
{
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT op.order_id, op.company_product_id, p.ean, p.name, op.quantity,
               p.price_amount, p.price_currency, p.is_available, p.is_deleted
        FROM order_products op
        JOIN company_products p ON p.id = op.company_product_id
        WHERE op.order_id = ANY($1)
        ORDER BY p.ean
        "#,
    )
    .bind(order_ids)
    .fetch_all(executor)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderLineView>> = HashMap::new();
    for row in rows {
        by_order.entry(row.order_id).or_default().push(OrderLineView {
            company_product_id: row.company_product_id,
            ean: row.ean,
            name: row.name,
            quantity: row.quantity,
            unit_price: Money::new(row.price_amount, row.price_currency),
            is_available: row.is_available,
            is_deleted: row.is_deleted,
        });
    }
    Ok(by_order)
}

fn to_details(
    row: OrderRow,
    products: Vec<OrderLineView>,
    viewer: Uuid,
) -> AppResult<OrderDetails> {
    let status = row.status()?;
    let actions = if viewer == row.seller_id {
        allowed_actions(status, OrderParty::Seller)
    } else if viewer == row.buyer_id {
        allowed_actions(status, OrderParty::Buyer)
    } else {
        Vec::new()
    };

    Ok(OrderDetails {
        id: row.id,
        seller_id: row.seller_id,
        seller_name: row.seller_name,
        seller_tax_id: row.seller_tax_id,
        buyer_id: row.buyer_id,
        buyer_name: row.buyer_name,
        buyer_tax_id: row.buyer_tax_id,
        status,
        status_code: status.code(),
        created_at: row.created_at,
        user_name_who_made_order: row.user_name_who_made_order,
        total_price: Money::new(row.total_amount, row.total_currency),
        products,
        allowed_actions: actions,
    })
}
