//! Company product catalog service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::category::CategoryService;
use crate::services::inventory::insert_movement;
use crate::services::notifier::{StockNotifier, StockUpdate};
use shared::{
    validate_currency_code, validate_ean, validate_price, CompanyProduct, CreateProductRequest,
    Money, MovementType, PageQuery, PaginatedResponse, ProductFilter, UpdateProductRequest,
};

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
    notifier: StockNotifier,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub ean: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub stock_quantity: i32,
    pub is_available: bool,
    pub price_amount: Decimal,
    pub price_currency: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRow> for CompanyProduct {
    fn from(row: ProductRow) -> Self {
        CompanyProduct {
            id: row.id,
            company_id: row.company_id,
            ean: row.ean,
            name: row.name,
            description: row.description,
            category_id: row.category_id,
            image_url: row.image_url,
            stock_quantity: row.stock_quantity,
            is_available: row.is_available,
            price: Money::new(row.price_amount, row.price_currency),
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.company_id, p.ean, p.name, p.description, \
     p.category_id, p.image_url, p.stock_quantity, p.is_available, p.price_amount, \
     p.price_currency, p.is_deleted, p.created_at, p.updated_at";

const PRODUCT_SORT_COLUMNS: [(&str, &str); 4] = [
    ("created_at", "p.created_at"),
    ("name", "p.name"),
    ("price", "p.price_amount"),
    ("stock", "p.stock_quantity"),
];

impl ProductService {
    pub fn new(db: PgPool, notifier: StockNotifier) -> Self {
        Self { db, notifier }
    }

    /// Add a product to the acting company's catalog
    pub async fn create(
        &self,
        user: &AuthUser,
        input: CreateProductRequest,
    ) -> AppResult<CompanyProduct> {
        let company_id = user.require_company()?;
        input.validate()?;
        let ean = input.ean.trim().to_string();
        validate_ean(&ean).map_err(|msg| AppError::validation("ean", msg))?;
        validate_price(input.price).map_err(|msg| AppError::validation("price", msg))?;
        let currency = input.currency_code.trim().to_uppercase();
        validate_currency_code(&currency)
            .map_err(|msg| AppError::validation("currency_code", msg))?;
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO company_products AS p
                (company_id, ean, name, description, category_id, image_url,
                 stock_quantity, is_available, price_amount, price_currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(company_id)
        .bind(&ean)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.category_id)
        .bind(&input.image_url)
        .bind(input.stock_quantity)
        .bind(input.is_available.unwrap_or(true))
        .bind(input.price)
        .bind(&currency)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "ean"))?;

        if input.stock_quantity > 0 {
            insert_movement(
                &mut tx,
                row.id,
                MovementType::Inbound,
                input.stock_quantity,
                Some("Initial stock"),
                None,
                &user.user_name,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(product_id = %row.id, company_id = %company_id, ean = %row.ean, "product created");

        if row.stock_quantity > 0 {
            self.notifier.notify(StockUpdate {
                product_id: row.id,
                company_id,
                new_stock: row.stock_quantity,
            });
        }

        Ok(row.into())
    }

    /// Update catalog data; stock only changes through movements
    pub async fn update(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        input: UpdateProductRequest,
    ) -> AppResult<CompanyProduct> {
        input.validate()?;
        if let Some(price) = input.price {
            validate_price(price).map_err(|msg| AppError::validation("price", msg))?;
        }
        let currency = input
            .currency_code
            .as_deref()
            .map(|c| c.trim().to_uppercase());
        if let Some(code) = &currency {
            validate_currency_code(code)
                .map_err(|msg| AppError::validation("currency_code", msg))?;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category(category_id).await?;
        }

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE company_products AS p SET
                name = COALESCE($3, p.name),
                description = COALESCE($4, p.description),
                category_id = COALESCE($5, p.category_id),
                image_url = COALESCE($6, p.image_url),
                price_amount = COALESCE($7, p.price_amount),
                price_currency = COALESCE($8, p.price_currency),
                is_available = COALESCE($9, p.is_available),
                updated_at = NOW()
            WHERE p.id = $1 AND p.company_id = $2 AND NOT p.is_deleted
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product_id)
        .bind(company_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.category_id)
        .bind(&input.image_url)
        .bind(input.price)
        .bind(&currency)
        .bind(input.is_available)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(row.into())
    }

    /// Soft delete; existing order lines keep referencing the row
    pub async fn delete(&self, company_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE company_products
            SET is_deleted = true, is_available = false, updated_at = NOW()
            WHERE id = $1 AND company_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(product_id)
        .bind(company_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        tracing::info!(product_id = %product_id, "product deleted");
        Ok(())
    }

    pub async fn get(&self, company_id: Uuid, product_id: Uuid) -> AppResult<CompanyProduct> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM company_products p WHERE p.id = $1 AND p.company_id = $2 AND NOT p.is_deleted"
        ))
        .bind(product_id)
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// The acting company's own catalog
    pub async fn list(
        &self,
        company_id: Uuid,
        page: &PageQuery,
        filter: &ProductFilter,
    ) -> AppResult<PaginatedResponse<CompanyProduct>> {
        self.list_catalog(company_id, page, filter, false).await
    }

    /// A seller's catalog as buyers see it
    pub async fn public_catalog(
        &self,
        seller_id: Uuid,
        page: &PageQuery,
        filter: &ProductFilter,
    ) -> AppResult<PaginatedResponse<CompanyProduct>> {
        self.list_catalog(seller_id, page, filter, true).await
    }

    async fn list_catalog(
        &self,
        company_id: Uuid,
        page: &PageQuery,
        filter: &ProductFilter,
        orderable_only: bool,
    ) -> AppResult<PaginatedResponse<CompanyProduct>> {
        let pagination = page.pagination();
        let sort = page.sort_column(&PRODUCT_SORT_COLUMNS);
        let categories = match filter.category_id {
            Some(id) => Some(CategoryService::new(self.db.clone()).descendants(id).await?),
            None => None,
        };
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let condition = r#"
            p.company_id = $1
            AND NOT p.is_deleted
            AND (NOT $2 OR p.is_available)
            AND ($3::UUID[] IS NULL OR p.category_id = ANY($3))
            AND ($4::TEXT IS NULL OR p.name ILIKE $4 OR p.ean LIKE $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM company_products p WHERE {condition}"
        ))
        .bind(company_id)
        .bind(orderable_only)
        .bind(&categories)
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM company_products p
            WHERE {condition}
            ORDER BY {sort} {dir}, p.id
            LIMIT $5 OFFSET $6
            "#,
            dir = page.direction().as_sql()
        ))
        .bind(company_id)
        .bind(orderable_only)
        .bind(&categories)
        .bind(&pattern)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(Into::into).collect(),
            pagination,
            total.max(0) as u64,
        ))
    }

    async fn ensure_category(&self, category_id: Uuid) -> AppResult<()> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
                .bind(category_id)
                .fetch_one(&self.db)
                .await?;
        if !exists {
            return Err(AppError::NotFound("Category".to_string()));
        }
        Ok(())
    }
}

/// Non-deleted products of `company_id` with the given EANs
pub(crate) async fn catalog_by_eans<'e, E>(
    executor: E,
    company_id: Uuid,
    eans: &[String],
) -> AppResult<Vec<CompanyProduct>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        r#"
        SELECT {PRODUCT_COLUMNS} FROM company_products p
        WHERE p.company_id = $1 AND p.ean = ANY($2) AND NOT p.is_deleted
        "#
    ))
    .bind(company_id)
    .bind(eans)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}
