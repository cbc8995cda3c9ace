//! Company service: registration, verification, membership and cleanup

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::auth::{consume_verification_token, issue_verification_token, TokenPurpose};
use shared::{
    validate_tax_id, Company, CompanyMember, CompanyRole, CreateCompanyRequest, PageQuery,
    PaginatedResponse, UpdateCompanyRequest,
};

/// Company service
#[derive(Clone)]
pub struct CompanyService {
    db: PgPool,
}

/// A newly created company and the token confirming it
#[derive(Debug)]
pub struct CompanyRegistration {
    pub company: Company,
    pub verification_token: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CompanyRow {
    pub id: Uuid,
    pub name: String,
    pub tax_id: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            name: row.name,
            tax_id: row.tax_id,
            street: row.street,
            city: row.city,
            postal_code: row.postal_code,
            country: row.country,
            is_verified: row.is_verified,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    user_name: String,
    email: String,
    company_role: String,
}

const COMPANY_COLUMNS: &str =
    "id, name, tax_id, street, city, postal_code, country, is_verified, created_at";

impl CompanyService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a company with the acting user as its owner
    pub async fn create(
        &self,
        user: &AuthUser,
        input: CreateCompanyRequest,
    ) -> AppResult<CompanyRegistration> {
        input.validate()?;
        let tax_id = input.tax_id.trim().to_string();
        validate_tax_id(&tax_id).map_err(|msg| AppError::validation("tax_id", msg))?;

        let mut tx = self.db.begin().await?;

        let current_company = sqlx::query_scalar::<_, Option<Uuid>>(
            "SELECT company_id FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if current_company.is_some() {
            return Err(AppError::conflict(
                "company",
                "User already belongs to a company",
            ));
        }

        let company = sqlx::query_as::<_, CompanyRow>(&format!(
            r#"
            INSERT INTO companies (name, tax_id, street, city, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COMPANY_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(&tax_id)
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.postal_code)
        .bind(&input.country)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "tax_id"))?;

        sqlx::query("UPDATE users SET company_id = $1, company_role = $2 WHERE id = $3")
            .bind(company.id)
            .bind(CompanyRole::Owner.as_str())
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;

        let verification_token =
            issue_verification_token(&mut tx, TokenPurpose::Company, Some(user.user_id), Some(company.id))
                .await?;

        tx.commit().await?;

        tracing::info!(company_id = %company.id, owner = %user.user_id, "company created");

        Ok(CompanyRegistration {
            company: company.into(),
            verification_token,
        })
    }

    /// Mark the company behind a verification token as verified
    pub async fn verify(&self, token: &str) -> AppResult<Company> {
        let mut tx = self.db.begin().await?;

        let (_, company_id) = consume_verification_token(&mut tx, TokenPurpose::Company, token).await?;
        let company_id = company_id.ok_or_else(|| AppError::validation("token", "Invalid token"))?;

        let company = sqlx::query_as::<_, CompanyRow>(&format!(
            "UPDATE companies SET is_verified = true WHERE id = $1 RETURNING {COMPANY_COLUMNS}"
        ))
        .bind(company_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Company".to_string()))?;

        tx.commit().await?;

        tracing::info!(company_id = %company.id, "company verified");
        Ok(company.into())
    }

    pub async fn get(&self, company_id: Uuid) -> AppResult<Company> {
        sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(company_id)
        .fetch_optional(&self.db)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::NotFound("Company".to_string()))
    }

    pub async fn get_by_tax_id(&self, tax_id: &str) -> AppResult<Company> {
        sqlx::query_as::<_, CompanyRow>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE tax_id = $1"
        ))
        .bind(tax_id.trim())
        .fetch_optional(&self.db)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::NotFound(format!("Company with tax ID {}", tax_id.trim())))
    }

    pub async fn update(&self, company_id: Uuid, input: UpdateCompanyRequest) -> AppResult<Company> {
        input.validate()?;

        sqlx::query_as::<_, CompanyRow>(&format!(
            r#"
            UPDATE companies SET
                name = COALESCE($2, name),
                street = COALESCE($3, street),
                city = COALESCE($4, city),
                postal_code = COALESCE($5, postal_code),
                country = COALESCE($6, country)
            WHERE id = $1
            RETURNING {COMPANY_COLUMNS}
            "#
        ))
        .bind(company_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.postal_code)
        .bind(&input.country)
        .fetch_optional(&self.db)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::NotFound("Company".to_string()))
    }

    /// Verified companies, optionally filtered by name
    pub async fn list(
        &self,
        page: &PageQuery,
        search: Option<&str>,
    ) -> AppResult<PaginatedResponse<Company>> {
        let pagination = page.pagination();
        let sort = page.sort_column(&[("name", "name"), ("created_at", "created_at")]);
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM companies WHERE is_verified AND ($1::TEXT IS NULL OR name ILIKE $1)",
        )
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, CompanyRow>(&format!(
            r#"
            SELECT {COMPANY_COLUMNS} FROM companies
            WHERE is_verified AND ($1::TEXT IS NULL OR name ILIKE $1)
            ORDER BY {} {}, id
            LIMIT $2 OFFSET $3
            "#,
            sort,
            page.direction().as_sql()
        ))
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

    pub async fn list_members(&self, company_id: Uuid) -> AppResult<Vec<CompanyMember>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, user_name, email, company_role
            FROM users
            WHERE company_id = $1
            ORDER BY company_role DESC, user_name
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CompanyMember {
                user_id: r.id,
                user_name: r.user_name,
                email: r.email,
                role: CompanyRole::parse(&r.company_role).unwrap_or(CompanyRole::Member),
            })
            .collect())
    }

    /// Add an existing verified user without a company as a member
    pub async fn add_member(&self, company_id: Uuid, email: &str) -> AppResult<CompanyMember> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, (Uuid, String, String, bool, Option<Uuid>)>(
            "SELECT id, user_name, email, email_verified, company_id FROM users WHERE email = $1 FOR UPDATE",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with email {}", email.trim())))?;

        let (user_id, user_name, email, email_verified, current_company) = row;
        if !email_verified {
            return Err(AppError::validation(
                "email",
                "User has not verified their email address",
            ));
        }
        if current_company.is_some() {
            return Err(AppError::conflict(
                "company",
                "User already belongs to a company",
            ));
        }

        sqlx::query("UPDATE users SET company_id = $1, company_role = $2 WHERE id = $3")
            .bind(company_id)
            .bind(CompanyRole::Member.as_str())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(company_id = %company_id, user_id = %user_id, "member added");

        Ok(CompanyMember {
            user_id,
            user_name,
            email,
            role: CompanyRole::Member,
        })
    }

    /// Owner removes another member
    pub async fn remove_member(&self, owner: &AuthUser, member_id: Uuid) -> AppResult<()> {
        let company_id = owner.require_owner()?;
        if member_id == owner.user_id {
            return Err(AppError::validation(
                "user_id",
                "The owner cannot remove themselves",
            ));
        }

        let result = sqlx::query(
            "UPDATE users SET company_id = NULL, company_role = NULL WHERE id = $1 AND company_id = $2",
        )
        .bind(member_id)
        .bind(company_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Member".to_string()));
        }

        tracing::info!(company_id = %company_id, user_id = %member_id, "member removed");
        Ok(())
    }

    /// A member leaves their company; the owner cannot
    pub async fn leave(&self, user: &AuthUser) -> AppResult<()> {
        let company_id = user.require_company()?;
        if user.role == Some(CompanyRole::Owner) {
            return Err(AppError::conflict(
                "company",
                "The owner cannot leave the company",
            ));
        }

        sqlx::query(
            "UPDATE users SET company_id = NULL, company_role = NULL WHERE id = $1 AND company_id = $2",
        )
        .bind(user.user_id)
        .bind(company_id)
        .execute(&self.db)
        .await?;

        tracing::info!(company_id = %company_id, user_id = %user.user_id, "member left");
        Ok(())
    }

    /// Delete companies left unverified past `ttl` that never took part in an order.
    ///
    /// Their users lose membership; catalogs go with the company.
    pub async fn purge_expired_unverified(&self, ttl: Duration) -> AppResult<u64> {
        let cutoff = Utc::now() - ttl;
        let mut tx = self.db.begin().await?;

        let expired = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT c.id FROM companies c
            WHERE NOT c.is_verified
              AND c.created_at < $1
              AND NOT EXISTS (
                  SELECT 1 FROM orders o WHERE o.seller_id = c.id OR o.buyer_id = c.id
              )
            FOR UPDATE
            "#,
        )
        .bind(cutoff)
        .fetch_all(&mut *tx)
        .await?;

        if expired.is_empty() {
            return Ok(0);
        }

        sqlx::query(
            "UPDATE users SET company_id = NULL, company_role = NULL WHERE company_id = ANY($1)",
        )
        .bind(&expired)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM companies WHERE id = ANY($1)")
            .bind(&expired)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }
}
