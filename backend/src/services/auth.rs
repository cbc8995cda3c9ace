//! Authentication service for user registration, login, and token management

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{map_unique_violation, AppError, AppResult};
use shared::{validate_user_name, AuthTokens, CompanyRole, RegisterRequest, UserProfile};

/// Verification links stay valid this long
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub user_name: String,
    pub exp: i64,
    pub iat: i64,
}

/// Result of a registration; the token is mailed, never returned to the client
#[derive(Debug)]
pub struct Registration {
    pub profile: UserProfile,
    pub verification_token: String,
}

/// What a verification token confirms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Email,
    Company,
}

impl TokenPurpose {
    fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Email => "email",
            TokenPurpose::Company => "company",
        }
    }
}

/// User info from database
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    user_name: String,
    password_hash: String,
    email_verified: bool,
    company_id: Option<Uuid>,
    company_role: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        UserProfile {
            id: row.id,
            email: row.email,
            user_name: row.user_name,
            email_verified: row.email_verified,
            company_id: row.company_id,
            company_role: row.company_role.as_deref().and_then(CompanyRole::parse),
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, user_name, password_hash, email_verified, company_id, company_role, created_at";

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.jwt.secret.clone(),
            access_token_expiry: config.jwt.access_token_expiry,
            refresh_token_expiry: config.jwt.refresh_token_expiry,
        }
    }

    /// Register a new, unverified user account
    pub async fn register(&self, input: RegisterRequest) -> AppResult<Registration> {
        input.validate()?;
        validate_user_name(&input.user_name)
            .map_err(|msg| AppError::validation("user_name", msg))?;
        let email = input.email.trim().to_lowercase();

        let taken = sqlx::query_as::<_, (bool, bool)>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM users WHERE email = $1),
                EXISTS (SELECT 1 FROM users WHERE user_name = $2)
            "#,
        )
        .bind(&email)
        .bind(&input.user_name)
        .fetch_one(&self.db)
        .await?;

        match taken {
            (true, _) => return Err(AppError::DuplicateEntry("email".to_string())),
            (_, true) => return Err(AppError::DuplicateEntry("user_name".to_string())),
            _ => {}
        }

        // Hash password
        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, user_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&email)
        .bind(&input.user_name)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;

        let verification_token =
            issue_verification_token(&mut tx, TokenPurpose::Email, Some(user.id), None).await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "user registered");

        Ok(Registration {
            profile: user.into(),
            verification_token,
        })
    }

    /// Mark the account behind a verification token as verified
    pub async fn verify_email(&self, token: &str) -> AppResult<UserProfile> {
        let mut tx = self.db.begin().await?;

        let (user_id, _) = consume_verification_token(&mut tx, TokenPurpose::Email, token).await?;
        let user_id = user_id.ok_or_else(|| AppError::validation("token", "Invalid token"))?;

        let user = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET email_verified = true WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, "email verified");
        Ok(user.into())
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthTokens> {
        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        // Verify password
        let valid = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        if !user.email_verified {
            return Err(AppError::EmailNotVerified);
        }

        let tokens = self.generate_tokens(user.id, &user.user_name)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(tokens)
    }

    /// Rotate a refresh token into a new token pair
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = hash_token(refresh_token);

        let mut tx = self.db.begin().await?;

        // Revoke the presented token; a second use finds nothing
        let (user_id, user_name) = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM users u
            WHERE rt.token_hash = $1
              AND rt.user_id = u.id
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
            RETURNING u.id, u.user_name
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        let tokens = self.generate_tokens(user_id, &user_name)?;
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(hash_token(&tokens.refresh_token))
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(tokens)
    }

    /// Profile of the signed-in user
    pub async fn me(&self, user_id: Uuid) -> AppResult<UserProfile> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, user_id: Uuid, user_name: &str) -> AppResult<AuthTokens> {
        let access_token = encode_access_token(
            user_id,
            user_name,
            &self.jwt_secret,
            self.access_token_expiry,
        )?;

        // Refresh token (simple random token)
        let refresh_token = Uuid::new_v4().to_string();

        Ok(AuthTokens {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let expires_at = Utc::now() + Duration::seconds(self.refresh_token_expiry);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(hash_token(token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

/// Sign an HS256 access token
pub fn encode_access_token(
    user_id: Uuid,
    user_name: &str,
    secret: &str,
    expiry_seconds: i64,
) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        user_name: user_name.to_string(),
        exp: (now + Duration::seconds(expiry_seconds)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate an access token and return its claims
pub fn decode_access_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Create a single-use verification token; only its hash is stored
pub async fn issue_verification_token(
    tx: &mut Transaction<'_, Postgres>,
    purpose: TokenPurpose,
    user_id: Option<Uuid>,
    company_id: Option<Uuid>,
) -> AppResult<String> {
    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS);

    sqlx::query(
        r#"
        INSERT INTO verification_tokens (token_hash, purpose, user_id, company_id, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(hash_token(&token))
    .bind(purpose.as_str())
    .bind(user_id)
    .bind(company_id)
    .bind(expires_at)
    .execute(&mut **tx)
    .await?;

    Ok(token)
}

/// Consume a verification token, returning the user and company it names.
///
/// Unknown, expired and already used tokens are all BadRequest.
pub async fn consume_verification_token(
    tx: &mut Transaction<'_, Postgres>,
    purpose: TokenPurpose,
    token: &str,
) -> AppResult<(Option<Uuid>, Option<Uuid>)> {
    let row = sqlx::query_as::<_, (Option<Uuid>, Option<Uuid>, DateTime<Utc>)>(
        r#"
        DELETE FROM verification_tokens
        WHERE token_hash = $1 AND purpose = $2
        RETURNING user_id, company_id, expires_at
        "#,
    )
    .bind(hash_token(token.trim()))
    .bind(purpose.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some((user_id, company_id, expires_at)) if expires_at > Utc::now() => {
            Ok((user_id, company_id))
        }
        Some(_) => Err(AppError::validation("token", "Verification token has expired")),
        None => Err(AppError::validation("token", "Invalid verification token")),
    }
}
