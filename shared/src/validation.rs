//! Validation utilities for the Tradeflow platform

use rust_decimal::Decimal;

/// Length of a company tax identifier
pub const TAX_ID_LENGTH: usize = 10;

// ============================================================================
// Company & Catalog Validations
// ============================================================================

/// Validate a company tax identifier (fixed-length numeric string)
pub fn validate_tax_id(tax_id: &str) -> Result<(), &'static str> {
    if tax_id.len() != TAX_ID_LENGTH {
        return Err("Tax ID must be exactly 10 digits");
    }
    if !tax_id.chars().all(|c| c.is_ascii_digit()) {
        return Err("Tax ID must contain digits only");
    }
    Ok(())
}

/// Validate an EAN code (EAN-8 or EAN-13, digits only)
///
/// The check digit is not verified: catalogs imported from suppliers carry
/// internal codes in the EAN field.
pub fn validate_ean(ean: &str) -> Result<(), &'static str> {
    if ean.len() != 8 && ean.len() != 13 {
        return Err("EAN must be 8 or 13 digits");
    }
    if !ean.chars().all(|c| c.is_ascii_digit()) {
        return Err("EAN must contain digits only");
    }
    Ok(())
}

/// Validate an ISO 4217 currency code (three uppercase letters)
pub fn validate_currency_code(code: &str) -> Result<(), &'static str> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err("Currency code must be three uppercase letters")
    }
}

/// Validate a unit price
pub fn validate_price(price: Decimal) -> Result<(), &'static str> {
    if price < Decimal::ZERO {
        return Err("Price cannot be negative");
    }
    Ok(())
}

/// Validate an ordered quantity (positive integer)
pub fn validate_order_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be a positive integer");
    }
    Ok(())
}

// ============================================================================
// Account Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') =>
        {
            Ok(())
        }
        _ => Err("Invalid email format"),
    }
}

/// Validate a user name (3-32 characters, alphanumeric or underscore)
pub fn validate_user_name(name: &str) -> Result<(), &'static str> {
    if name.len() < 3 {
        return Err("User name must be at least 3 characters");
    }
    if name.len() > 32 {
        return Err("User name must be at most 32 characters");
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("User name may contain letters, digits and underscores only");
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_tax_id() {
        assert!(validate_tax_id("5260250995").is_ok());
        assert!(validate_tax_id("526025099").is_err());
        assert!(validate_tax_id("52602509951").is_err());
        assert!(validate_tax_id("52602A0995").is_err());
    }

    #[test]
    fn test_ean_without_checksum() {
        assert!(validate_ean("5099206027295").is_ok());
        assert!(validate_ean("96385074").is_ok());
        assert!(validate_ean("509920602729").is_err());
        assert!(validate_ean("50992060272AB").is_err());
    }

    #[test]
    fn test_currency_code() {
        assert!(validate_currency_code("PLN").is_ok());
        assert!(validate_currency_code("pln").is_err());
        assert!(validate_currency_code("EURO").is_err());
    }

    #[test]
    fn test_price_and_quantity() {
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::from_str("-0.01").unwrap()).is_err());
        assert!(validate_order_quantity(1).is_ok());
        assert!(validate_order_quantity(0).is_err());
        assert!(validate_order_quantity(-5).is_err());
    }

    #[test]
    fn test_account_fields() {
        assert!(validate_email("jan@acme.pl").is_ok());
        assert!(validate_email("jan@acme").is_err());
        assert!(validate_email("@acme.pl").is_err());
        assert!(validate_user_name("jan_kowalski").is_ok());
        assert!(validate_user_name("jk").is_err());
        assert!(validate_user_name("jan kowalski").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("1234567").is_err());
    }
}
