//! Service layer: business rules on top of the store traits.
//!
//! Every service takes the authenticated [`crate::domain::Caller`] as an
//! explicit argument, resolves the entities it needs, checks the rules in
//! a fixed order, and hands one fully validated mutation to the store.

pub mod interaction_service;
pub mod kermesse_service;
pub mod stand_service;
pub mod tombola_service;
pub mod user_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use interaction_service::InteractionService;
pub use kermesse_service::KermesseService;
pub use stand_service::StandService;
pub use tombola_service::TombolaService;
pub use user_service::UserService;

use crate::error::ApiError;

/// Rejects negative prices, stock levels and grades.
pub(crate) fn non_negative(field: &str, value: i64) -> Result<i64, ApiError> {
    if value < 0 {
        return Err(ApiError::BadRequest(format!("{field} must not be negative")));
    }
    Ok(value)
}

/// Rejects blank text fields and returns the trimmed value.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validators_reject_bad_input() {
        assert!(matches!(non_negative("price", -1), Err(ApiError::BadRequest(_))));
        assert!(matches!(non_negative("price", 0), Ok(0)));
        assert!(matches!(required_text("name", "   "), Err(ApiError::BadRequest(_))));
        assert!(matches!(required_text("name", " Kim "), Ok(name) if name == "Kim"));
    }
}
