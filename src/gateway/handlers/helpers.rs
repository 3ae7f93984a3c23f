//! Handler helper functions

use crate::core_types::TransactionRef;

use super::super::types::ApiError;

/// Parse a transaction reference from a path segment
pub fn parse_reference(raw: &str) -> Result<TransactionRef, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid transaction reference"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let reference = TransactionRef::new();
        assert_eq!(parse_reference(&reference.to_string()).unwrap(), reference);
        assert!(parse_reference("not-a-ulid").is_err());
    }
}
