//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error objects. The error code is the
//! same status code a stub reply would carry.

use jsonrpsee::types::ErrorObjectOwned;
use dhfwk_core::error::AppError;

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(err.code(), err.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhfwk_core::error::code;

    #[test]
    fn test_codes_carry_over() {
        let obj = to_rpc_error(AppError::NotFound("engine 3".into()));
        assert_eq!(obj.code(), code::NOT_FOUND);
        assert!(obj.message().contains("engine 3"));

        let obj = to_rpc_error(AppError::Validation("bad".into()));
        assert_eq!(obj.code(), code::INVALID_ARGUMENT);
    }
}
