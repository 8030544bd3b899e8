use uuid::Uuid;

use crate::errors::AppError;

/// Parses a public identifier. Malformed input is reported exactly like an
/// unknown identifier so callers cannot probe for existence.
pub fn valid_uuid(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id.trim())
        .ok()
        .filter(|uuid| !uuid.is_nil())
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_and_nil_ids_are_not_found() {
        assert!(matches!(valid_uuid("not-a-uuid"), Err(AppError::NotFound(_))));
        assert!(matches!(valid_uuid(&Uuid::nil().to_string()), Err(AppError::NotFound(_))));

        let id = Uuid::new_v4();
        assert_eq!(valid_uuid(&id.to_string()).unwrap(), id);
    }
}
