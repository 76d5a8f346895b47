use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("identity fields are missing")]
    FieldsMissing,
    #[error("identity field is empty")]
    FieldEmpty,
}

/// SHA-256 over the fields joined with `|`, standard base64 encoded.
pub fn identity_hash(fields: &[String]) -> Result<String, HashError> {
    if fields.is_empty() {
        return Err(HashError::FieldsMissing);
    }
    if fields.iter().any(String::is_empty) {
        return Err(HashError::FieldEmpty);
    }
    let mut hasher = Sha256::new();
    hasher.update(fields.join("|").as_bytes());
    Ok(STANDARD.encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn known_digests() {
        assert_eq!(
            identity_hash(&fields(&["test", "0"])).as_deref(),
            Ok("GRp47M02cMlAzSn7oJTQ2LC9eb1Qd6mIPO1U8GeuoYg=")
        );
        assert_eq!(
            identity_hash(&fields(&["test", "1"])).as_deref(),
            Ok("+cywqM0rcj9REPt87Vfx2U+j9m57cB0XW2kmNZm5Ao8=")
        );
        assert_eq!(
            identity_hash(&fields(&["test", "2"])).as_deref(),
            Ok("dCPMoOxFVMbPvMkXMbyKeff8QmdBPu8hr/BVeHJhz78=")
        );
    }

    #[test]
    fn identical_fields_hash_identically() {
        let a = identity_hash(&fields(&["user", "device", "2024-01-01T00:00:00.000Z", "cbg"]));
        let b = identity_hash(&fields(&["user", "device", "2024-01-01T00:00:00.000Z", "cbg"]));
        assert_eq!(a, b);
        let c = identity_hash(&fields(&["device", "user", "2024-01-01T00:00:00.000Z", "cbg"]));
        assert_ne!(a, c);
    }

    #[test]
    fn missing_or_empty_fields_fail() {
        assert_eq!(identity_hash(&[]), Err(HashError::FieldsMissing));
        assert_eq!(identity_hash(&fields(&["test", ""])), Err(HashError::FieldEmpty));
        assert_eq!(HashError::FieldsMissing.to_string(), "identity fields are missing");
        assert_eq!(HashError::FieldEmpty.to_string(), "identity field is empty");
    }
}
