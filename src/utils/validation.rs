use validator::{Validate, ValidationError};

use crate::errors::AppError;

pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(AppError::from)
}

pub fn validate_gender(gender: &str) -> Result<(), ValidationError> {
    if !matches!(gender, "male" | "female" | "other") {
        return Err(ValidationError::new("gender must be 'male', 'female' or 'other'"));
    }
    Ok(())
}

pub fn validate_ifsc(ifsc: &str) -> Result<(), ValidationError> {
    // 4 letters, a zero, 6 alphanumerics
    let bytes = ifsc.as_bytes();
    let valid = bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'0'
        && bytes[5..].iter().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if !valid {
        return Err(ValidationError::new("invalid IFSC code"));
    }
    Ok(())
}

pub fn validate_pan(pan: &str) -> Result<(), ValidationError> {
    // 5 letters, 4 digits, 1 letter
    let bytes = pan.as_bytes();
    let valid = bytes.len() == 10
        && bytes[..5].iter().all(u8::is_ascii_uppercase)
        && bytes[5..9].iter().all(u8::is_ascii_digit)
        && bytes[9].is_ascii_uppercase();
    if !valid {
        return Err(ValidationError::new("invalid PAN"));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.len() < 10 || digits.len() > 15 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::new("phone must be 10-15 digits"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ifsc_format() {
        assert!(validate_ifsc("HDFC0001234").is_ok());
        assert!(validate_ifsc("HDFC1001234").is_err());
        assert!(validate_ifsc("hdfc0001234").is_err());
        assert!(validate_ifsc("HDFC000123").is_err());
    }

    #[test]
    fn pan_format() {
        assert!(validate_pan("ABCDE1234F").is_ok());
        assert!(validate_pan("ABCD12345F").is_err());
        assert!(validate_pan("ABCDE1234").is_err());
    }

    #[test]
    fn phone_and_gender() {
        assert!(validate_phone("+919876543210").is_ok());
        assert!(validate_phone("98765").is_err());
        assert!(validate_phone("98765-43210").is_err());
        assert!(validate_gender("other").is_ok());
        assert!(validate_gender("unknown").is_err());
    }
}
