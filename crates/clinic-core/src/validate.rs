//! Input validation shared by every surface.

use crate::{Error, Result};

/// Mainland mobile numbers: 11 digits, a leading `1`, then `3`–`9`.
pub fn phone(phone: &str) -> Result<()> {
  let bytes = phone.as_bytes();
  let well_formed = bytes.len() == 11
    && bytes.iter().all(u8::is_ascii_digit)
    && bytes[0] == b'1'
    && (b'3'..=b'9').contains(&bytes[1]);
  if well_formed {
    Ok(())
  } else {
    Err(Error::Validation(format!("malformed phone number: {phone:?}")))
  }
}

/// Names must be non-blank; surrounding whitespace is dropped.
pub fn name(name: &str) -> Result<String> {
  let trimmed = name.trim();
  if trimmed.is_empty() {
    return Err(Error::Validation("name is required".into()));
  }
  Ok(trimmed.to_owned())
}

pub fn tag(tag: &str) -> Result<String> {
  let trimmed = tag.trim();
  if trimmed.is_empty() {
    return Err(Error::Validation("tag is required".into()));
  }
  if trimmed.contains(',') {
    return Err(Error::Validation(format!("tag may not contain a comma: {trimmed:?}")));
  }
  Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn phone_numbers() {
    assert!(phone("13800000001").is_ok());
    assert!(phone("19912345678").is_ok());
    assert!(phone("12800000001").is_err());
    assert!(phone("1380000000").is_err());
    assert!(phone("1380000000a").is_err());
    assert!(phone("").is_err());
  }

  #[test]
  fn names_are_trimmed() {
    assert_eq!(name("  Zhang ").unwrap(), "Zhang");
    assert!(matches!(name(""), Err(Error::Validation(_))));
  }
}
