//! Schema validation for implementation config tables.
//!
//! Each pluggable implementation (wallet, relayer transport, order gateway)
//! declares the TOML table it expects as a [`Schema`]. Tables are checked
//! before the implementation is constructed so a typo in a private key or an
//! address surfaces at startup rather than halfway through an order.

use alloy::primitives::Address;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// A `0x`-prefixed 20-byte hex address.
	Address,
	/// An `http://` or `https://` URL.
	Url,
	/// A 32-byte hex private key, `0x` prefix optional.
	PrivateKey,
	Table(Schema),
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			Self::String => "string",
			Self::Integer { .. } => "integer",
			Self::Boolean => "boolean",
			Self::Address => "address",
			Self::Url => "url",
			Self::PrivateKey => "private key",
			Self::Table(_) => "table",
		}
	}
}

/// Extra check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Required and optional fields of a config table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// Unknown keys are allowed so that one table can feed several
	/// implementations.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			check_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	validate_field_type(&field.name, value, &field.field_type)?;

	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}

	Ok(())
}

fn mismatch(field_name: &str, expected: &FieldType, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.name().to_string(),
		actual: value.type_str().to_string(),
	}
}

fn invalid(field_name: &str, message: impl Into<String>) -> ValidationError {
	ValidationError::InvalidValue {
		field: field_name.to_string(),
		message: message.into(),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch(field_name, expected_type, value));
			}
		}
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(field_name, expected_type, value));
			}
		}
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, expected_type, value))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(invalid(
						field_name,
						format!("Value {} is less than minimum {}", int_val, min_val),
					));
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(invalid(
						field_name,
						format!("Value {} is greater than maximum {}", int_val, max_val),
					));
				}
			}
		}
		FieldType::Address => {
			let text = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, expected_type, value))?;
			if text.len() != 42 || !text.starts_with("0x") {
				return Err(invalid(field_name, "must be a 0x-prefixed 20-byte address"));
			}
			text.parse::<Address>()
				.map_err(|e| invalid(field_name, format!("invalid address: {}", e)))?;
		}
		FieldType::Url => {
			let text = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, expected_type, value))?;
			if !(text.starts_with("http://") || text.starts_with("https://")) {
				return Err(invalid(field_name, "URL must start with http:// or https://"));
			}
		}
		FieldType::PrivateKey => {
			let text = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, expected_type, value))?;
			let key = text.strip_prefix("0x").unwrap_or(text);
			if key.len() != 64 {
				return Err(invalid(
					field_name,
					"Private key must be 64 hex characters (32 bytes)",
				));
			}
			if hex::decode(key).is_err() {
				return Err(invalid(field_name, "Private key must be valid hexadecimal"));
			}
		}
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| match e {
				ValidationError::MissingField(f) => {
					ValidationError::MissingField(format!("{}.{}", field_name, f))
				}
				ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
					field: format!("{}.{}", field_name, field),
					message,
				},
				ValidationError::TypeMismatch {
					field,
					expected,
					actual,
				} => ValidationError::TypeMismatch {
					field: format!("{}.{}", field_name, field),
					expected,
					actual,
				},
			})?;
		}
	}

	Ok(())
}

/// A config table validator attached to an implementation.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn relayer_schema() -> Schema {
		Schema::new(
			vec![
				Field::new("rpc_url", FieldType::Url),
				Field::new("private_key", FieldType::PrivateKey),
			],
			vec![
				Field::new(
					"confirmation_timeout_secs",
					FieldType::Integer {
						min: Some(1),
						max: Some(3600),
					},
				),
				Field::new("router", FieldType::Address),
			],
		)
	}

	fn parse(text: &str) -> toml::Value {
		toml::from_str(text).unwrap()
	}

	#[test]
	fn test_valid_table() {
		let config = parse(&format!(
			r#"
rpc_url = "https://mainnet.base.org"
private_key = "0x{}"
confirmation_timeout_secs = 120
router = "0xEe395f9489bdC1b74A1BFc3B3164a5FEFb7146AE"
"#,
			"11".repeat(32)
		));
		assert_eq!(relayer_schema().validate(&config), Ok(()));
	}

	#[test]
	fn test_missing_required_field() {
		let config = parse(r#"rpc_url = "http://localhost:8545""#);
		assert_eq!(
			relayer_schema().validate(&config),
			Err(ValidationError::MissingField("private_key".to_string()))
		);
	}

	#[test]
	fn test_bad_private_key() {
		let config = parse(
			r#"
rpc_url = "http://localhost:8545"
private_key = "0x1234"
"#,
		);
		assert!(matches!(
			relayer_schema().validate(&config),
			Err(ValidationError::InvalidValue { field, .. }) if field == "private_key"
		));
	}

	#[test]
	fn test_bad_url_scheme() {
		let config = parse(&format!(
			r#"
rpc_url = "ws://localhost:8545"
private_key = "{}"
"#,
			"22".repeat(32)
		));
		assert!(matches!(
			relayer_schema().validate(&config),
			Err(ValidationError::InvalidValue { field, .. }) if field == "rpc_url"
		));
	}

	#[test]
	fn test_optional_integer_bounds() {
		let config = parse(&format!(
			r#"
rpc_url = "http://localhost:8545"
private_key = "{}"
confirmation_timeout_secs = 0
"#,
			"33".repeat(32)
		));
		assert!(matches!(
			relayer_schema().validate(&config),
			Err(ValidationError::InvalidValue { field, .. }) if field == "confirmation_timeout_secs"
		));
	}

	#[test]
	fn test_malformed_address() {
		let config = parse(&format!(
			r#"
rpc_url = "http://localhost:8545"
private_key = "{}"
router = "0x1234"
"#,
			"44".repeat(32)
		));
		assert!(matches!(
			relayer_schema().validate(&config),
			Err(ValidationError::InvalidValue { field, .. }) if field == "router"
		));
	}

	#[test]
	fn test_nested_table_prefixes_field() {
		let schema = Schema::new(
			vec![Field::new(
				"relayer",
				FieldType::Table(Schema::new(
					vec![Field::new("rpc_url", FieldType::Url)],
					vec![],
				)),
			)],
			vec![],
		);
		let config = parse("[relayer]\nrpc_url = 5\n");
		assert_eq!(
			schema.validate(&config),
			Err(ValidationError::TypeMismatch {
				field: "relayer.rpc_url".to_string(),
				expected: "url".to_string(),
				actual: "integer".to_string(),
			})
		);
	}
}
