//! Configuration loading.
//!
//! A config file is read as TOML, `${VAR}` references are replaced from the
//! environment, the raw document is checked against a schema, and the typed
//! result gets `OBSIDIAN_*` environment overrides applied before a final
//! semantic validation.

use obsidian_types::{Field, FieldType, Schema, ValidationError};
use std::env;
use std::path::Path;
use thiserror::Error;

mod types;

pub use types::{
	Config, ContractsConfig, ExplorerConfig, NetworkConfig, OrderServerConfig, RelayerConfig,
	SolverConfig, WalletConfig,
};

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

impl From<ValidationError> for ConfigError {
	fn from(err: ValidationError) -> Self {
		ConfigError::ValidationError(err.to_string())
	}
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "OBSIDIAN_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		let config = self.parse(&content)?;
		tracing::debug!(path = %file_path, "Loaded configuration");
		Ok(config)
	}

	/// Runs the whole pipeline on in-memory TOML.
	pub fn parse(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted = self.substitute_env_vars(content)?;

		let document: toml::Value =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;
		document_schema().validate(&document)?;

		let mut config: Config = document
			.try_into()
			.map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config);
		validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		let re = regex::Regex::new(r"\$\{([^}]+)\}")
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut Config) {
		if let Ok(url) = env::var(format!("{}ORDER_SERVER_URL", self.env_prefix)) {
			config.order_server.url = url;
		}

		if let Ok(rpc_url) = env::var(format!("{}RPC_URL", self.env_prefix)) {
			config.network.rpc_url = rpc_url;
		}

		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.log_level = Some(log_level);
		}
	}
}

fn positive(name: &str, max: Option<i64>) -> Field {
	Field::new(
		name,
		FieldType::Integer {
			min: Some(1),
			max,
		},
	)
}

/// Shape of the raw config document. Every section is optional here;
/// required keys inside a present section are enforced.
fn document_schema() -> Schema {
	Schema::new(
		vec![],
		vec![
			Field::new("log_level", FieldType::String),
			Field::new(
				"network",
				FieldType::Table(Schema::new(
					vec![],
					vec![
						positive("chain_id", None),
						Field::new("name", FieldType::String),
						Field::new("rpc_url", FieldType::Url),
						positive("block_poll_interval_secs", Some(3600)),
					],
				)),
			),
			Field::new(
				"contracts",
				FieldType::Table(Schema::new(
					vec![],
					vec![
						Field::new("router", FieldType::Address),
						Field::new("pool", FieldType::Address),
						Field::new("sell_token", FieldType::Address),
						Field::new("buy_token", FieldType::Address),
						Field::new(
							"sell_token_decimals",
							FieldType::Integer {
								min: Some(0),
								max: Some(18),
							},
						),
						Field::new("swap_venue", FieldType::String).with_validator(|value| {
							match value.as_str() {
								Some(venue) if !venue.is_empty() => Ok(()),
								_ => Err("swap venue must not be empty".to_string()),
							}
						}),
					],
				)),
			),
			Field::new(
				"order_server",
				FieldType::Table(Schema::new(
					vec![],
					vec![
						Field::new("url", FieldType::Url),
						positive("timeout_secs", None),
						positive("heartbeat_secs", None),
					],
				)),
			),
			Field::new(
				"relayer",
				FieldType::Table(Schema::new(
					vec![Field::new("private_key", FieldType::PrivateKey)],
					vec![
						Field::new("rpc_url", FieldType::Url),
						positive("confirmation_timeout_secs", Some(3600)),
						Field::new(
							"poll_interval_ms",
							FieldType::Integer {
								min: Some(100),
								max: Some(60_000),
							},
						),
					],
				)),
			),
			Field::new(
				"wallet",
				FieldType::Table(Schema::new(
					vec![Field::new("private_key", FieldType::PrivateKey)],
					vec![positive("chain_id", None)],
				)),
			),
			Field::new(
				"solver",
				FieldType::Table(Schema::new(
					vec![],
					vec![Field::new("address", FieldType::Address)],
				)),
			),
			Field::new(
				"explorer",
				FieldType::Table(Schema::new(
					vec![],
					vec![Field::new("tx_url", FieldType::Url)],
				)),
			),
		],
	)
}

/// Checks that survive env overrides.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
	for (name, url) in [
		("order_server.url", &config.order_server.url),
		("network.rpc_url", &config.network.rpc_url),
	] {
		if !(url.starts_with("http://") || url.starts_with("https://")) {
			return Err(ConfigError::ValidationError(format!(
				"{} must start with http:// or https://",
				name
			)));
		}
	}

	if config.order_server.heartbeat_secs > config.order_server.timeout_secs {
		return Err(ConfigError::ValidationError(
			"order_server.heartbeat_secs must not exceed order_server.timeout_secs".to_string(),
		));
	}

	if config.contracts.sell_token == config.contracts.buy_token {
		return Err(ConfigError::ValidationError(
			"contracts.sell_token and contracts.buy_token must differ".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;
	use std::io::Write;
	use tempfile::NamedTempFile;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	// Each test uses its own prefix so parallel tests never see each
	// other's overrides.
	fn loader(prefix: &str) -> ConfigLoader {
		ConfigLoader::new().with_env_prefix(prefix)
	}

	#[test]
	fn test_empty_config_uses_base_defaults() {
		let config = loader("OBSIDIAN_TEST_DEFAULTS_").parse("").unwrap();
		assert_eq!(config.network.chain_id, 8453);
		assert_eq!(config.network.block_poll_interval_secs, 5);
		assert_eq!(
			config.contracts.router,
			address!("Ee395f9489bdC1b74A1BFc3B3164a5FEFb7146AE")
		);
		assert_eq!(config.order_server.url, "http://127.0.0.1:8069");
		assert_eq!(config.order_server.timeout_secs, 1800);
		assert_eq!(config.explorer.tx_url, "https://basescan.org/tx");
		assert!(config.relayer.is_none());

		let routing = config.routing();
		assert_eq!(routing.swap_venue, "uniswap");
		assert_eq!(
			routing.pool_address,
			address!("88a43bbdf9d098eec7bceda4e2494615dfd9bb9c")
		);
	}

	#[test]
	fn test_env_substitution() {
		env::set_var("OBSIDIAN_TEST_SUBST_KEY", KEY);
		let config = loader("OBSIDIAN_TEST_SUBST_")
			.parse("[relayer]\nprivate_key = \"${OBSIDIAN_TEST_SUBST_KEY}\"\n")
			.unwrap();
		assert_eq!(config.relayer.unwrap().private_key, KEY);
	}

	#[test]
	fn test_missing_env_var() {
		let err = loader("OBSIDIAN_TEST_MISSING_")
			.parse("[relayer]\nprivate_key = \"${OBSIDIAN_TEST_DEFINITELY_UNSET}\"\n")
			.unwrap_err();
		assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "OBSIDIAN_TEST_DEFINITELY_UNSET"));
	}

	#[test]
	fn test_env_overrides() {
		env::set_var("OBSIDIAN_TEST_OVR_ORDER_SERVER_URL", "http://solver.internal:9000");
		env::set_var("OBSIDIAN_TEST_OVR_LOG_LEVEL", "debug");
		let config = loader("OBSIDIAN_TEST_OVR_")
			.parse("[order_server]\nurl = \"http://localhost:1\"\n")
			.unwrap();
		assert_eq!(config.order_server.url, "http://solver.internal:9000");
		assert_eq!(config.log_level.as_deref(), Some("debug"));
	}

	#[test]
	fn test_override_is_validated() {
		env::set_var("OBSIDIAN_TEST_BADRPC_RPC_URL", "ws://localhost:8546");
		let err = loader("OBSIDIAN_TEST_BADRPC_").parse("").unwrap_err();
		assert!(matches!(err, ConfigError::ValidationError(_)));
	}

	#[test]
	fn test_schema_rejects_bad_relayer_key() {
		let err = loader("OBSIDIAN_TEST_BADKEY_")
			.parse("[relayer]\nprivate_key = \"0x1234\"\n")
			.unwrap_err();
		match err {
			ConfigError::ValidationError(message) => {
				assert!(message.contains("relayer.private_key"), "{}", message)
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[test]
	fn test_heartbeat_cannot_exceed_timeout() {
		let err = loader("OBSIDIAN_TEST_HB_")
			.parse("[order_server]\ntimeout_secs = 10\nheartbeat_secs = 30\n")
			.unwrap_err();
		assert!(matches!(err, ConfigError::ValidationError(_)));
	}

	#[test]
	fn test_relayer_table_inherits_network() {
		let config = loader("OBSIDIAN_TEST_TABLE_")
			.parse(&format!(
				"[network]\nrpc_url = \"http://localhost:8545\"\n[relayer]\nprivate_key = \"{}\"\n",
				KEY
			))
			.unwrap();
		let table = config.relayer_table().unwrap();
		assert_eq!(table["rpc_url"].as_str(), Some("http://localhost:8545"));
		assert_eq!(table["chain_id"].as_integer(), Some(8453));
		assert_eq!(table["confirmation_timeout_secs"].as_integer(), Some(120));
		assert!(config.wallet_table().is_none());
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[solver]\naddress = \"0x1111111111111111111111111111111111111111\"\n[wallet]\nprivate_key = \"{}\"\n",
			KEY
		)
		.unwrap();

		let config = loader("OBSIDIAN_TEST_FILE_")
			.with_file(file.path())
			.load()
			.await
			.unwrap();
		assert_eq!(
			config.solver.address,
			address!("1111111111111111111111111111111111111111")
		);
		assert_eq!(
			config.wallet_table().unwrap()["chain_id"].as_integer(),
			Some(8453)
		);
	}

	#[tokio::test]
	async fn test_missing_file() {
		let err = loader("OBSIDIAN_TEST_NOFILE_")
			.with_file("/nonexistent/obsidian.toml")
			.load()
			.await
			.unwrap_err();
		assert!(matches!(err, ConfigError::FileNotFound(_)));
	}
}
