//! Tests for the file-backed config store.

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use venuekit::config::{Config, ConfigStore, TomlConfigStore};
use venuekit::error::{ConfigError, Error};
use venuekit::exchange::Exchange;
use venuekit::market::MarketDataCache;
use venuekit::testkit::exchange::MockExchange;

const CONFIG: &str = r#"
[logging]
level = "debug"
format = "json"

[[exchanges]]
name = "Mock"
enabled = true
available_pairs = "BTC_USD,ETH_USD"
enabled_pairs = "BTC_USD"

[exchanges.api]
authenticated_support = true

[exchanges.api.endpoints]
url = "NON_DEFAULT_HTTP_LINK_TO_CONFIG_EXAMPLE"
url_secondary = "NON_DEFAULT_HTTP_LINK_TO_CONFIG_EXAMPLE"

[exchanges.api.credentials]
key = "file-key"
secret = "file-secret"
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_logging_and_exchanges() {
    let file = write_config(CONFIG);
    let store = TomlConfigStore::load(file.path()).unwrap();

    assert_eq!(store.logging().level, "debug");
    assert_eq!(store.logging().format, "json");
    assert_eq!(store.exchange_names(), vec!["Mock"]);

    let mock = store.exchange_config("mock").unwrap();
    assert!(mock.enabled);
    assert_eq!(mock.enabled_pairs, "BTC_USD");
}

#[test]
fn missing_file_is_a_read_error() {
    let result = TomlConfigStore::load("/nonexistent/venuekit.toml");
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::ReadFile(_)))
    ));
}

#[test]
fn unknown_exchange_is_not_found() {
    let file = write_config(CONFIG);
    let store = TomlConfigStore::load(file.path()).unwrap();
    assert!(matches!(
        store.exchange_config("Bitstamp"),
        Err(Error::Config(ConfigError::ExchangeNotFound(_)))
    ));
}

#[test]
fn updates_are_written_to_the_file() {
    let file = write_config(CONFIG);
    let store = TomlConfigStore::load(file.path()).unwrap();

    let mut mock = store.exchange_config("Mock").unwrap();
    mock.available_pairs = "BTC_USD,LTC_USD".into();
    mock.pairs_last_updated = 1_700_000_000;
    store.update_exchange_config(mock).unwrap();

    let reread = Config::parse_toml(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    let mock = &reread.exchanges[0];
    assert_eq!(mock.available_pairs, "BTC_USD,LTC_USD");
    assert_eq!(mock.pairs_last_updated, 1_700_000_000);
    assert_eq!(mock.api.credentials.key, "file-key");
}

#[tokio::test]
async fn setup_write_backs_reach_the_file() {
    let file = write_config(CONFIG);
    let store: Arc<dyn ConfigStore> = Arc::new(TomlConfigStore::load(file.path()).unwrap());
    let exchange = MockExchange::new(Arc::new(MarketDataCache::new()), Arc::clone(&store));

    let config = store.exchange_config("Mock").unwrap();
    exchange.setup(&config).await.unwrap();

    let reread = Config::parse_toml(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    let mock = &reread.exchanges[0];
    assert!(mock.config_pair_format.is_some());
    assert!(mock.features.is_some());
    assert_eq!(mock.asset_types, "Spot");
    assert!(exchange.profile().authenticated_api_support());
}

#[test]
fn environment_credentials_are_served_but_never_persisted() {
    let content = CONFIG.replace("name = \"Mock\"", "name = \"Env Override\"");
    let file = write_config(&content);
    std::env::set_var("ENV_OVERRIDE_API_KEY", "env-key");
    let store = TomlConfigStore::load(file.path()).unwrap();
    std::env::remove_var("ENV_OVERRIDE_API_KEY");

    let mut served = store.exchange_config("Env Override").unwrap();
    assert_eq!(served.api.credentials.key, "env-key");
    assert_eq!(served.api.credentials.secret, "file-secret");

    served.enabled_pairs = "ETH_USD".into();
    store.update_exchange_config(served).unwrap();

    let written = std::fs::read_to_string(file.path()).unwrap();
    assert!(!written.contains("env-key"));
    assert!(written.contains("file-key"));
    assert_eq!(
        store.exchange_config("Env Override").unwrap().api.credentials.key,
        "env-key"
    );
}
