use serde::{Deserialize, Deserializer};
use zeroize::Zeroizing;

use base64::engine::general_purpose::STANDARD as base64decoder;
use base64::Engine;

#[derive(Clone, Deserialize)]
pub struct Configuration {
    pub service_address: String,
    pub service_port: u16,
    #[serde(deserialize_with = "deserialize_signing_key")]
    pub session_signing_key: Zeroizing<String>,
}

/// Fetch the Lectern configuration. Check a path if one is provided,
/// otherwise look for a base64 encoded blob in the LECTERN_CONFIG
/// environment variable.
///
/// Also allow overriding of the port because apparently that's how Heroku
/// rolls.
pub fn load_configuration() -> Configuration {
    let configuration_toml = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path).unwrap(),
        None => {
            let base64_config = std::env::var("LECTERN_CONFIG").unwrap();
            let config_bytes = base64decoder.decode(base64_config).unwrap();
            String::from_utf8(config_bytes).unwrap()
        }
    };

    let mut config: Configuration = toml::from_str(&configuration_toml).unwrap();

    if let Ok(port) = std::env::var("PORT") {
        config.service_port = port.parse().unwrap();
    }

    config
}

fn deserialize_signing_key<'de, D>(deserializer: D) -> Result<Zeroizing<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let key: String = Deserialize::deserialize(deserializer)?;
    Ok(Zeroizing::new(key))
}
