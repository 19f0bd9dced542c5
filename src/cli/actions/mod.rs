pub mod server;

use secrecy::SecretString;

/// Actions the CLI can dispatch
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        provider_url: String,
        provider_key: SecretString,
        site_url: String,
    },
}
