use crate::{api, cli::actions::Action, config::BridgeConfig};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            provider_url,
            provider_key,
            site_url,
        } => {
            let config = BridgeConfig::new(provider_url, provider_key, site_url);

            api::new(port, config).await?;
        }
    }

    Ok(())
}
