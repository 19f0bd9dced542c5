use crate::cli::actions::Action;
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        provider_url: matches
            .get_one("provider-url")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --provider-url"))?,
        provider_key: matches
            .get_one("provider-key")
            .map(|s: &String| SecretString::from(s.to_string()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --provider-key"))?,
        site_url: matches.get_one("site-url").map_or_else(
            || "http://localhost:8080".to_string(),
            |s: &String| s.to_string(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn test_handler_builds_server_action() {
        let matches = commands::new().get_matches_from(vec![
            "ponto",
            "--provider-url",
            "https://auth.example.com",
            "--provider-key",
            "publishable-key",
        ]);

        let action = handler(&matches).unwrap();
        let Action::Server {
            port,
            provider_url,
            provider_key,
            site_url,
        } = action;

        assert_eq!(port, 8080);
        assert_eq!(provider_url, "https://auth.example.com");
        assert_eq!(provider_key.expose_secret(), "publishable-key");
        assert_eq!(site_url, "http://localhost:8080");
    }
}
