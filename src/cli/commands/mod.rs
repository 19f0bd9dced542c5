use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("ponto")
        .about("Web/Native Authentication Bridge")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PONTO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("provider-url")
                .long("provider-url")
                .help("Identity provider base URL, example: https://auth.example.com")
                .env("PONTO_PROVIDER_URL")
                .required(true),
        )
        .arg(
            Arg::new("provider-key")
                .long("provider-key")
                .help("Identity provider publishable API key")
                .env("PONTO_PROVIDER_KEY")
                .required(true),
        )
        .arg(
            Arg::new("site-url")
                .long("site-url")
                .help("Public base URL of this site, used for redirects and CORS")
                .default_value("http://localhost:8080")
                .env("PONTO_SITE_URL"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PONTO_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "ponto");
        assert_eq!(
            command.get_about().unwrap().to_string(),
            "Web/Native Authentication Bridge"
        );
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn test_check_port_and_provider() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "ponto",
            "--port",
            "8080",
            "--provider-url",
            "https://auth.example.com",
            "--provider-key",
            "publishable-key",
            "--site-url",
            "https://app.example.com",
        ]);

        assert_eq!(matches.get_one::<u16>("port").map(|s| *s), Some(8080));
        assert_eq!(
            matches
                .get_one::<String>("provider-url")
                .map(|s| s.to_string()),
            Some("https://auth.example.com".to_string())
        );
        assert_eq!(
            matches
                .get_one::<String>("provider-key")
                .map(|s| s.to_string()),
            Some("publishable-key".to_string())
        );
        assert_eq!(
            matches.get_one::<String>("site-url").map(|s| s.to_string()),
            Some("https://app.example.com".to_string())
        );
    }

    #[test]
    fn test_site_url_default() {
        let command = new();
        let matches = command.get_matches_from(vec![
            "ponto",
            "--provider-url",
            "https://auth.example.com",
            "--provider-key",
            "publishable-key",
        ]);

        assert_eq!(
            matches.get_one::<String>("site-url").map(|s| s.to_string()),
            Some("http://localhost:8080".to_string())
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("PONTO_PROVIDER_URL", Some("https://auth.example.com")),
                ("PONTO_PROVIDER_KEY", Some("publishable-key")),
                ("PONTO_SITE_URL", Some("https://app.example.com")),
                ("PONTO_PORT", Some("443")),
                ("PONTO_LOG_LEVEL", Some("info")),
            ],
            || {
                let command = new();
                let matches = command.get_matches_from(vec!["ponto"]);
                assert_eq!(matches.get_one::<u16>("port").map(|s| *s), Some(443));
                assert_eq!(
                    matches
                        .get_one::<String>("provider-url")
                        .map(|s| s.to_string()),
                    Some("https://auth.example.com".to_string())
                );
                assert_eq!(
                    matches.get_one::<String>("site-url").map(|s| s.to_string()),
                    Some("https://app.example.com".to_string())
                );
                assert_eq!(matches.get_one::<u8>("verbosity").map(|s| *s), Some(2));
            },
        );
    }

    #[test]
    fn test_check_log_level_env() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [
                    ("PONTO_LOG_LEVEL", Some(level)),
                    ("PONTO_PROVIDER_URL", Some("https://auth.example.com")),
                    ("PONTO_PROVIDER_KEY", Some("publishable-key")),
                ],
                || {
                    let command = new();
                    let matches = command.get_matches_from(vec!["ponto"]);
                    assert_eq!(
                        matches.get_one::<u8>("verbosity").map(|s| *s),
                        Some(index as u8)
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        // loop cover all possible value_parse
        let levels = vec!["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("PONTO_LOG_LEVEL", None::<String>)], || {
                let mut args = vec![
                    "ponto".to_string(),
                    "--provider-url".to_string(),
                    "https://auth.example.com".to_string(),
                    "--provider-key".to_string(),
                    "publishable-key".to_string(),
                ];

                // Add the appropriate number of "-v" flags based on the index
                if index > 0 {
                    let v = format!("-{}", "v".repeat(index));
                    args.push(v);
                }

                let command = new();

                let matches = command.get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>("verbosity").map(|s| *s),
                    Some(index as u8)
                );
            });
        }
    }
}
