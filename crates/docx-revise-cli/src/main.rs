use anyhow::{Context, Result};
use docx_revise_config::{Config, Mode, SpanPolicy as ConfigSpanPolicy};
use docx_revise_engine::{
    Defaults, RevisionMode, RevisionRequest, RevisionResponse, SpanPolicy, handle,
};
use std::io::{self, Read, Write};
use std::{env, process};

fn defaults_from(config: &Config) -> Defaults {
    Defaults {
        mode: match config.mode {
            Mode::Tracked => RevisionMode::Tracked,
            Mode::Direct => RevisionMode::Direct,
        },
        author: config.author.clone(),
        tracked_min_find_len: config.tracked_min_find_len,
        direct_min_find_len: config.direct_min_find_len,
        span_policy: match config.span_policy {
            ConfigSpanPolicy::Merge => SpanPolicy::Merge,
            ConfigSpanPolicy::Reject => SpanPolicy::Reject,
        },
    }
}

fn parse_mode(arg: &str) -> Option<RevisionMode> {
    match arg {
        "tracked" => Some(RevisionMode::Tracked),
        "direct" => Some(RevisionMode::Direct),
        _ => None,
    }
}

/// Response for one raw request body. Malformed JSON is a failure response,
/// not a process error.
fn respond(input: &str, defaults: &Defaults) -> RevisionResponse {
    match serde_json::from_str::<RevisionRequest>(input) {
        Ok(request) => handle(&request, defaults),
        Err(e) => {
            log::error!("Invalid request JSON: {e}");
            RevisionResponse::failure(&e)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mode_override = match args.len() {
        1 => None,
        2 => match parse_mode(&args[1]) {
            Some(mode) => Some(mode),
            None => {
                eprintln!("Usage: {} [tracked|direct]", args[0]);
                process::exit(2);
            }
        },
        _ => {
            eprintln!("Usage: {} [tracked|direct]", args[0]);
            process::exit(2);
        }
    };

    let config = match Config::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Ignoring config file: {e}");
            Config::default()
        }
    };
    log::debug!("Config path: {}", Config::config_path().display());

    let mut defaults = defaults_from(&config);
    if let Some(mode) = mode_override {
        defaults.mode = mode;
    }

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("Error: failed to read request from stdin: {e}");
        process::exit(1);
    }

    let response = respond(&input, &defaults);
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &response).context("Failed to write response")?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("tracked"), Some(RevisionMode::Tracked));
        assert_eq!(parse_mode("direct"), Some(RevisionMode::Direct));
        assert_eq!(parse_mode("Direct"), None);
    }

    #[test]
    fn test_defaults_follow_config() {
        let config = Config {
            author: "Legal Team".to_string(),
            mode: Mode::Direct,
            direct_min_find_len: 25,
            span_policy: ConfigSpanPolicy::Reject,
            ..Config::default()
        };

        let defaults = defaults_from(&config);

        assert_eq!(defaults.mode, RevisionMode::Direct);
        assert_eq!(defaults.author, "Legal Team");
        assert_eq!(defaults.direct_min_find_len, 25);
        assert_eq!(defaults.span_policy, SpanPolicy::Reject);
    }

    #[test]
    fn test_default_config_matches_engine_defaults() {
        assert_eq!(defaults_from(&Config::default()), Defaults::default());
    }

    #[test]
    fn test_invalid_json_is_a_failure_response() {
        let response = respond("{not json", &Defaults::default());
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().contains("key must be a string"));
    }

    #[test]
    fn test_missing_field_is_reported() {
        let response = respond(r#"{"originalText":"a","modifiedText":"b"}"#, &Defaults::default());
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "originalDocumentBase64 is required");
    }
}
