//! Map parsed arguments to an [`Action`].

use crate::api::AuthConfig;
use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth::{
    ARG_ACCESS_TOKEN_SECRET, ARG_ACCESS_TOKEN_TTL_SECONDS, ARG_CORS_ORIGIN,
    ARG_REFRESH_TOKEN_SECRET, ARG_REFRESH_TOKEN_TTL_SECONDS,
};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if a required argument is missing or the token
/// configuration is unsafe (empty or shared secrets, bad lifetimes).
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>("dsn").cloned();

    let secret = |name: &str| -> Result<SecretString> {
        matches
            .get_one::<String>(name)
            .map(|value| SecretString::from(value.clone()))
            .with_context(|| format!("missing required argument: --{name}"))
    };

    let mut auth_config = AuthConfig::new(
        secret(ARG_ACCESS_TOKEN_SECRET)?,
        secret(ARG_REFRESH_TOKEN_SECRET)?,
    );
    if let Some(ttl) = matches.get_one::<i64>(ARG_ACCESS_TOKEN_TTL_SECONDS) {
        auth_config = auth_config.with_access_token_ttl_seconds(*ttl);
    }
    if let Some(ttl) = matches.get_one::<i64>(ARG_REFRESH_TOKEN_TTL_SECONDS) {
        auth_config = auth_config.with_refresh_token_ttl_seconds(*ttl);
    }
    auth_config
        .validate()
        .context("invalid token configuration")?;

    let cors_origin = matches
        .get_one::<String>(ARG_CORS_ORIGIN)
        .cloned()
        .unwrap_or_else(|| "http://localhost:3000".to_string());

    Ok(Action::Server(Args {
        port,
        dsn,
        auth_config,
        cors_origin,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(env: &[(&str, Option<&str>)]) -> Result<Action> {
        let mut vars: Vec<(&str, Option<&str>)> = [
            "VIDTUBE_DSN",
            "VIDTUBE_PORT",
            "VIDTUBE_ACCESS_TOKEN_TTL_SECONDS",
            "VIDTUBE_REFRESH_TOKEN_TTL_SECONDS",
            "VIDTUBE_CORS_ORIGIN",
        ]
        .into_iter()
        .filter(|name| env.iter().all(|(key, _)| key != name))
        .map(|name| (name, None))
        .collect();
        vars.extend_from_slice(env);
        temp_env::with_vars(vars, || {
            let matches = crate::cli::commands::new().get_matches_from(vec!["vidtube"]);
            handler(&matches)
        })
    }

    #[test]
    fn builds_server_action_without_dsn() -> Result<()> {
        let action = dispatch(&[
            ("VIDTUBE_ACCESS_TOKEN_SECRET", Some("access-secret")),
            ("VIDTUBE_REFRESH_TOKEN_SECRET", Some("refresh-secret")),
        ])?;
        let Action::Server(args) = action;
        assert_eq!(args.port, 8080);
        assert!(args.dsn.is_none());
        assert_eq!(args.cors_origin, "http://localhost:3000");
        assert_eq!(args.auth_config.access_token_ttl_seconds(), 900);
        assert_eq!(args.auth_config.refresh_token_ttl_seconds(), 864_000);
        Ok(())
    }

    #[test]
    fn rejects_shared_secret() {
        let result = dispatch(&[
            ("VIDTUBE_ACCESS_TOKEN_SECRET", Some("same")),
            ("VIDTUBE_REFRESH_TOKEN_SECRET", Some("same")),
        ]);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(format!("{err:#}").contains("distinct"));
        }
    }

    #[test]
    fn rejects_access_ttl_not_shorter_than_refresh() {
        let result = dispatch(&[
            ("VIDTUBE_ACCESS_TOKEN_SECRET", Some("access-secret")),
            ("VIDTUBE_REFRESH_TOKEN_SECRET", Some("refresh-secret")),
            ("VIDTUBE_ACCESS_TOKEN_TTL_SECONDS", Some("3600")),
            ("VIDTUBE_REFRESH_TOKEN_TTL_SECONDS", Some("3600")),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_refresh_ttl_beyond_a_year() {
        let result = dispatch(&[
            ("VIDTUBE_ACCESS_TOKEN_SECRET", Some("access-secret")),
            ("VIDTUBE_REFRESH_TOKEN_SECRET", Some("refresh-secret")),
            (
                "VIDTUBE_REFRESH_TOKEN_TTL_SECONDS",
                Some("9223372036854775807"),
            ),
        ]);
        assert!(result.is_err());
        if let Err(err) = result {
            assert!(format!("{err:#}").contains("must not exceed"));
        }
    }
}
