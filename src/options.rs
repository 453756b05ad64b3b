use std::{net::IpAddr, time::Duration};

use clap::{ArgAction, Parser};
use ldapauth::{directory::Ldap3Connector, Config, TlsOptions, DEFAULT_BODY_LIMIT};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Options {
    /// Increase logs verbosity (Error (default), Warn, Info, Debug, Trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub log_level: u8,
    /// HTTP listening address.
    #[arg(short = 'a', long, default_value = "127.0.0.1")]
    pub address: IpAddr,
    /// HTTP listening port.
    #[arg(short = 'p', long, default_value = "3000")]
    pub port: u16,
    /// URL of the LDAP server, e.g. ldap://localhost:389 or ldaps://localhost:636.
    #[arg(short = 'l', long)]
    pub ldap_url: String,
    /// Upgrade the LDAP connection with StartTLS before binding.
    #[arg(long)]
    pub starttls: bool,
    /// Do not verify the LDAP server certificate.
    #[arg(long, requires = "starttls")]
    pub tls_no_verify: bool,
    /// LDAP connection and operation timeout, e.g. 5s.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
    /// Service account DN.
    #[arg(short = 'b', long, default_value = "")]
    pub bind_dn: String,
    /// Service account password, unauthenticated bind if missing.
    #[arg(short = 'w', long)]
    pub bind_credentials: Option<String>,
    /// Base DN of the user search.
    #[arg(long, requires = "search_filter")]
    pub search_base: Option<String>,
    /// User search filter, {{username}} is replaced by the submitted username.
    #[arg(long, requires = "search_base")]
    pub search_filter: Option<String>,
    /// Attributes fetched during the user search.
    #[arg(long = "search-attribute")]
    pub search_attributes: Vec<String>,
    /// Query and header field holding the username, bodies always use `username`.
    #[arg(long, default_value = "username")]
    pub username_field: String,
    /// Query and header field holding the password, bodies always use `password`.
    #[arg(long, default_value = "password")]
    pub password_field: String,
    /// Largest request body read while looking for credentials, in bytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,
    /// Paths served without authentication.
    #[arg(long = "public")]
    pub public_paths: Vec<String>,
}

impl Options {
    pub fn log_level(&self) -> LevelFilter {
        use LevelFilter::*;
        match self.log_level {
            0 => Error,
            1 => Warn,
            2 => Info,
            3 => Debug,
            _ => Trace,
        }
    }

    pub fn connector(&self) -> Ldap3Connector {
        match self.timeout {
            Some(timeout) => Ldap3Connector::new().with_timeout(timeout),
            None => Ldap3Connector::new(),
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config {
            url: self.ldap_url.clone(),
            tls: self.starttls.then(|| TlsOptions {
                no_verify: self.tls_no_verify,
            }),
            bind_dn: self.bind_dn.clone(),
            bind_credentials: self.bind_credentials.clone().unwrap_or_default(),
            search_base: self.search_base.clone().unwrap_or_default(),
            search_filter: self.search_filter.clone().unwrap_or_default(),
            username_field: self.username_field.clone(),
            password_field: self.password_field.clone(),
            body_limit: self.body_limit,
            ..Default::default()
        }
        .connector(self.connector());
        if !self.search_attributes.is_empty() {
            config.search_attributes = self.search_attributes.clone();
        }
        if !self.public_paths.is_empty() {
            let public = self.public_paths.clone();
            config = config.skip_when(move |req| public.iter().any(|p| p == req.uri().path()));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use clap::{
        error::{ContextKind, ContextValue, Error, ErrorKind},
        Parser,
    };
    use hyper::{Body, Request};

    use super::Options;

    macro_rules! cmd {
        ($($arg:tt)*) => {
            {
                Options::try_parse_from([
                    "ldapauth",
                    "--ldap-url",
                    "ldap://example:389",
                    $($arg)*
                ])
            }
        }
    }

    fn missing_args<const N: usize>(err: Error, names: [&str; N]) {
        assert!(
            err.kind() == ErrorKind::MissingRequiredArgument
                && names.into_iter().all(|name| err.context().any(|(k, v)| {
                    matches!(k, ContextKind::InvalidArg)
                        && match v {
                            ContextValue::Strings(ss) => ss.iter().any(|s| s.contains(name)),
                            _ => false,
                        }
                }))
        )
    }

    #[test]
    fn basic() {
        // Missing LDAP URL.
        let err = Options::try_parse_from(["ldapauth"]).unwrap_err();
        missing_args(err, ["ldap-url"]);

        // Service bind only.
        let options = cmd!["--bind-dn", "cn=admin,dc=x", "--bind-credentials", "pw"].unwrap();
        let config = options.config();
        assert_eq!(config.url, "ldap://example:389");
        assert_eq!(config.bind_dn, "cn=admin,dc=x");
        assert_eq!(config.bind_credentials, "pw");
        assert!(!config.searches());
        assert!(config.validate().is_ok());
        assert_eq!(config.body_limit, ldapauth::DEFAULT_BODY_LIMIT);

        let options = cmd!["--body-limit", "1024"].unwrap();
        assert_eq!(options.config().body_limit, 1024);
    }

    #[test]
    fn search() {
        // Search base without filter.
        missing_args(
            cmd!["--search-base", "dc=x"].unwrap_err(),
            ["search-filter"],
        );

        // Search filter without base.
        missing_args(
            cmd!["--search-filter", "(uid={{username}})"].unwrap_err(),
            ["search-base"],
        );

        let options = cmd![
            "--bind-dn",
            "cn=admin,dc=x",
            "--bind-credentials",
            "pw",
            "--search-base",
            "dc=x",
            "--search-filter",
            "(uid={{username}})",
        ]
        .unwrap();
        let config = options.config();
        assert!(config.searches());
        assert_eq!(config.search_attributes, ["dn", "dc"]);
        assert!(config.validate().is_ok());

        let options = cmd![
            "--search-base",
            "dc=x",
            "--search-filter",
            "(mail={{username}})",
            "--search-attribute",
            "mail",
            "--search-attribute",
            "cn",
        ]
        .unwrap();
        assert_eq!(options.config().search_attributes, ["mail", "cn"]);
    }

    #[test]
    fn tls() {
        missing_args(cmd!["--tls-no-verify"].unwrap_err(), ["starttls"]);

        assert!(cmd![].unwrap().config().tls.is_none());

        let config = cmd!["--starttls", "--tls-no-verify"].unwrap().config();
        assert!(config.tls.map(|tls| tls.no_verify).unwrap_or_default());

        let options = cmd!["--timeout", "5s"].unwrap();
        assert_eq!(options.timeout, Some(std::time::Duration::from_secs(5)));
        assert!(cmd!["--timeout", "soon"].is_err());
    }

    #[test]
    fn public() {
        let config = cmd!["--public", "/health", "--public", "/"].unwrap().config();
        let skip = config.skip.unwrap();
        let request = |path: &str| Request::get(path).body(Body::empty()).unwrap();
        assert!(skip(&request("/health")));
        assert!(skip(&request("/")));
        assert!(!skip(&request("/private")));

        assert!(cmd![].unwrap().config().skip.is_none());
    }
}
