use std::time::Duration;

use async_trait::async_trait;
use ldap3::{
    DerefAliases, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry,
    SearchOptions,
};

use crate::{
    config::TlsOptions,
    directory::{Connector, DirectoryError, Entry, SearchRequest, Session},
};

/// Directory connector backed by `ldap3`.
#[derive(Clone, Debug, Default)]
pub struct Ldap3Connector {
    timeout: Option<Duration>,
}

impl Ldap3Connector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline applied to connection establishment and to every directory operation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn settings(&self) -> LdapConnSettings {
        let settings = LdapConnSettings::new();
        match self.timeout {
            Some(timeout) => settings.set_conn_timeout(timeout),
            None => settings,
        }
    }
}

#[async_trait]
impl Connector for Ldap3Connector {
    async fn dial(&self, url: &str) -> Result<Box<dyn Session>, DirectoryError> {
        let settings = self.settings();
        let ldap = connect(settings.clone(), url).await?;
        Ok(Box::new(Ldap3Session {
            url: url.to_owned(),
            settings,
            timeout: self.timeout,
            ldap,
        }))
    }
}

async fn connect(settings: LdapConnSettings, url: &str) -> Result<Ldap, LdapError> {
    let (conn, ldap) = LdapConnAsync::with_settings(settings, url).await?;
    ldap3::drive!(conn);
    Ok(ldap)
}

pub struct Ldap3Session {
    url: String,
    settings: LdapConnSettings,
    timeout: Option<Duration>,
    ldap: Ldap,
}

impl Ldap3Session {
    fn ldap(&mut self) -> &mut Ldap {
        if let Some(timeout) = self.timeout {
            self.ldap.with_timeout(timeout);
        }
        &mut self.ldap
    }
}

#[async_trait]
impl Session for Ldap3Session {
    // ldap3 only negotiates StartTLS while connecting, so the upgrade replaces the
    // plain connection before anything is sent over it.
    async fn start_tls(&mut self, tls: &TlsOptions) -> Result<(), DirectoryError> {
        if self.url.starts_with("ldaps://") {
            return Ok(());
        }

        let settings = self
            .settings
            .clone()
            .set_starttls(true)
            .set_no_tls_verify(tls.no_verify);
        let upgraded = connect(settings, &self.url).await?;
        let mut plain = std::mem::replace(&mut self.ldap, upgraded);
        if let Err(err) = plain.unbind().await {
            log::debug!("Cannot close plain directory connection: {}", err);
        }
        Ok(())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.ldap().simple_bind(dn, password).await?.success()?;
        Ok(())
    }

    // A simple bind with an empty password is the protocol's unauthenticated bind.
    async fn unauthenticated_bind(&mut self, dn: &str) -> Result<(), DirectoryError> {
        self.ldap().simple_bind(dn, "").await?.success()?;
        Ok(())
    }

    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<Vec<Entry>, DirectoryError> {
        let (entries, _res) = self
            .ldap()
            .with_search_options(
                SearchOptions::new()
                    .deref(DerefAliases::Never)
                    .sizelimit(0)
                    .timelimit(0),
            )
            .search(
                request.base,
                Scope::Subtree,
                request.filter,
                request.attributes.to_vec(),
            )
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| Entry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn close(&mut self) {
        if let Err(err) = self.ldap.unbind().await {
            log::debug!("Cannot close directory connection: {}", err);
        }
    }
}

impl From<LdapError> for DirectoryError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::LdapResult { result } => DirectoryError::Result {
                code: result.rc,
                text: result.text,
            },
            err => DirectoryError::Transport(err.to_string()),
        }
    }
}
