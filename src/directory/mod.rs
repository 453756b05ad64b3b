use std::{borrow::Cow, collections::HashMap};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TlsOptions;

pub use ldap::{Ldap3Connector, Ldap3Session};

mod ldap;
#[cfg(test)]
pub(crate) mod memory;
pub mod result_code;

/// Opens sessions against a directory server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, url: &str) -> Result<Box<dyn Session>, DirectoryError>;
}

/// A live connection to a directory server, owned by a single authentication run.
///
/// Searches always use a whole subtree scope and never dereference aliases.
#[async_trait]
pub trait Session: Send {
    async fn start_tls(&mut self, tls: &TlsOptions) -> Result<(), DirectoryError>;

    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    async fn unauthenticated_bind(&mut self, dn: &str) -> Result<(), DirectoryError>;

    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<Vec<Entry>, DirectoryError>;

    async fn close(&mut self);
}

#[derive(Clone, Debug)]
pub struct SearchRequest<'a> {
    pub base: &'a str,
    pub filter: &'a str,
    pub attributes: &'a [String],
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory returned result code {code}: {text}")]
    Result { code: u32, text: String },
    #[error("directory transport failure: {0}")]
    Transport(String),
}

impl DirectoryError {
    pub fn result_code(&self) -> Option<u32> {
        match self {
            DirectoryError::Result { code, .. } => Some(*code),
            DirectoryError::Transport(_) => None,
        }
    }
}

/// Neutralizes filter metacharacters so a raw value can be interpolated into a search filter.
pub fn escape_filter(raw: &str) -> Cow<'_, str> {
    ldap3::ldap_escape(raw)
}
