use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    config::TlsOptions,
    directory::{result_code, Connector, DirectoryError, Entry, SearchRequest, Session},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Dial(String),
    StartTls,
    Bind(String),
    UnauthenticatedBind(String),
    Search { base: String, filter: String },
    Close,
}

struct Account {
    uid: String,
    dn: String,
    password: String,
}

/// Directory kept in memory which records every operation it receives.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<State>,
}

#[derive(Default)]
struct State {
    service: Option<(String, String)>,
    anonymous: bool,
    unreachable: bool,
    tls_failure: bool,
    search_failure: bool,
    accounts: Vec<Account>,
    events: Mutex<Vec<Event>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(mut self, dn: &str, password: &str) -> Self {
        self.state_mut().service = Some((dn.to_owned(), password.to_owned()));
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.state_mut().anonymous = true;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.state_mut().unreachable = true;
        self
    }

    pub fn tls_failure(mut self) -> Self {
        self.state_mut().tls_failure = true;
        self
    }

    pub fn search_failure(mut self) -> Self {
        self.state_mut().search_failure = true;
        self
    }

    pub fn account(mut self, uid: &str, dn: &str, password: &str) -> Self {
        self.state_mut().accounts.push(Account {
            uid: uid.to_owned(),
            dn: dn.to_owned(),
            password: password.to_owned(),
        });
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().unwrap().clone()
    }

    fn state_mut(&mut self) -> &mut State {
        Arc::get_mut(&mut self.state).expect("directory configured after being shared")
    }
}

#[async_trait]
impl Connector for MemoryDirectory {
    async fn dial(&self, url: &str) -> Result<Box<dyn Session>, DirectoryError> {
        if self.state.unreachable {
            return Err(DirectoryError::Transport("connection refused".to_owned()));
        }
        self.state.record(Event::Dial(url.to_owned()));
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySession {
    state: Arc<State>,
}

impl State {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

fn invalid_credentials() -> DirectoryError {
    DirectoryError::Result {
        code: result_code::INVALID_CREDENTIALS,
        text: String::new(),
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn start_tls(&mut self, _tls: &TlsOptions) -> Result<(), DirectoryError> {
        if self.state.tls_failure {
            return Err(DirectoryError::Transport("handshake failure".to_owned()));
        }
        self.state.record(Event::StartTls);
        Ok(())
    }

    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.state.record(Event::Bind(dn.to_owned()));
        let service = matches!(&self.state.service, Some((d, p)) if d == dn && p == password);
        let account = self
            .state
            .accounts
            .iter()
            .any(|a| a.dn == dn && a.password == password);
        if service || account {
            Ok(())
        } else {
            Err(invalid_credentials())
        }
    }

    async fn unauthenticated_bind(&mut self, dn: &str) -> Result<(), DirectoryError> {
        self.state.record(Event::UnauthenticatedBind(dn.to_owned()));
        if self.state.anonymous {
            Ok(())
        } else {
            Err(DirectoryError::Result {
                code: 53,
                text: "unauthenticated bind not allowed".to_owned(),
            })
        }
    }

    async fn search(&mut self, request: &SearchRequest<'_>) -> Result<Vec<Entry>, DirectoryError> {
        self.state.record(Event::Search {
            base: request.base.to_owned(),
            filter: request.filter.to_owned(),
        });
        if self.state.search_failure {
            return Err(DirectoryError::Result {
                code: 32,
                text: "no such object".to_owned(),
            });
        }
        Ok(self
            .state
            .accounts
            .iter()
            .filter(|a| a.dn.ends_with(request.base))
            .filter(|a| request.filter.contains(&format!("(uid={})", a.uid)))
            .map(|a| Entry {
                dn: a.dn.clone(),
                attributes: [("uid".to_owned(), vec![a.uid.clone()])].into_iter().collect(),
            })
            .collect())
    }

    async fn close(&mut self) {
        self.state.record(Event::Close);
    }
}
