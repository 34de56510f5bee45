//! Session management surface used by the lobby front end
//!
//! Each operation completes through a one-shot receiver so callers can
//! await it or poll it from a frame loop. The character simulation never
//! touches this module.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub type SessionId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSearchResult {
    pub id: SessionId,
    pub level_name: String,
    pub is_local_only: bool,
    pub open_connections: u32,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSearch {
    pub success: bool,
    pub results: Vec<SessionSearchResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub success: bool,
    /// Level to travel to when the join succeeded
    pub level_name: Option<String>,
}

pub trait SessionService {
    fn create_session(
        &self,
        max_connections: u32,
        is_local_only: bool,
        level_name: &str,
    ) -> oneshot::Receiver<bool>;

    fn find_sessions(&self, max_results: usize, is_local_only: bool) -> oneshot::Receiver<SessionSearch>;

    fn join_session(&self, selected: &SessionSearchResult) -> oneshot::Receiver<JoinOutcome>;
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: Vec<SessionSearchResult>,
    next_id: SessionId,
}

/// In-process session registry, shared by cloning
#[derive(Debug, Clone, Default)]
pub struct LocalSessionService {
    table: Arc<Mutex<SessionTable>>,
}

impl LocalSessionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.table.lock().map(|t| t.sessions.len()).unwrap_or(0)
    }
}

impl SessionService for LocalSessionService {
    fn create_session(
        &self,
        max_connections: u32,
        is_local_only: bool,
        level_name: &str,
    ) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();

        let success = match self.table.lock() {
            Ok(mut table) if max_connections > 0 => {
                table.next_id += 1;
                let id = table.next_id;
                table.sessions.push(SessionSearchResult {
                    id,
                    level_name: level_name.to_string(),
                    is_local_only,
                    open_connections: max_connections,
                    max_connections,
                });
                info!("Created session {} on level {}", id, level_name);
                true
            }
            Ok(_) => {
                warn!("Refusing to create a session with no connections");
                false
            }
            Err(_) => false,
        };

        let _ = tx.send(success);
        rx
    }

    fn find_sessions(&self, max_results: usize, is_local_only: bool) -> oneshot::Receiver<SessionSearch> {
        let (tx, rx) = oneshot::channel();

        let search = match self.table.lock() {
            Ok(table) => SessionSearch {
                success: true,
                results: table
                    .sessions
                    .iter()
                    .filter(|s| s.is_local_only == is_local_only && s.open_connections > 0)
                    .take(max_results)
                    .cloned()
                    .collect(),
            },
            Err(_) => SessionSearch::default(),
        };

        let _ = tx.send(search);
        rx
    }

    fn join_session(&self, selected: &SessionSearchResult) -> oneshot::Receiver<JoinOutcome> {
        let (tx, rx) = oneshot::channel();

        let outcome = match self.table.lock() {
            Ok(mut table) => match table
                .sessions
                .iter_mut()
                .find(|s| s.id == selected.id && s.open_connections > 0)
            {
                Some(session) => {
                    session.open_connections -= 1;
                    info!("Joined session {}", session.id);
                    JoinOutcome {
                        success: true,
                        level_name: Some(session.level_name.clone()),
                    }
                }
                None => JoinOutcome {
                    success: false,
                    level_name: None,
                },
            },
            Err(_) => JoinOutcome {
                success: false,
                level_name: None,
            },
        };

        let _ = tx.send(outcome);
        rx
    }
}

/// Searches and joins the most recently listed session, if any
pub async fn find_and_join<S: SessionService + ?Sized>(
    service: &S,
    max_results: usize,
    is_local_only: bool,
) -> Option<JoinOutcome> {
    let search = service.find_sessions(max_results, is_local_only).await.ok()?;
    if !search.success {
        warn!("Session search failed");
        return None;
    }

    let Some(selected) = search.results.last() else {
        info!("There are no active sessions to join");
        return None;
    };

    service.join_session(selected).await.ok()
}
