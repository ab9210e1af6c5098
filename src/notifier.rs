//! Subscription groups and asynchronous client notification.
//!
//! The notifier holds only client ids; delivery goes through the
//! session store so that bytes land on the authenticated session's
//! outbound queue in call order.

use rustc_hash::FxHashMap;

use crate::session::SessionStore;

/// group name -> subscribed client ids.
///
/// Subscription is append; removal is first-occurrence. Duplicate
/// subscriptions are allowed and mean duplicate deliveries.
#[derive(Default)]
pub struct Notifier {
    groups: FxHashMap<String, Vec<String>>,
}

impl Notifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a group exists (idempotent).
    pub fn register_group(&mut self, group: &str) {
        self.groups.entry(group.to_string()).or_default();
    }

    /// Append `client_id` to a group, creating the group implicitly.
    pub fn subscribe(&mut self, group: &str, client_id: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .push(client_id.to_string());
    }

    /// Remove the first occurrence of `client_id` from a group.
    pub fn unsubscribe(&mut self, group: &str, client_id: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            if let Some(pos) = members.iter().position(|m| m == client_id) {
                members.remove(pos);
            }
        }
    }

    /// Members of a group (empty when unknown).
    pub fn members(&self, group: &str) -> &[String] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Queue `message` for the authenticated session of `client_id`.
    ///
    /// Returns whether a session was found.
    pub fn notify_user(&self, sessions: &SessionStore, client_id: &str, message: &str) -> bool {
        match sessions.authed(client_id) {
            Some(session) => {
                session.send(message);
                true
            }
            None => false,
        }
    }

    /// Queue `message` for every subscriber of `group` with a live
    /// authenticated session.
    pub fn notify_group(&self, sessions: &SessionStore, group: &str, message: &str) {
        for client_id in self.members(group) {
            self.notify_user(sessions, client_id, message);
        }
    }
}
