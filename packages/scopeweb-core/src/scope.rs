//! Per-request scope types.
//!
//! Each scope is a named subset of request state with its own lifecycle and
//! persistence rule. Scopes are plain data: loading them from a session and
//! writing them back is the job of the server crate's persistence adapter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionScope
// ---------------------------------------------------------------------------

/// A business the authenticated actor can switch into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub name: String,
}

/// Identity-and-presentation data for the authenticated actor.
///
/// Persisted to the session on every response. `flashes` holds the one-shot
/// messages consumed when the scope was loaded; handlers queue messages for
/// the next request through [`SessionScope::add_flash`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionScope {
    /// Numeric user id. `0` means anonymous.
    pub id: i64,
    pub username: String,
    /// Opaque key identifying the login session at the backing services.
    pub session_key: String,
    /// Tenant (chain) the actor is currently operating in.
    pub chain_id: i64,
    pub chain_name: String,
    /// Deployment environment tag shown in the page chrome.
    pub environment: String,
    /// Flash messages read from the session for this request.
    pub flashes: Vec<String>,
    /// Flash messages queued for the next request.
    pub pending_flashes: Vec<String>,
    pub business_id: i64,
    pub business_name: String,
    pub businesses: Vec<Business>,
}

impl SessionScope {
    /// Returns `true` when an actor is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.id != 0
    }

    /// Queues a flash message to be shown on the next request.
    pub fn add_flash(&mut self, message: impl Into<String>) {
        self.pending_flashes.push(message.into());
    }

    /// Switches the active business, taking its name from `businesses`.
    ///
    /// Returns `false` (and changes nothing) if the id is not one of the
    /// actor's businesses.
    pub fn switch_business(&mut self, business_id: i64) -> bool {
        let Some(business) = self.businesses.iter().find(|b| b.id == business_id) else {
            return false;
        };
        self.business_name.clone_from(&business.name);
        self.business_id = business_id;
        true
    }

    /// Clears all identity fields, keeping queued flashes so a logout
    /// notice survives the redirect.
    pub fn clear_identity(&mut self) {
        let pending = std::mem::take(&mut self.pending_flashes);
        *self = Self {
            pending_flashes: pending,
            ..Self::default()
        };
    }
}

// ---------------------------------------------------------------------------
// SearchScope
// ---------------------------------------------------------------------------

/// One row of a customer search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: i64,
    pub entity_code: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Last executed search and its ordered results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchScope {
    pub query: String,
    pub results: Vec<CustomerSummary>,
}

impl SearchScope {
    #[must_use]
    pub fn new(query: impl Into<String>, results: Vec<CustomerSummary>) -> Self {
        Self {
            query: query.into(),
            results,
        }
    }

    /// An empty scope carries neither a query nor results and is never
    /// persisted, so it cannot clobber a previous search.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.results.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ProfileScope
// ---------------------------------------------------------------------------

/// The identifying fields of the focused customer: the only part of the
/// profile that is stored in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileIdentity {
    pub customer_id: i64,
    pub entity_code: String,
}

impl ProfileIdentity {
    #[must_use]
    pub fn new(customer_id: i64, entity_code: impl Into<String>) -> Self {
        Self {
            customer_id,
            entity_code: entity_code.into(),
        }
    }

    /// `true` when no customer is focused.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.customer_id == 0 && self.entity_code.is_empty()
    }
}

/// Edit-flow form state: submitted values and per-field validation errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub values: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
}

impl FormState {
    #[must_use]
    pub fn value(&self, field: &str) -> &str {
        self.values.get(field).map_or("", String::as_str)
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Profile editing state for the focused customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileScope {
    pub identity: ProfileIdentity,
    pub form: FormState,
}

// ---------------------------------------------------------------------------
// CustomerScope
// ---------------------------------------------------------------------------

/// Full customer record as returned by the backing services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub entity_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub opted_in: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub points: i64,
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    pub value: f64,
    pub active: bool,
}

/// The focused customer and derived state. Never persisted; re-fetched per
/// request from the session-stored [`ProfileIdentity`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerScope {
    pub record: Option<CustomerRecord>,
    pub wallet: Option<Wallet>,
    pub promotions: Vec<Promotion>,
    pub vouchers: Vec<Voucher>,
}

impl CustomerScope {
    /// The identity of the loaded record, if any.
    #[must_use]
    pub fn identity(&self) -> Option<ProfileIdentity> {
        self.record
            .as_ref()
            .map(|r| ProfileIdentity::new(r.id, r.entity_code.clone()))
    }

    /// Vouchers that can currently be redeemed.
    pub fn active_vouchers(&self) -> impl Iterator<Item = &Voucher> {
        self.vouchers.iter().filter(|v| v.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_with_businesses() -> SessionScope {
        SessionScope {
            id: 7,
            username: "ana".to_string(),
            businesses: vec![
                Business {
                    id: 1,
                    name: "North".to_string(),
                },
                Business {
                    id: 2,
                    name: "South".to_string(),
                },
            ],
            ..SessionScope::default()
        }
    }

    #[test]
    fn switch_business_takes_name_from_list() {
        let mut scope = scope_with_businesses();
        assert!(scope.switch_business(2));
        assert_eq!(scope.business_id, 2);
        assert_eq!(scope.business_name, "South");
    }

    #[test]
    fn switch_business_rejects_unknown_id() {
        let mut scope = scope_with_businesses();
        assert!(!scope.switch_business(99));
        assert_eq!(scope.business_id, 0);
        assert!(scope.business_name.is_empty());
    }

    #[test]
    fn clear_identity_keeps_pending_flashes() {
        let mut scope = scope_with_businesses();
        scope.add_flash("logged out");
        scope.flashes.push("old".to_string());
        scope.clear_identity();

        assert!(!scope.is_authenticated());
        assert!(scope.businesses.is_empty());
        assert!(scope.flashes.is_empty());
        assert_eq!(scope.pending_flashes, vec!["logged out"]);
    }

    #[test]
    fn search_scope_emptiness_needs_both_fields_empty() {
        assert!(SearchScope::default().is_empty());
        assert!(!SearchScope::new("ana", Vec::new()).is_empty());
        let results = vec![CustomerSummary::default()];
        assert!(!SearchScope::new("", results).is_empty());
    }

    #[test]
    fn profile_identity_none() {
        assert!(ProfileIdentity::default().is_none());
        assert!(!ProfileIdentity::new(3, "").is_none());
        assert!(!ProfileIdentity::new(0, "C-1").is_none());
    }

    #[test]
    fn customer_scope_identity_and_vouchers() {
        let scope = CustomerScope {
            record: Some(CustomerRecord {
                id: 12,
                entity_code: "C-12".to_string(),
                ..CustomerRecord::default()
            }),
            vouchers: vec![
                Voucher {
                    code: "A".to_string(),
                    value: 5.0,
                    active: true,
                },
                Voucher {
                    code: "B".to_string(),
                    value: 5.0,
                    active: false,
                },
            ],
            ..CustomerScope::default()
        };

        assert_eq!(scope.identity(), Some(ProfileIdentity::new(12, "C-12")));
        let active: Vec<_> = scope.active_vouchers().map(|v| v.code.as_str()).collect();
        assert_eq!(active, vec!["A"]);
    }

    #[test]
    fn form_state_value_defaults_to_empty() {
        let mut form = FormState::default();
        form.values.insert("email".to_string(), "a@b.c".to_string());
        assert_eq!(form.value("email"), "a@b.c");
        assert_eq!(form.value("phone"), "");
        assert!(!form.has_errors());
    }
}
