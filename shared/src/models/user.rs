//! Role and permission models
//!
//! Users and tokens are managed by the identity service; this crate only
//! knows the permission vocabulary carried in token claims.

use serde::{Deserialize, Serialize};

/// A permission granting access to a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
}

impl Permission {
    /// Claim strings for every action, e.g. `sale:create`
    pub fn claims(&self) -> Vec<String> {
        self.actions
            .iter()
            .map(|action| permission_claim(self.resource, *action))
            .collect()
    }
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Product,
    Stock,
    Sale,
    Report,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Product => "product",
            Resource::Stock => "stock",
            Resource::Sale => "sale",
            Resource::Report => "report",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Format a permission the way it appears in token claims
pub fn permission_claim(resource: Resource, action: Action) -> String {
    format!("{}:{}", resource.as_str(), action.as_str())
}

/// Standard pharmacy roles and their permissions
pub fn default_roles() -> Vec<(&'static str, Vec<Permission>)> {
    vec![
        (
            "admin",
            vec![
                Permission {
                    resource: Resource::Product,
                    actions: vec![Action::Read, Action::Create, Action::Update, Action::Delete],
                },
                Permission {
                    resource: Resource::Stock,
                    actions: vec![Action::Read, Action::Update],
                },
                Permission {
                    resource: Resource::Sale,
                    actions: vec![Action::Read, Action::Create, Action::Update, Action::Delete],
                },
                Permission {
                    resource: Resource::Report,
                    actions: vec![Action::Read],
                },
            ],
        ),
        (
            "pharmacist",
            vec![
                Permission {
                    resource: Resource::Product,
                    actions: vec![Action::Read, Action::Create, Action::Update],
                },
                Permission {
                    resource: Resource::Stock,
                    actions: vec![Action::Read, Action::Update],
                },
                Permission {
                    resource: Resource::Sale,
                    actions: vec![Action::Read, Action::Create, Action::Update],
                },
                Permission {
                    resource: Resource::Report,
                    actions: vec![Action::Read],
                },
            ],
        ),
        (
            "staff",
            vec![
                Permission {
                    resource: Resource::Product,
                    actions: vec![Action::Read],
                },
                Permission {
                    resource: Resource::Stock,
                    actions: vec![Action::Read],
                },
                Permission {
                    resource: Resource::Sale,
                    actions: vec![Action::Read, Action::Create],
                },
            ],
        ),
    ]
}
