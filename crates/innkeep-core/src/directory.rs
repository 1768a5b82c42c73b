use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filter::Filterable;
use crate::interval::DateInterval;

/// A property owner in the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub uuid: Uuid,

    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub property: String,
}

impl Owner {
    pub fn new(name: String) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name,
            email: String::new(),
            phone: String::new(),
            property: String::new(),
        }
    }
}

impl Filterable for Owner {
    fn id(&self) -> Option<u64> {
        None
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name, &self.email, &self.property]
    }

    fn status_token(&self) -> &str {
        ""
    }

    fn interval(&self) -> Option<DateInterval> {
        None
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Staff,
}

impl Role {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "staff" => Some(Self::Staff),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Staff => "staff",
        }
    }
}

/// A dashboard operator account. Sessions only record who is working;
/// there is no credential check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uuid: Uuid,

    pub username: String,

    #[serde(default)]
    pub name: String,

    pub role: Role,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(username: String, role: Role) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            username,
            name: String::new(),
            role,
            active: true,
        }
    }
}

impl Filterable for User {
    fn id(&self) -> Option<u64> {
        None
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![&self.username, &self.name]
    }

    fn status_token(&self) -> &str {
        self.role.as_str()
    }

    fn interval(&self) -> Option<DateInterval> {
        None
    }
}
