use serde::{Deserialize, Serialize};

use super::pagination::{empty_as_default, PageRequest};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, sqlx::FromRow)]
pub struct UserInfo {
    pub user_id: i64,
    pub user_full_name: String,
    pub create_time: chrono::NaiveDateTime,
}

/// Listing parameters for users. An empty `user_name` lists every user.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct UserFilter {
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub page: i64,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub size: i64,
}

impl UserFilter {
    pub fn full_name(&self) -> Option<&str> {
        self.user_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.size)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NewUser {
    pub user_full_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpdateUser {
    pub user_full_name: String,
}
