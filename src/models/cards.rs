use serde::{Deserialize, Serialize};

use super::pagination::{empty_as_default, empty_as_none, PageRequest};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, sqlx::FromRow)]
pub struct CardInfo {
    pub card_id: i64,
    pub user_id: i64,
    pub user_full_name: String,
    pub balance: i64,
    pub create_time: chrono::NaiveDateTime,
}

/// Listing parameters for cards. A missing or zero `user_id` lists every card.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CardFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub page: i64,
    #[serde(default, deserialize_with = "empty_as_default")]
    pub size: i64,
}

impl CardFilter {
    pub fn owner(&self) -> Option<i64> {
        self.user_id.filter(|id| *id != 0)
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.size)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NewCard {
    pub user_id: i64,
    #[serde(default)]
    pub balance: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UpdateCard {
    pub balance: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Refill {
    pub add_balance: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Transfer {
    pub card_from: i64,
    pub card_to: i64,
    pub add_balance: i64,
}
