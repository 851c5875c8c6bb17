use std::fmt::Display;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// Query-string integer where an empty value (`?page=`) reads as zero.
pub(crate) fn empty_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Ok(T::default());
    }
    value.parse().map_err(de::Error::custom)
}

/// Like [`empty_as_default`], but an empty value reads as absent.
pub(crate) fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(de::Error::custom)
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// One page of an ordered listing together with the totals of the whole
/// result set. `page` and `size` echo the request and are omitted when unset.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination<T> {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub page: i64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: i64,
    pub pages_count: i64,
    pub items_count: i64,
    pub items: Vec<T>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct PageRequest {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub size: i64,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    /// A non-positive size means the listing is unbounded.
    pub fn limit(&self) -> i64 {
        if self.size <= 0 {
            i64::from(i32::MAX)
        } else {
            self.size
        }
    }

    pub fn offset(&self) -> i64 {
        if self.page <= 0 || self.size <= 0 {
            return 0;
        }
        (self.page - 1).saturating_mul(self.size)
    }

    pub fn pages_count(&self, items_count: i64) -> i64 {
        let limit = self.limit();
        let mut pages = items_count / limit;
        if items_count % limit > 0 {
            pages += 1;
        }
        pages
    }

    pub fn into_pagination<T>(self, items: Vec<T>, items_count: i64) -> Pagination<T> {
        Pagination {
            page: self.page,
            size: self.size,
            pages_count: self.pages_count(items_count),
            items_count,
            items,
        }
    }
}
