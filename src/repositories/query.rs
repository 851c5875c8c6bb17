use sqlx::{Postgres, QueryBuilder};

use crate::models::pagination::PageRequest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
}

impl Operator {
    fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => " = ",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    pub column: &'static str,
    pub operator: Operator,
    pub value: Value,
}

/// Conjunction of predicates rendered as a parameterized WHERE clause.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            column,
            operator: Operator::Eq,
            value: value.into(),
        });
        self
    }

    pub fn eq_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Bind indices follow whatever has already been pushed to `builder`.
    pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if self.predicates.is_empty() {
            return;
        }

        builder.push(" WHERE ");
        let mut separated = builder.separated(" AND ");
        for predicate in &self.predicates {
            separated.push(predicate.column);
            separated.push_unseparated(predicate.operator.sql());
            match &predicate.value {
                Value::Int(value) => separated.push_bind_unseparated(*value),
                Value::Text(value) => separated.push_bind_unseparated(value.clone()),
            };
        }
    }
}

pub fn push_limit_offset(builder: &mut QueryBuilder<'_, Postgres>, page: &PageRequest) {
    builder.push(" LIMIT ");
    builder.push_bind(page.limit());
    builder.push(" OFFSET ");
    builder.push_bind(page.offset());
}
