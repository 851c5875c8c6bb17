pub mod cards;
pub mod pagination;
pub mod users;
