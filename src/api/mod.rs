//! Typed helpers over the gateway for the hub's views.

pub mod logs;
pub mod users;
