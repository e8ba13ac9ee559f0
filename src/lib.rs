// Dashboard layout reconciliation and parameter propagation engine
pub mod application;
pub mod domain;
pub mod infrastructure;
