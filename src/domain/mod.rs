// Domain layer - Dashboard data model and pure layout/parameter logic
pub mod dashboard;
pub mod layout;
pub mod parameters;
pub mod position;
pub mod query_result;
pub mod sizing;
pub mod widget;
