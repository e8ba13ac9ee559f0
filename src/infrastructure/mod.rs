// Infrastructure layer - Configuration and adapters for the collaborator traits
pub mod config;
pub mod http_api;
pub mod location;
pub mod notifier;
