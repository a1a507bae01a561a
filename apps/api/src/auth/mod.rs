pub mod federated;
pub mod handlers;
pub mod password;
pub mod policy;
pub mod reconciler;
