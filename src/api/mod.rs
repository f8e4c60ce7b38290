pub mod auth;
pub mod models;

pub use auth::{AdminCredentials, AuthApi, LoginRequest, RegisterRequest, UserProfile};
pub use models::ModelApi;
