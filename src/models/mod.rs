pub mod comment;
pub mod contact;
pub mod membership;
pub mod post;
pub mod session;
pub mod settings;
pub mod stats;
pub mod theme;
pub mod user;
