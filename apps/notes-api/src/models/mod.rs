pub mod id;
pub mod meeting;
pub mod transcript;
