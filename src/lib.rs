pub mod acf;
pub mod app_config;
pub mod email;
pub mod favorites;
pub mod media;
pub mod middleware;
pub mod rate_limit;
pub mod reactions;
pub mod reviews;
pub mod web;
pub mod wordpress;
