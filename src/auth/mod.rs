pub mod cache;
pub mod clients;
pub mod codes;
pub mod google;
pub mod session;
pub mod tokens;
