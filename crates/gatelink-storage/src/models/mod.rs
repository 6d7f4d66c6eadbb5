pub mod access_log;
pub mod token;
pub mod user;

pub use access_log::AccessLog;
pub use token::RfidToken;
pub use user::User;
