pub mod admin;
pub mod lottery;
pub mod webhook;

pub use admin::admin_config;
pub use lottery::lottery_config;
pub use webhook::webhook_config;
