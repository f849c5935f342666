pub mod admin;
pub mod common;
pub mod draw;
pub mod pagination;
pub mod survey;
pub mod ticket;
pub mod user;
pub mod winner;

pub use admin::*;
pub use common::*;
pub use draw::*;
pub use pagination::*;
pub use survey::*;
pub use ticket::*;
pub use user::*;
pub use winner::*;
