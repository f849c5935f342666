pub mod draw_service;
pub mod participation_service;
pub mod reconciliation_service;
pub mod resolution_service;
pub mod settings_service;
pub mod ticket_service;
pub mod user_service;

pub use draw_service::*;
pub use participation_service::*;
pub use reconciliation_service::*;
pub use resolution_service::*;
pub use settings_service::*;
pub use ticket_service::*;
pub use user_service::*;
