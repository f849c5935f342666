pub mod audit_logs;
pub mod draw_participations;
pub mod draws;
pub mod settings;
pub mod tickets;
pub mod users;
pub mod winners;

pub use audit_logs as audit_log_entity;
pub use draw_participations as participation_entity;
pub use draws as draw_entity;
pub use settings as setting_entity;
pub use tickets as ticket_entity;
pub use users as user_entity;
pub use winners as winner_entity;

pub use draws::DrawStatus;
pub use tickets::TicketSource;
