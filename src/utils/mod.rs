pub mod confirmation_code;
pub mod jwt;
pub mod schedule;
pub mod signature;

pub use confirmation_code::generate_confirmation_code;
pub use jwt::*;
pub use schedule::next_draw_date;
pub use signature::{survey_callback_hash, verify_survey_callback};
