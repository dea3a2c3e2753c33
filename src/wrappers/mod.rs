pub mod guild;
pub mod member;

pub use guild::GuildWrapper;
pub use member::MemberWrapper;
