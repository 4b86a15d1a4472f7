pub mod icons;
pub mod turn;

pub use turn::{EventRenderer, TurnUI, format_event};
