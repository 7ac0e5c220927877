pub mod actions;
pub mod engine;
pub mod errors;
pub mod events;
pub mod legals;
pub mod positions;
pub mod pots;
pub mod rules;
pub mod state;
pub mod types;

pub use actions::*;
pub use engine::*;
pub use errors::*;
pub use events::*;
pub use legals::*;
pub use positions::*;
pub use pots::*;
pub use state::*;
pub use types::*;
