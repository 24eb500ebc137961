mod entrance;
mod options;
mod wiring;

pub use entrance::Entrance;
pub use options::EntranceOptions;
pub use wiring::try_create_entrance;
pub use wiring::EntranceConfig;
pub use wiring::EntranceCreationError;
