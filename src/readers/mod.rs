pub mod lake;
pub mod roster;

pub use lake::{create_lake_db, insert_raw_observation, read_station_lake};
pub use roster::read_roster;
