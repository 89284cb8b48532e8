pub mod arm;
pub mod cost;
pub mod params;
