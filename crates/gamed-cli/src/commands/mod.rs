pub mod blueprints;
pub mod grain_id;
pub mod serve;
