pub mod settings;
pub mod worldgen;
