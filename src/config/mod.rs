pub mod constants;
pub mod secrets;
pub mod settings;

pub use settings::Config;
