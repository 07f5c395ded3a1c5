pub mod loader;
pub mod schema;
pub mod template;

pub use loader::{load_config, load_config_from_str, validate_config, validate_system_settings};
pub use schema::{
    AiVendor, Config, EngineConfig, KeySource, OcrEngine, ProcessingSettings, Prompt,
    SettingsId, SystemSettings,
};
pub use template::TemplateVariable;
