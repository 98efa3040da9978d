mod app_config;

pub use app_config::{
    AppConfig,
    AutoCleanConfig,
    DisplayMetric,
    TimingConfig,
    load_config_or_default,
    load_or_create_config,
};
