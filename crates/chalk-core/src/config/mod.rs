pub mod settings;

pub use settings::{
    ChalkConfig, CommandAgentSettings, FieldGateSettings, HaltSettings, KeySettings,
    SchedulerSettings, StoreSettings, SummarySettings, DEFAULT_CONFIG_FILE,
};
