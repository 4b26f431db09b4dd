mod config;
mod entry;
mod value;

pub use config::{
    Comparator, Config, PercentageItem, Preferences, RedirectMode, RolloutRule, Setting,
    SettingType,
};
pub use entry::Entry;
pub use value::{SettingValue, Value};
