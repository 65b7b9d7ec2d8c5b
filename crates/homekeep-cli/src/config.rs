use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use homekeep_core::models::PlannerConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "homekeep.toml";
pub const ENV_PREFIX: &str = "HOMEKEEP_";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite file; an empty value leaves the store unconfigured
    pub database_path: Option<String>,
    /// Whose chores to show
    pub user: Option<String>,
    /// IANA zone for displaying dates; the system zone when unset
    pub timezone: Option<String>,
    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
    #[serde(default)]
    pub planner: PlannerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: Some("homekeep.db".to_string()),
            user: Some("local".to_string()),
            timezone: None,
            log_level: "warn".to_string(),
            planner: PlannerSettings::default(),
        }
    }
}

/// Window and projection settings handed to the core planner
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlannerSettings {
    pub lookahead_days: u32,
    pub grace_days: u32,
    pub include_completed: bool,
    pub max_projection_steps: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        let core = PlannerConfig::default();
        Self {
            lookahead_days: core.lookahead_days,
            grace_days: core.grace_days,
            include_completed: core.include_completed,
            max_projection_steps: core.max_projection_steps,
        }
    }
}

impl From<PlannerSettings> for PlannerConfig {
    fn from(settings: PlannerSettings) -> Self {
        Self {
            lookahead_days: settings.lookahead_days,
            grace_days: settings.grace_days,
            include_completed: settings.include_completed,
            max_projection_steps: settings.max_projection_steps,
        }
    }
}

impl Config {
    /// Defaults, then `homekeep.toml`, then `HOMEKEEP_*` variables.
    /// Nested keys use a double underscore: `HOMEKEEP_PLANNER__LOOKAHEAD_DAYS`.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::load()?;
            assert_eq!(config, Config::default());
            assert_eq!(config.planner.lookahead_days, 30);
            assert_eq!(config.planner.grace_days, 3);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                database_path = "/tmp/house.db"
                user = "alex"
                timezone = "Europe/Berlin"

                [planner]
                lookahead_days = 14
                "#,
            )?;
            jail.set_env("HOMEKEEP_USER", "sam");
            jail.set_env("HOMEKEEP_PLANNER__GRACE_DAYS", "7");

            let config = Config::load()?;
            assert_eq!(config.database_path.as_deref(), Some("/tmp/house.db"));
            assert_eq!(config.user.as_deref(), Some("sam"));
            assert_eq!(config.timezone.as_deref(), Some("Europe/Berlin"));
            assert_eq!(config.planner.lookahead_days, 14);
            assert_eq!(config.planner.grace_days, 7);
            assert!(config.planner.include_completed);
            Ok(())
        });
    }

    #[test]
    fn test_planner_settings_map_onto_core_config() {
        let core: PlannerConfig = PlannerSettings {
            lookahead_days: 10,
            grace_days: 1,
            include_completed: false,
            max_projection_steps: 50,
        }
        .into();
        assert_eq!(core.lookahead_days, 10);
        assert_eq!(core.grace_days, 1);
        assert!(!core.include_completed);
        assert_eq!(core.max_projection_steps, 50);
    }
}
