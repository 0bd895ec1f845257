use crate::config::ConfigOverrides;
use crate::filter::SearchMode;
use anyhow::{anyhow, bail, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    #[default]
    List,
    Clean,
    Restore,
    RestoreAll,
    Duplicate,
    Help,
}

impl Command {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "list" => Some(Command::List),
            "clean" => Some(Command::Clean),
            "restore" => Some(Command::Restore),
            "restore-all" => Some(Command::RestoreAll),
            "duplicate" => Some(Command::Duplicate),
            "help" | "--help" | "-h" => Some(Command::Help),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOptions {
    pub command: Command,
    pub project: Option<PathBuf>,
    pub scene: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub material: Option<String>,
    include_inactive: Option<bool>,
    preview: Option<bool>,
    backups: Option<bool>,
    search: Option<String>,
    search_mode: Option<SearchMode>,
}

impl CliOptions {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = CliOptions::default();
        let mut command_seen = false;
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw) = iter.next() {
            let arg = raw.as_ref();
            if !arg.starts_with("--") || arg == "--help" {
                let command = Command::parse(arg).ok_or_else(|| anyhow!("Unknown command '{arg}'"))?;
                if command_seen {
                    bail!("Unexpected argument '{arg}'. Only one command may be given.");
                }
                options.command = command;
                command_seen = true;
                continue;
            }
            let key = &arg[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{arg}'"))?.as_ref().to_string();
            match key {
                "project" => options.project = Some(PathBuf::from(value)),
                "scene" => options.scene = Some(PathBuf::from(value)),
                "config" => options.config = Some(PathBuf::from(value)),
                "material" => options.material = Some(value),
                "include-inactive" => options.include_inactive = Some(parse_switch("include-inactive", &value)?),
                "preview" => options.preview = Some(parse_switch("preview", &value)?),
                "backups" => options.backups = Some(parse_switch("backups", &value)?),
                "search" => options.search = Some(value),
                "search-mode" => options.search_mode = Some(parse_search_mode(&value)?),
                _ => bail!(
                    "Unknown flag '{arg}'. Supported flags: --project, --scene, --config, --material, \
                     --include-inactive, --preview, --backups, --search, --search-mode."
                ),
            }
        }
        Ok(options)
    }

    pub fn config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            include_inactive: self.include_inactive,
            preview_mode: self.preview,
            create_backups: self.backups,
            search_mode: self.search_mode,
            search_query: self.search.clone(),
        }
    }
}

/// Switch flags take on/off; yes/no and true/false are accepted as well.
fn parse_switch(flag: &str, value: &str) -> Result<bool> {
    let lowered = value.trim().to_ascii_lowercase();
    if ["on", "yes", "true"].contains(&lowered.as_str()) {
        return Ok(true);
    }
    if ["off", "no", "false"].contains(&lowered.as_str()) {
        return Ok(false);
    }
    bail!("--{flag} expects on or off, got '{value}'")
}

fn parse_search_mode(value: &str) -> Result<SearchMode> {
    match value.to_ascii_lowercase().as_str() {
        "material" | "shader" | "material-and-shader" => Ok(SearchMode::MaterialAndShader),
        "entity" | "object" => Ok(SearchMode::Entity),
        other => bail!("Invalid search-mode '{other}'. Use material or entity."),
    }
}
