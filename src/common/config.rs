use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::actor::reactor::Command;
use crate::common::collections::{HashMap, HashSet};
use crate::sys::hotkey::Hotkey;

pub const MAX_WORKSPACES: usize = 10;
const MAX_BORDER_WIDTH: u32 = 32;

pub fn config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tessera").join("tessera.toml"))
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    policy: PolicySettings,
    keys: HashMap<String, Command>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub policy: PolicySettings,
    pub keys: Vec<(Hotkey, Command)>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_workspace_count")]
    pub workspace_count: usize,
    /// Border thickness in pixels, drawn outside each window's content.
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    #[serde(default = "default_focused_border_color")]
    pub focused_border_color: Color,
    #[serde(default = "default_unfocused_border_color")]
    pub unfocused_border_color: Color,
    #[serde(default = "yes")]
    pub focus_follows_mouse: bool,
    /// Switch to a window's workspace when it maps somewhere other than the
    /// current workspace.
    #[serde(default)]
    pub auto_switch_on_map: bool,
    #[serde(default = "default_terminal")]
    pub terminal: String,
    #[serde(default = "default_browser")]
    pub browser: String,
    /// Commands to run once on startup.
    #[serde(default)]
    pub run_on_start: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace_count: default_workspace_count(),
            border_width: default_border_width(),
            focused_border_color: default_focused_border_color(),
            unfocused_border_color: default_unfocused_border_color(),
            focus_follows_mouse: true,
            auto_switch_on_map: false,
            terminal: default_terminal(),
            browser: default_browser(),
            run_on_start: Vec::new(),
        }
    }
}

/// The two allow-lists deciding which windows may be managed.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct PolicySettings {
    #[serde(default = "default_terminal_rule")]
    pub terminal: AppRule,
    #[serde(default = "default_browser_rule")]
    pub browser: AppRule,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            terminal: default_terminal_rule(),
            browser: default_browser_rule(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppRule {
    /// Matched case-insensitively against both `res_class` and `res_name`.
    pub classes: Vec<String>,
    /// Target workspace index (0 based).
    #[serde(default)]
    pub workspace: usize,
}

/// A 24-bit RGB border colour, written as `"#rrggbb"`.
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u32);

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(hex) = s.strip_prefix('#') else {
            bail!("Colour must start with '#': {s}");
        };
        if hex.len() != 6 {
            bail!("Colour must have six hex digits: {s}");
        }
        let value = u32::from_str_radix(hex, 16).with_context(|| format!("Invalid colour {s}"))?;
        Ok(Color(value))
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<Color> for String {
    fn from(c: Color) -> String { c.to_string() }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{:06x}", self.0) }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Display::fmt(self, f) }
}

impl Settings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.workspace_count == 0 {
            issues.push("workspace_count must be at least 1".to_string());
        }
        if self.workspace_count > MAX_WORKSPACES {
            issues.push(format!(
                "workspace_count must not exceed {} (one per digit key)",
                MAX_WORKSPACES
            ));
        }
        if self.border_width > MAX_BORDER_WIDTH {
            issues.push(format!(
                "border_width {} is larger than the maximum of {}",
                self.border_width, MAX_BORDER_WIDTH
            ));
        }
        if self.terminal.trim().is_empty() {
            issues.push("terminal command is empty".to_string());
        }
        if self.browser.trim().is_empty() {
            issues.push("browser command is empty".to_string());
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.workspace_count == 0 {
            self.workspace_count = 1;
            fixes += 1;
        }
        if self.workspace_count > MAX_WORKSPACES {
            self.workspace_count = MAX_WORKSPACES;
            fixes += 1;
        }
        if self.border_width > MAX_BORDER_WIDTH {
            self.border_width = default_border_width();
            fixes += 1;
        }

        fixes
    }
}

impl PolicySettings {
    pub fn validate(&self, workspace_count: usize) -> Vec<String> {
        let mut issues = Vec::new();

        for (name, rule) in [("terminal", &self.terminal), ("browser", &self.browser)] {
            if rule.classes.is_empty() {
                issues.push(format!("policy.{name} has no classes; no such window will be managed"));
            }
            if rule.workspace >= workspace_count {
                issues.push(format!(
                    "policy.{name} references workspace {} but only {} workspaces exist",
                    rule.workspace, workspace_count
                ));
            }
        }

        let terminal: HashSet<String> =
            self.terminal.classes.iter().map(|c| c.to_lowercase()).collect();
        for class in &self.browser.classes {
            if terminal.contains(&class.to_lowercase()) {
                issues.push(format!(
                    "class '{class}' appears in both policy.terminal and policy.browser"
                ));
            }
        }

        issues
    }
}

fn yes() -> bool { true }

fn default_workspace_count() -> usize { 3 }

fn default_border_width() -> u32 { 2 }

fn default_focused_border_color() -> Color { Color(0x5294e2) }

fn default_unfocused_border_color() -> Color { Color(0x3a3a3a) }

fn default_terminal() -> String {
    std::env::var("TERMINAL")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "kitty".to_string())
}

fn default_browser() -> String { "firefox".to_string() }

fn default_terminal_rule() -> AppRule {
    AppRule {
        classes: ["xterm", "urxvt", "terminal", "kitty"].map(String::from).to_vec(),
        workspace: 0,
    }
}

fn default_browser_rule() -> AppRule {
    AppRule {
        classes: vec!["firefox".to_string()],
        workspace: 1,
    }
}

impl Default for Config {
    fn default() -> Config {
        Self::parse(include_str!("../../tessera.default.toml"))
            .expect("built-in configuration must parse")
    }
}

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        Self::parse(&buf).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Read `explicit` if given, else the user config file if it exists,
    /// else fall back to the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match config_file() {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn command_for(&self, hotkey: &Hotkey) -> Option<&Command> {
        self.keys.iter().find(|(hk, _)| hk == hotkey).map(|(_, cmd)| cmd)
    }

    /// Validates the configuration and returns any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.settings.validate());
        issues.extend(self.policy.validate(self.settings.workspace_count));
        for (hotkey, cmd) in &self.keys {
            if let Command::SwitchWorkspace(n) = cmd {
                if *n >= self.settings.workspace_count {
                    issues.push(format!(
                        "key '{hotkey}' switches to workspace {n} but only {} workspaces exist",
                        self.settings.workspace_count
                    ));
                }
            }
        }
        issues
    }

    /// Attempts to fix configuration values automatically.
    /// Returns the number of fixes applied.
    pub fn auto_fix_values(&mut self) -> usize { self.settings.auto_fix_values() }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        let c: ConfigFile = toml::from_str(buf)?;
        let mut keys: Vec<(Hotkey, Command)> = Vec::with_capacity(c.keys.len());
        for (key, cmd) in c.keys {
            let Ok(hotkey) = Hotkey::from_str(&key) else {
                bail!("Could not parse hotkey: {key}");
            };
            if keys.iter().any(|(existing, _)| *existing == hotkey) {
                bail!("Hotkey bound more than once: {key}");
            }
            keys.push((hotkey, cmd));
        }
        Ok(Config {
            settings: c.settings,
            policy: c.policy,
            keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sys::hotkey::{KeyCode, Modifiers};

    #[test]
    fn default_config_parses() {
        let config = Config::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn default_bindings_cover_every_action() {
        let config = Config::default();
        let meta = |k| Hotkey::new(Modifiers::META, k);
        assert_eq!(config.command_for(&meta(KeyCode::Enter)), Some(&Command::SpawnTerminal));
        assert_eq!(config.command_for(&meta(KeyCode::KeyB)), Some(&Command::SpawnBrowser));
        assert_eq!(
            config.command_for(&meta(KeyCode::Digit2)),
            Some(&Command::SwitchWorkspace(1))
        );
        assert_eq!(config.command_for(&meta(KeyCode::KeyL)), Some(&Command::FocusNext));
        assert_eq!(config.command_for(&meta(KeyCode::KeyH)), Some(&Command::FocusPrev));
        assert_eq!(config.command_for(&meta(KeyCode::KeyQ)), Some(&Command::Quit));
        assert_eq!(
            config.command_for(&Hotkey::new(Modifiers::META | Modifiers::SHIFT, KeyCode::KeyC)),
            Some(&Command::KillFocused)
        );
        assert_eq!(config.command_for(&Hotkey::new(Modifiers::ALT, KeyCode::KeyQ)), None);
    }

    #[test]
    fn parses_partial_config_with_defaults() {
        let config = Config::parse(
            r##"
            [settings]
            border_width = 4
            focused_border_color = "#ff0000"
            auto_switch_on_map = true

            [policy.browser]
            classes = ["Chromium"]
            workspace = 2

            [keys]
            "Meta + Enter" = "spawn_terminal"
            "Meta + 3" = { switch_workspace = 2 }
            "Meta + E" = { exec = "thunar" }
            "##,
        )
        .unwrap();

        assert_eq!(config.settings.border_width, 4);
        assert_eq!(config.settings.focused_border_color, Color(0xff0000));
        assert_eq!(config.settings.unfocused_border_color, Color(0x3a3a3a));
        assert!(config.settings.auto_switch_on_map);
        assert!(config.settings.focus_follows_mouse);
        assert_eq!(config.policy.terminal, default_terminal_rule());
        assert_eq!(config.policy.browser.classes, vec!["Chromium".to_string()]);
        assert_eq!(config.policy.browser.workspace, 2);
        assert_eq!(config.keys.len(), 3);
        assert_eq!(
            config.command_for(&Hotkey::new(Modifiers::META, KeyCode::KeyE)),
            Some(&Command::Exec("thunar".to_string()))
        );
    }

    #[test]
    fn rejects_bad_hotkeys_and_colors() {
        let err = Config::parse("[keys]\n\"Meta + Pause\" = \"quit\"\n").unwrap_err();
        assert!(err.to_string().contains("Could not parse hotkey"));

        let err = Config::parse("[keys]\n\"Meta+q\" = \"quit\"\n\"meta + Q\" = \"focus_next\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));

        assert!(
            Config::parse("[settings]\nfocused_border_color = \"red\"\n[keys]\n").is_err()
        );
        assert!(Config::parse("[settings]\nunknown = 1\n[keys]\n").is_err());
    }

    #[test]
    fn validation_reports_policy_problems() {
        let mut config = Config::default();
        config.policy.browser.classes.push("XTerm".to_string());
        config.policy.browser.workspace = 7;
        config.keys.push((
            Hotkey::new(Modifiers::META, KeyCode::Digit9),
            Command::SwitchWorkspace(8),
        ));

        let issues = config.validate();
        assert_eq!(issues.len(), 3, "{issues:?}");
        assert!(issues.iter().any(|i| i.contains("'XTerm' appears in both")));
        assert!(issues.iter().any(|i| i.contains("policy.browser references workspace 7")));
        assert!(issues.iter().any(|i| i.contains("switches to workspace 8")));
    }

    #[test]
    fn auto_fix_repairs_numeric_settings() {
        let mut config = Config::default();

        config.settings.workspace_count = 0;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("workspace_count must be at least 1")));
        assert_eq!(config.auto_fix_values(), 1);
        assert_eq!(config.settings.workspace_count, 1);

        config.settings.workspace_count = 3;
        config.settings.border_width = 500;
        assert_eq!(config.validate().len(), 1);
        assert_eq!(config.auto_fix_values(), 1);
        assert_eq!(config.settings.border_width, 2);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn reads_config_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[settings]\nworkspace_count = 5\n[keys]\n\"Alt + Tab\" = \"focus_next\"")
            .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.settings.workspace_count, 5);
        assert_eq!(
            config.command_for(&Hotkey::new(Modifiers::ALT, KeyCode::Tab)),
            Some(&Command::FocusNext)
        );

        let missing = file.path().with_extension("missing");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    fn color_round_trips_through_string() {
        let c: Color = "#0a0B0c".parse().unwrap();
        assert_eq!(c, Color(0x0a0b0c));
        assert_eq!(c.to_string(), "#0a0b0c");
        assert!("#12345".parse::<Color>().is_err());
        assert!("123456".parse::<Color>().is_err());
    }
}
