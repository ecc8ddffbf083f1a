use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, io::Write, path::PathBuf};

use crate::balloon::BalloonIcon;
use crate::icon::IconSource;
use crate::menu::{Command, Menu, MenuItem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub tooltip: String,
    #[serde(default)]
    pub icon: IconSource,
    #[serde(default)]
    pub menu: Vec<MenuEntryConfig>,
    /// Shown when the icon is left-clicked.
    #[serde(default)]
    pub balloon: BalloonConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BalloonConfig {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub icon: BalloonIcon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MenuEntryConfig {
    Item {
        text: String,
        action: Action,
        #[serde(default)]
        checked: bool,
        #[serde(default)]
        icon: Option<IconSource>,
    },
    Separator,
    Submenu {
        text: String,
        entries: Vec<MenuEntryConfig>,
    },
}

/// What a configured menu item does when clicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Balloon { title: String, text: String },
    /// Flips the item's own check mark.
    Toggle,
    OpenConfig,
    Exit,
}

#[derive(Debug, Clone)]
pub struct Paths {
    pub cfg_file: PathBuf,
    pub cfg_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tooltip: "Tray Host".into(),
            icon: IconSource::default(),
            menu: vec![
                MenuEntryConfig::Item {
                    text: "Say hello".into(),
                    action: Action::Balloon {
                        title: "Tray Host".into(),
                        text: "Hello from the notification area".into(),
                    },
                    checked: false,
                    icon: None,
                },
                MenuEntryConfig::Item {
                    text: "Enabled".into(),
                    action: Action::Toggle,
                    checked: true,
                    icon: None,
                },
                MenuEntryConfig::Separator,
                MenuEntryConfig::Item {
                    text: "Open config".into(),
                    action: Action::OpenConfig,
                    checked: false,
                    icon: None,
                },
                MenuEntryConfig::Item {
                    text: "Exit".into(),
                    action: Action::Exit,
                    checked: false,
                    icon: None,
                },
            ],
            balloon: BalloonConfig {
                title: "Tray Host".into(),
                text: "Right-click for the menu".into(),
                icon: BalloonIcon::Info,
            },
        }
    }
}

impl Config {
    /// Builds the context menu. Each item gets a command named after its
    /// position (`item-0`, `item-3.1`, ...) mapped to its action.
    pub fn build_menu(&self) -> (Menu, HashMap<Command, Action>) {
        let mut actions = HashMap::new();
        let menu = build_entries(&self.menu, "", &mut actions);
        (menu, actions)
    }
}

fn build_entries(
    entries: &[MenuEntryConfig],
    prefix: &str,
    actions: &mut HashMap<Command, Action>,
) -> Menu {
    let mut menu = Menu::new();
    for (idx, entry) in entries.iter().enumerate() {
        let path = if prefix.is_empty() {
            idx.to_string()
        } else {
            format!("{prefix}.{idx}")
        };
        menu = match entry {
            MenuEntryConfig::Item {
                text,
                action,
                checked,
                icon,
            } => {
                let command = Command::new(format!("item-{path}"));
                actions.insert(command.clone(), action.clone());
                let mut item = MenuItem::new(text.as_str(), command).checked(*checked);
                if let Some(icon) = icon {
                    item = item.icon(icon.clone());
                }
                menu.item(item)
            }
            MenuEntryConfig::Separator => menu.separator(),
            MenuEntryConfig::Submenu { text, entries } => {
                menu.submenu(text.as_str(), build_entries(entries, &path, actions))
            }
        };
    }
    menu
}

pub fn project_paths() -> Result<Paths> {
    let dirs = ProjectDirs::from("com", "TaskbarTools", "TrayHost")
        .context("Failed to determine project directories")?;
    let cfg_dir = dirs.config_dir().to_path_buf();
    let cfg_file = cfg_dir.join("trayhost.json");
    let log_dir = dirs.data_local_dir().join("logs");
    Ok(Paths {
        cfg_file,
        cfg_dir,
        log_dir,
    })
}

pub fn load_or_default() -> Result<(Config, Paths)> {
    let paths = project_paths()?;
    fs::create_dir_all(&paths.cfg_dir).ok();
    fs::create_dir_all(&paths.log_dir).ok();
    let cfg = load_from(&paths);
    Ok((cfg, paths))
}

/// Reads `paths.cfg_file`; a missing or malformed file yields the defaults.
pub fn load_from(paths: &Paths) -> Config {
    match fs::read_to_string(&paths.cfg_file) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!(file = %paths.cfg_file.display(), error = %e, "config unreadable, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

pub fn save_atomic(cfg: &Config, paths: &Paths) -> Result<()> {
    fs::create_dir_all(&paths.cfg_dir).ok();
    let tmp = paths.cfg_file.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(cfg)?;
    {
        let mut f = fs::File::create(&tmp).context("create temp cfg")?;
        f.write_all(&data).context("write temp cfg")?;
        f.sync_all().ok();
    }
    fs::rename(&tmp, &paths.cfg_file).context("rename temp to final")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_items_get_path_commands() {
        let cfg = Config {
            menu: vec![
                MenuEntryConfig::Separator,
                MenuEntryConfig::Submenu {
                    text: "More".into(),
                    entries: vec![MenuEntryConfig::Item {
                        text: "Quit".into(),
                        action: Action::Exit,
                        checked: false,
                        icon: None,
                    }],
                },
            ],
            ..Config::default()
        };
        let (menu, actions) = cfg.build_menu();
        let items = menu.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].command.name(), "item-1.0");
        assert_eq!(actions.get(&items[0].command), Some(&Action::Exit));
    }

    #[test]
    fn default_menu_has_every_action() {
        let (menu, actions) = Config::default().build_menu();
        assert_eq!(menu.items().len(), actions.len());
        assert!(actions.values().any(|a| *a == Action::Exit));
        assert!(actions.values().any(|a| *a == Action::OpenConfig));
        let toggle = menu
            .items()
            .into_iter()
            .find(|i| actions.get(&i.command) == Some(&Action::Toggle))
            .unwrap();
        assert!(toggle.checked);
    }

    #[test]
    fn entries_use_tagged_json() {
        let json = r#"[
            {"kind":"item","text":"Hi","action":{"type":"balloon","title":"T","text":"B"}},
            {"kind":"separator"}
        ]"#;
        let entries: Vec<MenuEntryConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(
            entries[0],
            MenuEntryConfig::Item {
                text: "Hi".into(),
                action: Action::Balloon {
                    title: "T".into(),
                    text: "B".into()
                },
                checked: false,
                icon: None,
            }
        );
        assert_eq!(entries[1], MenuEntryConfig::Separator);
    }
}
