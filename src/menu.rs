//! Context menu model and the per-thread command table.
//!
//! Menus are plain data. The native popup is rebuilt from this model every
//! time it opens, so edits made from a menu-opening handler show up right
//! away.

use std::cell::RefCell;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::icon::{Bitmap, IconSource};

/// Identifier carried by a menu item and handed to the icon's command sink
/// when the item is clicked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub text: String,
    pub command: Command,
    pub checked: bool,
    pub visible: bool,
    pub enabled: bool,
    pub icon: Option<IconSource>,
}

impl MenuItem {
    pub fn new(text: impl Into<String>, command: Command) -> Self {
        Self {
            text: text.into(),
            command,
            checked: false,
            visible: true,
            enabled: true,
            icon: None,
        }
    }

    pub fn checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn icon(mut self, icon: IconSource) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Sets visibility and enabled state before the menu is attached.
    /// A hidden item is never enabled.
    pub fn prepare(mut self, visible: bool, enabled: bool) -> Self {
        self.visible = visible;
        self.enabled = visible && enabled;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuEntry {
    Item(MenuItem),
    Separator,
    Submenu { text: String, menu: Menu },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Menu {
    entries: Vec<MenuEntry>,
}

impl Menu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, item: MenuItem) -> Self {
        self.entries.push(MenuEntry::Item(item));
        self
    }

    pub fn separator(mut self) -> Self {
        self.entries.push(MenuEntry::Separator);
        self
    }

    pub fn submenu(mut self, text: impl Into<String>, menu: Menu) -> Self {
        self.entries.push(MenuEntry::Submenu {
            text: text.into(),
            menu,
        });
        self
    }

    pub fn push(&mut self, entry: MenuEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[MenuEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Leaf items, depth first. The position in this sequence plus one is the
    /// item's native menu id.
    pub fn items(&self) -> Vec<&MenuItem> {
        let mut out = Vec::new();
        collect(&self.entries, &mut out);
        out
    }

    pub fn item_by_native_id(&self, id: u32) -> Option<&MenuItem> {
        let idx = (id as usize).checked_sub(1)?;
        self.items().into_iter().nth(idx)
    }

    pub fn find(&self, command: &Command) -> Option<&MenuItem> {
        self.items().into_iter().find(|i| &i.command == command)
    }

    pub fn find_mut(&mut self, command: &Command) -> Option<&mut MenuItem> {
        find_in(&mut self.entries, command)
    }
}

fn collect<'a>(entries: &'a [MenuEntry], out: &mut Vec<&'a MenuItem>) {
    for entry in entries {
        match entry {
            MenuEntry::Item(item) => out.push(item),
            MenuEntry::Submenu { menu, .. } => collect(&menu.entries, out),
            MenuEntry::Separator => {}
        }
    }
}

fn find_in<'a>(entries: &'a mut [MenuEntry], command: &Command) -> Option<&'a mut MenuItem> {
    for entry in entries.iter_mut() {
        match entry {
            MenuEntry::Item(item) if &item.command == command => return Some(item),
            MenuEntry::Submenu { menu, .. } => {
                if let Some(found) = find_in(&mut menu.entries, command) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}

// Menus of the icons alive on this thread, keyed by icon id.
thread_local! {
    static MENUS: RefCell<Vec<(u32, Menu)>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn attach(icon_id: u32, menu: Menu) {
    MENUS.with(|m| {
        let mut menus = m.borrow_mut();
        menus.retain(|(id, _)| *id != icon_id);
        menus.push((icon_id, menu));
    });
}

pub(crate) fn detach(icon_id: u32) {
    MENUS.with(|m| m.borrow_mut().retain(|(id, _)| *id != icon_id));
}

/// Snapshot of an icon's menu, taken so no borrow is held while the native
/// popup runs its own message loop.
pub(crate) fn snapshot(icon_id: u32) -> Option<Menu> {
    MENUS.with(|m| {
        m.borrow()
            .iter()
            .find(|(id, _)| *id == icon_id)
            .map(|(_, menu)| menu.clone())
    })
}

fn with_item<R>(command: &Command, f: impl FnOnce(&mut MenuItem) -> R) -> Result<R> {
    MENUS.with(|m| {
        let mut menus = m.borrow_mut();
        menus
            .iter_mut()
            .find_map(|(_, menu)| menu.find_mut(command))
            .map(f)
            .ok_or_else(|| Error::InvalidCommand(command.clone()))
    })
}

/// Flips the check mark of the item bound to `command`; returns the new state.
pub fn toggle_menu_check(command: &Command) -> Result<bool> {
    with_item(command, |item| {
        item.checked = !item.checked;
        item.checked
    })
}

pub fn is_menu_checked(command: &Command) -> Result<bool> {
    with_item(command, |item| item.checked)
}

pub fn set_menu_check(command: &Command, checked: bool) -> Result<()> {
    with_item(command, |item| item.checked = checked)
}

pub fn set_menu_text(command: &Command, text: &str) -> Result<()> {
    with_item(command, |item| item.text = text.to_string())
}

pub fn set_menu_visible(command: &Command, visible: bool) -> Result<()> {
    with_item(command, |item| item.visible = visible)
}

pub fn set_menu_enabled(command: &Command, enabled: bool) -> Result<()> {
    with_item(command, |item| item.enabled = enabled)
}

/// Sets or clears the image shown next to the item.
pub fn set_menu_icon(command: &Command, icon: Option<IconSource>) -> Result<()> {
    with_item(command, |item| item.icon = icon)
}

/// Shows a caller-supplied image next to the item.
pub fn set_menu_bitmap(command: &Command, bitmap: Bitmap) -> Result<()> {
    set_menu_icon(command, Some(IconSource::Bitmap(bitmap)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::StockIcon;

    fn cmd(name: &str) -> Command {
        Command::new(name)
    }

    fn sample() -> Menu {
        Menu::new()
            .item(MenuItem::new("Open", cmd("open")))
            .separator()
            .submenu(
                "Mode",
                Menu::new()
                    .item(MenuItem::new("Fast", cmd("fast")).checked(true))
                    .item(MenuItem::new("Slow", cmd("slow"))),
            )
            .item(MenuItem::new("Exit", cmd("exit")))
    }

    #[test]
    fn native_ids_follow_depth_first_order() {
        let menu = sample();
        let names: Vec<_> = menu.items().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(names, ["Open", "Fast", "Slow", "Exit"]);
        assert_eq!(menu.item_by_native_id(3).map(|i| i.text.as_str()), Some("Slow"));
        assert!(menu.item_by_native_id(0).is_none());
        assert!(menu.item_by_native_id(5).is_none());
    }

    #[test]
    fn prepare_hidden_item_is_disabled() {
        let item = MenuItem::new("Hidden", cmd("h")).prepare(false, true);
        assert!(!item.visible);
        assert!(!item.enabled);
        let item = MenuItem::new("Grey", cmd("g")).prepare(true, false);
        assert!(item.visible);
        assert!(!item.enabled);
    }

    #[test]
    fn table_operations_reach_nested_items() {
        attach(9001, sample());
        assert!(is_menu_checked(&cmd("fast")).unwrap());
        assert!(!toggle_menu_check(&cmd("fast")).unwrap());
        assert!(toggle_menu_check(&cmd("slow")).unwrap());
        set_menu_text(&cmd("exit"), "Quit").unwrap();
        set_menu_enabled(&cmd("open"), false).unwrap();
        set_menu_visible(&cmd("open"), false).unwrap();
        set_menu_icon(&cmd("exit"), Some(IconSource::Stock(StockIcon::Error))).unwrap();

        let menu = snapshot(9001).unwrap();
        let exit = menu.find(&cmd("exit")).unwrap();
        assert_eq!(exit.text, "Quit");
        assert_eq!(exit.icon, Some(IconSource::Stock(StockIcon::Error)));
        let open = menu.find(&cmd("open")).unwrap();
        assert!(!open.enabled && !open.visible);
        detach(9001);
    }

    #[test]
    fn bitmap_replaces_item_icon() {
        attach(9003, sample());
        let bmp = Bitmap::new(1, 2, vec![0xFF00_00FF, 0x8000_0080]).unwrap();
        set_menu_bitmap(&cmd("open"), bmp.clone()).unwrap();
        let menu = snapshot(9003).unwrap();
        assert_eq!(
            menu.find(&cmd("open")).unwrap().icon,
            Some(IconSource::Bitmap(bmp))
        );
        set_menu_icon(&cmd("open"), None).unwrap();
        assert_eq!(snapshot(9003).unwrap().find(&cmd("open")).unwrap().icon, None);
        detach(9003);
    }

    #[test]
    fn unknown_command_is_invalid() {
        attach(9002, sample());
        let err = set_menu_check(&cmd("nope"), true).unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(c) if c.name() == "nope"));
        detach(9002);
        assert!(matches!(
            is_menu_checked(&cmd("open")),
            Err(Error::InvalidCommand(_))
        ));
    }
}
