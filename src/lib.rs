pub mod balloon;
pub mod config;
pub mod error;
#[cfg(any(windows, test))]
mod handlers;
pub mod geometry;
pub mod icon;
pub mod location;
pub mod menu;
pub mod shortcut;
pub mod tooltip;

// Windows-only modules
#[cfg(windows)]
pub mod taskbar_icon;

pub use balloon::{BalloonIcon, BalloonOptions};
pub use error::{Error, Result};
pub use geometry::{Point, Rect, Size};
#[cfg(windows)]
pub use icon::Icon;
pub use icon::{Bitmap, IconSource, StockIcon};
pub use location::{TaskbarEdge, TaskbarLocation};
pub use menu::{
    is_menu_checked, set_menu_bitmap, set_menu_check, set_menu_enabled, set_menu_icon,
    set_menu_text, set_menu_visible, toggle_menu_check, Command, Menu, MenuEntry, MenuItem,
};
pub use shortcut::{
    get_taskbar_shortcut, set_taskbar_shortcut, update_taskbar_shortcut, ShortcutUpdate,
    TaskbarShortcuts,
};
#[cfg(windows)]
pub use taskbar_icon::{quit_message_loop, run_message_loop, TaskbarIcon};
