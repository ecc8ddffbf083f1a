//! One-shot balloon notifications.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Icon shown in the balloon title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalloonIcon {
    #[default]
    None,
    Info,
    Warning,
    Error,
}

#[cfg(windows)]
impl BalloonIcon {
    pub(crate) fn flags(self) -> windows::Win32::UI::Shell::NOTIFY_ICON_INFOTIP_FLAGS {
        use windows::Win32::UI::Shell::{NIIF_ERROR, NIIF_INFO, NIIF_NONE, NIIF_WARNING};
        match self {
            BalloonIcon::None => NIIF_NONE,
            BalloonIcon::Info => NIIF_INFO,
            BalloonIcon::Warning => NIIF_WARNING,
            BalloonIcon::Error => NIIF_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalloonOptions {
    /// How long the shell is asked to keep the balloon up. Recent Windows
    /// versions use the accessibility setting instead.
    pub show_timeout: Duration,
    /// How long [`show`] blocks so the balloon is fully visible on return.
    pub wait: Duration,
}

impl Default for BalloonOptions {
    fn default() -> Self {
        Self {
            show_timeout: Duration::from_secs(5),
            wait: Duration::from_millis(500),
        }
    }
}

/// Shows `text` in a balloon from a temporary shield icon, blocks for
/// `options.wait`, then removes the icon.
#[cfg(windows)]
pub fn show(text: &str, options: BalloonOptions) -> Result<()> {
    use crate::icon::{Icon, StockIcon};
    use crate::taskbar_icon::TaskbarIcon;

    let icon = Icon::stock(StockIcon::Shield)?;
    let tray = TaskbarIcon::builder(icon).tooltip(text).build()?;
    tray.show_balloon_for("", text, BalloonIcon::None, Some(options.show_timeout))?;
    std::thread::sleep(options.wait);
    drop(tray);
    Ok(())
}

#[cfg(not(windows))]
pub fn show(_text: &str, _options: BalloonOptions) -> Result<()> {
    Err(crate::error::Error::Unsupported)
}
