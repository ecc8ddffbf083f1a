//! Icons of shortcuts pinned to the taskbar.
//!
//! Pinned shortcuts are ordinary `.lnk` files under the user's roaming
//! profile. Reading and writing their icon location goes through the
//! [`LinkIcons`] seam; [`ShellLinks`] is the COM-backed implementation.

use std::path::{Path, PathBuf};

use directories::BaseDirs;

use crate::error::{Error, Result};

const PINNED_SUBDIR: [&str; 5] = [
    "Microsoft",
    "Internet Explorer",
    "Quick Launch",
    "User Pinned",
    "TaskBar",
];

/// Folder holding the shortcuts pinned to the taskbar.
pub fn pinned_folder() -> Result<PathBuf> {
    let base = BaseDirs::new().ok_or(Error::NoAppDataDir)?;
    Ok(PINNED_SUBDIR
        .iter()
        .fold(base.config_dir().to_path_buf(), |p, part| p.join(part)))
}

/// Access to the icon location stored in a shortcut file.
pub trait LinkIcons {
    fn icon_location(&self, link: &Path) -> Result<String>;
    /// Stores `icon` with index 0 and saves the shortcut.
    fn set_icon_location(&self, link: &Path, icon: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutUpdate {
    /// No shortcut with that name is pinned.
    NotFound,
    /// The shortcut already names an icon; left untouched.
    AlreadySet,
    Changed,
}

pub struct TaskbarShortcuts<L = ShellLinks> {
    folder: PathBuf,
    links: L,
}

impl TaskbarShortcuts<ShellLinks> {
    /// Shortcuts in the current user's pinned folder.
    pub fn pinned() -> Result<Self> {
        Ok(Self::new(pinned_folder()?, ShellLinks))
    }
}

impl<L: LinkIcons> TaskbarShortcuts<L> {
    pub fn new(folder: impl Into<PathBuf>, links: L) -> Self {
        Self {
            folder: folder.into(),
            links,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn existing(&self, name: &str) -> Option<PathBuf> {
        let path = self.folder.join(name);
        path.is_file().then_some(path)
    }

    /// Icon location of shortcut `name`, `None` when it is not pinned. An
    /// empty string means the shortcut uses its target's icon.
    pub fn icon(&self, name: &str) -> Result<Option<String>> {
        match self.existing(name) {
            Some(path) => Ok(Some(self.links.icon_location(&path)?)),
            None => Ok(None),
        }
    }

    /// Points shortcut `name` at `icon_file`. `false` when it is not pinned.
    pub fn set_icon(&self, name: &str, icon_file: &Path) -> Result<bool> {
        require_file(icon_file)?;
        self.set_existing(name, icon_file)
    }

    /// Like [`set_icon`](Self::set_icon), but keeps an icon already set.
    pub fn update_icon(&self, name: &str, icon_file: &Path) -> Result<ShortcutUpdate> {
        require_file(icon_file)?;
        match self.icon(name)? {
            None => Ok(ShortcutUpdate::NotFound),
            Some(current) if !current.is_empty() => Ok(ShortcutUpdate::AlreadySet),
            Some(_) => {
                if self.set_existing(name, icon_file)? {
                    Ok(ShortcutUpdate::Changed)
                } else {
                    Ok(ShortcutUpdate::NotFound)
                }
            }
        }
    }

    fn set_existing(&self, name: &str, icon_file: &Path) -> Result<bool> {
        let Some(path) = self.existing(name) else {
            return Ok(false);
        };
        self.links.set_icon_location(&path, icon_file)?;
        tracing::info!(shortcut = %path.display(), icon = %icon_file.display(), "shortcut icon set");
        Ok(true)
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::IconFileNotFound(path.to_path_buf()))
    }
}

pub fn get_taskbar_shortcut(name: &str) -> Result<Option<String>> {
    TaskbarShortcuts::pinned()?.icon(name)
}

pub fn set_taskbar_shortcut(name: &str, icon_file: &Path) -> Result<bool> {
    TaskbarShortcuts::pinned()?.set_icon(name, icon_file)
}

pub fn update_taskbar_shortcut(name: &str, icon_file: &Path) -> Result<ShortcutUpdate> {
    TaskbarShortcuts::pinned()?.update_icon(name, icon_file)
}

/// Shell link automation through `IShellLinkW` / `IPersistFile`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellLinks;

#[cfg(windows)]
mod com {
    use std::path::Path;

    use windows::core::{Interface, PCWSTR};
    use windows::Win32::Foundation::{MAX_PATH, TRUE};
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoUninitialize, IPersistFile, CLSCTX_INPROC_SERVER,
        COINIT_APARTMENTTHREADED, STGM, STGM_READ, STGM_READWRITE,
    };
    use windows::Win32::UI::Shell::{IShellLinkW, ShellLink};

    use super::{LinkIcons, ShellLinks};
    use crate::error::Result;
    use crate::tooltip::to_wide_os;

    /// Joins (or creates) a single-threaded apartment for the current call.
    struct Apartment {
        entered: bool,
    }

    impl Apartment {
        fn enter() -> Self {
            // RPC_E_CHANGED_MODE means the thread already has a multithreaded
            // apartment, which works for shell links as well.
            let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
            Self {
                entered: hr.is_ok(),
            }
        }
    }

    impl Drop for Apartment {
        fn drop(&mut self) {
            if self.entered {
                unsafe { CoUninitialize() };
            }
        }
    }

    fn open(link: &Path, mode: STGM) -> Result<(IShellLinkW, IPersistFile)> {
        let shell_link: IShellLinkW =
            unsafe { CoCreateInstance(&ShellLink, None, CLSCTX_INPROC_SERVER)? };
        let file: IPersistFile = shell_link.cast()?;
        let wpath = to_wide_os(link.as_os_str());
        unsafe { file.Load(PCWSTR(wpath.as_ptr()), mode)? };
        Ok((shell_link, file))
    }

    impl LinkIcons for ShellLinks {
        fn icon_location(&self, link: &Path) -> Result<String> {
            let _apartment = Apartment::enter();
            let (shell_link, _file) = open(link, STGM_READ)?;
            let mut buf = [0u16; MAX_PATH as usize];
            let mut index = 0i32;
            unsafe { shell_link.GetIconLocation(&mut buf, &mut index)? };
            let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
            Ok(String::from_utf16_lossy(&buf[..len]))
        }

        fn set_icon_location(&self, link: &Path, icon: &Path) -> Result<()> {
            let _apartment = Apartment::enter();
            let (shell_link, file) = open(link, STGM_READWRITE)?;
            let wicon = to_wide_os(icon.as_os_str());
            unsafe {
                shell_link.SetIconLocation(PCWSTR(wicon.as_ptr()), 0)?;
                file.Save(PCWSTR::null(), TRUE)?;
            }
            Ok(())
        }
    }
}

#[cfg(not(windows))]
impl LinkIcons for ShellLinks {
    fn icon_location(&self, _link: &Path) -> Result<String> {
        Err(Error::Unsupported)
    }

    fn set_icon_location(&self, _link: &Path, _icon: &Path) -> Result<()> {
        Err(Error::Unsupported)
    }
}
