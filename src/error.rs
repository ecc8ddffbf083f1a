use std::path::PathBuf;

use crate::menu::Command;

/// Errors raised by the taskbar APIs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The shell refused to add the icon to the notification area.
    #[error("could not create the taskbar icon: {0}")]
    IconCreationFailed(#[source] Box<Error>),

    /// No menu of an active icon carries this command.
    #[error("no menu item is bound to command {0}")]
    InvalidCommand(Command),

    #[error("icon file {} does not exist", .0.display())]
    IconFileNotFound(PathBuf),

    #[error("the roaming application data folder could not be resolved")]
    NoAppDataDir,

    #[error("operation is only available on Windows")]
    Unsupported,

    #[cfg(windows)]
    #[error(transparent)]
    Win32(#[from] windows::core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn icon_creation(cause: Error) -> Self {
        Error::IconCreationFailed(Box::new(cause))
    }
}
