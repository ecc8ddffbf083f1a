// Windows-only module compiled via cfg in the binary's main.rs

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::rc::{Rc, Weak};
use windows::core::{w, PCWSTR};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;

use taskbar_tools::config::{self, Action, Config, Paths};
use taskbar_tools::tooltip::to_wide_os;
use taskbar_tools::{
    menu, quit_message_loop, run_message_loop, BalloonIcon, Command, Icon, Size, StockIcon,
    TaskbarIcon, TaskbarLocation,
};

/// Size used to log where a popup anchored at the cursor would go.
const POPUP_SIZE: Size = Size {
    width: 320.0,
    height: 240.0,
};

pub fn main() -> Result<()> {
    let (cfg, paths) = config::load_or_default()?;
    let (tray_menu, actions) = cfg.build_menu();

    let icon = match Icon::load(&cfg.icon) {
        Ok(icon) => icon,
        Err(e) => {
            tracing::warn!(error = %e, "configured icon unavailable, using the default");
            Icon::stock(StockIcon::Application)?
        }
    };
    let tray = Rc::new(
        TaskbarIcon::builder(icon)
            .tooltip(cfg.tooltip.clone())
            .menu(tray_menu)
            .build()
            .context("create tray icon")?,
    );

    let weak = Rc::downgrade(&tray);
    let cfg_paths = paths.clone();
    tray.set_command_target(move |cmd| dispatch(&weak, &actions, &cfg_paths, cmd));

    let weak = Rc::downgrade(&tray);
    let balloon = cfg.balloon.clone();
    tray.on_clicked(move || {
        if let Some(tray) = weak.upgrade() {
            if let Err(e) = tray.show_balloon(&balloon.title, &balloon.text, balloon.icon) {
                tracing::warn!(error = %e, "balloon failed");
            }
        }
    });

    let weak = Rc::downgrade(&tray);
    let tooltip = cfg.tooltip.clone();
    tray.on_menu_opening(move || {
        let Some(tray) = weak.upgrade() else {
            return;
        };
        let text = match TaskbarLocation::probe() {
            Some(location) => {
                let popup = location.popup_position_at_cursor(POPUP_SIZE);
                tracing::debug!(edge = ?location.edge(), x = popup.x, y = popup.y, "popup anchor");
                format!("{tooltip}\rTaskbar: {:?}", location.edge())
            }
            None => tooltip.clone(),
        };
        if let Err(e) = tray.update_tooltip(Some(&text)) {
            tracing::warn!(error = %e, "tooltip update failed");
        }
    });

    tracing::info!(cfg = %paths.cfg_file.display(), "trayhost running");
    run_message_loop();
    drop(tray);
    tracing::info!("trayhost exiting");
    Ok(())
}

fn dispatch(
    tray: &Weak<TaskbarIcon>,
    actions: &HashMap<Command, Action>,
    paths: &Paths,
    cmd: &Command,
) {
    let Some(action) = actions.get(cmd) else {
        tracing::warn!(command = %cmd, "command without action");
        return;
    };
    tracing::debug!(command = %cmd, ?action, "dispatch");
    match action {
        Action::Balloon { title, text } => {
            if let Some(tray) = tray.upgrade() {
                if let Err(e) = tray.show_balloon(title, text, BalloonIcon::Info) {
                    tracing::warn!(error = %e, "balloon failed");
                }
            }
        }
        Action::Toggle => match menu::toggle_menu_check(cmd) {
            Ok(checked) => tracing::info!(command = %cmd, checked, "toggled"),
            Err(e) => tracing::warn!(error = %e, "toggle failed"),
        },
        Action::OpenConfig => {
            if let Err(e) = open_config(paths) {
                tracing::warn!(error = %e, "open config failed");
            }
        }
        Action::Exit => quit_message_loop(0),
    }
}

fn open_config(paths: &Paths) -> Result<()> {
    if !paths.cfg_file.exists() {
        config::save_atomic(&Config::default(), paths)?;
    }
    shell_open(&paths.cfg_file);
    Ok(())
}

fn shell_open(path: &Path) {
    let wpath = to_wide_os(path.as_os_str());
    unsafe {
        let _ = ShellExecuteW(
            None,
            w!("open"),
            PCWSTR(wpath.as_ptr()),
            None,
            None,
            SW_SHOWNORMAL,
        );
    }
}
