//! Notification-area icons.
//!
//! Every thread that creates icons owns one hidden window receiving the
//! shell callbacks for all of them. Icons are thread bound and must be used
//! from a thread that pumps messages (see [`run_message_loop`]).

use std::cell::{Cell, RefCell};
use std::mem::size_of;
use std::time::Duration;

use once_cell::sync::OnceCell;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{FALSE, HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::Graphics::Gdi::{DeleteObject, HBITMAP, HGDIOBJ};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFYICONDATAW, NOTIFYICONDATAW_0,
};
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::balloon::BalloonIcon;
use crate::error::{Error, Result};
use crate::handlers::{self, CommandSink, HandlerTable, Handlers, Slot};
use crate::icon::Icon;
use crate::menu::{self, Command, Menu, MenuEntry};
use crate::tooltip::{copy_wide, fit_tooltip, to_wide, TOOLTIP_CAPACITY};

/// Callback message the shell posts to the hidden window.
pub const TRAY_MSG: u32 = WM_APP + 1;

const CLASS_NAME: PCWSTR = w!("TaskbarToolsNotifyWnd");

struct ActiveIcon {
    id: u32,
    nid: NOTIFYICONDATAW,
}

static CLASS_ATOM: OnceCell<u16> = OnceCell::new();
static TASKBAR_CREATED: OnceCell<u32> = OnceCell::new();

thread_local! {
    static WINDOW: Cell<Option<HWND>> = const { Cell::new(None) };
    static NEXT_ID: Cell<u32> = const { Cell::new(1) };
    static ACTIVE: RefCell<Vec<ActiveIcon>> = const { RefCell::new(Vec::new()) };
    static HANDLERS: HandlerTable = const { HandlerTable::new() };
}

fn taskbar_created_msg() -> u32 {
    *TASKBAR_CREATED.get_or_init(|| unsafe { RegisterWindowMessageW(w!("TaskbarCreated")) })
}

fn notify_window() -> Result<HWND> {
    if let Some(hwnd) = WINDOW.with(|w| w.get()) {
        return Ok(hwnd);
    }
    unsafe {
        let hinst = GetModuleHandleW(None)?;
        let atom = *CLASS_ATOM.get_or_init(|| {
            let wc = WNDCLASSW {
                lpfnWndProc: Some(wndproc),
                hInstance: hinst.into(),
                lpszClassName: CLASS_NAME,
                ..Default::default()
            };
            RegisterClassW(&wc)
        });
        if atom == 0 {
            return Err(windows::core::Error::from_win32().into());
        }
        // A hidden top-level window rather than a message-only one: the
        // TaskbarCreated broadcast never reaches HWND_MESSAGE children.
        let hwnd = CreateWindowExW(
            WS_EX_TOOLWINDOW,
            CLASS_NAME,
            w!(""),
            WS_POPUP,
            0,
            0,
            0,
            0,
            None,
            None,
            hinst,
            None,
        )?;
        let _ = taskbar_created_msg();
        WINDOW.with(|w| w.set(Some(hwnd)));
        tracing::debug!(hwnd = ?hwnd.0, "notify window created");
        Ok(hwnd)
    }
}

fn notify_data(hwnd: HWND, id: u32) -> NOTIFYICONDATAW {
    NOTIFYICONDATAW {
        cbSize: size_of::<NOTIFYICONDATAW>() as u32,
        hWnd: hwnd,
        uID: id,
        ..Default::default()
    }
}

fn shell_notify(
    message: windows::Win32::UI::Shell::NOTIFY_ICON_MESSAGE,
    nid: &NOTIFYICONDATAW,
) -> Result<()> {
    if unsafe { Shell_NotifyIconW(message, nid) }.as_bool() {
        Ok(())
    } else {
        Err(windows::core::Error::from_win32().into())
    }
}

fn stored_nid(id: u32) -> Option<NOTIFYICONDATAW> {
    ACTIVE.with(|a| a.borrow().iter().find(|i| i.id == id).map(|i| i.nid.clone()))
}

fn store_nid(id: u32, nid: &NOTIFYICONDATAW) {
    ACTIVE.with(|a| {
        if let Some(entry) = a.borrow_mut().iter_mut().find(|i| i.id == id) {
            entry.nid = nid.clone();
        }
    });
}

/// Whether icon `id` is in this thread's active list.
pub(crate) fn is_active(id: u32) -> bool {
    ACTIVE.with(|a| a.borrow().iter().any(|i| i.id == id))
}

fn with_handler<H>(id: u32, slot: Slot<H>, call: impl FnOnce(&mut H)) {
    HANDLERS.with(|h| {
        h.call(id, slot, call);
    });
}

/// Native popup built from a [`Menu`] snapshot.
struct NativeMenu {
    root: HMENU,
    bitmaps: Vec<HBITMAP>,
}

impl NativeMenu {
    fn build(menu: &Menu) -> Result<Self> {
        let root = unsafe { CreatePopupMenu()? };
        let mut native = NativeMenu {
            root,
            bitmaps: Vec::new(),
        };
        let mut next_id = 1u32;
        native.append(root, menu.entries(), &mut next_id)?;
        Ok(native)
    }

    fn append(&mut self, hmenu: HMENU, entries: &[MenuEntry], next_id: &mut u32) -> Result<()> {
        for entry in entries {
            match entry {
                MenuEntry::Item(item) => {
                    let id = *next_id;
                    *next_id += 1;
                    if !item.visible {
                        continue;
                    }
                    let mut flags = MF_STRING;
                    if item.checked {
                        flags |= MF_CHECKED;
                    }
                    if !item.enabled {
                        flags |= MF_GRAYED;
                    }
                    let text = to_wide(&item.text);
                    unsafe { AppendMenuW(hmenu, flags, id as usize, PCWSTR(text.as_ptr()))? };
                    if let Some(source) = &item.icon {
                        match Icon::load(source).and_then(|icon| icon.to_menu_bitmap()) {
                            Ok(bmp) => {
                                self.bitmaps.push(bmp);
                                let mii = MENUITEMINFOW {
                                    cbSize: size_of::<MENUITEMINFOW>() as u32,
                                    fMask: MIIM_BITMAP,
                                    hbmpItem: bmp,
                                    ..Default::default()
                                };
                                let _ = unsafe { SetMenuItemInfoW(hmenu, id, FALSE, &mii) };
                            }
                            Err(e) => {
                                tracing::warn!(command = %item.command, error = %e, "menu icon not loaded")
                            }
                        }
                    }
                }
                MenuEntry::Separator => unsafe {
                    AppendMenuW(hmenu, MF_SEPARATOR, 0, PCWSTR::null())?;
                },
                MenuEntry::Submenu { text, menu } => {
                    let sub = unsafe { CreatePopupMenu()? };
                    let wtext = to_wide(text);
                    // Attach first so destroying the root also frees `sub`.
                    unsafe {
                        AppendMenuW(
                            hmenu,
                            MF_POPUP | MF_STRING,
                            sub.0 as usize,
                            PCWSTR(wtext.as_ptr()),
                        )?
                    };
                    self.append(sub, menu.entries(), next_id)?;
                }
            }
        }
        Ok(())
    }

    /// Shows the popup at the cursor and returns the chosen native id.
    fn track(&self, hwnd: HWND) -> Option<u32> {
        unsafe {
            let mut pt = POINT::default();
            let _ = GetCursorPos(&mut pt);
            // Without this the menu does not close when clicking elsewhere.
            let _ = SetForegroundWindow(hwnd);
            let chosen = TrackPopupMenu(
                self.root,
                TPM_RETURNCMD | TPM_NONOTIFY | TPM_RIGHTBUTTON,
                pt.x,
                pt.y,
                0,
                hwnd,
                None,
            );
            let _ = PostMessageW(hwnd, WM_NULL, WPARAM(0), LPARAM(0));
            (chosen.0 > 0).then_some(chosen.0 as u32)
        }
    }
}

impl Drop for NativeMenu {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyMenu(self.root);
            for bmp in self.bitmaps.drain(..) {
                let _ = DeleteObject(HGDIOBJ(bmp.0));
            }
        }
    }
}

fn on_left_click(id: u32) {
    tracing::debug!(id, "icon clicked");
    with_handler(id, handlers::clicked, |f| f());
}

fn on_right_click(hwnd: HWND, id: u32) {
    with_handler(id, handlers::menu_opening, |f| f());
    let Some(menu) = menu::snapshot(id) else {
        return;
    };
    let native = match NativeMenu::build(&menu) {
        Ok(native) => native,
        Err(e) => {
            tracing::warn!(id, error = %e, "context menu not built");
            return;
        }
    };
    let Some(chosen) = native.track(hwnd) else {
        return;
    };
    drop(native);
    if let Some(item) = menu.item_by_native_id(chosen) {
        let command = item.command.clone();
        tracing::debug!(id, command = %command, "menu command");
        with_handler(id, handlers::target, |sink| sink(&command));
    }
}

fn re_add_all() {
    let nids: Vec<NOTIFYICONDATAW> =
        ACTIVE.with(|a| a.borrow().iter().map(|i| i.nid.clone()).collect());
    tracing::info!(count = nids.len(), "taskbar recreated, restoring icons");
    for nid in &nids {
        if let Err(e) = shell_notify(NIM_ADD, nid) {
            tracing::warn!(id = nid.uID, error = %e, "icon not restored");
        }
    }
}

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, w: WPARAM, l: LPARAM) -> LRESULT {
    match msg {
        TRAY_MSG => {
            let id = w.0 as u32;
            match (l.0 as u32) & 0xFFFF {
                WM_LBUTTONUP => on_left_click(id),
                WM_RBUTTONUP => on_right_click(hwnd, id),
                _ => {}
            }
            LRESULT(0)
        }
        msg if TASKBAR_CREATED.get() == Some(&msg) => {
            re_add_all();
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, w, l),
    }
}

/// An icon in the taskbar notification area. Removed when dropped.
pub struct TaskbarIcon {
    id: u32,
    icon: Icon,
}

impl TaskbarIcon {
    /// Adds `icon` to the notification area.
    ///
    /// `menu` pops up on right click; clicked items are passed to `target`.
    /// Without a target, menu clicks are ignored.
    pub fn create(
        icon: Icon,
        tooltip: Option<&str>,
        menu: Option<Menu>,
        target: Option<Box<dyn FnMut(&Command)>>,
    ) -> Result<Self> {
        Self::add(icon, tooltip, menu, target).map_err(Error::icon_creation)
    }

    pub fn builder(icon: Icon) -> TaskbarIconBuilder {
        TaskbarIconBuilder {
            icon,
            tooltip: None,
            menu: None,
            target: None,
        }
    }

    fn add(
        icon: Icon,
        tooltip: Option<&str>,
        menu: Option<Menu>,
        target: Option<CommandSink>,
    ) -> Result<Self> {
        let hwnd = notify_window()?;
        let id = NEXT_ID.with(|n| {
            let id = n.get();
            n.set(id + 1);
            id
        });
        let mut nid = notify_data(hwnd, id);
        nid.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
        nid.uCallbackMessage = TRAY_MSG;
        nid.hIcon = icon.handle();
        copy_wide(
            &mut nid.szTip,
            &fit_tooltip(tooltip.unwrap_or_default(), TOOLTIP_CAPACITY),
        );
        shell_notify(NIM_ADD, &nid)?;

        ACTIVE.with(|a| a.borrow_mut().push(ActiveIcon { id, nid }));
        HANDLERS.with(|h| {
            h.insert(
                id,
                Handlers {
                    target,
                    ..Default::default()
                },
            )
        });
        if let Some(menu) = menu {
            menu::attach(id, menu);
        }
        tracing::info!(id, "taskbar icon added");
        Ok(Self { id, icon })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Replaces the displayed icon. The previous one is released.
    pub fn update_icon(&mut self, icon: Icon) -> Result<()> {
        let Some(mut nid) = stored_nid(self.id) else {
            return Ok(());
        };
        nid.hIcon = icon.handle();
        let mut modify = nid.clone();
        modify.uFlags = NIF_ICON;
        shell_notify(NIM_MODIFY, &modify)?;
        store_nid(self.id, &nid);
        self.icon = icon;
        Ok(())
    }

    pub fn icon(&self) -> &Icon {
        &self.icon
    }

    /// Sets the hover text. Text too long for the shell loses trailing lines.
    pub fn update_tooltip(&self, text: Option<&str>) -> Result<()> {
        let Some(mut nid) = stored_nid(self.id) else {
            return Ok(());
        };
        copy_wide(
            &mut nid.szTip,
            &fit_tooltip(text.unwrap_or_default(), TOOLTIP_CAPACITY),
        );
        let mut modify = nid.clone();
        modify.uFlags = NIF_TIP;
        shell_notify(NIM_MODIFY, &modify)?;
        store_nid(self.id, &nid);
        Ok(())
    }

    pub fn set_menu(&self, menu: Option<Menu>) {
        match menu {
            Some(menu) => menu::attach(self.id, menu),
            None => menu::detach(self.id),
        }
    }

    /// Left button released over the icon.
    pub fn on_clicked(&self, f: impl FnMut() + 'static) {
        self.set_handler(handlers::clicked, Box::new(f));
    }

    /// Right button released, before the menu pops up. Menu edits made here
    /// apply to the menu about to open.
    pub fn on_menu_opening(&self, f: impl FnMut() + 'static) {
        self.set_handler(handlers::menu_opening, Box::new(f));
    }

    pub fn set_command_target(&self, f: impl FnMut(&Command) + 'static) {
        self.set_handler(handlers::target, Box::new(f));
    }

    fn set_handler<H>(&self, slot: Slot<H>, handler: H) {
        HANDLERS.with(|h| h.set(self.id, slot, handler));
    }

    pub fn show_balloon(&self, title: &str, text: &str, kind: BalloonIcon) -> Result<()> {
        self.show_balloon_for(title, text, kind, None)
    }

    pub(crate) fn show_balloon_for(
        &self,
        title: &str,
        text: &str,
        kind: BalloonIcon,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let Some(mut nid) = stored_nid(self.id) else {
            return Ok(());
        };
        nid.uFlags = NIF_INFO;
        copy_wide(&mut nid.szInfoTitle, title);
        copy_wide(&mut nid.szInfo, text);
        nid.dwInfoFlags = kind.flags();
        if let Some(timeout) = timeout {
            nid.Anonymous = NOTIFYICONDATAW_0 {
                uTimeout: timeout.as_millis().min(u32::MAX as u128) as u32,
            };
        }
        tracing::debug!(id = self.id, title, "balloon");
        shell_notify(NIM_MODIFY, &nid)
    }
}

impl Drop for TaskbarIcon {
    fn drop(&mut self) {
        let removed = ACTIVE.with(|a| {
            let mut active = a.borrow_mut();
            active
                .iter()
                .position(|i| i.id == self.id)
                .map(|pos| active.remove(pos))
        });
        HANDLERS.with(|h| h.remove(self.id));
        menu::detach(self.id);
        if let Some(entry) = removed {
            let nid = notify_data(entry.nid.hWnd, self.id);
            let _ = shell_notify(NIM_DELETE, &nid);
            tracing::info!(id = self.id, "taskbar icon removed");
        }
    }
}

pub struct TaskbarIconBuilder {
    icon: Icon,
    tooltip: Option<String>,
    menu: Option<Menu>,
    target: Option<CommandSink>,
}

impl TaskbarIconBuilder {
    pub fn tooltip(mut self, text: impl Into<String>) -> Self {
        self.tooltip = Some(text.into());
        self
    }

    pub fn menu(mut self, menu: Menu) -> Self {
        self.menu = Some(menu);
        self
    }

    pub fn on_command(mut self, f: impl FnMut(&Command) + 'static) -> Self {
        self.target = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<TaskbarIcon> {
        TaskbarIcon::create(self.icon, self.tooltip.as_deref(), self.menu, self.target)
    }
}

/// Pumps messages for this thread until [`quit_message_loop`] is called.
pub fn run_message_loop() {
    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

pub fn quit_message_loop(code: i32) {
    unsafe { PostQuitMessage(code) };
}
