//! Where the taskbar sits and where a popup should dock next to it.
//!
//! The geometry is pure and host independent; only [`TaskbarLocation::probe`]
//! and the cursor helpers talk to the window manager.

use crate::geometry::{Point, Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskbarEdge {
    Top,
    Bottom,
    Left,
    Right,
}

/// One monitor: full bounds and the part not covered by app bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Screen {
    pub bounds: Rect,
    pub work_area: Rect,
}

/// Window rectangles of the taskbar parts, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskbarRects {
    /// `Shell_TrayWnd`, the whole taskbar.
    pub tray: Rect,
    /// `TrayNotifyWnd`, the notification area.
    pub notification: Rect,
    /// `ToolbarWindow32`, the icon strip.
    pub icons: Rect,
}

/// Picks the screen hosting the taskbar: the one whose overlap with the
/// tray rectangle is the smallest positive area. The first screen is kept
/// when no screen overlaps at all.
pub fn select_screen(tray: &Rect, screens: &[Screen]) -> Option<Screen> {
    let mut selected: Option<Screen> = None;
    let mut smallest = 0i64;
    for screen in screens {
        let area = screen.bounds.intersect(tray).area();
        if selected.is_none() || (area > 0 && (smallest == 0 || smallest > area)) {
            selected = Some(*screen);
            smallest = area;
        }
    }
    selected
}

/// Classifies the taskbar by comparing its centre with the outer quarter
/// bands of the work area. Anything ambiguous counts as bottom.
pub fn taskbar_edge(taskbar: &Rect, work_area: &Rect) -> TaskbarEdge {
    let (cx, cy) = taskbar.center();
    let quarter_h = work_area.height() / 4;
    let quarter_w = work_area.width() / 4;
    let is_top = cy < work_area.top + quarter_h;
    let is_bottom = cy >= work_area.bottom - quarter_h;
    let is_left = cx < work_area.left + quarter_w;
    let is_right = cx >= work_area.right - quarter_w;

    if is_top && !is_left && !is_right {
        TaskbarEdge::Top
    } else if is_bottom && !is_left && !is_right {
        TaskbarEdge::Bottom
    } else if is_left && !is_top && !is_bottom {
        TaskbarEdge::Left
    } else if is_right && !is_top && !is_bottom {
        TaskbarEdge::Right
    } else {
        TaskbarEdge::Bottom
    }
}

/// Top-left corner for a popup of `size` that touches the taskbar on `edge`
/// and is centred on `cursor` along the taskbar.
pub fn docked_position(cursor: Point, size: Size, taskbar: &Rect, edge: TaskbarEdge) -> Point {
    match edge {
        TaskbarEdge::Top => Point::new(cursor.x - size.width / 2.0, taskbar.bottom as f64),
        TaskbarEdge::Bottom => Point::new(
            cursor.x - size.width / 2.0,
            taskbar.top as f64 - size.height,
        ),
        TaskbarEdge::Left => Point::new(taskbar.right as f64, cursor.y - size.height / 2.0),
        TaskbarEdge::Right => Point::new(
            taskbar.left as f64 - size.width,
            cursor.y - size.height / 2.0,
        ),
    }
}

/// Ratio between two coordinate spaces, measured by mapping (0,0) and
/// (1000,1000) through a conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientScale {
    pub x: f64,
    pub y: f64,
}

impl ClientScale {
    const PROBE: i32 = 1000;

    pub fn from_mapped(origin: (i32, i32), probe: (i32, i32)) -> Self {
        Self {
            x: (probe.0 - origin.0) as f64 / Self::PROBE as f64,
            y: (probe.1 - origin.1) as f64 / Self::PROBE as f64,
        }
    }

    pub fn point(&self, p: Point) -> Point {
        Point::new(p.x * self.x, p.y * self.y)
    }

    pub fn size(&self, s: Size) -> Size {
        Size::new(s.width * self.x, s.height * self.y)
    }
}

/// Snapshot of the taskbar layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskbarLocation {
    pub rects: TaskbarRects,
    pub screen: Option<Screen>,
}

impl TaskbarLocation {
    pub fn new(rects: TaskbarRects, screens: &[Screen]) -> Self {
        Self {
            rects,
            screen: select_screen(&rects.tray, screens),
        }
    }

    /// Bounds of the screen showing the taskbar, empty when unknown.
    pub fn screen_bounds(&self) -> Rect {
        self.screen.map(|s| s.bounds).unwrap_or_default()
    }

    pub fn edge(&self) -> TaskbarEdge {
        match self.screen {
            Some(screen) => taskbar_edge(&self.rects.tray, &screen.work_area),
            None => TaskbarEdge::Bottom,
        }
    }

    /// Position in screen pixels for a popup of `size` pixels opened from
    /// `cursor`. A cursor outside the taskbar docks to the bottom.
    pub fn relative_position(&self, cursor: Point, size: Size) -> Point {
        if self.screen.is_none() {
            return Point::default();
        }
        let tray = &self.rects.tray;
        let edge = if tray.contains(cursor) {
            self.edge()
        } else {
            TaskbarEdge::Bottom
        };
        docked_position(cursor, size, tray, edge)
    }

    /// Same as [`relative_position`](Self::relative_position) for an element
    /// measured in the units of `work_area` (typically DIPs). The ratio
    /// between the work area and the taskbar screen converts the element to
    /// pixels and the result back.
    pub fn popup_position(&self, cursor: Point, element: Size, work_area: Size) -> Point {
        let bounds = self.screen_bounds();
        if element.width.is_nan() || element.height.is_nan() || bounds.is_empty() {
            return Point::nan();
        }
        let ratio_x = work_area.width / bounds.width() as f64;
        let ratio_y = work_area.height / bounds.height() as f64;
        let popup = Size::new(
            (element.width / ratio_x).trunc(),
            (element.height / ratio_y).trunc(),
        );
        let pos = self.relative_position(cursor, popup);
        Point::new(pos.x * ratio_x, pos.y * ratio_y)
    }
}

#[cfg(windows)]
mod probe {
    use std::ffi::c_void;
    use std::mem::size_of;

    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
    use windows::Win32::Graphics::Gdi::{
        ClientToScreen, EnumDisplayMonitors, GetMonitorInfoW, ScreenToClient, HDC, HMONITOR,
        MONITORINFO,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        FindWindowExW, FindWindowW, GetCursorPos, GetWindowRect, SystemParametersInfoW,
        SPI_GETWORKAREA, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
    };

    use super::{ClientScale, Screen, TaskbarLocation, TaskbarRects};
    use crate::geometry::{Point, Rect, Size};

    fn tray_window() -> Option<HWND> {
        unsafe { FindWindowW(w!("Shell_TrayWnd"), PCWSTR::null()) }
            .ok()
            .filter(|h| !h.0.is_null())
    }

    fn child(parent: HWND, class: PCWSTR) -> Option<HWND> {
        unsafe { FindWindowExW(parent, HWND::default(), class, PCWSTR::null()) }
            .ok()
            .filter(|h| !h.0.is_null())
    }

    fn window_rect(hwnd: HWND) -> Rect {
        let mut rc = RECT::default();
        if unsafe { GetWindowRect(hwnd, &mut rc) }.is_err() {
            tracing::debug!(hwnd = ?hwnd.0, "GetWindowRect failed");
        }
        rc.into()
    }

    /// Walks `Shell_TrayWnd > TrayNotifyWnd > SysPager > ToolbarWindow32`.
    pub(super) fn taskbar_rects() -> Option<(HWND, TaskbarRects)> {
        let tray = tray_window()?;
        let notify = child(tray, w!("TrayNotifyWnd"))?;
        let pager = child(notify, w!("SysPager"))?;
        let icons = child(pager, w!("ToolbarWindow32"))?;
        Some((
            tray,
            TaskbarRects {
                tray: window_rect(tray),
                notification: window_rect(notify),
                icons: window_rect(icons),
            },
        ))
    }

    unsafe extern "system" fn collect_monitor(
        hmon: HMONITOR,
        _hdc: HDC,
        _clip: *mut RECT,
        data: LPARAM,
    ) -> BOOL {
        let screens = &mut *(data.0 as *mut Vec<Screen>);
        let mut mi = MONITORINFO {
            cbSize: size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if GetMonitorInfoW(hmon, &mut mi).as_bool() {
            screens.push(Screen {
                bounds: mi.rcMonitor.into(),
                work_area: mi.rcWork.into(),
            });
        }
        TRUE
    }

    pub(super) fn screens() -> Vec<Screen> {
        let mut screens: Vec<Screen> = Vec::new();
        unsafe {
            let _ = EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(collect_monitor),
                LPARAM(&mut screens as *mut Vec<Screen> as isize),
            );
        }
        screens
    }

    pub(super) fn cursor() -> Option<Point> {
        let mut pt = POINT::default();
        unsafe { GetCursorPos(&mut pt) }.ok()?;
        Some(Point::new(pt.x as f64, pt.y as f64))
    }

    pub(super) fn work_area() -> Option<Size> {
        let mut rc = RECT::default();
        unsafe {
            SystemParametersInfoW(
                SPI_GETWORKAREA,
                0,
                Some(&mut rc as *mut RECT as *mut c_void),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
        }
        .ok()?;
        let r: Rect = rc.into();
        Some(Size::new(r.width() as f64, r.height() as f64))
    }

    pub(super) fn scale(to_screen: bool) -> Option<ClientScale> {
        let (hwnd, _) = taskbar_rects()?;
        let mut origin = POINT { x: 0, y: 0 };
        let mut probe = POINT {
            x: ClientScale::PROBE,
            y: ClientScale::PROBE,
        };
        let ok = unsafe {
            if to_screen {
                ClientToScreen(hwnd, &mut origin).as_bool()
                    && ClientToScreen(hwnd, &mut probe).as_bool()
            } else {
                ScreenToClient(hwnd, &mut origin).as_bool()
                    && ScreenToClient(hwnd, &mut probe).as_bool()
            }
        };
        ok.then(|| ClientScale::from_mapped((origin.x, origin.y), (probe.x, probe.y)))
    }

    impl TaskbarLocation {
        /// Reads the current taskbar layout; `None` when the shell windows
        /// cannot be found (no Explorer, or a replaced shell).
        pub fn probe() -> Option<Self> {
            let Some((_, rects)) = taskbar_rects() else {
                tracing::warn!("taskbar windows not found");
                return None;
            };
            let location = Self::new(rects, &screens());
            tracing::debug!(tray = ?rects.tray, edge = ?location.edge(), "taskbar probed");
            Some(location)
        }

        /// Popup position for `element` (in work-area units) opened from the
        /// current cursor position.
        pub fn popup_position_at_cursor(&self, element: Size) -> Point {
            match (cursor(), work_area()) {
                (Some(c), Some(wa)) => self.popup_position(c, element, wa),
                _ => Point::nan(),
            }
        }

        /// Client-to-screen ratio of the taskbar window.
        pub fn client_to_screen_scale() -> Option<ClientScale> {
            scale(true)
        }

        /// Screen-to-client ratio of the taskbar window.
        pub fn screen_to_client_scale() -> Option<ClientScale> {
            scale(false)
        }
    }
}

#[cfg(not(windows))]
impl TaskbarLocation {
    pub fn probe() -> Option<Self> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: Screen = Screen {
        bounds: Rect::new(0, 0, 1920, 1080),
        work_area: Rect::new(0, 0, 1920, 1040),
    };

    fn bottom_bar() -> TaskbarRects {
        TaskbarRects {
            tray: Rect::new(0, 1040, 1920, 1080),
            notification: Rect::new(1700, 1040, 1920, 1080),
            icons: Rect::new(1720, 1040, 1800, 1080),
        }
    }

    #[test]
    fn edge_for_each_side() {
        let wa = Rect::new(0, 0, 1920, 1080);
        assert_eq!(taskbar_edge(&Rect::new(0, 0, 1920, 40), &wa), TaskbarEdge::Top);
        assert_eq!(
            taskbar_edge(&Rect::new(0, 1040, 1920, 1080), &wa),
            TaskbarEdge::Bottom
        );
        assert_eq!(taskbar_edge(&Rect::new(0, 0, 60, 1080), &wa), TaskbarEdge::Left);
        assert_eq!(
            taskbar_edge(&Rect::new(1860, 0, 1920, 1080), &wa),
            TaskbarEdge::Right
        );
    }

    #[test]
    fn ambiguous_edge_is_bottom() {
        let wa = Rect::new(0, 0, 1920, 1080);
        // Small square in the top-left corner: both top and left.
        assert_eq!(
            taskbar_edge(&Rect::new(0, 0, 40, 40), &wa),
            TaskbarEdge::Bottom
        );
        // Centred blob: neither.
        assert_eq!(
            taskbar_edge(&Rect::new(900, 500, 1000, 600), &wa),
            TaskbarEdge::Bottom
        );
    }

    #[test]
    fn docking_per_edge() {
        let size = Size::new(200.0, 100.0);
        let c = Point::new(500.0, 300.0);
        let bar = Rect::new(10, 20, 30, 40);
        assert_eq!(
            docked_position(c, size, &bar, TaskbarEdge::Top),
            Point::new(400.0, 40.0)
        );
        assert_eq!(
            docked_position(c, size, &bar, TaskbarEdge::Bottom),
            Point::new(400.0, -80.0)
        );
        assert_eq!(
            docked_position(c, size, &bar, TaskbarEdge::Left),
            Point::new(30.0, 250.0)
        );
        assert_eq!(
            docked_position(c, size, &bar, TaskbarEdge::Right),
            Point::new(-190.0, 250.0)
        );
    }

    #[test]
    fn picks_smallest_positive_overlap() {
        let left = Screen {
            bounds: Rect::new(-1920, 0, 0, 1080),
            work_area: Rect::new(-1920, 0, 0, 1080),
        };
        let tray = Rect::new(-100, 1040, 1920, 1080);
        // Overlap with `left` is 100x40, with SCREEN 1920x40.
        assert_eq!(select_screen(&tray, &[SCREEN, left]), Some(left));
    }

    #[test]
    fn first_screen_kept_without_overlap() {
        let other = Screen {
            bounds: Rect::new(1920, 0, 3840, 1080),
            work_area: Rect::new(1920, 0, 3840, 1080),
        };
        let tray = Rect::new(5000, 0, 6000, 40);
        assert_eq!(select_screen(&tray, &[SCREEN, other]), Some(SCREEN));
        assert_eq!(select_screen(&tray, &[]), None);
    }

    #[test]
    fn cursor_outside_taskbar_docks_bottom() {
        let loc = TaskbarLocation::new(
            TaskbarRects {
                tray: Rect::new(0, 0, 1920, 40),
                ..Default::default()
            },
            &[SCREEN],
        );
        assert_eq!(loc.edge(), TaskbarEdge::Top);
        let p = loc.relative_position(Point::new(960.0, 500.0), Size::new(100.0, 50.0));
        assert_eq!(p, Point::new(910.0, -50.0));
        let p = loc.relative_position(Point::new(960.0, 20.0), Size::new(100.0, 50.0));
        assert_eq!(p, Point::new(910.0, 40.0));
    }

    #[test]
    fn no_screen_gives_origin_and_empty_bounds() {
        let loc = TaskbarLocation::new(bottom_bar(), &[]);
        assert!(loc.screen_bounds().is_empty());
        assert_eq!(
            loc.relative_position(Point::new(5.0, 5.0), Size::new(1.0, 1.0)),
            Point::default()
        );
        assert!(loc
            .popup_position(Point::new(5.0, 5.0), Size::new(1.0, 1.0), Size::new(1.0, 1.0))
            .is_nan());
    }

    #[test]
    fn popup_position_scales_through_work_area() {
        let loc = TaskbarLocation::new(bottom_bar(), &[SCREEN]);
        // Work area reported at half the pixel size (200% scaling).
        let wa = Size::new(960.0, 540.0);
        let p = loc.popup_position(Point::new(1800.0, 1060.0), Size::new(150.0, 100.0), wa);
        // Popup is 300x200 pixels; docked at (1650, 840) pixels, halved back.
        assert_eq!(p, Point::new(825.0, 420.0));
    }

    #[test]
    fn nan_element_is_rejected() {
        let loc = TaskbarLocation::new(bottom_bar(), &[SCREEN]);
        let p = loc.popup_position(
            Point::new(10.0, 1060.0),
            Size::new(f64::NAN, 10.0),
            Size::new(1920.0, 1040.0),
        );
        assert!(p.is_nan());
    }

    #[test]
    fn client_scale_from_mapping() {
        let s = ClientScale::from_mapped((100, 200), (2100, 1200));
        assert_eq!(s.x, 2.0);
        assert_eq!(s.y, 1.0);
        assert_eq!(s.size(Size::new(10.0, 10.0)), Size::new(20.0, 10.0));
        assert_eq!(s.point(Point::new(1.0, 3.0)), Point::new(2.0, 3.0));
    }
}
