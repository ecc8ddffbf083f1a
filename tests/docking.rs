use pretty_assertions::assert_eq;
use taskbar_tools::location::{Screen, TaskbarRects};
use taskbar_tools::{Point, Rect, Size, TaskbarEdge, TaskbarLocation};

fn screen(bounds: Rect, work_area: Rect) -> Screen {
    Screen { bounds, work_area }
}

fn rects(tray: Rect) -> TaskbarRects {
    TaskbarRects {
        tray,
        notification: tray,
        icons: tray,
    }
}

const FULL_HD: Rect = Rect {
    left: 0,
    top: 0,
    right: 1920,
    bottom: 1080,
};

#[test]
fn bottom_taskbar_opens_popup_above_cursor() {
    let work = Rect::new(0, 0, 1920, 1040);
    let location = TaskbarLocation::new(
        rects(Rect::new(0, 1040, 1920, 1080)),
        &[screen(FULL_HD, work)],
    );
    assert_eq!(location.edge(), TaskbarEdge::Bottom);
    let pos = location.relative_position(Point::new(1800.0, 1060.0), Size::new(300.0, 200.0));
    assert_eq!(pos, Point::new(1650.0, 840.0));
}

#[test]
fn left_taskbar_opens_popup_to_the_right() {
    let work = Rect::new(60, 0, 1920, 1080);
    let location = TaskbarLocation::new(
        rects(Rect::new(0, 0, 60, 1080)),
        &[screen(FULL_HD, work)],
    );
    assert_eq!(location.edge(), TaskbarEdge::Left);
    let pos = location.relative_position(Point::new(30.0, 500.0), Size::new(300.0, 200.0));
    assert_eq!(pos, Point::new(60.0, 400.0));
}

#[test]
fn taskbar_on_second_monitor_selects_that_monitor() {
    let second = Rect::new(1920, 0, 3840, 1080);
    let location = TaskbarLocation::new(
        rects(Rect::new(1920, 0, 3840, 40)),
        &[
            screen(FULL_HD, Rect::new(0, 0, 1920, 1040)),
            screen(second, Rect::new(1920, 40, 3840, 1080)),
        ],
    );
    assert_eq!(location.screen_bounds(), second);
    assert_eq!(location.edge(), TaskbarEdge::Top);
}

#[test]
fn popup_position_scales_device_independent_sizes() {
    // 150% scaling: the work area is reported as 1280x720 units.
    let location = TaskbarLocation::new(
        rects(Rect::new(0, 1040, 1920, 1080)),
        &[screen(FULL_HD, Rect::new(0, 0, 1920, 1040))],
    );
    let pos = location.popup_position(
        Point::new(960.0, 1060.0),
        Size::new(200.0, 100.0),
        Size::new(1280.0, 720.0),
    );
    assert!((pos.x - 540.0).abs() < 1e-6, "x = {}", pos.x);
    assert!((pos.y - 1780.0 / 3.0).abs() < 1e-6, "y = {}", pos.y);
}

#[test]
fn unknown_screen_gives_nan_popup() {
    let location = TaskbarLocation::new(rects(Rect::new(0, 1040, 1920, 1080)), &[]);
    let pos = location.popup_position(
        Point::new(10.0, 10.0),
        Size::new(200.0, 100.0),
        Size::new(1280.0, 720.0),
    );
    assert!(pos.is_nan());
}
