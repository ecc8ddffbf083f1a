use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Icons the system ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockIcon {
    Application,
    Information,
    Warning,
    Error,
    Shield,
}

/// An image supplied by the caller, rows top to bottom, each pixel
/// premultiplied `0xAARRGGBB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Arc<[u32]>,
}

impl Bitmap {
    /// `None` when the size is zero or does not match `pixels`.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Option<Self> {
        let expected = (width as usize).checked_mul(height as usize)?;
        if expected == 0 || pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// Same as [`new`](Self::new) for straight (not premultiplied) alpha.
    pub fn from_straight_argb(width: u32, height: u32, mut pixels: Vec<u32>) -> Option<Self> {
        for px in pixels.iter_mut() {
            *px = premultiply(*px);
        }
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}

fn premultiply(argb: u32) -> u32 {
    let a = argb >> 24;
    let scale = |shift: u32| ((((argb >> shift) & 0xFF) * a + 127) / 255) << shift;
    (a << 24) | scale(16) | scale(8) | scale(0)
}

/// Gives alpha to pixels drawn from an icon without an alpha channel: opaque
/// where the AND mask is black, fully transparent elsewhere. Pixels that
/// already carry alpha are left alone.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn apply_mask(color: &mut [u32], mask: &[u32]) {
    if color.iter().any(|px| px >> 24 != 0) {
        return;
    }
    for (px, m) in color.iter_mut().zip(mask) {
        if m & 0x00FF_FFFF == 0 {
            *px |= 0xFF00_0000;
        } else {
            *px = 0;
        }
    }
}

/// Where to get an icon from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconSource {
    Stock(StockIcon),
    /// A `.ico` file on disk.
    File(PathBuf),
    /// The first icon embedded in the running executable.
    Executable,
    /// Pixels from the caller. Not representable in configuration files.
    #[serde(skip)]
    Bitmap(Bitmap),
}

impl Default for IconSource {
    fn default() -> Self {
        IconSource::Stock(StockIcon::Application)
    }
}

#[cfg(windows)]
pub use native::Icon;

#[cfg(windows)]
mod native {
    use std::ffi::c_void;
    use std::mem::size_of;
    use std::path::Path;

    use windows::core::PCWSTR;
    use windows::Win32::Foundation::TRUE;
    use windows::Win32::Graphics::Gdi::{
        CreateBitmap, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GdiFlush,
        SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ,
    };
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::Shell::ExtractIconW;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateIconIndirect, DestroyIcon, DrawIconEx, GetSystemMetrics, LoadIconW, LoadImageW,
        DI_MASK, DI_NORMAL, HICON, ICONINFO, IDI_APPLICATION, IDI_ERROR, IDI_INFORMATION,
        IDI_SHIELD, IDI_WARNING, IMAGE_ICON, LR_DEFAULTSIZE, LR_LOADFROMFILE, SM_CXSMICON,
        SM_CYSMICON,
    };

    use super::{apply_mask, Bitmap, IconSource, StockIcon};
    use crate::error::{Error, Result};
    use crate::tooltip::to_wide_os;

    /// Top-down 32bpp DIB section and a pointer to its pixels.
    fn dib_section(width: i32, height: i32) -> Result<(HBITMAP, *mut u32)> {
        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut bits: *mut c_void = std::ptr::null_mut();
        let bitmap = unsafe { CreateDIBSection(None, &bmi, DIB_RGB_COLORS, &mut bits, None, 0)? };
        if bits.is_null() {
            unsafe {
                let _ = DeleteObject(HGDIOBJ(bitmap.0));
            }
            return Err(windows::core::Error::from_win32().into());
        }
        Ok((bitmap, bits as *mut u32))
    }

    /// A DIB section selected into its own memory DC for drawing.
    struct Canvas {
        dc: HDC,
        bitmap: HBITMAP,
        old: HGDIOBJ,
        bits: *mut u32,
        len: usize,
    }

    impl Canvas {
        fn new(width: i32, height: i32) -> Result<Self> {
            let (bitmap, bits) = dib_section(width, height)?;
            unsafe {
                let dc = CreateCompatibleDC(None);
                if dc.is_invalid() {
                    let _ = DeleteObject(HGDIOBJ(bitmap.0));
                    return Err(windows::core::Error::from_win32().into());
                }
                let old = SelectObject(dc, HGDIOBJ(bitmap.0));
                Ok(Self {
                    dc,
                    bitmap,
                    old,
                    bits,
                    len: (width * height) as usize,
                })
            }
        }

        fn pixels(&mut self) -> &mut [u32] {
            unsafe {
                let _ = GdiFlush();
                std::slice::from_raw_parts_mut(self.bits, self.len)
            }
        }

        /// Releases the DC and hands the bitmap to the caller.
        fn into_bitmap(mut self) -> HBITMAP {
            std::mem::take(&mut self.bitmap)
        }
    }

    impl Drop for Canvas {
        fn drop(&mut self) {
            unsafe {
                let _ = SelectObject(self.dc, self.old);
                let _ = DeleteDC(self.dc);
                if !self.bitmap.0.is_null() {
                    let _ = DeleteObject(HGDIOBJ(self.bitmap.0));
                }
            }
        }
    }

    /// An icon handle. Icons loaded from files, bitmaps or the executable
    /// are destroyed on drop; shared stock icons are left alone.
    #[derive(Debug)]
    pub struct Icon {
        handle: HICON,
        owned: bool,
    }

    impl Icon {
        pub fn load(source: &IconSource) -> Result<Self> {
            match source {
                IconSource::Stock(stock) => Self::stock(*stock),
                IconSource::File(path) => Self::from_file(path),
                IconSource::Executable => Ok(Self::from_executable()),
                IconSource::Bitmap(bitmap) => Self::from_bitmap(bitmap),
            }
        }

        pub fn stock(stock: StockIcon) -> Result<Self> {
            let id = match stock {
                StockIcon::Application => IDI_APPLICATION,
                StockIcon::Information => IDI_INFORMATION,
                StockIcon::Warning => IDI_WARNING,
                StockIcon::Error => IDI_ERROR,
                StockIcon::Shield => IDI_SHIELD,
            };
            let handle = unsafe { LoadIconW(None, id)? };
            Ok(Self {
                handle,
                owned: false,
            })
        }

        pub fn from_file(path: &Path) -> Result<Self> {
            if !path.exists() {
                return Err(Error::IconFileNotFound(path.to_path_buf()));
            }
            let wpath = to_wide_os(path.as_os_str());
            let handle = unsafe {
                LoadImageW(
                    None,
                    PCWSTR(wpath.as_ptr()),
                    IMAGE_ICON,
                    0,
                    0,
                    LR_LOADFROMFILE | LR_DEFAULTSIZE,
                )?
            };
            Ok(Self {
                handle: HICON(handle.0),
                owned: true,
            })
        }

        /// First icon of the running executable, or the stock application
        /// icon when it has none.
        pub fn from_executable() -> Self {
            unsafe {
                let hinst = GetModuleHandleW(None).unwrap_or_default();
                if let Ok(exe) = std::env::current_exe() {
                    let wpath = to_wide_os(exe.as_os_str());
                    let icon = ExtractIconW(hinst, PCWSTR(wpath.as_ptr()), 0);
                    // ExtractIconW returns 1 for "not an executable".
                    if !icon.0.is_null() && icon.0 as usize > 1 {
                        return Self {
                            handle: icon,
                            owned: true,
                        };
                    }
                }
                Self {
                    handle: LoadIconW(None, IDI_APPLICATION).unwrap_or_default(),
                    owned: false,
                }
            }
        }

        pub fn from_bitmap(bitmap: &Bitmap) -> Result<Self> {
            let (width, height) = (bitmap.width() as i32, bitmap.height() as i32);
            let (color, bits) = dib_section(width, height)?;
            unsafe {
                std::slice::from_raw_parts_mut(bits, bitmap.pixels().len())
                    .copy_from_slice(bitmap.pixels());
                // The colour bitmap carries alpha; an all-zero mask keeps
                // every pixel visible for consumers that ignore it.
                let mask = CreateBitmap(width, height, 1, 1, None);
                let info = ICONINFO {
                    fIcon: TRUE,
                    hbmMask: mask,
                    hbmColor: color,
                    ..Default::default()
                };
                let handle = CreateIconIndirect(&info);
                let _ = DeleteObject(HGDIOBJ(mask.0));
                let _ = DeleteObject(HGDIOBJ(color.0));
                Ok(Self {
                    handle: handle?,
                    owned: true,
                })
            }
        }

        pub fn handle(&self) -> HICON {
            self.handle
        }

        /// Small-icon sized 32bpp premultiplied bitmap for use as a menu item
        /// image. The caller deletes it with `DeleteObject` once the menu is
        /// gone.
        pub fn to_menu_bitmap(&self) -> Result<HBITMAP> {
            let (cx, cy) = unsafe { (GetSystemMetrics(SM_CXSMICON), GetSystemMetrics(SM_CYSMICON)) };
            let mut color = Canvas::new(cx, cy)?;
            let mut mask = Canvas::new(cx, cy)?;
            unsafe {
                DrawIconEx(color.dc, 0, 0, self.handle, cx, cy, 0, None, DI_NORMAL)?;
                DrawIconEx(mask.dc, 0, 0, self.handle, cx, cy, 0, None, DI_MASK)?;
            }
            apply_mask(color.pixels(), mask.pixels());
            Ok(color.into_bitmap())
        }
    }

    impl Drop for Icon {
        fn drop(&mut self) {
            if self.owned && !self.handle.0.is_null() {
                unsafe {
                    let _ = DestroyIcon(self.handle);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_use_snake_case_tags() {
        let json = serde_json::to_string(&IconSource::Stock(StockIcon::Shield)).unwrap();
        assert_eq!(json, r#"{"stock":"shield"}"#);
        let parsed: IconSource = serde_json::from_str(r#""executable""#).unwrap();
        assert_eq!(parsed, IconSource::Executable);
        let parsed: IconSource = serde_json::from_str(r#"{"file":"C:/icons/app.ico"}"#).unwrap();
        assert_eq!(parsed, IconSource::File(PathBuf::from("C:/icons/app.ico")));
    }

    #[test]
    fn bitmap_size_must_match_pixels() {
        assert!(Bitmap::new(2, 2, vec![0; 4]).is_some());
        assert!(Bitmap::new(2, 2, vec![0; 3]).is_none());
        assert!(Bitmap::new(0, 4, Vec::new()).is_none());
        let bmp = Bitmap::new(3, 1, vec![1, 2, 3]).unwrap();
        assert_eq!((bmp.width(), bmp.height()), (3, 1));
        assert_eq!(bmp.pixels(), &[1, 2, 3]);
    }

    #[test]
    fn straight_alpha_is_premultiplied() {
        let bmp = Bitmap::from_straight_argb(2, 1, vec![0x80FF_8000, 0xFF12_3456]).unwrap();
        assert_eq!(bmp.pixels(), &[0x8080_4000, 0xFF12_3456]);
    }

    #[test]
    fn bitmap_sources_stay_out_of_config() {
        let src = IconSource::Bitmap(Bitmap::new(1, 1, vec![0xFF00_0000]).unwrap());
        assert!(serde_json::to_string(&src).is_err());
        assert!(serde_json::from_str::<IconSource>(r#"{"bitmap":null}"#).is_err());
    }

    #[test]
    fn mask_gives_alpha_to_opaque_pixels() {
        // Black AND-mask pixels are opaque, white ones transparent.
        let mut color = vec![0x0011_2233, 0x0044_5566, 0x0000_0000];
        let mask = vec![0x0000_0000, 0x00FF_FFFF, 0x0000_0000];
        apply_mask(&mut color, &mask);
        assert_eq!(color, vec![0xFF11_2233, 0, 0xFF00_0000]);
    }

    #[test]
    fn mask_ignored_when_alpha_present() {
        let mut color = vec![0x8040_2010, 0x0000_0000];
        apply_mask(&mut color, &[0x00FF_FFFF, 0x0000_0000]);
        assert_eq!(color, vec![0x8040_2010, 0x0000_0000]);
    }

    #[test]
    fn default_is_application_icon() {
        assert_eq!(
            IconSource::default(),
            IconSource::Stock(StockIcon::Application)
        );
    }
}
