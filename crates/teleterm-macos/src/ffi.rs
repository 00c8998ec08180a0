//! CoreGraphics and Accessibility implementation of [`WindowSystem`].
//!
//! Window titles from the window server need Screen Recording permission;
//! text capture, raising and key posting need Accessibility permission.

use std::ffi::c_void;
use std::time::Duration;

use core_foundation::base::{CFType, TCFType};
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_foundation_sys::array::{CFArrayGetCount, CFArrayGetTypeID, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation_sys::base::{CFGetTypeID, CFTypeRef};
use core_foundation_sys::dictionary::{CFDictionaryGetTypeID, CFDictionaryGetValue, CFDictionaryRef};
use core_foundation_sys::number::CFNumberGetTypeID;
use core_foundation_sys::string::{CFStringGetTypeID, CFStringRef};
use core_graphics::event::{CGEvent, CGEventFlags};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::window::{
    CGWindowListCopyWindowInfo, kCGNullWindowID, kCGWindowBounds, kCGWindowLayer, kCGWindowName,
    kCGWindowNumber, kCGWindowOwnerName, kCGWindowOwnerPID, kCGWindowListExcludeDesktopElements,
    kCGWindowListOptionOnScreenOnly,
};
use foreign_types::ForeignType;

use crate::window::{KeyStroke, WindowError, WindowRecord, WindowSystem};

type AXUIElementRef = CFTypeRef;
type AXError = i32;

const AX_SUCCESS: AXError = 0;
const SET_FRONT_PROCESS_FRONT_WINDOW_ONLY: u32 = 1;
/// Text-bearing roles, searched depth-first.
const TEXT_ROLES: &[&str] = &["AXTextArea", "AXStaticText", "AXWebArea"];
const MAX_AX_DEPTH: usize = 32;

#[repr(C)]
#[derive(Default)]
struct ProcessSerialNumber {
    high: u32,
    low: u32,
}

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> AXError;
    fn AXUIElementPerformAction(element: AXUIElementRef, action: CFStringRef) -> AXError;
    // Private, but the only bridge from an AX window to its CGWindowID.
    fn _AXUIElementGetWindow(element: AXUIElementRef, window_id: *mut u32) -> AXError;
    fn GetProcessForPID(pid: i32, psn: *mut ProcessSerialNumber) -> i32;
    fn SetFrontProcessWithOptions(psn: *const ProcessSerialNumber, options: u32) -> i32;
}

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGEventPostToPid(pid: i32, event: *mut c_void);
}

/// The live macOS window server.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacWindowSystem;

impl MacWindowSystem {
    pub fn new() -> Self {
        Self
    }
}

fn copy_attribute(element: AXUIElementRef, name: &'static str) -> Option<CFType> {
    let attribute = CFString::from_static_string(name);
    let mut value: CFTypeRef = std::ptr::null();
    let err = unsafe {
        AXUIElementCopyAttributeValue(element, attribute.as_concrete_TypeRef(), &mut value)
    };
    if err != AX_SUCCESS || value.is_null() {
        return None;
    }
    Some(unsafe { CFType::wrap_under_create_rule(value) })
}

fn copy_string(element: AXUIElementRef, name: &'static str) -> Option<String> {
    copy_attribute(element, name)?
        .downcast::<CFString>()
        .map(|s| s.to_string())
}

/// Borrowed element pointers, valid while `array` is alive.
fn array_items(array: &CFType) -> Vec<CFTypeRef> {
    if array.type_of() != unsafe { CFArrayGetTypeID() } {
        return Vec::new();
    }
    let raw = array.as_CFTypeRef() as CFArrayRef;
    let count = unsafe { CFArrayGetCount(raw) };
    (0..count)
        .map(|i| unsafe { CFArrayGetValueAtIndex(raw, i) })
        .collect()
}

/// Run `f` on the AX element of `window_id` inside app `pid`.
fn with_ax_window<R>(pid: u32, window_id: u32, f: impl FnOnce(AXUIElementRef) -> R) -> Option<R> {
    let app_ref = unsafe { AXUIElementCreateApplication(pid as i32) };
    if app_ref.is_null() {
        return None;
    }
    let app = unsafe { CFType::wrap_under_create_rule(app_ref) };
    let windows = copy_attribute(app.as_CFTypeRef(), "AXWindows")?;
    for win in array_items(&windows) {
        let mut wid = 0u32;
        if unsafe { _AXUIElementGetWindow(win, &mut wid) } == AX_SUCCESS && wid == window_id {
            return Some(f(win));
        }
    }
    None
}

fn find_text(element: AXUIElementRef, depth: usize) -> Option<String> {
    if let Some(role) = copy_string(element, "AXRole") {
        if TEXT_ROLES.contains(&role.as_str()) {
            return copy_string(element, "AXValue").filter(|s| !s.is_empty());
        }
    }
    if depth == 0 {
        return None;
    }
    let children = copy_attribute(element, "AXChildren")?;
    array_items(&children)
        .into_iter()
        .find_map(|child| find_text(child, depth - 1))
}

fn bring_to_front(pid: u32) -> Result<(), WindowError> {
    let mut psn = ProcessSerialNumber::default();
    let status = unsafe { GetProcessForPID(pid as i32, &mut psn) };
    if status != 0 {
        return Err(WindowError::Accessibility(format!("GetProcessForPID({pid}) = {status}")));
    }
    let status = unsafe { SetFrontProcessWithOptions(&psn, SET_FRONT_PROCESS_FRONT_WINDOW_ONLY) };
    if status != 0 {
        return Err(WindowError::Accessibility(format!("SetFrontProcess({pid}) = {status}")));
    }
    std::thread::sleep(Duration::from_millis(100));
    Ok(())
}

struct CFDictionaryWrapper {
    dict: CFDictionaryRef,
}

impl CFDictionaryWrapper {
    fn get(&self, key: CFTypeRef) -> Option<CFTypeRef> {
        let value = unsafe { CFDictionaryGetValue(self.dict, key as *const c_void) as CFTypeRef };
        (!value.is_null()).then_some(value)
    }

    fn typed(&self, key: CFTypeRef, type_id: usize) -> Option<CFTypeRef> {
        self.get(key)
            .filter(|&value| unsafe { CFGetTypeID(value) } as usize == type_id)
    }

    fn string(&self, key: CFTypeRef) -> Option<String> {
        let value = self.typed(key, unsafe { CFStringGetTypeID() } as usize)?;
        Some(unsafe { CFString::wrap_under_get_rule(value as _) }.to_string())
    }

    fn number(&self, key: CFTypeRef) -> Option<CFNumber> {
        let value = self.typed(key, unsafe { CFNumberGetTypeID() } as usize)?;
        Some(unsafe { CFNumber::wrap_under_get_rule(value as _) })
    }

    fn dict(&self, key: CFTypeRef) -> Option<CFDictionaryWrapper> {
        let value = self.typed(key, unsafe { CFDictionaryGetTypeID() } as usize)?;
        Some(CFDictionaryWrapper {
            dict: value as CFDictionaryRef,
        })
    }
}

fn window_record(window: &CFDictionaryWrapper) -> Option<WindowRecord> {
    let window_id = window.number(unsafe { kCGWindowNumber as CFTypeRef })?.to_i64()?;
    let pid = window.number(unsafe { kCGWindowOwnerPID as CFTypeRef })?.to_i64()?;
    let owner = window.string(unsafe { kCGWindowOwnerName as CFTypeRef })?;
    let layer = window
        .number(unsafe { kCGWindowLayer as CFTypeRef })
        .and_then(|n| n.to_i64())
        .unwrap_or(0);
    let title = window
        .string(unsafe { kCGWindowName as CFTypeRef })
        .unwrap_or_default();
    let bounds = window.dict(unsafe { kCGWindowBounds as CFTypeRef })?;
    let side = |name: &'static str| {
        let key = CFString::from_static_string(name);
        bounds
            .number(key.as_CFTypeRef())
            .and_then(|n| n.to_f64())
            .unwrap_or(0.0)
    };
    Some(WindowRecord {
        window_id: u32::try_from(window_id).ok()?,
        pid: u32::try_from(pid).ok()?,
        owner,
        title,
        layer,
        width: side("Width"),
        height: side("Height"),
    })
}

fn keyboard_event(
    source: &CGEventSource,
    stroke: KeyStroke,
    keydown: bool,
) -> Result<CGEvent, WindowError> {
    let event = CGEvent::new_keyboard_event(source.clone(), stroke.keycode, keydown)
        .map_err(|()| WindowError::EventPost("CGEventCreateKeyboardEvent returned null".into()))?;
    let mut flags = CGEventFlags::empty();
    if stroke.modifiers.ctrl {
        flags |= CGEventFlags::CGEventFlagControl;
    }
    if stroke.modifiers.alt {
        flags |= CGEventFlags::CGEventFlagAlternate;
    }
    if stroke.modifiers.cmd {
        flags |= CGEventFlags::CGEventFlagCommand;
    }
    if !flags.is_empty() {
        event.set_flags(flags);
    }
    if let Some(c) = stroke.unicode {
        let mut buf = [0u16; 2];
        event.set_string_from_utf16_unchecked(c.encode_utf16(&mut buf));
    }
    Ok(event)
}

impl WindowSystem for MacWindowSystem {
    fn windows(&self) -> Result<Vec<WindowRecord>, WindowError> {
        let options = kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements;
        let raw_list = unsafe { CGWindowListCopyWindowInfo(options, kCGNullWindowID) };
        if raw_list.is_null() {
            return Err(WindowError::Enumeration(
                "CGWindowListCopyWindowInfo returned null".into(),
            ));
        }
        let list = unsafe { CFType::wrap_under_create_rule(raw_list as CFTypeRef) };
        Ok(array_items(&list)
            .into_iter()
            .filter(|dict| !dict.is_null())
            .filter_map(|dict| {
                window_record(&CFDictionaryWrapper {
                    dict: dict as CFDictionaryRef,
                })
            })
            .collect())
    }

    fn ax_title(&self, pid: u32, window_id: u32) -> Option<String> {
        with_ax_window(pid, window_id, |win| copy_string(win, "AXTitle")).flatten()
    }

    fn window_text(&self, pid: u32, window_id: u32) -> Result<Option<String>, WindowError> {
        with_ax_window(pid, window_id, |win| find_text(win, MAX_AX_DEPTH))
            .ok_or(WindowError::NotFound(window_id))
    }

    fn raise(&self, pid: u32, window_id: u32) -> Result<(), WindowError> {
        let raised = with_ax_window(pid, window_id, |win| {
            let action = CFString::from_static_string("AXRaise");
            unsafe { AXUIElementPerformAction(win, action.as_concrete_TypeRef()) }
        });
        bring_to_front(pid)?;
        match raised {
            Some(AX_SUCCESS) => Ok(()),
            Some(err) => Err(WindowError::Accessibility(format!("AXRaise = {err}"))),
            None => Err(WindowError::NotFound(window_id)),
        }
    }

    fn post_key(&self, pid: u32, stroke: KeyStroke) -> Result<(), WindowError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|()| WindowError::EventPost("CGEventSourceCreate returned null".into()))?;
        let down = keyboard_event(&source, stroke, true)?;
        let up = keyboard_event(&source, stroke, false)?;
        unsafe { CGEventPostToPid(pid as i32, down.as_ptr() as *mut c_void) };
        std::thread::sleep(Duration::from_millis(1));
        unsafe { CGEventPostToPid(pid as i32, up.as_ptr() as *mut c_void) };
        std::thread::sleep(Duration::from_millis(5));
        Ok(())
    }
}
