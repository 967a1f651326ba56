use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
fn strftime_local(secs: i64, format: &std::ffi::CStr) -> Option<String> {
    use std::ffi::CStr;

    let secs = secs as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    let mut buf = [0 as libc::c_char; 100];

    unsafe {
        if libc::localtime_r(&secs, &mut tm).is_null() {
            return None;
        }
        let written = libc::strftime(buf.as_mut_ptr(), buf.len(), format.as_ptr(), &tm);
        if written == 0 {
            return None;
        }
        Some(CStr::from_ptr(buf.as_ptr()).to_string_lossy().into_owned())
    }
}

/// Returns the current time in the format YYYY-MM-DD HH:MM:SS TZ
#[cfg(unix)]
pub fn now() -> String {
    let secs = unix_timestamp();
    strftime_local(secs, c"%Y-%m-%d %H:%M:%S %Z").unwrap_or_else(|| secs.to_string())
}

/// Formats a Unix timestamp as local YYYY-MM-DD HH:MM:SS
#[cfg(unix)]
pub fn format_local(secs: i64) -> String {
    strftime_local(secs, c"%Y-%m-%d %H:%M:%S").unwrap_or_else(|| secs.to_string())
}

#[cfg(windows)]
fn format_systemtime(tm: &windows_sys::Win32::Foundation::SYSTEMTIME) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        tm.wYear, tm.wMonth, tm.wDay, tm.wHour, tm.wMinute, tm.wSecond
    )
}

/// Returns the current local time in the format YYYY-MM-DD HH:MM:SS
#[cfg(windows)]
pub fn now() -> String {
    use windows_sys::Win32::Foundation::SYSTEMTIME;
    use windows_sys::Win32::System::SystemInformation::GetLocalTime;

    let mut tm: SYSTEMTIME = unsafe { std::mem::zeroed() };
    unsafe {
        GetLocalTime(&mut tm);
    }
    format_systemtime(&tm)
}

/// Formats a Unix timestamp as local YYYY-MM-DD HH:MM:SS
#[cfg(windows)]
pub fn format_local(secs: i64) -> String {
    use windows_sys::Win32::Foundation::{FILETIME, SYSTEMTIME};
    use windows_sys::Win32::System::Time::{FileTimeToSystemTime, SystemTimeToTzSpecificLocalTime};

    // FILETIME counts 100ns intervals since 1601-01-01.
    let Some(intervals) = secs
        .checked_add(11_644_473_600)
        .and_then(|s| s.checked_mul(10_000_000))
        .filter(|i| *i >= 0)
    else {
        return secs.to_string();
    };
    let file_time = FILETIME {
        dwLowDateTime: intervals as u32,
        dwHighDateTime: (intervals >> 32) as u32,
    };
    let mut utc: SYSTEMTIME = unsafe { std::mem::zeroed() };
    let mut local: SYSTEMTIME = unsafe { std::mem::zeroed() };
    unsafe {
        if FileTimeToSystemTime(&file_time, &mut utc) == 0 {
            return secs.to_string();
        }
        if SystemTimeToTzSpecificLocalTime(std::ptr::null(), &utc, &mut local) == 0 {
            return format_systemtime(&utc);
        }
    }
    format_systemtime(&local)
}

/// Returns the current Unix timestamp in seconds
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_formatted() {
        let stamp = now();
        // YYYY-MM-DD HH:MM:SS
        assert!(stamp.len() >= 19, "unexpected timestamp '{}'", stamp);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[13..14], ":");
    }

    #[test]
    fn test_format_local_shape() {
        let stamp = format_local(1_700_000_000);
        assert_eq!(stamp.len(), 19, "unexpected timestamp '{}'", stamp);
        assert!(stamp.starts_with("2023-11-1"));
    }

    #[test]
    fn test_unix_timestamp_is_recent() {
        // 2020-01-01
        assert!(unix_timestamp() > 1_577_836_800);
    }
}
