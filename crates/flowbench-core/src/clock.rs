//! Monotonic elapsed time and wall-clock formatting.

use std::time::Instant;

/// Milliseconds elapsed since `since`, at sub-millisecond resolution.
pub fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Local wall-clock time as `HH:MM:SS.mmm`, for the per-loop report line.
pub fn wall_clock_hms() -> String {
    let mut tv = libc::timeval {
        tv_sec: 0,
        tv_usec: 0,
    };
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        libc::gettimeofday(&mut tv, std::ptr::null_mut());
        libc::localtime_r(&tv.tv_sec, &mut tm);
    }
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        tm.tm_hour,
        tm.tm_min,
        tm.tm_sec,
        tv.tv_usec / 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn elapsed_ms_grows() {
        let t0 = Instant::now();
        std::thread::sleep(Duration::from_millis(10));
        let ms = elapsed_ms(t0);
        assert!(ms >= 9.0, "elapsed only {ms} ms");
    }

    #[test]
    fn wall_clock_format_shape() {
        let s = wall_clock_hms();
        assert_eq!(s.len(), 12, "got {s:?}");
        let bytes = s.as_bytes();
        assert_eq!(bytes[2], b':');
        assert_eq!(bytes[5], b':');
        assert_eq!(bytes[8], b'.');
        assert!(s[9..].chars().all(|c| c.is_ascii_digit()));
    }
}
