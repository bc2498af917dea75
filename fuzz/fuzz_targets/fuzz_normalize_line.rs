#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(line) = gantry_logger::logger::normalize_line(data) {
        assert!(!line.is_empty());
        assert_eq!(line.trim(), line);
    }
});
