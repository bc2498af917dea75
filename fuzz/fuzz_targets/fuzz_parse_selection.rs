#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    for port_count in [0, 1, 4] {
        if let Some(index) = gantry_logger::discovery::parse_selection(input, port_count) {
            assert!(index < port_count);
        }
    }
});
