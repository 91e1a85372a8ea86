#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);

    // Anything that compiles must at least carry the module header
    if let Ok(bytes) = watc::compile(&source) {
        assert_eq!(&bytes[..4], b"\0asm");
    }
});
