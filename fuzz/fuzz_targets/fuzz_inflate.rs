#![no_main]

use libfuzzer_sys::fuzz_target;
use maestro::inflate::inflate;

// A 1MiB output buffer comfortably covers any back-reference a malformed stream could construct
// within that many input bytes; `inflate` itself never writes past it, so this just needs to be
// large enough to give the decoder room without bounding what a real caller could supply.
const OUT_CAP: usize = 1024 * 1024;

fuzz_target!(|data: &[u8]| {
    let mut out = vec![0u8; OUT_CAP];
    let n = inflate(&mut out, data);
    assert!(n <= OUT_CAP);
});
