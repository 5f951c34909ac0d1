#![no_main]

use libfuzzer_sys::fuzz_target;
use veridex_merkle::decode_str;

fuzz_target!(|data: &[u8]| {
    let _ = decode_str(data);
});
