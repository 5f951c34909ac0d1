#![no_main]

use libfuzzer_sys::fuzz_target;
use veridex_merkle::decode_auth_path;

fuzz_target!(|data: &[u8]| {
    let _ = decode_auth_path(data);
});
