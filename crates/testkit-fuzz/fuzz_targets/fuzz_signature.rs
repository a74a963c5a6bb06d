#![no_main]
use libfuzzer_sys::fuzz_target;
use testkit_core::signature::{Signature, is_well_formed};

fuzz_target!(|data: &[u8]| {
    // The const checker and the parser must agree on every input
    let parsed = Signature::parse_bytes(data);
    assert_eq!(parsed.is_ok(), is_well_formed(data));

    if let Ok(sig) = parsed {
        assert_eq!(sig.to_string().as_bytes(), data);
    }
});
