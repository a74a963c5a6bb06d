#![no_main]
use libfuzzer_sys::fuzz_target;
use testkit_core::config::LINE_CAPACITY;
use testkit_core::report::{self, LineBuf};

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let signum = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let addr = u64::from_le_bytes([
        data[4], data[5], data[6], data[7],
        data[8], data[9], data[10], data[11],
    ]) as usize;

    // Line builders never overrun the buffer and always end the line
    let mut line = LineBuf::<LINE_CAPACITY>::new();
    report::header(&mut line, signum);
    assert!(line.len() <= LINE_CAPACITY);
    report::fault(&mut line, addr, signum);
    assert_eq!(line.as_bytes().last(), Some(&b'\n'));

    let mut tiny = LineBuf::<16>::new();
    tiny.push_bytes(&data[12..]).end_line();
    assert!(tiny.len() <= 16);
});
