#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::{Cursor, Read};
use zip2_fs::ZipStream;

// Arbitrary container bytes must never panic the entry enumerator
fuzz_target!(|data: &[u8]| {
    let mut stream = ZipStream::new(Cursor::new(data));
    let mut buf = [0u8; 512];
    for i in 0..64 {
        match stream.next_entry() {
            Ok(Some(_)) => {}
            _ => break,
        }
        // Odd entries are partially read and drained, even ones skipped raw
        if i % 2 == 1 {
            let _ = stream.read(&mut buf);
        }
    }
});
