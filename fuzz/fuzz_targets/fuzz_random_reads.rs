#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zip2_fs::fixture::ZipBuilder;
use zip2_fs::{OpenMode, VirtualPath, Zip2FileSystem};

#[derive(Arbitrary, Debug)]
struct Input {
    payload: Vec<u8>,
    streamed: bool,
    reads: Vec<(u16, u8)>,
}

// Any sequence of positioned reads must match the payload slice
fuzz_target!(|input: Input| {
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(_) => return,
    };
    let container = dir.path().join("fuzz.zip");
    let builder = ZipBuilder::new();
    let builder = if input.streamed {
        builder.streamed("data.bin", &input.payload)
    } else {
        builder.deflated("data.bin", &input.payload)
    };
    builder.write_to(&container).unwrap();

    let fs = Zip2FileSystem::new();
    let path = VirtualPath::parse(&format!("zip2:{}!data.bin", container.display()));
    assert_eq!(fs.size(&path), input.payload.len() as u64);

    let mut file = fs.open(&path, OpenMode::Read).unwrap();
    for (pos, len) in input.reads.iter().take(32) {
        let pos = *pos as usize;
        let mut buf = vec![0u8; *len as usize];
        file.set_position(pos as u64);
        let n = file.read(&mut buf).unwrap();
        let expected = input.payload.get(pos..).unwrap_or(&[]);
        assert!(n <= expected.len());
        assert_eq!(&buf[..n], &expected[..n]);
    }
});
