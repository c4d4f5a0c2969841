#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let pixels = data.len() / 4;
    if pixels == 0 {
        return;
    }

    let frame = gifcast::quantize(&data[..4 * pixels], pixels as u32, 1).unwrap();
    assert!(frame.colors <= 256);
    assert_eq!(frame.palette.len(), 3 << frame.bit_width);
    for (pixel, &index) in data.chunks_exact(4).zip(&frame.indices) {
        assert_eq!(pixel[3] == 0, index == 0);
        assert!(usize::from(index) < frame.colors);
    }

    let blocks = gifcast::encode::compress(frame.bit_width, &frame.indices).unwrap();
    assert_eq!(blocks.last(), Some(&0));
});
