#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, &[u8])| {
    let (size, data) = input;
    let size = 2 + size % 7;
    let mask = ((1u16 << size) - 1) as u8;
    let data: Vec<u8> = data.iter().map(|b| b & mask).collect();

    let blocks = gifcast::encode::compress(size, &data).unwrap();
    let mut lzw = vec![];
    let mut rest = blocks.as_slice();
    while let Some((&len, tail)) = rest.split_first() {
        if len == 0 {
            assert!(tail.is_empty());
            break;
        }
        lzw.extend_from_slice(&tail[..usize::from(len)]);
        rest = &tail[usize::from(len)..];
    }

    let mut decoder = weezl::decode::Decoder::new(weezl::BitOrder::Lsb, size);
    let result = decoder.decode(&lzw);
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(result.unwrap(), data);
});
