use gifcast::frame::{Delay, Encoder};
use tokio_util::compat::TokioAsyncWriteCompatExt;

fn frames() -> Vec<Vec<u8>> {
    (0..4u8)
        .map(|i| {
            (0..8 * 8)
                .flat_map(|p: u8| vec![p.wrapping_mul(i), i, 255 - p, (p % 5) * 60])
                .collect()
        })
        .collect()
}

fn encode_sync(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut encoder = Encoder::new(8, 8).unwrap();
    let mut stream = encoder.into_stream(vec![]);
    stream.begin().unwrap();
    for frame in frames {
        stream.add_frame(frame, Delay::from_centis(10)).unwrap();
    }
    stream.end().unwrap()
}

#[tokio::test]
async fn async_matches_sync() {
    let frames = frames();
    let mut encoder = Encoder::new(8, 8).unwrap();
    let mut stream = encoder.into_async(Vec::new().compat_write());

    stream.begin().await.unwrap();
    for frame in &frames {
        stream.add_frame(frame, Delay::from_centis(10)).await.unwrap();
    }
    let written = stream.end().await.unwrap().into_inner();

    assert_eq!(written, encode_sync(&frames));
}

#[tokio::test(flavor = "multi_thread")]
async fn async_consumer_on_another_task() {
    let frames = frames();
    let expected = encode_sync(&frames);
    let (writer, mut reader) = tokio::io::duplex(64);

    let reading = tokio::spawn(async move {
        use tokio::io::AsyncReadExt;
        let mut data = vec![];
        reader.read_to_end(&mut data).await.unwrap();
        data
    });

    let mut encoder = Encoder::new(8, 8).unwrap();
    let mut stream = encoder.into_async(writer.compat_write());
    stream.begin().await.unwrap();
    for frame in &frames {
        stream.add_frame(frame, Delay::from_centis(10)).await.unwrap();
    }
    drop(stream.end().await.unwrap());

    assert_eq!(reading.await.unwrap(), expected);
}
