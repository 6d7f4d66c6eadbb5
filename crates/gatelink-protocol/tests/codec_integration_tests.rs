//! LineCodec over real Tokio streams.

use futures::{SinkExt, StreamExt};
use gatelink_core::AckByte;
use gatelink_protocol::{LineCodec, ProtocolError, parse};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::test]
async fn test_read_frames_from_stream() {
    let (mut device, host) = tokio::io::duplex(256);
    let mut frames = FramedRead::new(host, LineCodec::new());

    device.write_all(b"RFID:AB12CD34\r\nPING\n").await.unwrap();
    drop(device);

    let first = frames.next().await.unwrap().unwrap();
    assert_eq!(parse(&first).rfid_code(), Some("AB12CD34"));

    let second = frames.next().await.unwrap().unwrap();
    assert!(!parse(&second).is_valid);

    assert!(frames.next().await.is_none());
}

#[tokio::test]
async fn test_fragmented_writes_reassemble() {
    let (mut device, host) = tokio::io::duplex(256);
    let mut frames = FramedRead::new(host, LineCodec::new());

    for chunk in [&b"RF"[..], b"ID:0004", b"521337", b"\n"] {
        device.write_all(chunk).await.unwrap();
        device.flush().await.unwrap();
    }

    let line = frames.next().await.unwrap().unwrap();
    assert_eq!(line, "RFID:0004521337");
}

#[tokio::test]
async fn test_oversized_frame_reports_error() {
    let (mut device, host) = tokio::io::duplex(256);
    let mut frames = FramedRead::new(host, LineCodec::with_max_length(16));

    device.write_all(&[b'x'; 64]).await.unwrap();
    device.write_all(b"\n").await.unwrap();

    let err = frames.next().await.unwrap().unwrap_err();
    assert!(matches!(err, ProtocolError::FrameTooLong { max: 16 }));
}

#[tokio::test]
async fn test_write_acks_to_stream() {
    let (device, host) = tokio::io::duplex(64);
    let mut sink = FramedWrite::new(host, LineCodec::new());
    let mut lines = FramedRead::new(device, LineCodec::new());

    sink.send(AckByte::Granted).await.unwrap();
    sink.send(AckByte::Denied).await.unwrap();

    assert_eq!(lines.next().await.unwrap().unwrap(), "A");
    assert_eq!(lines.next().await.unwrap().unwrap(), "N");
}
