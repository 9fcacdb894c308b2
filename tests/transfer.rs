//! 루프백 UDP 전송 통합 테스트
//!
//! 손실/손상 시나리오는 송신자와 수신자 사이에 중계 소켓을 두고 재현

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use rft::{
    ChunkSplitter, Config, DiskAssembler, Error, ExtensionTag, Frame, MemoryAssembler, Message,
    Receiver, Sender, TeardownOutcome,
};

const TEST_DEADLINE: Duration = Duration::from_secs(30);

/// 중계 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// 송신자 → 수신자 (프레임, end)
    Forward,

    /// 수신자 → 송신자 (ACK)
    Backward,
}

/// 중계 소켓 실행
///
/// `impair`가 None을 돌려주면 datagram 폐기
async fn spawn_relay<F>(receiver_addr: SocketAddr, mut impair: F) -> (SocketAddr, JoinHandle<()>)
where
    F: FnMut(Direction, &[u8]) -> Option<Vec<u8>> + Send + 'static,
{
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = socket.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut sender_addr: Option<SocketAddr> = None;
        let mut buf = vec![0u8; 2048];

        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                continue;
            };

            let (direction, target) = if from == receiver_addr {
                match sender_addr {
                    Some(addr) => (Direction::Backward, addr),
                    None => continue,
                }
            } else {
                sender_addr = Some(from);
                (Direction::Forward, receiver_addr)
            };

            if let Some(datagram) = impair(direction, &buf[..len]) {
                let _ = socket.send_to(&datagram, target).await;
            }
        }
    });

    (relay_addr, handle)
}

fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn split(data: &[u8], chunk_size: usize) -> Vec<Bytes> {
    ChunkSplitter::new(chunk_size)
        .unwrap()
        .split(Bytes::copy_from_slice(data))
        .unwrap()
}

/// 송신자 → 수신자 `end` 수를 세는 중계 동작
///
/// `discard`가 true인 datagram은 폐기
fn count_ends<D>(
    ends: Arc<AtomicUsize>,
    mut discard: D,
) -> impl FnMut(Direction, &[u8]) -> Option<Vec<u8>> + Send + 'static
where
    D: FnMut(Direction, &[u8]) -> bool + Send + 'static,
{
    move |direction, datagram| {
        if direction == Direction::Forward && Message::is_end(datagram) {
            ends.fetch_add(1, Ordering::SeqCst);
        }
        (!discard(direction, datagram)).then(|| datagram.to_vec())
    }
}

fn frame_index(datagram: &[u8]) -> Option<u32> {
    Frame::decode(datagram).ok().map(|frame| frame.sequence_index)
}

fn fast_config() -> Config {
    Config {
        ack_timeout_ms: 30,
        teardown_timeout_ms: 50,
        teardown_max_attempts: Some(10),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_lossless_transfer() {
    let data = sample_data(10 * 100 - 11);
    let chunks = split(&data, 100);
    let extension = ExtensionTag::new("txt").unwrap();

    let receiver = Receiver::bind(Config::default(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();

    let ends = Arc::new(AtomicUsize::new(0));
    let (relay_addr, relay) =
        spawn_relay(receiver_addr, count_ends(ends.clone(), |_, _| false)).await;

    let sender = Sender::connect(Config::default(), relay_addr).await.unwrap();

    let mut assembler = MemoryAssembler;
    let (report, stats) = tokio::time::timeout(TEST_DEADLINE, async {
        tokio::join!(
            receiver.receive(&mut assembler),
            sender.send_chunks(&chunks, &extension)
        )
    })
    .await
    .unwrap();
    relay.abort();

    let report = report.unwrap();
    let stats = stats.unwrap();

    assert_eq!(&report.output[..], &data[..]);
    assert_eq!(report.teardown, TeardownOutcome::Closed);
    assert_eq!(report.stats.corrupted_frames, 0);
    assert_eq!(stats.rounds, 4);
    assert_eq!(stats.frames_sent, 10);
    assert_eq!(stats.peak_window, 8);
    assert_eq!(stats.fast_retransmits, 0);
    assert_eq!(ends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_lost_completion_ack_sends_single_end() {
    let data = sample_data(10 * 100);
    let chunks = split(&data, 100);
    let extension = ExtensionTag::new("txt").unwrap();

    let receiver = Receiver::bind(fast_config(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();

    // 첫 완료 ACK(10)만 유실
    let ends = Arc::new(AtomicUsize::new(0));
    let mut dropped = false;
    let drop_first_completion = move |direction: Direction, datagram: &[u8]| {
        let hit = !dropped && direction == Direction::Backward && datagram == b"10";
        dropped |= hit;
        hit
    };
    let (relay_addr, relay) =
        spawn_relay(receiver_addr, count_ends(ends.clone(), drop_first_completion)).await;

    let sender = Sender::connect(fast_config(), relay_addr).await.unwrap();

    let mut assembler = MemoryAssembler;
    let (report, stats) = tokio::time::timeout(TEST_DEADLINE, async {
        tokio::join!(
            receiver.receive(&mut assembler),
            sender.send_chunks(&chunks, &extension)
        )
    })
    .await
    .unwrap();
    relay.abort();

    let report = report.unwrap();
    let stats = stats.unwrap();

    assert_eq!(&report.output[..], &data[..]);
    assert_eq!(report.teardown, TeardownOutcome::Closed);
    assert_eq!(stats.rounds, 5);
    assert_eq!(stats.frames_sent, 11);
    assert_eq!(ends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_send_file_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("photo.png");
    let data = sample_data(3 * 492 + 17);
    std::fs::write(&source, &data).unwrap();

    let out_dir = dir.path().join("inbox");
    let receiver = Receiver::bind(Config::lan(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();
    let sender = Sender::connect(Config::lan(), receiver_addr).await.unwrap();

    let mut assembler = DiskAssembler::new(&out_dir, "received");
    let (report, stats) = tokio::time::timeout(TEST_DEADLINE, async {
        tokio::join!(receiver.receive(&mut assembler), sender.send_file(&source))
    })
    .await
    .unwrap();

    let report = report.unwrap();
    assert!(stats.is_ok());
    assert_eq!(report.output, out_dir.join("received.png"));
    assert_eq!(std::fs::read(&report.output).unwrap(), data);
}

#[tokio::test]
async fn test_empty_file_is_transferred() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("empty.log");
    std::fs::write(&source, b"").unwrap();

    let receiver = Receiver::bind(Config::lan(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();
    let sender = Sender::connect(Config::lan(), receiver_addr).await.unwrap();

    let mut assembler = DiskAssembler::new(dir.path(), "copy");
    let (report, stats) = tokio::time::timeout(TEST_DEADLINE, async {
        tokio::join!(receiver.receive(&mut assembler), sender.send_file(&source))
    })
    .await
    .unwrap();

    let report = report.unwrap();
    assert_eq!(stats.unwrap().frames_sent, 1);
    assert_eq!(report.output, dir.path().join("copy.log"));
    assert!(std::fs::read(&report.output).unwrap().is_empty());
}

#[tokio::test]
async fn test_corruption_triggers_fast_retransmit() {
    let data = sample_data(12 * 64);
    let chunks = split(&data, 64);
    let extension = ExtensionTag::new("bin").unwrap();

    let receiver = Receiver::bind(fast_config(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();

    // 청크 3의 처음 두 번 전달을 손상
    let mut corrupt_left = 2;
    let (relay_addr, relay) = spawn_relay(receiver_addr, move |direction, datagram| {
        let mut bytes = datagram.to_vec();
        if direction == Direction::Forward && corrupt_left > 0 && frame_index(datagram) == Some(3) {
            corrupt_left -= 1;
            let last = bytes.len() - 1;
            bytes[last] ^= 0x5A;
        }
        Some(bytes)
    })
    .await;

    let sender = Sender::connect(fast_config(), relay_addr).await.unwrap();

    let mut assembler = MemoryAssembler;
    let (report, stats) = tokio::time::timeout(TEST_DEADLINE, async {
        tokio::join!(
            receiver.receive(&mut assembler),
            sender.send_chunks(&chunks, &extension)
        )
    })
    .await
    .unwrap();
    relay.abort();

    let report = report.unwrap();
    let stats = stats.unwrap();

    assert_eq!(&report.output[..], &data[..]);
    assert_eq!(report.stats.corrupted_frames, 2);
    assert!(stats.fast_retransmits >= 1);
    assert!(stats.frames_sent > 12);
}

#[tokio::test]
async fn test_random_frame_loss_is_recovered() {
    let data = sample_data(40 * 120 + 5);
    let chunks = split(&data, 120);
    let extension = ExtensionTag::new("dat").unwrap();

    let receiver = Receiver::bind(fast_config(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();

    // 프레임 15% 손실, end는 항상 전달
    let mut rng = StdRng::seed_from_u64(7);
    let (relay_addr, relay) = spawn_relay(receiver_addr, move |direction, datagram| {
        if direction == Direction::Forward && !Message::is_end(datagram) && rng.gen_bool(0.15) {
            return None;
        }
        Some(datagram.to_vec())
    })
    .await;

    let sender = Sender::connect(fast_config(), relay_addr).await.unwrap();

    let mut assembler = MemoryAssembler;
    let (report, stats) = tokio::time::timeout(TEST_DEADLINE, async {
        tokio::join!(
            receiver.receive(&mut assembler),
            sender.send_chunks(&chunks, &extension)
        )
    })
    .await
    .unwrap();
    relay.abort();

    let report = report.unwrap();
    let stats = stats.unwrap();

    assert_eq!(&report.output[..], &data[..]);
    assert_eq!(report.teardown, TeardownOutcome::Closed);
    assert!(stats.frames_sent > chunks.len() as u64);
}

#[tokio::test]
async fn test_receiver_gives_up_without_end() {
    let chunks = split(&sample_data(5 * 50), 50);
    let extension = ExtensionTag::new("bin").unwrap();

    let receiver_config = Config {
        teardown_timeout_ms: 20,
        teardown_max_attempts: Some(3),
        ..fast_config()
    };
    let receiver = Receiver::bind(receiver_config, "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let receiver_addr = receiver.local_addr().unwrap();

    let (relay_addr, relay) = spawn_relay(receiver_addr, |_, datagram| {
        (!Message::is_end(datagram)).then(|| datagram.to_vec())
    })
    .await;

    let sender = Sender::connect(fast_config(), relay_addr).await.unwrap();

    let mut assembler = MemoryAssembler;
    let (report, stats) = tokio::time::timeout(TEST_DEADLINE, async {
        tokio::join!(
            receiver.receive(&mut assembler),
            sender.send_chunks(&chunks, &extension)
        )
    })
    .await
    .unwrap();
    relay.abort();

    assert!(stats.is_ok());
    let report = report.unwrap();
    assert_eq!(report.teardown, TeardownOutcome::GaveUp { attempts: 3 });
    assert_eq!(report.output.len(), 5 * 50);
}

#[tokio::test]
async fn test_sender_abandons_silent_receiver() {
    // 바인딩만 하고 응답하지 않는 소켓
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = Config {
        ack_timeout_ms: 20,
        max_idle_rounds: Some(3),
        ..Config::default()
    };

    let sender = Sender::connect(config, silent.local_addr().unwrap())
        .await
        .unwrap();
    let chunks = split(&sample_data(300), 100);

    let result = tokio::time::timeout(
        TEST_DEADLINE,
        sender.send_chunks(&chunks, &ExtensionTag::default()),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::Abandoned { idle_rounds: 3 })));
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let occupied = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = occupied.local_addr().unwrap();

    let result = Receiver::bind(Config::default(), addr).await;
    assert!(matches!(result, Err(Error::Io(_))));
}

#[tokio::test]
async fn test_invalid_config_rejected_before_socket() {
    let config = Config {
        chunk_size: 0,
        ..Config::default()
    };
    let result = Sender::connect(config, "127.0.0.1:9".parse().unwrap()).await;
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
