//! RFT 클라이언트 (송신자) - Reliable File Transfer
//!
//! 파일을 492바이트 청크로 나눠 Slow Start로 전송
//!
//! 사용법:
//!   cargo run --release --bin rft-client -- --file <PATH> [OPTIONS]
//!
//! 예시:
//!   # 로컬 서버로 전송
//!   cargo run --release --bin rft-client -- --file photo.png
//!
//!   # 원격 서버, 긴 타임아웃
//!   cargo run --release --bin rft-client -- -f data.bin -s 192.168.0.10:3000 --ack-timeout 250

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rft::{Config, Sender, DEFAULT_PORT};

/// 클라이언트 설정
struct ClientConfig {
    server_addr: String,
    file_path: Option<PathBuf>,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("localhost:{DEFAULT_PORT}"),
            file_path: None,
            config: Config::default(),
        }
    }
}

fn usage() -> ! {
    println!(
        r#"RFT Client - Reliable File Transfer 송신자

UDP 기반 Slow Start + Fast Retransmit 파일 전송 송신자
- 라운드마다 윈도우 2배 증가 (최대 4096)
- 같은 ACK 3회 수신 시 누락 청크 즉시 재전송

사용법:
  cargo run --release --bin rft-client -- --file <PATH> [OPTIONS]

옵션:
  -f, --file <PATH>        전송할 파일 경로 (필수)
  -s, --server <ADDR>      서버 주소 (기본: localhost:{DEFAULT_PORT})
  --ack-timeout <MS>       ACK 대기 타임아웃 (기본: 100)
  --max-idle <N>           연속 무응답 라운드 한도, 0이면 무제한 (기본: 100)
  --preset <NAME>          default | lan | unstable
  -h, --help               이 도움말 출력
"#
    );
    std::process::exit(0);
}

fn parse_args() -> Result<ClientConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} 값 필요", args[i]))
        };

        match args[i].as_str() {
            "--file" | "-f" => {
                config.file_path = Some(PathBuf::from(value(i)?));
                i += 1;
            }
            "--server" | "-s" => {
                config.server_addr = value(i)?;
                i += 1;
            }
            "--preset" => {
                config.config = match value(i)?.as_str() {
                    "default" => Config::default(),
                    "lan" => Config::lan(),
                    "unstable" => Config::unstable_network(),
                    other => return Err(format!("알 수 없는 preset: {other}")),
                };
                i += 1;
            }
            "--ack-timeout" => {
                config.config.ack_timeout_ms =
                    value(i)?.parse().map_err(|e| format!("유효한 숫자 필요: {e}"))?;
                i += 1;
            }
            "--max-idle" => {
                let rounds: u32 = value(i)?.parse().map_err(|e| format!("유효한 숫자 필요: {e}"))?;
                config.config.max_idle_rounds = (rounds > 0).then_some(rounds);
                i += 1;
            }
            "--help" | "-h" => usage(),
            other => return Err(format!("알 수 없는 옵션: {other}")),
        }
        i += 1;
    }

    Ok(config)
}

fn resolve(addr: &str) -> Result<SocketAddr, String> {
    addr.to_socket_addrs()
        .map_err(|e| format!("주소 해석 실패 {addr}: {e}"))?
        .next()
        .ok_or_else(|| format!("주소 없음: {addr}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args()?;
    let file_path = client_config
        .file_path
        .ok_or("--file 옵션 필요 (--help 참고)")?;
    let server_addr = resolve(&client_config.server_addr)?;

    info!("RFT Client starting...");
    info!("Server: {}", server_addr);
    info!("Chunk size: {} bytes", client_config.config.chunk_size);
    info!("ACK timeout: {}ms", client_config.config.ack_timeout_ms);

    let sender = Sender::connect(client_config.config, server_addr).await?;
    let stats = sender.send_file(&file_path).await?;

    info!("{}", stats.sender_summary());
    Ok(())
}
