//! RFT 서버 (수신자) - Reliable File Transfer
//!
//! 파일 하나를 받아 디스크에 저장하고 종료
//!
//! 사용법:
//!   cargo run --release --bin rft-server -- [OPTIONS]
//!
//! 예시:
//!   # 기본 포트(3000)에서 수신, 현재 디렉터리에 received.<ext> 저장
//!   cargo run --release --bin rft-server
//!
//!   # 저장 위치 지정
//!   cargo run --release --bin rft-server -- --output-dir ./inbox --name upload

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rft::{Config, DiskAssembler, Receiver, TeardownOutcome, DEFAULT_PORT};

/// 서버 설정
struct ServerConfig {
    bind_addr: SocketAddr,
    output_dir: PathBuf,
    name: String,
    config: Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            output_dir: PathBuf::from("."),
            name: "received".to_string(),
            config: Config::default(),
        }
    }
}

fn usage() -> ! {
    println!(
        r#"RFT Server - Reliable File Transfer 수신자

UDP 기반 Slow Start + Fast Retransmit 파일 전송 수신자
- CRC 검증 실패 시 이전 ACK 재전송
- 완료 후 end 메시지까지 대기

사용법:
  cargo run --release --bin rft-server -- [OPTIONS]

옵션:
  -b, --bind <ADDR>            바인드 주소 (기본: 0.0.0.0:{DEFAULT_PORT})
  -o, --output-dir <DIR>       저장 디렉터리 (기본: .)
  -n, --name <STEM>            저장 파일 이름, 확장자 제외 (기본: received)
  --teardown-timeout <MS>      end 대기 타임아웃 (기본: 300)
  --teardown-attempts <N>      end 대기 최대 횟수, 0이면 무제한 (기본: 20)
  -h, --help                   이 도움말 출력
"#
    );
    std::process::exit(0);
}

fn parse_args() -> Result<ServerConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} 값 필요", args[i]))
        };

        match args[i].as_str() {
            "--bind" | "-b" => {
                config.bind_addr = value(i)?.parse().map_err(|e| format!("유효한 주소 필요: {e}"))?;
                i += 1;
            }
            "--output-dir" | "-o" => {
                config.output_dir = PathBuf::from(value(i)?);
                i += 1;
            }
            "--name" | "-n" => {
                config.name = value(i)?;
                i += 1;
            }
            "--teardown-timeout" => {
                config.config.teardown_timeout_ms =
                    value(i)?.parse().map_err(|e| format!("유효한 숫자 필요: {e}"))?;
                i += 1;
            }
            "--teardown-attempts" => {
                let attempts: u32 = value(i)?.parse().map_err(|e| format!("유효한 숫자 필요: {e}"))?;
                config.config.teardown_max_attempts = (attempts > 0).then_some(attempts);
                i += 1;
            }
            "--help" | "-h" => usage(),
            other => return Err(format!("알 수 없는 옵션: {other}")),
        }
        i += 1;
    }

    Ok(config)
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

    let server_config = parse_args()?;

    info!("RFT Server starting...");
    info!("Bind address: {}", server_config.bind_addr);
    info!("Output: {:?}/{}.*", server_config.output_dir, server_config.name);

    let receiver = Receiver::bind(server_config.config, server_config.bind_addr).await?;
    let mut assembler = DiskAssembler::new(server_config.output_dir, server_config.name);

    let report = receiver.receive(&mut assembler).await?;

    info!("Saved: {:?} (from {})", report.output, report.peer);
    match report.teardown {
        TeardownOutcome::Closed => info!("Session closed"),
        TeardownOutcome::GaveUp { attempts } => {
            info!("No end after {} attempts, exiting", attempts)
        }
    }
    info!("{}", report.stats.receiver_summary());

    Ok(())
}
