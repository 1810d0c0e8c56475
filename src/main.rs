/// Canal CDC 클라이언트 예제
///
/// 서버에 접속하여 변경 이벤트를 가져오고, 행 단위 변경을 JSON 한 줄씩 출력합니다.
use canal_client::{decode_batch, AuthMode, CanalClient, ConnectionConfig};
use clap::{Parser, ValueEnum};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AuthArg {
    Plain,
    Scramble,
}

#[derive(Parser, Debug)]
#[command(name = "canal-client")]
#[command(about = "Canal CDC client that prints decoded row changes", long_about = None)]
struct Args {
    #[arg(long, env = "CANAL_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "CANAL_PORT", default_value_t = 11111)]
    port: u16,

    #[arg(long, env = "CANAL_USER", default_value = "")]
    username: String,

    #[arg(long, env = "CANAL_PASSWORD", default_value = "")]
    password: String,

    #[arg(long, env = "CANAL_CLIENT_ID", default_value = "1001")]
    client_id: String,

    #[arg(long, env = "CANAL_DESTINATION", default_value = "example")]
    destination: String,

    #[arg(long, env = "CANAL_FILTER", default_value = ".*\\..*")]
    filter: String,

    #[arg(long, env = "CANAL_BATCH_SIZE", default_value_t = 100)]
    batch_size: i32,

    /// 빈 배치 이후 대기 시간 (ms)
    #[arg(long, env = "CANAL_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// 연결 timeout (초)
    #[arg(long, env = "CANAL_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    #[arg(long, value_enum, env = "CANAL_AUTH_MODE", default_value = "plain")]
    auth_mode: AuthArg,

    /// 지정한 수만큼 배치를 받은 뒤 종료
    #[arg(long)]
    max_batches: Option<u64>,
}

impl Args {
    fn into_config(self) -> ConnectionConfig {
        ConnectionConfig {
            hostname: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
            client_id: self.client_id,
            destination: self.destination,
            filter: self.filter,
            timeout: Duration::from_secs(self.connect_timeout),
            batch_size: self.batch_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            auth_mode: match self.auth_mode {
                AuthArg::Plain => AuthMode::Plain,
                AuthArg::Scramble => AuthMode::Scramble,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("canal_client=info,warn")),
        )
        .init();

    let args = Args::parse();
    let max_batches = args.max_batches;
    let config = args.into_config();

    info!("Connecting to {}", config.address());

    let mut client = CanalClient::new().with_auth_mode(config.auth_mode);
    client
        .connect_timeout(&config.hostname, config.port, config.timeout)
        .await?;
    client
        .authenticate(&config.username, &config.password)
        .await?;
    client
        .subscribe(&config.client_id, &config.destination, &config.filter)
        .await?;

    let result = tokio::select! {
        result = run(&mut client, &config, max_batches) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    if let Err(ref e) = result {
        error!("Streaming stopped: {}", e);
    }

    client.disconnect().await?;
    result?;
    Ok(())
}

/// 배치를 가져와 변경 이벤트를 출력
async fn run(
    client: &mut CanalClient,
    config: &ConnectionConfig,
    max_batches: Option<u64>,
) -> canal_client::Result<()> {
    let mut batches = 0u64;

    loop {
        let batch = client.fetch(config.batch_size).await?;

        if batch.is_empty() {
            tokio::time::sleep(config.poll_interval).await;
            continue;
        }

        for change in decode_batch(&batch)? {
            println!("{}", serde_json::to_string(&change)?);
        }

        batches += 1;
        if max_batches.is_some_and(|max| batches >= max) {
            info!("Received {} batches, stopping", batches);
            return Ok(());
        }
    }
}
