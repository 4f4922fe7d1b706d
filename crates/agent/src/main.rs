use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use derivative::Derivative;

use agent::alerts::{AlertPipeline, AlertThresholds, ClearanceWorkflow, Dispatcher, Sender};
use agent::api::{self, App};
use agent::schedule;
use agent::store::{FsAccountabilityLog, FsStore};

/// Agent is a daemon which runs the maintenance alerting engine of the
/// fleet control-plane: one digest pass per day plus an on-demand HTTP
/// trigger, both driving the same evaluate/suppress/dispatch pipeline.
#[derive(Derivative, Parser)]
#[derivative(Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path of the JSON fleet file maintained by the record-keeping app.
    #[clap(long, env = "FLEET_FILE", default_value = "fleet.json")]
    fleet_file: std::path::PathBuf,
    /// Path of the engine's suppression/clearance state file.
    #[clap(long, env = "ALERT_STATE_FILE", default_value = "alert-state.json")]
    state_file: std::path::PathBuf,
    /// Path of the append-only clearance accountability log.
    #[clap(
        long,
        env = "ACCOUNTABILITY_LOG",
        default_value = "clearances.ndjson"
    )]
    accountability_log: std::path::PathBuf,
    /// Comma-separated digest distribution list, e.g.
    /// "Ops Desk <ops@fleet.example>, mechanic@fleet.example".
    #[clap(long, env = "ALERT_RECIPIENTS")]
    alert_recipients: String,
    /// Resend API key. When absent, digests are rendered and logged but
    /// not sent.
    #[derivative(Debug = "ignore")]
    #[clap(long, env = "RESEND_API_KEY")]
    resend_api_key: Option<String>,
    /// From address for digest emails.
    #[clap(
        long,
        env = "ALERT_FROM_ADDRESS",
        default_value = "Fleet Maintenance <maintenance@fleet.example>"
    )]
    from_address: String,
    #[clap(long, env = "ALERT_REPLY_TO")]
    reply_to_address: Option<String>,
    /// Local time of day at which the daily digest pass fires, as HH:MM.
    #[clap(long, env = "DIGEST_TIME", default_value = "07:00")]
    digest_time: String,
    /// Bound on each channel send, in seconds.
    #[clap(long, env = "SEND_TIMEOUT_SECS", default_value = "30")]
    send_timeout_secs: u64,
    /// The port to listen on for API requests.
    #[clap(long, default_value = "8675", env = "API_PORT")]
    api_port: u16,
}

fn main() -> Result<(), anyhow::Error> {
    // Use reasonable defaults for printing structured logs to stderr.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(?args, "started!");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let task = runtime.spawn(async move { async_main(args).await });
    let result = runtime.block_on(task);

    tracing::info!(?result, "main function completed, shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result?
}

async fn async_main(args: Args) -> Result<(), anyhow::Error> {
    let recipients = notifications::parse_recipient_list(&args.alert_recipients)
        .context("parsing --alert-recipients")?;
    let digest_time = chrono::NaiveTime::parse_from_str(&args.digest_time, "%H:%M")
        .context("parsing --digest-time (expected HH:MM)")?;
    let send_timeout = std::time::Duration::from_secs(args.send_timeout_secs);

    let sender = match args.resend_api_key {
        Some(api_key) => Sender::resend(
            api_key,
            args.from_address.clone(),
            args.reply_to_address.clone(),
            send_timeout,
        )
        .context("configuring resend channel")?,
        None => {
            tracing::warn!("no RESEND_API_KEY; digest emails will be logged and dropped");
            Sender::Disabled
        }
    };

    let store = Arc::new(
        FsStore::open(&args.fleet_file, &args.state_file)
            .await
            .context("opening vehicle store")?,
    );
    let accountability = Arc::new(FsAccountabilityLog::new(&args.accountability_log));

    let dispatcher = Dispatcher::new(sender, recipients).context("building dispatcher")?;
    let pipeline = Arc::new(AlertPipeline::new(
        store.clone(),
        dispatcher,
        AlertThresholds::default(),
    ));

    let app = Arc::new(App {
        pipeline: pipeline.clone(),
        store,
        accountability,
        clearances: ClearanceWorkflow::default(),
    });
    let router = api::build_router(app);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.api_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, digest_time = %digest_time, "agent listening");

    tokio::select! {
        result = async { axum::serve(listener, router).await } => {
            result.context("api server exited")
        }
        () = schedule::daily_digest_loop(pipeline, digest_time) => {
            unreachable!("daily digest loop never returns")
        }
    }
}
