use clap::Parser;
use fixtures::{provider::FakeX, run_server, FixtureArgs};

/// Fake X API for running the club locally without real credentials
///
/// Point the server at it with `TWITTER_API_URL=http://127.0.0.1:<port>` and
/// `AVATAR_IMAGE_URL=http://127.0.0.1:<port>/media/herta.jpg`.
#[derive(Parser, Debug)]
#[clap(name = "provider-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,

    /// Reject every avatar upload, to exercise the partial failure page
    #[arg(long)]
    fail_avatar: bool,

    /// Reject token requests whose signature does not match this consumer secret
    #[arg(long)]
    consumer_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let fake = match args.consumer_secret.as_deref() {
        Some(secret) => FakeX::verifying(secret),
        None => FakeX::new(),
    };
    fake.fail_avatar_uploads(args.fail_avatar);

    run_server(args.common, fake.router()).await
}
