use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use reqlogstats_web::{
    AppState, app,
    argument_parsing::{Args, Command, Config},
    sqlite::create_year_db,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = Config::from(&args);

    match args.command {
        Some(Command::InitDb { year }) => {
            let path = config.db_path(year);
            create_year_db(&path).await?;
            info!(path = %path.display(), "created statistics database");
            return Ok(());
        }
        Some(Command::Serve) | None => {}
    }

    info!(
        db_dir = %config.db_dir.display(),
        data_dir = %config.data_dir.display(),
        allow_showall = config.allow_showall,
        "configuration loaded"
    );
    let app = app(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqlogstats_web=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
