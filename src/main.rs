use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use log::info;

use splitledger::repository::{MemoryRepository, MongoRepository, Repository, RetryPolicy, Retrying};
use splitledger::server;
use splitledger::settings::{self, Settings, Storage};

fn cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        return Cors::permissive();
    }
    origins.iter().fold(
        Cors::default().allow_any_method().allow_any_header(),
        |cors, origin| cors.allowed_origin(origin),
    )
}

async fn serve<R>(repo: R, config: &settings::Server) -> anyhow::Result<()>
where
    R: Repository + Send + Sync + 'static,
{
    let repo = web::Data::new(repo);
    let origins = config.cors_origins.clone();

    info!("Listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors(&origins))
            .app_data(repo.clone())
            .configure(server::configure::<R>)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new().context("failed to load settings")?;
    pretty_env_logger::formatted_builder()
        .parse_filters(&settings.log_level)
        .init();

    match &settings.storage {
        Storage::Memory => {
            info!("Using in-memory storage, groups are lost on restart");
            serve(MemoryRepository::new(), &settings.server).await
        }
        Storage::Mongodb {
            uri,
            database,
            collection,
        } => {
            info!("Using the following URI: {}", uri);
            let repo = MongoRepository::connect(uri, database, collection)
                .await
                .context("failed to connect")?;
            info!("Connected");
            let policy = RetryPolicy::from(&settings.retry);
            serve(Retrying::new(repo, policy), &settings.server).await
        }
    }
}
