use combo_batch::api;
use combo_batch::config::AppConfig;
use combo_batch::update;

#[tokio::main]
async fn main() {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let api_config = app_config.api.clone();
    let update_config = app_config.update.clone();
    let grouper_config = app_config.grouper.clone();

    println!("🚀 Grouping service starting...");
    let _update_task = update::check_for_updates_background(update_config);
    api::start_api_server(api_config, grouper_config).await;
}
