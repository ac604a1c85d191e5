use picode_core::Config;

// mimalloc keeps fragmentation low under many concurrent image buffers
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    // Initialize the application (database, services, routes)
    let (_state, router) = picode_api::setup::initialize_app(config.clone()).await?;

    picode_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
