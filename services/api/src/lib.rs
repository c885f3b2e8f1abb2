mod cli;
mod infra;
mod routes;
mod server;
mod shutdown;

use house_service::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
