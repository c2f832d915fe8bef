mod admin;
mod cli;
mod infra;
mod routes;
mod server;

use coursedesk::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
