mod cli;
mod infra;
mod routes;
mod run;
mod server;
mod ui;

use permit_hub::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
