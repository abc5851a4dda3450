use anyhow::Context;
use dotenv::dotenv;
use seatwatch::{
    config::AppConfiguration,
    core::logging::init_structured_logging,
    seats::{SeatCatalog, SeatLookupJob, SeatQuery},
    AppError, JobOutcome, RequestQueue,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const WAIT_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfiguration::from_env().context("Invalid configuration")?;
    init_structured_logging(&config.logging)?;

    let mut args = std::env::args().skip(1);
    let train_name = args.next();
    let journey_date = args.next();
    let query = SeatQuery::parse(train_name.as_deref(), journey_date.as_deref())
        .context("Usage: seatwatch <train_name> <YYYY-MM-DD>")?;

    let queue = Arc::new(RequestQueue::new(config.queue.clone())?);
    queue.start().await?;

    let catalog = Arc::new(SeatCatalog::simulated());
    let identity = queue
        .submit(
            query.identity()?,
            Arc::new(SeatLookupJob::new(
                query.clone(),
                catalog,
                config.seats.lookup_latency,
            )),
        )
        .await;
    info!(identity = %identity, train_name = %query.train_name, "Lookup submitted");

    // Keep the job alive while we wait, the way a polling client would.
    let heartbeat_every = (config.queue.heartbeat_timeout / 3).max(Duration::from_millis(10));
    let pinger = {
        let queue = Arc::clone(&queue);
        let identity = identity.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat_every);
            loop {
                interval.tick().await;
                if !queue.heartbeat(&identity).await {
                    break;
                }
            }
        })
    };

    let outcome = queue.wait(&identity, WAIT_TIMEOUT).await;
    pinger.abort();

    let exit_code = match outcome {
        Ok(JobOutcome::Completed(value)) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            0
        }
        Ok(JobOutcome::Failed(message)) => {
            eprintln!("{}", message);
            1
        }
        Err(e @ AppError::TimeoutError { .. }) => {
            warn!(error = %e, "Giving up on lookup");
            queue.cancel(&identity).await;
            2
        }
        Err(e) => return Err(e.into()),
    };

    info!(stats = ?queue.stats().await, "Queue statistics");
    queue.stop().await;

    std::process::exit(exit_code);
}
