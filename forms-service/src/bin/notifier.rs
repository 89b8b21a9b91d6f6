//! Print Hub Notifier - email delivery worker.
//!
//! This binary:
//! 1. Consumes notification jobs from the form_notifications queue
//! 2. Renders the operator alert and customer acknowledgment for each
//! 3. Sends both through the Mailgun HTTP API
//!
//! Delivery is best-effort. A failed send is logged with the record id and
//! the job is acked anyway: the submission was durable before the job was
//! enqueued, and the operator can follow up from the admin surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Connection, ConnectionProperties,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use printhub::notify::{deliver, MailgunMailer};
use printhub::{Config, NotificationJob, NOTIFY_QUEUE};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("notifier_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        concurrency = config.worker_concurrency,
        operator_email = %config.operator_email,
        "config_loaded"
    );

    // Run the notifier
    run(config).await?;

    Ok(())
}

/// Run the notification consumer.
async fn run(config: Config) -> Result<()> {
    let mailer = MailgunMailer::from_config(&config).context("Mailgun configuration invalid")?;
    let mailer = Arc::new(mailer);

    let operator_email = Arc::new(config.operator_email.clone());

    // Connect to RabbitMQ
    info!(url_length = config.cloudamqp_url.len(), "rabbitmq_connecting");

    let conn = Connection::connect(&config.cloudamqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to RabbitMQ")?;

    info!("rabbitmq_connected");

    // Create a channel
    let channel = conn
        .create_channel()
        .await
        .context("Failed to create channel")?;

    info!("rabbitmq_channel_created");

    // Set QoS with prefetch for concurrent processing
    let prefetch_count = config.worker_concurrency as u16;
    channel
        .basic_qos(prefetch_count, BasicQosOptions::default())
        .await
        .context("Failed to set QoS")?;

    info!(prefetch_count = prefetch_count, "rabbitmq_qos_set");

    // Declare the queue (durable to match the publisher)
    channel
        .queue_declare(
            NOTIFY_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("Failed to declare queue")?;

    info!(queue = NOTIFY_QUEUE, "rabbitmq_queue_declared");

    // Start consuming messages
    let mut consumer = channel
        .basic_consume(
            NOTIFY_QUEUE,
            "printhub-notifier",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("Failed to start consumer")?;

    info!(queue = NOTIFY_QUEUE, "rabbitmq_consumer_started");
    info!("notifier_ready");

    // Clone channel for use in message handler
    let channel = Arc::new(channel);

    // Create shutdown signal future
    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
    };

    // Pin the shutdown future
    tokio::pin!(shutdown);

    // Process messages until shutdown
    loop {
        tokio::select! {
            // Check for shutdown signal
            _ = &mut shutdown => {
                info!("notifier_stopping");
                break;
            }
            // Process next message
            delivery = consumer.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        let delivery_tag = delivery.delivery_tag;
                        let message_id = delivery
                            .properties
                            .message_id()
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "unknown".to_string());

                        info!(
                            queue = NOTIFY_QUEUE,
                            message_id = %message_id,
                            delivery_tag = delivery_tag,
                            "rabbitmq_job_received"
                        );

                        // Clone resources for the spawned task
                        let mailer = Arc::clone(&mailer);
                        let operator_email = Arc::clone(&operator_email);
                        let channel = Arc::clone(&channel);

                        // Spawn a task to process this message
                        tokio::spawn(async move {
                            let job: Result<NotificationJob, _> =
                                serde_json::from_slice(&delivery.data);

                            match job {
                                Ok(job) => {
                                    // Send failures are logged inside and
                                    // absorbed; the job is acked either way.
                                    deliver(&job, &mailer, &operator_email).await;

                                    if let Err(e) = channel
                                        .basic_ack(delivery_tag, BasicAckOptions::default())
                                        .await
                                    {
                                        error!(
                                            delivery_tag = delivery_tag,
                                            error = %e,
                                            "rabbitmq_ack_failed"
                                        );
                                    } else {
                                        info!(
                                            queue = NOTIFY_QUEUE,
                                            message_id = %message_id,
                                            "rabbitmq_job_completed"
                                        );
                                    }
                                }
                                Err(e) => {
                                    error!(
                                        message_id = %message_id,
                                        error = %e,
                                        "rabbitmq_job_parse_failed"
                                    );

                                    // Reject without requeue; the payload is
                                    // malformed and redelivery cannot fix it.
                                    if let Err(nack_err) = channel
                                        .basic_nack(
                                            delivery_tag,
                                            BasicNackOptions {
                                                requeue: false,
                                                ..Default::default()
                                            },
                                        )
                                        .await
                                    {
                                        error!(
                                            delivery_tag = delivery_tag,
                                            error = %nack_err,
                                            "rabbitmq_nack_failed"
                                        );
                                    }
                                }
                            }
                        });
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "rabbitmq_delivery_error");
                    }
                    None => {
                        warn!("rabbitmq_consumer_closed");
                        break;
                    }
                }
            }
        }
    }

    info!("notifier_shutdown_complete");
    Ok(())
}
