use crate::backend::BackendClient;
use crate::config::Config;
use crate::error::Error;
use crate::storage::{AwsCredentials, StorageClient};

/// One row of `docchat status`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStatus {
    pub name: &'static str,
    pub target: String,
    pub status: String,
    pub healthy: bool,
}

pub async fn backend_status(config: &Config) -> ServiceStatus {
    let target = config.backend.base_url();
    let healthy = match BackendClient::new(&config.backend) {
        Ok(client) => client.check_health().await,
        Err(_) => false,
    };
    ServiceStatus {
        name: "backend",
        target,
        status: if healthy { "OK" } else { "UNAVAILABLE" }.to_string(),
        healthy,
    }
}

pub async fn storage_status(config: &Config) -> ServiceStatus {
    let target = format!("s3://{}", config.storage.bucket);
    let result = match AwsCredentials::from_env() {
        Ok(creds) => match StorageClient::new(&config.storage, creds) {
            Ok(client) => client.head_bucket().await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    let (status, healthy) = match result {
        Ok(()) => ("OK".to_string(), true),
        Err(Error::MissingCredentials { .. }) => {
            ("NOT CONFIGURED (credentials missing)".to_string(), false)
        }
        Err(Error::Unreachable { .. }) => ("UNREACHABLE".to_string(), false),
        Err(Error::Storage { code, .. }) => (format!("ERROR ({})", code), false),
        Err(e) => (format!("ERROR ({})", e.kind()), false),
    };

    ServiceStatus {
        name: "storage",
        target,
        status,
        healthy,
    }
}

/// Run `docchat status`. Never fails; problems show up in the table.
pub async fn run_status(config: &Config) -> anyhow::Result<()> {
    let rows = [backend_status(config).await, storage_status(config).await];

    println!("{:<10} {:<40} {:<38} HEALTHY", "SERVICE", "TARGET", "STATUS");
    for row in &rows {
        println!(
            "{:<10} {:<40} {:<38} {}",
            row.name, row.target, row.status, row.healthy
        );
    }

    Ok(())
}
