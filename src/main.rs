//! # AWS Bundle - Command Line
//!
//! Small operator tool around the bundle library:
//!
//! ```text
//! aws-bundle check <config.yaml|config.json>   validate a configuration and print the wiring
//! aws-bundle key [--prefix <prefix>] <json>     print the cache key of a request
//! ```

use aws_bundle::caching::{CanonicalKeyGenerator, KeyGenerator};
use aws_bundle::observability::{init_logging, LogConfig};
use aws_bundle::registry::{event_name_for, ClientParams};
use aws_bundle::{BundleConfig, BundleError, BundleResult};
use tracing::error;

const USAGE: &str = "usage:\n  aws-bundle check <config>\n  aws-bundle key [--prefix <prefix>] <json>";

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = match args.first().map(String::as_str) {
        Some("check") => check(&args[1..]).await,
        Some("key") => key(&args[1..]),
        _ => Err(BundleError::config(USAGE)),
    };

    if let Err(e) = result {
        error!(error = %e, "Command failed");
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn check(args: &[String]) -> BundleResult<()> {
    let path = args.first().ok_or_else(|| BundleError::config(USAGE))?;

    let config = BundleConfig::load(path).await?;
    init_logging(&config.logging);

    println!("configuration {} is valid", path);

    for (name, client) in &config.clients {
        let credential = config
            .credentials
            .get(&client.credential)
            .ok_or_else(|| BundleError::unknown("credential", &client.credential))?;
        let params = ClientParams::from_config(client, credential);

        println!("client {} ({})", name, client.service);
        println!("  params: {}", serde_json::to_string(&params.redacted())?);
        if config.events.enabled {
            println!("  events: {}", event_name_for(&client.service));
        }
    }

    for (name, table) in &config.dynamodb {
        match &table.cache {
            Some(cache) => println!(
                "dynamodb {} -> client {}, cache {} (ttl {}s, prefix {})",
                name,
                table.client,
                cache.service,
                cache.ttl,
                cache.key_prefix.as_deref().unwrap_or("-")
            ),
            None => println!("dynamodb {} -> client {}, no cache", name, table.client),
        }
    }

    Ok(())
}

fn key(args: &[String]) -> BundleResult<()> {
    init_logging(&LogConfig {
        level: "warn".to_string(),
        ..Default::default()
    });

    let (prefix, rest) = match args {
        [flag, prefix, rest @ ..] if flag == "--prefix" => (Some(prefix.as_str()), rest),
        rest => (None, rest),
    };
    let json = rest.first().ok_or_else(|| BundleError::config(USAGE))?;
    let request: serde_json::Value = serde_json::from_str(json)?;

    let generator = match prefix {
        Some(prefix) => CanonicalKeyGenerator::new().with_prefix(prefix),
        None => CanonicalKeyGenerator::new(),
    };
    println!("{}", generator.generate_key(&request));
    Ok(())
}
