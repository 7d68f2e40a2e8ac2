//! Logs in and lists the first page of an entity collection.
//!
//! Connection details are read from a JSON file:
//!
//! ```json
//! { "server": "https://alm.example.com/qcbin", "user": "alice", "password": "secret",
//!   "domain": "DEFAULT", "project": "Demo" }
//! ```
//!
//! Run with: `cargo run --example list_entities -- connection.json defects`

use qcrest::{ConnectionInfo, Error, QueryOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("qcrest=debug,list_entities=info")
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().ok_or("usage: list_entities <connection.json> [collection]")?;
    let collection = args.next().unwrap_or_else(|| "defects".to_string());

    let info: ConnectionInfo = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;

    let mut client = qcrest::create()?;
    match client.login(&info).await {
        Ok(()) => {}
        Err(Error::SessionEstablishment { status }) => {
            eprintln!("Authenticated, but the site session was refused ({})", status);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let options = QueryOptions::new().page_size(20).fields(["id", "name"]);
    let response = client.get(&collection, Some(&options))?.await?;

    println!(
        "GET {} took {:?} ({})",
        response.url,
        response.latency,
        response.header("content-type").unwrap_or("no content-type")
    );
    match response.data.as_records() {
        Some(records) => {
            println!("{} of {} {}", records.len(), records.total_results, collection);
            for record in records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        None => println!("{}", response.raw_body),
    }

    Ok(())
}
