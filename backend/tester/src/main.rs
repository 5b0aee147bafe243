use std::env;

use anyhow::Context;
use reqwest::Client;
use serde_json::{Value, json};

const DEFAULT_SERVER: &str = "http://localhost:4321";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let email = env::args()
        .nth(1)
        .context("Usage: tester <email> [server url]")?;
    let server = env::args().nth(2).unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let client = Client::new();

    let response = client
        .post(format!("{server}/api/waitlist/join"))
        .json(&json!({
            "email": email,
            "utm_source": "tester",
            "landing_page": "/",
        }))
        .send()
        .await?;

    println!("Join status: {}", response.status());
    println!("{:#}", response.json::<Value>().await?);

    let response = client
        .get(format!("{server}/api/waitlist/count"))
        .send()
        .await?;

    println!("Count status: {}", response.status());
    println!("{:#}", response.json::<Value>().await?);

    Ok(())
}
