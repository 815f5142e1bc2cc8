//! Print (or send) a signed request for the upstream API.
//!
//! Useful for checking credentials without running the proxy:
//!
//! ```text
//! summon-sign --accessid test --secretkey ... \
//!     "http://api.summon.serialssolutions.com/2.0.0/search?s.q=forest"
//! ```

use clap::Parser;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use url::Url;

use summon_proxy::signing::{rfc2616_now, sign, Credentials};
use summon_proxy::upstream::{signing_host, DATE_HEADER};

#[derive(Parser)]
#[command(name = "summon-sign")]
#[command(about = "Build the Authorization header for a Summon API request", long_about = None)]
struct Cli {
    /// Full upstream URL, including the query string.
    url: Url,

    #[arg(long = "accessid", env = "SUMMON_PROXY_ACCESSID")]
    access_id: String,

    #[arg(long = "secretkey", env = "SUMMON_PROXY_SECRETKEY", hide_env_values = true)]
    secret_key: String,

    #[arg(long, default_value = "application/json")]
    accept: String,

    /// Timestamp to sign instead of the current time.
    #[arg(long)]
    date: Option<String>,

    /// Send the request and print the response.
    #[arg(long)]
    send: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let credentials = Credentials::new(cli.access_id, cli.secret_key);

    let host = signing_host(&cli.url).ok_or("URL has no host")?;
    let timestamp = cli.date.unwrap_or_else(rfc2616_now);
    let authorization = sign(
        &credentials,
        &cli.accept,
        &timestamp,
        &host,
        cli.url.path(),
        cli.url.query().unwrap_or_default(),
    );

    println!("{}: {}", DATE_HEADER, timestamp);
    println!("Authorization: {}", authorization);

    if !cli.send {
        return Ok(());
    }

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_str(&cli.accept)?);
    headers.insert(DATE_HEADER, HeaderValue::from_str(&timestamp)?);
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);

    let res = reqwest::Client::new()
        .get(cli.url)
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!();
    println!("{}", status);
    if let Some(content_type) = res.headers().get(reqwest::header::CONTENT_TYPE) {
        println!("Content-Type: {}", content_type.to_str().unwrap_or("<binary>"));
    }
    println!();
    println!("{}", res.text().await?);
    Ok(())
}
