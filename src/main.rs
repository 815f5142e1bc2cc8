//! summon-proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────┐
//!                          │                  SUMMON PROXY                     │
//!                          │                                                   │
//!     Browser Request      │  ┌────────┐   ┌────────┐   ┌──────────┐          │
//!     ─────────────────────┼─▶│  cors  │──▶│  rate  │──▶│ signing  │          │
//!                          │  │  gate  │   │ limit  │   │HMAC-SHA1 │          │
//!                          │  └───┬────┘   └───┬────┘   └────┬─────┘          │
//!                          │      │ preflight  │ 429         ▼                │
//!                          │      │ 400/405    │        ┌──────────┐          │
//!     Browser Response     │      ▼            ▼        │ upstream │          │
//!     ◀────────────────────┼──────────────────────────◀─│forwarder │◀─────────┼──── Summon API
//!                          │                            └──────────┘          │
//!                          │  config · observability · lifecycle              │
//!                          └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use summon_proxy::config::Cli;
use summon_proxy::lifecycle::startup;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = startup::run(cli).await {
        eprintln!("FATAL: {}", e);
        std::process::exit(1);
    }
}
