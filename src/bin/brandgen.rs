use anyhow::Context;
use brandgen::client::BrandClient;
use brandgen::{BrandRecord, GenerationSession, Tone};
use clap::Parser;
use dotenv::dotenv;
use env_logger::Env;

/// Generate brand names and slogans through a running relay.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// What the business does, e.g. "helps people find restaurants nearby".
    description: String,

    /// Personality of the names: funny, neutral, cool, serious or expensive.
    #[arg(short, long, default_value = "funny")]
    tone: Tone,

    /// Base URL of the relay.
    #[arg(long, env = "BRANDGEN_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Print every intermediate record list instead of only the final one.
    #[arg(long)]
    live: bool,
}

/// Last record list printed in live mode.
#[derive(Debug, Default)]
struct LiveView {
    shown: Vec<BrandRecord>,
}

impl LiveView {
    /// Returns `true` when `records` differ from what was printed last, and
    /// remembers them.
    fn refresh(&mut self, records: &[BrandRecord]) -> bool {
        if self.shown == records {
            return false;
        }
        self.shown = records.to_vec();
        true
    }
}

fn print_records(records: &[BrandRecord]) {
    for (i, record) in records.iter().enumerate() {
        println!("{}. {}", i + 1, record.copy_text());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("warn"));

    let args = Args::parse();
    let client = BrandClient::new(args.url);
    let mut session = GenerationSession::new();
    let mut view = LiveView::default();

    let result = client
        .generate(&mut session, &args.description, args.tone, |session: &GenerationSession| {
            if args.live && view.refresh(session.records()) {
                println!("--- {} so far", session.records().len());
                print_records(session.records());
            }
        })
        .await;

    if !args.live {
        print_records(session.records());
    }
    result.context("brand generation failed")
}
