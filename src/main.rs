mod cases;
mod crawl;
mod listing;
mod merge;
mod pages;

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, time::Duration};

use crate::listing::{LocClient, RetryPolicy, DEFAULT_BASE_URL, DEFAULT_PER_PAGE};

#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
	/// Directory the per-page files are written to
	#[arg(short, long, default_value = "pages")]
	output: PathBuf,

	#[arg(long, default_value = DEFAULT_BASE_URL)]
	base_url: String,

	#[arg(long, default_value_t = DEFAULT_PER_PAGE)]
	per_page: u16,

	/// Attempts per page before giving up
	#[arg(short, long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
	attempts: u16,

	/// Seconds to wait between attempts
	#[arg(long, default_value_t = 30)]
	retry_delay: u64,

	/// Request timeout in seconds
	#[arg(long, default_value_t = 100)]
	timeout: u64,

	#[arg(long)]
	max_pages: Option<u32>,

	/// Combine the per-page files into a single file
	#[clap(short, long)]
	merge: bool,

	/// Skip scraping and only combine existing pages
	#[clap(long)]
	merge_only: bool,

	#[arg(long, default_value = "cases.json")]
	cases_file: PathBuf,

	/// Field to sort the combined file by, e.g. citation
	#[arg(long)]
	sort_by: Option<String>,
}

fn init_logger() {
	let result = pretty_env_logger::formatted_builder()
		.filter_level(log::LevelFilter::Info)
		.parse_default_env()
		.try_init();

	if result.is_err() {
		log::warn!("Logger is already initialized.");
	}
}

// Main Function
#[tokio::main]
async fn main() -> Result<()> {
	init_logger();

	let args = Args::parse();

	if !args.merge_only {
		let client = LocClient::new(
			&args.base_url,
			args.per_page,
			Duration::from_secs(args.timeout),
		)?;
		let policy = RetryPolicy {
			attempts: args.attempts,
			delay: Duration::from_secs(args.retry_delay),
		};

		let summary = crawl::crawl(&client, &policy, &args.output, args.max_pages).await?;
		log::info!(
			"Scraped {} cases across {} pages into {}",
			summary.cases,
			summary.pages,
			args.output.display()
		);
	}

	if args.merge || args.merge_only {
		merge::merge_pages(&args.output, &args.cases_file, args.sort_by.as_deref()).await?;
	}

	Ok(())
}

#[test]
fn test_args() {
	use clap::CommandFactory;
	Args::command().debug_assert();

	let args = Args::parse_from(["usreports_rs"]);
	assert_eq!(args.output, PathBuf::from("pages"));
	assert_eq!(args.attempts, 3);
	assert_eq!(args.retry_delay, 30);
	assert_eq!(args.timeout, 100);
	assert_eq!(args.base_url, DEFAULT_BASE_URL);
	assert!(!args.merge && !args.merge_only);

	assert!(Args::try_parse_from(["usreports_rs", "--attempts", "0"]).is_err());

	let args = Args::parse_from(["usreports_rs", "-m", "--sort-by", "citation", "--max-pages", "2"]);
	assert!(args.merge);
	assert_eq!(args.sort_by.as_deref(), Some("citation"));
	assert_eq!(args.max_pages, Some(2));
}
