use anyhow::{anyhow, Context, Result};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.loc.gov/collections/united-states-reports/";
pub const DEFAULT_PER_PAGE: u16 = 150;
const USER_AGENT: &str = "usreports_rs (rust)";

#[derive(Debug)]
pub enum PageResponse {
	Found(String),
	NotFound,
	Unexpected(StatusCode),
}

/// Anything that can hand back a numbered page of the court opinions listing.
pub trait ListingSource {
	async fn fetch_page(&self, index: u32) -> Result<PageResponse>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
	pub attempts: u16,
	pub delay: Duration,
}

pub fn listing_url(base_url: &str, per_page: u16, index: u32) -> String {
	format!(
		"{}?c={}&fa=subject:court+opinions&sb=date&sp={}&st=list",
		base_url, per_page, index
	)
}

#[test]
fn test_listing_url() {
	assert_eq!(
		listing_url(DEFAULT_BASE_URL, DEFAULT_PER_PAGE, 1),
		"https://www.loc.gov/collections/united-states-reports/?c=150&fa=subject:court+opinions&sb=date&sp=1&st=list"
	);
	assert_eq!(
		listing_url("http://127.0.0.1:3000/", 25, 12),
		"http://127.0.0.1:3000/?c=25&fa=subject:court+opinions&sb=date&sp=12&st=list"
	);
}

pub struct LocClient {
	client: Client,
	base_url: String,
	per_page: u16,
}

impl LocClient {
	pub fn new(base_url: &str, per_page: u16, timeout: Duration) -> Result<Self> {
		Self::from_builder(Self::builder(timeout), base_url, per_page)
	}

	fn builder(timeout: Duration) -> ClientBuilder {
		Client::builder().timeout(timeout).user_agent(USER_AGENT)
	}

	fn from_builder(builder: ClientBuilder, base_url: &str, per_page: u16) -> Result<Self> {
		let client = builder.build().context("Failed to build HTTP client")?;

		Ok(Self {
			client,
			base_url: base_url.to_string(),
			per_page,
		})
	}
}

impl ListingSource for LocClient {
	async fn fetch_page(&self, index: u32) -> Result<PageResponse> {
		let url = listing_url(&self.base_url, self.per_page, index);
		let response = self.client.get(&url).send().await?;

		log::debug!("Received status {} from {}", response.status(), url);

		match response.status() {
			StatusCode::OK => Ok(PageResponse::Found(response.text().await?)),
			StatusCode::NOT_FOUND => Ok(PageResponse::NotFound),
			status => Ok(PageResponse::Unexpected(status)),
		}
	}
}

/// Fetches a listing page, retrying transient failures.
///
/// Returns `Ok(None)` once the listing answers 404, which marks the end of the catalog.
/// Any other non-200 status or transport error is retried up to `policy.attempts` times.
pub async fn fetch_with_retry<S: ListingSource>(
	source: &S,
	index: u32,
	policy: &RetryPolicy,
) -> Result<Option<String>> {
	let mut last_failure = String::new();

	for attempt in 1..=policy.attempts {
		log::info!("Trying to access page {} (attempt {}/{})", index, attempt, policy.attempts);

		match source.fetch_page(index).await {
			Ok(PageResponse::Found(body)) => return Ok(Some(body)),
			Ok(PageResponse::NotFound) => {
				log::info!("Page {} not found", index);
				return Ok(None);
			}
			Ok(PageResponse::Unexpected(status)) => {
				log::warn!("Got status {} on page {}", status, index);
				last_failure = format!("status {}", status);
			}
			Err(e) => {
				log::warn!("Error loading page {}: {:#}", index, e);
				last_failure = format!("{:#}", e);
			}
		}

		if attempt < policy.attempts {
			log::info!("Retrying page {} in {:?}", index, policy.delay);
			tokio::time::sleep(policy.delay).await;
		}
	}

	Err(anyhow!(
		"Gave up on page {} after {} attempts: {}",
		index,
		policy.attempts,
		last_failure
	))
}

#[cfg(test)]
pub mod testing {
	use super::*;
	use std::{collections::VecDeque, sync::Mutex};

	/// Replays canned responses in order and records which pages were asked for.
	pub struct ScriptedSource {
		responses: Mutex<VecDeque<Result<PageResponse>>>,
		requested: Mutex<Vec<u32>>,
	}

	impl ScriptedSource {
		pub fn new(responses: Vec<Result<PageResponse>>) -> Self {
			Self {
				responses: Mutex::new(responses.into()),
				requested: Mutex::new(Vec::new()),
			}
		}

		pub fn requested(&self) -> Vec<u32> {
			self.requested.lock().unwrap().clone()
		}
	}

	impl ListingSource for ScriptedSource {
		async fn fetch_page(&self, index: u32) -> Result<PageResponse> {
			self.requested.lock().unwrap().push(index);
			self.responses
				.lock()
				.unwrap()
				.pop_front()
				.unwrap_or(Ok(PageResponse::NotFound))
		}
	}

	pub fn no_delay(attempts: u16) -> RetryPolicy {
		RetryPolicy {
			attempts,
			delay: Duration::ZERO,
		}
	}
}
