use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use crate::cases::extract_cases_from_page;
use crate::listing::{fetch_with_retry, ListingSource, RetryPolicy};
use crate::pages::write_page;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CrawlSummary {
	pub pages: u32,
	pub cases: usize,
}

// Walk the listing from page 1 until it answers 404 -> write one file per page
pub async fn crawl<S: ListingSource>(
	source: &S,
	policy: &RetryPolicy,
	output: &Path,
	max_pages: Option<u32>,
) -> Result<CrawlSummary> {
	let mut summary = CrawlSummary::default();
	let mut index: u32 = 1;

	let progress_bar = ProgressBar::new_spinner();
	progress_bar.set_style(
		ProgressStyle::default_spinner()
			.template("{msg} {spinner:.green} [{elapsed_precise}] {pos:>7} pages")?,
	);
	progress_bar.set_message("Scraping U.S. Reports");

	loop {
		if max_pages.is_some_and(|max| index > max) {
			log::info!("Reached page limit of {}", index - 1);
			break;
		}

		let Some(html) = fetch_with_retry(source, index, policy)
			.await
			.with_context(|| format!("Stopped after {} pages", summary.pages))?
		else {
			log::info!("No page {}, assuming the catalog is exhausted", index);
			break;
		};

		let cases = extract_cases_from_page(&html);
		if cases.is_empty() {
			log::warn!("No cases found on page {}", index);
		}

		let path = write_page(output, index, &cases).await?;
		log::info!("Added {} cases from page {} to {}", cases.len(), index, path.display());

		summary.pages += 1;
		summary.cases += cases.len();
		progress_bar.inc(1);
		index += 1;
	}

	progress_bar.finish_with_message(format!("Done! - Cases: {}", summary.cases));
	Ok(summary)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cases::Case;
	use crate::listing::testing::{no_delay, ScriptedSource};
	use crate::listing::PageResponse;
	use crate::pages::test_dir;
	use anyhow::anyhow;
	use reqwest::StatusCode;

	fn listing(cases: &[(&str, &str)]) -> PageResponse {
		let items: String = cases
			.iter()
			.map(|(item, text)| {
				format!(
					r#"<li><a href="https://www.loc.gov/item/usrep{}/">U.S. Reports: {}</a></li>"#,
					item, text
				)
			})
			.collect();
		PageResponse::Found(format!("<html><body><ul>{}</ul></body></html>", items))
	}

	fn read_page(dir: &Path, index: u32) -> Vec<Case> {
		let path = dir.join(crate::pages::page_file_name(index));
		serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
	}

	#[tokio::test]
	async fn crawls_until_not_found() {
		let dir = test_dir("crawl");
		let source = ScriptedSource::new(vec![
			Ok(listing(&[
				("005137", "Marbury v. Madison, 5 U.S. (1 Cranch) 137 (1803)."),
				("017316", "McCulloch v. Maryland, 17 U.S. (4 Wheat.) 316 (1819)."),
			])),
			Ok(PageResponse::Unexpected(StatusCode::SERVICE_UNAVAILABLE)),
			Err(anyhow!("timed out")),
			Ok(listing(&[("347483", "Brown v. Board of Education, 347 U.S. 483 (1954).")])),
			Ok(listing(&[])),
			Ok(PageResponse::NotFound),
		]);

		let summary = crawl(&source, &no_delay(3), &dir, None).await.unwrap();
		assert_eq!(summary, CrawlSummary { pages: 3, cases: 3 });
		assert_eq!(source.requested(), [1, 2, 2, 2, 3, 4]);

		let first = read_page(&dir, 1);
		assert_eq!(first.len(), 2);
		assert_eq!(first[1].citation, "17 U.S. 316");
		assert_eq!(read_page(&dir, 2)[0].name, "Brown v. Board of Education");
		assert!(read_page(&dir, 3).is_empty());
		assert!(!dir.join("cases_page_004.json").exists());
	}

	#[tokio::test]
	async fn stops_at_page_limit() {
		let dir = test_dir("crawl_limit");
		let source = ScriptedSource::new(vec![
			Ok(listing(&[("347483", "Brown v. Board of Education, 347 U.S. 483 (1954).")])),
			Ok(listing(&[("005137", "Marbury v. Madison, 5 U.S. (1 Cranch) 137 (1803).")])),
			Ok(listing(&[])),
		]);

		let summary = crawl(&source, &no_delay(1), &dir, Some(2)).await.unwrap();
		assert_eq!(summary.pages, 2);
		assert_eq!(source.requested(), [1, 2]);
	}

	#[tokio::test]
	async fn aborts_when_retries_run_out() {
		let dir = test_dir("crawl_abort");
		let source = ScriptedSource::new(vec![
			Ok(listing(&[("347483", "Brown v. Board of Education, 347 U.S. 483 (1954).")])),
			Ok(PageResponse::Unexpected(StatusCode::BAD_GATEWAY)),
			Ok(PageResponse::Unexpected(StatusCode::BAD_GATEWAY)),
		]);

		let err = crawl(&source, &no_delay(2), &dir, None).await.unwrap_err();
		assert!(format!("{:#}", err).contains("Gave up on page 2"));
		assert_eq!(read_page(&dir, 1).len(), 1);
		assert!(!dir.join("cases_page_002.json").exists());
	}
}
