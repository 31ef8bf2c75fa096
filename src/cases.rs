use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::merge::SortableField;

pub const REPORTS_PREFIX: &str = "U.S. Reports:";
pub const PDF_BASE_URL: &str = "https://tile.loc.gov/storage-services/service/ll/usrep/";

/// One opinion as listed in the U.S. Reports collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Case {
	#[serde(rename = "raw case info")]
	pub raw: String,
	pub name: String,
	pub citation: String,
	pub year: String,
	pub url: String,
}

impl SortableField for Case {
	fn get_field(&self, field: &str) -> Option<Cow<'_, str>> {
		match field {
			"raw" | "raw case info" => Some(Cow::Borrowed(&self.raw)),
			"name" => Some(Cow::Borrowed(&self.name)),
			"citation" => Some(Cow::Borrowed(&self.citation)),
			"year" => Some(Cow::Borrowed(&self.year)),
			"url" => Some(Cow::Borrowed(&self.url)),
			_ => None,
		}
	}
}

// Listing Selectors
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

// Case Patterns
static CASE_LINK_RGX: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^https://www\.loc\.gov/item/usrep\d{3}(\d+|[ivxlcdm]+)/").unwrap()
});
static RAW_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"U\.S\. Reports: (.*)").unwrap());
static CITATION_RGX: Lazy<Regex> = Lazy::new(|| {
	Regex::new(concat!(
		r"U\.S\. Reports: (.*)",      // name
		r",\s(\d+)\sU\.S\.\s",        // volume
		r"(?:\(.*\)\s)?",             // alternate reporter, e.g. (1 Cranch)
		r"\[?(\d+|[ivxlcdm]+)\]?",    // page
		r"\s\((\d{4}.*)\)",           // year
	))
	.unwrap()
});
static LINK_PARTS_RGX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/usrep(\d{3})(\d+)").unwrap());

//Helper Functions
fn collapse_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn pad3(part: &str) -> String {
	format!("{:0>3}", part)
}

pub fn document_url(volume: &str, page: &str) -> String {
	let volume = pad3(volume);
	let page = pad3(page);
	format!(
		"{}usrep{}/usrep{}{}/usrep{}{}.pdf",
		PDF_BASE_URL, volume, volume, page, volume, page
	)
}

#[test]
fn test_document_url() {
	const TEST_STRINGS: [(&str, &str, &str); 4] = [
		(
			"347",
			"483",
			"https://tile.loc.gov/storage-services/service/ll/usrep/usrep347/usrep347483/usrep347483.pdf",
		),
		(
			"5",
			"137",
			"https://tile.loc.gov/storage-services/service/ll/usrep/usrep005/usrep005137/usrep005137.pdf",
		),
		(
			"3",
			"1",
			"https://tile.loc.gov/storage-services/service/ll/usrep/usrep003/usrep003001/usrep003001.pdf",
		),
		(
			"1",
			"xv",
			"https://tile.loc.gov/storage-services/service/ll/usrep/usrep001/usrep0010xv/usrep0010xv.pdf",
		),
	];

	for (volume, page, expected) in TEST_STRINGS {
		let result = document_url(volume, page);
		assert_eq!(
			result.as_str(),
			expected,
			"Expected '{}' for volume '{}' page '{}', but got '{}'",
			expected,
			volume,
			page,
			result
		);
	}
}

pub fn is_case_link(href: &str) -> bool {
	CASE_LINK_RGX.is_match(href)
}

#[test]
fn test_is_case_link() {
	const TEST_STRINGS: [(&str, bool); 6] = [
		("https://www.loc.gov/item/usrep347483/", true),
		("https://www.loc.gov/item/usrep001xv/", true),
		("https://www.loc.gov/item/usrep347483", false),
		("http://www.loc.gov/item/usrep347483/", false),
		("https://www.loc.gov/resource/usrep347483/", false),
		("see https://www.loc.gov/item/usrep347483/", false),
	];

	for (input, expected) in TEST_STRINGS {
		assert_eq!(is_case_link(input), expected, "Unexpected result for '{}'", input);
	}
}

/// Parses the text of a `U.S. Reports:` link into a [`Case`].
///
/// When the listing truncated the case name the full pattern no longer matches, so volume and page
/// are recovered from the link itself and name and year are left empty.
pub fn parse_case(text: &str, href: &str) -> Option<Case> {
	let raw = match RAW_RGX.captures(text) {
		Some(caps) => caps[1].to_string(),
		None => text
			.strip_prefix(REPORTS_PREFIX)
			.map(str::trim)
			.unwrap_or(text)
			.to_string(),
	};

	let (name, volume, page, year) = match CITATION_RGX.captures(text) {
		Some(caps) => (
			caps[1].to_string(),
			caps[2].to_string(),
			caps[3].to_string(),
			caps[4].to_string(),
		),
		None => {
			let Some(caps) = LINK_PARTS_RGX.captures(href) else {
				log::warn!("Could not recover citation for '{}' from {}", text, href);
				return None;
			};
			log::debug!("Falling back to link parts for '{}'", text);
			(String::new(), caps[1].to_string(), caps[2].to_string(), String::new())
		}
	};

	Some(Case {
		raw,
		citation: format!("{} U.S. {}", volume, page),
		url: document_url(&volume, &page),
		name,
		year,
	})
}

#[test]
fn test_parse_case() {
	let case = parse_case(
		"U.S. Reports: Brown v. Board of Education, 347 U.S. 483 (1954).",
		"https://www.loc.gov/item/usrep347483/",
	)
	.unwrap();
	assert_eq!(case.raw, "Brown v. Board of Education, 347 U.S. 483 (1954).");
	assert_eq!(case.name, "Brown v. Board of Education");
	assert_eq!(case.citation, "347 U.S. 483");
	assert_eq!(case.year, "1954");
	assert_eq!(
		case.url,
		"https://tile.loc.gov/storage-services/service/ll/usrep/usrep347/usrep347483/usrep347483.pdf"
	);
}

#[test]
fn test_parse_case_variants() {
	// (text, href, name, citation, year)
	const TEST_STRINGS: [(&str, &str, &str, &str, &str); 5] = [
		(
			"U.S. Reports: Marbury v. Madison, 5 U.S. (1 Cranch) 137 (1803).",
			"https://www.loc.gov/item/usrep005137/",
			"Marbury v. Madison",
			"5 U.S. 137",
			"1803",
		),
		(
			"U.S. Reports: Georgia v. Brailsford, 3 U.S. (3 Dall.) 1 (1794).",
			"https://www.loc.gov/item/usrep003001/",
			"Georgia v. Brailsford",
			"3 U.S. 1",
			"1794",
		),
		(
			"U.S. Reports: Rules of the Supreme Court, 1 U.S. [xv] (1790).",
			"https://www.loc.gov/item/usrep001xv/",
			"Rules of the Supreme Court",
			"1 U.S. xv",
			"1790",
		),
		(
			"U.S. Reports: Smith v. Jones, Smith & Co., 12 U.S. 40 (1814).",
			"https://www.loc.gov/item/usrep012040/",
			"Smith v. Jones, Smith & Co.",
			"12 U.S. 40",
			"1814",
		),
		(
			"U.S. Reports: Ex parte Quirin, 317 U.S. 1 (1942) (per curiam).",
			"https://www.loc.gov/item/usrep317001/",
			"Ex parte Quirin",
			"317 U.S. 1",
			"1942) (per curiam",
		),
	];

	for (text, href, name, citation, year) in TEST_STRINGS {
		let case = parse_case(text, href).unwrap();
		assert_eq!(case.name, name, "name for '{}'", text);
		assert_eq!(case.citation, citation, "citation for '{}'", text);
		assert_eq!(case.year, year, "year for '{}'", text);
	}
}

#[test]
fn test_parse_case_truncated_name() {
	let case = parse_case(
		"U.S. Reports: The Appellants in the Matter of a Very Long Caption That...",
		"https://www.loc.gov/item/usrep100200/",
	)
	.unwrap();
	assert_eq!(case.raw, "The Appellants in the Matter of a Very Long Caption That...");
	assert_eq!(case.name, "");
	assert_eq!(case.year, "");
	assert_eq!(case.citation, "100 U.S. 200");
	assert_eq!(
		case.url,
		"https://tile.loc.gov/storage-services/service/ll/usrep/usrep100/usrep100200/usrep100200.pdf"
	);

	assert!(parse_case(
		"U.S. Reports: A Caption That Was Cut Short...",
		"https://www.loc.gov/item/usrep001xv/",
	)
	.is_none());
}

#[test]
fn test_parse_case_without_caption() {
	// (text, raw)
	const TEST_STRINGS: [(&str, &str); 3] = [
		("U.S. Reports:", ""),
		("U.S. Reports:Caption cut short...", "Caption cut short..."),
		("U.S. Reports: ", ""),
	];

	for (text, raw) in TEST_STRINGS {
		let case = parse_case(text, "https://www.loc.gov/item/usrep100200/")
			.unwrap_or_else(|| panic!("Expected a case for '{}'", text));
		assert_eq!(case.raw, raw, "raw for '{}'", text);
		assert_eq!(case.name, "");
		assert_eq!(case.citation, "100 U.S. 200");
	}
}

fn parse_case_anchor(anchor: ElementRef) -> Option<Case> {
	let text = collapse_whitespace(&anchor.text().collect::<String>());
	if !text.starts_with(REPORTS_PREFIX) {
		return None;
	}

	let href = anchor.value().attr("href")?;
	if !is_case_link(href) {
		log::debug!("Skipping non-case link {}", href);
		return None;
	}

	parse_case(&text, href)
}

/// Extracts every case linked from a listing page, in document order.
pub fn extract_cases_from_page(html: &str) -> Vec<Case> {
	let document = Html::parse_document(html);
	document
		.select(&ANCHOR_SELECTOR)
		.filter_map(parse_case_anchor)
		.collect()
}

#[test]
fn test_extract_cases_from_page() {
	let html = r#"
		<html><body>
		<ul class="results">
			<li>
				<a href="https://www.loc.gov/item/usrep005137/">
					U.S. Reports: Marbury v.
					Madison, 5 U.S. (1 Cranch) 137 (1803).
				</a>
				<a href="https://www.loc.gov/item/usrep005137/">Marbury v. Madison</a>
			</li>
			<li><a href="https://www.loc.gov/resource/usrep005137/">U.S. Reports: Marbury v. Madison, 5 U.S. (1 Cranch) 137 (1803).</a></li>
			<li><a>U.S. Reports: No Link, 1 U.S. 1 (1790).</a></li>
			<li><a href="https://www.loc.gov/item/usrep347483/">U.S. Reports: Brown v. Board of Education, 347 U.S. 483 (1954).</a></li>
			<li><a href="https://www.loc.gov/item/usrep100200/">U.S. Reports: A Caption That Was Cut Short...</a></li>
		</ul>
		<a href="/collections/united-states-reports/?sp=2">Next Page</a>
		</body></html>
	"#;

	let cases = extract_cases_from_page(html);
	let citations: Vec<&str> = cases.iter().map(|c| c.citation.as_str()).collect();
	assert_eq!(citations, ["5 U.S. 137", "347 U.S. 483", "100 U.S. 200"]);
	assert_eq!(cases[0].name, "Marbury v. Madison");
	assert_eq!(cases[0].raw, "Marbury v. Madison, 5 U.S. (1 Cranch) 137 (1803).");
	assert_eq!(cases[2].name, "");
}

#[test]
fn test_extract_cases_from_empty_page() {
	assert!(extract_cases_from_page("<html><body><p>No results</p></body></html>").is_empty());
}

#[test]
fn test_case_json_keys() {
	let case = parse_case(
		"U.S. Reports: Brown v. Board of Education, 347 U.S. 483 (1954).",
		"https://www.loc.gov/item/usrep347483/",
	)
	.unwrap();
	let json = serde_json::to_string(&case).unwrap();
	assert_eq!(
		json,
		concat!(
			r#"{"raw case info":"Brown v. Board of Education, 347 U.S. 483 (1954).","#,
			r#""name":"Brown v. Board of Education","#,
			r#""citation":"347 U.S. 483","#,
			r#""year":"1954","#,
			r#""url":"https://tile.loc.gov/storage-services/service/ll/usrep/usrep347/usrep347483/usrep347483.pdf"}"#,
		)
	);

	let round: Case = serde_json::from_str(&json).unwrap();
	assert_eq!(round, case);
}
