use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
	borrow::Cow,
	cmp::Ordering,
	path::{Path, PathBuf},
};
use tokio::fs;

use crate::cases::Case;
use crate::pages::{page_index, write_json};

pub trait SortableField {
	fn get_field(&self, field: &str) -> Option<Cow<'_, str>>;
}

static CITATION_KEY_RGX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^(\d+) U\.S\. (\d+)$").unwrap());

fn extract_citation_key(s: &str) -> Option<(u32, u32)> {
	let caps = CITATION_KEY_RGX.captures(s)?;
	let volume = caps[1].parse::<u32>().ok()?;
	let page = caps[2].parse::<u32>().ok()?;
	Some((volume, page))
}

#[test]
fn test_extract_citation_key() {
	const TEST_STRINGS: [(&str, Option<(u32, u32)>); 5] = [
		("347 U.S. 483", Some((347, 483))),
		("005 U.S. 0137", Some((5, 137))),
		("1 U.S. xv", None),
		("", None),
		("U.S. Reports", None),
	];

	for (input, expected) in TEST_STRINGS {
		assert_eq!(extract_citation_key(input), expected, "for input '{}'", input);
	}
}

/// Sorts entries by `sort_field`. Citations compare numerically by volume then page; anything
/// that does not look like a numeric citation sorts after them, lexically.
pub fn sort<T: SortableField>(entries: &mut [T], sort_field: &str) -> Result<()> {
	if let Some(first) = entries.first() {
		if first.get_field(sort_field).is_none() {
			bail!("Invalid field: {}", sort_field);
		}
	}

	entries.sort_by(|a, b| {
		let a_field = a.get_field(sort_field).unwrap_or_default();
		let b_field = b.get_field(sort_field).unwrap_or_default();

		match (extract_citation_key(&a_field), extract_citation_key(&b_field)) {
			(Some(a_key), Some(b_key)) => a_key.cmp(&b_key),
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(None, None) => a_field.cmp(&b_field),
		}
	});

	Ok(())
}

/// Page files in `dir`, ordered by page number rather than file name.
pub async fn list_page_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
	let mut read_dir = fs::read_dir(dir)
		.await
		.with_context(|| format!("Failed to read {}", dir.display()))?;

	let mut pages = Vec::new();
	while let Some(entry) = read_dir.next_entry().await? {
		let file_name = entry.file_name();
		if let Some(index) = file_name.to_str().and_then(page_index) {
			pages.push((index, entry.path()));
		}
	}
	pages.sort_by_key(|(index, _)| *index);

	Ok(pages)
}

/// Concatenates every page file in `dir` into a single JSON array at `out`.
pub async fn merge_pages(dir: &Path, out: &Path, sort_by: Option<&str>) -> Result<usize> {
	let mut all_cases: Vec<Case> = Vec::new();

	for (index, path) in list_page_files(dir).await? {
		let json_data = fs::read_to_string(&path)
			.await
			.with_context(|| format!("Failed to read {}", path.display()))?;
		let cases: Vec<Case> = serde_json::from_str(&json_data)
			.with_context(|| format!("Failed to parse {}", path.display()))?;

		log::debug!("Merging {} cases from page {}", cases.len(), index);
		all_cases.extend(cases);
	}

	if let Some(field) = sort_by {
		sort(&mut all_cases, field)?;
	}

	write_json(&all_cases, out).await?;
	log::info!("Wrote {} cases to {}", all_cases.len(), out.display());

	Ok(all_cases.len())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cases::document_url;
	use crate::pages::{test_dir, write_page};

	fn case(name: &str, volume: &str, page: &str) -> Case {
		Case {
			raw: format!("{}, {} U.S. {} (1900).", name, volume, page),
			name: name.to_string(),
			citation: format!("{} U.S. {}", volume, page),
			year: "1900".to_string(),
			url: document_url(volume, page),
		}
	}

	#[test]
	fn sorts_citations_numerically() {
		let mut cases = vec![
			case("C", "100", "20"),
			case("Front Matter", "1", "xv"),
			case("A", "9", "500"),
			case("B", "100", "3"),
		];
		sort(&mut cases, "citation").unwrap();

		let names: Vec<&str> = cases.iter().map(|c| c.name.as_str()).collect();
		assert_eq!(names, ["A", "B", "C", "Front Matter"]);
	}

	#[test]
	fn sorts_other_fields_lexically() {
		let mut cases = vec![case("Zeta", "1", "1"), case("Alpha", "2", "2")];
		sort(&mut cases, "name").unwrap();
		assert_eq!(cases[0].name, "Alpha");
	}

	#[test]
	fn rejects_unknown_field() {
		let mut cases = vec![case("A", "1", "1")];
		assert!(sort(&mut cases, "docket").is_err());

		let mut empty: Vec<Case> = Vec::new();
		assert!(sort(&mut empty, "docket").is_ok());
	}

	#[tokio::test]
	async fn merges_pages_in_page_order() {
		let dir = test_dir("merge");
		write_page(&dir, 10, &[case("Ten", "10", "1")]).await.unwrap();
		write_page(&dir, 2, &[case("Two", "2", "1"), case("Two B", "2", "9")])
			.await
			.unwrap();
		write_page::<Case>(&dir, 3, &[]).await.unwrap();
		std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

		let pages = list_page_files(&dir).await.unwrap();
		let indexes: Vec<u32> = pages.iter().map(|(i, _)| *i).collect();
		assert_eq!(indexes, [2, 3, 10]);

		let out = dir.join("cases.json");
		let count = merge_pages(&dir, &out, None).await.unwrap();
		assert_eq!(count, 3);

		let merged: Vec<Case> =
			serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
		let names: Vec<&str> = merged.iter().map(|c| c.name.as_str()).collect();
		assert_eq!(names, ["Two", "Two B", "Ten"]);
	}

	#[tokio::test]
	async fn merges_and_sorts() {
		let dir = test_dir("merge_sorted");
		write_page(&dir, 1, &[case("Later", "200", "1"), case("Earlier", "20", "1")])
			.await
			.unwrap();

		let out = dir.join("cases.json");
		merge_pages(&dir, &out, Some("citation")).await.unwrap();

		let merged: Vec<Case> =
			serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
		assert_eq!(merged[0].name, "Earlier");
	}
}
