use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

pub const PAGE_FILE_PREFIX: &str = "cases_page_";
pub const PAGE_FILE_SUFFIX: &str = ".json";

pub fn page_file_name(index: u32) -> String {
	format!("{}{:03}{}", PAGE_FILE_PREFIX, index, PAGE_FILE_SUFFIX)
}

/// Inverse of [`page_file_name`]. Returns `None` for anything that is not a page file.
pub fn page_index(file_name: &str) -> Option<u32> {
	file_name
		.strip_prefix(PAGE_FILE_PREFIX)?
		.strip_suffix(PAGE_FILE_SUFFIX)?
		.parse::<u32>()
		.ok()
}

#[test]
fn test_page_file_name() {
	const TEST_NUMBERS: [(u32, &str); 4] = [
		(1, "cases_page_001.json"),
		(42, "cases_page_042.json"),
		(999, "cases_page_999.json"),
		(1000, "cases_page_1000.json"),
	];

	for (index, expected) in TEST_NUMBERS {
		assert_eq!(page_file_name(index), expected);
		assert_eq!(page_index(expected), Some(index));
	}

	assert_eq!(page_index("cases.json"), None);
	assert_eq!(page_index("cases_page_abc.json"), None);
	assert_eq!(page_index("cases_page_001.json.tmp"), None);
}

/// Writes `data` as pretty JSON with a trailing newline.
///
/// The bytes go to a sibling `.tmp` file, are synced to disk and then renamed into place, so a
/// rerun either sees the old file or the complete new one.
pub async fn write_json<T: Serialize + ?Sized>(data: &T, path: &Path) -> Result<()> {
	let mut bytes = serde_json::to_vec_pretty(data)?;
	bytes.push(b'\n');

	let mut tmp_name = path.as_os_str().to_owned();
	tmp_name.push(".tmp");
	let tmp_path = PathBuf::from(tmp_name);

	let mut file = fs::File::create(&tmp_path)
		.await
		.with_context(|| format!("Failed to create {}", tmp_path.display()))?;
	file.write_all(&bytes)
		.await
		.with_context(|| format!("Failed to write {}", tmp_path.display()))?;
	file.sync_all()
		.await
		.with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
	drop(file);

	fs::rename(&tmp_path, path)
		.await
		.with_context(|| format!("Failed to move {} into place", path.display()))?;

	Ok(())
}

pub async fn write_page<T: Serialize>(dir: &Path, index: u32, entries: &[T]) -> Result<PathBuf> {
	fs::create_dir_all(dir)
		.await
		.with_context(|| format!("Failed to create output directory {}", dir.display()))?;

	let path = dir.join(page_file_name(index));
	write_json(entries, &path).await?;

	Ok(path)
}

#[cfg(test)]
pub fn test_dir(name: &str) -> PathBuf {
	let dir = std::env::temp_dir().join(format!("usreports_{}_{}", name, std::process::id()));
	let _ = std::fs::remove_dir_all(&dir);
	dir
}

#[tokio::test]
async fn test_write_page() {
	let dir = test_dir("write_page").join("nested");

	let path = write_page(&dir, 3, &["a", "b"]).await.unwrap();
	assert_eq!(path, dir.join("cases_page_003.json"));
	assert_eq!(
		std::fs::read_to_string(&path).unwrap(),
		"[\n  \"a\",\n  \"b\"\n]\n"
	);

	// Reruns overwrite in place and leave no temp file behind.
	write_page::<&str>(&dir, 3, &[]).await.unwrap();
	assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
	assert!(!dir.join("cases_page_003.json.tmp").exists());
}

#[tokio::test]
async fn test_write_json_replaces_stale_temp_file() {
	let dir = test_dir("stale_tmp");
	std::fs::create_dir_all(&dir).unwrap();
	let path = dir.join("cases.json");
	std::fs::write(dir.join("cases.json.tmp"), "[\n  \"half").unwrap();

	write_json(&vec![1, 2], &path).await.unwrap();
	assert_eq!(std::fs::read_to_string(&path).unwrap(), "[\n  1,\n  2\n]\n");
	assert!(!dir.join("cases.json.tmp").exists());
}
