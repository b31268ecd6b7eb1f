use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Reads the last `max_bytes` bytes of a file (the whole file if shorter).
///
/// Lets callers reach a trailing record without reading a large file.
pub(crate) fn read_tail<P: AsRef<Path>>(filename: P, max_bytes: u64) -> io::Result<String> {
	let mut file = File::open(filename)?;
	let size = file.metadata()?.len();
	if size > max_bytes {
		file.seek(SeekFrom::End(-(max_bytes as i64)))?;
	}

	let mut bytes = Vec::new();
	file.read_to_end(&mut bytes)?;
	Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Deserializes a JSON file.
pub(crate) fn read_json<T: DeserializeOwned, P: AsRef<Path>>(filename: P) -> Result<T> {
	let contents = fs::read_to_string(filename)?;
	Ok(serde_json::from_str(&contents)?)
}

/// Writes a file through a sibling temporary file, so readers never see a
/// partial artifact. Parent directories are created as needed.
pub(crate) fn write_atomically<P: AsRef<Path>>(filename: P, contents: &str) -> io::Result<()> {
	let path = filename.as_ref();
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}

	let mut partial = path.as_os_str().to_owned();
	partial.push(".partial");
	fs::write(&partial, contents)?;
	fs::rename(&partial, path)
}

/// Lists the stems of all files with a given extension in a directory.
///
/// Returns file names without their extension (no paths). A missing
/// directory lists as empty.
pub(crate) fn list_stems<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut stems = Vec::new();

	let entries = match fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(stems),
		Err(e) => return Err(e),
	};

	for entry in entries {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(stem) = path.file_stem() {
				stems.push(stem.to_string_lossy().to_string());
			}
		}
	}

	Ok(stems)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::test_support::scratch_dir;

	#[test]
	fn tail_of_short_and_long_files() {
		let scratch = scratch_dir("io-tail");
		let dir = scratch.path();
		let path = dir.join("file.txt");
		write_atomically(&path, "abc\n\n123\n").unwrap();
		assert_eq!(read_tail(&path, 100).unwrap(), "abc\n\n123\n");
		assert_eq!(read_tail(&path, 4).unwrap(), "123\n");
		assert!(!dir.join("file.txt.partial").exists());
	}

	#[test]
	fn stems_filter_on_extension() {
		let scratch = scratch_dir("io-stems");
		let dir = scratch.path();
		write_atomically(dir.join("4_2.out"), "").unwrap();
		write_atomically(dir.join("notes.txt"), "").unwrap();
		assert_eq!(list_stems(dir, "out").unwrap(), vec!["4_2".to_owned()]);
		assert!(list_stems(dir.join("missing"), "out").unwrap().is_empty());
	}

	#[test]
	fn scratch_dir_is_removed_on_drop() {
		let scratch = scratch_dir("io-drop");
		let path = scratch.path().to_owned();
		write_atomically(path.join("4_2.out"), "\n0\n").unwrap();
		drop(scratch);
		assert!(!path.exists());
	}
}
