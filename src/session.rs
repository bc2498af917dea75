use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::error::Result;

/// Name of the file a session started at `at` is written to. The `.json`
/// extension is historical: the content is raw newline-delimited text.
pub fn session_file_name(at: OffsetDateTime) -> Result<String> {
    let format = time::macros::format_description!(
        version = 2,
        "[year][month][day]_[hour][minute][second]"
    );
    Ok(format!("gantry_scan_{}.json", at.format(&format)?))
}

/// Append-only output file. Every line is flushed as soon as it is written,
/// so nothing already logged is lost if the process dies.
pub struct SessionFile {
    file: File,
    path: PathBuf,
    lines_written: usize,
}

impl SessionFile {
    pub fn create(path: impl AsRef<Path>) -> Result<SessionFile> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(SessionFile {
            file,
            path,
            lines_written: 0,
        })
    }

    pub fn append_line(&mut self, line: &str) -> Result<()> {
        // Single write so a line and its terminator never end up split.
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        self.file.write_all(record.as_bytes())?;
        self.file.flush()?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> usize {
        self.lines_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_session_file_name() {
        struct TestCase<'a> {
            at: OffsetDateTime,
            expected_name: &'a str,
        }
        let tests = [
            TestCase {
                at: datetime!(2024-03-07 09:05:01 UTC),
                expected_name: "gantry_scan_20240307_090501.json",
            },
            TestCase {
                at: datetime!(1999-12-31 23:59:59 +02:00),
                expected_name: "gantry_scan_19991231_235959.json",
            },
        ];
        for test in tests {
            assert_eq!(session_file_name(test.at).unwrap(), test.expected_name);
        }
    }

    #[test]
    fn test_append_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gantry_scan_test.json");

        let mut file = SessionFile::create(&path).unwrap();
        assert_eq!(file.path(), path.as_path());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        file.append_line("{\"x\":1}").unwrap();
        // Visible on disk before the next line arrives.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"x\":1}\n");

        file.append_line("second").unwrap();
        assert_eq!(file.lines_written(), 2);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"x\":1}\nsecond\n"
        );
    }

    #[test]
    fn test_create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.json");
        std::fs::write(&path, "old contents\n").unwrap();

        let file = SessionFile::create(&path).unwrap();
        assert_eq!(file.lines_written(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
