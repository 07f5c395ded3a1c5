use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{OcrAdapter, OcrError, ReceiptImage};

const ENGINE: &str = "easy_ocr";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const WAIT_POLL: Duration = Duration::from_millis(20);

/// EasyOCR through its command line tool.
///
/// The image is written to a temporary file, `easyocr` is run with
/// `--detail 0` (plain text lines) on CPU, and the file is removed again.
/// A run that outlives the timeout is killed.
#[derive(Debug, Clone)]
pub struct EasyOcr {
    program: PathBuf,
    languages: Vec<String>,
    timeout: Duration,
}

impl EasyOcr {
    /// Accepts Tesseract-style language codes and maps them to EasyOCR's.
    pub fn new(languages: &[String]) -> Self {
        let mut mapped: Vec<String> = languages.iter().map(|l| map_language(l)).collect();
        if mapped.is_empty() {
            mapped.push("en".to_string());
        }
        Self {
            program: PathBuf::from("easyocr"),
            languages: mapped,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Uses a different executable (absolute path or wrapper script).
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, image_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-l")
            .args(&self.languages)
            .arg("-f")
            .arg(image_path)
            .args(["--detail", "0", "--gpu", "0"]);
        cmd
    }
}

fn map_language(code: &str) -> String {
    match code {
        "eng" => "en",
        "deu" => "de",
        "fra" => "fr",
        "spa" => "es",
        "ita" => "it",
        "nld" => "nl",
        "por" => "pt",
        other => other,
    }
    .to_string()
}

impl OcrAdapter for EasyOcr {
    fn extract(&self, image: &ReceiptImage) -> Result<String, OcrError> {
        if image.is_empty() {
            return Err(OcrError::EmptyImage);
        }

        // Removed when dropped.
        let mut temp = tempfile::Builder::new()
            .prefix("receiptflow-")
            .suffix(&format!(".{}", image.extension()))
            .tempfile()?;
        temp.write_all(&image.bytes)?;
        temp.flush()?;

        // Captured through files so a chatty process cannot fill a pipe and stall.
        let mut stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;

        let mut child = self
            .command(temp.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()
            .map_err(|e| OcrError::Engine {
                engine: ENGINE,
                message: format!("Failed to run {}: {}", self.program.display(), e),
            })?;

        let status = self.wait_with_deadline(&mut child)?;

        let mut text = String::new();
        stdout.seek(SeekFrom::Start(0))?;
        stdout.read_to_string(&mut text)?;

        if !status.success() {
            let mut message = String::new();
            stderr.seek(SeekFrom::Start(0))?;
            stderr.read_to_string(&mut message)?;
            return Err(OcrError::Engine {
                engine: ENGINE,
                message: format!("exited with {}: {}", status, message.trim()),
            });
        }

        Ok(text.trim_end().to_string())
    }
}

impl EasyOcr {
    /// Polls the child until it exits; kills it once the timeout passes.
    fn wait_with_deadline(&self, child: &mut Child) -> Result<ExitStatus, OcrError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                if let Err(e) = child.kill() {
                    log::warn!("Failed to kill {}: {}", self.program.display(), e);
                }
                let _ = child.wait();
                log::warn!("{} exceeded {:?}, killed", ENGINE, self.timeout);
                return Err(OcrError::Timeout {
                    engine: ENGINE,
                    timeout: self.timeout,
                });
            }
            thread::sleep(WAIT_POLL);
        }
    }
}
