//! FTP artifact push

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use reqwest::Url;
use suppaftp::types::{FileType, FormatControl};
use suppaftp::FtpStream;

use super::{FileTransfer, TransferMode};
use crate::error::{Error, Result};
use crate::types::FileTransferTarget;

const DEFAULT_FTP_PORT: u16 = 21;

/// Pushes artifacts to `ftp://host[:port]/dir` targets
#[derive(Debug, Clone, Default)]
pub struct FtpTransfer;

impl FtpTransfer {
    pub fn new() -> Self {
        Self
    }
}

/// Host, port and remote directory of a transfer target
fn parse_target(url: &str) -> Result<(String, u16, String)> {
    let parsed = Url::parse(url).map_err(|e| Error::transfer(format!("invalid target '{}': {}", url, e)))?;
    if parsed.scheme() != "ftp" {
        return Err(Error::transfer(format!("unsupported transfer scheme '{}'", parsed.scheme())));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::transfer(format!("target '{}' has no host", url)))?
        .to_string();
    let port = parsed.port().unwrap_or(DEFAULT_FTP_PORT);
    let dir = parsed.path().trim_end_matches('/').to_string();
    Ok((host, port, dir))
}

impl FileTransfer for FtpTransfer {
    fn push(&self, target: &FileTransferTarget, local: &Path, mode: TransferMode) -> Result<String> {
        let (host, port, dir) = parse_target(&target.url)?;
        let file_name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::transfer(format!("{:?} has no file name", local)))?;

        let mut ftp = FtpStream::connect((host.as_str(), port))
            .map_err(|e| Error::transfer(format!("connect to {}:{} failed: {}", host, port, e)))?;
        let (uid, pwd) = if target.uid.is_empty() {
            ("anonymous", "anonymous")
        } else {
            (target.uid.as_str(), target.pwd.as_str())
        };
        ftp.login(uid, pwd)
            .map_err(|e| Error::transfer(format!("login to {} failed: {}", host, e)))?;

        if !dir.is_empty() {
            ftp.cwd(&dir)
                .map_err(|e| Error::transfer(format!("cwd {} failed: {}", dir, e)))?;
        }
        let file_type = match mode {
            TransferMode::Text => FileType::Ascii(FormatControl::Default),
            TransferMode::Binary => FileType::Binary,
        };
        ftp.transfer_type(file_type)
            .map_err(|e| Error::transfer(format!("setting transfer type failed: {}", e)))?;

        let mut reader = BufReader::new(File::open(local)?);
        let bytes = ftp
            .put_file(file_name, &mut reader)
            .map_err(|e| Error::transfer(format!("upload of {} failed: {}", file_name, e)))?;

        if let Err(e) = ftp.quit() {
            tracing::debug!("FTP quit after upload failed: {}", e);
        }

        let location = format!("ftp://{}:{}{}/{}", host, port, dir, file_name);
        tracing::info!("Pushed {} ({} bytes, {:?}) to {}", file_name, bytes, mode, location);
        Ok(location)
    }

    fn name(&self) -> &str {
        "ftp"
    }
}
