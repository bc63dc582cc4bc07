use std::fmt::Display;

use anyhow::bail;

/// Bytes received so far, against the announced length when the server sent one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    received: u64,
    total: Option<u64>,
}

impl TransferProgress {
    pub fn new(total: Option<u64>) -> Self {
        Self { received: 0, total }
    }

    pub fn advance(&mut self, bytes: usize) {
        self.received += bytes as u64;
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// `None` when the length is unknown and only a byte counter can be shown.
    pub fn percent(&self) -> Option<u8> {
        self.total.filter(|total| *total > 0).map(|total| {
            let percent = self.received.saturating_mul(100) / total;
            percent.min(100) as u8
        })
    }

    /// Fails when the body ended short of (or past) the announced length.
    pub fn verify(&self) -> anyhow::Result<()> {
        match self.total {
            Some(total) if total != self.received => bail!(
                "incomplete transfer, received {received} of {total} bytes",
                received = self.received
            ),
            _ if self.received == 0 => bail!("incomplete transfer, no bytes received"),
            _ => Ok(()),
        }
    }
}

impl Display for TransferProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.percent(), self.total) {
            (Some(percent), Some(total)) => write!(
                f,
                "{percent:>3}% ({received} / {total})",
                received = human_size(self.received),
                total = human_size(total)
            ),
            _ => write!(f, "{} received", human_size(self.received)),
        }
    }
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
