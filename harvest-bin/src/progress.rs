use std::io::{self, Write};
use std::sync::LazyLock;

use indicatif::MultiProgress;

// Every bar is drawn through this so log lines can be printed between redraws
static BARS: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

pub struct IndicatifProgress(indicatif::ProgressBar);

impl tweet_harvest::ProgressBar for IndicatifProgress {
    fn init(total: usize, description: &str) -> Self {
        let pb = BARS.add(indicatif::ProgressBar::new(total as u64));
        if let Ok(sty) = indicatif::ProgressStyle::default_bar()
            .template("{msg} [{wide_bar}] {pos:>3}/{len:3}")
        {
            pb.set_style(sty.progress_chars("=> "));
        }
        pb.set_message(description.to_owned());
        Self(pb)
    }

    fn increment(&self) {
        self.0.inc(1);
    }

    fn destroy(self) {
        self.0.finish_and_clear();
        BARS.remove(&self.0);
    }
}

/// Stderr writer that hides any live progress bar while a line is written.
pub struct BarAwareStderr;

impl Write for BarAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        BARS.suspend(|| io::stderr().write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        BARS.suspend(|| io::stderr().write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
