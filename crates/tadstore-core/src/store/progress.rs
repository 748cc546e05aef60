use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Progress {
    BatchStart { total_files: u64 },
    FileIndexed { path: PathBuf, resolution: u32 },
    FileSkipped { path: PathBuf, reason: String },
    BatchFinish { indexed: u64, skipped: u64 },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
