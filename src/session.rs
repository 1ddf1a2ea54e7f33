//! the ordered list of files a user is converting, and the batch that runs over it
//!
//! Files are converted one at a time. A failure is recorded on the file and the batch
//! moves on; nothing a pipeline does can abort the loop.

use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use uuid::Uuid;

use crate::classifier::Category;
use crate::dispatcher::Converter;
use crate::errors::{ConvertError, Rejection};
use crate::progress::ProgressReporter;
use crate::source::SourceFile;
use crate::transcoders::{ConversionOptions, ConversionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Pending,
    Converting,
    Completed,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConvertibleFile {
    id: Uuid,
    source: SourceFile,
    source_extension: String,
    category: Category,
    target: String,
    status: FileStatus,
    progress: f32,
    error: Option<String>,
    result: Option<ConversionResult>,
}

impl ConvertibleFile {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn source_extension(&self) -> &str {
        &self.source_extension
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    /// last percent its conversion reported; a failed file keeps the point it reached
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&ConversionResult> {
        self.result.as_ref()
    }
}

/// what `add_files` did with each offered file
#[derive(Debug, Default)]
pub struct Admission {
    pub admitted: Vec<Uuid>,
    pub rejected: Vec<(String, Rejection)>,
}

/// audio or video that needs confirmation before a batch runs
#[derive(Debug, Clone, PartialEq)]
pub struct LongMedia {
    pub id: Uuid,
    pub name: String,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub enum BatchOutcome {
    /// nothing ran; call `convert_all_confirmed` to go ahead anyway
    NeedsConfirmation(Vec<LongMedia>),
    Finished(BatchSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    FileStarted { id: Uuid },
    FileProgress { id: Uuid, percent: f32 },
    FileCompleted { id: Uuid, filename: String },
    FileFailed { id: Uuid, message: String },
    Overall { percent: f32 },
    Finished(BatchSummary),
}

pub struct Session {
    converter: Arc<Converter>,
    options: ConversionOptions,
    files: Vec<ConvertibleFile>,
    overall_progress: f32,
    events: Option<UnboundedSender<BatchEvent>>,
}

impl Session {
    pub fn new(converter: Arc<Converter>) -> Self {
        Self {
            converter,
            options: ConversionOptions::default(),
            files: Vec::new(),
            overall_progress: 0.0,
            events: None,
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    /// batch events from now on go to the returned receiver; an earlier receiver stops getting them
    pub fn subscribe(&mut self) -> UnboundedReceiver<BatchEvent> {
        let (tx, rx) = unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn files(&self) -> &[ConvertibleFile] {
        &self.files
    }

    pub fn file(&self, id: Uuid) -> Option<&ConvertibleFile> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn overall_progress(&self) -> f32 {
        self.overall_progress
    }

    /// validates each file and appends the admitted ones as pending
    ///
    /// each admitted file starts with the first legal target for its source
    pub fn add_files(&mut self, sources: impl IntoIterator<Item = SourceFile>) -> Admission {
        let mut admission = Admission::default();

        for source in sources {
            let category = match self.converter.validate(&source) {
                Ok(category) => category,
                Err(rejection) => {
                    warn!("Rejected {:?}: {}", source.name(), rejection);
                    admission.rejected.push((source.name().to_string(), rejection));
                    continue;
                }
            };

            let target = self
                .converter
                .get_available_formats(&source)
                .first()
                .map(|t| t.to_string())
                .unwrap_or_default();
            let file = ConvertibleFile {
                id: Uuid::new_v4(),
                source_extension: source.extension(),
                source,
                category,
                target,
                status: FileStatus::Pending,
                progress: 0.0,
                error: None,
                result: None,
            };
            debug!("Admitted {:?} as {} -> '{}'", file.name(), category, file.target);
            admission.admitted.push(file.id);
            self.files.push(file);
        }

        admission
    }

    /// changes the target of a pending file to another legal target
    pub fn set_target(&mut self, id: Uuid, target: &str) -> Result<(), ConvertError> {
        let converter = self.converter.clone();
        let file = self.file_mut(id)?;
        if file.status != FileStatus::Pending {
            return Err(ConvertError::Argument(format!(
                "Target of {:?} can only change while it is pending",
                file.name()
            )));
        }

        let target = target.to_ascii_lowercase();
        if !converter.get_available_formats(&file.source).contains(&target.as_str()) {
            return Err(ConvertError::UnsupportedOutputFormat(format!(
                "{:?} cannot be converted to '{}'",
                file.name(),
                target
            )));
        }
        file.target = target;
        Ok(())
    }

    /// drops a file along with any result it holds
    pub fn remove(&mut self, id: Uuid) -> Option<ConvertibleFile> {
        let index = self.files.iter().position(|f| f.id == id)?;
        Some(self.files.remove(index))
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.overall_progress = 0.0;
    }

    /// puts a failed file back in the queue
    pub fn retry(&mut self, id: Uuid) -> Result<(), ConvertError> {
        let file = self.file_mut(id)?;
        if file.status != FileStatus::Error {
            return Err(ConvertError::Argument(format!("{:?} has not failed", file.name())));
        }
        file.status = FileStatus::Pending;
        file.progress = 0.0;
        file.error = None;
        Ok(())
    }

    /// converts every pending file, unless some of them are long audio or video
    ///
    /// long media makes this return `NeedsConfirmation` before any file starts converting
    pub async fn convert_all(&mut self) -> BatchOutcome {
        self.converter.reset_failed_services();

        let mut long_files = Vec::new();
        for file in self.files.iter().filter(|f| f.status == FileStatus::Pending) {
            if !matches!(file.category, Category::Audio | Category::Video) {
                continue;
            }
            if let Some(duration_secs) = self.converter.long_media_duration(&file.source).await {
                long_files.push(LongMedia { id: file.id, name: file.name().to_string(), duration_secs });
            }
        }

        if !long_files.is_empty() {
            info!("Batch paused: {} long file(s) need confirmation", long_files.len());
            return BatchOutcome::NeedsConfirmation(long_files);
        }
        BatchOutcome::Finished(self.convert_all_confirmed().await)
    }

    /// converts every pending file in order without a duration check
    ///
    /// always ends by emitting `BatchEvent::Finished`, even when nothing was pending
    pub async fn convert_all_confirmed(&mut self) -> BatchSummary {
        let pending: Vec<usize> = (0..self.files.len())
            .filter(|&i| self.files[i].status == FileStatus::Pending)
            .collect();
        let mut summary = BatchSummary::default();
        if pending.is_empty() {
            self.emit(BatchEvent::Finished(summary));
            return summary;
        }

        let total = pending.len();
        self.overall_progress = 0.0;
        info!("Converting {} file(s)", total);

        for (done, index) in pending.into_iter().enumerate() {
            let (id, source, target) = {
                let file = &mut self.files[index];
                file.status = FileStatus::Converting;
                file.progress = 0.0;
                (file.id, file.source.clone(), file.target.clone())
            };
            self.emit(BatchEvent::FileStarted { id });

            // f32 bits, written from whichever thread the pipeline reports on
            let reached = Arc::new(AtomicU32::new(0f32.to_bits()));
            let events = self.events.clone();
            let sink = reached.clone();
            let progress = ProgressReporter::new(move |percent| {
                sink.store(percent.to_bits(), Ordering::Relaxed);
                if let Some(tx) = &events {
                    let _ = tx.send(BatchEvent::FileProgress { id, percent });
                }
            });
            let outcome = self.converter.convert(&source, &target, progress, &self.options).await;

            let file = &mut self.files[index];
            file.progress = f32::from_bits(reached.load(Ordering::Relaxed));
            let event = match outcome {
                Ok(result) => {
                    let filename = result.filename.clone();
                    file.status = FileStatus::Completed;
                    file.progress = 100.0;
                    file.result = Some(result);
                    summary.completed += 1;
                    BatchEvent::FileCompleted { id, filename }
                }
                Err(e) => {
                    error!("Failed to convert {:?}: {}", file.name(), e);
                    let message = e.to_string();
                    file.status = FileStatus::Error;
                    file.error = Some(message.clone());
                    summary.failed += 1;
                    BatchEvent::FileFailed { id, message }
                }
            };
            self.emit(event);

            self.overall_progress = (done + 1) as f32 / total as f32 * 100.0;
            self.emit(BatchEvent::Overall { percent: self.overall_progress });
        }

        info!("Batch finished: {} completed, {} failed", summary.completed, summary.failed);
        self.emit(BatchEvent::Finished(summary));
        summary
    }

    /// files that finished with a result, in list order
    pub fn completed(&self) -> impl Iterator<Item = (&ConvertibleFile, &ConversionResult)> {
        self.files.iter().filter_map(|f| f.result.as_ref().map(|r| (f, r)))
    }

    /// saves one completed file into `dir`
    pub async fn download(&self, id: Uuid, dir: &Path) -> Result<PathBuf, ConvertError> {
        let file = self.file(id).ok_or_else(|| unknown_file(id))?;
        let result = file
            .result
            .as_ref()
            .ok_or_else(|| ConvertError::Argument(format!("{:?} has no converted result", file.name())))?;
        self.converter.download(&result.payload, &result.filename, dir).await
    }

    /// saves every completed file into `dir`
    pub async fn download_all(&self, dir: &Path) -> Result<Vec<PathBuf>, ConvertError> {
        let mut saved = Vec::new();
        for (_, result) in self.completed() {
            saved.push(self.converter.download(&result.payload, &result.filename, dir).await?);
        }
        Ok(saved)
    }

    fn file_mut(&mut self, id: Uuid) -> Result<&mut ConvertibleFile, ConvertError> {
        self.files.iter_mut().find(|f| f.id == id).ok_or_else(|| unknown_file(id))
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

fn unknown_file(id: Uuid) -> ConvertError {
    ConvertError::Argument(format!("No file with id {} in this session", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::service::LazyService;
    use std::io::Cursor;

    fn wav_source(name: &str, sample_rate: u32, secs: u32) -> SourceFile {
        let spec = hound::WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..sample_rate * secs {
                writer.write_sample(((i % 100) as i16 - 50) * 300).unwrap();
            }
            writer.finalize().unwrap();
        }
        SourceFile::from_bytes(name, "audio/wav", cursor.into_inner())
    }

    fn text_source(name: &str, body: &str) -> SourceFile {
        SourceFile::from_bytes(name, "", body.as_bytes().to_vec())
    }

    fn session(long_media_secs: f64) -> Session {
        let mut config = Config::default();
        config.limits.long_media_secs = long_media_secs;
        let converter = Converter::with_services(
            config,
            LazyService::new("MP3 encoder", || async {
                tokio::task::spawn_blocking(crate::transcoders::audio::Mp3Backend::load).await?
            }),
            LazyService::new("video engine", || async { Err(ConvertError::Engine("offline".to_string())) }),
        );
        Session::new(Arc::new(converter))
    }

    #[test]
    fn test_add_files_reports_rejections() {
        let mut session = session(180.0);
        let admission = session.add_files(vec![
            text_source("notes.md", "# hi"),
            SourceFile::from_bytes("blob.xyz", "", vec![1u8, 2, 3]),
            text_source("table.csv", "a,b\n1,2"),
        ]);

        assert_eq!(admission.admitted.len(), 2);
        assert_eq!(admission.rejected, vec![("blob.xyz".to_string(), Rejection::Unsupported)]);

        let files = session.files();
        assert_eq!(files[0].target(), "txt");
        assert_eq!(files[0].category(), Category::Text);
        assert_eq!(files[1].source_extension(), "csv");
        assert!(files.iter().all(|f| f.status() == FileStatus::Pending));
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let mut config = Config::default();
        config.limits.default_max_bytes = 4;
        let mut session = Session::new(Arc::new(Converter::new(config)));

        let admission = session.add_files(vec![text_source("big.txt", "too long")]);
        assert!(admission.admitted.is_empty());
        assert_eq!(admission.rejected[0].1, Rejection::TooLarge { limit_bytes: 4 });
    }

    #[test]
    fn test_set_target_only_to_legal_formats() {
        let mut session = session(180.0);
        let id = session.add_files(vec![text_source("data.json", "[]")]).admitted[0];

        session.set_target(id, "CSV").unwrap();
        assert_eq!(session.file(id).unwrap().target(), "csv");

        let err = session.set_target(id, "json").unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedOutputFormat(_)));
        let err = session.set_target(id, "mp3").unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedOutputFormat(_)));
        assert!(session.set_target(Uuid::new_v4(), "txt").is_err());
    }

    #[tokio::test]
    async fn test_batch_converts_and_reports() {
        let mut session = session(180.0);
        let mut events = session.subscribe();
        let ids = session
            .add_files(vec![text_source("a.csv", "x,y\n1,2"), text_source("b.md", "# title")])
            .admitted;
        session.set_target(ids[0], "json").unwrap();
        session.set_target(ids[1], "html").unwrap();

        match session.convert_all().await {
            BatchOutcome::Finished(summary) => assert_eq!(summary, BatchSummary { completed: 2, failed: 0 }),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(session.overall_progress(), 100.0);

        let names: Vec<_> = session.completed().map(|(_, r)| r.filename.clone()).collect();
        assert_eq!(names, vec!["a.json", "b.html"]);

        // target can no longer change once converted
        assert!(session.set_target(ids[1], "txt").is_err());

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(received.first(), Some(&BatchEvent::FileStarted { id: ids[0] }));
        assert!(received.contains(&BatchEvent::Overall { percent: 50.0 }));
        assert!(received.iter().any(|e| matches!(e, BatchEvent::FileProgress { id, percent } if *id == ids[1] && *percent == 100.0)));
        assert_eq!(received.last(), Some(&BatchEvent::Finished(BatchSummary { completed: 2, failed: 0 })));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_batch() {
        let mut session = session(180.0);
        let ids = session
            .add_files(vec![
                SourceFile::from_bytes("broken.wav", "audio/wav", vec![0u8; 64]),
                text_source("ok.txt", "fine"),
            ])
            .admitted;

        let outcome = session.convert_all().await;
        assert!(matches!(outcome, BatchOutcome::Finished(BatchSummary { completed: 1, failed: 1 })));

        let broken = session.file(ids[0]).unwrap();
        assert_eq!(broken.status(), FileStatus::Error);
        assert!(!broken.error().unwrap().is_empty());
        assert!(broken.result().is_none());
        // the MP3 backend loaded and the pipeline got as far as decoding
        assert_eq!(broken.progress(), 15.0);
        assert_eq!(session.file(ids[1]).unwrap().progress(), 100.0);
        assert_eq!(session.file(ids[1]).unwrap().status(), FileStatus::Completed);

        // a completed file cannot be retried; a failed one goes back to pending
        assert!(session.retry(ids[1]).is_err());
        session.retry(ids[0]).unwrap();
        let broken = session.file(ids[0]).unwrap();
        assert_eq!(broken.status(), FileStatus::Pending);
        assert_eq!(broken.error(), None);
    }

    #[tokio::test]
    async fn test_long_audio_needs_confirmation() {
        let mut session = session(180.0).with_options(ConversionOptions { bitrate_kbps: Some(64), ..Default::default() });
        assert_eq!(session.converter().config().limits.long_media_secs, 180.0);

        let ids = session
            .add_files(vec![
                wav_source("lecture.wav", 8000, 240),
                wav_source("jingle.wav", 8000, 3),
                text_source("n.txt", "x"),
            ])
            .admitted;
        assert_eq!(session.file(ids[0]).unwrap().target(), "mp3");

        let long = match session.convert_all().await {
            BatchOutcome::NeedsConfirmation(long) => long,
            other => panic!("expected confirmation, got {:?}", other),
        };
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].id, ids[0]);
        assert_eq!(long[0].name, "lecture.wav");
        assert!((long[0].duration_secs - 240.0).abs() < 1e-6, "duration {}", long[0].duration_secs);
        // nothing started
        assert!(session.files().iter().all(|f| f.status() == FileStatus::Pending));

        let summary = session.convert_all_confirmed().await;
        assert_eq!(summary, BatchSummary { completed: 3, failed: 0 });
        let result = session.file(ids[0]).unwrap().result().unwrap();
        assert_eq!(result.filename, "lecture.mp3");
        assert_eq!(result.mime_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_remove_clear_and_download_all() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(180.0);
        let ids = session
            .add_files(vec![text_source("one.txt", "1"), text_source("two.txt", "2"), text_source("three.txt", "3")])
            .admitted;

        let removed = session.remove(ids[1]).unwrap();
        assert_eq!(removed.name(), "two.txt");
        assert!(session.remove(ids[1]).is_none());

        session.convert_all().await;
        let saved = session.download_all(dir.path()).await.unwrap();
        assert_eq!(saved, vec![dir.path().join("one.md"), dir.path().join("three.md")]);
        assert_eq!(std::fs::read_to_string(&saved[1]).unwrap(), "3");

        let single = session.download(ids[0], dir.path()).await.unwrap();
        assert_eq!(single, dir.path().join("one.md"));

        session.clear();
        assert!(session.files().is_empty());
        assert_eq!(session.overall_progress(), 0.0);
    }
}
