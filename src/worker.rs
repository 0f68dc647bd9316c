//! The worker loop: read one JSON request per stdin line, dispatch, write
//! responses to stdout.
//!
//! The loop is strictly serial and never exits on bad input; a malformed or
//! unknown message produces an error response and the next line is read.
//! Models loaded for one request stay loaded for the rest of the process
//! lifetime.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::audio::load_audio_file;
use crate::config::Config;
use crate::defaults;
use crate::device::Device;
use crate::diarize::DiarizationEngine;
use crate::diarize::engine::{ClusterDiarizer, ClusterDiarizerConfig};
use crate::error::{Result, ScrivenError};
use crate::ipc::channel::{MessageWriter, parse_request};
use crate::ipc::protocol::{Request, Response, Stage};
use crate::pipeline::format::FormatConfig;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::progress::ProgressReporter;
use crate::stt::align::WordAligner;
use crate::stt::recognizer::Recognizer;

/// The engines produced by loading a recognition model.
pub struct RecognizerHandles {
    pub recognizer: Arc<dyn Recognizer>,
    pub aligner: Arc<dyn WordAligner>,
}

/// Seam for loading recognition models, so the worker loop is testable
/// without model files.
pub trait ModelLoader: Send {
    /// Whether loading `model_size` can skip the download step.
    fn is_cached(&self, model_size: &str) -> bool;

    /// Load (downloading first if needed) and hand back the engines.
    fn load(&self, model_size: &str, language: &str) -> Result<RecognizerHandles>;
}

/// Loads ggml Whisper models from the models directory, downloading from
/// HuggingFace when missing.
pub struct WhisperLoader {
    models_dir: PathBuf,
    threads: Option<usize>,
}

impl WhisperLoader {
    pub fn new(models_dir: PathBuf, threads: Option<usize>) -> Self {
        WhisperLoader {
            models_dir,
            threads,
        }
    }

    #[cfg(feature = "model-download")]
    fn ensure_model(&self, model_size: &str) -> Result<PathBuf> {
        crate::models::download::download_model_blocking(&self.models_dir, model_size)
    }

    #[cfg(not(feature = "model-download"))]
    fn ensure_model(&self, model_size: &str) -> Result<PathBuf> {
        let path = crate::models::model_path(&self.models_dir, model_size);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ScrivenError::ModelNotFound {
                path: path.display().to_string(),
            })
        }
    }
}

impl ModelLoader for WhisperLoader {
    fn is_cached(&self, model_size: &str) -> bool {
        crate::models::is_model_installed(&self.models_dir, model_size)
    }

    fn load(&self, model_size: &str, _language: &str) -> Result<RecognizerHandles> {
        let model_path = self.ensure_model(model_size)?;
        let engine = Arc::new(crate::stt::whisper::WhisperEngine::new(
            crate::stt::whisper::WhisperEngineConfig {
                model_path,
                threads: self.threads,
            },
        )?);
        Ok(RecognizerHandles {
            recognizer: engine.clone(),
            aligner: engine,
        })
    }
}

type DiarizerFactory = Box<dyn Fn() -> Result<Arc<dyn DiarizationEngine>> + Send>;

/// Everything the worker keeps alive between requests.
pub struct WorkerState {
    loader: Box<dyn ModelLoader>,
    diarizer_factory: DiarizerFactory,
    handles: Option<RecognizerHandles>,
    diarizer: Option<Arc<dyn DiarizationEngine>>,
    device: Device,
    tick_interval: Duration,
    format: FormatConfig,
}

impl WorkerState {
    /// Production wiring from the loaded configuration.
    pub fn from_config(config: &Config, models_dir: PathBuf) -> Self {
        let threads = match config.stt.threads {
            0 => None,
            n => Some(n as usize),
        };
        let diarization = config.diarization.clone();
        let factory: DiarizerFactory = Box::new(move || {
            Ok(Arc::new(ClusterDiarizer::new(ClusterDiarizerConfig {
                clustering_threshold: diarization.clustering_threshold,
                min_duration_on: diarization.min_duration_on,
                min_duration_off: diarization.min_duration_off,
                energy_threshold: diarization.energy_threshold,
            })) as Arc<dyn DiarizationEngine>)
        });

        WorkerState {
            loader: Box::new(WhisperLoader::new(models_dir, threads)),
            diarizer_factory: factory,
            handles: None,
            diarizer: None,
            device: Device::detect(),
            tick_interval: Duration::from_secs(config.worker.heartbeat_interval_secs),
            format: FormatConfig {
                pause_threshold: config.format.pause_threshold,
                min_sentences_per_paragraph: config.format.min_sentences_per_paragraph,
            },
        }
    }

    /// Test wiring with injected engines.
    pub fn with_parts(
        loader: Box<dyn ModelLoader>,
        diarizer_factory: DiarizerFactory,
        device: Device,
        tick_interval: Duration,
    ) -> Self {
        WorkerState {
            loader,
            diarizer_factory,
            handles: None,
            diarizer: None,
            device,
            tick_interval,
            format: FormatConfig::default(),
        }
    }

    fn ensure_diarizer(&mut self) -> Result<Arc<dyn DiarizationEngine>> {
        if let Some(diarizer) = &self.diarizer {
            return Ok(diarizer.clone());
        }
        let diarizer = (self.diarizer_factory)()?;
        self.diarizer = Some(diarizer.clone());
        Ok(diarizer)
    }

    fn handle_load_model(
        &mut self,
        id: Option<Value>,
        model_size: String,
        language: String,
        writer: &MessageWriter,
    ) -> Response {
        let reporter = ProgressReporter::new(writer.clone(), id.clone());

        if self.loader.is_cached(&model_size) {
            reporter.report_lossy(
                10.0,
                Stage::Loading,
                Some(&format!("Loading {model_size} model...")),
            );
        } else {
            reporter.report_lossy(
                -1.0,
                Stage::Downloading,
                Some(&format!("Downloading {model_size} model from HuggingFace...")),
            );
        }

        match self.loader.load(&model_size, &language) {
            Ok(handles) => {
                reporter.report_lossy(80.0, Stage::Loading, Some("Loading alignment model..."));
                self.handles = Some(handles);
                reporter.report_lossy(100.0, Stage::Loading, Some("Model ready"));
                Response::ModelLoaded {
                    id,
                    device: self.device.name.clone(),
                    model_size,
                }
            }
            Err(e) => Response::Error {
                id,
                error: format!("Failed to load model: {e}"),
            },
        }
    }

    fn handle_load_diarization_model(
        &mut self,
        id: Option<Value>,
        writer: &MessageWriter,
    ) -> Response {
        let reporter = ProgressReporter::new(writer.clone(), id.clone());
        reporter.report_lossy(10.0, Stage::Downloading, Some("Loading diarization model..."));

        match self.ensure_diarizer() {
            Ok(_) => {
                reporter.report_lossy(100.0, Stage::Downloading, Some("Diarization model loaded"));
                Response::DiarizationModelLoaded {
                    id,
                    device: self.device.name.clone(),
                }
            }
            Err(e) => Response::Error {
                id,
                error: format!("Failed to load diarization model: {e}"),
            },
        }
    }

    fn handle_transcribe(
        &mut self,
        id: Option<Value>,
        file_path: String,
        language: String,
        enable_diarization: bool,
        num_speakers: Option<usize>,
        writer: &MessageWriter,
    ) -> Response {
        if self.handles.is_none() {
            return Response::Error {
                id,
                error: ScrivenError::ModelNotLoaded.to_string(),
            };
        }

        let path = Path::new(&file_path);
        if !path.is_file() {
            return Response::Error {
                id,
                error: ScrivenError::AudioFileNotFound { path: file_path }.to_string(),
            };
        }

        let reporter = ProgressReporter::new(writer.clone(), id.clone());
        reporter.report_lossy(
            defaults::AUDIO_LOADED_PERCENT,
            Stage::Transcribing,
            Some("Loading audio file..."),
        );

        let audio = match load_audio_file(path) {
            Ok(audio) => audio,
            Err(e) => {
                return Response::Error {
                    id,
                    error: format!("Failed to load audio file: {e}"),
                };
            }
        };
        eprintln!(
            "scriven: loaded {:.1}s of audio from {}",
            audio.duration_secs(),
            path.display()
        );

        let diarizer = if enable_diarization {
            match self.ensure_diarizer() {
                Ok(d) => Some(d),
                Err(e) => {
                    return Response::Error {
                        id,
                        error: format!("Transcription failed: {e}"),
                    };
                }
            }
        } else {
            None
        };

        let Some(handles) = &self.handles else {
            return Response::Error {
                id,
                error: ScrivenError::ModelNotLoaded.to_string(),
            };
        };
        let pipeline = Pipeline::new(
            handles.recognizer.clone(),
            handles.aligner.clone(),
            diarizer,
            self.device.clone(),
        );
        let config = PipelineConfig {
            language: if language == defaults::AUTO_LANGUAGE {
                None
            } else {
                Some(language)
            },
            enable_diarization,
            num_speakers,
            format: self.format.clone(),
            tick_interval: self.tick_interval,
        };

        match pipeline.run(&audio, &config, &reporter) {
            Ok(output) => Response::TranscriptionResult {
                id,
                segments: output.segments,
                language: output.language,
                duration: output.duration,
                speakers: output.speakers,
            },
            Err(e) => Response::Error {
                id,
                error: format!("Transcription failed: {e}"),
            },
        }
    }

    /// Dispatch one parsed request to its handler and return the terminal
    /// response.
    pub fn dispatch(&mut self, request: Request, writer: &MessageWriter) -> Response {
        match request {
            Request::LoadModel {
                id,
                model_size,
                language,
            } => self.handle_load_model(id, model_size, language, writer),
            Request::LoadDiarizationModel { id } => {
                self.handle_load_diarization_model(id, writer)
            }
            Request::Transcribe {
                id,
                file_path,
                language,
                enable_diarization,
                num_speakers,
            } => self.handle_transcribe(
                id,
                file_path,
                language,
                enable_diarization,
                num_speakers,
                writer,
            ),
            Request::Ping { id } => Response::Pong { id },
        }
    }
}

/// Run the worker until stdin reaches EOF.
///
/// Emits `ready` before reading anything, then processes requests serially.
/// A failed stdout write means the host is gone, so the loop stops there.
pub fn run_worker(
    reader: impl BufRead,
    writer: MessageWriter,
    mut state: WorkerState,
) -> Result<()> {
    writer.send(&Response::Ready {
        device: state.device.name.clone(),
        compute_type: state.device.compute_type.clone(),
        version: crate::version_string(),
    })?;
    eprintln!("scriven: ready on device {}", state.device.name);

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match parse_request(line) {
            Ok(request) => state.dispatch(request, &writer),
            Err((id, error)) => Response::Error {
                id,
                error: error.to_string(),
            },
        };

        writer.send(&response)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;
    use crate::diarize::MockDiarizationEngine;
    use crate::stt::align::MockAligner;
    use crate::stt::recognizer::MockRecognizer;
    use crate::transcript::{Segment, SpeakerTurn};
    use serde_json::json;
    use std::io::Write;
    use std::sync::Mutex;

    struct MockLoader {
        cached: bool,
        fail: bool,
    }

    impl ModelLoader for MockLoader {
        fn is_cached(&self, _model_size: &str) -> bool {
            self.cached
        }

        fn load(&self, model_size: &str, _language: &str) -> Result<RecognizerHandles> {
            if self.fail {
                return Err(ScrivenError::ModelLoad {
                    message: "mock load failure".to_string(),
                });
            }
            Ok(RecognizerHandles {
                recognizer: Arc::new(
                    MockRecognizer::new(model_size)
                        .with_segments(vec![Segment::new(0.0, 1.5, "hello world")]),
                ),
                aligner: Arc::new(MockAligner::new()),
            })
        }
    }

    fn capture_writer() -> (MessageWriter, Arc<Mutex<Vec<u8>>>) {
        #[derive(Clone)]
        struct Buf(Arc<Mutex<Vec<u8>>>);
        impl Write for Buf {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(data);
                Ok(data.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let storage = Arc::new(Mutex::new(Vec::new()));
        (MessageWriter::new(Box::new(Buf(storage.clone()))), storage)
    }

    fn test_state(cached: bool, fail: bool) -> WorkerState {
        WorkerState::with_parts(
            Box::new(MockLoader { cached, fail }),
            Box::new(|| {
                Ok(Arc::new(
                    MockDiarizationEngine::new()
                        .with_turns(vec![SpeakerTurn::new(0.0, 2.0, "SPEAKER_00")]),
                ) as Arc<dyn DiarizationEngine>)
            }),
            Device {
                kind: DeviceKind::Cpu,
                name: "cpu".to_string(),
                compute_type: "int8".to_string(),
            },
            Duration::from_secs(3600),
        )
    }

    fn responses(storage: &Arc<Mutex<Vec<u8>>>) -> Vec<Response> {
        let written = String::from_utf8(storage.lock().unwrap().clone()).unwrap();
        written
            .lines()
            .map(|line| Response::from_json(line).unwrap())
            .collect()
    }

    fn test_wav() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(dir.path().join("audio.wav"), spec).unwrap();
        for i in 0..16000 {
            writer
                .write_sample(((i as f32 * 0.05).sin() * 8000.0) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
        dir
    }

    #[test]
    fn test_load_model_cached_emits_loading_checkpoints() {
        let (writer, storage) = capture_writer();
        let mut state = test_state(true, false);

        let response = state.dispatch(
            parse_request(r#"{"type":"loadModel","id":1,"modelSize":"base"}"#).unwrap(),
            &writer,
        );

        assert_eq!(
            response,
            Response::ModelLoaded {
                id: Some(json!(1)),
                device: "cpu".to_string(),
                model_size: "base".to_string(),
            }
        );

        let progress = responses(&storage);
        let percents: Vec<f64> = progress
            .iter()
            .filter_map(|r| match r {
                Response::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![10.0, 80.0, 100.0]);
    }

    #[test]
    fn test_load_model_uncached_reports_indeterminate_download() {
        let (writer, storage) = capture_writer();
        let mut state = test_state(false, false);

        state.dispatch(
            parse_request(r#"{"type":"loadModel","id":1}"#).unwrap(),
            &writer,
        );

        let first = responses(&storage).into_iter().next().unwrap();
        match first {
            Response::Progress {
                percent,
                stage,
                message,
                ..
            } => {
                assert_eq!(percent, -1.0);
                assert_eq!(stage, Stage::Downloading);
                assert!(message.contains("Downloading base model"));
            }
            other => panic!("expected progress, got {other:?}"),
        }
    }

    #[test]
    fn test_load_model_failure_is_wrapped() {
        let (writer, _storage) = capture_writer();
        let mut state = test_state(true, true);

        let response = state.dispatch(
            parse_request(r#"{"type":"loadModel","id":7}"#).unwrap(),
            &writer,
        );

        match response {
            Response::Error { id, error } => {
                assert_eq!(id, Some(json!(7)));
                assert!(error.starts_with("Failed to load model:"), "{error}");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_transcribe_before_load_model() {
        let (writer, _storage) = capture_writer();
        let mut state = test_state(true, false);

        let response = state.dispatch(
            parse_request(r#"{"type":"transcribe","id":2,"filePath":"/tmp/a.wav"}"#).unwrap(),
            &writer,
        );

        assert_eq!(
            response,
            Response::Error {
                id: Some(json!(2)),
                error: "Model not loaded. Call loadModel first.".to_string(),
            }
        );
    }

    #[test]
    fn test_transcribe_missing_file() {
        let (writer, _storage) = capture_writer();
        let mut state = test_state(true, false);
        state.dispatch(
            parse_request(r#"{"type":"loadModel","id":1}"#).unwrap(),
            &writer,
        );

        let response = state.dispatch(
            parse_request(r#"{"type":"transcribe","id":2,"filePath":"/nonexistent.wav"}"#)
                .unwrap(),
            &writer,
        );

        assert_eq!(
            response,
            Response::Error {
                id: Some(json!(2)),
                error: "Audio file not found: /nonexistent.wav".to_string(),
            }
        );
    }

    #[test]
    fn test_transcribe_with_diarization() {
        let (writer, _storage) = capture_writer();
        let mut state = test_state(true, false);
        state.dispatch(
            parse_request(r#"{"type":"loadModel","id":1}"#).unwrap(),
            &writer,
        );

        let dir = test_wav();
        let path = dir.path().join("audio.wav");
        let line = format!(
            r#"{{"type":"transcribe","id":2,"filePath":"{}"}}"#,
            path.display()
        );
        let response = state.dispatch(parse_request(&line).unwrap(), &writer);

        match response {
            Response::TranscriptionResult {
                id,
                segments,
                language,
                duration,
                speakers,
            } => {
                assert_eq!(id, Some(json!(2)));
                assert_eq!(language, "en");
                assert_eq!(segments.len(), 1);
                assert!((duration - 1.5).abs() < 1e-9);
                assert_eq!(speakers, vec!["SPEAKER_00"]);
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[test]
    fn test_transcribe_without_diarization() {
        let (writer, _storage) = capture_writer();
        let mut state = test_state(true, false);
        state.dispatch(
            parse_request(r#"{"type":"loadModel","id":1}"#).unwrap(),
            &writer,
        );

        let dir = test_wav();
        let path = dir.path().join("audio.wav");
        let line = format!(
            r#"{{"type":"transcribe","id":2,"filePath":"{}","enableDiarization":false}}"#,
            path.display()
        );
        let response = state.dispatch(parse_request(&line).unwrap(), &writer);

        match response {
            Response::TranscriptionResult { speakers, .. } => assert!(speakers.is_empty()),
            other => panic!("expected result, got {other:?}"),
        }
        // Diarizer was never built.
        assert!(state.diarizer.is_none());
    }

    #[test]
    fn test_diarizer_is_loaded_once_and_reused() {
        let (writer, _storage) = capture_writer();
        let mut state = test_state(true, false);

        let first = state.dispatch(
            parse_request(r#"{"type":"loadDiarizationModel","id":1}"#).unwrap(),
            &writer,
        );
        assert_eq!(
            first,
            Response::DiarizationModelLoaded {
                id: Some(json!(1)),
                device: "cpu".to_string(),
            }
        );
        assert!(state.diarizer.is_some());

        let before = Arc::as_ptr(state.diarizer.as_ref().unwrap());
        state
            .dispatch(
                parse_request(r#"{"type":"loadDiarizationModel","id":2}"#).unwrap(),
                &writer,
            );
        assert_eq!(before, Arc::as_ptr(state.diarizer.as_ref().unwrap()));
    }

    #[test]
    fn test_ping_pong() {
        let (writer, _storage) = capture_writer();
        let mut state = test_state(true, false);

        let response = state.dispatch(
            parse_request(r#"{"type":"ping","id":"abc"}"#).unwrap(),
            &writer,
        );
        assert_eq!(
            response,
            Response::Pong {
                id: Some(json!("abc"))
            }
        );
    }

    #[test]
    fn test_run_worker_emits_ready_first_and_survives_garbage() {
        let (writer, storage) = capture_writer();
        let input = "not json\n{\"type\":\"frobnicate\",\"id\":1}\n{\"type\":\"ping\",\"id\":2}\n";

        run_worker(input.as_bytes(), writer, test_state(true, false)).unwrap();

        let all = responses(&storage);
        assert!(matches!(all[0], Response::Ready { .. }));
        match &all[1] {
            Response::Error { id, error } => {
                assert_eq!(*id, None);
                assert!(error.starts_with("Invalid JSON:"), "{error}");
            }
            other => panic!("expected error, got {other:?}"),
        }
        match &all[2] {
            Response::Error { id, error } => {
                assert_eq!(*id, Some(json!(1)));
                assert_eq!(error, "Unknown message type: frobnicate");
            }
            other => panic!("expected error, got {other:?}"),
        }
        assert_eq!(all[3], Response::Pong { id: Some(json!(2)) });
    }

    #[test]
    fn test_run_worker_skips_blank_lines() {
        let (writer, storage) = capture_writer();
        let input = "\n   \n{\"type\":\"ping\",\"id\":1}\n";

        run_worker(input.as_bytes(), writer, test_state(true, false)).unwrap();

        let all = responses(&storage);
        assert_eq!(all.len(), 2); // ready + pong
    }
}
