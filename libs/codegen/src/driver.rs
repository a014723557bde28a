//! Generation driver
//!
//! Resolves every device once, then renders each (device, generator) pair
//! on a fixed pool of worker threads. Jobs and results travel over
//! `crossbeam` channels. A failing or panicking pair only costs its own file.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use devbind_model::{Device, DeviceRegistry};

use crate::error::{EmitError, GenerateError};
use crate::generators::{Generator, Language, RenderContext};
use crate::resolver::{resolve_device, ResolvedDevice};

/// Everything one run produced, kept in memory until it is written.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// File contents keyed by language and path relative to the language
    /// directory
    pub files: BTreeMap<(Language, String), String>,
    pub failures: Vec<GenerateError>,
    /// Names of the released devices, in registry order
    pub released: Vec<String>,
}

impl GenerationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn file(&self, language: Language, name: &str) -> Option<&str> {
        self.files
            .get(&(language, name.to_string()))
            .map(String::as_str)
    }

    pub fn files_for(&self, language: Language) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .filter(move |((l, _), _)| *l == language)
            .map(|((_, name), contents)| (name.as_str(), contents.as_str()))
    }
}

/// One (device, generator) pair.
struct Job {
    device: usize,
    generator: usize,
}

/// Rendered files of one job, or why there are none.
struct JobOutput {
    device: String,
    language: Language,
    result: Result<Vec<(String, String)>, JobFailure>,
}

enum JobFailure {
    Emit(EmitError),
    Panicked,
}

/// Runs generation jobs on a worker pool.
#[derive(Debug, Clone)]
pub struct GenerationDriver {
    workers: usize,
}

impl Default for GenerationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationDriver {
    /// One worker per available core.
    pub fn new() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self { workers }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn run(
        &self,
        registry: &DeviceRegistry,
        generators: &[Box<dyn Generator>],
        ctx: &RenderContext,
    ) -> GenerationReport {
        let mut report = GenerationReport::default();

        let devices: Vec<ResolvedDevice> = registry
            .devices()
            .map(|device| resolve_device(Arc::clone(device)))
            .collect();

        for resolved in &devices {
            for error in &resolved.errors {
                report.failures.push(GenerateError::Resolve {
                    device: resolved.device.name.to_string(),
                    error: error.clone(),
                });
            }
        }

        let (job_tx, job_rx) = unbounded::<Job>();
        let (out_tx, out_rx) = unbounded::<JobOutput>();

        for device in 0..devices.len() {
            for generator in 0..generators.len() {
                // The receiver is alive until the scope below ends.
                let _ = job_tx.send(Job { device, generator });
            }
        }
        drop(job_tx);

        let jobs = devices.len() * generators.len();
        let workers = self.workers.min(jobs.max(1));
        tracing::info!(
            devices = devices.len(),
            generators = generators.len(),
            workers,
            "Starting generation"
        );

        thread::scope(|scope| {
            for index in 0..workers {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                let devices = &devices;
                let spawned = thread::Builder::new()
                    .name(format!("devbind-worker-{}", index))
                    .spawn_scoped(scope, move || work(job_rx, out_tx, devices, generators, ctx));
                if let Err(error) = spawned {
                    tracing::error!(error = %error, "Failed to spawn worker thread");
                }
            }
            drop(out_tx);

            for output in out_rx.iter() {
                collect(&mut report, output);
            }
        });

        // Any job still queued here had no worker to run it.
        for job in job_rx.try_iter() {
            report.failures.push(GenerateError::TaskPanicked {
                device: devices[job.device].device.name.to_string(),
                language: generators[job.generator].language().display_name(),
            });
        }

        let released: Vec<Arc<Device>> = registry.released().cloned().collect();
        report.released = released.iter().map(|d| d.name.to_string()).collect();

        for generator in generators {
            match generator.finish(&released, ctx) {
                Ok(artifacts) => {
                    for artifact in artifacts {
                        report
                            .files
                            .insert((generator.language(), artifact.file_name), artifact.contents);
                    }
                }
                Err(error) => report.failures.push(GenerateError::Emit {
                    device: "released devices".to_string(),
                    language: generator.language().display_name(),
                    error,
                }),
            }
        }

        report.failures.sort_by_key(|f| f.to_string());

        tracing::info!(
            files = report.files.len(),
            failures = report.failures.len(),
            released = report.released.len(),
            "Generation finished"
        );

        report
    }
}

fn work(
    jobs: Receiver<Job>,
    out: Sender<JobOutput>,
    devices: &[ResolvedDevice],
    generators: &[Box<dyn Generator>],
    ctx: &RenderContext,
) {
    for job in jobs.iter() {
        let resolved = &devices[job.device];
        let generator = &generators[job.generator];
        let language = generator.language();

        let _span = tracing::debug_span!(
            "render",
            device = %resolved.device.name,
            language = %language
        )
        .entered();

        let rendered =
            panic::catch_unwind(AssertUnwindSafe(|| render(generator.as_ref(), resolved, ctx)));
        let result = match rendered {
            Ok(Ok(files)) => Ok(files),
            Ok(Err(error)) => Err(JobFailure::Emit(error)),
            Err(_) => Err(JobFailure::Panicked),
        };

        let output = JobOutput {
            device: resolved.device.name.to_string(),
            language,
            result,
        };
        if out.send(output).is_err() {
            // Collector is gone, nothing left to report to.
            break;
        }
    }
}

fn render(
    generator: &dyn Generator,
    resolved: &ResolvedDevice,
    ctx: &RenderContext,
) -> Result<Vec<(String, String)>, EmitError> {
    let mut files = vec![(
        generator.file_name(&resolved.device),
        generator.render_device(resolved, ctx)?,
    )];
    for artifact in generator.render_examples(resolved, ctx)? {
        files.push((artifact.file_name, artifact.contents));
    }
    Ok(files)
}

fn collect(report: &mut GenerationReport, output: JobOutput) {
    match output.result {
        Ok(files) => {
            tracing::debug!(
                device = %output.device,
                language = %output.language,
                files = files.len(),
                "Rendered device"
            );
            for (name, contents) in files {
                report.files.insert((output.language, name), contents);
            }
        }
        Err(JobFailure::Emit(error)) => {
            tracing::warn!(
                device = %output.device,
                language = %output.language,
                error = %error,
                "Skipping file"
            );
            report.failures.push(GenerateError::Emit {
                device: output.device,
                language: output.language.display_name(),
                error,
            });
        }
        Err(JobFailure::Panicked) => {
            tracing::error!(
                device = %output.device,
                language = %output.language,
                "Generation task panicked"
            );
            report.failures.push(GenerateError::TaskPanicked {
                device: output.device,
                language: output.language.display_name(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{all_generators, generator_for, Artifact};
    use crate::naming::NameKind;
    use crate::provenance::CommentStyle;
    use crate::test_support::{context, example_device, gps_v2, serial_link};
    use crate::error::ResolveError;
    use devbind_model::{load_descriptor, DescriptorFormat, ElementType, Name};

    fn registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        for device in [gps_v2(), serial_link(), example_device()] {
            registry.insert((*device).clone()).unwrap();
        }
        registry
    }

    /// Fails for one device and panics for another.
    struct Flaky;

    impl Generator for Flaky {
        fn language(&self) -> Language {
            Language::Python
        }

        fn file_name(&self, device: &Device) -> String {
            format!("{}.txt", device.name.snake())
        }

        fn comment_style(&self) -> CommentStyle {
            CommentStyle::Hash
        }

        fn translate_name(&self, name: &Name, _kind: NameKind) -> String {
            name.snake()
        }

        fn map_type(&self, ty: ElementType, _cardinality: usize) -> Result<String, EmitError> {
            Ok(ty.to_string())
        }

        fn render_device(
            &self,
            device: &ResolvedDevice,
            _ctx: &RenderContext,
        ) -> Result<String, EmitError> {
            match device.device.identifier {
                276 => Err(EmitError::UnsupportedConstruct {
                    language: "Flaky",
                    construct: "satellites".to_string(),
                }),
                2901 => panic!("serial link"),
                _ => Ok("ok\n".to_string()),
            }
        }

        fn finish(
            &self,
            released: &[Arc<Device>],
            _ctx: &RenderContext,
        ) -> Result<Vec<Artifact>, EmitError> {
            Ok(vec![Artifact {
                file_name: "released.txt".to_string(),
                contents: released.len().to_string(),
            }])
        }
    }

    #[test]
    fn renders_every_pair() {
        let report = GenerationDriver::new()
            .with_workers(3)
            .run(&registry(), &all_generators(), &context());
        assert!(report.is_success(), "{:?}", report.failures);
        assert!(report.file(Language::Python, "bricklet_gps_v2.py").is_some());
        assert!(report.file(Language::Rust, "bricklet_serial_link.rs").is_some());
        assert!(report.file(Language::C, "bricklet_example.h").is_some());
        assert!(report.file(Language::JavaScript, "BrickletGPSV2.js").is_some());
        assert!(report.file(Language::Python, "device_factory.py").is_some());
        assert!(report
            .file(Language::Python, "examples/bricklet_gps_v2/example_simple.py")
            .is_some());
    }

    #[test]
    fn output_does_not_depend_on_worker_count() {
        let generators = vec![generator_for(Language::Python), generator_for(Language::C)];
        let one = GenerationDriver::new()
            .with_workers(1)
            .run(&registry(), &generators, &context());
        let many = GenerationDriver::new()
            .with_workers(8)
            .run(&registry(), &generators, &context());
        assert_eq!(one.files, many.files);
    }

    #[test]
    fn factories_only_list_released_devices() {
        let report = GenerationDriver::new().run(&registry(), &all_generators(), &context());
        assert_eq!(report.released, vec!["Example".to_string(), "GPS V2".to_string()]);
        let factory = report.file(Language::Python, "device_factory.py").unwrap();
        assert!(factory.contains("276: BrickletGPSV2,"));
        assert!(!factory.contains("SerialLink"));
    }

    #[test]
    fn failures_are_isolated_per_pair() {
        let generators: Vec<Box<dyn Generator>> = vec![Box::new(Flaky)];
        let report = GenerationDriver::new()
            .with_workers(2)
            .run(&registry(), &generators, &context());

        assert_eq!(report.failures.len(), 2);
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f, GenerateError::Emit { device, .. } if device == "GPS V2")));
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(
                f,
                GenerateError::TaskPanicked { device, .. } if device == "Serial Link"
            )));
        assert_eq!(report.file(Language::Python, "example.txt"), Some("ok\n"));
        assert_eq!(report.file(Language::Python, "released.txt"), Some("2"));
    }

    const STRING_STREAM: &str = r#"{
        "author": "Jane Doe <jane@example.com>",
        "api_version": [2, 0, 0],
        "category": "Bricklet",
        "device_identifier": 2102,
        "name": "Strings",
        "description": {"en": "Streams text"},
        "released": true,
        "packets": [
            {
                "type": "function",
                "name": "Get Value",
                "elements": [["Value", "int32", 1, "out"]],
                "since_firmware": [1, 0, 0],
                "doc": ["bf", {"en": "Returns the value."}]
            },
            {
                "type": "function",
                "name": "Write Low Level",
                "elements": [
                    ["Message Length", "uint16", 1, "in"],
                    ["Message Chunk Data", "string", 60, "in"]
                ],
                "since_firmware": [1, 0, 0],
                "doc": ["llf", {"en": "Writes text."}],
                "high_level": {"stream_in": {"name": "Message", "single_chunk": true}}
            }
        ]
    }"#;

    #[test]
    fn unsupported_chunk_types_only_cost_the_view() {
        let mut registry = DeviceRegistry::new();
        let device = load_descriptor(STRING_STREAM, DescriptorFormat::Json).unwrap();
        registry.insert(device).unwrap();

        let report = GenerationDriver::new().run(&registry, &all_generators(), &context());

        assert_eq!(report.failures.len(), 1, "{:?}", report.failures);
        assert!(matches!(
            &report.failures[0],
            GenerateError::Resolve {
                device,
                error: ResolveError::UnsupportedChunkType { .. },
            } if device == "Strings"
        ));

        let python = report.file(Language::Python, "bricklet_strings.py").unwrap();
        assert!(python.contains("    def get_value(self):\n"));
        assert!(python
            .contains("    def write_low_level(self, message_length, message_chunk_data):\n"));
        assert!(!python.contains("    def write(self"));
        assert!(report.file(Language::Rust, "bricklet_strings.rs").is_some());
        assert!(report.file(Language::C, "bricklet_strings.h").is_some());
        assert!(report.file(Language::JavaScript, "BrickletStrings.js").is_some());
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(GenerationDriver::new().with_workers(0).workers(), 1);
    }
}
