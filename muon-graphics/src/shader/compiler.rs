//! Background shader compilation.
//!
//! A single worker thread drains a bounded request queue. Each request is a
//! GLSL source path: the worker hashes the file, skips it when the hash store
//! already carries that hash, and otherwise lowers it to SPIR-V next to the
//! source with debug info and size optimization enabled.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};
use tracing::{debug, error, trace};

use crate::shader::hash_store::HashStore;

const REQUEST_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct ShaderCompilationRequest {
    pub path: PathBuf,
}

enum WorkerMessage {
    Compile(ShaderCompilationRequest),
    Terminate,
}

pub struct ShaderCompiler {
    sender: Sender<WorkerMessage>,
    terminate: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ShaderCompiler {
    /// Spawns the worker thread. `hash_store_path` locates the persistent
    /// path-to-hash store.
    pub fn new(hash_store_path: impl Into<PathBuf>) -> Self {
        let hash_store_path = hash_store_path.into();
        let (sender, receiver) = bounded::<WorkerMessage>(REQUEST_QUEUE_DEPTH);
        let terminate = Arc::new(AtomicBool::new(false));

        let worker_terminate = Arc::clone(&terminate);
        let worker = std::thread::spawn(move || {
            debug!("shader compilation worker thread spawned");

            let Some(compiler) = shaderc::Compiler::new() else {
                error!("failed to initialise shader compiler backend");
                return;
            };
            let mut store = match HashStore::open(&hash_store_path) {
                Ok(store) => store,
                Err(err) => {
                    error!("failed to open shader hash store: {err}");
                    return;
                }
            };

            loop {
                trace!("waiting for work");
                match receiver.recv() {
                    Ok(WorkerMessage::Compile(request)) => {
                        compile(&compiler, &mut store, &request);
                        if worker_terminate.load(Ordering::Acquire) {
                            trace!("terminate received");
                            break;
                        }
                    }
                    Ok(WorkerMessage::Terminate) | Err(_) => {
                        trace!("terminate received");
                        break;
                    }
                }
            }

            debug!("shader compilation worker thread done");
        });

        debug!("created shader compiler");
        Self {
            sender,
            terminate,
            worker: Some(worker),
        }
    }

    /// Enqueues a compilation request and signals the worker.
    pub fn submit_work(&self, request: ShaderCompilationRequest) {
        let _ = self.sender.send(WorkerMessage::Compile(request));
    }
}

impl Drop for ShaderCompiler {
    fn drop(&mut self) {
        self.terminate.store(true, Ordering::Release);
        let _ = self.sender.send(WorkerMessage::Terminate);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        debug!("destroyed shader compiler");
    }
}

/// Maps a source file extension onto a shaderc stage.
pub fn stage_for_extension(extension: &str) -> Option<shaderc::ShaderKind> {
    match extension {
        "vert" => Some(shaderc::ShaderKind::Vertex),
        "tesc" => Some(shaderc::ShaderKind::TessControl),
        "tese" => Some(shaderc::ShaderKind::TessEvaluation),
        "geom" => Some(shaderc::ShaderKind::Geometry),
        "frag" => Some(shaderc::ShaderKind::Fragment),
        "task" => Some(shaderc::ShaderKind::Task),
        "mesh" => Some(shaderc::ShaderKind::Mesh),
        "comp" => Some(shaderc::ShaderKind::Compute),
        _ => None,
    }
}

/// Output path for a source: the source path with `.spv` appended.
pub fn spirv_output_path(source: &Path) -> PathBuf {
    let mut output = source.as_os_str().to_owned();
    output.push(".spv");
    PathBuf::from(output)
}

fn compile(compiler: &shaderc::Compiler, store: &mut HashStore, request: &ShaderCompilationRequest) {
    trace!("beginning compilation of {}", request.path.display());

    let source = match fs::read_to_string(&request.path) {
        Ok(source) => source,
        Err(err) => {
            error!("failed to open file {}: {err}", request.path.display());
            return;
        }
    };

    let source_hash: [u8; 32] = *blake3::hash(source.as_bytes()).as_bytes();
    if store.is_up_to_date(&request.path, &source_hash) {
        trace!("identical hashes, skipping: {}", request.path.display());
        return;
    }

    let extension = request.path.extension().and_then(|extension| extension.to_str());
    let Some(kind) = extension.and_then(stage_for_extension) else {
        error!(
            "failed to infer shader stage from extension: {}",
            request.path.display()
        );
        return;
    };

    let Some(mut options) = shaderc::CompileOptions::new() else {
        error!("failed to create shader compile options");
        return;
    };
    options.set_target_env(shaderc::TargetEnv::Vulkan, shaderc::EnvVersion::Vulkan1_3 as u32);
    options.set_generate_debug_info();
    options.set_optimization_level(shaderc::OptimizationLevel::Size);

    let file_name = request.path.to_string_lossy();
    let artifact = match compiler.compile_into_spirv(&source, kind, &file_name, "main", Some(&options)) {
        Ok(artifact) => artifact,
        Err(err) => {
            error!("failed to compile {}:\n{err}", request.path.display());
            return;
        }
    };

    let output_path = spirv_output_path(&request.path);
    if let Err(err) = fs::write(&output_path, artifact.as_binary_u8()) {
        error!("failed to write SPIR-V to {}: {err}", output_path.display());
        return;
    }
    debug!("writing out SPIR-V to {}", output_path.display());

    store.upsert(request.path.clone(), source_hash, output_path);
    if let Err(err) = store.save() {
        error!("failed to persist shader hash store: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_stages() {
        assert!(matches!(stage_for_extension("vert"), Some(shaderc::ShaderKind::Vertex)));
        assert!(matches!(stage_for_extension("mesh"), Some(shaderc::ShaderKind::Mesh)));
        assert!(matches!(stage_for_extension("comp"), Some(shaderc::ShaderKind::Compute)));
        assert!(stage_for_extension("glsl").is_none());
    }

    #[test]
    fn output_path_appends_spv() {
        assert_eq!(
            spirv_output_path(Path::new("shaders/tri.vert")),
            PathBuf::from("shaders/tri.vert.spv")
        );
    }

    #[test]
    fn unchanged_source_is_not_recompiled() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("hashes.json");
        let source_path = dir.path().join("fill.comp");
        fs::write(
            &source_path,
            "#version 450\nlayout(local_size_x = 1) in;\nvoid main() {}\n",
        )
        .unwrap();

        {
            let compiler = ShaderCompiler::new(&store_path);
            compiler.submit_work(ShaderCompilationRequest {
                path: source_path.clone(),
            });
            // Drop joins the worker, draining the queue.
        }

        let spirv_path = spirv_output_path(&source_path);
        assert!(spirv_path.exists(), "first submission compiles");

        // A skipped request must not rewrite the artifact.
        fs::remove_file(&spirv_path).unwrap();
        {
            let compiler = ShaderCompiler::new(&store_path);
            compiler.submit_work(ShaderCompilationRequest {
                path: source_path.clone(),
            });
        }
        assert!(!spirv_path.exists(), "second submission is a no-op");
    }

    #[test]
    fn changed_source_recompiles() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("hashes.json");
        let source_path = dir.path().join("fill.comp");

        fs::write(
            &source_path,
            "#version 450\nlayout(local_size_x = 1) in;\nvoid main() {}\n",
        )
        .unwrap();
        {
            let compiler = ShaderCompiler::new(&store_path);
            compiler.submit_work(ShaderCompilationRequest {
                path: source_path.clone(),
            });
        }

        let spirv_path = spirv_output_path(&source_path);
        fs::remove_file(&spirv_path).unwrap();

        fs::write(
            &source_path,
            "#version 450\nlayout(local_size_x = 2) in;\nvoid main() {}\n",
        )
        .unwrap();
        {
            let compiler = ShaderCompiler::new(&store_path);
            compiler.submit_work(ShaderCompilationRequest {
                path: source_path.clone(),
            });
        }
        assert!(spirv_path.exists(), "changed source compiles again");
    }
}
