//! The run state machine: Planning → ImagePulling → Starting →
//! {AttachedRunning | DetachedRunning} → Collecting → Done.
//!
//! One controller drives at most one run. Attached runs block until the
//! container exits, streaming log lines to the caller as they arrive;
//! detached runs persist a [`RunRecord`] and return immediately, leaving
//! completion to be discovered by a later [`RunController::get_results`]
//! call — each invocation checks once, polling frequency is the caller's
//! business.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::catalog::{Catalog, ModelInfo, ModelMetadata};
use crate::docker::{ContainerHandle, Engine, LogLine, PullEvent, StartSpec};
use crate::error::RunError;
use crate::mounts::{self, CONFIG_SUBDIR};
use crate::params::ParameterMap;
use crate::template;

use super::collect::{self, RunResult, full_pattern, write_captions};
use super::naming;
use super::record::{MIRROR_PATH, RUN_INFO_FILE, RunRecord};

/// One run request, as the CLI hands it over.
#[derive(Debug, Default)]
pub struct RunRequest {
    pub model_name: Option<String>,
    /// Explicit model version id; overrides lookup by name.
    pub version: Option<String>,
    pub params_json: Option<String>,
    pub params_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub attached: bool,
}

/// What a run produced: a finished result (attached) or a persisted record
/// to poll later (detached).
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunResult),
    Detached(RunRecord),
}

/// Outcome of one `get_results` poll.
#[derive(Debug)]
pub enum ResultsOutcome {
    Collected(RunResult),
    NotReady,
}

pub struct RunController<'a> {
    catalog: &'a dyn Catalog,
    engine: &'a dyn Engine,
}

impl<'a> RunController<'a> {
    pub fn new(catalog: &'a dyn Catalog, engine: &'a dyn Engine) -> Self {
        Self { catalog, engine }
    }

    /// Run a model. `on_line` receives pull progress and, in attached mode,
    /// every log line as it arrives.
    pub fn run_model(
        &self,
        request: &RunRequest,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<RunOutcome, RunError> {
        // Planning: parameters must be resolvable before anything touches
        // the network or the filesystem.
        let params = self.load_params(request)?;

        let info = self.resolve_model(request)?;
        let meta = self.fetch_metadata(&info)?;

        let stamp = naming::timestamp();
        let host_root = self.result_folder(request, &info, &stamp)?;
        params.save(&host_root)?;

        let captions: BTreeMap<String, String> = meta
            .accessories
            .iter()
            .filter_map(|a| {
                let caption = a.caption.clone()?;
                Some((basename(&a.path).to_string(), caption))
            })
            .collect();
        write_captions(&captions, &host_root)?;

        // ImagePulling. Not retried; failure is terminal.
        info!(image = meta.image, "pulling model image");
        self.engine
            .pull_image(&meta.image, &mut |event| on_line(&format_pull(&event)))?;

        // Starting: render, plan mounts, derive the container name.
        let command = template::render(&meta.command_template, &params)?;
        let config_binds = self.render_configs(&meta, &params, &host_root)?;
        let plan = mounts::plan(&meta.outputs, &meta.accessories, &config_binds, &host_root)?;

        let name = naming::container_name(
            request.model_name.as_deref(),
            request.version.as_deref(),
            &stamp,
        );
        let spec = StartSpec {
            image: meta.image.clone(),
            name: name.clone(),
            command: container_command(&plan, &command),
            mounts: plan,
        };
        info!(container = name, attached = request.attached, "starting container");
        let handle = self.engine.create_and_start(&spec)?;

        let output_patterns: Vec<String> = meta
            .outputs
            .iter()
            .map(|o| full_pattern(&o.directory, &o.path_pattern))
            .collect();
        let accessory_paths: Vec<String> = meta.accessories.iter().map(|a| a.path.clone()).collect();

        if request.attached {
            let logs = self.drain_logs(&handle, on_line)?;
            let result = collect::collect(
                self.engine,
                &handle,
                &output_patterns,
                &accessory_paths,
                captions,
                &host_root,
                Some(logs),
            )?;
            self.engine.remove(&handle)?;
            info!(folder = %host_root.display(), "run complete");
            return Ok(RunOutcome::Completed(result));
        }

        // DetachedRunning: persist state, mirror the folder path into the
        // container, and hand control back.
        let record = RunRecord {
            container_name: handle.name.clone(),
            local_output_folder: host_root.clone(),
            output_paths: output_patterns,
            accessory_paths,
            model_id: meta.model_id.clone(),
            created_at: chrono::Local::now().to_rfc3339(),
        };
        record.save(&host_root)?;

        let mirror = format!(
            "echo {} > {MIRROR_PATH}",
            shell_words::quote(&host_root.display().to_string())
        );
        if let Err(e) = self
            .engine
            .exec(&handle, &["bash".into(), "-c".into(), mirror])
        {
            // The model may already have exited; the host-side record still
            // has everything get_results needs when run from this folder.
            warn!(error = %e, "could not mirror run info into container");
        }

        info!(container = handle.name, "running detached");
        Ok(RunOutcome::Detached(record))
    }

    /// Poll a detached run once. Reports `NotReady` while the container is
    /// still running; once it has exited, collects artifacts and removes the
    /// container. A second call after removal fails with
    /// [`RunError::ContainerNotFound`].
    pub fn get_results(&self, container: &str) -> Result<ResultsOutcome, RunError> {
        let handle = ContainerHandle::new(container);
        if self.engine.is_running(&handle)? {
            return Ok(ResultsOutcome::NotReady);
        }

        let host_root = self.recover_result_folder(&handle)?;
        let record = RunRecord::load(&host_root.join(RUN_INFO_FILE))?;

        let captions = match std::fs::read_to_string(host_root.join(collect::CAPTIONS_FILE)) {
            Ok(body) => serde_json::from_str(&body).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };

        let result = collect::collect(
            self.engine,
            &handle,
            &record.output_paths,
            &record.accessory_paths,
            captions,
            &host_root,
            None,
        )?;
        self.engine.remove(&handle)?;
        info!(folder = %host_root.display(), "results collected");
        Ok(ResultsOutcome::Collected(result))
    }

    /// Recover the result folder of a detached run from the path mirrored
    /// into the container at start time.
    fn recover_result_folder(&self, handle: &ContainerHandle) -> Result<PathBuf, RunError> {
        let staging = std::env::temp_dir().join(format!("modelrun-{}-info", handle.name));
        self.engine.copy_out(handle, MIRROR_PATH, &staging)?;
        let contents = std::fs::read_to_string(&staging)?;
        let _ = std::fs::remove_file(&staging);

        let folder = contents.trim();
        if folder.is_empty() {
            return Err(RunError::Engine(format!(
                "container {} carries no run info mirror",
                handle.name
            )));
        }
        Ok(PathBuf::from(folder))
    }

    fn load_params(&self, request: &RunRequest) -> Result<ParameterMap, RunError> {
        if let Some(json) = &request.params_json {
            return ParameterMap::from_json_str(json);
        }
        match &request.params_file {
            Some(path) if path.exists() => ParameterMap::from_file(path),
            _ => Err(RunError::MissingParameters),
        }
    }

    fn resolve_model(&self, request: &RunRequest) -> Result<ModelInfo, RunError> {
        let info = self
            .catalog
            .model_info(request.model_name.as_deref(), request.version.as_deref())?;
        if !info.image.is_empty() {
            return Ok(info);
        }
        Err(RunError::NoImageAvailable {
            version: request.version.clone().unwrap_or_else(|| info.id.clone()),
            alternatives: self.versions_with_images(&info),
        })
    }

    /// Sibling versions of a model that do carry a runnable image.
    fn versions_with_images(&self, info: &ModelInfo) -> Vec<String> {
        let Ok(versions) = self.catalog.versions(&info.name) else {
            return Vec::new();
        };
        versions
            .all()
            .into_iter()
            .filter(|id| *id != info.id)
            .filter(|id| {
                self.catalog
                    .model_info(None, Some(id))
                    .map(|m| !m.image.is_empty())
                    .unwrap_or(false)
            })
            .collect()
    }

    fn fetch_metadata(&self, info: &ModelInfo) -> Result<ModelMetadata, RunError> {
        let directive = self.catalog.directive(&info.id)?;
        Ok(ModelMetadata {
            model_id: info.id.clone(),
            model_name: info.name.clone(),
            image: info.image.clone(),
            command_template: directive.command,
            outputs: self.catalog.output_declarations(&info.id)?,
            accessories: self.catalog.accessory_declarations(&info.id)?,
            configs: self.catalog.config_declarations(&info.id)?,
        })
    }

    fn result_folder(
        &self,
        request: &RunRequest,
        info: &ModelInfo,
        stamp: &str,
    ) -> Result<PathBuf, RunError> {
        let root = match &request.output_dir {
            Some(dir) => dir.clone(),
            None => {
                let label = request
                    .model_name
                    .clone()
                    .or_else(|| request.version.clone())
                    .unwrap_or_else(|| info.id.clone());
                std::env::current_dir()?.join("runs").join(label).join(stamp)
            }
        };
        let root = std::path::absolute(&root)?;
        std::fs::create_dir_all(root.join(mounts::OUTPUT_SUBDIR))?;
        std::fs::create_dir_all(root.join(mounts::ACCESSORY_SUBDIR))?;
        Ok(root)
    }

    /// Fetch config templates, render them with the run's parameters, and
    /// stage them under `{host_root}/config/`. A template that cannot be
    /// fetched is skipped — the run continues without it. A template that
    /// references a missing parameter aborts, same as the command itself.
    fn render_configs(
        &self,
        meta: &ModelMetadata,
        params: &ParameterMap,
        host_root: &Path,
    ) -> Result<Vec<(PathBuf, String)>, RunError> {
        let mut binds = Vec::new();
        for decl in &meta.configs {
            let body = match self.catalog.fetch_config_body(&decl.template_url) {
                Ok(body) => body,
                Err(e @ RunError::ConfigFetch { .. }) => {
                    warn!(error = %e, "skipping config file");
                    continue;
                }
                Err(other) => return Err(other),
            };
            let rendered = template::render_config(&body, params)?;

            let config_dir = host_root.join(CONFIG_SUBDIR);
            std::fs::create_dir_all(&config_dir)?;
            let host_file = config_dir.join(basename(&decl.target_container_path));
            std::fs::write(&host_file, rendered)?;
            binds.push((host_file, decl.target_container_path.clone()));
        }
        Ok(binds)
    }

    /// Drain the attached log stream, forwarding each line and buffering the
    /// whole of it for `logs.txt`. Returns once the container has exited.
    fn drain_logs(
        &self,
        handle: &ContainerHandle,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Vec<u8>, RunError> {
        let rx = self.engine.stream_logs(handle)?;
        let mut buffer = String::new();
        for line in rx {
            match line {
                LogLine::Stdout(l) | LogLine::Stderr(l) => {
                    on_line(&l);
                    buffer.push_str(&l);
                    buffer.push('\n');
                }
                LogLine::Done(end) => {
                    info!(exit_code = ?end.exit_code, "container exited");
                    break;
                }
            }
        }
        Ok(buffer.into_bytes())
    }
}

/// Assemble the in-container command: ownership fixups for every mounted
/// directory, then the model command. Joined with `;` so a failed chown
/// never blocks the model. This is the one place a single shell string is
/// unavoidable; everything interpolated goes through `shell_words::quote`.
fn container_command(plan: &mounts::MountPlan, model_command: &str) -> Vec<String> {
    let mut parts: Vec<String> = plan
        .container_targets()
        .map(|dir| format!("sudo chown clouseau:clouseau {}", shell_words::quote(dir)))
        .collect();
    parts.push(model_command.to_string());
    vec!["bash".into(), "-c".into(), parts.join("; ")]
}

fn format_pull(event: &PullEvent) -> String {
    match (&event.id, &event.progress) {
        (Some(id), Some(progress)) => format!("{id}: {} {progress}", event.status),
        (Some(id), None) => format!("{id}: {}", event.status),
        (None, _) => event.status.clone(),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    use crate::catalog::{AccessoryDecl, ConfigDecl, Directive, OutputDecl, VersionInfo};
    use crate::docker::{ChangeKind, FsChange, PullEvent, StreamEnd};

    // ── fakes ────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeCatalog {
        image: String,
        outputs: Vec<OutputDecl>,
        accessories: Vec<AccessoryDecl>,
        configs: Vec<ConfigDecl>,
        config_body: Option<String>,
        alternatives: Vec<(String, String)>, // (version id, image)
    }

    impl FakeCatalog {
        fn chirps() -> Self {
            Self {
                image: "jataware/dojo-publish:CHIRPS-Monthly-latest".into(),
                outputs: vec![
                    OutputDecl {
                        directory: "/out".into(),
                        path_pattern: "*.tif".into(),
                    },
                    OutputDecl {
                        directory: "/out".into(),
                        path_pattern: "summary.csv".into(),
                    },
                ],
                accessories: vec![AccessoryDecl {
                    path: "/docs/plot.png".into(),
                    caption: Some("Rainfall by month".into()),
                }],
                ..Self::default()
            }
        }
    }

    impl Catalog for FakeCatalog {
        fn model_info(
            &self,
            name: Option<&str>,
            version: Option<&str>,
        ) -> Result<ModelInfo, RunError> {
            if let Some(version) = version {
                if let Some((id, image)) = self.alternatives.iter().find(|(id, _)| id == version) {
                    return Ok(ModelInfo {
                        id: id.clone(),
                        name: "CHIRPS-Monthly".into(),
                        image: image.clone(),
                        next_version: None,
                    });
                }
            }
            Ok(ModelInfo {
                id: "model-1".into(),
                name: name.unwrap_or("CHIRPS-Monthly").to_string(),
                image: self.image.clone(),
                next_version: None,
            })
        }

        fn directive(&self, _: &str) -> Result<Directive, RunError> {
            Ok(Directive {
                command: "python3 run.py --month={{ month }} --year={{ year }}".into(),
                command_raw: "python3 run.py --month=01 --year=2021".into(),
            })
        }

        fn output_declarations(&self, _: &str) -> Result<Vec<OutputDecl>, RunError> {
            Ok(self.outputs.clone())
        }

        fn accessory_declarations(&self, _: &str) -> Result<Vec<AccessoryDecl>, RunError> {
            Ok(self.accessories.clone())
        }

        fn config_declarations(&self, _: &str) -> Result<Vec<ConfigDecl>, RunError> {
            Ok(self.configs.clone())
        }

        fn fetch_config_body(&self, url: &str) -> Result<String, RunError> {
            self.config_body
                .clone()
                .ok_or_else(|| RunError::ConfigFetch {
                    url: url.to_string(),
                    reason: "unreachable".into(),
                })
        }

        fn available_models(&self) -> Result<Vec<String>, RunError> {
            Ok(vec!["CHIRPS-Monthly".into()])
        }

        fn versions(&self, _: &str) -> Result<VersionInfo, RunError> {
            Ok(VersionInfo {
                current_version: "model-1".into(),
                prev_versions: self.alternatives.iter().map(|(id, _)| id.clone()).collect(),
                later_versions: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        calls: Mutex<Vec<String>>,
        running: Mutex<bool>,
        exists: Mutex<bool>,
        changes: Vec<FsChange>,
        log_lines: Vec<String>,
        mirror_body: Mutex<Option<String>>,
    }

    impl FakeEngine {
        fn with_diff(paths: &[&str]) -> Self {
            Self {
                exists: Mutex::new(true),
                changes: paths
                    .iter()
                    .map(|p| FsChange {
                        path: p.to_string(),
                        kind: ChangeKind::Added,
                    })
                    .collect(),
                log_lines: vec!["reading inputs".into(), "writing outputs".into()],
                ..Self::default()
            }
        }

        fn called(&self, prefix: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| c.starts_with(prefix))
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn not_found(&self, handle: &ContainerHandle) -> Result<(), RunError> {
            if *self.exists.lock().unwrap() {
                Ok(())
            } else {
                Err(RunError::ContainerNotFound(handle.name.clone()))
            }
        }
    }

    impl Engine for FakeEngine {
        fn pull_image(
            &self,
            reference: &str,
            progress: &mut dyn FnMut(PullEvent),
        ) -> Result<(), RunError> {
            self.record(format!("pull {reference}"));
            progress(PullEvent {
                id: Some("4abcf2066143".into()),
                status: "Pull complete".into(),
                progress: None,
            });
            Ok(())
        }

        fn create_and_start(&self, spec: &StartSpec) -> Result<ContainerHandle, RunError> {
            self.record(format!("start {}", spec.name));
            *self.exists.lock().unwrap() = true;
            Ok(ContainerHandle::new(spec.name.clone()))
        }

        fn stream_logs(
            &self,
            handle: &ContainerHandle,
        ) -> Result<mpsc::Receiver<LogLine>, RunError> {
            self.not_found(handle)?;
            self.record("stream_logs");
            let (tx, rx) = mpsc::channel();
            for line in &self.log_lines {
                tx.send(LogLine::Stdout(line.clone())).unwrap();
            }
            tx.send(LogLine::Done(StreamEnd { exit_code: Some(0) }))
                .unwrap();
            Ok(rx)
        }

        fn fetch_logs(&self, handle: &ContainerHandle) -> Result<Vec<u8>, RunError> {
            self.not_found(handle)?;
            self.record("fetch_logs");
            Ok(self.log_lines.join("\n").into_bytes())
        }

        fn is_running(&self, handle: &ContainerHandle) -> Result<bool, RunError> {
            self.not_found(handle)?;
            Ok(*self.running.lock().unwrap())
        }

        fn diff(&self, handle: &ContainerHandle) -> Result<Vec<FsChange>, RunError> {
            self.not_found(handle)?;
            self.record("diff");
            Ok(self.changes.clone())
        }

        fn exec(&self, handle: &ContainerHandle, command: &[String]) -> Result<(), RunError> {
            self.not_found(handle)?;
            self.record(format!("exec {}", command.join(" ")));
            Ok(())
        }

        fn copy_out(
            &self,
            handle: &ContainerHandle,
            container_path: &str,
            host_path: &std::path::Path,
        ) -> Result<(), RunError> {
            self.not_found(handle)?;
            self.record(format!("copy_out {container_path}"));
            let body = if container_path == MIRROR_PATH {
                self.mirror_body
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_default()
            } else {
                "data".to_string()
            };
            std::fs::write(host_path, body).unwrap();
            Ok(())
        }

        fn remove(&self, handle: &ContainerHandle) -> Result<(), RunError> {
            self.not_found(handle)?;
            self.record(format!("remove {}", handle.name));
            *self.exists.lock().unwrap() = false;
            Ok(())
        }
    }

    fn request(dir: &std::path::Path, attached: bool) -> RunRequest {
        RunRequest {
            model_name: Some("CHIRPS-Monthly".into()),
            params_json: Some(r#"{"month": "01", "year": 2021}"#.into()),
            output_dir: Some(dir.to_path_buf()),
            attached,
            ..RunRequest::default()
        }
    }

    #[test]
    fn missing_parameters_fail_before_any_side_effect() {
        let catalog = FakeCatalog::chirps();
        let engine = FakeEngine::default();
        let controller = RunController::new(&catalog, &engine);

        let err = controller
            .run_model(&RunRequest::default(), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, RunError::MissingParameters));
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn attached_run_streams_collects_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FakeCatalog::chirps();
        let engine = FakeEngine::with_diff(&["/out/a.tif", "/out/b.tif", "/out/summary.csv"]);
        let controller = RunController::new(&catalog, &engine);

        let mut seen = Vec::new();
        let outcome = controller
            .run_model(&request(dir.path(), true), &mut |l| seen.push(l.to_string()))
            .unwrap();

        let RunOutcome::Completed(result) = outcome else {
            panic!("expected Completed");
        };
        // Pull progress and both log lines were forwarded.
        assert!(seen.iter().any(|l| l.contains("Pull complete")));
        assert!(seen.iter().any(|l| l == "writing outputs"));
        // Wildcard expanded against the diff, plain path passed through.
        assert_eq!(result.output_files.len(), 3);
        assert!(dir.path().join("logs.txt").exists());
        assert!(dir.path().join("run-parameters.json").exists());
        let captions = std::fs::read_to_string(dir.path().join("accessories-captions.json")).unwrap();
        assert!(captions.contains("Rainfall by month"));
        assert!(engine.called("remove dojo-chirpsmonthly"));
    }

    #[test]
    fn detached_run_persists_record_and_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FakeCatalog::chirps();
        let engine = FakeEngine::with_diff(&[]);
        let controller = RunController::new(&catalog, &engine);

        let outcome = controller
            .run_model(&request(dir.path(), false), &mut |_| {})
            .unwrap();

        let RunOutcome::Detached(record) = outcome else {
            panic!("expected Detached");
        };
        assert!(record.container_name.starts_with("dojo-chirpsmonthly"));
        assert_eq!(record.output_paths, vec!["/out/*.tif", "/out/summary.csv"]);
        assert!(dir.path().join(RUN_INFO_FILE).exists());
        assert!(engine.called("exec bash -c echo"));
        // No collection, no removal yet.
        assert!(!engine.called("diff"));
        assert!(!engine.called("remove"));
    }

    #[test]
    fn get_results_reports_not_ready_while_running() {
        let catalog = FakeCatalog::chirps();
        let engine = FakeEngine::with_diff(&[]);
        *engine.running.lock().unwrap() = true;
        let controller = RunController::new(&catalog, &engine);

        let outcome = controller.get_results("dojo-x").unwrap();
        assert!(matches!(outcome, ResultsOutcome::NotReady));
        assert!(!engine.called("diff"));
    }

    #[test]
    fn get_results_collects_after_exit_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FakeCatalog::chirps();
        let engine = FakeEngine::with_diff(&["/out/a.tif"]);
        let controller = RunController::new(&catalog, &engine);

        // Start detached, then simulate the container having exited.
        let outcome = controller
            .run_model(&request(dir.path(), false), &mut |_| {})
            .unwrap();
        let RunOutcome::Detached(record) = outcome else {
            panic!("expected Detached");
        };
        *engine.mirror_body.lock().unwrap() =
            Some(dir.path().to_string_lossy().to_string());

        let outcome = controller.get_results(&record.container_name).unwrap();
        let ResultsOutcome::Collected(result) = outcome else {
            panic!("expected Collected");
        };
        assert_eq!(result.output_files.len(), 1);
        assert!(dir.path().join("logs.txt").exists());
        assert!(engine.called("remove"));

        // The container is gone now; a second collection attempt fails.
        let err = controller.get_results(&record.container_name).unwrap_err();
        assert!(matches!(err, RunError::ContainerNotFound(_)));
    }

    #[test]
    fn missing_image_lists_alternative_versions() {
        let mut catalog = FakeCatalog::chirps();
        catalog.image = String::new();
        catalog.alternatives = vec![
            ("v-with-image".into(), "jataware/dojo-publish:old".into()),
            ("v-without".into(), String::new()),
        ];
        let engine = FakeEngine::default();
        let controller = RunController::new(&catalog, &engine);

        let dir = tempfile::tempdir().unwrap();
        let err = controller
            .run_model(&request(dir.path(), true), &mut |_| {})
            .unwrap_err();
        let RunError::NoImageAvailable { alternatives, .. } = err else {
            panic!("expected NoImageAvailable");
        };
        assert_eq!(alternatives, vec!["v-with-image"]);
    }

    #[test]
    fn unreachable_config_template_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = FakeCatalog::chirps();
        catalog.configs = vec![ConfigDecl {
            template_url: "https://dojo.example/raw/config.toml".into(),
            target_container_path: "/model/config.toml".into(),
        }];
        // config_body stays None, so every fetch fails.
        let engine = FakeEngine::with_diff(&[]);
        let controller = RunController::new(&catalog, &engine);

        let outcome = controller.run_model(&request(dir.path(), true), &mut |_| {});
        assert!(outcome.is_ok());
        assert!(!dir.path().join("config").exists());
    }

    #[test]
    fn fetched_config_template_is_rendered_and_staged() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = FakeCatalog::chirps();
        catalog.configs = vec![ConfigDecl {
            template_url: "https://dojo.example/raw/config.toml".into(),
            target_container_path: "/model/config.toml".into(),
        }];
        catalog.config_body = Some("month = {{ month }}\n".into());
        let engine = FakeEngine::with_diff(&[]);
        let controller = RunController::new(&catalog, &engine);

        controller
            .run_model(&request(dir.path(), true), &mut |_| {})
            .unwrap();
        let staged = std::fs::read_to_string(dir.path().join("config/config.toml")).unwrap();
        assert_eq!(staged, "month = 01\n");
    }

    #[test]
    fn chown_fixups_precede_model_command_joined_with_semicolons() {
        let outputs = vec![OutputDecl {
            directory: "/out".into(),
            path_pattern: "a.tif".into(),
        }];
        let plan = mounts::plan(&outputs, &[], &[], std::path::Path::new("/tmp/r")).unwrap();
        let command = container_command(&plan, "python3 run.py --month=01");
        assert_eq!(command[0], "bash");
        assert_eq!(command[1], "-c");
        assert_eq!(
            command[2],
            "sudo chown clouseau:clouseau /out; python3 run.py --month=01"
        );
    }

    #[test]
    fn chown_targets_with_spaces_are_quoted() {
        let outputs = vec![OutputDecl {
            directory: "/data files/out".into(),
            path_pattern: "a.tif".into(),
        }];
        let plan = mounts::plan(&outputs, &[], &[], std::path::Path::new("/tmp/r")).unwrap();
        let command = container_command(&plan, "run.py");
        assert_eq!(
            command[2],
            "sudo chown clouseau:clouseau '/data files/out'; run.py"
        );
    }

    #[test]
    fn template_error_aborts_before_container_creation() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FakeCatalog::chirps();
        let engine = FakeEngine::default();
        let controller = RunController::new(&catalog, &engine);

        let mut req = request(dir.path(), true);
        req.params_json = Some(r#"{"month": "01"}"#.into()); // year missing
        let err = controller.run_model(&req, &mut |_| {}).unwrap_err();
        assert!(matches!(err, RunError::MissingParameter { .. }));
        assert!(!engine.called("start"));
    }
}
