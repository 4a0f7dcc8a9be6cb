use std::io;
use std::path::{Path, PathBuf};

/// Name of the persisted run record inside the result folder.
pub const RUN_INFO_FILE: &str = "run-info.txt";

/// Where the result-folder path is mirrored inside the container, so a later
/// invocation can recover it from nothing but a container name.
pub const MIRROR_PATH: &str = "/tmp/dojo-run-info.txt";

pub const LOGS_FILE: &str = "logs.txt";

/// Persisted state of a detached run. Written to `run-info.txt` when the
/// container starts and read back by a later `get_results` invocation,
/// possibly from a different process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub container_name: String,
    pub local_output_folder: PathBuf,
    /// Full container-side output patterns (`/out/*.tif`).
    pub output_paths: Vec<String>,
    /// Full container-side accessory file paths.
    pub accessory_paths: Vec<String>,
    pub model_id: String,
    pub created_at: String,
}

impl RunRecord {
    /// Write the record as tab-separated `key\tvalue` lines.
    pub fn save(&self, dir: &Path) -> io::Result<PathBuf> {
        let mut lines = vec![
            format!("container\t{}", self.container_name),
            format!("folder\t{}", self.local_output_folder.display()),
            format!("model\t{}", self.model_id),
            format!("created\t{}", self.created_at),
        ];
        for path in &self.output_paths {
            lines.push(format!("output\t{path}"));
        }
        for path in &self.accessory_paths {
            lines.push(format!("accessory\t{path}"));
        }
        let mut body = lines.join("\n");
        body.push('\n');

        let path = dir.join(RUN_INFO_FILE);
        std::fs::write(&path, body)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut container_name = None;
        let mut local_output_folder = None;
        let mut model_id = String::new();
        let mut created_at = String::new();
        let mut output_paths = Vec::new();
        let mut accessory_paths = Vec::new();

        for line in contents.lines() {
            let Some((key, value)) = line.split_once('\t') else {
                continue;
            };
            match key {
                "container" => container_name = Some(value.to_string()),
                "folder" => local_output_folder = Some(PathBuf::from(value)),
                "model" => model_id = value.to_string(),
                "created" => created_at = value.to_string(),
                "output" => output_paths.push(value.to_string()),
                "accessory" => accessory_paths.push(value.to_string()),
                _ => {}
            }
        }

        let invalid = |what: &str| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is missing the `{what}` line", path.display()),
            )
        };

        Ok(RunRecord {
            container_name: container_name.ok_or_else(|| invalid("container"))?,
            local_output_folder: local_output_folder.ok_or_else(|| invalid("folder"))?,
            output_paths,
            accessory_paths,
            model_id,
            created_at,
        })
    }
}
