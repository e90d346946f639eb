//! Pipeline commands and the external-program command builder

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::config::EncodeProfile;
use crate::error::{BenchError, BenchResult};
use crate::partition::StreamJob;
use crate::traits::CommandBuilder;

/// Everything a [`CommandBuilder`] needs to produce one pool's process
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRequest {
    /// Workload of the pool
    pub job: StreamJob,
    /// Encode parameters
    pub profile: EncodeProfile,
    /// Test duration cutoff
    pub duration: Duration,
}

impl PipelineRequest {
    /// Encoder index hint for the pool (0 or 1)
    pub fn encoder_index(&self) -> u8 {
        self.job.pool.encoder_index()
    }
}

/// A structured process invocation: program, arguments, extra environment
///
/// Never a shell string; arguments reach the program verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineCommand {
    /// Program to execute
    pub program: PathBuf,
    /// Arguments, in order
    pub args: Vec<OsString>,
    /// Extra environment variables
    pub env: Vec<(OsString, OsString)>,
}

impl PipelineCommand {
    /// Create a command with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Convert into a spawnable tokio command
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Human readable rendering, for logs only
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.to_string_lossy());
        }
        out
    }
}

/// Runs a user-supplied pipeline program once per pool
///
/// The program receives the pool's workload as flags:
///
/// ```text
/// <program> [extra args] --pool nvenc1 --encoder 0 --start 1 --end 50
///           --input-dir input --input-pattern test_stream_{index}.mp4
///           --output-dir output/nvenc1 --resolution 1280x720
///           --bitrate 2500k --framerate 30 --segment-duration 4
///           --preset p1 --duration 60
/// ```
///
/// It must write `<output-dir>/stream<NNN>/playlist.m3u8` for every stream
/// and should exit on its own once `--duration` has elapsed.
#[derive(Debug, Clone)]
pub struct ExternalScriptBuilder {
    program: PathBuf,
    extra_args: Vec<OsString>,
}

impl ExternalScriptBuilder {
    /// Create a builder for `program`
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Arguments inserted before the generated flags
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl CommandBuilder for ExternalScriptBuilder {
    fn name(&self) -> &str {
        "external"
    }

    fn build(&self, request: &PipelineRequest) -> BenchResult<PipelineCommand> {
        if self.program.as_os_str().is_empty() {
            return Err(BenchError::command("pipeline program is empty"));
        }

        let job = &request.job;
        if job.range.is_empty() {
            return Err(BenchError::command(format!("{} has no streams", job.pool)));
        }

        let profile = &request.profile;
        let cmd = PipelineCommand::new(&self.program)
            .args(self.extra_args.iter().cloned())
            .arg("--pool")
            .arg(job.pool.name())
            .arg("--encoder")
            .arg(request.encoder_index().to_string())
            .arg("--start")
            .arg(job.range.start.to_string())
            .arg("--end")
            .arg(job.range.end.to_string())
            .arg("--input-dir")
            .arg(job.input_dir.as_os_str())
            .arg("--input-pattern")
            .arg(job.input_pattern.as_str())
            .arg("--output-dir")
            .arg(job.output_dir.as_os_str())
            .arg("--resolution")
            .arg(profile.resolution())
            .arg("--bitrate")
            .arg(format!("{}k", profile.bitrate_kbps))
            .arg("--framerate")
            .arg(profile.framerate.to_string())
            .arg("--segment-duration")
            .arg(profile.segment_duration_secs.to_string())
            .arg("--preset")
            .arg(profile.preset.as_str())
            .arg("--duration")
            .arg(request.duration.as_secs().to_string())
            .env("NVENC_POOL", job.pool.name());

        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{partition, InputPattern, PoolId};
    use std::path::Path;

    fn request(pool: usize) -> PipelineRequest {
        let jobs = partition(
            50,
            Path::new("input"),
            &InputPattern::default(),
            Path::new("output"),
        )
        .unwrap();
        PipelineRequest {
            job: jobs[pool].clone(),
            profile: EncodeProfile::default(),
            duration: Duration::from_secs(60),
        }
    }

    fn flag<'a>(cmd: &'a PipelineCommand, name: &str) -> Option<&'a OsString> {
        let pos = cmd.args.iter().position(|a| a == name)?;
        cmd.args.get(pos + 1)
    }

    #[test]
    fn test_builds_structured_flags() {
        let builder = ExternalScriptBuilder::new("/opt/pipeline/run.sh").with_args(["--gpu", "0"]);
        let cmd = builder.build(&request(1)).unwrap();

        assert_eq!(cmd.program, PathBuf::from("/opt/pipeline/run.sh"));
        assert_eq!(cmd.args[0], "--gpu");
        assert_eq!(flag(&cmd, "--pool").unwrap(), "nvenc2");
        assert_eq!(flag(&cmd, "--encoder").unwrap(), "1");
        assert_eq!(flag(&cmd, "--start").unwrap(), "51");
        assert_eq!(flag(&cmd, "--end").unwrap(), "100");
        assert_eq!(flag(&cmd, "--output-dir").unwrap(), "output/nvenc2");
        assert_eq!(flag(&cmd, "--resolution").unwrap(), "1280x720");
        assert_eq!(flag(&cmd, "--bitrate").unwrap(), "2500k");
        assert_eq!(flag(&cmd, "--duration").unwrap(), "60");
        assert_eq!(
            cmd.env,
            vec![(OsString::from("NVENC_POOL"), OsString::from("nvenc2"))]
        );
    }

    #[test]
    fn test_request_encoder_hint() {
        assert_eq!(request(0).job.pool, PoolId::Nvenc1);
        assert_eq!(request(0).encoder_index(), 0);
    }

    #[test]
    fn test_empty_program_rejected() {
        let err = ExternalScriptBuilder::new("").build(&request(0)).unwrap_err();
        assert!(matches!(err, BenchError::CommandBuild(_)));
    }

    #[test]
    fn test_display_rendering() {
        let cmd = PipelineCommand::new("/bin/echo").args(["a", "b c"]);
        assert_eq!(cmd.display(), "/bin/echo a b c");
    }
}
