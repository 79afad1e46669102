//! Internal update helper.
//!
//! When the install directory needs administrator rights, tnr relaunches itself
//! elevated with a reserved first argument. The helper performs exactly one file
//! operation and exits with 0 on success and 1 on failure:
//!
//! ```text
//! tnr --tnr-internal-update-helper --from <binary> --to <dir> --version <v> [--log-file <path>]
//! tnr --tnr-internal-update-helper --finalize --to <dir> [--log-file <path>]
//! tnr --tnr-internal-update-helper --update-meta --from <json> --to <meta file> [--log-file <path>]
//! ```
//!
//! The elevated process has no console the parent can read, so failures are
//! also written to `--log-file` and attached to [`UpdateError::HelperFailed`].

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::constants::HELPER_FLAG;
use crate::core::{Result, UpdateError};
use crate::upgrade::elevation::{is_elevated, run_elevated};
use crate::upgrade::install_meta::InstallMeta;
use crate::upgrade::staging::{finalize_in_dir, stage_in_dir};

const ARG_FROM: &str = "--from";
const ARG_TO: &str = "--to";
const ARG_VERSION: &str = "--version";
const ARG_FINALIZE: &str = "--finalize";
const ARG_LOG_FILE: &str = "--log-file";
const ARG_UPDATE_META: &str = "--update-meta";

/// The single operation a helper process performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperRequest {
    /// Copy `from` into `to` as a staged update for `version`.
    Stage {
        /// New executable
        from: PathBuf,
        /// Install directory
        to: PathBuf,
        /// Target version written to the marker
        version: String,
    },
    /// Complete a staged update in `to`.
    Finalize {
        /// Install directory
        to: PathBuf,
    },
    /// Copy the metadata document `from` to the metadata file `to`.
    UpdateMeta {
        /// Temporary JSON document
        from: PathBuf,
        /// Metadata file to write
        to: PathBuf,
    },
}

impl HelperRequest {
    /// Short operation name used in logs and errors.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Stage {
                ..
            } => "stage",
            Self::Finalize {
                ..
            } => "finalize",
            Self::UpdateMeta {
                ..
            } => "update-meta",
        }
    }
}

/// A parsed helper command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperInvocation {
    /// Operation to perform.
    pub request: HelperRequest,
    /// File that receives the helper's log output.
    pub log_file: Option<PathBuf>,
}

impl HelperInvocation {
    /// Creates an invocation without a log file.
    pub fn new(request: HelperRequest) -> Self {
        Self {
            request,
            log_file: None,
        }
    }

    /// Sends the helper's log output to `path`.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Full argument list, reserved flag first.
    pub fn to_args(&self) -> Vec<String> {
        let path = |p: &Path| p.to_string_lossy().into_owned();
        let mut args = vec![HELPER_FLAG.to_string()];
        match &self.request {
            HelperRequest::Stage {
                from,
                to,
                version,
            } => {
                args.extend([ARG_FROM.to_string(), path(from), ARG_TO.to_string(), path(to)]);
                args.extend([ARG_VERSION.to_string(), version.clone()]);
            }
            HelperRequest::Finalize {
                to,
            } => {
                args.extend([ARG_FINALIZE.to_string(), ARG_TO.to_string(), path(to)]);
            }
            HelperRequest::UpdateMeta {
                from,
                to,
            } => {
                args.push(ARG_UPDATE_META.to_string());
                args.extend([ARG_FROM.to_string(), path(from), ARG_TO.to_string(), path(to)]);
            }
        }
        if let Some(log_file) = &self.log_file {
            args.extend([ARG_LOG_FILE.to_string(), path(log_file)]);
        }
        args
    }

    /// Parses the arguments following the reserved flag.
    ///
    /// # Errors
    ///
    /// [`UpdateError::InvalidHelperArgs`] for unknown flags, missing values, or
    /// missing required paths.
    pub fn parse(args: &[String]) -> Result<Self> {
        let invalid = |reason: String| UpdateError::InvalidHelperArgs {
            reason,
        };

        let (mode, rest) = match args.first().map(String::as_str) {
            Some(ARG_FINALIZE) => (ARG_FINALIZE, &args[1..]),
            Some(ARG_UPDATE_META) => (ARG_UPDATE_META, &args[1..]),
            _ => ("", args),
        };

        let mut from = None;
        let mut to = None;
        let mut version = None;
        let mut log_file = None;
        let mut iter = rest.iter();
        while let Some(flag) = iter.next() {
            let slot = match flag.as_str() {
                ARG_FROM if mode != ARG_FINALIZE => &mut from,
                ARG_TO => &mut to,
                ARG_VERSION if mode.is_empty() => &mut version,
                ARG_LOG_FILE => &mut log_file,
                other => return Err(invalid(format!("unexpected argument: {other}"))),
            };
            let value = iter.next().ok_or_else(|| invalid(format!("missing value for {flag}")))?;
            *slot = Some(value.clone());
        }

        let required = |value: Option<String>| {
            value
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| invalid("missing required arguments".to_string()))
        };

        let request = match mode {
            ARG_FINALIZE => HelperRequest::Finalize {
                to: required(to)?,
            },
            ARG_UPDATE_META => HelperRequest::UpdateMeta {
                from: required(from)?,
                to: required(to)?,
            },
            _ => HelperRequest::Stage {
                from: required(from)?,
                to: required(to)?,
                version: version.unwrap_or_default(),
            },
        };

        Ok(Self {
            request,
            log_file: log_file.map(PathBuf::from),
        })
    }
}

/// Runs the helper if `args` (without the program name) start with the
/// reserved flag, returning the exit code. Returns `None` for normal launches.
pub fn maybe_run_helper(args: &[String]) -> Option<i32> {
    if args.first().map(String::as_str) != Some(HELPER_FLAG) {
        return None;
    }
    Some(run_helper(&args[1..]))
}

fn run_helper(args: &[String]) -> i32 {
    let log_file = args
        .iter()
        .position(|arg| arg == ARG_LOG_FILE)
        .and_then(|index| args.get(index + 1))
        .map(PathBuf::from);
    init_helper_logging(log_file.as_deref());

    if cfg!(windows) && !is_elevated() {
        error!("tnr update helper: elevation required but not granted");
        return 1;
    }

    let invocation = match HelperInvocation::parse(args) {
        Ok(invocation) => invocation,
        Err(e) => {
            error!("tnr update helper: {e}");
            return 1;
        }
    };

    match execute(&invocation.request) {
        Ok(()) => {
            info!("tnr update helper: {} completed", invocation.request.operation());
            0
        }
        Err(e) => {
            error!("tnr update helper: {} failed: {e}", invocation.request.operation());
            1
        }
    }
}

/// Performs `request` in the current process.
pub fn execute(request: &HelperRequest) -> Result<()> {
    match request {
        HelperRequest::Stage {
            from,
            to,
            version,
        } => stage_in_dir(to, from, version).map(|_| ()),
        HelperRequest::Finalize {
            to,
        } => {
            let exe_name = crate::upgrade::Platform::current().exe_name();
            finalize_in_dir(to, exe_name).map(|_| ())
        }
        HelperRequest::UpdateMeta {
            from,
            to,
        } => {
            let data = std::fs::read(from)?;
            InstallMeta::from_bytes(&data)?.write(to)
        }
    }
}

fn init_helper_logging(log_file: Option<&Path>) {
    let builder = tracing_subscriber::fmt().with_ansi(false).with_target(false);
    let file = log_file.and_then(|path| File::create(path).ok());
    let _ = match file {
        Some(file) => builder.with_writer(std::io::stderr.and(Mutex::new(file))).try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
}

/// Relaunches the running executable elevated to perform `request`.
///
/// Blocks until the helper exits. The helper's log is captured in a temporary
/// file and attached to the error on failure.
///
/// # Errors
///
/// [`UpdateError::HelperFailed`] when the helper exits non-zero (including a
/// declined UAC prompt), [`UpdateError::ElevationFailed`] when it cannot be
/// launched.
pub fn run_elevated_helper(request: HelperRequest) -> Result<()> {
    let exe = std::env::current_exe()?;
    let operation = request.operation();
    let log_file = std::env::temp_dir().join(format!("tnr-helper-{operation}.log"));
    let invocation = HelperInvocation::new(request).with_log_file(&log_file);

    // The reserved flag is the program's first argument, so the list is passed whole.
    let code = run_elevated(&exe, &invocation.to_args());
    let details = std::fs::read_to_string(&log_file).unwrap_or_default();
    let _ = std::fs::remove_file(&log_file);

    match code? {
        0 => Ok(()),
        exit_code => Err(UpdateError::HelperFailed {
            operation: operation.to_string(),
            exit_code,
            details: log_tail(&details),
        }),
    }
}

fn log_tail(log: &str) -> String {
    let lines: Vec<&str> = log.lines().filter(|line| !line.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(5)..].join("\n")
}
