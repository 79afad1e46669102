//! Privilege elevation.
//!
//! On Windows the engine relaunches its own executable through the UAC prompt:
//!
//! ```text
//! powershell -NoProfile -NonInteractive -Command
//!   $argArray = @('--tnr-internal-update-helper','--finalize',...);
//!   $p = Start-Process -FilePath 'C:\...\tnr.exe' -ArgumentList $argArray -Verb RunAs -Wait -PassThru;
//!   exit $p.ExitCode
//! ```
//!
//! `Start-Process` joins `-ArgumentList` into a single command line, so every
//! argument is quoted with the Windows command-line rules first and then wrapped
//! in a PowerShell single-quoted literal.

use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::core::{Result, UpdateError};

/// Whether the current process holds an elevated token.
///
/// Always `false` outside Windows.
pub fn is_elevated() -> bool {
    #[cfg(windows)]
    {
        token_is_elevated()
    }
    #[cfg(not(windows))]
    {
        false
    }
}

#[cfg(windows)]
fn token_is_elevated() -> bool {
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::Security::{
        GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation,
    };
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    let mut token: HANDLE = std::ptr::null_mut();
    // SAFETY: the pseudo handle from GetCurrentProcess is always valid and
    // `token` is a valid out pointer.
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) } == 0 {
        return false;
    }

    let mut elevation = TOKEN_ELEVATION {
        TokenIsElevated: 0,
    };
    let mut returned = 0u32;
    // SAFETY: `elevation` is a correctly sized TOKEN_ELEVATION buffer and
    // `token` was opened above with TOKEN_QUERY access.
    let ok = unsafe {
        GetTokenInformation(
            token,
            TokenElevation,
            (&mut elevation as *mut TOKEN_ELEVATION).cast(),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut returned,
        )
    };
    // SAFETY: `token` is an open handle owned by this function.
    unsafe { CloseHandle(token) };

    ok != 0 && elevation.TokenIsElevated != 0
}

/// Wraps `s` in a PowerShell single-quoted string literal.
///
/// # Examples
///
/// ```rust
/// use tnr_cli::upgrade::elevation::ps_quote;
///
/// assert_eq!(ps_quote("it's"), "'it''s'");
/// ```
pub fn ps_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quotes one argument with the Windows command-line rules so it survives as a
/// single token. Arguments without spaces, tabs or quotes pass unchanged.
///
/// # Examples
///
/// ```rust
/// use tnr_cli::upgrade::elevation::quote_windows_arg;
///
/// assert_eq!(quote_windows_arg("--finalize"), "--finalize");
/// assert_eq!(quote_windows_arg(r"C:\Program Files\tnr\"), r#""C:\Program Files\tnr\\""#);
/// ```
pub fn quote_windows_arg(arg: &str) -> String {
    let needs_quoting = arg.is_empty() || arg.contains([' ', '\t', '"']);
    if !needs_quoting {
        return arg.to_string();
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.push_str(&"\\".repeat(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.push_str(&"\\".repeat(backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }
    quoted.push_str(&"\\".repeat(backslashes * 2));
    quoted.push('"');
    quoted
}

/// PowerShell script that runs `exe` elevated with `args`, waits for it and
/// exits with its exit code.
pub fn elevation_script(exe: &Path, args: &[String]) -> String {
    let elements: Vec<String> =
        args.iter().map(|arg| ps_quote(&quote_windows_arg(arg))).collect();
    format!(
        "$argArray = @({}); $p = Start-Process -FilePath {} -ArgumentList $argArray -Verb RunAs -Wait -PassThru; exit $p.ExitCode",
        elements.join(","),
        ps_quote(&exe.to_string_lossy())
    )
}

/// Runs `exe` with `args` through the UAC prompt and returns its exit code.
///
/// Blocks until the elevated process exits. A declined prompt makes
/// `Start-Process` fail, which surfaces as a non-zero exit code.
///
/// # Errors
///
/// [`UpdateError::ElevationFailed`] if PowerShell cannot be launched or is
/// killed by a signal.
pub fn run_elevated(exe: &Path, args: &[String]) -> Result<i32> {
    let script = elevation_script(exe, args);
    debug!("Requesting elevation for {}", exe.display());

    let status = Command::new("powershell.exe")
        .args(["-NoProfile", "-NonInteractive", "-Command", &script])
        .status()
        .map_err(|e| UpdateError::ElevationFailed {
            reason: format!("failed to launch PowerShell: {e}"),
        })?;

    status.code().ok_or_else(|| UpdateError::ElevationFailed {
        reason: "elevated process was terminated".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_windows_arg() {
        assert_eq!(quote_windows_arg("plain"), "plain");
        assert_eq!(quote_windows_arg(""), "\"\"");
        assert_eq!(quote_windows_arg("two words"), "\"two words\"");
        assert_eq!(quote_windows_arg(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote_windows_arg(r"C:\a b\"), r#""C:\a b\\""#);
        assert_eq!(quote_windows_arg(r"C:\no\spaces\"), r"C:\no\spaces\");
    }

    #[test]
    fn test_ps_quote() {
        assert_eq!(ps_quote("C:\\tnr.exe"), "'C:\\tnr.exe'");
        assert_eq!(ps_quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_elevation_script() {
        let args = vec![
            "--tnr-internal-update-helper".to_string(),
            "--to".to_string(),
            r"C:\Program Files\tnr".to_string(),
        ];
        let script = elevation_script(Path::new(r"C:\Program Files\tnr\tnr.exe"), &args);
        assert_eq!(
            script,
            r#"$argArray = @('--tnr-internal-update-helper','--to','"C:\Program Files\tnr"'); $p = Start-Process -FilePath 'C:\Program Files\tnr\tnr.exe' -ArgumentList $argArray -Verb RunAs -Wait -PassThru; exit $p.ExitCode"#
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn test_never_elevated_off_windows() {
        assert!(!is_elevated());
    }
}
