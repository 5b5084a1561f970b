//! Windows launcher for the packaged bundle.
//!
//! The launcher starts Chrome with a dedicated profile next to the package
//! and only the packaged bundle loaded.

/// `Launch_<product>.bat`
#[must_use]
pub fn launcher_name(product: &str) -> String {
    format!("Launch_{product}.bat")
}

/// Batch script text with CRLF line endings. `bundle_dir` is the bundle's
/// folder name relative to the launcher.
#[must_use]
pub fn render_launcher(product: &str, bundle_dir: &str) -> String {
    let script = format!(
        r#"@echo off
echo Starting Chrome with {product}...

:: Dedicated profile next to this launcher
if not exist "%~dp0BrowserProfile" mkdir "%~dp0BrowserProfile"

set CHROME_PATH=

if exist "%ProgramFiles%\Google\Chrome\Application\chrome.exe" (
    set CHROME_PATH="%ProgramFiles%\Google\Chrome\Application\chrome.exe"
    goto launch
)

if exist "%ProgramFiles(x86)%\Google\Chrome\Application\chrome.exe" (
    set CHROME_PATH="%ProgramFiles(x86)%\Google\Chrome\Application\chrome.exe"
    goto launch
)

if exist "%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe" (
    set CHROME_PATH="%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe"
    goto launch
)

echo Chrome not found in common locations.
echo Please enter the full path to chrome.exe:
set /p CHROME_PATH=

:launch
if not exist %CHROME_PATH% (
    echo Chrome not found at %CHROME_PATH%
    echo Please install Google Chrome and try again.
    pause
    exit /b 1
)

start "" %CHROME_PATH% --user-data-dir="%~dp0BrowserProfile" ^
    --no-first-run --no-default-browser-check ^
    --disable-extensions-except="%~dp0{bundle_dir}" ^
    --load-extension="%~dp0{bundle_dir}"

echo Chrome launched with {product}.
echo.
echo NOTE: This window can be closed, but keep Chrome open to use {product}.
echo.
"#
    );
    script.replace('\n', "\r\n")
}
