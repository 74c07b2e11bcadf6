/// Webcam capture pipeline for pump transition snapshots
use std::path::PathBuf;
use std::time::Duration;

use log::info;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::HwError;
use crate::models::PumpEvent;
use crate::utils::image_timestamp;

/// Name of the canonical most-recent snapshot inside the image directory.
/// Overwritten on every capture; everything else in the directory is
/// append-only history.
pub const RECENT_IMAGE: &str = "recent.jpg";

// External imaging tools. Camera hardware stalls transiently, so every
// invocation runs under a hard timeout.
const CAPTURE_CMD: &str = "fswebcam";
const CAPTURE_RESOLUTION: &str = "640x480";
const PROCESS_CMD: &str = "convert";
const PROCESS_GEOMETRY: &str = "800x600";
const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Capture capability: one photo per pump state transition.
///
/// The control loop only ever talks to this trait; the external command
/// strings stay confined to the production implementation.
pub trait Camera {
    async fn capture(&mut self, event: PumpEvent) -> Result<PathBuf, HwError>;
}

/// Production camera: shells out to fswebcam for the frame grab and
/// ImageMagick for the resize, then copies the canonical file to a
/// timestamped history entry.
pub struct WebcamCamera {
    image_dir: PathBuf,
}

impl WebcamCamera {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        WebcamCamera {
            image_dir: image_dir.into(),
        }
    }

    async fn run_command(program: &str, args: &[&str]) -> Result<(), HwError> {
        Self::run_command_within(program, args, COMMAND_TIMEOUT).await
    }

    async fn run_command_within(
        program: &str,
        args: &[&str],
        limit: Duration,
    ) -> Result<(), HwError> {
        // kill_on_drop reaps the child if the timeout drops the status future
        let status = timeout(
            limit,
            Command::new(program).args(args).kill_on_drop(true).status(),
        )
        .await
        .map_err(|_| {
            HwError::ImageIo(format!(
                "{} timed out after {}s",
                program,
                limit.as_secs()
            ))
        })?
        .map_err(|e| HwError::ImageIo(format!("failed to run {}: {}", program, e)))?;

        if !status.success() {
            return Err(HwError::ImageIo(format!("{} exited with {}", program, status)));
        }
        Ok(())
    }
}

impl Camera for WebcamCamera {
    /// Grab a fresh frame into the canonical path, normalize it in place,
    /// then copy it to a timestamped file tagged with the event.
    async fn capture(&mut self, event: PumpEvent) -> Result<PathBuf, HwError> {
        let recent = self.image_dir.join(RECENT_IMAGE);
        let recent_str = recent.to_string_lossy().into_owned();

        Self::run_command(
            CAPTURE_CMD,
            &["-r", CAPTURE_RESOLUTION, "--no-banner", &recent_str],
        )
        .await?;
        Self::run_command(
            PROCESS_CMD,
            &[&recent_str, "-resize", PROCESS_GEOMETRY, &recent_str],
        )
        .await?;

        let stamped = self
            .image_dir
            .join(format!("{}_{}.jpg", image_timestamp(), event));
        tokio::fs::copy(&recent, &stamped).await.map_err(|e| {
            HwError::ImageIo(format!(
                "failed to copy snapshot to {}: {}",
                stamped.display(),
                e
            ))
        })?;

        info!("Captured image: {}", stamped.display());
        Ok(recent)
    }
}
